use anyhow::Context;
use std::path::Path;

/// Class names of the bundled PPE model, in output index order.
const PPE_CLASSES: [&str; 10] = [
    "Hardhat",
    "Mask",
    "NO-Hardhat",
    "NO-Mask",
    "NO-Safety Vest",
    "Person",
    "Safety Cone",
    "Safety Vest",
    "machinery",
    "vehicle",
];

/// Maps model class indices to label identifiers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelTable {
    names: Vec<String>,
}

impl LabelTable {
    pub fn new(names: Vec<String>) -> Self {
        Self { names }
    }

    pub fn ppe_default() -> Self {
        Self::new(PPE_CLASSES.iter().map(|s| s.to_string()).collect())
    }

    /// Reads one label per line. Blank lines are skipped.
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read labels from {}", path.display()))?;

        let names: Vec<String> = contents
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();

        if names.is_empty() {
            anyhow::bail!("Label file {} contains no labels", path.display());
        }

        Ok(Self::new(names))
    }

    /// Label for `index`; indices outside the table fall back to the number itself.
    pub fn name(&self, index: usize) -> String {
        self.names
            .get(index)
            .cloned()
            .unwrap_or_else(|| index.to_string())
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl Default for LabelTable {
    fn default() -> Self {
        Self::ppe_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_table_covers_ppe_classes() {
        let labels = LabelTable::ppe_default();
        assert_eq!(labels.len(), 10);
        assert_eq!(labels.name(0), "Hardhat");
        assert_eq!(labels.name(7), "Safety Vest");
    }

    #[test]
    fn test_unknown_index_falls_back_to_number() {
        let labels = LabelTable::new(vec!["Hardhat".to_string()]);
        assert_eq!(labels.name(3), "3");
    }

    #[test]
    fn test_from_file_skips_blank_lines() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "Hardhat\n\n  Safety Vest  \n").unwrap();

        let labels = LabelTable::from_file(file.path()).unwrap();
        assert_eq!(labels.len(), 2);
        assert_eq!(labels.name(1), "Safety Vest");
    }

    #[test]
    fn test_from_file_rejects_empty_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let err = LabelTable::from_file(file.path()).unwrap_err();
        assert!(err.to_string().contains("no labels"));
    }

    #[test]
    fn test_from_file_reports_missing_path() {
        let err = LabelTable::from_file("/nonexistent/labels.txt").unwrap_err();
        assert!(err.to_string().contains("Failed to read labels"));
    }
}
