use crate::types::Detection;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PpeItem {
    Helmet,
    Vest,
}

impl PpeItem {
    pub const ALL: [PpeItem; 2] = [PpeItem::Helmet, PpeItem::Vest];

    pub fn as_str(&self) -> &'static str {
        match self {
            PpeItem::Helmet => "helmet",
            PpeItem::Vest => "vest",
        }
    }

    /// Classifies a label as positive or negative evidence for an item.
    fn from_label(label: &str) -> Option<(PpeItem, bool)> {
        let normalized: String = label
            .chars()
            .filter(|c| !c.is_whitespace())
            .flat_map(char::to_lowercase)
            .collect();

        match normalized.as_str() {
            "hardhat" => Some((PpeItem::Helmet, true)),
            "no-hardhat" => Some((PpeItem::Helmet, false)),
            "safetyvest" => Some((PpeItem::Vest, true)),
            "no-safetyvest" => Some((PpeItem::Vest, false)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComplianceReport {
    pub success: bool,
    pub helmet: bool,
    pub vest: bool,
    pub missing_items: Vec<PpeItem>,
}

impl ComplianceReport {
    pub fn is_present(&self, item: PpeItem) -> bool {
        match item {
            PpeItem::Helmet => self.helmet,
            PpeItem::Vest => self.vest,
        }
    }
}

/// Decides whether the required equipment is worn.
///
/// An item counts as present only when its best positive detection reaches
/// `min_confidence`; negative classes never make an item present.
#[derive(Debug, Clone)]
pub struct ComplianceEvaluator {
    pub min_confidence: f32,
}

impl ComplianceEvaluator {
    pub fn new(min_confidence: f32) -> Self {
        Self { min_confidence }
    }

    pub fn evaluate(&self, detections: &[Detection]) -> ComplianceReport {
        let mut best_positive = [None::<f32>; 2];

        for det in detections {
            let Some((item, positive)) = PpeItem::from_label(&det.label) else {
                continue;
            };
            tracing::trace!(label = %det.label, confidence = det.confidence, positive, "PPE evidence");
            if positive {
                let slot = &mut best_positive[item as usize];
                *slot = Some(slot.map_or(det.confidence, |best| best.max(det.confidence)));
            }
        }

        let present = |item: PpeItem| {
            best_positive[item as usize].is_some_and(|conf| conf >= self.min_confidence)
        };

        let missing_items: Vec<PpeItem> =
            PpeItem::ALL.into_iter().filter(|&item| !present(item)).collect();

        let report = ComplianceReport {
            success: missing_items.is_empty(),
            helmet: present(PpeItem::Helmet),
            vest: present(PpeItem::Vest),
            missing_items,
        };

        tracing::debug!(
            helmet = report.helmet,
            vest = report.vest,
            success = report.success,
            "Compliance evaluated"
        );

        report
    }
}

impl Default for ComplianceEvaluator {
    fn default() -> Self {
        Self::new(0.40)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn det(label: &str, confidence: f32) -> Detection {
        Detection {
            label: label.to_string(),
            confidence,
            x: 0.0,
            y: 0.0,
            width: 10.0,
            height: 10.0,
        }
    }

    #[test]
    fn test_label_normalization() {
        assert_eq!(PpeItem::from_label("Hardhat"), Some((PpeItem::Helmet, true)));
        assert_eq!(PpeItem::from_label("NO-Hardhat"), Some((PpeItem::Helmet, false)));
        assert_eq!(PpeItem::from_label("Safety Vest"), Some((PpeItem::Vest, true)));
        assert_eq!(PpeItem::from_label("NO-Safety Vest"), Some((PpeItem::Vest, false)));
        assert_eq!(PpeItem::from_label("Person"), None);
    }

    #[test]
    fn test_fully_equipped_worker_passes() {
        let report = ComplianceEvaluator::default()
            .evaluate(&[det("Hardhat", 0.8), det("Safety Vest", 0.6), det("Person", 0.9)]);

        assert!(report.success);
        assert!(report.helmet && report.vest);
        assert!(report.missing_items.is_empty());
    }

    #[test]
    fn test_low_confidence_positive_is_not_enough() {
        let report =
            ComplianceEvaluator::default().evaluate(&[det("Hardhat", 0.39), det("Safety Vest", 0.4)]);

        assert!(!report.helmet, "0.39 is below the 0.40 minimum");
        assert!(report.vest, "0.40 meets the minimum");
        assert_eq!(report.missing_items, vec![PpeItem::Helmet]);
        assert!(!report.success);
    }

    #[test]
    fn test_best_positive_wins_over_weaker_ones() {
        let report = ComplianceEvaluator::default().evaluate(&[
            det("Hardhat", 0.1),
            det("Hardhat", 0.7),
            det("NO-Hardhat", 0.95),
        ]);

        assert!(report.helmet, "a strong positive is present despite a negative");
    }

    #[test]
    fn test_negative_only_means_missing() {
        let report = ComplianceEvaluator::default()
            .evaluate(&[det("NO-Hardhat", 0.9), det("NO-Safety Vest", 0.9)]);

        assert_eq!(report.missing_items, vec![PpeItem::Helmet, PpeItem::Vest]);
    }

    #[test]
    fn test_no_detections_reports_everything_missing() {
        let report = ComplianceEvaluator::new(0.5).evaluate(&[]);

        assert!(!report.success);
        assert_eq!(report.missing_items, PpeItem::ALL.to_vec());
        assert!(!report.is_present(PpeItem::Vest));
    }
}
