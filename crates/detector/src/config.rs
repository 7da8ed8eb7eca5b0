use std::env;

pub const DEFAULT_INPUT_SIZE: (u32, u32) = (640, 640);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionProvider {
    Cpu,
    Cuda,
}

impl ExecutionProvider {
    fn parse(value: &str) -> Self {
        match value.to_lowercase().as_str() {
            "cuda" | "gpu" => ExecutionProvider::Cuda,
            _ => ExecutionProvider::Cpu,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DetectorConfig {
    pub model_path: String,
    pub input_name: String,
    pub input_size: (u32, u32),
    pub confidence_threshold: f32,
    pub labels_path: Option<String>,
    pub execution_provider: ExecutionProvider,
    pub intra_threads: usize,
    pub min_ppe_confidence: f32,
    pub enhance_low_quality: bool,
}

impl DetectorConfig {
    /// Load configuration from environment variables with sensible defaults
    pub fn from_env() -> anyhow::Result<Self> {
        let model_path =
            env::var("MODEL_PATH").unwrap_or_else(|_| "models/ppe_detection.onnx".to_string());

        let input_name = env::var("INPUT_NAME").unwrap_or_else(|_| "images".to_string());

        let input_width = parse_var("INPUT_WIDTH").unwrap_or(DEFAULT_INPUT_SIZE.0);
        let input_height = parse_var("INPUT_HEIGHT").unwrap_or(DEFAULT_INPUT_SIZE.1);
        if input_width == 0 || input_height == 0 {
            anyhow::bail!("Model input size must be non-zero, got {input_width}x{input_height}");
        }

        let confidence_threshold = parse_var("CONFIDENCE_THRESHOLD").unwrap_or(0.25);
        let min_ppe_confidence = parse_var("MIN_PPE_CONFIDENCE").unwrap_or(0.40);
        for (name, value) in [
            ("CONFIDENCE_THRESHOLD", confidence_threshold),
            ("MIN_PPE_CONFIDENCE", min_ppe_confidence),
        ] {
            if !(0.0..=1.0).contains(&value) {
                anyhow::bail!("{name} must be within [0, 1], got {value}");
            }
        }

        let labels_path = env::var("LABELS_PATH").ok().filter(|s| !s.is_empty());

        let execution_provider = env::var("EXECUTION_PROVIDER")
            .map(|s| ExecutionProvider::parse(&s))
            .unwrap_or(ExecutionProvider::Cpu);

        let intra_threads = parse_var("INTRA_THREADS").unwrap_or(4);

        let enhance_low_quality = env::var("ENHANCE_LOW_QUALITY")
            .map(|s| matches!(s.to_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(true);

        Ok(Self {
            model_path,
            input_name,
            input_size: (input_width, input_height),
            confidence_threshold,
            labels_path,
            execution_provider,
            intra_threads,
            min_ppe_confidence,
            enhance_low_quality,
        })
    }

    /// Create default configuration for testing
    pub fn test_default() -> Self {
        Self {
            model_path: "/models/ppe_detection.onnx".to_string(),
            input_name: "images".to_string(),
            input_size: DEFAULT_INPUT_SIZE,
            confidence_threshold: 0.25,
            labels_path: None,
            execution_provider: ExecutionProvider::Cpu,
            intra_threads: 1,
            min_ppe_confidence: 0.40,
            enhance_low_quality: true,
        }
    }
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|s| s.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: [&str; 10] = [
        "MODEL_PATH",
        "INPUT_NAME",
        "INPUT_WIDTH",
        "INPUT_HEIGHT",
        "CONFIDENCE_THRESHOLD",
        "MIN_PPE_CONFIDENCE",
        "LABELS_PATH",
        "EXECUTION_PROVIDER",
        "INTRA_THREADS",
        "ENHANCE_LOW_QUALITY",
    ];

    fn clear_env() {
        for name in VARS {
            // SAFETY: serialized with the other env-mutating tests
            unsafe { env::remove_var(name) };
        }
    }

    #[test]
    fn test_execution_provider_parse() {
        assert_eq!(ExecutionProvider::parse("CUDA"), ExecutionProvider::Cuda);
        assert_eq!(ExecutionProvider::parse("gpu"), ExecutionProvider::Cuda);
        assert_eq!(ExecutionProvider::parse("cpu"), ExecutionProvider::Cpu);
        assert_eq!(ExecutionProvider::parse("tpu"), ExecutionProvider::Cpu);
    }

    #[test]
    fn test_default_matches_model_contract() {
        let config = DetectorConfig::test_default();
        assert_eq!(config.input_size, (640, 640));
        assert_eq!(config.confidence_threshold, 0.25);
        assert_eq!(config.min_ppe_confidence, 0.40);
        assert!(config.labels_path.is_none());
    }

    #[test]
    #[serial]
    fn test_from_env_defaults() {
        clear_env();

        let config = DetectorConfig::from_env().unwrap();

        assert_eq!(config.model_path, "models/ppe_detection.onnx");
        assert_eq!(config.input_name, "images");
        assert_eq!(config.input_size, (640, 640));
        assert_eq!(config.confidence_threshold, 0.25);
        assert_eq!(config.min_ppe_confidence, 0.40);
        assert!(config.enhance_low_quality);
        assert!(config.labels_path.is_none());
        assert_eq!(config.execution_provider, ExecutionProvider::Cpu);
        assert_eq!(config.intra_threads, 4);
    }

    #[test]
    #[serial]
    fn test_from_env_reads_overrides() {
        clear_env();
        unsafe {
            env::set_var("INPUT_WIDTH", "320");
            env::set_var("INPUT_HEIGHT", "256");
            env::set_var("CONFIDENCE_THRESHOLD", "0.5");
            env::set_var("EXECUTION_PROVIDER", "cuda");
            env::set_var("ENHANCE_LOW_QUALITY", "false");
        }

        let config = DetectorConfig::from_env().unwrap();
        clear_env();

        assert_eq!(config.input_size, (320, 256));
        assert_eq!(config.confidence_threshold, 0.5);
        assert_eq!(config.execution_provider, ExecutionProvider::Cuda);
        assert!(!config.enhance_low_quality);
    }

    #[test]
    #[serial]
    fn test_from_env_rejects_thresholds_outside_unit_range() {
        clear_env();

        unsafe { env::set_var("CONFIDENCE_THRESHOLD", "1.5") };
        let err = DetectorConfig::from_env().unwrap_err().to_string();
        assert!(err.contains("CONFIDENCE_THRESHOLD"), "got: {err}");

        unsafe { env::set_var("CONFIDENCE_THRESHOLD", "1.0") };
        unsafe { env::set_var("MIN_PPE_CONFIDENCE", "-0.1") };
        let err = DetectorConfig::from_env().unwrap_err().to_string();
        assert!(err.contains("MIN_PPE_CONFIDENCE"), "got: {err}");

        clear_env();
    }

    #[test]
    #[serial]
    fn test_from_env_rejects_zero_input_size() {
        clear_env();
        unsafe { env::set_var("INPUT_WIDTH", "0") };

        let result = DetectorConfig::from_env();
        clear_env();

        let err = result.unwrap_err().to_string();
        assert!(err.contains("non-zero"), "got: {err}");
    }

    #[test]
    #[serial]
    fn test_from_env_ignores_empty_labels_path() {
        clear_env();

        unsafe { env::set_var("LABELS_PATH", "") };
        assert!(DetectorConfig::from_env().unwrap().labels_path.is_none());

        unsafe { env::set_var("LABELS_PATH", "models/labels.txt") };
        assert_eq!(
            DetectorConfig::from_env().unwrap().labels_path.as_deref(),
            Some("models/labels.txt")
        );

        clear_env();
    }
}
