pub mod backend;
pub mod compliance;
pub mod config;
pub mod errors;
pub mod labels;
pub mod processing;
pub mod quality;
pub mod service;
pub mod types;

// Re-export commonly used types for convenience
pub use backend::{InferenceBackend, InferenceOutput};
pub use compliance::{ComplianceEvaluator, ComplianceReport, PpeItem};
pub use config::{DetectorConfig, ExecutionProvider};
pub use errors::DetectError;
pub use labels::LabelTable;
pub use processing::pre::decode_image;
pub use quality::{ImageQuality, QualityIssue};
pub use service::Detector;
pub use types::{ClassScore, Detection, NormalizedBox, Observation, PixelBox};
