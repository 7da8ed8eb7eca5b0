use thiserror::Error;

/// Failures surfaced by the detector. Every variant is turned into a
/// response value at the channel boundary; none is fatal to the process.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DetectError {
    #[error("Model not loaded")]
    ModelNotLoaded,

    #[error("Invalid image: {0}")]
    InvalidImage(String),

    #[error("{0}")]
    InferenceFailure(String),
}

impl DetectError {
    /// Stable identifier used for metric attributes and structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            DetectError::ModelNotLoaded => "model_not_loaded",
            DetectError::InvalidImage(_) => "invalid_image",
            DetectError::InferenceFailure(_) => "inference_failure",
        }
    }

    pub(crate) fn inference(err: anyhow::Error) -> Self {
        DetectError::InferenceFailure(format!("{err:#}"))
    }
}
