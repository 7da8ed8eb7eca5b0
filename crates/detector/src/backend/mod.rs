use crate::config::DetectorConfig;
use ndarray::{Array, IxDyn};

#[cfg(any(test, feature = "test-util"))]
pub mod fixed;

#[cfg(feature = "ort-backend")]
pub mod ort;

/// Output names of the NMS-included model export.
pub const CONFIDENCE_OUTPUT: &str = "confidence";
pub const COORDINATES_OUTPUT: &str = "coordinates";

/// Model runtime behind the detector.
///
/// A loaded backend is shared read-only across concurrent requests, so
/// `infer` takes `&self`. Implementations that need exclusive access to an
/// underlying runtime handle must arrange it internally.
pub trait InferenceBackend: Send + Sync + 'static {
    fn load_model(config: &DetectorConfig) -> anyhow::Result<Self>
    where
        Self: Sized;

    /// Run inference on a `[1, 3, H, W]` input in `[0, 1]`.
    fn infer(&self, images: &Array<f32, IxDyn>) -> anyhow::Result<InferenceOutput>;
}

#[derive(Debug, Clone)]
pub struct InferenceOutput {
    pub confidence: ndarray::ArrayD<f32>, // [N, num_classes] or [1, N, num_classes]
    pub coordinates: ndarray::ArrayD<f32>, // [N, 4] or [1, N, 4] cxcywh (normalized 0-1, top-left origin)
}
