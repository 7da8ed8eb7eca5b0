//! Deterministic backend that replays a canned model output.

use super::{InferenceBackend, InferenceOutput};
use crate::config::DetectorConfig;
use ndarray::{Array, IxDyn};
use std::sync::atomic::{AtomicUsize, Ordering};

pub struct FixedBackend {
    output: Result<InferenceOutput, String>,
    calls: AtomicUsize,
}

impl FixedBackend {
    pub fn new(output: InferenceOutput) -> Self {
        Self {
            output: Ok(output),
            calls: AtomicUsize::new(0),
        }
    }

    /// Builds an output from `(cxcywh box, per-class scores)` rows. All rows
    /// must have the same number of scores.
    pub fn from_rows(rows: &[([f32; 4], Vec<f32>)]) -> Self {
        let n = rows.len();
        let num_classes = rows.first().map_or(0, |(_, scores)| scores.len());

        let coordinates: Vec<f32> = rows.iter().flat_map(|(bbox, _)| *bbox).collect();
        let confidence: Vec<f32> = rows
            .iter()
            .flat_map(|(_, scores)| scores.iter().copied())
            .collect();

        Self::new(InferenceOutput {
            confidence: Array::from_shape_vec(IxDyn(&[n, num_classes]), confidence)
                .expect("score rows must share a class count"),
            coordinates: Array::from_shape_vec(IxDyn(&[n, 4]), coordinates)
                .expect("coordinate rows have four values"),
        })
    }

    /// A backend whose every `infer` call fails with `message`.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            output: Err(message.into()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

impl InferenceBackend for FixedBackend {
    fn load_model(config: &DetectorConfig) -> anyhow::Result<Self> {
        anyhow::bail!(
            "FixedBackend has no model file support (requested {})",
            config.model_path
        )
    }

    fn infer(&self, images: &Array<f32, IxDyn>) -> anyhow::Result<InferenceOutput> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        if images.ndim() != 4 {
            anyhow::bail!("Expected a 4D input tensor, got shape {:?}", images.shape());
        }
        self.output.clone().map_err(anyhow::Error::msg)
    }
}
