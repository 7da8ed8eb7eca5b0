use super::{CONFIDENCE_OUTPUT, COORDINATES_OUTPUT, InferenceBackend, InferenceOutput};
use crate::config::{DetectorConfig, ExecutionProvider};
use anyhow::Context;
use ndarray::{Array, IxDyn};
use ort::{
    session::{Session, builder::GraphOptimizationLevel},
    value::TensorRef,
};
use std::sync::Mutex;

pub struct OrtBackend {
    // `Session::run` needs `&mut`; the lock only guards the runtime call.
    session: Mutex<Session>,
    input_name: String,
}

impl OrtBackend {
    /// Load model with specified execution provider
    pub fn load_model_with_provider(
        path: &str,
        input_name: &str,
        provider: ExecutionProvider,
        intra_threads: usize,
    ) -> anyhow::Result<Self> {
        // Initialize ORT environment (idempotent)
        let _ = ort::init().commit();

        #[allow(unused_mut)]
        let mut builder = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(intra_threads)?;

        match provider {
            #[cfg(feature = "cuda")]
            ExecutionProvider::Cuda => {
                tracing::info!("Initializing ONNX Runtime with CUDA execution provider");
                builder = builder.with_execution_providers([
                    ort::execution_providers::CUDAExecutionProvider::default()
                        .with_device_id(0)
                        .build()
                        .error_on_failure(),
                ])?;
            }
            #[cfg(not(feature = "cuda"))]
            ExecutionProvider::Cuda => {
                anyhow::bail!("CUDA execution provider requested but the `cuda` feature is disabled");
            }
            ExecutionProvider::Cpu => {
                tracing::info!("Initializing ONNX Runtime with CPU execution provider");
            }
        }

        let session = builder
            .commit_from_file(path)
            .with_context(|| format!("Failed to load model from {path}"))?;

        tracing::info!(path, input_name, "Model loaded");
        Ok(Self {
            session: Mutex::new(session),
            input_name: input_name.to_string(),
        })
    }
}

impl InferenceBackend for OrtBackend {
    fn load_model(config: &DetectorConfig) -> anyhow::Result<Self> {
        Self::load_model_with_provider(
            &config.model_path,
            &config.input_name,
            config.execution_provider,
            config.intra_threads,
        )
    }

    fn infer(&self, images: &Array<f32, IxDyn>) -> anyhow::Result<InferenceOutput> {
        let mut session = self
            .session
            .lock()
            .map_err(|_| anyhow::anyhow!("ONNX Runtime session lock poisoned"))?;

        let outputs = session.run(ort::inputs![
            self.input_name.as_str() => TensorRef::from_array_view(images.view())?
        ])?;

        let confidence = outputs[CONFIDENCE_OUTPUT].try_extract_array::<f32>()?;
        let coordinates = outputs[COORDINATES_OUTPUT].try_extract_array::<f32>()?;

        Ok(InferenceOutput {
            confidence: confidence.into_owned(),
            coordinates: coordinates.into_owned(),
        })
    }
}
