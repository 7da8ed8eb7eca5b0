use crate::channel::MethodCallHandler;
use crate::message::{ErrorCode, MethodCall, MethodError, MethodResponse};
use crate::payload;
use crate::value::EncodableValue;
use detector::{
    ComplianceEvaluator, Detector, DetectorConfig, ImageQuality, InferenceBackend, decode_image,
    quality,
};
use image::DynamicImage;
use std::sync::Arc;

pub const DETECT_PPE: &str = "detectPPE";
pub const VALIDATE_PPE: &str = "validatePPE";
pub const IMAGE_BYTES_ARG: &str = "imageBytes";

/// Serves the PPE detection channel.
///
/// Argument problems are answered with typed errors. Once an image has been
/// decoded, detector failures come back as `{error}` on the success path.
pub struct PpeMethodHandler<B: InferenceBackend> {
    detector: Arc<Detector<B>>,
    evaluator: ComplianceEvaluator,
    enhance_low_quality: bool,
}

impl<B: InferenceBackend> PpeMethodHandler<B> {
    pub fn new(detector: Arc<Detector<B>>, config: &DetectorConfig) -> Self {
        Self {
            detector,
            evaluator: ComplianceEvaluator::new(config.min_ppe_confidence),
            enhance_low_quality: config.enhance_low_quality,
        }
    }

    async fn detect_ppe(&self, arguments: EncodableValue) -> Result<EncodableValue, MethodError> {
        let image = decode_argument(arguments).await?;

        let result = Arc::clone(&self.detector).detect_async(image).await;
        if let Ok(detections) = &result {
            tracing::info!(detections = detections.len(), "PPE detection finished");
        }

        Ok(payload::detection_outcome(&result))
    }

    async fn validate_ppe(&self, arguments: EncodableValue) -> Result<EncodableValue, MethodError> {
        let image = decode_argument(arguments).await?;

        let enhance = self.enhance_low_quality;
        let (image, image_quality) = tokio::task::spawn_blocking(move || {
            let image_quality = ImageQuality::assess(&image);
            if enhance && !image_quality.is_good {
                tracing::debug!(issues = ?image_quality.issues, "Enhancing low quality image");
                (quality::enhance(&image), image_quality)
            } else {
                (image, image_quality)
            }
        })
        .await
        .map_err(worker_failed)?;

        let detections = match Arc::clone(&self.detector).detect_async(image).await {
            Ok(detections) => detections,
            Err(e) => return Ok(payload::error_value(&e)),
        };

        let report = self.evaluator.evaluate(&detections);
        tracing::info!(
            success = report.success,
            detections = detections.len(),
            quality_ok = image_quality.is_good,
            "PPE validation finished"
        );

        Ok(payload::validation_value(&report, &image_quality, &detections))
    }
}

impl<B: InferenceBackend> MethodCallHandler for PpeMethodHandler<B> {
    async fn handle(&self, call: MethodCall) -> MethodResponse {
        let result = match call.method.as_str() {
            DETECT_PPE => self.detect_ppe(call.arguments).await,
            VALIDATE_PPE => self.validate_ppe(call.arguments).await,
            other => {
                tracing::warn!(method = other, "Unknown method");
                return MethodResponse::NotImplemented;
            }
        };

        match result {
            Ok(value) => MethodResponse::success(value),
            Err(e) => {
                tracing::warn!(code = %e.code, message = %e.message, "Rejected method call");
                MethodResponse::Error(e)
            }
        }
    }
}

/// Pulls the `imageBytes` buffer out of the call arguments.
fn image_bytes(arguments: EncodableValue) -> Result<Vec<u8>, MethodError> {
    let missing = || MethodError::new(ErrorCode::InvalidArgument, "Image bytes required");

    let EncodableValue::Map(mut entries) = arguments else {
        return Err(missing());
    };
    match entries.remove(IMAGE_BYTES_ARG) {
        Some(EncodableValue::Bytes(bytes)) => Ok(bytes),
        _ => Err(missing()),
    }
}

async fn decode_argument(arguments: EncodableValue) -> Result<DynamicImage, MethodError> {
    let bytes = image_bytes(arguments)?;

    tokio::task::spawn_blocking(move || decode_image(&bytes))
        .await
        .map_err(worker_failed)?
        .map_err(|e| {
            MethodError::new(ErrorCode::InvalidImage, "Could not decode image")
                .with_details(e.to_string())
        })
}

fn worker_failed(err: tokio::task::JoinError) -> MethodError {
    MethodError::new(ErrorCode::Internal, format!("Image worker failed: {err}"))
}
