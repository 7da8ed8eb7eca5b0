use crate::{
    backend::InferenceBackend,
    config::DetectorConfig,
    errors::DetectError,
    labels::LabelTable,
    processing::{post::PostProcessor, pre::ScaleFillPreProcessor, pre::decode_image},
    types::Detection,
};
use image::DynamicImage;
use opentelemetry::{
    KeyValue, global,
    metrics::{Counter, Histogram, Meter},
};
use std::sync::Arc;
use std::time::Instant;

struct DetectorMetrics {
    duration: Histogram<f64>,
    requests: Counter<u64>,
    detections: Counter<u64>,
    failures: Counter<u64>,
}

impl DetectorMetrics {
    fn init(meter: &Meter) -> Self {
        let latency_buckets = [
            0.005, 0.01, 0.02, 0.03, 0.05, 0.075, 0.1, 0.15, 0.2, 0.3, 0.5, 0.75, 1.0, 2.0,
        ];
        Self {
            duration: meter
                .f64_histogram("detector_inference_duration_seconds")
                .with_description("Time to run one detection (preprocess + infer + postprocess)")
                .with_unit("s")
                .with_boundaries(latency_buckets.to_vec())
                .build(),
            requests: meter
                .u64_counter("detector_requests_total")
                .with_description("Total detection requests")
                .build(),
            detections: meter
                .u64_counter("detector_detections_total")
                .with_description("Total detections produced")
                .build(),
            failures: meter
                .u64_counter("detector_failures_total")
                .with_description("Detection requests that ended in an error")
                .build(),
        }
    }

    fn record_failure(&self, err: &DetectError) {
        self.failures.add(1, &[KeyValue::new("kind", err.kind())]);
    }

    /// Counts a request that failed before reaching the pipeline.
    fn record_rejection(&self, err: &DetectError) {
        self.requests.add(1, &[]);
        self.record_failure(err);
    }
}

/// Runs the PPE model on decoded images.
///
/// The model handle is injected by the caller and may be absent when loading
/// failed at startup; every request then fails with
/// [`DetectError::ModelNotLoaded`] instead of taking the process down.
pub struct Detector<B: InferenceBackend> {
    model: Option<Arc<B>>,
    preprocessor: ScaleFillPreProcessor,
    postprocessor: PostProcessor,
    metrics: DetectorMetrics,
}

impl<B: InferenceBackend> Detector<B> {
    pub fn new(model: Option<Arc<B>>, config: &DetectorConfig, labels: LabelTable) -> Self {
        Self::with_meter(model, config, labels, &global::meter("detector"))
    }

    /// Like [`Detector::new`], recording metrics on `meter` instead of the
    /// global provider.
    pub fn with_meter(
        model: Option<Arc<B>>,
        config: &DetectorConfig,
        labels: LabelTable,
        meter: &Meter,
    ) -> Self {
        Self {
            model,
            preprocessor: ScaleFillPreProcessor::new(config.input_size),
            postprocessor: PostProcessor::new(config.confidence_threshold, labels),
            metrics: DetectorMetrics::init(meter),
        }
    }

    /// Loads labels and the model described by `config`.
    ///
    /// A bad label file is a configuration error and is returned. A model
    /// that fails to load is logged and leaves the detector without a model.
    pub fn load(config: &DetectorConfig) -> anyhow::Result<Self> {
        let labels = match &config.labels_path {
            Some(path) => LabelTable::from_file(path)?,
            None => LabelTable::ppe_default(),
        };
        tracing::info!(labels = labels.len(), "Label table ready");

        tracing::info!(model_path = %config.model_path, "Loading detection model");
        let model = match B::load_model(config) {
            Ok(backend) => {
                tracing::info!("Model loaded successfully");
                Some(Arc::new(backend))
            }
            Err(e) => {
                let message = format!("{e:#}");
                tracing::error!(
                    error = %message,
                    model_path = %config.model_path,
                    "Failed to load model; detection requests will be rejected"
                );
                None
            }
        };

        Ok(Self::new(model, config, labels))
    }

    pub fn is_model_loaded(&self) -> bool {
        self.model.is_some()
    }

    /// Detect objects in `image`. Runs on the calling thread.
    pub fn detect(&self, image: &DynamicImage) -> Result<Vec<Detection>, DetectError> {
        let _span = tracing::info_span!(
            "detect",
            width = image.width(),
            height = image.height()
        )
        .entered();

        self.metrics.requests.add(1, &[]);
        let start = Instant::now();

        let result = self.run_pipeline(image);

        match &result {
            Ok(detections) => {
                self.metrics.duration.record(start.elapsed().as_secs_f64(), &[]);
                self.metrics.detections.add(detections.len() as u64, &[]);
                tracing::debug!(
                    detections = detections.len(),
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Detection finished"
                );
            }
            Err(e) => {
                self.metrics.record_failure(e);
                tracing::warn!(error = %e, kind = e.kind(), "Detection failed");
            }
        }

        result
    }

    /// Decode `bytes` and detect. Undecodable input yields [`DetectError::InvalidImage`].
    pub fn detect_bytes(&self, bytes: &[u8]) -> Result<Vec<Detection>, DetectError> {
        let image = decode_image(bytes).inspect_err(|e| self.metrics.record_rejection(e))?;
        self.detect(&image)
    }

    /// Detect on the blocking worker pool and resolve once done.
    ///
    /// Requests are independent: nothing orders or serializes concurrent
    /// calls, and a call cannot be cancelled once dispatched.
    pub async fn detect_async(self: Arc<Self>, image: DynamicImage) -> Result<Vec<Detection>, DetectError> {
        if self.model.is_none() {
            self.metrics.record_rejection(&DetectError::ModelNotLoaded);
            return Err(DetectError::ModelNotLoaded);
        }

        tokio::task::spawn_blocking(move || self.detect(&image))
            .await
            .map_err(|e| DetectError::InferenceFailure(format!("Detection worker failed: {e}")))?
    }

    fn run_pipeline(&self, image: &DynamicImage) -> Result<Vec<Detection>, DetectError> {
        let model = self.model.as_ref().ok_or(DetectError::ModelNotLoaded)?;

        let rgb = image.to_rgb8();
        let input = self
            .preprocessor
            .preprocess(&rgb)
            .map_err(DetectError::inference)?;

        let output = {
            let _infer_span = tracing::info_span!("model_inference").entered();
            model.infer(&input).map_err(DetectError::inference)?
        };

        let observations = self
            .postprocessor
            .decode_observations(&output)
            .map_err(DetectError::inference)?;

        Ok(self
            .postprocessor
            .to_detections(&observations, image.width(), image.height()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::fixed::FixedBackend;
    use image::{Rgb, RgbImage};
    use opentelemetry::metrics::MeterProvider;
    use opentelemetry_sdk::metrics::{
        InMemoryMetricExporter, PeriodicReader, SdkMeterProvider,
        data::{AggregatedMetrics, MetricData},
    };

    fn test_image(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([120, 120, 120])))
    }

    fn ppe_scores(class_idx: usize, score: f32) -> Vec<f32> {
        let mut scores = vec![0.0; 10];
        scores[class_idx] = score;
        scores
    }

    fn detector_with(backend: FixedBackend) -> Detector<FixedBackend> {
        Detector::new(
            Some(Arc::new(backend)),
            &DetectorConfig::test_default(),
            LabelTable::ppe_default(),
        )
    }

    struct MeteredDetector {
        detector: Arc<Detector<FixedBackend>>,
        provider: SdkMeterProvider,
        exporter: InMemoryMetricExporter,
    }

    impl MeteredDetector {
        fn new(model: Option<Arc<FixedBackend>>) -> Self {
            let exporter = InMemoryMetricExporter::default();
            let provider = SdkMeterProvider::builder()
                .with_reader(PeriodicReader::builder(exporter.clone()).build())
                .build();
            let detector = Arc::new(Detector::with_meter(
                model,
                &DetectorConfig::test_default(),
                LabelTable::ppe_default(),
                &provider.meter("detector"),
            ));
            Self {
                detector,
                provider,
                exporter,
            }
        }

        fn counter(&self, name: &str) -> u64 {
            self.provider.force_flush().unwrap();
            let exported = self.exporter.get_finished_metrics().unwrap();
            let Some(latest) = exported.last() else {
                return 0;
            };
            latest
                .scope_metrics()
                .flat_map(|scope| scope.metrics())
                .filter(|metric| metric.name() == name)
                .map(|metric| match metric.data() {
                    AggregatedMetrics::U64(MetricData::Sum(sum)) => {
                        sum.data_points().map(|point| point.value()).sum::<u64>()
                    }
                    other => panic!("Unexpected data for {name}: {other:?}"),
                })
                .sum()
        }
    }

    #[test]
    fn test_detect_without_model_is_model_not_loaded() {
        let detector: Detector<FixedBackend> = Detector::new(
            None,
            &DetectorConfig::test_default(),
            LabelTable::ppe_default(),
        );

        assert!(!detector.is_model_loaded());
        assert_eq!(
            detector.detect(&test_image(4, 4)),
            Err(DetectError::ModelNotLoaded)
        );
    }

    #[test]
    fn test_load_failure_leaves_detector_without_model() {
        let detector = Detector::<FixedBackend>::load(&DetectorConfig::test_default()).unwrap();
        assert!(!detector.is_model_loaded());
    }

    #[test]
    fn test_load_rejects_missing_label_file() {
        let mut config = DetectorConfig::test_default();
        config.labels_path = Some("/nonexistent/labels.txt".to_string());

        assert!(Detector::<FixedBackend>::load(&config).is_err());
    }

    #[test]
    fn test_detect_maps_boxes_onto_original_image() {
        // Box centered at (0.5, 0.5), half the width and a quarter of the height
        let detector = detector_with(FixedBackend::from_rows(&[(
            [0.5, 0.5, 0.5, 0.25],
            ppe_scores(7, 0.92),
        )]));

        let detections = detector.detect(&test_image(100, 200)).unwrap();

        assert_eq!(
            detections,
            vec![Detection {
                label: "Safety Vest".to_string(),
                confidence: 0.92,
                x: 25.0,
                y: 75.0,
                width: 50.0,
                height: 50.0,
            }]
        );
    }

    #[test]
    fn test_detect_bytes_rejects_undecodable_input() {
        let detector = detector_with(FixedBackend::from_rows(&[]));
        assert!(matches!(
            detector.detect_bytes(b"\x89PNG but not really"),
            Err(DetectError::InvalidImage(_))
        ));
    }

    #[test]
    fn test_backend_failure_is_reported_as_inference_failure() {
        let detector = detector_with(FixedBackend::failing("session exploded"));

        match detector.detect(&test_image(8, 8)) {
            Err(DetectError::InferenceFailure(message)) => {
                assert!(message.contains("session exploded"), "got: {message}");
            }
            other => panic!("Expected InferenceFailure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_detect_async_matches_sync_result() {
        let detector = Arc::new(detector_with(FixedBackend::from_rows(&[
            ([0.2, 0.2, 0.1, 0.1], ppe_scores(0, 0.8)),
            ([0.7, 0.6, 0.2, 0.3], ppe_scores(2, 0.6)),
        ])));
        let image = test_image(64, 48);

        let sync = detector.detect(&image).unwrap();
        let from_worker = Arc::clone(&detector).detect_async(image).await.unwrap();

        assert_eq!(sync, from_worker);
        assert_eq!(from_worker.len(), 2);
    }

    #[tokio::test]
    async fn test_detect_async_without_model() {
        let detector: Arc<Detector<FixedBackend>> = Arc::new(Detector::new(
            None,
            &DetectorConfig::test_default(),
            LabelTable::ppe_default(),
        ));

        let result = detector.detect_async(test_image(4, 4)).await;
        assert_eq!(result, Err(DetectError::ModelNotLoaded));
    }

    #[test]
    fn test_successful_detection_counts_one_request() {
        let metered = MeteredDetector::new(Some(Arc::new(FixedBackend::from_rows(&[(
            [0.5, 0.5, 0.2, 0.2],
            ppe_scores(5, 0.9),
        )]))));

        metered.detector.detect(&test_image(32, 32)).unwrap();

        assert_eq!(metered.counter("detector_requests_total"), 1);
        assert_eq!(metered.counter("detector_detections_total"), 1);
        assert_eq!(metered.counter("detector_failures_total"), 0);
    }

    #[test]
    fn test_undecodable_bytes_count_as_a_failed_request() {
        let metered = MeteredDetector::new(Some(Arc::new(FixedBackend::from_rows(&[]))));

        assert!(metered.detector.detect_bytes(b"not an image").is_err());

        assert_eq!(metered.counter("detector_requests_total"), 1);
        assert_eq!(metered.counter("detector_failures_total"), 1);
    }

    #[tokio::test]
    async fn test_async_call_without_model_counts_as_a_failed_request() {
        let metered = MeteredDetector::new(None);

        let result = Arc::clone(&metered.detector)
            .detect_async(test_image(4, 4))
            .await;

        assert_eq!(result, Err(DetectError::ModelNotLoaded));
        assert_eq!(metered.counter("detector_requests_total"), 1);
        assert_eq!(metered.counter("detector_failures_total"), 1);
    }
}
