use channel::{
    ChannelConfig, MethodChannel, PpeMethodHandler,
    server::{AppState, router, run_server},
};
use common::TelemetryGuard;
use detector::Detector;
use std::sync::Arc;

#[cfg(feature = "ort-backend")]
use detector::backend::ort::OrtBackend as Backend;

#[cfg(not(feature = "ort-backend"))]
compile_error!("The 'ort-backend' feature must be enabled to build the bridge binary");

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ChannelConfig::from_env()?;

    let _telemetry = TelemetryGuard::init_or_logging(
        "ppe-bridge",
        config.otel_endpoint.as_deref(),
        config.log_level,
        config.environment,
    )?;

    tracing::info!(
        config = ?config,
        "Loaded configuration"
    );

    let detector = Arc::new(Detector::<Backend>::load(&config.detector)?);
    if !detector.is_model_loaded() {
        tracing::warn!("Serving without a model; detection calls will report an error");
    }

    let handler = PpeMethodHandler::new(detector, &config.detector);
    let client = MethodChannel::spawn(config.channel_name.clone(), handler, config.channel_buffer);

    let app = router(AppState::new([client]), config.max_body_bytes);
    run_server(&config.bind_addr, app).await
}
