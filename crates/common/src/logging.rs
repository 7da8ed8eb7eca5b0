use crate::config::{Environment, LogLevel};
use tracing_subscriber::{
    EnvFilter, Layer, Registry, layer::Layered, layer::SubscriberExt, util::SubscriberInitExt,
};

/// `RUST_LOG` wins when set; otherwise the configured level applies.
fn env_filter(log_level: LogLevel) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level.as_str()))
}

/// Installs the global subscriber: filter, the given OpenTelemetry layer, and
/// JSON output in production or pretty output in development.
pub(crate) fn init_subscriber<L>(otel_layer: L, log_level: LogLevel, environment: Environment)
where
    L: Layer<Layered<EnvFilter, Registry>> + Send + Sync + 'static,
{
    let registry = tracing_subscriber::registry()
        .with(env_filter(log_level))
        .with(otel_layer);

    match environment {
        Environment::Production => {
            registry
                .with(tracing_subscriber::fmt::layer().json().with_level(true))
                .init();
        }
        Environment::Development => {
            registry
                .with(tracing_subscriber::fmt::layer().pretty().with_ansi(true))
                .init();
        }
    }
}

/// Initialize tracing subscriber with pretty formatting for development
/// and JSON formatting for production.
///
/// Also adds an OpenTelemetry layer that exports traces if a global tracer provider
/// has been initialized. Prefer [`crate::TelemetryGuard::init_or_logging`] in binaries.
pub fn setup_logging(log_level: LogLevel, environment: Environment) {
    init_subscriber(tracing_opentelemetry::layer(), log_level, environment);
}
