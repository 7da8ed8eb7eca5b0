use crate::channel::DEFAULT_BUFFER;
use common::{Environment, LogLevel};
use detector::DetectorConfig;
use std::env;

pub const DEFAULT_CHANNEL_NAME: &str = "com.example.ppe_detection/coreml";
pub const DEFAULT_MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct ChannelConfig {
    pub environment: Environment,
    pub log_level: LogLevel,
    pub otel_endpoint: Option<String>,
    pub bind_addr: String,
    pub channel_name: String,
    pub channel_buffer: usize,
    pub max_body_bytes: usize,
    pub detector: DetectorConfig,
}

impl ChannelConfig {
    /// Load configuration from environment variables with sensible defaults
    pub fn from_env() -> anyhow::Result<Self> {
        let environment = Environment::from_env();
        let log_level = LogLevel::from_env();

        let otel_endpoint = env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
            .ok()
            .filter(|s| !s.is_empty());

        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());

        let channel_name =
            env::var("CHANNEL_NAME").unwrap_or_else(|_| DEFAULT_CHANNEL_NAME.to_string());

        let channel_buffer = env::var("CHANNEL_BUFFER")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_BUFFER);

        let max_body_bytes = env::var("MAX_BODY_BYTES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_MAX_BODY_BYTES);

        Ok(Self {
            environment,
            log_level,
            otel_endpoint,
            bind_addr,
            channel_name,
            channel_buffer,
            max_body_bytes,
            detector: DetectorConfig::from_env()?,
        })
    }
}
