use classifier::ClassifierConfig;
use common::{Environment, LogLevel};
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub log_level: LogLevel,
    pub environment: Environment,
    pub host: String,
    pub port: u16,
    /// Upper bound on one classification, model loading included.
    pub request_timeout_ms: u64,
    /// OTLP collector; telemetry export is off when unset.
    pub otel_endpoint: Option<String>,
    #[serde(default)]
    pub classifier: ClassifierConfig,
}

impl Config {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Defaults overlaid with `SKETCH_*` environment variables.
///
/// Nested keys use `__`, e.g. `SKETCH_CLASSIFIER__WEIGHTS_DIR=/srv/models`.
pub fn get_configuration() -> Result<Config, config::ConfigError> {
    let config = config::Config::builder()
        .set_default("log_level", "info")?
        .set_default("environment", "development")?
        .set_default("host", "0.0.0.0")?
        .set_default("port", 5000)?
        .set_default("request_timeout_ms", 5000)?
        .add_source(
            config::Environment::with_prefix("SKETCH")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    let config: Config = config.try_deserialize::<Config>()?;

    Ok(config)
}
