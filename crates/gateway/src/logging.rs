use crate::config::Config;
use common::TelemetryGuard;

const SERVICE_NAME: &str = "sketch-gateway";

/// Set up logging, exporting traces and metrics when an OTLP endpoint is
/// configured. Keep the returned guard alive for the process lifetime.
pub fn setup_logging(config: &Config) -> anyhow::Result<Option<TelemetryGuard>> {
    match &config.otel_endpoint {
        Some(endpoint) => {
            let guard = TelemetryGuard::init(
                SERVICE_NAME,
                endpoint,
                config.log_level,
                config.environment,
            )?;
            tracing::info!(endpoint = %endpoint, "OpenTelemetry export enabled");
            Ok(Some(guard))
        }
        None => {
            common::setup_logging(config.log_level, config.environment);
            Ok(None)
        }
    }
}
