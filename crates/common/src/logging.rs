use crate::config::{Environment, LogLevel};
use tracing::Subscriber;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

/// Console-only logging for the classifier service.
///
/// `RUST_LOG` wins over `level`. Spans still reach an OTLP collector when a
/// global tracer provider is installed; the gateway installs one through
/// [`crate::TelemetryGuard`] when an endpoint is configured.
pub fn setup_logging(level: LogLevel, environment: Environment) {
    tracing_subscriber::registry()
        .with(env_filter(level))
        .with(tracing_opentelemetry::layer())
        .with(console_layer(environment))
        .init();
}

/// JSON lines in production, coloured multi-line output in development.
pub(crate) fn console_layer<S>(environment: Environment) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    match environment {
        Environment::Production => tracing_subscriber::fmt::layer()
            .json()
            .with_level(true)
            .boxed(),
        Environment::Development => tracing_subscriber::fmt::layer()
            .pretty()
            .with_ansi(true)
            .boxed(),
    }
}

pub(crate) fn env_filter(level: LogLevel) -> EnvFilter {
    filter_from(std::env::var("RUST_LOG").ok().as_deref(), level)
}

/// Unset or unparsable directives fall back to the configured level.
fn filter_from(directives: Option<&str>, level: LogLevel) -> EnvFilter {
    directives
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new(level.as_str()))
}
