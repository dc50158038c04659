use crate::config::{Environment, LogLevel};
use tracing::Subscriber;
use tracing_subscriber::{
    EnvFilter, Layer, layer::SubscriberExt, registry::LookupSpan, util::SubscriberInitExt,
};

/// `RUST_LOG` wins over the configured level when it is set.
pub(crate) fn env_filter(log_level: LogLevel) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level.as_str()))
}

/// JSON lines in production, human readable output everywhere else.
pub(crate) fn fmt_layer<S>(environment: Environment) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    match environment {
        Environment::Production => tracing_subscriber::fmt::layer()
            .json()
            .with_level(true)
            .with_current_span(true)
            .boxed(),
        Environment::Development => tracing_subscriber::fmt::layer()
            .pretty()
            .with_ansi(true)
            .boxed(),
    }
}

/// Installs the global subscriber without any OpenTelemetry export.
///
/// Calling it twice keeps the first subscriber, which is what the test
/// binaries and the command line tool rely on.
pub fn setup_logging(environment: Environment, log_level: LogLevel) {
    let result = tracing_subscriber::registry()
        .with(env_filter(log_level))
        .with(fmt_layer(environment))
        .try_init();

    if let Err(e) = result {
        eprintln!("Logging already initialized: {e}");
    }
}
