use crate::{
    Environment, LogLevel,
    logging::{env_filter, fmt_layer},
};
use opentelemetry::{KeyValue, global};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{
    Resource,
    metrics::{PeriodicReader, SdkMeterProvider},
    propagation::TraceContextPropagator,
    trace::{Sampler, SdkTracerProvider},
};
use opentelemetry_semantic_conventions::attribute::{SERVICE_NAME, SERVICE_VERSION};
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const METRIC_EXPORT_INTERVAL: Duration = Duration::from_secs(15);

/// Where and how the model service reports spans and metrics.
#[derive(Debug, Clone)]
pub struct TelemetryOptions<'a> {
    pub service_name: &'a str,
    /// OTLP gRPC collector, e.g. `http://localhost:4317`
    pub endpoint: &'a str,
    pub environment: Environment,
    pub log_level: LogLevel,
}

/// Keeps the OTLP span and metric pipelines alive; both are flushed on drop.
///
/// ```ignore
/// let _telemetry = TelemetryGuard::init(&TelemetryOptions {
///     service_name: "litter-gateway",
///     endpoint: "http://localhost:4317",
///     environment: Environment::Production,
///     log_level: LogLevel::Info,
/// })?;
/// ```
pub struct TelemetryGuard {
    tracer_provider: SdkTracerProvider,
    meter_provider: SdkMeterProvider,
}

impl TelemetryGuard {
    /// Installs the global tracer and meter providers and a subscriber that
    /// forwards `tracing` spans to the collector next to the console output.
    pub fn init(options: &TelemetryOptions<'_>) -> anyhow::Result<Self> {
        global::set_text_map_propagator(TraceContextPropagator::new());

        let resource = service_resource(options);
        let tracer_provider = tracer_provider(options.endpoint, resource.clone())?;
        let meter_provider = meter_provider(options.endpoint, resource)?;

        global::set_tracer_provider(tracer_provider.clone());
        global::set_meter_provider(meter_provider.clone());

        let otel_layer = tracing_opentelemetry::layer()
            .with_tracer(global::tracer(options.service_name.to_string()));

        tracing_subscriber::registry()
            .with(env_filter(options.log_level))
            .with(fmt_layer(options.environment))
            .with(otel_layer)
            .try_init()?;

        Ok(Self {
            tracer_provider,
            meter_provider,
        })
    }
}

fn service_resource(options: &TelemetryOptions<'_>) -> Resource {
    Resource::builder()
        .with_attributes([
            KeyValue::new(SERVICE_NAME, options.service_name.to_string()),
            KeyValue::new(SERVICE_VERSION, env!("CARGO_PKG_VERSION")),
            KeyValue::new("deployment.environment.name", options.environment.as_str()),
        ])
        .build()
}

fn tracer_provider(endpoint: &str, resource: Resource) -> anyhow::Result<SdkTracerProvider> {
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()?;

    Ok(SdkTracerProvider::builder()
        .with_resource(resource)
        .with_sampler(Sampler::ParentBased(Box::new(Sampler::AlwaysOn)))
        .with_batch_exporter(exporter)
        .build())
}

fn meter_provider(endpoint: &str, resource: Resource) -> anyhow::Result<SdkMeterProvider> {
    let exporter = opentelemetry_otlp::MetricExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()?;

    let reader = PeriodicReader::builder(exporter)
        .with_interval(METRIC_EXPORT_INTERVAL)
        .build();

    Ok(SdkMeterProvider::builder()
        .with_resource(resource)
        .with_reader(reader)
        .build())
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        if let Err(e) = self.tracer_provider.shutdown() {
            eprintln!("Failed to flush spans: {e:?}");
        }
        if let Err(e) = self.meter_provider.shutdown() {
            eprintln!("Failed to flush metrics: {e:?}");
        }
    }
}

/// Enters an info-level span for the rest of the enclosing scope.
#[macro_export]
macro_rules! span {
    ($name:literal) => {
        tracing::info_span!($name).entered()
    };
    ($name:literal, $($field:tt)+) => {
        tracing::info_span!($name, $($field)+).entered()
    };
}
