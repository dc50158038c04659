use common::{TelemetryGuard, TelemetryOptions, setup_logging};
use gateway::{
    api::{self, AppState, ModelMetadata},
    build_predictor,
    config::get_configuration,
};
use inference::backend::ort::OrtBackend;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = get_configuration()?;

    let _telemetry = match &settings.server.otel_endpoint {
        Some(endpoint) => Some(TelemetryGuard::init(&TelemetryOptions {
            service_name: "litter-gateway",
            endpoint,
            environment: settings.server.environment,
            log_level: settings.server.log_level,
        })?),
        None => {
            setup_logging(settings.server.environment, settings.server.log_level);
            None
        }
    };

    tracing::info!(config = ?settings, "Loaded configuration");

    let predictor = Arc::new(build_predictor::<OrtBackend>(&settings)?);
    predictor.provider().warm()?;

    let state = Arc::new(AppState {
        predictor,
        metadata: ModelMetadata::from_package(),
    });
    let app = api::router(state, settings.server.max_upload_bytes);

    let listener = tokio::net::TcpListener::bind(&settings.server.bind_addr).await?;
    tracing::info!("Model API listening on {}", settings.server.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
