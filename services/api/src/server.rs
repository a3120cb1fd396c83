use crate::cli::ServeArgs;
use crate::infra::{AppState, TracingNotifications};
use crate::routes::with_platform_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;
use transit_hub::agencies::{AgencyRegistryService, InMemoryAgencyRepository};
use transit_hub::auth::JwtService;
use transit_hub::config::AppConfig;
use transit_hub::error::AppError;
use transit_hub::telemetry;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let agency_service = Arc::new(AgencyRegistryService::new(
        Arc::new(InMemoryAgencyRepository::default()),
        Arc::new(TracingNotifications),
        config.publishing.clone(),
    ));
    let tokens = Arc::new(JwtService::from_config(&config.auth));

    let app = with_platform_routes(agency_service, tokens)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        auto_publish = config.publishing.auto_publish,
        "transit hub ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
