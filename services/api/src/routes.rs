use crate::infra::AppState;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use serde_json::json;
use std::sync::Arc;
use transit_hub::agencies::{
    agency_router, AgencyRegistryService, AgencyRepository, NotificationPublisher,
};
use transit_hub::auth::JwtService;

pub(crate) fn with_platform_routes<R, N>(
    service: Arc<AgencyRegistryService<R, N>>,
    tokens: Arc<JwtService>,
) -> axum::Router
where
    R: AgencyRepository + 'static,
    N: NotificationPublisher + 'static,
{
    agency_router(service, tokens)
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::TracingNotifications;
    use axum::body::Body;
    use axum::http::Request;
    use metrics_exporter_prometheus::PrometheusBuilder;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tower::ServiceExt;
    use transit_hub::agencies::InMemoryAgencyRepository;
    use transit_hub::config::PublishingConfig;

    fn app_state() -> AppState {
        AppState {
            readiness: Arc::new(AtomicBool::new(false)),
            metrics: Arc::new(PrometheusBuilder::new().build_recorder().handle()),
        }
    }

    fn platform_router(state: AppState) -> axum::Router {
        let service = Arc::new(AgencyRegistryService::new(
            Arc::new(InMemoryAgencyRepository::default()),
            Arc::new(TracingNotifications),
            PublishingConfig::default(),
        ));
        let tokens = Arc::new(JwtService::new("routes-secret", "transit-hub", 1));
        with_platform_routes(service, tokens).layer(Extension(state))
    }

    async fn get(router: axum::Router, uri: &str) -> axum::response::Response {
        router
            .oneshot(Request::get(uri).body(Body::empty()).expect("request"))
            .await
            .expect("router responds")
    }

    #[tokio::test]
    async fn readiness_tracks_startup_flag() {
        let state = app_state();
        let router = platform_router(state.clone());

        let response = get(router.clone(), "/ready").await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        state.readiness.store(true, Ordering::Release);
        let response = get(router, "/ready").await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn health_and_metrics_are_served_next_to_agency_routes() {
        let router = platform_router(app_state());

        assert_eq!(get(router.clone(), "/health").await.status(), StatusCode::OK);

        let response = get(router.clone(), "/metrics").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/plain; version=0.0.4"
        );

        let response = get(router, "/api/v1/agencies?published_only=true").await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
            .await
            .expect("body");
        assert_eq!(body.as_ref(), b"[]");
    }
}
