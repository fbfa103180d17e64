//! Metrics endpoints.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use tm_observability::MetricsSnapshot;

use crate::auth::RequireAdmin;
use crate::state::AppState;

/// Creates metrics routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/metrics", get(prometheus_metrics))
        .route("/api/metrics", get(json_metrics))
}

/// Prometheus metrics endpoint.
#[utoipa::path(
    get,
    path = "/metrics",
    responses(
        (status = 200, description = "Prometheus metrics", content_type = "text/plain"),
        (status = 503, description = "Recorder not installed")
    ),
    tag = "Metrics"
)]
pub async fn prometheus_metrics(State(state): State<AppState>) -> impl IntoResponse {
    match &state.prometheus_handle {
        Some(handle) => (
            StatusCode::OK,
            [(
                header::CONTENT_TYPE,
                "text/plain; version=0.0.4; charset=utf-8",
            )],
            handle.render(),
        ),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            "Prometheus metrics not initialized".to_string(),
        ),
    }
}

/// Domain totals since the server started, for administrators.
#[utoipa::path(
    get,
    path = "/api/metrics",
    responses(
        (status = 200, description = "Totals since start"),
        (status = 403, description = "Admin access required", body = crate::error::ErrorResponse)
    ),
    tag = "Metrics"
)]
pub async fn json_metrics(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
) -> Json<MetricsSnapshot> {
    Json(state.metrics.snapshot())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Method;
    use metrics_exporter_prometheus::PrometheusBuilder;
    use tower::ServiceExt;

    use crate::auth::test_helpers::TestUser;
    use crate::test_helpers::{empty_request, read_json, TestContext};

    #[tokio::test]
    async fn test_prometheus_without_recorder() {
        let ctx = TestContext::new().await;
        let app = ctx.app(routes(), None);

        let response = app
            .oneshot(empty_request(Method::GET, "/metrics"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_prometheus_with_handle() {
        let mut ctx = TestContext::new().await;
        let recorder = PrometheusBuilder::new().build_recorder();
        ctx.state = ctx.state.clone().with_prometheus_handle(recorder.handle());
        let app = ctx.app(routes(), None);

        let response = app
            .oneshot(empty_request(Method::GET, "/metrics"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers()[header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("text/plain"));
    }

    #[tokio::test]
    async fn test_json_metrics() {
        let ctx = TestContext::new().await;
        ctx.state.metrics.record_claim_submitted();
        let admin = TestUser::admin(&ctx.state.db).await;
        let app = ctx.app(routes(), Some(admin));

        let response = app
            .oneshot(empty_request(Method::GET, "/api/metrics"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body: serde_json::Value = read_json(response).await;
        assert_eq!(body["claims_submitted"], 1);
    }
}
