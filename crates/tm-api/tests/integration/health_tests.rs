//! Health, docs and fallback behaviour of the public router.

use axum::http::{Method, StatusCode};
use serde_json::Value;

use super::common::{read_json, TestApp};

#[tokio::test]
async fn test_health_endpoints() {
    let app = TestApp::new().await;

    let response = app.request(Method::GET, "/health", None, None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = read_json(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["database"]["connected"], true);

    for uri in ["/ready", "/live"] {
        let response = app.request(Method::GET, uri, None, None).await;
        assert_eq!(response.status(), StatusCode::OK, "{}", uri);
    }
}

#[tokio::test]
async fn test_ready_fails_when_database_closed() {
    let app = TestApp::new().await;
    app.state.db.close().await;

    let response = app.request(Method::GET, "/ready", None, None).await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let response = app.request(Method::GET, "/live", None, None).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_openapi_document() {
    let app = TestApp::new().await;

    let response = app
        .request(Method::GET, "/api-docs/openapi.json", None, None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let doc: Value = read_json(response).await;
    assert_eq!(doc["info"]["title"], "Temuan API");
    assert!(doc["paths"]["/api/items/{id}/handover"].is_object());
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let app = TestApp::new().await;

    let response = app
        .request(Method::GET, "/api/tidak-ada", None, None)
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_request_id_is_echoed() {
    let app = TestApp::new().await;

    let request = axum::http::Request::builder()
        .uri("/live")
        .header("x-request-id", "req-42")
        .body(axum::body::Body::empty())
        .unwrap();
    let response = app.send(request).await;
    assert_eq!(response.headers()["x-request-id"], "req-42");
}
