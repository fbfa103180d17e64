//! HTTP middleware for the API server.
//!
//! - Request ID generation and propagation
//! - Request logging with timing
//! - Security headers
//! - CORS configuration
//! - Request body size limits

use axum::{
    extract::Request,
    http::{header, HeaderName, HeaderValue, Method},
    middleware::Next,
    response::Response,
};
use std::time::{Duration, Instant};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{info, warn, Span};
use uuid::Uuid;

/// Request ID header name.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Environment variable selecting the deployment environment.
pub const ENVIRONMENT_ENV: &str = "TM_ENVIRONMENT";

/// Environment variable listing allowed CORS origins.
pub const CORS_ORIGINS_ENV: &str = "TM_CORS_ALLOWED_ORIGINS";

/// Default request body size limit (10 MB).
pub const DEFAULT_REQUEST_BODY_LIMIT: usize = 10 * 1024 * 1024;

/// Returns true when `TM_ENVIRONMENT` is `production` or `prod`.
pub fn is_production_environment() -> bool {
    std::env::var(ENVIRONMENT_ENV)
        .map(|v| matches!(v.to_ascii_lowercase().as_str(), "production" | "prod"))
        .unwrap_or(false)
}

/// Middleware to add request ID to requests and responses.
pub async fn request_id(mut request: Request, next: Next) -> Response {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(String::from)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    request
        .extensions_mut()
        .insert(RequestId(request_id.clone()));

    Span::current().record("request_id", &request_id);

    let mut response = next.run(request).await;

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }

    response
}

/// Request ID extension type.
#[derive(Clone, Debug)]
pub struct RequestId(pub String);

/// Middleware for request logging.
pub async fn request_logging(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let request_id = request
        .extensions()
        .get::<RequestId>()
        .map(|r| r.0.clone())
        .unwrap_or_else(|| "unknown".to_string());

    let response = next.run(request).await;

    let duration = start.elapsed();
    let status = response.status();

    if status.is_server_error() {
        warn!(
            request_id = %request_id,
            method = %method,
            uri = %uri,
            status = status.as_u16(),
            duration_ms = duration.as_millis() as u64,
            "Request completed with error"
        );
    } else {
        info!(
            request_id = %request_id,
            method = %method,
            uri = %uri,
            status = status.as_u16(),
            duration_ms = duration.as_millis() as u64,
            "Request completed"
        );
    }

    response
}

/// Creates a request body size limit layer of at least `min_bytes`.
pub fn request_body_limit_layer(min_bytes: usize) -> RequestBodyLimitLayer {
    RequestBodyLimitLayer::new(DEFAULT_REQUEST_BODY_LIMIT.max(min_bytes))
}

/// Creates the CORS layer.
///
/// Origins come from `allowed_origins`, then `TM_CORS_ALLOWED_ORIGINS`
/// (comma-separated). Without either, production allows no cross-origin
/// requests and development allows any origin. Credentials are only allowed
/// for an explicit origin list, since session cookies need them.
pub fn cors_layer_with_origins(allowed_origins: Option<&[String]>) -> CorsLayer {
    let origins: Vec<String> = match allowed_origins {
        Some(origins) if !origins.is_empty() => origins.to_vec(),
        _ => std::env::var(CORS_ORIGINS_ENV)
            .map(|v| {
                v.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default(),
    };

    let layer = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::ACCEPT,
            HeaderName::from_static("x-request-id"),
        ])
        .expose_headers([HeaderName::from_static("x-request-id")])
        .max_age(Duration::from_secs(3600));

    if !origins.is_empty() {
        let header_values: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|origin| match HeaderValue::from_str(origin) {
                Ok(value) => Some(value),
                Err(e) => {
                    warn!(origin = %origin, error = %e, "Invalid CORS origin, skipping");
                    None
                }
            })
            .collect();

        if header_values.is_empty() {
            warn!("No valid CORS origins configured, falling back to restrictive mode");
            return layer.allow_origin(AllowOrigin::predicate(|_, _| false));
        }

        info!(origins = ?origins, "CORS configured with allowed origins");
        layer
            .allow_origin(AllowOrigin::list(header_values))
            .allow_credentials(true)
    } else if is_production_environment() {
        info!("Production mode: CORS disabled (same-origin only)");
        layer.allow_origin(AllowOrigin::predicate(|_, _| false))
    } else {
        info!("Development mode: CORS allowing any origin");
        layer.allow_origin(AllowOrigin::any())
    }
}

/// Middleware to add security headers.
pub async fn security_headers(request: Request, next: Next) -> Response {
    let serves_upload = request.uri().path().starts_with("/uploads/");
    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers.insert(
        "referrer-policy",
        HeaderValue::from_static("strict-origin-when-cross-origin"),
    );

    // Uploaded photos are immutable and may be cached; API responses may not.
    if !serves_upload {
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    }

    if is_production_environment() {
        headers.insert(
            header::STRICT_TRANSPORT_SECURITY,
            HeaderValue::from_static("max-age=31536000; includeSubDomains"),
        );
    }

    response
}
