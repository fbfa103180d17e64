//! API server implementation.

use axum::{middleware, Router};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::services::ServeDir;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tower_sessions::cookie::{time, SameSite};
use tower_sessions::{Expiry, MemoryStore, SessionManagerLayer};
use tracing::{error, info};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::dto::*;
use crate::error::ErrorResponse;
use crate::middleware::{
    cors_layer_with_origins, is_production_environment, request_body_limit_layer, request_id,
    request_logging, security_headers,
};
use crate::routes;
use crate::state::AppState;

/// Session cookie settings.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub cookie_name: String,
    /// Sessions end after this long without a request.
    pub inactivity_timeout: Duration,
    /// Send the cookie over HTTPS only. Defaults to on in production.
    pub secure: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: "temuan_session".to_string(),
            inactivity_timeout: Duration::from_secs(2 * 60 * 60),
            secure: is_production_environment(),
        }
    }
}

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiServerConfig {
    /// Address to bind to.
    pub bind_address: SocketAddr,
    /// Request timeout.
    pub request_timeout: Duration,
    /// Enable Swagger UI.
    pub enable_swagger: bool,
    /// Shutdown timeout for graceful shutdown.
    pub shutdown_timeout: Duration,
    /// Allowed CORS origins; empty falls back to `TM_CORS_ALLOWED_ORIGINS`.
    pub cors_origins: Vec<String>,
    pub session: SessionConfig,
}

impl Default for ApiServerConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([0, 0, 0, 0], 8080)),
            request_timeout: Duration::from_secs(30),
            enable_swagger: true,
            shutdown_timeout: Duration::from_secs(30),
            cors_origins: Vec::new(),
            session: SessionConfig::default(),
        }
    }
}

/// OpenAPI documentation.
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::routes::health::health_check,
        crate::routes::health::readiness_check,
        crate::routes::health::liveness_check,
        crate::routes::auth::register,
        crate::routes::auth::login,
        crate::routes::auth::logout,
        crate::routes::auth::me,
        crate::routes::auth::change_password,
        crate::routes::users::list_users,
        crate::routes::users::create_user,
        crate::routes::users::get_user,
        crate::routes::users::update_user,
        crate::routes::users::delete_user,
        crate::routes::users::reset_password,
        crate::routes::categories::list_categories,
        crate::routes::categories::get_category,
        crate::routes::categories::create_category,
        crate::routes::categories::update_category,
        crate::routes::categories::delete_category,
        crate::routes::items::list_items,
        crate::routes::items::get_item,
        crate::routes::items::create_item,
        crate::routes::items::update_item,
        crate::routes::items::delete_item,
        crate::routes::items::hand_over_item,
        crate::routes::claims::create_claim,
        crate::routes::claims::my_claims,
        crate::routes::claims::list_claims,
        crate::routes::claims::get_claim,
        crate::routes::claims::cancel_claim,
        crate::routes::claims::approve_claim,
        crate::routes::claims::reject_claim,
        crate::routes::dashboard::admin_dashboard,
        crate::routes::dashboard::officer_dashboard,
        crate::routes::dashboard::user_dashboard,
        crate::routes::uploads::upload_file,
        crate::routes::uploads::delete_file,
        crate::routes::metrics::prometheus_metrics,
        crate::routes::metrics::json_metrics,
    ),
    components(
        schemas(
            HealthResponse,
            DatabaseHealth,
            UserResponse,
            CategoryResponse,
            ItemResponse,
            ItemListResponse,
            PaginationInfo,
            ClaimResponse,
            UploadResponse,
            crate::routes::auth::RegisterRequest,
            crate::routes::auth::LoginRequest,
            crate::routes::auth::ChangePasswordRequest,
            crate::routes::users::CreateUserRequest,
            crate::routes::users::UpdateUserRequest,
            crate::routes::users::ResetPasswordRequest,
            crate::routes::categories::CreateCategoryRequest,
            crate::routes::categories::UpdateCategoryRequest,
            crate::routes::items::CreateItemRequest,
            crate::routes::items::UpdateItemRequest,
            crate::routes::items::HandOverRequest,
            crate::routes::claims::CreateClaimRequest,
            crate::routes::claims::ApproveClaimRequest,
            crate::routes::claims::RejectClaimRequest,
            ErrorResponse,
        )
    ),
    tags(
        (name = "Health", description = "Health check endpoints"),
        (name = "Auth", description = "Registration, login and sessions"),
        (name = "Users", description = "Account administration"),
        (name = "Categories", description = "Item categories"),
        (name = "Items", description = "Found items and handover"),
        (name = "Claims", description = "Ownership claims and review"),
        (name = "Dashboard", description = "Role dashboards"),
        (name = "Uploads", description = "Photo uploads"),
        (name = "Metrics", description = "System metrics"),
    ),
    info(
        title = "Temuan API",
        version = "0.1.0",
        description = "Campus lost-and-found service",
        license(name = "MIT"),
    )
)]
pub struct ApiDoc;

/// API server.
pub struct ApiServer {
    config: ApiServerConfig,
    state: AppState,
}

impl ApiServer {
    /// Creates a new API server.
    pub fn new(state: AppState, config: ApiServerConfig) -> Self {
        Self { config, state }
    }

    /// Creates a new API server with default configuration.
    pub fn with_state(state: AppState) -> Self {
        Self::new(state, ApiServerConfig::default())
    }

    fn session_layer(&self) -> SessionManagerLayer<MemoryStore> {
        let session = &self.config.session;
        let inactivity = time::Duration::seconds(
            i64::try_from(session.inactivity_timeout.as_secs()).unwrap_or(i64::MAX),
        );

        SessionManagerLayer::new(MemoryStore::default())
            .with_name(session.cookie_name.clone())
            .with_secure(session.secure)
            .with_http_only(true)
            .with_same_site(SameSite::Lax)
            .with_expiry(Expiry::OnInactivity(inactivity))
    }

    /// Builds the router.
    pub fn router(&self) -> Router {
        routes::health::init_start_time();

        let mut app = routes::create_router(self.state.clone());

        if self.config.enable_swagger {
            app = app.merge(
                SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()),
            );
        }

        // Stored photos
        app = app.nest_service("/uploads", ServeDir::new(self.state.storage.upload_dir()));

        let cors_origins =
            (!self.config.cors_origins.is_empty()).then_some(self.config.cors_origins.as_slice());

        // Order matters: innermost first
        app.layer(self.session_layer())
            .layer(middleware::from_fn(security_headers))
            .layer(middleware::from_fn(request_logging))
            .layer(middleware::from_fn(request_id))
            .layer(request_body_limit_layer(self.state.storage.max_upload_bytes() * 2))
            .layer(TimeoutLayer::new(self.config.request_timeout))
            .layer(TraceLayer::new_for_http())
            .layer(cors_layer_with_origins(cors_origins))
            .layer(CatchPanicLayer::new())
    }

    /// Runs the server until Ctrl+C or SIGTERM.
    pub async fn run(self) -> Result<(), std::io::Error> {
        self.run_until(shutdown_signal()).await
    }

    /// Runs the server with a custom shutdown signal.
    pub async fn run_until<F>(self, shutdown: F) -> Result<(), std::io::Error>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let app = self.router();
        let addr = self.config.bind_address;

        info!("Starting API server on {}", addr);

        let listener = TcpListener::bind(addr).await?;

        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown)
        .await?;

        info!("API server shut down gracefully");
        Ok(())
    }
}

/// Default shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{header, Method, StatusCode};
    use tower::ServiceExt;

    use crate::test_helpers::{empty_request, TestContext};

    #[tokio::test]
    async fn test_router_serves_health_and_docs() {
        let ctx = TestContext::new().await;
        let router = ApiServer::with_state(ctx.state.clone()).router();

        let response = router
            .clone()
            .oneshot(empty_request(Method::GET, "/health"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
        assert_eq!(response.headers()[header::X_FRAME_OPTIONS], "DENY");

        let response = router
            .oneshot(empty_request(Method::GET, "/api-docs/openapi.json"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_router_serves_uploaded_files() {
        let ctx = TestContext::new().await;
        let stored = ctx.state.storage.save("foto.jpg", b"jpeg-bytes").await.unwrap();
        let router = ApiServer::with_state(ctx.state.clone()).router();

        let response = router
            .oneshot(empty_request(
                Method::GET,
                &format!("/uploads/{}", stored.filename),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(!response.headers().contains_key(header::CACHE_CONTROL));
    }

    #[tokio::test]
    async fn test_router_rejects_anonymous_api_calls() {
        let ctx = TestContext::new().await;
        let router = ApiServer::with_state(ctx.state.clone()).router();

        let response = router
            .oneshot(empty_request(Method::GET, "/api/items"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_openapi_lists_item_routes() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/api/items"));
        assert!(doc.paths.paths.contains_key("/api/claims/{id}/approve"));
    }
}
