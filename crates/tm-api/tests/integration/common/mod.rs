//! Common test utilities for integration tests.

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    response::Response,
    Router,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use tempfile::TempDir;
use tm_api::{ApiServer, ApiServerConfig, AppState};
use tm_core::db::{
    create_pool_with_options, create_user_repository, run_migrations, seed_categories, PoolOptions,
};
use tm_core::{hash_password, Role, StorageConfig, StorageService, User};
use tower::ServiceExt;
use uuid::Uuid;

/// Password of every account created by [`TestApp::create_user`].
pub const PASSWORD: &str = "Rahasia123";

/// A full application over an isolated database and upload directory.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    _upload_dir: TempDir,
}

impl TestApp {
    pub async fn new() -> Self {
        let db_url = format!(
            "sqlite:file:integration_test_{}?mode=memory&cache=shared",
            Uuid::new_v4().simple()
        );
        let pool = create_pool_with_options(
            &db_url,
            PoolOptions {
                max_connections: 1,
                min_connections: 1,
                acquire_timeout: Duration::from_secs(5),
                max_lifetime: None,
                idle_timeout: None,
            },
        )
        .await
        .expect("Failed to create pool");
        run_migrations(&pool).await.expect("Failed to run migrations");
        seed_categories(&pool).await.expect("Failed to seed categories");

        let upload_dir = TempDir::new().expect("Failed to create upload dir");
        let storage = StorageService::new(StorageConfig {
            upload_dir: upload_dir.path().to_path_buf(),
            ..Default::default()
        });

        let state = AppState::new(pool, storage);
        let router = ApiServer::new(state.clone(), ApiServerConfig::default()).router();

        Self {
            router,
            state,
            _upload_dir: upload_dir,
        }
    }

    /// Stores an enabled account with [`PASSWORD`].
    pub async fn create_user(&self, username: &str, role: Role) -> User {
        let user = User::new(
            format!("{}@kampus.ac.id", username),
            username,
            hash_password(PASSWORD).expect("hash"),
            role,
            format!("Pengguna {}", username),
        );
        create_user_repository(&self.state.db)
            .create(&user)
            .await
            .expect("Failed to create user")
    }

    /// Sends a request and returns the raw response.
    pub async fn send(&self, request: Request<Body>) -> Response {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible")
    }

    /// Sends a request with an optional JSON body and session cookie.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        cookie: Option<&str>,
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("valid request");
        self.send(request).await
    }

    /// Logs in and returns the session cookie.
    pub async fn login(&self, login: &str) -> String {
        let response = self
            .request(
                Method::POST,
                "/api/auth/login",
                Some(serde_json::json!({ "login": login, "password": PASSWORD })),
                None,
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK, "login as {}", login);
        session_cookie(&response)
    }
}

/// Extracts `name=value` from the response's Set-Cookie header.
pub fn session_cookie(response: &Response) -> String {
    response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(str::to_string)
        .expect("response sets a session cookie")
}

/// Reads a JSON response body.
pub async fn read_json<T: DeserializeOwned>(response: Response) -> T {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read body");
    serde_json::from_slice(&body).expect("Failed to parse response body")
}
