//! Shared test helpers for the tm-api crate.
//!
//! ```ignore
//! let ctx = TestContext::new().await;
//! let officer = TestUser::officer(&ctx.state.db).await;
//! let app = ctx.app(items::routes(), Some(officer));
//! ```

use axum::{
    body::Body,
    http::{header, Method, Request},
    middleware,
    response::Response,
    Router,
};
use chrono::{Duration, Utc};
use serde::de::DeserializeOwned;
use std::time::Duration as StdDuration;
use tempfile::TempDir;
use tm_core::db::{
    create_category_repository, create_item_repository, create_pool_with_options, run_migrations,
    PoolOptions,
};
use tm_core::{Category, FoundItem, NewItem, StorageConfig, StorageService, User};
use uuid::Uuid;

use crate::auth::test_helpers::{inject_test_user, TestUser};
use crate::state::AppState;

/// An isolated database and upload directory.
pub struct TestContext {
    pub state: AppState,
    pub upload_dir: TempDir,
}

impl TestContext {
    /// Creates a migrated in-memory SQLite database and a temporary upload
    /// directory.
    pub async fn new() -> Self {
        let db_url = format!(
            "sqlite:file:test_api_{}?mode=memory&cache=shared",
            Uuid::new_v4().simple()
        );
        let options = PoolOptions {
            max_connections: 1,
            min_connections: 1,
            acquire_timeout: StdDuration::from_secs(5),
            max_lifetime: None,
            idle_timeout: None,
        };
        let pool = create_pool_with_options(&db_url, options)
            .await
            .expect("Failed to create pool");
        run_migrations(&pool).await.expect("Failed to run migrations");

        let upload_dir = TempDir::new().expect("Failed to create upload dir");
        let storage = StorageService::new(StorageConfig {
            upload_dir: upload_dir.path().to_path_buf(),
            ..Default::default()
        });

        Self {
            state: AppState::new(pool, storage),
            upload_dir,
        }
    }

    /// Mounts `routes` with this state, acting as `user` when given.
    pub fn app(&self, routes: Router<AppState>, user: Option<TestUser>) -> Router {
        let router = routes.with_state(self.state.clone());
        match user {
            Some(user) => router.layer(middleware::from_fn_with_state(user, inject_test_user)),
            None => router,
        }
    }
}

/// Builds a JSON request.
pub fn json_request(method: Method, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Builds a request without a body.
pub fn empty_request(method: Method, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

/// Reads a JSON response body.
pub async fn read_json<T: DeserializeOwned>(response: Response) -> T {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).expect("Failed to parse response body")
}

pub async fn create_test_category(state: &AppState, name: &str) -> Category {
    create_category_repository(&state.db)
        .create(&Category::new(name, None))
        .await
        .expect("Failed to create category")
}

/// Records an unclaimed item found `hours_ago`.
pub async fn create_test_item(
    state: &AppState,
    name: &str,
    category: &Category,
    officer: &User,
    hours_ago: i64,
) -> FoundItem {
    let item = FoundItem::new(
        NewItem {
            name: name.to_string(),
            description: None,
            category_id: category.id,
            found_location: "Perpustakaan".to_string(),
            found_at: Utc::now() - Duration::hours(hours_ago),
            photo: None,
        },
        officer.id,
    );
    create_item_repository(&state.db)
        .create(&item)
        .await
        .expect("Failed to create item")
}
