//! API routes.

pub mod auth;
pub mod categories;
pub mod claims;
pub mod dashboard;
pub mod health;
pub mod items;
pub mod metrics;
pub mod uploads;
pub mod users;

use crate::state::AppState;
use axum::Router;

/// Creates the main API router.
pub fn create_router(state: AppState) -> Router {
    let max_upload_bytes = state.storage.max_upload_bytes();

    Router::new()
        .nest("/api", api_routes(max_upload_bytes))
        .merge(health::routes())
        .merge(metrics::routes())
        .with_state(state)
}

/// API routes under the /api prefix.
fn api_routes(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .nest("/auth", auth::routes())
        .nest("/admin/users", users::routes())
        .nest("/categories", categories::routes())
        .nest("/items", items::routes())
        .nest("/claims", claims::routes())
        .nest("/dashboard", dashboard::routes())
        .nest("/uploads", uploads::routes(max_upload_bytes))
}
