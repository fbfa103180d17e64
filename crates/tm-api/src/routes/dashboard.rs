//! Role dashboards.

use axum::{extract::State, routing::get, Json, Router};
use tm_core::{AdminDashboard, OfficerDashboard, UserDashboard};

use crate::auth::{AuthenticatedUser, RequireAdmin, RequireOfficer};
use crate::error::ApiError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/admin", get(admin_dashboard))
        .route("/officer", get(officer_dashboard))
        .route("/user", get(user_dashboard))
}

/// Institution-wide totals, period counts, popular categories and the
/// latest recorded items.
#[utoipa::path(
    get,
    path = "/api/dashboard/admin",
    responses(
        (status = 200, description = "Admin dashboard"),
        (status = 403, description = "Admin access required", body = crate::error::ErrorResponse)
    ),
    tag = "Dashboard"
)]
pub async fn admin_dashboard(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
) -> Result<Json<AdminDashboard>, ApiError> {
    Ok(Json(state.dashboard.admin().await?))
}

/// The calling officer's recording and handover activity.
#[utoipa::path(
    get,
    path = "/api/dashboard/officer",
    responses(
        (status = 200, description = "Officer dashboard"),
        (status = 403, description = "Officer access required", body = crate::error::ErrorResponse)
    ),
    tag = "Dashboard"
)]
pub async fn officer_dashboard(
    State(state): State<AppState>,
    RequireOfficer(officer): RequireOfficer,
) -> Result<Json<OfficerDashboard>, ApiError> {
    Ok(Json(state.dashboard.officer(officer.id).await?))
}

/// The caller's claims and the latest unclaimed items.
#[utoipa::path(
    get,
    path = "/api/dashboard/user",
    responses((status = 200, description = "User dashboard")),
    tag = "Dashboard"
)]
pub async fn user_dashboard(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<Json<UserDashboard>, ApiError> {
    Ok(Json(state.dashboard.user(user.id).await?))
}
