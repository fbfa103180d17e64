//! Axum extractors for authentication and authorization.

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use tm_core::{db::create_user_repository, Role, User};
use tower_sessions::Session;
use tracing::{debug, warn};

use crate::error::ApiError;
use crate::state::AppState;

use super::get_session_data;

/// Extractor for authenticated users.
///
/// Loads the user named in the session. Returns 401 without a valid
/// session and 403 when the account has been disabled.
///
/// ```ignore
/// async fn me(AuthenticatedUser(user): AuthenticatedUser) -> impl IntoResponse {
///     format!("Hello, {}!", user.full_name)
/// }
/// ```
pub struct AuthenticatedUser(pub User);

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        #[cfg(test)]
        {
            if let Some(test_user) = parts.extensions.get::<super::test_helpers::TestUser>() {
                return Ok(AuthenticatedUser(test_user.0.clone()));
            }
        }

        let app_state = AppState::from_ref(state);

        let session = Session::from_request_parts(parts, state)
            .await
            .map_err(|_| ApiError::Unauthorized("Authentication required".to_string()))?;
        let session_data = get_session_data(&session)
            .await
            .ok_or_else(|| ApiError::Unauthorized("Authentication required".to_string()))?;

        let user = create_user_repository(&app_state.db)
            .get(session_data.user_id)
            .await?;
        let Some(user) = user else {
            debug!(user_id = %session_data.user_id, "Session refers to a deleted user");
            return Err(ApiError::Unauthorized("Session expired".to_string()));
        };

        if !user.enabled {
            warn!(user_id = %user.id, "Disabled account used an existing session");
            return Err(ApiError::AccountDisabled);
        }

        Ok(AuthenticatedUser(user))
    }
}

/// Extractor that requires the officer (PETUGAS) role or higher.
pub struct RequireOfficer(pub User);

#[async_trait]
impl<S> FromRequestParts<S> for RequireOfficer
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let AuthenticatedUser(user) = AuthenticatedUser::from_request_parts(parts, state).await?;

        if !user.has_permission(Role::Officer) {
            return Err(ApiError::Forbidden("Officer access required".to_string()));
        }

        Ok(RequireOfficer(user))
    }
}

/// Extractor that requires the admin role.
pub struct RequireAdmin(pub User);

#[async_trait]
impl<S> FromRequestParts<S> for RequireAdmin
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let AuthenticatedUser(user) = AuthenticatedUser::from_request_parts(parts, state).await?;

        if !user.has_permission(Role::Admin) {
            return Err(ApiError::Forbidden("Admin access required".to_string()));
        }

        Ok(RequireAdmin(user))
    }
}
