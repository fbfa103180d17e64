//! Registration, login and session endpoints.

use axum::{
    extract::{ConnectInfo, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;
use std::net::SocketAddr;
use tower_sessions::Session;
use tracing::{info, warn};
use utoipa::ToSchema;
use validator::Validate;

use tm_core::{
    db::create_user_repository, hash_password, verify_password, Role, SessionData, User,
};

use crate::auth::{clear_session, set_session_data, AuthenticatedUser};
use crate::dto::UserResponse;
use crate::error::ApiError;
use crate::routes::users::{check_password_strength, ensure_unique_account};
use crate::state::AppState;

/// Creates the auth routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/me", get(me))
        .route("/me/password", put(change_password))
}

/// Self-service registration.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RegisterRequest {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(length(min = 3, max = 50, message = "Username must be 3-50 characters"))]
    pub username: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
    #[validate(length(min = 1, max = 100, message = "Full name must be 1-100 characters"))]
    pub full_name: String,
    /// NIM or NIP.
    #[validate(length(max = 30, message = "Identity number must be at most 30 characters"))]
    pub identity_number: Option<String>,
    #[validate(length(max = 30, message = "Phone number must be at most 30 characters"))]
    pub phone: Option<String>,
}

impl RegisterRequest {
    fn trim_fields(&mut self) {
        trim_in_place(&mut self.email);
        trim_in_place(&mut self.username);
        trim_in_place(&mut self.full_name);
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    /// Username or email.
    #[serde(alias = "username")]
    pub login: String,
    pub password: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub new_password: String,
}

/// Registers a new account with the USER role.
#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = UserResponse),
        (status = 422, description = "Invalid input or account exists", body = crate::error::ErrorResponse)
    ),
    tag = "Auth"
)]
pub async fn register(
    State(state): State<AppState>,
    Json(mut request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    request.trim_fields();
    request.validate()?;
    check_password_strength("password", &request.password)?;

    let user_repo = create_user_repository(&state.db);
    ensure_unique_account(user_repo.as_ref(), &request.email, &request.username).await?;

    let password_hash = hash_password(&request.password)
        .map_err(|e| ApiError::Internal(format!("Failed to hash password: {}", e)))?;

    let mut user = User::new(
        request.email,
        request.username,
        password_hash,
        Role::User,
        request.full_name,
    );
    user.identity_number = non_blank(request.identity_number);
    user.phone = non_blank(request.phone);

    let created = user_repo.create(&user).await?;
    info!(user_id = %created.id, username = %created.username, "User registered");

    Ok((StatusCode::CREATED, Json(created.into())))
}

/// Logs in with a username or email and starts a session.
#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = UserResponse),
        (status = 401, description = "Invalid credentials", body = crate::error::ErrorResponse),
        (status = 403, description = "Account disabled", body = crate::error::ErrorResponse),
        (status = 429, description = "Too many attempts", body = crate::error::ErrorResponse)
    ),
    tag = "Auth"
)]
pub async fn login(
    State(state): State<AppState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    session: Session,
    Json(request): Json<LoginRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    let ip = state
        .login_rate_limiter
        .client_ip(&headers, connect_info.map(|ConnectInfo(addr)| addr));

    // Rate limits apply before any credential check.
    if let Err(e) = state.login_rate_limiter.check(ip) {
        warn!(ip = %ip, login = %request.login, "Login rate limited");
        state.metrics.record_rate_limit_exceeded("login");
        return Err(ApiError::RateLimitExceeded(e.to_string()));
    }

    let user_repo = create_user_repository(&state.db);
    let Some(user) = user_repo.get_by_login(request.login.trim()).await? else {
        warn!(ip = %ip, login = %request.login, "Login attempt for unknown user");
        state.metrics.record_login_attempt(false);
        return Err(ApiError::InvalidCredentials);
    };

    let valid = verify_password(&request.password, &user.password_hash)
        .map_err(|e| ApiError::Internal(format!("Password verification failed: {}", e)))?;
    if !valid {
        warn!(ip = %ip, username = %user.username, "Invalid password");
        state.metrics.record_login_attempt(false);
        return Err(ApiError::InvalidCredentials);
    }

    if !user.enabled {
        warn!(ip = %ip, username = %user.username, "Login attempt for disabled account");
        state.metrics.record_login_attempt(false);
        return Err(ApiError::AccountDisabled);
    }

    // New session id on privilege change.
    if let Err(e) = session.cycle_id().await {
        warn!("Failed to regenerate session ID: {}", e);
    }
    set_session_data(&session, SessionData::new(&user))
        .await
        .map_err(|e| ApiError::Internal(format!("Failed to store session: {}", e)))?;

    if let Err(e) = user_repo.update_last_login(user.id).await {
        warn!(user_id = %user.id, "Failed to update last login: {}", e);
    }
    state.metrics.record_login_attempt(true);

    info!(ip = %ip, username = %user.username, role = %user.role, "User logged in");

    let user = user_repo.get(user.id).await?.unwrap_or(user);
    Ok(Json(user.into()))
}

/// Ends the current session.
#[utoipa::path(
    post,
    path = "/api/auth/logout",
    responses((status = 204, description = "Logged out")),
    tag = "Auth"
)]
pub async fn logout(session: Session) -> StatusCode {
    if let Err(e) = clear_session(&session).await {
        warn!("Error clearing session during logout: {}", e);
    }
    info!("User logged out");
    StatusCode::NO_CONTENT
}

/// Returns the logged-in user.
#[utoipa::path(
    get,
    path = "/api/auth/me",
    responses(
        (status = 200, description = "Current user", body = UserResponse),
        (status = 401, description = "Not logged in", body = crate::error::ErrorResponse)
    ),
    tag = "Auth"
)]
pub async fn me(AuthenticatedUser(user): AuthenticatedUser) -> Json<UserResponse> {
    Json(user.into())
}

/// Changes the caller's password after checking the current one.
#[utoipa::path(
    put,
    path = "/api/auth/me/password",
    request_body = ChangePasswordRequest,
    responses(
        (status = 204, description = "Password changed"),
        (status = 422, description = "Wrong current password or weak new password", body = crate::error::ErrorResponse)
    ),
    tag = "Auth"
)]
pub async fn change_password(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(request): Json<ChangePasswordRequest>,
) -> Result<StatusCode, ApiError> {
    request.validate()?;

    let valid = verify_password(&request.current_password, &user.password_hash)
        .map_err(|e| ApiError::Internal(format!("Password verification failed: {}", e)))?;
    if !valid {
        return Err(ApiError::validation_field(
            "current_password",
            "mismatch",
            "Current password is incorrect",
        ));
    }
    check_password_strength("new_password", &request.new_password)?;

    let password_hash = hash_password(&request.new_password)
        .map_err(|e| ApiError::Internal(format!("Failed to hash password: {}", e)))?;
    create_user_repository(&state.db)
        .update_password(user.id, &password_hash)
        .await?;

    info!(user_id = %user.id, "Password changed");
    Ok(StatusCode::NO_CONTENT)
}

/// Trims an optional field, mapping blank input to `None`.
/// Strips surrounding whitespace so length checks see what gets stored.
pub(crate) fn trim_in_place(value: &mut String) {
    let trimmed = value.trim();
    if trimmed.len() != value.len() {
        *value = trimmed.to_string();
    }
}

pub(crate) fn trim_option_in_place(value: &mut Option<String>) {
    if let Some(value) = value {
        trim_in_place(value);
    }
}

pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
