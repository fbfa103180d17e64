//! User management routes (admin only).

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use tracing::info;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use tm_core::{
    db::{create_user_repository, UserRepository},
    hash_password, validate_password_strength, Role, User, UserFilter, UserUpdate,
};

use crate::auth::RequireAdmin;
use crate::dto::UserResponse;
use crate::error::{ApiError, ValidationErrorDetails};
use crate::routes::auth::{non_blank, trim_in_place, trim_option_in_place};
use crate::state::AppState;

/// Creates the user management routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_users).post(create_user))
        .route("/:id", get(get_user).put(update_user).delete(delete_user))
        .route("/:id/password", post(reset_password))
}

/// Query parameters for listing users.
#[derive(Debug, Deserialize, IntoParams)]
pub struct ListUsersQuery {
    /// ADMIN, PETUGAS or USER.
    pub role: Option<String>,
    pub enabled: Option<bool>,
    /// Matches username, email or full name.
    pub search: Option<String>,
}

/// Request to create a user with any role.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateUserRequest {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(length(min = 3, max = 50, message = "Username must be 3-50 characters"))]
    pub username: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
    pub role: String,
    #[validate(length(min = 1, max = 100, message = "Full name must be 1-100 characters"))]
    pub full_name: String,
    pub identity_number: Option<String>,
    pub phone: Option<String>,
}

/// Request to update a user. Absent fields stay unchanged.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateUserRequest {
    #[validate(email(message = "Invalid email address"))]
    pub email: Option<String>,
    #[validate(length(min = 3, max = 50, message = "Username must be 3-50 characters"))]
    pub username: Option<String>,
    pub role: Option<String>,
    #[validate(length(min = 1, max = 100, message = "Full name must be 1-100 characters"))]
    pub full_name: Option<String>,
    /// Empty string clears the value.
    pub identity_number: Option<String>,
    /// Empty string clears the value.
    pub phone: Option<String>,
    pub enabled: Option<bool>,
}

impl CreateUserRequest {
    fn trim_fields(&mut self) {
        trim_in_place(&mut self.email);
        trim_in_place(&mut self.username);
        trim_in_place(&mut self.full_name);
        trim_in_place(&mut self.role);
    }
}

impl UpdateUserRequest {
    fn trim_fields(&mut self) {
        trim_option_in_place(&mut self.email);
        trim_option_in_place(&mut self.username);
        trim_option_in_place(&mut self.full_name);
        trim_option_in_place(&mut self.role);
    }
}

/// Request to reset a user's password.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ResetPasswordRequest {
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
}

/// Fails with a field error when the password breaks a strength rule.
pub(crate) fn check_password_strength(field: &str, password: &str) -> Result<(), ApiError> {
    let problems = validate_password_strength(password);
    if problems.is_empty() {
        return Ok(());
    }
    let mut details = ValidationErrorDetails::field(field, "weak_password", problems[0]);
    for problem in &problems[1..] {
        details.add_error(field, "weak_password", problem);
    }
    Err(ApiError::ValidationError(details))
}

/// Fails with a field error when the email or username is taken.
pub(crate) async fn ensure_unique_account(
    repo: &dyn UserRepository,
    email: &str,
    username: &str,
) -> Result<(), ApiError> {
    if repo.get_by_email(email.trim()).await?.is_some() {
        return Err(ApiError::validation_field(
            "email",
            "already_exists",
            "This email address is already in use by another account",
        ));
    }
    if repo.get_by_username(username.trim()).await?.is_some() {
        return Err(ApiError::validation_field(
            "username",
            "already_exists",
            "This username is already taken by another account",
        ));
    }
    Ok(())
}

fn parse_role(value: &str) -> Result<Role, ApiError> {
    value.parse::<Role>().map_err(|_| {
        ApiError::validation_field(
            "role",
            "invalid_role",
            &format!(
                "Invalid role: '{}'. Valid roles are: ADMIN, PETUGAS, USER",
                value
            ),
        )
    })
}

/// Lists users ordered by username.
#[utoipa::path(
    get,
    path = "/api/admin/users",
    params(ListUsersQuery),
    responses(
        (status = 200, description = "Users", body = Vec<UserResponse>),
        (status = 403, description = "Admin access required", body = crate::error::ErrorResponse)
    ),
    tag = "Users"
)]
pub async fn list_users(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Query(query): Query<ListUsersQuery>,
) -> Result<Json<Vec<UserResponse>>, ApiError> {
    let filter = UserFilter {
        role: query.role.as_deref().map(parse_role).transpose()?,
        enabled: query.enabled,
        search: query.search.filter(|s| !s.trim().is_empty()),
    };

    let users = create_user_repository(&state.db).list(&filter).await?;
    Ok(Json(users.into_iter().map(Into::into).collect()))
}

/// Creates a user.
#[utoipa::path(
    post,
    path = "/api/admin/users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User created", body = UserResponse),
        (status = 422, description = "Invalid input", body = crate::error::ErrorResponse)
    ),
    tag = "Users"
)]
pub async fn create_user(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Json(mut request): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    request.trim_fields();
    request.validate()?;
    check_password_strength("password", &request.password)?;
    let role = parse_role(&request.role)?;

    let user_repo = create_user_repository(&state.db);
    ensure_unique_account(user_repo.as_ref(), &request.email, &request.username).await?;

    let password_hash = hash_password(&request.password)
        .map_err(|e| ApiError::Internal(format!("Failed to hash password: {}", e)))?;

    let mut user = User::new(
        request.email,
        request.username,
        password_hash,
        role,
        request.full_name,
    );
    user.identity_number = non_blank(request.identity_number);
    user.phone = non_blank(request.phone);

    let created = user_repo.create(&user).await?;

    info!(
        admin = %admin.username,
        username = %created.username,
        role = %created.role,
        "User created"
    );

    Ok((StatusCode::CREATED, Json(created.into())))
}

#[utoipa::path(
    get,
    path = "/api/admin/users/{id}",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "User", body = UserResponse),
        (status = 404, description = "Not found", body = crate::error::ErrorResponse)
    ),
    tag = "Users"
)]
pub async fn get_user(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<Uuid>,
) -> Result<Json<UserResponse>, ApiError> {
    let user = create_user_repository(&state.db)
        .get(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("User {} not found", id)))?;

    Ok(Json(user.into()))
}

/// Updates a user.
///
/// An admin cannot disable or demote their own account.
#[utoipa::path(
    put,
    path = "/api/admin/users/{id}",
    params(("id" = Uuid, Path, description = "User ID")),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "User updated", body = UserResponse),
        (status = 400, description = "Self-disable or self-demotion", body = crate::error::ErrorResponse),
        (status = 409, description = "Email or username taken", body = crate::error::ErrorResponse)
    ),
    tag = "Users"
)]
pub async fn update_user(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<Uuid>,
    Json(mut request): Json<UpdateUserRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    request.trim_fields();
    request.validate()?;
    let role = request.role.as_deref().map(parse_role).transpose()?;

    if admin.id == id && request.enabled == Some(false) {
        return Err(ApiError::BadRequest(
            "Cannot disable your own account".to_string(),
        ));
    }
    if admin.id == id && role.is_some_and(|role| role != Role::Admin) {
        return Err(ApiError::BadRequest(
            "Cannot demote your own account".to_string(),
        ));
    }

    let user_repo = create_user_repository(&state.db);
    let existing = user_repo
        .get(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("User {} not found", id)))?;

    if let Some(email) = &request.email {
        if let Some(other) = user_repo.get_by_email(email).await? {
            if other.id != existing.id {
                return Err(ApiError::Conflict("Email already in use".to_string()));
            }
        }
    }
    if let Some(username) = &request.username {
        if let Some(other) = user_repo.get_by_username(username).await? {
            if other.id != existing.id {
                return Err(ApiError::Conflict("Username already in use".to_string()));
            }
        }
    }

    let update = UserUpdate {
        email: request.email,
        username: request.username,
        role,
        full_name: request.full_name,
        identity_number: request.identity_number.map(|v| non_blank(Some(v))),
        phone: request.phone.map(|v| non_blank(Some(v))),
        enabled: request.enabled,
    };

    let updated = user_repo.update(id, &update).await?;

    info!(
        admin = %admin.username,
        username = %updated.username,
        role = %updated.role,
        "User updated"
    );

    Ok(Json(updated.into()))
}

/// Deletes a user that has no recorded items or claims.
#[utoipa::path(
    delete,
    path = "/api/admin/users/{id}",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 204, description = "User deleted"),
        (status = 400, description = "Cannot delete own account", body = crate::error::ErrorResponse),
        (status = 409, description = "User still referenced", body = crate::error::ErrorResponse)
    ),
    tag = "Users"
)]
pub async fn delete_user(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    if admin.id == id {
        return Err(ApiError::BadRequest(
            "Cannot delete your own account".to_string(),
        ));
    }

    let deleted = create_user_repository(&state.db)
        .delete(id)
        .await
        .map_err(|e| match ApiError::from(e) {
            ApiError::Conflict(_) => ApiError::Conflict(
                "User still has recorded items or claims; disable the account instead".to_string(),
            ),
            other => other,
        })?;
    if !deleted {
        return Err(ApiError::NotFound(format!("User {} not found", id)));
    }

    info!(admin = %admin.username, user_id = %id, "User deleted");

    Ok(StatusCode::NO_CONTENT)
}

/// Sets a new password for a user.
#[utoipa::path(
    post,
    path = "/api/admin/users/{id}/password",
    params(("id" = Uuid, Path, description = "User ID")),
    request_body = ResetPasswordRequest,
    responses(
        (status = 204, description = "Password reset"),
        (status = 404, description = "Not found", body = crate::error::ErrorResponse)
    ),
    tag = "Users"
)]
pub async fn reset_password(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<Uuid>,
    Json(request): Json<ResetPasswordRequest>,
) -> Result<StatusCode, ApiError> {
    request.validate()?;
    check_password_strength("password", &request.password)?;

    let user_repo = create_user_repository(&state.db);
    let user = user_repo
        .get(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("User {} not found", id)))?;

    let password_hash = hash_password(&request.password)
        .map_err(|e| ApiError::Internal(format!("Failed to hash password: {}", e)))?;
    user_repo.update_password(id, &password_hash).await?;

    info!(admin = %admin.username, username = %user.username, "Password reset");

    Ok(StatusCode::NO_CONTENT)
}
