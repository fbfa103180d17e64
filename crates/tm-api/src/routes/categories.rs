//! Item category routes.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use tm_core::{db::create_category_repository, Category, CategoryUpdate};

use crate::auth::{AuthenticatedUser, RequireAdmin};
use crate::dto::CategoryResponse;
use crate::error::ApiError;
use crate::routes::auth::{non_blank, trim_in_place, trim_option_in_place};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_categories).post(create_category))
        .route(
            "/:id",
            get(get_category).put(update_category).delete(delete_category),
        )
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateCategoryRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: String,
    #[validate(length(max = 500, message = "Description must be at most 500 characters"))]
    pub description: Option<String>,
}

/// Absent fields stay unchanged; an empty description clears it.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateCategoryRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: Option<String>,
    #[validate(length(max = 500, message = "Description must be at most 500 characters"))]
    pub description: Option<String>,
}

fn duplicate_name(name: &str) -> ApiError {
    ApiError::Conflict(format!("Category '{}' already exists", name))
}

/// Lists categories ordered by name, with item counts.
#[utoipa::path(
    get,
    path = "/api/categories",
    responses((status = 200, description = "Categories", body = Vec<CategoryResponse>)),
    tag = "Categories"
)]
pub async fn list_categories(
    State(state): State<AppState>,
    AuthenticatedUser(_user): AuthenticatedUser,
) -> Result<Json<Vec<CategoryResponse>>, ApiError> {
    let categories = create_category_repository(&state.db)
        .list_with_counts()
        .await?;
    Ok(Json(categories.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    get,
    path = "/api/categories/{id}",
    params(("id" = Uuid, Path, description = "Category ID")),
    responses(
        (status = 200, description = "Category", body = CategoryResponse),
        (status = 404, description = "Not found", body = crate::error::ErrorResponse)
    ),
    tag = "Categories"
)]
pub async fn get_category(
    State(state): State<AppState>,
    AuthenticatedUser(_user): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<CategoryResponse>, ApiError> {
    let category = create_category_repository(&state.db)
        .get(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Category {} not found", id)))?;
    Ok(Json(category.into()))
}

#[utoipa::path(
    post,
    path = "/api/categories",
    request_body = CreateCategoryRequest,
    responses(
        (status = 201, description = "Category created", body = CategoryResponse),
        (status = 409, description = "Name already used", body = crate::error::ErrorResponse)
    ),
    tag = "Categories"
)]
pub async fn create_category(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Json(mut request): Json<CreateCategoryRequest>,
) -> Result<(StatusCode, Json<CategoryResponse>), ApiError> {
    trim_in_place(&mut request.name);
    request.validate()?;
    let name = request.name.as_str();

    let repo = create_category_repository(&state.db);
    if repo.get_by_name(name).await?.is_some() {
        return Err(duplicate_name(name));
    }

    let category = repo
        .create(&Category::new(name, non_blank(request.description)))
        .await?;

    info!(admin = %admin.username, category = %category.name, "Category created");
    Ok((StatusCode::CREATED, Json(category.into())))
}

#[utoipa::path(
    put,
    path = "/api/categories/{id}",
    params(("id" = Uuid, Path, description = "Category ID")),
    request_body = UpdateCategoryRequest,
    responses(
        (status = 200, description = "Category updated", body = CategoryResponse),
        (status = 404, description = "Not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Name already used", body = crate::error::ErrorResponse)
    ),
    tag = "Categories"
)]
pub async fn update_category(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<Uuid>,
    Json(mut request): Json<UpdateCategoryRequest>,
) -> Result<Json<CategoryResponse>, ApiError> {
    trim_option_in_place(&mut request.name);
    request.validate()?;

    let repo = create_category_repository(&state.db);
    repo.get(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Category {} not found", id)))?;

    let name = request.name.as_deref();
    if let Some(name) = name {
        if let Some(other) = repo.get_by_name(name).await? {
            if other.id != id {
                return Err(duplicate_name(name));
            }
        }
    }

    let update = CategoryUpdate {
        name: name.map(str::to_string),
        description: request.description.map(|d| non_blank(Some(d))),
    };
    let category = repo.update(id, &update).await?;

    info!(admin = %admin.username, category = %category.name, "Category updated");
    Ok(Json(category.into()))
}

/// Deletes a category that no item uses.
#[utoipa::path(
    delete,
    path = "/api/categories/{id}",
    params(("id" = Uuid, Path, description = "Category ID")),
    responses(
        (status = 204, description = "Category deleted"),
        (status = 404, description = "Not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Category still has items", body = crate::error::ErrorResponse)
    ),
    tag = "Categories"
)]
pub async fn delete_category(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let deleted = create_category_repository(&state.db)
        .delete(id)
        .await
        .map_err(|e| match ApiError::from(e) {
            ApiError::Conflict(_) => {
                ApiError::Conflict("Category still has items filed under it".to_string())
            }
            other => other,
        })?;
    if !deleted {
        return Err(ApiError::NotFound(format!("Category {} not found", id)));
    }

    info!(admin = %admin.username, category_id = %id, "Category deleted");
    Ok(StatusCode::NO_CONTENT)
}
