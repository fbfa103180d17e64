//! Found item (barang temuan) routes.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use tracing::{info, warn};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use tm_core::db::{
    create_category_repository, create_item_repository, create_user_repository, PaginatedResult,
    Pagination,
};
use tm_core::{Category, FoundItem, HandOver, ItemFilter, ItemStatus, ItemUpdate, NewItem};

use crate::auth::{AuthenticatedUser, RequireOfficer};
use crate::dto::{ItemListResponse, ItemResponse};
use crate::error::ApiError;
use crate::routes::auth::{non_blank, trim_in_place, trim_option_in_place};
use crate::routes::uploads::check_unattached_photo;
use crate::state::AppState;

/// Allowed clock skew for `found_at`.
const FOUND_AT_SKEW_SECS: i64 = 60;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_items).post(create_item))
        .route("/:id", get(get_item).put(update_item).delete(delete_item))
        .route("/:id/handover", post(hand_over_item))
}

/// Filters and paging for the item list.
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ListItemsQuery {
    /// BELUM_DIAMBIL or SUDAH_DIAMBIL.
    pub status: Option<String>,
    pub category_id: Option<Uuid>,
    /// Matches name, description or location.
    pub search: Option<String>,
    /// Earliest `found_at` (RFC 3339).
    pub found_from: Option<DateTime<Utc>>,
    /// Latest `found_at` (RFC 3339).
    pub found_until: Option<DateTime<Utc>>,
    pub recorded_by: Option<Uuid>,
    /// Page number, starting at 1.
    pub page: Option<u32>,
    /// Items per page, 1 to 100.
    pub per_page: Option<u32>,
}

impl ListItemsQuery {
    fn filter(&self) -> Result<ItemFilter, ApiError> {
        let status = self
            .status
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .map(|s| {
                s.parse::<ItemStatus>().map_err(|_| {
                    ApiError::validation_field(
                        "status",
                        "invalid_status",
                        "Status must be BELUM_DIAMBIL or SUDAH_DIAMBIL",
                    )
                })
            })
            .transpose()?;

        if let (Some(from), Some(until)) = (self.found_from, self.found_until) {
            if from > until {
                return Err(ApiError::validation_field(
                    "found_from",
                    "invalid_range",
                    "found_from must not be after found_until",
                ));
            }
        }

        Ok(ItemFilter {
            status,
            category_id: self.category_id,
            search: self.search.clone().filter(|s| !s.trim().is_empty()),
            found_from: self.found_from,
            found_until: self.found_until,
            recorded_by: self.recorded_by,
        })
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateItemRequest {
    #[validate(length(min = 1, max = 150, message = "Name must be 1-150 characters"))]
    pub name: String,
    #[validate(length(max = 1000, message = "Description must be at most 1000 characters"))]
    pub description: Option<String>,
    pub category_id: Uuid,
    #[validate(length(min = 1, max = 200, message = "Location must be 1-200 characters"))]
    pub found_location: String,
    pub found_at: DateTime<Utc>,
    /// Filename returned by `POST /api/uploads`.
    pub photo: Option<String>,
}

/// Absent fields stay unchanged; an empty description or photo clears it.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateItemRequest {
    #[validate(length(min = 1, max = 150, message = "Name must be 1-150 characters"))]
    pub name: Option<String>,
    #[validate(length(max = 1000, message = "Description must be at most 1000 characters"))]
    pub description: Option<String>,
    pub category_id: Option<Uuid>,
    #[validate(length(min = 1, max = 200, message = "Location must be 1-200 characters"))]
    pub found_location: Option<String>,
    pub found_at: Option<DateTime<Utc>>,
    pub photo: Option<String>,
}

impl CreateItemRequest {
    fn trim_fields(&mut self) {
        trim_in_place(&mut self.name);
        trim_in_place(&mut self.found_location);
        trim_option_in_place(&mut self.description);
    }
}

impl UpdateItemRequest {
    fn trim_fields(&mut self) {
        trim_option_in_place(&mut self.name);
        trim_option_in_place(&mut self.found_location);
        trim_option_in_place(&mut self.description);
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct HandOverRequest {
    #[validate(length(min = 1, max = 100, message = "Claimant name must be 1-100 characters"))]
    pub claimant_name: String,
    #[validate(length(max = 100, message = "Contact must be at most 100 characters"))]
    pub claimant_contact: Option<String>,
    /// Registered account of the owner, when they have one.
    pub claimant_id: Option<Uuid>,
}

fn check_found_at(found_at: DateTime<Utc>) -> Result<(), ApiError> {
    if found_at > Utc::now() + Duration::seconds(FOUND_AT_SKEW_SECS) {
        return Err(ApiError::validation_field(
            "found_at",
            "in_future",
            "found_at cannot be in the future",
        ));
    }
    Ok(())
}

async fn existing_category(state: &AppState, id: Uuid) -> Result<Category, ApiError> {
    create_category_repository(&state.db)
        .get(id)
        .await?
        .ok_or_else(|| {
            ApiError::validation_field("category_id", "not_found", "Category does not exist")
        })
}

async fn load_detail(state: &AppState, id: Uuid) -> Result<ItemResponse, ApiError> {
    create_item_repository(&state.db)
        .get_detail(id)
        .await?
        .map(Into::into)
        .ok_or_else(|| ApiError::NotFound(format!("Item {} not found", id)))
}

/// Lists items, newest `found_at` first.
#[utoipa::path(
    get,
    path = "/api/items",
    params(ListItemsQuery),
    responses(
        (status = 200, description = "One page of items", body = ItemListResponse),
        (status = 422, description = "Invalid filter", body = crate::error::ErrorResponse)
    ),
    tag = "Items"
)]
pub async fn list_items(
    State(state): State<AppState>,
    AuthenticatedUser(_user): AuthenticatedUser,
    Query(query): Query<ListItemsQuery>,
) -> Result<Json<ItemListResponse>, ApiError> {
    let filter = query.filter()?;
    let pagination = Pagination::from_query(query.page, query.per_page);

    let repo = create_item_repository(&state.db);
    let total = repo.count(&filter).await?;
    let items = repo.list(&filter, &pagination).await?;

    Ok(Json(PaginatedResult::new(items, total, &pagination).into()))
}

/// Gets an item with its category, pencatat and penyerah names.
#[utoipa::path(
    get,
    path = "/api/items/{id}",
    params(("id" = Uuid, Path, description = "Item ID")),
    responses(
        (status = 200, description = "Item", body = ItemResponse),
        (status = 404, description = "Not found", body = crate::error::ErrorResponse)
    ),
    tag = "Items"
)]
pub async fn get_item(
    State(state): State<AppState>,
    AuthenticatedUser(_user): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ItemResponse>, ApiError> {
    Ok(Json(load_detail(&state, id).await?))
}

/// Records a found item as the calling officer.
#[utoipa::path(
    post,
    path = "/api/items",
    request_body = CreateItemRequest,
    responses(
        (status = 201, description = "Item recorded", body = ItemResponse),
        (status = 403, description = "Officer access required", body = crate::error::ErrorResponse),
        (status = 422, description = "Invalid input", body = crate::error::ErrorResponse)
    ),
    tag = "Items"
)]
pub async fn create_item(
    State(state): State<AppState>,
    RequireOfficer(officer): RequireOfficer,
    Json(mut request): Json<CreateItemRequest>,
) -> Result<(StatusCode, Json<ItemResponse>), ApiError> {
    request.trim_fields();
    request.validate()?;
    check_found_at(request.found_at)?;
    let category = existing_category(&state, request.category_id).await?;
    let photo = non_blank(request.photo);
    if let Some(photo) = &photo {
        check_unattached_photo(&state, "photo", photo).await?;
    }

    let item = FoundItem::new(
        NewItem {
            name: request.name,
            description: non_blank(request.description),
            category_id: category.id,
            found_location: request.found_location,
            found_at: request.found_at,
            photo,
        },
        officer.id,
    );
    let item = create_item_repository(&state.db).create(&item).await?;
    state.metrics.record_item_recorded(&category.name);

    info!(
        item_id = %item.id,
        officer = %officer.username,
        category = %category.name,
        "Item recorded"
    );

    Ok((StatusCode::CREATED, Json(load_detail(&state, item.id).await?)))
}

/// Updates an item's descriptive fields.
#[utoipa::path(
    put,
    path = "/api/items/{id}",
    params(("id" = Uuid, Path, description = "Item ID")),
    request_body = UpdateItemRequest,
    responses(
        (status = 200, description = "Item updated", body = ItemResponse),
        (status = 404, description = "Not found", body = crate::error::ErrorResponse),
        (status = 422, description = "Invalid input", body = crate::error::ErrorResponse)
    ),
    tag = "Items"
)]
pub async fn update_item(
    State(state): State<AppState>,
    RequireOfficer(officer): RequireOfficer,
    Path(id): Path<Uuid>,
    Json(mut request): Json<UpdateItemRequest>,
) -> Result<Json<ItemResponse>, ApiError> {
    request.trim_fields();
    request.validate()?;
    if let Some(found_at) = request.found_at {
        check_found_at(found_at)?;
    }
    if let Some(category_id) = request.category_id {
        existing_category(&state, category_id).await?;
    }
    let photo = request.photo.map(|p| non_blank(Some(p)));
    if let Some(Some(photo)) = &photo {
        let current = create_item_repository(&state.db)
            .get(id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("Item {} not found", id)))?;
        if current.photo.as_deref() != Some(photo.as_str()) {
            check_unattached_photo(&state, "photo", photo).await?;
        }
    }

    let update = ItemUpdate {
        name: request.name,
        description: request.description.map(|d| non_blank(Some(d))),
        category_id: request.category_id,
        found_location: request.found_location,
        found_at: request.found_at,
        photo,
    };
    if update.is_empty() {
        return Err(ApiError::BadRequest("No fields to update".to_string()));
    }

    create_item_repository(&state.db).update(id, &update).await?;
    info!(item_id = %id, officer = %officer.username, "Item updated");

    Ok(Json(load_detail(&state, id).await?))
}

/// Deletes an item, its claims and its stored photo.
#[utoipa::path(
    delete,
    path = "/api/items/{id}",
    params(("id" = Uuid, Path, description = "Item ID")),
    responses(
        (status = 204, description = "Item deleted"),
        (status = 404, description = "Not found", body = crate::error::ErrorResponse)
    ),
    tag = "Items"
)]
pub async fn delete_item(
    State(state): State<AppState>,
    RequireOfficer(officer): RequireOfficer,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let repo = create_item_repository(&state.db);
    let item = repo
        .get(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Item {} not found", id)))?;

    if !repo.delete(id).await? {
        return Err(ApiError::NotFound(format!("Item {} not found", id)));
    }

    if let Some(photo) = &item.photo {
        let references = repo.photo_references(photo).await?;
        if references > 0 {
            warn!(item_id = %id, photo = %photo, references, "Item photo still attached elsewhere, keeping file");
        } else if let Err(e) = state.storage.delete(photo).await {
            warn!(item_id = %id, photo = %photo, "Failed to delete item photo: {}", e);
        }
    }

    info!(item_id = %id, officer = %officer.username, "Item deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Hands an unclaimed item back to its owner.
///
/// Pending claims on the item are rejected.
#[utoipa::path(
    post,
    path = "/api/items/{id}/handover",
    params(("id" = Uuid, Path, description = "Item ID")),
    request_body = HandOverRequest,
    responses(
        (status = 200, description = "Item handed over", body = ItemResponse),
        (status = 404, description = "Not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Item already handed over", body = crate::error::ErrorResponse)
    ),
    tag = "Items"
)]
pub async fn hand_over_item(
    State(state): State<AppState>,
    RequireOfficer(officer): RequireOfficer,
    Path(id): Path<Uuid>,
    Json(mut request): Json<HandOverRequest>,
) -> Result<Json<ItemResponse>, ApiError> {
    trim_in_place(&mut request.claimant_name);
    request.validate()?;

    if let Some(claimant_id) = request.claimant_id {
        create_user_repository(&state.db)
            .get(claimant_id)
            .await?
            .ok_or_else(|| {
                ApiError::validation_field("claimant_id", "not_found", "User does not exist")
            })?;
    }

    let hand_over = HandOver {
        claimant_id: request.claimant_id,
        claimant_name: request.claimant_name,
        claimant_contact: non_blank(request.claimant_contact),
    };
    create_item_repository(&state.db)
        .hand_over(id, officer.id, &hand_over)
        .await?;
    state.metrics.record_item_returned("direct");

    info!(
        item_id = %id,
        officer = %officer.username,
        claimant = %hand_over.claimant_name,
        "Item handed over"
    );

    Ok(Json(load_detail(&state, id).await?))
}
