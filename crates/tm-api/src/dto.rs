//! Data Transfer Objects (DTOs) shared by several route modules.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tm_core::db::PaginatedResult;
use tm_core::{Category, CategoryWithCount, Claim, ClaimDetail, ItemDetail, StoredFile, User};
use utoipa::ToSchema;
use uuid::Uuid;

/// Public path of a stored upload.
pub fn upload_url(filename: &str) -> String {
    format!("/uploads/{}", filename)
}

// ============================================================================
// User DTOs
// ============================================================================

/// A user account without credentials.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    /// ADMIN, PETUGAS or USER.
    pub role: String,
    pub full_name: String,
    pub identity_number: Option<String>,
    pub phone: Option<String>,
    pub enabled: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            username: user.username,
            role: user.role.as_str().to_string(),
            full_name: user.full_name,
            identity_number: user.identity_number,
            phone: user.phone,
            enabled: user.enabled,
            last_login_at: user.last_login_at,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

// ============================================================================
// Category DTOs
// ============================================================================

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CategoryResponse {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    /// Number of items in the category; absent on create/update responses.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_count: Option<u64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Category> for CategoryResponse {
    fn from(category: Category) -> Self {
        Self {
            id: category.id,
            name: category.name,
            description: category.description,
            item_count: None,
            created_at: category.created_at,
            updated_at: category.updated_at,
        }
    }
}

impl From<CategoryWithCount> for CategoryResponse {
    fn from(value: CategoryWithCount) -> Self {
        Self {
            item_count: Some(value.item_count),
            ..value.category.into()
        }
    }
}

// ============================================================================
// Item DTOs
// ============================================================================

/// A found item with the names a detail view shows.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ItemResponse {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub category_id: Uuid,
    pub category_name: String,
    pub found_location: String,
    pub found_at: DateTime<Utc>,
    pub photo: Option<String>,
    pub photo_url: Option<String>,
    /// BELUM_DIAMBIL or SUDAH_DIAMBIL.
    pub status: String,
    pub recorded_by: Uuid,
    pub recorded_by_name: String,
    pub handed_over_by: Option<Uuid>,
    pub handed_over_by_name: Option<String>,
    pub claimant_id: Option<Uuid>,
    pub claimant_name: Option<String>,
    pub claimant_contact: Option<String>,
    pub handed_over_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ItemDetail> for ItemResponse {
    fn from(detail: ItemDetail) -> Self {
        let item = detail.item;
        Self {
            id: item.id,
            name: item.name,
            description: item.description,
            category_id: item.category_id,
            category_name: detail.category_name,
            found_location: item.found_location,
            found_at: item.found_at,
            photo_url: item.photo.as_deref().map(upload_url),
            photo: item.photo,
            status: item.status.as_str().to_string(),
            recorded_by: item.recorded_by,
            recorded_by_name: detail.recorded_by_name,
            handed_over_by: item.handed_over_by,
            handed_over_by_name: detail.handed_over_by_name,
            claimant_id: item.claimant_id,
            claimant_name: item.claimant_name,
            claimant_contact: item.claimant_contact,
            handed_over_at: item.handed_over_at,
            created_at: item.created_at,
            updated_at: item.updated_at,
        }
    }
}

/// Pagination metadata.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PaginationInfo {
    pub page: u32,
    pub per_page: u32,
    pub total_items: u64,
    pub total_pages: u32,
}

/// One page of items.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ItemListResponse {
    pub data: Vec<ItemResponse>,
    pub pagination: PaginationInfo,
}

impl From<PaginatedResult<ItemDetail>> for ItemListResponse {
    fn from(page: PaginatedResult<ItemDetail>) -> Self {
        Self {
            pagination: PaginationInfo {
                page: page.page,
                per_page: page.per_page,
                total_items: page.total,
                total_pages: page.total_pages,
            },
            data: page.items.into_iter().map(Into::into).collect(),
        }
    }
}

// ============================================================================
// Claim DTOs
// ============================================================================

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ClaimResponse {
    pub id: Uuid,
    pub item_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_name: Option<String>,
    pub claimant_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub claimant_name: Option<String>,
    pub description: String,
    pub proof_photo: Option<String>,
    pub proof_photo_url: Option<String>,
    /// PENDING, APPROVED or REJECTED.
    pub status: String,
    pub reviewed_by: Option<Uuid>,
    pub review_note: Option<String>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Claim> for ClaimResponse {
    fn from(claim: Claim) -> Self {
        Self {
            id: claim.id,
            item_id: claim.item_id,
            item_name: None,
            claimant_id: claim.claimant_id,
            claimant_name: None,
            description: claim.description,
            proof_photo_url: claim.proof_photo.as_deref().map(upload_url),
            proof_photo: claim.proof_photo,
            status: claim.status.as_str().to_string(),
            reviewed_by: claim.reviewed_by,
            review_note: claim.review_note,
            reviewed_at: claim.reviewed_at,
            created_at: claim.created_at,
            updated_at: claim.updated_at,
        }
    }
}

impl From<ClaimDetail> for ClaimResponse {
    fn from(detail: ClaimDetail) -> Self {
        Self {
            item_name: Some(detail.item_name),
            claimant_name: Some(detail.claimant_name),
            ..detail.claim.into()
        }
    }
}

// ============================================================================
// Upload DTOs
// ============================================================================

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UploadResponse {
    pub filename: String,
    pub url: String,
    pub size: usize,
    pub content_type: String,
}

impl From<StoredFile> for UploadResponse {
    fn from(file: StoredFile) -> Self {
        Self {
            url: upload_url(&file.filename),
            filename: file.filename,
            size: file.size,
            content_type: file.content_type,
        }
    }
}

// ============================================================================
// Health DTOs
// ============================================================================

/// Health check response.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub database: DatabaseHealth,
    pub uptime_seconds: u64,
}

/// Database health status.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DatabaseHealth {
    pub connected: bool,
    pub db_type: String,
    pub pool_size: u32,
    pub idle_connections: usize,
}
