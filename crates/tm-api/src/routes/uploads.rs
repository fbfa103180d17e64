//! Photo upload routes.

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    routing::{delete, post},
    Json, Router,
};
use tracing::info;

use tm_core::db::create_item_repository;

use crate::auth::{AuthenticatedUser, RequireOfficer};
use crate::dto::UploadResponse;
use crate::error::ApiError;
use crate::state::AppState;

/// Name of the multipart field holding the file.
pub const FILE_FIELD: &str = "file";

/// Headroom for multipart boundaries and part headers.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Creates the upload routes. Request bodies are capped just above
/// `max_upload_bytes` so oversized files fail early.
pub fn routes(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/", post(upload_file))
        .route("/:filename", delete(delete_file))
        .layer(DefaultBodyLimit::max(
            max_upload_bytes.saturating_add(MULTIPART_OVERHEAD_BYTES),
        ))
}

/// Checks that `photo` was uploaded and is not attached to another item
/// or claim. Errors are reported against `field`.
pub(crate) async fn check_unattached_photo(
    state: &AppState,
    field: &str,
    photo: &str,
) -> Result<(), ApiError> {
    if !state.storage.exists(photo).await {
        return Err(ApiError::validation_field(
            field,
            "not_found",
            "Photo has not been uploaded",
        ));
    }
    if create_item_repository(&state.db)
        .photo_references(photo)
        .await?
        > 0
    {
        return Err(ApiError::validation_field(
            field,
            "in_use",
            "Photo is already attached to another record",
        ));
    }
    Ok(())
}

/// Stores an image under a generated name.
#[utoipa::path(
    post,
    path = "/api/uploads",
    request_body(content = Vec<u8>, content_type = "multipart/form-data", description = "Image in the `file` field"),
    responses(
        (status = 201, description = "File stored", body = UploadResponse),
        (status = 400, description = "Missing file or unsupported type", body = crate::error::ErrorResponse),
        (status = 413, description = "File too large", body = crate::error::ErrorResponse)
    ),
    tag = "Uploads"
)]
pub async fn upload_file(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UploadResponse>), ApiError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let original_name = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| ApiError::BadRequest("File name is missing".to_string()))?;
        let bytes = field.bytes().await?;

        let stored = state.storage.save(&original_name, &bytes).await?;
        state.metrics.record_upload(&stored.content_type);

        info!(
            filename = %stored.filename,
            size = stored.size,
            user = %user.username,
            "File uploaded"
        );
        return Ok((StatusCode::CREATED, Json(stored.into())));
    }

    Err(ApiError::BadRequest(format!(
        "Multipart field '{}' is required",
        FILE_FIELD
    )))
}

/// Deletes a stored file.
#[utoipa::path(
    delete,
    path = "/api/uploads/{filename}",
    params(("filename" = String, Path, description = "Stored filename")),
    responses(
        (status = 204, description = "File deleted"),
        (status = 400, description = "Invalid filename", body = crate::error::ErrorResponse),
        (status = 404, description = "Not found", body = crate::error::ErrorResponse),
        (status = 409, description = "File is attached to an item or claim", body = crate::error::ErrorResponse)
    ),
    tag = "Uploads"
)]
pub async fn delete_file(
    State(state): State<AppState>,
    RequireOfficer(officer): RequireOfficer,
    Path(filename): Path<String>,
) -> Result<StatusCode, ApiError> {
    let references = create_item_repository(&state.db)
        .photo_references(&filename)
        .await?;
    if references > 0 {
        return Err(ApiError::Conflict(format!(
            "File {} is still attached to {} record(s)",
            filename, references
        )));
    }

    state.storage.delete(&filename).await?;
    info!(filename = %filename, officer = %officer.username, "File deleted");
    Ok(StatusCode::NO_CONTENT)
}
