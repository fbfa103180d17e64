//! Claim (klaim) routes.

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

use tm_core::db::{create_claim_repository, create_item_repository};
use tm_core::{Claim, ClaimFilter, ClaimStatus, Role, User};
use tm_observability::ReviewDecision;

use crate::auth::{AuthenticatedUser, RequireOfficer};
use crate::dto::ClaimResponse;
use crate::error::ApiError;
use crate::routes::auth::{non_blank, trim_in_place};
use crate::routes::uploads::check_unattached_photo;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_claims).post(create_claim))
        .route("/mine", get(my_claims))
        .route("/:id", get(get_claim).delete(cancel_claim))
        .route("/:id/approve", post(approve_claim))
        .route("/:id/reject", post(reject_claim))
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ListClaimsQuery {
    /// PENDING, APPROVED or REJECTED.
    pub status: Option<String>,
    pub item_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateClaimRequest {
    pub item_id: Uuid,
    /// Why the item belongs to the claimant.
    #[validate(length(min = 10, max = 1000, message = "Description must be 10-1000 characters"))]
    pub description: String,
    /// Filename returned by `POST /api/uploads`.
    pub proof_photo: Option<String>,
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct ApproveClaimRequest {
    #[validate(length(max = 500, message = "Note must be at most 500 characters"))]
    pub note: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RejectClaimRequest {
    #[validate(length(min = 1, max = 500, message = "A rejection note of 1-500 characters is required"))]
    pub note: String,
}

fn parse_status(value: &str) -> Result<ClaimStatus, ApiError> {
    value.parse::<ClaimStatus>().map_err(|_| {
        ApiError::validation_field(
            "status",
            "invalid_status",
            "Status must be PENDING, APPROVED or REJECTED",
        )
    })
}

async fn load_claim(state: &AppState, id: Uuid) -> Result<Claim, ApiError> {
    create_claim_repository(&state.db)
        .get(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Claim {} not found", id)))
}

fn can_view(user: &User, claim: &Claim) -> bool {
    claim.claimant_id == user.id || user.has_permission(Role::Officer)
}

/// Files a claim on an unclaimed item.
#[utoipa::path(
    post,
    path = "/api/claims",
    request_body = CreateClaimRequest,
    responses(
        (status = 201, description = "Claim filed", body = ClaimResponse),
        (status = 404, description = "Item not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Item returned or claim already pending", body = crate::error::ErrorResponse)
    ),
    tag = "Claims"
)]
pub async fn create_claim(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(mut request): Json<CreateClaimRequest>,
) -> Result<(StatusCode, Json<ClaimResponse>), ApiError> {
    trim_in_place(&mut request.description);
    request.validate()?;

    let item = create_item_repository(&state.db)
        .get(request.item_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Item {} not found", request.item_id)))?;
    if item.is_returned() {
        return Err(ApiError::Conflict(
            "Item has already been handed over".to_string(),
        ));
    }

    let proof_photo = non_blank(request.proof_photo);
    if let Some(photo) = &proof_photo {
        check_unattached_photo(&state, "proof_photo", photo).await?;
    }

    let claim = Claim::new(item.id, user.id, request.description, proof_photo);
    let claim = create_claim_repository(&state.db)
        .create(&claim)
        .await
        .map_err(|e| match ApiError::from(e) {
            ApiError::Conflict(_) => ApiError::Conflict(
                "You already have a pending claim for this item".to_string(),
            ),
            other => other,
        })?;
    state.metrics.record_claim_submitted();

    info!(claim_id = %claim.id, item_id = %item.id, user = %user.username, "Claim filed");
    Ok((StatusCode::CREATED, Json(claim.into())))
}

/// Lists the caller's claims, newest first.
#[utoipa::path(
    get,
    path = "/api/claims/mine",
    responses((status = 200, description = "Own claims", body = Vec<ClaimResponse>)),
    tag = "Claims"
)]
pub async fn my_claims(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<Json<Vec<ClaimResponse>>, ApiError> {
    let claims = create_claim_repository(&state.db)
        .list(&ClaimFilter {
            claimant_id: Some(user.id),
            ..Default::default()
        })
        .await?;
    Ok(Json(claims.into_iter().map(Into::into).collect()))
}

/// Lists claims for review, newest first.
#[utoipa::path(
    get,
    path = "/api/claims",
    params(ListClaimsQuery),
    responses(
        (status = 200, description = "Claims", body = Vec<ClaimResponse>),
        (status = 403, description = "Officer access required", body = crate::error::ErrorResponse)
    ),
    tag = "Claims"
)]
pub async fn list_claims(
    State(state): State<AppState>,
    RequireOfficer(_officer): RequireOfficer,
    Query(query): Query<ListClaimsQuery>,
) -> Result<Json<Vec<ClaimResponse>>, ApiError> {
    let filter = ClaimFilter {
        status: query
            .status
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .map(parse_status)
            .transpose()?,
        item_id: query.item_id,
        claimant_id: None,
    };
    let claims = create_claim_repository(&state.db).list(&filter).await?;
    Ok(Json(claims.into_iter().map(Into::into).collect()))
}

/// Gets a claim. Visible to its claimant and to officers.
#[utoipa::path(
    get,
    path = "/api/claims/{id}",
    params(("id" = Uuid, Path, description = "Claim ID")),
    responses(
        (status = 200, description = "Claim", body = ClaimResponse),
        (status = 403, description = "Not your claim", body = crate::error::ErrorResponse),
        (status = 404, description = "Not found", body = crate::error::ErrorResponse)
    ),
    tag = "Claims"
)]
pub async fn get_claim(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ClaimResponse>, ApiError> {
    let claim = load_claim(&state, id).await?;
    if !can_view(&user, &claim) {
        return Err(ApiError::Forbidden("Not your claim".to_string()));
    }
    Ok(Json(claim.into()))
}

/// Withdraws the caller's own pending claim.
#[utoipa::path(
    delete,
    path = "/api/claims/{id}",
    params(("id" = Uuid, Path, description = "Claim ID")),
    responses(
        (status = 204, description = "Claim withdrawn"),
        (status = 403, description = "Not your claim", body = crate::error::ErrorResponse),
        (status = 409, description = "Claim already reviewed", body = crate::error::ErrorResponse)
    ),
    tag = "Claims"
)]
pub async fn cancel_claim(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let claim = load_claim(&state, id).await?;
    if claim.claimant_id != user.id {
        return Err(ApiError::Forbidden(
            "Only the claimant can withdraw a claim".to_string(),
        ));
    }

    if !create_claim_repository(&state.db).delete_pending(id).await? {
        return Err(ApiError::Conflict(format!(
            "Claim has already been {}",
            claim.status.as_str().to_lowercase()
        )));
    }

    info!(claim_id = %id, user = %user.username, "Claim withdrawn");
    Ok(StatusCode::NO_CONTENT)
}

/// Approves a pending claim and hands the item to the claimant.
///
/// Other pending claims on the item are rejected.
#[utoipa::path(
    post,
    path = "/api/claims/{id}/approve",
    params(("id" = Uuid, Path, description = "Claim ID")),
    request_body = ApproveClaimRequest,
    responses(
        (status = 200, description = "Claim approved", body = ClaimResponse),
        (status = 404, description = "Not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Claim reviewed or item returned", body = crate::error::ErrorResponse)
    ),
    tag = "Claims"
)]
pub async fn approve_claim(
    State(state): State<AppState>,
    RequireOfficer(officer): RequireOfficer,
    Path(id): Path<Uuid>,
    request: Option<Json<ApproveClaimRequest>>,
) -> Result<Json<ClaimResponse>, ApiError> {
    let request = request.map(|Json(r)| r).unwrap_or_default();
    request.validate()?;
    let note = non_blank(request.note);

    let claim = create_claim_repository(&state.db)
        .approve(id, officer.id, note.as_deref())
        .await?;
    state.metrics.record_claim_reviewed(ReviewDecision::Approved);
    state.metrics.record_item_returned("claim");

    info!(
        claim_id = %id,
        item_id = %claim.item_id,
        officer = %officer.username,
        "Claim approved"
    );
    Ok(Json(claim.into()))
}

/// Rejects a pending claim with a note for the claimant.
#[utoipa::path(
    post,
    path = "/api/claims/{id}/reject",
    params(("id" = Uuid, Path, description = "Claim ID")),
    request_body = RejectClaimRequest,
    responses(
        (status = 200, description = "Claim rejected", body = ClaimResponse),
        (status = 404, description = "Not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Claim already reviewed", body = crate::error::ErrorResponse),
        (status = 422, description = "Note missing", body = crate::error::ErrorResponse)
    ),
    tag = "Claims"
)]
pub async fn reject_claim(
    State(state): State<AppState>,
    RequireOfficer(officer): RequireOfficer,
    Path(id): Path<Uuid>,
    Json(request): Json<RejectClaimRequest>,
) -> Result<Json<ClaimResponse>, ApiError> {
    request.validate()?;
    let note = request.note.trim();
    if note.is_empty() {
        return Err(ApiError::validation_field(
            "note",
            "required",
            "A rejection note is required",
        ));
    }

    let claim = create_claim_repository(&state.db)
        .reject(id, officer.id, note)
        .await?;
    state.metrics.record_claim_reviewed(ReviewDecision::Rejected);

    info!(claim_id = %id, officer = %officer.username, "Claim rejected");
    Ok(Json(claim.into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Method;
    use serde_json::json;
    use tm_core::ItemStatus;
    use tower::ServiceExt;

    use crate::auth::test_helpers::TestUser;
    use crate::test_helpers::{
        create_test_category, create_test_item, empty_request, json_request, read_json,
        TestContext,
    };

    const DESCRIPTION: &str = "Ada stiker nama saya di bagian belakang";

    struct Fixture {
        ctx: TestContext,
        officer: TestUser,
        claimant: TestUser,
        item_id: Uuid,
    }

    async fn fixture() -> Fixture {
        let ctx = TestContext::new().await;
        let officer = TestUser::officer(&ctx.state.db).await;
        let claimant = TestUser::user(&ctx.state.db).await;
        let category = create_test_category(&ctx.state, "Elektronik").await;
        let item = create_test_item(&ctx.state, "Ponsel", &category, &officer.0, 3).await;
        Fixture {
            ctx,
            officer,
            claimant,
            item_id: item.id,
        }
    }

    async fn file_claim(ctx: &TestContext, user: &TestUser, item_id: Uuid) -> Claim {
        create_claim_repository(&ctx.state.db)
            .create(&Claim::new(item_id, user.0.id, DESCRIPTION, None))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_claim() {
        let f = fixture().await;
        let app = f.ctx.app(routes(), Some(f.claimant.clone()));
        let body = json!({ "item_id": f.item_id, "description": DESCRIPTION });

        let response = app
            .clone()
            .oneshot(json_request(Method::POST, "/", body.clone()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let claim: ClaimResponse = read_json(response).await;
        assert_eq!(claim.status, "PENDING");
        assert_eq!(claim.claimant_id, f.claimant.0.id);
        assert_eq!(f.ctx.state.metrics.snapshot().claims_submitted, 1);

        let response = app
            .oneshot(json_request(Method::POST, "/", body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_create_claim_for_missing_or_returned_item() {
        let f = fixture().await;
        create_item_repository(&f.ctx.state.db)
            .hand_over(
                f.item_id,
                f.officer.0.id,
                &tm_core::HandOver {
                    claimant_id: None,
                    claimant_name: "Pemilik".to_string(),
                    claimant_contact: None,
                },
            )
            .await
            .unwrap();
        let app = f.ctx.app(routes(), Some(f.claimant.clone()));

        let response = app
            .clone()
            .oneshot(json_request(
                Method::POST,
                "/",
                json!({ "item_id": f.item_id, "description": DESCRIPTION }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let response = app
            .oneshot(json_request(
                Method::POST,
                "/",
                json!({ "item_id": Uuid::new_v4(), "description": DESCRIPTION }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_create_claim_proof_photo_checks() {
        let f = fixture().await;
        let stored = f.ctx.state.storage.save("bukti.jpg", b"jpeg").await.unwrap();
        create_item_repository(&f.ctx.state.db)
            .update(
                f.item_id,
                &tm_core::ItemUpdate {
                    photo: Some(Some(stored.filename.clone())),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let app = f.ctx.app(routes(), Some(f.claimant.clone()));

        for photo in [stored.filename.as_str(), "tidak-ada.jpg"] {
            let response = app
                .clone()
                .oneshot(json_request(
                    Method::POST,
                    "/",
                    json!({ "item_id": f.item_id, "description": DESCRIPTION, "proof_photo": photo }),
                ))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY, "{}", photo);
            let error: serde_json::Value = read_json(response).await;
            assert!(error["details"]["proof_photo"].is_array());
        }
    }

    #[tokio::test]
    async fn test_my_claims_and_visibility() {
        let f = fixture().await;
        let other = TestUser::create(&f.ctx.state.db, "lain", Role::User).await;
        let claim = file_claim(&f.ctx, &f.claimant, f.item_id).await;
        file_claim(&f.ctx, &other, f.item_id).await;

        let app = f.ctx.app(routes(), Some(f.claimant.clone()));
        let response = app
            .oneshot(empty_request(Method::GET, "/mine"))
            .await
            .unwrap();
        let mine: Vec<ClaimResponse> = read_json(response).await;
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].item_name.as_deref(), Some("Ponsel"));

        let app = f.ctx.app(routes(), Some(other));
        let response = app
            .clone()
            .oneshot(empty_request(Method::GET, &format!("/{}", claim.id)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = app
            .oneshot(empty_request(Method::GET, "/"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let app = f.ctx.app(routes(), Some(f.officer.clone()));
        let response = app
            .clone()
            .oneshot(empty_request(Method::GET, &format!("/{}", claim.id)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(empty_request(
                Method::GET,
                &format!("/?status=PENDING&item_id={}", f.item_id),
            ))
            .await
            .unwrap();
        let pending: Vec<ClaimResponse> = read_json(response).await;
        assert_eq!(pending.len(), 2);
    }

    #[tokio::test]
    async fn test_cancel_claim() {
        let f = fixture().await;
        let other = TestUser::create(&f.ctx.state.db, "lain", Role::User).await;
        let claim = file_claim(&f.ctx, &f.claimant, f.item_id).await;
        let uri = format!("/{}", claim.id);

        let response = f
            .ctx
            .app(routes(), Some(other))
            .oneshot(empty_request(Method::DELETE, &uri))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = f
            .ctx
            .app(routes(), Some(f.claimant.clone()))
            .oneshot(empty_request(Method::DELETE, &uri))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn test_cancel_reviewed_claim_conflicts() {
        let f = fixture().await;
        let claim = file_claim(&f.ctx, &f.claimant, f.item_id).await;
        create_claim_repository(&f.ctx.state.db)
            .reject(claim.id, f.officer.0.id, "Bukti kurang")
            .await
            .unwrap();

        let response = f
            .ctx
            .app(routes(), Some(f.claimant.clone()))
            .oneshot(empty_request(Method::DELETE, &format!("/{}", claim.id)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_approve_claim_hands_over_item() {
        let f = fixture().await;
        let rival = TestUser::create(&f.ctx.state.db, "saingan", Role::User).await;
        let claim = file_claim(&f.ctx, &f.claimant, f.item_id).await;
        let rival_claim = file_claim(&f.ctx, &rival, f.item_id).await;
        let app = f.ctx.app(routes(), Some(f.officer.clone()));

        let response = app
            .clone()
            .oneshot(json_request(
                Method::POST,
                &format!("/{}/approve", claim.id),
                json!({ "note": "KTM cocok" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let approved: ClaimResponse = read_json(response).await;
        assert_eq!(approved.status, "APPROVED");
        assert_eq!(approved.reviewed_by, Some(f.officer.0.id));
        assert_eq!(approved.review_note.as_deref(), Some("KTM cocok"));

        let item = create_item_repository(&f.ctx.state.db)
            .get(f.item_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(item.status, ItemStatus::Returned);
        assert_eq!(item.handed_over_by, Some(f.officer.0.id));
        assert_eq!(item.claimant_id, Some(f.claimant.0.id));

        let rival_claim = load_claim(&f.ctx.state, rival_claim.id).await.unwrap();
        assert_eq!(rival_claim.status, ClaimStatus::Rejected);

        let response = app
            .oneshot(empty_request(
                Method::POST,
                &format!("/{}/approve", rival_claim.id),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let snapshot = f.ctx.state.metrics.snapshot();
        assert_eq!(snapshot.claims_approved, 1);
        assert_eq!(snapshot.items_returned, 1);
    }

    #[tokio::test]
    async fn test_approve_requires_officer() {
        let f = fixture().await;
        let claim = file_claim(&f.ctx, &f.claimant, f.item_id).await;

        let response = f
            .ctx
            .app(routes(), Some(f.claimant.clone()))
            .oneshot(empty_request(
                Method::POST,
                &format!("/{}/approve", claim.id),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_reject_claim_requires_note() {
        let f = fixture().await;
        let claim = file_claim(&f.ctx, &f.claimant, f.item_id).await;
        let app = f.ctx.app(routes(), Some(f.officer.clone()));
        let uri = format!("/{}/reject", claim.id);

        let response = app
            .clone()
            .oneshot(json_request(Method::POST, &uri, json!({ "note": "   " })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let response = app
            .clone()
            .oneshot(json_request(
                Method::POST,
                &uri,
                json!({ "note": "Ciri-ciri tidak sesuai" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let rejected: ClaimResponse = read_json(response).await;
        assert_eq!(rejected.status, "REJECTED");

        let item = create_item_repository(&f.ctx.state.db)
            .get(f.item_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(item.status, ItemStatus::Unclaimed);

        let response = app
            .oneshot(json_request(Method::POST, &uri, json!({ "note": "Lagi" })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }
}
