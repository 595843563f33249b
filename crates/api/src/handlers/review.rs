//! Handlers for the reviewer workflow.

use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use verdant_core::types::DbId;

use crate::error::AppResult;
use crate::state::AppState;

/// Request body for marking an outcome as reviewed.
#[derive(Debug, Deserialize)]
pub struct ReviewRequest {
    pub reviewer: String,
    pub notes: String,
}

/// POST /api/v1/outcomes/{id}/review
///
/// Mark a validation outcome as reviewed. Legal for any severity; the
/// notes must not be empty.
pub async fn mark_reviewed(
    State(state): State<AppState>,
    Path(outcome_id): Path<DbId>,
    Json(body): Json<ReviewRequest>,
) -> AppResult<Json<serde_json::Value>> {
    let outcome = state
        .validation
        .mark_error_as_reviewed(&state.pool, outcome_id, &body.reviewer, &body.notes)
        .await?;
    Ok(Json(serde_json::json!({ "data": outcome })))
}

/// Request body for suppressing a warning.
#[derive(Debug, Deserialize)]
pub struct SuppressRequest {
    pub reason: String,
    #[serde(default = "default_reviewer")]
    pub reviewer: String,
}

fn default_reviewer() -> String {
    "system".to_string()
}

/// POST /api/v1/outcomes/{id}/suppress
///
/// Suppress a warning. Returns 400 when the outcome is an error.
pub async fn suppress_warning(
    State(state): State<AppState>,
    Path(outcome_id): Path<DbId>,
    Json(body): Json<SuppressRequest>,
) -> AppResult<Json<serde_json::Value>> {
    let outcome = state
        .validation
        .suppress_warning(&state.pool, outcome_id, &body.reason, &body.reviewer)
        .await?;
    Ok(Json(serde_json::json!({ "data": outcome })))
}

/// Request body for bulk review.
#[derive(Debug, Deserialize)]
pub struct BulkReviewRequest {
    pub outcome_ids: Vec<DbId>,
    pub reviewer: String,
    pub notes: String,
}

/// POST /api/v1/outcomes/bulk-review
///
/// Mark many outcomes as reviewed with shared notes. Unknown ids are
/// skipped; the response carries the number actually reviewed.
pub async fn bulk_review(
    State(state): State<AppState>,
    Json(body): Json<BulkReviewRequest>,
) -> AppResult<Json<serde_json::Value>> {
    let reviewed = state
        .validation
        .bulk_review_errors(&state.pool, &body.outcome_ids, &body.reviewer, &body.notes)
        .await?;
    Ok(Json(serde_json::json!({ "data": { "reviewed": reviewed } })))
}

/// GET /api/v1/uploads/{id}/review/summary
///
/// Review status counts; `ready_for_export` gates the export flow.
pub async fn review_summary(
    State(state): State<AppState>,
    Path(upload_id): Path<DbId>,
) -> AppResult<Json<serde_json::Value>> {
    let summary = state
        .validation
        .get_review_summary(&state.pool, upload_id)
        .await?;
    Ok(Json(serde_json::json!({ "data": summary })))
}

/// GET /api/v1/uploads/{id}/review/unreviewed-errors
pub async fn unreviewed_errors(
    State(state): State<AppState>,
    Path(upload_id): Path<DbId>,
) -> AppResult<Json<serde_json::Value>> {
    let errors = state
        .validation
        .get_unreviewed_errors(&state.pool, upload_id)
        .await?;
    Ok(Json(serde_json::json!({ "data": errors })))
}

/// GET /api/v1/uploads/{id}/review/reviewed-items
pub async fn reviewed_items(
    State(state): State<AppState>,
    Path(upload_id): Path<DbId>,
) -> AppResult<Json<serde_json::Value>> {
    let items = state
        .validation
        .get_reviewed_items(&state.pool, upload_id)
        .await?;
    Ok(Json(serde_json::json!({ "data": items })))
}

/// GET /api/v1/uploads/{id}/review/pass-rate
///
/// Final pass rate after human review.
pub async fn final_pass_rate(
    State(state): State<AppState>,
    Path(upload_id): Path<DbId>,
) -> AppResult<Json<serde_json::Value>> {
    let pass_rate = state
        .validation
        .calculate_final_pass_rate(&state.pool, upload_id)
        .await?;
    Ok(Json(serde_json::json!({ "data": { "final_pass_rate": pass_rate } })))
}
