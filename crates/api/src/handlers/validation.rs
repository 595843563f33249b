//! Handlers for validation runs, reports, and statistics.

use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use verdant_core::types::DbId;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Request body naming the industry whose rules apply.
#[derive(Debug, Deserialize)]
pub struct ValidateRequest {
    pub industry: String,
}

/// POST /api/v1/uploads/{id}/validate
///
/// Validate all normalized measurements of an upload against the
/// industry's rules. Replaces any outcomes of a previous run.
pub async fn validate_upload(
    State(state): State<AppState>,
    Path(upload_id): Path<DbId>,
    Json(body): Json<ValidateRequest>,
) -> AppResult<Json<serde_json::Value>> {
    if body.industry.trim().is_empty() {
        return Err(AppError::BadRequest("industry must not be empty".to_string()));
    }

    let summary = state
        .validation
        .validate_upload(&state.pool, upload_id, &body.industry)
        .await?;
    Ok(Json(serde_json::json!({ "data": summary })))
}

/// POST /api/v1/records/{id}/revalidate
///
/// Re-run validation for one measurement, resetting its review state.
pub async fn revalidate_record(
    State(state): State<AppState>,
    Path(data_id): Path<DbId>,
    Json(body): Json<ValidateRequest>,
) -> AppResult<Json<serde_json::Value>> {
    let findings = state
        .validation
        .revalidate_record(&state.pool, data_id, &body.industry)
        .await?;
    Ok(Json(serde_json::json!({ "data": findings })))
}

/// GET /api/v1/uploads/{id}/validation/report
///
/// Full validation report: summary, enriched outcome lists, and
/// recommendations.
pub async fn validation_report(
    State(state): State<AppState>,
    Path(upload_id): Path<DbId>,
) -> AppResult<Json<serde_json::Value>> {
    let report = state
        .validation
        .generate_validation_report(&state.pool, upload_id)
        .await?;
    Ok(Json(serde_json::json!({ "data": report })))
}

/// GET /api/v1/uploads/{id}/validation/statistics
pub async fn validation_statistics(
    State(state): State<AppState>,
    Path(upload_id): Path<DbId>,
) -> AppResult<Json<serde_json::Value>> {
    let statistics = state
        .validation
        .get_validation_statistics(&state.pool, upload_id)
        .await?;
    Ok(Json(serde_json::json!({ "data": statistics })))
}

/// GET /api/v1/uploads/{id}/validation/errors
pub async fn validation_errors(
    State(state): State<AppState>,
    Path(upload_id): Path<DbId>,
) -> AppResult<Json<serde_json::Value>> {
    let errors = state
        .validation
        .get_validation_errors(&state.pool, upload_id)
        .await?;
    Ok(Json(serde_json::json!({ "data": errors })))
}

/// GET /api/v1/uploads/{id}/validation/warnings
pub async fn validation_warnings(
    State(state): State<AppState>,
    Path(upload_id): Path<DbId>,
) -> AppResult<Json<serde_json::Value>> {
    let warnings = state
        .validation
        .get_validation_warnings(&state.pool, upload_id)
        .await?;
    Ok(Json(serde_json::json!({ "data": warnings })))
}

/// GET /api/v1/validation/rules/summary
///
/// Counts describing the loaded rule catalog.
pub async fn rules_summary(State(state): State<AppState>) -> AppResult<Json<serde_json::Value>> {
    let summary = state.validation.engine().catalog().summary();
    Ok(Json(serde_json::json!({ "data": summary })))
}
