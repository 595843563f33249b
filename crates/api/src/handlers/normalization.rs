//! Handlers for normalization runs and unit lookups.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use verdant_core::types::DbId;
use verdant_pipeline::normalization::RawColumn;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Request body for a normalization run: the upload's raw columns as
/// supplied by the ingestion/matching collaborators.
#[derive(Debug, Deserialize)]
pub struct NormalizeRequest {
    pub columns: Vec<RawColumn>,
}

/// POST /api/v1/uploads/{id}/normalize
///
/// Normalize all raw columns of an upload and return the run summary.
pub async fn normalize_upload(
    State(state): State<AppState>,
    Path(upload_id): Path<DbId>,
    Json(body): Json<NormalizeRequest>,
) -> AppResult<Json<serde_json::Value>> {
    if body.columns.is_empty() {
        return Err(AppError::BadRequest(
            "columns array must not be empty".to_string(),
        ));
    }

    let summary = state
        .normalization
        .normalize_upload(&state.pool, upload_id, &body.columns)
        .await?;
    Ok(Json(serde_json::json!({ "data": summary })))
}

/// GET /api/v1/uploads/{id}/normalization/conflicts
///
/// Indicators whose measurements carry more than one original unit.
pub async fn unit_conflicts(
    State(state): State<AppState>,
    Path(upload_id): Path<DbId>,
) -> AppResult<Json<serde_json::Value>> {
    let conflicts = state
        .normalization
        .unit_conflicts(&state.pool, upload_id)
        .await?;
    Ok(Json(serde_json::json!({ "data": conflicts })))
}

/// Query parameters for the supported-units listing.
#[derive(Debug, Deserialize)]
pub struct SupportedUnitsParams {
    pub category: Option<String>,
}

/// GET /api/v1/units?category=X
///
/// All supported units, optionally filtered by category.
pub async fn supported_units(
    State(state): State<AppState>,
    Query(params): Query<SupportedUnitsParams>,
) -> AppResult<Json<serde_json::Value>> {
    let units = state
        .normalization
        .normalizer()
        .supported_units(params.category.as_deref());
    Ok(Json(serde_json::json!({ "data": units })))
}
