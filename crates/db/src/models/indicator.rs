//! Models for matched indicators (written by the matching collaborator).

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use verdant_core::types::{DbId, Timestamp};

/// A row from the `matched_indicators` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct MatchedIndicator {
    pub id: DbId,
    pub upload_id: DbId,
    pub original_header: String,
    pub canonical_indicator: String,
    pub confidence_score: f64,
    pub reviewed: bool,
    pub reviewer_notes: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for creating a matched indicator.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateMatchedIndicator {
    pub upload_id: DbId,
    pub original_header: String,
    pub canonical_indicator: String,
    pub confidence_score: f64,
    pub reviewed: Option<bool>,
}
