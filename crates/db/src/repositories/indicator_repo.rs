//! Repository for matched indicators.

use sqlx::PgPool;
use verdant_core::types::DbId;

use crate::models::indicator::{CreateMatchedIndicator, MatchedIndicator};

/// Column list for `matched_indicators` queries.
const INDICATOR_COLUMNS: &str = "id, upload_id, original_header, canonical_indicator, \
     confidence_score, reviewed, reviewer_notes, created_at, updated_at";

/// Read/write access to the `matched_indicators` table.
///
/// Rows are produced by the header-matching collaborator; this core
/// creates them only in tests and fixtures.
pub struct IndicatorRepo;

impl IndicatorRepo {
    /// Create a matched indicator, returning the inserted row.
    pub async fn create(
        pool: &PgPool,
        input: &CreateMatchedIndicator,
    ) -> Result<MatchedIndicator, sqlx::Error> {
        let sql = format!(
            "INSERT INTO matched_indicators \
                 (upload_id, original_header, canonical_indicator, confidence_score, reviewed) \
             VALUES ($1, $2, $3, $4, COALESCE($5, false)) \
             RETURNING {INDICATOR_COLUMNS}"
        );
        sqlx::query_as::<_, MatchedIndicator>(&sql)
            .bind(input.upload_id)
            .bind(&input.original_header)
            .bind(&input.canonical_indicator)
            .bind(input.confidence_score)
            .bind(input.reviewed)
            .fetch_one(pool)
            .await
    }

    /// Fetch an indicator by id.
    pub async fn find_by_id(
        pool: &PgPool,
        id: DbId,
    ) -> Result<Option<MatchedIndicator>, sqlx::Error> {
        let sql = format!("SELECT {INDICATOR_COLUMNS} FROM matched_indicators WHERE id = $1");
        sqlx::query_as::<_, MatchedIndicator>(&sql)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// All indicators of an upload, ordered by id.
    pub async fn list_for_upload(
        pool: &PgPool,
        upload_id: DbId,
    ) -> Result<Vec<MatchedIndicator>, sqlx::Error> {
        let sql = format!(
            "SELECT {INDICATOR_COLUMNS} FROM matched_indicators \
             WHERE upload_id = $1 ORDER BY id"
        );
        sqlx::query_as::<_, MatchedIndicator>(&sql)
            .bind(upload_id)
            .fetch_all(pool)
            .await
    }
}
