//! Repository for normalized measurements.

use sqlx::PgPool;
use verdant_core::types::DbId;

use crate::models::measurement::{
    CreateMeasurement, MeasurementWithIndicator, NormalizedMeasurement, UnitConflict,
};

/// Column list for `normalized_measurements` queries.
const MEASUREMENT_COLUMNS: &str = "id, upload_id, indicator_id, row_index, original_value, \
     original_unit, normalized_value, normalized_unit, conversion_factor, conversion_source, \
     created_at";

/// Column list for measurement queries joined with `matched_indicators`.
const JOINED_COLUMNS: &str = "nm.id, nm.upload_id, nm.indicator_id, mi.canonical_indicator, \
     nm.row_index, nm.original_value, nm.original_unit, nm.normalized_value, \
     nm.normalized_unit, nm.conversion_factor, nm.conversion_source, nm.created_at";

/// Read/write access to the `normalized_measurements` table.
pub struct MeasurementRepo;

impl MeasurementRepo {
    /// Replace an indicator's measurements in one transaction.
    ///
    /// Measurement rows are immutable, so a normalization re-run deletes
    /// the superseded rows and recreates them. The per-indicator
    /// transaction keeps one bad column from invalidating the rest of the
    /// upload. Returns the number of inserted rows.
    pub async fn replace_for_indicator(
        pool: &PgPool,
        upload_id: DbId,
        indicator_id: DbId,
        rows: &[CreateMeasurement],
    ) -> Result<u64, sqlx::Error> {
        tracing::debug!(upload_id, indicator_id, rows = rows.len(), "Replacing measurements");

        let mut tx = pool.begin().await?;

        sqlx::query(
            "DELETE FROM normalized_measurements WHERE upload_id = $1 AND indicator_id = $2",
        )
        .bind(upload_id)
        .bind(indicator_id)
        .execute(&mut *tx)
        .await?;

        for row in rows {
            sqlx::query(
                "INSERT INTO normalized_measurements \
                     (upload_id, indicator_id, row_index, original_value, original_unit, \
                      normalized_value, normalized_unit, conversion_factor, conversion_source) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
            )
            .bind(row.upload_id)
            .bind(row.indicator_id)
            .bind(row.row_index)
            .bind(row.original_value)
            .bind(&row.original_unit)
            .bind(row.normalized_value)
            .bind(&row.normalized_unit)
            .bind(row.conversion_factor)
            .bind(&row.conversion_source)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(rows.len() as u64)
    }

    /// Fetch one measurement (with indicator name) by id.
    pub async fn find_by_id(
        pool: &PgPool,
        id: DbId,
    ) -> Result<Option<MeasurementWithIndicator>, sqlx::Error> {
        let sql = format!(
            "SELECT {JOINED_COLUMNS} \
             FROM normalized_measurements nm \
             JOIN matched_indicators mi ON mi.id = nm.indicator_id \
             WHERE nm.id = $1"
        );
        sqlx::query_as::<_, MeasurementWithIndicator>(&sql)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// All measurements of an upload (with indicator names), ordered by id.
    pub async fn list_for_upload(
        pool: &PgPool,
        upload_id: DbId,
    ) -> Result<Vec<MeasurementWithIndicator>, sqlx::Error> {
        let sql = format!(
            "SELECT {JOINED_COLUMNS} \
             FROM normalized_measurements nm \
             JOIN matched_indicators mi ON mi.id = nm.indicator_id \
             WHERE nm.upload_id = $1 \
             ORDER BY nm.id"
        );
        sqlx::query_as::<_, MeasurementWithIndicator>(&sql)
            .bind(upload_id)
            .fetch_all(pool)
            .await
    }

    /// An indicator's measurements, ordered by row index.
    pub async fn list_for_indicator(
        pool: &PgPool,
        indicator_id: DbId,
    ) -> Result<Vec<NormalizedMeasurement>, sqlx::Error> {
        let sql = format!(
            "SELECT {MEASUREMENT_COLUMNS} FROM normalized_measurements \
             WHERE indicator_id = $1 ORDER BY row_index"
        );
        sqlx::query_as::<_, NormalizedMeasurement>(&sql)
            .bind(indicator_id)
            .fetch_all(pool)
            .await
    }

    /// Number of measurements stored for an upload.
    pub async fn count_for_upload(pool: &PgPool, upload_id: DbId) -> Result<u64, sqlx::Error> {
        let count: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM normalized_measurements WHERE upload_id = $1")
                .bind(upload_id)
                .fetch_one(pool)
                .await?;
        Ok(count.0 as u64)
    }

    /// Indicators whose measurements carry more than one distinct
    /// original unit, with the units involved.
    pub async fn unit_conflicts(
        pool: &PgPool,
        upload_id: DbId,
    ) -> Result<Vec<UnitConflict>, sqlx::Error> {
        sqlx::query_as::<_, UnitConflict>(
            "SELECT mi.canonical_indicator, nm.original_unit \
             FROM normalized_measurements nm \
             JOIN matched_indicators mi ON mi.id = nm.indicator_id \
             WHERE nm.upload_id = $1 \
               AND nm.indicator_id IN ( \
                   SELECT indicator_id FROM normalized_measurements \
                   WHERE upload_id = $1 \
                   GROUP BY indicator_id \
                   HAVING COUNT(DISTINCT original_unit) > 1) \
             GROUP BY mi.canonical_indicator, nm.original_unit \
             ORDER BY mi.canonical_indicator, nm.original_unit",
        )
        .bind(upload_id)
        .fetch_all(pool)
        .await
    }
}
