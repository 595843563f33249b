//! Models for normalized measurements.
//!
//! Measurement rows are immutable: a re-run of normalization deletes and
//! recreates them, it never updates in place.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use verdant_core::types::{DbId, Timestamp};

/// A row from the `normalized_measurements` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct NormalizedMeasurement {
    pub id: DbId,
    pub upload_id: DbId,
    pub indicator_id: DbId,
    pub row_index: i32,
    pub original_value: f64,
    pub original_unit: String,
    pub normalized_value: f64,
    pub normalized_unit: String,
    pub conversion_factor: f64,
    pub conversion_source: String,
    pub created_at: Timestamp,
}

/// A measurement joined with its indicator's canonical name.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct MeasurementWithIndicator {
    pub id: DbId,
    pub upload_id: DbId,
    pub indicator_id: DbId,
    /// Populated from `matched_indicators.canonical_indicator` via JOIN.
    pub canonical_indicator: String,
    pub row_index: i32,
    pub original_value: f64,
    pub original_unit: String,
    pub normalized_value: f64,
    pub normalized_unit: String,
    pub conversion_factor: f64,
    pub conversion_source: String,
    pub created_at: Timestamp,
}

/// DTO for inserting a measurement.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateMeasurement {
    pub upload_id: DbId,
    pub indicator_id: DbId,
    pub row_index: i32,
    pub original_value: f64,
    pub original_unit: String,
    pub normalized_value: f64,
    pub normalized_unit: String,
    pub conversion_factor: f64,
    pub conversion_source: String,
}

/// One indicator whose measurements carry more than one original unit.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct UnitConflict {
    pub canonical_indicator: String,
    pub original_unit: String,
}
