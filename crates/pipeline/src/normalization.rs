//! Normalization runs: per-indicator unit detection, bulk conversion,
//! statistics, and partial-failure handling.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use verdant_core::audit::{actions, entities};
use verdant_core::error::CoreError;
use verdant_core::types::DbId;
use verdant_core::units::{detect_column_unit, DetectionConfig, UnitNormalizer};
use verdant_db::models::audit::CreateAuditEntry;
use verdant_db::models::measurement::CreateMeasurement;
use verdant_db::repositories::{AuditRepo, MeasurementRepo, UploadRepo};

use crate::error::{PipelineError, PipelineResult};

/// One raw indicator column, as supplied by the ingestion and matching
/// collaborators. `values` keeps the original cells, explicit nulls and
/// non-numeric entries included, so row indices line up with the source.
#[derive(Debug, Clone, Deserialize)]
pub struct RawColumn {
    pub indicator_id: DbId,
    pub header: String,
    pub canonical_indicator: String,
    pub values: Vec<serde_json::Value>,
}

/// An indicator the run had to reject, with the reason reviewers see.
#[derive(Debug, Clone, Serialize)]
pub struct IndicatorFailure {
    pub indicator: String,
    pub header: String,
    pub reason: String,
}

/// Statistics for one normalization run.
#[derive(Debug, Clone, Serialize)]
pub struct NormalizationSummary {
    /// Numeric values seen across all columns.
    pub total_values: u64,
    pub normalized: u64,
    pub failed: u64,
    /// Distinct original units encountered, sorted.
    pub distinct_units: Vec<String>,
    /// `from->to` conversion histogram.
    pub conversions: BTreeMap<String, u64>,
    pub failures: Vec<IndicatorFailure>,
}

/// Orchestrates normalization for one upload at a time.
pub struct NormalizationService {
    normalizer: Arc<UnitNormalizer>,
    detection: DetectionConfig,
}

impl NormalizationService {
    pub fn new(normalizer: Arc<UnitNormalizer>) -> Self {
        Self {
            normalizer,
            detection: DetectionConfig::default(),
        }
    }

    /// Override the unit-detection thresholds.
    pub fn with_detection_config(mut self, detection: DetectionConfig) -> Self {
        self.detection = detection;
        self
    }

    pub fn normalizer(&self) -> &UnitNormalizer {
        &self.normalizer
    }

    /// Normalize all raw columns of an upload.
    ///
    /// The upload must exist and carry raw data, otherwise the whole run
    /// aborts. After that, failures are per indicator: a column whose unit
    /// cannot be determined (or whose persistence fails) is recorded and
    /// counted while the remaining columns keep processing. Each column
    /// commits in its own transaction, superseding any measurements a
    /// previous run produced for that indicator.
    pub async fn normalize_upload(
        &self,
        pool: &PgPool,
        upload_id: DbId,
        columns: &[RawColumn],
    ) -> PipelineResult<NormalizationSummary> {
        UploadRepo::find_by_id(pool, upload_id)
            .await?
            .ok_or(CoreError::NotFound {
                entity: "Upload",
                id: upload_id,
            })?;

        if columns.is_empty() {
            return Err(PipelineError::Core(CoreError::Validation(format!(
                "upload {upload_id} has no raw columns to normalize"
            ))));
        }

        let mut total_values = 0u64;
        let mut normalized = 0u64;
        let mut failed = 0u64;
        let mut distinct_units: BTreeSet<String> = BTreeSet::new();
        let mut conversions: BTreeMap<String, u64> = BTreeMap::new();
        let mut failures: Vec<IndicatorFailure> = Vec::new();

        for column in columns {
            let samples = numeric_samples(&column.values);
            let numeric_count = samples.len() as u64;
            total_values += numeric_count;

            // A column of nulls or text has nothing to normalize; that is
            // not a failure.
            if numeric_count == 0 {
                continue;
            }

            let Some(unit) =
                detect_column_unit(&self.normalizer, &column.header, &samples, &self.detection)
            else {
                tracing::warn!(
                    header = %column.header,
                    indicator = %column.canonical_indicator,
                    "No unit determinable, rejecting indicator"
                );
                failures.push(IndicatorFailure {
                    indicator: column.canonical_indicator.clone(),
                    header: column.header.clone(),
                    reason: format!(
                        "no unit could be determined from header '{}' or value magnitudes; \
                         manual review required",
                        column.header
                    ),
                });
                failed += numeric_count;
                continue;
            };

            let (rows, value_failures) = self.convert_column(upload_id, column, &unit);

            match MeasurementRepo::replace_for_indicator(pool, upload_id, column.indicator_id, &rows)
                .await
            {
                Ok(inserted) => {
                    normalized += inserted;
                    failed += value_failures;
                    for row in &rows {
                        distinct_units.insert(row.original_unit.clone());
                        let key = format!("{}->{}", row.original_unit, row.normalized_unit);
                        *conversions.entry(key).or_default() += 1;
                    }
                }
                Err(err) => {
                    // One bad column must not invalidate the rest of the
                    // upload; its transaction rolled back on drop.
                    tracing::error!(
                        error = %err,
                        header = %column.header,
                        "Failed to persist indicator measurements"
                    );
                    failures.push(IndicatorFailure {
                        indicator: column.canonical_indicator.clone(),
                        header: column.header.clone(),
                        reason: format!("failed to persist measurements: {err}"),
                    });
                    failed += numeric_count;
                }
            }
        }

        tracing::info!(
            upload_id,
            total_values,
            normalized,
            failed,
            "Normalization run finished"
        );

        let summary = NormalizationSummary {
            total_values,
            normalized,
            failed,
            distinct_units: distinct_units.into_iter().collect(),
            conversions,
            failures,
        };

        self.append_audit(pool, upload_id, &summary).await;

        Ok(summary)
    }

    /// Indicators whose stored measurements carry more than one distinct
    /// original unit -- surfaced to reviewers, never auto-resolved.
    pub async fn unit_conflicts(
        &self,
        pool: &PgPool,
        upload_id: DbId,
    ) -> PipelineResult<BTreeMap<String, Vec<String>>> {
        let rows = MeasurementRepo::unit_conflicts(pool, upload_id).await?;
        let mut conflicts: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for row in rows {
            conflicts
                .entry(row.canonical_indicator)
                .or_default()
                .push(row.original_unit);
        }
        Ok(conflicts)
    }

    /// Convert one column's numeric cells. Per-value conversion errors
    /// are counted and logged at debug level; they never fail the column.
    fn convert_column(
        &self,
        upload_id: DbId,
        column: &RawColumn,
        unit: &str,
    ) -> (Vec<CreateMeasurement>, u64) {
        let mut rows = Vec::new();
        let mut value_failures = 0u64;

        for (row_index, cell) in column.values.iter().enumerate() {
            let Some(value) = cell.as_f64() else {
                continue;
            };
            match self.normalizer.normalize(value, unit, None) {
                Ok(result) => rows.push(CreateMeasurement {
                    upload_id,
                    indicator_id: column.indicator_id,
                    row_index: row_index as i32,
                    original_value: value,
                    original_unit: result.original_unit,
                    normalized_value: result.normalized_value,
                    normalized_unit: result.normalized_unit,
                    conversion_factor: result.conversion_factor,
                    conversion_source: result.conversion_source,
                }),
                Err(err) => {
                    tracing::debug!(value, row_index, error = %err, "Value failed conversion");
                    value_failures += 1;
                }
            }
        }

        (rows, value_failures)
    }

    /// Audit failure is logged, never fatal to the run itself.
    async fn append_audit(&self, pool: &PgPool, upload_id: DbId, summary: &NormalizationSummary) {
        let entry = CreateAuditEntry {
            entity_type: entities::UPLOAD.to_string(),
            entity_id: upload_id,
            action: actions::NORMALIZE.to_string(),
            actor: "system".to_string(),
            changes: serde_json::json!({
                "total_values": summary.total_values,
                "normalized": summary.normalized,
                "failed": summary.failed,
                "rejected_indicators": summary.failures.len(),
            }),
        };
        if let Err(err) = AuditRepo::append(pool, &entry).await {
            tracing::warn!(error = %err, upload_id, "Failed to append audit entry");
        }
    }
}

/// The numeric cells of a column, in order. Nulls, strings, and booleans
/// are skipped.
fn numeric_samples(values: &[serde_json::Value]) -> Vec<f64> {
    values.iter().filter_map(|v| v.as_f64()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn numeric_samples_skip_non_numbers() {
        let values = vec![
            json!(1.5),
            json!(null),
            json!("n/a"),
            json!(2),
            json!(true),
            json!([]),
        ];
        assert_eq!(numeric_samples(&values), vec![1.5, 2.0]);
    }

    #[test]
    fn convert_column_counts_value_failures() {
        let taxonomy = verdant_core::units::UnitTaxonomy::from_json_str(include_str!(
            "../../../config/conversion_factors.json"
        ))
        .unwrap();
        let service = NormalizationService::new(Arc::new(UnitNormalizer::new(taxonomy)));

        let column = RawColumn {
            indicator_id: 7,
            header: "Energy Consumption (kWh)".to_string(),
            canonical_indicator: "Total Energy Consumption".to_string(),
            values: vec![json!(5000.0), json!(null), json!(-10.0), json!(2000.0)],
        };

        let (rows, failures) = service.convert_column(1, &column, "kWh");
        // -10 kWh is a negative absolute measure and fails; null is skipped.
        assert_eq!(rows.len(), 2);
        assert_eq!(failures, 1);
        assert_eq!(rows[0].row_index, 0);
        assert_eq!(rows[0].normalized_value, 5.0);
        assert_eq!(rows[0].normalized_unit, "MWh");
        assert_eq!(rows[1].row_index, 3);
    }
}
