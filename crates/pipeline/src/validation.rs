//! Validation runs, outcome persistence, and the reviewer workflow.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use sqlx::PgPool;

use verdant_core::audit::{actions, entities};
use verdant_core::error::CoreError;
use verdant_core::review::{self, ReviewSummary};
use verdant_core::types::{DbId, Timestamp};
use verdant_core::validation::report::{recommendations, summarize, OutcomeKey, ValidationSummary};
use verdant_core::validation::{Finding, NormalizedRecord, Severity, ValidationEngine};
use verdant_db::models::audit::CreateAuditEntry;
use verdant_db::models::measurement::MeasurementWithIndicator;
use verdant_db::models::outcome::{CreateOutcome, ValidationOutcome};
use verdant_db::repositories::{AuditRepo, MeasurementRepo, OutcomeRepo};

use crate::error::{PipelineError, PipelineResult};

/// Reviewed outcomes of an upload, split the way reviewers consume them.
#[derive(Debug, Clone, Serialize)]
pub struct ReviewedItems {
    pub reviewed_errors: Vec<ValidationOutcome>,
    pub suppressed_warnings: Vec<ValidationOutcome>,
}

/// Detailed outcome counts for one upload.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationStatistics {
    pub total_outcomes: u64,
    pub errors: u64,
    pub warnings: u64,
    pub rules_applied: Vec<String>,
}

/// An outcome enriched with the catalog's suggested fixes.
#[derive(Debug, Clone, Serialize)]
pub struct EnrichedOutcome {
    #[serde(flatten)]
    pub outcome: ValidationOutcome,
    pub suggested_fixes: Vec<String>,
}

/// Full validation report for reporting collaborators.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    pub upload_id: DbId,
    pub summary: ValidationSummary,
    pub errors: Vec<EnrichedOutcome>,
    pub warnings: Vec<EnrichedOutcome>,
    pub recommendations: Vec<String>,
    pub generated_at: Timestamp,
}

/// Orchestrates validation runs and the review lifecycle.
pub struct ValidationService {
    engine: Arc<ValidationEngine>,
}

impl ValidationService {
    pub fn new(engine: Arc<ValidationEngine>) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &ValidationEngine {
        &self.engine
    }

    /// Validate all normalized measurements of an upload.
    ///
    /// Measurements are grouped by indicator and each group runs through
    /// `validate_batch`, so outlier and cross-field comparisons stay
    /// scoped within an indicator rather than mixing unrelated metrics.
    /// The run is purge-and-replace: prior outcomes for the upload are
    /// dropped and the new set inserted in one transaction, which makes
    /// repeat validation idempotent.
    pub async fn validate_upload(
        &self,
        pool: &PgPool,
        upload_id: DbId,
        industry: &str,
    ) -> PipelineResult<ValidationSummary> {
        let measurements = MeasurementRepo::list_for_upload(pool, upload_id).await?;
        if measurements.is_empty() {
            return Err(PipelineError::Core(CoreError::NotFound {
                entity: "NormalizedData",
                id: upload_id,
            }));
        }

        let mut groups: BTreeMap<String, Vec<NormalizedRecord>> = BTreeMap::new();
        for measurement in &measurements {
            groups
                .entry(measurement.canonical_indicator.clone())
                .or_default()
                .push(to_engine_record(measurement));
        }

        let mut findings: Vec<Finding> = Vec::new();
        for records in groups.values() {
            for group_findings in self.engine.validate_batch(records, industry).into_values() {
                findings.extend(group_findings);
            }
        }

        let outcomes: Vec<CreateOutcome> = findings.iter().map(CreateOutcome::from).collect();
        OutcomeRepo::replace_for_upload(pool, upload_id, &outcomes).await?;

        let summary = summarize(measurements.len() as u64, &finding_keys(&findings));

        tracing::info!(
            upload_id,
            industry,
            total_records = summary.total_records,
            records_with_errors = summary.records_with_errors,
            records_with_warnings = summary.records_with_warnings,
            "Validation run finished"
        );

        self.append_audit(
            pool,
            entities::UPLOAD,
            upload_id,
            actions::VALIDATE,
            "system",
            serde_json::json!({
                "industry": industry,
                "total_records": summary.total_records,
                "records_with_errors": summary.records_with_errors,
                "records_with_warnings": summary.records_with_warnings,
                "validation_pass_rate": summary.validation_pass_rate,
            }),
        )
        .await;

        Ok(summary)
    }

    /// Re-run single-record checks for one measurement, replacing its
    /// outcomes (and resetting their review state) in one transaction.
    pub async fn revalidate_record(
        &self,
        pool: &PgPool,
        data_id: DbId,
        industry: &str,
    ) -> PipelineResult<Vec<Finding>> {
        let measurement =
            MeasurementRepo::find_by_id(pool, data_id)
                .await?
                .ok_or(CoreError::NotFound {
                    entity: "NormalizedMeasurement",
                    id: data_id,
                })?;

        let record = to_engine_record(&measurement);
        let findings = self.engine.validate_record(&record, industry);
        let outcomes: Vec<CreateOutcome> = findings.iter().map(CreateOutcome::from).collect();
        OutcomeRepo::replace_for_record(pool, data_id, &outcomes).await?;

        self.append_audit(
            pool,
            entities::MEASUREMENT,
            data_id,
            actions::REVALIDATE,
            "system",
            serde_json::json!({ "industry": industry, "outcomes": outcomes.len() }),
        )
        .await;

        Ok(findings)
    }

    // -- Listings -------------------------------------------------------

    pub async fn get_validation_errors(
        &self,
        pool: &PgPool,
        upload_id: DbId,
    ) -> PipelineResult<Vec<ValidationOutcome>> {
        Ok(OutcomeRepo::list_by_severity(pool, upload_id, "error", None).await?)
    }

    pub async fn get_validation_warnings(
        &self,
        pool: &PgPool,
        upload_id: DbId,
    ) -> PipelineResult<Vec<ValidationOutcome>> {
        Ok(OutcomeRepo::list_by_severity(pool, upload_id, "warning", None).await?)
    }

    /// Errors still blocking export readiness.
    pub async fn get_unreviewed_errors(
        &self,
        pool: &PgPool,
        upload_id: DbId,
    ) -> PipelineResult<Vec<ValidationOutcome>> {
        Ok(OutcomeRepo::list_by_severity(pool, upload_id, "error", Some(false)).await?)
    }

    // -- Reviewer actions -----------------------------------------------

    /// Mark an outcome as reviewed. Legal for any severity; the notes
    /// must carry content. Concurrent reviewer writes are last-write-wins,
    /// each leaving its own audit entry.
    pub async fn mark_error_as_reviewed(
        &self,
        pool: &PgPool,
        outcome_id: DbId,
        reviewer: &str,
        notes: &str,
    ) -> PipelineResult<ValidationOutcome> {
        review::validate_reviewer_notes(notes)?;

        let outcome = OutcomeRepo::mark_reviewed(pool, outcome_id, notes)
            .await?
            .ok_or(CoreError::NotFound {
                entity: "ValidationOutcome",
                id: outcome_id,
            })?;

        self.append_audit(
            pool,
            entities::OUTCOME,
            outcome_id,
            actions::REVIEW,
            reviewer,
            serde_json::json!({
                "rule_name": outcome.rule_name,
                "severity": outcome.severity,
                "notes": notes,
            }),
        )
        .await;

        Ok(outcome)
    }

    /// Suppress a warning. Rejected for errors -- those must go through
    /// [`Self::mark_error_as_reviewed`] so a justification is recorded.
    pub async fn suppress_warning(
        &self,
        pool: &PgPool,
        outcome_id: DbId,
        reason: &str,
        reviewer: &str,
    ) -> PipelineResult<ValidationOutcome> {
        review::validate_reviewer_notes(reason)?;

        let existing = OutcomeRepo::find_by_id(pool, outcome_id)
            .await?
            .ok_or(CoreError::NotFound {
                entity: "ValidationOutcome",
                id: outcome_id,
            })?;

        if existing.severity() == Severity::Error {
            return Err(PipelineError::Core(CoreError::Validation(
                "Cannot suppress errors, only warnings. Use mark_error_as_reviewed for errors."
                    .to_string(),
            )));
        }

        let notes = review::suppression_notes(reason);
        let outcome = OutcomeRepo::mark_reviewed(pool, outcome_id, &notes)
            .await?
            .ok_or(CoreError::NotFound {
                entity: "ValidationOutcome",
                id: outcome_id,
            })?;

        self.append_audit(
            pool,
            entities::OUTCOME,
            outcome_id,
            actions::SUPPRESS,
            reviewer,
            serde_json::json!({ "rule_name": outcome.rule_name, "reason": reason }),
        )
        .await;

        Ok(outcome)
    }

    /// Mark many outcomes as reviewed with shared notes. Unknown ids are
    /// skipped; the count of successful reviews is returned.
    pub async fn bulk_review_errors(
        &self,
        pool: &PgPool,
        outcome_ids: &[DbId],
        reviewer: &str,
        notes: &str,
    ) -> PipelineResult<u64> {
        review::validate_reviewer_notes(notes)?;

        let mut count = 0u64;
        for &outcome_id in outcome_ids {
            match self.mark_error_as_reviewed(pool, outcome_id, reviewer, notes).await {
                Ok(_) => count += 1,
                Err(PipelineError::Core(CoreError::NotFound { .. })) => continue,
                Err(err) => return Err(err),
            }
        }

        tracing::info!(
            requested = outcome_ids.len(),
            reviewed = count,
            reviewer,
            "Bulk review finished"
        );

        Ok(count)
    }

    // -- Review metrics -------------------------------------------------

    /// Pass rate after human review: only records still carrying
    /// unreviewed errors count against it.
    pub async fn calculate_final_pass_rate(
        &self,
        pool: &PgPool,
        upload_id: DbId,
    ) -> PipelineResult<f64> {
        let total = MeasurementRepo::count_for_upload(pool, upload_id).await?;
        let unreviewed =
            OutcomeRepo::count_records_with_unreviewed_errors(pool, upload_id).await?;
        Ok(review::final_pass_rate(total, unreviewed))
    }

    /// Review status counts; callers must block export while
    /// `ready_for_export` is false.
    pub async fn get_review_summary(
        &self,
        pool: &PgPool,
        upload_id: DbId,
    ) -> PipelineResult<ReviewSummary> {
        let outcomes = OutcomeRepo::list_for_upload(pool, upload_id).await?;

        let mut total_errors = 0u64;
        let mut reviewed_errors = 0u64;
        let mut total_warnings = 0u64;
        let mut suppressed_warnings = 0u64;
        for outcome in &outcomes {
            match outcome.severity() {
                Severity::Error => {
                    total_errors += 1;
                    if outcome.reviewed {
                        reviewed_errors += 1;
                    }
                }
                Severity::Warning => {
                    total_warnings += 1;
                    if outcome.reviewed {
                        suppressed_warnings += 1;
                    }
                }
            }
        }

        let final_pass_rate = self.calculate_final_pass_rate(pool, upload_id).await?;
        Ok(ReviewSummary::from_counts(
            total_errors,
            reviewed_errors,
            total_warnings,
            suppressed_warnings,
            final_pass_rate,
        ))
    }

    /// Reviewed errors and suppressed warnings of an upload.
    pub async fn get_reviewed_items(
        &self,
        pool: &PgPool,
        upload_id: DbId,
    ) -> PipelineResult<ReviewedItems> {
        let outcomes = OutcomeRepo::list_reviewed(pool, upload_id).await?;
        let mut items = ReviewedItems {
            reviewed_errors: Vec::new(),
            suppressed_warnings: Vec::new(),
        };
        for outcome in outcomes {
            match outcome.severity() {
                Severity::Error => items.reviewed_errors.push(outcome),
                Severity::Warning => items.suppressed_warnings.push(outcome),
            }
        }
        Ok(items)
    }

    /// Outcome counts and the distinct rules that fired.
    pub async fn get_validation_statistics(
        &self,
        pool: &PgPool,
        upload_id: DbId,
    ) -> PipelineResult<ValidationStatistics> {
        let outcomes = OutcomeRepo::list_for_upload(pool, upload_id).await?;

        let errors = outcomes.iter().filter(|o| o.severity() == Severity::Error).count() as u64;
        let mut rules_applied: Vec<String> =
            outcomes.iter().map(|o| o.rule_name.clone()).collect();
        rules_applied.sort();
        rules_applied.dedup();

        Ok(ValidationStatistics {
            total_outcomes: outcomes.len() as u64,
            errors,
            warnings: outcomes.len() as u64 - errors,
            rules_applied,
        })
    }

    /// Full report: summary, enriched error/warning lists, and
    /// deterministic recommendations.
    pub async fn generate_validation_report(
        &self,
        pool: &PgPool,
        upload_id: DbId,
    ) -> PipelineResult<ValidationReport> {
        let total_records = MeasurementRepo::count_for_upload(pool, upload_id).await?;
        let outcomes = OutcomeRepo::list_for_upload(pool, upload_id).await?;

        let keys: Vec<OutcomeKey> = outcomes
            .iter()
            .map(|outcome| OutcomeKey {
                data_id: outcome.data_id,
                rule_name: outcome.rule_name.clone(),
                severity: outcome.severity(),
            })
            .collect();
        let summary = summarize(total_records, &keys);
        let recommendations = recommendations(&summary);

        let mut errors = Vec::new();
        let mut warnings = Vec::new();
        for outcome in outcomes {
            let enriched = self.enrich(outcome);
            match enriched.outcome.severity() {
                Severity::Error => errors.push(enriched),
                Severity::Warning => warnings.push(enriched),
            }
        }

        Ok(ValidationReport {
            upload_id,
            summary,
            errors,
            warnings,
            recommendations,
            generated_at: chrono::Utc::now(),
        })
    }

    /// Attach the catalog's suggested fixes, and fall back to its
    /// citation when the stored one is empty.
    fn enrich(&self, mut outcome: ValidationOutcome) -> EnrichedOutcome {
        let rule = self.engine.catalog().rule_by_name(&outcome.rule_name);
        let suggested_fixes = rule.map(|r| r.suggested_fixes.clone()).unwrap_or_default();
        if outcome.citation.is_empty() {
            if let Some(rule) = rule {
                outcome.citation = rule.citation.clone();
            }
        }
        EnrichedOutcome {
            outcome,
            suggested_fixes,
        }
    }

    async fn append_audit(
        &self,
        pool: &PgPool,
        entity_type: &str,
        entity_id: DbId,
        action: &str,
        actor: &str,
        changes: serde_json::Value,
    ) {
        let entry = CreateAuditEntry {
            entity_type: entity_type.to_string(),
            entity_id,
            action: action.to_string(),
            actor: actor.to_string(),
            changes,
        };
        if let Err(err) = AuditRepo::append(pool, &entry).await {
            tracing::warn!(error = %err, entity_id, action, "Failed to append audit entry");
        }
    }
}

/// View a stored measurement the way the engine expects it.
fn to_engine_record(measurement: &MeasurementWithIndicator) -> NormalizedRecord {
    NormalizedRecord {
        id: measurement.id,
        indicator: measurement.canonical_indicator.clone(),
        value: measurement.normalized_value,
        unit: measurement.normalized_unit.clone(),
        original_value: measurement.original_value,
        original_unit: measurement.original_unit.clone(),
        facility_id: None,
        reporting_period: None,
        metadata: serde_json::Map::new(),
    }
}

fn finding_keys(findings: &[Finding]) -> Vec<OutcomeKey> {
    findings
        .iter()
        .map(|finding| OutcomeKey {
            data_id: finding.data_id,
            rule_name: finding.rule_name.clone(),
            severity: finding.severity,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn measurement(id: DbId, indicator: &str, value: f64) -> MeasurementWithIndicator {
        MeasurementWithIndicator {
            id,
            upload_id: 1,
            indicator_id: 10,
            canonical_indicator: indicator.to_string(),
            row_index: 0,
            original_value: value,
            original_unit: "kg CO₂/tonne".to_string(),
            normalized_value: value,
            normalized_unit: "kg CO₂/tonne".to_string(),
            conversion_factor: 1.0,
            conversion_source: "No conversion needed".to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn engine_record_uses_normalized_values() {
        let m = measurement(3, "Scope 1 GHG Emissions per tonne clinker", 950.0);
        let record = to_engine_record(&m);
        assert_eq!(record.id, 3);
        assert_eq!(record.indicator, "Scope 1 GHG Emissions per tonne clinker");
        assert_eq!(record.value, 950.0);
        assert_eq!(record.unit, "kg CO₂/tonne");
    }

    #[test]
    fn finding_keys_carry_severity() {
        let findings = vec![Finding {
            data_id: 1,
            rule_name: "cement_emission_range".to_string(),
            severity: Severity::Error,
            message: String::new(),
            citation: String::new(),
            suggested_fixes: vec![],
            actual_value: None,
            expected_range: None,
        }];
        let keys = finding_keys(&findings);
        assert_eq!(keys.len(), 1);
        assert_eq!(keys[0].severity, Severity::Error);
    }
}
