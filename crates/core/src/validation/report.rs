//! Summary statistics and deterministic recommendations.
//!
//! Pure math over persisted outcomes, kept free of database types so both
//! the orchestration layer and tests can drive it directly.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::types::DbId;
use crate::validation::rules::Severity;

/// The identifying slice of a persisted outcome needed for summaries.
#[derive(Debug, Clone)]
pub struct OutcomeKey {
    pub data_id: DbId,
    pub rule_name: String,
    pub severity: Severity,
}

/// Summary statistics for one validation run.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationSummary {
    pub total_records: u64,
    /// Records with neither errors nor warnings.
    pub valid_records: u64,
    pub records_with_errors: u64,
    pub records_with_warnings: u64,
    /// Percentage of records without errors (warnings do not count).
    pub validation_pass_rate: f64,
    pub error_breakdown: BTreeMap<String, u64>,
    pub warning_breakdown: BTreeMap<String, u64>,
}

/// Round to two decimal places for rates shown to reviewers.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Compute summary statistics from the outcomes of one run.
pub fn summarize(total_records: u64, outcomes: &[OutcomeKey]) -> ValidationSummary {
    let mut records_with_errors: Vec<DbId> = Vec::new();
    let mut records_with_warnings: Vec<DbId> = Vec::new();
    let mut error_breakdown: BTreeMap<String, u64> = BTreeMap::new();
    let mut warning_breakdown: BTreeMap<String, u64> = BTreeMap::new();

    for outcome in outcomes {
        match outcome.severity {
            Severity::Error => {
                if !records_with_errors.contains(&outcome.data_id) {
                    records_with_errors.push(outcome.data_id);
                }
                *error_breakdown.entry(outcome.rule_name.clone()).or_default() += 1;
            }
            Severity::Warning => {
                if !records_with_warnings.contains(&outcome.data_id) {
                    records_with_warnings.push(outcome.data_id);
                }
                *warning_breakdown.entry(outcome.rule_name.clone()).or_default() += 1;
            }
        }
    }

    let flagged = {
        let mut all: Vec<DbId> = records_with_errors.clone();
        for id in &records_with_warnings {
            if !all.contains(id) {
                all.push(*id);
            }
        }
        all.len() as u64
    };

    let pass_rate = if total_records == 0 {
        100.0
    } else {
        total_records.saturating_sub(records_with_errors.len() as u64) as f64
            / total_records as f64
            * 100.0
    };

    ValidationSummary {
        total_records,
        valid_records: total_records.saturating_sub(flagged),
        records_with_errors: records_with_errors.len() as u64,
        records_with_warnings: records_with_warnings.len() as u64,
        validation_pass_rate: round2(pass_rate),
        error_breakdown,
        warning_breakdown,
    }
}

/// Deterministic, actionable recommendations for a validation summary.
///
/// Below a 50% pass rate the run gets a critical advisory; otherwise the
/// most frequent failing rule is surfaced (ties break alphabetically).
/// Rule-name substrings then flag the known failure clusters.
pub fn recommendations(summary: &ValidationSummary) -> Vec<String> {
    let mut recommendations = Vec::new();

    if summary.validation_pass_rate < 50.0 {
        recommendations.push(
            "Critical: more than half of the records failed validation. Review data \
             collection and entry processes before re-uploading."
                .to_string(),
        );
    } else if let Some((rule, count)) = most_frequent(&summary.error_breakdown) {
        recommendations.push(format!(
            "Most frequent failing rule: '{rule}' ({count} occurrences). Address this \
             rule first."
        ));
    }

    let failing_rules: Vec<&str> = summary
        .error_breakdown
        .keys()
        .chain(summary.warning_breakdown.keys())
        .map(String::as_str)
        .collect();
    let cluster = |needle: &str| failing_rules.iter().any(|rule| rule.contains(needle));

    if cluster("range") {
        recommendations.push(
            "Values outside expected ranges were detected. Check for unit conversion \
             errors or misplaced decimal points."
                .to_string(),
        );
    }
    if cluster("outlier") {
        recommendations.push(
            "Statistical outliers were detected. Review the highlighted values for data \
             entry errors or genuine anomalies."
                .to_string(),
        );
    }
    if cluster("temporal") || cluster("monthly") {
        recommendations.push(
            "Temporal consistency issues were found. Verify that monthly series \
             reconcile with annual totals."
                .to_string(),
        );
    }
    if cluster("scope") {
        recommendations.push(
            "Scope classification or reconciliation issues were found. Review GHG \
             Protocol guidance for emission source categorisation."
                .to_string(),
        );
    }

    if summary.records_with_errors == 0 && summary.records_with_warnings == 0 {
        recommendations.push(
            "All records passed validation. Data is ready for report generation.".to_string(),
        );
    } else if summary.records_with_errors == 0 {
        recommendations.push(
            "No errors found, only warnings. Review the warnings for data quality \
             improvements."
                .to_string(),
        );
    }

    recommendations
}

/// Highest-count entry; alphabetically first on ties (BTreeMap order).
fn most_frequent(breakdown: &BTreeMap<String, u64>) -> Option<(&str, u64)> {
    let mut best: Option<(&str, u64)> = None;
    for (rule, count) in breakdown {
        if best.map_or(true, |(_, best_count)| *count > best_count) {
            best = Some((rule.as_str(), *count));
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(data_id: DbId, rule_name: &str, severity: Severity) -> OutcomeKey {
        OutcomeKey {
            data_id,
            rule_name: rule_name.to_string(),
            severity,
        }
    }

    #[test]
    fn summary_counts_distinct_records() {
        let outcomes = vec![
            outcome(1, "cement_emission_range", Severity::Error),
            outcome(1, "statistical_outlier_check", Severity::Warning),
            outcome(2, "cement_emission_range", Severity::Error),
            outcome(3, "required_reporting_fields", Severity::Warning),
        ];
        let summary = summarize(10, &outcomes);
        assert_eq!(summary.total_records, 10);
        assert_eq!(summary.records_with_errors, 2);
        assert_eq!(summary.records_with_warnings, 2);
        assert_eq!(summary.valid_records, 7);
        assert_eq!(summary.validation_pass_rate, 80.0);
        assert_eq!(summary.error_breakdown["cement_emission_range"], 2);
    }

    #[test]
    fn empty_upload_passes_trivially() {
        let summary = summarize(0, &[]);
        assert_eq!(summary.validation_pass_rate, 100.0);
        assert_eq!(summary.valid_records, 0);
    }

    #[test]
    fn low_pass_rate_is_critical() {
        let outcomes: Vec<OutcomeKey> = (0..6)
            .map(|i| outcome(i, "cement_emission_range", Severity::Error))
            .collect();
        let summary = summarize(10, &outcomes);
        assert!(summary.validation_pass_rate < 50.0);
        let recs = recommendations(&summary);
        assert!(recs[0].starts_with("Critical"));
    }

    #[test]
    fn surfaces_most_frequent_rule() {
        let outcomes = vec![
            outcome(1, "cement_emission_range", Severity::Error),
            outcome(2, "cement_emission_range", Severity::Error),
            outcome(3, "steel_bfbof_emission_range", Severity::Error),
        ];
        let summary = summarize(30, &outcomes);
        let recs = recommendations(&summary);
        assert!(recs.iter().any(|r| r.contains("cement_emission_range")));
        assert!(recs.iter().any(|r| r.contains("3 occurrences") || r.contains("2 occurrences")));
    }

    #[test]
    fn most_frequent_breaks_ties_alphabetically() {
        let mut breakdown = BTreeMap::new();
        breakdown.insert("b_rule".to_string(), 2);
        breakdown.insert("a_rule".to_string(), 2);
        assert_eq!(most_frequent(&breakdown), Some(("a_rule", 2)));
    }

    #[test]
    fn flags_known_clusters() {
        let outcomes = vec![
            outcome(1, "cement_emission_range", Severity::Error),
            outcome(2, "statistical_outlier_check", Severity::Warning),
            outcome(3, "monthly_sum_equals_annual", Severity::Error),
            outcome(4, "scope_totals_consistency", Severity::Error),
        ];
        let summary = summarize(100, &outcomes);
        let recs = recommendations(&summary).join("\n");
        assert!(recs.contains("expected ranges"));
        assert!(recs.contains("outliers"));
        assert!(recs.contains("Temporal consistency"));
        assert!(recs.contains("Scope classification"));
    }

    #[test]
    fn all_clear_message_when_nothing_failed() {
        let summary = summarize(5, &[]);
        let recs = recommendations(&summary);
        assert_eq!(recs.len(), 1);
        assert!(recs[0].contains("ready for report generation"));
    }

    #[test]
    fn warnings_only_message() {
        let outcomes = vec![outcome(1, "required_reporting_fields", Severity::Warning)];
        let summary = summarize(5, &outcomes);
        let recs = recommendations(&summary);
        assert!(recs.iter().any(|r| r.contains("only warnings")));
    }

    #[test]
    fn recommendations_are_deterministic() {
        let outcomes = vec![
            outcome(1, "cement_emission_range", Severity::Error),
            outcome(2, "statistical_outlier_check", Severity::Warning),
        ];
        let summary = summarize(100, &outcomes);
        assert_eq!(recommendations(&summary), recommendations(&summary));
    }
}
