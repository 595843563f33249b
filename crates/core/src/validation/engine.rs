//! Rule evaluation -- pure logic, no database access.
//!
//! The engine holds an immutable [`RuleCatalog`] and evaluates records
//! against it. Single-record checks run per record; outlier and
//! cross-field checks need the whole batch and run once per
//! [`ValidationEngine::validate_batch`] call. Only failures are returned --
//! a clean record produces nothing.

use std::collections::{BTreeMap, HashMap};

use crate::types::DbId;
use crate::validation::catalog::{RuleCatalog, CROSS_INDUSTRY};
use crate::validation::rules::{Finding, NormalizedRecord, ValidationRule, ValidationType};

pub struct ValidationEngine {
    catalog: RuleCatalog,
}

impl ValidationEngine {
    pub fn new(catalog: RuleCatalog) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &RuleCatalog {
        &self.catalog
    }

    /// Evaluate all single-record checks applicable to a record.
    ///
    /// When the industry defines nothing for the record, the shared
    /// `cross_industry` bucket is consulted instead.
    pub fn validate_record(&self, record: &NormalizedRecord, industry: &str) -> Vec<Finding> {
        let mut rules = self.catalog.applicable_rules(industry, &record.indicator);
        if rules.is_empty() {
            rules = self.catalog.applicable_rules(CROSS_INDUSTRY, &record.indicator);
        }

        rules
            .iter()
            .filter_map(|rule| self.evaluate(record, rule))
            .collect()
    }

    /// Evaluate a batch: single-record checks for every record, one
    /// outlier pass per indicator group (when an outlier rule exists and
    /// the group has at least three samples), and one cross-field pass
    /// over the whole snapshot.
    ///
    /// The result map is ordered by record id, so output is deterministic
    /// for a fixed input; the statistics themselves do not depend on input
    /// order.
    pub fn validate_batch(
        &self,
        records: &[NormalizedRecord],
        industry: &str,
    ) -> BTreeMap<DbId, Vec<Finding>> {
        let mut results: BTreeMap<DbId, Vec<Finding>> = BTreeMap::new();

        for record in records {
            let findings = self.validate_record(record, industry);
            if !findings.is_empty() {
                results.entry(record.id).or_default().extend(findings);
            }
        }

        if let Some(rule) = self.catalog.outlier_rule(industry) {
            let mut groups: BTreeMap<&str, Vec<(DbId, f64)>> = BTreeMap::new();
            for record in records {
                groups
                    .entry(record.indicator.as_str())
                    .or_default()
                    .push((record.id, record.value));
            }
            for values in groups.values() {
                for finding in self.outlier_detection(values, rule) {
                    results.entry(finding.data_id).or_default().push(finding);
                }
            }
        }

        for finding in self.cross_field_consistency(records) {
            results.entry(finding.data_id).or_default().push(finding);
        }

        results
    }

    fn evaluate(&self, record: &NormalizedRecord, rule: &ValidationRule) -> Option<Finding> {
        match rule.validation_type {
            ValidationType::Range => range_check(record.value, rule, record.id),
            ValidationType::CategoryCheck => {
                let category = record
                    .metadata
                    .get("source_category")
                    .and_then(|v| v.as_str())
                    .unwrap_or("");
                category_check(category, rule, record.id)
            }
            ValidationType::PatternMatch => pattern_match(&record.unit, rule, record.id),
            ValidationType::NullCheck => null_check(record, rule),
            ValidationType::PrecisionCheck => precision_check(record.value, rule, record.id),
            // Cross-record checks run in validate_batch, not per record.
            ValidationType::Outlier | ValidationType::Temporal | ValidationType::CrossField => {
                None
            }
        }
    }

    /// Z-score outlier screening over `(data_id, value)` samples sharing
    /// an indicator.
    ///
    /// Each sample is scored against the population mean/stdev of its
    /// *peers* (leave-one-out), so a single extreme value cannot mask
    /// itself by inflating the dispersion it is measured against. Fewer
    /// than three samples, or an all-identical set, flags nothing.
    pub fn outlier_detection(
        &self,
        values: &[(DbId, f64)],
        rule: &ValidationRule,
    ) -> Vec<Finding> {
        if values.len() < 3 {
            return Vec::new();
        }

        let threshold = rule.param_f64("z_score_threshold").unwrap_or(3.0);
        let n = values.len() as f64;
        let sum: f64 = values.iter().map(|(_, v)| v).sum();
        let sum_sq: f64 = values.iter().map(|(_, v)| v * v).sum();

        let mean = sum / n;
        let variance = (sum_sq / n - mean * mean).max(0.0);
        if variance == 0.0 {
            return Vec::new();
        }

        let mut findings = Vec::new();
        let peers = n - 1.0;
        for &(data_id, value) in values {
            let peer_mean = (sum - value) / peers;
            let peer_variance = ((sum_sq - value * value) / peers - peer_mean * peer_mean).max(0.0);
            let peer_stdev = peer_variance.sqrt();

            let z_score = if peer_stdev == 0.0 {
                if value == peer_mean {
                    continue;
                }
                f64::INFINITY
            } else {
                ((value - peer_mean) / peer_stdev).abs()
            };

            if z_score > threshold {
                let mut finding = Finding::from_rule(
                    rule,
                    data_id,
                    format!(
                        "{} Z-score: {z_score:.2} (threshold: {threshold})",
                        rule.error_message
                    ),
                );
                finding.actual_value = Some(value);
                finding.expected_range = Some((
                    peer_mean - threshold * peer_stdev,
                    peer_mean + threshold * peer_stdev,
                ));
                findings.push(finding);
            }
        }

        findings
    }

    /// Check that monthly values reconcile with the claimed annual total.
    pub fn temporal_consistency(
        &self,
        monthly_values: &[f64],
        annual_total: f64,
        rule: &ValidationRule,
        data_id: DbId,
    ) -> Option<Finding> {
        if monthly_values.is_empty() {
            return None;
        }

        let monthly_sum: f64 = monthly_values.iter().sum();
        let tolerance = rule.param_f64("tolerance").unwrap_or(0.02);
        let diff_pct = (monthly_sum - annual_total).abs() / annual_total.abs().max(1.0);

        if diff_pct <= tolerance {
            return None;
        }

        let mut finding = Finding::from_rule(
            rule,
            data_id,
            format!(
                "Monthly sum ({monthly_sum:.2}) differs from annual total ({annual_total:.2}) \
                 by {:.1}% (tolerance: {:.1}%)",
                diff_pct * 100.0,
                tolerance * 100.0
            ),
        );
        finding.actual_value = Some(monthly_sum);
        finding.expected_range = Some((
            annual_total * (1.0 - tolerance),
            annual_total * (1.0 + tolerance),
        ));
        Some(finding)
    }

    /// Evaluate all cross-field relationship rules over one entity
    /// snapshot, keyed by normalized indicator name.
    pub fn cross_field_consistency(&self, records: &[NormalizedRecord]) -> Vec<Finding> {
        let mut by_indicator: HashMap<String, &NormalizedRecord> = HashMap::new();
        for record in records {
            by_indicator.insert(indicator_key(&record.indicator), record);
        }

        let mut findings = Vec::new();
        for rule in self.catalog.cross_field_rules() {
            let relationship = rule
                .parameters
                .get("relationship")
                .and_then(|v| v.as_str())
                .unwrap_or("");
            let finding = match relationship {
                "sum" => sum_relationship(&by_indicator, rule),
                "subset" => subset_relationship(&by_indicator, rule),
                "correlation" => correlation_relationship(&by_indicator, rule),
                _ => None,
            };
            findings.extend(finding);
        }

        findings
    }
}

/// Indicator names are matched case-insensitively with spaces collapsed
/// to underscores, mirroring how rule configuration spells field lists.
fn indicator_key(name: &str) -> String {
    name.to_lowercase().replace(' ', "_")
}

fn range_check(value: f64, rule: &ValidationRule, data_id: DbId) -> Option<Finding> {
    let min = rule.param_f64("min");
    let max = rule.param_f64("max");
    let expected_range = match (min, max) {
        (Some(lo), Some(hi)) => Some((lo, hi)),
        _ => None,
    };

    if let Some(lo) = min {
        if value < lo {
            let mut finding = Finding::from_rule(
                rule,
                data_id,
                format!("{} Value {value} is below minimum {lo}.", rule.error_message),
            );
            finding.actual_value = Some(value);
            finding.expected_range = expected_range;
            return Some(finding);
        }
    }

    if let Some(hi) = max {
        if value > hi {
            let mut finding = Finding::from_rule(
                rule,
                data_id,
                format!("{} Value {value} is above maximum {hi}.", rule.error_message),
            );
            finding.actual_value = Some(value);
            finding.expected_range = expected_range;
            return Some(finding);
        }
    }

    None
}

fn category_check(value: &str, rule: &ValidationRule, data_id: DbId) -> Option<Finding> {
    let mut allowed = rule.param_str_list("allowed_sources");
    if allowed.is_empty() {
        allowed = rule.param_str_list("allowed_categories");
    }

    let value_lower = value.to_lowercase();
    if allowed.iter().any(|c| c.to_lowercase() == value_lower) {
        return None;
    }

    Some(Finding::from_rule(
        rule,
        data_id,
        format!(
            "{} Found '{value}', expected one of: {}",
            rule.error_message,
            allowed.join(", ")
        ),
    ))
}

fn pattern_match(value: &str, rule: &ValidationRule, data_id: DbId) -> Option<Finding> {
    let patterns = rule.param_str_list("allowed_patterns");
    if patterns.iter().any(|p| value.contains(p.as_str())) {
        return None;
    }

    Some(Finding::from_rule(
        rule,
        data_id,
        format!(
            "{} Found '{value}', expected a fragment from: {}",
            rule.error_message,
            patterns.join(", ")
        ),
    ))
}

fn null_check(record: &NormalizedRecord, rule: &ValidationRule) -> Option<Finding> {
    let required = rule.param_str_list("required_fields");
    let mut missing = Vec::new();

    for field in &required {
        let present = match field.as_str() {
            "indicator" => !record.indicator.is_empty(),
            "unit" => !record.unit.is_empty(),
            "original_unit" => !record.original_unit.is_empty(),
            "facility_id" => record.facility_id.as_deref().is_some_and(|s| !s.is_empty()),
            "reporting_period" => record
                .reporting_period
                .as_deref()
                .is_some_and(|s| !s.is_empty()),
            other => record.metadata.get(other).is_some_and(value_present),
        };
        if !present {
            missing.push(field.as_str());
        }
    }

    if missing.is_empty() {
        return None;
    }

    Some(Finding::from_rule(
        rule,
        record.id,
        format!("{} Missing fields: {}", rule.error_message, missing.join(", ")),
    ))
}

fn value_present(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Null => false,
        serde_json::Value::String(s) => !s.is_empty(),
        serde_json::Value::Array(items) => !items.is_empty(),
        _ => true,
    }
}

fn precision_check(value: f64, rule: &ValidationRule, data_id: DbId) -> Option<Finding> {
    let max_decimals = rule.param_f64("max_decimal_places").unwrap_or(2.0) as usize;

    // Fixed-precision rendering with trailing zeros stripped; "12." counts
    // as zero decimal places.
    let rendered = format!("{value:.10}");
    let rendered = rendered.trim_end_matches('0');
    let decimal_places = rendered
        .split_once('.')
        .map(|(_, fraction)| fraction.len())
        .unwrap_or(0);

    if decimal_places <= max_decimals {
        return None;
    }

    let mut finding = Finding::from_rule(
        rule,
        data_id,
        format!(
            "{} Value has {decimal_places} decimal places, expected at most {max_decimals}.",
            rule.error_message
        ),
    );
    finding.actual_value = Some(value);
    Some(finding)
}

/// Sum relationship: the last field is the total, the rest are components.
///
/// Skipped when the total or every component is absent from the snapshot --
/// a partial snapshot is not evidence of inconsistency.
fn sum_relationship(
    by_indicator: &HashMap<String, &NormalizedRecord>,
    rule: &ValidationRule,
) -> Option<Finding> {
    let fields = rule.param_str_list("fields");
    if fields.len() < 2 {
        return None;
    }
    let tolerance = rule.param_f64("tolerance").unwrap_or(0.02);

    let total_record = by_indicator.get(&indicator_key(fields.last()?))?;
    let total_value = total_record.value;

    let mut component_sum = 0.0;
    let mut first_component: Option<DbId> = None;
    for field in &fields[..fields.len() - 1] {
        if let Some(record) = by_indicator.get(&indicator_key(field)) {
            component_sum += record.value;
            first_component.get_or_insert(record.id);
        }
    }
    let data_id = first_component?;

    let diff_pct = (component_sum - total_value).abs() / total_value.abs().max(1.0);
    if diff_pct <= tolerance {
        return None;
    }

    let mut finding = Finding::from_rule(
        rule,
        data_id,
        format!(
            "{} Sum of components ({component_sum:.2}) differs from total ({total_value:.2}) \
             by {:.1}% (tolerance: {:.1}%)",
            rule.error_message,
            diff_pct * 100.0,
            tolerance * 100.0
        ),
    );
    finding.actual_value = Some(component_sum);
    finding.expected_range = Some((
        total_value * (1.0 - tolerance),
        total_value * (1.0 + tolerance),
    ));
    Some(finding)
}

/// Subset relationship: no component may exceed the superset (last field).
fn subset_relationship(
    by_indicator: &HashMap<String, &NormalizedRecord>,
    rule: &ValidationRule,
) -> Option<Finding> {
    let fields = rule.param_str_list("fields");
    if fields.len() < 2 {
        return None;
    }
    let tolerance = rule.param_f64("tolerance").unwrap_or(0.0);

    let superset_field = fields.last()?;
    let superset_record = by_indicator.get(&indicator_key(superset_field))?;
    let superset_value = superset_record.value;

    for field in &fields[..fields.len() - 1] {
        let Some(record) = by_indicator.get(&indicator_key(field)) else {
            continue;
        };
        if record.value > superset_value * (1.0 + tolerance) {
            let mut finding = Finding::from_rule(
                rule,
                record.id,
                format!(
                    "{} {field} ({:.2}) exceeds {superset_field} ({superset_value:.2})",
                    rule.error_message, record.value
                ),
            );
            finding.actual_value = Some(record.value);
            finding.expected_range = Some((0.0, superset_value));
            return Some(finding);
        }
    }

    None
}

/// Correlation relationship: the field1/field2 ratio must fall inside the
/// configured intensity window. A zero divisor skips the check.
fn correlation_relationship(
    by_indicator: &HashMap<String, &NormalizedRecord>,
    rule: &ValidationRule,
) -> Option<Finding> {
    let fields = rule.param_str_list("fields");
    if fields.len() < 2 {
        return None;
    }

    let record1 = by_indicator.get(&indicator_key(&fields[0]))?;
    let record2 = by_indicator.get(&indicator_key(&fields[1]))?;
    if record2.value == 0.0 {
        return None;
    }

    let intensity = record1.value / record2.value;
    let range = rule.parameters.get("intensity_range")?;
    let min = range.get("min").and_then(|v| v.as_f64()).unwrap_or(0.0);
    let max = range.get("max").and_then(|v| v.as_f64()).unwrap_or(f64::INFINITY);

    if intensity >= min && intensity <= max {
        return None;
    }

    let mut finding = Finding::from_rule(
        rule,
        record1.id,
        format!(
            "{} Intensity ratio {}/{} = {intensity:.2} is outside the expected range \
             ({min}-{max})",
            rule.error_message, fields[0], fields[1]
        ),
    );
    finding.actual_value = Some(intensity);
    finding.expected_range = Some((min, max));
    Some(finding)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::catalog::RuleCatalog;
    use crate::validation::rules::Severity;
    use serde_json::json;

    const RULES_JSON: &str = include_str!("../../../../config/validation_rules.json");

    fn engine() -> ValidationEngine {
        ValidationEngine::new(RuleCatalog::from_json_str(RULES_JSON).unwrap())
    }

    fn record(id: DbId, indicator: &str, value: f64, unit: &str) -> NormalizedRecord {
        NormalizedRecord {
            id,
            indicator: indicator.to_string(),
            value,
            unit: unit.to_string(),
            original_value: value,
            original_unit: unit.to_string(),
            facility_id: Some("FAC001".to_string()),
            reporting_period: Some("2023".to_string()),
            metadata: serde_json::Map::new(),
        }
    }

    // -----------------------------------------------------------------------
    // Single-record checks
    // -----------------------------------------------------------------------

    #[test]
    fn valid_cement_record_produces_no_findings() {
        let record = record(1, "Scope 1 GHG Emissions per tonne clinker", 950.0, "kg CO₂/tonne");
        let findings = engine().validate_record(&record, "cement_industry");
        assert!(findings.is_empty());
    }

    #[test]
    fn invalid_cement_record_fails_range_check() {
        let record = record(1, "Scope 1 GHG Emissions per tonne clinker", 1500.0, "kg CO₂/tonne");
        let findings = engine().validate_record(&record, "cement_industry");
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].rule_name, "cement_emission_range");
        assert_eq!(findings[0].severity, Severity::Error);
        assert!(findings[0].message.contains("above maximum"));
        assert_eq!(findings[0].actual_value, Some(1500.0));
        assert_eq!(findings[0].expected_range, Some((800.0, 1100.0)));
    }

    #[test]
    fn below_minimum_cites_the_lower_bound() {
        let record = record(1, "Scope 1 GHG Emissions per tonne clinker", 500.0, "kg CO₂/tonne");
        let findings = engine().validate_record(&record, "cement_industry");
        assert_eq!(findings.len(), 1);
        assert!(findings[0].message.contains("below minimum"));
    }

    #[test]
    fn valid_steel_record_passes() {
        let record = record(
            2,
            "Scope 1 GHG Emissions per tonne crude steel (BF-BOF)",
            2100.0,
            "kg CO₂/tonne crude steel",
        );
        assert!(engine().validate_record(&record, "steel_industry").is_empty());
    }

    #[test]
    fn category_check_accepts_allowed_source() {
        let mut r = record(3, "Scope 1 Emission Source Category", 0.0, "");
        r.metadata
            .insert("source_category".into(), json!("Stationary Combustion"));
        assert!(engine().validate_record(&r, CROSS_INDUSTRY).is_empty());
    }

    #[test]
    fn category_check_rejects_scope2_source() {
        let mut r = record(3, "Scope 1 Emission Source Category", 0.0, "");
        r.metadata
            .insert("source_category".into(), json!("purchased electricity"));
        let findings = engine().validate_record(&r, CROSS_INDUSTRY);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].rule_name, "scope1_source_category");
        assert!(findings[0].message.contains("purchased electricity"));
    }

    #[test]
    fn pattern_match_on_emission_unit() {
        let good = record(4, "Total GHG Emissions", 1200.0, "tonnes CO₂e");
        let findings = engine().validate_record(&good, CROSS_INDUSTRY);
        assert!(!findings.iter().any(|f| f.rule_name == "emission_unit_pattern"));

        let bad = record(4, "Total GHG Emissions", 1200.0, "MWh");
        let findings = engine().validate_record(&bad, CROSS_INDUSTRY);
        assert!(findings.iter().any(|f| f.rule_name == "emission_unit_pattern"));
    }

    #[test]
    fn null_check_flags_missing_attribution() {
        let mut r = record(5, "Some Indicator", 1.0, "MWh");
        r.facility_id = None;
        let findings = engine().validate_record(&r, CROSS_INDUSTRY);
        let finding = findings
            .iter()
            .find(|f| f.rule_name == "required_reporting_fields")
            .unwrap();
        assert!(finding.message.contains("facility_id"));
        assert!(!finding.message.contains("reporting_period"));
    }

    #[test]
    fn unknown_industry_falls_back_to_cross_industry() {
        let mut r = record(6, "Some Indicator", 1.0, "MWh");
        r.facility_id = None;
        let findings = engine().validate_record(&r, "fishing_industry");
        assert!(findings.iter().any(|f| f.rule_name == "required_reporting_fields"));
    }

    #[test]
    fn precision_check_counts_decimal_places() {
        let rule = engine().catalog().rule_by_name("excessive_precision_check").unwrap().clone();

        let finding = precision_check(123.456789, &rule, 7).unwrap();
        assert!(finding.message.contains("6 decimal places"));

        assert!(precision_check(123.45, &rule, 7).is_none());
        assert!(precision_check(1200.0, &rule, 7).is_none());
    }

    // -----------------------------------------------------------------------
    // Outlier detection
    // -----------------------------------------------------------------------

    #[test]
    fn outlier_flags_exactly_the_extreme_sample() {
        let engine = engine();
        let rule = engine.catalog().outlier_rule("cement_industry").unwrap();
        let values: Vec<(DbId, f64)> = [100.0, 105.0, 98.0, 102.0, 1000.0, 99.0]
            .iter()
            .enumerate()
            .map(|(i, v)| (i as DbId + 1, *v))
            .collect();

        let findings = engine.outlier_detection(&values, rule);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].data_id, 5);
        assert_eq!(findings[0].actual_value, Some(1000.0));
        assert!(findings[0].message.contains("Z-score"));
    }

    #[test]
    fn outlier_reports_peer_expected_range() {
        let engine = engine();
        let rule = engine.catalog().outlier_rule("cement_industry").unwrap();
        let values: Vec<(DbId, f64)> = [100.0, 105.0, 98.0, 102.0, 1000.0, 99.0]
            .iter()
            .enumerate()
            .map(|(i, v)| (i as DbId + 1, *v))
            .collect();

        let findings = engine.outlier_detection(&values, rule);
        let (low, high) = findings[0].expected_range.unwrap();
        assert!(low < 100.8 && high > 100.8);
        assert!(high < 1000.0);
    }

    #[test]
    fn outlier_needs_three_samples() {
        let engine = engine();
        let rule = engine.catalog().outlier_rule("cement_industry").unwrap();
        assert!(engine.outlier_detection(&[(1, 100.0), (2, 9999.0)], rule).is_empty());
    }

    #[test]
    fn identical_values_are_never_outliers() {
        let engine = engine();
        let rule = engine.catalog().outlier_rule("cement_industry").unwrap();
        let values = vec![(1, 50.0), (2, 50.0), (3, 50.0), (4, 50.0)];
        assert!(engine.outlier_detection(&values, rule).is_empty());
    }

    // -----------------------------------------------------------------------
    // Temporal consistency
    // -----------------------------------------------------------------------

    #[test]
    fn monthly_sum_within_tolerance_passes() {
        let engine = engine();
        let rule = engine.catalog().rule_by_name("monthly_sum_equals_annual").unwrap();
        let mut monthly = vec![1000.0; 11];
        monthly.push(990.0); // sum 11990 vs annual 12000: 0.083%
        assert!(engine.temporal_consistency(&monthly, 12000.0, rule, 1).is_none());
    }

    #[test]
    fn monthly_sum_outside_tolerance_fails() {
        let engine = engine();
        let rule = engine.catalog().rule_by_name("monthly_sum_equals_annual").unwrap();
        let monthly = vec![10000.0 / 12.0; 12]; // sum 10000 vs annual 12000: 16.7%
        let finding = engine.temporal_consistency(&monthly, 12000.0, rule, 1).unwrap();
        assert!(finding.message.contains("differs from annual total"));
        assert_eq!(finding.severity, Severity::Error);
    }

    #[test]
    fn temporal_zero_annual_uses_unit_denominator() {
        let engine = engine();
        let rule = engine.catalog().rule_by_name("monthly_sum_equals_annual").unwrap();
        let monthly = vec![1.0; 12];
        let finding = engine.temporal_consistency(&monthly, 0.0, rule, 1).unwrap();
        assert_eq!(finding.actual_value, Some(12.0));
    }

    // -----------------------------------------------------------------------
    // Cross-field consistency
    // -----------------------------------------------------------------------

    fn scope_records(total: f64) -> Vec<NormalizedRecord> {
        vec![
            record(1, "Scope 1 Emissions", 100.0, "tonnes CO₂e"),
            record(2, "Scope 2 Emissions", 50.0, "tonnes CO₂e"),
            record(3, "Scope 3 Emissions", 30.0, "tonnes CO₂e"),
            record(4, "Total GHG Emissions", total, "tonnes CO₂e"),
        ]
    }

    #[test]
    fn scope_sum_within_tolerance_passes() {
        let findings = engine().cross_field_consistency(&scope_records(180.0));
        assert!(!findings.iter().any(|f| f.rule_name == "scope_totals_consistency"));
    }

    #[test]
    fn scope_sum_mismatch_cites_both_sums() {
        let findings = engine().cross_field_consistency(&scope_records(200.0));
        let finding = findings
            .iter()
            .find(|f| f.rule_name == "scope_totals_consistency")
            .unwrap();
        assert!(finding.message.contains("180.00"));
        assert!(finding.message.contains("200.00"));
        assert_eq!(finding.actual_value, Some(180.0));
    }

    #[test]
    fn sum_skipped_when_components_absent() {
        let records = vec![record(4, "Total GHG Emissions", 200.0, "tonnes CO₂e")];
        let findings = engine().cross_field_consistency(&records);
        assert!(!findings.iter().any(|f| f.rule_name == "scope_totals_consistency"));
    }

    #[test]
    fn subset_violation_flags_the_component() {
        let records = vec![
            record(1, "Renewable Energy Consumption", 120.0, "MWh"),
            record(2, "Total Energy Consumption", 100.0, "MWh"),
        ];
        let findings = engine().cross_field_consistency(&records);
        let finding = findings
            .iter()
            .find(|f| f.rule_name == "renewable_energy_subset")
            .unwrap();
        assert_eq!(finding.data_id, 1);
        assert!(finding.message.contains("exceeds"));
    }

    #[test]
    fn correlation_outside_window_is_flagged() {
        let records = vec![
            record(1, "Total Energy Consumption", 100_000.0, "MWh"),
            record(2, "Production Volume", 10.0, "tonnes"),
        ];
        let findings = engine().cross_field_consistency(&records);
        assert!(findings.iter().any(|f| f.rule_name == "energy_production_correlation"));
    }

    #[test]
    fn correlation_skips_zero_divisor() {
        let records = vec![
            record(1, "Total Energy Consumption", 100.0, "MWh"),
            record(2, "Production Volume", 0.0, "tonnes"),
        ];
        let findings = engine().cross_field_consistency(&records);
        assert!(!findings.iter().any(|f| f.rule_name == "energy_production_correlation"));
    }

    // -----------------------------------------------------------------------
    // Batch validation
    // -----------------------------------------------------------------------

    #[test]
    fn batch_collects_findings_per_record() {
        let records = vec![
            record(1, "Scope 1 GHG Emissions per tonne clinker", 950.0, "kg CO₂/tonne"),
            record(2, "Scope 1 GHG Emissions per tonne clinker", 1500.0, "kg CO₂/tonne"),
        ];
        let results = engine().validate_batch(&records, "cement_industry");
        assert!(!results.contains_key(&1));
        assert!(!results[&2].is_empty());
    }

    #[test]
    fn batch_runs_outliers_per_indicator_group() {
        let mut records: Vec<NormalizedRecord> = [950.0, 955.0, 948.0, 952.0, 1090.0, 951.0]
            .iter()
            .enumerate()
            .map(|(i, v)| {
                record(i as DbId + 1, "Scope 1 GHG Emissions per tonne clinker", *v, "kg CO₂/tonne")
            })
            .collect();
        // A second indicator with too few samples for outlier screening.
        records.push(record(100, "Alternative Fuel Substitution Rate", 20.0, "%"));

        let results = engine().validate_batch(&records, "cement_industry");
        let outlier_findings: Vec<&Finding> = results
            .values()
            .flatten()
            .filter(|f| f.rule_name == "statistical_outlier_check")
            .collect();
        assert_eq!(outlier_findings.len(), 1);
        assert_eq!(outlier_findings[0].data_id, 5);
    }

    #[test]
    fn batch_is_deterministic_for_fixed_input() {
        let records = scope_records(200.0);
        let first = engine().validate_batch(&records, "cement_industry");
        let second = engine().validate_batch(&records, "cement_industry");
        let render = |results: &BTreeMap<DbId, Vec<Finding>>| {
            results
                .iter()
                .map(|(id, findings)| {
                    let rules: Vec<&str> =
                        findings.iter().map(|f| f.rule_name.as_str()).collect();
                    format!("{id}:{}", rules.join(","))
                })
                .collect::<Vec<_>>()
                .join(";")
        };
        assert_eq!(render(&first), render(&second));
    }
}
