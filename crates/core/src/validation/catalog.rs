//! Indexed catalog of validation rules, loaded from configuration.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use serde::Serialize;

use crate::error::CoreError;
use crate::validation::rules::{ValidationRule, ValidationType};

/// Bucket consulted when an industry defines no rules for a record.
pub const CROSS_INDUSTRY: &str = "cross_industry";

/// Bucket holding only cross-field relationship rules.
pub const CROSS_FIELD: &str = "cross_field";

/// Counts describing a loaded catalog.
#[derive(Debug, Clone, Serialize)]
pub struct CatalogSummary {
    pub total_rules: usize,
    pub industries: Vec<String>,
    pub rules_by_industry: BTreeMap<String, usize>,
    pub validation_types: Vec<String>,
}

/// Rule definitions grouped by industry, with lookup indices built once
/// at load time:
///
/// - industry -> rules (wildcards and indicator-specific alike)
/// - (industry, indicator) -> rules, for exact matches
/// - rule name -> rule, a flat map for enrichment lookups
#[derive(Debug)]
pub struct RuleCatalog {
    by_industry: HashMap<String, Vec<ValidationRule>>,
    by_indicator: HashMap<(String, String), Vec<ValidationRule>>,
    by_name: HashMap<String, ValidationRule>,
}

impl RuleCatalog {
    /// Load the catalog from a JSON file. Malformed documents are fatal.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, CoreError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            CoreError::Config(format!("cannot read rules file {}: {e}", path.display()))
        })?;
        Self::from_json_str(&raw)
    }

    /// Parse the catalog from a JSON document of
    /// `industry -> rule_name -> rule body`.
    pub fn from_json_str(raw: &str) -> Result<Self, CoreError> {
        // BTreeMap keeps index order deterministic across loads.
        let document: BTreeMap<String, BTreeMap<String, ValidationRule>> =
            serde_json::from_str(raw)
                .map_err(|e| CoreError::Config(format!("malformed validation rules: {e}")))?;

        let mut by_industry: HashMap<String, Vec<ValidationRule>> = HashMap::new();
        let mut by_indicator: HashMap<(String, String), Vec<ValidationRule>> = HashMap::new();
        let mut by_name: HashMap<String, ValidationRule> = HashMap::new();

        for (industry, rules) in document {
            for (key, rule) in rules {
                if key != rule.rule_name {
                    return Err(CoreError::Config(format!(
                        "rule key '{key}' in industry '{industry}' does not match \
                         rule_name '{}'",
                        rule.rule_name
                    )));
                }

                if let Some(indicator) = &rule.indicator {
                    by_indicator
                        .entry((industry.clone(), indicator.clone()))
                        .or_default()
                        .push(rule.clone());
                }
                by_name.entry(rule.rule_name.clone()).or_insert_with(|| rule.clone());
                by_industry.entry(industry.clone()).or_default().push(rule);
            }
        }

        Ok(Self {
            by_industry,
            by_indicator,
            by_name,
        })
    }

    /// Rules applicable to a record: exact `(industry, indicator)` matches
    /// plus the industry's wildcard rules, deduplicated by rule name.
    pub fn applicable_rules(&self, industry: &str, indicator: &str) -> Vec<&ValidationRule> {
        let mut rules: Vec<&ValidationRule> = Vec::new();
        let mut seen: Vec<&str> = Vec::new();

        let indicator_key = (industry.to_string(), indicator.to_string());
        if let Some(exact) = self.by_indicator.get(&indicator_key) {
            for rule in exact {
                rules.push(rule);
                seen.push(&rule.rule_name);
            }
        }

        if let Some(industry_rules) = self.by_industry.get(industry) {
            for rule in industry_rules {
                if rule.indicator.is_none() && !seen.contains(&rule.rule_name.as_str()) {
                    rules.push(rule);
                    seen.push(&rule.rule_name);
                }
            }
        }

        rules
    }

    /// All rules defined for an industry, wildcard or not.
    pub fn industry_rules(&self, industry: &str) -> &[ValidationRule] {
        self.by_industry.get(industry).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Relationship rules from the `cross_field` bucket.
    pub fn cross_field_rules(&self) -> &[ValidationRule] {
        self.industry_rules(CROSS_FIELD)
    }

    /// The outlier rule for an industry, falling back to `cross_industry`.
    pub fn outlier_rule(&self, industry: &str) -> Option<&ValidationRule> {
        self.industry_rules(industry)
            .iter()
            .find(|rule| rule.validation_type == ValidationType::Outlier)
            .or_else(|| {
                self.industry_rules(CROSS_INDUSTRY)
                    .iter()
                    .find(|rule| rule.validation_type == ValidationType::Outlier)
            })
    }

    /// Flat lookup by rule name (first definition wins across industries).
    pub fn rule_by_name(&self, name: &str) -> Option<&ValidationRule> {
        self.by_name.get(name)
    }

    /// Counts for diagnostics and the rules summary endpoint.
    pub fn summary(&self) -> CatalogSummary {
        let mut industries: Vec<String> = self.by_industry.keys().cloned().collect();
        industries.sort();

        let rules_by_industry: BTreeMap<String, usize> = self
            .by_industry
            .iter()
            .map(|(industry, rules)| (industry.clone(), rules.len()))
            .collect();

        let mut validation_types: Vec<String> = self
            .by_industry
            .values()
            .flatten()
            .filter_map(|rule| {
                serde_json::to_value(rule.validation_type)
                    .ok()
                    .and_then(|v| v.as_str().map(str::to_string))
            })
            .collect();
        validation_types.sort();
        validation_types.dedup();

        CatalogSummary {
            total_rules: self.by_industry.values().map(Vec::len).sum(),
            industries,
            rules_by_industry,
            validation_types,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    const RULES_JSON: &str = include_str!("../../../../config/validation_rules.json");

    fn catalog() -> RuleCatalog {
        RuleCatalog::from_json_str(RULES_JSON).unwrap()
    }

    #[test]
    fn loads_shipped_rules() {
        let summary = catalog().summary();
        assert!(summary.total_rules > 10);
        assert!(summary.industries.contains(&"cement_industry".to_string()));
        assert!(summary.industries.contains(&"steel_industry".to_string()));
        assert!(summary.industries.contains(&CROSS_INDUSTRY.to_string()));
        assert!(summary.validation_types.contains(&"range".to_string()));
        assert!(summary.validation_types.contains(&"outlier".to_string()));
    }

    #[test]
    fn exact_indicator_match() {
        let catalog = catalog();
        let rules = catalog
            .applicable_rules("cement_industry", "Scope 1 GHG Emissions per tonne clinker");
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].rule_name, "cement_emission_range");
    }

    #[test]
    fn wildcard_rules_apply_to_any_indicator() {
        let catalog = catalog();
        let rules = catalog.applicable_rules(CROSS_INDUSTRY, "Anything At All");
        assert!(rules.iter().any(|r| r.rule_name == "statistical_outlier_check"));
        assert!(rules.iter().any(|r| r.rule_name == "required_reporting_fields"));
        // Indicator-specific cross-industry rules stay out.
        assert!(!rules.iter().any(|r| r.rule_name == "scope1_source_category"));
    }

    #[test]
    fn unknown_industry_has_no_rules() {
        assert!(catalog().applicable_rules("fishing_industry", "Catch Volume").is_empty());
    }

    #[test]
    fn outlier_rule_falls_back_to_cross_industry() {
        let catalog = catalog();
        let rule = catalog.outlier_rule("cement_industry").unwrap();
        assert_eq!(rule.rule_name, "statistical_outlier_check");
    }

    #[test]
    fn cross_field_bucket_holds_relationship_rules() {
        let catalog = catalog();
        let rules = catalog.cross_field_rules();
        assert!(!rules.is_empty());
        assert!(rules.iter().all(|r| r.validation_type == ValidationType::CrossField));
    }

    #[test]
    fn flat_name_lookup() {
        let catalog = catalog();
        let rule = catalog.rule_by_name("cement_emission_range").unwrap();
        assert_eq!(rule.indicator.as_deref(), Some("Scope 1 GHG Emissions per tonne clinker"));
        assert!(catalog.rule_by_name("no_such_rule").is_none());
    }

    #[test]
    fn mismatched_rule_key_is_fatal() {
        let raw = r#"{
            "cement_industry": {
                "some_key": {
                    "rule_name": "different_name",
                    "description": "",
                    "validation_type": "range",
                    "parameters": {},
                    "severity": "error",
                    "citation": "",
                    "error_message": ""
                }
            }
        }"#;
        assert_matches!(RuleCatalog::from_json_str(raw), Err(CoreError::Config(_)));
    }

    #[test]
    fn unknown_validation_type_is_fatal() {
        let raw = r#"{
            "cement_industry": {
                "r": {
                    "rule_name": "r",
                    "description": "",
                    "validation_type": "sorcery",
                    "parameters": {},
                    "severity": "error",
                    "citation": "",
                    "error_message": ""
                }
            }
        }"#;
        assert_matches!(RuleCatalog::from_json_str(raw), Err(CoreError::Config(_)));
    }
}
