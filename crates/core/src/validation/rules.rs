//! Validation rule and finding types.

use serde::{Deserialize, Serialize};

use crate::types::{DbId, JsonMap};

/// Whether a rule violation blocks export readiness or is informational.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
        }
    }
}

/// The check a rule performs. Unknown types in configuration fail the
/// catalog load rather than silently passing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationType {
    Range,
    CategoryCheck,
    Outlier,
    PatternMatch,
    NullCheck,
    PrecisionCheck,
    Temporal,
    CrossField,
}

/// A validation rule loaded from configuration.
///
/// `indicator: None` makes the rule an industry-wide wildcard. Parameters
/// are a free-form JSON map interpreted per [`ValidationType`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationRule {
    pub rule_name: String,
    pub description: String,
    #[serde(default)]
    pub indicator: Option<String>,
    pub validation_type: ValidationType,
    #[serde(default)]
    pub parameters: serde_json::Value,
    pub severity: Severity,
    pub citation: String,
    pub error_message: String,
    #[serde(default)]
    pub suggested_fixes: Vec<String>,
}

impl ValidationRule {
    /// Numeric parameter by key.
    pub fn param_f64(&self, key: &str) -> Option<f64> {
        self.parameters.get(key).and_then(|v| v.as_f64())
    }

    /// String-list parameter by key; missing or malformed yields empty.
    pub fn param_str_list(&self, key: &str) -> Vec<String> {
        self.parameters
            .get(key)
            .and_then(|v| v.as_array())
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| item.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// One normalized measurement as seen by the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedRecord {
    pub id: DbId,
    pub indicator: String,
    pub value: f64,
    pub unit: String,
    pub original_value: f64,
    pub original_unit: String,
    #[serde(default)]
    pub facility_id: Option<String>,
    #[serde(default)]
    pub reporting_period: Option<String>,
    #[serde(default)]
    pub metadata: JsonMap,
}

/// One rule failure against one record. Passing checks produce nothing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    pub data_id: DbId,
    pub rule_name: String,
    pub severity: Severity,
    pub message: String,
    pub citation: String,
    pub suggested_fixes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual_value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_range: Option<(f64, f64)>,
}

impl Finding {
    /// Base finding carrying the rule's severity, citation, and fixes.
    pub fn from_rule(rule: &ValidationRule, data_id: DbId, message: String) -> Self {
        Self {
            data_id,
            rule_name: rule.rule_name.clone(),
            severity: rule.severity,
            message,
            citation: rule.citation.clone(),
            suggested_fixes: rule.suggested_fixes.clone(),
            actual_value: None,
            expected_range: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn severity_round_trips_lowercase() {
        assert_eq!(serde_json::to_string(&Severity::Error).unwrap(), "\"error\"");
        let parsed: Severity = serde_json::from_str("\"warning\"").unwrap();
        assert_eq!(parsed, Severity::Warning);
    }

    #[test]
    fn unknown_validation_type_fails_deserialization() {
        let result: Result<ValidationType, _> = serde_json::from_str("\"sorcery\"");
        assert!(result.is_err());
    }

    #[test]
    fn param_accessors() {
        let rule = ValidationRule {
            rule_name: "r".into(),
            description: String::new(),
            indicator: None,
            validation_type: ValidationType::Range,
            parameters: json!({ "min": 1, "fields": ["a", "b"] }),
            severity: Severity::Error,
            citation: String::new(),
            error_message: String::new(),
            suggested_fixes: vec![],
        };
        assert_eq!(rule.param_f64("min"), Some(1.0));
        assert_eq!(rule.param_f64("max"), None);
        assert_eq!(rule.param_str_list("fields"), vec!["a", "b"]);
        assert!(rule.param_str_list("missing").is_empty());
    }
}
