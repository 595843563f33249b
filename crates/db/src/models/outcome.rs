//! Models for validation outcomes and their review metadata.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use verdant_core::types::{DbId, Timestamp};
use verdant_core::validation::{Finding, Severity};

/// A row from the `validation_outcomes` table.
///
/// Only failing checks are persisted; the absence of a row for a rule is
/// a pass. Review state is the one mutable part of the row.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ValidationOutcome {
    pub id: DbId,
    pub data_id: DbId,
    pub rule_name: String,
    pub severity: String,
    pub message: String,
    pub citation: String,
    pub actual_value: Option<f64>,
    pub expected_min: Option<f64>,
    pub expected_max: Option<f64>,
    pub reviewed: bool,
    pub reviewer_notes: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl ValidationOutcome {
    /// Typed severity; unknown strings default to error, the safe side.
    pub fn severity(&self) -> Severity {
        match self.severity.as_str() {
            "warning" => Severity::Warning,
            _ => Severity::Error,
        }
    }
}

/// DTO for inserting an outcome.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateOutcome {
    pub data_id: DbId,
    pub rule_name: String,
    pub severity: String,
    pub message: String,
    pub citation: String,
    pub actual_value: Option<f64>,
    pub expected_min: Option<f64>,
    pub expected_max: Option<f64>,
}

impl From<&Finding> for CreateOutcome {
    fn from(finding: &Finding) -> Self {
        Self {
            data_id: finding.data_id,
            rule_name: finding.rule_name.clone(),
            severity: finding.severity.as_str().to_string(),
            message: finding.message.clone(),
            citation: finding.citation.clone(),
            actual_value: finding.actual_value,
            expected_min: finding.expected_range.map(|(lo, _)| lo),
            expected_max: finding.expected_range.map(|(_, hi)| hi),
        }
    }
}
