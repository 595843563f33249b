//! Review workflow policy and pass-rate math.
//!
//! Validation outcomes move through a two-state machine: unreviewed
//! (initial) and reviewed (terminal for the run). Marking an error as
//! reviewed requires non-empty notes; suppression is legal only for
//! warnings and is recorded through a notes prefix so reviewed errors and
//! suppressed warnings stay distinguishable.

use serde::Serialize;

use crate::error::CoreError;
use crate::validation::report::round2;

/* --------------------------------------------------------------------------
Constants
-------------------------------------------------------------------------- */

/// Notes prefix marking a suppressed warning.
pub const SUPPRESSED_PREFIX: &str = "SUPPRESSED: ";

/* --------------------------------------------------------------------------
Review policy
-------------------------------------------------------------------------- */

/// Reviewer notes must carry actual content; `reviewed = true` with empty
/// notes is an invariant violation.
pub fn validate_reviewer_notes(notes: &str) -> Result<(), CoreError> {
    if notes.trim().is_empty() {
        return Err(CoreError::Validation(
            "Reviewer notes must not be empty".to_string(),
        ));
    }
    Ok(())
}

/// Render the stored notes for a suppressed warning.
pub fn suppression_notes(reason: &str) -> String {
    format!("{SUPPRESSED_PREFIX}{reason}")
}

/// Whether stored notes mark a suppression rather than a plain review.
pub fn is_suppression(notes: &str) -> bool {
    notes.starts_with(SUPPRESSED_PREFIX)
}

/* --------------------------------------------------------------------------
Pass-rate math
-------------------------------------------------------------------------- */

/// Final pass rate after human review, as a percentage.
///
/// Only records that still carry unreviewed errors count against the
/// rate; warnings never do, and reviewed errors are treated as resolved.
/// An empty upload trivially passes.
pub fn final_pass_rate(total_records: u64, records_with_unreviewed_errors: u64) -> f64 {
    if total_records == 0 {
        return 100.0;
    }
    let passing = total_records.saturating_sub(records_with_unreviewed_errors);
    round2(passing as f64 / total_records as f64 * 100.0)
}

/* --------------------------------------------------------------------------
Review summary
-------------------------------------------------------------------------- */

/// Review status counts for one upload.
#[derive(Debug, Clone, Serialize)]
pub struct ReviewSummary {
    pub total_errors: u64,
    pub reviewed_errors: u64,
    pub unreviewed_errors: u64,
    pub total_warnings: u64,
    pub suppressed_warnings: u64,
    pub active_warnings: u64,
    /// Export must be blocked while this is false.
    pub ready_for_export: bool,
    pub final_pass_rate: f64,
}

impl ReviewSummary {
    pub fn from_counts(
        total_errors: u64,
        reviewed_errors: u64,
        total_warnings: u64,
        suppressed_warnings: u64,
        final_pass_rate: f64,
    ) -> Self {
        let unreviewed_errors = total_errors.saturating_sub(reviewed_errors);
        Self {
            total_errors,
            reviewed_errors,
            unreviewed_errors,
            total_warnings,
            suppressed_warnings,
            active_warnings: total_warnings.saturating_sub(suppressed_warnings),
            ready_for_export: unreviewed_errors == 0,
            final_pass_rate,
        }
    }
}

/* --------------------------------------------------------------------------
Tests
-------------------------------------------------------------------------- */
