//! Audit logging constants.
//!
//! This module lives in `core` (zero internal deps) so the orchestration
//! layer and any future CLI tooling agree on the vocabulary written into
//! the audit trail.

/// Known action types for audit log entries.
pub mod actions {
    pub const NORMALIZE: &str = "normalize";
    pub const VALIDATE: &str = "validate";
    pub const REVALIDATE: &str = "revalidate";
    pub const REVIEW: &str = "review";
    pub const SUPPRESS: &str = "suppress";
    pub const BULK_REVIEW: &str = "bulk_review";
}

/// Known entity types referenced by audit log entries.
pub mod entities {
    pub const UPLOAD: &str = "upload";
    pub const MEASUREMENT: &str = "measurement";
    pub const OUTCOME: &str = "validation_outcome";
}
