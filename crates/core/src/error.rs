use crate::types::DbId;

/// Domain-level error type shared across the workspace.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: DbId },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Typed per-value error of the unit conversion hot path.
///
/// Conversion runs over every cell of every column, so expected failures
/// are plain `Result` values the bulk loop can branch on. None of these
/// variants is ever coerced to a default value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UnitError {
    /// The unit (or category) is not present in the taxonomy.
    #[error("Unit not found: {0}")]
    UnitNotFound(String),

    /// Both units exist but belong to different categories.
    #[error("Category mismatch: {0}")]
    CategoryMismatch(String),

    /// The value is illegal for the unit, or the conversion is non-linear.
    #[error("Invalid value: {0}")]
    InvalidValue(String),
}

impl From<UnitError> for CoreError {
    fn from(err: UnitError) -> Self {
        CoreError::Validation(err.to_string())
    }
}
