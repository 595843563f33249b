use verdant_core::error::CoreError;

/// Error type for orchestration operations.
///
/// Expected per-value failures never reach this level -- they are counted
/// into run summaries. What does surface here is infrastructure trouble
/// (database errors) and domain violations (not found, illegal review
/// transitions).
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type PipelineResult<T> = Result<T, PipelineError>;
