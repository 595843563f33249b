//! Orchestration over the domain core and the database.
//!
//! [`normalization::NormalizationService`] turns raw indicator columns
//! into persisted normalized measurements; [`validation::ValidationService`]
//! runs validation batches, persists outcomes, and drives the reviewer
//! workflow. Both services hold only immutable, `Arc`-shared engines and
//! take the connection pool per call.

pub mod error;
pub mod normalization;
pub mod validation;

pub use error::{PipelineError, PipelineResult};
pub use normalization::NormalizationService;
pub use validation::ValidationService;
