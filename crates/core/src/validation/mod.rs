//! Data validation engine.
//!
//! Rule and finding types, the indexed rule catalog, the pure evaluation
//! engine, and the summary/recommendation math -- all without database
//! dependencies.

pub mod catalog;
pub mod engine;
pub mod report;
pub mod rules;

pub use catalog::{RuleCatalog, CROSS_FIELD, CROSS_INDUSTRY};
pub use engine::ValidationEngine;
pub use rules::{Finding, NormalizedRecord, Severity, ValidationRule, ValidationType};
