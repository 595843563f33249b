//! Domain model structs and DTOs.
//!
//! Each submodule contains:
//! - A `FromRow` + `Serialize` entity struct matching the database row
//! - A `Deserialize` create DTO for inserts

pub mod audit;
pub mod indicator;
pub mod measurement;
pub mod outcome;
pub mod upload;
