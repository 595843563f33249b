//! Unit taxonomy and normalization.
//!
//! A [`taxonomy::UnitTaxonomy`] is the immutable configuration of unit
//! categories; a [`normalizer::UnitNormalizer`] converts values into the
//! base unit of their category. Column-level unit detection (header
//! annotations plus magnitude heuristics) lives in [`detect`].

pub mod detect;
pub mod normalizer;
pub mod taxonomy;

pub use detect::{detect_column_unit, DetectionConfig};
pub use normalizer::{ConversionFactor, Normalization, UnitNormalizer};
pub use taxonomy::{ConversionEntry, UnitCategory, UnitTaxonomy};
