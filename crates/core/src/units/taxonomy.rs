//! Immutable unit taxonomy loaded from configuration.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, UnitError};

/// A single conversion entry within a category.
///
/// `factor` is `None` for non-linear conversions (temperature scales):
/// those are legal to store but illegal to apply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionEntry {
    pub factor: Option<f64>,
    pub source: String,
    pub formula: String,
}

/// One unit category: a base unit and the conversions into it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitCategory {
    pub base_unit: String,
    pub conversions: HashMap<String, ConversionEntry>,
}

/// The full unit taxonomy: categories, a reverse unit lookup, and the
/// precompiled longest-token-first detection order.
///
/// Built once at startup and never mutated, so it can be shared freely
/// across worker tasks.
#[derive(Debug)]
pub struct UnitTaxonomy {
    categories: HashMap<String, UnitCategory>,
    /// unit -> (category, base_unit)
    unit_lookup: HashMap<String, (String, String)>,
    /// Detection matchers, longest unit string first so "tonnes CO₂e"
    /// wins over "tonnes".
    detectors: Vec<(Regex, String)>,
}

impl UnitTaxonomy {
    /// Load the taxonomy from a JSON file. Any malformed entry is a fatal
    /// configuration error.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, CoreError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            CoreError::Config(format!("cannot read taxonomy file {}: {e}", path.display()))
        })?;
        Self::from_json_str(&raw)
    }

    /// Parse the taxonomy from a JSON document.
    pub fn from_json_str(raw: &str) -> Result<Self, CoreError> {
        let categories: HashMap<String, UnitCategory> = serde_json::from_str(raw)
            .map_err(|e| CoreError::Config(format!("malformed unit taxonomy: {e}")))?;
        Self::build(categories)
    }

    fn build(categories: HashMap<String, UnitCategory>) -> Result<Self, CoreError> {
        let mut unit_lookup: HashMap<String, (String, String)> = HashMap::new();

        for (category, config) in &categories {
            if config.base_unit.is_empty() {
                return Err(CoreError::Config(format!(
                    "category '{category}' has an empty base unit"
                )));
            }

            register_unit(&mut unit_lookup, &config.base_unit, category, &config.base_unit)?;

            for (unit, entry) in &config.conversions {
                if unit.is_empty() {
                    return Err(CoreError::Config(format!(
                        "category '{category}' contains an empty unit name"
                    )));
                }
                // Linear factors must be strictly positive; None marks a
                // non-linear entry and is validated at application time.
                if let Some(factor) = entry.factor {
                    if factor <= 0.0 {
                        return Err(CoreError::Config(format!(
                            "unit '{unit}' in category '{category}' has non-positive factor {factor}"
                        )));
                    }
                }
                register_unit(&mut unit_lookup, unit, category, &config.base_unit)?;
            }
        }

        let detectors = build_detectors(&unit_lookup)?;

        Ok(Self {
            categories,
            unit_lookup,
            detectors,
        })
    }

    /// Look up a category by name.
    pub fn category(&self, name: &str) -> Option<&UnitCategory> {
        self.categories.get(name)
    }

    /// Resolve a unit to its `(category, base_unit)` pair.
    pub fn resolve(&self, unit: &str) -> Option<(&str, &str)> {
        self.unit_lookup
            .get(unit)
            .map(|(category, base)| (category.as_str(), base.as_str()))
    }

    /// The base unit of a category.
    pub fn base_unit(&self, category: &str) -> Result<&str, UnitError> {
        self.categories
            .get(category)
            .map(|c| c.base_unit.as_str())
            .ok_or_else(|| {
                UnitError::UnitNotFound(format!("category '{category}' is not in the taxonomy"))
            })
    }

    /// The conversion entry for a unit within a category, if any.
    pub fn conversion(&self, category: &str, unit: &str) -> Option<&ConversionEntry> {
        self.categories
            .get(category)
            .and_then(|c| c.conversions.get(unit))
    }

    /// All supported units, optionally filtered by category.
    ///
    /// Output is ordered (category, then unit) so callers can render it
    /// deterministically.
    pub fn supported_units(&self, category: Option<&str>) -> BTreeMap<String, Vec<String>> {
        let mut result = BTreeMap::new();
        for (name, config) in &self.categories {
            if category.is_some_and(|c| c != name.as_str()) {
                continue;
            }
            let mut units: Vec<String> = config.conversions.keys().cloned().collect();
            units.push(config.base_unit.clone());
            units.sort();
            units.dedup();
            result.insert(name.clone(), units);
        }
        result
    }

    pub(crate) fn detectors(&self) -> &[(Regex, String)] {
        &self.detectors
    }
}

fn register_unit(
    lookup: &mut HashMap<String, (String, String)>,
    unit: &str,
    category: &str,
    base_unit: &str,
) -> Result<(), CoreError> {
    if let Some((existing, _)) = lookup.get(unit) {
        if existing != category {
            return Err(CoreError::Config(format!(
                "unit '{unit}' is defined in both '{existing}' and '{category}'"
            )));
        }
        return Ok(());
    }
    lookup.insert(unit.to_string(), (category.to_string(), base_unit.to_string()));
    Ok(())
}

/// Compile one case-insensitive matcher per unit, longest unit first.
///
/// The pattern accepts the unit at a word boundary or as a suffix, so
/// "1500kg" still resolves even without a separating space.
fn build_detectors(
    lookup: &HashMap<String, (String, String)>,
) -> Result<Vec<(Regex, String)>, CoreError> {
    let mut units: Vec<&String> = lookup.keys().collect();
    units.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));

    let mut detectors = Vec::with_capacity(units.len());
    for unit in units {
        let escaped = regex::escape(unit);
        let pattern = format!(r"\b{escaped}\b|{escaped}$");
        let regex = RegexBuilder::new(&pattern)
            .case_insensitive(true)
            .build()
            .map_err(|e| {
                CoreError::Config(format!("cannot build matcher for unit '{unit}': {e}"))
            })?;
        detectors.push((regex, unit.clone()));
    }
    Ok(detectors)
}
