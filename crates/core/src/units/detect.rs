//! Column-level unit detection.
//!
//! A column's unit is resolved in two steps: an explicit annotation in the
//! header text ("Energy Consumption (kWh)") always wins; magnitude and
//! keyword heuristics are a documented last-resort fallback with
//! configurable thresholds. When neither applies the column has no
//! determinable unit and the caller must reject the indicator outright --
//! guessing is never an option.

use std::sync::OnceLock;

use regex::Regex;

use crate::units::normalizer::UnitNormalizer;

/// Thresholds for the magnitude heuristics.
///
/// All bounds compare against the maximum of the sampled values; the
/// defaults mirror the magnitudes at which utility reports typically
/// switch units.
#[derive(Debug, Clone)]
pub struct DetectionConfig {
    /// How many numeric samples to inspect per column.
    pub sample_size: usize,
    /// Energy columns above this magnitude are assumed to be kWh.
    pub energy_kwh_min: f64,
    /// Energy columns above this magnitude (and below the kWh bound) are MWh.
    pub energy_mwh_min: f64,
    /// Energy columns above this magnitude (and below the MWh bound) are GJ.
    pub energy_gj_min: f64,
    /// Emission columns above this magnitude are kg CO₂e rather than tonnes.
    pub emissions_kg_min: f64,
    /// Water columns above this magnitude are liters rather than m³.
    pub water_liters_min: f64,
    /// Mass columns above this magnitude are kg rather than tonnes.
    pub mass_kg_min: f64,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            sample_size: 100,
            energy_kwh_min: 100_000.0,
            energy_mwh_min: 100.0,
            energy_gj_min: 1.0,
            emissions_kg_min: 1_000.0,
            water_liters_min: 10_000.0,
            mass_kg_min: 10_000.0,
        }
    }
}

/// Detect the shared unit of a column from its header and sample values.
///
/// Returns `None` when no unit is determinable; the caller rejects the
/// indicator in that case.
pub fn detect_column_unit(
    normalizer: &UnitNormalizer,
    header: &str,
    samples: &[f64],
    config: &DetectionConfig,
) -> Option<String> {
    if let Some(unit) = annotated_unit(normalizer, header) {
        return Some(unit);
    }
    heuristic_unit(header, samples, config)
}

/// Extract an explicitly annotated unit from header text.
///
/// Recognized annotation shapes: `(kWh)`, `[GJ]`, and a trailing
/// "in kWh" clause. Every candidate fragment is resolved through the
/// normalizer so only taxonomy units are accepted.
fn annotated_unit(normalizer: &UnitNormalizer, header: &str) -> Option<String> {
    for regex in annotation_patterns() {
        for captures in regex.captures_iter(header) {
            let Some(group) = captures.get(1) else {
                continue;
            };
            let candidate = group.as_str().trim();
            if let Ok((unit, _)) = normalizer.detect_unit(candidate) {
                return Some(unit.to_string());
            }
        }
    }
    None
}

fn annotation_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            r"\(([^)]+)\)",
            r"\[([^\]]+)\]",
            r"(?i)\bin\s+([\w/²³°%. ]+)$",
        ]
        .iter()
        .filter_map(|pattern| Regex::new(pattern).ok())
        .collect()
    })
}

/// Magnitude and keyword heuristics over the sampled values.
fn heuristic_unit(header: &str, samples: &[f64], config: &DetectionConfig) -> Option<String> {
    if samples.is_empty() {
        return None;
    }

    let sample = &samples[..samples.len().min(config.sample_size)];
    let max_value = sample.iter().fold(f64::MIN, |acc, v| acc.max(*v));
    let header_lower = header.to_lowercase();
    let contains_any =
        |keywords: &[&str]| keywords.iter().any(|keyword| header_lower.contains(keyword));

    if contains_any(&["energy", "electricity", "power"]) {
        if max_value > config.energy_kwh_min {
            return Some("kWh".to_string());
        }
        if max_value > config.energy_mwh_min {
            return Some("MWh".to_string());
        }
        if max_value > config.energy_gj_min {
            return Some("GJ".to_string());
        }
    }

    if contains_any(&["emission", "co2", "co₂", "ghg", "carbon"]) {
        if header_lower.contains("kg") || max_value > config.emissions_kg_min {
            return Some("kg CO₂e".to_string());
        }
        return Some("tonnes CO₂e".to_string());
    }

    if contains_any(&["water", "effluent"]) {
        if max_value > config.water_liters_min {
            return Some("liters".to_string());
        }
        return Some("m³".to_string());
    }

    if contains_any(&["waste", "material", "mass", "weight"]) {
        if max_value > config.mass_kg_min {
            return Some("kg".to_string());
        }
        return Some("tonnes".to_string());
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::taxonomy::UnitTaxonomy;

    const TAXONOMY_JSON: &str = include_str!("../../../../config/conversion_factors.json");

    fn normalizer() -> UnitNormalizer {
        UnitNormalizer::new(UnitTaxonomy::from_json_str(TAXONOMY_JSON).unwrap())
    }

    fn detect(header: &str, samples: &[f64]) -> Option<String> {
        detect_column_unit(&normalizer(), header, samples, &DetectionConfig::default())
    }

    #[test]
    fn parenthesized_annotation_wins() {
        assert_eq!(detect("Energy Consumption (kWh)", &[1.0]), Some("kWh".into()));
        assert_eq!(detect("Emissions (tonnes CO₂e)", &[1.0]), Some("tonnes CO₂e".into()));
    }

    #[test]
    fn bracketed_annotation() {
        assert_eq!(detect("Thermal energy [GJ]", &[1.0]), Some("GJ".into()));
    }

    #[test]
    fn trailing_in_clause() {
        assert_eq!(detect("Electricity purchased in MWh", &[1.0]), Some("MWh".into()));
    }

    #[test]
    fn annotation_beats_heuristics() {
        // Magnitude says kWh, but the header says MWh.
        assert_eq!(detect("Energy Consumption (MWh)", &[500_000.0]), Some("MWh".into()));
    }

    #[test]
    fn energy_magnitude_tiers() {
        assert_eq!(detect("Total energy consumption", &[150_000.0]), Some("kWh".into()));
        assert_eq!(detect("Total energy consumption", &[5_000.0]), Some("MWh".into()));
        assert_eq!(detect("Total energy consumption", &[50.0]), Some("GJ".into()));
    }

    #[test]
    fn emission_keywords() {
        assert_eq!(detect("GHG emissions", &[120.0]), Some("tonnes CO₂e".into()));
        assert_eq!(detect("GHG emissions", &[250_000.0]), Some("kg CO₂e".into()));
        assert_eq!(detect("Carbon footprint kg", &[5.0]), Some("kg CO₂e".into()));
    }

    #[test]
    fn water_and_mass_keywords() {
        assert_eq!(detect("Water withdrawal", &[50_000.0]), Some("liters".into()));
        assert_eq!(detect("Water withdrawal", &[120.0]), Some("m³".into()));
        assert_eq!(detect("Waste generated", &[50_000.0]), Some("kg".into()));
        assert_eq!(detect("Waste generated", &[12.0]), Some("tonnes".into()));
    }

    #[test]
    fn unknown_header_yields_none() {
        assert_eq!(detect("Employee headcount", &[5_000.0]), None);
    }

    #[test]
    fn no_samples_yields_none() {
        assert_eq!(detect("Total energy consumption", &[]), None);
    }

    #[test]
    fn thresholds_are_configurable() {
        let config = DetectionConfig {
            energy_mwh_min: 1_000.0,
            ..DetectionConfig::default()
        };
        let unit = detect_column_unit(
            &normalizer(),
            "Total energy consumption",
            &[500.0],
            &config,
        );
        // 500 no longer clears the MWh bound, so it falls through to GJ.
        assert_eq!(unit, Some("GJ".into()));
    }
}
