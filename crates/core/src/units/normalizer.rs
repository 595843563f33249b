//! Conversion of measurement values into category base units.

use serde::Serialize;

use crate::error::UnitError;
use crate::units::taxonomy::UnitTaxonomy;

/// Categories measuring absolute physical quantities: negative values are
/// rejected for these, while relative categories (temperature, ratios) may
/// legitimately go below zero.
const ABSOLUTE_CATEGORIES: &[&str] = &["energy", "mass", "volume", "emissions", "area", "power"];

/// The result of normalizing one value into its category base unit.
#[derive(Debug, Clone, Serialize)]
pub struct Normalization {
    pub original_value: f64,
    pub original_unit: String,
    pub normalized_value: f64,
    pub normalized_unit: String,
    pub conversion_factor: f64,
    pub conversion_source: String,
    pub formula: String,
}

/// A resolved conversion factor between two units of the same category.
#[derive(Debug, Clone, Serialize)]
pub struct ConversionFactor {
    pub factor: f64,
    pub source: String,
    pub formula: String,
}

/// Pure, stateless unit converter over an immutable [`UnitTaxonomy`].
///
/// Constructed once at process start and shared across workers; every
/// method is a pure function of its arguments.
pub struct UnitNormalizer {
    taxonomy: UnitTaxonomy,
}

impl UnitNormalizer {
    pub fn new(taxonomy: UnitTaxonomy) -> Self {
        Self { taxonomy }
    }

    pub fn taxonomy(&self) -> &UnitTaxonomy {
        &self.taxonomy
    }

    /// Normalize a value to the base unit of its category.
    ///
    /// The category is resolved from the unit when not given. Negative
    /// values are rejected for absolute-measure categories, and a missing
    /// or non-linear factor is an error -- never approximated.
    pub fn normalize(
        &self,
        value: f64,
        from_unit: &str,
        category: Option<&str>,
    ) -> Result<Normalization, UnitError> {
        let (category, base_unit) = match category {
            None => self.taxonomy.resolve(from_unit).ok_or_else(|| {
                UnitError::UnitNotFound(format!("unit '{from_unit}' is not in the taxonomy"))
            })?,
            Some(name) => (name, self.taxonomy.base_unit(name)?),
        };

        if value < 0.0 && ABSOLUTE_CATEGORIES.contains(&category) {
            return Err(UnitError::InvalidValue(format!(
                "negative value for absolute measure: {value} {from_unit}"
            )));
        }

        if from_unit == base_unit {
            return Ok(Normalization {
                original_value: value,
                original_unit: from_unit.to_string(),
                normalized_value: value,
                normalized_unit: base_unit.to_string(),
                conversion_factor: 1.0,
                conversion_source: "No conversion needed".to_string(),
                formula: format!("{from_unit} * 1.0 = {base_unit}"),
            });
        }

        let entry = self.taxonomy.conversion(category, from_unit).ok_or_else(|| {
            UnitError::UnitNotFound(format!(
                "unit '{from_unit}' is not defined in category '{category}'"
            ))
        })?;

        let factor = entry.factor.ok_or_else(|| {
            UnitError::InvalidValue(format!(
                "non-linear conversion for '{from_unit}' cannot be applied as a factor \
                 (formula: {})",
                entry.formula
            ))
        })?;

        Ok(Normalization {
            original_value: value,
            original_unit: from_unit.to_string(),
            normalized_value: value * factor,
            normalized_unit: base_unit.to_string(),
            conversion_factor: factor,
            conversion_source: entry.source.clone(),
            formula: entry.formula.clone(),
        })
    }

    /// Detect a unit mentioned in free text, e.g. `"5000 kWh"`.
    ///
    /// Matchers are tried longest unit first, so "tonnes CO₂e" wins over
    /// "tonnes". Returns `(unit, category)`.
    pub fn detect_unit(&self, text: &str) -> Result<(&str, &str), UnitError> {
        let text = text.trim();
        for (regex, unit) in self.taxonomy.detectors() {
            if regex.is_match(text) {
                if let Some((category, _)) = self.taxonomy.resolve(unit) {
                    return Ok((unit.as_str(), category));
                }
            }
        }
        Err(UnitError::UnitNotFound(format!(
            "no recognisable unit found in text: '{text}'"
        )))
    }

    /// The composite factor converting `from_unit` into `to_unit`.
    ///
    /// Both units must belong to the same category; the factor is
    /// factor(from -> base) / factor(to -> base).
    pub fn conversion_factor(
        &self,
        from_unit: &str,
        to_unit: &str,
    ) -> Result<ConversionFactor, UnitError> {
        let (from_category, from_base) = self.taxonomy.resolve(from_unit).ok_or_else(|| {
            UnitError::UnitNotFound(format!("unit '{from_unit}' is not in the taxonomy"))
        })?;
        let (to_category, _) = self.taxonomy.resolve(to_unit).ok_or_else(|| {
            UnitError::UnitNotFound(format!("unit '{to_unit}' is not in the taxonomy"))
        })?;

        if from_category != to_category {
            return Err(UnitError::CategoryMismatch(format!(
                "cannot convert between different categories: \
                 {from_unit} ({from_category}) to {to_unit} ({to_category})"
            )));
        }

        if from_unit == to_unit {
            return Ok(ConversionFactor {
                factor: 1.0,
                source: "Identity conversion".to_string(),
                formula: format!("{from_unit} * 1.0 = {to_unit}"),
            });
        }

        let (from_factor, from_source) = self.factor_to_base(from_category, from_base, from_unit)?;
        let (to_factor, to_source) = self.factor_to_base(from_category, from_base, to_unit)?;

        let factor = from_factor / to_factor;
        Ok(ConversionFactor {
            factor,
            source: format!("{from_source}, {to_source}"),
            formula: format!("{from_unit} * {factor} = {to_unit}"),
        })
    }

    /// Whether a conversion between two units is possible at all.
    pub fn validate_conversion(&self, from_unit: &str, to_unit: &str) -> bool {
        self.conversion_factor(from_unit, to_unit).is_ok()
    }

    /// The base unit of a category.
    pub fn base_unit(&self, category: &str) -> Result<&str, UnitError> {
        self.taxonomy.base_unit(category)
    }

    /// All supported units, optionally filtered by category.
    pub fn supported_units(
        &self,
        category: Option<&str>,
    ) -> std::collections::BTreeMap<String, Vec<String>> {
        self.taxonomy.supported_units(category)
    }

    fn factor_to_base(
        &self,
        category: &str,
        base_unit: &str,
        unit: &str,
    ) -> Result<(f64, String), UnitError> {
        if unit == base_unit {
            return Ok((1.0, "Base unit".to_string()));
        }
        let entry = self.taxonomy.conversion(category, unit).ok_or_else(|| {
            UnitError::UnitNotFound(format!(
                "unit '{unit}' is not defined in category '{category}'"
            ))
        })?;
        let factor = entry.factor.ok_or_else(|| {
            UnitError::InvalidValue(format!("non-linear conversion not supported: {unit}"))
        })?;
        Ok((factor, entry.source.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::taxonomy::UnitTaxonomy;
    use assert_matches::assert_matches;

    const TAXONOMY_JSON: &str = include_str!("../../../../config/conversion_factors.json");

    fn normalizer() -> UnitNormalizer {
        UnitNormalizer::new(UnitTaxonomy::from_json_str(TAXONOMY_JSON).unwrap())
    }

    fn assert_close(actual: f64, expected: f64, rel: f64) {
        let scale = expected.abs().max(1e-12);
        assert!(
            (actual - expected).abs() / scale < rel,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn kwh_to_mwh() {
        let result = normalizer().normalize(5000.0, "kWh", Some("energy")).unwrap();
        assert_eq!(result.original_value, 5000.0);
        assert_eq!(result.original_unit, "kWh");
        assert_eq!(result.normalized_value, 5.0);
        assert_eq!(result.normalized_unit, "MWh");
        assert_eq!(result.conversion_factor, 0.001);
        assert!(result.conversion_source.contains("SI standard"));
    }

    #[test]
    fn gj_to_mwh() {
        let result = normalizer().normalize(100.0, "GJ", Some("energy")).unwrap();
        assert_close(result.normalized_value, 27.77778, 1e-4);
        assert_eq!(result.normalized_unit, "MWh");
        assert!(result.conversion_source.contains("NIST"));
    }

    #[test]
    fn mwh_identity() {
        let result = normalizer().normalize(10.5, "MWh", Some("energy")).unwrap();
        assert_eq!(result.normalized_value, 10.5);
        assert_eq!(result.conversion_factor, 1.0);
    }

    #[test]
    fn category_auto_detected_from_unit() {
        let result = normalizer().normalize(5000.0, "kWh", None).unwrap();
        assert_eq!(result.normalized_value, 5.0);
        assert_eq!(result.normalized_unit, "MWh");
        assert_eq!(result.conversion_factor, 0.001);
    }

    #[test]
    fn kg_to_tonnes() {
        let result = normalizer().normalize(1500.0, "kg", Some("mass")).unwrap();
        assert_eq!(result.normalized_value, 1.5);
        assert_eq!(result.normalized_unit, "tonnes");
    }

    #[test]
    fn kg_co2e_to_tonnes_co2e() {
        let result = normalizer().normalize(2500.0, "kg CO₂e", None).unwrap();
        assert_eq!(result.normalized_value, 2.5);
        assert_eq!(result.normalized_unit, "tonnes CO₂e");
    }

    #[test]
    fn compound_intensity_units() {
        let result = normalizer()
            .normalize(0.5, "kWh/kg", Some("compound_energy_intensity"))
            .unwrap();
        assert_eq!(result.normalized_value, 0.5);
        assert_eq!(result.normalized_unit, "MWh/tonne");

        let result = normalizer()
            .normalize(10.0, "GJ/tonne", Some("compound_energy_intensity"))
            .unwrap();
        assert_close(result.normalized_value, 2.777778, 1e-4);
    }

    #[test]
    fn zero_value_is_legal() {
        let result = normalizer().normalize(0.0, "kWh", None).unwrap();
        assert_eq!(result.normalized_value, 0.0);
    }

    #[test]
    fn negative_absolute_values_rejected() {
        for (value, unit) in [(-100.0, "kWh"), (-50.0, "kg"), (-1.0, "liters"), (-1.0, "kg CO₂e")]
        {
            assert_matches!(
                normalizer().normalize(value, unit, None),
                Err(UnitError::InvalidValue(_)),
                "expected rejection for {value} {unit}"
            );
        }
    }

    #[test]
    fn negative_temperature_is_legal() {
        // Temperature is not an absolute measure; the base unit °C passes
        // through as an identity conversion.
        let result = normalizer().normalize(-5.0, "°C", None).unwrap();
        assert_eq!(result.normalized_value, -5.0);
    }

    #[test]
    fn unknown_unit_rejected() {
        assert_matches!(
            normalizer().normalize(100.0, "xyz", None),
            Err(UnitError::UnitNotFound(_))
        );
    }

    #[test]
    fn unknown_category_rejected() {
        assert_matches!(
            normalizer().normalize(100.0, "kWh", Some("unknown_category")),
            Err(UnitError::UnitNotFound(_))
        );
    }

    #[test]
    fn unit_outside_its_category_rejected() {
        assert_matches!(
            normalizer().normalize(100.0, "kg", Some("energy")),
            Err(UnitError::UnitNotFound(_))
        );
    }

    #[test]
    fn non_linear_conversion_rejected() {
        assert_matches!(
            normalizer().normalize(32.0, "°F", Some("temperature")),
            Err(UnitError::InvalidValue(_))
        );
    }

    #[test]
    fn detects_unit_in_text() {
        let normalizer = normalizer();
        assert_eq!(normalizer.detect_unit("5000 kWh").unwrap(), ("kWh", "energy"));
        assert_eq!(normalizer.detect_unit("100 GJ").unwrap(), ("GJ", "energy"));
        assert_eq!(normalizer.detect_unit("1500kg").unwrap(), ("kg", "mass"));
    }

    #[test]
    fn longest_unit_wins_detection() {
        let normalizer = normalizer();
        assert_eq!(
            normalizer.detect_unit("12.5 tonnes CO₂e").unwrap(),
            ("tonnes CO₂e", "emissions")
        );
    }

    #[test]
    fn detection_fails_on_unknown_text() {
        assert_matches!(
            normalizer().detect_unit("5000 xyzzy"),
            Err(UnitError::UnitNotFound(_))
        );
    }

    #[test]
    fn conversion_factor_within_category() {
        let factor = normalizer().conversion_factor("kWh", "MWh").unwrap();
        assert_eq!(factor.factor, 0.001);
        assert!(factor.source.contains("SI standard"));
    }

    #[test]
    fn conversion_factor_identity() {
        let factor = normalizer().conversion_factor("MWh", "MWh").unwrap();
        assert_eq!(factor.factor, 1.0);
        assert!(factor.source.contains("Identity"));
    }

    #[test]
    fn conversion_factor_reverse() {
        let factor = normalizer().conversion_factor("MWh", "kWh").unwrap();
        assert_close(factor.factor, 1000.0, 1e-9);
    }

    #[test]
    fn conversion_factor_between_non_base_units() {
        // GJ -> kWh goes through the MWh base: 0.2777778 / 0.001.
        let factor = normalizer().conversion_factor("GJ", "kWh").unwrap();
        assert_close(factor.factor, 277.7778, 1e-4);
    }

    #[test]
    fn cross_category_conversion_always_rejected() {
        let normalizer = normalizer();
        let categories = normalizer.supported_units(None);
        let representatives: Vec<(String, String)> = categories
            .iter()
            .map(|(category, units)| (category.clone(), units[0].clone()))
            .collect();

        for (from_category, from_unit) in &representatives {
            for (to_category, to_unit) in &representatives {
                if from_category == to_category {
                    continue;
                }
                assert_matches!(
                    normalizer.conversion_factor(from_unit, to_unit),
                    Err(UnitError::CategoryMismatch(_)),
                    "expected mismatch for {from_unit} -> {to_unit}"
                );
            }
        }
    }

    #[test]
    fn validate_conversion_predicate() {
        let normalizer = normalizer();
        assert!(normalizer.validate_conversion("kWh", "MWh"));
        assert!(!normalizer.validate_conversion("kWh", "kg"));
        assert!(!normalizer.validate_conversion("xyz", "MWh"));
    }

    #[test]
    fn round_trip_reproduces_normalized_value() {
        // For every linear unit: normalize, then apply the unit -> base
        // factor directly; both paths must agree.
        let normalizer = normalizer();
        let value = 123.456;
        for units in normalizer.supported_units(None).values() {
            for unit in units {
                let normalized = match normalizer.normalize(value, unit, None) {
                    Ok(n) => n,
                    // Non-linear units cannot round-trip by definition.
                    Err(UnitError::InvalidValue(_)) => continue,
                    Err(e) => panic!("unexpected error for {unit}: {e}"),
                };
                let factor = normalizer
                    .conversion_factor(unit, &normalized.normalized_unit)
                    .unwrap();
                assert_close(value * factor.factor, normalized.normalized_value, 1e-9);
            }
        }
    }
}
