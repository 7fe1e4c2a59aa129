//! Dosage Normalizer
//!
//! Converts free-text dosages to a canonical unit (mg or mg/ml).

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// First run of digits with at most one decimal point.
fn number_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\d+(?:\.\d*)?|\.\d+").expect("static pattern"))
}

/// A dose expressed in a canonical unit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StandardizedDose {
    pub value: f64,
    pub unit: &'static str,
}

/// Normalize a dosage to mg (or mg/ml for concentrations).
///
/// Takes the first number found anywhere in `dosage`. Returns `None` when
/// either input is blank, no number is present, or the unit is not one of
/// mg, mcg, μg, g, gram, grams, mg/ml, "mg per ml".
pub fn normalize_dosage(dosage: &str, unit: &str) -> Option<StandardizedDose> {
    if dosage.trim().is_empty() || unit.trim().is_empty() {
        return None;
    }

    let unit = unit.trim().to_lowercase();
    let value: f64 = number_pattern().find(dosage)?.as_str().parse().ok()?;

    match unit.as_str() {
        "mg" => Some(StandardizedDose { value, unit: "mg" }),
        "mcg" | "μg" => Some(StandardizedDose {
            value: value / 1000.0,
            unit: "mg",
        }),
        "g" | "gram" | "grams" => Some(StandardizedDose {
            value: value * 1000.0,
            unit: "mg",
        }),
        "mg/ml" | "mg per ml" => Some(StandardizedDose {
            value,
            unit: "mg/ml",
        }),
        _ => None,
    }
}

/// How `standardized_dose` / `standardized_unit` are filled on medication
/// rows. `Verbatim` copies the extracted dosage and unit unchanged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DosagePolicy {
    #[default]
    Verbatim,
    Normalize,
}

impl DosagePolicy {
    /// Standardized (dose, unit) cells for one medication. A normalized dose
    /// always keeps its decimal point, so 500 mg is written as `500.0`.
    pub fn apply(&self, dosage: &str, unit: &str) -> (Option<String>, Option<String>) {
        match self {
            Self::Verbatim => (Some(dosage.to_string()), Some(unit.to_string())),
            Self::Normalize => match normalize_dosage(dosage, unit) {
                Some(dose) => (Some(format!("{:?}", dose.value)), Some(dose.unit.to_string())),
                None => (None, None),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dose(value: f64, unit: &'static str) -> Option<StandardizedDose> {
        Some(StandardizedDose { value, unit })
    }

    #[test]
    fn test_known_conversions() {
        assert_eq!(normalize_dosage("500mg", "mg"), dose(500.0, "mg"));
        assert_eq!(normalize_dosage("5", "g"), dose(5000.0, "mg"));
        assert_eq!(normalize_dosage("2000", "mcg"), dose(2.0, "mg"));
        assert_eq!(normalize_dosage("250", "μg"), dose(0.25, "mg"));
        assert_eq!(normalize_dosage("1", "grams"), dose(1000.0, "mg"));
    }

    #[test]
    fn test_concentration_units() {
        assert_eq!(normalize_dosage("2.5", "mg/mL"), dose(2.5, "mg/ml"));
        assert_eq!(normalize_dosage("10", "mg per ml"), dose(10.0, "mg/ml"));
    }

    #[test]
    fn test_soft_failures() {
        assert_eq!(normalize_dosage("", "mg"), None);
        assert_eq!(normalize_dosage("10", ""), None);
        assert_eq!(normalize_dosage("10", "teaspoons"), None);
        assert_eq!(normalize_dosage("as directed", "mg"), None);
    }

    #[test]
    fn test_unit_is_trimmed_and_case_insensitive() {
        assert_eq!(normalize_dosage("20", "  MG "), dose(20.0, "mg"));
        assert_eq!(normalize_dosage("20", "Mcg"), dose(0.02, "mg"));
    }

    #[test]
    fn test_first_number_wins() {
        assert_eq!(normalize_dosage("take 1.5 tablets of 20", "mg"), dose(1.5, "mg"));
        assert_eq!(normalize_dosage("-5", "mg"), dose(5.0, "mg"));
        assert_eq!(normalize_dosage("1e3", "mg"), dose(1.0, "mg"));
    }

    #[test]
    fn test_policy_verbatim_copies_input() {
        let (dose, unit) = DosagePolicy::Verbatim.apply("10mg", "mg");
        assert_eq!(dose.as_deref(), Some("10mg"));
        assert_eq!(unit.as_deref(), Some("mg"));
    }

    #[test]
    fn test_policy_normalize_converts() {
        let (dose, unit) = DosagePolicy::Normalize.apply("2000", "mcg");
        assert_eq!(dose.as_deref(), Some("2.0"));
        assert_eq!(unit.as_deref(), Some("mg"));

        let (dose, _) = DosagePolicy::Normalize.apply("500mg", "mg");
        assert_eq!(dose.as_deref(), Some("500.0"));
        let (dose, _) = DosagePolicy::Normalize.apply("250", "mcg");
        assert_eq!(dose.as_deref(), Some("0.25"));

        assert_eq!(DosagePolicy::Normalize.apply("10", "tsp"), (None, None));
    }
}
