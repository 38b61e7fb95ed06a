//! Clinical rule configuration.
//!
//! `ClinicalConfig` carries the tables the validators consult: the drug formulary with
//! dose ranges, the interaction table, vitals thresholds and the trend window. It is
//! resolved once at startup and shared as `Arc<ClinicalConfig>`; nothing in this crate reads
//! environment variables.
//!
//! A YAML file may override any table. Tables it omits keep the built-in defaults.

use crate::constants::{DEFAULT_TREND_WINDOW, MIN_TREND_WINDOW};
use crate::model::{DoseUnit, VitalSign};
use crate::{ClinicalError, ClinicalResult};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClinicalConfig {
    #[serde(default = "default_trend_window")]
    pub trend_window: usize,
    #[serde(default = "default_drugs")]
    pub drugs: Vec<DrugProfile>,
    #[serde(default = "default_interactions")]
    pub interactions: Vec<InteractionRule>,
    #[serde(default = "default_vitals")]
    pub vitals: BTreeMap<VitalSign, VitalThreshold>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DrugProfile {
    pub name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    pub therapeutic_class: String,
    #[serde(default)]
    pub dose: Option<DoseRange>,
    #[serde(default)]
    pub adjustments: Vec<DoseAdjustment>,
}

/// Single-dose bounds. Outside `typical_*` warns; outside `absolute_*` rejects.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DoseRange {
    pub unit: DoseUnit,
    pub typical_min: f64,
    pub typical_max: f64,
    pub absolute_min: f64,
    pub absolute_max: f64,
}

/// Lowered ceilings for older or lighter patients.
///
/// Applies when every condition it names holds. When several apply, the lowest ceiling wins.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DoseAdjustment {
    #[serde(default)]
    pub min_age_years: Option<u32>,
    #[serde(default)]
    pub max_weight_kg: Option<f64>,
    #[serde(default)]
    pub typical_max: Option<f64>,
    #[serde(default)]
    pub absolute_max: Option<f64>,
}

impl DoseAdjustment {
    fn applies(&self, age_years: Option<u32>, weight_kg: Option<f64>) -> bool {
        if self.min_age_years.is_none() && self.max_weight_kg.is_none() {
            return false;
        }
        let age_ok = match self.min_age_years {
            Some(min) => age_years.is_some_and(|age| age >= min),
            None => true,
        };
        let weight_ok = match self.max_weight_kg {
            Some(max) => weight_kg.is_some_and(|w| w <= max),
            None => true,
        };
        age_ok && weight_ok
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InteractionSeverity {
    Moderate,
    Severe,
}

/// Interaction between two drugs. Order of `drug_a` and `drug_b` does not matter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InteractionRule {
    pub drug_a: String,
    pub drug_b: String,
    pub severity: InteractionSeverity,
    pub description: String,
}

impl InteractionRule {
    pub fn involves(&self, a: &str, b: &str) -> bool {
        let (x, y) = (self.drug_a.as_str(), self.drug_b.as_str());
        (x.eq_ignore_ascii_case(a) && y.eq_ignore_ascii_case(b))
            || (x.eq_ignore_ascii_case(b) && y.eq_ignore_ascii_case(a))
    }
}

/// Bounds for one vital sign, in its canonical unit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VitalThreshold {
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
    /// Largest acceptable absolute change per reading across the trend window.
    #[serde(default)]
    pub max_slope: Option<f64>,
}

impl Default for ClinicalConfig {
    fn default() -> Self {
        Self {
            trend_window: default_trend_window(),
            drugs: default_drugs(),
            interactions: default_interactions(),
            vitals: default_vitals(),
        }
    }
}

impl ClinicalConfig {
    /// Parses and validates a YAML document.
    pub fn from_yaml_str(yaml_text: &str) -> ClinicalResult<Self> {
        let config: Self = parse_yaml(yaml_text, "clinical config")
            .map_err(ClinicalError::InvalidConfig)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> ClinicalResult<Self> {
        let text = std::fs::read_to_string(path).map_err(ClinicalError::FileRead)?;
        let config = Self::from_yaml_str(&text)?;
        tracing::info!(
            path = %path.display(),
            drugs = config.drugs.len(),
            interactions = config.interactions.len(),
            "loaded clinical config"
        );
        Ok(config)
    }

    pub fn validate(&self) -> ClinicalResult<()> {
        if self.trend_window < MIN_TREND_WINDOW {
            return Err(ClinicalError::InvalidConfig(format!(
                "trend_window must be at least {}, got {}",
                MIN_TREND_WINDOW, self.trend_window
            )));
        }

        let mut seen = std::collections::HashSet::new();
        for drug in &self.drugs {
            if drug.name.trim().is_empty() || drug.therapeutic_class.trim().is_empty() {
                return Err(ClinicalError::InvalidConfig(
                    "drug name and therapeutic_class cannot be empty".into(),
                ));
            }
            for name in std::iter::once(&drug.name).chain(&drug.aliases) {
                if !seen.insert(name.to_ascii_lowercase()) {
                    return Err(ClinicalError::InvalidConfig(format!(
                        "drug name '{}' is listed more than once",
                        name
                    )));
                }
            }
            if let Some(range) = &drug.dose {
                validate_range(&drug.name, range)?;
            }
            for adjustment in &drug.adjustments {
                if adjustment.min_age_years.is_none() && adjustment.max_weight_kg.is_none() {
                    return Err(ClinicalError::InvalidConfig(format!(
                        "dose adjustment for '{}' needs min_age_years or max_weight_kg",
                        drug.name
                    )));
                }
                if drug.dose.is_none() {
                    return Err(ClinicalError::InvalidConfig(format!(
                        "dose adjustment for '{}' has no base dose range",
                        drug.name
                    )));
                }
            }
        }

        for rule in &self.interactions {
            if rule.drug_a.eq_ignore_ascii_case(&rule.drug_b) {
                return Err(ClinicalError::InvalidConfig(format!(
                    "interaction rule pairs '{}' with itself",
                    rule.drug_a
                )));
            }
        }

        for (sign, threshold) in &self.vitals {
            if let (Some(min), Some(max)) = (threshold.min, threshold.max) {
                if min > max {
                    return Err(ClinicalError::InvalidConfig(format!(
                        "{} threshold min {} exceeds max {}",
                        sign, min, max
                    )));
                }
            }
            if threshold.max_slope.is_some_and(|s| !s.is_finite() || s <= 0.0) {
                return Err(ClinicalError::InvalidConfig(format!(
                    "{} max_slope must be positive",
                    sign
                )));
            }
        }

        Ok(())
    }

    /// Finds a drug by name or alias, ignoring case.
    pub fn drug(&self, name: &str) -> Option<&DrugProfile> {
        let name = name.trim();
        self.drugs.iter().find(|d| {
            d.name.eq_ignore_ascii_case(name) || d.aliases.iter().any(|a| a.eq_ignore_ascii_case(name))
        })
    }

    /// Canonical formulary name for `name`, or `name` itself when it is not in the formulary.
    pub fn canonical_drug_name<'a>(&'a self, name: &'a str) -> &'a str {
        self.drug(name).map_or(name.trim(), |d| d.name.as_str())
    }

    pub fn interaction(&self, a: &str, b: &str) -> Option<&InteractionRule> {
        let a = self.canonical_drug_name(a);
        let b = self.canonical_drug_name(b);
        self.interactions.iter().find(|rule| rule.involves(a, b))
    }

    pub fn threshold(&self, sign: VitalSign) -> Option<&VitalThreshold> {
        self.vitals.get(&sign)
    }
}

impl DrugProfile {
    /// Dose range after applying every adjustment that fits this patient.
    pub fn effective_range(&self, age_years: Option<u32>, weight_kg: Option<f64>) -> Option<DoseRange> {
        let mut range = self.dose?;
        for adjustment in self.adjustments.iter().filter(|a| a.applies(age_years, weight_kg)) {
            if let Some(max) = adjustment.typical_max {
                range.typical_max = range.typical_max.min(max);
            }
            if let Some(max) = adjustment.absolute_max {
                range.absolute_max = range.absolute_max.min(max);
            }
        }
        range.typical_max = range.typical_max.min(range.absolute_max);
        range.typical_min = range.typical_min.min(range.typical_max);
        Some(range)
    }
}

fn validate_range(drug: &str, range: &DoseRange) -> ClinicalResult<()> {
    let values = [
        range.absolute_min,
        range.typical_min,
        range.typical_max,
        range.absolute_max,
    ];
    if values.iter().any(|v| !v.is_finite() || *v < 0.0) {
        return Err(ClinicalError::InvalidConfig(format!(
            "dose range for '{}' must contain non-negative numbers",
            drug
        )));
    }
    if values.windows(2).any(|w| w[0] > w[1]) {
        return Err(ClinicalError::InvalidConfig(format!(
            "dose range for '{}' must satisfy absolute_min <= typical_min <= typical_max <= absolute_max",
            drug
        )));
    }
    Ok(())
}

/// Deserializes YAML, reporting schema errors with the path of the offending field.
pub(crate) fn parse_yaml<T: DeserializeOwned>(yaml_text: &str, label: &str) -> Result<T, String> {
    let deserializer = serde_yaml::Deserializer::from_str(yaml_text);
    serde_path_to_error::deserialize(deserializer).map_err(|err| {
        let path = err.path().to_string();
        let source = err.into_inner();
        let path = if path.is_empty() || path == "." {
            "<root>"
        } else {
            path.as_str()
        };
        format!("{label} schema mismatch at {path}: {source}")
    })
}

fn default_trend_window() -> usize {
    DEFAULT_TREND_WINDOW
}

fn drug(
    name: &str,
    class: &str,
    unit: DoseUnit,
    typical: (f64, f64),
    absolute: (f64, f64),
) -> DrugProfile {
    DrugProfile {
        name: name.to_string(),
        aliases: Vec::new(),
        therapeutic_class: class.to_string(),
        dose: Some(DoseRange {
            unit,
            typical_min: typical.0,
            typical_max: typical.1,
            absolute_min: absolute.0,
            absolute_max: absolute.1,
        }),
        adjustments: Vec::new(),
    }
}

impl DrugProfile {
    fn with_aliases(mut self, aliases: &[&str]) -> Self {
        self.aliases = aliases.iter().map(|a| a.to_string()).collect();
        self
    }

    fn with_adjustment(mut self, adjustment: DoseAdjustment) -> Self {
        self.adjustments.push(adjustment);
        self
    }
}

fn older_than(age: u32, typical_max: f64) -> DoseAdjustment {
    DoseAdjustment {
        min_age_years: Some(age),
        max_weight_kg: None,
        typical_max: Some(typical_max),
        absolute_max: None,
    }
}

fn default_drugs() -> Vec<DrugProfile> {
    use DoseUnit::{Mg, Units};

    vec![
        drug("Warfarin", "anticoagulant", Mg, (1.0, 10.0), (0.5, 15.0))
            .with_aliases(&["Coumadin", "Jantoven"])
            .with_adjustment(older_than(75, 5.0)),
        drug("Aspirin", "antiplatelet", Mg, (75.0, 325.0), (40.0, 1000.0))
            .with_aliases(&["ASA"]),
        drug("Clopidogrel", "antiplatelet", Mg, (75.0, 300.0), (37.5, 600.0))
            .with_aliases(&["Plavix"]),
        drug("Ibuprofen", "NSAID", Mg, (200.0, 800.0), (100.0, 1200.0))
            .with_aliases(&["Advil", "Motrin"]),
        drug("Naproxen", "NSAID", Mg, (220.0, 500.0), (125.0, 1000.0))
            .with_aliases(&["Aleve"]),
        drug("Metoprolol", "beta blocker", Mg, (25.0, 100.0), (12.5, 400.0))
            .with_aliases(&["Lopressor", "Toprol XL"]),
        drug("Lisinopril", "ACE inhibitor", Mg, (5.0, 40.0), (2.5, 80.0))
            .with_aliases(&["Zestril", "Prinivil"]),
        drug("Losartan", "angiotensin receptor blocker", Mg, (25.0, 100.0), (12.5, 150.0))
            .with_aliases(&["Cozaar"]),
        drug("Furosemide", "loop diuretic", Mg, (20.0, 80.0), (10.0, 600.0))
            .with_aliases(&["Lasix"]),
        drug("Spironolactone", "potassium-sparing diuretic", Mg, (25.0, 100.0), (12.5, 400.0))
            .with_aliases(&["Aldactone"]),
        drug("Digoxin", "cardiac glycoside", Mg, (0.125, 0.25), (0.0625, 0.5))
            .with_aliases(&["Lanoxin"])
            .with_adjustment(older_than(70, 0.125)),
        drug("Amiodarone", "antiarrhythmic", Mg, (100.0, 400.0), (100.0, 1600.0)),
        drug("Metformin", "biguanide", Mg, (500.0, 1000.0), (250.0, 2000.0))
            .with_aliases(&["Glucophage"]),
        drug("Insulin glargine", "long-acting insulin", Units, (10.0, 80.0), (1.0, 300.0))
            .with_aliases(&["Lantus"]),
        drug("Atorvastatin", "statin", Mg, (10.0, 80.0), (10.0, 80.0))
            .with_aliases(&["Lipitor"]),
        drug("Simvastatin", "statin", Mg, (10.0, 40.0), (5.0, 80.0))
            .with_aliases(&["Zocor"]),
        drug("Clarithromycin", "macrolide antibiotic", Mg, (250.0, 500.0), (250.0, 1000.0)),
        drug("Acetaminophen", "analgesic", Mg, (325.0, 1000.0), (160.0, 1000.0))
            .with_aliases(&["Tylenol", "Paracetamol"])
            .with_adjustment(DoseAdjustment {
                min_age_years: None,
                max_weight_kg: Some(50.0),
                typical_max: Some(500.0),
                absolute_max: Some(750.0),
            }),
        drug("Amoxicillin", "penicillin", Mg, (250.0, 875.0), (125.0, 1000.0)),
        drug("Oxycodone", "opioid", Mg, (5.0, 15.0), (2.5, 30.0))
            .with_aliases(&["Roxicodone"]),
        drug("Tramadol", "opioid", Mg, (50.0, 100.0), (25.0, 100.0))
            .with_aliases(&["Ultram"]),
        drug("Lorazepam", "benzodiazepine", Mg, (0.5, 2.0), (0.25, 4.0))
            .with_aliases(&["Ativan"]),
        drug("Sertraline", "SSRI", Mg, (50.0, 200.0), (25.0, 200.0))
            .with_aliases(&["Zoloft"]),
    ]
}

fn rule(a: &str, b: &str, severity: InteractionSeverity, description: &str) -> InteractionRule {
    InteractionRule {
        drug_a: a.to_string(),
        drug_b: b.to_string(),
        severity,
        description: description.to_string(),
    }
}

fn default_interactions() -> Vec<InteractionRule> {
    use InteractionSeverity::{Moderate, Severe};

    vec![
        rule("Warfarin", "Ibuprofen", Severe, "major bleeding risk"),
        rule("Warfarin", "Naproxen", Severe, "major bleeding risk"),
        rule("Warfarin", "Amiodarone", Severe, "amiodarone markedly raises INR"),
        rule("Oxycodone", "Lorazepam", Severe, "respiratory depression"),
        rule("Simvastatin", "Clarithromycin", Severe, "rhabdomyolysis risk"),
        rule("Sertraline", "Tramadol", Severe, "serotonin syndrome and seizure risk"),
        rule("Warfarin", "Aspirin", Moderate, "increased bleeding risk"),
        rule("Warfarin", "Clopidogrel", Moderate, "increased bleeding risk"),
        rule("Lisinopril", "Spironolactone", Moderate, "hyperkalemia risk"),
        rule("Losartan", "Spironolactone", Moderate, "hyperkalemia risk"),
        rule("Lisinopril", "Losartan", Moderate, "dual RAAS blockade"),
        rule("Digoxin", "Amiodarone", Moderate, "raises digoxin levels"),
        rule("Aspirin", "Ibuprofen", Moderate, "blunts antiplatelet effect, GI bleeding risk"),
    ]
}

fn default_vitals() -> BTreeMap<VitalSign, VitalThreshold> {
    let threshold = |min: Option<f64>, max: Option<f64>, max_slope: Option<f64>| VitalThreshold {
        min,
        max,
        max_slope,
    };

    BTreeMap::from([
        (
            VitalSign::BloodPressureSystolic,
            threshold(Some(90.0), Some(160.0), Some(10.0)),
        ),
        (
            VitalSign::BloodPressureDiastolic,
            threshold(Some(60.0), Some(100.0), None),
        ),
        (
            VitalSign::HeartRate,
            threshold(Some(50.0), Some(100.0), Some(10.0)),
        ),
        (
            VitalSign::RespiratoryRate,
            threshold(Some(12.0), Some(24.0), None),
        ),
        (
            VitalSign::Temperature,
            threshold(Some(96.8), Some(100.4), Some(1.0)),
        ),
        (
            VitalSign::OxygenSaturation,
            threshold(Some(92.0), None, Some(2.0)),
        ),
        (VitalSign::Weight, threshold(None, None, Some(2.0))),
        (VitalSign::PainLevel, threshold(None, Some(7.0), None)),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        ClinicalConfig::default().validate().unwrap();
    }

    #[test]
    fn test_drug_lookup_by_alias_ignores_case() {
        let config = ClinicalConfig::default();
        assert_eq!(config.drug("coumadin").unwrap().name, "Warfarin");
        assert_eq!(config.canonical_drug_name("LASIX"), "Furosemide");
        assert_eq!(config.canonical_drug_name("Unobtainium"), "Unobtainium");
    }

    #[test]
    fn test_interaction_lookup_is_order_insensitive() {
        let config = ClinicalConfig::default();
        let forward = config.interaction("Warfarin", "Aspirin").unwrap();
        let reverse = config.interaction("asa", "warfarin").unwrap();
        assert_eq!(forward, reverse);
        assert_eq!(forward.severity, InteractionSeverity::Moderate);
        assert!(config.interaction("Metoprolol", "Aspirin").is_none());
    }

    #[test]
    fn test_age_adjustment_lowers_typical_ceiling() {
        let config = ClinicalConfig::default();
        let warfarin = config.drug("Warfarin").unwrap();

        let adult = warfarin.effective_range(Some(50), None).unwrap();
        let elderly = warfarin.effective_range(Some(80), None).unwrap();

        assert_eq!(adult.typical_max, 10.0);
        assert_eq!(elderly.typical_max, 5.0);
        assert_eq!(elderly.absolute_max, 15.0);
    }

    #[test]
    fn test_weight_adjustment_needs_known_weight() {
        let config = ClinicalConfig::default();
        let apap = config.drug("Acetaminophen").unwrap();

        assert_eq!(apap.effective_range(Some(40), None).unwrap().absolute_max, 1000.0);
        assert_eq!(apap.effective_range(Some(40), Some(45.0)).unwrap().absolute_max, 750.0);
    }

    #[test]
    fn test_yaml_override_keeps_omitted_tables() {
        let yaml = "trend_window: 3\nvitals:\n  heart_rate:\n    min: 55\n    max: 95\n";
        let config = ClinicalConfig::from_yaml_str(yaml).unwrap();

        assert_eq!(config.trend_window, 3);
        assert_eq!(config.vitals.len(), 1);
        assert_eq!(config.threshold(VitalSign::HeartRate).unwrap().min, Some(55.0));
        assert!(config.drug("Warfarin").is_some());
    }

    #[test]
    fn test_unknown_field_reports_path() {
        let yaml = "drugs:\n  - name: Foo\n    therapeutic_class: bar\n    strength: 3\n";
        let err = ClinicalConfig::from_yaml_str(yaml).unwrap_err();
        match err {
            ClinicalError::InvalidConfig(msg) => assert!(msg.contains("drugs[0]"), "{msg}"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_small_trend_window_rejected() {
        let err = ClinicalConfig::from_yaml_str("trend_window: 1\n").unwrap_err();
        assert!(matches!(err, ClinicalError::InvalidConfig(_)));
    }

    #[test]
    fn test_inverted_dose_range_rejected() {
        let yaml = r#"
drugs:
  - name: Foo
    therapeutic_class: bar
    dose:
      unit: mg
      typical_min: 10
      typical_max: 5
      absolute_min: 1
      absolute_max: 20
"#;
        assert!(matches!(
            ClinicalConfig::from_yaml_str(yaml),
            Err(ClinicalError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "trend_window: 4").unwrap();

        let config = ClinicalConfig::load(file.path()).unwrap();
        assert_eq!(config.trend_window, 4);
    }

    #[test]
    fn test_load_missing_file_is_file_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ClinicalConfig::load(&dir.path().join("absent.yaml")).unwrap_err();
        assert!(matches!(err, ClinicalError::FileRead(_)));
    }

    #[test]
    fn test_shipped_override_file_is_valid() {
        let config =
            ClinicalConfig::from_yaml_str(include_str!("../../../config/clinical.yaml")).unwrap();
        assert_eq!(config.trend_window, 4);
        assert_eq!(
            config.threshold(VitalSign::PainLevel).and_then(|t| t.max),
            Some(6.0)
        );
        assert_eq!(config.drugs, default_drugs());
    }
}
