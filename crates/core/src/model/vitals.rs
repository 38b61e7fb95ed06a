//! Vital sign readings.
//!
//! Readings are stored in each sign's canonical unit so trend windows compare like with
//! like. Callers may submit temperature in °C or weight in kg; [`Measurement::to_canonical`]
//! converts before anything is stored or analysed.

use super::SessionId;
use crate::{ClinicalError, ClinicalResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VitalSign {
    BloodPressureSystolic,
    BloodPressureDiastolic,
    HeartRate,
    RespiratoryRate,
    Temperature,
    OxygenSaturation,
    Weight,
    PainLevel,
}

impl VitalSign {
    pub const ALL: [VitalSign; 8] = [
        Self::BloodPressureSystolic,
        Self::BloodPressureDiastolic,
        Self::HeartRate,
        Self::RespiratoryRate,
        Self::Temperature,
        Self::OxygenSaturation,
        Self::Weight,
        Self::PainLevel,
    ];

    pub fn canonical_unit(self) -> VitalUnit {
        match self {
            Self::BloodPressureSystolic | Self::BloodPressureDiastolic => VitalUnit::MmHg,
            Self::HeartRate => VitalUnit::Bpm,
            Self::RespiratoryRate => VitalUnit::BreathsPerMin,
            Self::Temperature => VitalUnit::Fahrenheit,
            Self::OxygenSaturation => VitalUnit::Percent,
            Self::Weight => VitalUnit::Pounds,
            Self::PainLevel => VitalUnit::Score,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::BloodPressureSystolic => "blood_pressure_systolic",
            Self::BloodPressureDiastolic => "blood_pressure_diastolic",
            Self::HeartRate => "heart_rate",
            Self::RespiratoryRate => "respiratory_rate",
            Self::Temperature => "temperature",
            Self::OxygenSaturation => "oxygen_saturation",
            Self::Weight => "weight",
            Self::PainLevel => "pain_level",
        }
    }
}

impl std::fmt::Display for VitalSign {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for VitalSign {
    type Err = ClinicalError;

    /// Accepts the canonical names plus the short aliases nurses use (`bp`, `hr`, `o2`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase();
        let sign = match key.as_str() {
            "bp" | "blood_pressure" | "blood_pressure_systolic" => Self::BloodPressureSystolic,
            "blood_pressure_diastolic" => Self::BloodPressureDiastolic,
            "hr" | "heart_rate" => Self::HeartRate,
            "rr" | "respiratory_rate" => Self::RespiratoryRate,
            "temp" | "temperature" => Self::Temperature,
            "o2" | "spo2" | "oxygen_saturation" => Self::OxygenSaturation,
            "weight" => Self::Weight,
            "pain" | "pain_level" => Self::PainLevel,
            _ => {
                return Err(ClinicalError::InvalidInput(format!(
                    "unknown vital sign '{}'",
                    s
                )))
            }
        };
        Ok(sign)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VitalUnit {
    #[serde(rename = "mmHg")]
    MmHg,
    #[serde(rename = "bpm")]
    Bpm,
    #[serde(rename = "breaths/min")]
    BreathsPerMin,
    #[serde(rename = "F")]
    Fahrenheit,
    #[serde(rename = "C")]
    Celsius,
    #[serde(rename = "%")]
    Percent,
    #[serde(rename = "lb", alias = "lbs")]
    Pounds,
    #[serde(rename = "kg")]
    Kilograms,
    #[serde(rename = "score")]
    Score,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub value: f64,
    pub unit: VitalUnit,
}

impl Measurement {
    pub fn new(value: f64, unit: VitalUnit) -> Self {
        Self { value, unit }
    }

    /// Converts to the canonical unit for `sign` and checks the value is physically
    /// plausible (finite, non-negative, pain within 0-10, saturation at most 100%).
    pub fn to_canonical(self, sign: VitalSign) -> ClinicalResult<Measurement> {
        if !self.value.is_finite() || self.value < 0.0 {
            return Err(ClinicalError::InvalidMeasurement(format!(
                "{} must be a non-negative number, got {}",
                sign, self.value
            )));
        }

        let target = sign.canonical_unit();
        let value = match (self.unit, target) {
            (from, to) if from == to => self.value,
            (VitalUnit::Celsius, VitalUnit::Fahrenheit) => self.value * 9.0 / 5.0 + 32.0,
            (VitalUnit::Kilograms, VitalUnit::Pounds) => self.value * 2.204_622_621_8,
            (from, to) => {
                return Err(ClinicalError::InvalidMeasurement(format!(
                    "{} cannot be recorded in {:?}; expected {:?}",
                    sign, from, to
                )))
            }
        };

        let out_of_scale = match sign {
            VitalSign::PainLevel => value > crate::constants::MAX_PAIN_SCORE,
            VitalSign::OxygenSaturation => value > 100.0,
            _ => false,
        };
        if out_of_scale {
            return Err(ClinicalError::InvalidMeasurement(format!(
                "{} value {} is outside its scale",
                sign, value
            )));
        }

        Ok(Measurement::new(value, target))
    }
}

/// Advisory flag derived by the trend analyzer. Never supplied by callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "flag", rename_all = "snake_case")]
pub enum VitalFlag {
    /// Least-squares slope across the window exceeds the configured threshold.
    Trending {
        sign: VitalSign,
        /// Change per reading, in the sign's canonical unit.
        slope: f64,
        threshold: f64,
        window: usize,
    },
    /// Latest value falls outside the configured absolute bounds.
    OutOfRange {
        sign: VitalSign,
        value: f64,
        min: Option<f64>,
        max: Option<f64>,
    },
}

impl VitalFlag {
    pub fn sign(&self) -> VitalSign {
        match self {
            Self::Trending { sign, .. } | Self::OutOfRange { sign, .. } => *sign,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VitalsReading {
    #[serde(default)]
    pub session_id: Option<SessionId>,
    pub recorded_at: DateTime<Utc>,
    pub measurements: BTreeMap<VitalSign, Measurement>,
    #[serde(default)]
    pub flags: Vec<VitalFlag>,
}

impl VitalsReading {
    pub fn value(&self, sign: VitalSign) -> Option<f64> {
        self.measurements.get(&sign).map(|m| m.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_celsius_converts_to_fahrenheit() {
        let m = Measurement::new(37.0, VitalUnit::Celsius)
            .to_canonical(VitalSign::Temperature)
            .unwrap();
        assert!((m.value - 98.6).abs() < 1e-9);
        assert_eq!(m.unit, VitalUnit::Fahrenheit);
    }

    #[test]
    fn test_incompatible_unit_is_invalid_measurement() {
        let err = Measurement::new(70.0, VitalUnit::Kilograms)
            .to_canonical(VitalSign::HeartRate)
            .unwrap_err();
        assert!(matches!(err, ClinicalError::InvalidMeasurement(_)));
    }

    #[test]
    fn test_pain_above_ten_rejected() {
        let err = Measurement::new(11.0, VitalUnit::Score)
            .to_canonical(VitalSign::PainLevel)
            .unwrap_err();
        assert!(matches!(err, ClinicalError::InvalidMeasurement(_)));
    }

    #[test]
    fn test_sign_aliases_parse() {
        assert_eq!("bp".parse::<VitalSign>().unwrap(), VitalSign::BloodPressureSystolic);
        assert_eq!("O2".parse::<VitalSign>().unwrap(), VitalSign::OxygenSaturation);
        assert!("glucose".parse::<VitalSign>().is_err());
    }
}
