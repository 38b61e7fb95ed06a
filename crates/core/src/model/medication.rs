//! Medication orders.

use super::{MedicationId, SessionId};
use chrono::NaiveDate;
use ratchet_types::NonEmptyText;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MedicationStatus {
    Active,
    Discontinued,
}

/// Route of administration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Route {
    #[default]
    Po,
    Iv,
    Im,
    Sq,
    Sl,
    Pr,
    Top,
    Inh,
    Oph,
    Ot,
    Nas,
    Td,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DoseUnit {
    Mg,
    #[serde(alias = "gm")]
    G,
    #[serde(alias = "ug", alias = "µg")]
    Mcg,
    #[serde(alias = "mL")]
    Ml,
    Units,
}

impl DoseUnit {
    /// Milligrams per one of this unit, for mass units only.
    fn milligrams_per_unit(self) -> Option<f64> {
        match self {
            Self::Mg => Some(1.0),
            Self::G => Some(1000.0),
            Self::Mcg => Some(0.001),
            Self::Ml | Self::Units => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Mg => "mg",
            Self::G => "g",
            Self::Mcg => "mcg",
            Self::Ml => "mL",
            Self::Units => "units",
        }
    }
}

impl std::fmt::Display for DoseUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Dose {
    pub value: f64,
    pub unit: DoseUnit,
}

impl Dose {
    pub fn new(value: f64, unit: DoseUnit) -> Self {
        Self { value, unit }
    }

    pub fn mg(value: f64) -> Self {
        Self::new(value, DoseUnit::Mg)
    }

    /// Expresses this dose in `target` units.
    ///
    /// Mass units convert between each other; volume and unit-counted doses only compare
    /// against the same unit. Returns `None` when no conversion exists.
    pub fn value_in(&self, target: DoseUnit) -> Option<f64> {
        if self.unit == target {
            return Some(self.value);
        }
        let from = self.unit.milligrams_per_unit()?;
        let to = target.milligrams_per_unit()?;
        Some(self.value * from / to)
    }
}

impl std::fmt::Display for Dose {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.value, self.unit)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MedicationOrder {
    pub med_id: MedicationId,
    pub drug: NonEmptyText,
    #[serde(default)]
    pub dose: Option<Dose>,
    #[serde(default)]
    pub route: Route,
    #[serde(default)]
    pub frequency: Option<String>,
    #[serde(default)]
    pub times: Vec<String>,
    #[serde(default)]
    pub purpose: Option<String>,
    #[serde(default)]
    pub prescriber: Option<String>,
    pub start_date: NaiveDate,
    pub status: MedicationStatus,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub discontinue_reason: Option<NonEmptyText>,
    /// Visit session that added this order, if it was added during a visit.
    #[serde(default)]
    pub added_in_session: Option<SessionId>,
    /// Last visit session in which this order was reconciled with the patient.
    #[serde(default)]
    pub last_reconciled_in: Option<SessionId>,
}

impl MedicationOrder {
    pub fn is_active(&self) -> bool {
        self.status == MedicationStatus::Active
    }
}
