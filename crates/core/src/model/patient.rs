//! Patient identity and demographics.

use super::PatientId;
use chrono::{Datelike, NaiveDate};
use ratchet_types::NonEmptyText;
use serde::{Deserialize, Serialize};

/// Home-health episode status. Only `Active` patients count as active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EpisodeStatus {
    Active,
    Inactive,
    Discharged,
    Pending,
}

impl std::str::FromStr for EpisodeStatus {
    type Err = crate::ClinicalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "active" => Ok(Self::Active),
            "inactive" => Ok(Self::Inactive),
            "discharged" => Ok(Self::Discharged),
            "pending" => Ok(Self::Pending),
            other => Err(crate::ClinicalError::InvalidInput(format!(
                "unknown episode status '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Address {
    pub street: String,
    pub city: String,
    pub state: String,
    pub zip: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Demographics {
    pub first_name: NonEmptyText,
    pub last_name: NonEmptyText,
    #[serde(default)]
    pub preferred_name: Option<String>,
    pub dob: NaiveDate,
    pub gender: String,
    #[serde(default)]
    pub phone_home: Option<String>,
    #[serde(default)]
    pub phone_cell: Option<String>,
    pub address: Address,
    /// Used by weight-adjusted dose ranges when present.
    #[serde(default)]
    pub weight_kg: Option<f64>,
}

impl Demographics {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Age in whole years on `on`.
    pub fn age_on(&self, on: NaiveDate) -> u32 {
        let mut years = on.year() - self.dob.year();
        if (on.month(), on.day()) < (self.dob.month(), self.dob.day()) {
            years -= 1;
        }
        years.max(0) as u32
    }

    pub fn phones(&self) -> impl Iterator<Item = &str> {
        self.phone_home
            .as_deref()
            .into_iter()
            .chain(self.phone_cell.as_deref())
    }
}

/// Partial update of the mutable contact fields. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DemographicsUpdate {
    #[serde(default)]
    pub preferred_name: Option<String>,
    #[serde(default)]
    pub phone_home: Option<String>,
    #[serde(default)]
    pub phone_cell: Option<String>,
    #[serde(default)]
    pub address: Option<Address>,
    #[serde(default)]
    pub weight_kg: Option<f64>,
}

impl DemographicsUpdate {
    pub fn is_empty(&self) -> bool {
        self.preferred_name.is_none()
            && self.phone_home.is_none()
            && self.phone_cell.is_none()
            && self.address.is_none()
            && self.weight_kg.is_none()
    }

    pub fn apply_to(self, demographics: &mut Demographics) {
        if let Some(name) = self.preferred_name {
            demographics.preferred_name = Some(name);
        }
        if let Some(phone) = self.phone_home {
            demographics.phone_home = Some(phone);
        }
        if let Some(phone) = self.phone_cell {
            demographics.phone_cell = Some(phone);
        }
        if let Some(address) = self.address {
            demographics.address = address;
        }
        if let Some(weight) = self.weight_kg {
            demographics.weight_kg = Some(weight);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AllergySeverity {
    Mild,
    Moderate,
    Severe,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Allergy {
    pub allergen: NonEmptyText,
    pub reaction: String,
    pub severity: AllergySeverity,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnosis {
    pub icd10: String,
    pub description: String,
    #[serde(default)]
    pub is_primary: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patient {
    pub patient_id: PatientId,
    pub status: EpisodeStatus,
    pub demographics: Demographics,
    #[serde(default)]
    pub allergies: Vec<Allergy>,
    #[serde(default)]
    pub diagnoses: Vec<Diagnosis>,
}

impl Patient {
    pub fn is_active(&self) -> bool {
        self.status == EpisodeStatus::Active
    }

    pub fn primary_diagnosis(&self) -> Option<&Diagnosis> {
        self.diagnoses
            .iter()
            .find(|d| d.is_primary)
            .or_else(|| self.diagnoses.first())
    }
}
