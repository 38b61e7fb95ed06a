//! Advisory findings attached to successful writes.
//!
//! Warnings never block a write. They are returned on each receipt and accumulated into the
//! visit summary; anything that must block is a [`crate::ClinicalError`] instead.

use crate::model::{DoseUnit, VitalFlag, WoundId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClinicalWarning {
    /// Proposed drug shares a therapeutic class with an active order.
    DuplicateTherapy {
        drug: String,
        existing_drug: String,
        therapeutic_class: String,
    },
    ModerateInteraction {
        drug: String,
        interacting_drug: String,
        description: String,
    },
    /// Dose sits within absolute bounds but outside the typical range.
    DoseOutsideTypicalRange {
        drug: String,
        dose: f64,
        unit: DoseUnit,
        typical_min: f64,
        typical_max: f64,
    },
    /// Nurse proceeded past an allergy contraindication with an explicit override.
    AllergyOverridden {
        drug: String,
        allergen: String,
        reaction: String,
    },
    /// Drug is not in the formulary, so no dose range could be checked.
    NoDoseReference { drug: String },
    Vital(VitalFlag),
    WoundRequiresAttention { wound_id: WoundId, wat_score: u8 },
}

impl std::fmt::Display for ClinicalWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateTherapy {
                drug,
                existing_drug,
                therapeutic_class,
            } => write!(
                f,
                "duplicate therapy: {} and {} are both {}",
                drug, existing_drug, therapeutic_class
            ),
            Self::ModerateInteraction {
                drug,
                interacting_drug,
                description,
            } => write!(
                f,
                "moderate interaction between {} and {}: {}",
                drug, interacting_drug, description
            ),
            Self::DoseOutsideTypicalRange {
                drug,
                dose,
                unit,
                typical_min,
                typical_max,
            } => write!(
                f,
                "{} {} {} is outside the typical range {}-{} {}",
                drug, dose, unit, typical_min, typical_max, unit
            ),
            Self::AllergyOverridden {
                drug,
                allergen,
                reaction,
            } => write!(
                f,
                "{} given despite {} allergy ({}); override recorded",
                drug, allergen, reaction
            ),
            Self::NoDoseReference { drug } => {
                write!(f, "no dose reference for {}; dose not checked", drug)
            }
            Self::Vital(VitalFlag::Trending {
                sign,
                slope,
                threshold,
                window,
            }) => write!(
                f,
                "{} trending {:+.2} per reading over {} readings (threshold {})",
                sign, slope, window, threshold
            ),
            Self::Vital(VitalFlag::OutOfRange {
                sign,
                value,
                min,
                max,
            }) => {
                write!(f, "{} {} is out of range", sign, value)?;
                match (min, max) {
                    (Some(lo), Some(hi)) => write!(f, " ({}-{})", lo, hi),
                    (Some(lo), None) => write!(f, " (min {})", lo),
                    (None, Some(hi)) => write!(f, " (max {})", hi),
                    (None, None) => Ok(()),
                }
            }
            Self::WoundRequiresAttention {
                wound_id,
                wat_score,
            } => write!(
                f,
                "wound {} WAT score {} indicates it needs attention",
                wound_id, wat_score
            ),
        }
    }
}
