//! Domain records held by the record store and produced by visit sessions.
//!
//! Every record is scoped to one patient. Histories (wound snapshots, intervention events,
//! vitals readings, orders, notes) are append-only: the store exposes no way to edit an
//! entry once recorded.

pub mod assessment;
pub mod care_plan;
pub mod medication;
pub mod patient;
pub mod visit;
pub mod vitals;
pub mod wound;

pub use assessment::{
    AssessmentCategory, AssessmentQuestion, AssessmentRecord, AssessmentResponse, QuestionKind,
};
pub use care_plan::{
    CarePlan, CarePlanGoal, CarePlanIntervention, GoalStatus, InterventionEvent, InterventionRef,
};
pub use medication::{Dose, DoseUnit, MedicationOrder, MedicationStatus, Route};
pub use patient::{
    Address, Allergy, AllergySeverity, Demographics, DemographicsUpdate, Diagnosis,
    EpisodeStatus, Patient,
};
pub use visit::{
    Clinician, CoordinationNote, Disposition, NoteType, Order, OrderStatus, OrderType, ServiceCode,
    VisitRecord,
};
pub use vitals::{Measurement, VitalFlag, VitalSign, VitalUnit, VitalsReading};
pub use wound::{
    Drainage, WoundAssessment, WoundAttributes, WoundDimensions, WoundRecord, WoundStatus,
    WoundType,
};

use ratchet_types::NonEmptyText;
use ratchet_uuid::UuidService;
use serde::{Deserialize, Serialize};

macro_rules! text_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(NonEmptyText);

        impl $name {
            pub fn new(input: impl AsRef<str>) -> crate::ClinicalResult<Self> {
                Ok(Self(NonEmptyText::new(input)?))
            }

            pub fn as_str(&self) -> &str {
                self.0.as_str()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.0.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = crate::ClinicalError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }
    };
}

text_id!(
    /// Patient identifier as issued by the EMR, e.g. `PT-10001`.
    PatientId
);
text_id!(
    /// Medication order identifier, unique within a patient (`MED-003`).
    MedicationId
);
text_id!(
    /// Care plan goal identifier.
    GoalId
);
text_id!(
    /// Care plan intervention identifier.
    InterventionId
);
text_id!(
    /// Wound identifier, unique within a patient (`W-001`).
    WoundId
);

/// Identifier of one visit session. Issued by `start_visit`, never reused.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(UuidService);

impl SessionId {
    pub(crate) fn generate() -> Self {
        Self(UuidService::new())
    }

    /// Parses a session identifier handed back by a caller.
    pub fn parse(input: &str) -> crate::ClinicalResult<Self> {
        Ok(Self(UuidService::parse(input.trim())?))
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for SessionId {
    type Err = crate::ClinicalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Next identifier such as `MED-004`, one past the highest existing `PREFIX-NNN`.
///
/// Fails with `InvalidDataset` when the highest existing number leaves no successor.
pub(crate) fn next_sequential_id<'a>(
    prefix: &str,
    existing: impl IntoIterator<Item = &'a str>,
) -> crate::ClinicalResult<String> {
    let highest = existing
        .into_iter()
        .filter_map(|id| id.strip_prefix(prefix)?.strip_prefix('-')?.parse::<u32>().ok())
        .max()
        .unwrap_or(0);
    let next = highest.checked_add(1).ok_or_else(|| {
        crate::ClinicalError::InvalidDataset(format!(
            "no {} identifier left after {}-{}",
            prefix, prefix, highest
        ))
    })?;
    Ok(format!("{}-{:03}", prefix, next))
}
