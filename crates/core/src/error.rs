use crate::medication_safety::MedicationRejection;
use crate::model::GoalStatus;

/// Kinds of record a lookup can fail to find.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Patient,
    Medication,
    CarePlanGoal,
    Intervention,
    Wound,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Patient => "patient",
            Self::Medication => "medication",
            Self::CarePlanGoal => "care plan goal",
            Self::Intervention => "intervention",
            Self::Wound => "wound",
        };
        f.write_str(label)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ClinicalError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: EntityKind, id: String },

    #[error("patient {patient_id} already has an active visit session ({active_session})")]
    Conflict {
        patient_id: String,
        active_session: String,
    },

    #[error("invalid session {session_id}: {reason}")]
    InvalidSession { session_id: String, reason: String },

    #[error("unsafe medication: {0}")]
    UnsafeMedication(MedicationRejection),

    #[error("goal {goal_id} is closed ({status}) and accepts no further interventions")]
    GoalClosed { goal_id: String, status: GoalStatus },

    #[error("wound {wound_id} stage would regress from {previous} to {proposed} without a regression flag")]
    StageRegression {
        wound_id: String,
        previous: u8,
        proposed: u8,
    },

    #[error("invalid measurement: {0}")]
    InvalidMeasurement(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid dataset: {0}")]
    InvalidDataset(String),

    #[error("failed to read file: {0}")]
    FileRead(std::io::Error),

    /// Surfaced unchanged from record store implementations backed by remote or fallible
    /// storage; callers decide whether to retry.
    #[error("record store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("invalid identifier: {0}")]
    Identifier(#[from] ratchet_uuid::UuidError),

    #[error("invalid text: {0}")]
    Text(#[from] ratchet_types::TextError),
}

impl ClinicalError {
    pub(crate) fn not_found(entity: EntityKind, id: impl std::fmt::Display) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub(crate) fn invalid_session(session_id: impl std::fmt::Display, reason: &str) -> Self {
        Self::InvalidSession {
            session_id: session_id.to_string(),
            reason: reason.to_string(),
        }
    }
}

pub type ClinicalResult<T> = std::result::Result<T, ClinicalError>;
