//! Visit records, physician orders and coordination notes.

use super::SessionId;
use crate::{ClinicalError, ClinicalResult};
use chrono::{DateTime, NaiveDate, Utc};
use ratchet_types::NonEmptyText;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Billing service code for a home-health visit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ServiceCode {
    #[serde(rename = "SN00")]
    Sn00,
    #[serde(rename = "SN01")]
    Sn01,
    #[serde(rename = "SN04")]
    Sn04,
    #[serde(rename = "SN11")]
    Sn11,
    #[serde(rename = "ROC")]
    Roc,
    #[serde(rename = "D/C")]
    Discharge,
    #[serde(rename = "PT00")]
    Pt00,
    #[serde(rename = "PT01")]
    Pt01,
    #[serde(rename = "PT11")]
    Pt11,
    #[serde(rename = "OT01")]
    Ot01,
    #[serde(rename = "OT11")]
    Ot11,
    #[serde(rename = "ST01")]
    St01,
    #[serde(rename = "ST11")]
    St11,
    #[serde(rename = "HHA")]
    Hha,
    #[serde(rename = "MSW01")]
    Msw01,
    #[serde(rename = "MSW11")]
    Msw11,
}

impl ServiceCode {
    pub const ALL: [ServiceCode; 16] = [
        Self::Sn00,
        Self::Sn01,
        Self::Sn04,
        Self::Sn11,
        Self::Roc,
        Self::Discharge,
        Self::Pt00,
        Self::Pt01,
        Self::Pt11,
        Self::Ot01,
        Self::Ot11,
        Self::St01,
        Self::St11,
        Self::Hha,
        Self::Msw01,
        Self::Msw11,
    ];

    pub fn code(self) -> &'static str {
        match self {
            Self::Sn00 => "SN00",
            Self::Sn01 => "SN01",
            Self::Sn04 => "SN04",
            Self::Sn11 => "SN11",
            Self::Roc => "ROC",
            Self::Discharge => "D/C",
            Self::Pt00 => "PT00",
            Self::Pt01 => "PT01",
            Self::Pt11 => "PT11",
            Self::Ot01 => "OT01",
            Self::Ot11 => "OT11",
            Self::St01 => "ST01",
            Self::St11 => "ST11",
            Self::Hha => "HHA",
            Self::Msw01 => "MSW01",
            Self::Msw11 => "MSW11",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::Sn00 => "Skilled nursing start of care",
            Self::Sn01 => "Skilled nursing evaluation",
            Self::Sn04 => "Skilled nursing recertification",
            Self::Sn11 => "Skilled nursing routine visit",
            Self::Roc => "Resumption of care",
            Self::Discharge => "Discharge visit",
            Self::Pt00 => "Physical therapy start of care",
            Self::Pt01 => "Physical therapy evaluation",
            Self::Pt11 => "Physical therapy routine visit",
            Self::Ot01 => "Occupational therapy evaluation",
            Self::Ot11 => "Occupational therapy routine visit",
            Self::St01 => "Speech therapy evaluation",
            Self::St11 => "Speech therapy routine visit",
            Self::Hha => "Home health aide visit",
            Self::Msw01 => "Medical social worker evaluation",
            Self::Msw11 => "Medical social worker routine visit",
        }
    }
}

impl std::fmt::Display for ServiceCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

impl std::str::FromStr for ServiceCode {
    type Err = ClinicalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|code| code.code().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| ClinicalError::InvalidInput(format!("invalid service code '{}'", s)))
    }
}

/// Clinician attributed with a visit and every write made in it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clinician {
    /// Agency staff identifier, e.g. `STH-001`.
    pub id: NonEmptyText,
    /// Display name with credentials, e.g. `Stacey Thompson, RN`.
    pub name: NonEmptyText,
}

impl Clinician {
    pub fn new(id: impl AsRef<str>, name: impl AsRef<str>) -> ClinicalResult<Self> {
        Ok(Self {
            id: NonEmptyText::new(id)?,
            name: NonEmptyText::new(name)?,
        })
    }
}

impl std::fmt::Display for Clinician {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.id)
    }
}

/// How a visit ended.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Disposition {
    #[default]
    Complete,
    Incomplete,
    Missed,
    Rescheduled,
}

/// Archived summary of a completed visit, kept on the patient chart for the calendar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisitRecord {
    /// Human-facing identifier, `V-YYYYMMDD-NNN`.
    pub visit_id: String,
    pub session_id: SessionId,
    pub service_code: ServiceCode,
    pub clinician: Clinician,
    pub date: NaiveDate,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    #[serde(default)]
    pub disposition: Disposition,
    /// Number of writes per write kind.
    #[serde(default)]
    pub write_counts: BTreeMap<String, usize>,
    #[serde(default)]
    pub warning_count: usize,
    #[serde(default)]
    pub next_visit_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    Physician,
    PocUpdate,
    Discharge,
    HospitalHold,
    Roc,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    PendingSignature,
    Signed,
}

/// Verbal or written order raised during a visit, pending physician signature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub order_id: String,
    pub session_id: SessionId,
    pub order_type: OrderType,
    pub physician_id: NonEmptyText,
    pub instructions: NonEmptyText,
    pub effective_date: NaiveDate,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub status: OrderStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoteType {
    Clinical,
    #[serde(rename = "Physician Communication")]
    PhysicianCommunication,
    #[serde(rename = "Case Conference")]
    CaseConference,
    Insurance,
    #[serde(rename = "Family Communication")]
    FamilyCommunication,
    Other,
}

impl NoteType {
    pub const ALL: [NoteType; 6] = [
        Self::Clinical,
        Self::PhysicianCommunication,
        Self::CaseConference,
        Self::Insurance,
        Self::FamilyCommunication,
        Self::Other,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::Clinical => "Clinical",
            Self::PhysicianCommunication => "Physician Communication",
            Self::CaseConference => "Case Conference",
            Self::Insurance => "Insurance",
            Self::FamilyCommunication => "Family Communication",
            Self::Other => "Other",
        }
    }
}

/// Accepts the label in any case, with spaces, dashes or underscores between words.
impl std::str::FromStr for NoteType {
    type Err = ClinicalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalize = |text: &str| -> String {
            text.chars()
                .filter(|c| c.is_ascii_alphanumeric())
                .map(|c| c.to_ascii_lowercase())
                .collect()
        };
        let wanted = normalize(s);
        Self::ALL
            .into_iter()
            .find(|t| normalize(t.label()) == wanted)
            .ok_or_else(|| ClinicalError::InvalidInput(format!("unknown note type '{}'", s)))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoordinationNote {
    pub note_id: String,
    #[serde(default)]
    pub session_id: Option<SessionId>,
    pub note_type: NoteType,
    pub content: NonEmptyText,
    pub created_at: DateTime<Utc>,
}

/// Visits are documented on the day they happen or afterwards, never ahead of time.
pub(crate) fn check_visit_date(visit_date: NaiveDate, today: NaiveDate) -> ClinicalResult<()> {
    if visit_date > today {
        return Err(ClinicalError::InvalidInput(format!(
            "visit date {} is in the future",
            visit_date
        )));
    }
    Ok(())
}

/// Validates that a visit may be scheduled on or after `today`.
pub fn check_next_visit(next: Option<NaiveDate>, today: NaiveDate) -> ClinicalResult<()> {
    match next {
        Some(date) if date < today => Err(ClinicalError::InvalidInput(format!(
            "next visit date {} is in the past",
            date
        ))),
        _ => Ok(()),
    }
}
