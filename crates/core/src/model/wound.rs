//! Wound records and their assessment snapshots.

use super::{SessionId, WoundId};
use chrono::{DateTime, NaiveDate, Utc};
use ratchet_types::NonEmptyText;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WoundType {
    #[serde(rename = "Surgical incision")]
    SurgicalIncision,
    #[serde(rename = "Pressure ulcer")]
    PressureUlcer,
    #[serde(rename = "Venous ulcer")]
    VenousUlcer,
    #[serde(rename = "Arterial ulcer")]
    ArterialUlcer,
    #[serde(rename = "Diabetic ulcer")]
    DiabeticUlcer,
    #[serde(rename = "Skin tear")]
    SkinTear,
    Laceration,
    Burn,
    Other,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WoundStatus {
    #[default]
    Active,
    Healed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Drainage {
    #[default]
    None,
    #[serde(rename = "Minimal serous")]
    MinimalSerous,
    #[serde(rename = "Moderate serous")]
    ModerateSerous,
    Sanguineous,
    Serosanguineous,
    Purulent,
}

/// Wound size in centimetres.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WoundDimensions {
    pub length_cm: f64,
    pub width_cm: f64,
    #[serde(default)]
    pub depth_cm: f64,
}

/// Descriptive findings recorded alongside the measurements.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WoundAttributes {
    #[serde(default)]
    pub edges: Option<String>,
    #[serde(default)]
    pub drainage: Drainage,
    #[serde(default)]
    pub periwound: Option<String>,
    #[serde(default)]
    pub wound_bed: Option<String>,
    #[serde(default)]
    pub infection_signs: bool,
}

/// One assessment snapshot. Snapshots are appended, never edited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WoundAssessment {
    pub stage: u8,
    pub dimensions: WoundDimensions,
    #[serde(default)]
    pub attributes: WoundAttributes,
    /// Set when the stage was allowed to decrease.
    #[serde(default)]
    pub regression_flagged: bool,
    /// Wound Assessment Tool score, 0 (healing well) to 5.
    pub wat_score: u8,
    pub assessed_at: DateTime<Utc>,
    #[serde(default)]
    pub session_id: Option<SessionId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WoundRecord {
    pub wound_id: WoundId,
    pub wound_type: WoundType,
    pub location: NonEmptyText,
    pub onset_date: NaiveDate,
    #[serde(default)]
    pub status: WoundStatus,
    #[serde(default)]
    pub assessments: Vec<WoundAssessment>,
}

impl WoundRecord {
    pub fn latest(&self) -> Option<&WoundAssessment> {
        self.assessments.last()
    }

    pub fn latest_stage(&self) -> Option<u8> {
        self.latest().map(|a| a.stage)
    }

    pub fn is_active(&self) -> bool {
        self.status == WoundStatus::Active
    }
}
