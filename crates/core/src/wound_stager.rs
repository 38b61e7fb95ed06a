//! Wound assessment staging.
//!
//! Stage is an ordinal with no fixed scale. The first snapshot of a wound sets the baseline,
//! whatever its stage, and later stages are non-decreasing unless the nurse explicitly flags a
//! regression. Dimensions are the only measurements rejected outright. Snapshots are built here and appended by the caller; nothing edits an
//! existing snapshot.

use crate::constants::WAT_ATTENTION_THRESHOLD;
use crate::model::{Drainage, SessionId, WoundAssessment, WoundAttributes, WoundDimensions, WoundRecord};
use crate::validation::non_negative_measurement;
use crate::warnings::ClinicalWarning;
use crate::{ClinicalError, ClinicalResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WoundAssessmentInput {
    pub stage: u8,
    pub dimensions: WoundDimensions,
    #[serde(default)]
    pub attributes: WoundAttributes,
    /// Allows the stage to decrease relative to the latest snapshot.
    #[serde(default)]
    pub regression_flag: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StagedAssessment {
    pub assessment: WoundAssessment,
    pub warning: Option<ClinicalWarning>,
}

/// Wound Assessment Tool score from 0 to 5. Higher means the wound needs more attention.
pub fn wat_score(dimensions: &WoundDimensions, attributes: &WoundAttributes) -> u8 {
    let mut score = 0;
    if dimensions.length_cm > 5.0 {
        score += 1;
    }
    if dimensions.depth_cm > 0.5 {
        score += 1;
    }
    if attributes.drainage != Drainage::None {
        score += 1;
    }
    if attributes.infection_signs {
        score += 2;
    }
    score
}

/// Builds the next snapshot for `record` without modifying it.
pub fn add_assessment(
    record: &WoundRecord,
    input: WoundAssessmentInput,
    at: DateTime<Utc>,
    session_id: Option<SessionId>,
) -> ClinicalResult<StagedAssessment> {
    non_negative_measurement("wound length_cm", input.dimensions.length_cm)?;
    non_negative_measurement("wound width_cm", input.dimensions.width_cm)?;
    non_negative_measurement("wound depth_cm", input.dimensions.depth_cm)?;

    let mut regression_flagged = false;
    if let Some(previous) = record.latest_stage() {
        if input.stage < previous {
            if !input.regression_flag {
                return Err(ClinicalError::StageRegression {
                    wound_id: record.wound_id.to_string(),
                    previous,
                    proposed: input.stage,
                });
            }
            regression_flagged = true;
            tracing::warn!(
                wound_id = %record.wound_id,
                previous,
                proposed = input.stage,
                "wound stage regression accepted with flag"
            );
        }
    }

    let score = wat_score(&input.dimensions, &input.attributes);
    let warning = (score > WAT_ATTENTION_THRESHOLD).then(|| ClinicalWarning::WoundRequiresAttention {
        wound_id: record.wound_id.clone(),
        wat_score: score,
    });

    Ok(StagedAssessment {
        assessment: WoundAssessment {
            stage: input.stage,
            dimensions: input.dimensions,
            attributes: input.attributes,
            regression_flagged,
            wat_score: score,
            assessed_at: at,
            session_id,
        },
        warning,
    })
}
