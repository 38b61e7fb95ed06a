//! Body-system assessments and the fixed question catalog nurses answer during a visit.

use super::SessionId;
use crate::{ClinicalError, ClinicalResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssessmentCategory {
    Cardiovascular,
    Respiratory,
    Neurological,
    Integumentary,
    Gastrointestinal,
    Genitourinary,
    Musculoskeletal,
}

impl AssessmentCategory {
    pub const ALL: [AssessmentCategory; 7] = [
        Self::Cardiovascular,
        Self::Respiratory,
        Self::Neurological,
        Self::Integumentary,
        Self::Gastrointestinal,
        Self::Genitourinary,
        Self::Musculoskeletal,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cardiovascular => "cardiovascular",
            Self::Respiratory => "respiratory",
            Self::Neurological => "neurological",
            Self::Integumentary => "integumentary",
            Self::Gastrointestinal => "gastrointestinal",
            Self::Genitourinary => "genitourinary",
            Self::Musculoskeletal => "musculoskeletal",
        }
    }

    pub fn questions(self) -> &'static [AssessmentQuestion] {
        match self {
            Self::Cardiovascular => CARDIOVASCULAR,
            Self::Respiratory => RESPIRATORY,
            Self::Neurological => NEUROLOGICAL,
            Self::Integumentary => INTEGUMENTARY,
            Self::Gastrointestinal => GASTROINTESTINAL,
            Self::Genitourinary => GENITOURINARY,
            Self::Musculoskeletal => MUSCULOSKELETAL,
        }
    }

    pub fn question(self, id: &str) -> Option<&'static AssessmentQuestion> {
        self.questions().iter().find(|q| q.id == id)
    }
}

impl std::fmt::Display for AssessmentCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AssessmentCategory {
    type Err = ClinicalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| {
                ClinicalError::InvalidInput(format!("invalid assessment category '{}'", s))
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "options", rename_all = "lowercase")]
pub enum QuestionKind {
    Select(&'static [&'static str]),
    #[serde(rename = "multiselect")]
    MultiSelect(&'static [&'static str]),
    Boolean,
    Text,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AssessmentQuestion {
    pub id: &'static str,
    pub text: &'static str,
    #[serde(flatten)]
    pub kind: QuestionKind,
}

const fn q(id: &'static str, text: &'static str, kind: QuestionKind) -> AssessmentQuestion {
    AssessmentQuestion { id, text, kind }
}

use QuestionKind::{Boolean, MultiSelect, Select, Text};

const CARDIOVASCULAR: &[AssessmentQuestion] = &[
    q(
        "cv1",
        "Heart sounds",
        Select(&[
            "S1S2 regular rate",
            "S1S2 irregular",
            "Murmur present",
            "S3 gallop",
            "S4 gallop",
        ]),
    ),
    q(
        "cv2",
        "Pedal edema",
        Select(&["None", "Trace", "+1", "+2", "+3", "+4"]),
    ),
    q("cv3", "JVD present", Boolean),
    q("cv4", "Chest pain", Boolean),
    q("cv5", "Additional findings", Text),
];

const RESPIRATORY: &[AssessmentQuestion] = &[
    q(
        "resp1",
        "Lung sounds",
        Select(&[
            "Clear throughout",
            "Diminished bases",
            "Crackles",
            "Wheezes",
            "Rhonchi",
        ]),
    ),
    q(
        "resp2",
        "Dyspnea",
        Select(&["None", "With exertion", "At rest", "Orthopnea"]),
    ),
    q("resp3", "Cough present", Boolean),
    q("resp4", "Oxygen in use", Boolean),
    q("resp5", "Additional findings", Text),
];

const NEUROLOGICAL: &[AssessmentQuestion] = &[
    q(
        "neuro1",
        "Level of consciousness",
        Select(&["Alert", "Lethargic", "Obtunded", "Unresponsive"]),
    ),
    q(
        "neuro2",
        "Orientation",
        MultiSelect(&["Person", "Place", "Time", "Situation"]),
    ),
    q("neuro3", "Speech", Select(&["Clear", "Slurred", "Aphasia"])),
    q(
        "neuro4",
        "Pupils",
        Select(&["PERRLA", "Unequal", "Non-reactive"]),
    ),
    q("neuro5", "Additional findings", Text),
];

const INTEGUMENTARY: &[AssessmentQuestion] = &[
    q("skin1", "Skin integrity", Select(&["Intact", "Impaired"])),
    q(
        "skin2",
        "Color",
        Select(&["Normal", "Pale", "Cyanotic", "Jaundiced", "Flushed"]),
    ),
    q("skin3", "Turgor", Select(&["Normal", "Decreased", "Tenting"])),
    q("skin4", "Wounds present", Boolean),
    q("skin5", "Additional findings", Text),
];

const GASTROINTESTINAL: &[AssessmentQuestion] = &[
    q(
        "gi1",
        "Bowel sounds",
        Select(&["Normal", "Hyperactive", "Hypoactive", "Absent"]),
    ),
    q(
        "gi2",
        "Abdomen",
        Select(&["Soft, non-tender", "Distended", "Tender", "Rigid"]),
    ),
    q("gi3", "Last bowel movement", Text),
    q("gi4", "Nausea/vomiting", Boolean),
    q("gi5", "Additional findings", Text),
];

const GENITOURINARY: &[AssessmentQuestion] = &[
    q(
        "gu1",
        "Voiding pattern",
        Select(&["Normal", "Frequency", "Urgency", "Incontinence", "Retention"]),
    ),
    q("gu2", "Catheter present", Boolean),
    q(
        "gu3",
        "Urine characteristics",
        Select(&["Clear yellow", "Dark", "Cloudy", "Bloody"]),
    ),
    q("gu4", "Additional findings", Text),
];

const MUSCULOSKELETAL: &[AssessmentQuestion] = &[
    q("msk1", "ROM limitations", Text),
    q(
        "msk2",
        "Strength",
        Select(&["5/5 all extremities", "Weakness present", "Paralysis"]),
    ),
    q(
        "msk3",
        "Gait",
        Select(&[
            "Steady",
            "Unsteady",
            "Uses assistive device",
            "Non-ambulatory",
        ]),
    ),
    q("msk4", "Fall risk", Select(&["Low", "Moderate", "High"])),
    q("msk5", "Additional findings", Text),
];

/// One answer. The shape must match the question kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AssessmentResponse {
    Flag(bool),
    Choices(Vec<String>),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentRecord {
    pub session_id: SessionId,
    pub category: AssessmentCategory,
    #[serde(default)]
    pub narrative: Option<String>,
    pub responses: BTreeMap<String, AssessmentResponse>,
    pub recorded_at: DateTime<Utc>,
}

/// Checks every response against the category's catalog.
///
/// Unknown question ids, answers of the wrong shape and options outside the catalog are
/// all rejected. A submission needs at least one response or a narrative.
pub fn validate_responses(
    category: AssessmentCategory,
    responses: &BTreeMap<String, AssessmentResponse>,
    narrative: Option<&str>,
) -> ClinicalResult<()> {
    let has_narrative = narrative.is_some_and(|n| !n.trim().is_empty());
    if responses.is_empty() && !has_narrative {
        return Err(ClinicalError::InvalidInput(format!(
            "{} assessment has no responses",
            category
        )));
    }

    for (id, response) in responses {
        let question = category.question(id).ok_or_else(|| {
            ClinicalError::InvalidInput(format!(
                "question '{}' is not part of the {} assessment",
                id, category
            ))
        })?;

        let valid = match (question.kind, response) {
            (Select(options), AssessmentResponse::Text(choice)) => options.contains(&choice.as_str()),
            (MultiSelect(options), AssessmentResponse::Choices(choices)) => {
                choices.iter().all(|c| options.contains(&c.as_str()))
            }
            (MultiSelect(options), AssessmentResponse::Text(choice)) => {
                options.contains(&choice.as_str())
            }
            (Boolean, AssessmentResponse::Flag(_)) => true,
            (Text, AssessmentResponse::Text(text)) => !text.trim().is_empty(),
            _ => false,
        };

        if !valid {
            return Err(ClinicalError::InvalidInput(format!(
                "response to '{}' ({}) is not a valid answer",
                id, question.text
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn responses(pairs: &[(&str, AssessmentResponse)]) -> BTreeMap<String, AssessmentResponse> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_every_category_has_questions() {
        for category in AssessmentCategory::ALL {
            assert!(!category.questions().is_empty(), "{category}");
        }
    }

    #[test]
    fn test_valid_cardiovascular_responses_accepted() {
        let r = responses(&[
            ("cv2", AssessmentResponse::Text("+2".into())),
            ("cv3", AssessmentResponse::Flag(false)),
        ]);
        validate_responses(AssessmentCategory::Cardiovascular, &r, None).unwrap();
    }

    #[test]
    fn test_unknown_question_rejected() {
        let r = responses(&[("resp9", AssessmentResponse::Flag(true))]);
        let err = validate_responses(AssessmentCategory::Respiratory, &r, None).unwrap_err();
        assert!(matches!(err, ClinicalError::InvalidInput(_)));
    }

    #[test]
    fn test_option_outside_catalog_rejected() {
        let r = responses(&[("cv2", AssessmentResponse::Text("+7".into()))]);
        assert!(validate_responses(AssessmentCategory::Cardiovascular, &r, None).is_err());
    }

    #[test]
    fn test_empty_submission_needs_narrative() {
        let empty = BTreeMap::new();
        assert!(validate_responses(AssessmentCategory::Neurological, &empty, None).is_err());
        validate_responses(
            AssessmentCategory::Neurological,
            &empty,
            Some("Alert and oriented x4"),
        )
        .unwrap();
    }

    #[test]
    fn test_category_parses_case_insensitively() {
        assert_eq!(
            "Integumentary".parse::<AssessmentCategory>().unwrap(),
            AssessmentCategory::Integumentary
        );
        assert!("dental".parse::<AssessmentCategory>().is_err());
    }
}
