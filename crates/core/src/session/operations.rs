//! Clinical writes routed through an active visit session.

use super::{VisitSession, VisitSessionManager};
use crate::constants::{MEDICATION_ID_PREFIX, NOTE_ID_PREFIX, ORDER_ID_PREFIX, WOUND_ID_PREFIX};
use crate::error::EntityKind;
use crate::goal_tracker::{self, GoalTransition};
use crate::medication_safety::MedicationProposal;
use crate::model::{
    next_sequential_id, AssessmentCategory, AssessmentRecord, AssessmentResponse,
    CoordinationNote, GoalId, InterventionEvent, InterventionId, Measurement, MedicationId,
    MedicationOrder, MedicationStatus, NoteType, Order, OrderStatus, OrderType, VitalSign,
    VitalsReading, WoundAssessment, WoundAttributes, WoundDimensions, WoundId, WoundRecord,
    WoundStatus, WoundType,
};
use crate::model::assessment::validate_responses;
use crate::warnings::ClinicalWarning;
use crate::wound_stager::{self, WoundAssessmentInput};
use crate::{vitals_trend, ClinicalError, ClinicalResult};
use chrono::{DateTime, NaiveDate, Utc};
use ratchet_types::NonEmptyText;
use ratchet_uuid::{TimestampUuid, UuidService};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

fn provided_by_default() -> bool {
    true
}

/// Every clinical write a visit can make.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum WriteOperation {
    RecordVitals {
        measurements: BTreeMap<VitalSign, Measurement>,
    },
    AddMedication(MedicationProposal),
    DiscontinueMedication {
        med_id: MedicationId,
        reason: NonEmptyText,
        /// Last day of the order. Defaults to the visit date.
        #[serde(default)]
        effective_date: Option<NaiveDate>,
    },
    /// Attests that the nurse reviewed these orders with the patient.
    ReconcileMedications {
        medication_ids: Vec<MedicationId>,
    },
    SubmitAssessment {
        category: AssessmentCategory,
        #[serde(default)]
        narrative: Option<String>,
        #[serde(default)]
        responses: BTreeMap<String, AssessmentResponse>,
    },
    DocumentIntervention {
        intervention_id: InterventionId,
        #[serde(default = "provided_by_default")]
        provided: bool,
        #[serde(default)]
        outcome_note: Option<NonEmptyText>,
        /// Caller's signal that the linked goal is now met.
        #[serde(default)]
        goal_met: bool,
    },
    MarkGoalNotMet {
        goal_id: GoalId,
        reason: NonEmptyText,
    },
    AddWound {
        wound_type: WoundType,
        location: NonEmptyText,
        #[serde(default)]
        onset_date: Option<NaiveDate>,
    },
    DocumentWoundAssessment {
        wound_id: WoundId,
        stage: u8,
        dimensions: WoundDimensions,
        #[serde(default)]
        attributes: WoundAttributes,
        #[serde(default)]
        regression_flag: bool,
    },
    CreateOrder {
        order_type: OrderType,
        physician_id: NonEmptyText,
        instructions: NonEmptyText,
        #[serde(default)]
        effective_date: Option<NaiveDate>,
    },
    AddCoordinationNote {
        note_type: NoteType,
        content: NonEmptyText,
    },
}

impl WriteOperation {
    pub fn kind(&self) -> WriteKind {
        match self {
            Self::RecordVitals { .. } => WriteKind::RecordVitals,
            Self::AddMedication(_) => WriteKind::AddMedication,
            Self::DiscontinueMedication { .. } => WriteKind::DiscontinueMedication,
            Self::ReconcileMedications { .. } => WriteKind::ReconcileMedications,
            Self::SubmitAssessment { .. } => WriteKind::SubmitAssessment,
            Self::DocumentIntervention { .. } => WriteKind::DocumentIntervention,
            Self::MarkGoalNotMet { .. } => WriteKind::MarkGoalNotMet,
            Self::AddWound { .. } => WriteKind::AddWound,
            Self::DocumentWoundAssessment { .. } => WriteKind::DocumentWoundAssessment,
            Self::CreateOrder { .. } => WriteKind::CreateOrder,
            Self::AddCoordinationNote { .. } => WriteKind::AddCoordinationNote,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteKind {
    RecordVitals,
    AddMedication,
    DiscontinueMedication,
    ReconcileMedications,
    SubmitAssessment,
    DocumentIntervention,
    MarkGoalNotMet,
    AddWound,
    DocumentWoundAssessment,
    CreateOrder,
    AddCoordinationNote,
}

impl WriteKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RecordVitals => "record_vitals",
            Self::AddMedication => "add_medication",
            Self::DiscontinueMedication => "discontinue_medication",
            Self::ReconcileMedications => "reconcile_medications",
            Self::SubmitAssessment => "submit_assessment",
            Self::DocumentIntervention => "document_intervention",
            Self::MarkGoalNotMet => "mark_goal_not_met",
            Self::AddWound => "add_wound",
            Self::DocumentWoundAssessment => "document_wound_assessment",
            Self::CreateOrder => "create_order",
            Self::AddCoordinationNote => "add_coordination_note",
        }
    }

    /// Medication writes, counted together in visit summaries.
    pub fn is_medication(self) -> bool {
        matches!(
            self,
            Self::AddMedication | Self::DiscontinueMedication | Self::ReconcileMedications
        )
    }
}

impl std::fmt::Display for WriteKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GoalProgress {
    pub goal_id: GoalId,
    pub transition: GoalTransition,
}

/// What a committed write produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum WriteOutcome {
    VitalsRecorded {
        reading: VitalsReading,
    },
    MedicationAdded {
        order: MedicationOrder,
    },
    MedicationDiscontinued {
        order: MedicationOrder,
    },
    MedicationsReconciled {
        verified: Vec<MedicationId>,
        /// Listed ids that are not active orders for this patient.
        unknown: Vec<MedicationId>,
        /// Active orders the nurse did not list.
        unreviewed: Vec<MedicationId>,
    },
    AssessmentSubmitted {
        record: AssessmentRecord,
    },
    InterventionDocumented {
        event: InterventionEvent,
        goal: Option<GoalProgress>,
    },
    GoalClosed {
        progress: GoalProgress,
    },
    WoundAdded {
        wound: WoundRecord,
    },
    WoundAssessed {
        wound_id: WoundId,
        assessment: WoundAssessment,
    },
    OrderCreated {
        order: Order,
    },
    NoteAdded {
        note: CoordinationNote,
    },
}

/// Result of applying one operation, before it is logged.
pub(super) struct Applied {
    pub entity_ref: String,
    pub warnings: Vec<ClinicalWarning>,
    pub outcome: WriteOutcome,
}

impl Applied {
    fn new(entity_ref: impl Into<String>, outcome: WriteOutcome) -> Self {
        Self {
            entity_ref: entity_ref.into(),
            warnings: Vec::new(),
            outcome,
        }
    }

    fn with_warnings(mut self, warnings: Vec<ClinicalWarning>) -> Self {
        self.warnings = warnings;
        self
    }
}

impl VisitSessionManager {
    /// Validates and commits one operation for `session`.
    ///
    /// Runs with the session lock held. Every check happens before the first store write, so
    /// a rejected operation leaves the record untouched.
    pub(super) fn apply(
        &self,
        session: &VisitSession,
        event_id: &TimestampUuid,
        operation: WriteOperation,
    ) -> ClinicalResult<Applied> {
        let now = event_id.timestamp();
        let today = session.visit_date;
        let patient_id = &session.patient_id;
        let store = self.store.as_ref();

        match operation {
            WriteOperation::RecordVitals { measurements } => {
                let reading = vitals_trend::record_and_analyze(
                    store,
                    &self.config,
                    patient_id,
                    measurements,
                    now,
                    Some(session.session_id.clone()),
                )?;
                let warnings = reading
                    .flags
                    .iter()
                    .cloned()
                    .map(ClinicalWarning::Vital)
                    .collect();
                let signs: Vec<&str> = reading.measurements.keys().map(|s| s.as_str()).collect();
                Ok(Applied::new(signs.join(","), WriteOutcome::VitalsRecorded { reading })
                    .with_warnings(warnings))
            }

            WriteOperation::AddMedication(proposal) => {
                let patient = store.get_patient(patient_id)?;
                let current = store.get_medications(patient_id)?;
                let decision = self
                    .medication_validator
                    .validate_addition(&patient, &current, &proposal, today)?;
                if let Some(rejection) = &decision.rejection {
                    tracing::warn!(
                        patient_id = %patient_id,
                        session_id = %session.session_id,
                        %rejection,
                        "medication rejected"
                    );
                }
                let warnings = decision.into_result()?;
                if proposal.override_allergy {
                    tracing::warn!(
                        patient_id = %patient_id,
                        session_id = %session.session_id,
                        clinician = %session.clinician.id,
                        drug = %proposal.drug,
                        "allergy override requested"
                    );
                }

                let med_id = MedicationId::new(next_sequential_id(
                    MEDICATION_ID_PREFIX,
                    current.iter().map(|m| m.med_id.as_str()),
                )?)?;
                let order = MedicationOrder {
                    med_id: med_id.clone(),
                    drug: NonEmptyText::new(
                        self.config.canonical_drug_name(proposal.drug.as_str()),
                    )?,
                    dose: proposal.dose,
                    route: proposal.route,
                    frequency: proposal.frequency,
                    times: proposal.times,
                    purpose: proposal.purpose,
                    prescriber: proposal.prescriber,
                    start_date: proposal.start_date.unwrap_or(today),
                    status: MedicationStatus::Active,
                    end_date: None,
                    discontinue_reason: None,
                    added_in_session: Some(session.session_id.clone()),
                    last_reconciled_in: None,
                };
                store.put_medication(patient_id, order.clone())?;
                Ok(Applied::new(med_id.as_str(), WriteOutcome::MedicationAdded { order })
                    .with_warnings(warnings))
            }

            WriteOperation::DiscontinueMedication {
                med_id,
                reason,
                effective_date,
            } => {
                let current = store.get_medications(patient_id)?;
                let mut order = self
                    .medication_validator
                    .validate_discontinuation(&current, &med_id)?
                    .clone();
                let end_date = effective_date.unwrap_or(today);
                if end_date < order.start_date {
                    return Err(ClinicalError::InvalidInput(format!(
                        "medication {} cannot end on {}, before it started on {}",
                        med_id, end_date, order.start_date
                    )));
                }
                order.status = MedicationStatus::Discontinued;
                order.end_date = Some(end_date);
                order.discontinue_reason = Some(reason);
                store.put_medication(patient_id, order.clone())?;
                Ok(Applied::new(
                    med_id.as_str(),
                    WriteOutcome::MedicationDiscontinued { order },
                ))
            }

            WriteOperation::ReconcileMedications { medication_ids } => {
                if medication_ids.is_empty() {
                    return Err(ClinicalError::InvalidInput(
                        "reconciliation needs at least one medication id".into(),
                    ));
                }
                let current = store.get_medications(patient_id)?;
                let mut verified = Vec::new();
                let mut unknown = Vec::new();
                let mut updated = Vec::new();
                for id in medication_ids {
                    match current.iter().find(|m| m.med_id == id && m.is_active()) {
                        Some(order) => {
                            if !verified.contains(&id) {
                                let mut order = order.clone();
                                order.last_reconciled_in = Some(session.session_id.clone());
                                updated.push(order);
                                verified.push(id);
                            }
                        }
                        None => unknown.push(id),
                    }
                }
                let unreviewed = current
                    .iter()
                    .filter(|m| m.is_active() && !verified.contains(&m.med_id))
                    .map(|m| m.med_id.clone())
                    .collect();
                for order in updated {
                    store.put_medication(patient_id, order)?;
                }
                let entity_ref = format!("{} medications", verified.len());
                Ok(Applied::new(
                    entity_ref,
                    WriteOutcome::MedicationsReconciled {
                        verified,
                        unknown,
                        unreviewed,
                    },
                ))
            }

            WriteOperation::SubmitAssessment {
                category,
                narrative,
                responses,
            } => {
                let narrative = crate::validation::optional_text(narrative);
                validate_responses(category, &responses, narrative.as_deref())?;
                let record = AssessmentRecord {
                    session_id: session.session_id.clone(),
                    category,
                    narrative,
                    responses,
                    recorded_at: now,
                };
                store.append_assessment(patient_id, record.clone())?;
                Ok(Applied::new(
                    category.as_str(),
                    WriteOutcome::AssessmentSubmitted { record },
                ))
            }

            WriteOperation::DocumentIntervention {
                intervention_id,
                provided,
                outcome_note,
                goal_met,
            } => {
                let care_plan = store.get_care_plan(patient_id)?;
                let intervention = care_plan.intervention(&intervention_id).ok_or_else(|| {
                    ClinicalError::not_found(EntityKind::Intervention, &intervention_id)
                })?;
                if goal_met && !provided {
                    return Err(ClinicalError::InvalidInput(
                        "an intervention that was not provided cannot meet a goal".into(),
                    ));
                }
                if goal_met && intervention.goal_id.is_none() {
                    return Err(ClinicalError::InvalidInput(format!(
                        "intervention {} is not linked to a goal",
                        intervention_id
                    )));
                }

                let event = InterventionEvent {
                    event_id: event_id.clone(),
                    session_id: session.session_id.clone(),
                    intervention_id: intervention_id.clone(),
                    provided,
                    outcome_note,
                    recorded_at: now,
                };

                let evaluated = match (&intervention.goal_id, provided) {
                    (Some(goal_id), true) => {
                        let goal = care_plan.goal(goal_id).cloned().ok_or_else(|| {
                            ClinicalError::not_found(EntityKind::CarePlanGoal, goal_id)
                        })?;
                        Some(goal_tracker::evaluate(goal, &event, goal_met)?)
                    }
                    _ => None,
                };

                store.append_intervention_event(patient_id, event.clone())?;
                let goal = match evaluated {
                    Some((goal, transition)) => {
                        let goal_id = goal.goal_id.clone();
                        store.put_goal_status(patient_id, goal)?;
                        Some(GoalProgress {
                            goal_id,
                            transition,
                        })
                    }
                    None => None,
                };

                Ok(Applied::new(
                    intervention_id.as_str(),
                    WriteOutcome::InterventionDocumented { event, goal },
                ))
            }

            WriteOperation::MarkGoalNotMet { goal_id, reason } => {
                let care_plan = store.get_care_plan(patient_id)?;
                let goal = care_plan
                    .goal(&goal_id)
                    .cloned()
                    .ok_or_else(|| ClinicalError::not_found(EntityKind::CarePlanGoal, &goal_id))?;
                let (goal, transition) = goal_tracker::mark_not_met(goal, reason, today)?;
                store.put_goal_status(patient_id, goal)?;
                Ok(Applied::new(
                    goal_id.as_str(),
                    WriteOutcome::GoalClosed {
                        progress: GoalProgress {
                            goal_id: goal_id.clone(),
                            transition,
                        },
                    },
                ))
            }

            WriteOperation::AddWound {
                wound_type,
                location,
                onset_date,
            } => {
                let existing = store.get_wound_records(patient_id)?;
                let wound_id = WoundId::new(next_sequential_id(
                    WOUND_ID_PREFIX,
                    existing.iter().map(|w| w.wound_id.as_str()),
                )?)?;
                let wound = WoundRecord {
                    wound_id: wound_id.clone(),
                    wound_type,
                    location,
                    onset_date: onset_date.unwrap_or(today),
                    status: WoundStatus::Active,
                    assessments: Vec::new(),
                };
                store.create_wound(patient_id, wound.clone())?;
                Ok(Applied::new(wound_id.as_str(), WriteOutcome::WoundAdded { wound }))
            }

            WriteOperation::DocumentWoundAssessment {
                wound_id,
                stage,
                dimensions,
                attributes,
                regression_flag,
            } => {
                let record = store.get_wound_record(patient_id, &wound_id)?;
                let staged = wound_stager::add_assessment(
                    &record,
                    WoundAssessmentInput {
                        stage,
                        dimensions,
                        attributes,
                        regression_flag,
                    },
                    now,
                    Some(session.session_id.clone()),
                )?;
                store.append_wound_assessment(patient_id, &wound_id, staged.assessment.clone())?;
                Ok(Applied::new(
                    wound_id.as_str(),
                    WriteOutcome::WoundAssessed {
                        wound_id: wound_id.clone(),
                        assessment: staged.assessment,
                    },
                )
                .with_warnings(staged.warning.into_iter().collect()))
            }

            WriteOperation::CreateOrder {
                order_type,
                physician_id,
                instructions,
                effective_date,
            } => {
                let order = Order {
                    order_id: UuidService::new().short_code(ORDER_ID_PREFIX),
                    session_id: session.session_id.clone(),
                    order_type,
                    physician_id,
                    instructions,
                    effective_date: effective_date.unwrap_or(today),
                    created_at: now,
                    status: OrderStatus::PendingSignature,
                };
                store.append_order(patient_id, order.clone())?;
                Ok(Applied::new(
                    order.order_id.clone(),
                    WriteOutcome::OrderCreated { order },
                ))
            }

            WriteOperation::AddCoordinationNote { note_type, content } => {
                let note = CoordinationNote {
                    note_id: UuidService::new().short_code(NOTE_ID_PREFIX),
                    session_id: Some(session.session_id.clone()),
                    note_type,
                    content,
                    created_at: now,
                };
                store.append_note(patient_id, note.clone())?;
                Ok(Applied::new(
                    note.note_id.clone(),
                    WriteOutcome::NoteAdded { note },
                ))
            }
        }
    }
}

/// Current time, never earlier than the session's last logged write.
pub(super) fn next_event_id(session: &VisitSession) -> TimestampUuid {
    TimestampUuid::generate(session.write_log.last().map(|entry| &entry.event_id))
}

pub(super) fn elapsed_minutes(start: DateTime<Utc>, end: DateTime<Utc>) -> i64 {
    (end - start).num_minutes().max(0)
}
