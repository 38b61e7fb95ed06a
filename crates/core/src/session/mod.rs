//! Visit session lifecycle.
//!
//! A [`VisitSessionManager`] owns the patient -> active session index and every session it
//! has opened. Sessions move `Pending -> Active -> Completed`; the pending step happens
//! inside `start_visit` while the index lock is held, so callers only ever observe `Active`
//! or `Completed`. Completed sessions are kept so late writes fail with `InvalidSession`
//! rather than `NotFound`.
//!
//! # Locking
//!
//! - `start_visit` takes the index mutex, then the session map write lock.
//! - `route_write` clones the session handle under the map read lock, releases it, then holds
//!   the session mutex for the whole validate-and-commit step.
//! - `complete_visit` takes the session mutex, then the index mutex.
//!
//! No path takes a session mutex before the index mutex is released by `start_visit`, so the
//! order is acyclic.

mod operations;
mod queries;

pub use operations::{GoalProgress, WriteKind, WriteOperation, WriteOutcome};
pub use queries::{
    AssessmentQuestions, MedicationList, NoteQuery, PatientQuery, PatientSummary, SearchField,
    VisitCalendar, VisitCalendarEntry,
};

use crate::config::ClinicalConfig;
use crate::constants::VISIT_ID_PREFIX;
use crate::medication_safety::MedicationSafetyValidator;
use crate::model::visit::{check_next_visit, check_visit_date};
use crate::model::{Clinician, Disposition, PatientId, ServiceCode, SessionId, VisitRecord};
use crate::store::RecordStore;
use crate::warnings::ClinicalWarning;
use crate::{ClinicalError, ClinicalResult};
use chrono::{DateTime, NaiveDate, Utc};
use ratchet_uuid::TimestampUuid;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Pending,
    Active,
    Completed,
}

/// One committed write, in commit order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WriteLogEntry {
    pub event_id: TimestampUuid,
    pub kind: WriteKind,
    /// Identifier of the record written, e.g. `MED-005` or `W-002`.
    pub entity_ref: String,
    pub recorded_at: DateTime<Utc>,
    pub warning_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct VisitSession {
    pub session_id: SessionId,
    pub visit_id: String,
    pub patient_id: PatientId,
    pub service_code: ServiceCode,
    pub clinician: Clinician,
    /// Date the visit is documented under. Defaults for order, wound and medication dates
    /// come from here.
    pub visit_date: NaiveDate,
    pub state: SessionState,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub write_log: Vec<WriteLogEntry>,
    pub warnings: Vec<ClinicalWarning>,
}

impl VisitSession {
    fn open(
        patient_id: PatientId,
        service_code: ServiceCode,
        clinician: Clinician,
        visit_date: NaiveDate,
        visit_id: String,
    ) -> Self {
        Self {
            session_id: SessionId::generate(),
            visit_id,
            patient_id,
            service_code,
            clinician,
            visit_date,
            state: SessionState::Pending,
            started_at: Utc::now(),
            ended_at: None,
            write_log: Vec::new(),
            warnings: Vec::new(),
        }
    }

    fn ensure_active(&self) -> ClinicalResult<()> {
        match self.state {
            SessionState::Active => Ok(()),
            SessionState::Completed => Err(ClinicalError::invalid_session(
                &self.session_id,
                "visit already completed",
            )),
            SessionState::Pending => Err(ClinicalError::invalid_session(
                &self.session_id,
                "visit not started",
            )),
        }
    }

    fn write_counts(&self) -> BTreeMap<WriteKind, usize> {
        let mut counts = BTreeMap::new();
        for entry in &self.write_log {
            *counts.entry(entry.kind).or_insert(0) += 1;
        }
        counts
    }
}

/// Returned by `start_visit`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VisitHandle {
    pub session_id: SessionId,
    pub visit_id: String,
    pub patient_id: PatientId,
    pub service_code: ServiceCode,
    pub service_description: &'static str,
    pub clinician: Clinician,
    pub visit_date: NaiveDate,
    pub started_at: DateTime<Utc>,
}

/// Returned by every successful `route_write`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WriteReceipt {
    pub entry: WriteLogEntry,
    pub warnings: Vec<ClinicalWarning>,
    pub outcome: WriteOutcome,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VisitSummary {
    pub session_id: SessionId,
    pub visit_id: String,
    pub patient_id: PatientId,
    pub service_code: ServiceCode,
    pub clinician: Clinician,
    pub visit_date: NaiveDate,
    pub state: SessionState,
    pub disposition: Disposition,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub duration_minutes: i64,
    pub write_counts: BTreeMap<WriteKind, usize>,
    pub total_writes: usize,
    pub warnings: Vec<ClinicalWarning>,
    pub write_log: Vec<WriteLogEntry>,
    pub next_visit_date: Option<NaiveDate>,
}

impl VisitSummary {
    pub fn writes_of(&self, kind: WriteKind) -> usize {
        self.write_counts.get(&kind).copied().unwrap_or(0)
    }

    pub fn medication_writes(&self) -> usize {
        self.write_counts
            .iter()
            .filter(|(kind, _)| kind.is_medication())
            .map(|(_, n)| n)
            .sum()
    }
}

pub struct VisitSessionManager {
    store: Arc<dyn RecordStore>,
    config: Arc<ClinicalConfig>,
    medication_validator: MedicationSafetyValidator,
    active_by_patient: Mutex<HashMap<PatientId, SessionId>>,
    sessions: RwLock<HashMap<SessionId, Arc<Mutex<VisitSession>>>>,
}

impl VisitSessionManager {
    pub fn new(store: Arc<dyn RecordStore>, config: Arc<ClinicalConfig>) -> Self {
        Self {
            medication_validator: MedicationSafetyValidator::new(Arc::clone(&config)),
            store,
            config,
            active_by_patient: Mutex::new(HashMap::new()),
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &ClinicalConfig {
        &self.config
    }

    /// Opens a visit for `patient_id` performed by `clinician`.
    ///
    /// `visit_date` defaults to today; a late-documented visit may name an earlier day.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the patient is unknown to the store.
    /// - `Conflict` if the patient already has an active session.
    /// - `InvalidInput` if `visit_date` is in the future.
    pub fn start_visit(
        &self,
        patient_id: &PatientId,
        service_code: ServiceCode,
        clinician: &Clinician,
        visit_date: Option<NaiveDate>,
    ) -> ClinicalResult<VisitHandle> {
        let today = Utc::now().date_naive();
        let visit_date = visit_date.unwrap_or(today);
        check_visit_date(visit_date, today)?;
        self.store.get_patient(patient_id)?;
        let prior_visits = self.store.get_visits(patient_id)?.len();
        let visit_id = format!(
            "{}-{}-{:03}",
            VISIT_ID_PREFIX,
            visit_date.format("%Y%m%d"),
            prior_visits + 1
        );

        let mut index = self
            .active_by_patient
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(active) = index.get(patient_id) {
            tracing::warn!(patient_id = %patient_id, active_session = %active, "visit already active");
            return Err(ClinicalError::Conflict {
                patient_id: patient_id.to_string(),
                active_session: active.to_string(),
            });
        }

        let mut session = VisitSession::open(
            patient_id.clone(),
            service_code,
            clinician.clone(),
            visit_date,
            visit_id,
        );
        session.state = SessionState::Active;
        let handle = VisitHandle {
            session_id: session.session_id.clone(),
            visit_id: session.visit_id.clone(),
            patient_id: patient_id.clone(),
            service_code,
            service_description: service_code.description(),
            clinician: clinician.clone(),
            visit_date,
            started_at: session.started_at,
        };

        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(handle.session_id.clone(), Arc::new(Mutex::new(session)));
        index.insert(patient_id.clone(), handle.session_id.clone());
        drop(index);

        tracing::info!(
            patient_id = %patient_id,
            session_id = %handle.session_id,
            visit_id = %handle.visit_id,
            service_code = %service_code,
            clinician = %clinician.id,
            "visit started"
        );
        Ok(handle)
    }

    fn session(&self, session_id: &SessionId) -> ClinicalResult<Arc<Mutex<VisitSession>>> {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(session_id)
            .cloned()
            .ok_or_else(|| ClinicalError::invalid_session(session_id, "unknown session"))
    }

    /// Validates and commits one clinical write against an active session.
    ///
    /// Writes to the same session are serialized. A failed write is not logged and leaves
    /// the patient record unchanged.
    pub fn route_write(
        &self,
        session_id: &SessionId,
        operation: WriteOperation,
    ) -> ClinicalResult<WriteReceipt> {
        let handle = self.session(session_id)?;
        let mut session = handle.lock().unwrap_or_else(PoisonError::into_inner);
        session.ensure_active()?;

        let kind = operation.kind();
        let event_id = operations::next_event_id(&session);
        let applied = match self.apply(&session, &event_id, operation) {
            Ok(applied) => applied,
            Err(err) => {
                tracing::warn!(
                    patient_id = %session.patient_id,
                    session_id = %session_id,
                    %kind,
                    error = %err,
                    "clinical write rejected"
                );
                return Err(err);
            }
        };

        for warning in &applied.warnings {
            tracing::warn!(session_id = %session_id, %kind, %warning, "clinical warning");
        }

        let entry = WriteLogEntry {
            recorded_at: event_id.timestamp(),
            event_id,
            kind,
            entity_ref: applied.entity_ref,
            warning_count: applied.warnings.len(),
        };
        session.write_log.push(entry.clone());
        session.warnings.extend(applied.warnings.iter().cloned());

        tracing::debug!(
            patient_id = %session.patient_id,
            session_id = %session_id,
            %kind,
            entity = %entry.entity_ref,
            "clinical write committed"
        );
        Ok(WriteReceipt {
            entry,
            warnings: applied.warnings,
            outcome: applied.outcome,
        })
    }

    /// Completes a visit with disposition `complete` and no next visit.
    pub fn complete_visit(&self, session_id: &SessionId) -> ClinicalResult<VisitSummary> {
        self.complete_visit_with(session_id, Disposition::Complete, None)
    }

    /// Seals the session, archives a visit record and releases the patient.
    ///
    /// # Errors
    ///
    /// - `InvalidSession` if the session is unknown or already completed.
    /// - `InvalidInput` if `next_visit_date` is in the past.
    pub fn complete_visit_with(
        &self,
        session_id: &SessionId,
        disposition: Disposition,
        next_visit_date: Option<NaiveDate>,
    ) -> ClinicalResult<VisitSummary> {
        let handle = self.session(session_id)?;
        let mut session = handle.lock().unwrap_or_else(PoisonError::into_inner);
        session.ensure_active()?;

        let ended_at = Utc::now().max(session.started_at);
        check_next_visit(next_visit_date, ended_at.date_naive())?;

        let write_counts = session.write_counts();
        let record = VisitRecord {
            visit_id: session.visit_id.clone(),
            session_id: session.session_id.clone(),
            service_code: session.service_code,
            clinician: session.clinician.clone(),
            date: session.visit_date,
            started_at: session.started_at,
            ended_at,
            disposition,
            write_counts: write_counts
                .iter()
                .map(|(kind, n)| (kind.as_str().to_string(), *n))
                .collect(),
            warning_count: session.warnings.len(),
            next_visit_date,
        };
        self.store.append_visit(&session.patient_id, record)?;

        session.state = SessionState::Completed;
        session.ended_at = Some(ended_at);

        {
            let mut index = self
                .active_by_patient
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if index.get(&session.patient_id) == Some(session_id) {
                index.remove(&session.patient_id);
            }
        }

        let summary = VisitSummary {
            session_id: session.session_id.clone(),
            visit_id: session.visit_id.clone(),
            patient_id: session.patient_id.clone(),
            service_code: session.service_code,
            clinician: session.clinician.clone(),
            visit_date: session.visit_date,
            state: session.state,
            disposition,
            started_at: session.started_at,
            ended_at,
            duration_minutes: operations::elapsed_minutes(session.started_at, ended_at),
            total_writes: session.write_log.len(),
            write_counts,
            warnings: session.warnings.clone(),
            write_log: session.write_log.clone(),
            next_visit_date,
        };

        tracing::info!(
            patient_id = %summary.patient_id,
            session_id = %session_id,
            writes = summary.total_writes,
            warnings = summary.warnings.len(),
            "visit completed"
        );
        Ok(summary)
    }

    /// Snapshot of a session, active or completed.
    pub fn session_snapshot(&self, session_id: &SessionId) -> ClinicalResult<VisitSession> {
        let handle = self.session(session_id)?;
        let session = handle.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(session.clone())
    }

    pub fn active_session_for(&self, patient_id: &PatientId) -> Option<SessionId> {
        self.active_by_patient
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(patient_id)
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::medication_safety::MedicationProposal;
    use crate::model::{
        Dose, DoseUnit, GoalId, GoalStatus, InterventionId, Measurement, Route, VitalSign,
        VitalUnit, WoundDimensions, WoundId,
    };
    use crate::testing::{margaret, nurse, robert, setup_manager};
    use ratchet_types::NonEmptyText;

    fn add_medication(drug: &str, mg: f64) -> WriteOperation {
        WriteOperation::AddMedication(MedicationProposal {
            drug: NonEmptyText::new(drug).unwrap(),
            dose: Some(Dose::new(mg, DoseUnit::Mg)),
            route: Route::Po,
            frequency: Some("daily".into()),
            times: Vec::new(),
            purpose: None,
            prescriber: None,
            start_date: None,
            override_allergy: false,
        })
    }

    fn note(text: &str) -> WriteOperation {
        WriteOperation::AddCoordinationNote {
            note_type: crate::model::NoteType::Clinical,
            content: NonEmptyText::new(text).unwrap(),
        }
    }

    fn intervention(id: &str, goal_met: bool) -> WriteOperation {
        WriteOperation::DocumentIntervention {
            intervention_id: InterventionId::new(id).unwrap(),
            provided: true,
            outcome_note: None,
            goal_met,
        }
    }

    fn wound_assessment(wound: &str, stage: u8, regression_flag: bool) -> WriteOperation {
        WriteOperation::DocumentWoundAssessment {
            wound_id: WoundId::new(wound).unwrap(),
            stage,
            dimensions: WoundDimensions {
                length_cm: 2.0,
                width_cm: 1.0,
                depth_cm: 0.1,
            },
            attributes: Default::default(),
            regression_flag,
        }
    }

    #[test]
    fn test_end_to_end_warfarin_aspirin_visit() {
        let (manager, store) = setup_manager();
        let handle = manager.start_visit(&margaret(), ServiceCode::Sn00, &nurse(), None).unwrap();

        let warfarin = manager
            .route_write(&handle.session_id, add_medication("Warfarin", 5.0))
            .unwrap();
        assert!(warfarin.warnings.is_empty(), "{:?}", warfarin.warnings);

        let aspirin = manager
            .route_write(&handle.session_id, add_medication("Aspirin", 81.0))
            .unwrap();
        assert!(matches!(
            aspirin.warnings.as_slice(),
            [ClinicalWarning::ModerateInteraction { .. }]
        ));

        let summary = manager.complete_visit(&handle.session_id).unwrap();
        assert_eq!(summary.state, SessionState::Completed);
        assert_eq!(summary.writes_of(WriteKind::AddMedication), 2);
        assert_eq!(summary.medication_writes(), 2);
        assert_eq!(summary.warnings.len(), 1);
        assert!(summary.ended_at >= summary.started_at);

        let notes_before = store.get_notes(&margaret()).unwrap().len();
        let err = manager
            .route_write(&handle.session_id, note("late entry"))
            .unwrap_err();
        assert!(matches!(err, ClinicalError::InvalidSession { .. }));
        assert_eq!(store.get_notes(&margaret()).unwrap().len(), notes_before);
        assert_eq!(
            manager.session_snapshot(&handle.session_id).unwrap().write_log.len(),
            2
        );

        let visits = store.get_visits(&margaret()).unwrap();
        let archived = visits.last().unwrap();
        assert_eq!(archived.session_id, handle.session_id);
        assert_eq!(archived.write_counts.get("add_medication"), Some(&2));
        assert_eq!(archived.warning_count, 1);
    }

    #[test]
    fn test_concurrent_starts_yield_one_session() {
        let (manager, _) = setup_manager();
        let patient = margaret();

        let results: Vec<_> = std::thread::scope(|scope| {
            let workers: Vec<_> = (0..16)
                .map(|_| {
                    scope.spawn(|| manager.start_visit(&patient, ServiceCode::Sn11, &nurse(), None))
                })
                .collect();
            workers
                .into_iter()
                .map(|w| w.join().unwrap())
                .collect()
        });

        let successes: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
        assert_eq!(successes.len(), 1);
        assert!(results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| matches!(e, ClinicalError::Conflict { .. })));
        assert_eq!(
            manager.active_session_for(&patient),
            Some(successes[0].session_id.clone())
        );
    }

    #[test]
    fn test_patient_can_start_again_after_completion() {
        let (manager, _) = setup_manager();
        let first = manager.start_visit(&margaret(), ServiceCode::Sn11, &nurse(), None).unwrap();
        assert!(matches!(
            manager.start_visit(&margaret(), ServiceCode::Sn11, &nurse(), None),
            Err(ClinicalError::Conflict { .. })
        ));

        manager.complete_visit(&first.session_id).unwrap();
        let second = manager.start_visit(&margaret(), ServiceCode::Sn11, &nurse(), None).unwrap();
        assert_ne!(first.session_id, second.session_id);
        assert_ne!(first.visit_id, second.visit_id);
    }

    #[test]
    fn test_unknown_patient_is_not_found() {
        let (manager, _) = setup_manager();
        let err = manager
            .start_visit(&PatientId::new("PT-99999").unwrap(), ServiceCode::Sn11, &nurse(), None)
            .unwrap_err();
        assert!(matches!(err, ClinicalError::NotFound { .. }));
    }

    #[test]
    fn test_unknown_session_is_invalid_and_mutates_nothing() {
        let (manager, store) = setup_manager();
        let before = store.get_notes(&margaret()).unwrap().len();

        let err = manager
            .route_write(&SessionId::generate(), note("orphan"))
            .unwrap_err();

        assert!(matches!(err, ClinicalError::InvalidSession { .. }));
        assert_eq!(store.get_notes(&margaret()).unwrap().len(), before);
    }

    #[test]
    fn test_double_completion_is_invalid_session() {
        let (manager, _) = setup_manager();
        let handle = manager.start_visit(&robert(), ServiceCode::Sn11, &nurse(), None).unwrap();
        manager.complete_visit(&handle.session_id).unwrap();

        assert!(matches!(
            manager.complete_visit(&handle.session_id),
            Err(ClinicalError::InvalidSession { .. })
        ));
    }

    #[test]
    fn test_rejected_medication_not_logged_or_stored() {
        let (manager, store) = setup_manager();
        let handle = manager.start_visit(&margaret(), ServiceCode::Sn11, &nurse(), None).unwrap();
        let before = store.get_medications(&margaret()).unwrap();

        let err = manager
            .route_write(&handle.session_id, add_medication("Amoxicillin", 500.0))
            .unwrap_err();

        assert!(matches!(err, ClinicalError::UnsafeMedication(_)));
        assert_eq!(store.get_medications(&margaret()).unwrap(), before);
        assert!(manager
            .session_snapshot(&handle.session_id)
            .unwrap()
            .write_log
            .is_empty());
    }

    #[test]
    fn test_write_log_is_ordered() {
        let (manager, _) = setup_manager();
        let handle = manager.start_visit(&margaret(), ServiceCode::Sn11, &nurse(), None).unwrap();
        for i in 0..5 {
            manager
                .route_write(&handle.session_id, note(&format!("note {i}")))
                .unwrap();
        }

        let log = manager.session_snapshot(&handle.session_id).unwrap().write_log;
        assert_eq!(log.len(), 5);
        assert!(log.windows(2).all(|w| w[0].event_id < w[1].event_id));
    }

    #[test]
    fn test_concurrent_writes_to_one_session_are_all_logged() {
        let (manager, store) = setup_manager();
        let handle = manager.start_visit(&margaret(), ServiceCode::Sn11, &nurse(), None).unwrap();
        let before = store.get_notes(&margaret()).unwrap().len();

        std::thread::scope(|scope| {
            for i in 0..8 {
                let manager = &manager;
                let session_id = handle.session_id.clone();
                scope.spawn(move || {
                    manager
                        .route_write(&session_id, note(&format!("parallel {i}")))
                        .unwrap();
                });
            }
        });

        let log = manager.session_snapshot(&handle.session_id).unwrap().write_log;
        assert_eq!(log.len(), 8);
        assert!(log.windows(2).all(|w| w[0].event_id < w[1].event_id));
        assert_eq!(store.get_notes(&margaret()).unwrap().len(), before + 8);
    }

    #[test]
    fn test_intervention_advances_goal() {
        let (manager, store) = setup_manager();
        let handle = manager.start_visit(&margaret(), ServiceCode::Sn11, &nurse(), None).unwrap();

        let receipt = manager
            .route_write(&handle.session_id, intervention("I-001", false))
            .unwrap();
        match receipt.outcome {
            WriteOutcome::InterventionDocumented {
                goal: Some(progress),
                ..
            } => {
                assert_eq!(progress.transition.from, GoalStatus::NotStarted);
                assert_eq!(progress.transition.to, GoalStatus::InProgress);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }

        manager
            .route_write(&handle.session_id, intervention("I-001", true))
            .unwrap();
        let plan = store.get_care_plan(&margaret()).unwrap();
        let goal = plan.goal(&GoalId::new("G-001").unwrap()).unwrap();
        assert_eq!(goal.status, GoalStatus::Met);
        assert_eq!(goal.supporting_interventions.len(), 2);

        let err = manager
            .route_write(&handle.session_id, intervention("I-001", false))
            .unwrap_err();
        assert!(matches!(err, ClinicalError::GoalClosed { .. }));
        assert_eq!(store.get_intervention_events(&margaret()).unwrap().len(), 2);
    }

    #[test]
    fn test_goal_met_requires_linked_goal() {
        let (manager, _) = setup_manager();
        let handle = manager.start_visit(&margaret(), ServiceCode::Sn11, &nurse(), None).unwrap();

        let err = manager
            .route_write(&handle.session_id, intervention("I-004", true))
            .unwrap_err();
        assert!(matches!(err, ClinicalError::InvalidInput(_)));

        let receipt = manager
            .route_write(&handle.session_id, intervention("I-004", false))
            .unwrap();
        assert!(matches!(
            receipt.outcome,
            WriteOutcome::InterventionDocumented { goal: None, .. }
        ));
    }

    #[test]
    fn test_wound_stage_regression_through_session() {
        let (manager, store) = setup_manager();
        let handle = manager.start_visit(&robert(), ServiceCode::Sn11, &nurse(), None).unwrap();

        let added = manager
            .route_write(
                &handle.session_id,
                WriteOperation::AddWound {
                    wound_type: crate::model::WoundType::PressureUlcer,
                    location: NonEmptyText::new("Sacrum").unwrap(),
                    onset_date: None,
                },
            )
            .unwrap();
        assert_eq!(added.entry.entity_ref, "W-002");

        for stage in [1, 2, 2] {
            manager
                .route_write(&handle.session_id, wound_assessment("W-002", stage, false))
                .unwrap();
        }
        let err = manager
            .route_write(&handle.session_id, wound_assessment("W-002", 1, false))
            .unwrap_err();
        assert!(matches!(err, ClinicalError::StageRegression { .. }));

        manager
            .route_write(&handle.session_id, wound_assessment("W-002", 1, true))
            .unwrap();
        let wound = store
            .get_wound_record(&robert(), &WoundId::new("W-002").unwrap())
            .unwrap();
        let stages: Vec<u8> = wound.assessments.iter().map(|a| a.stage).collect();
        assert_eq!(stages, vec![1, 2, 2, 1]);
    }

    #[test]
    fn test_vitals_flags_become_warnings() {
        let (manager, _) = setup_manager();
        let handle = manager.start_visit(&margaret(), ServiceCode::Sn11, &nurse(), None).unwrap();

        let receipt = manager
            .route_write(
                &handle.session_id,
                WriteOperation::RecordVitals {
                    measurements: BTreeMap::from([(
                        VitalSign::OxygenSaturation,
                        Measurement::new(88.0, VitalUnit::Percent),
                    )]),
                },
            )
            .unwrap();

        assert!(receipt
            .warnings
            .iter()
            .any(|w| matches!(w, ClinicalWarning::Vital(_))));
        let summary = manager.complete_visit(&handle.session_id).unwrap();
        assert_eq!(summary.warnings.len(), receipt.warnings.len());
    }

    #[test]
    fn test_discontinue_then_reconcile() {
        let (manager, store) = setup_manager();
        let handle = manager.start_visit(&margaret(), ServiceCode::Sn11, &nurse(), None).unwrap();
        let med = |id: &str| crate::model::MedicationId::new(id).unwrap();

        manager
            .route_write(
                &handle.session_id,
                WriteOperation::DiscontinueMedication {
                    med_id: med("MED-004"),
                    reason: NonEmptyText::new("Myalgia").unwrap(),
                    effective_date: None,
                },
            )
            .unwrap();

        let receipt = manager
            .route_write(
                &handle.session_id,
                WriteOperation::ReconcileMedications {
                    medication_ids: vec![med("MED-001"), med("MED-002"), med("MED-004")],
                },
            )
            .unwrap();
        match receipt.outcome {
            WriteOutcome::MedicationsReconciled {
                verified,
                unknown,
                unreviewed,
            } => {
                assert_eq!(verified, vec![med("MED-001"), med("MED-002")]);
                assert_eq!(unknown, vec![med("MED-004")]);
                assert_eq!(unreviewed, vec![med("MED-003")]);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }

        let meds = store.get_medications(&margaret()).unwrap();
        assert_eq!(
            meds[0].last_reconciled_in.as_ref(),
            Some(&handle.session_id)
        );
        let summary = manager.complete_visit(&handle.session_id).unwrap();
        assert_eq!(summary.medication_writes(), 2);
    }

    #[test]
    fn test_past_next_visit_date_keeps_session_active() {
        let (manager, _) = setup_manager();
        let handle = manager.start_visit(&margaret(), ServiceCode::Sn11, &nurse(), None).unwrap();
        let yesterday = Utc::now().date_naive().pred_opt().unwrap();

        let err = manager
            .complete_visit_with(&handle.session_id, Disposition::Incomplete, Some(yesterday))
            .unwrap_err();
        assert!(matches!(err, ClinicalError::InvalidInput(_)));
        assert_eq!(
            manager.session_snapshot(&handle.session_id).unwrap().state,
            SessionState::Active
        );
    }

    #[test]
    fn test_clinician_and_visit_date_stamped_on_record() {
        let (manager, store) = setup_manager();
        let october_18 = NaiveDate::from_ymd_opt(2026, 10, 18).unwrap();
        let handle = manager
            .start_visit(&robert(), ServiceCode::Sn11, &nurse(), Some(october_18))
            .unwrap();
        assert_eq!(handle.clinician, nurse());
        assert_eq!(handle.visit_date, october_18);
        assert!(handle.visit_id.starts_with("V-20261018-"));

        let summary = manager.complete_visit(&handle.session_id).unwrap();
        assert_eq!(summary.clinician, nurse());
        assert_eq!(summary.visit_date, october_18);

        let archived = store.get_visits(&robert()).unwrap().pop().unwrap();
        assert_eq!(archived.clinician, nurse());
        assert_eq!(archived.date, october_18);
    }

    #[test]
    fn test_future_visit_date_rejected_without_opening_session() {
        let (manager, _) = setup_manager();
        let tomorrow = Utc::now().date_naive().succ_opt().unwrap();

        let err = manager
            .start_visit(&margaret(), ServiceCode::Sn11, &nurse(), Some(tomorrow))
            .unwrap_err();

        assert!(matches!(err, ClinicalError::InvalidInput(_)));
        assert!(manager.active_session_for(&margaret()).is_none());
    }

    #[test]
    fn test_allergy_override_commits_with_warning() {
        let (manager, store) = setup_manager();
        let handle = manager.start_visit(&margaret(), ServiceCode::Sn11, &nurse(), None).unwrap();
        let mut amoxicillin = add_medication("Amoxicillin", 500.0);
        if let WriteOperation::AddMedication(proposal) = &mut amoxicillin {
            proposal.override_allergy = true;
        }

        let receipt = manager.route_write(&handle.session_id, amoxicillin).unwrap();
        assert!(matches!(
            receipt.warnings.as_slice(),
            [ClinicalWarning::AllergyOverridden { .. }]
        ));
        assert!(store
            .get_medications(&margaret())
            .unwrap()
            .iter()
            .any(|m| m.drug.as_str() == "Amoxicillin"));

        let summary = manager.complete_visit(&handle.session_id).unwrap();
        assert!(summary
            .warnings
            .iter()
            .any(|w| matches!(w, ClinicalWarning::AllergyOverridden { .. })));
    }

    #[test]
    fn test_discontinue_uses_effective_date() {
        let (manager, store) = setup_manager();
        let handle = manager.start_visit(&margaret(), ServiceCode::Sn11, &nurse(), None).unwrap();
        let discontinue = |date: NaiveDate| WriteOperation::DiscontinueMedication {
            med_id: crate::model::MedicationId::new("MED-004").unwrap(),
            reason: NonEmptyText::new("Myalgia").unwrap(),
            effective_date: Some(date),
        };

        let before_start = NaiveDate::from_ymd_opt(2026, 8, 1).unwrap();
        let err = manager
            .route_write(&handle.session_id, discontinue(before_start))
            .unwrap_err();
        assert!(matches!(err, ClinicalError::InvalidInput(_)));
        assert!(store.get_medications(&margaret()).unwrap()[3].is_active());

        let october_1 = NaiveDate::from_ymd_opt(2026, 10, 1).unwrap();
        manager
            .route_write(&handle.session_id, discontinue(october_1))
            .unwrap();
        let stopped = &store.get_medications(&margaret()).unwrap()[3];
        assert!(!stopped.is_active());
        assert_eq!(stopped.end_date, Some(october_1));
    }
}
