//! Read-only passthroughs and the demographics update.
//!
//! None of these touch a visit session; they read the record store directly.

use super::VisitSessionManager;
use crate::constants::{DEFAULT_NOTES_LIMIT, DEFAULT_SEARCH_LIMIT, DEFAULT_TREND_POINTS};
use crate::model::{
    AssessmentCategory, AssessmentQuestion, AssessmentRecord, Allergy, CarePlan, Clinician,
    CoordinationNote, Demographics, DemographicsUpdate, Disposition, EpisodeStatus,
    MedicationOrder, NoteType, Patient, PatientId, ServiceCode, SessionId, VitalSign, WoundRecord,
};
use crate::validation::{non_negative_measurement, phone_digits, result_limit};
use crate::vitals_trend::{self, VitalTrend};
use crate::{ClinicalError, ClinicalResult};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchField {
    #[default]
    All,
    Name,
    Id,
    Phone,
}

impl std::str::FromStr for SearchField {
    type Err = ClinicalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(Self::All),
            "name" => Ok(Self::Name),
            "id" => Ok(Self::Id),
            "phone" => Ok(Self::Phone),
            other => Err(ClinicalError::InvalidInput(format!(
                "unknown search field '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientQuery {
    pub query: String,
    #[serde(default)]
    pub field: SearchField,
    #[serde(default)]
    pub status: Option<EpisodeStatus>,
    #[serde(default)]
    pub limit: Option<usize>,
}

impl PatientQuery {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Self::default()
        }
    }

    fn matches(&self, patient: &Patient) -> bool {
        let wanted = self.query.trim();
        let demographics = &patient.demographics;

        let by_name = || {
            let wanted = wanted.to_lowercase();
            demographics.full_name().to_lowercase().contains(&wanted)
                || demographics
                    .preferred_name
                    .as_deref()
                    .is_some_and(|n| n.to_lowercase().contains(&wanted))
        };
        let by_id = || {
            patient
                .patient_id
                .as_str()
                .to_ascii_uppercase()
                .contains(&wanted.to_ascii_uppercase())
        };
        let by_phone = || {
            let digits = phone_digits(wanted);
            !digits.is_empty() && demographics.phones().any(|p| phone_digits(p).contains(&digits))
        };

        match self.field {
            SearchField::All => by_name() || by_id() || by_phone(),
            SearchField::Name => by_name(),
            SearchField::Id => by_id(),
            SearchField::Phone => by_phone(),
        }
    }
}

/// One search hit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatientSummary {
    pub patient_id: PatientId,
    pub name: String,
    pub preferred_name: Option<String>,
    pub dob: NaiveDate,
    pub age: u32,
    pub phone: Option<String>,
    pub status: EpisodeStatus,
    pub primary_diagnosis: Option<String>,
    pub active_session: Option<SessionId>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MedicationList {
    pub patient_id: PatientId,
    pub active: Vec<MedicationOrder>,
    pub discontinued: Vec<MedicationOrder>,
    pub allergies: Vec<Allergy>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteQuery {
    #[serde(default)]
    pub note_type: Option<NoteType>,
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VisitCalendarEntry {
    pub visit_id: String,
    pub date: NaiveDate,
    pub service_code: ServiceCode,
    pub clinician: Clinician,
    pub disposition: Disposition,
    pub duration_minutes: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VisitCalendar {
    pub patient_id: PatientId,
    pub completed_visits: usize,
    pub visits: Vec<VisitCalendarEntry>,
    /// Next visit date recorded on the most recent completed visit.
    pub next_scheduled: Option<NaiveDate>,
}

/// Question catalog for one category plus the patient's last answers to it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssessmentQuestions {
    pub category: AssessmentCategory,
    pub questions: &'static [AssessmentQuestion],
    pub previous: Option<AssessmentRecord>,
}

impl VisitSessionManager {
    pub fn search_patients(&self, query: &PatientQuery) -> ClinicalResult<Vec<PatientSummary>> {
        if query.query.trim().is_empty() {
            return Err(ClinicalError::InvalidInput("search query is empty".into()));
        }
        let limit = result_limit(query.limit, DEFAULT_SEARCH_LIMIT)?;
        let today = Utc::now().date_naive();

        let hits = self
            .store
            .list_patients()?
            .into_iter()
            .filter(|p| query.status.map_or(true, |s| p.status == s))
            .filter(|p| query.matches(p))
            .take(limit)
            .map(|p| {
                let d = &p.demographics;
                PatientSummary {
                    name: d.full_name(),
                    preferred_name: d.preferred_name.clone(),
                    dob: d.dob,
                    age: d.age_on(today),
                    phone: d.phones().next().map(str::to_string),
                    status: p.status,
                    primary_diagnosis: p.primary_diagnosis().map(|dx| dx.description.clone()),
                    active_session: self.active_session_for(&p.patient_id),
                    patient_id: p.patient_id,
                }
            })
            .collect::<Vec<_>>();

        tracing::debug!(query = %query.query, hits = hits.len(), "patient search");
        Ok(hits)
    }

    pub fn get_demographics(&self, patient_id: &PatientId) -> ClinicalResult<Demographics> {
        Ok(self.store.get_patient(patient_id)?.demographics)
    }

    /// Applies a partial contact update outside any visit session.
    pub fn update_demographics(
        &self,
        patient_id: &PatientId,
        update: DemographicsUpdate,
    ) -> ClinicalResult<Demographics> {
        if update.is_empty() {
            return Err(ClinicalError::InvalidInput(
                "demographics update has no fields".into(),
            ));
        }
        if let Some(weight) = update.weight_kg {
            non_negative_measurement("weight_kg", weight)?;
        }

        let demographics = self.store.update_demographics(patient_id, update)?;

        tracing::info!(patient_id = %patient_id, "demographics updated");
        Ok(demographics)
    }

    pub fn get_medications(&self, patient_id: &PatientId) -> ClinicalResult<MedicationList> {
        let patient = self.store.get_patient(patient_id)?;
        let (active, discontinued) = self
            .store
            .get_medications(patient_id)?
            .into_iter()
            .partition(MedicationOrder::is_active);
        Ok(MedicationList {
            patient_id: patient.patient_id,
            active,
            discontinued,
            allergies: patient.allergies,
        })
    }

    pub fn get_care_plan(&self, patient_id: &PatientId) -> ClinicalResult<CarePlan> {
        self.store.get_care_plan(patient_id)
    }

    pub fn get_wound_records(
        &self,
        patient_id: &PatientId,
        include_healed: bool,
    ) -> ClinicalResult<Vec<WoundRecord>> {
        let mut wounds = self.store.get_wound_records(patient_id)?;
        if !include_healed {
            wounds.retain(WoundRecord::is_active);
        }
        Ok(wounds)
    }

    /// Trend series for `signs`, or for every sign with history when `signs` is empty.
    pub fn get_vital_trends(
        &self,
        patient_id: &PatientId,
        signs: &[VitalSign],
        limit: Option<usize>,
    ) -> ClinicalResult<Vec<VitalTrend>> {
        let limit = result_limit(limit, DEFAULT_TREND_POINTS)?;
        let history = self.store.get_vitals_history(patient_id)?;

        let trends = if signs.is_empty() {
            VitalSign::ALL
                .into_iter()
                .map(|sign| vitals_trend::trend_for(&history, sign, limit))
                .filter(|trend| !trend.points.is_empty())
                .collect()
        } else {
            signs
                .iter()
                .map(|&sign| vitals_trend::trend_for(&history, sign, limit))
                .collect()
        };
        Ok(trends)
    }

    /// Notes newest first, optionally filtered by type.
    pub fn get_coordination_notes(
        &self,
        patient_id: &PatientId,
        query: NoteQuery,
    ) -> ClinicalResult<Vec<CoordinationNote>> {
        let limit = result_limit(query.limit, DEFAULT_NOTES_LIMIT)?;
        let mut notes = self.store.get_notes(patient_id)?;
        notes.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(notes
            .into_iter()
            .filter(|n| query.note_type.map_or(true, |t| n.note_type == t))
            .take(limit)
            .collect())
    }

    /// Completed visits, optionally limited to `from..=to`.
    pub fn get_visit_calendar(
        &self,
        patient_id: &PatientId,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> ClinicalResult<VisitCalendar> {
        if let (Some(from), Some(to)) = (from, to) {
            if from > to {
                return Err(ClinicalError::InvalidInput(format!(
                    "calendar range starts after it ends ({from} > {to})"
                )));
            }
        }

        let visits = self.store.get_visits(patient_id)?;
        let next_scheduled = visits.last().and_then(|v| v.next_visit_date);
        let entries: Vec<VisitCalendarEntry> = visits
            .iter()
            .filter(|v| from.map_or(true, |f| v.date >= f) && to.map_or(true, |t| v.date <= t))
            .map(|v| VisitCalendarEntry {
                visit_id: v.visit_id.clone(),
                date: v.date,
                service_code: v.service_code,
                clinician: v.clinician.clone(),
                disposition: v.disposition,
                duration_minutes: super::operations::elapsed_minutes(v.started_at, v.ended_at),
            })
            .collect();

        Ok(VisitCalendar {
            patient_id: patient_id.clone(),
            completed_visits: entries.len(),
            visits: entries,
            next_scheduled,
        })
    }

    pub fn get_assessment_questions(
        &self,
        patient_id: &PatientId,
        category: AssessmentCategory,
    ) -> ClinicalResult<AssessmentQuestions> {
        let previous = self
            .store
            .get_assessments(patient_id)?
            .into_iter()
            .filter(|a| a.category == category)
            .max_by_key(|a| a.recorded_at);
        Ok(AssessmentQuestions {
            category,
            questions: category.questions(),
            previous,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AssessmentResponse;
    use crate::session::WriteOperation;
    use crate::testing::{dorothy, margaret, nurse, robert, setup_manager};
    use ratchet_types::NonEmptyText;
    use std::collections::BTreeMap;

    fn search(manager: &VisitSessionManager, text: &str, field: SearchField) -> Vec<String> {
        let query = PatientQuery {
            field,
            ..PatientQuery::new(text)
        };
        manager
            .search_patients(&query)
            .unwrap()
            .into_iter()
            .map(|s| s.patient_id.to_string())
            .collect()
    }

    #[test]
    fn test_search_by_name_id_and_phone() {
        let (manager, _) = setup_manager();

        assert_eq!(search(&manager, "johnson", SearchField::Name), vec!["PT-10001"]);
        assert_eq!(search(&manager, "peggy", SearchField::All), vec!["PT-10001"]);
        assert_eq!(search(&manager, "pt-10003", SearchField::Id), vec!["PT-10003"]);
        assert_eq!(search(&manager, "555-0147", SearchField::Phone), vec!["PT-10003"]);
        assert_eq!(search(&manager, "9375550142", SearchField::Phone), vec!["PT-10002"]);
        assert!(search(&manager, "johnson", SearchField::Phone).is_empty());
    }

    #[test]
    fn test_search_status_filter_and_limit() {
        let (manager, _) = setup_manager();

        let discharged = PatientQuery {
            status: Some(EpisodeStatus::Discharged),
            ..PatientQuery::new("PT-")
        };
        let hits = manager.search_patients(&discharged).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "James Miller");

        let limited = PatientQuery {
            limit: Some(2),
            ..PatientQuery::new("PT-")
        };
        assert_eq!(manager.search_patients(&limited).unwrap().len(), 2);

        assert!(matches!(
            manager.search_patients(&PatientQuery::new("  ")),
            Err(ClinicalError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_search_reports_active_session() {
        let (manager, _) = setup_manager();
        let handle = manager.start_visit(&margaret(), ServiceCode::Sn11, &nurse(), None).unwrap();

        let hits = manager.search_patients(&PatientQuery::new("Margaret")).unwrap();
        assert_eq!(hits[0].active_session, Some(handle.session_id));
    }

    #[test]
    fn test_update_demographics_applies_only_named_fields() {
        let (manager, _) = setup_manager();
        let before = manager.get_demographics(&margaret()).unwrap();

        let updated = manager
            .update_demographics(
                &margaret(),
                DemographicsUpdate {
                    phone_cell: Some("(937) 555-0999".into()),
                    ..Default::default()
                },
            )
            .unwrap();

        assert_eq!(updated.phone_cell.as_deref(), Some("(937) 555-0999"));
        assert_eq!(updated.phone_home, before.phone_home);
        assert_eq!(manager.get_demographics(&margaret()).unwrap(), updated);

        assert!(matches!(
            manager.update_demographics(&margaret(), DemographicsUpdate::default()),
            Err(ClinicalError::InvalidInput(_))
        ));
        assert!(matches!(
            manager.update_demographics(
                &margaret(),
                DemographicsUpdate {
                    weight_kg: Some(-3.0),
                    ..Default::default()
                }
            ),
            Err(ClinicalError::InvalidMeasurement(_))
        ));
    }

    #[test]
    fn test_concurrent_demographics_updates_keep_every_field() {
        let (manager, _) = setup_manager();

        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    manager
                        .update_demographics(
                            &margaret(),
                            DemographicsUpdate {
                                phone_cell: Some("(937) 555-0111".into()),
                                ..Default::default()
                            },
                        )
                        .unwrap();
                });
                scope.spawn(|| {
                    manager
                        .update_demographics(
                            &margaret(),
                            DemographicsUpdate {
                                weight_kg: Some(61.5),
                                ..Default::default()
                            },
                        )
                        .unwrap();
                });
            }
        });

        let demographics = manager.get_demographics(&margaret()).unwrap();
        assert_eq!(demographics.phone_cell.as_deref(), Some("(937) 555-0111"));
        assert_eq!(demographics.weight_kg, Some(61.5));
    }

    #[test]
    fn test_medication_list_splits_by_status() {
        let (manager, _) = setup_manager();
        let list = manager.get_medications(&robert()).unwrap();

        assert_eq!(list.active.len(), 3);
        assert_eq!(list.discontinued.len(), 1);
        assert_eq!(list.discontinued[0].drug.as_str(), "Ibuprofen");
        assert_eq!(list.allergies[0].allergen.as_str(), "Latex");
    }

    #[test]
    fn test_vital_trends_for_all_recorded_signs() {
        let (manager, _) = setup_manager();

        let trends = manager.get_vital_trends(&dorothy(), &[], None).unwrap();
        let signs: Vec<VitalSign> = trends.iter().map(|t| t.sign).collect();
        assert_eq!(
            signs,
            vec![VitalSign::RespiratoryRate, VitalSign::OxygenSaturation]
        );

        let o2 = manager
            .get_vital_trends(&dorothy(), &[VitalSign::OxygenSaturation], Some(1))
            .unwrap();
        assert_eq!(o2[0].points.len(), 1);
        assert_eq!(o2[0].points[0].value, 94.0);
    }

    #[test]
    fn test_notes_newest_first_with_type_filter() {
        let (manager, _) = setup_manager();
        let handle = manager.start_visit(&margaret(), ServiceCode::Sn11, &nurse(), None).unwrap();
        manager
            .route_write(
                &handle.session_id,
                WriteOperation::AddCoordinationNote {
                    note_type: NoteType::Clinical,
                    content: NonEmptyText::new("Lungs clear bilaterally").unwrap(),
                },
            )
            .unwrap();

        let all = manager
            .get_coordination_notes(&margaret(), NoteQuery::default())
            .unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].note_type, NoteType::Clinical);

        let physician = manager
            .get_coordination_notes(
                &margaret(),
                NoteQuery {
                    note_type: Some(NoteType::PhysicianCommunication),
                    limit: None,
                },
            )
            .unwrap();
        assert_eq!(physician.len(), 1);
        assert_eq!(physician[0].note_id, "NOTE-3F9A1C2B");
    }

    #[test]
    fn test_visit_calendar_includes_completed_session() {
        let (manager, _) = setup_manager();
        let before = manager.get_visit_calendar(&margaret(), None, None).unwrap();
        assert_eq!(before.completed_visits, 1);
        assert_eq!(before.visits[0].duration_minutes, 55);
        assert_eq!(before.next_scheduled, NaiveDate::from_ymd_opt(2026, 10, 19));

        let handle = manager.start_visit(&margaret(), ServiceCode::Sn11, &nurse(), None).unwrap();
        let next = Utc::now().date_naive() + chrono::Duration::days(7);
        manager
            .complete_visit_with(&handle.session_id, Disposition::Complete, Some(next))
            .unwrap();

        let after = manager.get_visit_calendar(&margaret(), None, None).unwrap();
        assert_eq!(after.completed_visits, 2);
        assert_eq!(after.next_scheduled, Some(next));

        let october_12 = NaiveDate::from_ymd_opt(2026, 10, 12);
        let only_first = manager
            .get_visit_calendar(&margaret(), october_12, october_12)
            .unwrap();
        assert_eq!(only_first.visits[0].visit_id, "V-20261012-001");
        assert_eq!(only_first.visits[0].clinician, nurse());
    }

    #[test]
    fn test_backdated_visit_lands_on_its_date() {
        let (manager, _) = setup_manager();
        let october_14 = NaiveDate::from_ymd_opt(2026, 10, 14).unwrap();
        let handle = manager
            .start_visit(&margaret(), ServiceCode::Sn11, &nurse(), Some(october_14))
            .unwrap();
        assert_eq!(handle.visit_id, "V-20261014-002");
        manager.complete_visit(&handle.session_id).unwrap();

        let calendar = manager
            .get_visit_calendar(&margaret(), Some(october_14), Some(october_14))
            .unwrap();
        assert_eq!(calendar.completed_visits, 1);
        assert_eq!(calendar.visits[0].visit_id, "V-20261014-002");
    }

    #[test]
    fn test_assessment_questions_carry_previous_answers() {
        let (manager, _) = setup_manager();
        let fresh = manager
            .get_assessment_questions(&margaret(), AssessmentCategory::Cardiovascular)
            .unwrap();
        assert!(fresh.previous.is_none());
        assert_eq!(fresh.questions.len(), 5);

        let handle = manager.start_visit(&margaret(), ServiceCode::Sn11, &nurse(), None).unwrap();
        manager
            .route_write(
                &handle.session_id,
                WriteOperation::SubmitAssessment {
                    category: AssessmentCategory::Cardiovascular,
                    narrative: Some("Trace ankle edema".into()),
                    responses: BTreeMap::from([(
                        "cv1".to_string(),
                        AssessmentResponse::Text("S1S2 regular rate".into()),
                    )]),
                },
            )
            .unwrap();

        let answered = manager
            .get_assessment_questions(&margaret(), AssessmentCategory::Cardiovascular)
            .unwrap();
        let previous = answered.previous.unwrap();
        assert_eq!(previous.session_id, handle.session_id);
        assert_eq!(previous.narrative.as_deref(), Some("Trace ankle edema"));
    }

    #[test]
    fn test_unknown_patient_passthrough_is_not_found() {
        let (manager, _) = setup_manager();
        let unknown = PatientId::new("PT-00000").unwrap();
        assert!(matches!(
            manager.get_care_plan(&unknown),
            Err(ClinicalError::NotFound { .. })
        ));
        assert!(matches!(
            manager.get_vital_trends(&unknown, &[], None),
            Err(ClinicalError::NotFound { .. })
        ));
    }
}
