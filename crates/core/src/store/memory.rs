//! In-process record store seeded from a YAML dataset.

use super::RecordStore;
use crate::config::parse_yaml;
use crate::error::EntityKind;
use crate::model::{
    AssessmentRecord, CarePlan, CarePlanGoal, CoordinationNote, Demographics, DemographicsUpdate,
    InterventionEvent,
    MedicationOrder, Order, Patient, PatientId, VisitRecord, VitalsReading, WoundAssessment,
    WoundId, WoundRecord,
};
use crate::{ClinicalError, ClinicalResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{PoisonError, RwLock};

/// Everything held for one patient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientChart {
    #[serde(flatten)]
    pub patient: Patient,
    #[serde(default)]
    pub medications: Vec<MedicationOrder>,
    #[serde(default)]
    pub care_plan: CarePlan,
    #[serde(default)]
    pub intervention_events: Vec<InterventionEvent>,
    #[serde(default)]
    pub wounds: Vec<WoundRecord>,
    #[serde(default)]
    pub vitals: Vec<VitalsReading>,
    #[serde(default)]
    pub assessments: Vec<AssessmentRecord>,
    #[serde(default)]
    pub orders: Vec<Order>,
    #[serde(default)]
    pub notes: Vec<CoordinationNote>,
    #[serde(default)]
    pub visits: Vec<VisitRecord>,
}

impl PatientChart {
    pub fn new(patient: Patient) -> Self {
        Self {
            patient,
            medications: Vec::new(),
            care_plan: CarePlan::default(),
            intervention_events: Vec::new(),
            wounds: Vec::new(),
            vitals: Vec::new(),
            assessments: Vec::new(),
            orders: Vec::new(),
            notes: Vec::new(),
            visits: Vec::new(),
        }
    }

    fn wound_mut(&mut self, wound_id: &WoundId) -> ClinicalResult<&mut WoundRecord> {
        self.wounds
            .iter_mut()
            .find(|w| &w.wound_id == wound_id)
            .ok_or_else(|| ClinicalError::not_found(EntityKind::Wound, wound_id))
    }
}

#[derive(Debug, Deserialize)]
struct Dataset {
    patients: Vec<PatientChart>,
}

#[derive(Debug, Default)]
pub struct InMemoryRecordStore {
    charts: RwLock<BTreeMap<PatientId, PatientChart>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a store from charts, rejecting duplicate patient identifiers.
    pub fn from_charts(charts: impl IntoIterator<Item = PatientChart>) -> ClinicalResult<Self> {
        let mut map = BTreeMap::new();
        for chart in charts {
            let id = chart.patient.patient_id.clone();
            if map.insert(id.clone(), chart).is_some() {
                return Err(ClinicalError::InvalidDataset(format!(
                    "patient {} appears more than once",
                    id
                )));
            }
        }
        Ok(Self {
            charts: RwLock::new(map),
        })
    }

    /// Parses a dataset of the form `patients: [ ... ]`.
    pub fn from_yaml_str(yaml_text: &str) -> ClinicalResult<Self> {
        let dataset: Dataset =
            parse_yaml(yaml_text, "dataset").map_err(ClinicalError::InvalidDataset)?;
        Self::from_charts(dataset.patients)
    }

    pub fn load(path: &Path) -> ClinicalResult<Self> {
        let text = std::fs::read_to_string(path).map_err(ClinicalError::FileRead)?;
        let store = Self::from_yaml_str(&text)?;
        tracing::info!(path = %path.display(), patients = store.len(), "loaded patient dataset");
        Ok(store)
    }

    pub fn len(&self) -> usize {
        self.charts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn insert_chart(&self, chart: PatientChart) {
        self.charts
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(chart.patient.patient_id.clone(), chart);
    }

    fn read<T>(
        &self,
        patient_id: &PatientId,
        f: impl FnOnce(&PatientChart) -> ClinicalResult<T>,
    ) -> ClinicalResult<T> {
        let charts = self.charts.read().unwrap_or_else(PoisonError::into_inner);
        let chart = charts
            .get(patient_id)
            .ok_or_else(|| ClinicalError::not_found(EntityKind::Patient, patient_id))?;
        f(chart)
    }

    fn write<T>(
        &self,
        patient_id: &PatientId,
        f: impl FnOnce(&mut PatientChart) -> ClinicalResult<T>,
    ) -> ClinicalResult<T> {
        let mut charts = self.charts.write().unwrap_or_else(PoisonError::into_inner);
        let chart = charts
            .get_mut(patient_id)
            .ok_or_else(|| ClinicalError::not_found(EntityKind::Patient, patient_id))?;
        f(chart)
    }
}

impl RecordStore for InMemoryRecordStore {
    fn get_patient(&self, patient_id: &PatientId) -> ClinicalResult<Patient> {
        self.read(patient_id, |c| Ok(c.patient.clone()))
    }

    fn list_patients(&self) -> ClinicalResult<Vec<Patient>> {
        let charts = self.charts.read().unwrap_or_else(PoisonError::into_inner);
        Ok(charts.values().map(|c| c.patient.clone()).collect())
    }

    fn update_demographics(
        &self,
        patient_id: &PatientId,
        update: DemographicsUpdate,
    ) -> ClinicalResult<Demographics> {
        self.write(patient_id, |c| {
            update.apply_to(&mut c.patient.demographics);
            Ok(c.patient.demographics.clone())
        })
    }

    fn get_medications(&self, patient_id: &PatientId) -> ClinicalResult<Vec<MedicationOrder>> {
        self.read(patient_id, |c| Ok(c.medications.clone()))
    }

    fn put_medication(&self, patient_id: &PatientId, order: MedicationOrder) -> ClinicalResult<()> {
        self.write(patient_id, |c| {
            match c.medications.iter_mut().find(|m| m.med_id == order.med_id) {
                Some(existing) => *existing = order,
                None => c.medications.push(order),
            }
            Ok(())
        })
    }

    fn get_care_plan(&self, patient_id: &PatientId) -> ClinicalResult<CarePlan> {
        self.read(patient_id, |c| Ok(c.care_plan.clone()))
    }

    fn put_goal_status(&self, patient_id: &PatientId, goal: CarePlanGoal) -> ClinicalResult<()> {
        self.write(patient_id, |c| {
            let slot = c
                .care_plan
                .goals
                .iter_mut()
                .find(|g| g.goal_id == goal.goal_id)
                .ok_or_else(|| ClinicalError::not_found(EntityKind::CarePlanGoal, &goal.goal_id))?;
            *slot = goal;
            Ok(())
        })
    }

    fn append_intervention_event(
        &self,
        patient_id: &PatientId,
        event: InterventionEvent,
    ) -> ClinicalResult<()> {
        self.write(patient_id, |c| {
            c.intervention_events.push(event);
            Ok(())
        })
    }

    fn get_intervention_events(
        &self,
        patient_id: &PatientId,
    ) -> ClinicalResult<Vec<InterventionEvent>> {
        self.read(patient_id, |c| Ok(c.intervention_events.clone()))
    }

    fn get_wound_records(&self, patient_id: &PatientId) -> ClinicalResult<Vec<WoundRecord>> {
        self.read(patient_id, |c| Ok(c.wounds.clone()))
    }

    fn get_wound_record(
        &self,
        patient_id: &PatientId,
        wound_id: &WoundId,
    ) -> ClinicalResult<WoundRecord> {
        self.read(patient_id, |c| {
            c.wounds
                .iter()
                .find(|w| &w.wound_id == wound_id)
                .cloned()
                .ok_or_else(|| ClinicalError::not_found(EntityKind::Wound, wound_id))
        })
    }

    fn create_wound(&self, patient_id: &PatientId, record: WoundRecord) -> ClinicalResult<()> {
        self.write(patient_id, |c| {
            if c.wounds.iter().any(|w| w.wound_id == record.wound_id) {
                return Err(ClinicalError::InvalidInput(format!(
                    "wound {} already exists",
                    record.wound_id
                )));
            }
            c.wounds.push(record);
            Ok(())
        })
    }

    fn append_wound_assessment(
        &self,
        patient_id: &PatientId,
        wound_id: &WoundId,
        assessment: WoundAssessment,
    ) -> ClinicalResult<()> {
        self.write(patient_id, |c| {
            c.wound_mut(wound_id)?.assessments.push(assessment);
            Ok(())
        })
    }

    fn append_vitals(&self, patient_id: &PatientId, reading: VitalsReading) -> ClinicalResult<()> {
        self.write(patient_id, |c| {
            c.vitals.push(reading);
            Ok(())
        })
    }

    fn get_vitals_history(&self, patient_id: &PatientId) -> ClinicalResult<Vec<VitalsReading>> {
        self.read(patient_id, |c| Ok(c.vitals.clone()))
    }

    fn append_assessment(
        &self,
        patient_id: &PatientId,
        record: AssessmentRecord,
    ) -> ClinicalResult<()> {
        self.write(patient_id, |c| {
            c.assessments.push(record);
            Ok(())
        })
    }

    fn get_assessments(&self, patient_id: &PatientId) -> ClinicalResult<Vec<AssessmentRecord>> {
        self.read(patient_id, |c| Ok(c.assessments.clone()))
    }

    fn append_order(&self, patient_id: &PatientId, order: Order) -> ClinicalResult<()> {
        self.write(patient_id, |c| {
            c.orders.push(order);
            Ok(())
        })
    }

    fn get_orders(&self, patient_id: &PatientId) -> ClinicalResult<Vec<Order>> {
        self.read(patient_id, |c| Ok(c.orders.clone()))
    }

    fn append_note(&self, patient_id: &PatientId, note: CoordinationNote) -> ClinicalResult<()> {
        self.write(patient_id, |c| {
            c.notes.push(note);
            Ok(())
        })
    }

    fn get_notes(&self, patient_id: &PatientId) -> ClinicalResult<Vec<CoordinationNote>> {
        self.read(patient_id, |c| Ok(c.notes.clone()))
    }

    fn append_visit(&self, patient_id: &PatientId, visit: VisitRecord) -> ClinicalResult<()> {
        self.write(patient_id, |c| {
            c.visits.push(visit);
            Ok(())
        })
    }

    fn get_visits(&self, patient_id: &PatientId) -> ClinicalResult<Vec<VisitRecord>> {
        self.read(patient_id, |c| Ok(c.visits.clone()))
    }
}
