//! Clinical record store contract.
//!
//! The visit engine reads and writes patient records only through [`RecordStore`]. Every
//! call is synchronous and scoped to one patient. Lookups of unknown records fail with
//! `ClinicalError::NotFound`; implementations backed by fallible storage surface their own
//! failures as `ClinicalError::StoreUnavailable` and the engine passes them through unchanged.

mod memory;

pub use memory::{InMemoryRecordStore, PatientChart};

use crate::error::EntityKind;
use crate::model::{
    AssessmentRecord, CarePlan, CarePlanGoal, CoordinationNote, Demographics, DemographicsUpdate,
    InterventionEvent,
    MedicationOrder, Order, Patient, PatientId, VisitRecord, VitalsReading, WoundAssessment,
    WoundId, WoundRecord,
};
use crate::{ClinicalError, ClinicalResult};

pub trait RecordStore: Send + Sync {
    fn get_patient(&self, patient_id: &PatientId) -> ClinicalResult<Patient>;

    fn list_patients(&self) -> ClinicalResult<Vec<Patient>>;

    /// Applies `update` to the stored demographics in one step and returns the result.
    /// Concurrent updates for the same patient must not lose each other's fields.
    fn update_demographics(
        &self,
        patient_id: &PatientId,
        update: DemographicsUpdate,
    ) -> ClinicalResult<Demographics>;

    /// All orders for the patient, active and discontinued, in the order they were added.
    fn get_medications(&self, patient_id: &PatientId) -> ClinicalResult<Vec<MedicationOrder>>;

    /// Inserts the order, or replaces the existing order with the same `med_id`.
    fn put_medication(&self, patient_id: &PatientId, order: MedicationOrder) -> ClinicalResult<()>;

    fn get_care_plan(&self, patient_id: &PatientId) -> ClinicalResult<CarePlan>;

    /// Replaces the stored goal with the same `goal_id`. Unknown goals fail with `NotFound`.
    fn put_goal_status(&self, patient_id: &PatientId, goal: CarePlanGoal) -> ClinicalResult<()>;

    fn append_intervention_event(
        &self,
        patient_id: &PatientId,
        event: InterventionEvent,
    ) -> ClinicalResult<()>;

    fn get_intervention_events(
        &self,
        patient_id: &PatientId,
    ) -> ClinicalResult<Vec<InterventionEvent>>;

    fn get_wound_records(&self, patient_id: &PatientId) -> ClinicalResult<Vec<WoundRecord>>;

    fn get_wound_record(
        &self,
        patient_id: &PatientId,
        wound_id: &WoundId,
    ) -> ClinicalResult<WoundRecord> {
        self.get_wound_records(patient_id)?
            .into_iter()
            .find(|w| &w.wound_id == wound_id)
            .ok_or_else(|| ClinicalError::not_found(EntityKind::Wound, wound_id))
    }

    /// Adds a new wound. Fails with `InvalidInput` if the identifier is already taken.
    fn create_wound(&self, patient_id: &PatientId, record: WoundRecord) -> ClinicalResult<()>;

    fn append_wound_assessment(
        &self,
        patient_id: &PatientId,
        wound_id: &WoundId,
        assessment: WoundAssessment,
    ) -> ClinicalResult<()>;

    fn append_vitals(&self, patient_id: &PatientId, reading: VitalsReading) -> ClinicalResult<()>;

    /// Readings oldest first.
    fn get_vitals_history(&self, patient_id: &PatientId) -> ClinicalResult<Vec<VitalsReading>>;

    fn append_assessment(
        &self,
        patient_id: &PatientId,
        record: AssessmentRecord,
    ) -> ClinicalResult<()>;

    fn get_assessments(&self, patient_id: &PatientId) -> ClinicalResult<Vec<AssessmentRecord>>;

    fn append_order(&self, patient_id: &PatientId, order: Order) -> ClinicalResult<()>;

    fn get_orders(&self, patient_id: &PatientId) -> ClinicalResult<Vec<Order>>;

    fn append_note(&self, patient_id: &PatientId, note: CoordinationNote) -> ClinicalResult<()>;

    /// Notes oldest first.
    fn get_notes(&self, patient_id: &PatientId) -> ClinicalResult<Vec<CoordinationNote>>;

    fn append_visit(&self, patient_id: &PatientId, visit: VisitRecord) -> ClinicalResult<()>;

    fn get_visits(&self, patient_id: &PatientId) -> ClinicalResult<Vec<VisitRecord>>;
}
