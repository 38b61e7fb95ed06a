//! Fixtures shared by unit tests across modules.

use crate::config::ClinicalConfig;
use crate::model::{Clinician, PatientId};
use crate::session::VisitSessionManager;
use crate::store::InMemoryRecordStore;
use std::sync::Arc;

pub(crate) const SAMPLE_DATASET: &str = include_str!("../../../data/patients.yaml");

pub(crate) fn setup_store() -> InMemoryRecordStore {
    InMemoryRecordStore::from_yaml_str(SAMPLE_DATASET).unwrap()
}

/// Manager over a fresh copy of the sample dataset, plus a handle on its store.
pub(crate) fn setup_manager() -> (VisitSessionManager, Arc<InMemoryRecordStore>) {
    let store = Arc::new(setup_store());
    let manager = VisitSessionManager::new(store.clone(), Arc::new(ClinicalConfig::default()));
    (manager, store)
}

pub(crate) fn margaret() -> PatientId {
    PatientId::new("PT-10001").unwrap()
}

pub(crate) fn robert() -> PatientId {
    PatientId::new("PT-10002").unwrap()
}

pub(crate) fn dorothy() -> PatientId {
    PatientId::new("PT-10003").unwrap()
}

pub(crate) fn nurse() -> Clinician {
    Clinician::new("STH-001", "Stacey Thompson, RN").unwrap()
}
