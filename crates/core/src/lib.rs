//! # Ratchet Core
//!
//! In-process visit engine for home-health nursing.
//!
//! A nurse opens a visit session for one patient, routes clinical writes through it and
//! completes it. Every write passes a domain validator before it reaches the record store:
//!
//! - [`medication_safety`] rejects allergy matches, severe interactions and doses past
//!   absolute limits, and warns on the rest.
//! - [`goal_tracker`] moves care-plan goals forward as interventions are documented.
//! - [`wound_stager`] keeps wound staging monotonic unless a regression is flagged.
//! - [`vitals_trend`] flags readings that trend or fall out of range.
//!
//! Patient records live behind the [`store::RecordStore`] trait; [`store::InMemoryRecordStore`]
//! is seeded from a YAML dataset.
//!
//! **No transport concerns**: argument parsing, output formatting and process setup belong
//! in `ratchet-cli`.

pub mod config;
pub mod constants;
pub mod error;
pub mod goal_tracker;
pub mod medication_safety;
pub mod model;
pub mod session;
pub mod store;
pub mod validation;
pub mod vitals_trend;
pub mod warnings;
pub mod wound_stager;

#[cfg(test)]
mod testing;

pub use config::ClinicalConfig;
pub use error::{ClinicalError, ClinicalResult, EntityKind};
pub use medication_safety::{MedicationDecision, MedicationProposal, MedicationRejection};
pub use session::{
    SessionState, VisitHandle, VisitSession, VisitSessionManager, VisitSummary, WriteKind,
    WriteLogEntry, WriteOperation, WriteOutcome, WriteReceipt,
};
pub use store::{InMemoryRecordStore, RecordStore};
pub use warnings::ClinicalWarning;
