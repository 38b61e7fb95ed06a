//! Scripted visits: open a session, replay a list of writes, complete it.

use anyhow::Context;
use chrono::{NaiveDate, Utc};
use ratchet_core::model::visit::check_next_visit;
use ratchet_core::model::{Clinician, Disposition, PatientId, ServiceCode};
use ratchet_core::{
    ClinicalError, VisitHandle, VisitSessionManager, VisitSummary, WriteKind, WriteOperation,
    WriteReceipt,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VisitScript {
    pub patient_id: PatientId,
    pub visit_type: ServiceCode,
    pub clinician: Clinician,
    /// Defaults to today.
    #[serde(default)]
    pub visit_date: Option<NaiveDate>,
    #[serde(default)]
    pub disposition: Disposition,
    #[serde(default)]
    pub next_visit_date: Option<NaiveDate>,
    #[serde(default)]
    pub writes: Vec<WriteOperation>,
}

impl VisitScript {
    pub fn from_yaml_str(text: &str) -> anyhow::Result<Self> {
        serde_yaml::from_str(text).context("invalid visit script")
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read visit script {}", path.display()))?;
        Self::from_yaml_str(&text)
    }
}

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WriteStatus {
    Committed { receipt: WriteReceipt },
    Rejected { error: String },
}

#[derive(Debug, Serialize)]
pub struct WriteResult {
    pub index: usize,
    pub operation: WriteKind,
    #[serde(flatten)]
    pub status: WriteStatus,
}

#[derive(Debug, Serialize)]
pub struct VisitReport {
    pub visit: VisitHandle,
    pub writes: Vec<WriteResult>,
    pub rejected: usize,
    /// Set when `stop_on_error` cut the script short.
    pub aborted: bool,
    pub summary: VisitSummary,
}

/// Replays `script` against `manager`.
///
/// Rejected writes are reported and skipped. With `stop_on_error` the first rejection ends
/// the visit early with disposition `incomplete`. A past `next_visit_date` fails before the
/// visit is opened.
pub fn run(
    manager: &VisitSessionManager,
    script: VisitScript,
    stop_on_error: bool,
) -> Result<VisitReport, ClinicalError> {
    check_next_visit(script.next_visit_date, Utc::now().date_naive())?;
    let visit = manager.start_visit(
        &script.patient_id,
        script.visit_type,
        &script.clinician,
        script.visit_date,
    )?;
    let mut writes = Vec::with_capacity(script.writes.len());
    let mut aborted = false;

    for (index, operation) in script.writes.into_iter().enumerate() {
        let kind = operation.kind();
        let status = match manager.route_write(&visit.session_id, operation) {
            Ok(receipt) => WriteStatus::Committed { receipt },
            Err(err) => WriteStatus::Rejected {
                error: err.to_string(),
            },
        };
        let rejected = matches!(status, WriteStatus::Rejected { .. });
        writes.push(WriteResult {
            index,
            operation: kind,
            status,
        });
        if rejected && stop_on_error {
            aborted = true;
            break;
        }
    }

    let disposition = if aborted {
        Disposition::Incomplete
    } else {
        script.disposition
    };
    let summary =
        manager.complete_visit_with(&visit.session_id, disposition, script.next_visit_date)?;

    Ok(VisitReport {
        rejected: writes
            .iter()
            .filter(|w| matches!(w.status, WriteStatus::Rejected { .. }))
            .count(),
        visit,
        writes,
        aborted,
        summary,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratchet_core::{ClinicalConfig, InMemoryRecordStore};
    use std::sync::Arc;

    const SAMPLE_DATASET: &str = include_str!("../../../data/patients.yaml");
    const WARFARIN_VISIT: &str = include_str!("../../../demos/warfarin_visit.yaml");

    fn setup_manager() -> VisitSessionManager {
        let store = InMemoryRecordStore::from_yaml_str(SAMPLE_DATASET).unwrap();
        VisitSessionManager::new(Arc::new(store), Arc::new(ClinicalConfig::default()))
    }

    #[test]
    fn test_demo_script_runs_clean() {
        let manager = setup_manager();
        let script = VisitScript::from_yaml_str(WARFARIN_VISIT).unwrap();

        let report = run(&manager, script, false).unwrap();

        assert_eq!(report.rejected, 0);
        assert!(!report.aborted);
        assert_eq!(report.summary.writes_of(WriteKind::AddMedication), 2);
        assert_eq!(report.summary.warnings.len(), 1);
        assert_eq!(report.summary.disposition, Disposition::Complete);
    }

    #[test]
    fn test_rejected_write_is_reported_and_skipped() {
        let manager = setup_manager();
        let script = VisitScript::from_yaml_str(
            r#"
patient_id: PT-10001
visit_type: SN11
clinician: { id: STH-001, name: "Stacey Thompson, RN" }
writes:
  - operation: add_medication
    drug: Amoxicillin
    dose: { value: 500, unit: mg }
  - operation: add_coordination_note
    note_type: Clinical
    content: Patient reminded of penicillin allergy
"#,
        )
        .unwrap();

        let report = run(&manager, script, false).unwrap();

        assert_eq!(report.rejected, 1);
        assert!(matches!(report.writes[0].status, WriteStatus::Rejected { .. }));
        assert!(matches!(report.writes[1].status, WriteStatus::Committed { .. }));
        assert_eq!(report.summary.total_writes, 1);
    }

    #[test]
    fn test_stop_on_error_marks_visit_incomplete() {
        let manager = setup_manager();
        let script = VisitScript::from_yaml_str(
            r#"
patient_id: PT-10002
visit_type: SN11
clinician: { id: STH-001, name: "Stacey Thompson, RN" }
writes:
  - operation: document_wound_assessment
    wound_id: W-001
    stage: 1
    dimensions: { length_cm: 2.5, width_cm: 1.5, depth_cm: 0.2 }
  - operation: add_coordination_note
    note_type: Clinical
    content: Never reached
"#,
        )
        .unwrap();

        let report = run(&manager, script, true).unwrap();

        assert!(report.aborted);
        assert_eq!(report.writes.len(), 1);
        assert_eq!(report.summary.disposition, Disposition::Incomplete);
    }

    #[test]
    fn test_past_next_visit_date_fails_before_any_write() {
        let manager = setup_manager();
        let mut script = VisitScript::from_yaml_str(WARFARIN_VISIT).unwrap();
        script.next_visit_date = Utc::now().date_naive().pred_opt();

        let err = run(&manager, script, false).unwrap_err();

        assert!(matches!(err, ClinicalError::InvalidInput(_)));
        let patient = PatientId::new("PT-10001").unwrap();
        assert!(manager.active_session_for(&patient).is_none());
        let active = manager.get_medications(&patient).unwrap().active;
        assert!(active.iter().all(|m| m.drug.as_str() != "Warfarin"));
    }

    #[test]
    fn test_script_clinician_and_visit_date_reach_summary() {
        let manager = setup_manager();
        let mut script = VisitScript::from_yaml_str(WARFARIN_VISIT).unwrap();
        let october_16 = NaiveDate::from_ymd_opt(2026, 10, 16).unwrap();
        script.visit_date = Some(october_16);

        let report = run(&manager, script, false).unwrap();

        assert_eq!(report.visit.clinician.id.as_str(), "STH-001");
        assert_eq!(report.summary.visit_date, october_16);
    }

    #[test]
    fn test_unknown_script_field_rejected() {
        let err = VisitScript::from_yaml_str(
            "patient_id: PT-10001\nvisit_type: SN11\nclinician: { id: A-1, name: Ann }\nnurse: Ann\n",
        )
        .unwrap_err();
        assert!(format!("{err:#}").contains("nurse"));
    }

    #[test]
    fn test_script_requires_clinician() {
        let err = VisitScript::from_yaml_str("patient_id: PT-10001\nvisit_type: SN11\n")
            .unwrap_err();
        assert!(format!("{err:#}").contains("clinician"));
    }
}
