mod script;

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use ratchet_core::model::{
    Address, AssessmentCategory, DemographicsUpdate, EpisodeStatus, NoteType, PatientId,
    VitalSign,
};
use ratchet_core::session::{NoteQuery, PatientQuery, SearchField};
use ratchet_core::{ClinicalConfig, InMemoryRecordStore, VisitSessionManager};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "ratchet")]
#[command(about = "Home-health visit engine CLI")]
struct Cli {
    /// Patient dataset (YAML)
    #[arg(long, env = "RATCHET_DATA", default_value = "data/patients.yaml", global = true)]
    data: PathBuf,
    /// Clinical rules override (YAML); built-in formulary and thresholds when omitted
    #[arg(long, env = "RATCHET_CONFIG", global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Search patients by name, id or phone
    Search {
        query: String,
        /// all, name, id or phone
        #[arg(long, default_value = "all")]
        field: SearchField,
        /// Episode status filter (active, inactive, discharged, pending)
        #[arg(long)]
        status: Option<EpisodeStatus>,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Show demographics, or update contact fields when any are given
    Demographics {
        patient_id: PatientId,
        #[arg(long)]
        preferred_name: Option<String>,
        #[arg(long)]
        phone_home: Option<String>,
        #[arg(long)]
        phone_cell: Option<String>,
        #[arg(long)]
        weight_kg: Option<f64>,
        /// New address as "street, city, state, zip"
        #[arg(long, value_parser = parse_address)]
        address: Option<Address>,
    },
    /// Active and discontinued medications with allergies
    Medications { patient_id: PatientId },
    /// Care plan goals and interventions
    CarePlan { patient_id: PatientId },
    /// Wound records with their assessment history
    Wounds {
        patient_id: PatientId,
        #[arg(long)]
        include_healed: bool,
    },
    /// Coordination notes, newest first
    Notes {
        patient_id: PatientId,
        /// e.g. clinical, physician-communication
        #[arg(long = "type")]
        note_type: Option<NoteType>,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Completed visits and the next scheduled date
    Calendar {
        patient_id: PatientId,
        #[arg(long)]
        from: Option<NaiveDate>,
        #[arg(long)]
        to: Option<NaiveDate>,
    },
    /// Vital sign trends
    Vitals {
        patient_id: PatientId,
        /// Sign to report (repeatable); every recorded sign when omitted
        #[arg(long = "sign")]
        signs: Vec<VitalSign>,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Assessment questions for a body system, with the last answers given
    Questions {
        patient_id: PatientId,
        category: AssessmentCategory,
    },
    /// Run a scripted visit: start, apply each write, complete
    RunVisit {
        script: PathBuf,
        /// End the visit as incomplete at the first rejected write
        #[arg(long)]
        stop_on_error: bool,
    },
}

fn parse_address(s: &str) -> Result<Address, String> {
    let parts: Vec<&str> = s.split(',').map(str::trim).collect();
    match parts.as_slice() {
        [street, city, state, zip] if parts.iter().all(|p| !p.is_empty()) => Ok(Address {
            street: street.to_string(),
            city: city.to_string(),
            state: state.to_string(),
            zip: zip.to_string(),
        }),
        _ => Err("expected \"street, city, state, zip\"".into()),
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn build_manager(data: &Path, config: Option<&Path>) -> anyhow::Result<VisitSessionManager> {
    let store = InMemoryRecordStore::load(data)
        .with_context(|| format!("failed to load dataset {}", data.display()))?;
    let config = match config {
        Some(path) => ClinicalConfig::load(path)
            .with_context(|| format!("failed to load clinical config {}", path.display()))?,
        None => ClinicalConfig::default(),
    };
    Ok(VisitSessionManager::new(Arc::new(store), Arc::new(config)))
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("ratchet=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let Some(command) = cli.command else {
        println!("Use 'ratchet --help' for commands");
        return Ok(());
    };
    let manager = build_manager(&cli.data, cli.config.as_deref())?;

    match command {
        Commands::Search {
            query,
            field,
            status,
            limit,
        } => {
            let query = PatientQuery {
                query,
                field,
                status,
                limit,
            };
            print_json(&manager.search_patients(&query)?)?;
        }
        Commands::Demographics {
            patient_id,
            preferred_name,
            phone_home,
            phone_cell,
            weight_kg,
            address,
        } => {
            let update = DemographicsUpdate {
                preferred_name,
                phone_home,
                phone_cell,
                address,
                weight_kg,
            };
            let demographics = if update.is_empty() {
                manager.get_demographics(&patient_id)?
            } else {
                manager.update_demographics(&patient_id, update)?
            };
            print_json(&demographics)?;
        }
        Commands::Medications { patient_id } => {
            print_json(&manager.get_medications(&patient_id)?)?;
        }
        Commands::CarePlan { patient_id } => {
            print_json(&manager.get_care_plan(&patient_id)?)?;
        }
        Commands::Wounds {
            patient_id,
            include_healed,
        } => {
            print_json(&manager.get_wound_records(&patient_id, include_healed)?)?;
        }
        Commands::Notes {
            patient_id,
            note_type,
            limit,
        } => {
            let notes =
                manager.get_coordination_notes(&patient_id, NoteQuery { note_type, limit })?;
            print_json(&notes)?;
        }
        Commands::Calendar {
            patient_id,
            from,
            to,
        } => {
            print_json(&manager.get_visit_calendar(&patient_id, from, to)?)?;
        }
        Commands::Vitals {
            patient_id,
            signs,
            limit,
        } => {
            print_json(&manager.get_vital_trends(&patient_id, &signs, limit)?)?;
        }
        Commands::Questions {
            patient_id,
            category,
        } => {
            print_json(&manager.get_assessment_questions(&patient_id, category)?)?;
        }
        Commands::RunVisit {
            script: script_path,
            stop_on_error,
        } => {
            let visit = script::VisitScript::load(&script_path)?;
            let report = script::run(&manager, visit, stop_on_error)?;
            if report.rejected > 0 {
                tracing::warn!(rejected = report.rejected, "some visit writes were rejected");
            }
            print_json(&report)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_address_needs_four_parts() {
        let address = parse_address("12 Elm St, Dayton, OH, 45402").unwrap();
        assert_eq!(address.city, "Dayton");
        assert_eq!(address.zip, "45402");

        assert!(parse_address("12 Elm St, Dayton").is_err());
        assert!(parse_address("12 Elm St, , OH, 45402").is_err());
    }

    #[test]
    fn test_cli_parses_repeated_signs() {
        let cli = Cli::try_parse_from([
            "ratchet",
            "vitals",
            "PT-10001",
            "--sign",
            "bp",
            "--sign",
            "o2",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::Vitals { signs, .. }) => assert_eq!(
                signs,
                vec![VitalSign::BloodPressureSystolic, VitalSign::OxygenSaturation]
            ),
            _ => panic!("expected vitals command"),
        }
    }

    #[test]
    fn test_build_manager_reads_dataset_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("patients.yaml");
        std::fs::write(&path, include_str!("../../../data/patients.yaml")).unwrap();

        let manager = build_manager(&path, None).unwrap();
        let hits = manager.search_patients(&PatientQuery::new("Robert")).unwrap();
        assert_eq!(hits.len(), 1);

        assert!(build_manager(&dir.path().join("missing.yaml"), None).is_err());
    }
}
