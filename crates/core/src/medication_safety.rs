//! Medication safety checks applied before a medication order is committed.
//!
//! A proposal is checked against the patient's allergies, the active medication list and the
//! formulary, in that order. Hard failures come back as a [`MedicationRejection`]; everything
//! else is an advisory [`ClinicalWarning`].

use crate::config::{ClinicalConfig, InteractionSeverity};
use crate::error::EntityKind;
use crate::model::{Dose, DoseUnit, MedicationId, MedicationOrder, Patient, Route};
use crate::validation::positive_dose;
use crate::warnings::ClinicalWarning;
use crate::{ClinicalError, ClinicalResult};
use chrono::NaiveDate;
use ratchet_types::NonEmptyText;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A medication the nurse proposes to add.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MedicationProposal {
    pub drug: NonEmptyText,
    #[serde(default)]
    pub dose: Option<Dose>,
    #[serde(default)]
    pub route: Route,
    #[serde(default)]
    pub frequency: Option<String>,
    #[serde(default)]
    pub times: Vec<String>,
    #[serde(default)]
    pub purpose: Option<String>,
    #[serde(default)]
    pub prescriber: Option<String>,
    /// Defaults to the visit date.
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    /// Proceed past an allergy contraindication. The match is kept as a warning.
    #[serde(default)]
    pub override_allergy: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum MedicationRejection {
    AllergyContraindication {
        drug: String,
        allergen: String,
        reaction: String,
    },
    SevereInteraction {
        drug: String,
        interacting_drug: String,
        description: String,
    },
    DoseAboveAbsoluteMax {
        drug: String,
        dose: f64,
        unit: DoseUnit,
        limit: f64,
    },
    DoseBelowAbsoluteMin {
        drug: String,
        dose: f64,
        unit: DoseUnit,
        limit: f64,
    },
}

impl std::fmt::Display for MedicationRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AllergyContraindication {
                drug,
                allergen,
                reaction,
            } => write!(
                f,
                "patient is allergic to {} ({}); {} is contraindicated",
                allergen, reaction, drug
            ),
            Self::SevereInteraction {
                drug,
                interacting_drug,
                description,
            } => write!(
                f,
                "severe interaction between {} and {}: {}",
                drug, interacting_drug, description
            ),
            Self::DoseAboveAbsoluteMax {
                drug,
                dose,
                unit,
                limit,
            } => write!(
                f,
                "{} {} {} exceeds the absolute maximum of {} {}",
                drug, dose, unit, limit, unit
            ),
            Self::DoseBelowAbsoluteMin {
                drug,
                dose,
                unit,
                limit,
            } => write!(
                f,
                "{} {} {} is below the absolute minimum of {} {}",
                drug, dose, unit, limit, unit
            ),
        }
    }
}

/// Outcome of a safety check. `accepted` is true exactly when `rejection` is `None`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MedicationDecision {
    pub accepted: bool,
    pub warnings: Vec<ClinicalWarning>,
    pub rejection: Option<MedicationRejection>,
}

impl MedicationDecision {
    fn accept(warnings: Vec<ClinicalWarning>) -> Self {
        Self {
            accepted: true,
            warnings,
            rejection: None,
        }
    }

    fn reject(warnings: Vec<ClinicalWarning>, rejection: MedicationRejection) -> Self {
        Self {
            accepted: false,
            warnings,
            rejection: Some(rejection),
        }
    }

    /// Turns a rejection into `ClinicalError::UnsafeMedication`.
    pub fn into_result(self) -> ClinicalResult<Vec<ClinicalWarning>> {
        match self.rejection {
            Some(rejection) => Err(ClinicalError::UnsafeMedication(rejection)),
            None => Ok(self.warnings),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MedicationSafetyValidator {
    config: Arc<ClinicalConfig>,
}

impl MedicationSafetyValidator {
    pub fn new(config: Arc<ClinicalConfig>) -> Self {
        Self { config }
    }

    /// Checks `proposal` against `patient` and their current medication list.
    ///
    /// Discontinued orders in `current` are ignored. `on` is the date used to compute the
    /// patient's age for age-adjusted dose ranges.
    ///
    /// # Errors
    ///
    /// `InvalidInput` when the dose is not positive or its unit cannot be compared with the
    /// formulary range. Safety failures are reported through the decision, not as errors.
    pub fn validate_addition(
        &self,
        patient: &Patient,
        current: &[MedicationOrder],
        proposal: &MedicationProposal,
        on: NaiveDate,
    ) -> ClinicalResult<MedicationDecision> {
        let drug_name = self.config.canonical_drug_name(proposal.drug.as_str());
        let profile = self.config.drug(drug_name);
        let mut warnings = Vec::new();

        if let Some(dose) = &proposal.dose {
            positive_dose(drug_name, dose.value)?;
        }

        let class = profile.map(|p| p.therapeutic_class.to_lowercase());
        let folded_name = drug_name.to_lowercase();
        for allergy in &patient.allergies {
            let allergen = allergy.allergen.folded();
            let matches_name = folded_name.contains(&allergen);
            let matches_class = class.as_deref().is_some_and(|c| c.contains(&allergen));
            if !(matches_name || matches_class) {
                continue;
            }
            if proposal.override_allergy {
                warnings.push(ClinicalWarning::AllergyOverridden {
                    drug: drug_name.to_string(),
                    allergen: allergy.allergen.to_string(),
                    reaction: allergy.reaction.clone(),
                });
            } else {
                return Ok(MedicationDecision::reject(
                    warnings,
                    MedicationRejection::AllergyContraindication {
                        drug: drug_name.to_string(),
                        allergen: allergy.allergen.to_string(),
                        reaction: allergy.reaction.clone(),
                    },
                ));
            }
        }

        let active: Vec<&MedicationOrder> = current.iter().filter(|m| m.is_active()).collect();

        let mut severe = None;
        for existing in &active {
            let Some(rule) = self.config.interaction(drug_name, existing.drug.as_str()) else {
                continue;
            };
            let interacting_drug = self.config.canonical_drug_name(existing.drug.as_str());
            match rule.severity {
                InteractionSeverity::Severe if severe.is_none() => {
                    severe = Some(MedicationRejection::SevereInteraction {
                        drug: drug_name.to_string(),
                        interacting_drug: interacting_drug.to_string(),
                        description: rule.description.clone(),
                    });
                }
                InteractionSeverity::Severe => {}
                InteractionSeverity::Moderate => {
                    warnings.push(ClinicalWarning::ModerateInteraction {
                        drug: drug_name.to_string(),
                        interacting_drug: interacting_drug.to_string(),
                        description: rule.description.clone(),
                    });
                }
            }
        }
        if let Some(rejection) = severe {
            return Ok(MedicationDecision::reject(warnings, rejection));
        }

        match (profile, &proposal.dose) {
            (None, _) => warnings.push(ClinicalWarning::NoDoseReference {
                drug: drug_name.to_string(),
            }),
            (Some(profile), Some(dose)) => {
                let age = patient.demographics.age_on(on);
                let weight = patient.demographics.weight_kg;
                if let Some(range) = profile.effective_range(Some(age), weight) {
                    let value = dose.value_in(range.unit).ok_or_else(|| {
                        ClinicalError::InvalidInput(format!(
                            "{} dose in {} cannot be compared with its range in {}",
                            drug_name, dose.unit, range.unit
                        ))
                    })?;

                    if value > range.absolute_max {
                        return Ok(MedicationDecision::reject(
                            warnings,
                            MedicationRejection::DoseAboveAbsoluteMax {
                                drug: drug_name.to_string(),
                                dose: value,
                                unit: range.unit,
                                limit: range.absolute_max,
                            },
                        ));
                    }
                    if value < range.absolute_min {
                        return Ok(MedicationDecision::reject(
                            warnings,
                            MedicationRejection::DoseBelowAbsoluteMin {
                                drug: drug_name.to_string(),
                                dose: value,
                                unit: range.unit,
                                limit: range.absolute_min,
                            },
                        ));
                    }
                    if value < range.typical_min || value > range.typical_max {
                        warnings.push(ClinicalWarning::DoseOutsideTypicalRange {
                            drug: drug_name.to_string(),
                            dose: value,
                            unit: range.unit,
                            typical_min: range.typical_min,
                            typical_max: range.typical_max,
                        });
                    }
                }
            }
            (Some(_), None) => {}
        }

        for existing in &active {
            let existing_name = self.config.canonical_drug_name(existing.drug.as_str());
            let shared_class = if existing_name.eq_ignore_ascii_case(drug_name) {
                Some(class.clone().unwrap_or_else(|| "same drug".to_string()))
            } else {
                let existing_class = self
                    .config
                    .drug(existing_name)
                    .map(|p| p.therapeutic_class.to_lowercase());
                match (&class, existing_class) {
                    (Some(a), Some(b)) if *a == b => Some(b),
                    _ => None,
                }
            };
            if let Some(therapeutic_class) = shared_class {
                warnings.push(ClinicalWarning::DuplicateTherapy {
                    drug: drug_name.to_string(),
                    existing_drug: existing_name.to_string(),
                    therapeutic_class,
                });
            }
        }

        Ok(MedicationDecision::accept(warnings))
    }

    /// Checks that `med_id` names an active order in `current`.
    pub fn validate_discontinuation<'a>(
        &self,
        current: &'a [MedicationOrder],
        med_id: &MedicationId,
    ) -> ClinicalResult<&'a MedicationOrder> {
        let order = current
            .iter()
            .find(|m| &m.med_id == med_id)
            .ok_or_else(|| ClinicalError::not_found(EntityKind::Medication, med_id))?;
        if !order.is_active() {
            return Err(ClinicalError::InvalidInput(format!(
                "medication {} ({}) is already discontinued",
                med_id, order.drug
            )));
        }
        Ok(order)
    }
}
