//! Input validation utilities.
//!
//! Small checks shared by the validators and passthroughs so every entry point rejects
//! malformed numbers and free text the same way.

use crate::{ClinicalError, ClinicalResult};

/// Validates a measurement that must be a finite number `>= 0`.
///
/// # Errors
///
/// Returns `ClinicalError::InvalidMeasurement` naming `label` otherwise.
pub fn non_negative_measurement(label: &str, value: f64) -> ClinicalResult<f64> {
    if !value.is_finite() || value < 0.0 {
        return Err(ClinicalError::InvalidMeasurement(format!(
            "{label} must be a non-negative number, got {value}"
        )));
    }
    Ok(value)
}

/// Validates a dose amount, which must be a finite number `> 0`.
pub fn positive_dose(drug: &str, value: f64) -> ClinicalResult<f64> {
    if !value.is_finite() || value <= 0.0 {
        return Err(ClinicalError::InvalidInput(format!(
            "dose for {drug} must be a positive number, got {value}"
        )));
    }
    Ok(value)
}

/// Applies a default and rejects a zero limit.
pub fn result_limit(limit: Option<usize>, default: usize) -> ClinicalResult<usize> {
    match limit {
        Some(0) => Err(ClinicalError::InvalidInput(
            "limit must be at least 1".into(),
        )),
        Some(n) => Ok(n),
        None => Ok(default),
    }
}

/// Keeps only the digits of a phone number so `(555) 010-1234` matches `5550101234`.
pub fn phone_digits(phone: &str) -> String {
    phone.chars().filter(char::is_ascii_digit).collect()
}

/// Trims optional free text and drops it when nothing is left.
pub fn optional_text(text: Option<String>) -> Option<String> {
    text.map(|t| t.trim().to_string()).filter(|t| !t.is_empty())
}
