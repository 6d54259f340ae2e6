//! Shared threshold validation helpers.
//!
//! Range checks used by the rightsizing thresholds, engine settings and the
//! priority policy. Failures are reported as [`CoreError::Configuration`]
//! because they are only ever hit while building settings.

use crate::error::CoreError;

/// Validate that a value falls within `[0.0, 1.0]`.
pub fn validate_unit_range(value: f64, name: &str) -> Result<(), CoreError> {
    if !(0.0..=1.0).contains(&value) {
        return Err(CoreError::Configuration(format!(
            "{name} must be between 0.0 and 1.0, got {value}"
        )));
    }
    Ok(())
}

/// Validate that a value is a percentage within `[0.0, 100.0]`.
pub fn validate_percent(value: f64, name: &str) -> Result<(), CoreError> {
    if !(0.0..=100.0).contains(&value) {
        return Err(CoreError::Configuration(format!(
            "{name} must be between 0 and 100, got {value}"
        )));
    }
    Ok(())
}

/// Validate that a monetary amount is finite and not negative.
pub fn validate_non_negative(value: f64, name: &str) -> Result<(), CoreError> {
    if !value.is_finite() || value < 0.0 {
        return Err(CoreError::Configuration(format!(
            "{name} must be a non-negative amount, got {value}"
        )));
    }
    Ok(())
}
