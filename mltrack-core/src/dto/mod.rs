//! Request types accepted by the tracking store
//!
//! Each request validates itself before the store touches storage, so a
//! malformed request never reaches a write.

pub mod experiment;
pub mod job;

use crate::error::ValidationError;

/// Longest accepted name, model type or job token.
pub const MAX_LABEL_LENGTH: usize = 255;

pub(crate) fn validate_label(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new(field, "cannot be empty"));
    }

    if value.chars().count() > MAX_LABEL_LENGTH {
        return Err(ValidationError::new(
            field,
            format!("is too long (max {MAX_LABEL_LENGTH} characters)"),
        ));
    }

    Ok(())
}
