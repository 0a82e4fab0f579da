//! Experiment requests

use serde::{Deserialize, Deserializer, Serialize};

use super::validate_label;
use crate::error::ValidationError;

/// Request to create a new experiment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateExperiment {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl CreateExperiment {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_label("name", &self.name)
    }
}

/// Partial update of an experiment's own fields
///
/// Absent fields keep their stored value. For `description`, `Some(None)`
/// (an explicit `null` on the wire) clears it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateExperiment {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub description: Option<Option<String>>,
}

impl UpdateExperiment {
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(Some(description.into()));
        self
    }

    pub fn clear_description(mut self) -> Self {
        self.description = Some(None);
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        match &self.name {
            Some(name) => validate_label("name", name),
            None => Ok(()),
        }
    }
}

/// Maps a present field, `null` included, to `Some`.
fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}
