//! Job requests

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{MAX_LABEL_LENGTH, validate_label};
use crate::domain::job::JobStatus;
use crate::error::ValidationError;

/// Request to submit a new training job under an experiment
///
/// `parameters` is stored as given; only its key/value shape is enforced.
/// When `job_id` is omitted the store generates one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateJob {
    pub experiment_id: i64,
    pub name: String,
    pub model_type: String,
    pub parameters: Map<String, Value>,
    #[serde(default)]
    pub job_id: Option<String>,
}

impl CreateJob {
    pub fn new(
        experiment_id: i64,
        name: impl Into<String>,
        model_type: impl Into<String>,
        parameters: Map<String, Value>,
    ) -> Self {
        Self {
            experiment_id,
            name: name.into(),
            model_type: model_type.into(),
            parameters,
            job_id: None,
        }
    }

    /// Use a caller-chosen token instead of a generated one.
    pub fn with_job_id(mut self, job_id: impl Into<String>) -> Self {
        self.job_id = Some(job_id.into());
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_label("name", &self.name)?;
        validate_label("model_type", &self.model_type)?;

        if let Some(job_id) = &self.job_id {
            validate_job_token(job_id)?;
        }

        Ok(())
    }
}

/// Checks a caller-supplied job token.
pub fn validate_job_token(job_id: &str) -> Result<(), ValidationError> {
    if job_id.is_empty() {
        return Err(ValidationError::new("job_id", "cannot be empty"));
    }

    if job_id.len() > MAX_LABEL_LENGTH {
        return Err(ValidationError::new(
            "job_id",
            format!("is too long (max {MAX_LABEL_LENGTH} bytes)"),
        ));
    }

    if job_id.chars().any(char::is_whitespace) {
        return Err(ValidationError::new("job_id", "cannot contain whitespace"));
    }

    Ok(())
}

/// Incremental progress reported by a training worker
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProgressReport {
    pub epochs_completed: u32,
    #[serde(default)]
    pub best_accuracy: Option<f64>,
    /// Appended to the job's history as-is.
    #[serde(default)]
    pub history_entry: Option<Value>,
}

impl ProgressReport {
    pub fn new(epochs_completed: u32) -> Self {
        Self {
            epochs_completed,
            ..Self::default()
        }
    }

    pub fn with_accuracy(mut self, accuracy: f64) -> Self {
        self.best_accuracy = Some(accuracy);
        self
    }

    pub fn with_history_entry(mut self, entry: Value) -> Self {
        self.history_entry = Some(entry);
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        match self.best_accuracy {
            Some(accuracy) if !accuracy.is_finite() => Err(ValidationError::new(
                "best_accuracy",
                format!("must be a finite number (got {accuracy})"),
            )),
            _ => Ok(()),
        }
    }
}

/// Ordering applied to job listings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobOrder {
    #[default]
    CreatedAsc,
    CreatedDesc,
}

/// Optional filters for listing jobs
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobFilter {
    #[serde(default)]
    pub experiment_id: Option<i64>,
    #[serde(default)]
    pub status: Option<JobStatus>,
    #[serde(default)]
    pub order: JobOrder,
    #[serde(default)]
    pub limit: Option<u32>,
}

impl JobFilter {
    pub fn for_experiment(experiment_id: i64) -> Self {
        Self {
            experiment_id: Some(experiment_id),
            ..Self::default()
        }
    }

    pub fn with_status(mut self, status: JobStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn newest_first(mut self) -> Self {
        self.order = JobOrder::CreatedDesc;
        self
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }
}
