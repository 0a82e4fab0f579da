//! Error types for the tracking store

use mltrack_core::ValidationError;
use mltrack_core::domain::job::JobStatus;
use thiserror::Error;

/// Result type alias for store operations
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors reported by tracking store operations
///
/// Every variant except `Database` and `Io` means the call was rejected
/// before any write became visible.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Malformed input: missing or empty required field
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Referenced experiment or job does not exist
    #[error("{entity} not found: {key}")]
    NotFound {
        /// Kind of record that was looked up
        entity: &'static str,
        /// Identifier that was looked up
        key: String,
    },

    /// Caller-supplied job token is already taken
    #[error("Job id already in use: {0}")]
    Conflict(String),

    /// Status change not allowed by the job state machine
    #[error("Invalid transition for job {job_id}: {from} -> {to}")]
    InvalidTransition {
        job_id: String,
        from: JobStatus,
        to: JobStatus,
    },

    /// Operation requires a different job status
    #[error("Job {job_id} is {status}, expected {expected}")]
    InvalidState {
        job_id: String,
        status: JobStatus,
        expected: JobStatus,
    },

    /// Storage engine failure
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Filesystem failure while preparing the database location
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    pub fn experiment_not_found(id: i64) -> Self {
        Self::NotFound {
            entity: "Experiment",
            key: id.to_string(),
        }
    }

    pub fn job_not_found(job_id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: "Job",
            key: job_id.into(),
        }
    }

    /// Check if this error is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if this error is a duplicate job token
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }

    /// Check if this error is a rejected status change
    pub fn is_invalid_transition(&self) -> bool {
        matches!(self, Self::InvalidTransition { .. })
    }

    /// Check if this error is a status precondition failure
    pub fn is_invalid_state(&self) -> bool {
        matches!(self, Self::InvalidState { .. })
    }

    /// Check if this error is caused by the caller's input rather than storage
    pub fn is_client_error(&self) -> bool {
        !matches!(self, Self::Database(_) | Self::Io(_))
    }
}
