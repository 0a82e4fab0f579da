//! Experiment domain types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A named collection of related training jobs.
///
/// `updated_at` tracks changes to the experiment's own fields only; job
/// activity underneath it does not touch it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Experiment {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Job counts for an experiment, one per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub pending: u64,
    pub running: u64,
    pub completed: u64,
    pub failed: u64,
}

impl StatusCounts {
    pub fn total(&self) -> u64 {
        self.pending + self.running + self.completed + self.failed
    }
}

/// Experiment snapshot together with an aggregate view of its jobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentSummary {
    pub experiment: Experiment,
    pub jobs: StatusCounts,
    /// Highest `best_accuracy` reported by any job of the experiment.
    pub best_accuracy: Option<f64>,
}
