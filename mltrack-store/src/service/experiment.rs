//! Experiment Service
//!
//! Business logic for experiment management.

use mltrack_core::domain::experiment::{Experiment, ExperimentSummary};
use mltrack_core::dto::experiment::{CreateExperiment, UpdateExperiment};
use sqlx::SqlitePool;

use crate::clock::DynClock;
use crate::error::{Result, StoreError};
use crate::repository::{experiment_repository, job_repository};

/// Create a new experiment
pub async fn create_experiment(
    pool: &SqlitePool,
    clock: &DynClock,
    req: CreateExperiment,
) -> Result<Experiment> {
    req.validate()?;

    let experiment = experiment_repository::create(pool, &req, clock.utc()).await?;

    tracing::info!(
        experiment_id = experiment.id,
        "Experiment created: {}",
        experiment.name
    );

    Ok(experiment)
}

/// Get an experiment by ID
pub async fn get_experiment(pool: &SqlitePool, id: i64) -> Result<Experiment> {
    experiment_repository::find_by_id(pool, id)
        .await?
        .ok_or_else(|| StoreError::experiment_not_found(id))
}

/// List all experiments
pub async fn list_experiments(pool: &SqlitePool) -> Result<Vec<Experiment>> {
    let experiments = experiment_repository::list_all(pool).await?;
    Ok(experiments)
}

/// Update an experiment's own fields
pub async fn update_experiment(
    pool: &SqlitePool,
    clock: &DynClock,
    id: i64,
    req: UpdateExperiment,
) -> Result<Experiment> {
    req.validate()?;

    let experiment = experiment_repository::update(pool, id, &req, clock.utc())
        .await?
        .ok_or_else(|| StoreError::experiment_not_found(id))?;

    tracing::info!(experiment_id = id, "Experiment updated");

    Ok(experiment)
}

/// Delete an experiment and every job it owns
pub async fn delete_experiment(pool: &SqlitePool, id: i64) -> Result<()> {
    let jobs_removed = experiment_repository::delete(pool, id)
        .await?
        .ok_or_else(|| StoreError::experiment_not_found(id))?;

    tracing::info!(
        experiment_id = id,
        jobs_removed,
        "Experiment deleted"
    );

    Ok(())
}

/// Experiment snapshot with job counts per status
///
/// Both reads share one transaction, so the counts belong to the same
/// snapshot as the experiment.
pub async fn summarize_experiment(pool: &SqlitePool, id: i64) -> Result<ExperimentSummary> {
    let mut tx = pool.begin().await?;

    let experiment = experiment_repository::find_by_id(&mut *tx, id)
        .await?
        .ok_or_else(|| StoreError::experiment_not_found(id))?;

    let (jobs, best_accuracy) = job_repository::summarize(&mut *tx, id).await?;

    tx.commit().await?;

    Ok(ExperimentSummary {
        experiment,
        jobs,
        best_accuracy,
    })
}

/// Count stored experiments
pub async fn count_experiments(pool: &SqlitePool) -> Result<u64> {
    let count = experiment_repository::count(pool).await?;
    Ok(count)
}
