//! Job Service
//!
//! Business logic for job submission and lifecycle.

use chrono::{DateTime, Utc};
use mltrack_core::domain::job::{Job, JobStatus};
use mltrack_core::dto::job::{CreateJob, JobFilter, ProgressReport};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::clock::DynClock;
use crate::error::{Result, StoreError};
use crate::repository::job::CreateOutcome;
use crate::repository::{experiment_repository, job_repository};

/// Attempts at drawing a fresh token before giving up
const MAX_TOKEN_ATTEMPTS: usize = 3;

/// Create a new pending job under an existing experiment
pub async fn create_job(pool: &SqlitePool, clock: &DynClock, req: CreateJob) -> Result<Job> {
    req.validate()?;

    let now = clock.utc();

    let job = match &req.job_id {
        Some(job_id) => insert_job(pool, &req, job_id, now)
            .await?
            .ok_or_else(|| StoreError::Conflict(job_id.clone()))?,
        None => {
            let mut created = None;

            for _ in 0..MAX_TOKEN_ATTEMPTS {
                let job_id = generate_job_id();
                created = insert_job(pool, &req, &job_id, now).await?;

                if created.is_some() {
                    break;
                }

                tracing::warn!(job_id = %job_id, "Generated job id already issued, retrying");
            }

            created.ok_or_else(|| StoreError::Conflict("<generated>".to_string()))?
        }
    };

    tracing::info!(
        job_id = %job.job_id,
        experiment_id = job.experiment_id,
        model_type = %job.model_type,
        "Job created"
    );

    Ok(job)
}

/// Get a job by its external token
pub async fn get_job(pool: &SqlitePool, job_id: &str) -> Result<Job> {
    job_repository::find_by_job_id(pool, job_id)
        .await?
        .ok_or_else(|| StoreError::job_not_found(job_id))
}

/// List jobs, optionally narrowed to one experiment and/or status
pub async fn list_jobs(pool: &SqlitePool, filter: JobFilter) -> Result<Vec<Job>> {
    // Verify experiment exists
    if let Some(experiment_id) = filter.experiment_id {
        experiment_repository::find_by_id(pool, experiment_id)
            .await?
            .ok_or_else(|| StoreError::experiment_not_found(experiment_id))?;
    }

    let jobs = job_repository::list(pool, &filter).await?;
    Ok(jobs)
}

/// Move a job along the status machine
///
/// `pending -> running` stamps `started_at`; `running -> completed|failed`
/// stamps `completed_at` and `total_time`. Anything else is rejected and
/// leaves the job untouched.
pub async fn update_job_status(
    pool: &SqlitePool,
    clock: &DynClock,
    job_id: &str,
    status: JobStatus,
) -> Result<Job> {
    let job = get_job(pool, job_id).await?;

    if !job.status.can_transition_to(status) {
        return Err(StoreError::InvalidTransition {
            job_id: job_id.to_string(),
            from: job.status,
            to: status,
        });
    }

    let now = clock.utc();

    let updated = if status == JobStatus::Running {
        job_repository::mark_started(pool, job_id, now).await?
    } else {
        // Never stamp a completion earlier than the start
        let completed_at = job.started_at.map_or(now, |started_at| now.max(started_at));
        let total_time = job
            .started_at
            .map(|started_at| elapsed_seconds(started_at, completed_at));

        job_repository::mark_finished(pool, job_id, status, completed_at, total_time).await?
    };

    match updated {
        Some(updated) => {
            tracing::info!(
                job_id = %job_id,
                from = %job.status,
                to = %status,
                "Job status changed"
            );
            Ok(updated)
        }
        None => {
            // Another caller moved or deleted the job between read and write
            let current = get_job(pool, job_id).await?;

            tracing::warn!(
                job_id = %job_id,
                current = %current.status,
                requested = %status,
                "Job status changed concurrently"
            );

            Err(StoreError::InvalidTransition {
                job_id: job_id.to_string(),
                from: current.status,
                to: status,
            })
        }
    }
}

/// Record training progress for a running job
pub async fn report_progress(
    pool: &SqlitePool,
    job_id: &str,
    report: ProgressReport,
) -> Result<Job> {
    report.validate()?;

    let Some(job) = job_repository::record_progress(pool, job_id, &report).await? else {
        let current = get_job(pool, job_id).await?;

        // Only a pending job can have become running since the write missed
        let status = match current.status {
            JobStatus::Running => JobStatus::Pending,
            status => status,
        };

        return Err(StoreError::InvalidState {
            job_id: job_id.to_string(),
            status,
            expected: JobStatus::Running,
        });
    };

    if job.epochs_completed > report.epochs_completed {
        tracing::debug!(
            job_id = %job_id,
            reported = report.epochs_completed,
            stored = job.epochs_completed,
            "Ignored stale epoch count"
        );
    }

    tracing::debug!(
        job_id = %job_id,
        epochs_completed = job.epochs_completed,
        best_accuracy = ?job.best_accuracy,
        "Progress recorded"
    );

    Ok(job)
}

/// Delete a single job; its token stays retired
pub async fn delete_job(pool: &SqlitePool, job_id: &str) -> Result<()> {
    let deleted = job_repository::delete(pool, job_id).await?;

    if !deleted {
        return Err(StoreError::job_not_found(job_id));
    }

    tracing::info!(job_id = %job_id, "Job deleted");

    Ok(())
}

/// Count stored jobs
pub async fn count_jobs(pool: &SqlitePool) -> Result<u64> {
    let count = job_repository::count(pool).await?;
    Ok(count)
}

// =============================================================================
// Helpers
// =============================================================================

async fn insert_job(
    pool: &SqlitePool,
    req: &CreateJob,
    job_id: &str,
    now: DateTime<Utc>,
) -> Result<Option<Job>> {
    match job_repository::create(pool, req, job_id, now).await {
        Ok(CreateOutcome::Created(job)) => Ok(Some(job)),
        Ok(CreateOutcome::JobIdTaken) => Ok(None),
        Ok(CreateOutcome::ExperimentMissing) => {
            Err(StoreError::experiment_not_found(req.experiment_id))
        }
        Err(sqlx::Error::Database(err)) if err.is_unique_violation() => Ok(None),
        Err(sqlx::Error::Database(err)) if err.is_foreign_key_violation() => {
            Err(StoreError::experiment_not_found(req.experiment_id))
        }
        Err(err) => Err(err.into()),
    }
}

fn generate_job_id() -> String {
    Uuid::new_v4().to_string()
}

fn elapsed_seconds(started_at: DateTime<Utc>, completed_at: DateTime<Utc>) -> f64 {
    (completed_at - started_at)
        .to_std()
        .map(|elapsed| elapsed.as_secs_f64())
        .unwrap_or_default()
}
