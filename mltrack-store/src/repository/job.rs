//! Job Repository
//!
//! Handles all database operations related to jobs. Writes that depend on
//! the current status carry it in their `WHERE` clause, so a status check
//! and the write it guards are one statement.

use chrono::{DateTime, Utc};
use mltrack_core::domain::experiment::StatusCounts;
use mltrack_core::domain::job::{Job, JobStatus};
use mltrack_core::dto::job::{CreateJob, JobFilter, JobOrder, ProgressReport};
use serde_json::{Map, Value};
use sqlx::types::Json;
use sqlx::{QueryBuilder, Sqlite, SqliteExecutor, SqlitePool};

/// Result of an insert attempt
#[derive(Debug)]
pub enum CreateOutcome {
    Created(Job),
    /// The token was issued before, possibly to a job since deleted
    JobIdTaken,
    ExperimentMissing,
}

/// Create a new job in the database
///
/// The token is recorded in the `job_ids` registry in the same transaction,
/// which keeps it retired after the job itself is gone.
pub async fn create(
    pool: &SqlitePool,
    req: &CreateJob,
    job_id: &str,
    now: DateTime<Utc>,
) -> Result<CreateOutcome, sqlx::Error> {
    let mut tx = pool.begin().await?;

    // Claiming the token is the first statement, so the transaction holds
    // the write lock from here on
    let claimed = sqlx::query(
        "INSERT INTO job_ids (job_id, claimed_at) VALUES ($1, $2) ON CONFLICT (job_id) DO NOTHING",
    )
    .bind(job_id)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    if claimed.rows_affected() == 0 {
        return Ok(CreateOutcome::JobIdTaken);
    }

    let experiment: Option<i64> = sqlx::query_scalar("SELECT id FROM experiments WHERE id = $1")
        .bind(req.experiment_id)
        .fetch_optional(&mut *tx)
        .await?;

    if experiment.is_none() {
        return Ok(CreateOutcome::ExperimentMissing);
    }

    let row = sqlx::query_as::<_, JobRow>(
        r#"
        INSERT INTO jobs (job_id, experiment_id, name, status, model_type, parameters,
                          epochs_completed, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, 0, $7)
        RETURNING id, job_id, experiment_id, name, status, model_type, parameters,
                  best_accuracy, total_time, epochs_completed, history,
                  created_at, started_at, completed_at
        "#,
    )
    .bind(job_id)
    .bind(req.experiment_id)
    .bind(&req.name)
    .bind(JobStatus::Pending.as_str())
    .bind(&req.model_type)
    .bind(Json(&req.parameters))
    .bind(now)
    .fetch_one(&mut *tx)
    .await?;

    let job = Job::try_from(row)?;
    tx.commit().await?;

    Ok(CreateOutcome::Created(job))
}

/// Find a job by its external token
pub async fn find_by_job_id<'e, E>(executor: E, job_id: &str) -> Result<Option<Job>, sqlx::Error>
where
    E: SqliteExecutor<'e>,
{
    let row = sqlx::query_as::<_, JobRow>(
        r#"
        SELECT id, job_id, experiment_id, name, status, model_type, parameters,
               best_accuracy, total_time, epochs_completed, history,
               created_at, started_at, completed_at
        FROM jobs
        WHERE job_id = $1
        "#,
    )
    .bind(job_id)
    .fetch_optional(executor)
    .await?;

    row.map(Job::try_from).transpose()
}

/// List jobs matching the filter
pub async fn list(pool: &SqlitePool, filter: &JobFilter) -> Result<Vec<Job>, sqlx::Error> {
    let mut query = QueryBuilder::<Sqlite>::new(
        r#"
        SELECT id, job_id, experiment_id, name, status, model_type, parameters,
               best_accuracy, total_time, epochs_completed, history,
               created_at, started_at, completed_at
        FROM jobs
        WHERE 1 = 1
        "#,
    );

    if let Some(experiment_id) = filter.experiment_id {
        query.push(" AND experiment_id = ").push_bind(experiment_id);
    }

    if let Some(status) = filter.status {
        query.push(" AND status = ").push_bind(status.as_str());
    }

    query.push(match filter.order {
        JobOrder::CreatedAsc => " ORDER BY created_at ASC, id ASC",
        JobOrder::CreatedDesc => " ORDER BY created_at DESC, id DESC",
    });

    if let Some(limit) = filter.limit {
        query.push(" LIMIT ").push_bind(i64::from(limit));
    }

    let rows = query.build_query_as::<JobRow>().fetch_all(pool).await?;

    rows.into_iter().map(Job::try_from).collect()
}

/// Move a pending job to running and stamp `started_at`
///
/// Returns `None` if the job is missing or no longer pending.
pub async fn mark_started(
    pool: &SqlitePool,
    job_id: &str,
    started_at: DateTime<Utc>,
) -> Result<Option<Job>, sqlx::Error> {
    let row = sqlx::query_as::<_, JobRow>(
        r#"
        UPDATE jobs
        SET status = $1, started_at = $2
        WHERE job_id = $3 AND status = $4
        RETURNING id, job_id, experiment_id, name, status, model_type, parameters,
                  best_accuracy, total_time, epochs_completed, history,
                  created_at, started_at, completed_at
        "#,
    )
    .bind(JobStatus::Running.as_str())
    .bind(started_at)
    .bind(job_id)
    .bind(JobStatus::Pending.as_str())
    .fetch_optional(pool)
    .await?;

    row.map(Job::try_from).transpose()
}

/// Move a running job to a terminal status
///
/// Returns `None` if the job is missing or no longer running.
pub async fn mark_finished(
    pool: &SqlitePool,
    job_id: &str,
    status: JobStatus,
    completed_at: DateTime<Utc>,
    total_time: Option<f64>,
) -> Result<Option<Job>, sqlx::Error> {
    let row = sqlx::query_as::<_, JobRow>(
        r#"
        UPDATE jobs
        SET status = $1, completed_at = $2, total_time = $3
        WHERE job_id = $4 AND status = $5
        RETURNING id, job_id, experiment_id, name, status, model_type, parameters,
                  best_accuracy, total_time, epochs_completed, history,
                  created_at, started_at, completed_at
        "#,
    )
    .bind(status.as_str())
    .bind(completed_at)
    .bind(total_time)
    .bind(job_id)
    .bind(JobStatus::Running.as_str())
    .fetch_optional(pool)
    .await?;

    row.map(Job::try_from).transpose()
}

/// Apply a progress report to a running job
///
/// `epochs_completed` only moves up, `best_accuracy` keeps the maximum and
/// the history entry is appended in place. Returns `None` if the job is
/// missing or not running.
pub async fn record_progress(
    pool: &SqlitePool,
    job_id: &str,
    report: &ProgressReport,
) -> Result<Option<Job>, sqlx::Error> {
    let row = sqlx::query_as::<_, JobRow>(
        r#"
        UPDATE jobs
        SET epochs_completed = MAX(epochs_completed, $1),
            best_accuracy = CASE
                WHEN $2 IS NULL THEN best_accuracy
                WHEN best_accuracy IS NULL OR $2 > best_accuracy THEN $2
                ELSE best_accuracy
            END,
            history = CASE
                WHEN $3 IS NULL THEN history
                ELSE json_insert(COALESCE(history, '[]'), '$[#]', json($3))
            END
        WHERE job_id = $4 AND status = $5
        RETURNING id, job_id, experiment_id, name, status, model_type, parameters,
                  best_accuracy, total_time, epochs_completed, history,
                  created_at, started_at, completed_at
        "#,
    )
    .bind(i64::from(report.epochs_completed))
    .bind(report.best_accuracy)
    .bind(report.history_entry.as_ref().map(Json))
    .bind(job_id)
    .bind(JobStatus::Running.as_str())
    .fetch_optional(pool)
    .await?;

    row.map(Job::try_from).transpose()
}

/// Delete a job by its external token
pub async fn delete(pool: &SqlitePool, job_id: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM jobs WHERE job_id = $1")
        .bind(job_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Count all jobs
pub async fn count(pool: &SqlitePool) -> Result<u64, sqlx::Error> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM jobs")
        .fetch_one(pool)
        .await?;

    u64::try_from(count).map_err(|e| sqlx::Error::Decode(Box::new(e)))
}

/// Per-status job counts and best accuracy for one experiment
pub async fn summarize<'e, E>(
    executor: E,
    experiment_id: i64,
) -> Result<(StatusCounts, Option<f64>), sqlx::Error>
where
    E: SqliteExecutor<'e>,
{
    let rows: Vec<(String, i64, Option<f64>)> = sqlx::query_as(
        r#"
        SELECT status, COUNT(*), MAX(best_accuracy)
        FROM jobs
        WHERE experiment_id = $1
        GROUP BY status
        "#,
    )
    .bind(experiment_id)
    .fetch_all(executor)
    .await?;

    let mut counts = StatusCounts::default();
    let mut best: Option<f64> = None;

    for (status, count, accuracy) in rows {
        let count = u64::try_from(count).map_err(|e| sqlx::Error::Decode(Box::new(e)))?;
        match parse_status(&status)? {
            JobStatus::Pending => counts.pending = count,
            JobStatus::Running => counts.running = count,
            JobStatus::Completed => counts.completed = count,
            JobStatus::Failed => counts.failed = count,
        }

        best = match (best, accuracy) {
            (Some(current), Some(candidate)) => Some(current.max(candidate)),
            (current, candidate) => current.or(candidate),
        };
    }

    Ok((counts, best))
}

// =============================================================================
// Helper Functions
// =============================================================================

fn parse_status(s: &str) -> Result<JobStatus, sqlx::Error> {
    s.parse::<JobStatus>()
        .map_err(|e| sqlx::Error::Decode(Box::new(e)))
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct JobRow {
    id: i64,
    job_id: String,
    experiment_id: i64,
    name: String,
    status: String,
    model_type: String,
    parameters: Json<Map<String, Value>>,
    best_accuracy: Option<f64>,
    total_time: Option<f64>,
    epochs_completed: i64,
    history: Option<Json<Vec<Value>>>,
    created_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
}

impl TryFrom<JobRow> for Job {
    type Error = sqlx::Error;

    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        let status = parse_status(&row.status)?;
        let epochs_completed =
            u32::try_from(row.epochs_completed).map_err(|e| sqlx::Error::Decode(Box::new(e)))?;

        Ok(Job {
            id: row.id,
            job_id: row.job_id,
            experiment_id: row.experiment_id,
            name: row.name,
            status,
            model_type: row.model_type,
            parameters: row.parameters.0,
            best_accuracy: row.best_accuracy,
            total_time: row.total_time,
            epochs_completed,
            history: row.history.map(|h| h.0),
            created_at: row.created_at,
            started_at: row.started_at,
            completed_at: row.completed_at,
        })
    }
}
