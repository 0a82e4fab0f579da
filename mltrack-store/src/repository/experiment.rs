//! Experiment Repository
//!
//! Handles all database operations related to experiments.

use chrono::{DateTime, Utc};
use mltrack_core::domain::experiment::Experiment;
use mltrack_core::dto::experiment::{CreateExperiment, UpdateExperiment};
use sqlx::{SqliteExecutor, SqlitePool};

/// Create a new experiment in the database
pub async fn create(
    pool: &SqlitePool,
    req: &CreateExperiment,
    now: DateTime<Utc>,
) -> Result<Experiment, sqlx::Error> {
    let row = sqlx::query_as::<_, ExperimentRow>(
        r#"
        INSERT INTO experiments (name, description, created_at, updated_at)
        VALUES ($1, $2, $3, $3)
        RETURNING id, name, description, created_at, updated_at
        "#,
    )
    .bind(&req.name)
    .bind(&req.description)
    .bind(now)
    .fetch_one(pool)
    .await?;

    Ok(row.into())
}

/// Find an experiment by ID
pub async fn find_by_id<'e, E>(executor: E, id: i64) -> Result<Option<Experiment>, sqlx::Error>
where
    E: SqliteExecutor<'e>,
{
    let row = sqlx::query_as::<_, ExperimentRow>(
        r#"
        SELECT id, name, description, created_at, updated_at
        FROM experiments
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(executor)
    .await?;

    Ok(row.map(Into::into))
}

/// List all experiments, oldest first
pub async fn list_all(pool: &SqlitePool) -> Result<Vec<Experiment>, sqlx::Error> {
    let rows = sqlx::query_as::<_, ExperimentRow>(
        r#"
        SELECT id, name, description, created_at, updated_at
        FROM experiments
        ORDER BY created_at ASC, id ASC
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(Into::into).collect())
}

/// Apply the supplied fields and bump `updated_at`
///
/// A description of `Some(None)` clears the stored one.
///
/// Returns `None` when no experiment has this ID.
pub async fn update(
    pool: &SqlitePool,
    id: i64,
    req: &UpdateExperiment,
    now: DateTime<Utc>,
) -> Result<Option<Experiment>, sqlx::Error> {
    let row = sqlx::query_as::<_, ExperimentRow>(
        r#"
        UPDATE experiments
        SET name = COALESCE($1, name),
            description = CASE WHEN $2 THEN $3 ELSE description END,
            updated_at = $4
        WHERE id = $5
        RETURNING id, name, description, created_at, updated_at
        "#,
    )
    .bind(&req.name)
    .bind(req.description.is_some())
    .bind(req.description.as_ref().and_then(Option::as_deref))
    .bind(now)
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(Into::into))
}

/// Delete an experiment together with its jobs
///
/// Both deletes share one transaction. Returns the number of jobs removed,
/// or `None` (with nothing removed) when the experiment does not exist.
pub async fn delete(pool: &SqlitePool, id: i64) -> Result<Option<u64>, sqlx::Error> {
    let mut tx = pool.begin().await?;

    // Jobs first: the foreign key cascade would do the same, but the count is
    // reported back to the caller
    let jobs = sqlx::query("DELETE FROM jobs WHERE experiment_id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    let experiment = sqlx::query("DELETE FROM experiments WHERE id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    if experiment.rows_affected() == 0 {
        return Ok(None);
    }

    tx.commit().await?;

    Ok(Some(jobs.rows_affected()))
}

/// Count all experiments
pub async fn count(pool: &SqlitePool) -> Result<u64, sqlx::Error> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM experiments")
        .fetch_one(pool)
        .await?;

    u64::try_from(count).map_err(|e| sqlx::Error::Decode(Box::new(e)))
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct ExperimentRow {
    id: i64,
    name: String,
    description: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ExperimentRow> for Experiment {
    fn from(row: ExperimentRow) -> Self {
        Experiment {
            id: row.id,
            name: row.name,
            description: row.description,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}
