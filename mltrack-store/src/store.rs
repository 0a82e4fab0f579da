//! Tracking store handle
//!
//! [`TrackingStore`] bundles a connection pool and a clock and is passed
//! explicitly to whatever needs storage. Consumers that want a test double
//! depend on the [`ExperimentTracker`] trait instead.

use std::sync::Arc;

use async_trait::async_trait;
use mltrack_core::domain::experiment::{Experiment, ExperimentSummary};
use mltrack_core::domain::job::{Job, JobStatus};
use mltrack_core::dto::experiment::{CreateExperiment, UpdateExperiment};
use mltrack_core::dto::job::{CreateJob, JobFilter, ProgressReport};
use sqlx::SqlitePool;

use crate::clock::{DefaultClock, DynClock};
use crate::config::Config;
use crate::db;
use crate::error::Result;
use crate::service::{experiment_service, job_service};

/// Operations external collaborators may perform on tracked data
#[async_trait]
pub trait ExperimentTracker: Send + Sync {
    /// Creates an experiment with `created_at = updated_at = now`
    async fn create_experiment(&self, req: CreateExperiment) -> Result<Experiment>;

    async fn get_experiment(&self, id: i64) -> Result<Experiment>;

    async fn list_experiments(&self) -> Result<Vec<Experiment>>;

    /// Applies supplied fields and refreshes `updated_at`
    async fn update_experiment(&self, id: i64, req: UpdateExperiment) -> Result<Experiment>;

    /// Removes the experiment and all of its jobs atomically
    async fn delete_experiment(&self, id: i64) -> Result<()>;

    async fn summarize_experiment(&self, id: i64) -> Result<ExperimentSummary>;

    /// Submits a pending job under an existing experiment
    async fn create_job(&self, req: CreateJob) -> Result<Job>;

    async fn get_job(&self, job_id: &str) -> Result<Job>;

    async fn list_jobs(&self, filter: JobFilter) -> Result<Vec<Job>>;

    async fn update_job_status(&self, job_id: &str, status: JobStatus) -> Result<Job>;

    async fn report_progress(&self, job_id: &str, report: ProgressReport) -> Result<Job>;

    async fn delete_job(&self, job_id: &str) -> Result<()>;
}

/// SQLite-backed tracking store
#[derive(Clone)]
pub struct TrackingStore {
    pool: SqlitePool,
    clock: Arc<DynClock>,
}

impl TrackingStore {
    /// Wraps an existing pool; the schema must already be in place
    pub fn new(pool: SqlitePool, clock: Arc<DynClock>) -> Self {
        Self { pool, clock }
    }

    /// Opens the configured database file and creates the schema if absent
    pub async fn open(config: &Config) -> Result<Self> {
        let pool = db::create_pool(config).await?;
        db::run_migrations(&pool).await?;

        tracing::info!(path = %config.database_path.display(), "Tracking store opened");

        Ok(Self::new(pool, Arc::new(DefaultClock)))
    }

    /// Opens a disposable in-memory store
    pub async fn in_memory() -> Result<Self> {
        let pool = db::create_memory_pool().await?;
        db::run_migrations(&pool).await?;

        Ok(Self::new(pool, Arc::new(DefaultClock)))
    }

    /// Replaces the time source
    pub fn with_clock(mut self, clock: Arc<DynClock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn experiment_count(&self) -> Result<u64> {
        experiment_service::count_experiments(&self.pool).await
    }

    pub async fn job_count(&self) -> Result<u64> {
        job_service::count_jobs(&self.pool).await
    }

    /// Waits for checked-out connections and closes the pool
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl ExperimentTracker for TrackingStore {
    async fn create_experiment(&self, req: CreateExperiment) -> Result<Experiment> {
        experiment_service::create_experiment(&self.pool, self.clock.as_ref(), req).await
    }

    async fn get_experiment(&self, id: i64) -> Result<Experiment> {
        experiment_service::get_experiment(&self.pool, id).await
    }

    async fn list_experiments(&self) -> Result<Vec<Experiment>> {
        experiment_service::list_experiments(&self.pool).await
    }

    async fn update_experiment(&self, id: i64, req: UpdateExperiment) -> Result<Experiment> {
        experiment_service::update_experiment(&self.pool, self.clock.as_ref(), id, req).await
    }

    async fn delete_experiment(&self, id: i64) -> Result<()> {
        experiment_service::delete_experiment(&self.pool, id).await
    }

    async fn summarize_experiment(&self, id: i64) -> Result<ExperimentSummary> {
        experiment_service::summarize_experiment(&self.pool, id).await
    }

    async fn create_job(&self, req: CreateJob) -> Result<Job> {
        job_service::create_job(&self.pool, self.clock.as_ref(), req).await
    }

    async fn get_job(&self, job_id: &str) -> Result<Job> {
        job_service::get_job(&self.pool, job_id).await
    }

    async fn list_jobs(&self, filter: JobFilter) -> Result<Vec<Job>> {
        job_service::list_jobs(&self.pool, filter).await
    }

    async fn update_job_status(&self, job_id: &str, status: JobStatus) -> Result<Job> {
        job_service::update_job_status(&self.pool, self.clock.as_ref(), job_id, status).await
    }

    async fn report_progress(&self, job_id: &str, report: ProgressReport) -> Result<Job> {
        job_service::report_progress(&self.pool, job_id, report).await
    }

    async fn delete_job(&self, job_id: &str) -> Result<()> {
        job_service::delete_job(&self.pool, job_id).await
    }
}
