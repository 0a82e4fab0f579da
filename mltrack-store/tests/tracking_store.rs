//! End-to-end behaviour of the tracking store against real SQLite databases.

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use mltrack_core::domain::job::JobStatus;
use mltrack_core::dto::experiment::{CreateExperiment, UpdateExperiment};
use mltrack_core::dto::job::{CreateJob, JobFilter, ProgressReport};
use mltrack_store::clock::ManualClock;
use mltrack_store::{Config, ExperimentTracker, StoreError, TrackingStore};
use mockable::Clock;
use serde_json::{Map, Value, json};

fn params(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("parameters must be an object, got {other}"),
    }
}

async fn store_with_clock() -> (TrackingStore, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2025, 1, 1, 9, 0, 0).unwrap(),
    ));
    let store = TrackingStore::in_memory()
        .await
        .unwrap()
        .with_clock(clock.clone());
    (store, clock)
}

async fn experiment(store: &TrackingStore, name: &str) -> i64 {
    store
        .create_experiment(CreateExperiment::new(name))
        .await
        .unwrap()
        .id
}

fn cnn_job(experiment_id: i64, job_id: &str) -> CreateJob {
    CreateJob::new(experiment_id, "run", "cnn", params(json!({"lr": 0.01}))).with_job_id(job_id)
}

#[tokio::test]
async fn test_training_lifecycle_scenario() {
    let (store, clock) = store_with_clock().await;
    let exp = experiment(&store, "exp1").await;

    let job = store.create_job(cnn_job(exp, "j1")).await.unwrap();
    assert_eq!(job.status, JobStatus::Pending);
    assert_eq!(job.epochs_completed, 0);
    assert_eq!(job.parameters, params(json!({"lr": 0.01})));
    assert!(job.started_at.is_none());
    assert!(job.completed_at.is_none());

    clock.advance_seconds(10);
    let job = store
        .update_job_status("j1", JobStatus::Running)
        .await
        .unwrap();
    let started_at = job.started_at.expect("started_at set on start");
    assert_eq!(started_at, clock.utc());

    let job = store
        .report_progress("j1", ProgressReport::new(5).with_accuracy(0.8))
        .await
        .unwrap();
    assert_eq!(job.epochs_completed, 5);
    assert_eq!(job.best_accuracy, Some(0.8));

    let job = store
        .report_progress("j1", ProgressReport::new(3))
        .await
        .unwrap();
    assert_eq!(job.epochs_completed, 5);
    assert_eq!(store.get_job("j1").await.unwrap().epochs_completed, 5);

    clock.advance_seconds(90);
    let job = store
        .update_job_status("j1", JobStatus::Completed)
        .await
        .unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.started_at, Some(started_at));
    assert_eq!(job.completed_at, Some(clock.utc()));
    assert_eq!(job.total_time, Some(90.0));

    store.delete_experiment(exp).await.unwrap();
    assert!(store.get_job("j1").await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_duplicate_job_id_conflicts_without_new_row() {
    let (store, _clock) = store_with_clock().await;
    let exp = experiment(&store, "exp1").await;

    store.create_job(cnn_job(exp, "j1")).await.unwrap();

    let err = store.create_job(cnn_job(exp, "j1")).await.unwrap_err();
    assert!(err.is_conflict(), "unexpected error: {err}");
    assert_eq!(store.job_count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_job_id_never_reused_after_deletion() {
    let (store, _clock) = store_with_clock().await;

    let first = experiment(&store, "exp1").await;
    store.create_job(cnn_job(first, "j1")).await.unwrap();
    store.create_job(cnn_job(first, "j2")).await.unwrap();

    store.delete_job("j2").await.unwrap();
    store.delete_experiment(first).await.unwrap();

    let second = experiment(&store, "exp2").await;
    for token in ["j1", "j2"] {
        let err = store.create_job(cnn_job(second, token)).await.unwrap_err();
        assert!(err.is_conflict(), "{token} was reissued");
    }
    assert_eq!(store.job_count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_generated_job_ids_are_unique() {
    let (store, _clock) = store_with_clock().await;
    let exp = experiment(&store, "exp1").await;

    let mut seen = std::collections::HashSet::new();
    for _ in 0..20 {
        let req = CreateJob::new(exp, "auto", "mlp", params(json!({"epochs": 10})));
        let job = store.create_job(req).await.unwrap();
        assert!(seen.insert(job.job_id));
    }
}

#[tokio::test]
async fn test_create_job_requires_existing_experiment() {
    let (store, _clock) = store_with_clock().await;

    let err = store.create_job(cnn_job(404, "j1")).await.unwrap_err();
    assert!(err.is_not_found(), "unexpected error: {err}");

    // The failed attempt must not burn the token
    let exp = experiment(&store, "exp1").await;
    store.create_job(cnn_job(exp, "j1")).await.unwrap();
}

#[tokio::test]
async fn test_validation_errors() {
    let (store, _clock) = store_with_clock().await;

    let err = store
        .create_experiment(CreateExperiment::new(""))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Validation(_)));

    let exp = experiment(&store, "exp1").await;
    let err = store
        .create_job(CreateJob::new(exp, "run", "", Map::new()))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Validation(_)));

    store.create_job(cnn_job(exp, "j1")).await.unwrap();
    store
        .update_job_status("j1", JobStatus::Running)
        .await
        .unwrap();
    let err = store
        .report_progress("j1", ProgressReport::new(1).with_accuracy(f64::NAN))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Validation(_)));

    assert_eq!(store.job_count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_delete_experiment_cascades_to_all_jobs() {
    let (store, _clock) = store_with_clock().await;
    let doomed = experiment(&store, "doomed").await;
    let kept = experiment(&store, "kept").await;

    for i in 0..5 {
        store
            .create_job(cnn_job(doomed, &format!("doomed-{i}")))
            .await
            .unwrap();
    }
    store.create_job(cnn_job(kept, "kept-0")).await.unwrap();
    store
        .update_job_status("doomed-0", JobStatus::Running)
        .await
        .unwrap();

    store.delete_experiment(doomed).await.unwrap();

    let orphans: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM jobs WHERE experiment_id = $1")
        .bind(doomed)
        .fetch_one(store.pool())
        .await
        .unwrap();
    assert_eq!(orphans, 0);

    assert!(store.get_experiment(doomed).await.unwrap_err().is_not_found());
    assert!(
        store
            .list_jobs(JobFilter::for_experiment(doomed))
            .await
            .unwrap_err()
            .is_not_found()
    );

    let remaining = store.list_jobs(JobFilter::default()).await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].job_id, "kept-0");

    assert!(store.delete_experiment(doomed).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_terminal_states_reject_every_transition() {
    let (store, _clock) = store_with_clock().await;
    let exp = experiment(&store, "exp1").await;

    for (token, terminal) in [("done", JobStatus::Completed), ("broken", JobStatus::Failed)] {
        store.create_job(cnn_job(exp, token)).await.unwrap();
        store
            .update_job_status(token, JobStatus::Running)
            .await
            .unwrap();
        let before = store.update_job_status(token, terminal).await.unwrap();
        assert!(before.completed_at.is_some());

        for target in JobStatus::ALL {
            let err = store.update_job_status(token, target).await.unwrap_err();
            assert!(err.is_invalid_transition(), "{terminal} -> {target}: {err}");
            assert_eq!(store.get_job(token).await.unwrap(), before);
        }
    }
}

#[tokio::test]
async fn test_illegal_transitions_from_pending_and_running() {
    let (store, clock) = store_with_clock().await;
    let exp = experiment(&store, "exp1").await;
    store.create_job(cnn_job(exp, "j1")).await.unwrap();

    for target in [JobStatus::Pending, JobStatus::Completed, JobStatus::Failed] {
        let err = store.update_job_status("j1", target).await.unwrap_err();
        assert!(err.is_invalid_transition());
    }

    let running = store
        .update_job_status("j1", JobStatus::Running)
        .await
        .unwrap();

    clock.advance_seconds(30);
    for target in [JobStatus::Pending, JobStatus::Running] {
        let err = store.update_job_status("j1", target).await.unwrap_err();
        assert!(err.is_invalid_transition());
    }

    // started_at is stamped once and survives the rejected calls
    assert_eq!(
        store.get_job("j1").await.unwrap().started_at,
        running.started_at
    );

    let err = store
        .update_job_status("missing", JobStatus::Running)
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_failed_job_records_completion() {
    let (store, clock) = store_with_clock().await;
    let exp = experiment(&store, "exp1").await;
    store.create_job(cnn_job(exp, "j1")).await.unwrap();
    store
        .update_job_status("j1", JobStatus::Running)
        .await
        .unwrap();

    clock.advance_seconds(12);
    let job = store
        .update_job_status("j1", JobStatus::Failed)
        .await
        .unwrap();

    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.total_time, Some(12.0));
    assert!(job.started_at <= job.completed_at);
}

#[tokio::test]
async fn test_completion_never_precedes_start() {
    let (store, clock) = store_with_clock().await;
    let exp = experiment(&store, "exp1").await;
    store.create_job(cnn_job(exp, "j1")).await.unwrap();
    store
        .update_job_status("j1", JobStatus::Running)
        .await
        .unwrap();

    // Clock steps backwards
    clock.advance_seconds(-60);
    let job = store
        .update_job_status("j1", JobStatus::Completed)
        .await
        .unwrap();

    assert_eq!(job.completed_at, job.started_at);
    assert_eq!(job.total_time, Some(0.0));
}

#[tokio::test]
async fn test_progress_requires_running_job() {
    let (store, _clock) = store_with_clock().await;
    let exp = experiment(&store, "exp1").await;
    store.create_job(cnn_job(exp, "j1")).await.unwrap();

    let err = store
        .report_progress("j1", ProgressReport::new(1))
        .await
        .unwrap_err();
    assert!(
        matches!(
            err,
            StoreError::InvalidState {
                status: JobStatus::Pending,
                expected: JobStatus::Running,
                ..
            }
        ),
        "unexpected error: {err}"
    );

    store
        .update_job_status("j1", JobStatus::Running)
        .await
        .unwrap();
    store
        .update_job_status("j1", JobStatus::Completed)
        .await
        .unwrap();

    let err = store
        .report_progress("j1", ProgressReport::new(2))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        StoreError::InvalidState {
            status: JobStatus::Completed,
            ..
        }
    ));
    assert_eq!(store.get_job("j1").await.unwrap().epochs_completed, 0);

    let err = store
        .report_progress("missing", ProgressReport::new(1))
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_progress_appends_history_and_keeps_best_accuracy() {
    let (store, _clock) = store_with_clock().await;
    let exp = experiment(&store, "exp1").await;
    store.create_job(cnn_job(exp, "j1")).await.unwrap();
    store
        .update_job_status("j1", JobStatus::Running)
        .await
        .unwrap();

    let reports = [
        ProgressReport::new(1)
            .with_accuracy(0.61)
            .with_history_entry(json!({"epoch": 1, "loss": 1.2})),
        ProgressReport::new(2)
            .with_accuracy(0.74)
            .with_history_entry(json!({"epoch": 2, "loss": 0.9})),
        ProgressReport::new(3)
            .with_accuracy(0.70)
            .with_history_entry(json!({"epoch": 3, "loss": 0.95})),
        // No accuracy and no history: neither is cleared
        ProgressReport::new(4),
    ];

    let mut last = None;
    for report in reports {
        last = Some(store.report_progress("j1", report).await.unwrap());
    }
    let job = last.unwrap();

    assert_eq!(job.epochs_completed, 4);
    assert_eq!(job.best_accuracy, Some(0.74));
    assert_eq!(
        job.history,
        Some(vec![
            json!({"epoch": 1, "loss": 1.2}),
            json!({"epoch": 2, "loss": 0.9}),
            json!({"epoch": 3, "loss": 0.95}),
        ])
    );
    assert_eq!(store.get_job("j1").await.unwrap(), job);
}

#[tokio::test]
async fn test_update_experiment_touches_only_supplied_fields() {
    let (store, clock) = store_with_clock().await;
    let created = store
        .create_experiment(CreateExperiment::new("exp1").with_description("first try"))
        .await
        .unwrap();
    assert_eq!(created.created_at, created.updated_at);

    clock.advance_seconds(60);
    let renamed = store
        .update_experiment(
            created.id,
            UpdateExperiment {
                name: Some("exp1-renamed".to_string()),
                description: None,
            },
        )
        .await
        .unwrap();

    assert_eq!(renamed.name, "exp1-renamed");
    assert_eq!(renamed.description.as_deref(), Some("first try"));
    assert_eq!(renamed.created_at, created.created_at);
    assert_eq!(renamed.updated_at, clock.utc());

    // Job activity underneath does not count as an experiment mutation
    clock.advance_seconds(60);
    store.create_job(cnn_job(created.id, "j1")).await.unwrap();
    store
        .update_job_status("j1", JobStatus::Running)
        .await
        .unwrap();
    assert_eq!(
        store.get_experiment(created.id).await.unwrap().updated_at,
        renamed.updated_at
    );

    let err = store
        .update_experiment(
            created.id,
            UpdateExperiment {
                name: Some(String::new()),
                description: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Validation(_)));

    let err = store
        .update_experiment(999, UpdateExperiment::default())
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_update_experiment_sets_and_clears_description() {
    let (store, _clock) = store_with_clock().await;
    let created = store
        .create_experiment(CreateExperiment::new("exp1").with_description("d"))
        .await
        .unwrap();

    let kept = store
        .update_experiment(created.id, UpdateExperiment::default())
        .await
        .unwrap();
    assert_eq!(kept.description.as_deref(), Some("d"));

    let replaced = store
        .update_experiment(created.id, UpdateExperiment::default().with_description("e"))
        .await
        .unwrap();
    assert_eq!(replaced.description.as_deref(), Some("e"));

    let cleared = store
        .update_experiment(created.id, UpdateExperiment::default().clear_description())
        .await
        .unwrap();
    assert!(cleared.description.is_none());
    assert_eq!(cleared.name, "exp1");
    assert!(
        store
            .get_experiment(created.id)
            .await
            .unwrap()
            .description
            .is_none()
    );
}

#[tokio::test]
async fn test_duplicate_experiment_names_allowed() {
    let (store, _clock) = store_with_clock().await;
    let a = experiment(&store, "same").await;
    let b = experiment(&store, "same").await;
    assert_ne!(a, b);

    let names: Vec<String> = store
        .list_experiments()
        .await
        .unwrap()
        .into_iter()
        .map(|e| e.name)
        .collect();
    assert_eq!(names, vec!["same", "same"]);
}

#[tokio::test]
async fn test_list_jobs_filters_and_orders() {
    let (store, clock) = store_with_clock().await;
    let a = experiment(&store, "a").await;
    let b = experiment(&store, "b").await;

    for token in ["a1", "a2", "a3"] {
        store.create_job(cnn_job(a, token)).await.unwrap();
        clock.advance_seconds(1);
    }
    store.create_job(cnn_job(b, "b1")).await.unwrap();
    store
        .update_job_status("a2", JobStatus::Running)
        .await
        .unwrap();

    let tokens = |jobs: Vec<mltrack_core::domain::job::Job>| -> Vec<String> {
        jobs.into_iter().map(|j| j.job_id).collect()
    };

    let all = store.list_jobs(JobFilter::default()).await.unwrap();
    assert_eq!(tokens(all), vec!["a1", "a2", "a3", "b1"]);

    let only_a = store.list_jobs(JobFilter::for_experiment(a)).await.unwrap();
    assert_eq!(tokens(only_a), vec!["a1", "a2", "a3"]);

    let newest = store
        .list_jobs(JobFilter::for_experiment(a).newest_first().with_limit(2))
        .await
        .unwrap();
    assert_eq!(tokens(newest), vec!["a3", "a2"]);

    let running = store
        .list_jobs(JobFilter::default().with_status(JobStatus::Running))
        .await
        .unwrap();
    assert_eq!(tokens(running), vec!["a2"]);

    // Listing is restartable: a second pass yields the same sequence
    let again = store.list_jobs(JobFilter::for_experiment(a)).await.unwrap();
    assert_eq!(tokens(again), vec!["a1", "a2", "a3"]);
}

#[tokio::test]
async fn test_summarize_experiment() {
    let (store, _clock) = store_with_clock().await;
    let exp = experiment(&store, "exp1").await;

    for token in ["p", "r", "c1", "c2", "f"] {
        store.create_job(cnn_job(exp, token)).await.unwrap();
    }
    for token in ["r", "c1", "c2", "f"] {
        store
            .update_job_status(token, JobStatus::Running)
            .await
            .unwrap();
    }
    store
        .report_progress("c1", ProgressReport::new(3).with_accuracy(0.9))
        .await
        .unwrap();
    store
        .report_progress("r", ProgressReport::new(1).with_accuracy(0.4))
        .await
        .unwrap();
    for token in ["c1", "c2"] {
        store
            .update_job_status(token, JobStatus::Completed)
            .await
            .unwrap();
    }
    store
        .update_job_status("f", JobStatus::Failed)
        .await
        .unwrap();

    let summary = store.summarize_experiment(exp).await.unwrap();
    assert_eq!(summary.experiment.name, "exp1");
    assert_eq!(summary.jobs.pending, 1);
    assert_eq!(summary.jobs.running, 1);
    assert_eq!(summary.jobs.completed, 2);
    assert_eq!(summary.jobs.failed, 1);
    assert_eq!(summary.jobs.total(), 5);
    assert_eq!(summary.best_accuracy, Some(0.9));

    let empty = experiment(&store, "empty").await;
    let summary = store.summarize_experiment(empty).await.unwrap();
    assert_eq!(summary.jobs.total(), 0);
    assert!(summary.best_accuracy.is_none());
}

#[tokio::test]
async fn test_open_creates_directory_and_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("deeper").join("tracking.sqlite");
    let config = Config::new(&path);

    let store = TrackingStore::open(&config).await.unwrap();
    let exp = experiment(&store, "persisted").await;
    store.create_job(cnn_job(exp, "j1")).await.unwrap();
    store.close().await;

    assert!(path.exists());

    // Second open re-runs the schema bootstrap over existing data
    let store = TrackingStore::open(&config).await.unwrap();
    assert_eq!(store.experiment_count().await.unwrap(), 1);
    assert_eq!(store.get_job("j1").await.unwrap().experiment_id, exp);
    store.close().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_progress_reports_serialize() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::new(dir.path().join("concurrent.sqlite"));
    let store = TrackingStore::open(&config).await.unwrap();

    let exp = experiment(&store, "exp1").await;
    store.create_job(cnn_job(exp, "shared")).await.unwrap();
    store.create_job(cnn_job(exp, "other")).await.unwrap();
    for token in ["shared", "other"] {
        store
            .update_job_status(token, JobStatus::Running)
            .await
            .unwrap();
    }

    const WORKERS: u32 = 8;
    const REPORTS: u32 = 10;

    let mut handles = Vec::new();
    for worker in 0..WORKERS {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            let mut observed = Vec::new();
            for step in 0..REPORTS {
                let epoch = step * WORKERS + worker;
                let report = ProgressReport::new(epoch)
                    .with_history_entry(json!({"worker": worker, "step": step}));
                let job = store.report_progress("shared", report).await.unwrap();
                observed.push(job.epochs_completed);

                store
                    .report_progress("other", ProgressReport::new(step))
                    .await
                    .unwrap();
            }
            observed
        }));
    }

    for handle in handles {
        let observed = handle.await.unwrap();
        assert!(
            observed.windows(2).all(|w| w[0] <= w[1]),
            "epochs went backwards: {observed:?}"
        );
    }

    let shared = store.get_job("shared").await.unwrap();
    assert_eq!(shared.epochs_completed, WORKERS * REPORTS - 1);
    assert_eq!(
        shared.history.map(|h| h.len()),
        Some((WORKERS * REPORTS) as usize)
    );

    let other = store.get_job("other").await.unwrap();
    assert_eq!(other.epochs_completed, REPORTS - 1);

    store.close().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_starts_admit_one_winner() {
    let dir = tempfile::tempdir().unwrap();
    let store = TrackingStore::open(&Config::new(dir.path().join("starts.sqlite")))
        .await
        .unwrap();

    let exp = experiment(&store, "exp1").await;
    store.create_job(cnn_job(exp, "j1")).await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..32 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            store.update_job_status("j1", JobStatus::Running).await
        }));
    }

    let mut started = Vec::new();
    for handle in handles {
        match handle.await.unwrap() {
            Ok(job) => started.push(job),
            Err(err) => assert!(err.is_invalid_transition(), "unexpected error: {err}"),
        }
    }

    assert_eq!(started.len(), 1);
    let job = store.get_job("j1").await.unwrap();
    assert_eq!(job.status, JobStatus::Running);
    assert_eq!(job.started_at, started[0].started_at);

    store.close().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_finishes_admit_one_terminal_status() {
    let dir = tempfile::tempdir().unwrap();
    let store = TrackingStore::open(&Config::new(dir.path().join("finishes.sqlite")))
        .await
        .unwrap();

    let exp = experiment(&store, "exp1").await;
    store.create_job(cnn_job(exp, "j1")).await.unwrap();
    store
        .update_job_status("j1", JobStatus::Running)
        .await
        .unwrap();

    let mut handles = Vec::new();
    for i in 0..16 {
        let store = store.clone();
        let target = if i % 2 == 0 {
            JobStatus::Completed
        } else {
            JobStatus::Failed
        };
        handles.push(tokio::spawn(async move {
            store.update_job_status("j1", target).await
        }));
    }

    let mut winners = Vec::new();
    for handle in handles {
        match handle.await.unwrap() {
            Ok(job) => winners.push(job.status),
            Err(err) => assert!(err.is_invalid_transition(), "unexpected error: {err}"),
        }
    }

    assert_eq!(winners.len(), 1);
    assert_eq!(store.get_job("j1").await.unwrap().status, winners[0]);

    store.close().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_creates_with_one_job_id() {
    let dir = tempfile::tempdir().unwrap();
    let store = TrackingStore::open(&Config::new(dir.path().join("creates.sqlite")))
        .await
        .unwrap();

    let exp = experiment(&store, "exp1").await;

    let mut handles = Vec::new();
    for _ in 0..32 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            store.create_job(cnn_job(exp, "shared")).await
        }));
    }

    let mut created = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => created += 1,
            Err(err) => assert!(err.is_conflict(), "unexpected error: {err}"),
        }
    }

    assert_eq!(created, 1);
    assert_eq!(store.job_count().await.unwrap(), 1);

    store.close().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_progress_racing_start_is_never_applied_to_pending_job() {
    let dir = tempfile::tempdir().unwrap();
    let store = TrackingStore::open(&Config::new(dir.path().join("race.sqlite")))
        .await
        .unwrap();

    let exp = experiment(&store, "exp1").await;
    store.create_job(cnn_job(exp, "j1")).await.unwrap();

    let mut handles = Vec::new();
    for epoch in 1..=16 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            store
                .report_progress("j1", ProgressReport::new(epoch))
                .await
                .map(|job| job.epochs_completed)
        }));
    }
    store
        .update_job_status("j1", JobStatus::Running)
        .await
        .unwrap();

    let mut applied = Vec::new();
    for handle in handles {
        match handle.await.unwrap() {
            Ok(epochs) => applied.push(epochs),
            Err(err) => assert!(
                matches!(
                    err,
                    StoreError::InvalidState {
                        status: JobStatus::Pending,
                        ..
                    }
                ),
                "unexpected error: {err}"
            ),
        }
    }

    let job = store.get_job("j1").await.unwrap();
    assert_eq!(job.epochs_completed, applied.iter().copied().max().unwrap_or(0));

    store.close().await;
}
