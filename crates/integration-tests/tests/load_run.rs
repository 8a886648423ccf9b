//! End-to-end load runs against a real SQLite store

use queuebench_core::application::{
    FailurePolicy, HarnessConfig, LatencyRange, LoadHarness, ProducerMode, RunOutcome,
    WorkerSettings,
};
use queuebench_core::domain::{ProcessingResult, QueueTypeSet, RetireMode, WorkerAssignment};
use queuebench_core::port::{ProgressSink, QueueStore};
use queuebench_infra_sqlite::{create_pool, load_schema, SqliteQueueStore, SCHEMA};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

async fn sqlite_store() -> (TempDir, Arc<SqliteQueueStore>) {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}", dir.path().join("queue.db").display());
    let pool = create_pool(&url, 10).await.unwrap();
    load_schema(&pool, SCHEMA).await.unwrap();
    (dir, Arc::new(SqliteQueueStore::new(pool)))
}

fn quick_config(total: u64, workers: usize, retire_mode: RetireMode) -> HarnessConfig {
    HarnessConfig {
        total,
        workers,
        worker: WorkerSettings {
            retire_mode,
            idle_backoff: Duration::from_millis(20),
            processing_latency: LatencyRange::new(Duration::ZERO, Duration::from_millis(2))
                .unwrap(),
        },
        ..HarnessConfig::default()
    }
}

/// Collects every counted result
#[derive(Default)]
struct Collector {
    results: Mutex<Vec<ProcessingResult>>,
}

impl ProgressSink for Collector {
    fn entries_enqueued(&self, _count: u64) {}
    fn worker_advanced(&self, _assignment: &WorkerAssignment, _processed: u64) {}
    fn result_recorded(&self, result: &ProcessingResult, _completed: u64, _target: u64) {
        self.results.lock().unwrap().push(result.clone());
    }
}

/// target=50, workers=3, types={type1,type2,type3}
#[tokio::test]
async fn test_bulk_run_end_to_end() {
    let (_dir, store) = sqlite_store().await;
    let collector = Arc::new(Collector::default());

    let summary = LoadHarness::new(store.clone(), quick_config(50, 3, RetireMode::MarkProcessed))
        .with_progress(collector.clone())
        .run()
        .await
        .unwrap();

    assert_eq!(summary.outcome, RunOutcome::Completed);
    assert_eq!(summary.completed, 50);
    assert_eq!(store.count_pending(None).await.unwrap(), 0);

    let assignments = QueueTypeSet::default().assign_round_robin(3);
    let results = collector.results.lock().unwrap();
    assert_eq!(results.len(), 50);
    for result in results.iter() {
        assert_eq!(result.queue_type, assignments[result.worker_id].queue_type);
    }
}

/// Two workers per type: no duplicates, no losses
#[tokio::test]
async fn test_shared_type_workers_process_each_entry_once() {
    let (_dir, store) = sqlite_store().await;
    let collector = Arc::new(Collector::default());

    let summary = LoadHarness::new(store.clone(), quick_config(120, 6, RetireMode::Delete))
        .with_progress(collector.clone())
        .run()
        .await
        .unwrap();

    assert_eq!(summary.completed, 120);
    let results = collector.results.lock().unwrap();
    let ids: HashSet<i64> = results.iter().map(|r| r.entry_id).collect();
    assert_eq!(ids.len(), 120, "an entry was processed twice");
    assert_eq!(store.max_entry_id().await.unwrap(), None, "delete mode empties the table");
}

/// A second run against the same table continues the id sequence
#[tokio::test]
async fn test_rerun_on_non_empty_table() {
    let (_dir, store) = sqlite_store().await;

    LoadHarness::new(store.clone(), quick_config(10, 3, RetireMode::MarkProcessed))
        .run()
        .await
        .unwrap();
    let summary = LoadHarness::new(store.clone(), quick_config(10, 3, RetireMode::MarkProcessed))
        .run()
        .await
        .unwrap();

    assert_eq!(summary.completed, 10);
    assert_eq!(store.max_entry_id().await.unwrap(), Some(20));
    assert_eq!(store.count_pending(None).await.unwrap(), 0);
}

/// Every type needs a worker, otherwise its entries would never drain
#[tokio::test]
async fn test_uncovered_queue_type_rejected_before_fill() {
    let (_dir, store) = sqlite_store().await;

    let err = LoadHarness::new(store.clone(), quick_config(10, 2, RetireMode::Delete))
        .run()
        .await
        .unwrap_err();
    assert!(err.to_string().contains("cannot cover"));
    assert_eq!(store.max_entry_id().await.unwrap(), None);

    let narrowed = HarnessConfig {
        queue_types: QueueTypeSet::parse_list("type1,type2").unwrap(),
        ..quick_config(10, 2, RetireMode::Delete)
    };
    let summary = LoadHarness::new(store.clone(), narrowed).run().await.unwrap();
    assert_eq!(summary.completed, 10);
    assert_eq!(store.count_pending(None).await.unwrap(), 0);
}

/// Rate-limited producer feeds workers while they run
#[tokio::test]
async fn test_rate_limited_run_completes() {
    let (_dir, store) = sqlite_store().await;
    let config = HarnessConfig {
        producer: ProducerMode::RateLimited { per_second: 100.0 },
        failure_policy: FailurePolicy::AbortAll,
        ..quick_config(30, 3, RetireMode::Delete)
    };

    let summary = LoadHarness::new(store.clone(), config).run().await.unwrap();

    assert_eq!(summary.outcome, RunOutcome::Completed);
    assert_eq!(summary.completed, 30);
    assert!(summary.enqueued >= 30);
    let pending = store.count_pending(None).await.unwrap() as u64;
    assert_eq!(
        summary.enqueued,
        summary.completed + summary.late_results + pending
    );
}
