// Worker - Claim / process / retire loop

pub mod constants;
mod shutdown;

use constants::*;
pub use shutdown::{shutdown_channel, ShutdownSender, ShutdownToken};

use crate::domain::error::DomainError;
use crate::domain::{ProcessingResult, QueueEntry, RetireMode, WorkerAssignment};
use crate::error::Result;
use crate::port::{ProgressSink, QueueStore, QueueTransaction, TimeProvider};
use rand::Rng;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Uniform range for the simulated processing latency
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LatencyRange {
    min: Duration,
    max: Duration,
}

impl LatencyRange {
    pub fn new(min: Duration, max: Duration) -> std::result::Result<Self, DomainError> {
        if min > max {
            return Err(DomainError::InvalidLatencyRange {
                min_ms: min.as_millis() as u64,
                max_ms: max.as_millis() as u64,
            });
        }
        Ok(Self { min, max })
    }

    /// No simulated latency at all
    pub fn zero() -> Self {
        Self {
            min: Duration::ZERO,
            max: Duration::ZERO,
        }
    }

    pub fn min(&self) -> Duration {
        self.min
    }

    pub fn max(&self) -> Duration {
        self.max
    }

    pub fn sample(&self) -> Duration {
        if self.min == self.max {
            return self.min;
        }
        rand::thread_rng().gen_range(self.min..=self.max)
    }
}

impl Default for LatencyRange {
    fn default() -> Self {
        Self {
            min: DEFAULT_MIN_PROCESSING_LATENCY,
            max: DEFAULT_MAX_PROCESSING_LATENCY,
        }
    }
}

/// Per-worker tunables shared by the whole pool
#[derive(Debug, Clone, Copy)]
pub struct WorkerSettings {
    pub retire_mode: RetireMode,
    pub idle_backoff: Duration,
    pub processing_latency: LatencyRange,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            retire_mode: RetireMode::default(),
            idle_backoff: DEFAULT_IDLE_BACKOFF,
            processing_latency: LatencyRange::default(),
        }
    }
}

/// Outcome of one claim-process-retire cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// An entry was retired and committed
    Processed(ProcessingResult),
    /// No pending entry of the worker's type
    Empty,
}

/// Counters returned by a worker that exited cleanly
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkerReport {
    pub assignment: WorkerAssignment,
    pub processed: u64,
    pub empty_polls: u64,
}

/// Worker bound to one queue type
pub struct Worker {
    assignment: WorkerAssignment,
    store: Arc<dyn QueueStore>,
    results: mpsc::Sender<ProcessingResult>,
    progress: Arc<dyn ProgressSink>,
    time_provider: Arc<dyn TimeProvider>,
    settings: WorkerSettings,
}

impl Worker {
    pub fn new(
        assignment: WorkerAssignment,
        store: Arc<dyn QueueStore>,
        results: mpsc::Sender<ProcessingResult>,
        progress: Arc<dyn ProgressSink>,
        time_provider: Arc<dyn TimeProvider>,
        settings: WorkerSettings,
    ) -> Self {
        Self {
            assignment,
            store,
            results,
            progress,
            time_provider,
            settings,
        }
    }

    /// Run the worker loop until shutdown
    ///
    /// A store error ends the loop and is returned to the caller; the open
    /// transaction is rolled back first, so no half-retired entry survives.
    pub async fn run(self, mut shutdown: ShutdownToken) -> Result<WorkerReport> {
        let worker_id = self.assignment.worker_id;
        let queue_type = self.assignment.queue_type.clone();
        info!(worker_id, queue_type = %queue_type, "Worker started");

        let mut report = WorkerReport {
            assignment: self.assignment.clone(),
            processed: 0,
            empty_polls: 0,
        };

        loop {
            if shutdown.is_shutdown() {
                break;
            }

            match self.run_cycle().await? {
                CycleOutcome::Processed(result) => {
                    report.processed += 1;
                    if self.results.send(result).await.is_err() {
                        warn!(worker_id, "Result stream closed, stopping worker");
                        break;
                    }
                    self.progress
                        .worker_advanced(&self.assignment, report.processed);
                }
                CycleOutcome::Empty => {
                    report.empty_polls += 1;
                    debug!(worker_id, queue_type = %queue_type, "No pending entries, backing off");
                    tokio::select! {
                        _ = sleep(self.settings.idle_backoff) => {},
                        _ = shutdown.wait() => {
                            debug!(worker_id, "Worker interrupted during backoff");
                            break;
                        }
                    }
                }
            }

            if shutdown.is_shutdown() {
                break;
            }
        }

        info!(
            worker_id,
            queue_type = %queue_type,
            processed = report.processed,
            empty_polls = report.empty_polls,
            "Worker stopped"
        );
        Ok(report)
    }

    /// One claim-process-retire cycle in a single transaction
    pub async fn run_cycle(&self) -> Result<CycleOutcome> {
        let mut tx = self.store.begin().await?;

        let entry = match tx.claim_next(&self.assignment.queue_type).await {
            Ok(Some(entry)) => entry,
            Ok(None) => {
                tx.rollback().await?;
                return Ok(CycleOutcome::Empty);
            }
            Err(e) => {
                abandon(tx).await;
                return Err(e);
            }
        };

        let latency = self.settings.processing_latency.sample();
        if !latency.is_zero() {
            sleep(latency).await;
        }

        let retired_at = self.time_provider.now();
        if let Err(e) = tx
            .retire(&entry, self.settings.retire_mode, retired_at)
            .await
        {
            abandon(tx).await;
            return Err(e);
        }
        tx.commit().await?;

        Ok(CycleOutcome::Processed(self.result_for(&entry)))
    }

    fn result_for(&self, entry: &QueueEntry) -> ProcessingResult {
        ProcessingResult::for_entry(entry, self.assignment.worker_id, self.time_provider.now())
    }
}

/// Roll back after a failed step; the step's own error is what gets reported
async fn abandon(tx: Box<dyn QueueTransaction>) {
    if let Err(e) = tx.rollback().await {
        warn!(error = %e, "Rollback after failed claim cycle also failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{QueueType, QueueTypeSet};
    use crate::port::progress::mocks::RecordingProgress;
    use crate::port::queue_store::mocks::InMemoryQueueStore;
    use crate::port::SystemTimeProvider;
    use chrono::Utc;

    fn entry(id: i64, tag: &str) -> QueueEntry {
        QueueEntry::new(id, 1, QueueType::new(tag).unwrap(), Utc::now())
    }

    fn worker_for(
        worker_id: usize,
        store: &InMemoryQueueStore,
        progress: Arc<RecordingProgress>,
        results: mpsc::Sender<ProcessingResult>,
        settings: WorkerSettings,
    ) -> Worker {
        let assignment = QueueTypeSet::default()
            .assign_round_robin(worker_id + 1)
            .pop()
            .unwrap();
        Worker::new(
            assignment,
            Arc::new(store.clone()),
            results,
            progress,
            Arc::new(SystemTimeProvider),
            settings,
        )
    }

    fn fast_settings(mode: RetireMode) -> WorkerSettings {
        WorkerSettings {
            retire_mode: mode,
            idle_backoff: Duration::from_millis(20),
            processing_latency: LatencyRange::zero(),
        }
    }

    #[tokio::test]
    async fn test_cycle_claims_only_assigned_type() {
        let store = InMemoryQueueStore::with_entries(vec![entry(1, "type2"), entry(2, "type1")]);
        let (tx, _rx) = mpsc::channel(10);
        let worker = worker_for(
            0,
            &store,
            Arc::new(RecordingProgress::new()),
            tx,
            fast_settings(RetireMode::Delete),
        );

        match worker.run_cycle().await.unwrap() {
            CycleOutcome::Processed(result) => {
                assert_eq!(result.entry_id, 2);
                assert_eq!(result.queue_type.as_str(), "type1");
                assert_eq!(result.worker_id, 0);
            }
            other => panic!("expected a processed entry, got {:?}", other),
        }
        assert_eq!(worker.run_cycle().await.unwrap(), CycleOutcome::Empty);
        assert_eq!(store.entries().len(), 1, "type2 entry untouched");
    }

    #[tokio::test]
    async fn test_failed_claim_is_reported_and_leaves_store_intact() {
        let store = InMemoryQueueStore::with_entries(vec![entry(1, "type1")]);
        store.fail_next_claims(1);
        let (tx, _rx) = mpsc::channel(10);
        let worker = worker_for(
            0,
            &store,
            Arc::new(RecordingProgress::new()),
            tx,
            fast_settings(RetireMode::Delete),
        );
        let (_shutdown_tx, token) = shutdown_channel();

        let err = worker.run(token).await.unwrap_err();
        assert!(err.is_store());
        assert_eq!(store.count_pending(None).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_run_emits_results_and_stops_on_shutdown() {
        let store = InMemoryQueueStore::with_entries((1..=5).map(|id| entry(id, "type1")));
        let progress = Arc::new(RecordingProgress::new());
        let (tx, mut rx) = mpsc::channel(10);
        let worker = worker_for(
            0,
            &store,
            progress.clone(),
            tx,
            fast_settings(RetireMode::MarkProcessed),
        );
        let (shutdown_tx, token) = shutdown_channel();
        let handle = tokio::spawn(worker.run(token));

        let mut ids = Vec::new();
        for _ in 0..5 {
            ids.push(rx.recv().await.unwrap().entry_id);
        }
        shutdown_tx.shutdown();

        let report = handle.await.unwrap().unwrap();
        assert_eq!(ids, vec![1, 2, 3, 4, 5], "oldest first within one worker");
        assert_eq!(report.processed, 5);
        assert_eq!(progress.worker_total(0), 5);
        assert_eq!(store.count_pending(None).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_closed_stream_stops_worker_without_progress() {
        let store = InMemoryQueueStore::with_entries((1..=3).map(|id| entry(id, "type1")));
        let progress = Arc::new(RecordingProgress::new());
        let (tx, rx) = mpsc::channel(10);
        drop(rx);
        let worker = worker_for(
            0,
            &store,
            progress.clone(),
            tx,
            fast_settings(RetireMode::Delete),
        );
        let (_shutdown_tx, token) = shutdown_channel();

        let report = worker.run(token).await.unwrap();
        // the first entry was committed before the send failed
        assert_eq!(report.processed, 1);
        assert_eq!(progress.worker_total(0), 0);
        assert_eq!(store.count_pending(None).await.unwrap(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_claim_backs_off_a_full_interval() {
        let store = InMemoryQueueStore::new();
        let (tx, _rx) = mpsc::channel(10);
        let settings = WorkerSettings {
            idle_backoff: Duration::from_secs(1),
            ..fast_settings(RetireMode::Delete)
        };
        let worker = worker_for(0, &store, Arc::new(RecordingProgress::new()), tx, settings);
        let (shutdown_tx, token) = shutdown_channel();
        let handle = tokio::spawn(worker.run(token));

        sleep(Duration::from_millis(3500)).await;
        // claims at t=0s, 1s, 2s, 3s
        assert_eq!(store.claim_attempts(), 4);

        shutdown_tx.shutdown();
        let report = handle.await.unwrap().unwrap();
        assert_eq!(report.processed, 0);
        assert_eq!(report.empty_polls, 4);
    }

    #[tokio::test]
    async fn test_workers_sharing_a_type_never_double_process() {
        let store = InMemoryQueueStore::with_entries((1..=40).map(|id| entry(id, "type1")));
        let progress = Arc::new(RecordingProgress::new());
        let (tx, mut rx) = mpsc::channel(10);
        let (shutdown_tx, token) = shutdown_channel();

        let mut handles = Vec::new();
        for worker_id in [0, 3, 6] {
            let worker = worker_for(
                worker_id,
                &store,
                progress.clone(),
                tx.clone(),
                WorkerSettings {
                    processing_latency: LatencyRange::new(
                        Duration::ZERO,
                        Duration::from_millis(2),
                    )
                    .unwrap(),
                    ..fast_settings(RetireMode::Delete)
                },
            );
            handles.push(tokio::spawn(worker.run(token.clone())));
        }
        drop(tx);

        let mut seen = std::collections::HashSet::new();
        while seen.len() < 40 {
            let result = rx.recv().await.unwrap();
            assert!(seen.insert(result.entry_id), "entry {} processed twice", result.entry_id);
        }
        shutdown_tx.shutdown();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        assert!(rx.recv().await.is_none());
        assert!(store.entries().is_empty());
    }

    #[test]
    fn test_latency_range_validation() {
        assert!(LatencyRange::new(Duration::from_millis(5), Duration::from_millis(1)).is_err());
        let range = LatencyRange::new(Duration::from_millis(1), Duration::from_millis(10)).unwrap();
        for _ in 0..100 {
            let d = range.sample();
            assert!(d >= range.min() && d <= range.max());
        }
    }
}
