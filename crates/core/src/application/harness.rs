// Load Harness - wires producer, workers, aggregator and supervisor

use crate::application::aggregator::{ResultAggregator, Tally};
use crate::application::producer::{
    BulkFiller, EntryFactory, ProducerMode, RateLimitedFiller,
};
use crate::application::supervisor::{
    Decision, FailurePolicy, FailureRecord, Supervisor, TaskKind, TaskReport,
};
use crate::application::worker::constants::{
    DEFAULT_CORRELATION_IDS, DEFAULT_POOL_SAMPLE_EVERY, DEFAULT_RESULT_BUFFER,
};
use crate::application::worker::{shutdown_channel, Worker, WorkerReport, WorkerSettings};
use crate::domain::{CorrelationId, QueueTypeSet, RetireMode};
use crate::error::{AppError, Result};
use crate::port::{
    NoopProgress, ProgressSink, QueueStore, SequentialIdProvider, SystemTimeProvider,
    TimeProvider,
};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// Validated run parameters
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    /// Number of results to collect before shutting down
    pub total: u64,
    pub workers: usize,
    pub queue_types: QueueTypeSet,
    pub correlation_ids: Vec<CorrelationId>,
    pub producer: ProducerMode,
    pub worker: WorkerSettings,
    /// Capacity of the bounded result stream
    pub result_buffer: usize,
    /// Sample pool stats every Nth result (0 = never)
    pub pool_sample_every: u64,
    pub failure_policy: FailurePolicy,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            total: 1000,
            workers: 5,
            queue_types: QueueTypeSet::default(),
            correlation_ids: DEFAULT_CORRELATION_IDS.to_vec(),
            producer: ProducerMode::Bulk,
            worker: WorkerSettings::default(),
            result_buffer: DEFAULT_RESULT_BUFFER,
            pool_sample_every: DEFAULT_POOL_SAMPLE_EVERY,
            failure_policy: FailurePolicy::default(),
        }
    }
}

impl HarnessConfig {
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(AppError::Config("at least one worker is required".to_string()));
        }
        // Round-robin leaves types past the worker count without a claimer
        if self.workers < self.queue_types.len() {
            return Err(AppError::Config(format!(
                "{} workers cannot cover {} queue types",
                self.workers,
                self.queue_types.len()
            )));
        }
        if self.result_buffer == 0 {
            return Err(AppError::Config(
                "result buffer capacity must be at least 1".to_string(),
            ));
        }
        if self.correlation_ids.is_empty() {
            return Err(AppError::Config(
                "correlation id pool must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// Target reached with no task failures
    Completed,
    /// Target reached after the supervisor dropped failed workers
    Degraded,
    /// Stopped early by an external interrupt (e.g. Ctrl-C)
    Interrupted,
}

/// Final report of a run
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub outcome: RunOutcome,
    pub target: u64,
    pub completed: u64,
    /// Results that were in flight when shutdown was broadcast
    pub late_results: u64,
    pub enqueued: u64,
    pub retire_mode: RetireMode,
    pub workers: Vec<WorkerReport>,
    pub failures: Vec<FailureRecord>,
    pub elapsed_ms: u64,
    pub throughput_per_sec: f64,
}

enum Stop {
    TargetReached,
    Interrupted,
    StreamClosed,
    Abort(String),
}

/// Runs one load test against a store
pub struct LoadHarness {
    store: Arc<dyn QueueStore>,
    config: HarnessConfig,
    progress: Arc<dyn ProgressSink>,
    time_provider: Arc<dyn TimeProvider>,
}

impl LoadHarness {
    pub fn new(store: Arc<dyn QueueStore>, config: HarnessConfig) -> Self {
        Self {
            store,
            config,
            progress: Arc::new(NoopProgress),
            time_provider: Arc::new(SystemTimeProvider),
        }
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_time_provider(mut self, time_provider: Arc<dyn TimeProvider>) -> Self {
        self.time_provider = time_provider;
        self
    }

    /// Run until the target number of results has been collected
    pub async fn run(self) -> Result<RunSummary> {
        self.run_until(std::future::pending()).await
    }

    /// Run until the target is reached or `interrupt` completes
    ///
    /// Either way shutdown is broadcast once and every worker and the
    /// producer are joined before this returns.
    pub async fn run_until<F>(self, interrupt: F) -> Result<RunSummary>
    where
        F: Future<Output = ()>,
    {
        let config = &self.config;
        config.validate()?;
        let started = Instant::now();

        let last_id = self.store.max_entry_id().await?.unwrap_or(0);
        let factory = Arc::new(EntryFactory::new(
            Arc::new(SequentialIdProvider::starting_after(last_id)),
            Arc::clone(&self.time_provider),
            config.queue_types.clone(),
            config.correlation_ids.clone(),
        )?);

        let mut enqueued = 0;
        let rate_filler = match config.producer {
            ProducerMode::Bulk => {
                let filler = BulkFiller::new(
                    Arc::clone(&self.store),
                    Arc::clone(&factory),
                    Arc::clone(&self.progress),
                );
                enqueued = filler.fill(config.total).await?;
                None
            }
            ProducerMode::RateLimited { per_second } => Some(RateLimitedFiller::new(
                Arc::clone(&self.store),
                Arc::clone(&factory),
                per_second,
                Arc::clone(&self.progress),
            )?),
        };

        let (shutdown_tx, shutdown) = shutdown_channel();
        let (results_tx, mut results) = mpsc::channel(config.result_buffer);
        let mut supervisor = Supervisor::new(config.failure_policy);

        for assignment in config.queue_types.assign_round_robin(config.workers) {
            let worker = Worker::new(
                assignment.clone(),
                Arc::clone(&self.store),
                results_tx.clone(),
                Arc::clone(&self.progress),
                Arc::clone(&self.time_provider),
                config.worker,
            );
            let token = shutdown.clone();
            supervisor.spawn(TaskKind::Worker(assignment), async move {
                worker.run(token).await.map(TaskReport::Worker)
            });
        }
        // Only workers hold senders: the stream closes once they are all gone
        drop(results_tx);

        if let Some(filler) = rate_filler {
            let token = shutdown.clone();
            supervisor.spawn(TaskKind::Producer, async move {
                filler.run(token).await.map(TaskReport::Producer)
            });
        }

        info!(
            total = config.total,
            workers = config.workers,
            producer = ?config.producer,
            retire_mode = %config.worker.retire_mode,
            "Harness running"
        );

        let mut aggregator = ResultAggregator::new(
            config.total,
            config.pool_sample_every,
            Arc::clone(&self.store),
            Arc::clone(&self.progress),
        );
        tokio::pin!(interrupt);

        // A closed stream only ends the run once every worker exit has been
        // seen, so the supervisor's verdict on a failure takes precedence
        let mut stream_open = true;
        let stop = if aggregator.is_done() {
            Stop::TargetReached
        } else {
            loop {
                if !stream_open && !supervisor.has_live_workers() {
                    break Stop::StreamClosed;
                }
                tokio::select! {
                    received = results.recv(), if stream_open => match received {
                        Some(result) => {
                            if aggregator.record(result) == Tally::TargetReached {
                                break Stop::TargetReached;
                            }
                        }
                        None => stream_open = false,
                    },
                    Some(exit) = supervisor.next_exit() => {
                        if let Decision::Abort(reason) = supervisor.on_exit(exit, false) {
                            break Stop::Abort(reason);
                        }
                    },
                    _ = &mut interrupt => break Stop::Interrupted,
                }
            }
        };

        if shutdown_tx.shutdown() {
            info!(completed = aggregator.completed(), "Shutdown broadcast");
        }

        // Keep receiving while draining so no worker blocks on a full stream
        while stream_open || !supervisor.is_idle() {
            tokio::select! {
                received = results.recv(), if stream_open => match received {
                    Some(result) => {
                        aggregator.record(result);
                    }
                    None => stream_open = false,
                },
                Some(exit) = supervisor.next_exit() => {
                    supervisor.on_exit(exit, true);
                },
            }
        }

        let outcome = match stop {
            Stop::TargetReached if supervisor.failures().is_empty() => RunOutcome::Completed,
            Stop::TargetReached => RunOutcome::Degraded,
            Stop::Interrupted => RunOutcome::Interrupted,
            Stop::StreamClosed => {
                error!(
                    completed = aggregator.completed(),
                    target = aggregator.target(),
                    "All workers exited before the target was reached"
                );
                return Err(AppError::Aborted(format!(
                    "all workers exited after {} of {} results",
                    aggregator.completed(),
                    aggregator.target()
                )));
            }
            Stop::Abort(reason) => {
                error!(reason = %reason, completed = aggregator.completed(), "Run aborted");
                return Err(AppError::Aborted(reason));
            }
        };

        if outcome == RunOutcome::Interrupted {
            warn!(completed = aggregator.completed(), "Run interrupted");
        }

        enqueued += supervisor
            .producer_report()
            .map(|report| report.inserted)
            .unwrap_or(0);
        let failures = supervisor.failures().to_vec();
        let elapsed = started.elapsed();
        let summary = RunSummary {
            outcome,
            target: aggregator.target(),
            completed: aggregator.completed(),
            late_results: aggregator.late(),
            enqueued,
            retire_mode: config.worker.retire_mode,
            workers: supervisor.into_worker_reports(),
            failures,
            elapsed_ms: elapsed.as_millis() as u64,
            throughput_per_sec: if elapsed.as_secs_f64() > 0.0 {
                aggregator.completed() as f64 / elapsed.as_secs_f64()
            } else {
                0.0
            },
        };

        info!(
            outcome = ?summary.outcome,
            completed = summary.completed,
            late_results = summary.late_results,
            elapsed_ms = summary.elapsed_ms,
            "Run finished"
        );
        Ok(summary)
    }
}
