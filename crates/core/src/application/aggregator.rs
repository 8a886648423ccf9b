// Result Aggregator - single consumer of the worker result stream

use crate::domain::ProcessingResult;
use crate::port::{ProgressSink, QueueStore};
use std::sync::Arc;
use tracing::{debug, info};

/// What the coordinator should do after recording a result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tally {
    Continue,
    /// `completed` just reached the target; broadcast shutdown now
    TargetReached,
}

/// Counts completions toward the configured target
pub struct ResultAggregator {
    target: u64,
    completed: u64,
    late: u64,
    sample_every: u64,
    store: Arc<dyn QueueStore>,
    progress: Arc<dyn ProgressSink>,
}

impl ResultAggregator {
    /// `sample_every == 0` disables pool sampling
    pub fn new(
        target: u64,
        sample_every: u64,
        store: Arc<dyn QueueStore>,
        progress: Arc<dyn ProgressSink>,
    ) -> Self {
        Self {
            target,
            completed: 0,
            late: 0,
            sample_every,
            store,
            progress,
        }
    }

    pub fn target(&self) -> u64 {
        self.target
    }

    pub fn completed(&self) -> u64 {
        self.completed
    }

    /// Results that arrived after the target was reached
    pub fn late(&self) -> u64 {
        self.late
    }

    pub fn is_done(&self) -> bool {
        self.completed >= self.target
    }

    /// Count one result
    ///
    /// Returns `TargetReached` exactly once, on the result that brings
    /// `completed` to the target. Anything after that is counted as late.
    pub fn record(&mut self, result: ProcessingResult) -> Tally {
        if self.is_done() {
            self.record_late(&result);
            return Tally::Continue;
        }

        self.completed += 1;
        debug!(
            entry_id = result.entry_id,
            correlation_id = result.correlation_id,
            queue_type = %result.queue_type,
            worker_id = result.worker_id,
            completed_at = %result.completed_at,
            "Result"
        );
        self.progress
            .result_recorded(&result, self.completed, self.target);

        if self.sample_every > 0 && self.completed % self.sample_every == 0 {
            let stats = self.store.pool_stats();
            info!(
                completed = self.completed,
                connections = stats.connections,
                idle = stats.idle,
                in_use = stats.in_use(),
                max_connections = stats.max_connections,
                "Pool stats"
            );
        }

        if self.completed == self.target {
            Tally::TargetReached
        } else {
            Tally::Continue
        }
    }

    /// Count a result that arrived while draining after shutdown
    pub fn record_late(&mut self, result: &ProcessingResult) {
        self.late += 1;
        debug!(
            entry_id = result.entry_id,
            worker_id = result.worker_id,
            "Result arrived after shutdown"
        );
    }
}
