// Progress Sink Port
// Rendering lives outside the core; the harness only emits events.

use crate::domain::{ProcessingResult, WorkerAssignment};

/// Receives progress events from producers, workers and the aggregator
pub trait ProgressSink: Send + Sync {
    /// A producer committed `count` new entries
    fn entries_enqueued(&self, count: u64);

    /// A worker retired another entry; `processed` is its running total
    fn worker_advanced(&self, assignment: &WorkerAssignment, processed: u64);

    /// The aggregator counted a result; `completed` of `target` done
    fn result_recorded(&self, result: &ProcessingResult, completed: u64, target: u64);
}

/// Sink that discards every event
pub struct NoopProgress;

impl ProgressSink for NoopProgress {
    fn entries_enqueued(&self, _count: u64) {}
    fn worker_advanced(&self, _assignment: &WorkerAssignment, _processed: u64) {}
    fn result_recorded(&self, _result: &ProcessingResult, _completed: u64, _target: u64) {}
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorded {
        enqueued: u64,
        results: Vec<ProcessingResult>,
        worker_totals: HashMap<usize, u64>,
    }

    /// Sink that keeps every event for assertions
    #[derive(Default)]
    pub struct RecordingProgress {
        recorded: Mutex<Recorded>,
    }

    impl RecordingProgress {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn enqueued(&self) -> u64 {
            self.recorded.lock().unwrap().enqueued
        }

        /// Results in the order the aggregator counted them
        pub fn results(&self) -> Vec<ProcessingResult> {
            self.recorded.lock().unwrap().results.clone()
        }

        /// Last reported running total for a worker
        pub fn worker_total(&self, worker_id: usize) -> u64 {
            self.recorded
                .lock()
                .unwrap()
                .worker_totals
                .get(&worker_id)
                .copied()
                .unwrap_or(0)
        }
    }

    impl ProgressSink for RecordingProgress {
        fn entries_enqueued(&self, count: u64) {
            self.recorded.lock().unwrap().enqueued += count;
        }

        fn worker_advanced(&self, assignment: &WorkerAssignment, processed: u64) {
            self.recorded
                .lock()
                .unwrap()
                .worker_totals
                .insert(assignment.worker_id, processed);
        }

        fn result_recorded(&self, result: &ProcessingResult, _completed: u64, _target: u64) {
            self.recorded.lock().unwrap().results.push(result.clone());
        }
    }
}
