// Progress sink that reports through tracing

use queuebench_core::domain::{ProcessingResult, WorkerAssignment};
use queuebench_core::port::ProgressSink;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info};

/// Percent granularity of the overall progress lines
const PERCENT_STEP: u64 = 10;

#[derive(Default)]
pub struct TracingProgress {
    enqueued: AtomicU64,
    last_percent: AtomicU64,
}

impl TracingProgress {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Completed percentage rounded down to a multiple of `PERCENT_STEP`
fn percent_step(completed: u64, target: u64) -> u64 {
    if target == 0 {
        return 100;
    }
    let percent = completed.saturating_mul(100) / target;
    percent - percent % PERCENT_STEP
}

impl ProgressSink for TracingProgress {
    fn entries_enqueued(&self, count: u64) {
        let total = self.enqueued.fetch_add(count, Ordering::Relaxed) + count;
        if count > 1 {
            info!(count, total, "Entries enqueued");
        } else {
            debug!(total, "Entry enqueued");
        }
    }

    fn worker_advanced(&self, assignment: &WorkerAssignment, processed: u64) {
        debug!(
            worker_id = assignment.worker_id,
            queue_type = %assignment.queue_type,
            processed,
            "Worker progress"
        );
    }

    fn result_recorded(&self, _result: &ProcessingResult, completed: u64, target: u64) {
        let step = percent_step(completed, target);
        if step > 0 && self.last_percent.fetch_max(step, Ordering::Relaxed) < step {
            info!(completed, target, percent = step, "Progress");
        }
    }
}
