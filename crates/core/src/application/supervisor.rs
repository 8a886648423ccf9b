// Supervisor - owns worker/producer tasks and decides what a failure means

use crate::application::producer::ProducerReport;
use crate::application::worker::WorkerReport;
use crate::domain::{QueueType, WorkerAssignment};
use crate::error::AppError;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::str::FromStr;
use tokio::task::JoinSet;
use tracing::{error, warn};

/// What to do when a worker or the producer fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// First failure stops the whole run
    #[default]
    AbortAll,
    /// Drop the failed worker and keep going while every type has a live worker
    ContinueDegraded,
}

impl FromStr for FailurePolicy {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "abort" | "abort-all" => Ok(FailurePolicy::AbortAll),
            "continue" | "continue-degraded" => Ok(FailurePolicy::ContinueDegraded),
            other => Err(AppError::Config(format!(
                "unknown failure policy {:?} (expected abort or continue)",
                other
            ))),
        }
    }
}

/// Identity of a supervised task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskKind {
    Worker(WorkerAssignment),
    Producer,
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskKind::Worker(assignment) => write!(f, "{}", assignment),
            TaskKind::Producer => write!(f, "rate-limited producer"),
        }
    }
}

/// Successful task exit
#[derive(Debug)]
pub enum TaskReport {
    Worker(WorkerReport),
    Producer(ProducerReport),
}

/// Failed task exit (error return or panic)
#[derive(Debug)]
pub struct TaskFailure {
    pub task: TaskKind,
    pub error: AppError,
}

pub type TaskExit = std::result::Result<TaskReport, TaskFailure>;

/// Serializable trace of a failure for the run summary
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureRecord {
    pub task: String,
    pub error: String,
}

/// Supervisor verdict on a task exit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Continue,
    Abort(String),
}

pub struct Supervisor {
    policy: FailurePolicy,
    tasks: JoinSet<TaskExit>,
    live_workers: HashMap<QueueType, usize>,
    worker_reports: Vec<WorkerReport>,
    producer_report: Option<ProducerReport>,
    failures: Vec<FailureRecord>,
}

impl Supervisor {
    pub fn new(policy: FailurePolicy) -> Self {
        Self {
            policy,
            tasks: JoinSet::new(),
            live_workers: HashMap::new(),
            worker_reports: Vec::new(),
            producer_report: None,
            failures: Vec::new(),
        }
    }

    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    /// Spawn a supervised task
    ///
    /// The task runs in its own inner spawn so a panic surfaces here as a
    /// `TaskFailure` instead of tearing down the coordinator.
    pub fn spawn<F>(&mut self, kind: TaskKind, task: F)
    where
        F: Future<Output = crate::error::Result<TaskReport>> + Send + 'static,
    {
        if let TaskKind::Worker(assignment) = &kind {
            *self
                .live_workers
                .entry(assignment.queue_type.clone())
                .or_insert(0) += 1;
        }

        self.tasks.spawn(async move {
            match tokio::spawn(task).await {
                Ok(Ok(report)) => Ok(report),
                Ok(Err(error)) => Err(TaskFailure { task: kind, error }),
                Err(join_err) => {
                    let reason = if join_err.is_panic() {
                        format!("task panicked: {}", panic_message(join_err.into_panic()))
                    } else {
                        "task cancelled".to_string()
                    };
                    Err(TaskFailure {
                        task: kind,
                        error: AppError::Internal(reason),
                    })
                }
            }
        });
    }

    /// Wait for the next task to exit (None when no task is left)
    pub async fn next_exit(&mut self) -> Option<TaskExit> {
        loop {
            match self.tasks.join_next().await? {
                Ok(exit) => return Some(exit),
                // Outer wrapper only fails if the set itself was aborted
                Err(join_err) => warn!(error = %join_err, "Supervised wrapper task failed"),
            }
        }
    }

    pub fn is_idle(&self) -> bool {
        self.tasks.is_empty()
    }

    /// True while any worker has not yet been seen exiting
    pub fn has_live_workers(&self) -> bool {
        self.live_workers.values().any(|&live| live > 0)
    }

    /// Live workers currently bound to `queue_type`
    pub fn live_workers(&self, queue_type: &QueueType) -> usize {
        self.live_workers.get(queue_type).copied().unwrap_or(0)
    }

    /// Record a task exit and decide whether the run can go on
    ///
    /// While `draining` (shutdown already broadcast) failures are recorded
    /// but never escalate.
    pub fn on_exit(&mut self, exit: TaskExit, draining: bool) -> Decision {
        match exit {
            Ok(TaskReport::Worker(report)) => {
                self.release_worker(&report.assignment.queue_type);
                self.worker_reports.push(report);
                Decision::Continue
            }
            Ok(TaskReport::Producer(report)) => {
                self.producer_report = Some(report);
                Decision::Continue
            }
            Err(failure) => self.on_failure(failure, draining),
        }
    }

    fn on_failure(&mut self, failure: TaskFailure, draining: bool) -> Decision {
        error!(task = %failure.task, error = %failure.error, "Task failed");
        self.failures.push(FailureRecord {
            task: failure.task.to_string(),
            error: failure.error.to_string(),
        });

        if let TaskKind::Worker(assignment) = &failure.task {
            self.release_worker(&assignment.queue_type);
        }
        if draining {
            return Decision::Continue;
        }

        match (self.policy, &failure.task) {
            (FailurePolicy::AbortAll, task) => {
                Decision::Abort(format!("{} failed: {}", task, failure.error))
            }
            (FailurePolicy::ContinueDegraded, TaskKind::Producer) => Decision::Abort(format!(
                "rate-limited producer failed: {}",
                failure.error
            )),
            (FailurePolicy::ContinueDegraded, TaskKind::Worker(assignment)) => {
                let left = self.live_workers(&assignment.queue_type);
                if left == 0 {
                    Decision::Abort(format!(
                        "no live workers left for queue type {} ({} failed: {})",
                        assignment.queue_type, assignment, failure.error
                    ))
                } else {
                    warn!(
                        queue_type = %assignment.queue_type,
                        live_workers = left,
                        "Continuing degraded after worker failure"
                    );
                    Decision::Continue
                }
            }
        }
    }

    fn release_worker(&mut self, queue_type: &QueueType) {
        if let Some(live) = self.live_workers.get_mut(queue_type) {
            *live = live.saturating_sub(1);
        }
    }

    pub fn failures(&self) -> &[FailureRecord] {
        &self.failures
    }

    pub fn producer_report(&self) -> Option<ProducerReport> {
        self.producer_report
    }

    /// Worker reports sorted by worker id
    pub fn into_worker_reports(mut self) -> Vec<WorkerReport> {
        self.worker_reports
            .sort_by_key(|report| report.assignment.worker_id);
        self.worker_reports
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}
