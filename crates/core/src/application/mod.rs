// Application Layer - Load harness use cases

pub mod aggregator;
pub mod harness;
pub mod producer;
pub mod supervisor;
pub mod worker;

// Re-exports
pub use aggregator::{ResultAggregator, Tally};
pub use harness::{HarnessConfig, LoadHarness, RunOutcome, RunSummary};
pub use producer::{BulkFiller, EntryFactory, ProducerMode, ProducerReport, RateLimitedFiller};
pub use supervisor::{FailurePolicy, FailureRecord, Supervisor};
pub use worker::{
    shutdown_channel, LatencyRange, ShutdownSender, ShutdownToken, Worker, WorkerReport,
    WorkerSettings,
};
