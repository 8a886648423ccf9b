// Port Layer - Interfaces for external dependencies

pub mod id_provider; // For deterministic testing
pub mod progress;
pub mod queue_store;
pub mod time_provider;
pub mod transaction;

// Re-exports
pub use id_provider::{IdProvider, SequentialIdProvider};
pub use progress::{NoopProgress, ProgressSink};
pub use queue_store::{PoolStats, QueueStore, QueueTransaction};
pub use time_provider::{SystemTimeProvider, TimeProvider};
pub use transaction::Transaction;
