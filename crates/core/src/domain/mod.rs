// Domain Layer - Queue entries, assignments and results

pub mod assignment;
pub mod entry;
pub mod error;
pub mod result;

// Re-exports
pub use assignment::{QueueTypeSet, WorkerAssignment, WorkerId, DEFAULT_QUEUE_TYPES};
pub use entry::{CorrelationId, EntryId, QueueEntry, QueueType, RetireMode};
pub use error::DomainError;
pub use result::ProcessingResult;
