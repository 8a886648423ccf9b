// Domain Error Types

use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum DomainError {
    #[error("Queue type set must contain at least one type")]
    EmptyQueueTypes,

    #[error("Invalid queue type: {0:?}")]
    InvalidQueueType(String),

    #[error("Duplicate queue type: {0}")]
    DuplicateQueueType(String),

    #[error("Invalid latency range: {min_ms}ms..={max_ms}ms")]
    InvalidLatencyRange { min_ms: u64, max_ms: u64 },

    #[error("Correlation id pool must not be empty")]
    EmptyCorrelationIds,
}

pub type Result<T> = std::result::Result<T, DomainError>;
