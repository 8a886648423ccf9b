// Queue Entry Domain Model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::error::{DomainError, Result};

/// Entry ID (unique, assigned by the producer, never reused)
pub type EntryId = i64;

/// Business-domain reference carried through processing
pub type CorrelationId = i64;

/// Partition tag restricting which entries a worker may claim
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueueType(pub(crate) String);

impl QueueType {
    /// Create a queue type, rejecting empty or whitespace-bearing tags
    pub fn new(tag: impl Into<String>) -> Result<Self> {
        let tag = tag.into();
        if tag.is_empty() || tag.chars().any(char::is_whitespace) {
            return Err(DomainError::InvalidQueueType(tag));
        }
        Ok(Self(tag))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QueueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for QueueType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s.trim())
    }
}

/// How a claimed entry is marked done
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetireMode {
    /// Remove the row
    Delete,
    /// Keep the row and set `processed_at`
    #[default]
    MarkProcessed,
}

impl RetireMode {
    /// Map the `--delmsg` switch onto a mode
    pub fn from_delete_flag(delete: bool) -> Self {
        if delete {
            RetireMode::Delete
        } else {
            RetireMode::MarkProcessed
        }
    }
}

impl fmt::Display for RetireMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetireMode::Delete => write!(f, "delete"),
            RetireMode::MarkProcessed => write!(f, "mark_processed"),
        }
    }
}

/// A row of the message queue
///
/// Status is derived: the entry is pending while the row exists and
/// `processed_at` is unset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueEntry {
    pub id: EntryId,
    pub correlation_id: CorrelationId,
    pub queue_type: QueueType,
    pub enqueued_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

impl QueueEntry {
    /// Create a pending entry
    pub fn new(
        id: EntryId,
        correlation_id: CorrelationId,
        queue_type: QueueType,
        enqueued_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            correlation_id,
            queue_type,
            enqueued_at,
            processed_at: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.processed_at.is_none()
    }
}
