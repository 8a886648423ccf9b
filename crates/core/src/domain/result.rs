// Processing Result

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::assignment::WorkerId;
use super::entry::{CorrelationId, EntryId, QueueEntry, QueueType};

/// Emitted exactly once per successfully retired entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingResult {
    pub entry_id: EntryId,
    pub correlation_id: CorrelationId,
    pub queue_type: QueueType,
    pub completed_at: DateTime<Utc>,
    pub worker_id: WorkerId,
}

impl ProcessingResult {
    pub fn for_entry(entry: &QueueEntry, worker_id: WorkerId, completed_at: DateTime<Utc>) -> Self {
        Self {
            entry_id: entry.id,
            correlation_id: entry.correlation_id,
            queue_type: entry.queue_type.clone(),
            completed_at,
            worker_id,
        }
    }
}
