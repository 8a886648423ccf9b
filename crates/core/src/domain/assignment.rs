// Queue Type Set & Worker Assignment

use serde::{Deserialize, Serialize};

use super::entry::QueueType;
use super::error::{DomainError, Result};

/// Worker identifier (0-based index in the pool)
pub type WorkerId = usize;

/// Default queue type tags
pub const DEFAULT_QUEUE_TYPES: [&str; 3] = ["type1", "type2", "type3"];

/// Fixed, ordered, non-empty set of queue types
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueTypeSet(Vec<QueueType>);

impl QueueTypeSet {
    pub fn new(types: Vec<QueueType>) -> Result<Self> {
        if types.is_empty() {
            return Err(DomainError::EmptyQueueTypes);
        }
        for (i, qt) in types.iter().enumerate() {
            if types[..i].contains(qt) {
                return Err(DomainError::DuplicateQueueType(qt.to_string()));
            }
        }
        Ok(Self(types))
    }

    /// Parse a comma separated list such as `type1,type2,type3`
    pub fn parse_list(list: &str) -> Result<Self> {
        let types = list
            .split(',')
            .filter(|s| !s.trim().is_empty())
            .map(str::parse)
            .collect::<Result<Vec<QueueType>>>()?;
        Self::new(types)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &QueueType> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[QueueType] {
        &self.0
    }

    /// Round-robin pick: index `i` maps to type `i mod k`
    pub fn nth_wrapping(&self, i: usize) -> &QueueType {
        &self.0[i % self.0.len()]
    }

    /// Build the `{worker_id -> queue_type}` mapping for a pool of `workers`
    pub fn assign_round_robin(&self, workers: usize) -> Vec<WorkerAssignment> {
        (0..workers)
            .map(|worker_id| WorkerAssignment {
                worker_id,
                queue_type: self.nth_wrapping(worker_id).clone(),
            })
            .collect()
    }
}

impl Default for QueueTypeSet {
    fn default() -> Self {
        Self(
            DEFAULT_QUEUE_TYPES
                .iter()
                .map(|tag| QueueType(tag.to_string()))
                .collect(),
        )
    }
}

/// Binding of one worker to one queue type, fixed for the worker's lifetime
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkerAssignment {
    pub worker_id: WorkerId,
    pub queue_type: QueueType,
}

impl std::fmt::Display for WorkerAssignment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "worker {} [{}]", self.worker_id, self.queue_type)
    }
}
