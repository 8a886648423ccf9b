// Producers - populate the queue in one of two exclusive modes

mod bulk;
mod rate_limited;
pub mod token_bucket;

pub use bulk::BulkFiller;
pub use rate_limited::RateLimitedFiller;
pub use token_bucket::TokenBucket;

use crate::domain::error::DomainError;
use crate::domain::{CorrelationId, QueueEntry, QueueTypeSet};
use crate::error::{AppError, Result};
use crate::port::{IdProvider, TimeProvider};
use rand::Rng;
use serde::Serialize;
use std::sync::Arc;

/// Which producer runs, selected by the configured rate
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProducerMode {
    /// Insert the whole target in one transaction before workers start
    Bulk,
    /// Insert one entry per token while workers run
    RateLimited { per_second: f64 },
}

impl ProducerMode {
    /// `0` selects bulk mode, a positive rate selects rate-limited mode
    pub fn from_rate(rate: f64) -> Result<Self> {
        if !rate.is_finite() || rate < 0.0 {
            return Err(AppError::Config(format!(
                "producer rate must be zero or a positive number, got {}",
                rate
            )));
        }
        if rate == 0.0 {
            Ok(ProducerMode::Bulk)
        } else {
            Ok(ProducerMode::RateLimited { per_second: rate })
        }
    }
}

/// Counters returned by a producer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProducerReport {
    pub inserted: u64,
}

/// Synthesizes queue entries with random correlation ids and types
pub struct EntryFactory {
    ids: Arc<dyn IdProvider>,
    time_provider: Arc<dyn TimeProvider>,
    queue_types: QueueTypeSet,
    correlation_ids: Vec<CorrelationId>,
}

impl EntryFactory {
    pub fn new(
        ids: Arc<dyn IdProvider>,
        time_provider: Arc<dyn TimeProvider>,
        queue_types: QueueTypeSet,
        correlation_ids: Vec<CorrelationId>,
    ) -> std::result::Result<Self, DomainError> {
        if correlation_ids.is_empty() {
            return Err(DomainError::EmptyCorrelationIds);
        }
        Ok(Self {
            ids,
            time_provider,
            queue_types,
            correlation_ids,
        })
    }

    /// Next entry: fresh id, random correlation id, random queue type
    pub fn next_entry(&self) -> QueueEntry {
        let mut rng = rand::thread_rng();
        let correlation_id = self.correlation_ids[rng.gen_range(0..self.correlation_ids.len())];
        let queue_type = self
            .queue_types
            .nth_wrapping(rng.gen_range(0..self.queue_types.len()))
            .clone();

        QueueEntry::new(
            self.ids.next_id(),
            correlation_id,
            queue_type,
            self.time_provider.now(),
        )
    }
}
