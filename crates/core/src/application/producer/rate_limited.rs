// Rate-Limited Filler - one committed insert per token until shutdown

use super::{EntryFactory, ProducerReport, TokenBucket};
use crate::application::worker::constants::RATE_LIMITER_CAPACITY;
use crate::application::worker::ShutdownToken;
use crate::error::Result;
use crate::port::{ProgressSink, QueueStore};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct RateLimitedFiller {
    store: Arc<dyn QueueStore>,
    factory: Arc<EntryFactory>,
    bucket: TokenBucket,
    progress: Arc<dyn ProgressSink>,
}

impl RateLimitedFiller {
    /// Create a filler inserting `per_second` entries per second (no burst)
    pub fn new(
        store: Arc<dyn QueueStore>,
        factory: Arc<EntryFactory>,
        per_second: f64,
        progress: Arc<dyn ProgressSink>,
    ) -> Result<Self> {
        Ok(Self {
            store,
            factory,
            bucket: TokenBucket::new(per_second, RATE_LIMITER_CAPACITY)?,
            progress,
        })
    }

    /// Insert entries at the configured rate until shutdown
    pub async fn run(self, mut shutdown: ShutdownToken) -> Result<ProducerReport> {
        info!(rate = self.bucket.rate_per_sec(), "Rate-limited producer started");
        let mut report = ProducerReport::default();

        while !shutdown.is_shutdown() {
            tokio::select! {
                _ = self.bucket.acquire() => {},
                _ = shutdown.wait() => break,
            }

            let entry = self.factory.next_entry();
            let mut tx = self.store.begin().await?;
            if let Err(e) = tx.insert(&entry).await {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(error = %rollback_err, "Rollback of insert failed");
                }
                return Err(e);
            }
            tx.commit().await?;

            report.inserted += 1;
            self.progress.entries_enqueued(1);
            debug!(entry_id = entry.id, queue_type = %entry.queue_type, "Entry inserted");
        }

        info!(inserted = report.inserted, "Rate-limited producer stopped");
        Ok(report)
    }
}
