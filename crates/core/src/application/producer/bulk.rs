// Bulk Filler - one transaction, committed once, before workers start

use super::EntryFactory;
use crate::error::Result;
use crate::port::{ProgressSink, QueueStore};
use std::sync::Arc;
use tracing::{info, warn};

pub struct BulkFiller {
    store: Arc<dyn QueueStore>,
    factory: Arc<EntryFactory>,
    progress: Arc<dyn ProgressSink>,
}

impl BulkFiller {
    pub fn new(
        store: Arc<dyn QueueStore>,
        factory: Arc<EntryFactory>,
        progress: Arc<dyn ProgressSink>,
    ) -> Self {
        Self {
            store,
            factory,
            progress,
        }
    }

    /// Insert `total` entries in a single transaction
    ///
    /// Either all entries are committed or none are.
    pub async fn fill(&self, total: u64) -> Result<u64> {
        let mut tx = self.store.begin().await?;

        for _ in 0..total {
            let entry = self.factory.next_entry();
            if let Err(e) = tx.insert(&entry).await {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(error = %rollback_err, "Rollback of bulk fill failed");
                }
                return Err(e);
            }
        }
        tx.commit().await?;

        self.progress.entries_enqueued(total);
        info!(total, "Queue filled with random entries");
        Ok(total)
    }
}
