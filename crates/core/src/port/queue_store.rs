// Queue Store Port (Interface)

use crate::domain::{EntryId, QueueEntry, QueueType, RetireMode};
use crate::error::Result;
use crate::port::Transaction;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Connection pool diagnostics (observational only)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    /// Connections currently open (idle + in use)
    pub connections: u32,
    pub idle: u32,
    pub max_connections: u32,
}

impl PoolStats {
    pub fn in_use(&self) -> u32 {
        self.connections.saturating_sub(self.idle)
    }
}

/// Store holding the message queue table
#[async_trait]
pub trait QueueStore: Send + Sync {
    /// Begin a new transaction
    async fn begin(&self) -> Result<Box<dyn QueueTransaction>>;

    /// Count pending entries, optionally restricted to one queue type
    async fn count_pending(&self, queue_type: Option<&QueueType>) -> Result<i64>;

    /// Highest entry id present in the table (None when empty)
    async fn max_entry_id(&self) -> Result<Option<EntryId>>;

    /// Current connection pool diagnostics
    fn pool_stats(&self) -> PoolStats;
}

/// Claim protocol operations within one transaction
#[async_trait]
pub trait QueueTransaction: Transaction {
    /// Lock the oldest pending entry of `queue_type`
    ///
    /// Rows locked by concurrent transactions are never returned.
    /// `Ok(None)` means no pending entry of that type is claimable.
    async fn claim_next(&mut self, queue_type: &QueueType) -> Result<Option<QueueEntry>>;

    /// Mark a claimed entry done (delete the row or set `processed_at`)
    async fn retire(&mut self, entry: &QueueEntry, mode: RetireMode, at: DateTime<Utc>)
        -> Result<()>;

    /// Insert a new pending entry
    async fn insert(&mut self, entry: &QueueEntry) -> Result<()>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::error::AppError;
    use std::collections::{BTreeMap, HashSet};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct MockState {
        rows: BTreeMap<EntryId, QueueEntry>,
        locked: HashSet<EntryId>,
    }

    #[derive(Default)]
    struct FailureInjection {
        claims: AtomicUsize,
        inserts: AtomicUsize,
    }

    fn take_failure(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    /// In-memory store emulating row locks with skip-locked claims
    #[derive(Clone, Default)]
    pub struct InMemoryQueueStore {
        state: Arc<Mutex<MockState>>,
        failures: Arc<FailureInjection>,
        claim_attempts: Arc<AtomicUsize>,
        inserted: Arc<AtomicUsize>,
    }

    impl InMemoryQueueStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_entries(entries: impl IntoIterator<Item = QueueEntry>) -> Self {
            let store = Self::new();
            {
                let mut state = store.state.lock().unwrap();
                for entry in entries {
                    state.rows.insert(entry.id, entry);
                }
            }
            store
        }

        /// Make the next `n` claims fail with a store error
        pub fn fail_next_claims(&self, n: usize) {
            self.failures.claims.store(n, Ordering::SeqCst);
        }

        /// Make the next `n` inserts fail with a store error
        pub fn fail_next_inserts(&self, n: usize) {
            self.failures.inserts.store(n, Ordering::SeqCst);
        }

        /// Number of `claim_next` calls so far
        pub fn claim_attempts(&self) -> usize {
            self.claim_attempts.load(Ordering::SeqCst)
        }

        /// Number of committed inserts so far
        pub fn committed_inserts(&self) -> usize {
            self.inserted.load(Ordering::SeqCst)
        }

        /// Snapshot of all rows (pending and processed)
        pub fn entries(&self) -> Vec<QueueEntry> {
            self.state.lock().unwrap().rows.values().cloned().collect()
        }
    }

    #[async_trait]
    impl QueueStore for InMemoryQueueStore {
        async fn begin(&self) -> Result<Box<dyn QueueTransaction>> {
            Ok(Box::new(InMemoryTransaction {
                store: self.clone(),
                claimed: Vec::new(),
                ops: Vec::new(),
            }))
        }

        async fn count_pending(&self, queue_type: Option<&QueueType>) -> Result<i64> {
            let state = self.state.lock().unwrap();
            let count = state
                .rows
                .values()
                .filter(|e| e.is_pending())
                .filter(|e| queue_type.map_or(true, |qt| &e.queue_type == qt))
                .count();
            Ok(count as i64)
        }

        async fn max_entry_id(&self) -> Result<Option<EntryId>> {
            Ok(self.state.lock().unwrap().rows.keys().next_back().copied())
        }

        fn pool_stats(&self) -> PoolStats {
            PoolStats {
                connections: 1,
                idle: 1,
                max_connections: 1,
            }
        }
    }

    enum PendingOp {
        Retire {
            id: EntryId,
            mode: RetireMode,
            at: DateTime<Utc>,
        },
        Insert(QueueEntry),
    }

    /// Transaction over [`InMemoryQueueStore`]; effects apply on commit only
    pub struct InMemoryTransaction {
        store: InMemoryQueueStore,
        claimed: Vec<EntryId>,
        ops: Vec<PendingOp>,
    }

    impl InMemoryTransaction {
        fn release_locks(&mut self) {
            if let Ok(mut state) = self.store.state.lock() {
                for id in self.claimed.drain(..) {
                    state.locked.remove(&id);
                }
            }
        }
    }

    impl Drop for InMemoryTransaction {
        fn drop(&mut self) {
            self.release_locks();
        }
    }

    #[async_trait]
    impl Transaction for InMemoryTransaction {
        async fn commit(mut self: Box<Self>) -> Result<()> {
            let ops = std::mem::take(&mut self.ops);
            {
                let mut state = self.store.state.lock().unwrap();
                for op in &ops {
                    if let PendingOp::Insert(entry) = op {
                        if state.rows.contains_key(&entry.id) {
                            return Err(AppError::Store(format!(
                                "Unique constraint violation: msg_id {}",
                                entry.id
                            )));
                        }
                    }
                }
                for op in ops {
                    match op {
                        PendingOp::Retire {
                            id,
                            mode: RetireMode::Delete,
                            ..
                        } => {
                            state.rows.remove(&id);
                        }
                        PendingOp::Retire {
                            id,
                            mode: RetireMode::MarkProcessed,
                            at,
                        } => {
                            if let Some(row) = state.rows.get_mut(&id) {
                                row.processed_at = Some(at);
                            }
                        }
                        PendingOp::Insert(entry) => {
                            state.rows.insert(entry.id, entry);
                            self.store.inserted.fetch_add(1, Ordering::SeqCst);
                        }
                    }
                }
            }
            self.release_locks();
            Ok(())
        }

        async fn rollback(mut self: Box<Self>) -> Result<()> {
            self.ops.clear();
            self.release_locks();
            Ok(())
        }
    }

    #[async_trait]
    impl QueueTransaction for InMemoryTransaction {
        async fn claim_next(&mut self, queue_type: &QueueType) -> Result<Option<QueueEntry>> {
            self.store.claim_attempts.fetch_add(1, Ordering::SeqCst);
            if take_failure(&self.store.failures.claims) {
                return Err(AppError::Store("injected claim failure".to_string()));
            }

            let mut state = self.store.state.lock().unwrap();
            let next = state
                .rows
                .values()
                .filter(|e| e.is_pending() && &e.queue_type == queue_type)
                .filter(|e| !state.locked.contains(&e.id))
                .min_by_key(|e| (e.enqueued_at, e.id))
                .cloned();

            if let Some(entry) = &next {
                state.locked.insert(entry.id);
                self.claimed.push(entry.id);
            }
            Ok(next)
        }

        async fn retire(
            &mut self,
            entry: &QueueEntry,
            mode: RetireMode,
            at: DateTime<Utc>,
        ) -> Result<()> {
            if !self.claimed.contains(&entry.id) {
                return Err(AppError::InvalidState(format!(
                    "entry {} was not claimed by this transaction",
                    entry.id
                )));
            }
            self.ops.push(PendingOp::Retire {
                id: entry.id,
                mode,
                at,
            });
            Ok(())
        }

        async fn insert(&mut self, entry: &QueueEntry) -> Result<()> {
            if take_failure(&self.store.failures.inserts) {
                return Err(AppError::Store("injected insert failure".to_string()));
            }
            self.ops.push(PendingOp::Insert(entry.clone()));
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mocks::InMemoryQueueStore;
    use super::*;

    fn entry(id: EntryId, tag: &str) -> QueueEntry {
        QueueEntry::new(id, 1, QueueType::new(tag).unwrap(), Utc::now())
    }

    #[tokio::test]
    async fn test_concurrent_transactions_skip_locked_rows() {
        let store = InMemoryQueueStore::with_entries(vec![entry(1, "type1"), entry(2, "type1")]);
        let qt = QueueType::new("type1").unwrap();

        let mut tx1 = store.begin().await.unwrap();
        let mut tx2 = store.begin().await.unwrap();
        let first = tx1.claim_next(&qt).await.unwrap().unwrap();
        let second = tx2.claim_next(&qt).await.unwrap().unwrap();
        assert_ne!(first.id, second.id);

        let mut tx3 = store.begin().await.unwrap();
        assert!(tx3.claim_next(&qt).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_rollback_keeps_entry_claimable() {
        let store = InMemoryQueueStore::with_entries(vec![entry(7, "type2")]);
        let qt = QueueType::new("type2").unwrap();

        let mut tx = store.begin().await.unwrap();
        let claimed = tx.claim_next(&qt).await.unwrap().unwrap();
        tx.retire(&claimed, RetireMode::Delete, Utc::now()).await.unwrap();
        tx.rollback().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        let again = tx.claim_next(&qt).await.unwrap().unwrap();
        assert_eq!(again.id, 7);
        drop(tx);
        assert_eq!(store.count_pending(Some(&qt)).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_mark_processed_leaves_row() {
        let store = InMemoryQueueStore::with_entries(vec![entry(1, "type1")]);
        let qt = QueueType::new("type1").unwrap();

        let mut tx = store.begin().await.unwrap();
        let claimed = tx.claim_next(&qt).await.unwrap().unwrap();
        tx.retire(&claimed, RetireMode::MarkProcessed, Utc::now())
            .await
            .unwrap();
        tx.commit().await.unwrap();

        assert_eq!(store.count_pending(None).await.unwrap(), 0);
        assert_eq!(store.entries().len(), 1);
        assert!(store.entries()[0].processed_at.is_some());
    }
}
