// ID Provider Port

use crate::domain::EntryId;
use std::sync::atomic::{AtomicI64, Ordering};

/// Entry id source (allows deterministic ids in tests)
pub trait IdProvider: Send + Sync {
    /// Next unique entry id
    fn next_id(&self) -> EntryId;
}

/// Monotonic atomic sequence, safe to share between concurrent producers
#[derive(Debug)]
pub struct SequentialIdProvider {
    last: AtomicI64,
}

impl SequentialIdProvider {
    /// Sequence whose first id is 1
    pub fn new() -> Self {
        Self::starting_after(0)
    }

    /// Sequence whose first id is `last + 1`
    ///
    /// Seed with the store's current maximum id so reruns against a
    /// non-empty table never collide.
    pub fn starting_after(last: EntryId) -> Self {
        Self {
            last: AtomicI64::new(last),
        }
    }
}

impl Default for SequentialIdProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl IdProvider for SequentialIdProvider {
    fn next_id(&self) -> EntryId {
        self.last.fetch_add(1, Ordering::Relaxed) + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn test_starting_after_seed() {
        let ids = SequentialIdProvider::starting_after(41);
        assert_eq!(ids.next_id(), 42);
        assert_eq!(ids.next_id(), 43);
    }

    #[test]
    fn test_concurrent_ids_are_unique() {
        let ids = Arc::new(SequentialIdProvider::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let ids = Arc::clone(&ids);
                std::thread::spawn(move || (0..1000).map(|_| ids.next_id()).collect::<Vec<_>>())
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(seen.insert(id), "duplicate id {}", id);
            }
        }
        assert_eq!(seen.len(), 4000);
    }
}
