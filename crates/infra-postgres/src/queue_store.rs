// PostgreSQL QueueStore Implementation

use crate::{map_sqlx_error, PostgresQueueTransaction};
use async_trait::async_trait;
use queuebench_core::domain::{EntryId, QueueType};
use queuebench_core::error::Result;
use queuebench_core::port::{PoolStats, QueueStore, QueueTransaction};
use sqlx::PgPool;

pub struct PostgresQueueStore {
    pool: PgPool,
}

impl PostgresQueueStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl QueueStore for PostgresQueueStore {
    async fn begin(&self) -> Result<Box<dyn QueueTransaction>> {
        let tx = self.pool.begin().await.map_err(map_sqlx_error)?;
        Ok(Box::new(PostgresQueueTransaction::new(tx)))
    }

    async fn count_pending(&self, queue_type: Option<&QueueType>) -> Result<i64> {
        sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM msg_queue
            WHERE processed_at IS NULL AND ($1::text IS NULL OR queue_type = $1)
            "#,
        )
        .bind(queue_type.map(QueueType::as_str))
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_error)
    }

    async fn max_entry_id(&self) -> Result<Option<EntryId>> {
        sqlx::query_scalar("SELECT MAX(msg_id) FROM msg_queue")
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)
    }

    fn pool_stats(&self) -> PoolStats {
        PoolStats {
            connections: self.pool.size(),
            idle: self.pool.num_idle() as u32,
            max_connections: self.pool.options().get_max_connections(),
        }
    }
}

// Run with: QUEUEBENCH_PG_DSN=postgres://... cargo test -p queuebench-infra-postgres -- --ignored
#[cfg(test)]
mod tests {
    use crate::test_support::isolated_store;
    use chrono::Utc;
    use queuebench_core::domain::{QueueEntry, QueueType, RetireMode};
    use queuebench_core::port::{QueueStore, QueueTransaction, Transaction};

    fn entry(id: i64, correlation_id: i64, tag: &str) -> QueueEntry {
        QueueEntry::new(id, correlation_id, QueueType::new(tag).unwrap(), Utc::now())
    }

    async fn seed(store: &impl QueueStore, entries: Vec<QueueEntry>) {
        let mut tx = store.begin().await.unwrap();
        for e in &entries {
            tx.insert(e).await.unwrap();
        }
        tx.commit().await.unwrap();
    }

    #[tokio::test]
    #[ignore = "requires QUEUEBENCH_PG_DSN"]
    async fn test_claim_round_trip() {
        let store = isolated_store().await;
        seed(&store, vec![entry(1, 1, "type2")]).await;

        let mut tx = store.begin().await.unwrap();
        let claimed = tx
            .claim_next(&QueueType::new("type2").unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!((claimed.id, claimed.correlation_id), (1, 1));
        assert_eq!(claimed.queue_type.as_str(), "type2");
    }

    #[tokio::test]
    #[ignore = "requires QUEUEBENCH_PG_DSN"]
    async fn test_concurrent_claims_skip_locked_rows() {
        let store = isolated_store().await;
        seed(&store, vec![entry(1, 1, "type1"), entry(2, 2, "type1")]).await;
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
    #[ignore = "requires QUEUEBENCH_PG_DSN"]
    async fn test_rollback_keeps_entry_claimable() {
        let store = isolated_store().await;
        seed(&store, vec![entry(7, 2, "type3")]).await;
        let qt = QueueType::new("type3").unwrap();

        let mut tx = store.begin().await.unwrap();
        let claimed = tx.claim_next(&qt).await.unwrap().unwrap();
        tx.retire(&claimed, RetireMode::Delete, Utc::now()).await.unwrap();
        tx.rollback().await.unwrap();

        assert_eq!(store.count_pending(Some(&qt)).await.unwrap(), 1);
    }

    #[tokio::test]
    #[ignore = "requires QUEUEBENCH_PG_DSN"]
    async fn test_retire_modes_and_max_id() {
        let store = isolated_store().await;
        seed(&store, vec![entry(1, 1, "type1"), entry(2, 1, "type1")]).await;
        let qt = QueueType::new("type1").unwrap();

        for mode in [RetireMode::Delete, RetireMode::MarkProcessed] {
            let mut tx = store.begin().await.unwrap();
            let claimed = tx.claim_next(&qt).await.unwrap().unwrap();
            tx.retire(&claimed, mode, Utc::now()).await.unwrap();
            tx.commit().await.unwrap();
        }

        assert_eq!(store.count_pending(None).await.unwrap(), 0);
        assert_eq!(store.max_entry_id().await.unwrap(), Some(2));
    }
}
