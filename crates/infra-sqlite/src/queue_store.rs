// SQLite QueueStore Implementation

use crate::{map_sqlx_error, SqliteQueueTransaction};
use async_trait::async_trait;
use queuebench_core::domain::{EntryId, QueueType};
use queuebench_core::error::Result;
use queuebench_core::port::{PoolStats, QueueStore, QueueTransaction};
use sqlx::SqlitePool;

pub struct SqliteQueueStore {
    pool: SqlitePool,
}

impl SqliteQueueStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl QueueStore for SqliteQueueStore {
    async fn begin(&self) -> Result<Box<dyn QueueTransaction>> {
        let tx = self.pool.begin().await.map_err(map_sqlx_error)?;
        Ok(Box::new(SqliteQueueTransaction::new(tx)))
    }

    async fn count_pending(&self, queue_type: Option<&QueueType>) -> Result<i64> {
        let tag = queue_type.map(QueueType::as_str);
        sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM msg_queue
            WHERE processed_at IS NULL AND (? IS NULL OR queue_type = ?)
            "#,
        )
        .bind(tag)
        .bind(tag)
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
