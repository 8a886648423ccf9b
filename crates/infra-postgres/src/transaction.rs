// PostgreSQL Transaction Implementation

use crate::map_sqlx_error;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use queuebench_core::domain::{QueueEntry, QueueType, RetireMode};
use queuebench_core::error::{AppError, Result};
use queuebench_core::port::{QueueTransaction, Transaction};
use sqlx::{Postgres, Transaction as SqlxTransaction};
use tracing::trace;

const CLAIM_NEXT: &str = r#"
    SELECT msg_id, correlation_id, queue_type, enqueued_at, processed_at
    FROM msg_queue
    WHERE queue_type = $1 AND processed_at IS NULL
    ORDER BY enqueued_at, msg_id
    LIMIT 1
    FOR UPDATE SKIP LOCKED
"#;

#[derive(sqlx::FromRow)]
struct EntryRow {
    msg_id: i64,
    correlation_id: i64,
    queue_type: String,
    enqueued_at: DateTime<Utc>,
    processed_at: Option<DateTime<Utc>>,
}

impl TryFrom<EntryRow> for QueueEntry {
    type Error = AppError;

    fn try_from(row: EntryRow) -> Result<Self> {
        Ok(QueueEntry {
            id: row.msg_id,
            correlation_id: row.correlation_id,
            queue_type: QueueType::new(row.queue_type)?,
            enqueued_at: row.enqueued_at,
            processed_at: row.processed_at,
        })
    }
}

pub struct PostgresQueueTransaction {
    tx: SqlxTransaction<'static, Postgres>,
}

impl PostgresQueueTransaction {
    pub fn new(tx: SqlxTransaction<'static, Postgres>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl Transaction for PostgresQueueTransaction {
    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await.map_err(map_sqlx_error)
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.tx.rollback().await.map_err(map_sqlx_error)
    }
}

#[async_trait]
impl QueueTransaction for PostgresQueueTransaction {
    async fn claim_next(&mut self, queue_type: &QueueType) -> Result<Option<QueueEntry>> {
        let row: Option<EntryRow> = sqlx::query_as(CLAIM_NEXT)
            .bind(queue_type.as_str())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(map_sqlx_error)?;

        let entry = row.map(QueueEntry::try_from).transpose()?;
        if let Some(entry) = &entry {
            trace!(entry_id = entry.id, queue_type = %queue_type, "Claimed");
        }
        Ok(entry)
    }

    async fn retire(
        &mut self,
        entry: &QueueEntry,
        mode: RetireMode,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let result = match mode {
            RetireMode::Delete => sqlx::query("DELETE FROM msg_queue WHERE msg_id = $1")
                .bind(entry.id)
                .execute(&mut *self.tx)
                .await,
            RetireMode::MarkProcessed => sqlx::query(
                "UPDATE msg_queue SET processed_at = $1 WHERE msg_id = $2 AND processed_at IS NULL",
            )
            .bind(at)
            .bind(entry.id)
            .execute(&mut *self.tx)
            .await,
        }
        .map_err(map_sqlx_error)?;

        if result.rows_affected() != 1 {
            return Err(AppError::InvalidState(format!(
                "entry {} is no longer pending",
                entry.id
            )));
        }
        Ok(())
    }

    async fn insert(&mut self, entry: &QueueEntry) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO msg_queue (msg_id, correlation_id, queue_type, enqueued_at, processed_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(entry.id)
        .bind(entry.correlation_id)
        .bind(entry.queue_type.as_str())
        .bind(entry.enqueued_at)
        .bind(entry.processed_at)
        .execute(&mut *self.tx)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }
}
