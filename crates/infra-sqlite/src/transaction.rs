// SQLite Transaction Implementation

use crate::map_sqlx_error;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use queuebench_core::domain::{QueueEntry, QueueType, RetireMode};
use queuebench_core::error::{AppError, Result};
use queuebench_core::port::{QueueTransaction, Transaction};
use sqlx::{Sqlite, Transaction as SqlxTransaction};
use tracing::trace;

/// The claim is a no-op write so it takes the write lock up front:
/// a concurrent claimer blocks until this transaction ends and then
/// sees the row as retired (or still pending after a rollback).
const CLAIM_NEXT: &str = r#"
    UPDATE msg_queue SET processed_at = processed_at
    WHERE msg_id = (
        SELECT msg_id FROM msg_queue
        WHERE queue_type = ? AND processed_at IS NULL
        ORDER BY enqueued_at, msg_id
        LIMIT 1
    )
    RETURNING msg_id, correlation_id, queue_type, enqueued_at, processed_at
"#;

#[derive(sqlx::FromRow)]
struct EntryRow {
    msg_id: i64,
    correlation_id: i64,
    queue_type: String,
    enqueued_at: i64,
    processed_at: Option<i64>,
}

impl TryFrom<EntryRow> for QueueEntry {
    type Error = AppError;

    fn try_from(row: EntryRow) -> Result<Self> {
        Ok(QueueEntry {
            id: row.msg_id,
            correlation_id: row.correlation_id,
            queue_type: QueueType::new(row.queue_type)?,
            enqueued_at: from_micros(row.enqueued_at)?,
            processed_at: row.processed_at.map(from_micros).transpose()?,
        })
    }
}

fn from_micros(micros: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_micros(micros)
        .ok_or_else(|| AppError::Store(format!("timestamp out of range: {}", micros)))
}

pub struct SqliteQueueTransaction {
    tx: SqlxTransaction<'static, Sqlite>,
}

impl SqliteQueueTransaction {
    pub fn new(tx: SqlxTransaction<'static, Sqlite>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl Transaction for SqliteQueueTransaction {
    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await.map_err(map_sqlx_error)
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.tx.rollback().await.map_err(map_sqlx_error)
    }
}

#[async_trait]
impl QueueTransaction for SqliteQueueTransaction {
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
            RetireMode::Delete => sqlx::query("DELETE FROM msg_queue WHERE msg_id = ?")
                .bind(entry.id)
                .execute(&mut *self.tx)
                .await,
            RetireMode::MarkProcessed => sqlx::query(
                "UPDATE msg_queue SET processed_at = ? WHERE msg_id = ? AND processed_at IS NULL",
            )
            .bind(at.timestamp_micros())
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
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(entry.id)
        .bind(entry.correlation_id)
        .bind(entry.queue_type.as_str())
        .bind(entry.enqueued_at.timestamp_micros())
        .bind(entry.processed_at.map(|at| at.timestamp_micros()))
        .execute(&mut *self.tx)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }
}
