// Queuebench Infrastructure - SQLite Adapter
// Implements: QueueStore, QueueTransaction

mod connection;
mod error;
mod queue_store;
mod schema;
mod transaction;

pub use connection::create_pool;
pub use error::map_sqlx_error;
pub use queue_store::SqliteQueueStore;
pub use schema::{load_schema, SCHEMA};
pub use transaction::SqliteQueueTransaction;

// Note: sqlx::Error conversion is handled by map_sqlx_error
// due to Rust's orphan rules (cannot implement From<sqlx::Error> for AppError here)

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use tempfile::TempDir;

    /// Fresh store over a temp-file database with the bundled schema loaded
    ///
    /// `sqlite::memory:` is per connection, so pooled tests need a real file.
    pub async fn temp_store() -> (TempDir, SqliteQueueStore) {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("queue.db").display());
        let pool = create_pool(&url, 4).await.unwrap();
        load_schema(&pool, SCHEMA).await.unwrap();
        (dir, SqliteQueueStore::new(pool))
    }
}
