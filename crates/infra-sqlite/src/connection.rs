// SQLite Connection Pool Setup

use crate::map_sqlx_error;
use queuebench_core::error::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

/// How long a writer waits for the database lock before failing
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Create SQLite connection pool with WAL mode
///
/// Claims take the database write lock, so concurrent claimers queue up
/// behind `busy_timeout` rather than skipping each other.
pub async fn create_pool(database_url: &str, max_connections: u32) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url)
        .map_err(map_sqlx_error)?
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(BUSY_TIMEOUT)
        .create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await
        .map_err(map_sqlx_error)?;

    info!(max_connections, "SQLite pool ready");
    Ok(pool)
}
