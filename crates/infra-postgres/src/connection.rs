// PostgreSQL Connection Pool Setup

use crate::map_sqlx_error;
use queuebench_core::error::Result;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(30);

/// Parse a `postgres://` DSN
pub fn connect_options(database_url: &str) -> Result<PgConnectOptions> {
    PgConnectOptions::from_str(database_url).map_err(map_sqlx_error)
}

/// Create the shared connection pool
pub async fn create_pool(database_url: &str, max_connections: u32) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(ACQUIRE_TIMEOUT)
        .connect_with(connect_options(database_url)?)
        .await
        .map_err(map_sqlx_error)?;

    info!(max_connections, "PostgreSQL pool ready");
    Ok(pool)
}
