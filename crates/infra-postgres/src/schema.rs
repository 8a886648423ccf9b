// Schema Bootstrap

use crate::map_sqlx_error;
use queuebench_core::error::Result;
use sqlx::PgPool;
use tracing::info;

/// Bundled DDL for the `msg_queue` table
pub const SCHEMA: &str = include_str!("../schema.sql");

/// Execute DDL text as one multi-statement batch in a single transaction
///
/// The text is passed through untouched: comments, string literals and
/// trigger or function bodies may all contain `;`.
pub async fn load_schema(pool: &PgPool, ddl: &str) -> Result<()> {
    info!(bytes = ddl.len(), "Loading schema");

    let mut tx = pool.begin().await.map_err(map_sqlx_error)?;
    sqlx::raw_sql(ddl)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;
    tx.commit().await.map_err(map_sqlx_error)?;

    info!("Schema ready");
    Ok(())
}
