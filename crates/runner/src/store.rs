// Store selection by DSN scheme

use queuebench_core::error::{AppError, Result};
use queuebench_core::port::QueueStore;
use queuebench_infra_postgres::PostgresQueueStore;
use queuebench_infra_sqlite::SqliteQueueStore;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Postgres,
    Sqlite,
}

impl Backend {
    pub fn from_dsn(dsn: &str) -> Result<Self> {
        if dsn.starts_with("postgres://") || dsn.starts_with("postgresql://") {
            Ok(Backend::Postgres)
        } else if dsn.starts_with("sqlite:") {
            Ok(Backend::Sqlite)
        } else {
            Err(AppError::Config(format!(
                "unsupported DSN scheme in {:?} (expected postgres:// or sqlite:)",
                dsn
            )))
        }
    }

    fn bundled_schema(self) -> &'static str {
        match self {
            Backend::Postgres => queuebench_infra_postgres::SCHEMA,
            Backend::Sqlite => queuebench_infra_sqlite::SCHEMA,
        }
    }
}

/// Read a DDL file; a missing or unreadable file is a configuration error
pub fn read_schema(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| {
        AppError::Config(format!("cannot read schema file {}: {}", path.display(), e))
    })
}

/// Connect, load the schema and hand back the store behind its port
pub async fn open_store(
    dsn: &str,
    max_connections: u32,
    schema: Option<&Path>,
) -> Result<Arc<dyn QueueStore>> {
    let backend = Backend::from_dsn(dsn)?;
    let ddl = match schema {
        Some(path) => read_schema(path)?,
        None => backend.bundled_schema().to_string(),
    };
    info!(backend = ?backend, custom_schema = schema.is_some(), "Opening store");

    let store: Arc<dyn QueueStore> = match backend {
        Backend::Postgres => {
            let pool = queuebench_infra_postgres::create_pool(dsn, max_connections).await?;
            queuebench_infra_postgres::load_schema(&pool, &ddl).await?;
            Arc::new(PostgresQueueStore::new(pool))
        }
        Backend::Sqlite => {
            let pool = queuebench_infra_sqlite::create_pool(dsn, max_connections).await?;
            queuebench_infra_sqlite::load_schema(&pool, &ddl).await?;
            Arc::new(SqliteQueueStore::new(pool))
        }
    };
    Ok(store)
}
