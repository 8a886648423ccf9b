// sqlx::Error -> AppError mapping for PostgreSQL

use queuebench_core::error::AppError;

/// Convert sqlx::Error to AppError::Store, decoding SQLSTATE codes
pub fn map_sqlx_error(err: sqlx::Error) -> AppError {
    match &err {
        sqlx::Error::Database(db_err) => {
            let message = db_err.message();
            match db_err.code().as_deref() {
                // https://www.postgresql.org/docs/current/errcodes-appendix.html
                Some("23505") => AppError::Store(format!("Unique constraint violation: {}", message)),
                Some("40001") => AppError::Store(format!("Serialization failure: {}", message)),
                Some("40P01") => AppError::Store(format!("Deadlock detected: {}", message)),
                Some("42P01") => AppError::Store(format!(
                    "Undefined table (schema not loaded?): {}",
                    message
                )),
                Some("57014") => AppError::Store(format!("Query canceled: {}", message)),
                Some(code) => AppError::Store(format!("Database error [{}]: {}", code, message)),
                None => AppError::Store(format!("Database error: {}", message)),
            }
        }
        sqlx::Error::RowNotFound => AppError::NotFound("Row not found".to_string()),
        sqlx::Error::PoolTimedOut => {
            AppError::Store("Timed out waiting for a pooled connection".to_string())
        }
        sqlx::Error::Configuration(cause) => {
            AppError::Config(format!("Invalid PostgreSQL connection string: {}", cause))
        }
        _ => AppError::Store(err.to_string()),
    }
}
