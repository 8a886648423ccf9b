// sqlx::Error -> AppError mapping for SQLite

use queuebench_core::error::AppError;

/// Convert sqlx::Error to AppError::Store with structured information
pub fn map_sqlx_error(err: sqlx::Error) -> AppError {
    match &err {
        sqlx::Error::Database(db_err) => {
            if let Some(code) = db_err.code() {
                let code_str = code.as_ref();

                // SQLite error codes: https://www.sqlite.org/rescode.html
                match code_str {
                    "2067" | "1555" => AppError::Store(format!(
                        "Unique constraint violation: {} ({})",
                        db_err.message(),
                        code_str
                    )),
                    // SQLITE_BUSY / SQLITE_BUSY_SNAPSHOT: busy_timeout ran out
                    "5" | "517" => AppError::Store(format!(
                        "Database locked (SQLITE_BUSY): {}",
                        db_err.message()
                    )),
                    "13" => AppError::Store(format!("Database full: {}", db_err.message())),
                    _ => AppError::Store(format!(
                        "Database error [{}]: {}",
                        code_str,
                        db_err.message()
                    )),
                }
            } else {
                AppError::Store(format!("Database error: {}", db_err.message()))
            }
        }
        sqlx::Error::RowNotFound => AppError::NotFound("Row not found".to_string()),
        sqlx::Error::ColumnNotFound(col) => AppError::Store(format!("Column not found: {}", col)),
        sqlx::Error::PoolTimedOut => {
            AppError::Store("Timed out waiting for a pooled connection".to_string())
        }
        sqlx::Error::Configuration(cause) => {
            AppError::Config(format!("Invalid SQLite connection string: {}", cause))
        }
        _ => AppError::Store(err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_not_found_maps_to_not_found() {
        assert!(matches!(
            map_sqlx_error(sqlx::Error::RowNotFound),
            AppError::NotFound(_)
        ));
    }

    #[test]
    fn test_pool_timeout_is_store_error() {
        assert!(map_sqlx_error(sqlx::Error::PoolTimedOut).is_store());
    }
}
