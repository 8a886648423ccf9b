// Central Error Type for the Harness

use thiserror::Error;

/// Application-level error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Domain error: {0}")]
    Domain(#[from] crate::domain::DomainError),

    /// Any store failure other than an empty claim (claim, retire, insert, commit)
    #[error("Store error: {0}")]
    Store(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// The supervisor stopped the run after a task failure
    #[error("Run aborted: {0}")]
    Aborted(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// True for failures raised by the store adapters
    pub fn is_store(&self) -> bool {
        matches!(self, AppError::Store(_))
    }
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

// Note: sqlx::Error conversion lives in the infra crates
// (orphan rules), each mapping into AppError::Store(String)
