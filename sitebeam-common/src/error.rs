//! Common error types for sitebeam

use thiserror::Error;

/// Common result type for sitebeam operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across sitebeam services
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Source file could not be read as tabular data
    #[error("Parse error: {0}")]
    Parse(String),

    /// No usable rows in the source file
    #[error("Validation error: {0}")]
    Validation(String),

    /// Illegal state transition (e.g. retrying a batch that is not failed)
    #[error("Illegal state: {0}")]
    State(String),

    /// Persisted counts disagree with session bookkeeping
    #[error("Integrity error: {0}")]
    Integrity(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// True for transient database lock contention, which the queue layer
    /// retries with backoff instead of failing the batch.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Database(db_err) => db_err.to_string().contains("database is locked"),
            _ => false,
        }
    }
}
