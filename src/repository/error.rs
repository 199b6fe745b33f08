//! Repository error types

use thiserror::Error;

/// Errors that can occur in the persistence layer
#[derive(Error, Debug)]
pub enum RepositoryError {
    /// SQLite reported a failure
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A uniqueness constraint was violated
    #[error("Conflict: {0}")]
    Conflict(String),

    /// A stored value could not be decoded
    #[error("Corrupt row: {0}")]
    Corruption(String),

    /// The connection mutex was poisoned
    #[error("Lock error: {0}")]
    Lock(String),

    /// The blocking task running the query failed
    #[error("Task error: {0}")]
    Task(String),

    /// IO error (creating the database directory)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for repository operations
pub type RepositoryResult<T> = Result<T, RepositoryError>;
