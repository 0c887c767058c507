//! Error types for the storage layer.

use thiserror::Error;

/// A result type using `StoreError`.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The requested record was not found.
    #[error("record not found")]
    NotFound,

    /// A uniqueness constraint was violated.
    #[error("duplicate record")]
    Duplicate,

    /// A database error occurred.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The opaque config column failed to decode.
    #[error("config decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// A stored field holds a value the domain types reject.
    #[error("corrupt record: {0}")]
    Corrupt(String),
}
