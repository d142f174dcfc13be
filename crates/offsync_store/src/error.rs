//! Error types for store operations.

use std::io;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Persisted state could not be encoded or decoded.
    #[error("codec error: {0}")]
    Codec(String),

    /// Another process holds the data directory lock.
    #[error("store locked: another process has exclusive access")]
    Locked,

    /// Persisted state is structurally invalid.
    #[error("store corrupted: {0}")]
    Corrupted(String),
}

impl StoreError {
    /// Creates a codec error.
    pub fn codec(message: impl Into<String>) -> Self {
        Self::Codec(message.into())
    }

    /// Creates a corruption error.
    pub fn corrupted(message: impl Into<String>) -> Self {
        Self::Corrupted(message.into())
    }
}
