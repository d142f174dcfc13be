//! Error types for the sync engine.

use offsync_protocol::ResolveError;
use offsync_store::StoreError;
use thiserror::Error;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors that can occur during engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Local storage error.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// A remote call failed.
    #[error("remote call failed: {message}")]
    Remote {
        /// Error message.
        message: String,
        /// Whether the call can be retried.
        retryable: bool,
    },

    /// A sync pass could not start because the network is offline.
    #[error("network offline")]
    Offline,

    /// An imported snapshot is malformed. No state was changed.
    #[error("invalid snapshot: {0}")]
    ImportFormat(String),

    /// A snapshot could not be produced.
    #[error("snapshot error: {0}")]
    Snapshot(String),

    /// Conflict resolution failed.
    #[error("conflict resolution failed: {0}")]
    Resolve(#[from] ResolveError),
}

impl EngineError {
    /// Creates a retryable remote error.
    pub fn remote_retryable(message: impl Into<String>) -> Self {
        Self::Remote {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable remote error.
    pub fn remote_fatal(message: impl Into<String>) -> Self {
        Self::Remote {
            message: message.into(),
            retryable: false,
        }
    }

    /// Returns true if this error can be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            EngineError::Remote { retryable, .. } => *retryable,
            EngineError::Offline => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_errors() {
        assert!(EngineError::remote_retryable("connection reset").is_retryable());
        assert!(!EngineError::remote_fatal("bad request").is_retryable());
        assert!(EngineError::Offline.is_retryable());
        assert!(!EngineError::ImportFormat("truncated".into()).is_retryable());
    }

    #[test]
    fn error_display() {
        let err = EngineError::Offline;
        assert_eq!(err.to_string(), "network offline");

        let err = EngineError::remote_retryable("HTTP 503");
        assert!(err.to_string().contains("HTTP 503"));
    }
}
