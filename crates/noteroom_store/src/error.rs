//! Error types for store operations.

use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The connection to the storage engine was lost.
    #[error("storage connection error: {0}")]
    Connection(String),

    /// The storage engine is temporarily busy or locked.
    #[error("storage busy: {0}")]
    Busy(String),

    /// A non-transient backend failure.
    #[error("storage backend error: {0}")]
    Backend(String),

    /// A blocking storage task failed to complete.
    #[error("storage task failed: {0}")]
    Task(String),
}

impl StoreError {
    /// Returns true if the operation may succeed when retried.
    ///
    /// Connection loss and busy/locked conditions are transient; everything
    /// else must propagate to the caller.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Connection(_) | StoreError::Busy(_))
    }
}
