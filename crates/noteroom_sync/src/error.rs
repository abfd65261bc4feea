//! Error types for the sync coordinator.

use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that abort a sync call.
///
/// Compare-and-swap losses and failed merges are *not* errors; they are
/// expected outcomes reported through the sync status. Errors here mean the
/// call could not produce an authoritative answer at all.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The proposed content exceeds the configured ceiling.
    ///
    /// Rejected before any storage access.
    #[error("content exceeds max length of {max} characters (got {len})")]
    ContentTooLong {
        /// Length of the rejected content, in characters.
        len: usize,
        /// The configured ceiling.
        max: usize,
    },

    /// The document store failed after exhausting its own retries.
    #[error("storage error: {0}")]
    Store(#[from] noteroom_store::StoreError),
}

impl SyncError {
    /// Returns true for validation failures the caller caused.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, SyncError::ContentTooLong { .. })
    }
}
