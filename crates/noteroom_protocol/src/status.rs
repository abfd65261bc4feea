//! Sync result statuses.

use serde::{Deserialize, Serialize};

/// The outcome classification of one sync attempt.
///
/// The serialized names are part of the external interface; clients switch
/// on them to decide whether to re-render, retry, or surface a conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// The guarded write won its compare-and-swap on the first try.
    Ok,
    /// The caller supplied no conflict-detection context, so the write was
    /// applied unconditionally.
    OkFallback,
    /// The write lost its compare-and-swap but the client's edit was
    /// re-applied cleanly onto the current server text.
    OkMerged,
    /// The client's edit overlaps a concurrent edit and could not be
    /// re-applied; the response carries the authoritative content.
    ConflictMergeFailed,
    /// The retry budget ran out while racing other writers; the response
    /// carries the authoritative content.
    ConflictRetriesExhausted,
    /// Validation or internal failure; no authoritative content attached.
    Error,
}

impl SyncStatus {
    /// Returns true if the document content changed as a result of the sync.
    #[must_use]
    pub fn changed_content(&self) -> bool {
        matches!(
            self,
            SyncStatus::Ok | SyncStatus::OkFallback | SyncStatus::OkMerged
        )
    }

    /// Returns true for conflict-level outcomes.
    ///
    /// Conflicts still carry the current authoritative content so the
    /// caller can resynchronize; errors do not.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            SyncStatus::ConflictMergeFailed | SyncStatus::ConflictRetriesExhausted
        )
    }
}
