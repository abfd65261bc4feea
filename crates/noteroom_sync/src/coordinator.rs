//! The sync coordinator.

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::resolver::{MergeAttempt, MergeResolver};
use noteroom_protocol::{EditResponse, SyncStatus};
use noteroom_store::{Document, DocumentStore, PendingEdit, RoomId, Version};
use std::sync::Arc;
use tracing::{debug, warn};

/// Detail message attached to `conflict_merge_failed` responses.
const MERGE_FAILED_DETAIL: &str = "Automatic merge failed. Please review the latest content.";

/// Detail message attached to `conflict_retries_exhausted` responses.
const RETRIES_EXHAUSTED_DETAIL: &str =
    "Unable to resolve conflict after multiple attempts. Please refresh and try again.";

/// The result of a completed sync call.
///
/// Every outcome, conflict or not, carries the current authoritative
/// content and version; the caller can always resynchronize its view even
/// when its own write was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOutcome {
    /// Outcome classification.
    pub status: SyncStatus,
    /// Current authoritative content.
    pub content: String,
    /// Current authoritative version.
    pub version: Version,
}

impl SyncOutcome {
    fn new(status: SyncStatus, document: Document) -> Self {
        Self {
            status,
            content: document.content,
            version: document.version,
        }
    }

    /// Returns true if the document content changed as a result of the call.
    #[must_use]
    pub fn changed(&self) -> bool {
        self.status.changed_content()
    }

    /// Converts the outcome into a wire response, attaching the standard
    /// detail message for conflict statuses.
    #[must_use]
    pub fn into_response(self) -> EditResponse {
        let response =
            EditResponse::with_document(self.status, self.content, self.version);
        match self.status {
            SyncStatus::ConflictMergeFailed => response.with_error_detail(MERGE_FAILED_DETAIL),
            SyncStatus::ConflictRetriesExhausted => {
                response.with_error_detail(RETRIES_EXHAUSTED_DETAIL)
            }
            _ => response,
        }
    }
}

/// Orchestrates the write path: compare-and-swap, merge, bounded retries.
///
/// Used identically by the request/response surface and the streaming
/// surface; the coordinator has no knowledge of either transport.
#[derive(Clone)]
pub struct SyncCoordinator {
    store: Arc<dyn DocumentStore>,
    resolver: MergeResolver,
    config: SyncConfig,
}

impl SyncCoordinator {
    /// Creates a coordinator over the given store.
    pub fn new(store: Arc<dyn DocumentStore>, config: SyncConfig) -> Self {
        let resolver = MergeResolver::new(Arc::clone(&store));
        Self {
            store,
            resolver,
            config,
        }
    }

    /// Returns the underlying store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    /// Applies a client edit to a room's document.
    ///
    /// See the crate docs for the full resolution ladder. Storage failures
    /// abort with an error; every other outcome, including conflicts,
    /// resolves to a [`SyncOutcome`] carrying authoritative state.
    pub async fn sync(&self, room_id: &RoomId, edit: PendingEdit) -> SyncResult<SyncOutcome> {
        let len = edit.proposed_content.chars().count();
        if len > self.config.max_content_len {
            return Err(SyncError::ContentTooLong {
                len,
                max: self.config.max_content_len,
            });
        }

        let (base_version, base_content) = match (edit.base_version, edit.base_content) {
            (Some(version), Some(content)) => (version, content),
            _ => {
                warn!(room = %room_id, "edit lacks conflict-detection context, using fallback");
                let doc = self
                    .store
                    .write_unconditional(room_id, &edit.proposed_content)
                    .await?;
                return Ok(SyncOutcome::new(SyncStatus::OkFallback, doc));
            }
        };

        for attempt in 0..self.config.retry.max_attempts {
            let swapped = self
                .store
                .compare_and_swap(room_id, &edit.proposed_content, base_version)
                .await?;
            if swapped {
                let doc = self.store.read(room_id).await?;
                return Ok(SyncOutcome::new(SyncStatus::Ok, doc));
            }

            debug!(room = %room_id, attempt, "write lost its swap, attempting merge");
            match self
                .resolver
                .attempt(room_id, &edit.proposed_content, &base_content)
                .await?
            {
                MergeAttempt::Merged(doc) => {
                    return Ok(SyncOutcome::new(SyncStatus::OkMerged, doc));
                }
                MergeAttempt::Failed(doc) => {
                    return Ok(SyncOutcome::new(SyncStatus::ConflictMergeFailed, doc));
                }
                MergeAttempt::Retry => {
                    if attempt + 1 < self.config.retry.max_attempts {
                        tokio::time::sleep(self.config.retry.delay_for_attempt(attempt + 1)).await;
                    }
                }
            }
        }

        warn!(room = %room_id, "retry budget exhausted, surfacing conflict");
        let doc = self.store.read(room_id).await?;
        Ok(SyncOutcome::new(SyncStatus::ConflictRetriesExhausted, doc))
    }
}
