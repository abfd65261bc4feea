//! Three-way merge of a losing write onto the current server text.

use crate::error::SyncResult;
use noteroom_merge::PatchSet;
use noteroom_store::{Document, DocumentStore, RoomId};
use std::sync::Arc;
use tracing::{debug, warn};

/// The outcome of one merge attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeAttempt {
    /// The client's delta re-applied cleanly and the merged text won its
    /// compare-and-swap. Carries the new authoritative document.
    Merged(Document),
    /// The delta re-applied cleanly but another write landed before the
    /// merged text could be swapped in. This is a race to be retried, not
    /// a conflict.
    Retry,
    /// At least one hunk of the delta could not be located in the server
    /// text. Carries the current authoritative document so the client can
    /// re-render and re-edit.
    Failed(Document),
}

/// Re-applies a losing client edit against the current server text.
///
/// The resolver diffs the client's base snapshot against its proposed text
/// and replays that delta onto whatever the document says now, locating each
/// hunk by its surrounding context. It never overwrites concurrent edits it
/// cannot account for: an overlapping change fails the merge and surfaces
/// the authoritative state instead.
#[derive(Clone)]
pub struct MergeResolver {
    store: Arc<dyn DocumentStore>,
}

impl MergeResolver {
    /// Creates a resolver over the given store.
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Attempts to merge `proposed_content` (edited from `base_content`)
    /// onto the current server text.
    pub async fn attempt(
        &self,
        room_id: &RoomId,
        proposed_content: &str,
        base_content: &str,
    ) -> SyncResult<MergeAttempt> {
        let current = self.store.read(room_id).await?;

        let patches = PatchSet::from_texts(base_content, proposed_content);
        let report = patches.apply(&current.content);

        if !report.all_applied() {
            warn!(
                room = %room_id,
                failed = report.applied.iter().filter(|ok| !**ok).count(),
                total = report.applied.len(),
                "merge failed, surfacing authoritative content"
            );
            return Ok(MergeAttempt::Failed(current));
        }

        let swapped = self
            .store
            .compare_and_swap(room_id, &report.merged, current.version)
            .await?;
        if !swapped {
            debug!(room = %room_id, "merge lost its swap, retrying");
            return Ok(MergeAttempt::Retry);
        }

        let merged = self.store.read(room_id).await?;
        Ok(MergeAttempt::Merged(merged))
    }
}
