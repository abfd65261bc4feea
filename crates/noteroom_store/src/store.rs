//! The document store trait.

use crate::clock::Version;
use crate::document::{Document, RoomId};
use crate::error::StoreResult;
use async_trait::async_trait;

/// Persistent record of each room's current text and version.
///
/// Implementations must be safe to call concurrently from many sessions
/// targeting the same or different rooms. [`compare_and_swap`] is the sole
/// guarded mutation path and must resolve two concurrent attempts against
/// the same room and expected version with exactly one winner.
///
/// [`compare_and_swap`]: DocumentStore::compare_and_swap
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Returns the document for a room, creating an empty one if absent.
    ///
    /// Creation must be race-safe under concurrent first access from two
    /// processes: insert-if-absent is atomic, and a duplicate-key race
    /// resolves by re-reading the winning row rather than erroring.
    async fn get_or_create(&self, room_id: &RoomId) -> StoreResult<Document>;

    /// Returns the current content and version.
    ///
    /// Shares the lazy-creation semantics of [`get_or_create`]: reading a
    /// room that has never been written yields an empty document.
    ///
    /// [`get_or_create`]: DocumentStore::get_or_create
    async fn read(&self, room_id: &RoomId) -> StoreResult<Document> {
        self.get_or_create(room_id).await
    }

    /// Replaces the content and advances the version, but only if the
    /// stored version still equals `expected_version`.
    ///
    /// Returns whether the update took effect. A `false` return is not an
    /// error; it is the expected signal that another write landed first.
    async fn compare_and_swap(
        &self,
        room_id: &RoomId,
        new_content: &str,
        expected_version: Version,
    ) -> StoreResult<bool>;

    /// Replaces the content unconditionally and returns the new document.
    ///
    /// This is the explicit fallback for callers that cannot supply
    /// conflict-detection context. All other writes go through
    /// [`compare_and_swap`].
    ///
    /// [`compare_and_swap`]: DocumentStore::compare_and_swap
    async fn write_unconditional(
        &self,
        room_id: &RoomId,
        new_content: &str,
    ) -> StoreResult<Document>;

    /// Removes a room's document.
    ///
    /// Invoked by the external retention sweep or explicit room deletion;
    /// the engine exposes the hook but never schedules it. Deleting an
    /// absent document is a no-op.
    async fn delete(&self, room_id: &RoomId) -> StoreResult<()>;
}
