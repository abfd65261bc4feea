//! In-memory document store.

use crate::clock::{LogicalClock, Version};
use crate::document::{Document, RoomId};
use crate::error::StoreResult;
use crate::store::DocumentStore;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone)]
struct Row {
    content: String,
    version: Version,
}

/// An in-memory document store.
///
/// Suitable for unit tests, integration tests, and single-process
/// deployments that do not need durability. Compare-and-swap is performed
/// under the map's write lock, so two concurrent attempts against the same
/// room and expected version resolve with exactly one winner.
///
/// # Thread Safety
///
/// The store is cheap to clone and safe to share across tasks.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    rooms: Arc<RwLock<HashMap<RoomId, Row>>>,
    clock: Arc<LogicalClock>,
}

impl MemoryStore {
    /// Creates a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of documents currently held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rooms.read().len()
    }

    /// Returns true if the store holds no documents.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rooms.read().is_empty()
    }

    fn document(&self, room_id: &RoomId, row: &Row) -> Document {
        Document {
            room_id: room_id.clone(),
            content: row.content.clone(),
            version: row.version,
        }
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get_or_create(&self, room_id: &RoomId) -> StoreResult<Document> {
        if let Some(row) = self.rooms.read().get(room_id) {
            return Ok(self.document(room_id, row));
        }

        let mut rooms = self.rooms.write();
        // Lost the upgrade race: another task inserted first, keep its row.
        let row = rooms.entry(room_id.clone()).or_insert_with(|| Row {
            content: String::new(),
            version: self.clock.next(),
        });
        Ok(self.document(room_id, row))
    }

    async fn compare_and_swap(
        &self,
        room_id: &RoomId,
        new_content: &str,
        expected_version: Version,
    ) -> StoreResult<bool> {
        let mut rooms = self.rooms.write();
        match rooms.get_mut(room_id) {
            Some(row) if row.version == expected_version => {
                row.content = new_content.to_owned();
                row.version = self.clock.next();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn write_unconditional(
        &self,
        room_id: &RoomId,
        new_content: &str,
    ) -> StoreResult<Document> {
        let mut rooms = self.rooms.write();
        let version = self.clock.next();
        rooms.insert(
            room_id.clone(),
            Row {
                content: new_content.to_owned(),
                version,
            },
        );
        Ok(Document {
            room_id: room_id.clone(),
            content: new_content.to_owned(),
            version,
        })
    }

    async fn delete(&self, room_id: &RoomId) -> StoreResult<()> {
        self.rooms.write().remove(room_id);
        Ok(())
    }
}
