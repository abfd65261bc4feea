//! Room validation and rate-limit collaborator seams.

use async_trait::async_trait;
use noteroom_store::RoomId;
use parking_lot::Mutex;
use std::collections::HashMap;

/// Rate-limit scope for note session handshakes.
pub const SCOPE_NOTE: &str = "note";

/// Room metadata returned by a successful validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomMeta {
    /// The canonical room identifier.
    pub room_id: RoomId,
    /// Days the room's note is retained. The external retention sweep reads
    /// this; the engine itself never schedules deletion.
    pub retention_days: u32,
}

/// Decides whether a client may attach to a room.
///
/// Sessions first validate the identifier as a room id. When that fails, the
/// identifier is retried as an owner id: a client holding an owner's
/// identifier and credential is routed to that owner's room.
#[async_trait]
pub trait RoomValidator: Send + Sync {
    /// Validates access to a room.
    ///
    /// A credential of `None` checks only that the room exists, for the
    /// read-only request surface.
    async fn validate(&self, room_id: &RoomId, credential: Option<&str>) -> Option<RoomMeta>;

    /// Resolves an owner identifier plus credential to that owner's room.
    async fn resolve_owner(&self, _owner_id: &str, _credential: &str) -> Option<RoomId> {
        None
    }
}

/// The verdict of a pre-handshake rate-limit check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateDecision {
    /// The client may proceed.
    Allowed,
    /// The client is blocked; `label` names the active block window.
    Blocked {
        /// Short label for the block window, used in the client message.
        label: String,
    },
}

/// Tracks failed handshakes per client address.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Checks whether a client may attempt a handshake.
    async fn check(&self, scope: &str, client_addr: &str) -> RateDecision;

    /// Records a failed credential attempt. Returns a block label if this
    /// failure tripped a block window.
    async fn record_failure(&self, scope: &str, client_addr: &str) -> Option<String>;

    /// Clears the failure count after a successful handshake.
    async fn record_success(&self, scope: &str, client_addr: &str);
}

/// Builds the message sent to a client blocked by the rate limiter.
#[must_use]
pub fn block_message(label: &str) -> String {
    format!("Too many failed attempts. Try again in {label}.")
}

/// A limiter that never blocks, for tests and trusted deployments.
#[derive(Debug, Default, Clone, Copy)]
pub struct AllowAllLimiter;

#[async_trait]
impl RateLimiter for AllowAllLimiter {
    async fn check(&self, _scope: &str, _client_addr: &str) -> RateDecision {
        RateDecision::Allowed
    }

    async fn record_failure(&self, _scope: &str, _client_addr: &str) -> Option<String> {
        None
    }

    async fn record_success(&self, _scope: &str, _client_addr: &str) {}
}

/// One room in a [`StaticRoomValidator`].
#[derive(Debug, Clone)]
pub struct StaticRoom {
    /// The room identifier.
    pub room_id: RoomId,
    /// The identifier of the room's owner.
    pub owner_id: String,
    /// The shared credential guarding the room.
    pub credential: String,
    /// Retention period handed back in [`RoomMeta`].
    pub retention_days: u32,
}

/// An in-memory validator over a fixed set of rooms.
#[derive(Default)]
pub struct StaticRoomValidator {
    rooms: Mutex<HashMap<RoomId, StaticRoom>>,
}

impl StaticRoomValidator {
    /// Creates an empty validator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a room.
    pub fn add_room(&self, room: StaticRoom) {
        self.rooms.lock().insert(room.room_id.clone(), room);
    }
}

#[async_trait]
impl RoomValidator for StaticRoomValidator {
    async fn validate(&self, room_id: &RoomId, credential: Option<&str>) -> Option<RoomMeta> {
        let rooms = self.rooms.lock();
        let room = rooms.get(room_id)?;
        match credential {
            Some(given) if given != room.credential => None,
            _ => Some(RoomMeta {
                room_id: room.room_id.clone(),
                retention_days: room.retention_days,
            }),
        }
    }

    async fn resolve_owner(&self, owner_id: &str, credential: &str) -> Option<RoomId> {
        self.rooms
            .lock()
            .values()
            .find(|room| room.owner_id == owner_id && room.credential == credential)
            .map(|room| room.room_id.clone())
    }
}
