//! In-process registry of live connections, grouped by room.

use noteroom_protocol::ServerMessage;
use noteroom_store::RoomId;
use parking_lot::Mutex;
use std::collections::HashMap;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

/// Identifies one live connection within this process.
pub type ConnectionId = Uuid;

/// A connection's end of the hub: its identifier and the stream of frames
/// broadcast to it. Dropping the receiver is enough to leave the room; the
/// hub prunes dead senders on the next broadcast.
pub struct HubConnection {
    /// The identifier assigned to this connection.
    pub id: ConnectionId,
    /// Frames broadcast to this connection by other participants.
    pub receiver: mpsc::UnboundedReceiver<ServerMessage>,
}

/// Tracks which connections are viewing which room.
///
/// The hub never touches a transport: it hands each registered connection a
/// channel and pushes broadcast frames into it. Senders that have gone dead
/// are dropped lazily during broadcast, and a room entry disappears with its
/// last connection.
#[derive(Default)]
pub struct ConnectionHub {
    rooms: Mutex<HashMap<RoomId, HashMap<ConnectionId, mpsc::UnboundedSender<ServerMessage>>>>,
}

impl ConnectionHub {
    /// Creates an empty hub.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new connection in a room.
    pub fn connect(&self, room_id: &RoomId) -> HubConnection {
        let id = Uuid::new_v4();
        let (sender, receiver) = mpsc::unbounded_channel();
        self.rooms
            .lock()
            .entry(room_id.clone())
            .or_default()
            .insert(id, sender);
        debug!(room = %room_id, connection = %id, "connection joined");
        HubConnection { id, receiver }
    }

    /// Removes a connection from a room. Idempotent.
    pub fn disconnect(&self, room_id: &RoomId, id: ConnectionId) {
        let mut rooms = self.rooms.lock();
        if let Some(members) = rooms.get_mut(room_id) {
            if members.remove(&id).is_some() {
                debug!(room = %room_id, connection = %id, "connection left");
            }
            if members.is_empty() {
                rooms.remove(room_id);
            }
        }
    }

    /// Sends a frame to every connection in a room, skipping `exclude`.
    ///
    /// Returns the number of connections the frame was delivered to. Sending
    /// happens outside the registry lock; connections whose receiver is gone
    /// are pruned afterwards.
    pub fn broadcast(
        &self,
        room_id: &RoomId,
        message: &ServerMessage,
        exclude: Option<ConnectionId>,
    ) -> usize {
        let targets: Vec<(ConnectionId, mpsc::UnboundedSender<ServerMessage>)> = {
            let rooms = self.rooms.lock();
            match rooms.get(room_id) {
                Some(members) => members
                    .iter()
                    .filter(|(id, _)| Some(**id) != exclude)
                    .map(|(id, sender)| (*id, sender.clone()))
                    .collect(),
                None => return 0,
            }
        };

        let mut delivered = 0;
        let mut dead = Vec::new();
        for (id, sender) in targets {
            if sender.send(message.clone()).is_ok() {
                delivered += 1;
            } else {
                dead.push(id);
            }
        }

        if !dead.is_empty() {
            debug!(room = %room_id, pruned = dead.len(), "pruned dead connections");
            let mut rooms = self.rooms.lock();
            if let Some(members) = rooms.get_mut(room_id) {
                for id in dead {
                    members.remove(&id);
                }
                if members.is_empty() {
                    rooms.remove(room_id);
                }
            }
        }

        delivered
    }

    /// Returns the number of connections currently in a room.
    #[must_use]
    pub fn room_size(&self, room_id: &RoomId) -> usize {
        self.rooms
            .lock()
            .get(room_id)
            .map_or(0, HashMap::len)
    }

    /// Returns true if the hub still holds an entry for the room.
    #[must_use]
    pub fn contains_room(&self, room_id: &RoomId) -> bool {
        self.rooms.lock().contains_key(room_id)
    }
}
