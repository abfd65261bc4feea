//! Request, response, frame, and relay message types.

use crate::status::SyncStatus;
use noteroom_store::{Document, PendingEdit, RoomId, Version};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Broker channel prefix for room update channels.
pub const CHANNEL_PREFIX: &str = "note:room:";

/// An edit submitted through the request/response surface.
///
/// `last_known_version` and `base_content` are optional: omitting either
/// routes the write through the unconditional fallback path, which cannot
/// detect conflicts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditRequest {
    /// The full text the client wants the document to become.
    #[serde(default)]
    pub content: String,
    /// The version the client last observed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_known_version: Option<Version>,
    /// The text the client started editing from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_content: Option<String>,
}

impl EditRequest {
    /// Converts the request into the engine's pending-edit form.
    #[must_use]
    pub fn into_pending_edit(self) -> PendingEdit {
        PendingEdit {
            proposed_content: self.content,
            base_version: self.last_known_version,
            base_content: self.base_content,
        }
    }
}

/// The result of one edit, shared verbatim by both surfaces.
///
/// Conflict statuses always carry the current authoritative content and
/// version so the client can resynchronize without a follow-up read;
/// `error` carries neither.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditResponse {
    /// Outcome classification.
    pub status: SyncStatus,
    /// Current authoritative content, absent only on errors.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Current authoritative version, absent only on errors.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<Version>,
    /// Human-readable detail for conflicts and errors.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl EditResponse {
    /// Builds a response carrying authoritative state.
    #[must_use]
    pub fn with_document(status: SyncStatus, content: String, version: Version) -> Self {
        Self {
            status,
            content: Some(content),
            version: Some(version),
            error: None,
        }
    }

    /// Attaches a human-readable detail message.
    #[must_use]
    pub fn with_error_detail(mut self, detail: impl Into<String>) -> Self {
        self.error = Some(detail.into());
        self
    }

    /// Builds an error response with no content attached.
    #[must_use]
    pub fn error(detail: impl Into<String>) -> Self {
        Self {
            status: SyncStatus::Error,
            content: None,
            version: None,
            error: Some(detail.into()),
        }
    }
}

/// A frame sent by a streaming client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// An edit intent with optional conflict-detection context.
    Save {
        /// The full text the client wants the document to become.
        #[serde(default)]
        content: String,
        /// The version the client last observed.
        #[serde(default)]
        last_known_version: Option<Version>,
        /// The text the client started editing from.
        #[serde(default)]
        base_content: Option<String>,
    },
    /// Any frame type this version does not understand.
    ///
    /// Unknown frames are ignored rather than closing the session, so newer
    /// clients can talk to older servers.
    #[serde(other)]
    Other,
}

impl ClientMessage {
    /// Converts a save frame into the engine's pending-edit form.
    ///
    /// Returns `None` for non-save frames.
    #[must_use]
    pub fn into_pending_edit(self) -> Option<PendingEdit> {
        match self {
            ClientMessage::Save {
                content,
                last_known_version,
                base_content,
            } => Some(PendingEdit {
                proposed_content: content,
                base_version: last_known_version,
                base_content,
            }),
            ClientMessage::Other => None,
        }
    }
}

/// The body of an `update` broadcast to a room's other viewers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdatePayload {
    /// The new authoritative content.
    pub content: String,
    /// The new authoritative version.
    pub version: Version,
    /// How the write landed (`ok`, `ok_fallback`, or `ok_merged`).
    pub status: SyncStatus,
}

/// A frame sent by the server to a streaming client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// The current document snapshot, sent once after authentication.
    Init {
        /// Current authoritative content.
        content: String,
        /// Current authoritative version.
        version: Version,
    },
    /// The sender's own edit result.
    Ack(EditResponse),
    /// Another participant changed the document.
    Update(UpdatePayload),
    /// A malformed frame or an internal failure.
    Error {
        /// Human-readable detail.
        error: String,
    },
}

impl ServerMessage {
    /// Builds the initial snapshot frame for a document.
    #[must_use]
    pub fn init(document: &Document) -> Self {
        ServerMessage::Init {
            content: document.content.clone(),
            version: document.version,
        }
    }
}

/// The broker-side wrapper for cross-process fanout.
///
/// `source` identifies the publishing process instance; a subscriber that
/// sees its own identifier discards the envelope, because it already
/// broadcast locally before publishing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayEnvelope {
    /// The room the update belongs to.
    pub room_id: RoomId,
    /// The frame to forward to local connections.
    pub payload: ServerMessage,
    /// The publishing process instance.
    pub source: Uuid,
}

impl RelayEnvelope {
    /// Returns the broker channel name for a room.
    #[must_use]
    pub fn channel_for(room_id: &RoomId) -> String {
        format!("{CHANNEL_PREFIX}{room_id}")
    }

    /// Extracts the room identifier from a channel name, if it matches the
    /// room-channel prefix.
    #[must_use]
    pub fn room_from_channel(channel: &str) -> Option<RoomId> {
        channel.strip_prefix(CHANNEL_PREFIX).map(RoomId::new)
    }
}
