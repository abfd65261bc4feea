//! Core data types: rooms, documents, and pending edits.

use crate::clock::Version;
use serde::{Deserialize, Serialize};
use std::fmt;

/// An opaque room identifier.
///
/// Room identifiers are minted and validated by an external collaborator;
/// the store treats them as plain keys and never re-checks ownership.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(String);

impl RoomId {
    /// Creates a room identifier from its string form.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RoomId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// The authoritative text and revision for one room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// The room this document belongs to.
    pub room_id: RoomId,
    /// The current authoritative body.
    pub content: String,
    /// The revision token of the current body.
    pub version: Version,
}

/// A client's proposed edit, never persisted as-is.
///
/// `base_version` and `base_content` describe the snapshot the client
/// started editing from; they are the sole input to conflict detection.
/// When either is absent the coordinator falls back to an unconditional
/// write, deliberately sacrificing conflict detection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingEdit {
    /// The full text the client wants the document to become.
    pub proposed_content: String,
    /// The version the client last observed, if it supplied one.
    pub base_version: Option<Version>,
    /// The text the client started editing from, if it supplied one.
    pub base_content: Option<String>,
}

impl PendingEdit {
    /// Creates an edit that carries full conflict-detection context.
    pub fn new(
        proposed_content: impl Into<String>,
        base_version: Version,
        base_content: impl Into<String>,
    ) -> Self {
        Self {
            proposed_content: proposed_content.into(),
            base_version: Some(base_version),
            base_content: Some(base_content.into()),
        }
    }

    /// Creates an edit without conflict-detection context.
    ///
    /// Such an edit takes the unconditional fallback path.
    pub fn unconditional(proposed_content: impl Into<String>) -> Self {
        Self {
            proposed_content: proposed_content.into(),
            base_version: None,
            base_content: None,
        }
    }

    /// Returns true if both conflict-detection fields are present.
    #[must_use]
    pub fn has_base(&self) -> bool {
        self.base_version.is_some() && self.base_content.is_some()
    }
}
