//! Stateless request/response surface over the sync engine.

use crate::auth::RoomValidator;
use crate::error::ServerResult;
use noteroom_protocol::{EditRequest, EditResponse};
use noteroom_store::{Document, RoomId};
use noteroom_sync::SyncCoordinator;
use std::sync::Arc;
use tracing::error;

/// The HTTP-shaped note API, with the transport layer left to the caller.
///
/// Unlike a streaming session, the API holds no connection state: each call
/// validates the room, runs the engine, and returns. Updates made here are
/// not fanned out; pollers pick them up on their next read.
#[derive(Clone)]
pub struct NoteApi {
    coordinator: SyncCoordinator,
    validator: Arc<dyn RoomValidator>,
}

impl NoteApi {
    /// Creates the API surface.
    pub fn new(coordinator: SyncCoordinator, validator: Arc<dyn RoomValidator>) -> Self {
        Self {
            coordinator,
            validator,
        }
    }

    /// Reads the current document state.
    ///
    /// Returns `None` when the room does not exist; a room that exists but
    /// has never been written reads as an empty document.
    pub async fn get_state(&self, room_id: &RoomId) -> ServerResult<Option<Document>> {
        if self.validator.validate(room_id, None).await.is_none() {
            return Ok(None);
        }
        let document = self.coordinator.store().get_or_create(room_id).await?;
        Ok(Some(document))
    }

    /// Applies an edit and returns the wire response.
    ///
    /// Validation failures and internal errors both come back as `error`
    /// responses rather than transport-level failures, matching the
    /// streaming surface's ack frames.
    pub async fn post_edit(&self, room_id: &RoomId, request: EditRequest) -> EditResponse {
        if self.validator.validate(room_id, None).await.is_none() {
            return EditResponse::error("Room not found");
        }

        match self
            .coordinator
            .sync(room_id, request.into_pending_edit())
            .await
        {
            Ok(outcome) => outcome.into_response(),
            Err(rejection) if rejection.is_validation() => {
                EditResponse::error(rejection.to_string())
            }
            Err(storage) => {
                error!(room = %room_id, error = %storage, "edit failed");
                EditResponse::error("Internal server error")
            }
        }
    }
}
