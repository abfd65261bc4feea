//! Streaming session lifecycle over an abstract transport.

use crate::auth::{block_message, RateDecision, RateLimiter, RoomValidator, SCOPE_NOTE};
use crate::error::{ServerError, ServerResult};
use crate::hub::{ConnectionHub, ConnectionId, HubConnection};
use crate::relay::FanoutRelay;
use async_trait::async_trait;
use noteroom_protocol::{ClientMessage, EditResponse, ServerMessage, UpdatePayload};
use noteroom_store::RoomId;
use noteroom_sync::SyncCoordinator;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// The transport a session reads frames from and writes frames to.
///
/// The websocket (or any other streaming transport) layer implements this;
/// the session logic never sees the socket itself.
#[async_trait]
pub trait SessionIo: Send {
    /// Sends a frame to the client.
    async fn send(&mut self, frame: &ServerMessage) -> ServerResult<()>;

    /// Receives the next raw text frame, or `None` once the client is gone.
    ///
    /// Must be cancellation-safe: the session polls it inside a select loop
    /// and drops the future whenever a broadcast arrives first.
    async fn recv(&mut self) -> Option<String>;
}

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Transport open, handshake not yet validated.
    Connecting,
    /// Room access validated, snapshot not yet delivered.
    Authenticated,
    /// Snapshot delivered, edit loop running.
    Active,
    /// Session over; the connection has left the hub.
    Closed,
}

/// Why a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionClose {
    /// The rate limiter refused the handshake.
    RateLimited,
    /// Room validation failed, including the owner-id fallback.
    AuthFailed,
    /// The client closed its end.
    ClientDisconnect,
    /// The transport refused a send; the client is unreachable.
    TransportFailed,
    /// The document store failed before the session could start.
    StorageFailed,
}

/// Shared collaborators handed to every session.
#[derive(Clone)]
pub struct SessionContext {
    /// Local connection registry.
    pub hub: Arc<ConnectionHub>,
    /// Cross-process fanout.
    pub relay: Arc<FanoutRelay>,
    /// The write path.
    pub coordinator: SyncCoordinator,
    /// Room access control.
    pub validator: Arc<dyn RoomValidator>,
    /// Handshake rate limiting.
    pub limiter: Arc<dyn RateLimiter>,
}

/// One streaming client's session.
///
/// Drives the full lifecycle: rate-limit check, room validation with the
/// owner-id fallback, initial snapshot, then the edit loop. Malformed frames
/// get an error frame back and the session stays open; unknown frame types
/// are ignored. The session always leaves the hub on the way out, whatever
/// the close reason.
pub struct Session<T: SessionIo> {
    ctx: SessionContext,
    io: T,
    client_addr: String,
    state: SessionState,
}

impl<T: SessionIo> Session<T> {
    /// Creates a session over a freshly accepted transport.
    pub fn new(ctx: SessionContext, io: T, client_addr: impl Into<String>) -> Self {
        Self {
            ctx,
            io,
            client_addr: client_addr.into(),
            state: SessionState::Connecting,
        }
    }

    /// The session's current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Runs the session to completion.
    ///
    /// `room_id` is the identifier the client presented; when it names no
    /// room it is retried as an owner identifier.
    pub async fn run(mut self, room_id: RoomId, credential: &str) -> SessionClose {
        if let RateDecision::Blocked { label } =
            self.ctx.limiter.check(SCOPE_NOTE, &self.client_addr).await
        {
            warn!(addr = %self.client_addr, %label, "handshake refused by rate limiter");
            self.state = SessionState::Closed;
            return SessionClose::RateLimited;
        }

        let room = match self.resolve_room(&room_id, credential).await {
            Some(room) => room,
            None => {
                self.state = SessionState::Closed;
                return SessionClose::AuthFailed;
            }
        };
        self.state = SessionState::Authenticated;
        self.ctx
            .limiter
            .record_success(SCOPE_NOTE, &self.client_addr)
            .await;

        let snapshot = match self.ctx.coordinator.store().get_or_create(&room).await {
            Ok(document) => document,
            Err(storage) => {
                error!(room = %room, error = %storage, "failed to load snapshot");
                let _ = self
                    .io
                    .send(&ServerMessage::Error {
                        error: "Internal server error".into(),
                    })
                    .await;
                self.state = SessionState::Closed;
                return SessionClose::StorageFailed;
            }
        };
        if self.io.send(&ServerMessage::init(&snapshot)).await.is_err() {
            self.state = SessionState::Closed;
            return SessionClose::TransportFailed;
        }

        let mut conn = self.ctx.hub.connect(&room);
        self.state = SessionState::Active;
        info!(room = %room, connection = %conn.id, "session active");

        let close = self.edit_loop(&room, &mut conn).await;

        self.ctx.hub.disconnect(&room, conn.id);
        self.state = SessionState::Closed;
        debug!(room = %room, connection = %conn.id, ?close, "session closed");
        close
    }

    /// Validates the presented identifier, falling back to owner lookup.
    async fn resolve_room(&mut self, room_id: &RoomId, credential: &str) -> Option<RoomId> {
        if let Some(meta) = self
            .ctx
            .validator
            .validate(room_id, Some(credential))
            .await
        {
            return Some(meta.room_id);
        }
        if let Some(room) = self
            .ctx
            .validator
            .resolve_owner(room_id.as_str(), credential)
            .await
        {
            debug!(owner = %room_id, room = %room, "owner identifier resolved to room");
            return Some(room);
        }

        let block = self
            .ctx
            .limiter
            .record_failure(SCOPE_NOTE, &self.client_addr)
            .await;
        let detail = match block {
            Some(label) => block_message(&label),
            None => "Invalid room or credential".into(),
        };
        let _ = self.io.send(&ServerMessage::Error { error: detail }).await;
        None
    }

    /// Pumps peer broadcasts out and client frames in until the session ends.
    async fn edit_loop(&mut self, room: &RoomId, conn: &mut HubConnection) -> SessionClose {
        loop {
            tokio::select! {
                broadcast = conn.receiver.recv() => match broadcast {
                    Some(frame) => {
                        if self.io.send(&frame).await.is_err() {
                            return SessionClose::TransportFailed;
                        }
                    }
                    // The hub pruned this connection; treat it as a close.
                    None => return SessionClose::TransportFailed,
                },
                incoming = self.io.recv() => match incoming {
                    None => return SessionClose::ClientDisconnect,
                    Some(text) => {
                        if let Err(close) = self.handle_frame(room, conn.id, &text).await {
                            return close;
                        }
                    }
                },
            }
        }
    }

    /// Processes one raw client frame.
    async fn handle_frame(
        &mut self,
        room: &RoomId,
        conn_id: ConnectionId,
        text: &str,
    ) -> Result<(), SessionClose> {
        let frame: ClientMessage = match serde_json::from_str(text) {
            Ok(frame) => frame,
            Err(parse) => {
                debug!(room = %room, error = %parse, "malformed frame");
                return self
                    .reply(&ServerMessage::Error {
                        error: "Invalid message format".into(),
                    })
                    .await;
            }
        };
        let Some(edit) = frame.into_pending_edit() else {
            // Unknown frame types are ignored, not fatal.
            return Ok(());
        };

        match self.ctx.coordinator.sync(room, edit).await {
            Ok(outcome) => {
                let update = outcome.changed().then(|| {
                    ServerMessage::Update(UpdatePayload {
                        content: outcome.content.clone(),
                        version: outcome.version,
                        status: outcome.status,
                    })
                });
                self.reply(&ServerMessage::Ack(outcome.into_response()))
                    .await?;
                if let Some(update) = update {
                    self.ctx.hub.broadcast(room, &update, Some(conn_id));
                    self.ctx.relay.publish_update(room, &update).await;
                }
                Ok(())
            }
            Err(rejection) if rejection.is_validation() => {
                self.reply(&ServerMessage::Ack(EditResponse::error(rejection.to_string())))
                    .await
            }
            Err(storage) => {
                error!(room = %room, error = %storage, "sync failed");
                self.reply(&ServerMessage::Error {
                    error: "Internal server error".into(),
                })
                .await
            }
        }
    }

    async fn reply(&mut self, frame: &ServerMessage) -> Result<(), SessionClose> {
        self.io
            .send(frame)
            .await
            .map_err(|_| SessionClose::TransportFailed)
    }
}

/// An in-process [`SessionIo`] over channels, for tests and embedding.
pub struct ChannelIo {
    incoming: mpsc::UnboundedReceiver<String>,
    outgoing: mpsc::UnboundedSender<ServerMessage>,
}

/// The client side of a [`ChannelIo`] pair.
pub struct ClientEnd {
    /// Sends raw text frames to the session.
    pub input: mpsc::UnboundedSender<String>,
    /// Receives frames from the session.
    pub frames: mpsc::UnboundedReceiver<ServerMessage>,
}

impl ChannelIo {
    /// Creates a connected transport pair.
    #[must_use]
    pub fn pair() -> (Self, ClientEnd) {
        let (input, incoming) = mpsc::unbounded_channel();
        let (outgoing, frames) = mpsc::unbounded_channel();
        (Self { incoming, outgoing }, ClientEnd { input, frames })
    }
}

#[async_trait]
impl SessionIo for ChannelIo {
    async fn send(&mut self, frame: &ServerMessage) -> ServerResult<()> {
        self.outgoing
            .send(frame.clone())
            .map_err(|_| ServerError::ConnectionClosed)
    }

    async fn recv(&mut self) -> Option<String> {
        self.incoming.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AllowAllLimiter, StaticRoom, StaticRoomValidator};
    use noteroom_protocol::SyncStatus;
    use noteroom_store::{DocumentStore, MemoryStore};
    use noteroom_sync::SyncConfig;

    fn context(store: MemoryStore) -> SessionContext {
        let hub = Arc::new(ConnectionHub::new());
        let relay = Arc::new(FanoutRelay::new(Arc::clone(&hub), None));
        let validator = StaticRoomValidator::new();
        validator.add_room(StaticRoom {
            room_id: RoomId::new("room-1"),
            owner_id: "owner-1".into(),
            credential: "123456".into(),
            retention_days: 30,
        });
        SessionContext {
            hub,
            relay,
            coordinator: SyncCoordinator::new(Arc::new(store), SyncConfig::new()),
            validator: Arc::new(validator),
            limiter: Arc::new(AllowAllLimiter),
        }
    }

    fn save_frame(content: &str, version: noteroom_store::Version, base: &str) -> String {
        serde_json::to_string(&ClientMessage::Save {
            content: content.into(),
            last_known_version: Some(version),
            base_content: Some(base.into()),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn handshake_sends_snapshot_then_acks_saves() {
        let store = MemoryStore::new();
        let ctx = context(store);
        let (io, mut client) = ChannelIo::pair();
        let session = Session::new(ctx, io, "10.0.0.1");
        let task = tokio::spawn(session.run(RoomId::new("room-1"), "123456"));

        let Some(ServerMessage::Init { content, version }) = client.frames.recv().await else {
            panic!("expected init frame");
        };
        assert_eq!(content, "");

        client.input.send(save_frame("hello", version, "")).unwrap();
        let Some(ServerMessage::Ack(ack)) = client.frames.recv().await else {
            panic!("expected ack frame");
        };
        assert_eq!(ack.status, SyncStatus::Ok);
        assert_eq!(ack.content.as_deref(), Some("hello"));

        drop(client.input);
        assert_eq!(task.await.unwrap(), SessionClose::ClientDisconnect);
    }

    #[tokio::test]
    async fn bad_credential_closes_with_error_frame() {
        let ctx = context(MemoryStore::new());
        let (io, mut client) = ChannelIo::pair();
        let session = Session::new(ctx, io, "10.0.0.1");

        let close = session.run(RoomId::new("room-1"), "999999").await;
        assert_eq!(close, SessionClose::AuthFailed);
        assert!(matches!(
            client.frames.recv().await,
            Some(ServerMessage::Error { .. })
        ));
    }

    #[tokio::test]
    async fn owner_identifier_falls_back_to_owned_room() {
        let store = MemoryStore::new();
        let ctx = context(store.clone());
        let (io, mut client) = ChannelIo::pair();
        let session = Session::new(ctx, io, "10.0.0.1");
        let task = tokio::spawn(session.run(RoomId::new("owner-1"), "123456"));

        assert!(matches!(
            client.frames.recv().await,
            Some(ServerMessage::Init { .. })
        ));
        // The snapshot was created under the owner's room, not the raw id.
        assert_eq!(store.read(&RoomId::new("room-1")).await.unwrap().content, "");

        drop(client.input);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn malformed_frames_keep_the_session_open() {
        let ctx = context(MemoryStore::new());
        let (io, mut client) = ChannelIo::pair();
        let session = Session::new(ctx, io, "10.0.0.1");
        let task = tokio::spawn(session.run(RoomId::new("room-1"), "123456"));

        let Some(ServerMessage::Init { version, .. }) = client.frames.recv().await else {
            panic!("expected init frame");
        };

        client.input.send("{not json".into()).unwrap();
        assert!(matches!(
            client.frames.recv().await,
            Some(ServerMessage::Error { .. })
        ));

        // Unknown frame types are silently ignored.
        client
            .input
            .send(r#"{"type":"presence","user":"x"}"#.into())
            .unwrap();

        // The session still processes saves afterwards.
        client.input.send(save_frame("still here", version, "")).unwrap();
        let Some(ServerMessage::Ack(ack)) = client.frames.recv().await else {
            panic!("expected ack frame");
        };
        assert_eq!(ack.status, SyncStatus::Ok);

        drop(client.input);
        assert_eq!(task.await.unwrap(), SessionClose::ClientDisconnect);
    }

    #[tokio::test]
    async fn oversized_save_is_acked_as_error_without_closing() {
        let store = MemoryStore::new();
        let mut ctx = context(store);
        ctx.coordinator = SyncCoordinator::new(
            Arc::clone(ctx.coordinator.store()),
            SyncConfig::new().with_max_content_len(4),
        );
        let (io, mut client) = ChannelIo::pair();
        let session = Session::new(ctx, io, "10.0.0.1");
        let task = tokio::spawn(session.run(RoomId::new("room-1"), "123456"));

        let Some(ServerMessage::Init { version, .. }) = client.frames.recv().await else {
            panic!("expected init frame");
        };

        client
            .input
            .send(save_frame("way too long", version, ""))
            .unwrap();
        let Some(ServerMessage::Ack(ack)) = client.frames.recv().await else {
            panic!("expected ack frame");
        };
        assert_eq!(ack.status, SyncStatus::Error);
        assert!(ack.content.is_none());

        drop(client.input);
        assert_eq!(task.await.unwrap(), SessionClose::ClientDisconnect);
    }

    struct BlockingLimiter;

    #[async_trait]
    impl RateLimiter for BlockingLimiter {
        async fn check(&self, _scope: &str, _addr: &str) -> RateDecision {
            RateDecision::Blocked {
                label: "15 minutes".into(),
            }
        }

        async fn record_failure(&self, _scope: &str, _addr: &str) -> Option<String> {
            None
        }

        async fn record_success(&self, _scope: &str, _addr: &str) {}
    }

    #[tokio::test]
    async fn blocked_address_never_reaches_validation() {
        let mut ctx = context(MemoryStore::new());
        ctx.limiter = Arc::new(BlockingLimiter);
        let (io, _client) = ChannelIo::pair();
        let session = Session::new(ctx, io, "10.0.0.1");

        let close = session.run(RoomId::new("room-1"), "123456").await;
        assert_eq!(close, SessionClose::RateLimited);
    }
}
