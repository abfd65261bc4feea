//! Cross-process fanout over the message broker.

use crate::broker::{Broker, BrokerMessage};
use crate::config::ServerConfig;
use crate::hub::ConnectionHub;
use noteroom_protocol::{RelayEnvelope, ServerMessage, CHANNEL_PREFIX};
use noteroom_store::RoomId;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

/// Bridges local room broadcasts across process instances.
///
/// A write that changed document state is broadcast to local connections
/// first, then published to the broker wrapped in a [`RelayEnvelope`] tagged
/// with this process's instance identifier. The relay's listener forwards
/// envelopes from other instances into the local hub and drops its own, so
/// no connection ever sees the same update twice.
///
/// The broker is optional infrastructure. With no broker configured, or with
/// the broker down, local fanout keeps working and publishes are dropped
/// with a warning.
pub struct FanoutRelay {
    hub: Arc<ConnectionHub>,
    broker: Option<Arc<dyn Broker>>,
    instance_id: Uuid,
}

impl FanoutRelay {
    /// Creates a relay over the hub, optionally backed by a broker.
    #[must_use]
    pub fn new(hub: Arc<ConnectionHub>, broker: Option<Arc<dyn Broker>>) -> Self {
        Self {
            hub,
            broker,
            instance_id: Uuid::new_v4(),
        }
    }

    /// The identifier this relay stamps on outgoing envelopes.
    #[must_use]
    pub fn instance_id(&self) -> Uuid {
        self.instance_id
    }

    /// Publishes a room update for other process instances to fan out.
    ///
    /// Broker failures are logged and swallowed: the caller's write already
    /// committed and was broadcast locally, so a dead broker only narrows
    /// fanout to this process.
    pub async fn publish_update(&self, room_id: &RoomId, payload: &ServerMessage) {
        let Some(broker) = &self.broker else {
            debug!(room = %room_id, "no broker configured, skipping cross-process fanout");
            return;
        };

        let envelope = RelayEnvelope {
            room_id: room_id.clone(),
            payload: payload.clone(),
            source: self.instance_id,
        };
        let body = match serde_json::to_string(&envelope) {
            Ok(body) => body,
            Err(error) => {
                warn!(room = %room_id, %error, "failed to encode relay envelope");
                return;
            }
        };

        let channel = RelayEnvelope::channel_for(room_id);
        if let Err(error) = broker.publish(&channel, &body).await {
            warn!(room = %room_id, %error, "broker publish failed, fanout degraded");
        }
    }

    /// Forwards one broker message into the local hub.
    fn handle_message(&self, message: &BrokerMessage) {
        let envelope: RelayEnvelope = match serde_json::from_str(&message.payload) {
            Ok(envelope) => envelope,
            Err(error) => {
                debug!(channel = %message.channel, %error, "discarding unreadable envelope");
                return;
            }
        };

        if envelope.source == self.instance_id {
            return;
        }

        let delivered = self
            .hub
            .broadcast(&envelope.room_id, &envelope.payload, None);
        debug!(room = %envelope.room_id, delivered, "forwarded remote update");
    }
}

/// Handle to a running relay listener task.
///
/// The task stays subscribed to the room-channel prefix for as long as the
/// handle lives, resubscribing after any subscription failure. Dropping the
/// handle signals the task to stop; [`RelayListener::shutdown`] additionally
/// waits for it to exit.
pub struct RelayListener {
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl RelayListener {
    /// Spawns the listener for a relay.
    #[must_use]
    pub fn spawn(relay: Arc<FanoutRelay>, config: &ServerConfig) -> Self {
        let (stop, stopped) = watch::channel(false);
        let task = tokio::spawn(run(relay, stopped, config.relay_restart_delay));
        Self { stop, task }
    }

    /// Stops the listener and waits for it to exit.
    pub async fn shutdown(self) {
        let _ = self.stop.send(true);
        let _ = self.task.await;
    }
}

async fn run(relay: Arc<FanoutRelay>, mut stopped: watch::Receiver<bool>, restart_delay: Duration) {
    let Some(broker) = relay.broker.clone() else {
        debug!("no broker configured, relay listener idle");
        return;
    };

    loop {
        if *stopped.borrow() {
            return;
        }

        match broker.subscribe(CHANNEL_PREFIX).await {
            Ok(mut subscription) => {
                debug!(instance = %relay.instance_id, "relay listener subscribed");
                loop {
                    tokio::select! {
                        _ = stopped.changed() => return,
                        message = subscription.next() => match message {
                            Some(message) => relay.handle_message(&message),
                            None => {
                                warn!("relay subscription ended, resubscribing");
                                break;
                            }
                        },
                    }
                }
            }
            Err(error) => {
                warn!(%error, "broker subscribe failed, fanout degraded");
            }
        }

        tokio::select! {
            _ = stopped.changed() => return,
            () = tokio::time::sleep(restart_delay) => {}
        }
    }
}
