//! Pub/sub broker abstraction for cross-process fanout.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc};
use tracing::debug;

/// Errors raised by a broker backend.
#[derive(Debug, Error)]
pub enum BrokerError {
    /// The broker cannot be reached.
    #[error("broker unavailable: {0}")]
    Unavailable(String),
    /// A publish was rejected or lost.
    #[error("publish failed: {0}")]
    Publish(String),
}

/// Convenience alias for broker results.
pub type BrokerResult<T> = Result<T, BrokerError>;

/// One message delivered to a subscriber.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerMessage {
    /// The channel the message was published on.
    pub channel: String,
    /// The message body.
    pub payload: String,
}

/// A live subscription to a channel prefix.
///
/// Backends push matching messages into the subscription; `next` returning
/// `None` means the backing stream ended and the caller should resubscribe.
pub struct BrokerSubscription {
    receiver: mpsc::Receiver<BrokerMessage>,
}

impl BrokerSubscription {
    /// Wraps a receiver fed by a broker backend.
    #[must_use]
    pub fn new(receiver: mpsc::Receiver<BrokerMessage>) -> Self {
        Self { receiver }
    }

    /// Waits for the next message, or `None` when the stream has ended.
    pub async fn next(&mut self) -> Option<BrokerMessage> {
        self.receiver.recv().await
    }
}

/// A pub/sub message broker.
///
/// The relay treats the broker as optional infrastructure: a failing broker
/// degrades fanout to this process only, it never fails a write.
#[async_trait]
pub trait Broker: Send + Sync {
    /// Publishes a payload on a channel.
    async fn publish(&self, channel: &str, payload: &str) -> BrokerResult<()>;

    /// Subscribes to every channel starting with `prefix`.
    async fn subscribe(&self, prefix: &str) -> BrokerResult<BrokerSubscription>;
}

/// Depth of each subscription's delivery buffer.
const SUBSCRIPTION_BUFFER: usize = 256;

/// An in-process broker for tests and single-node deployments.
///
/// Every subscriber sees every message published by any handle cloned from
/// the same `LoopbackBroker`, which is exactly the topology a networked
/// broker provides between processes.
#[derive(Clone)]
pub struct LoopbackBroker {
    bus: broadcast::Sender<BrokerMessage>,
}

impl LoopbackBroker {
    /// Creates a new loopback broker.
    #[must_use]
    pub fn new() -> Self {
        let (bus, _) = broadcast::channel(SUBSCRIPTION_BUFFER);
        Self { bus }
    }
}

impl Default for LoopbackBroker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Broker for LoopbackBroker {
    async fn publish(&self, channel: &str, payload: &str) -> BrokerResult<()> {
        let message = BrokerMessage {
            channel: channel.to_owned(),
            payload: payload.to_owned(),
        };
        // No subscribers is not a failure; the message is simply unheard.
        let _ = self.bus.send(message);
        Ok(())
    }

    async fn subscribe(&self, prefix: &str) -> BrokerResult<BrokerSubscription> {
        let mut bus = self.bus.subscribe();
        let prefix = prefix.to_owned();
        let (sender, receiver) = mpsc::channel(SUBSCRIPTION_BUFFER);

        tokio::spawn(async move {
            loop {
                match bus.recv().await {
                    Ok(message) => {
                        if !message.channel.starts_with(&prefix) {
                            continue;
                        }
                        if sender.send(message).await.is_err() {
                            return;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!(skipped, "loopback subscriber lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => return,
                }
            }
        });

        Ok(BrokerSubscription::new(receiver))
    }
}
