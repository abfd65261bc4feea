//! Server configuration.

use std::time::Duration;

/// Tunables for the server layer.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// How long the relay listener waits before resubscribing after its
    /// broker subscription fails or ends.
    pub relay_restart_delay: Duration,
}

impl ServerConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self {
            relay_restart_delay: Duration::from_secs(1),
        }
    }

    /// Sets the relay listener restart delay.
    #[must_use]
    pub fn with_relay_restart_delay(mut self, delay: Duration) -> Self {
        self.relay_restart_delay = delay;
        self
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new()
    }
}
