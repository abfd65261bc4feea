//! Configuration for the sync coordinator.

use noteroom_store::RetryConfig;
use std::time::Duration;

/// Default ceiling on document content length, in characters.
const DEFAULT_MAX_CONTENT_LEN: usize = 10_000;

/// Configuration for sync operations.
///
/// The retry ceiling and backoff constants are empirical defaults, not
/// invariants; they bound the worst-case latency of a single `sync()` call
/// at `max_attempts` times the capped backoff delay.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Maximum accepted content length, in characters.
    pub max_content_len: usize,
    /// Retry behavior for compare-and-swap races on a hot room.
    pub retry: RetryConfig,
}

impl SyncConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self {
            max_content_len: DEFAULT_MAX_CONTENT_LEN,
            retry: RetryConfig::new(3)
                .with_initial_delay(Duration::from_millis(100))
                .with_max_delay(Duration::from_millis(500)),
        }
    }

    /// Sets the content length ceiling.
    #[must_use]
    pub fn with_max_content_len(mut self, max: usize) -> Self {
        self.max_content_len = max;
        self
    }

    /// Sets the retry configuration.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new()
    }
}
