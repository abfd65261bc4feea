//! Retry policy and the retrying store decorator.

use crate::clock::Version;
use crate::document::{Document, RoomId};
use crate::error::{StoreError, StoreResult};
use crate::store::DocumentStore;
use async_trait::async_trait;
use std::time::Duration;
use tracing::warn;

/// Fraction of the backoff delay that jitter may add on top.
const JITTER_SPREAD: f64 = 0.25;

/// Backoff schedule shared by [`RetryingStore`] and the sync coordinator's
/// compare-and-swap loop.
///
/// An attempt budget plus an exponential delay curve: attempt `n` waits
/// `initial_delay * backoff_multiplier^(n-1)`, capped at `max_delay`. The
/// defaults suit a store a few milliseconds away; tune them per deployment.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempt budget, counting the first try.
    pub max_attempts: u32,
    /// Delay before the second attempt; later delays grow from here.
    pub initial_delay: Duration,
    /// Ceiling on any single delay.
    pub max_delay: Duration,
    /// Growth factor applied per attempt.
    pub backoff_multiplier: f64,
    /// Spread delays by up to [`JITTER_SPREAD`] to decorrelate colliding
    /// writers on a hot room.
    pub add_jitter: bool,
}

impl RetryConfig {
    /// A schedule with the given attempt budget and default delay curve.
    #[must_use]
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
            backoff_multiplier: 2.0,
            add_jitter: true,
        }
    }

    /// A schedule that gives up after the first failure.
    #[must_use]
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_multiplier: 1.0,
            add_jitter: false,
        }
    }

    /// Sets the delay before the second attempt.
    #[must_use]
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Sets the delay ceiling.
    #[must_use]
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets the per-attempt growth factor.
    #[must_use]
    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Disables jitter, for deterministic tests.
    #[must_use]
    pub fn without_jitter(mut self) -> Self {
        self.add_jitter = false;
        self
    }

    /// The delay to sleep before the given attempt (0-indexed).
    ///
    /// Attempt 0 runs immediately.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let exponent = attempt.saturating_sub(1) as i32;
        let delay = self
            .initial_delay
            .mul_f64(self.backoff_multiplier.powi(exponent))
            .min(self.max_delay);

        if self.add_jitter {
            delay.mul_f64(1.0 + JITTER_SPREAD * clock_phase())
        } else {
            delay
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::new(3)
    }
}

/// A value in `[0, 1)` drawn from the wall clock's sub-second phase.
///
/// Good enough to decorrelate sleepers; not random and not meant to be.
fn clock_phase() -> f64 {
    use std::time::SystemTime;
    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos();
    f64::from(nanos) / 1_000_000_000.0
}

/// A store decorator that retries transient errors with backoff.
///
/// Only errors classified retryable by [`StoreError::is_retryable`] are
/// retried; everything else, and exhaustion of the attempt budget, surfaces
/// the last error to the caller. Compare-and-swap losses are results, not
/// errors, and pass through untouched.
#[derive(Debug, Clone)]
pub struct RetryingStore<S> {
    inner: S,
    config: RetryConfig,
}

impl<S: DocumentStore> RetryingStore<S> {
    /// Wraps a store with the default retry configuration.
    pub fn new(inner: S) -> Self {
        Self::with_config(inner, RetryConfig::default())
    }

    /// Wraps a store with an explicit retry configuration.
    pub fn with_config(inner: S, config: RetryConfig) -> Self {
        Self { inner, config }
    }

    /// Returns the wrapped store.
    pub fn into_inner(self) -> S {
        self.inner
    }

    async fn run<T, F, Fut>(&self, op: &'static str, mut call: F) -> StoreResult<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = StoreResult<T>>,
    {
        let mut attempt = 0;
        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt + 1 < self.config.max_attempts => {
                    attempt += 1;
                    warn!(
                        op,
                        attempt,
                        max = self.config.max_attempts,
                        error = %err,
                        "transient storage error, retrying"
                    );
                    tokio::time::sleep(self.config.delay_for_attempt(attempt)).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[async_trait]
impl<S: DocumentStore> DocumentStore for RetryingStore<S> {
    async fn get_or_create(&self, room_id: &RoomId) -> StoreResult<Document> {
        self.run("get_or_create", || self.inner.get_or_create(room_id))
            .await
    }

    async fn compare_and_swap(
        &self,
        room_id: &RoomId,
        new_content: &str,
        expected_version: Version,
    ) -> StoreResult<bool> {
        self.run("compare_and_swap", || {
            self.inner
                .compare_and_swap(room_id, new_content, expected_version)
        })
        .await
    }

    async fn write_unconditional(
        &self,
        room_id: &RoomId,
        new_content: &str,
    ) -> StoreResult<Document> {
        self.run("write_unconditional", || {
            self.inner.write_unconditional(room_id, new_content)
        })
        .await
    }

    async fn delete(&self, room_id: &RoomId) -> StoreResult<()> {
        self.run("delete", || self.inner.delete(room_id)).await
    }
}
