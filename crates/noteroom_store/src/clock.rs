//! Version tokens and the logical clock that issues them.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// An opaque, strictly increasing document revision token.
///
/// Versions are derived from microseconds since the Unix epoch but carry no
/// wall-clock authority: the only contract is that every successful write
/// observes a strictly greater token than the one before it, and that tokens
/// compare for equality. Callers must never interpret the value as a time.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct Version(u64);

impl Version {
    /// Creates a version from a raw microsecond token.
    ///
    /// Intended for persistence layers and wire decoding; application code
    /// should obtain versions from a [`LogicalClock`] or a store read.
    #[must_use]
    pub fn from_micros(micros: u64) -> Self {
        Self(micros)
    }

    /// Returns the raw token for persistence or wire encoding.
    #[must_use]
    pub fn as_micros(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Issues strictly increasing [`Version`] tokens.
///
/// The clock follows the wall clock at microsecond resolution but never
/// repeats or goes backwards within a process: if the OS clock stalls or
/// steps back, the next token is simply the previous one plus one.
///
/// Across processes sharing a durable store each clock runs independently,
/// so the raw tokens are only roughly time-ordered. Durable backends close
/// that gap themselves by flooring every stored version at the previous one
/// plus one; see [`SqliteStore`](crate::SqliteStore).
#[derive(Debug, Default)]
pub struct LogicalClock {
    last: AtomicU64,
}

impl LogicalClock {
    /// Creates a new clock.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the next version token.
    pub fn next(&self) -> Version {
        let now = Self::wall_micros();
        let mut last = self.last.load(Ordering::Relaxed);
        loop {
            let candidate = now.max(last + 1);
            match self.last.compare_exchange_weak(
                last,
                candidate,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return Version(candidate),
                Err(observed) => last = observed,
            }
        }
    }

    fn wall_micros() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_micros() as u64
    }
}
