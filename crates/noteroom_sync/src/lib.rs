//! # Noteroom Sync
//!
//! The write path of the noteroom engine: compare-and-swap first, merge on
//! conflict, retry on races, and surface unresolvable conflicts instead of
//! guessing.
//!
//! ## Write Resolution
//!
//! A [`SyncCoordinator::sync`] call walks this ladder:
//!
//! 1. Content over the configured ceiling is rejected before any storage
//!    access.
//! 2. An edit without conflict-detection context is written unconditionally
//!    and tagged `ok_fallback`.
//! 3. Otherwise the edit attempts a compare-and-swap against the version the
//!    client last saw. A win is `ok`.
//! 4. A loss hands the edit to the [`MergeResolver`], which re-applies the
//!    client's delta onto the current server text with fuzzy context
//!    matching. A clean re-application that also wins its own
//!    compare-and-swap is `ok_merged`.
//! 5. A merge that loses its swap is a race, not a conflict: the ladder
//!    restarts, up to a bounded number of attempts with backoff.
//! 6. A delta that cannot be re-applied is `conflict_merge_failed`; an
//!    exhausted retry budget is `conflict_retries_exhausted`. Both attach
//!    the current authoritative document so the client can resynchronize.
//!
//! Storage failures abort the call as errors; callers must distinguish them
//! from conflicts, because only conflicts carry valid current content.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod coordinator;
mod error;
mod resolver;

pub use config::SyncConfig;
pub use coordinator::{SyncCoordinator, SyncOutcome};
pub use error::{SyncError, SyncResult};
pub use resolver::{MergeAttempt, MergeResolver};
