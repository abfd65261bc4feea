//! # Noteroom Store
//!
//! Document store abstraction for the noteroom sync engine.
//!
//! This crate provides the lowest layer of the engine: one versioned text
//! document per room, with an atomic compare-and-swap as the only guarded
//! mutation path.
//!
//! ## Design Principles
//!
//! - The version token is an opaque, strictly increasing logical clock value.
//!   It is compared for equality, never interpreted as wall-clock time.
//! - `compare_and_swap` is the single source of truth for "did my write win".
//!   Two concurrent CAS attempts against the same room and expected version
//!   resolve with exactly one winner.
//! - Documents are created lazily on first access, race-safe under concurrent
//!   first-access from multiple processes.
//! - Transient storage errors (connection loss, busy database) are retryable;
//!   everything else propagates to the caller.
//!
//! ## Available Backends
//!
//! - [`MemoryStore`] - In-process store for tests and single-node use
//! - [`SqliteStore`] - Durable store backed by SQLite
//! - [`RetryingStore`] - Wrapper that retries transient errors with backoff
//!
//! ## Example
//!
//! ```rust
//! use noteroom_store::{DocumentStore, MemoryStore, RoomId};
//!
//! let rt = tokio::runtime::Runtime::new().unwrap();
//! rt.block_on(async {
//!     let store = MemoryStore::new();
//!     let room = RoomId::new("r1");
//!     let doc = store.get_or_create(&room).await.unwrap();
//!     assert!(store
//!         .compare_and_swap(&room, "hello", doc.version)
//!         .await
//!         .unwrap());
//! });
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod clock;
mod document;
mod error;
mod memory;
mod retry;
mod sqlite;
mod store;

pub use clock::{LogicalClock, Version};
pub use document::{Document, PendingEdit, RoomId};
pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use retry::{RetryConfig, RetryingStore};
pub use sqlite::SqliteStore;
pub use store::DocumentStore;
