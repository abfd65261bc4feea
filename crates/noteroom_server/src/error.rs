//! Server-side error types.

use noteroom_store::StoreError;
use noteroom_sync::SyncError;
use thiserror::Error;

/// Errors surfaced by the server layer.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The sync engine rejected or failed the operation.
    #[error(transparent)]
    Sync(#[from] SyncError),

    /// The document store failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The peer's transport is gone; the session should end.
    #[error("connection closed")]
    ConnectionClosed,

    /// A frame could not be encoded for the wire.
    #[error("encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// Convenience alias for server results.
pub type ServerResult<T> = Result<T, ServerError>;
