//! # Noteroom Protocol
//!
//! Wire messages for the noteroom sync engine.
//!
//! Both external surfaces speak these types: the request/response surface
//! exchanges [`EditRequest`]/[`EditResponse`], and the streaming surface
//! wraps the same fields in [`ClientMessage`]/[`ServerMessage`] frames.
//! [`RelayEnvelope`] is the broker-side wrapper that carries an update from
//! the process that accepted a write to every other process.
//!
//! All messages serialize as JSON with externally visible field and status
//! names; changing a serialized name is a wire-compatibility break.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod messages;
mod status;

pub use messages::{
    ClientMessage, EditRequest, EditResponse, RelayEnvelope, ServerMessage, UpdatePayload,
    CHANNEL_PREFIX,
};
pub use status::SyncStatus;
