//! Connection hub, fanout relay, and session handling for noteroom.
//!
//! This crate is the serving layer on top of the sync engine. It knows
//! nothing about sockets: transports plug in through [`SessionIo`], room
//! access control through [`RoomValidator`], and abuse control through
//! [`RateLimiter`].
//!
//! The pieces compose like this:
//!
//! - [`ConnectionHub`] tracks live connections per room and broadcasts
//!   frames to them, in this process only.
//! - [`FanoutRelay`] extends a broadcast across process instances through a
//!   pub/sub [`Broker`], suppressing the echo of its own publishes.
//! - [`Session`] drives one streaming client through its lifecycle:
//!   rate-limit check, room validation, initial snapshot, edit loop.
//! - [`NoteApi`] is the stateless request/response twin of the session.
//!
//! A broker is optional. Without one, or with one that is down, everything
//! keeps working within a single process and fanout is simply narrower.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod api;
mod auth;
mod broker;
mod config;
mod error;
mod hub;
mod relay;
mod session;

pub use api::NoteApi;
pub use auth::{
    block_message, AllowAllLimiter, RateDecision, RateLimiter, RoomMeta, RoomValidator,
    StaticRoom, StaticRoomValidator, SCOPE_NOTE,
};
pub use broker::{Broker, BrokerError, BrokerMessage, BrokerResult, BrokerSubscription, LoopbackBroker};
pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use hub::{ConnectionHub, ConnectionId, HubConnection};
pub use relay::{FanoutRelay, RelayListener};
pub use session::{
    ChannelIo, ClientEnd, Session, SessionClose, SessionContext, SessionIo, SessionState,
};
