//! # Swapmeet Realtime Crate
//!
//! The live messaging and presence layer of the Swapmeet marketplace. A
//! client opens one long-lived connection, authenticates once at handshake
//! time, and from then on every interaction is bidirectional event passing:
//! joining conversation rooms, sending messages, typing indicators, read
//! receipts, status updates, and per-user notifications.
//!
//! ## Architecture
//!
//! - [`hub::RealtimeHub`]: owns all shared runtime state — the presence
//!   table, the room registry, and one outbound channel per connection.
//! - [`dispatcher::dispatch`]: handles each inbound [`events::ClientEvent`]
//!   and fans the resulting [`events::ServerEvent`]s out to rooms or users.
//! - [`store::ConversationStore`]: the narrow seam to the conversation
//!   store, consulted to authorize room joins.
//!
//! Everything here is process-local. Presence is rebuilt from nothing on
//! restart; durable message storage belongs to the wider system.

pub mod connection;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod hub;
pub mod presence;
pub mod rooms;
pub mod store;

pub use connection::ConnectionId;
pub use dispatcher::dispatch;
pub use error::{RealtimeError, RealtimeResult};
pub use events::{
    ClientEvent, MessageKind, MessagePayload, PresenceSnapshot, PresenceStatus, ServerEvent,
    UserSummary,
};
pub use hub::RealtimeHub;
pub use rooms::user_room;
pub use store::{ConversationStore, StoreError};
