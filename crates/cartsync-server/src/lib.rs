//! Connection hub and HTTP surface for cartsync.
//!
//! Every WebSocket connection registers with a single [`Hub`] task. The hub
//! fans each inbound frame out to all live connections and persists cart
//! updates, so all mutations are ordered by one channel.

pub mod config;
pub mod connection;
pub mod http;
pub mod hub;
pub mod keepalive;

pub use hub::{ConnectionId, Hub, HubError, HubHandle};
pub use keepalive::Keepalive;
