//! Core types for cartsync.
//!
//! Clients exchange opaque frames through the hub. A small subset of those
//! frames are cart updates, which the hub persists; this crate defines how
//! frames are normalized and how updates are recognized.

mod envelope;
mod frame;
mod history;

pub use envelope::{CART_VERSION_TAG, CartVersion, EnvelopeError};
pub use frame::{FRAME_SEPARATOR, normalize};
pub use history::{CartHistory, HISTORY_LIMIT};

/// A stored cart: arbitrary JSON object.
pub type Cart = serde_json::Map<String, serde_json::Value>;
