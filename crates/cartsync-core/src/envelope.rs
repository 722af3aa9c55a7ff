//! Cart update envelopes.
//!
//! ```text
//! { "tag": "cartVersion", "data": { "cart": { ... }, "version": "<id>" } }
//! ```

use crate::Cart;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Tag identifying a cart update.
pub const CART_VERSION_TAG: &str = "cartVersion";

/// A decoded cart update: the new cart and the version id it is stored under.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartVersion {
    pub cart: Cart,
    pub version: String,
}

#[derive(Deserialize)]
struct Envelope {
    tag: String,
    #[serde(default)]
    data: Value,
}

impl CartVersion {
    pub fn new(version: impl Into<String>, cart: Cart) -> Self {
        Self {
            cart,
            version: version.into(),
        }
    }

    /// Decode a frame as a cart update.
    ///
    /// Frames with another tag are reported as [`EnvelopeError::UnexpectedTag`]
    /// so callers can tell "not for me" apart from garbage.
    pub fn decode(frame: &[u8]) -> Result<Self, EnvelopeError> {
        let envelope: Envelope = serde_json::from_slice(frame)?;
        if envelope.tag != CART_VERSION_TAG {
            return Err(EnvelopeError::UnexpectedTag(envelope.tag));
        }
        Ok(serde_json::from_value(envelope.data)?)
    }

    /// Encode as a complete envelope frame.
    pub fn encode(&self) -> String {
        serde_json::json!({
            "tag": CART_VERSION_TAG,
            "data": {
                "cart": self.cart,
                "version": self.version,
            },
        })
        .to_string()
    }
}

/// Why a frame is not a cart update.
#[derive(Debug, thiserror::Error)]
pub enum EnvelopeError {
    #[error("malformed envelope: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("unexpected tag: {0:?}")]
    UnexpectedTag(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decode_cart_version() {
        let frame = br#"{"tag":"cartVersion","data":{"cart":{"apples":2},"version":"v2"}}"#;
        let update = CartVersion::decode(frame).unwrap();
        assert_eq!(update.version, "v2");
        assert_eq!(Value::Object(update.cart), json!({"apples": 2}));
    }

    #[test]
    fn other_tag_is_reported() {
        let frame = br#"{"tag":"cursor","data":{"x":1}}"#;
        match CartVersion::decode(frame) {
            Err(EnvelopeError::UnexpectedTag(tag)) => assert_eq!(tag, "cursor"),
            other => panic!("expected unexpected tag, got {other:?}"),
        }
    }

    #[test]
    fn not_json_is_malformed() {
        assert!(matches!(
            CartVersion::decode(b"hello there"),
            Err(EnvelopeError::Malformed(_))
        ));
    }

    #[test]
    fn cart_must_be_an_object() {
        let frame = br#"{"tag":"cartVersion","data":{"cart":[1,2],"version":"v1"}}"#;
        assert!(matches!(
            CartVersion::decode(frame),
            Err(EnvelopeError::Malformed(_))
        ));
    }

    #[test]
    fn missing_data_is_malformed() {
        assert!(matches!(
            CartVersion::decode(br#"{"tag":"cartVersion"}"#),
            Err(EnvelopeError::Malformed(_))
        ));
    }

    #[test]
    fn encode_then_decode() {
        let mut cart = Cart::new();
        cart.insert("milk".into(), json!({"qty": 1, "done": false}));
        let update = CartVersion::new("1700000000", cart);
        assert_eq!(CartVersion::decode(update.encode().as_bytes()).unwrap(), update);
    }
}
