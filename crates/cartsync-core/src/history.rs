use crate::Cart;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Number of snapshots returned by the history query.
pub const HISTORY_LIMIT: usize = 10;

/// Response of the history query: recent snapshots keyed by version id, plus
/// the current version.
///
/// `version` is empty when nothing has been stored yet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CartHistory {
    pub carts: Map<String, Value>,
    pub version: String,
}

impl CartHistory {
    /// Build a response from the current pointer and a snapshot listing.
    pub fn from_parts(
        current: Option<String>,
        recent: impl IntoIterator<Item = (String, Cart)>,
    ) -> Self {
        Self {
            carts: recent
                .into_iter()
                .map(|(id, cart)| (id, Value::Object(cart)))
                .collect(),
            version: current.unwrap_or_default(),
        }
    }
}
