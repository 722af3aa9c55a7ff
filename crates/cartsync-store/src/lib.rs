//! Durable storage for cart snapshots.
//!
//! Two namespaces: snapshots keyed by version id, and a single pointer to the
//! current version. Snapshots are never deleted; the pointer is overwritten on
//! every accepted update.

mod sqlite;

pub use sqlite::SqliteStore;

use cartsync_core::{Cart, CartHistory, CartVersion};

/// A single write inside a [`CartStore::commit`].
#[derive(Debug, Clone, Copy)]
pub enum Write<'a> {
    /// Store `snapshot` under `id`, replacing any previous content.
    Put { id: &'a str, snapshot: &'a Cart },
    /// Point the current version at `id`.
    SetCurrent(&'a str),
}

/// Snapshot storage used by the hub and the history query.
pub trait CartStore: Send + 'static {
    /// Apply all writes atomically, in order.
    ///
    /// A `SetCurrent` must name a snapshot that exists once the preceding
    /// writes are applied; otherwise nothing is written.
    fn commit(&mut self, writes: &[Write<'_>]) -> Result<(), StoreError>;

    /// The current version id, if any update has been accepted.
    fn current(&self) -> Result<Option<String>, StoreError>;

    fn snapshot(&self, id: &str) -> Result<Option<Cart>, StoreError>;

    /// Up to `limit` snapshots, newest (greatest id) first.
    fn recent(&self, limit: usize) -> Result<Vec<(String, Cart)>, StoreError>;

    /// Store an accepted update and make it current.
    fn record(&mut self, update: &CartVersion) -> Result<(), StoreError> {
        self.commit(&[
            Write::Put {
                id: &update.version,
                snapshot: &update.cart,
            },
            Write::SetCurrent(&update.version),
        ])
    }

    /// The current version together with the most recent snapshots.
    fn history(&self, limit: usize) -> Result<CartHistory, StoreError> {
        Ok(CartHistory::from_parts(self.current()?, self.recent(limit)?))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("version id cannot be empty")]
    EmptyId,
    #[error("current version {0:?} has no stored snapshot")]
    UnknownVersion(String),
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("snapshot encoding: {0}")]
    Json(#[from] serde_json::Error),
    #[error("stored id is not valid UTF-8")]
    InvalidId(#[from] std::string::FromUtf8Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// Uses the provided `history` instead of the SQLite override.
    struct Plain(SqliteStore);

    impl CartStore for Plain {
        fn commit(&mut self, writes: &[Write<'_>]) -> Result<(), StoreError> {
            self.0.commit(writes)
        }
        fn current(&self) -> Result<Option<String>, StoreError> {
            self.0.current()
        }
        fn snapshot(&self, id: &str) -> Result<Option<Cart>, StoreError> {
            self.0.snapshot(id)
        }
        fn recent(&self, limit: usize) -> Result<Vec<(String, Cart)>, StoreError> {
            self.0.recent(limit)
        }
    }

    #[test]
    fn provided_history_matches_sqlite_history() {
        let mut store = Plain(SqliteStore::open_in_memory().unwrap());
        for (version, n) in [("b", 1), ("c", 2), ("a", 3)] {
            let mut cart = Cart::new();
            cart.insert("n".into(), json!(n));
            store.record(&CartVersion::new(version, cart)).unwrap();
        }

        let provided = store.history(2).unwrap();
        assert_eq!(provided, store.0.history(2).unwrap());
        assert_eq!(provided.version, "a");
        assert_eq!(provided.carts.len(), 2);
        assert_eq!(provided.carts["c"], json!({"n": 2}));
    }
}
