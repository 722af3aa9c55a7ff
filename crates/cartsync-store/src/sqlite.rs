//! SQLite backend.
//!
//! Tables:
//! - `carts(id, cart)`: snapshot JSON keyed by raw version id bytes
//! - `version(name, id)`: the current pointer, stored under `name = 'cart'`
//!
//! Ids are BLOBs, so ordering is bytewise like any ordered key-value store.

use crate::{CartStore, StoreError, Write};
use cartsync_core::{Cart, CartHistory};
use rusqlite::{Connection, OpenFlags, OptionalExtension, params};
use std::path::Path;

const CURRENT_KEY: &[u8] = b"cart";

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS carts (
        id   BLOB PRIMARY KEY,
        cart BLOB NOT NULL
    );
    CREATE TABLE IF NOT EXISTS version (
        name BLOB PRIMARY KEY,
        id   BLOB NOT NULL
    );
";

/// Snapshot store backed by a single SQLite connection.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open (creating if needed) a database file in WAL mode.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open(path.as_ref())?;
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        tracing::debug!("Opened {} (journal_mode={})", path.as_ref().display(), mode);
        Self::init(conn)
    }

    /// Open an existing database for reading only.
    ///
    /// Used by the history query, which must never write.
    pub fn open_read_only(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// Number of stored snapshots.
    pub fn len(&self) -> Result<usize, StoreError> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM carts", [], |row| row.get(0))?;
        Ok(n as usize)
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }
}

fn current_in(conn: &Connection) -> Result<Option<String>, StoreError> {
    let id: Option<Vec<u8>> = conn
        .query_row(
            "SELECT id FROM version WHERE name = ?1",
            [CURRENT_KEY],
            |row| row.get(0),
        )
        .optional()?;
    Ok(id.map(String::from_utf8).transpose()?)
}

fn recent_in(conn: &Connection, limit: usize) -> Result<Vec<(String, Cart)>, StoreError> {
    let mut stmt = conn.prepare("SELECT id, cart FROM carts ORDER BY id DESC LIMIT ?1")?;
    let rows = stmt.query_map([limit as i64], |row| {
        Ok((row.get::<_, Vec<u8>>(0)?, row.get::<_, Vec<u8>>(1)?))
    })?;

    let mut carts = Vec::new();
    for row in rows {
        let (id, cart) = row?;
        carts.push((String::from_utf8(id)?, serde_json::from_slice(&cart)?));
    }
    Ok(carts)
}

impl CartStore for SqliteStore {
    fn commit(&mut self, writes: &[Write<'_>]) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;
        for write in writes {
            match *write {
                Write::Put { id, snapshot } => {
                    if id.is_empty() {
                        return Err(StoreError::EmptyId);
                    }
                    let cart = serde_json::to_vec(snapshot)?;
                    tx.execute(
                        "INSERT OR REPLACE INTO carts (id, cart) VALUES (?1, ?2)",
                        params![id.as_bytes(), cart],
                    )?;
                }
                Write::SetCurrent(id) => {
                    if id.is_empty() {
                        return Err(StoreError::EmptyId);
                    }
                    let exists: bool = tx.query_row(
                        "SELECT EXISTS(SELECT 1 FROM carts WHERE id = ?1)",
                        [id.as_bytes()],
                        |row| row.get(0),
                    )?;
                    if !exists {
                        return Err(StoreError::UnknownVersion(id.to_string()));
                    }
                    tx.execute(
                        "INSERT OR REPLACE INTO version (name, id) VALUES (?1, ?2)",
                        params![CURRENT_KEY, id.as_bytes()],
                    )?;
                }
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn current(&self) -> Result<Option<String>, StoreError> {
        current_in(&self.conn)
    }

    fn snapshot(&self, id: &str) -> Result<Option<Cart>, StoreError> {
        let cart: Option<Vec<u8>> = self
            .conn
            .query_row(
                "SELECT cart FROM carts WHERE id = ?1",
                [id.as_bytes()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(cart.map(|c| serde_json::from_slice(&c)).transpose()?)
    }

    fn recent(&self, limit: usize) -> Result<Vec<(String, Cart)>, StoreError> {
        recent_in(&self.conn, limit)
    }

    // Pointer and listing read from one snapshot of the database.
    fn history(&self, limit: usize) -> Result<CartHistory, StoreError> {
        let tx = self.conn.unchecked_transaction()?;
        let history = CartHistory::from_parts(current_in(&tx)?, recent_in(&tx, limit)?);
        tx.finish()?;
        Ok(history)
    }
}
