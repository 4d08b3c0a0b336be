//! Durable client storage for session restoration.
//!
//! Only the connection manager reads or writes these keys. Storage failures
//! are logged and swallowed: losing the remembered endpoint must never break
//! a live connection.

use std::collections::HashMap;
use std::sync::Mutex;

#[cfg(feature = "native")]
use anyhow::Result;
#[cfg(feature = "native")]
use rusqlite::{params, Connection, OptionalExtension};

/// Last successfully connected endpoint.
pub const ENDPOINT_KEY: &str = "antelope_endpoint";
/// Display name of the last successful connection.
pub const CHAIN_NAME_KEY: &str = "antelope_chain_name";

pub trait SessionStorage: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
    fn remove(&self, key: &str);
}

/// Process-local storage (tests, web shims, `--session-db-path` failures).
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStorage for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.entries
            .lock()
            .ok()
            .and_then(|guard| guard.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) {
        if let Ok(mut guard) = self.entries.lock() {
            guard.insert(key.to_string(), value.to_string());
        }
    }

    fn remove(&self, key: &str) {
        if let Ok(mut guard) = self.entries.lock() {
            guard.remove(key);
        }
    }
}

/// SQLite-backed key/value store.
#[cfg(feature = "native")]
pub struct SqliteStorage {
    conn: Mutex<Connection>,
}

#[cfg(feature = "native")]
impl SqliteStorage {
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.pragma_update(None, "busy_timeout", 250)?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS kv(
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            "#,
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

#[cfg(feature = "native")]
impl SessionStorage for SqliteStorage {
    fn get(&self, key: &str) -> Option<String> {
        let guard = self.conn.lock().ok()?;
        match guard
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get::<_, String>(0)
            })
            .optional()
        {
            Ok(value) => value,
            Err(e) => {
                log::warn!("session storage read '{key}' failed: {e}");
                None
            }
        }
    }

    fn set(&self, key: &str, value: &str) {
        let Ok(guard) = self.conn.lock() else {
            return;
        };
        if let Err(e) = guard.execute(
            "INSERT OR REPLACE INTO kv(key, value) VALUES (?1, ?2)",
            params![key, value],
        ) {
            log::warn!("session storage write '{key}' failed: {e}");
        }
    }

    fn remove(&self, key: &str) {
        let Ok(guard) = self.conn.lock() else {
            return;
        };
        if let Err(e) = guard.execute("DELETE FROM kv WHERE key = ?1", params![key]) {
            log::warn!("session storage delete '{key}' failed: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_storage_roundtrip() {
        let s = MemoryStorage::new();
        assert_eq!(s.get(ENDPOINT_KEY), None);
        s.set(ENDPOINT_KEY, "https://wax.greymass.com");
        assert_eq!(s.get(ENDPOINT_KEY).as_deref(), Some("https://wax.greymass.com"));
        s.remove(ENDPOINT_KEY);
        assert_eq!(s.get(ENDPOINT_KEY), None);
    }

    #[cfg(feature = "native")]
    #[test]
    fn sqlite_storage_overwrites_and_removes() {
        let s = SqliteStorage::open_in_memory().unwrap();
        s.set(CHAIN_NAME_KEY, "WAX Mainnet");
        s.set(CHAIN_NAME_KEY, "Telos Mainnet");
        assert_eq!(s.get(CHAIN_NAME_KEY).as_deref(), Some("Telos Mainnet"));
        s.remove(CHAIN_NAME_KEY);
        assert_eq!(s.get(CHAIN_NAME_KEY), None);
    }
}
