//! SQLite implementation of the KeyValueStore port.

use crate::ports::{KeyValueStore, StorageError};
use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

pub struct SqliteKeyValueStore {
    conn: Mutex<Connection>,
}

impl SqliteKeyValueStore {
    /// Open the store at its default location in the user's data directory.
    pub fn new() -> Result<Self> {
        Self::open(&Self::db_path()?)
    }

    pub fn open(db_path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create data directory")?;
        }

        let conn = Connection::open(db_path).context("Failed to open SQLite database")?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS kv (
                namespace TEXT NOT NULL,
                key TEXT NOT NULL,
                value TEXT NOT NULL,
                updated_at INTEGER NOT NULL,
                PRIMARY KEY (namespace, key)
            );
            ",
        )
        .context("Failed to initialize database schema")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Get the database file path.
    pub fn db_path() -> Result<PathBuf> {
        let data_dir = dirs::data_dir().context("Could not find data directory")?;
        Ok(data_dir.join("hnav").join("state.db"))
    }

    /// Get current timestamp in milliseconds.
    fn now_ms() -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0)
    }

    /// `active:comments:123` is stored as namespace `active`, key
    /// `comments:123`. Keys without a separator land in the empty namespace.
    fn split(key: &str) -> (&str, &str) {
        key.split_once(':').unwrap_or(("", key))
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, StorageError> {
        self.conn.lock().map_err(|_| StorageError::Poisoned)
    }
}

impl KeyValueStore for SqliteKeyValueStore {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        let (namespace, key) = Self::split(key);
        let conn = self.lock()?;
        let value = conn
            .query_row(
                "SELECT value FROM kv WHERE namespace = ?1 AND key = ?2",
                (namespace, key),
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let (namespace, key) = Self::split(key);
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO kv (namespace, key, value, updated_at)
             VALUES (?1, ?2, ?3, ?4)",
            (namespace, key, value, Self::now_ms()),
        )?;
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        let (namespace, key) = Self::split(key);
        let conn = self.lock()?;
        conn.execute(
            "DELETE FROM kv WHERE namespace = ?1 AND key = ?2",
            (namespace, key),
        )?;
        Ok(())
    }
}
