/*!
 * SQLite-backed `KeyValueStore`.
 */

use anyhow::Result;
use log::debug;
use rusqlite::{OptionalExtension, params};
use std::path::Path;

use super::{DatabaseConnection, KeyValueStore};
use crate::errors::StorageError;

/// Persistent store over the `kv` table
#[derive(Clone)]
pub struct SqliteStore {
    db: DatabaseConnection,
}

impl SqliteStore {
    /// Open (or create) a database file
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self {
            db: DatabaseConnection::open(path)?,
        })
    }

    /// Open the database in the platform data directory
    pub fn open_default() -> Result<Self> {
        Ok(Self {
            db: DatabaseConnection::open_default()?,
        })
    }

    /// Throwaway in-memory database
    pub fn in_memory() -> Result<Self> {
        Ok(Self {
            db: DatabaseConnection::in_memory()?,
        })
    }

    pub fn from_connection(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }
}

impl KeyValueStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.db.with_conn(|conn| {
            Ok(conn
                .query_row("SELECT value FROM kv WHERE key = ?1", [key], |row| row.get(0))
                .optional()?)
        })
    }

    fn put(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, datetime('now'))
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                params![key, value],
            )?;
            Ok(())
        })
    }

    fn remove(&self, key: &str) -> Result<bool, StorageError> {
        self.db.with_conn(|conn| {
            let removed = conn.execute("DELETE FROM kv WHERE key = ?1", [key])?;
            Ok(removed > 0)
        })
    }

    fn entries_with_prefix(&self, prefix: &str) -> Result<Vec<(String, String)>, StorageError> {
        // substr comparison avoids LIKE wildcard escaping for keys containing '_'
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT key, value FROM kv WHERE substr(key, 1, length(?1)) = ?1 ORDER BY key",
            )?;
            let rows = stmt
                .query_map([prefix], |row| Ok((row.get(0)?, row.get(1)?)))?
                .collect::<rusqlite::Result<Vec<(String, String)>>>()?;
            Ok(rows)
        })
    }

    fn remove_prefix(&self, prefix: &str) -> Result<usize, StorageError> {
        let removed = self.db.with_conn(|conn| {
            Ok(conn.execute(
                "DELETE FROM kv WHERE substr(key, 1, length(?1)) = ?1",
                [prefix],
            )?)
        })?;
        debug!("Removed {} stored entries under {:?}", removed, prefix);
        Ok(removed)
    }
}
