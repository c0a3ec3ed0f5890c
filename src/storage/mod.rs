/*!
 * Key/value persistence for engine state.
 *
 * Model download records, cached translations, preferences and saved
 * message states all survive restarts through the `KeyValueStore` trait.
 * Values are opaque strings (JSON by convention); keys are namespaced:
 * - `pref/<name>`
 * - `model/<code>`
 * - `cache/<hash>`
 * - `message_state/<key>`
 */

pub mod connection;
pub mod memory;
pub mod schema;
pub mod sqlite;

use crate::errors::StorageError;

pub use connection::DatabaseConnection;
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Namespace prefix for user preferences
pub const PREF_PREFIX: &str = "pref/";
/// Namespace prefix for model records
pub const MODEL_PREFIX: &str = "model/";
/// Namespace prefix for persisted cache entries
pub const CACHE_PREFIX: &str = "cache/";
/// Namespace prefix for saved message translation states
pub const MESSAGE_STATE_PREFIX: &str = "message_state/";

/// Durable string key/value store
pub trait KeyValueStore: Send + Sync {
    /// Read a value
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Insert or overwrite a value
    fn put(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Delete a value; returns whether it existed
    fn remove(&self, key: &str) -> Result<bool, StorageError>;

    /// All `(key, value)` pairs whose key starts with `prefix`, ordered by key
    fn entries_with_prefix(&self, prefix: &str) -> Result<Vec<(String, String)>, StorageError>;

    /// Delete every key starting with `prefix`; returns the number removed
    fn remove_prefix(&self, prefix: &str) -> Result<usize, StorageError>;

    /// Keys starting with `prefix`, ordered
    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        Ok(self
            .entries_with_prefix(prefix)?
            .into_iter()
            .map(|(k, _)| k)
            .collect())
    }
}
