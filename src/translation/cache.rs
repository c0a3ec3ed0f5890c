/*!
 * Translation result caching.
 *
 * Results are memoized by a stable hash of the normalized source text and
 * the normalized target language. Entries are write-once: a second `put`
 * for a key keeps the first value, so racing duplicate translations never
 * replace an entry a reader may already hold. Entries leave the cache only
 * through explicit invalidation (`invalidate`, `clear`, `clear_for_scope`).
 *
 * A cache built `with_storage` writes every change to the `cache/`
 * namespace while it still holds the entry lock, so the durable copy
 * follows the in-memory one in order.
 */

use log::{debug, warn};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::errors::StorageError;
use crate::language_utils;
use crate::storage::{CACHE_PREFIX, KeyValueStore};

static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Collapse whitespace runs and trim
pub fn normalize_text(text: &str) -> String {
    WHITESPACE_RUN.replace_all(text.trim(), " ").into_owned()
}

/// Cache key: hex SHA-256 of normalized text and target language
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    /// Create a new cache key
    pub fn new(source_text: &str, target_language: &str) -> Self {
        let target = language_utils::normalize_language_code(target_language)
            .unwrap_or_else(|_| target_language.trim().to_lowercase());

        let mut hasher = Sha256::new();
        hasher.update(normalize_text(source_text).as_bytes());
        // Separator keeps ("ab", "c") and ("a", "bc") apart
        hasher.update([0u8]);
        hasher.update(target.as_bytes());

        let digest = hasher.finalize();
        let hex = digest.iter().map(|b| format!("{:02x}", b)).collect::<String>();
        Self(hex)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn from_hex(hex: &str) -> Option<Self> {
        (hex.len() == 64 && hex.bytes().all(|b| b.is_ascii_hexdigit())).then(|| Self(hex.to_string()))
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.0[..12.min(self.0.len())])
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: Arc<str>,
    scopes: BTreeSet<String>,
}

/// Serialized shape of an entry in the key/value store
#[derive(Debug, Serialize, Deserialize)]
struct StoredEntry {
    value: String,
    #[serde(default)]
    scopes: Vec<String>,
}

/// Snapshot of cache counters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
    pub hit_rate: f64,
    pub entries: usize,
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Cache entries: {}, hits: {}, misses: {}, hit rate: {:.1}%",
            self.entries,
            self.hits,
            self.misses,
            self.hit_rate * 100.0
        )
    }
}

/// Translation cache for storing and retrieving results
///
/// Clones share entries, counters and storage.
#[derive(Clone)]
pub struct ResultCache {
    entries: Arc<RwLock<HashMap<CacheKey, CacheEntry>>>,
    hits: Arc<AtomicUsize>,
    misses: Arc<AtomicUsize>,
    enabled: Arc<AtomicBool>,
    storage: Option<Arc<dyn KeyValueStore>>,
}

impl ResultCache {
    /// Create a new translation cache
    pub fn new(enabled: bool) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            hits: Arc::new(AtomicUsize::new(0)),
            misses: Arc::new(AtomicUsize::new(0)),
            enabled: Arc::new(AtomicBool::new(enabled)),
            storage: None,
        }
    }

    /// Cache that writes every change through to `storage`
    pub fn with_storage(enabled: bool, storage: Arc<dyn KeyValueStore>) -> Self {
        Self {
            storage: Some(storage),
            ..Self::new(enabled)
        }
    }

    pub fn is_durable(&self) -> bool {
        self.storage.is_some()
    }

    fn storage_key(key: &CacheKey) -> String {
        format!("{}{}", CACHE_PREFIX, key.as_str())
    }

    fn write_through(&self, key: &CacheKey, entry: &CacheEntry) {
        let Some(storage) = &self.storage else {
            return;
        };
        let stored = StoredEntry {
            value: entry.value.to_string(),
            scopes: entry.scopes.iter().cloned().collect(),
        };
        let result = serde_json::to_string(&stored)
            .map_err(StorageError::from)
            .and_then(|json| storage.put(&Self::storage_key(key), &json));
        if let Err(e) = result {
            warn!("Failed to persist cache entry {}: {}", key, e);
        }
    }

    fn remove_through(&self, key: &CacheKey) {
        if let Some(storage) = &self.storage {
            if let Err(e) = storage.remove(&Self::storage_key(key)) {
                warn!("Failed to remove cache entry {}: {}", key, e);
            }
        }
    }

    /// Look up a key; counts a hit or a miss
    pub fn get(&self, key: &CacheKey) -> Option<String> {
        if !self.is_enabled() {
            return None;
        }

        let found = self.entries.read().get(key).map(|e| e.value.to_string());
        match &found {
            Some(_) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!("Cache hit for {}", key);
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                debug!("Cache miss for {}", key);
            }
        }
        found
    }

    /// Look up by text and target
    pub fn get_text(&self, source_text: &str, target_language: &str) -> Option<String> {
        self.get(&CacheKey::new(source_text, target_language))
    }

    /// Store a value; returns false if the key already had one
    pub fn put(&self, key: CacheKey, value: &str) -> bool {
        self.put_scoped(key, value, None)
    }

    /// Store a value tagged with a scope
    ///
    /// An existing entry keeps its value; the scope tag is still added so a
    /// later `clear_for_scope` reaches it.
    pub fn put_scoped(&self, key: CacheKey, value: &str, scope: Option<&str>) -> bool {
        if !self.is_enabled() {
            return false;
        }

        let mut entries = self.entries.write();
        match entries.get_mut(&key) {
            Some(existing) => {
                if let Some(scope) = scope {
                    if existing.scopes.insert(scope.to_string()) {
                        self.write_through(&key, existing);
                    }
                }
                false
            }
            None => {
                let mut scopes = BTreeSet::new();
                if let Some(scope) = scope {
                    scopes.insert(scope.to_string());
                }
                debug!("Cached translation under {}", key);
                let entry = CacheEntry {
                    value: Arc::from(value),
                    scopes,
                };
                self.write_through(&key, &entry);
                entries.insert(key, entry);
                true
            }
        }
    }

    /// Drop one entry
    pub fn invalidate(&self, key: &CacheKey) -> bool {
        let mut entries = self.entries.write();
        let removed = entries.remove(key).is_some();
        if removed {
            self.remove_through(key);
        }
        removed
    }

    /// Drop every entry tagged with `scope`; returns how many were removed
    pub fn clear_for_scope(&self, scope: &str) -> usize {
        let mut entries = self.entries.write();
        let doomed: Vec<CacheKey> = entries
            .iter()
            .filter(|(_, e)| e.scopes.contains(scope))
            .map(|(k, _)| k.clone())
            .collect();
        for key in &doomed {
            entries.remove(key);
            self.remove_through(key);
        }
        let removed = doomed.len();
        debug!("Cleared {} cached translations for scope {}", removed, scope);
        removed
    }

    /// Clear the cache and reset counters
    pub fn clear(&self) {
        let mut entries = self.entries.write();
        entries.clear();
        if let Some(storage) = &self.storage {
            if let Err(e) = storage.remove_prefix(CACHE_PREFIX) {
                warn!("Failed to clear stored cache entries: {}", e);
            }
        }
        drop(entries);
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        debug!("Translation cache cleared");
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;

        let hit_rate = if total > 0 {
            hits as f64 / total as f64
        } else {
            0.0
        };

        CacheStats {
            hits,
            misses,
            hit_rate,
            entries: self.len(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Enable or disable lookups and writes; existing entries are kept
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Replace the stored `cache/` namespace with the current entries
    ///
    /// The read lock is held throughout so no write-through interleaves.
    pub fn persist(&self, store: &dyn KeyValueStore) -> Result<usize, StorageError> {
        let snapshot = self.entries.read();

        store.remove_prefix(CACHE_PREFIX)?;
        for (key, entry) in snapshot.iter() {
            let stored = StoredEntry {
                value: entry.value.to_string(),
                scopes: entry.scopes.iter().cloned().collect(),
            };
            store.put(&Self::storage_key(key), &serde_json::to_string(&stored)?)?;
        }

        debug!("Persisted {} cache entries", snapshot.len());
        Ok(snapshot.len())
    }

    /// Load entries saved by `persist` or write-through; malformed records are skipped
    pub fn restore(&self, store: &dyn KeyValueStore) -> Result<usize, StorageError> {
        let mut restored = 0;
        let mut entries = self.entries.write();

        for (raw_key, raw_value) in store.entries_with_prefix(CACHE_PREFIX)? {
            let Some(key) = CacheKey::from_hex(&raw_key[CACHE_PREFIX.len()..]) else {
                warn!("Skipping malformed cache key {:?}", raw_key);
                continue;
            };
            let stored: StoredEntry = match serde_json::from_str(&raw_value) {
                Ok(stored) => stored,
                Err(e) => {
                    warn!("Skipping unreadable cache entry {}: {}", key, e);
                    continue;
                }
            };
            entries.entry(key).or_insert_with(|| {
                restored += 1;
                CacheEntry {
                    value: Arc::from(stored.value.as_str()),
                    scopes: stored.scopes.into_iter().collect(),
                }
            });
        }

        debug!("Restored {} cache entries", restored);
        Ok(restored)
    }
}

impl Default for ResultCache {
    fn default() -> Self {
        Self::new(true)
    }
}

/// Truncate text to a maximum number of characters with ellipsis
pub fn truncate_text(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
