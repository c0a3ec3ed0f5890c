/*!
 * Saved per-message translation state.
 *
 * A host that recycles the widget showing a message saves the message's
 * translation state under a stable message key and restores it when the
 * message is bound again. Restoring returns exactly what was saved or
 * nothing.
 */

use log::warn;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::storage::{KeyValueStore, MESSAGE_STATE_PREFIX};

/// Stable identity of a displayable message
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MessageKey(String);

impl MessageKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for MessageKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl From<u64> for MessageKey {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for MessageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageTranslationState {
    pub original_text: String,
    pub translated_text: Option<String>,
    pub source_language: Option<String>,
    pub target_language: String,
    /// Whether the translation (rather than the original) is on screen
    pub visible: bool,
}

impl MessageTranslationState {
    pub fn new(original_text: impl Into<String>, target_language: impl Into<String>) -> Self {
        Self {
            original_text: original_text.into(),
            translated_text: None,
            source_language: None,
            target_language: target_language.into(),
            visible: false,
        }
    }
}

/// Keyed arena of saved states with optional write-through
#[derive(Clone, Default)]
pub struct MessageStateArena {
    states: Arc<RwLock<HashMap<MessageKey, MessageTranslationState>>>,
    storage: Option<Arc<dyn KeyValueStore>>,
}

impl fmt::Debug for MessageStateArena {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageStateArena")
            .field("len", &self.len())
            .field("durable", &self.storage.is_some())
            .finish()
    }
}

impl MessageStateArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arena that also writes states under `message_state/`
    pub fn with_storage(storage: Arc<dyn KeyValueStore>) -> Self {
        Self {
            states: Arc::new(RwLock::new(HashMap::new())),
            storage: Some(storage),
        }
    }

    fn storage_key(key: &MessageKey) -> String {
        format!("{}{}", MESSAGE_STATE_PREFIX, key.as_str())
    }

    pub fn save(&self, key: MessageKey, state: MessageTranslationState) {
        if let Some(storage) = &self.storage {
            match serde_json::to_string(&state) {
                Ok(json) => {
                    if let Err(e) = storage.put(&Self::storage_key(&key), &json) {
                        warn!("Failed to persist message state {}: {}", key, e);
                    }
                }
                Err(e) => warn!("Failed to serialize message state {}: {}", key, e),
            }
        }
        self.states.write().insert(key, state);
    }

    /// Exact saved state, or `None`
    pub fn restore(&self, key: &MessageKey) -> Option<MessageTranslationState> {
        if let Some(state) = self.states.read().get(key) {
            return Some(state.clone());
        }

        let storage = self.storage.as_ref()?;
        let raw = match storage.get(&Self::storage_key(key)) {
            Ok(raw) => raw?,
            Err(e) => {
                warn!("Failed to read message state {}: {}", key, e);
                return None;
            }
        };
        match serde_json::from_str::<MessageTranslationState>(&raw) {
            Ok(state) => {
                self.states.write().insert(key.clone(), state.clone());
                Some(state)
            }
            Err(e) => {
                warn!("Discarding unreadable message state {}: {}", key, e);
                None
            }
        }
    }

    pub fn remove(&self, key: &MessageKey) -> Option<MessageTranslationState> {
        if let Some(storage) = &self.storage {
            if let Err(e) = storage.remove(&Self::storage_key(key)) {
                warn!("Failed to remove message state {}: {}", key, e);
            }
        }
        self.states.write().remove(key)
    }

    pub fn clear(&self) {
        if let Some(storage) = &self.storage {
            if let Err(e) = storage.remove_prefix(MESSAGE_STATE_PREFIX) {
                warn!("Failed to clear message states: {}", e);
            }
        }
        self.states.write().clear();
    }

    /// States held in memory
    pub fn len(&self) -> usize {
        self.states.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.read().is_empty()
    }
}
