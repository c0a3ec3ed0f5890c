/*!
 * User preference store.
 *
 * Preferences live in the key/value store under `pref/`. Language
 * preferences resolve through a fallback chain that ends at the device
 * locale supplied by the host:
 *
 * - incoming / outgoing language → general language
 * - general language → device language
 *
 * There is no built-in default language. When neither an explicit value nor
 * a device language exists the lookup returns `None`.
 */

use log::warn;
use std::sync::Arc;

use crate::app_config::TranslationMode;
use crate::language_utils;
use crate::storage::{KeyValueStore, PREF_PREFIX};

const KEY_API_KEY: &str = "api_key";
const KEY_PREFERRED_LANGUAGE: &str = "preferred_language";
const KEY_PREFERRED_INCOMING_LANGUAGE: &str = "preferred_incoming_language";
const KEY_PREFERRED_OUTGOING_LANGUAGE: &str = "preferred_outgoing_language";
const KEY_AUTO_TRANSLATE: &str = "auto_translate";
const KEY_OFFLINE_ENABLED: &str = "offline_translation_enabled";
const KEY_PREFER_OFFLINE: &str = "prefer_offline_translation";
const KEY_TRANSLATION_MODE: &str = "translation_mode";

/// Preference accessors over a shared key/value store
#[derive(Clone)]
pub struct UserPreferences {
    store: Arc<dyn KeyValueStore>,
    device_language: Option<String>,
    default_mode: TranslationMode,
}

impl UserPreferences {
    /// Create preferences backed by `store`
    ///
    /// `device_language` is the host locale's language; it is normalized here
    /// and dropped if it is not a real language code.
    pub fn new(store: Arc<dyn KeyValueStore>, device_language: Option<&str>) -> Self {
        let device_language = device_language.and_then(|l| language_utils::normalize_language_code(l).ok());
        Self {
            store,
            device_language,
            default_mode: TranslationMode::default(),
        }
    }

    /// Mode reported when none has been stored
    pub fn with_default_mode(mut self, mode: TranslationMode) -> Self {
        self.default_mode = mode;
        self
    }

    pub fn device_language(&self) -> Option<&str> {
        self.device_language.as_deref()
    }

    fn read(&self, name: &str) -> Option<String> {
        match self.store.get(&format!("{}{}", PREF_PREFIX, name)) {
            Ok(value) => value.filter(|v| !v.is_empty()),
            Err(e) => {
                warn!("Failed to read preference {}: {}", name, e);
                None
            }
        }
    }

    fn write(&self, name: &str, value: &str) {
        if let Err(e) = self.store.put(&format!("{}{}", PREF_PREFIX, name), value) {
            warn!("Failed to write preference {}: {}", name, e);
        }
    }

    fn erase(&self, name: &str) {
        if let Err(e) = self.store.remove(&format!("{}{}", PREF_PREFIX, name)) {
            warn!("Failed to clear preference {}: {}", name, e);
        }
    }

    fn read_bool(&self, name: &str, default: bool) -> bool {
        self.read(name)
            .and_then(|v| v.parse::<bool>().ok())
            .unwrap_or(default)
    }

    fn read_language(&self, name: &str) -> Option<String> {
        self.read(name)
            .and_then(|v| language_utils::normalize_language_code(&v).ok())
    }

    fn write_language(&self, name: &str, code: &str) -> anyhow::Result<()> {
        let normalized = language_utils::normalize_language_code(code)?;
        self.write(name, &normalized);
        Ok(())
    }

    /// General preferred language, else the device language
    pub fn preferred_language(&self) -> Option<String> {
        self.read_language(KEY_PREFERRED_LANGUAGE)
            .or_else(|| self.device_language.clone())
    }

    pub fn set_preferred_language(&self, code: &str) -> anyhow::Result<()> {
        self.write_language(KEY_PREFERRED_LANGUAGE, code)
    }

    pub fn clear_preferred_language(&self) {
        self.erase(KEY_PREFERRED_LANGUAGE);
    }

    /// Target for received messages
    pub fn preferred_incoming_language(&self) -> Option<String> {
        self.read_language(KEY_PREFERRED_INCOMING_LANGUAGE)
            .or_else(|| self.preferred_language())
    }

    pub fn set_preferred_incoming_language(&self, code: &str) -> anyhow::Result<()> {
        self.write_language(KEY_PREFERRED_INCOMING_LANGUAGE, code)
    }

    pub fn clear_preferred_incoming_language(&self) {
        self.erase(KEY_PREFERRED_INCOMING_LANGUAGE);
    }

    /// Target for messages being sent
    pub fn preferred_outgoing_language(&self) -> Option<String> {
        self.read_language(KEY_PREFERRED_OUTGOING_LANGUAGE)
            .or_else(|| self.preferred_language())
    }

    pub fn set_preferred_outgoing_language(&self, code: &str) -> anyhow::Result<()> {
        self.write_language(KEY_PREFERRED_OUTGOING_LANGUAGE, code)
    }

    pub fn clear_preferred_outgoing_language(&self) {
        self.erase(KEY_PREFERRED_OUTGOING_LANGUAGE);
    }

    pub fn translation_mode(&self) -> TranslationMode {
        self.read(KEY_TRANSLATION_MODE)
            .and_then(|v| v.parse().ok())
            .unwrap_or(self.default_mode)
    }

    pub fn set_translation_mode(&self, mode: TranslationMode) {
        self.write(KEY_TRANSLATION_MODE, mode.as_str());
    }

    pub fn offline_enabled(&self) -> bool {
        self.read_bool(KEY_OFFLINE_ENABLED, true)
    }

    pub fn set_offline_enabled(&self, enabled: bool) {
        self.write(KEY_OFFLINE_ENABLED, &enabled.to_string());
    }

    pub fn prefer_offline(&self) -> bool {
        self.read_bool(KEY_PREFER_OFFLINE, true)
    }

    pub fn set_prefer_offline(&self, prefer: bool) {
        self.write(KEY_PREFER_OFFLINE, &prefer.to_string());
    }

    pub fn auto_translate_enabled(&self) -> bool {
        self.read_bool(KEY_AUTO_TRANSLATE, false)
    }

    pub fn set_auto_translate_enabled(&self, enabled: bool) {
        self.write(KEY_AUTO_TRANSLATE, &enabled.to_string());
    }

    /// Stored API key, empty when unset
    pub fn api_key(&self) -> String {
        self.read(KEY_API_KEY).unwrap_or_default()
    }

    pub fn set_api_key(&self, key: &str) {
        self.write(KEY_API_KEY, key.trim());
    }
}
