/*!
 * # msgtranslate
 *
 * Translation resolution for a messaging app.
 *
 * Given a piece of message text and a target language, the engine decides
 * whether translation is needed, detects the source language when it is
 * unknown, picks the online or on-device provider according to the user's
 * mode and preferences, and caches successful results.
 *
 * ## Architecture
 *
 * - `translation`: the engine
 *   - `translation::coordinator`: request pipeline and worker pool
 *   - `translation::model_store`: on-device model availability
 *   - `translation::cache`: result cache
 *   - `translation::detection`: language detection chain
 * - `providers`: backend traits plus Google, local-server, script and mock backends
 * - `preferences`: user language and mode settings
 * - `storage`: key-value persistence (SQLite and in-memory)
 * - `app_config`: configuration file handling
 * - `language_utils`: language code normalization and the offline catalog
 * - `errors`: error types
 */

// Global lints configuration
// These lints will be allowed but not auto-fixed
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]

// Public modules
pub mod app_config;
pub mod errors;
pub mod language_utils;
pub mod preferences;
pub mod providers;
pub mod storage;
pub mod translation;

// Re-export main types for easier usage
pub use app_config::{Config, TranslationMode};
pub use errors::{AppError, ErrorKind, ProviderError, ProviderKind, StorageError, TranslationError};
pub use language_utils::{get_language_name, language_codes_match, normalize_language_code};
pub use preferences::UserPreferences;
pub use translation::{
    Coordinator, MessageDirection, ModelStatus, ProviderUsed, TranslationRequest, TranslationResult,
};
