/*!
 * Translation resolution engine.
 *
 * - `coordinator`: request pipeline, provider selection and the worker pool
 * - `cache`: write-once result cache keyed by normalized text and target
 * - `model_store`: the single source of truth for on-device model state
 * - `detection`: online-then-offline source language detection
 * - `online` / `offline`: providers wrapping the backend traits
 * - `message_state`: saved per-message translation state
 * - `types`: requests, results and their small companions
 */

pub mod cache;
pub mod coordinator;
pub mod detection;
pub mod message_state;
pub mod model_store;
pub mod offline;
pub mod online;
pub mod types;

// Re-export main types for easier usage
pub use self::cache::{CacheKey, CacheStats, ResultCache};
pub use self::coordinator::{Coordinator, CoordinatorBuilder, PendingTranslation, TranslationHandle};
pub use self::detection::{DetectedLanguage, DetectionSource, LanguageDetector};
pub use self::message_state::{MessageKey, MessageStateArena, MessageTranslationState};
pub use self::model_store::{ModelAvailabilityStore, ModelEvent, ModelRecord, ModelStatus, ReconcileReport};
pub use self::offline::OfflineProvider;
pub use self::online::{OnlineProvider, RateLimiter};
pub use self::types::{MessageDirection, ProviderUsed, TranslationRequest, TranslationResult};
