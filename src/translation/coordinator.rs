/*!
 * Translation coordinator.
 *
 * Resolves one request through a fixed sequence:
 *
 * 1. input checks and the mode gate (is any provider the mode allows usable)
 * 2. same-language skip when the source is known
 * 3. cache lookup
 * 4. source detection when the source is unknown, then the same-language
 *    skip again with the detected source
 * 5. provider selection by mode and preferences
 * 6. provider call, with one fall-through to the other provider in `Auto`
 * 7. cache write on success
 *
 * Every request produces exactly one `TranslationResult`. Provider errors,
 * timeouts and panics inside the engine all become failure results.
 * Work runs on a bounded pool of tokio tasks; `TranslationHandle::abandon`
 * suppresses delivery without stopping the work, so the cache still fills.
 */

use anyhow::Result;
use futures::FutureExt;
use futures::stream::{self, StreamExt};
use log::{debug, info, warn};
use std::any::Any;
use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{Semaphore, oneshot};
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::cache::{CacheKey, CacheStats, ResultCache, truncate_text};
use super::detection::{DetectedLanguage, LanguageDetector};
use super::message_state::{MessageKey, MessageStateArena, MessageTranslationState};
use super::model_store::{ModelAvailabilityStore, ModelRecord, ReconcileReport};
use super::offline::OfflineProvider;
use super::online::{OnlineProvider, RateLimiter};
use super::types::{MessageDirection, ProviderUsed, TranslationRequest, TranslationResult};
use crate::app_config::{Config, TranslationMode};
use crate::errors::{ProviderKind, StorageError, TranslationError};
use crate::language_utils;
use crate::preferences::UserPreferences;
use crate::providers::{
    GoogleTranslate, LanguageIdentifier, LocalServerEngine, OnDeviceEngine, ProgressFn,
    ScriptIdentifier, TextTranslator,
};
use crate::storage::KeyValueStore;

/// Length of source text shown in log lines
const LOG_TEXT_CHARS: usize = 40;

/// Which provider a plan step calls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Route {
    Online,
    Offline,
}

impl Route {
    fn provider_used(self) -> ProviderUsed {
        match self {
            Route::Online => ProviderUsed::Online,
            Route::Offline => ProviderUsed::Offline,
        }
    }
}

struct CoordinatorInner {
    cache: ResultCache,
    models: ModelAvailabilityStore,
    detector: LanguageDetector,
    online: OnlineProvider,
    offline: OfflineProvider,
    preferences: UserPreferences,
    message_states: MessageStateArena,
    storage: Option<Arc<dyn KeyValueStore>>,
    workers: Arc<Semaphore>,
    max_concurrent_requests: usize,
}

/// Handle to a translation dispatched with a callback
#[derive(Debug)]
pub struct TranslationHandle {
    id: Uuid,
    abandoned: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl TranslationHandle {
    /// Identifier used in log lines for this dispatch
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Suppress delivery; the translation still runs and fills the cache
    pub fn abandon(&self) {
        self.abandoned.store(true, Ordering::SeqCst);
    }

    pub fn is_abandoned(&self) -> bool {
        self.abandoned.load(Ordering::SeqCst)
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the work (and delivery, unless abandoned) to complete
    pub async fn join(self) {
        if let Err(e) = self.task.await {
            warn!("Translation task ended abnormally: {}", e);
        }
    }
}

/// A dispatched translation whose result is awaited instead of called back
#[derive(Debug)]
pub struct PendingTranslation {
    handle: TranslationHandle,
    receiver: oneshot::Receiver<TranslationResult>,
}

impl PendingTranslation {
    pub fn abandon(&self) {
        self.handle.abandon();
    }

    pub fn id(&self) -> Uuid {
        self.handle.id()
    }

    /// Wait for the result
    pub async fn result(self) -> TranslationResult {
        match self.receiver.await {
            Ok(result) => result,
            Err(_) => TranslationResult::failed(
                TranslationError::Internal("translation abandoned before delivery".to_string()),
                None,
            ),
        }
    }
}

/// Engine entry point; clones share all state
#[derive(Clone)]
pub struct Coordinator {
    inner: Arc<CoordinatorInner>,
}

/// Builder wiring backends, preferences and storage into a `Coordinator`
pub struct CoordinatorBuilder {
    engine: Arc<dyn OnDeviceEngine>,
    preferences: UserPreferences,
    online_translator: Option<Arc<dyn TextTranslator>>,
    online_identifier: Option<Arc<dyn LanguageIdentifier>>,
    offline_identifier: Option<Arc<dyn LanguageIdentifier>>,
    storage: Option<Arc<dyn KeyValueStore>>,
    cache: Option<ResultCache>,
    config: Config,
}

impl CoordinatorBuilder {
    pub fn online_translator(mut self, translator: Arc<dyn TextTranslator>) -> Self {
        self.online_translator = Some(translator);
        self
    }

    pub fn online_identifier(mut self, identifier: Arc<dyn LanguageIdentifier>) -> Self {
        self.online_identifier = Some(identifier);
        self
    }

    pub fn offline_identifier(mut self, identifier: Arc<dyn LanguageIdentifier>) -> Self {
        self.offline_identifier = Some(identifier);
        self
    }

    /// Durable storage; model records and cache entries are restored from it
    pub fn storage(mut self, storage: Arc<dyn KeyValueStore>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Use an existing cache instead of a fresh one
    pub fn cache(mut self, cache: ResultCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Result<Coordinator> {
        let config = self.config;

        let models = match &self.storage {
            Some(storage) => ModelAvailabilityStore::with_storage(
                self.engine.clone(),
                storage.clone(),
                config.offline.download_timeout(),
            ),
            None => ModelAvailabilityStore::new(self.engine.clone()),
        };

        let cache = self.cache.unwrap_or_else(|| match &self.storage {
            Some(storage) => ResultCache::with_storage(config.translation.cache_enabled, storage.clone()),
            None => ResultCache::new(config.translation.cache_enabled),
        });

        if let Some(storage) = &self.storage {
            models.restore(storage.as_ref())?;
            if cache.is_enabled() {
                cache.restore(storage.as_ref())?;
            }
        }

        let detector = LanguageDetector::new(self.online_identifier, self.offline_identifier)
            .with_timeout(config.detection.timeout())
            .with_min_confidence(config.detection.min_confidence);

        let online = OnlineProvider::new(self.online_translator)
            .with_timeout(config.online.timeout())
            .with_rate_limiter(RateLimiter::new(
                Duration::from_millis(config.online.min_interval_ms),
                config.online.max_requests_per_day,
            ));

        let offline = OfflineProvider::new(models.clone()).with_timeout(config.offline.timeout());

        let message_states = match &self.storage {
            Some(storage) => MessageStateArena::with_storage(storage.clone()),
            None => MessageStateArena::new(),
        };

        let max_concurrent_requests = config.translation.max_concurrent_requests.max(1);

        Ok(Coordinator {
            inner: Arc::new(CoordinatorInner {
                cache,
                models,
                detector,
                online,
                offline,
                preferences: self.preferences,
                message_states,
                storage: self.storage,
                workers: Arc::new(Semaphore::new(max_concurrent_requests)),
                max_concurrent_requests,
            }),
        })
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

impl Coordinator {
    /// Start a builder around the on-device engine and preferences
    pub fn builder(engine: Arc<dyn OnDeviceEngine>, preferences: UserPreferences) -> CoordinatorBuilder {
        CoordinatorBuilder {
            engine,
            preferences,
            online_translator: None,
            online_identifier: None,
            offline_identifier: None,
            storage: None,
            cache: None,
            config: Config::default(),
        }
    }

    /// Wire the production backends described by `config`
    ///
    /// The online client is Google Translate, the on-device engine is a local
    /// translation server, and offline detection prefers the server's
    /// detector with the script identifier behind it.
    pub fn from_config(
        config: &Config,
        storage: Arc<dyn KeyValueStore>,
        device_language: Option<&str>,
    ) -> Result<Self> {
        let preferences = UserPreferences::new(storage.clone(), device_language)
            .with_default_mode(config.translation.mode);

        // A key stored in preferences overrides the config file
        let api_key = match preferences.api_key() {
            key if !key.is_empty() => key,
            _ => config.online.api_key.clone(),
        };
        let google = Arc::new(GoogleTranslate::new(
            api_key,
            config.online.endpoint.clone(),
            config.online.timeout(),
        ));
        let engine = Arc::new(LocalServerEngine::new(
            config.offline.endpoint.clone(),
            config.offline.timeout(),
        ));

        Coordinator::builder(engine, preferences)
            .online_translator(google.clone())
            .online_identifier(google)
            .offline_identifier(Arc::new(ScriptIdentifier::new()))
            .storage(storage)
            .config(config.clone())
            .build()
    }

    pub fn preferences(&self) -> &UserPreferences {
        &self.inner.preferences
    }

    pub fn cache(&self) -> &ResultCache {
        &self.inner.cache
    }

    pub fn models(&self) -> &ModelAvailabilityStore {
        &self.inner.models
    }

    pub fn offline_provider(&self) -> &OfflineProvider {
        &self.inner.offline
    }

    pub fn online_provider(&self) -> &OnlineProvider {
        &self.inner.online
    }

    /// Dispatch a translation and deliver its result to `callback`
    ///
    /// Returns immediately. The callback runs exactly once on a worker task
    /// unless the handle is abandoned first.
    pub fn translate_with_callback<F>(&self, request: TranslationRequest, callback: F) -> TranslationHandle
    where
        F: FnOnce(TranslationResult) + Send + 'static,
    {
        let id = Uuid::new_v4();
        let abandoned = Arc::new(AtomicBool::new(false));
        let flag = abandoned.clone();
        let coordinator = self.clone();

        debug!("Dispatching translation {}", id);
        let task = tokio::spawn(async move {
            let result = coordinator.translate_now(request).await;
            if flag.load(Ordering::SeqCst) {
                debug!("Translation {} abandoned, result dropped", id);
                return;
            }
            callback(result);
        });

        TranslationHandle { id, abandoned, task }
    }

    /// Dispatch a translation and return a handle to await
    pub fn translate(&self, request: TranslationRequest) -> PendingTranslation {
        let (sender, receiver) = oneshot::channel();
        let handle = self.translate_with_callback(request, move |result| {
            // Receiver gone means the caller stopped waiting
            let _ = sender.send(result);
        });
        PendingTranslation { handle, receiver }
    }

    /// Translate on the current task, bounded by the worker pool
    pub async fn translate_now(&self, request: TranslationRequest) -> TranslationResult {
        let permit = match self.inner.workers.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => {
                return TranslationResult::failed(
                    TranslationError::Internal("worker pool closed".to_string()),
                    None,
                );
            }
        };

        let outcome = AssertUnwindSafe(self.resolve(request)).catch_unwind().await;
        drop(permit);

        match outcome {
            Ok(result) => result,
            Err(panic) => {
                let message = panic_message(panic);
                warn!("Translation panicked: {}", message);
                TranslationResult::failed(TranslationError::Internal(message), None)
            }
        }
    }

    /// Translate a message into the preferred language for its direction
    pub async fn translate_message(
        &self,
        message_text: &str,
        direction: MessageDirection,
        scope: Option<&str>,
    ) -> TranslationResult {
        let target = match direction {
            MessageDirection::Incoming => self.inner.preferences.preferred_incoming_language(),
            MessageDirection::Outgoing => self.inner.preferences.preferred_outgoing_language(),
        };
        let Some(target) = target else {
            return TranslationResult::failed(
                TranslationError::UnsupportedLanguage("no preferred language configured".to_string()),
                None,
            );
        };

        let mut request = TranslationRequest::new(message_text, target);
        if let Some(scope) = scope {
            request = request.in_scope(scope);
        }
        self.translate_now(request).await
    }

    /// Translate a batch through the worker pool; results keep input order
    pub async fn translate_many(&self, requests: Vec<TranslationRequest>) -> Vec<TranslationResult> {
        stream::iter(requests)
            .map(|request| self.translate_now(request))
            .buffered(self.inner.max_concurrent_requests)
            .collect()
            .await
    }

    async fn resolve(&self, request: TranslationRequest) -> TranslationResult {
        let inner = &self.inner;

        if request.source_text.trim().is_empty() {
            return TranslationResult::failed(TranslationError::EmptyInput, None);
        }

        let target = match language_utils::normalize_language_code(&request.target_language) {
            Ok(code) => code,
            Err(_) => {
                return TranslationResult::failed(
                    TranslationError::UnsupportedLanguage(request.target_language.clone()),
                    None,
                );
            }
        };

        let mode = request.mode.unwrap_or_else(|| inner.preferences.translation_mode());
        if let Err(e) = self.mode_gate(mode) {
            debug!("Mode {} refused request: {}", mode, e);
            return TranslationResult::failed(e, None);
        }

        let known_source = if request.needs_detection() {
            None
        } else {
            let raw = request.source_language.as_deref().unwrap_or_default();
            match language_utils::normalize_language_code(raw) {
                Ok(code) => Some(code),
                Err(_) => {
                    return TranslationResult::failed(
                        TranslationError::UnsupportedLanguage(raw.to_string()),
                        None,
                    );
                }
            }
        };

        if let Some(source) = &known_source {
            if !request.force_translation && *source == target {
                debug!("Source and target are both {}, skipping", target);
                return TranslationResult::succeeded(
                    request.source_text.clone(),
                    known_source.clone(),
                    ProviderUsed::None,
                );
            }
        }

        let key = CacheKey::new(&request.source_text, &target);
        if let Some(cached) = inner.cache.get(&key) {
            if let Some(scope) = &request.scope {
                inner.cache.put_scoped(key, &cached, Some(scope));
            }
            return TranslationResult::succeeded(cached, known_source, ProviderUsed::Cache);
        }

        let mut detection_error = None;
        let source = match known_source {
            Some(source) => Some(source),
            None => match inner.detector.detect(&request.source_text).await {
                Ok(DetectedLanguage { language_code, .. }) => Some(language_code),
                Err(e) => {
                    info!(
                        "Detection failed for '{}': {}",
                        truncate_text(&request.source_text, LOG_TEXT_CHARS),
                        e
                    );
                    detection_error = Some(e);
                    None
                }
            },
        };

        if let Some(source) = &source {
            if !request.force_translation && *source == target {
                debug!("Detected source equals target {}, skipping", target);
                return TranslationResult::succeeded(
                    request.source_text.clone(),
                    Some(source.clone()),
                    ProviderUsed::None,
                );
            }
        }

        let plan = match self.plan(mode, source.as_deref(), &target) {
            Ok(plan) => plan,
            Err(e) => {
                // Nobody could take an unknown source: the detection failure is the cause
                let error = match detection_error {
                    Some(detection_error) => detection_error,
                    None => e,
                };
                return TranslationResult::failed(error, source);
            }
        };

        let mut failures: Vec<(Route, TranslationError)> = Vec::new();
        for route in plan {
            debug!(
                "Translating '{}' {:?} -> {} via {:?}",
                truncate_text(&request.source_text, LOG_TEXT_CHARS),
                source,
                target,
                route
            );
            let outcome = match route {
                Route::Online => {
                    inner
                        .online
                        .translate(&request.source_text, source.as_deref(), &target)
                        .await
                }
                Route::Offline => {
                    inner
                        .offline
                        .translate(&request.source_text, source.as_deref(), &target)
                        .await
                }
            };

            match outcome {
                Ok(translated) => {
                    inner
                        .cache
                        .put_scoped(key, &translated, request.scope.as_deref());
                    return TranslationResult::succeeded(translated, source, route.provider_used());
                }
                Err(e) => {
                    warn!("{:?} translation failed: {}", route, e);
                    failures.push((route, e));
                }
            }
        }

        let error = match failures.len() {
            0 => TranslationError::Internal("no provider was attempted".to_string()),
            1 => failures.remove(0).1,
            _ => TranslationError::ProviderFailure(
                failures
                    .iter()
                    .map(|(route, e)| format!("{}: {}", route_name(*route), e))
                    .collect::<Vec<_>>()
                    .join("; "),
            ),
        };
        TranslationResult::failed(error, source)
    }

    /// Whether the offline provider may be used at all
    fn offline_allowed(&self) -> bool {
        self.inner.preferences.offline_enabled() && self.inner.offline.is_enabled()
    }

    /// Checks that need no source language
    fn mode_gate(&self, mode: TranslationMode) -> Result<(), TranslationError> {
        let inner = &self.inner;
        match mode {
            TranslationMode::OnlineOnly if !inner.online.is_available() => {
                Err(TranslationError::online_unavailable(inner.online.unavailable_reason()))
            }
            TranslationMode::OfflineOnly if !self.offline_allowed() => {
                Err(TranslationError::offline_unavailable("offline translation is disabled"))
            }
            TranslationMode::Auto if !inner.online.is_available() && !self.offline_allowed() => {
                Err(TranslationError::ProviderUnavailable {
                    provider: ProviderKind::Both,
                    reason: format!(
                        "online: {}; offline: offline translation is disabled",
                        inner.online.unavailable_reason()
                    ),
                })
            }
            _ => Ok(()),
        }
    }

    /// Ordered providers to try for this pair
    fn plan(&self, mode: TranslationMode, source: Option<&str>, target: &str) -> Result<Vec<Route>, TranslationError> {
        let inner = &self.inner;

        let offline_reason = if self.offline_allowed() {
            inner.offline.unavailability(source, target)
        } else {
            Some(TranslationError::offline_unavailable("offline translation is disabled"))
        };

        match mode {
            TranslationMode::OnlineOnly => {
                if inner.online.is_available() {
                    Ok(vec![Route::Online])
                } else {
                    Err(TranslationError::online_unavailable(inner.online.unavailable_reason()))
                }
            }
            TranslationMode::OfflineOnly => match offline_reason {
                None => Ok(vec![Route::Offline]),
                Some(reason) => Err(reason),
            },
            TranslationMode::Auto => {
                let mut routes = Vec::with_capacity(2);
                let offline_ok = offline_reason.is_none();
                let online_ok = inner.online.is_available();

                if inner.preferences.prefer_offline() {
                    if offline_ok {
                        routes.push(Route::Offline);
                    }
                    if online_ok {
                        routes.push(Route::Online);
                    }
                } else {
                    if online_ok {
                        routes.push(Route::Online);
                    }
                    if offline_ok {
                        routes.push(Route::Offline);
                    }
                }

                if routes.is_empty() {
                    let offline_text = offline_reason
                        .map(|e| e.to_string())
                        .unwrap_or_else(|| "unavailable".to_string());
                    return Err(TranslationError::ProviderUnavailable {
                        provider: ProviderKind::Both,
                        reason: format!(
                            "offline: {}; online: {}",
                            offline_text,
                            inner.online.unavailable_reason()
                        ),
                    });
                }
                Ok(routes)
            }
        }
    }

    /// Detect the language of `text`
    pub async fn detect_language(&self, text: &str) -> Result<DetectedLanguage, TranslationError> {
        match AssertUnwindSafe(self.inner.detector.detect(text)).catch_unwind().await {
            Ok(outcome) => outcome,
            Err(panic) => Err(TranslationError::Internal(panic_message(panic))),
        }
    }

    /// Snapshot of every model record
    pub fn model_status(&self) -> BTreeMap<String, ModelRecord> {
        self.inner.models.status_snapshot()
    }

    pub async fn request_model_download(
        &self,
        code: &str,
        progress: Option<ProgressFn>,
    ) -> Result<ModelRecord, TranslationError> {
        self.inner.models.request_download(code, progress).await
    }

    pub async fn remove_model(&self, code: &str) -> Result<ModelRecord, TranslationError> {
        self.inner.models.remove_model(code).await
    }

    pub async fn reconcile_models(&self) -> ReconcileReport {
        self.inner.models.reconcile().await
    }

    /// Live-probe models restored from storage; returns the codes confirmed
    pub async fn verify_models(&self) -> Vec<String> {
        self.inner.models.verify_restored().await
    }

    pub fn save_message_state(&self, key: MessageKey, state: MessageTranslationState) {
        self.inner.message_states.save(key, state);
    }

    pub fn restore_message_state(&self, key: &MessageKey) -> Option<MessageTranslationState> {
        self.inner.message_states.restore(key)
    }

    pub fn message_states(&self) -> &MessageStateArena {
        &self.inner.message_states
    }

    /// Drop cached translations tagged with `scope`
    pub fn clear_cache_for_scope(&self, scope: &str) -> usize {
        self.inner.cache.clear_for_scope(scope)
    }

    /// Drop one cached translation
    pub fn invalidate_cached(&self, text: &str, target_language: &str) -> bool {
        self.inner.cache.invalidate(&CacheKey::new(text, target_language))
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.inner.cache.stats()
    }

    /// Display name for a language code
    pub fn language_name(&self, code: &str) -> Option<String> {
        language_utils::get_language_name(code).ok()
    }

    /// Write cache and model records to durable storage
    pub fn persist(&self) -> Result<(), StorageError> {
        let Some(storage) = &self.inner.storage else {
            return Ok(());
        };
        let models = self.inner.models.persist(storage.as_ref())?;
        let entries = self.inner.cache.persist(storage.as_ref())?;
        debug!("Persisted {} model records and {} cache entries", models, entries);
        Ok(())
    }
}

fn route_name(route: Route) -> &'static str {
    match route {
        Route::Online => "online",
        Route::Offline => "offline",
    }
}
