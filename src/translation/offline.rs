/*!
 * Offline translation provider.
 *
 * Availability answers come from the `ModelAvailabilityStore`. The provider
 * keeps a set of usable codes for fast lookups, tagged with the store
 * generation it was built from, and rebuilds it whenever the store's
 * generation has moved. It never records availability on its own.
 *
 * When the engine fails on a model the store believes is usable, the
 * provider probes the models involved and reports dead ones back to the
 * store, which demotes them to ERROR.
 */

use log::{debug, info, warn};
use parking_lot::RwLock;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use super::model_store::ModelAvailabilityStore;
use crate::errors::{ProviderError, TranslationError};
use crate::language_utils;
use crate::providers::OnDeviceEngine;

/// Default on-device call budget
pub const DEFAULT_OFFLINE_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug)]
struct AvailabilityView {
    generation: u64,
    usable: HashSet<String>,
}

#[derive(Debug)]
pub struct OfflineProvider {
    store: ModelAvailabilityStore,
    engine: Arc<dyn OnDeviceEngine>,
    view: RwLock<AvailabilityView>,
    timeout: Duration,
    enabled: AtomicBool,
}

impl OfflineProvider {
    pub fn new(store: ModelAvailabilityStore) -> Self {
        let engine = store.engine();
        Self {
            store,
            engine,
            view: RwLock::new(AvailabilityView {
                // Forces a refresh on first use
                generation: u64::MAX,
                usable: HashSet::new(),
            }),
            timeout: DEFAULT_OFFLINE_TIMEOUT,
            enabled: AtomicBool::new(true),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn store(&self) -> &ModelAvailabilityStore {
        &self.store
    }

    /// User switch; a disabled provider is never available
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub fn supports_auto_source(&self) -> bool {
        self.engine.supports_auto_source()
    }

    fn usable(&self, code: &str) -> bool {
        let generation = self.store.generation();
        {
            let view = self.view.read();
            if view.generation == generation {
                return view.usable.contains(code);
            }
        }

        let (generation, snapshot) = self.store.snapshot_with_generation();
        let usable: HashSet<String> = snapshot
            .into_values()
            .filter(|r| r.is_usable())
            .map(|r| r.language_code)
            .collect();
        let answer = usable.contains(code);
        debug!("Offline availability view refreshed at generation {} ({} usable)", generation, usable.len());

        let mut view = self.view.write();
        // A newer refresh may have landed while we built this one
        if view.generation == u64::MAX || generation > view.generation {
            *view = AvailabilityView { generation, usable };
        }
        answer
    }

    /// Why the pair cannot be served, or `None` if it can
    pub fn unavailability(&self, source: Option<&str>, target: &str) -> Option<TranslationError> {
        if !self.is_enabled() {
            return Some(TranslationError::offline_unavailable("offline translation is disabled"));
        }

        let target = match language_utils::normalize_language_code(target) {
            Ok(code) => code,
            Err(_) => return Some(TranslationError::UnsupportedLanguage(target.to_string())),
        };

        let source = match source {
            Some(code) => match language_utils::normalize_language_code(code) {
                Ok(code) => Some(code),
                Err(_) => return Some(TranslationError::UnsupportedLanguage(code.to_string())),
            },
            None if self.engine.supports_auto_source() => None,
            None => {
                return Some(TranslationError::offline_unavailable(
                    "source language unknown and the offline engine cannot detect it",
                ));
            }
        };

        for code in source.iter().chain(std::iter::once(&target)) {
            if !self.usable(code) {
                return Some(TranslationError::ModelNotDownloaded {
                    language: code.clone(),
                });
            }
        }
        None
    }

    /// True iff both models are downloaded and verified in the store
    pub fn is_available(&self, source: Option<&str>, target: &str) -> bool {
        self.unavailability(source, target).is_none()
    }

    /// Translate with on-device models
    pub async fn translate(
        &self,
        text: &str,
        source: Option<&str>,
        target: &str,
    ) -> Result<String, TranslationError> {
        if let Some(reason) = self.unavailability(source, target) {
            return Err(reason);
        }

        let source = source.and_then(|c| language_utils::normalize_language_code(c).ok());
        let target = language_utils::normalize_language_code(target)
            .map_err(|_| TranslationError::UnsupportedLanguage(target.to_string()))?;

        debug!("Offline translation {:?} -> {}", source, target);
        let outcome = tokio::time::timeout(
            self.timeout,
            self.engine.translate(text, source.as_deref(), &target),
        )
        .await;

        match outcome {
            Ok(Ok(translated)) if !translated.trim().is_empty() => Ok(translated),
            Ok(Ok(_)) => Err(TranslationError::ProviderFailure(
                "offline engine returned an empty translation".to_string(),
            )),
            Ok(Err(e)) => Err(self.diagnose_failure(source.as_deref(), &target, e).await),
            Err(_) => Err(ProviderError::Timeout(self.timeout.as_millis() as u64).into()),
        }
    }

    /// Probe the models behind a failed call and report dead ones
    async fn diagnose_failure(
        &self,
        source: Option<&str>,
        target: &str,
        error: ProviderError,
    ) -> TranslationError {
        warn!("Offline engine failed: {}", error);

        for code in source.into_iter().chain(std::iter::once(target)) {
            match self.engine.probe(code).await {
                Ok(true) => {}
                Ok(false) => {
                    info!("Model {} failed its live probe; asking store to re-verify", code);
                    self.store
                        .report_probe_failure(code, &format!("live probe failed: {}", error));
                    return TranslationError::ModelNotDownloaded {
                        language: code.to_string(),
                    };
                }
                Err(probe_error) => {
                    debug!("Probe for {} failed: {}", code, probe_error);
                }
            }
        }

        error.into()
    }
}
