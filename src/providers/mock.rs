/*!
 * Mock backend implementations for testing.
 *
 * This module provides mock backends that simulate different behaviors:
 * - `MockTranslator::working()` - Always succeeds with translated text
 * - `MockTranslator::intermittent(n)` - Fails every nth request
 * - `MockTranslator::failing()` - Always fails with an error
 * - `MockIdentifier::returning(..)` - Fixed detection result
 * - `MockEngine` - On-device engine with scriptable installed models
 *
 * Clones share their counters and model sets, so a test can keep one handle
 * while the engine owns another.
 */

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::{Detection, LanguageIdentifier, OnDeviceEngine, ProgressFn, TextTranslator};
use crate::errors::ProviderError;
use crate::language_utils::OFFLINE_CATALOG;

/// Mock request for testing
#[derive(Debug, Clone)]
pub struct MockRequest {
    /// The text to translate
    pub text: String,
    /// Source language, `None` when auto-detecting
    pub source_language: Option<String>,
    /// Target language
    pub target_language: String,
}

/// Behavior mode for mock backends
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MockBehavior {
    /// Always succeeds with a proper translation
    Working,
    /// Fails intermittently (every Nth request)
    Intermittent { fail_every: usize },
    /// Always fails with an error
    Failing,
    /// Returns empty response
    Empty,
    /// Simulates slow response (for timeout testing)
    Slow { delay_ms: u64 },
    /// Panics inside the call
    Panicking,
}

type PhraseTable = Arc<RwLock<HashMap<(String, String), String>>>;

async fn respond(
    behavior: MockBehavior,
    count: usize,
    request: &MockRequest,
    phrases: &PhraseTable,
    custom_response: Option<fn(&MockRequest) -> String>,
) -> Result<String, ProviderError> {
    let translated = || {
        if let Some(text) = phrases
            .read()
            .get(&(request.text.clone(), request.target_language.clone()))
        {
            return text.clone();
        }
        match custom_response {
            Some(generator) => generator(request),
            None => format!("[TRANSLATED to {}] {}", request.target_language, request.text),
        }
    };

    match behavior {
        MockBehavior::Working => Ok(translated()),

        MockBehavior::Intermittent { fail_every } => {
            if fail_every > 0 && count % fail_every == fail_every - 1 {
                Err(ProviderError::ApiError {
                    message: format!("Simulated intermittent failure (request #{})", count + 1),
                    status_code: 503,
                })
            } else {
                Ok(translated())
            }
        }

        MockBehavior::Failing => Err(ProviderError::ApiError {
            message: "Simulated provider failure".to_string(),
            status_code: 500,
        }),

        MockBehavior::Empty => Ok(String::new()),

        MockBehavior::Slow { delay_ms } => {
            tokio::time::sleep(tokio::time::Duration::from_millis(delay_ms)).await;
            Ok(translated())
        }

        MockBehavior::Panicking => panic!("Simulated backend panic"),
    }
}

/// Mock online translator
#[derive(Debug, Clone)]
pub struct MockTranslator {
    behavior: MockBehavior,
    configured: bool,
    request_count: Arc<AtomicUsize>,
    requests: Arc<RwLock<Vec<MockRequest>>>,
    phrases: PhraseTable,
    custom_response: Option<fn(&MockRequest) -> String>,
}

impl MockTranslator {
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            configured: true,
            request_count: Arc::new(AtomicUsize::new(0)),
            requests: Arc::new(RwLock::new(Vec::new())),
            phrases: Arc::new(RwLock::new(HashMap::new())),
            custom_response: None,
        }
    }

    pub fn working() -> Self {
        Self::new(MockBehavior::Working)
    }

    pub fn intermittent(fail_every: usize) -> Self {
        Self::new(MockBehavior::Intermittent { fail_every })
    }

    pub fn failing() -> Self {
        Self::new(MockBehavior::Failing)
    }

    pub fn empty() -> Self {
        Self::new(MockBehavior::Empty)
    }

    pub fn slow(delay_ms: u64) -> Self {
        Self::new(MockBehavior::Slow { delay_ms })
    }

    pub fn panicking() -> Self {
        Self::new(MockBehavior::Panicking)
    }

    /// A translator without credentials
    pub fn unconfigured() -> Self {
        Self {
            configured: false,
            ..Self::working()
        }
    }

    /// Fixed translation for `(text, target)`
    pub fn with_phrase(self, text: &str, target: &str, translation: &str) -> Self {
        self.phrases
            .write()
            .insert((text.to_string(), target.to_string()), translation.to_string());
        self
    }

    /// Set a custom response generator
    pub fn with_custom_response(mut self, generator: fn(&MockRequest) -> String) -> Self {
        self.custom_response = Some(generator);
        self
    }

    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<MockRequest> {
        self.requests.read().clone()
    }
}

#[async_trait]
impl TextTranslator for MockTranslator {
    fn is_configured(&self) -> bool {
        self.configured
    }

    async fn translate(
        &self,
        text: &str,
        source: Option<&str>,
        target: &str,
    ) -> Result<String, ProviderError> {
        let count = self.request_count.fetch_add(1, Ordering::SeqCst);
        let request = MockRequest {
            text: text.to_string(),
            source_language: source.map(str::to_string),
            target_language: target.to_string(),
        };
        self.requests.write().push(request.clone());
        respond(self.behavior, count, &request, &self.phrases, self.custom_response).await
    }
}

/// Mock language identifier
#[derive(Debug, Clone)]
pub struct MockIdentifier {
    result: Result<Detection, ProviderError>,
    delay_ms: Option<u64>,
    configured: bool,
    request_count: Arc<AtomicUsize>,
}

impl MockIdentifier {
    /// Always detects `language`
    pub fn returning(language: &str, confidence: Option<f32>) -> Self {
        Self {
            result: Ok(Detection {
                language: language.to_string(),
                confidence,
            }),
            delay_ms: None,
            configured: true,
            request_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn failing() -> Self {
        Self {
            result: Err(ProviderError::RequestFailed("Simulated detection failure".to_string())),
            ..Self::returning("und", None)
        }
    }

    pub fn unconfigured() -> Self {
        Self {
            configured: false,
            ..Self::failing()
        }
    }

    /// Delay every answer, for timeout tests
    pub fn delayed(mut self, delay_ms: u64) -> Self {
        self.delay_ms = Some(delay_ms);
        self
    }

    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LanguageIdentifier for MockIdentifier {
    fn is_configured(&self) -> bool {
        self.configured
    }

    async fn identify(&self, _text: &str) -> Result<Detection, ProviderError> {
        self.request_count.fetch_add(1, Ordering::SeqCst);
        if let Some(delay_ms) = self.delay_ms {
            tokio::time::sleep(tokio::time::Duration::from_millis(delay_ms)).await;
        }
        self.result.clone()
    }
}

/// How `MockEngine::download` behaves
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DownloadBehavior {
    /// Report 10/50/90/100 and install
    Succeed,
    /// Report 10 then fail
    Fail,
    /// Sleep before finishing
    Slow { delay_ms: u64 },
}

/// Mock on-device engine
#[derive(Debug, Clone)]
pub struct MockEngine {
    behavior: MockBehavior,
    download_behavior: DownloadBehavior,
    auto_source: bool,
    downloadable: Arc<RwLock<HashSet<String>>>,
    installed: Arc<RwLock<HashSet<String>>>,
    broken: Arc<RwLock<HashSet<String>>>,
    phrases: PhraseTable,
    translate_count: Arc<AtomicUsize>,
    probe_count: Arc<AtomicUsize>,
    download_count: Arc<AtomicUsize>,
}

impl MockEngine {
    /// Engine that can download every catalog language and has none installed
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            download_behavior: DownloadBehavior::Succeed,
            auto_source: false,
            downloadable: Arc::new(RwLock::new(
                OFFLINE_CATALOG.iter().map(|l| l.code.to_string()).collect(),
            )),
            installed: Arc::new(RwLock::new(HashSet::new())),
            broken: Arc::new(RwLock::new(HashSet::new())),
            phrases: Arc::new(RwLock::new(HashMap::new())),
            translate_count: Arc::new(AtomicUsize::new(0)),
            probe_count: Arc::new(AtomicUsize::new(0)),
            download_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn working() -> Self {
        Self::new(MockBehavior::Working)
    }

    pub fn with_download_behavior(mut self, behavior: DownloadBehavior) -> Self {
        self.download_behavior = behavior;
        self
    }

    pub fn with_auto_source(mut self, supported: bool) -> Self {
        self.auto_source = supported;
        self
    }

    /// Pretend these models are already on the device
    pub fn with_installed(self, codes: &[&str]) -> Self {
        self.installed
            .write()
            .extend(codes.iter().map(|c| c.to_string()));
        self
    }

    pub fn with_phrase(self, text: &str, target: &str, translation: &str) -> Self {
        self.phrases
            .write()
            .insert((text.to_string(), target.to_string()), translation.to_string());
        self
    }

    /// Make an installed model fail live probes
    pub fn break_model(&self, code: &str) {
        self.broken.write().insert(code.to_string());
    }

    /// Remove a model behind the store's back
    pub fn uninstall(&self, code: &str) {
        self.installed.write().remove(code);
    }

    pub fn is_installed(&self, code: &str) -> bool {
        self.installed.read().contains(code)
    }

    pub fn translate_count(&self) -> usize {
        self.translate_count.load(Ordering::SeqCst)
    }

    pub fn probe_count(&self) -> usize {
        self.probe_count.load(Ordering::SeqCst)
    }

    pub fn download_count(&self) -> usize {
        self.download_count.load(Ordering::SeqCst)
    }

    fn usable(&self, code: &str) -> bool {
        self.installed.read().contains(code) && !self.broken.read().contains(code)
    }
}

#[async_trait]
impl OnDeviceEngine for MockEngine {
    async fn translate(
        &self,
        text: &str,
        source: Option<&str>,
        target: &str,
    ) -> Result<String, ProviderError> {
        let count = self.translate_count.fetch_add(1, Ordering::SeqCst);
        if source.is_none() && !self.auto_source {
            return Err(ProviderError::RequestFailed("source language required".to_string()));
        }
        for code in source.into_iter().chain(std::iter::once(target)) {
            if !self.usable(code) {
                return Err(ProviderError::UnsupportedLanguage(code.to_string()));
            }
        }

        let request = MockRequest {
            text: text.to_string(),
            source_language: source.map(str::to_string),
            target_language: target.to_string(),
        };
        respond(self.behavior, count, &request, &self.phrases, None).await
    }

    async fn probe(&self, code: &str) -> Result<bool, ProviderError> {
        self.probe_count.fetch_add(1, Ordering::SeqCst);
        Ok(self.usable(code))
    }

    async fn download(&self, code: &str, progress: ProgressFn) -> Result<(), ProviderError> {
        self.download_count.fetch_add(1, Ordering::SeqCst);
        progress(10);

        if !self.downloadable.read().contains(code) {
            return Err(ProviderError::UnsupportedLanguage(code.to_string()));
        }

        match self.download_behavior {
            DownloadBehavior::Succeed => {}
            DownloadBehavior::Fail => {
                return Err(ProviderError::ConnectionError(
                    "Simulated download failure".to_string(),
                ));
            }
            DownloadBehavior::Slow { delay_ms } => {
                tokio::time::sleep(tokio::time::Duration::from_millis(delay_ms)).await;
            }
        }

        progress(50);
        self.installed.write().insert(code.to_string());
        self.broken.write().remove(code);
        progress(90);
        progress(100);
        Ok(())
    }

    async fn delete(&self, code: &str) -> Result<(), ProviderError> {
        self.installed.write().remove(code);
        self.broken.write().remove(code);
        Ok(())
    }

    fn supports_auto_source(&self) -> bool {
        self.auto_source
    }
}
