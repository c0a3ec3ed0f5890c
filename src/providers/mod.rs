/*!
 * Backends the engine translates and detects with.
 *
 * The engine talks to three kinds of backend through traits so that the
 * policy code never depends on a concrete service:
 * - `TextTranslator`: network translation (Google Translate v2)
 * - `LanguageIdentifier`: source-language detection, online or on-device
 * - `OnDeviceEngine`: on-device translation plus model lifecycle
 *
 * `mock` provides scriptable implementations of all three for tests.
 */

use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::Arc;

use crate::errors::ProviderError;

pub mod google;
pub mod local;
pub mod mock;
pub mod script;

pub use google::GoogleTranslate;
pub use local::LocalServerEngine;
pub use script::ScriptIdentifier;

/// Download progress sink, receives percentages in 0..=100
pub type ProgressFn = Arc<dyn Fn(u8) + Send + Sync>;

/// A detected language with optional backend-reported confidence
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    /// Language code as reported by the backend
    pub language: String,
    /// Confidence in 0.0..=1.0, when the backend reports one
    pub confidence: Option<f32>,
}

/// Network translation backend
#[async_trait]
pub trait TextTranslator: Send + Sync + Debug {
    /// Whether credentials and endpoint are present
    fn is_configured(&self) -> bool;

    /// Translate `text` into `target`; `source` of `None` asks the backend to detect
    async fn translate(
        &self,
        text: &str,
        source: Option<&str>,
        target: &str,
    ) -> Result<String, ProviderError>;
}

/// Source-language detection backend
#[async_trait]
pub trait LanguageIdentifier: Send + Sync + Debug {
    fn is_configured(&self) -> bool;

    async fn identify(&self, text: &str) -> Result<Detection, ProviderError>;
}

/// On-device translation backend with model management
#[async_trait]
pub trait OnDeviceEngine: Send + Sync + Debug {
    /// Translate with locally installed models
    async fn translate(
        &self,
        text: &str,
        source: Option<&str>,
        target: &str,
    ) -> Result<String, ProviderError>;

    /// Live capability check: is a usable model for `code` present right now
    async fn probe(&self, code: &str) -> Result<bool, ProviderError>;

    /// Fetch the model for `code`, reporting progress
    async fn download(&self, code: &str, progress: ProgressFn) -> Result<(), ProviderError>;

    /// Remove the model for `code`
    async fn delete(&self, code: &str) -> Result<(), ProviderError>;

    /// Whether `translate` accepts an unknown source language
    fn supports_auto_source(&self) -> bool {
        false
    }
}
