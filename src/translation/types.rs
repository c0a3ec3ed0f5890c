/*!
 * Request and result value types for the translation engine.
 */

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::app_config::TranslationMode;
use crate::errors::{ErrorKind, TranslationError};
use crate::language_utils;

/// One translation request
///
/// Built with `TranslationRequest::new(text, target)` and the `with_*`
/// builder methods; never mutated once handed to the coordinator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslationRequest {
    pub source_text: String,
    pub target_language: String,
    /// `None` or "auto" requests detection
    pub source_language: Option<String>,
    /// Bypass the same-language skip
    pub force_translation: bool,
    /// Overrides the preferred mode for this call only
    pub mode: Option<TranslationMode>,
    /// Cache scope tag, such as a conversation thread id
    pub scope: Option<String>,
}

impl TranslationRequest {
    pub fn new(text: impl Into<String>, target_language: impl Into<String>) -> Self {
        Self {
            source_text: text.into(),
            target_language: target_language.into(),
            source_language: None,
            force_translation: false,
            mode: None,
            scope: None,
        }
    }

    pub fn with_source(mut self, source_language: impl Into<String>) -> Self {
        self.source_language = Some(source_language.into());
        self
    }

    pub fn force(mut self, force: bool) -> Self {
        self.force_translation = force;
        self
    }

    pub fn with_mode(mut self, mode: TranslationMode) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn in_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    /// Whether the source must be detected
    pub fn needs_detection(&self) -> bool {
        language_utils::is_auto(self.source_language.as_deref())
    }
}

/// Which path produced a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderUsed {
    Cache,
    Online,
    Offline,
    /// Same-language no-op or failure before any provider ran
    None,
}

impl fmt::Display for ProviderUsed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProviderUsed::Cache => "cache",
            ProviderUsed::Online => "online",
            ProviderUsed::Offline => "offline",
            ProviderUsed::None => "none",
        };
        write!(f, "{}", name)
    }
}

/// Outcome of one translation request
#[derive(Debug, Clone, PartialEq)]
pub struct TranslationResult {
    pub success: bool,
    /// Present iff `success`
    pub translated_text: Option<String>,
    /// Present iff not `success`
    pub error: Option<TranslationError>,
    pub detected_source_language: Option<String>,
    pub provider_used: ProviderUsed,
}

impl TranslationResult {
    pub fn succeeded(
        text: impl Into<String>,
        detected_source_language: Option<String>,
        provider_used: ProviderUsed,
    ) -> Self {
        Self {
            success: true,
            translated_text: Some(text.into()),
            error: None,
            detected_source_language,
            provider_used,
        }
    }

    pub fn failed(error: TranslationError, detected_source_language: Option<String>) -> Self {
        Self {
            success: false,
            translated_text: None,
            error: Some(error),
            detected_source_language,
            provider_used: ProviderUsed::None,
        }
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error.as_ref().map(TranslationError::kind)
    }

    /// Convert into a plain `Result`
    pub fn into_result(self) -> Result<String, TranslationError> {
        match (self.translated_text, self.error) {
            (Some(text), None) => Ok(text),
            (_, Some(error)) => Err(error),
            (None, None) => Err(TranslationError::Internal("result carried no outcome".to_string())),
        }
    }
}

/// Whether a message was received or is being sent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageDirection {
    Incoming,
    Outgoing,
}
