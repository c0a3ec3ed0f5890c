/*!
 * Source-language detection with an online-then-offline chain.
 *
 * The online identifier runs first when it has credentials. Its failure,
 * timeout or unusable answer hands over to the offline identifier, whose
 * result must reach `min_confidence`. When both fail, detection fails.
 * No language is ever assumed here; choosing a fallback language is the
 * caller's decision.
 */

use log::{debug, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::errors::TranslationError;
use crate::language_utils;
use crate::providers::{Detection, LanguageIdentifier};

/// Default per-identifier time budget
pub const DEFAULT_DETECTION_TIMEOUT: Duration = Duration::from_secs(10);

/// Default offline confidence floor
pub const DEFAULT_MIN_CONFIDENCE: f32 = 0.5;

/// Which identifier produced a detection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectionSource {
    Online,
    Offline,
}

/// Normalized detection result
#[derive(Debug, Clone, PartialEq)]
pub struct DetectedLanguage {
    pub language_code: String,
    pub confidence: f32,
    pub source: DetectionSource,
}

#[derive(Debug, Clone)]
pub struct LanguageDetector {
    online: Option<Arc<dyn LanguageIdentifier>>,
    offline: Option<Arc<dyn LanguageIdentifier>>,
    timeout: Duration,
    min_confidence: f32,
}

impl LanguageDetector {
    pub fn new(
        online: Option<Arc<dyn LanguageIdentifier>>,
        offline: Option<Arc<dyn LanguageIdentifier>>,
    ) -> Self {
        Self {
            online,
            offline,
            timeout: DEFAULT_DETECTION_TIMEOUT,
            min_confidence: DEFAULT_MIN_CONFIDENCE,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_min_confidence(mut self, min_confidence: f32) -> Self {
        self.min_confidence = min_confidence.clamp(0.0, 1.0);
        self
    }

    /// Whether any identifier could run
    pub fn is_available(&self) -> bool {
        self.online.as_ref().is_some_and(|d| d.is_configured())
            || self.offline.as_ref().is_some_and(|d| d.is_configured())
    }

    async fn run(
        &self,
        identifier: &Arc<dyn LanguageIdentifier>,
        text: &str,
    ) -> Result<(String, Option<f32>), String> {
        let detection: Detection = match tokio::time::timeout(self.timeout, identifier.identify(text)).await {
            Ok(Ok(detection)) => detection,
            Ok(Err(e)) => return Err(e.to_string()),
            Err(_) => return Err(format!("timed out after {} ms", self.timeout.as_millis())),
        };

        let code = language_utils::normalize_language_code(&detection.language)
            .map_err(|_| format!("unusable language code {:?}", detection.language))?;
        Ok((code, detection.confidence))
    }

    /// Detect the language of `text`
    pub async fn detect(&self, text: &str) -> Result<DetectedLanguage, TranslationError> {
        if text.trim().is_empty() {
            return Err(TranslationError::EmptyInput);
        }

        let mut reasons = Vec::new();

        match &self.online {
            Some(online) if online.is_configured() => match self.run(online, text).await {
                Ok((language_code, confidence)) => {
                    let confidence = confidence.unwrap_or(1.0).clamp(0.0, 1.0);
                    debug!("Online detection: {} ({:.2})", language_code, confidence);
                    return Ok(DetectedLanguage {
                        language_code,
                        confidence,
                        source: DetectionSource::Online,
                    });
                }
                Err(reason) => {
                    warn!("Online language detection failed: {}", reason);
                    reasons.push(format!("online: {}", reason));
                }
            },
            _ => reasons.push("online: not configured".to_string()),
        }

        match &self.offline {
            Some(offline) if offline.is_configured() => match self.run(offline, text).await {
                Ok((language_code, confidence)) => {
                    let confidence = confidence.unwrap_or(1.0).clamp(0.0, 1.0);
                    if confidence >= self.min_confidence {
                        debug!("Offline detection: {} ({:.2})", language_code, confidence);
                        return Ok(DetectedLanguage {
                            language_code,
                            confidence,
                            source: DetectionSource::Offline,
                        });
                    }
                    reasons.push(format!(
                        "offline: {} below confidence {:.2} ({:.2})",
                        language_code, self.min_confidence, confidence
                    ));
                }
                Err(reason) => reasons.push(format!("offline: {}", reason)),
            },
            _ => reasons.push("offline: not configured".to_string()),
        }

        Err(TranslationError::LanguageDetectionFailed(reasons.join("; ")))
    }

    /// Detect on a background task and hand the outcome to `callback`
    ///
    /// The callback runs exactly once, on the spawned task.
    pub fn detect_with_callback<F>(self: &Arc<Self>, text: impl Into<String>, callback: F) -> JoinHandle<()>
    where
        F: FnOnce(Result<DetectedLanguage, TranslationError>) + Send + 'static,
    {
        let detector = Arc::clone(self);
        let text = text.into();
        tokio::spawn(async move {
            let outcome = detector.detect(&text).await;
            callback(outcome);
        })
    }
}
