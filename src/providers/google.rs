use async_trait::async_trait;
use log::{debug, error};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{Detection, LanguageIdentifier, TextTranslator};
use crate::errors::ProviderError;

/// Public Google Translate v2 endpoint
pub const DEFAULT_ENDPOINT: &str = "https://translation.googleapis.com/language/translate/v2";

static NUMERIC_ENTITY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"&#(x[0-9a-fA-F]+|[0-9]+);").unwrap()
});

/// Google Translate v2 REST client
#[derive(Debug, Clone)]
pub struct GoogleTranslate {
    /// HTTP client for API requests
    client: Client,
    /// API key; empty means unconfigured
    api_key: String,
    /// Base endpoint, `/detect` is appended for detection
    endpoint: String,
    /// Per-request timeout
    timeout: Duration,
}

/// Translate request body
#[derive(Debug, Serialize)]
struct TranslateRequest<'a> {
    q: &'a str,
    target: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    source: Option<&'a str>,
    format: &'a str,
}

#[derive(Debug, Serialize)]
struct DetectRequest<'a> {
    q: &'a str,
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
struct TranslationsData {
    translations: Vec<TranslationItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TranslationItem {
    translated_text: String,
    #[allow(dead_code)]
    detected_source_language: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DetectionsData {
    detections: Vec<Vec<DetectionItem>>,
}

#[derive(Debug, Deserialize)]
struct DetectionItem {
    language: String,
    confidence: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

impl GoogleTranslate {
    /// Create a new client
    pub fn new(api_key: impl Into<String>, endpoint: impl Into<String>, timeout: Duration) -> Self {
        let endpoint = endpoint.into();
        Self {
            client: Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_default(),
            api_key: api_key.into().trim().to_string(),
            endpoint: if endpoint.is_empty() {
                DEFAULT_ENDPOINT.to_string()
            } else {
                endpoint.trim_end_matches('/').to_string()
            },
            timeout,
        }
    }

    async fn post<B: Serialize + ?Sized, R: for<'de> Deserialize<'de>>(
        &self,
        url: &str,
        body: &B,
    ) -> Result<R, ProviderError> {
        let response = self
            .client
            .post(url)
            .query(&[("key", self.api_key.as_str())])
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(self.timeout.as_millis() as u64)
                } else if e.is_connect() {
                    ProviderError::ConnectionError(e.to_string())
                } else {
                    ProviderError::RequestFailed(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to get error response text".to_string());
            let message = serde_json::from_str::<ErrorEnvelope>(&error_text)
                .map(|e| e.error.message)
                .unwrap_or(error_text);
            error!("Google Translate API error ({}): {}", status, message);
            return Err(match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    ProviderError::AuthenticationError(message)
                }
                StatusCode::TOO_MANY_REQUESTS => ProviderError::RateLimitExceeded(message),
                _ => ProviderError::ApiError {
                    status_code: status.as_u16(),
                    message,
                },
            });
        }

        response
            .json::<R>()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))
    }
}

#[async_trait]
impl TextTranslator for GoogleTranslate {
    fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }

    async fn translate(
        &self,
        text: &str,
        source: Option<&str>,
        target: &str,
    ) -> Result<String, ProviderError> {
        if !TextTranslator::is_configured(self) {
            return Err(ProviderError::AuthenticationError("no API key configured".to_string()));
        }
        debug!("Google translate request: {:?} -> {}", source, target);

        let request = TranslateRequest {
            q: text,
            target,
            source,
            format: "text",
        };
        let envelope: Envelope<TranslationsData> = self.post(&self.endpoint, &request).await?;

        envelope
            .data
            .translations
            .into_iter()
            .next()
            .map(|t| unescape_html(&t.translated_text))
            .ok_or_else(|| ProviderError::ParseError("response contained no translations".to_string()))
    }
}

#[async_trait]
impl LanguageIdentifier for GoogleTranslate {
    fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }

    async fn identify(&self, text: &str) -> Result<Detection, ProviderError> {
        if !LanguageIdentifier::is_configured(self) {
            return Err(ProviderError::AuthenticationError("no API key configured".to_string()));
        }

        let url = format!("{}/detect", self.endpoint);
        let envelope: Envelope<DetectionsData> = self.post(&url, &DetectRequest { q: text }).await?;

        envelope
            .data
            .detections
            .into_iter()
            .flatten()
            .next()
            .map(|d| Detection {
                language: d.language,
                confidence: d.confidence,
            })
            .ok_or_else(|| ProviderError::ParseError("response contained no detections".to_string()))
    }
}

/// Decode the handful of HTML entities the v2 API emits even with `format=text`
pub fn unescape_html(text: &str) -> String {
    let named = text
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">");

    let numeric = NUMERIC_ENTITY.replace_all(&named, |caps: &regex::Captures| {
        let raw = &caps[1];
        let value = match raw.strip_prefix('x') {
            Some(hex) => u32::from_str_radix(hex, 16).ok(),
            None => raw.parse::<u32>().ok(),
        };
        value
            .and_then(char::from_u32)
            .map(String::from)
            .unwrap_or_else(|| caps[0].to_string())
    });

    // Ampersand last so "&amp;lt;" stays "&lt;"
    numeric.replace("&amp;", "&")
}
