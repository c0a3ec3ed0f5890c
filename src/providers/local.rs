/*!
 * Client for a local on-device translation server.
 *
 * The server speaks the LibreTranslate HTTP API:
 * - `POST /translate` with `q`, `source` ("auto" allowed), `target`
 * - `POST /detect` returning candidates with 0-100 confidence
 * - `GET /languages` listing installed language models
 *
 * Installed models are owned by the server. `download` succeeds once the
 * server reports the language; `delete` hides a language locally until it
 * is downloaded again.
 */

use async_trait::async_trait;
use log::{debug, info, warn};
use parking_lot::RwLock;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

use super::{Detection, LanguageIdentifier, OnDeviceEngine, ProgressFn};
use crate::errors::ProviderError;

#[derive(Debug)]
pub struct LocalServerEngine {
    client: Client,
    base_url: String,
    timeout: Duration,
    /// Languages removed on this device
    removed: RwLock<HashSet<String>>,
}

#[derive(Debug, Serialize)]
struct TranslateRequest<'a> {
    q: &'a str,
    source: &'a str,
    target: &'a str,
    format: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TranslateResponse {
    translated_text: String,
}

#[derive(Debug, Serialize)]
struct DetectRequest<'a> {
    q: &'a str,
}

#[derive(Debug, Deserialize)]
struct DetectCandidate {
    language: String,
    confidence: f32,
}

#[derive(Debug, Deserialize)]
struct ServerLanguage {
    code: String,
}

impl LocalServerEngine {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_default(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
            removed: RwLock::new(HashSet::new()),
        }
    }

    fn map_send_error(&self, e: reqwest::Error) -> ProviderError {
        if e.is_timeout() {
            ProviderError::Timeout(self.timeout.as_millis() as u64)
        } else if e.is_connect() {
            ProviderError::ConnectionError(format!("local server at {} unreachable: {}", self.base_url, e))
        } else {
            ProviderError::RequestFailed(e.to_string())
        }
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ProviderError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "Failed to get error response text".to_string());
        Err(ProviderError::ApiError {
            status_code: status.as_u16(),
            message,
        })
    }

    /// Language codes the server has installed
    pub async fn installed_languages(&self) -> Result<Vec<String>, ProviderError> {
        let response = self
            .client
            .get(format!("{}/languages", self.base_url))
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;
        let languages: Vec<ServerLanguage> = Self::check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))?;
        Ok(languages.into_iter().map(|l| l.code.to_lowercase()).collect())
    }

    fn is_removed(&self, code: &str) -> bool {
        self.removed.read().contains(code)
    }
}

#[async_trait]
impl OnDeviceEngine for LocalServerEngine {
    async fn translate(
        &self,
        text: &str,
        source: Option<&str>,
        target: &str,
    ) -> Result<String, ProviderError> {
        for code in source.into_iter().chain(std::iter::once(target)) {
            if self.is_removed(code) {
                return Err(ProviderError::UnsupportedLanguage(code.to_string()));
            }
        }

        let request = TranslateRequest {
            q: text,
            source: source.unwrap_or("auto"),
            target,
            format: "text",
        };
        let response = self
            .client
            .post(format!("{}/translate", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;
        let body: TranslateResponse = Self::check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))?;
        Ok(body.translated_text)
    }

    async fn probe(&self, code: &str) -> Result<bool, ProviderError> {
        if self.is_removed(code) {
            return Ok(false);
        }
        let installed = self.installed_languages().await?;
        Ok(installed.iter().any(|c| c == code))
    }

    async fn download(&self, code: &str, progress: ProgressFn) -> Result<(), ProviderError> {
        progress(10);
        let installed = self.installed_languages().await?;
        progress(50);

        if !installed.iter().any(|c| c == code) {
            warn!("Local server has no model for {}", code);
            return Err(ProviderError::UnsupportedLanguage(code.to_string()));
        }

        self.removed.write().remove(code);
        progress(90);
        info!("Model {} is available on the local server", code);
        progress(100);
        Ok(())
    }

    async fn delete(&self, code: &str) -> Result<(), ProviderError> {
        debug!("Hiding local model {}", code);
        self.removed.write().insert(code.to_string());
        Ok(())
    }

    fn supports_auto_source(&self) -> bool {
        true
    }
}

#[async_trait]
impl LanguageIdentifier for LocalServerEngine {
    fn is_configured(&self) -> bool {
        !self.base_url.is_empty()
    }

    async fn identify(&self, text: &str) -> Result<Detection, ProviderError> {
        let response = self
            .client
            .post(format!("{}/detect", self.base_url))
            .json(&DetectRequest { q: text })
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;
        let candidates: Vec<DetectCandidate> = Self::check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))?;

        candidates
            .into_iter()
            .max_by(|a, b| a.confidence.total_cmp(&b.confidence))
            .map(|c| Detection {
                language: c.language,
                // Server reports 0-100
                confidence: Some((c.confidence / 100.0).clamp(0.0, 1.0)),
            })
            .ok_or_else(|| ProviderError::ParseError("no detection candidates".to_string()))
    }
}
