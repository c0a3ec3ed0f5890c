/*!
 * Error types for the msgtranslate engine.
 *
 * This module contains custom error types for different parts of the engine,
 * using the thiserror crate for ergonomic error definitions.
 */

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors that can occur when working with backend APIs
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    /// Error when making an API request fails
    #[error("API request failed: {0}")]
    RequestFailed(String),

    /// Error when parsing an API response fails
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// Error returned by the API itself
    #[error("API responded with error: {status_code} - {message}")]
    ApiError {
        /// HTTP status code
        status_code: u16,
        /// Error message from the API
        message: String,
    },

    /// Error establishing or maintaining a connection
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Error related to rate limiting
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// Error with authentication
    #[error("Authentication error: {0}")]
    AuthenticationError(String),

    /// The backend did not answer within its time budget
    #[error("Timed out after {0} ms")]
    Timeout(u64),

    /// The backend does not handle this language
    #[error("Unsupported language: {0}")]
    UnsupportedLanguage(String),
}

/// Which provider an availability failure refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    Online,
    Offline,
    /// Auto mode found neither provider usable
    Both,
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderKind::Online => write!(f, "online"),
            ProviderKind::Offline => write!(f, "offline"),
            ProviderKind::Both => write!(f, "online and offline"),
        }
    }
}

/// Fieldless tag for a translation outcome failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    EmptyInput,
    LanguageDetectionFailed,
    ProviderUnavailable,
    ModelNotDownloaded,
    ModelAlreadyDownloaded,
    UnsupportedLanguage,
    DownloadInProgress,
    Timeout,
    ProviderFailure,
    Internal,
}

/// Errors that can occur during translation, detection and model management
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TranslationError {
    /// Nothing to translate or detect
    #[error("empty text")]
    EmptyInput,

    /// Neither detector produced a language
    #[error("language detection failed: {0}")]
    LanguageDetectionFailed(String),

    /// The provider required by the mode cannot be used
    #[error("{provider} translation unavailable: {reason}")]
    ProviderUnavailable {
        provider: ProviderKind,
        reason: String,
    },

    /// An offline model needed for the pair is not usable
    #[error("offline model not available for {language}")]
    ModelNotDownloaded { language: String },

    /// Download requested for a model that is already on the device
    #[error("already downloaded: {0}")]
    ModelAlreadyDownloaded(String),

    /// The language code is not part of the offline catalog
    #[error("unsupported language: {0}")]
    UnsupportedLanguage(String),

    /// A download for this code is already running
    #[error("download already in progress: {0}")]
    DownloadInProgress(String),

    /// A time-bounded call ran out of time
    #[error("timed out: {0}")]
    Timeout(String),

    /// The provider reported a failure
    #[error("provider failure: {0}")]
    ProviderFailure(String),

    /// Internal fault converted into an outcome
    #[error("internal error: {0}")]
    Internal(String),
}

impl TranslationError {
    /// Tag for this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::EmptyInput => ErrorKind::EmptyInput,
            Self::LanguageDetectionFailed(_) => ErrorKind::LanguageDetectionFailed,
            Self::ProviderUnavailable { .. } => ErrorKind::ProviderUnavailable,
            Self::ModelNotDownloaded { .. } => ErrorKind::ModelNotDownloaded,
            Self::ModelAlreadyDownloaded(_) => ErrorKind::ModelAlreadyDownloaded,
            Self::UnsupportedLanguage(_) => ErrorKind::UnsupportedLanguage,
            Self::DownloadInProgress(_) => ErrorKind::DownloadInProgress,
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::ProviderFailure(_) => ErrorKind::ProviderFailure,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Shorthand for an online availability failure
    pub fn online_unavailable(reason: impl Into<String>) -> Self {
        Self::ProviderUnavailable {
            provider: ProviderKind::Online,
            reason: reason.into(),
        }
    }

    /// Shorthand for an offline availability failure
    pub fn offline_unavailable(reason: impl Into<String>) -> Self {
        Self::ProviderUnavailable {
            provider: ProviderKind::Offline,
            reason: reason.into(),
        }
    }
}

impl From<ProviderError> for TranslationError {
    fn from(error: ProviderError) -> Self {
        match error {
            ProviderError::Timeout(ms) => Self::Timeout(format!("provider did not answer within {} ms", ms)),
            ProviderError::UnsupportedLanguage(code) => Self::UnsupportedLanguage(code),
            other => Self::ProviderFailure(other.to_string()),
        }
    }
}

/// Errors from the key/value persistence layer
#[derive(Error, Debug)]
pub enum StorageError {
    /// SQLite failure
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A stored value could not be (de)serialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The connection lock was poisoned or unavailable
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// Main application error type that wraps all other errors
#[derive(Error, Debug)]
pub enum AppError {
    /// Error from a file operation
    #[error("File error: {0}")]
    File(String),

    /// Error from a backend
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Error from translation
    #[error("Translation error: {0}")]
    Translation(#[from] TranslationError),

    /// Error from persistence
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Any other error
    #[error("Unknown error: {0}")]
    Unknown(String),
}

// Utility functions for error conversion
impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        Self::Unknown(error.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        Self::File(error.to_string())
    }
}
