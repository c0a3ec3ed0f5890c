use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::default::Default;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application configuration module
/// This module handles the engine configuration including loading,
/// validating and saving configuration settings.
/// Represents the engine configuration
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Config {
    /// Translation policy settings
    #[serde(default)]
    pub translation: TranslationConfig,

    /// Online (network) provider settings
    #[serde(default)]
    pub online: OnlineConfig,

    /// Offline (on-device) provider settings
    #[serde(default)]
    pub offline: OfflineConfig,

    /// Language detection settings
    #[serde(default)]
    pub detection: DetectionConfig,

    /// Durable storage settings
    #[serde(default)]
    pub storage: StorageConfig,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Which provider(s) a translation may use
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum TranslationMode {
    // @mode: Prefer offline, fall back to online
    #[default]
    Auto,
    // @mode: Network provider only
    OnlineOnly,
    // @mode: On-device provider only
    OfflineOnly,
}

impl TranslationMode {
    // @returns: Human readable mode name
    pub fn display_name(&self) -> &str {
        match self {
            Self::Auto => "Automatic",
            Self::OnlineOnly => "Online only",
            Self::OfflineOnly => "Offline only",
        }
    }

    // @returns: Stable identifier used in config files and preferences
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::OnlineOnly => "online_only",
            Self::OfflineOnly => "offline_only",
        }
    }
}

impl std::fmt::Display for TranslationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for TranslationMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "auto" => Ok(Self::Auto),
            "online_only" | "online" => Ok(Self::OnlineOnly),
            "offline_only" | "offline" => Ok(Self::OfflineOnly),
            _ => Err(anyhow!("Invalid translation mode: {}", s)),
        }
    }
}

/// Translation policy configuration
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct TranslationConfig {
    /// Default mode when the preference store has none
    #[serde(default)]
    pub mode: TranslationMode,

    /// Whether results are memoized
    #[serde(default = "default_true")]
    pub cache_enabled: bool,

    /// Size of the worker pool
    #[serde(default = "default_concurrent_requests")]
    pub max_concurrent_requests: usize,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            mode: TranslationMode::default(),
            cache_enabled: true,
            max_concurrent_requests: default_concurrent_requests(),
        }
    }
}

/// Online provider configuration
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct OnlineConfig {
    // @field: API key; empty means the online provider is unavailable
    #[serde(default = "String::new")]
    pub api_key: String,

    // @field: Service URL
    #[serde(default = "default_online_endpoint")]
    pub endpoint: String,

    // @field: Timeout seconds
    #[serde(default = "default_online_timeout_secs")]
    pub timeout_secs: u64,

    // @field: Minimum spacing between online calls, 0 disables
    #[serde(default)]
    pub min_interval_ms: u64,

    // @field: Daily cap on online calls
    #[serde(default)]
    pub max_requests_per_day: Option<u32>,
}

impl Default for OnlineConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            endpoint: default_online_endpoint(),
            timeout_secs: default_online_timeout_secs(),
            min_interval_ms: 0,
            max_requests_per_day: None,
        }
    }
}

impl OnlineConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Offline provider configuration
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct OfflineConfig {
    /// Local on-device translation server
    #[serde(default = "default_offline_endpoint")]
    pub endpoint: String,

    /// Translation timeout in seconds
    #[serde(default = "default_offline_timeout_secs")]
    pub timeout_secs: u64,

    /// Model download timeout in seconds
    #[serde(default = "default_download_timeout_secs")]
    pub download_timeout_secs: u64,
}

impl Default for OfflineConfig {
    fn default() -> Self {
        Self {
            endpoint: default_offline_endpoint(),
            timeout_secs: default_offline_timeout_secs(),
            download_timeout_secs: default_download_timeout_secs(),
        }
    }
}

impl OfflineConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }
}

/// Language detection configuration
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct DetectionConfig {
    /// Per-detector timeout in seconds
    #[serde(default = "default_detection_timeout_secs")]
    pub timeout_secs: u64,

    /// Offline results below this confidence count as failures
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f32,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_detection_timeout_secs(),
            min_confidence: default_min_confidence(),
        }
    }
}

impl DetectionConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Durable storage configuration
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct StorageConfig {
    /// SQLite database file; defaults to the platform data directory
    #[serde(default)]
    pub database_path: Option<PathBuf>,
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn to_level_filter(&self) -> log::LevelFilter {
        match self {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

fn default_concurrent_requests() -> usize {
    4
}

fn default_online_timeout_secs() -> u64 {
    10
}

fn default_offline_timeout_secs() -> u64 {
    30
}

fn default_download_timeout_secs() -> u64 {
    60
}

fn default_detection_timeout_secs() -> u64 {
    10
}

fn default_min_confidence() -> f32 {
    0.5
}

fn default_true() -> bool {
    true
}

fn default_online_endpoint() -> String {
    "https://translation.googleapis.com/language/translate/v2".to_string()
}

fn default_offline_endpoint() -> String {
    "http://localhost:5000".to_string()
}

impl Config {
    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<()> {
        self.validate_with_stored_key(None)
    }

    /// Validate, counting an API key saved outside this file (preferences)
    pub fn validate_with_stored_key(&self, stored_api_key: Option<&str>) -> Result<()> {
        if self.translation.max_concurrent_requests == 0 {
            return Err(anyhow!("max_concurrent_requests must be at least 1"));
        }

        if self.online.timeout_secs == 0
            || self.offline.timeout_secs == 0
            || self.offline.download_timeout_secs == 0
            || self.detection.timeout_secs == 0
        {
            return Err(anyhow!("Timeouts must be greater than zero"));
        }

        if !(0.0..=1.0).contains(&self.detection.min_confidence) {
            return Err(anyhow!(
                "min_confidence must be between 0.0 and 1.0, got {}",
                self.detection.min_confidence
            ));
        }

        let has_api_key = !self.online.api_key.is_empty()
            || stored_api_key.is_some_and(|key| !key.trim().is_empty());
        if self.translation.mode == TranslationMode::OnlineOnly && !has_api_key {
            return Err(anyhow!("An API key is required for online_only mode"));
        }

        url::Url::parse(&self.online.endpoint)
            .with_context(|| format!("Invalid online endpoint: {}", self.online.endpoint))?;
        url::Url::parse(&self.offline.endpoint)
            .with_context(|| format!("Invalid offline endpoint: {}", self.offline.endpoint))?;

        Ok(())
    }

    /// Load configuration from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let config: Config = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;
        Ok(config)
    }

    /// Load configuration, writing a default file first if none exists
    pub fn load_or_create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            return Self::from_file(path);
        }

        let config = Config::default();
        config.save(path)?;
        log::info!("Created default configuration at {:?}", path);
        Ok(config)
    }

    /// Save configuration as pretty JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
            }
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {:?}", path))?;
        Ok(())
    }
}

/// Default implementation for Config
impl Default for Config {
    fn default() -> Self {
        Config {
            translation: TranslationConfig::default(),
            online: OnlineConfig::default(),
            offline: OfflineConfig::default(),
            detection: DetectionConfig::default(),
            storage: StorageConfig::default(),
            log_level: LogLevel::default(),
        }
    }
}
