/*!
 * Tests for configuration loading and validation
 */

use msgtranslate::app_config::{Config, LogLevel, TranslationMode};
use tempfile::TempDir;

#[test]
fn test_defaultConfig_shouldValidate() {
    let config = Config::default();
    assert!(config.validate().is_ok());
    assert_eq!(config.translation.mode, TranslationMode::Auto);
    assert_eq!(config.log_level, LogLevel::Info);
}

#[test]
fn test_validate_withZeroWorkers_shouldFail() {
    let mut config = Config::default();
    config.translation.max_concurrent_requests = 0;
    assert!(config.validate().is_err());
}

#[test]
fn test_validate_withOnlineOnlyAndNoKey_shouldFail() {
    let mut config = Config::default();
    config.translation.mode = TranslationMode::OnlineOnly;
    assert!(config.validate().is_err());

    config.online.api_key = "secret".to_string();
    assert!(config.validate().is_ok());
}

#[test]
fn test_validate_withOnlineOnlyAndStoredKey_shouldPass() {
    let mut config = Config::default();
    config.translation.mode = TranslationMode::OnlineOnly;
    assert!(config.validate_with_stored_key(Some("")).is_err());
    assert!(config.validate_with_stored_key(Some("   ")).is_err());
    assert!(config.validate_with_stored_key(Some("from-preferences")).is_ok());
}

#[test]
fn test_validate_withBadConfidenceOrEndpoint_shouldFail() {
    let mut config = Config::default();
    config.detection.min_confidence = 1.5;
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.offline.endpoint = "not a url".to_string();
    assert!(config.validate().is_err());
}

#[test]
fn test_loadOrCreate_withMissingFile_shouldWriteDefaults() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("conf.json");

    let created = Config::load_or_create(&path).unwrap();
    assert!(path.exists());

    let loaded = Config::from_file(&path).unwrap();
    assert_eq!(loaded.translation.mode, created.translation.mode);
    assert_eq!(loaded.offline.endpoint, created.offline.endpoint);
}

#[test]
fn test_saveThenLoad_shouldKeepChanges() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("conf.json");

    let mut config = Config::default();
    config.translation.mode = TranslationMode::OfflineOnly;
    config.online.max_requests_per_day = Some(100);
    config.save(&path).unwrap();

    let loaded = Config::from_file(&path).unwrap();
    assert_eq!(loaded.translation.mode, TranslationMode::OfflineOnly);
    assert_eq!(loaded.online.max_requests_per_day, Some(100));
}
