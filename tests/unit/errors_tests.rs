/*!
 * Tests for error classification
 */

use msgtranslate::errors::{ErrorKind, ProviderError, ProviderKind, TranslationError};

#[test]
fn test_providerErrorConversion_shouldKeepTimeoutsAndLanguages() {
    let timeout: TranslationError = ProviderError::Timeout(1500).into();
    assert_eq!(timeout.kind(), ErrorKind::Timeout);
    assert!(timeout.to_string().contains("1500"));

    let unsupported: TranslationError = ProviderError::UnsupportedLanguage("tlh".to_string()).into();
    assert_eq!(unsupported, TranslationError::UnsupportedLanguage("tlh".to_string()));

    let api: TranslationError = ProviderError::ApiError {
        status_code: 500,
        message: "boom".to_string(),
    }
    .into();
    assert_eq!(api.kind(), ErrorKind::ProviderFailure);
}

#[test]
fn test_unavailableShorthands_shouldNameTheProvider() {
    match TranslationError::online_unavailable("no key") {
        TranslationError::ProviderUnavailable { provider, reason } => {
            assert_eq!(provider, ProviderKind::Online);
            assert_eq!(reason, "no key");
        }
        other => panic!("unexpected error {:?}", other),
    }
    assert_eq!(
        TranslationError::offline_unavailable("disabled").kind(),
        ErrorKind::ProviderUnavailable
    );
}

#[test]
fn test_modelNotDownloaded_shouldDisplayLanguage() {
    let err = TranslationError::ModelNotDownloaded {
        language: "ja".to_string(),
    };
    assert_eq!(err.kind(), ErrorKind::ModelNotDownloaded);
    assert!(err.to_string().contains("ja"));
}
