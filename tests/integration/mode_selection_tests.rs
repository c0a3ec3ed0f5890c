/*!
 * Integration tests for provider selection by translation mode.
 */

use msgtranslate::app_config::TranslationMode;
use msgtranslate::errors::{ErrorKind, ProviderKind, TranslationError};
use msgtranslate::providers::mock::{MockBehavior, MockEngine, MockIdentifier, MockTranslator};
use msgtranslate::translation::{ModelStatus, ProviderUsed, TranslationRequest};

use crate::common::HarnessBuilder;

#[tokio::test]
async fn test_offlineOnly_withNoModels_shouldFailWithoutDetectionOrProviders() {
    let harness = HarnessBuilder::new()
        .online_identifier(MockIdentifier::returning("es", None))
        .build();
    harness.preferences().set_translation_mode(TranslationMode::OfflineOnly);

    let result = harness
        .coordinator
        .translate_now(TranslationRequest::new("Hola", "en").with_source("es"))
        .await;

    assert_eq!(result.error_kind(), Some(ErrorKind::ModelNotDownloaded));
    assert_eq!(harness.online_identifier.request_count(), 0);
    assert_eq!(harness.translator.request_count(), 0);
    assert_eq!(harness.engine.translate_count(), 0);
}

#[tokio::test]
async fn test_offlineOnly_withModels_shouldUseOffline() {
    let harness = HarnessBuilder::new()
        .engine(MockEngine::working().with_phrase("Hola", "en", "Hello"))
        .build();
    harness.download(&["es", "en"]).await;

    let result = harness
        .coordinator
        .translate_now(
            TranslationRequest::new("Hola", "en")
                .with_source("es")
                .with_mode(TranslationMode::OfflineOnly),
        )
        .await;
    assert_eq!(result.translated_text.as_deref(), Some("Hello"));
    assert_eq!(result.provider_used, ProviderUsed::Offline);
    assert_eq!(harness.translator.request_count(), 0);
}

#[tokio::test]
async fn test_offlineOnly_withOfflineDisabled_shouldReportOfflineUnavailable() {
    let harness = HarnessBuilder::new().build();
    harness.download(&["es", "en"]).await;
    harness.preferences().set_offline_enabled(false);

    let result = harness
        .coordinator
        .translate_now(
            TranslationRequest::new("Hola", "en")
                .with_source("es")
                .with_mode(TranslationMode::OfflineOnly),
        )
        .await;
    match result.error {
        Some(TranslationError::ProviderUnavailable { provider, .. }) => assert_eq!(provider, ProviderKind::Offline),
        other => panic!("unexpected outcome {:?}", other),
    }
    assert_eq!(harness.engine.translate_count(), 0);
}

#[tokio::test]
async fn test_offlineOnly_detectionFailureWithoutAutoSource_shouldAbort() {
    let harness = HarnessBuilder::new()
        .online_identifier(MockIdentifier::failing())
        .build();
    harness.download(&["es", "en"]).await;

    let result = harness
        .coordinator
        .translate_now(TranslationRequest::new("Hola", "en").with_mode(TranslationMode::OfflineOnly))
        .await;
    assert_eq!(result.error_kind(), Some(ErrorKind::LanguageDetectionFailed));
    assert_eq!(harness.engine.translate_count(), 0);
}

#[tokio::test]
async fn test_offlineOnly_detectionFailureWithAutoSource_shouldStillTranslate() {
    let harness = HarnessBuilder::new()
        .engine(MockEngine::working().with_auto_source(true))
        .online_identifier(MockIdentifier::failing())
        .build();
    harness.download(&["en"]).await;

    let result = harness
        .coordinator
        .translate_now(TranslationRequest::new("Hola", "en").with_mode(TranslationMode::OfflineOnly))
        .await;
    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.provider_used, ProviderUsed::Offline);
    assert_eq!(result.detected_source_language, None);
}

/// ONLINE_ONLY never falls back, even with every model on the device
#[tokio::test]
async fn test_onlineOnly_unavailable_shouldNeverFallBack() {
    let harness = HarnessBuilder::new()
        .translator(MockTranslator::unconfigured())
        .online_identifier(MockIdentifier::returning("es", None))
        .build();
    harness.download(&["es", "en"]).await;
    harness.preferences().set_translation_mode(TranslationMode::OnlineOnly);

    for request in [
        TranslationRequest::new("Hola", "en").with_source("es"),
        TranslationRequest::new("Hola", "en"),
        TranslationRequest::new("Hola", "es").with_source("es"),
    ] {
        let result = harness.coordinator.translate_now(request).await;
        match result.error {
            Some(TranslationError::ProviderUnavailable { provider, .. }) => {
                assert_eq!(provider, ProviderKind::Online)
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }
    assert_eq!(harness.engine.translate_count(), 0);
}

#[tokio::test]
async fn test_onlineOnly_detectionFailure_shouldLetBackendDetect() {
    let harness = HarnessBuilder::new()
        .online_identifier(MockIdentifier::failing())
        .build();

    let result = harness
        .coordinator
        .translate_now(TranslationRequest::new("Hola", "en").with_mode(TranslationMode::OnlineOnly))
        .await;
    assert!(result.success);
    assert_eq!(result.provider_used, ProviderUsed::Online);
    assert_eq!(harness.translator.requests()[0].source_language, None);
}

#[tokio::test]
async fn test_auto_preferOffline_shouldUseOfflineFirst() {
    let harness = HarnessBuilder::new().build();
    harness.download(&["fr", "en"]).await;

    let result = harness
        .coordinator
        .translate_now(TranslationRequest::new("Bonjour", "en").with_source("fr"))
        .await;
    assert_eq!(result.provider_used, ProviderUsed::Offline);
    assert_eq!(harness.translator.request_count(), 0);
}

#[tokio::test]
async fn test_auto_preferOnline_shouldUseOnlineFirst() {
    let harness = HarnessBuilder::new().build();
    harness.download(&["fr", "en"]).await;
    harness.preferences().set_prefer_offline(false);

    let result = harness
        .coordinator
        .translate_now(TranslationRequest::new("Bonjour", "en").with_source("fr"))
        .await;
    assert_eq!(result.provider_used, ProviderUsed::Online);
    assert_eq!(harness.engine.translate_count(), 0);
}

#[tokio::test]
async fn test_auto_offlineFailure_shouldFallThroughToOnline() {
    let harness = HarnessBuilder::new()
        .engine(MockEngine::new(MockBehavior::Failing))
        .build();
    harness.download(&["de", "en"]).await;

    let result = harness
        .coordinator
        .translate_now(TranslationRequest::new("Guten Tag", "en").with_source("de"))
        .await;
    assert!(result.success);
    assert_eq!(result.provider_used, ProviderUsed::Online);
    assert_eq!(harness.engine.translate_count(), 1);
    assert_eq!(harness.translator.request_count(), 1);
}

#[tokio::test]
async fn test_auto_bothFail_shouldNameBothReasons() {
    let harness = HarnessBuilder::new()
        .engine(MockEngine::new(MockBehavior::Failing))
        .translator(MockTranslator::failing())
        .build();
    harness.download(&["de", "en"]).await;

    let result = harness
        .coordinator
        .translate_now(TranslationRequest::new("Guten Tag", "en").with_source("de"))
        .await;
    assert_eq!(result.error_kind(), Some(ErrorKind::ProviderFailure));
    let message = result.error.unwrap().to_string();
    assert!(message.contains("offline"), "{}", message);
    assert!(message.contains("online"), "{}", message);
}

#[tokio::test]
async fn test_auto_noProviderUsable_shouldReportBoth() {
    let harness = HarnessBuilder::new()
        .translator(MockTranslator::unconfigured())
        .build();

    let result = harness
        .coordinator
        .translate_now(TranslationRequest::new("Merhaba", "en").with_source("tr"))
        .await;
    match result.error {
        Some(TranslationError::ProviderUnavailable { provider, .. }) => assert_eq!(provider, ProviderKind::Both),
        other => panic!("unexpected outcome {:?}", other),
    }
}

/// A model dying under the provider is demoted and the request falls to online
#[tokio::test]
async fn test_auto_deadModel_shouldDemoteAndFallBack() {
    let engine = MockEngine::working();
    let harness = HarnessBuilder::new().engine(engine.clone()).build();
    harness.download(&["pl", "en"]).await;
    engine.break_model("pl");

    let result = harness
        .coordinator
        .translate_now(TranslationRequest::new("Dzień dobry", "en").with_source("pl"))
        .await;
    assert_eq!(result.provider_used, ProviderUsed::Online);
    assert_eq!(harness.coordinator.model_status()["pl"].status, ModelStatus::Error);
    assert!(!harness.coordinator.offline_provider().is_available(Some("pl"), "en"));
}
