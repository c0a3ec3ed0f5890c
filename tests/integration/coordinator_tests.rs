/*!
 * Integration tests for the request pipeline.
 *
 * Every test drives a `Coordinator` built from mocks and inspects the mocks
 * afterwards to see which backends were called.
 */

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use msgtranslate::errors::ErrorKind;
use msgtranslate::providers::mock::{MockBehavior, MockEngine, MockIdentifier, MockTranslator};
use msgtranslate::translation::{
    MessageDirection, MessageKey, MessageTranslationState, ProviderUsed, TranslationRequest,
};

use crate::common::{HarnessBuilder, default_harness};

/// Unknown source, online available: detect, translate, then serve from cache
#[tokio::test]
async fn test_holaMundo_shouldDetectTranslateThenHitCache() {
    let harness = HarnessBuilder::new()
        .translator(MockTranslator::working().with_phrase("Hola mundo", "en", "Hello world"))
        .online_identifier(MockIdentifier::returning("es", Some(0.98)))
        .build();

    let first = harness
        .coordinator
        .translate(TranslationRequest::new("Hola mundo", "en"))
        .result()
        .await;
    assert!(first.success, "{:?}", first.error);
    assert_eq!(first.translated_text.as_deref(), Some("Hello world"));
    assert_eq!(first.detected_source_language.as_deref(), Some("es"));
    assert_eq!(first.provider_used, ProviderUsed::Online);

    let second = harness
        .coordinator
        .translate_now(TranslationRequest::new("  Hola   mundo ", "en-GB"))
        .await;
    assert_eq!(second.translated_text.as_deref(), Some("Hello world"));
    assert_eq!(second.provider_used, ProviderUsed::Cache);

    assert_eq!(harness.translator.request_count(), 1);
    assert_eq!(harness.online_identifier.request_count(), 1);
}

/// Offline models present and online unavailable: offline serves, cache answers repeats
#[tokio::test]
async fn test_holaMundo_offlineOnlyAvailable_shouldUseOfflineThenCache() {
    let harness = HarnessBuilder::new()
        .engine(MockEngine::working().with_phrase("Hola mundo", "en", "Hello world"))
        .translator(MockTranslator::unconfigured())
        .build();
    harness.download(&["es", "en"]).await;

    let request = TranslationRequest::new("Hola mundo", "en").with_source("es");
    let first = harness.coordinator.translate_now(request.clone()).await;
    assert_eq!(first.translated_text.as_deref(), Some("Hello world"));
    assert_eq!(first.provider_used, ProviderUsed::Offline);
    assert!(harness.coordinator.cache().get_text("Hola mundo", "en").is_some());

    let second = harness.coordinator.translate_now(request).await;
    assert_eq!(second.translated_text, first.translated_text);
    assert_eq!(second.provider_used, ProviderUsed::Cache);
    assert_eq!(harness.engine.translate_count(), 1);
    assert_eq!(harness.translator.request_count(), 0);
}

/// The same key resolved twice yields one stable cached value
#[tokio::test]
async fn test_repeatedRequests_shouldStayIdempotent() {
    let harness = default_harness();
    let request = TranslationRequest::new("Guten Morgen", "en").with_source("de");

    let results = harness
        .coordinator
        .translate_many(vec![request.clone(), request.clone(), request])
        .await;
    let texts: Vec<_> = results.iter().map(|r| r.translated_text.clone()).collect();
    assert!(texts.iter().all(|t| t == &texts[0]));
    assert_eq!(harness.coordinator.cache().len(), 1);
}

#[tokio::test]
async fn test_sameLanguage_withoutForce_shouldSkipProviders() {
    let harness = default_harness();

    let result = harness
        .coordinator
        .translate_now(TranslationRequest::new("Good morning", "en-US").with_source("eng"))
        .await;
    assert!(result.success);
    assert_eq!(result.translated_text.as_deref(), Some("Good morning"));
    assert_eq!(result.provider_used, ProviderUsed::None);
    assert_eq!(harness.translator.request_count(), 0);
}

#[tokio::test]
async fn test_sameLanguage_withForce_shouldTranslate() {
    let harness = default_harness();

    let result = harness
        .coordinator
        .translate_now(TranslationRequest::new("Good morning", "en").with_source("en").force(true))
        .await;
    assert!(result.success);
    assert_eq!(result.provider_used, ProviderUsed::Online);
    assert_eq!(harness.translator.request_count(), 1);
}

#[tokio::test]
async fn test_detectedSameLanguage_shouldSkipProviders() {
    let harness = HarnessBuilder::new()
        .online_identifier(MockIdentifier::returning("fr", None))
        .build();

    let result = harness
        .coordinator
        .translate_now(TranslationRequest::new("Bonjour tout le monde", "fr-CA"))
        .await;
    assert!(result.success);
    assert_eq!(result.provider_used, ProviderUsed::None);
    assert_eq!(result.detected_source_language.as_deref(), Some("fr"));
    assert_eq!(harness.translator.request_count(), 0);
}

#[tokio::test]
async fn test_emptyText_shouldFailBeforeAnyBackend() {
    let harness = default_harness();
    let result = harness.coordinator.translate_now(TranslationRequest::new("", "en")).await;
    assert_eq!(result.error_kind(), Some(ErrorKind::EmptyInput));
    assert_eq!(harness.online_identifier.request_count(), 0);
    assert_eq!(harness.translator.request_count(), 0);
}

#[tokio::test]
async fn test_invalidTarget_shouldFailWithUnsupportedLanguage() {
    let harness = default_harness();
    let result = harness
        .coordinator
        .translate_now(TranslationRequest::new("hi", "zz-top"))
        .await;
    assert_eq!(result.error_kind(), Some(ErrorKind::UnsupportedLanguage));
}

#[tokio::test]
async fn test_panickingEngine_shouldBecomeInternalFailure() {
    let harness = HarnessBuilder::new()
        .engine(MockEngine::new(MockBehavior::Panicking))
        .translator(MockTranslator::unconfigured())
        .build();
    harness.download(&["es", "en"]).await;

    let result = harness
        .coordinator
        .translate(TranslationRequest::new("Hola", "en").with_source("es"))
        .result()
        .await;
    assert!(!result.success);
    assert_eq!(result.error_kind(), Some(ErrorKind::Internal));

    // The pool is still usable after a panic
    let after = harness
        .coordinator
        .translate_now(TranslationRequest::new("Hola", "es").with_source("es"))
        .await;
    assert!(after.success);
}

#[tokio::test]
async fn test_abandonedTranslation_shouldStillPopulateCache() {
    let harness = HarnessBuilder::new().translator(MockTranslator::slow(50)).build();

    let pending = harness
        .coordinator
        .translate(TranslationRequest::new("Buongiorno", "en").with_source("it"));
    pending.abandon();
    let result = pending.result().await;

    assert_eq!(result.error_kind(), Some(ErrorKind::Internal));
    assert!(harness.coordinator.cache().get_text("Buongiorno", "en").is_some());
}

#[tokio::test]
async fn test_callback_shouldBeInvokedExactlyOnce() {
    let harness = default_harness();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();

    let handle = harness.coordinator.translate_with_callback(
        TranslationRequest::new("Olá", "en").with_source("pt"),
        move |result| {
            assert!(result.success);
            counter.fetch_add(1, Ordering::SeqCst);
        },
    );
    handle.join().await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_translateMany_shouldPreserveInputOrder() {
    let harness = HarnessBuilder::new().translator(MockTranslator::slow(10)).build();
    let texts: Vec<String> = (0..12).map(|i| format!("mensaje número {}", i)).collect();
    let requests = texts
        .iter()
        .map(|t| TranslationRequest::new(t.as_str(), "en").with_source("es"))
        .collect();

    let results = harness.coordinator.translate_many(requests).await;
    assert_eq!(results.len(), texts.len());
    for (text, result) in texts.iter().zip(&results) {
        let translated = result.translated_text.as_deref().unwrap_or_default();
        assert!(translated.ends_with(text.as_str()), "{} -> {}", text, translated);
    }
}

#[tokio::test]
async fn test_clearCacheForScope_shouldDropOnlyThatConversation() {
    let harness = default_harness();
    let coordinator = &harness.coordinator;

    for (text, scope) in [("uno", "chat:1"), ("dos", "chat:1"), ("tres", "chat:2")] {
        let request = TranslationRequest::new(text, "en").with_source("es").in_scope(scope);
        assert!(coordinator.translate_now(request).await.success);
    }

    assert_eq!(coordinator.clear_cache_for_scope("chat:1"), 2);
    assert_eq!(coordinator.cache_stats().entries, 1);

    let again = coordinator
        .translate_now(TranslationRequest::new("uno", "en").with_source("es"))
        .await;
    assert_eq!(again.provider_used, ProviderUsed::Online);
}

#[tokio::test]
async fn test_invalidateCached_shouldForceRetranslation() {
    let harness = default_harness();
    let request = TranslationRequest::new("Hej", "en").with_source("sv");
    harness.coordinator.translate_now(request.clone()).await;

    assert!(harness.coordinator.invalidate_cached("Hej", "en"));
    let result = harness.coordinator.translate_now(request).await;
    assert_eq!(result.provider_used, ProviderUsed::Online);
    assert_eq!(harness.translator.request_count(), 2);
}

#[tokio::test]
async fn test_translateMessage_shouldUseDirectionalPreference() {
    let harness = HarnessBuilder::new()
        .online_identifier(MockIdentifier::returning("es", None))
        .build();
    harness.preferences().set_preferred_incoming_language("fr").unwrap();
    harness.preferences().set_preferred_outgoing_language("de").unwrap();

    let incoming = harness
        .coordinator
        .translate_message("Hola", MessageDirection::Incoming, None)
        .await;
    assert!(incoming.translated_text.unwrap().contains("to fr"));

    let outgoing = harness
        .coordinator
        .translate_message("Hola", MessageDirection::Outgoing, Some("chat:5"))
        .await;
    assert!(outgoing.translated_text.unwrap().contains("to de"));
}

#[tokio::test]
async fn test_translateMessage_withoutAnyPreference_shouldFail() {
    let harness = HarnessBuilder::new().device_language(None).build();
    let result = harness
        .coordinator
        .translate_message("Hola", MessageDirection::Incoming, None)
        .await;
    assert!(!result.success);
    assert_eq!(harness.translator.request_count(), 0);
}

#[tokio::test]
async fn test_detectLanguage_shouldFallBackToOfflineIdentifier() {
    let harness = HarnessBuilder::new()
        .online_identifier(MockIdentifier::failing())
        .offline_identifier(MockIdentifier::returning("ko", Some(0.9)))
        .build();

    let detected = harness.coordinator.detect_language("안녕하세요").await.unwrap();
    assert_eq!(detected.language_code, "ko");
    assert_eq!(harness.coordinator.language_name("ko").as_deref(), Some("Korean"));
}

#[tokio::test]
async fn test_messageState_shouldRoundTripThroughCoordinator() {
    let harness = default_harness();
    let key = MessageKey::from(1001u64);
    assert!(harness.coordinator.restore_message_state(&key).is_none());

    let mut state = MessageTranslationState::new("Hola", "en");
    state.translated_text = Some("Hello".to_string());
    state.visible = true;
    harness.coordinator.save_message_state(key.clone(), state.clone());

    assert_eq!(harness.coordinator.restore_message_state(&key), Some(state));
}
