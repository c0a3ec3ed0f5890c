/*!
 * Integration tests for durable state across restarts.
 *
 * Each test opens a SQLite database in a temporary directory, works with one
 * coordinator, drops it, and reopens the same file with a fresh one.
 */

use std::sync::Arc;
use tempfile::TempDir;

use msgtranslate::providers::mock::{MockEngine, MockIdentifier};
use msgtranslate::storage::{KeyValueStore, SqliteStore};
use msgtranslate::translation::{
    MessageKey, MessageTranslationState, ModelStatus, ProviderUsed, TranslationRequest,
};

use crate::common::HarnessBuilder;

fn open_store(dir: &TempDir) -> Arc<dyn KeyValueStore> {
    Arc::new(SqliteStore::open(dir.path().join("msgtranslate.db")).expect("database should open"))
}

#[tokio::test]
async fn test_restart_shouldKeepModelsCacheAndPreferences() {
    let dir = TempDir::new().unwrap();

    {
        let harness = HarnessBuilder::new().storage(open_store(&dir)).build();
        harness.download(&["es", "en"]).await;
        harness.preferences().set_preferred_language("es").unwrap();

        let result = harness
            .coordinator
            .translate_now(TranslationRequest::new("Hola mundo", "en").with_source("es"))
            .await;
        assert_eq!(result.provider_used, ProviderUsed::Offline);
        // No persist(): models and cache entries are written as they change
    }

    let engine = MockEngine::working().with_installed(&["es", "en"]);
    let harness = HarnessBuilder::new()
        .engine(engine.clone())
        .storage(open_store(&dir))
        .build();

    assert_eq!(harness.coordinator.model_status()["es"].status, ModelStatus::Downloaded);
    assert!(!harness.coordinator.models().is_downloaded_and_verified("en"));

    let mut verified = harness.coordinator.verify_models().await;
    verified.sort();
    assert_eq!(verified, vec!["en".to_string(), "es".to_string()]);
    assert!(harness.coordinator.models().is_downloaded_and_verified("en"));
    assert_eq!(harness.preferences().preferred_language().as_deref(), Some("es"));

    let cached = harness
        .coordinator
        .translate_now(TranslationRequest::new("Hola mundo", "en").with_source("es"))
        .await;
    assert_eq!(cached.provider_used, ProviderUsed::Cache);
    assert_eq!(engine.translate_count(), 0);
    assert_eq!(engine.download_count(), 0);
}

#[tokio::test]
async fn test_restart_afterScopeClear_shouldNotResurrectEntries() {
    let dir = TempDir::new().unwrap();

    {
        let harness = HarnessBuilder::new().storage(open_store(&dir)).build();
        for (text, scope) in [("Hola", "chat:1"), ("Adiós", "chat:2")] {
            let request = TranslationRequest::new(text, "en").with_source("es").in_scope(scope);
            assert!(harness.coordinator.translate_now(request).await.success);
        }
        harness.coordinator.persist().unwrap();
        assert_eq!(harness.coordinator.clear_cache_for_scope("chat:1"), 1);
        assert!(harness.coordinator.invalidate_cached("Adiós", "en"));
    }

    let harness = HarnessBuilder::new().storage(open_store(&dir)).build();
    assert!(harness.coordinator.cache().get_text("Hola", "en").is_none());
    assert!(harness.coordinator.cache().get_text("Adiós", "en").is_none());
    assert!(harness.coordinator.cache().is_empty());
}

#[tokio::test]
async fn test_restart_withModelDeletedOffline_shouldDemoteOnReconcile() {
    let dir = TempDir::new().unwrap();

    {
        let harness = HarnessBuilder::new().storage(open_store(&dir)).build();
        harness.download(&["ja"]).await;
    }

    // New engine has nothing installed: the model vanished while we were away
    let harness = HarnessBuilder::new().storage(open_store(&dir)).build();
    assert!(harness.coordinator.models().is_downloaded("ja"));

    let report = harness.coordinator.reconcile_models().await;
    assert_eq!(report.demoted, vec!["ja".to_string()]);
    assert!(!harness.coordinator.offline_provider().is_available(Some("ja"), "en"));
}

#[tokio::test]
async fn test_restart_shouldRestoreMessageStates() {
    let dir = TempDir::new().unwrap();
    let mut state = MessageTranslationState::new("Hola", "en");
    state.translated_text = Some("Hello".to_string());
    state.source_language = Some("es".to_string());

    {
        let harness = HarnessBuilder::new()
            .online_identifier(MockIdentifier::failing())
            .storage(open_store(&dir))
            .build();
        harness.coordinator.save_message_state(MessageKey::from("thread-3/42"), state.clone());
    }

    let harness = HarnessBuilder::new().storage(open_store(&dir)).build();
    assert_eq!(
        harness.coordinator.restore_message_state(&MessageKey::from("thread-3/42")),
        Some(state)
    );
    assert!(harness.coordinator.restore_message_state(&MessageKey::from("thread-3/43")).is_none());
}
