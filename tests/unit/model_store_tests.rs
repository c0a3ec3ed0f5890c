/*!
 * Tests for the model availability store
 */

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

use msgtranslate::errors::{ErrorKind, StorageError};
use msgtranslate::language_utils::OFFLINE_CATALOG;
use msgtranslate::providers::ProgressFn;
use msgtranslate::providers::mock::{DownloadBehavior, MockEngine};
use msgtranslate::storage::{KeyValueStore, MemoryStore};
use msgtranslate::translation::model_store::{ModelAvailabilityStore, ModelEvent, ModelStatus};
use msgtranslate::translation::offline::OfflineProvider;

fn recording_progress() -> (ProgressFn, Arc<Mutex<Vec<u8>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    (Arc::new(move |p| sink.lock().push(p)), seen)
}

#[tokio::test]
async fn test_download_shouldReportMonotonicProgressEndingAt100() {
    let store = ModelAvailabilityStore::new(Arc::new(MockEngine::working()));
    let (progress, seen) = recording_progress();

    let record = store.request_download("es", Some(progress)).await.unwrap();
    assert_eq!(record.status, ModelStatus::Downloaded);
    assert!(record.verified);

    let seen = seen.lock().clone();
    assert!(!seen.is_empty());
    assert!(seen.windows(2).all(|w| w[0] <= w[1]), "progress went backwards: {:?}", seen);
    assert_eq!(seen.last(), Some(&100));
}

#[tokio::test]
async fn test_download_twice_shouldFailWithoutProgress() {
    let engine = MockEngine::working();
    let store = ModelAvailabilityStore::new(Arc::new(engine.clone()));
    store.request_download("fr", None).await.unwrap();

    let (progress, seen) = recording_progress();
    let err = store.request_download("fr-CA", Some(progress)).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ModelAlreadyDownloaded);
    assert!(seen.lock().is_empty());
    assert_eq!(engine.download_count(), 1);
}

#[tokio::test]
async fn test_download_unsupportedLanguage_shouldFailWithoutProgress() {
    let store = ModelAvailabilityStore::new(Arc::new(MockEngine::working()));
    let (progress, seen) = recording_progress();

    let err = store.request_download("sw", Some(progress)).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnsupportedLanguage);
    assert!(seen.lock().is_empty());
    assert_eq!(store.record("sw").status, ModelStatus::NotDownloaded);
}

#[tokio::test]
async fn test_concurrentDownloads_shouldRejectSecond() {
    let engine = MockEngine::working().with_download_behavior(DownloadBehavior::Slow { delay_ms: 100 });
    let store = ModelAvailabilityStore::new(Arc::new(engine));

    let first = {
        let store = store.clone();
        tokio::spawn(async move { store.request_download("de", None).await })
    };
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;

    let err = store.request_download("de", None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DownloadInProgress);
    assert!(first.await.unwrap().is_ok());
    assert!(store.is_downloaded_and_verified("de"));
}

#[tokio::test]
async fn test_failedDownload_shouldEndInErrorAndAllowRetry() {
    let engine = MockEngine::working().with_download_behavior(DownloadBehavior::Fail);
    let store = ModelAvailabilityStore::new(Arc::new(engine));

    assert!(store.request_download("it", None).await.is_err());
    let record = store.record("it");
    assert_eq!(record.status, ModelStatus::Error);
    assert!(record.last_error.is_some());
    assert!(!store.is_downloaded("it"));

    // ERROR is not terminal: a new request is accepted and fails the same way
    let err = store.request_download("it", None).await.unwrap_err();
    assert_ne!(err.kind(), ErrorKind::DownloadInProgress);
}

#[tokio::test]
async fn test_events_shouldFollowDownloadTransitions() {
    let store = ModelAvailabilityStore::new(Arc::new(MockEngine::working()));
    let mut events = store.subscribe();

    store.request_download("ko", None).await.unwrap();

    let mut statuses = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let ModelEvent::StatusChanged { status, .. } = event {
            statuses.push(status);
        }
    }
    assert_eq!(statuses, vec![ModelStatus::Downloading, ModelStatus::Downloaded]);
}

#[tokio::test]
async fn test_statusSnapshot_shouldCoverWholeCatalog() {
    let store = ModelAvailabilityStore::new(Arc::new(MockEngine::working()));
    store.request_download("ja", None).await.unwrap();

    let snapshot = store.status_snapshot();
    assert_eq!(snapshot.len(), OFFLINE_CATALOG.len());
    assert_eq!(snapshot["ja"].status, ModelStatus::Downloaded);
    assert_eq!(snapshot["en"].status, ModelStatus::NotDownloaded);
}

#[tokio::test]
async fn test_reconcile_shouldAdoptAndDemote() {
    let engine = MockEngine::working().with_installed(&["pt"]);
    let store = ModelAvailabilityStore::new(Arc::new(engine.clone()));
    store.request_download("ru", None).await.unwrap();
    engine.uninstall("ru");

    let report = store.reconcile().await;
    assert!(report.adopted.contains(&"pt".to_string()));
    assert!(report.demoted.contains(&"ru".to_string()));
    assert!(store.is_downloaded_and_verified("pt"));
    assert!(!store.is_downloaded("ru"));
}

#[tokio::test]
async fn test_removeModel_shouldReturnToNotDownloaded() {
    let engine = MockEngine::working();
    let store = ModelAvailabilityStore::new(Arc::new(engine.clone()));
    store.request_download("nl", None).await.unwrap();

    let record = store.remove_model("nl").await.unwrap();
    assert_eq!(record.status, ModelStatus::NotDownloaded);
    assert!(!engine.is_installed("nl"));
}

#[tokio::test]
async fn test_persistRestore_shouldMarkInterruptedDownloadsAsError() {
    let storage: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    let store = ModelAvailabilityStore::with_storage(
        Arc::new(MockEngine::working()),
        storage.clone(),
        Duration::from_secs(5),
    );
    store.request_download("sv", None).await.unwrap();
    storage
        .put("model/fi", r#"{"language_code":"fi","status":"DOWNLOADING","verified":false,"last_error":null,"progress_percent":40}"#)
        .unwrap();

    let fresh = ModelAvailabilityStore::new(Arc::new(MockEngine::working().with_installed(&["sv"])));
    fresh.restore(storage.as_ref()).unwrap();
    assert!(fresh.is_downloaded("sv"));
    assert!(!fresh.is_downloaded_and_verified("sv"));
    assert_eq!(fresh.record("fi").status, ModelStatus::Error);

    assert_eq!(fresh.verify_restored().await, vec!["sv".to_string()]);
    assert!(fresh.is_downloaded_and_verified("sv"));
}

#[tokio::test]
async fn test_verifyRestored_withModelGoneFromDevice_shouldDemote() {
    let storage: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    let store = ModelAvailabilityStore::with_storage(
        Arc::new(MockEngine::working()),
        storage.clone(),
        Duration::from_secs(5),
    );
    store.request_download("pl", None).await.unwrap();

    let fresh = ModelAvailabilityStore::new(Arc::new(MockEngine::working()));
    fresh.restore(storage.as_ref()).unwrap();
    assert!(fresh.verify_restored().await.is_empty());
    assert_eq!(fresh.record("pl").status, ModelStatus::Error);
}

/// Store whose writes of finished downloads are slow
#[derive(Default)]
struct SlowDownloadedWrites {
    inner: MemoryStore,
}

impl KeyValueStore for SlowDownloadedWrites {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.inner.get(key)
    }

    fn put(&self, key: &str, value: &str) -> Result<(), StorageError> {
        if value.contains("\"DOWNLOADED\"") {
            std::thread::sleep(Duration::from_millis(300));
        }
        self.inner.put(key, value)
    }

    fn remove(&self, key: &str) -> Result<bool, StorageError> {
        self.inner.remove(key)
    }

    fn entries_with_prefix(&self, prefix: &str) -> Result<Vec<(String, String)>, StorageError> {
        self.inner.entries_with_prefix(prefix)
    }

    fn remove_prefix(&self, prefix: &str) -> Result<usize, StorageError> {
        self.inner.remove_prefix(prefix)
    }
}

/// A demotion racing a slow write of the finished download must win in storage too
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_demotionDuringSlowWrite_shouldReachStorageLast() {
    let storage: Arc<dyn KeyValueStore> = Arc::new(SlowDownloadedWrites::default());
    let store = ModelAvailabilityStore::with_storage(
        Arc::new(MockEngine::working()),
        storage.clone(),
        Duration::from_secs(5),
    );

    let downloader = store.clone();
    let download = tokio::spawn(async move { downloader.request_download("es", None).await });

    let watcher = store.clone();
    let demoted = tokio::task::spawn_blocking(move || {
        for _ in 0..5000 {
            if watcher.record("es").status == ModelStatus::Downloaded {
                return watcher.report_probe_failure("es", "corrupt");
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        false
    });

    assert!(download.await.unwrap().is_ok());
    assert!(demoted.await.unwrap());
    assert_eq!(store.record("es").status, ModelStatus::Error);

    let durable = storage.get("model/es").unwrap().unwrap();
    assert!(durable.contains("\"ERROR\""), "{}", durable);

    let restarted = ModelAvailabilityStore::new(Arc::new(MockEngine::working()));
    restarted.restore(storage.as_ref()).unwrap();
    assert_eq!(restarted.record("es").status, ModelStatus::Error);
    assert!(!restarted.is_downloaded_and_verified("es"));
}

/// Offline availability agrees with the store for every catalog language
#[tokio::test]
async fn test_offlineAvailability_shouldMatchStoreForEveryCode() {
    let engine = MockEngine::working();
    let store = ModelAvailabilityStore::new(Arc::new(engine.clone()));
    for code in ["en", "es", "zh", "ar"] {
        store.request_download(code, None).await.unwrap();
    }
    store.report_probe_failure("ar", "corrupt");
    let provider = OfflineProvider::new(store.clone());

    for source in OFFLINE_CATALOG {
        let expected = store.is_downloaded_and_verified(source.code) && store.is_downloaded_and_verified("en");
        assert_eq!(
            provider.is_available(Some(source.code), "en"),
            expected,
            "mismatch for {}",
            source.code
        );
    }
}

#[test]
fn test_reverify_onBlockingRuntime_shouldConfirmInstalledModel() {
    let engine = MockEngine::working();
    let store = ModelAvailabilityStore::new(Arc::new(engine.clone()));

    let verified = tokio_test::block_on(async {
        store.request_download("cs", None).await.unwrap();
        store.reverify("cs").await.unwrap()
    });
    assert!(verified);

    engine.break_model("cs");
    let verified = tokio_test::block_on(store.reverify("cs")).unwrap();
    assert!(!verified);
    assert_eq!(store.record("cs").status, ModelStatus::Error);
}
