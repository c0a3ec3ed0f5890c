/*!
 * Offline model availability store.
 *
 * The single writer of model download state. Every language code has one
 * `ModelRecord` moving through
 *
 * ```text
 * NOT_DOWNLOADED -> DOWNLOADING -> DOWNLOADED
 *                             \-> ERROR -> DOWNLOADING (retry)
 * ```
 *
 * `DOWNLOADED -> DOWNLOADING` is refused; a model has to be removed first.
 * All transitions happen under one lock as compare-and-set steps, so a
 * download finishing and a probe failure can never interleave on the same
 * record. Progress callbacks and engine calls run outside the lock.
 *
 * Readers that keep their own view (the offline provider) compare
 * `generation()` before trusting it; the counter moves on every mutation.
 */

use futures::FutureExt;
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::broadcast;

use crate::errors::{StorageError, TranslationError};
use crate::language_utils::{self, OFFLINE_CATALOG};
use crate::providers::{OnDeviceEngine, ProgressFn};
use crate::storage::{KeyValueStore, MODEL_PREFIX};

/// Default bound on a single model download
pub const DEFAULT_DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(60);

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Download status of one language model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ModelStatus {
    #[default]
    NotDownloaded,
    Downloading,
    Downloaded,
    Error,
}

impl fmt::Display for ModelStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ModelStatus::NotDownloaded => "not downloaded",
            ModelStatus::Downloading => "downloading",
            ModelStatus::Downloaded => "downloaded",
            ModelStatus::Error => "error",
        };
        write!(f, "{}", name)
    }
}

/// Durable state for one language code
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelRecord {
    pub language_code: String,
    pub status: ModelStatus,
    /// DOWNLOADED and confirmed by a live probe
    pub verified: bool,
    pub last_error: Option<String>,
    /// Meaningful only while DOWNLOADING
    pub progress_percent: u8,
}

impl ModelRecord {
    pub fn new(language_code: impl Into<String>) -> Self {
        Self {
            language_code: language_code.into(),
            status: ModelStatus::NotDownloaded,
            verified: false,
            last_error: None,
            progress_percent: 0,
        }
    }

    pub fn is_usable(&self) -> bool {
        self.status == ModelStatus::Downloaded && self.verified
    }
}

/// Notification sent to subscribers after a mutation
#[derive(Debug, Clone, PartialEq)]
pub enum ModelEvent {
    StatusChanged {
        language_code: String,
        status: ModelStatus,
        verified: bool,
        generation: u64,
    },
    Progress {
        language_code: String,
        percent: u8,
    },
}

/// Outcome of `reconcile`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconcileReport {
    /// Present on the device but not tracked as downloaded
    pub adopted: Vec<String>,
    /// Tracked as downloaded but missing on the device
    pub demoted: Vec<String>,
    /// Tracked and confirmed
    pub verified: Vec<String>,
    /// Probe itself failed
    pub probe_failures: Vec<String>,
}

#[derive(Clone, Copy)]
enum ReconcileOutcome {
    Adopted,
    Demoted,
    Verified,
}

struct StoreInner {
    engine: Arc<dyn OnDeviceEngine>,
    records: Mutex<HashMap<String, ModelRecord>>,
    generation: AtomicU64,
    events: broadcast::Sender<ModelEvent>,
    storage: Option<Arc<dyn KeyValueStore>>,
    download_timeout: Duration,
}

/// Shared handle; clones refer to the same store
#[derive(Clone)]
pub struct ModelAvailabilityStore {
    inner: Arc<StoreInner>,
}

impl fmt::Debug for ModelAvailabilityStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelAvailabilityStore")
            .field("generation", &self.generation())
            .field("records", &self.inner.records.lock().len())
            .finish()
    }
}

impl ModelAvailabilityStore {
    pub fn new(engine: Arc<dyn OnDeviceEngine>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(StoreInner {
                engine,
                records: Mutex::new(HashMap::new()),
                generation: AtomicU64::new(0),
                events,
                storage: None,
                download_timeout: DEFAULT_DOWNLOAD_TIMEOUT,
            }),
        }
    }

    /// Store that writes every changed record through to `storage`
    pub fn with_storage(
        engine: Arc<dyn OnDeviceEngine>,
        storage: Arc<dyn KeyValueStore>,
        download_timeout: Duration,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(StoreInner {
                engine,
                records: Mutex::new(HashMap::new()),
                generation: AtomicU64::new(0),
                events,
                storage: Some(storage),
                download_timeout,
            }),
        }
    }

    pub fn engine(&self) -> Arc<dyn OnDeviceEngine> {
        self.inner.engine.clone()
    }

    pub fn generation(&self) -> u64 {
        self.inner.generation.load(Ordering::SeqCst)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ModelEvent> {
        self.inner.events.subscribe()
    }

    /// Normalize and check catalog membership
    fn catalog_code(code: &str) -> Result<String, TranslationError> {
        let normalized = language_utils::normalize_language_code(code)
            .map_err(|_| TranslationError::UnsupportedLanguage(code.to_string()))?;
        if language_utils::catalog_entry(&normalized).is_none() {
            return Err(TranslationError::UnsupportedLanguage(normalized));
        }
        Ok(normalized)
    }

    /// Apply `change` to the record for `code` under the lock
    ///
    /// `change` returns whether it modified the record. The write-through
    /// happens before the lock is released so storage sees transitions on a
    /// code in the order memory applied them; events go out afterwards.
    fn transition<F>(&self, code: &str, change: F) -> Option<ModelRecord>
    where
        F: FnOnce(&mut ModelRecord) -> bool,
    {
        let (record, generation) = {
            let mut records = self.inner.records.lock();
            let record = records
                .entry(code.to_string())
                .or_insert_with(|| ModelRecord::new(code));
            if !change(record) {
                return None;
            }
            if record.status != ModelStatus::Downloaded {
                record.verified = false;
            }
            let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
            let record = record.clone();
            self.write_through(&record);
            (record, generation)
        };

        // No subscribers is fine
        let _ = self.inner.events.send(ModelEvent::StatusChanged {
            language_code: record.language_code.clone(),
            status: record.status,
            verified: record.verified,
            generation,
        });
        Some(record)
    }

    fn write_through(&self, record: &ModelRecord) {
        let Some(storage) = &self.inner.storage else {
            return;
        };
        let key = format!("{}{}", MODEL_PREFIX, record.language_code);
        let result = serde_json::to_string(record)
            .map_err(StorageError::from)
            .and_then(|json| storage.put(&key, &json));
        if let Err(e) = result {
            warn!("Failed to persist model record {}: {}", record.language_code, e);
        }
    }

    fn progress_sink(&self, code: &str, user: Option<ProgressFn>) -> ProgressFn {
        let store = self.clone();
        let code = code.to_string();
        Arc::new(move |percent: u8| {
            let percent = percent.min(100);
            {
                let mut records = store.inner.records.lock();
                match records.get_mut(&code) {
                    Some(record) if record.status == ModelStatus::Downloading => {
                        record.progress_percent = percent;
                        store.inner.generation.fetch_add(1, Ordering::SeqCst);
                    }
                    // Late progress after the download finished
                    _ => return,
                }
            }
            let _ = store.inner.events.send(ModelEvent::Progress {
                language_code: code.clone(),
                percent,
            });
            if let Some(user) = &user {
                user(percent);
            }
        })
    }

    /// Download the model for `code`
    ///
    /// Fails immediately, without touching the progress callback, when the
    /// model is already downloaded, already downloading, or not in the
    /// catalog. Otherwise the record moves to DOWNLOADING, progress is
    /// reported, then the record ends in DOWNLOADED (verified by a live
    /// probe) or ERROR.
    pub async fn request_download(
        &self,
        code: &str,
        progress: Option<ProgressFn>,
    ) -> Result<ModelRecord, TranslationError> {
        let code = Self::catalog_code(code)?;

        let mut refusal = None;
        let claimed = self.transition(&code, |record| match record.status {
            ModelStatus::Downloaded => {
                refusal = Some(TranslationError::ModelAlreadyDownloaded(record.language_code.clone()));
                false
            }
            ModelStatus::Downloading => {
                refusal = Some(TranslationError::DownloadInProgress(record.language_code.clone()));
                false
            }
            ModelStatus::NotDownloaded | ModelStatus::Error => {
                record.status = ModelStatus::Downloading;
                record.progress_percent = 0;
                record.last_error = None;
                true
            }
        });
        if let Some(refusal) = refusal {
            debug!("Download of {} refused: {}", code, refusal);
            return Err(refusal);
        }
        if claimed.is_none() {
            return Err(TranslationError::Internal(format!("could not claim download for {}", code)));
        }

        info!("Downloading offline model {}", code);
        let sink = self.progress_sink(&code, progress);
        let engine = self.inner.engine.clone();
        let timeout = self.inner.download_timeout;

        let outcome = tokio::time::timeout(
            timeout,
            AssertUnwindSafe(engine.download(&code, sink)).catch_unwind(),
        )
        .await;

        match outcome {
            Ok(Ok(Ok(()))) => self.finish_download(&code).await,
            Ok(Ok(Err(e))) => {
                error!("Download of {} failed: {}", code, e);
                self.fail_download(&code, &e.to_string());
                Err(TranslationError::from(e))
            }
            Ok(Err(_panic)) => {
                error!("Download of {} panicked", code);
                self.fail_download(&code, "download task panicked");
                Err(TranslationError::Internal(format!("download of {} panicked", code)))
            }
            Err(_) => {
                let reason = format!("download timed out after {}s", timeout.as_secs());
                error!("Download of {}: {}", code, reason);
                self.fail_download(&code, &reason);
                Err(TranslationError::Timeout(reason))
            }
        }
    }

    async fn finish_download(&self, code: &str) -> Result<ModelRecord, TranslationError> {
        let probe = self.inner.engine.probe(code).await;

        let (verified, failure) = match probe {
            Ok(true) => (true, None),
            Ok(false) => (false, Some("model failed verification after download".to_string())),
            Err(e) => {
                // Installed but unconfirmed; reverify() can confirm later
                warn!("Could not verify model {} after download: {}", code, e);
                (false, None)
            }
        };

        if let Some(reason) = failure {
            self.fail_download(code, &reason);
            return Err(TranslationError::ProviderFailure(reason));
        }

        let finished = self.transition(code, |record| {
            if record.status != ModelStatus::Downloading {
                return false;
            }
            record.status = ModelStatus::Downloaded;
            record.verified = verified;
            record.progress_percent = 100;
            record.last_error = None;
            true
        });

        match finished {
            Some(record) => {
                info!("Offline model {} downloaded (verified: {})", code, record.verified);
                Ok(record)
            }
            None => Err(TranslationError::Internal(format!(
                "record for {} left DOWNLOADING during download",
                code
            ))),
        }
    }

    fn fail_download(&self, code: &str, reason: &str) {
        self.transition(code, |record| {
            if record.status != ModelStatus::Downloading {
                return false;
            }
            record.status = ModelStatus::Error;
            record.last_error = Some(reason.to_string());
            true
        });
    }

    /// Current record for `code`, NOT_DOWNLOADED when unseen
    pub fn record(&self, code: &str) -> ModelRecord {
        let normalized = language_utils::normalize_language_code(code)
            .unwrap_or_else(|_| code.trim().to_lowercase());
        self.inner
            .records
            .lock()
            .get(&normalized)
            .cloned()
            .unwrap_or_else(|| ModelRecord::new(normalized))
    }

    pub fn is_downloaded(&self, code: &str) -> bool {
        self.record(code).status == ModelStatus::Downloaded
    }

    pub fn is_downloaded_and_verified(&self, code: &str) -> bool {
        self.record(code).is_usable()
    }

    /// Point-in-time copy covering every catalog language
    pub fn status_snapshot(&self) -> BTreeMap<String, ModelRecord> {
        self.snapshot_with_generation().1
    }

    /// Snapshot plus the generation it was taken at
    pub fn snapshot_with_generation(&self) -> (u64, BTreeMap<String, ModelRecord>) {
        let records = self.inner.records.lock();
        let generation = self.generation();

        let mut snapshot: BTreeMap<String, ModelRecord> = OFFLINE_CATALOG
            .iter()
            .map(|l| (l.code.to_string(), ModelRecord::new(l.code)))
            .collect();
        for (code, record) in records.iter() {
            snapshot.insert(code.clone(), record.clone());
        }
        (generation, snapshot)
    }

    /// Remove a downloaded (or failed) model
    pub async fn remove_model(&self, code: &str) -> Result<ModelRecord, TranslationError> {
        let code = Self::catalog_code(code)?;
        let seen = self.record(&code);

        match seen.status {
            ModelStatus::NotDownloaded => return Ok(seen),
            ModelStatus::Downloading => return Err(TranslationError::DownloadInProgress(code)),
            ModelStatus::Downloaded | ModelStatus::Error => {}
        }

        self.inner.engine.delete(&code).await?;

        let removed = self.transition(&code, |record| {
            if record.status != seen.status {
                return false;
            }
            record.status = ModelStatus::NotDownloaded;
            record.last_error = None;
            record.progress_percent = 0;
            true
        });

        info!("Removed offline model {}", code);
        Ok(removed.unwrap_or_else(|| self.record(&code)))
    }

    /// Provider signal: a DOWNLOADED model failed a live probe
    pub fn report_probe_failure(&self, code: &str, reason: &str) -> bool {
        let normalized = language_utils::normalize_language_code(code)
            .unwrap_or_else(|_| code.trim().to_lowercase());
        let changed = self.transition(&normalized, |record| {
            if record.status != ModelStatus::Downloaded {
                return false;
            }
            record.status = ModelStatus::Error;
            record.last_error = Some(reason.to_string());
            true
        });
        if changed.is_some() {
            warn!("Model {} marked unusable: {}", normalized, reason);
        }
        changed.is_some()
    }

    /// Re-run the live probe for a DOWNLOADED model
    ///
    /// Returns whether the model ends up verified.
    pub async fn reverify(&self, code: &str) -> Result<bool, TranslationError> {
        let code = Self::catalog_code(code)?;
        if self.record(&code).status != ModelStatus::Downloaded {
            return Ok(false);
        }

        let alive = self.inner.engine.probe(&code).await?;
        if alive {
            self.transition(&code, |record| {
                if record.status != ModelStatus::Downloaded || record.verified {
                    return false;
                }
                record.verified = true;
                true
            });
            debug!("Model {} verified", code);
        } else {
            self.report_probe_failure(&code, "model failed verification");
        }
        Ok(self.is_downloaded_and_verified(&code))
    }

    /// Re-probe every DOWNLOADED record that is not verified
    ///
    /// Returns the codes that ended up verified. Probe errors leave the
    /// record unverified; a negative probe demotes it to ERROR.
    pub async fn verify_restored(&self) -> Vec<String> {
        let pending: Vec<String> = self
            .inner
            .records
            .lock()
            .values()
            .filter(|r| r.status == ModelStatus::Downloaded && !r.verified)
            .map(|r| r.language_code.clone())
            .collect();

        let mut verified = Vec::new();
        for code in pending {
            match self.reverify(&code).await {
                Ok(true) => verified.push(code),
                Ok(false) => {}
                Err(e) => debug!("Could not verify restored model {}: {}", code, e),
            }
        }
        verified
    }

    /// Probe every catalog language and align records with the device
    pub async fn reconcile(&self) -> ReconcileReport {
        let mut report = ReconcileReport::default();

        for language in OFFLINE_CATALOG {
            let code = language.code;
            let alive = match self.inner.engine.probe(code).await {
                Ok(alive) => alive,
                Err(e) => {
                    debug!("Probe for {} failed during reconcile: {}", code, e);
                    report.probe_failures.push(code.to_string());
                    continue;
                }
            };

            let mut outcome = None;
            self.transition(code, |record| match (record.status, alive) {
                (ModelStatus::Downloading, _) => false,
                (ModelStatus::Downloaded, true) => {
                    outcome = Some(ReconcileOutcome::Verified);
                    if record.verified {
                        return false;
                    }
                    record.verified = true;
                    true
                }
                (ModelStatus::Downloaded, false) => {
                    outcome = Some(ReconcileOutcome::Demoted);
                    record.status = ModelStatus::NotDownloaded;
                    record.last_error = Some("model missing on device".to_string());
                    true
                }
                (ModelStatus::NotDownloaded | ModelStatus::Error, true) => {
                    outcome = Some(ReconcileOutcome::Adopted);
                    record.status = ModelStatus::Downloaded;
                    record.verified = true;
                    record.last_error = None;
                    true
                }
                (ModelStatus::NotDownloaded | ModelStatus::Error, false) => false,
            });
            match outcome {
                Some(ReconcileOutcome::Adopted) => report.adopted.push(code.to_string()),
                Some(ReconcileOutcome::Demoted) => report.demoted.push(code.to_string()),
                Some(ReconcileOutcome::Verified) => report.verified.push(code.to_string()),
                None => {}
            }
        }

        info!(
            "Model reconcile: {} adopted, {} demoted, {} verified, {} probe failures",
            report.adopted.len(),
            report.demoted.len(),
            report.verified.len(),
            report.probe_failures.len()
        );
        report
    }

    /// Write every known record to `storage`
    pub fn persist(&self, storage: &dyn KeyValueStore) -> Result<usize, StorageError> {
        let records: Vec<ModelRecord> = self.inner.records.lock().values().cloned().collect();
        for record in &records {
            storage.put(
                &format!("{}{}", MODEL_PREFIX, record.language_code),
                &serde_json::to_string(record)?,
            )?;
        }
        Ok(records.len())
    }

    /// Load records saved by `persist` or write-through
    ///
    /// A record saved mid-download becomes ERROR ("interrupted"); the
    /// download that owned it died with the previous process. Restored
    /// DOWNLOADED records come back unverified until a live probe
    /// (`verify_restored`, `reverify` or `reconcile`) confirms them.
    pub fn restore(&self, storage: &dyn KeyValueStore) -> Result<usize, StorageError> {
        let mut restored = Vec::new();

        for (key, value) in storage.entries_with_prefix(MODEL_PREFIX)? {
            let mut record: ModelRecord = match serde_json::from_str(&value) {
                Ok(record) => record,
                Err(e) => {
                    warn!("Skipping unreadable model record {}: {}", key, e);
                    continue;
                }
            };
            if record.status == ModelStatus::Downloading {
                record.status = ModelStatus::Error;
                record.last_error = Some("interrupted".to_string());
                record.progress_percent = 0;
            }
            record.verified = false;
            restored.push(record);
        }

        let count = restored.len();
        {
            let mut records = self.inner.records.lock();
            for record in restored {
                records.insert(record.language_code.clone(), record);
            }
            self.inner.generation.fetch_add(1, Ordering::SeqCst);
        }
        debug!("Restored {} model records", count);
        Ok(count)
    }
}
