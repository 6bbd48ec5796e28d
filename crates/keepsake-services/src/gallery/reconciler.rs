//! Gallery activation and the orphan reconciliation sweep.
//!
//! Activation lists metadata rows newest-first and drops legacy rows without
//! a storage key. The sweep then probes every rendered entry in bounded
//! batches and removes entries whose object is gone, from the view and,
//! best-effort, from the metadata store. A probe error counts as missing.
//!
//! The sweep is a task owned by the [`GallerySession`]: it runs at most once
//! per session and is cancelled when the session is closed or dropped.

use futures::future::join_all;
use keepsake_core::Config;
use keepsake_db::{RepositoryResult, UploadRepository};
use keepsake_storage::Storage;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::probe::{ExistenceProbe, HttpProbe, ProbeError, ProbeTarget};
use super::view::{memories_label, GalleryEntry};

/// Timing and batching of the sweep.
#[derive(Debug, Clone)]
pub struct ReconcilerSettings {
    pub batch_size: usize,
    pub batch_pause: Duration,
    pub settle_delay: Duration,
    pub empty_redirect_delay: Duration,
}

impl ReconcilerSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            batch_size: config.verify_batch_size.max(1),
            batch_pause: config.verify_batch_pause(),
            settle_delay: config.verify_settle_delay(),
            empty_redirect_delay: config.empty_gallery_redirect(),
        }
    }
}

/// Outcome of one sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepSummary {
    pub checked: usize,
    pub missing: usize,
    pub rows_deleted: usize,
    pub cancelled: bool,
}

pub struct GalleryReconciler {
    repository: Arc<dyn UploadRepository>,
    storage: Arc<dyn Storage>,
    probe: Arc<dyn ExistenceProbe>,
    settings: ReconcilerSettings,
}

impl GalleryReconciler {
    pub fn new(
        repository: Arc<dyn UploadRepository>,
        storage: Arc<dyn Storage>,
        probe: Arc<dyn ExistenceProbe>,
        settings: ReconcilerSettings,
    ) -> Self {
        Self {
            repository,
            storage,
            probe,
            settings,
        }
    }

    /// Reconciler probing public URLs over HTTP.
    pub fn from_config(
        config: &Config,
        repository: Arc<dyn UploadRepository>,
        storage: Arc<dyn Storage>,
    ) -> Result<Self, ProbeError> {
        let probe = HttpProbe::new(config.probe_timeout())?;
        Ok(Self::new(
            repository,
            storage,
            Arc::new(probe),
            ReconcilerSettings::from_config(config),
        ))
    }

    /// Fetch and render the gallery. Verification is not started.
    #[tracing::instrument(skip(self))]
    pub async fn activate(&self) -> RepositoryResult<GallerySession> {
        let records = self.repository.list_newest_first().await?;
        let total = records.len();

        let entries: Vec<GalleryEntry> = records
            .into_iter()
            .filter(|record| record.has_storage_key())
            .filter_map(|record| {
                let id = record.id;
                match GalleryEntry::from_record(record, self.storage.as_ref()) {
                    Ok(entry) => Some(entry),
                    Err(e) => {
                        tracing::warn!(record_id = id, error = %e, "Skipping row with unusable storage key");
                        None
                    }
                }
            })
            .collect();

        tracing::info!(rows = total, rendered = entries.len(), "Gallery activated");

        let redirect_after = entries
            .is_empty()
            .then_some(self.settings.empty_redirect_delay);

        let (verifying_tx, _) = watch::channel(false);
        Ok(GallerySession {
            shared: Arc::new(SessionShared {
                entries: Mutex::new(entries),
                repository: self.repository.clone(),
                probe: self.probe.clone(),
                settings: self.settings.clone(),
                verifying: verifying_tx,
            }),
            started: AtomicBool::new(false),
            task: Mutex::new(None),
            cancel: CancellationToken::new(),
            redirect_after,
        })
    }
}

struct SessionShared {
    entries: Mutex<Vec<GalleryEntry>>,
    repository: Arc<dyn UploadRepository>,
    probe: Arc<dyn ExistenceProbe>,
    settings: ReconcilerSettings,
    verifying: watch::Sender<bool>,
}

impl SessionShared {
    fn snapshot(&self) -> Vec<GalleryEntry> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Drop an entry from the view, then delete its row. Returns whether the
    /// row was deleted; `false` also when another path already removed it.
    async fn remove_missing(&self, id: i64, reason: &str) -> bool {
        let removed = {
            let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
            let before = entries.len();
            entries.retain(|entry| entry.id != id);
            entries.len() != before
        };
        if !removed {
            return false;
        }

        match self.repository.delete_by_id(id).await {
            Ok(()) => {
                tracing::info!(record_id = id, reason, "Deleted orphaned record");
                true
            }
            Err(e) => {
                tracing::warn!(record_id = id, error = %e, "Failed to delete orphaned record");
                false
            }
        }
    }

    #[tracing::instrument(skip(self))]
    async fn sweep(&self) -> SweepSummary {
        tokio::time::sleep(self.settings.settle_delay).await;

        let targets: Vec<(i64, ProbeTarget)> = self
            .snapshot()
            .into_iter()
            .map(|entry| {
                (
                    entry.id,
                    ProbeTarget {
                        key: entry.storage_key,
                        url: entry.full_url,
                    },
                )
            })
            .collect();

        let mut summary = SweepSummary::default();
        let batch_size = self.settings.batch_size.max(1);
        for (index, batch) in targets.chunks(batch_size).enumerate() {
            if index > 0 {
                tokio::time::sleep(self.settings.batch_pause).await;
            }

            let results = join_all(batch.iter().map(|(id, target)| async move {
                let present = match self.probe.exists(target).await {
                    Ok(present) => present,
                    Err(e) => {
                        tracing::debug!(key = %target.key, error = %e, "Probe failed, treating as missing");
                        false
                    }
                };
                (*id, present)
            }))
            .await;

            for (id, present) in results {
                summary.checked += 1;
                if present {
                    continue;
                }
                summary.missing += 1;
                if self.remove_missing(id, "sweep").await {
                    summary.rows_deleted += 1;
                }
            }
        }

        tracing::info!(
            checked = summary.checked,
            missing = summary.missing,
            rows_deleted = summary.rows_deleted,
            "Gallery verification completed"
        );
        summary
    }
}

/// One gallery activation: the rendered entries plus its verification task.
pub struct GallerySession {
    shared: Arc<SessionShared>,
    started: AtomicBool,
    task: Mutex<Option<JoinHandle<SweepSummary>>>,
    cancel: CancellationToken,
    redirect_after: Option<Duration>,
}

impl GallerySession {
    pub fn entries(&self) -> Vec<GalleryEntry> {
        self.shared.snapshot()
    }

    pub fn len(&self) -> usize {
        self.shared
            .entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `N memories` line for the current view.
    pub fn count_label(&self) -> String {
        memories_label(self.len())
    }

    /// Set when the gallery was empty at activation: the caller should move to
    /// the upload view after this delay.
    pub fn redirect_to_upload_after(&self) -> Option<Duration> {
        self.redirect_after
    }

    /// Watch the "verifying" flag.
    pub fn verifying(&self) -> watch::Receiver<bool> {
        self.shared.verifying.subscribe()
    }

    pub fn is_verifying(&self) -> bool {
        *self.shared.verifying.borrow()
    }

    /// Spawn the sweep. Returns `false` if it was already started for this
    /// session. Must be called from within a tokio runtime.
    pub fn start_verification(&self) -> bool {
        if self.started.swap(true, Ordering::SeqCst) {
            return false;
        }

        let shared = self.shared.clone();
        let cancel = self.cancel.clone();
        let handle = tokio::spawn(async move {
            shared.verifying.send_replace(true);
            let summary = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::debug!("Gallery verification cancelled");
                    SweepSummary {
                        cancelled: true,
                        ..SweepSummary::default()
                    }
                }
                summary = shared.sweep() => summary,
            };
            shared.verifying.send_replace(false);
            summary
        });

        *self.task.lock().unwrap_or_else(|e| e.into_inner()) = Some(handle);
        true
    }

    /// Wait for the sweep to settle. `None` if it was never started or has
    /// already been awaited.
    pub async fn wait_for_verification(&self) -> Option<SweepSummary> {
        let handle = self.task.lock().unwrap_or_else(|e| e.into_inner()).take()?;
        match handle.await {
            Ok(summary) => Some(summary),
            Err(e) => {
                tracing::error!(error = %e, "Gallery verification task failed");
                None
            }
        }
    }

    /// An entry failed to load at display time: treat it as missing right away.
    /// Returns whether the entry was still rendered.
    pub async fn report_load_failure(&self, id: i64) -> bool {
        let rendered = self
            .shared
            .entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .any(|entry| entry.id == id);
        if rendered {
            self.shared.remove_missing(id, "load_failure").await;
        }
        rendered
    }

    /// Cancel the sweep, if running.
    pub fn close(&self) {
        self.cancel.cancel();
    }
}

impl Drop for GallerySession {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bytes::Bytes;
    use chrono::{TimeZone, Utc};
    use keepsake_core::UploadRecord;
    use keepsake_db::MemoryUploadRepository;
    use keepsake_storage::MemoryStorage;
    use std::collections::HashSet;
    use std::sync::atomic::AtomicUsize;

    use crate::gallery::probe::StorageProbe;

    fn fast_settings() -> ReconcilerSettings {
        ReconcilerSettings {
            batch_size: 5,
            batch_pause: Duration::from_millis(1),
            settle_delay: Duration::ZERO,
            empty_redirect_delay: Duration::from_millis(1500),
        }
    }

    fn row(id: i64, name: &str) -> UploadRecord {
        UploadRecord {
            id,
            file_path: format!("public/{}-abc-{}", id, name),
            file_name: name.to_string(),
            uploader_name: None,
            file_url: None,
            created_at: Utc.timestamp_millis_opt(1_700_000_000_000 + id).unwrap(),
        }
    }

    /// Seed `count` rows, all backed by stored objects.
    fn seeded(count: i64) -> (MemoryStorage, MemoryUploadRepository) {
        let storage = MemoryStorage::new();
        let repository = MemoryUploadRepository::new();
        for id in 1..=count {
            let record = row(id, &format!("photo{}.jpg", id));
            storage.insert(&record.file_path, Bytes::from_static(b"jpeg"), "image/jpeg");
            repository.seed(record);
        }
        (storage, repository)
    }

    fn reconciler(
        storage: &MemoryStorage,
        repository: &MemoryUploadRepository,
        probe: Arc<dyn ExistenceProbe>,
        settings: ReconcilerSettings,
    ) -> GalleryReconciler {
        GalleryReconciler::new(
            Arc::new(repository.clone()),
            Arc::new(storage.clone()),
            probe,
            settings,
        )
    }

    fn storage_reconciler(
        storage: &MemoryStorage,
        repository: &MemoryUploadRepository,
    ) -> GalleryReconciler {
        let probe = Arc::new(StorageProbe::new(Arc::new(storage.clone())));
        reconciler(storage, repository, probe, fast_settings())
    }

    /// Scripted probe: errors for listed keys, tracks calls and peak concurrency.
    #[derive(Default)]
    struct ScriptedProbe {
        failing: HashSet<String>,
        calls: AtomicUsize,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl ExistenceProbe for ScriptedProbe {
        async fn exists(&self, target: &ProbeTarget) -> Result<bool, ProbeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(5)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if self.failing.contains(&target.key) {
                Err(ProbeError::Request("connection reset".to_string()))
            } else {
                Ok(true)
            }
        }
    }

    #[tokio::test]
    async fn activation_orders_and_drops_legacy_rows() {
        let (storage, repository) = seeded(3);
        let mut legacy = row(4, "old.jpg");
        legacy.file_path = String::new();
        repository.seed(legacy);

        let session = storage_reconciler(&storage, &repository)
            .activate()
            .await
            .unwrap();

        let ids: Vec<i64> = session.entries().iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![3, 2, 1]);
        assert_eq!(session.count_label(), "3 memories");
        assert_eq!(session.redirect_to_upload_after(), None);
        assert!(!session.is_verifying());
    }

    #[tokio::test]
    async fn empty_gallery_requests_redirect() {
        let storage = MemoryStorage::new();
        let repository = MemoryUploadRepository::new();
        let session = storage_reconciler(&storage, &repository)
            .activate()
            .await
            .unwrap();

        assert!(session.is_empty());
        assert_eq!(
            session.redirect_to_upload_after(),
            Some(Duration::from_millis(1500))
        );
    }

    #[tokio::test]
    async fn sweep_removes_exactly_the_orphaned_row() {
        let (storage, repository) = seeded(3);
        storage.remove("public/2-abc-photo2.jpg");

        let session = storage_reconciler(&storage, &repository)
            .activate()
            .await
            .unwrap();
        assert!(session.start_verification());
        let summary = session.wait_for_verification().await.unwrap();

        assert_eq!(
            summary,
            SweepSummary {
                checked: 3,
                missing: 1,
                rows_deleted: 1,
                cancelled: false,
            }
        );
        let ids: Vec<i64> = session.entries().iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![3, 1]);
        let remaining: Vec<i64> = repository.rows().iter().map(|r| r.id).collect();
        assert_eq!(remaining, vec![1, 3]);
        assert_eq!(repository.deleted_ids(), vec![2]);
        assert!(!session.is_verifying());
    }

    #[tokio::test]
    async fn probe_errors_count_as_missing() {
        let (storage, repository) = seeded(2);
        let probe = Arc::new(ScriptedProbe {
            failing: HashSet::from(["public/1-abc-photo1.jpg".to_string()]),
            ..ScriptedProbe::default()
        });

        let session = reconciler(&storage, &repository, probe, fast_settings())
            .activate()
            .await
            .unwrap();
        session.start_verification();
        let summary = session.wait_for_verification().await.unwrap();

        assert_eq!(summary.missing, 1);
        assert_eq!(repository.deleted_ids(), vec![1]);
    }

    #[tokio::test]
    async fn failed_row_deletion_still_hides_entry() {
        let (storage, repository) = seeded(2);
        storage.remove("public/1-abc-photo1.jpg");
        repository.fail_deletes(true);

        let session = storage_reconciler(&storage, &repository)
            .activate()
            .await
            .unwrap();
        session.start_verification();
        let summary = session.wait_for_verification().await.unwrap();

        assert_eq!(summary.missing, 1);
        assert_eq!(summary.rows_deleted, 0);
        assert_eq!(session.len(), 1);
        assert_eq!(repository.rows().len(), 2);
        // Not retried.
        assert_eq!(repository.deleted_ids(), vec![1]);
    }

    #[tokio::test]
    async fn probes_are_batched() {
        let (storage, repository) = seeded(12);
        let probe = Arc::new(ScriptedProbe::default());

        let session = reconciler(&storage, &repository, probe.clone(), fast_settings())
            .activate()
            .await
            .unwrap();
        session.start_verification();
        session.wait_for_verification().await.unwrap();

        assert_eq!(probe.calls.load(Ordering::SeqCst), 12);
        let peak = probe.peak.load(Ordering::SeqCst);
        assert!(peak <= 5, "peak concurrency {peak}");
    }

    #[tokio::test]
    async fn verification_runs_once_per_session() {
        let (storage, repository) = seeded(3);
        let probe = Arc::new(ScriptedProbe::default());

        let session = reconciler(&storage, &repository, probe.clone(), fast_settings())
            .activate()
            .await
            .unwrap();
        assert!(session.start_verification());
        assert!(!session.start_verification());
        session.wait_for_verification().await.unwrap();
        assert!(!session.start_verification());
        assert!(session.wait_for_verification().await.is_none());

        assert_eq!(probe.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn verifying_signal_tracks_sweep() {
        let (storage, repository) = seeded(1);
        let mut settings = fast_settings();
        settings.settle_delay = Duration::from_millis(20);

        let base = storage_reconciler(&storage, &repository);
        let session = GalleryReconciler { settings, ..base }
            .activate()
            .await
            .unwrap();
        let mut verifying = session.verifying();

        session.start_verification();
        verifying.changed().await.unwrap();
        assert!(*verifying.borrow_and_update());

        session.wait_for_verification().await.unwrap();
        assert!(!session.is_verifying());
    }

    #[tokio::test]
    async fn close_cancels_pending_sweep() {
        let (storage, repository) = seeded(2);
        storage.remove("public/1-abc-photo1.jpg");
        let mut settings = fast_settings();
        settings.settle_delay = Duration::from_secs(30);

        let probe = Arc::new(StorageProbe::new(Arc::new(storage.clone())));
        let session = reconciler(&storage, &repository, probe, settings)
            .activate()
            .await
            .unwrap();
        session.start_verification();
        session.close();

        let summary = session.wait_for_verification().await.unwrap();
        assert!(summary.cancelled);
        assert!(!session.is_verifying());
        assert!(repository.deleted_ids().is_empty());
        assert_eq!(session.len(), 2);
    }

    #[tokio::test]
    async fn load_failure_removes_entry_immediately() {
        let (storage, repository) = seeded(2);
        let session = storage_reconciler(&storage, &repository)
            .activate()
            .await
            .unwrap();

        assert!(session.report_load_failure(2).await);
        assert!(!session.report_load_failure(2).await);

        let ids: Vec<i64> = session.entries().iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![1]);
        assert_eq!(repository.deleted_ids(), vec![2]);
        assert_eq!(session.count_label(), "1 memory");
    }
}
