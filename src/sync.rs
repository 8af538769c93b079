//! Sync Controller: fetch-all, optimistic local mutation, write-through and
//! periodic reconciliation.
//!
//! The controller owns the explicit application state ([`AppState`]) and the
//! [`LocalCache`]. Every mutation is applied locally first; the remote write
//! follows, and a failed write leaves the local change in place and raises the
//! offline flag. A later successful [`SyncController::fetch_all`] replaces the
//! local view wholesale ("last full fetch wins").

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::auth::User;
use crate::entry::{Action, Entry, EntryDraft, EntryPatch, Lifecycle, Status};
use crate::error::{GradeFixError, LifecycleError, SyncError};
use crate::local::LocalCache;
use crate::store::EntryStore;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);
pub const DEFAULT_RECONCILE_DELAY: Duration = Duration::from_secs(1);

/// Foreground syncs drive the loading indicator; background ones are silent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    Foreground,
    Background,
}

/// Outcome of the remote half of a write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteStatus {
    Confirmed,
    /// The local change was kept; the remote write failed.
    Offline(SyncError),
}

impl WriteStatus {
    pub fn is_confirmed(&self) -> bool {
        matches!(self, WriteStatus::Confirmed)
    }
}

/// Application state owned by the controller.
#[derive(Debug, Clone, Default)]
pub struct AppState {
    /// Current view, most recent first. Provisional until the next full fetch.
    pub entries: Vec<Entry>,
    pub offline: bool,
    pub loading: bool,
    pub last_sync: Option<DateTime<Utc>>,
}

/// Time-based identifiers, forced strictly increasing within the process.
#[derive(Debug, Default)]
struct IdGenerator {
    last: AtomicI64,
}

impl IdGenerator {
    fn next(&self, now: DateTime<Utc>) -> String {
        let candidate = now.timestamp_millis();
        let mut prev = self.last.load(Ordering::Relaxed);
        loop {
            let id = candidate.max(prev + 1);
            match self
                .last
                .compare_exchange(prev, id, Ordering::Relaxed, Ordering::Relaxed)
            {
                Ok(_) => return id.to_string(),
                Err(actual) => prev = actual,
            }
        }
    }
}

pub struct SyncController<S> {
    /// `None` when no remote endpoint is configured.
    store: Option<S>,
    cache: LocalCache,
    state: Mutex<AppState>,
    reconcile_delay: Duration,
    pending: Mutex<Vec<JoinHandle<()>>>,
    ids: IdGenerator,
}

impl<S: EntryStore + 'static> SyncController<S> {
    pub fn new(store: Option<S>, cache: LocalCache, reconcile_delay: Duration) -> Self {
        Self {
            store,
            cache,
            state: Mutex::new(AppState::default()),
            reconcile_delay,
            pending: Mutex::new(Vec::new()),
            ids: IdGenerator::default(),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, AppState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot of the application state.
    pub fn state(&self) -> AppState {
        self.lock_state().clone()
    }

    pub fn entries(&self) -> Vec<Entry> {
        self.lock_state().entries.clone()
    }

    /// Last persisted snapshot, or empty. Never fails.
    pub fn read_cache(&self) -> Vec<Entry> {
        self.cache.read()
    }

    /// Seeds the view from the cache so something renders before the first fetch.
    pub fn load_cached(&self) {
        let cached = self.cache.read();
        self.lock_state().entries = cached;
    }

    /// Reads the whole remote collection, drops soft-deleted entries, sorts
    /// newest first and overwrites the Local Cache.
    ///
    /// Does not touch the view; see [`SyncController::sync`].
    pub async fn fetch_all(&self) -> Result<Vec<Entry>, SyncError> {
        let store = self.store.as_ref().ok_or(SyncError::ConfigMissing)?;
        let mut entries = store.get_all().await?;

        entries.retain(|e| e.status != Status::Deleted);
        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        self.cache.write(&entries);
        Ok(entries)
    }

    /// fetch_all with the fallback policy applied to the view.
    ///
    /// On failure the offline flag is raised and, if the cache holds anything,
    /// the view is replaced with it.
    pub async fn sync(&self, mode: SyncMode) -> Result<(), SyncError> {
        {
            let mut state = self.lock_state();
            if mode == SyncMode::Foreground {
                state.loading = true;
            }
            state.offline = false;
        }

        let result = self.fetch_all().await;

        let mut state = self.lock_state();
        let outcome = match result {
            Ok(entries) => {
                tracing::info!(count = entries.len(), ?mode, "Sync complete");
                state.entries = entries;
                state.last_sync = Some(Utc::now());
                Ok(())
            }
            Err(err) => {
                tracing::warn!(%err, ?mode, "Sync failed, falling back to local cache");
                state.offline = true;
                let cached = self.cache.read();
                if !cached.is_empty() {
                    state.entries = cached;
                }
                Err(err)
            }
        };
        if mode == SyncMode::Foreground {
            state.loading = false;
        }
        outcome
    }

    fn flag_offline(&self, err: SyncError, what: &str) -> WriteStatus {
        tracing::warn!(%err, "{what} failed, keeping local change");
        self.lock_state().offline = true;
        WriteStatus::Offline(err)
    }

    /// Files a new PENDING entry.
    ///
    /// The entry is prepended to the view and the cache immediately, written
    /// through to the store, and a full fetch is scheduled after the
    /// reconcile delay.
    pub async fn create_entry(
        self: &Arc<Self>,
        draft: EntryDraft,
    ) -> Result<(Entry, WriteStatus), LifecycleError> {
        let now = Utc::now();
        let entry = Lifecycle::file(self.ids.next(now), draft, now)?;

        self.lock_state().entries.insert(0, entry.clone());
        let mut cached = self.cache.read();
        cached.insert(0, entry.clone());
        self.cache.write(&cached);

        let remote = match &self.store {
            Some(store) => store.set_by_id(&entry.id, &entry).await.map_err(SyncError::from),
            None => Err(SyncError::ConfigMissing),
        };
        let status = match remote {
            Ok(()) => {
                tracing::info!(id = %entry.id, "Entry saved");
                WriteStatus::Confirmed
            }
            Err(err) => self.flag_offline(err, "Save entry"),
        };

        self.schedule_reconcile();
        Ok((entry, status))
    }

    /// Merges `patch` into the local entry (or removes it for a deletion) and
    /// writes the same partial update to the store.
    pub async fn apply_update(&self, id: &str, patch: &EntryPatch) -> WriteStatus {
        let apply = |entries: &mut Vec<Entry>| {
            if patch.is_deletion() {
                entries.retain(|e| e.id != id);
            } else if let Some(entry) = entries.iter_mut().find(|e| e.id == id) {
                patch.apply_to(entry);
            }
        };

        apply(&mut self.lock_state().entries);
        if self.cache.exists() {
            let mut cached = self.cache.read();
            apply(&mut cached);
            self.cache.write(&cached);
        }

        let remote = match &self.store {
            Some(store) => store.update_by_id(id, patch).await.map_err(SyncError::from),
            None => Err(SyncError::ConfigMissing),
        };
        match remote {
            Ok(()) => {
                tracing::info!(%id, status = ?patch.status, "Entry updated");
                WriteStatus::Confirmed
            }
            Err(err) => self.flag_offline(err, "Update entry"),
        }
    }

    fn find(&self, id: &str) -> Result<Entry, GradeFixError> {
        self.lock_state()
            .entries
            .iter()
            .find(|e| e.id == id)
            .cloned()
            .ok_or_else(|| GradeFixError::EntryNotFound(id.to_string()))
    }

    /// Runs a lifecycle action for `user` on entry `id`.
    ///
    /// Rejected actions return before any local or remote change.
    pub async fn transition(
        &self,
        user: &User,
        id: &str,
        action: &Action,
    ) -> Result<WriteStatus, GradeFixError> {
        let entry = self.find(id)?;
        let patch = Lifecycle::authorize_and_plan(user, &entry, action)?;
        Ok(self.apply_update(id, &patch).await)
    }

    /// Edits descriptive fields of an entry. Status fields are ignored.
    ///
    /// Only the filing teacher may edit, and only while the entry is PENDING.
    pub async fn edit_entry(
        self: &Arc<Self>,
        user: &User,
        id: &str,
        mut patch: EntryPatch,
    ) -> Result<WriteStatus, GradeFixError> {
        let entry = self.find(id)?;
        Lifecycle::authorize_edit(user, &entry)?;
        patch.status = None;
        patch.resolved_date = None;
        patch.new_grade = None;
        if patch.is_empty() {
            return Ok(WriteStatus::Confirmed);
        }

        let status = self.apply_update(id, &patch).await;
        self.schedule_reconcile();
        Ok(status)
    }

    /// One-shot background sync after the reconcile delay.
    pub fn schedule_reconcile(self: &Arc<Self>) {
        let this = Arc::clone(self);
        let delay = self.reconcile_delay;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // Fallback already applied inside sync.
            let _ = this.sync(SyncMode::Background).await;
        });

        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        pending.retain(|h| !h.is_finished());
        pending.push(handle);
    }

    /// Waits for every scheduled reconcile to finish.
    pub async fn settle(&self) {
        let handles: Vec<JoinHandle<()>> = {
            let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
            pending.drain(..).collect()
        };
        for handle in handles {
            if let Err(err) = handle.await {
                tracing::warn!(%err, "Reconcile task did not complete");
            }
        }
    }

    /// Starts the periodic refresh: a silent sync every `interval` and on
    /// every message from `triggers` (the app regaining focus).
    ///
    /// The task stops when the returned guard is stopped or dropped.
    pub fn start_background(
        self: &Arc<Self>,
        interval: Duration,
        mut triggers: mpsc::Receiver<()>,
    ) -> BackgroundRefresh {
        let this = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut listening = true;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        tracing::debug!("Poll interval elapsed");
                    }
                    trigger = triggers.recv(), if listening => {
                        if trigger.is_none() {
                            listening = false;
                            continue;
                        }
                        tracing::debug!("Foreground regained");
                    }
                }
                let _ = this.sync(SyncMode::Background).await;
            }
        });
        BackgroundRefresh { handle }
    }
}

/// Guard for the background refresh task.
pub struct BackgroundRefresh {
    handle: JoinHandle<()>,
}

impl BackgroundRefresh {
    pub fn stop(self) {
        self.handle.abort();
    }
}

impl Drop for BackgroundRefresh {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize};

    use chrono::NaiveDate;
    use tempfile::TempDir;

    use super::*;
    use crate::auth::Role;
    use crate::entry::{Grade, sample_entry};
    use crate::local::LocalStorage;
    use crate::store::StoreError;

    /// In-memory collection with a switchable outage.
    #[derive(Default)]
    struct MemoryStore {
        docs: Mutex<BTreeMap<String, Entry>>,
        down: AtomicBool,
        writes: AtomicUsize,
    }

    impl MemoryStore {
        fn with(entries: Vec<Entry>) -> Arc<Self> {
            let store = Self::default();
            {
                let mut docs = store.docs.lock().unwrap();
                for e in entries {
                    docs.insert(e.id.clone(), e);
                }
            }
            Arc::new(store)
        }

        fn set_down(&self, down: bool) {
            self.down.store(down, Ordering::SeqCst);
        }

        fn check(&self) -> Result<(), StoreError> {
            if self.down.load(Ordering::SeqCst) {
                Err(StoreError::ApiError {
                    status: 503,
                    message: "unavailable".into(),
                })
            } else {
                Ok(())
            }
        }

        fn doc(&self, id: &str) -> Option<Entry> {
            self.docs.lock().unwrap().get(id).cloned()
        }

        fn insert(&self, entry: Entry) {
            self.docs.lock().unwrap().insert(entry.id.clone(), entry);
        }

        fn live_sorted(&self) -> Vec<Entry> {
            let mut live: Vec<Entry> = self
                .docs
                .lock()
                .unwrap()
                .values()
                .filter(|e| e.status != Status::Deleted)
                .cloned()
                .collect();
            live.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
            live
        }
    }

    impl EntryStore for Arc<MemoryStore> {
        async fn get_all(&self) -> Result<Vec<Entry>, StoreError> {
            self.check()?;
            Ok(self.docs.lock().unwrap().values().cloned().collect())
        }

        async fn set_by_id(&self, id: &str, entry: &Entry) -> Result<(), StoreError> {
            self.check()?;
            self.writes.fetch_add(1, Ordering::SeqCst);
            self.docs.lock().unwrap().insert(id.to_string(), entry.clone());
            Ok(())
        }

        async fn update_by_id(&self, id: &str, patch: &EntryPatch) -> Result<(), StoreError> {
            self.check()?;
            self.writes.fetch_add(1, Ordering::SeqCst);
            let mut docs = self.docs.lock().unwrap();
            let doc = docs.get_mut(id).ok_or(StoreError::ApiError {
                status: 404,
                message: "No document to update".into(),
            })?;
            patch.apply_to(doc);
            Ok(())
        }
    }

    struct Harness {
        _dir: TempDir,
        store: Arc<MemoryStore>,
        ctrl: Arc<SyncController<Arc<MemoryStore>>>,
    }

    fn harness(entries: Vec<Entry>) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::with(entries);
        let cache = LocalCache::new(LocalStorage::new(dir.path()));
        let ctrl = Arc::new(SyncController::new(
            Some(Arc::clone(&store)),
            cache,
            DEFAULT_RECONCILE_DELAY,
        ));
        Harness {
            _dir: dir,
            store,
            ctrl,
        }
    }

    fn teacher() -> User {
        User {
            username: "t1".into(),
            name: "ครูรหัส t1".into(),
            role: Role::Teacher,
        }
    }

    fn admin() -> User {
        User {
            username: "t28".into(),
            name: "สาวจิราภรณ์ มูลี".into(),
            role: Role::Admin,
        }
    }

    fn draft(student: &str) -> EntryDraft {
        EntryDraft {
            teacher_name: "ครูรหัส t1".into(),
            student_id: "55555".into(),
            student_name: student.into(),
            subject: "ภาษาไทย".into(),
            subject_code: "ท21101".into(),
            grade: Grade::Zero,
            term: "1".into(),
            academic_year: "2566".into(),
        }
    }

    fn ids(entries: &[Entry]) -> Vec<String> {
        entries.iter().map(|e| e.id.clone()).collect()
    }

    #[test]
    fn ids_are_strictly_increasing() {
        let ids = IdGenerator::default();
        let now = Utc::now();
        let a: i64 = ids.next(now).parse().unwrap();
        let b: i64 = ids.next(now).parse().unwrap();
        assert_eq!(a, now.timestamp_millis());
        assert_eq!(b, a + 1);
    }

    #[tokio::test]
    async fn fetch_all_filters_deleted_sorts_and_caches() {
        let mut deleted = sample_entry("3", "2024-06-03T00:00:00Z");
        deleted.status = Status::Deleted;
        let h = harness(vec![
            sample_entry("1", "2024-06-01T00:00:00Z"),
            deleted,
            sample_entry("2", "2024-06-02T00:00:00Z"),
        ]);

        let entries = h.ctrl.fetch_all().await.unwrap();
        assert_eq!(ids(&entries), vec!["2", "1"]);
        assert_eq!(h.ctrl.read_cache(), entries);
    }

    #[tokio::test]
    async fn fetch_all_without_store_is_config_missing() {
        let dir = tempfile::tempdir().unwrap();
        let ctrl: SyncController<Arc<MemoryStore>> = SyncController::new(
            None,
            LocalCache::new(LocalStorage::new(dir.path())),
            DEFAULT_RECONCILE_DELAY,
        );
        assert_eq!(ctrl.fetch_all().await, Err(SyncError::ConfigMissing));
    }

    #[tokio::test]
    async fn failed_startup_sync_shows_prior_cache_and_goes_offline() {
        let h = harness(vec![]);
        let prior = vec![
            sample_entry("9", "2024-06-09T00:00:00Z"),
            sample_entry("8", "2024-06-08T00:00:00Z"),
        ];
        h.ctrl.cache.write(&prior);
        h.store.set_down(true);

        let result = h.ctrl.sync(SyncMode::Foreground).await;
        assert!(matches!(result, Err(SyncError::RemoteUnavailable(_))));

        let state = h.ctrl.state();
        assert_eq!(state.entries, prior);
        assert!(state.offline);
        assert!(!state.loading);
        assert!(state.last_sync.is_none());
    }

    #[tokio::test]
    async fn successful_sync_clears_offline_flag() {
        let h = harness(vec![sample_entry("1", "2024-06-01T00:00:00Z")]);
        h.store.set_down(true);
        let _ = h.ctrl.sync(SyncMode::Background).await;
        assert!(h.ctrl.state().offline);

        h.store.set_down(false);
        h.ctrl.sync(SyncMode::Background).await.unwrap();
        let state = h.ctrl.state();
        assert!(!state.offline);
        assert!(state.last_sync.is_some());
        assert_eq!(ids(&state.entries), vec!["1"]);
    }

    #[tokio::test]
    async fn created_entry_is_first_in_cache_before_any_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let cache = LocalCache::new(LocalStorage::new(dir.path()));
        cache.write(&[sample_entry("1", "2024-06-01T00:00:00Z")]);
        let ctrl: Arc<SyncController<Arc<MemoryStore>>> =
            Arc::new(SyncController::new(None, cache, DEFAULT_RECONCILE_DELAY));

        let (entry, status) = ctrl.create_entry(draft("เด็กชายใหม่")).await.unwrap();

        assert_eq!(status, WriteStatus::Offline(SyncError::ConfigMissing));
        assert!(ctrl.state().offline);
        let cached = ctrl.read_cache();
        assert_eq!(cached[0], entry);
        assert_eq!(cached.len(), 2);
        assert_eq!(ctrl.entries()[0].id, entry.id);
    }

    #[tokio::test(start_paused = true)]
    async fn create_writes_through_and_reconciles_after_delay() {
        let h = harness(vec![]);
        let (entry, status) = h.ctrl.create_entry(draft("เด็กหญิงฝน")).await.unwrap();
        assert!(status.is_confirmed());
        assert_eq!(h.store.doc(&entry.id).unwrap(), entry);

        // Another client files an entry before the reconcile runs.
        h.store.insert(sample_entry("1", "2020-01-01T00:00:00Z"));
        assert_eq!(h.ctrl.entries().len(), 1);

        tokio::time::sleep(Duration::from_millis(1100)).await;
        h.ctrl.settle().await;

        assert_eq!(ids(&h.ctrl.entries()), vec![entry.id.clone(), "1".to_string()]);
    }

    #[tokio::test]
    async fn failed_write_keeps_optimistic_entry() {
        let h = harness(vec![]);
        h.store.set_down(true);

        let (entry, status) = h.ctrl.create_entry(draft("เด็กชายต้น")).await.unwrap();
        assert!(matches!(status, WriteStatus::Offline(SyncError::RemoteUnavailable(_))));
        assert!(h.ctrl.state().offline);
        assert_eq!(h.ctrl.entries()[0], entry);
        assert_eq!(h.ctrl.read_cache()[0], entry);
        assert!(h.store.doc(&entry.id).is_none());
    }

    #[tokio::test]
    async fn deletion_removes_entry_everywhere() {
        let h = harness(vec![
            sample_entry("1", "2024-06-01T00:00:00Z"),
            sample_entry("2", "2024-06-02T00:00:00Z"),
        ]);
        h.ctrl.sync(SyncMode::Foreground).await.unwrap();

        let status = h
            .ctrl
            .transition(&teacher(), "1", &Action::Delete { confirmed: true })
            .await
            .unwrap();
        assert!(status.is_confirmed());

        assert_eq!(ids(&h.ctrl.entries()), vec!["2"]);
        assert_eq!(ids(&h.ctrl.read_cache()), vec!["2"]);
        // Soft delete: the document survives, flagged.
        assert_eq!(h.store.doc("1").unwrap().status, Status::Deleted);
        assert_eq!(ids(&h.ctrl.fetch_all().await.unwrap()), vec!["2"]);
        assert_eq!(ids(&h.ctrl.read_cache()), vec!["2"]);
    }

    #[tokio::test]
    async fn resolve_without_new_grade_writes_nothing() {
        let h = harness(vec![sample_entry("1", "2024-06-01T00:00:00Z")]);
        h.ctrl.sync(SyncMode::Foreground).await.unwrap();
        let before = h.ctrl.state();

        let action = Action::Resolve {
            new_grade: String::new(),
            resolved_date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            note: None,
        };
        let err = h.ctrl.transition(&teacher(), "1", &action).await.unwrap_err();

        assert!(matches!(
            err,
            GradeFixError::Lifecycle(LifecycleError::MissingNewGrade)
        ));
        assert_eq!(h.store.writes.load(Ordering::SeqCst), 0);
        assert_eq!(h.ctrl.entries(), before.entries);
        assert_eq!(h.store.doc("1").unwrap().status, Status::Pending);
    }

    #[tokio::test]
    async fn resolve_then_record_scenario() {
        let h = harness(vec![sample_entry("1", "2024-06-01T00:00:00Z")]);
        h.ctrl.sync(SyncMode::Foreground).await.unwrap();

        let resolve = Action::Resolve {
            new_grade: "2".into(),
            resolved_date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            note: None,
        };
        h.ctrl.transition(&teacher(), "1", &resolve).await.unwrap();

        let resolved = h.ctrl.entries()[0].clone();
        assert_eq!(resolved.status, Status::TeacherResolved);
        assert_eq!(resolved.new_grade.as_deref(), Some("2"));
        assert_eq!(resolved.resolved_date, NaiveDate::from_ymd_opt(2024, 6, 1));
        assert_eq!(h.store.doc("1").unwrap(), resolved);

        h.ctrl.transition(&admin(), "1", &Action::Record).await.unwrap();
        let recorded = h.ctrl.entries()[0].clone();
        assert_eq!(recorded.status, Status::AdminRecorded);
        assert_eq!(
            Entry {
                status: Status::TeacherResolved,
                ..recorded.clone()
            },
            resolved
        );
        assert_eq!(h.store.doc("1").unwrap(), recorded);
    }

    #[tokio::test]
    async fn transition_on_unknown_entry_is_not_found() {
        let h = harness(vec![]);
        let err = h
            .ctrl
            .transition(&admin(), "missing", &Action::Record)
            .await
            .unwrap_err();
        assert!(matches!(err, GradeFixError::EntryNotFound(id) if id == "missing"));
    }

    #[tokio::test]
    async fn edit_ignores_status_fields() {
        let h = harness(vec![sample_entry("1", "2024-06-01T00:00:00Z")]);
        h.ctrl.sync(SyncMode::Foreground).await.unwrap();

        let patch = EntryPatch {
            student_name: Some("เด็กชายแก้ไข".into()),
            status: Some(Status::AdminRecorded),
            ..Default::default()
        };
        h.ctrl.edit_entry(&teacher(), "1", patch).await.unwrap();
        h.ctrl.settle().await;

        let doc = h.store.doc("1").unwrap();
        assert_eq!(doc.student_name, "เด็กชายแก้ไข");
        assert_eq!(doc.status, Status::Pending);
        assert_eq!(h.ctrl.entries()[0], doc);
    }

    fn rename_and_regrade() -> EntryPatch {
        EntryPatch {
            student_name: Some("changed".into()),
            grade: Some(Grade::Incomplete),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn recorded_entry_cannot_be_edited() {
        let mut recorded = sample_entry("1", "2024-06-01T00:00:00Z");
        recorded.status = Status::AdminRecorded;
        let h = harness(vec![recorded.clone()]);
        h.ctrl.sync(SyncMode::Foreground).await.unwrap();

        let err = h
            .ctrl
            .edit_entry(&teacher(), "1", rename_and_regrade())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            GradeFixError::Lifecycle(LifecycleError::NotEditable {
                status: Status::AdminRecorded,
                ..
            })
        ));
        assert_eq!(h.store.writes.load(Ordering::SeqCst), 0);
        assert_eq!(h.store.doc("1").unwrap(), recorded);
        assert_eq!(h.ctrl.entries()[0], recorded);
    }

    #[tokio::test]
    async fn admin_cannot_edit_entries() {
        let h = harness(vec![sample_entry("1", "2024-06-01T00:00:00Z")]);
        h.ctrl.sync(SyncMode::Foreground).await.unwrap();

        let err = h
            .ctrl
            .edit_entry(&admin(), "1", rename_and_regrade())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            GradeFixError::Lifecycle(LifecycleError::NotEditable {
                role: Role::Admin,
                ..
            })
        ));
        assert_eq!(h.store.writes.load(Ordering::SeqCst), 0);
        assert_eq!(h.store.doc("1").unwrap().student_name, "เด็กชายสมชาย ใจดี");
    }

    #[tokio::test]
    async fn cache_matches_remote_after_any_operation_sequence() {
        let h = harness(vec![
            sample_entry("1", "2024-06-01T00:00:00Z"),
            sample_entry("2", "2024-06-02T00:00:00Z"),
        ]);
        h.ctrl.sync(SyncMode::Foreground).await.unwrap();

        let (a, _) = h.ctrl.create_entry(draft("ก")).await.unwrap();
        h.store.set_down(true);
        let (b, _) = h.ctrl.create_entry(draft("ข")).await.unwrap();
        h.store.set_down(false);
        h.ctrl
            .apply_update("1", &EntryPatch::status(Status::Deleted))
            .await;
        h.ctrl
            .apply_update(
                &a.id,
                &EntryPatch {
                    note: Some("ส่งงานแล้ว".into()),
                    ..Default::default()
                },
            )
            .await;
        // Update of an entry the remote never saw.
        h.ctrl
            .apply_update(&b.id, &EntryPatch::status(Status::Deleted))
            .await;

        let fetched = h.ctrl.fetch_all().await.unwrap();
        assert_eq!(fetched, h.store.live_sorted());
        assert_eq!(h.ctrl.read_cache(), h.store.live_sorted());
        assert!(!ids(&fetched).contains(&"1".to_string()));
        assert!(!ids(&fetched).contains(&b.id));
    }

    #[tokio::test(start_paused = true)]
    async fn background_refresh_runs_on_trigger_and_interval() {
        let h = harness(vec![]);
        let (tx, rx) = mpsc::channel(4);
        let refresh = h.ctrl.start_background(DEFAULT_POLL_INTERVAL, rx);

        h.store.insert(sample_entry("1", "2024-06-01T00:00:00Z"));
        tx.send(()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(ids(&h.ctrl.entries()), vec!["1"]);

        h.store.insert(sample_entry("2", "2024-06-02T00:00:00Z"));
        drop(tx);
        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(ids(&h.ctrl.entries()), vec!["2", "1"]);

        refresh.stop();
        h.store.insert(sample_entry("3", "2024-06-03T00:00:00Z"));
        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(h.ctrl.entries().len(), 2);
    }

    #[tokio::test]
    async fn background_sync_never_sets_loading() {
        let h = harness(vec![]);
        h.ctrl.sync(SyncMode::Background).await.unwrap();
        assert!(!h.ctrl.state().loading);
    }
}
