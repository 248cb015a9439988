//! Sync controller - orchestrates fetch, save, delete and conflicts.
//!
//! Every operation decides between the online path (remote call, then cache)
//! and the offline path (cache only, record tagged pending). Results reach
//! [`SyncState`] exclusively through [`SyncController::dispatch`], which
//! reduces and notifies under one lock so transitions never interleave.
//!
//! Operations suspend on every remote call and cache access. Before each
//! state change they re-check the session's [`CancelToken`], so results that
//! arrive after [`SyncController::teardown`] are dropped.

use crate::{
    conflict, error::Result, local_store::RecordCache, state::reduce, temp_id, Action, Conflict,
    Error, EventNotifier, FetchSource, LocalStore, PageCursor, PageQuery, PushMessage, Record,
    RecordId, RemoteClient, Resolution, SyncConfig, SyncState, SyncStatus, TempIdGenerator,
};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{Notify, OwnedMutexGuard};

/// Session-wide cancellation flag.
///
/// Cloned into every operation when it starts and checked whenever it
/// resumes.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl CancelToken {
    /// Create a live token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel; wakes every task waiting in [`CancelToken::cancelled`].
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    /// Whether the token was cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Wait until the token is cancelled.
    pub async fn cancelled(&self) {
        let notified = self.notify.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();
        if self.is_cancelled() {
            return;
        }
        notified.await;
    }
}

/// The sync controller.
pub struct SyncController {
    pub(crate) remote: Arc<dyn RemoteClient>,
    pub(crate) cache: RecordCache,
    pub(crate) config: SyncConfig,
    pub(crate) temp_ids: TempIdGenerator,
    pub(crate) sweeping: AtomicBool,
    /// Per temporary id; held by whoever is pushing that record to the server
    claims: DashMap<RecordId, Arc<tokio::sync::Mutex<()>>>,
    /// Temporary id -> server copy it was created as
    promoted: DashMap<RecordId, Record>,
    principal: String,
    state: Mutex<SyncState>,
    dispatch_lock: Mutex<()>,
    notifier: EventNotifier,
    cancel: CancelToken,
    fetch_epoch: AtomicU64,
}

impl std::fmt::Debug for SyncController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncController")
            .field("principal", &self.principal)
            .field("config", &self.config)
            .field("torn_down", &self.is_torn_down())
            .finish()
    }
}

impl SyncController {
    /// Create a controller for one session of `principal`.
    pub fn new(
        remote: Arc<dyn RemoteClient>,
        store: Arc<dyn LocalStore>,
        principal: impl Into<String>,
        config: SyncConfig,
    ) -> Self {
        let state = SyncState::new(config.page_size);
        Self {
            remote,
            cache: RecordCache::new(store),
            config,
            temp_ids: TempIdGenerator::new(),
            sweeping: AtomicBool::new(false),
            claims: DashMap::new(),
            promoted: DashMap::new(),
            principal: principal.into(),
            state: Mutex::new(state),
            dispatch_lock: Mutex::new(()),
            notifier: EventNotifier::new(),
            cancel: CancelToken::new(),
            fetch_epoch: AtomicU64::new(0),
        }
    }

    /// Create a controller wrapped in Arc for sharing.
    pub fn new_shared(
        remote: Arc<dyn RemoteClient>,
        store: Arc<dyn LocalStore>,
        principal: impl Into<String>,
        config: SyncConfig,
    ) -> Arc<Self> {
        Arc::new(Self::new(remote, store, principal, config))
    }

    /// The principal this session belongs to.
    pub fn principal(&self) -> &str {
        &self.principal
    }

    /// The engine configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> SyncState {
        self.state.lock().clone()
    }

    /// Install the presentation-layer subscriber.
    ///
    /// The subscriber runs synchronously inside dispatch and must not start
    /// new controller operations from within the callback.
    pub fn subscribe(&self, subscriber: impl Fn(&Action) + Send + Sync + 'static) {
        self.notifier.subscribe(subscriber);
    }

    /// Remove the subscriber.
    pub fn unsubscribe(&self) {
        self.notifier.unsubscribe();
    }

    /// The session's cancellation token.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// End the session: pending results are discarded from now on.
    pub fn teardown(&self) {
        tracing::info!(principal = %self.principal, "Tearing down sync session");
        self.cancel.cancel();
        self.notifier.unsubscribe();
    }

    /// Whether [`SyncController::teardown`] was called.
    pub fn is_torn_down(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Apply `action` to state and broadcast it, unless `token` was cancelled.
    ///
    /// Returns whether the action was applied.
    pub(crate) fn dispatch(&self, token: &CancelToken, action: Action) -> bool {
        if token.is_cancelled() {
            tracing::debug!(kind = %action.kind(), "Discarding transition after teardown");
            return false;
        }
        let _serial = self.dispatch_lock.lock();
        reduce(&mut self.state.lock(), &action);
        self.notifier.notify(&action);
        true
    }

    // ------------------------------------------------------------------
    // Fetch
    // ------------------------------------------------------------------

    /// Fetch one page and show it.
    ///
    /// Returns the remote page length, or `0` when the page came from the
    /// offline cache (no more remote pages are available).
    pub async fn fetch(
        &self,
        owner_filter: &str,
        partial_name: &str,
        cursor: PageCursor,
        append: bool,
        online: bool,
    ) -> usize {
        let token = self.token();
        let epoch = if append {
            self.fetch_epoch.load(Ordering::SeqCst)
        } else {
            self.fetch_epoch.fetch_add(1, Ordering::SeqCst) + 1
        };

        tracing::debug!(
            owners = %owner_filter,
            name = %partial_name,
            offset = cursor.offset,
            size = cursor.size,
            append,
            online,
            "Fetch started"
        );
        self.dispatch(&token, Action::FetchStarted);

        let query = PageQuery::new(owner_filter, partial_name, cursor.offset, cursor.size);
        let result = if online {
            self.remote.list(&query).await
        } else {
            Err(Error::Offline)
        };

        match result {
            Ok(page) => {
                let count = page.len();
                let records = self.absorb_page(page).await;
                if self.superseded(epoch) {
                    return 0;
                }
                tracing::info!(count, offset = cursor.offset, "Fetch succeeded");
                self.dispatch(
                    &token,
                    Action::FetchSucceeded {
                        records,
                        append,
                        cursor,
                        count,
                        source: FetchSource::Remote,
                    },
                );
                count
            }
            Err(error) => {
                tracing::warn!(error = %error, "Fetch failed, falling back to local cache");
                if self.superseded(epoch) {
                    return 0;
                }
                self.dispatch(&token, Action::FetchFailed { error });

                let records = self.cached_records().await;
                if self.superseded(epoch) {
                    return 0;
                }
                self.dispatch(
                    &token,
                    Action::FetchSucceeded {
                        records,
                        append: false,
                        cursor: PageCursor::first(cursor.size),
                        count: 0,
                        source: FetchSource::Cache,
                    },
                );
                0
            }
        }
    }

    /// Reset to the first page for a new filter or search and fetch it.
    pub async fn refresh(&self, owner_filter: &str, partial_name: &str, online: bool) -> usize {
        let cursor = PageCursor::first(self.config.page_size);
        self.fetch(owner_filter, partial_name, cursor, false, online)
            .await
    }

    /// Fetch and append the page after the current cursor.
    ///
    /// Does nothing once a short page disabled further pagination.
    pub async fn next_page(&self, owner_filter: &str, partial_name: &str, online: bool) -> usize {
        let (cursor, more) = {
            let state = self.state.lock();
            (state.cursor.next(), state.more_pages)
        };
        if !more {
            tracing::debug!("No more pages to fetch");
            return 0;
        }
        self.fetch(owner_filter, partial_name, cursor, true, online)
            .await
    }

    /// Cache a fetched page as synced, keeping local pending edits intact.
    async fn absorb_page(&self, page: Vec<Record>) -> Vec<Record> {
        let mut visible = Vec::with_capacity(page.len());
        for mut record in page {
            record.mark_synced();
            let Some(id) = record.id else {
                tracing::warn!(name = %record.name, "Ignoring fetched record without id");
                continue;
            };
            match self.cache.load_id(id).await {
                Ok(Some(local)) if local.status.is_pending() => {
                    tracing::debug!(id, status = ?local.status, "Keeping pending local copy");
                    if local.status != SyncStatus::PendingDelete {
                        visible.push(local);
                    }
                    continue;
                }
                Ok(_) => {}
                Err(e) => tracing::warn!(id, error = %e, "Failed to read cached record"),
            }
            if let Err(e) = self.cache.put(&record).await {
                tracing::warn!(id, error = %e, "Failed to cache fetched record");
            }
            visible.push(record);
        }
        visible
    }

    /// The offline view: every cached record of this principal.
    async fn cached_records(&self) -> Vec<Record> {
        match self.cache.load_visible_for(&self.principal).await {
            Ok(records) => {
                for id in records.iter().filter_map(|r| r.id) {
                    self.temp_ids.observe(id);
                }
                records
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read local cache");
                Vec::new()
            }
        }
    }

    fn superseded(&self, epoch: u64) -> bool {
        let stale = self.fetch_epoch.load(Ordering::SeqCst) != epoch;
        if stale {
            tracing::debug!(epoch, "Discarding superseded fetch result");
        }
        stale
    }

    // ------------------------------------------------------------------
    // Save
    // ------------------------------------------------------------------

    /// Create or update `record`.
    ///
    /// Online success returns the server's record; a connectivity failure
    /// returns the locally staged pending record. A remote rejection is
    /// surfaced as `saving_error` and returned as the error.
    pub async fn save(&self, record: Record, online: bool) -> Result<Record> {
        let token = self.token();
        tracing::debug!(id = ?record.id, online, "Save started");
        self.dispatch(&token, Action::SaveStarted);
        let (record, _claim) = self.claim_local(record).await;

        let attempt = if online {
            let mut outgoing = record.clone();
            outgoing.mark_synced();
            if record.is_local_only() {
                outgoing.id = None;
                self.remote.create(&outgoing).await
            } else {
                self.remote.update(&outgoing).await
            }
        } else {
            Err(Error::Offline)
        };

        match attempt {
            Ok(mut saved) => {
                saved.mark_synced();
                if let Err(e) = self.cache.put(&saved).await {
                    tracing::warn!(id = ?saved.id, error = %e, "Failed to cache saved record");
                }
                if let Some(previous) = record.id.filter(|id| temp_id::is_temporary(*id)) {
                    self.promote(previous, &saved);
                    if let Err(e) = self.cache.evict(previous).await {
                        tracing::warn!(id = previous, error = %e, "Failed to evict temporary record");
                    }
                    self.dispatch(
                        &token,
                        Action::RecordReplaced {
                            previous: Some(previous),
                            record: saved.clone(),
                        },
                    );
                }
                tracing::info!(id = ?saved.id, version = saved.version, "Save succeeded");
                self.dispatch(
                    &token,
                    Action::SaveSucceeded {
                        record: saved.clone(),
                    },
                );
                if self.state.lock().has_conflict() {
                    self.dispatch(&token, Action::ConflictResolved);
                }
                Ok(saved)
            }
            Err(error) if error.is_connectivity() => {
                tracing::warn!(error = %error, "Save failed, keeping edit locally");
                let pending = self.stage_offline(record).await;
                if let Err(e) = self.cache.put(&pending).await {
                    tracing::warn!(id = ?pending.id, error = %e, "Failed to persist local edit");
                    self.dispatch(&token, Action::SaveFailed { error: e.clone() });
                    return Err(e);
                }
                self.dispatch(
                    &token,
                    Action::SaveSucceeded {
                        record: pending.clone(),
                    },
                );
                Ok(pending)
            }
            Err(error) => {
                tracing::warn!(error = %error, "Save rejected by remote");
                self.dispatch(
                    &token,
                    Action::SaveFailed {
                        error: error.clone(),
                    },
                );
                Err(error)
            }
        }
    }

    /// Hold the claim on a temporary id for the rest of a write.
    ///
    /// If the sweep already created the record, the write is redirected to
    /// the server copy as an edit on top of it.
    async fn claim_local(&self, mut record: Record) -> (Record, Option<OwnedMutexGuard<()>>) {
        let Some(id) = record.id.filter(|id| temp_id::is_temporary(*id)) else {
            return (record, None);
        };
        let claim = self.claim_temporary(id).await;
        if let Some(created) = self.promoted.get(&id).map(|r| r.value().clone()) {
            tracing::debug!(previous = id, id = ?created.id, "Temporary record already replayed");
            record.id = created.id;
            record.base_version = Some(created.version);
            record.version = record.version.max(created.version + 1);
        }
        (record, Some(claim))
    }

    /// Wait for exclusive use of temporary id `id`.
    pub(crate) async fn claim_temporary(&self, id: RecordId) -> OwnedMutexGuard<()> {
        let lock = self.claims.entry(id).or_default().value().clone();
        lock.lock_owned().await
    }

    /// Remember that temporary id `previous` now lives on the server as
    /// `created`.
    pub(crate) fn promote(&self, previous: RecordId, created: &Record) {
        self.promoted.insert(previous, created.clone());
    }

    /// Tag `record` for replay: temporary id and pending create when it never
    /// reached the server, pending update otherwise.
    async fn stage_offline(&self, mut record: Record) -> Record {
        match record.id {
            None => {
                record.id = Some(self.temp_ids.next_id());
                record.status = SyncStatus::PendingCreate;
            }
            Some(id) if temp_id::is_temporary(id) => {
                record.status = SyncStatus::PendingCreate;
            }
            Some(id) => {
                record.status = SyncStatus::PendingUpdate;
                if record.base_version.is_none() {
                    record.base_version = self.acknowledged_version(id).await;
                }
            }
        }
        record
    }

    /// Last server-acknowledged version of `id` known locally.
    async fn acknowledged_version(&self, id: RecordId) -> Option<u64> {
        let cached = match self.cache.load_id(id).await {
            Ok(cached) => cached,
            Err(e) => {
                tracing::warn!(id, error = %e, "Failed to read cached record");
                None
            }
        };
        let known = cached.or_else(|| self.state.lock().get(id).cloned())?;
        if known.status.is_clean() {
            Some(known.version)
        } else {
            known.base_version
        }
    }

    // ------------------------------------------------------------------
    // Delete
    // ------------------------------------------------------------------

    /// Delete `record`. Offline, a tombstone is cached for the sweep; the
    /// record disappears from the visible set either way.
    pub async fn delete(&self, record: Record, online: bool) -> Result<()> {
        if record.id.is_none() {
            tracing::debug!(name = %record.name, "Nothing to delete for unsaved record");
            return Ok(());
        }
        let (record, _claim) = self.claim_local(record).await;
        let Some(id) = record.id else {
            return Ok(());
        };
        let token = self.token();
        tracing::debug!(id, online, "Delete started");
        self.dispatch(&token, Action::DeleteStarted);

        if temp_id::is_temporary(id) {
            if let Err(e) = self.cache.evict(id).await {
                tracing::warn!(id, error = %e, "Failed to evict local-only record");
            }
            self.dispatch(&token, Action::DeleteSucceeded { id });
            return Ok(());
        }

        let attempt = if online {
            self.remote.delete(&record).await
        } else {
            Err(Error::Offline)
        };

        match attempt {
            Ok(()) | Err(Error::RecordNotFound(_)) => {
                if let Err(e) = self.cache.evict(id).await {
                    tracing::warn!(id, error = %e, "Failed to evict deleted record");
                }
                tracing::info!(id, "Delete succeeded");
                self.dispatch(&token, Action::DeleteSucceeded { id });
                Ok(())
            }
            Err(error) if error.is_connectivity() => {
                tracing::warn!(id, error = %error, "Delete failed, keeping tombstone locally");
                let mut tombstone = record;
                if tombstone.base_version.is_none() {
                    tombstone.base_version = self.acknowledged_version(id).await;
                }
                tombstone.status = SyncStatus::PendingDelete;
                if let Err(e) = self.cache.put(&tombstone).await {
                    self.dispatch(&token, Action::DeleteFailed { error: e.clone() });
                    return Err(e);
                }
                self.dispatch(&token, Action::DeleteSucceeded { id });
                Ok(())
            }
            Err(error) => {
                tracing::warn!(id, error = %error, "Delete rejected by remote");
                self.dispatch(
                    &token,
                    Action::DeleteFailed {
                        error: error.clone(),
                    },
                );
                Err(error)
            }
        }
    }

    // ------------------------------------------------------------------
    // Conflicts
    // ------------------------------------------------------------------

    /// Compare `local` with the server's current copy of `id`.
    ///
    /// On divergence the server copy becomes the conflict slot, replacing any
    /// unresolved conflict.
    pub async fn get_remote_version(
        &self,
        id: RecordId,
        local: &Record,
    ) -> Result<Option<Conflict>> {
        if temp_id::is_temporary(id) {
            return Ok(None);
        }
        let token = self.token();
        let server = self.remote.get(id).await.map_err(|e| {
            tracing::warn!(id, error = %e, "Failed to read remote version");
            e
        })?;

        let detected = Conflict::detect(local, &server);
        if let Some(conflict) = &detected {
            tracing::info!(
                id,
                local_version = local.version,
                server_version = conflict.server.version,
                "Conflict detected"
            );
            self.dispatch(
                &token,
                Action::ConflictDetected {
                    server: conflict.server.clone(),
                },
            );
        }
        Ok(detected)
    }

    /// Resolve the outstanding conflict by resubmitting the chosen side.
    ///
    /// Returns `Ok(None)` when there is no conflict to resolve.
    pub async fn resolve_conflict(
        &self,
        local_edit: &Record,
        resolution: Resolution,
        online: bool,
    ) -> Result<Option<Record>> {
        let Some(server) = self.state.lock().conflict.clone() else {
            tracing::debug!("No conflict to resolve");
            return Ok(None);
        };
        tracing::info!(id = ?local_edit.id, ?resolution, "Resolving conflict");

        let token = self.token();
        let chosen = conflict::resolve(local_edit, &server, resolution);
        let saved = self.save(chosen, online).await?;
        if self.state.lock().has_conflict() {
            self.dispatch(&token, Action::ConflictResolved);
        }
        Ok(Some(saved))
    }

    // ------------------------------------------------------------------
    // Owner groups
    // ------------------------------------------------------------------

    /// List owner groups, falling back to the cached list when offline.
    pub async fn fetch_owner_groups(&self, online: bool) -> Vec<String> {
        let token = self.token();
        self.dispatch(&token, Action::OwnersStarted);

        let result = if online {
            self.remote.list_owner_groups().await
        } else {
            Err(Error::Offline)
        };

        let groups = match result {
            Ok(groups) => {
                if let Err(e) = self.cache.put_owner_groups(&groups).await {
                    tracing::warn!(error = %e, "Failed to cache owner groups");
                }
                groups
            }
            Err(error) => {
                tracing::warn!(error = %error, "Owner groups unavailable, using cache");
                self.dispatch(&token, Action::OwnersFailed { error });
                self.cache.load_owner_groups().await.unwrap_or_else(|e| {
                    tracing::warn!(error = %e, "Failed to read cached owner groups");
                    Vec::new()
                })
            }
        };

        self.dispatch(
            &token,
            Action::OwnersSucceeded {
                groups: groups.clone(),
            },
        );
        groups
    }

    // ------------------------------------------------------------------
    // Push
    // ------------------------------------------------------------------

    /// Handle a message from the push channel according to the configured
    /// [`PushPolicy`](crate::PushPolicy). Returns whether state changed.
    pub async fn handle_push(&self, message: PushMessage) -> bool {
        tracing::info!(
            event = ?message.event,
            id = ?message.payload.id,
            version = message.payload.version,
            "Push message received"
        );
        let token = self.token();
        let visible = message
            .payload
            .id
            .and_then(|id| self.state.lock().get(id).cloned());

        let Some(action) = self
            .config
            .push_policy
            .decide(&message, visible.as_ref())
        else {
            return false;
        };

        if let Action::PushApplied { record, removed } = &action {
            if let Some(id) = record.id {
                match self.cache.load_id(id).await {
                    Ok(Some(local)) if local.status.is_pending() => {
                        tracing::debug!(id, status = ?local.status, "Push ignored, local edit pending");
                        return false;
                    }
                    Ok(_) => {}
                    Err(e) => tracing::warn!(id, error = %e, "Failed to read cached record"),
                }
            }
            let persisted = match (removed, record.id) {
                (true, Some(id)) => self.cache.evict(id).await,
                _ => self.cache.put(record).await,
            };
            if let Err(e) = persisted {
                tracing::warn!(error = %e, "Failed to cache pushed record");
            }
        }
        self.dispatch(&token, action)
    }

    pub(crate) fn token(&self) -> CancelToken {
        self.cancel.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{EventKind, MemoryStore, MockRemote};

    fn controller() -> (Arc<MockRemote>, Arc<MemoryStore>, SyncController) {
        let remote = MockRemote::new_shared();
        let store = MemoryStore::new_shared();
        let controller = SyncController::new(
            remote.clone(),
            store.clone(),
            "u1",
            SyncConfig::default(),
        );
        (remote, store, controller)
    }

    fn record_kinds(controller: &SyncController) -> Arc<Mutex<Vec<EventKind>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        controller.subscribe(move |action| sink.lock().push(action.kind()));
        seen
    }

    #[tokio::test]
    async fn cancel_token_wakes_waiters() {
        let token = CancelToken::new();
        let waiter = {
            let token = token.clone();
            tokio::spawn(async move { token.cancelled().await })
        };
        tokio::task::yield_now().await;
        token.cancel();
        waiter.await.unwrap();
        assert!(token.is_cancelled());

        // Already cancelled: returns immediately.
        token.cancelled().await;
    }

    #[tokio::test]
    async fn online_save_event_order() {
        let (_, _, controller) = controller();
        let seen = record_kinds(&controller);

        controller
            .save(Record::draft("Ori").with_user_id("u1"), true)
            .await
            .unwrap();

        assert_eq!(
            *seen.lock(),
            vec![EventKind::SaveStarted, EventKind::SaveSucceeded]
        );
    }

    #[tokio::test]
    async fn rejected_save_surfaces_error_without_queueing() {
        let (remote, store, controller) = controller();
        let stored = remote.seed(Record::draft("Limbo").with_version(5));

        let stale = stored.with_version(5);
        let err = controller.save(stale, true).await.unwrap_err();

        assert!(matches!(err, Error::Rejected { status: 409, .. }));
        let state = controller.state();
        assert_eq!(state.saving_error, Some(err));
        assert!(!state.saving);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn dispatch_after_teardown_is_dropped() {
        let (_, _, controller) = controller();
        let seen = record_kinds(&controller);
        controller.teardown();

        let applied = controller.dispatch(&controller.token(), Action::SaveStarted);
        assert!(!applied);
        assert!(!controller.state().saving);
        assert!(seen.lock().is_empty());
        assert!(controller.is_torn_down());
    }

    #[tokio::test]
    async fn next_page_stops_after_short_page() {
        let (remote, _, controller) = controller();
        for i in 0..3 {
            remote.seed(Record::draft(format!("g{}", i)).with_user_id("u1"));
        }
        assert_eq!(controller.refresh("", "", true).await, 3);
        assert!(!controller.state().more_pages);

        let calls_before = remote.calls().len();
        assert_eq!(controller.next_page("", "", true).await, 0);
        assert_eq!(remote.calls().len(), calls_before);
    }

    #[tokio::test]
    async fn owner_groups_cached_for_offline() {
        let (remote, _, controller) = controller();
        remote.set_owner_groups(vec!["0 .. 20000".into(), "20000 .. 50000".into()]);

        let online = controller.fetch_owner_groups(true).await;
        assert_eq!(online.len(), 2);

        let offline = controller.fetch_owner_groups(false).await;
        assert_eq!(offline, online);
        let state = controller.state();
        assert_eq!(state.owner_groups, online);
        assert_eq!(state.fetching_owners_error, Some(Error::Offline));
        assert!(!state.fetching_owners);
    }

    #[tokio::test]
    async fn offline_edit_records_base_version() {
        let (remote, store, controller) = controller();
        remote.seed(Record::draft("Gris").with_user_id("u1").with_version(3));
        controller.refresh("", "", true).await;

        let edit = controller.state().records[0].clone().with_version(4);
        let pending = controller.save(edit, false).await.unwrap();
        assert_eq!(pending.status, SyncStatus::PendingUpdate);
        assert_eq!(pending.base_version, Some(3));

        let raw = store.get("1").await.unwrap().unwrap();
        assert_eq!(Record::from_json(&raw).unwrap(), pending);
    }

    #[tokio::test]
    async fn fetch_keeps_pending_local_copies() {
        let (remote, _, controller) = controller();
        remote.seed(Record::draft("Tunic").with_user_id("u1").with_version(1));
        remote.seed(Record::draft("Inside").with_user_id("u1").with_version(1));
        controller.refresh("", "", true).await;

        let state = controller.state();
        let edited = state.records[0].clone().with_version(2);
        controller.save(edited, false).await.unwrap();
        controller
            .delete(state.records[1].clone(), false)
            .await
            .unwrap();

        assert_eq!(controller.refresh("", "", true).await, 2);
        let state = controller.state();
        assert_eq!(state.records.len(), 1);
        assert_eq!(state.records[0].status, SyncStatus::PendingUpdate);
        assert_eq!(state.records[0].version, 2);
    }

    #[tokio::test]
    async fn push_log_only_leaves_state_alone() {
        let (_, _, controller) = controller();
        let message = PushMessage {
            event: crate::PushEvent::Created,
            payload: Record::draft("Echo").with_id(8).with_status(SyncStatus::Synced),
        };
        assert!(!controller.handle_push(message).await);
        assert!(controller.state().records.is_empty());
    }
}
