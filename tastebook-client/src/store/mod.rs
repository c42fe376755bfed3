//! Local reconciliation store
//!
//! A [`CollectionStore`] mirrors one collection for one view. It is
//! refreshed wholesale from a [`CollectionSource`] and patched locally
//! after successful remote writes, so the view updates without another
//! round trip. Subscribers see every change through a `watch` channel of
//! [`CollectionSnapshot`]s.
//!
//! Two guards keep stale data out:
//! - a liveness flag, cleared by [`CollectionStore::teardown`]; nothing is
//!   applied once it is down
//! - a fetch state machine: at most one fetch per store, and a result is
//!   applied only if it belongs to the most recently started fetch

mod query;
mod record;
mod source;

pub use query::{AttributeFilters, CollectionQuery, OwnerKey, SortKey};
pub use record::Record;
pub use source::{CollectionSource, RemoteCollection};

use async_trait::async_trait;
use shared::{Collection, Profile, RecordId};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::error::ClientError;
use crate::retry::RetryExecutor;

/// Who may mutate a store locally
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreAccess {
    /// Viewing someone else's collection
    ReadOnly,
    /// The viewer owns the collection's writes
    Owner,
}

impl StoreAccess {
    /// Owner of a user collection, or an admin viewing a shared one
    pub fn resolve(owner: &OwnerKey, viewer: Option<&Profile>) -> Self {
        match (owner, viewer) {
            (OwnerKey::User(id), Some(profile)) if *id == profile.id => StoreAccess::Owner,
            (OwnerKey::Shared, Some(profile)) if profile.is_admin => StoreAccess::Owner,
            _ => StoreAccess::ReadOnly,
        }
    }
}

/// What a view renders
#[derive(Debug, Clone)]
pub struct CollectionSnapshot<T> {
    pub items: Vec<T>,
    pub loading: bool,
    pub last_error: Option<Arc<ClientError>>,
    pub total_count: usize,
}

impl<T> CollectionSnapshot<T> {
    pub fn has_results(&self) -> bool {
        self.total_count > 0
    }
}

impl<T> Default for CollectionSnapshot<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            loading: false,
            last_error: None,
            total_count: 0,
        }
    }
}

/// Result of a [`CollectionStore::refresh`] call
#[derive(Debug, Clone)]
pub enum RefreshOutcome {
    /// Fetched and applied
    Applied { count: usize },
    /// A fetch was already in flight; this request was dropped
    Skipped,
    /// The fetch finished but was superseded, cancelled, or torn down
    Discarded,
    /// Fetch failed after retries; recorded as the store's last error
    Failed(Arc<ClientError>),
    /// The store was torn down before the call
    Detached,
}

impl RefreshOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, RefreshOutcome::Applied { .. })
    }
}

#[derive(Debug)]
enum FetchState {
    Idle,
    Fetching {
        generation: u64,
        cancel: CancellationToken,
    },
}

struct StoreState<T> {
    items: Vec<T>,
    total_count: usize,
    loading: bool,
    last_error: Option<Arc<ClientError>>,
    alive: bool,
    fetch: FetchState,
    generation: u64,
    query: CollectionQuery,
    access: StoreAccess,
}

impl<T: Clone> StoreState<T> {
    fn snapshot(&self) -> CollectionSnapshot<T> {
        CollectionSnapshot {
            items: self.items.clone(),
            loading: self.loading,
            last_error: self.last_error.clone(),
            total_count: self.total_count,
        }
    }

    /// Drop the in-flight fetch, cancelling it
    fn abandon_fetch(&mut self) -> bool {
        match std::mem::replace(&mut self.fetch, FetchState::Idle) {
            FetchState::Fetching { cancel, .. } => {
                cancel.cancel();
                self.loading = false;
                true
            }
            FetchState::Idle => false,
        }
    }
}

struct StoreInner<T> {
    source: Arc<dyn CollectionSource<T>>,
    executor: RetryExecutor,
    state: Mutex<StoreState<T>>,
    snapshots: watch::Sender<CollectionSnapshot<T>>,
    shutdown: CancellationToken,
    fetches: AtomicU64,
}

/// Per-view mirror of one collection
pub struct CollectionStore<T: Record> {
    inner: Arc<StoreInner<T>>,
}

impl<T: Record> Clone for CollectionStore<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Record> std::fmt::Debug for CollectionStore<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("CollectionStore")
            .field("collection", &T::COLLECTION)
            .field("items", &state.items.len())
            .field("alive", &state.alive)
            .field("fetch", &state.fetch)
            .finish()
    }
}

impl<T: Record> CollectionStore<T> {
    pub fn new(
        source: Arc<dyn CollectionSource<T>>,
        query: CollectionQuery,
        access: StoreAccess,
        executor: RetryExecutor,
    ) -> Self {
        let (snapshots, _) = watch::channel(CollectionSnapshot::default());
        Self {
            inner: Arc::new(StoreInner {
                source,
                executor,
                state: Mutex::new(StoreState {
                    items: Vec::new(),
                    total_count: 0,
                    loading: false,
                    last_error: None,
                    alive: true,
                    fetch: FetchState::Idle,
                    generation: 0,
                    query,
                    access,
                }),
                snapshots,
                shutdown: CancellationToken::new(),
                fetches: AtomicU64::new(0),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, StoreState<T>> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, state: &StoreState<T>) {
        self.inner.snapshots.send_replace(state.snapshot());
    }

    pub fn collection(&self) -> Collection {
        T::COLLECTION
    }

    // ========== Reads ==========

    pub fn snapshot(&self) -> CollectionSnapshot<T> {
        self.lock().snapshot()
    }

    /// Watch every published snapshot
    pub fn subscribe(&self) -> watch::Receiver<CollectionSnapshot<T>> {
        self.inner.snapshots.subscribe()
    }

    pub fn items(&self) -> Vec<T> {
        self.lock().items.clone()
    }

    pub fn get(&self, id: RecordId) -> Option<T> {
        self.lock().items.iter().find(|item| item.id() == id).cloned()
    }

    pub fn total_count(&self) -> usize {
        self.lock().total_count
    }

    pub fn has_results(&self) -> bool {
        self.lock().total_count > 0
    }

    pub fn is_loading(&self) -> bool {
        self.lock().loading
    }

    pub fn last_error(&self) -> Option<Arc<ClientError>> {
        self.lock().last_error.clone()
    }

    pub fn query(&self) -> CollectionQuery {
        self.lock().query.clone()
    }

    pub fn access(&self) -> StoreAccess {
        self.lock().access
    }

    pub fn is_alive(&self) -> bool {
        self.lock().alive
    }

    pub fn is_fetching(&self) -> bool {
        matches!(self.lock().fetch, FetchState::Fetching { .. })
    }

    /// Fetches started over the store's lifetime
    pub fn fetch_count(&self) -> u64 {
        self.inner.fetches.load(Ordering::SeqCst)
    }

    /// Resolves once the store is torn down
    pub async fn closed(&self) {
        self.inner.shutdown.cancelled().await;
    }

    /// Wait until no fetch is in flight (or the store is torn down)
    pub async fn wait_idle(&self) {
        let mut rx = self.subscribe();
        tokio::select! {
            _ = rx.wait_for(|snapshot| !snapshot.loading) => {}
            _ = self.inner.shutdown.cancelled() => {}
        }
    }

    // ========== Refresh ==========

    /// Fetch the whole collection and replace the local sequence
    ///
    /// Dropped when a fetch is already in flight. The result is applied
    /// only while the store is alive and the fetch is still current.
    pub async fn refresh(&self) -> RefreshOutcome {
        let (generation, cancel, query) = {
            let mut state = self.lock();
            if !state.alive {
                return RefreshOutcome::Detached;
            }
            if matches!(state.fetch, FetchState::Fetching { .. }) {
                tracing::debug!(collection = %T::COLLECTION, "Refresh already in flight, dropping request");
                return RefreshOutcome::Skipped;
            }

            state.generation += 1;
            let generation = state.generation;
            let cancel = self.inner.shutdown.child_token();
            state.fetch = FetchState::Fetching {
                generation,
                cancel: cancel.clone(),
            };
            state.loading = true;
            self.publish(&state);
            (generation, cancel, state.query.clone())
        };
        self.inner.fetches.fetch_add(1, Ordering::SeqCst);

        let source = &self.inner.source;
        let owner = &query.owner;
        let fetched = tokio::select! {
            _ = cancel.cancelled() => None,
            result = self.inner.executor.execute(|| source.fetch_all(owner)) => Some(result),
        };

        let mut state = self.lock();
        let current = matches!(
            &state.fetch,
            FetchState::Fetching { generation: g, .. } if *g == generation
        );
        if !state.alive || !current {
            tracing::debug!(collection = %T::COLLECTION, generation, "Discarding stale fetch result");
            return RefreshOutcome::Discarded;
        }

        // Applying: the lock is held from here until the store is idle again
        state.fetch = FetchState::Idle;
        state.loading = false;
        let outcome = match fetched {
            None => RefreshOutcome::Discarded,
            Some(Ok(items)) => {
                let shaped = query.apply(items);
                let count = shaped.len();
                state.items = shaped;
                state.total_count = count;
                state.last_error = None;
                tracing::debug!(collection = %T::COLLECTION, count, "Refresh applied");
                RefreshOutcome::Applied { count }
            }
            Some(Err(e)) => {
                tracing::warn!(collection = %T::COLLECTION, error = %e, "Refresh failed");
                let e = Arc::new(e);
                state.last_error = Some(e.clone());
                RefreshOutcome::Failed(e)
            }
        };
        self.publish(&state);
        outcome
    }

    /// Refresh, waiting out an in-flight fetch instead of dropping the request
    ///
    /// The fetch already running may have read the backend before the caller
    /// learned of a change, so one more fetch follows it.
    pub async fn refresh_latest(&self) -> RefreshOutcome {
        loop {
            match self.refresh().await {
                RefreshOutcome::Skipped => self.wait_idle().await,
                outcome => return outcome,
            }
        }
    }

    /// Replace the query and access, superseding any in-flight fetch
    pub async fn reconfigure(&self, query: CollectionQuery, access: StoreAccess) -> RefreshOutcome {
        {
            let mut state = self.lock();
            if !state.alive {
                return RefreshOutcome::Detached;
            }
            if state.abandon_fetch() {
                tracing::debug!(collection = %T::COLLECTION, "Query changed, superseding in-flight fetch");
            }
            state.query = query;
            state.access = access;
        }
        self.refresh().await
    }

    pub async fn set_search(&self, text: impl Into<String>) -> RefreshOutcome {
        let (query, access) = self.current_query();
        self.reconfigure(query.with_search(text), access).await
    }

    pub async fn set_sort(&self, sort: SortKey) -> RefreshOutcome {
        let (query, access) = self.current_query();
        self.reconfigure(query.with_sort(sort), access).await
    }

    pub async fn set_filters(&self, filters: AttributeFilters) -> RefreshOutcome {
        let (query, access) = self.current_query();
        self.reconfigure(query.with_filters(filters), access).await
    }

    fn current_query(&self) -> (CollectionQuery, StoreAccess) {
        let state = self.lock();
        (state.query.clone(), state.access)
    }

    // ========== Local mutations ==========

    /// Prepend a record written remotely; returns whether it was applied
    ///
    /// A record already present (a refresh got there first) is replaced in
    /// place and the count is left alone.
    pub fn add_local(&self, item: T) -> bool {
        let mut state = self.lock();
        if !state.alive || state.access != StoreAccess::Owner {
            return false;
        }
        let id = item.id();
        match state.items.iter_mut().find(|existing| existing.id() == id) {
            Some(existing) => *existing = item,
            None => {
                state.items.insert(0, item);
                state.total_count += 1;
            }
        }
        self.publish(&state);
        true
    }

    /// Swap in the backend's copy of a record; false when absent
    pub fn replace_local(&self, item: T) -> bool {
        let mut state = self.lock();
        if !state.alive {
            return false;
        }
        let id = item.id();
        let Some(existing) = state.items.iter_mut().find(|existing| existing.id() == id) else {
            return false;
        };
        *existing = item;
        self.publish(&state);
        true
    }

    /// Merge a patch into the entry with `id`; false when absent
    pub fn update_local(&self, id: RecordId, patch: &T::Patch) -> bool {
        let mut state = self.lock();
        if !state.alive {
            return false;
        }
        let Some(item) = state.items.iter_mut().find(|item| item.id() == id) else {
            return false;
        };
        item.apply_patch(patch);
        self.publish(&state);
        true
    }

    /// Drop the entry with `id`; false when absent
    pub fn remove_local(&self, id: RecordId) -> bool {
        let mut state = self.lock();
        if !state.alive {
            return false;
        }
        let before = state.items.len();
        state.items.retain(|item| item.id() != id);
        if state.items.len() == before {
            return false;
        }
        state.total_count = state.items.len();
        self.publish(&state);
        true
    }

    /// Record an error without touching the items
    pub fn mark_error(&self, error: ClientError) {
        let mut state = self.lock();
        if !state.alive {
            return;
        }
        state.last_error = Some(Arc::new(error));
        self.publish(&state);
    }

    /// Stop applying results and cancel the in-flight fetch
    pub fn teardown(&self) {
        let mut state = self.lock();
        if !state.alive {
            return;
        }
        state.alive = false;
        state.abandon_fetch();
        self.inner.shutdown.cancel();
        tracing::debug!(collection = %T::COLLECTION, "Store torn down");
    }
}

/// A store that can be brought back in line with the backend
///
/// Used by the connectivity monitor to treat stores of different record
/// types uniformly.
#[async_trait]
pub trait Reconcile: Send + Sync {
    fn collection(&self) -> Collection;

    fn is_alive(&self) -> bool;

    async fn reconcile(&self) -> RefreshOutcome;

    fn mark_offline(&self);
}

#[async_trait]
impl<T: Record> Reconcile for CollectionStore<T> {
    fn collection(&self) -> Collection {
        T::COLLECTION
    }

    fn is_alive(&self) -> bool {
        CollectionStore::is_alive(self)
    }

    async fn reconcile(&self) -> RefreshOutcome {
        self.refresh_latest().await
    }

    fn mark_offline(&self) {
        self.mark_error(ClientError::Offline);
    }
}
