//! Connectivity monitor
//!
//! Watches [`NetworkStatus`] transitions. Coming back online reconciles
//! every registered store; going offline records an offline error on them
//! so views can say why their data is stale.

use futures::future::join_all;
use shared::Collection;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::network::NetworkStatus;
use crate::store::{Reconcile, RefreshOutcome};

/// Reacts to online/offline transitions on behalf of registered stores
#[derive(Clone)]
pub struct ConnectivityMonitor {
    network: NetworkStatus,
    stores: Arc<Mutex<Vec<Arc<dyn Reconcile>>>>,
    shutdown: CancellationToken,
}

impl ConnectivityMonitor {
    pub fn new(network: NetworkStatus) -> Self {
        Self {
            network,
            stores: Arc::new(Mutex::new(Vec::new())),
            shutdown: CancellationToken::new(),
        }
    }

    /// Track a store; torn-down stores are dropped on the next transition
    pub fn register(&self, store: Arc<dyn Reconcile>) {
        self.stores
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(store);
    }

    pub fn registered(&self) -> usize {
        self.live_stores().len()
    }

    fn live_stores(&self) -> Vec<Arc<dyn Reconcile>> {
        let mut stores = self.stores.lock().unwrap_or_else(PoisonError::into_inner);
        stores.retain(|store| store.is_alive());
        stores.clone()
    }

    /// Refresh every live store concurrently
    pub async fn reconcile_all(&self) -> Vec<(Collection, RefreshOutcome)> {
        let stores = self.live_stores();
        let outcomes = join_all(stores.iter().map(|store| store.reconcile())).await;
        stores
            .iter()
            .map(|store| store.collection())
            .zip(outcomes)
            .collect()
    }

    /// Flag every live store as offline
    pub fn mark_all_offline(&self) {
        for store in self.live_stores() {
            store.mark_offline();
        }
    }

    /// Run the transition loop until [`shutdown`](Self::shutdown)
    pub fn spawn(&self) -> JoinHandle<()> {
        let monitor = self.clone();
        let rx = self.network.subscribe();
        tokio::spawn(async move { monitor.run(rx).await })
    }

    async fn run(self, mut rx: watch::Receiver<bool>) {
        tracing::info!("Connectivity monitor started");

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                changed = rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }

            let online = *rx.borrow_and_update();
            if online {
                let outcomes = self.reconcile_all().await;
                let failed = outcomes
                    .iter()
                    .filter(|(_, outcome)| matches!(outcome, RefreshOutcome::Failed(_)))
                    .count();
                tracing::info!(stores = outcomes.len(), failed, "Back online, stores reconciled");
            } else {
                self.mark_all_offline();
                tracing::info!("Offline, stores flagged");
            }
        }

        tracing::info!("Connectivity monitor stopped");
    }

    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Default)]
    struct RecordingStore {
        reconciled: AtomicUsize,
        offline: AtomicBool,
        dead: AtomicBool,
    }

    #[async_trait]
    impl Reconcile for RecordingStore {
        fn collection(&self) -> Collection {
            Collection::Cities
        }

        fn is_alive(&self) -> bool {
            !self.dead.load(Ordering::SeqCst)
        }

        async fn reconcile(&self) -> RefreshOutcome {
            self.reconciled.fetch_add(1, Ordering::SeqCst);
            self.offline.store(false, Ordering::SeqCst);
            RefreshOutcome::Applied { count: 0 }
        }

        fn mark_offline(&self) {
            self.offline.store(true, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_transitions_drive_registered_stores() {
        let network = NetworkStatus::new();
        let monitor = ConnectivityMonitor::new(network.clone());
        let a = Arc::new(RecordingStore::default());
        let b = Arc::new(RecordingStore::default());
        monitor.register(a.clone());
        monitor.register(b.clone());
        let handle = monitor.spawn();
        tokio::task::yield_now().await;

        network.set_online(false);
        while !a.offline.load(Ordering::SeqCst) || !b.offline.load(Ordering::SeqCst) {
            tokio::task::yield_now().await;
        }

        b.dead.store(true, Ordering::SeqCst);
        network.set_online(true);
        while a.reconciled.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }
        assert!(!a.offline.load(Ordering::SeqCst));
        assert_eq!(b.reconciled.load(Ordering::SeqCst), 0);
        assert_eq!(monitor.registered(), 1);

        monitor.shutdown();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_reconcile_all_reports_per_store() {
        let monitor = ConnectivityMonitor::new(NetworkStatus::new());
        monitor.register(Arc::new(RecordingStore::default()));

        let outcomes = monitor.reconcile_all().await;
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].0, Collection::Cities);
        assert!(outcomes[0].1.is_applied());
    }
}
