//! Realtime reconciliation
//!
//! Change events are treated as "something changed": each one triggers a
//! full [`refresh`](CollectionStore::refresh) rather than patching the
//! store from the event payload. An event arriving while a fetch is in
//! flight gets one more fetch after it, and events queued up meanwhile are
//! folded into that fetch.

use tokio::task::JoinHandle;

use crate::remote::Subscription;
use crate::store::{CollectionStore, Record};

/// Refresh `store` on every event of `subscription`
///
/// The task ends when the store is torn down or the subscription closes.
pub fn watch_changes<T: Record>(store: CollectionStore<T>, mut subscription: Subscription) -> JoinHandle<()> {
    tokio::spawn(async move {
        let collection = subscription.collection();
        tracing::debug!(%collection, "Watching changes");

        loop {
            let event = tokio::select! {
                _ = store.closed() => break,
                event = subscription.next() => event,
            };
            let Some(event) = event else {
                tracing::debug!(%collection, "Change subscription closed");
                break;
            };

            tracing::debug!(%collection, kind = %event.kind, record_id = ?event.record_id, "Change received");
            let folded = subscription.drain();
            if folded > 0 {
                tracing::debug!(%collection, folded, "Folding queued changes into one refresh");
            }
            store.refresh_latest().await;
        }
    })
}
