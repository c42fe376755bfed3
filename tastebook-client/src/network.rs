//! Connectivity signal
//!
//! The platform reports online/offline transitions through [`NetworkStatus`].
//! Transports consult it before sending (failing fast with
//! [`ClientError::Offline`](crate::ClientError::Offline)), and the
//! connectivity monitor reacts to transitions.

use std::sync::Arc;
use tokio::sync::watch;

/// Shared online/offline flag
#[derive(Debug, Clone)]
pub struct NetworkStatus {
    tx: Arc<watch::Sender<bool>>,
}

impl NetworkStatus {
    /// Starts online
    pub fn new() -> Self {
        let (tx, _) = watch::channel(true);
        Self { tx: Arc::new(tx) }
    }

    pub fn is_online(&self) -> bool {
        *self.tx.borrow()
    }

    /// Record a platform transition; repeated values are not re-broadcast
    pub fn set_online(&self, online: bool) {
        let changed = self.tx.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });
        if changed {
            tracing::info!(online, "Network status changed");
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

impl Default for NetworkStatus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_transitions_are_observed_once() {
        let status = NetworkStatus::new();
        let mut rx = status.subscribe();
        assert!(status.is_online());

        status.set_online(false);
        status.set_online(false);
        rx.changed().await.unwrap();
        assert!(!*rx.borrow_and_update());
        assert!(!rx.has_changed().unwrap());

        status.set_online(true);
        assert!(rx.has_changed().unwrap());
        assert!(status.is_online());
    }
}
