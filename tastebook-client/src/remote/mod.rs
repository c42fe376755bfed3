//! Remote data-access layer
//!
//! [`RemoteStore`] is the seam between the client and the hosted backend:
//! auth, row-level CRUD over named tables, and realtime change
//! subscriptions. Rows travel as JSON; typed decoding happens at the call
//! sites through [`decode_rows`] / [`decode_row`].
//!
//! Two implementations ship with the crate:
//! - [`RestBackend`]: reqwest over a PostgREST/GoTrue style HTTP surface
//! - [`MemoryBackend`]: in-process tables, used by tests and demos

mod filter;
pub mod memory;
pub mod rest;

pub use filter::{Condition, Filter, FilterOp};
pub use memory::{Fault, MemoryBackend, MemoryOp};
pub use rest::RestBackend;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared::{ChangeEvent, ChangeKind, Collection, RecordId, UserId};
use tokio::sync::broadcast;

use crate::error::{ClientError, ClientResult};

/// Email / password sign-in
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

/// Authenticated user as reported by the auth provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: UserId,
    pub email: String,
}

/// Live session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthSession {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
    pub user: AuthUser,
}

impl AuthSession {
    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }
}

/// Mutable account attributes
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserAttributes {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

/// Remote backend operations
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Sign in and start a session
    async fn authenticate(&self, credentials: &Credentials) -> ClientResult<AuthSession>;

    /// Exchange a refresh token for a new session
    async fn refresh_session(&self, refresh_token: &str) -> ClientResult<AuthSession>;

    /// Update attributes of the signed-in user
    async fn update_user(&self, attributes: &UserAttributes) -> ClientResult<()>;

    /// End the current session
    async fn sign_out(&self) -> ClientResult<()>;

    /// Rows of `collection` matching `filter`
    async fn query(&self, collection: Collection, filter: &Filter) -> ClientResult<Vec<Value>>;

    /// Insert a row, returning it as stored (generated id, timestamps)
    async fn insert(&self, collection: Collection, record: Value) -> ClientResult<Value>;

    /// Patch the row with `id`, returning the updated row
    async fn update(&self, collection: Collection, id: RecordId, patch: Value) -> ClientResult<Value>;

    /// Delete the row with `id`
    async fn delete(&self, collection: Collection, id: RecordId) -> ClientResult<()>;

    /// Change notifications for `collection`, limited to `kinds`
    fn subscribe(&self, collection: Collection, kinds: &[ChangeKind]) -> ClientResult<Subscription>;
}

/// Realtime change stream for one collection
#[derive(Debug)]
pub struct Subscription {
    collection: Collection,
    kinds: Vec<ChangeKind>,
    receiver: broadcast::Receiver<ChangeEvent>,
}

impl Subscription {
    pub fn new(
        collection: Collection,
        kinds: &[ChangeKind],
        receiver: broadcast::Receiver<ChangeEvent>,
    ) -> Self {
        Self {
            collection,
            kinds: kinds.to_vec(),
            receiver,
        }
    }

    pub fn collection(&self) -> Collection {
        self.collection
    }

    /// Next matching event; `None` once the channel closes.
    ///
    /// If the receiver lagged behind, a synthetic update event is returned
    /// so the consumer reconciles instead of silently missing changes.
    pub async fn next(&mut self) -> Option<ChangeEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event)
                    if event.collection == self.collection && self.kinds.contains(&event.kind) =>
                {
                    return Some(event);
                }
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(collection = %self.collection, skipped, "Change subscription lagged");
                    return Some(ChangeEvent::new(self.collection, ChangeKind::Update));
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Discard matching events already queued; returns how many there were
    pub fn drain(&mut self) -> usize {
        let mut drained = 0;
        loop {
            match self.receiver.try_recv() {
                Ok(event)
                    if event.collection == self.collection && self.kinds.contains(&event.kind) =>
                {
                    drained += 1;
                }
                Ok(_) => continue,
                Err(broadcast::error::TryRecvError::Lagged(_)) => drained += 1,
                Err(_) => return drained,
            }
        }
    }
}

/// Decode a list of rows
pub fn decode_rows<T: DeserializeOwned>(rows: Vec<Value>) -> ClientResult<Vec<T>> {
    rows.into_iter()
        .map(|row| serde_json::from_value(row).map_err(ClientError::from))
        .collect()
}

/// Decode a single row
pub fn decode_row<T: DeserializeOwned>(row: Value) -> ClientResult<T> {
    serde_json::from_value(row).map_err(Into::into)
}

/// Encode a payload as a row object
pub fn encode_row<T: Serialize>(value: &T) -> ClientResult<Value> {
    let row = serde_json::to_value(value)?;
    if !row.is_object() {
        return Err(ClientError::InvalidResponse(
            "row payload must serialize to an object".to_string(),
        ));
    }
    Ok(row)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Row {
        id: i64,
        name: String,
    }

    #[test]
    fn test_decode_rows() {
        let rows = vec![json!({"id": 1, "name": "a"}), json!({"id": 2, "name": "b"})];
        let decoded: Vec<Row> = decode_rows(rows).unwrap();
        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded[1].name, "b");

        let bad: ClientResult<Vec<Row>> = decode_rows(vec![json!({"id": "x"})]);
        assert!(matches!(bad, Err(ClientError::Serialization(_))));
    }

    #[test]
    fn test_encode_row_rejects_scalars() {
        assert!(encode_row(&json!({"a": 1})).is_ok());
        assert!(encode_row(&5).is_err());
    }

    #[tokio::test]
    async fn test_subscription_filters_by_collection_and_kind() {
        let (tx, rx) = broadcast::channel(8);
        let mut sub = Subscription::new(Collection::Restaurants, &[ChangeKind::Insert], rx);

        tx.send(ChangeEvent::new(Collection::Cities, ChangeKind::Insert)).unwrap();
        tx.send(ChangeEvent::new(Collection::Restaurants, ChangeKind::Delete)).unwrap();
        tx.send(ChangeEvent::new(Collection::Restaurants, ChangeKind::Insert).with_record_id(3))
            .unwrap();
        drop(tx);

        let event = sub.next().await.unwrap();
        assert_eq!(event.record_id, Some(3));
        assert!(sub.next().await.is_none());
    }

    #[test]
    fn test_drain_counts_only_matching_queued_events() {
        let (tx, rx) = broadcast::channel(8);
        let mut sub = Subscription::new(Collection::Cities, &ChangeKind::ALL, rx);
        assert_eq!(sub.drain(), 0);

        tx.send(ChangeEvent::new(Collection::Cities, ChangeKind::Insert)).unwrap();
        tx.send(ChangeEvent::new(Collection::Restaurants, ChangeKind::Insert)).unwrap();
        tx.send(ChangeEvent::new(Collection::Cities, ChangeKind::Delete)).unwrap();

        assert_eq!(sub.drain(), 2);
        assert_eq!(sub.drain(), 0);
    }
}
