//! In-process backend
//!
//! Keeps every table as a list of JSON rows behind a mutex and mimics the
//! hosted backend closely enough for tests and offline demos: generated
//! ids and timestamps, password auth with rotating tokens, and change
//! events on every write. Faults and latency can be injected per operation.

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, SecondsFormat, Utc};
use serde_json::{Value, json};
use shared::{ChangeEvent, ChangeKind, Collection, RecordId, UserId};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::broadcast;
use uuid::Uuid;

use super::{AuthSession, AuthUser, Credentials, Filter, RemoteStore, Subscription, UserAttributes};
use crate::error::{ClientError, ClientResult};
use crate::network::NetworkStatus;

const EVENT_CAPACITY: usize = 256;
const SESSION_TTL_SECS: i64 = 3600;

/// Backend operations, used to target faults and count calls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemoryOp {
    Authenticate,
    RefreshSession,
    UpdateUser,
    SignOut,
    Query,
    Insert,
    Update,
    Delete,
}

/// Injected failure for the next call of an operation
#[derive(Debug, Clone)]
pub enum Fault {
    /// Never completes; only the caller's timeout ends it
    Hang,
    Offline,
    /// HTTP status with a generic message
    Status(u16),
    /// Database error code
    BackendCode(String),
    /// Transport failure text
    Network(String),
}

impl Fault {
    fn into_error(self) -> ClientError {
        match self {
            Fault::Hang => ClientError::Internal("hang fault has no error".to_string()),
            Fault::Offline => ClientError::Offline,
            Fault::Status(status) => ClientError::Status {
                status,
                message: format!("injected status {status}"),
            },
            Fault::BackendCode(code) => ClientError::Backend {
                message: format!("injected backend code {code}"),
                code,
            },
            Fault::Network(message) => ClientError::Network(message),
        }
    }
}

#[derive(Debug)]
struct MemoryUser {
    id: UserId,
    email: String,
    password: String,
}

#[derive(Debug, Default)]
struct MemoryState {
    tables: HashMap<Collection, Vec<Value>>,
    next_id: RecordId,
    users: Vec<MemoryUser>,
    session: Option<AuthSession>,
    faults: HashMap<MemoryOp, VecDeque<Fault>>,
    calls: HashMap<MemoryOp, usize>,
    queries: HashMap<Collection, usize>,
    latency: Duration,
}

/// In-memory [`RemoteStore`]
#[derive(Debug, Clone)]
pub struct MemoryBackend {
    state: Arc<Mutex<MemoryState>>,
    events: broadcast::Sender<ChangeEvent>,
    network: NetworkStatus,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::with_network(NetworkStatus::new())
    }

    /// Share a connectivity flag with the rest of the client
    pub fn with_network(network: NetworkStatus) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            state: Arc::new(Mutex::new(MemoryState {
                next_id: 1,
                ..Default::default()
            })),
            events,
            network,
        }
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ========== Test and demo helpers ==========

    /// Create an auth user together with its profile row
    pub fn register_user(&self, email: &str, password: &str, username: &str) -> UserId {
        let id = Uuid::new_v4();
        let mut state = self.lock();
        state.users.push(MemoryUser {
            id,
            email: email.to_string(),
            password: password.to_string(),
        });
        state.tables.entry(Collection::Profiles).or_default().push(json!({
            "id": id,
            "username": username,
            "display_name": null,
            "avatar_url": null,
            "is_admin": false,
            "created_at": now_string(),
        }));
        id
    }

    /// Flip the admin flag on a profile
    pub fn set_admin(&self, user_id: UserId, is_admin: bool) {
        let mut state = self.lock();
        let id = Value::String(user_id.to_string());
        if let Some(profile) = state
            .tables
            .entry(Collection::Profiles)
            .or_default()
            .iter_mut()
            .find(|row| row.get("id") == Some(&id))
            && let Some(obj) = profile.as_object_mut()
        {
            obj.insert("is_admin".to_string(), Value::Bool(is_admin));
        }
    }

    /// Insert rows directly, bypassing faults, counters and events.
    /// Rows without an `id` get a generated one.
    pub fn seed(&self, collection: Collection, rows: impl IntoIterator<Item = Value>) {
        let mut state = self.lock();
        for row in rows {
            let row = state.prepare_row(row);
            state.tables.entry(collection).or_default().push(row);
        }
    }

    /// Snapshot of a table
    pub fn rows(&self, collection: Collection) -> Vec<Value> {
        self.lock().tables.get(&collection).cloned().unwrap_or_default()
    }

    /// Queue a fault for the next call of `op`
    pub fn push_fault(&self, op: MemoryOp, fault: Fault) {
        self.lock().faults.entry(op).or_default().push_back(fault);
    }

    /// Delay applied to every call
    pub fn set_latency(&self, latency: Duration) {
        self.lock().latency = latency;
    }

    /// Calls of `op` so far (faulted ones included)
    pub fn calls(&self, op: MemoryOp) -> usize {
        self.lock().calls.get(&op).copied().unwrap_or(0)
    }

    /// Queries issued against `collection`
    pub fn queries(&self, collection: Collection) -> usize {
        self.lock().queries.get(&collection).copied().unwrap_or(0)
    }

    pub fn current_session(&self) -> Option<AuthSession> {
        self.lock().session.clone()
    }

    pub fn network(&self) -> &NetworkStatus {
        &self.network
    }

    // ========== Internals ==========

    /// Count the call, then apply connectivity, latency and any queued fault
    async fn enter(&self, op: MemoryOp) -> ClientResult<()> {
        let (fault, latency) = {
            let mut state = self.lock();
            *state.calls.entry(op).or_default() += 1;
            let fault = state.faults.get_mut(&op).and_then(VecDeque::pop_front);
            (fault, state.latency)
        };

        if !self.network.is_online() {
            return Err(ClientError::Offline);
        }
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        match fault {
            Some(Fault::Hang) => {
                std::future::pending::<()>().await;
                Ok(())
            }
            Some(fault) => Err(fault.into_error()),
            None => Ok(()),
        }
    }

    fn emit(&self, event: ChangeEvent) {
        // No receivers is fine
        let _ = self.events.send(event);
    }

    fn new_session(user: &MemoryUser) -> AuthSession {
        AuthSession {
            access_token: Uuid::new_v4().to_string(),
            refresh_token: Uuid::new_v4().to_string(),
            expires_at: Utc::now() + ChronoDuration::seconds(SESSION_TTL_SECS),
            user: AuthUser {
                id: user.id,
                email: user.email.clone(),
            },
        }
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryState {
    fn prepare_row(&mut self, mut row: Value) -> Value {
        if let Some(obj) = row.as_object_mut() {
            if obj.get("id").is_none_or(Value::is_null) {
                obj.insert("id".to_string(), json!(self.next_id));
                self.next_id += 1;
            } else if let Some(id) = obj.get("id").and_then(Value::as_i64) {
                self.next_id = self.next_id.max(id + 1);
            }
            if obj.get("created_at").is_none_or(Value::is_null) {
                obj.insert("created_at".to_string(), json!(now_string()));
            }
        }
        row
    }
}

fn now_string() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn row_id(row: &Value) -> Option<RecordId> {
    row.get("id").and_then(Value::as_i64)
}

#[async_trait]
impl RemoteStore for MemoryBackend {
    async fn authenticate(&self, credentials: &Credentials) -> ClientResult<AuthSession> {
        self.enter(MemoryOp::Authenticate).await?;
        let mut state = self.lock();
        let session = state
            .users
            .iter()
            .find(|u| {
                u.email.eq_ignore_ascii_case(&credentials.email) && u.password == credentials.password
            })
            .map(Self::new_session)
            .ok_or(ClientError::Unauthorized)?;
        state.session = Some(session.clone());
        Ok(session)
    }

    async fn refresh_session(&self, refresh_token: &str) -> ClientResult<AuthSession> {
        self.enter(MemoryOp::RefreshSession).await?;
        let mut state = self.lock();
        let user_id = match &state.session {
            Some(session) if session.refresh_token == refresh_token => session.user.id,
            _ => return Err(ClientError::Unauthorized),
        };
        let session = state
            .users
            .iter()
            .find(|u| u.id == user_id)
            .map(Self::new_session)
            .ok_or(ClientError::Unauthorized)?;
        state.session = Some(session.clone());
        Ok(session)
    }

    async fn update_user(&self, attributes: &UserAttributes) -> ClientResult<()> {
        self.enter(MemoryOp::UpdateUser).await?;
        let mut state = self.lock();
        let user_id = state
            .session
            .as_ref()
            .map(|s| s.user.id)
            .ok_or(ClientError::Unauthorized)?;
        let user = state
            .users
            .iter_mut()
            .find(|u| u.id == user_id)
            .ok_or(ClientError::Unauthorized)?;
        if let Some(password) = &attributes.password {
            user.password = password.clone();
        }
        if let Some(email) = &attributes.email {
            user.email = email.clone();
        }
        Ok(())
    }

    async fn sign_out(&self) -> ClientResult<()> {
        self.enter(MemoryOp::SignOut).await?;
        self.lock().session = None;
        Ok(())
    }

    async fn query(&self, collection: Collection, filter: &Filter) -> ClientResult<Vec<Value>> {
        self.enter(MemoryOp::Query).await?;
        let mut state = self.lock();
        *state.queries.entry(collection).or_default() += 1;
        let rows = state.tables.get(&collection).map(Vec::as_slice).unwrap_or(&[]);
        Ok(filter.apply(rows))
    }

    async fn insert(&self, collection: Collection, record: Value) -> ClientResult<Value> {
        self.enter(MemoryOp::Insert).await?;
        if !record.is_object() {
            return Err(ClientError::validation("record must be an object"));
        }
        let row = {
            let mut state = self.lock();
            let row = state.prepare_row(record);
            state.tables.entry(collection).or_default().push(row.clone());
            row
        };
        self.emit(ChangeEvent::new(collection, ChangeKind::Insert).with_record(row.clone()));
        Ok(row)
    }

    async fn update(&self, collection: Collection, id: RecordId, patch: Value) -> ClientResult<Value> {
        self.enter(MemoryOp::Update).await?;
        let Value::Object(fields) = patch else {
            return Err(ClientError::validation("patch must be an object"));
        };
        let row = {
            let mut state = self.lock();
            let row = state
                .tables
                .get_mut(&collection)
                .and_then(|rows| rows.iter_mut().find(|r| row_id(r) == Some(id)))
                .ok_or_else(|| ClientError::not_found(format!("{collection} {id}")))?;
            if let Some(obj) = row.as_object_mut() {
                for (key, value) in fields {
                    if key != "id" {
                        obj.insert(key, value);
                    }
                }
            }
            row.clone()
        };
        self.emit(ChangeEvent::new(collection, ChangeKind::Update).with_record(row.clone()));
        Ok(row)
    }

    async fn delete(&self, collection: Collection, id: RecordId) -> ClientResult<()> {
        self.enter(MemoryOp::Delete).await?;
        let removed = {
            let mut state = self.lock();
            let rows = state.tables.entry(collection).or_default();
            let before = rows.len();
            rows.retain(|r| row_id(r) != Some(id));
            rows.len() != before
        };
        if removed {
            self.emit(ChangeEvent::new(collection, ChangeKind::Delete).with_record_id(id));
        }
        Ok(())
    }

    fn subscribe(&self, collection: Collection, kinds: &[ChangeKind]) -> ClientResult<Subscription> {
        Ok(Subscription::new(collection, kinds, self.events.subscribe()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_insert_assigns_id_and_timestamp() {
        let backend = MemoryBackend::new();
        let row = backend
            .insert(Collection::Cities, json!({"name": "Lisbon"}))
            .await
            .unwrap();
        assert_eq!(row["id"], 1);
        assert!(row["created_at"].is_string());

        let second = backend
            .insert(Collection::Cities, json!({"name": "Porto"}))
            .await
            .unwrap();
        assert_eq!(second["id"], 2);
    }

    #[tokio::test]
    async fn test_update_merges_and_delete_removes() {
        let backend = MemoryBackend::new();
        backend.seed(Collection::Cities, [json!({"id": 10, "name": "Lisbon", "country": null})]);

        let updated = backend
            .update(Collection::Cities, 10, json!({"country": "PT"}))
            .await
            .unwrap();
        assert_eq!(updated["name"], "Lisbon");
        assert_eq!(updated["country"], "PT");

        let missing = backend.update(Collection::Cities, 99, json!({"name": "x"})).await;
        assert!(matches!(missing, Err(ClientError::NotFound(_))));

        backend.delete(Collection::Cities, 10).await.unwrap();
        assert!(backend.rows(Collection::Cities).is_empty());
    }

    #[tokio::test]
    async fn test_auth_round() {
        let backend = MemoryBackend::new();
        let user_id = backend.register_user("ana@example.com", "secret-1", "ana");

        let bad = backend
            .authenticate(&Credentials::new("ana@example.com", "nope"))
            .await;
        assert!(matches!(bad, Err(ClientError::Unauthorized)));

        let session = backend
            .authenticate(&Credentials::new("ana@example.com", "secret-1"))
            .await
            .unwrap();
        assert_eq!(session.user.id, user_id);

        let refreshed = backend.refresh_session(&session.refresh_token).await.unwrap();
        assert_ne!(refreshed.access_token, session.access_token);
        assert!(backend.refresh_session(&session.refresh_token).await.is_err());
    }

    #[tokio::test]
    async fn test_faults_are_consumed_in_order() {
        let backend = MemoryBackend::new();
        backend.push_fault(MemoryOp::Query, Fault::Status(503));

        let first = backend.query(Collection::Cities, &Filter::new()).await;
        assert!(matches!(first, Err(ClientError::Status { status: 503, .. })));
        assert!(backend.query(Collection::Cities, &Filter::new()).await.is_ok());
        assert_eq!(backend.calls(MemoryOp::Query), 2);
        assert_eq!(backend.queries(Collection::Cities), 1);
    }

    #[tokio::test]
    async fn test_offline_rejects_calls() {
        let backend = MemoryBackend::new();
        backend.network().set_online(false);
        let result = backend.query(Collection::Cities, &Filter::new()).await;
        assert!(matches!(result, Err(ClientError::Offline)));
    }

    #[tokio::test]
    async fn test_writes_emit_change_events() {
        let backend = MemoryBackend::new();
        let mut sub = backend
            .subscribe(Collection::Restaurants, &ChangeKind::ALL)
            .unwrap();

        backend
            .insert(Collection::Restaurants, json!({"name": "Noma"}))
            .await
            .unwrap();
        let event = sub.next().await.unwrap();
        assert_eq!(event.kind, ChangeKind::Insert);
        assert_eq!(event.record_id, Some(1));
    }
}
