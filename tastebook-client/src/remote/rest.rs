//! HTTP backend for a PostgREST / GoTrue style service

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use shared::{ChangeEvent, ChangeKind, Collection, RecordId};
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::broadcast;

use super::{AuthSession, AuthUser, Credentials, Filter, RemoteStore, Subscription, UserAttributes};
use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult, TRANSIENT_BACKEND_CODES, TRANSIENT_STATUSES};
use crate::network::NetworkStatus;

const EVENT_CAPACITY: usize = 256;

/// Error body returned by the REST and auth endpoints
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    code: Option<String>,
    message: Option<String>,
    #[serde(alias = "error_description", alias = "msg")]
    description: Option<String>,
}

impl ErrorBody {
    fn text(&self, fallback: &str) -> String {
        self.message
            .clone()
            .or_else(|| self.description.clone())
            .unwrap_or_else(|| fallback.to_string())
    }
}

/// Token endpoint response
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    expires_in: i64,
    user: AuthUser,
}

impl From<TokenResponse> for AuthSession {
    fn from(token: TokenResponse) -> Self {
        Self {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            expires_at: Utc::now() + ChronoDuration::seconds(token.expires_in),
            user: token.user,
        }
    }
}

/// HTTP client for the hosted backend
///
/// Change events are echoed locally after successful writes made through
/// this client; server-pushed events arrive through an external realtime
/// transport that publishes into [`RestBackend::publish_change`].
#[derive(Debug, Clone)]
pub struct RestBackend {
    client: Client,
    base_url: String,
    api_key: String,
    access_token: Arc<RwLock<Option<String>>>,
    network: NetworkStatus,
    events: broadcast::Sender<ChangeEvent>,
}

impl RestBackend {
    /// Create a new backend from configuration
    pub fn new(config: &ClientConfig, network: NetworkStatus) -> ClientResult<Self> {
        let client = Client::builder()
            .timeout(config.retry.timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| ClientError::Config(format!("failed to build HTTP client: {e}")))?;
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Ok(Self {
            client,
            base_url: config.api_base().to_string(),
            api_key: config.anon_key.clone(),
            access_token: Arc::new(RwLock::new(None)),
            network,
            events,
        })
    }

    /// Get the current access token
    pub fn token(&self) -> Option<String> {
        self.access_token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set_token(&self, token: Option<String>) {
        *self
            .access_token
            .write()
            .unwrap_or_else(PoisonError::into_inner) = token;
    }

    /// Feed a server-pushed change into local subscriptions
    pub fn publish_change(&self, event: ChangeEvent) {
        let _ = self.events.send(event);
    }

    fn rest_url(&self, collection: Collection) -> String {
        format!("{}/rest/v1/{}", self.base_url, collection.table())
    }

    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Attach the API key and, when signed in, the bearer token
    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let bearer = self.token().unwrap_or_else(|| self.api_key.clone());
        request
            .header("apikey", &self.api_key)
            .header(reqwest::header::AUTHORIZATION, format!("Bearer {bearer}"))
    }

    /// Send a request, failing fast while offline
    async fn send(&self, request: RequestBuilder) -> ClientResult<reqwest::Response> {
        if !self.network.is_online() {
            return Err(ClientError::Offline);
        }
        Ok(self.authorize(request).send().await?)
    }

    /// Handle the HTTP response
    async fn handle_response<T: DeserializeOwned>(response: reqwest::Response) -> ClientResult<T> {
        let status = response.status();

        if !status.is_success() {
            let text = response.text().await?;
            return Err(map_error(status, &text));
        }

        response.json().await.map_err(Into::into)
    }

    async fn handle_empty(response: reqwest::Response) -> ClientResult<()> {
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await?;
            return Err(map_error(status, &text));
        }
        Ok(())
    }

    fn first_row(rows: Vec<Value>, what: &str) -> ClientResult<Value> {
        rows.into_iter()
            .next()
            .ok_or_else(|| ClientError::InvalidResponse(format!("{what} returned no rows")))
    }
}

/// Map a failed response to an error variant
fn map_error(status: StatusCode, text: &str) -> ClientError {
    let body: ErrorBody = serde_json::from_str(text).unwrap_or_default();
    let message = body.text(text);

    if let Some(code) = &body.code
        && TRANSIENT_BACKEND_CODES.contains(&code.as_str())
    {
        return ClientError::Backend {
            code: code.clone(),
            message,
        };
    }

    match status {
        StatusCode::UNAUTHORIZED => ClientError::Unauthorized,
        StatusCode::FORBIDDEN => ClientError::Forbidden(message),
        StatusCode::NOT_FOUND => ClientError::NotFound(message),
        StatusCode::CONFLICT => ClientError::Conflict(message),
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
            // Wrong password is reported as 400 by the auth endpoint
            if body.code.as_deref() == Some("invalid_grant")
                || message.to_lowercase().contains("invalid login credentials")
            {
                ClientError::Unauthorized
            } else {
                ClientError::Validation(message)
            }
        }
        s if TRANSIENT_STATUSES.contains(&s.as_u16()) => ClientError::Status {
            status: s.as_u16(),
            message,
        },
        s => match body.code {
            Some(code) => ClientError::Backend { code, message },
            None => ClientError::Status {
                status: s.as_u16(),
                message,
            },
        },
    }
}

#[async_trait]
impl RemoteStore for RestBackend {
    async fn authenticate(&self, credentials: &Credentials) -> ClientResult<AuthSession> {
        let request = self
            .client
            .post(self.auth_url("token"))
            .query(&[("grant_type", "password")])
            .json(credentials);
        let response = self.send(request).await?;
        let session: AuthSession = Self::handle_response::<TokenResponse>(response).await?.into();
        self.set_token(Some(session.access_token.clone()));
        tracing::info!(user_id = %session.user.id, "Signed in");
        Ok(session)
    }

    async fn refresh_session(&self, refresh_token: &str) -> ClientResult<AuthSession> {
        let request = self
            .client
            .post(self.auth_url("token"))
            .query(&[("grant_type", "refresh_token")])
            .json(&serde_json::json!({ "refresh_token": refresh_token }));
        let response = self.send(request).await?;
        let session: AuthSession = Self::handle_response::<TokenResponse>(response).await?.into();
        self.set_token(Some(session.access_token.clone()));
        Ok(session)
    }

    async fn update_user(&self, attributes: &UserAttributes) -> ClientResult<()> {
        if self.token().is_none() {
            return Err(ClientError::Unauthorized);
        }
        let request = self.client.put(self.auth_url("user")).json(attributes);
        let response = self.send(request).await?;
        Self::handle_empty(response).await
    }

    async fn sign_out(&self) -> ClientResult<()> {
        if self.token().is_none() {
            return Ok(());
        }
        let response = self.send(self.client.post(self.auth_url("logout"))).await?;
        Self::handle_empty(response).await?;
        self.set_token(None);
        Ok(())
    }

    async fn query(&self, collection: Collection, filter: &Filter) -> ClientResult<Vec<Value>> {
        let request = self
            .client
            .get(self.rest_url(collection))
            .query(&filter.to_query_pairs());
        let response = self.send(request).await?;
        Self::handle_response(response).await
    }

    async fn insert(&self, collection: Collection, record: Value) -> ClientResult<Value> {
        let request = self
            .client
            .post(self.rest_url(collection))
            .header("Prefer", "return=representation")
            .json(&record);
        let response = self.send(request).await?;
        let rows: Vec<Value> = Self::handle_response(response).await?;
        let row = Self::first_row(rows, "insert")?;
        self.publish_change(ChangeEvent::new(collection, ChangeKind::Insert).with_record(row.clone()));
        Ok(row)
    }

    async fn update(&self, collection: Collection, id: RecordId, patch: Value) -> ClientResult<Value> {
        let request = self
            .client
            .patch(self.rest_url(collection))
            .query(&[("id", format!("eq.{id}"))])
            .header("Prefer", "return=representation")
            .json(&patch);
        let response = self.send(request).await?;
        let rows: Vec<Value> = Self::handle_response(response).await?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| ClientError::not_found(format!("{collection} {id}")))?;
        self.publish_change(ChangeEvent::new(collection, ChangeKind::Update).with_record(row.clone()));
        Ok(row)
    }

    async fn delete(&self, collection: Collection, id: RecordId) -> ClientResult<()> {
        let request = self
            .client
            .delete(self.rest_url(collection))
            .query(&[("id", format!("eq.{id}"))]);
        let response = self.send(request).await?;
        Self::handle_empty(response).await?;
        self.publish_change(ChangeEvent::new(collection, ChangeKind::Delete).with_record_id(id));
        Ok(())
    }

    fn subscribe(&self, collection: Collection, kinds: &[ChangeKind]) -> ClientResult<Subscription> {
        Ok(Subscription::new(collection, kinds, self.events.subscribe()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_error_statuses() {
        assert!(matches!(
            map_error(StatusCode::UNAUTHORIZED, ""),
            ClientError::Unauthorized
        ));
        assert!(matches!(
            map_error(StatusCode::FORBIDDEN, r#"{"message":"not owner"}"#),
            ClientError::Forbidden(m) if m == "not owner"
        ));
        assert!(matches!(
            map_error(StatusCode::SERVICE_UNAVAILABLE, "down"),
            ClientError::Status { status: 503, .. }
        ));
        assert!(matches!(
            map_error(StatusCode::BAD_REQUEST, r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#),
            ClientError::Unauthorized
        ));
    }

    #[test]
    fn test_map_error_transient_codes() {
        let err = map_error(
            StatusCode::CONFLICT,
            r#"{"code":"23505","message":"duplicate key value violates unique constraint"}"#,
        );
        assert!(matches!(&err, ClientError::Backend { code, .. } if code == "23505"));
        assert!(err.is_retryable());

        let err = map_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            r#"{"code":"XX000","message":"internal"}"#,
        );
        assert!(matches!(&err, ClientError::Backend { code, .. } if code == "XX000"));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_offline_fails_fast() {
        let network = NetworkStatus::new();
        network.set_online(false);
        let backend = RestBackend::new(&ClientConfig::default(), network).unwrap();

        let result = backend.query(Collection::Cities, &Filter::new()).await;
        assert!(matches!(result, Err(ClientError::Offline)));
    }

    #[test]
    fn test_urls() {
        let config = ClientConfig::new("https://api.example.com/");
        let backend = RestBackend::new(&config, NetworkStatus::new()).unwrap();
        assert_eq!(
            backend.rest_url(Collection::RestaurantTypes),
            "https://api.example.com/rest/v1/restaurant_types"
        );
        assert_eq!(backend.auth_url("/token"), "https://api.example.com/auth/v1/token");
        assert!(backend.token().is_none());
    }
}
