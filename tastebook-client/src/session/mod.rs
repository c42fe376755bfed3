//! Session lifecycle
//!
//! [`SessionManager`] owns the signed-in session: sign in and out, the
//! viewer's profile, password changes, and a background loop that
//! exchanges the refresh token on a fixed interval.

mod connectivity;

pub use connectivity::ConnectivityMonitor;

use shared::{Collection, Profile, UserId};
use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::error::{ClientError, ClientResult};
use crate::network::NetworkStatus;
use crate::remote::{AuthSession, AuthUser, Credentials, Filter, RemoteStore, UserAttributes, decode_rows};
use crate::retry::RetryExecutor;
use crate::validation::validate_password;

struct SessionInner {
    remote: Arc<dyn RemoteStore>,
    executor: RetryExecutor,
    network: NetworkStatus,
    refresh_interval: Duration,
    session: RwLock<Option<AuthSession>>,
    profile: RwLock<Option<Profile>>,
    user_tx: watch::Sender<Option<AuthUser>>,
    refresh_task: Mutex<Option<RefreshTask>>,
}

struct RefreshTask {
    shutdown: CancellationToken,
    handle: JoinHandle<()>,
}

/// Signed-in session and its background refresh
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<SessionInner>,
}

impl SessionManager {
    pub fn new(
        remote: Arc<dyn RemoteStore>,
        executor: RetryExecutor,
        network: NetworkStatus,
        refresh_interval: Duration,
    ) -> Self {
        let (user_tx, _) = watch::channel(None);
        Self {
            inner: Arc::new(SessionInner {
                remote,
                executor,
                network,
                refresh_interval,
                session: RwLock::new(None),
                profile: RwLock::new(None),
                user_tx,
                refresh_task: Mutex::new(None),
            }),
        }
    }

    // ========== Accessors ==========

    /// The live session, if signed in
    pub fn current(&self) -> Option<AuthSession> {
        self.inner.current()
    }

    pub fn current_user_id(&self) -> Option<UserId> {
        self.current().map(|s| s.user.id)
    }

    /// Signed-in user id, or `Unauthorized`
    pub fn require_user(&self) -> ClientResult<UserId> {
        self.current_user_id().ok_or(ClientError::Unauthorized)
    }

    /// The viewer's profile, loaded at sign-in
    pub fn profile(&self) -> Option<Profile> {
        self.inner
            .profile
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The viewer's profile when it carries the admin flag
    pub fn require_admin(&self) -> ClientResult<Profile> {
        self.require_user()?;
        match self.profile() {
            Some(profile) if profile.is_admin => Ok(profile),
            _ => Err(ClientError::forbidden("admin privileges required")),
        }
    }

    /// Observe sign-in and sign-out
    pub fn subscribe(&self) -> watch::Receiver<Option<AuthUser>> {
        self.inner.user_tx.subscribe()
    }

    pub fn is_refresh_running(&self) -> bool {
        self.inner
            .refresh_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|task| !task.handle.is_finished())
    }

    // ========== Lifecycle ==========

    /// Sign in with email and password and start the refresh loop
    pub async fn sign_in(&self, credentials: Credentials) -> ClientResult<AuthSession> {
        if credentials.email.trim().is_empty() || credentials.password.is_empty() {
            return Err(ClientError::validation("email and password are required"));
        }

        let remote = &self.inner.remote;
        let session = self
            .inner
            .executor
            .execute(|| remote.authenticate(&credentials))
            .await?;

        self.inner.store_session(Some(session.clone()));
        tracing::info!(user_id = %session.user.id, "Session started");

        match self.inner.load_profile(session.user.id).await {
            Ok(profile) => self.inner.set_profile(profile),
            Err(e) => {
                tracing::warn!(user_id = %session.user.id, error = %e, "Failed to load profile");
                self.inner.set_profile(None);
            }
        }

        self.start_refresh_loop();
        Ok(session)
    }

    /// End the session
    ///
    /// Local state is cleared even when the backend call fails.
    pub async fn sign_out(&self) -> ClientResult<()> {
        self.stop_refresh_loop();
        if self.current().is_none() {
            return Ok(());
        }

        let remote = &self.inner.remote;
        let result = self.inner.executor.execute(|| remote.sign_out()).await;

        self.inner.store_session(None);
        self.inner.set_profile(None);
        tracing::info!("Session ended");

        if let Err(e) = &result {
            tracing::warn!(error = %e, "Backend sign-out failed");
        }
        result
    }

    /// Exchange the refresh token now
    pub async fn refresh_now(&self) -> ClientResult<AuthSession> {
        self.inner.refresh().await
    }

    /// Change the password after confirming the current one
    ///
    /// The email comes from the live session, not from caller input.
    pub async fn update_password(&self, current_password: &str, new_password: &str) -> ClientResult<()> {
        validate_password(new_password)?;
        if current_password == new_password {
            return Err(ClientError::validation(
                "new password must differ from the current one",
            ));
        }

        let email = self
            .current()
            .map(|s| s.user.email)
            .ok_or(ClientError::Unauthorized)?;

        let remote = &self.inner.remote;
        let credentials = Credentials::new(email, current_password);
        let session = self
            .inner
            .executor
            .execute(|| remote.authenticate(&credentials))
            .await?;
        self.inner.store_session(Some(session));

        let attributes = UserAttributes {
            password: Some(new_password.to_string()),
            ..Default::default()
        };
        self.inner
            .executor
            .execute(|| remote.update_user(&attributes))
            .await?;

        tracing::info!("Password updated");
        Ok(())
    }

    // ========== Refresh loop ==========

    /// Start (or restart) the periodic token refresh
    pub fn start_refresh_loop(&self) {
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(refresh_loop(Arc::downgrade(&self.inner), shutdown.clone()));

        let previous = self
            .inner
            .refresh_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(RefreshTask { shutdown, handle });
        if let Some(task) = previous {
            task.shutdown.cancel();
        }
    }

    pub fn stop_refresh_loop(&self) {
        let task = self
            .inner
            .refresh_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            task.shutdown.cancel();
            tracing::debug!("Session refresh loop stopped");
        }
    }
}

impl Drop for SessionInner {
    fn drop(&mut self) {
        let task = self
            .refresh_task
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            task.shutdown.cancel();
        }
    }
}

impl SessionInner {
    fn current(&self) -> Option<AuthSession> {
        self.session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn store_session(&self, session: Option<AuthSession>) {
        let user = session.as_ref().map(|s| s.user.clone());
        *self.session.write().unwrap_or_else(PoisonError::into_inner) = session;
        self.user_tx.send_if_modified(|current| {
            if *current == user {
                false
            } else {
                *current = user;
                true
            }
        });
    }

    fn set_profile(&self, profile: Option<Profile>) {
        *self.profile.write().unwrap_or_else(PoisonError::into_inner) = profile;
    }

    async fn load_profile(&self, user_id: UserId) -> ClientResult<Option<Profile>> {
        let filter = Filter::new().eq("id", user_id.to_string()).limit(1);
        let remote = &self.remote;
        let rows = self
            .executor
            .execute(|| remote.query(Collection::Profiles, &filter))
            .await?;
        let profiles: Vec<Profile> = decode_rows(rows)?;
        Ok(profiles.into_iter().next())
    }

    async fn refresh(&self) -> ClientResult<AuthSession> {
        let refresh_token = self
            .current()
            .map(|s| s.refresh_token)
            .ok_or(ClientError::Unauthorized)?;

        let remote = &self.remote;
        let session = self
            .executor
            .execute(|| remote.refresh_session(&refresh_token))
            .await?;
        self.store_session(Some(session.clone()));
        Ok(session)
    }
}

/// Holds the session weakly so dropping the last manager ends the loop
async fn refresh_loop(inner: Weak<SessionInner>, shutdown: CancellationToken) {
    let Some(refresh_interval) = inner.upgrade().map(|inner| inner.refresh_interval) else {
        return;
    };
    let mut ticker = tokio::time::interval(refresh_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // First tick completes immediately; the session is fresh
    ticker.tick().await;

    tracing::debug!(interval_secs = refresh_interval.as_secs(), "Session refresh loop started");

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {}
        }
        let Some(inner) = inner.upgrade() else {
            break;
        };

        if !inner.network.is_online() {
            tracing::debug!("Offline, skipping session refresh");
            continue;
        }

        match inner.refresh().await {
            Ok(session) => {
                tracing::debug!(expires_at = %session.expires_at, "Session refreshed");
            }
            Err(e) if e.is_auth() => {
                tracing::warn!(error = %e, "Session rejected, signing out locally");
                inner.store_session(None);
                inner.set_profile(None);
                break;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Session refresh failed, will retry next tick");
            }
        }
    }
}
