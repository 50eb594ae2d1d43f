//! Token-based session management.
//!
//! The session moves through `Anonymous -> Authenticating -> Authenticated`
//! on login and back to `Anonymous` through `LoggedOut` or `Expired`. A
//! whitelisted subset is mirrored to durable storage on every transition so
//! a restarted process can rebuild the session, and an independent periodic
//! watcher enforces the durable expiry claim no matter what the in-memory
//! state says. State transitions are published on a watch channel so the
//! embedding UI can navigate away from protected views.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use reqwest::Method;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::api::{ApiError, ApiRequest, Transport};
use crate::auth::storage::{ExpirySnapshot, PersistedSession, SessionStore};
use crate::models::{Credentials, LoginResponse, Role, UserProfile};

/// Login endpoint path. The credential round-trip is the only request this
/// module issues itself; everything else flows through the client facade.
const LOGIN_PATH: &str = "/auth/login";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Anonymous,
    Authenticating,
    Authenticated,
    Expired,
    LoggedOut,
}

#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub user: UserProfile,
    pub role: Role,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(expires_at) => Utc::now() >= expires_at,
            None => false,
        }
    }
}

struct SessionInner {
    state: SessionState,
    session: Option<Session>,
}

pub struct SessionManager {
    inner: Mutex<SessionInner>,
    store: Arc<dyn SessionStore>,
    state_tx: watch::Sender<SessionState>,
}

impl SessionManager {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        let (state_tx, _) = watch::channel(SessionState::Anonymous);
        Self {
            inner: Mutex::new(SessionInner {
                state: SessionState::Anonymous,
                session: None,
            }),
            store,
            state_tx,
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionInner> {
        self.inner.lock().expect("session lock poisoned")
    }

    fn set_state(&self, state: SessionState) {
        self.lock().state = state;
        self.state_tx.send_replace(state);
    }

    pub fn state(&self) -> SessionState {
        self.lock().state
    }

    /// Feed of state transitions, for navigation and guards.
    pub fn watch_state(&self) -> watch::Receiver<SessionState> {
        self.state_tx.subscribe()
    }

    /// Current bearer token for header injection, only while the session is
    /// live. Anonymous or expired sessions yield None and the request goes
    /// out without an Authorization header.
    pub fn token(&self) -> Option<String> {
        self.lock()
            .session
            .as_ref()
            .filter(|s| !s.is_expired())
            .map(|s| s.token.clone())
    }

    /// Token present and the expiry claim, if any, still in the future.
    pub fn is_authenticated(&self) -> bool {
        self.lock()
            .session
            .as_ref()
            .map(|s| !s.token.is_empty() && !s.is_expired())
            .unwrap_or(false)
    }

    pub fn role(&self) -> Option<Role> {
        self.lock().session.as_ref().map(|s| s.role)
    }

    pub fn user(&self) -> Option<UserProfile> {
        self.lock().session.as_ref().map(|s| s.user.clone())
    }

    pub fn current(&self) -> Option<Session> {
        self.lock().session.clone()
    }

    /// Authenticate and install the session. On failure the manager returns
    /// to `Anonymous` with no partial state retained.
    pub async fn login(
        &self,
        transport: &dyn Transport,
        credentials: &Credentials,
    ) -> Result<Session, ApiError> {
        self.set_state(SessionState::Authenticating);

        let body = serde_json::to_value(credentials)
            .map_err(|e| ApiError::InvalidResponse(e.to_string()))?;
        let request = ApiRequest::new(Method::POST, LOGIN_PATH).with_body(body);

        let value = match transport.execute(request).await {
            Ok(value) => value,
            Err(err) => {
                warn!(error = %err, "Login failed");
                self.set_state(SessionState::Anonymous);
                return Err(err);
            }
        };

        let response: LoginResponse = match serde_json::from_value(value) {
            Ok(response) => response,
            Err(err) => {
                self.set_state(SessionState::Anonymous);
                return Err(ApiError::InvalidResponse(format!(
                    "login response: {}",
                    err
                )));
            }
        };

        let session = Session {
            token: response.token,
            user: response.user,
            role: response.role,
            expires_at: response
                .exp
                .and_then(|exp| Utc.timestamp_opt(exp, 0).single()),
        };

        self.persist(&session, response.exp);
        {
            let mut inner = self.lock();
            inner.session = Some(session.clone());
            inner.state = SessionState::Authenticated;
        }
        self.state_tx.send_replace(SessionState::Authenticated);

        info!(user_id = session.user.id, role = session.role.as_str(), "Login succeeded");
        Ok(session)
    }

    /// Clear the session synchronously: memory first, then both durable
    /// slots. Terminal state is `Anonymous`.
    pub fn logout(&self) {
        {
            let mut inner = self.lock();
            inner.session = None;
            inner.state = SessionState::LoggedOut;
        }
        self.state_tx.send_replace(SessionState::LoggedOut);
        self.purge_storage();
        self.set_state(SessionState::Anonymous);
        info!("Logged out");
    }

    /// Force the expired transition: purge memory and storage regardless of
    /// what either currently holds. Called by the watcher and by the 401
    /// hook on the dispatch path.
    pub fn mark_expired(&self) {
        let had_session = {
            let mut inner = self.lock();
            let had_session = inner.session.is_some();
            inner.session = None;
            inner.state = SessionState::Expired;
            had_session
        };
        self.state_tx.send_replace(SessionState::Expired);
        self.purge_storage();
        self.set_state(SessionState::Anonymous);
        if had_session {
            info!("Session expired");
        }
    }

    /// Rebuild the session from durable storage, e.g. after a restart.
    /// Returns true when an unexpired session was restored.
    pub fn restore(&self) -> bool {
        let record = match self.store.load_session() {
            Ok(Some(record)) => record,
            Ok(None) => return false,
            Err(err) => {
                warn!(error = %err, "Failed to load persisted session");
                return false;
            }
        };

        if !record.is_authenticated || record.token.is_empty() {
            return false;
        }

        let expires_at = match self.store.load_snapshot() {
            Ok(Some(snapshot)) => {
                if snapshot.exp <= Utc::now().timestamp() {
                    debug!("Persisted session already expired, purging");
                    self.purge_storage();
                    return false;
                }
                Utc.timestamp_opt(snapshot.exp, 0).single()
            }
            Ok(None) => None,
            Err(err) => {
                warn!(error = %err, "Failed to load expiry snapshot");
                None
            }
        };

        {
            let mut inner = self.lock();
            inner.session = Some(Session {
                token: record.token,
                user: record.user,
                role: record.role,
                expires_at,
            });
            inner.state = SessionState::Authenticated;
        }
        self.state_tx.send_replace(SessionState::Authenticated);
        debug!("Session restored from storage");
        true
    }

    /// One watcher pass: the durable snapshot's expiry claim is the source
    /// of truth, whatever the in-memory session claims.
    pub fn check_expiry(&self) {
        match self.store.load_snapshot() {
            Ok(Some(snapshot)) if snapshot.exp <= Utc::now().timestamp() => {
                info!(exp = snapshot.exp, "Expiry claim reached, purging session");
                self.mark_expired();
            }
            Ok(_) => {}
            Err(err) => warn!(error = %err, "Failed to read expiry snapshot"),
        }
    }

    /// Start the periodic expiry watcher. The returned handle cancels the
    /// task when dropped.
    pub fn spawn_watcher(self: &Arc<Self>, interval: Duration) -> SessionWatcher {
        let manager = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                manager.check_expiry();
            }
        });
        SessionWatcher { handle }
    }

    fn persist(&self, session: &Session, exp: Option<i64>) {
        let record = PersistedSession {
            user: session.user.clone(),
            token: session.token.clone(),
            is_authenticated: true,
            role: session.role,
        };
        if let Err(err) = self.store.save_session(&record) {
            warn!(error = %err, "Failed to persist session record");
        }
        if let Some(exp) = exp {
            let snapshot = ExpirySnapshot {
                user_id: session.user.id,
                email: session.user.email.clone(),
                exp,
            };
            if let Err(err) = self.store.save_snapshot(&snapshot) {
                warn!(error = %err, "Failed to persist expiry snapshot");
            }
        }
    }

    fn purge_storage(&self) {
        if let Err(err) = self.store.clear_session() {
            warn!(error = %err, "Failed to clear session record");
        }
        if let Err(err) = self.store.clear_snapshot() {
            warn!(error = %err, "Failed to clear expiry snapshot");
        }
    }
}

/// Cancellable handle for the expiry watcher task.
pub struct SessionWatcher {
    handle: JoinHandle<()>,
}

impl SessionWatcher {
    pub fn cancel(&self) {
        self.handle.abort();
    }
}

impl Drop for SessionWatcher {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
