//! The session hub.
//!
//! `SessionManager` owns the credential store and the in-memory session
//! state. Guards, the request augmenter and UI code all hold a clone of the
//! same manager. Only login, logout and renewal write credentials.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use super::codec;
use super::refresh::{RefreshCoordinator, RefreshPhase};
use super::{Claims, Role, SessionState, SessionStore, StoreKey};
use crate::api::AuthBackend;
use crate::models::{TokenResponse, UserProfile};

/// Handle returned by [`SessionManager::on_change`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Arc<dyn Fn(&SessionState) + Send + Sync>;

/// Cheap to clone; all clones share one session.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<SessionInner>,
}

pub(crate) struct SessionInner {
    pub(crate) store: Arc<dyn SessionStore>,
    pub(crate) backend: Arc<dyn AuthBackend>,
    pub(crate) refresh: RefreshCoordinator,
    state: RwLock<SessionState>,
    listeners: Mutex<Vec<(ListenerId, Listener)>>,
    next_listener_id: AtomicU64,
}

impl SessionManager {
    pub fn new(store: Arc<dyn SessionStore>, backend: Arc<dyn AuthBackend>) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                store,
                backend,
                refresh: RefreshCoordinator::new(),
                state: RwLock::new(SessionState::default()),
                listeners: Mutex::new(Vec::new()),
                next_listener_id: AtomicU64::new(1),
            }),
        }
    }

    /// Reload persisted credentials. Call once at startup.
    ///
    /// An expired token is still loaded so that the first
    /// [`is_authenticated`](Self::is_authenticated) renews it.
    pub fn init(&self) {
        if !self.inner.load_from_store(false) {
            debug!("No persisted session to restore");
        }
    }

    /// Log in with email and password.
    pub async fn login(&self, email: &str, password: &str) -> Result<TokenResponse> {
        let tokens = self.inner.backend.authenticate(email, password).await?;
        self.inner.accept_login(&tokens).await?;
        Ok(tokens)
    }

    /// Log in with email and a one-time access code.
    pub async fn login_with_code(&self, email: &str, code: &str) -> Result<TokenResponse> {
        let tokens = self.inner.backend.authenticate_with_code(email, code).await?;
        self.inner.accept_login(&tokens).await?;
        Ok(tokens)
    }

    /// Whether the caller holds a usable session.
    ///
    /// This is a command, not an accessor: when the local token is missing or
    /// expired it renews against the backend (sharing any renewal already in
    /// flight) and tears the session down if that fails. Must run inside a
    /// tokio runtime.
    pub async fn is_authenticated(&self) -> bool {
        let fresh = self.inner.state.read().has_fresh_claims();
        if fresh {
            return true;
        }
        self.inner.refresh.renew(&self.inner).await
    }

    /// Role names carried by the current token, in token order.
    pub fn roles(&self) -> Vec<String> {
        self.inner.state.read().roles().to_vec()
    }

    pub fn is_admin(&self) -> bool {
        self.inner.state.read().is_admin()
    }

    pub fn is_manager(&self) -> bool {
        self.inner.state.read().is_manager()
    }

    pub fn is_user(&self) -> bool {
        self.inner.state.read().is_user()
    }

    pub fn is_admin_or_manager(&self) -> bool {
        self.inner.state.read().is_admin_or_manager()
    }

    pub fn has_any_role(&self, required: &[Role]) -> bool {
        self.inner.state.read().has_any_role(required)
    }

    pub fn current_user(&self) -> Option<UserProfile> {
        self.inner.state.read().current_user.clone()
    }

    pub fn state(&self) -> SessionState {
        self.inner.state.read().clone()
    }

    pub fn refresh_phase(&self) -> RefreshPhase {
        self.inner.refresh.phase()
    }

    /// End the session locally, then tell the backend.
    ///
    /// Local state is gone even when the backend call fails.
    pub async fn logout(&self) -> Result<()> {
        let access_token = self.inner.store.get(StoreKey::AuthToken);
        self.inner.teardown();
        info!("Logged out");
        self.inner
            .backend
            .logout(access_token.as_deref())
            .await
            .context("Backend logout failed")
    }

    /// Tear down the session without contacting the backend.
    pub fn clear_session(&self) {
        self.inner.teardown();
    }

    /// Register a callback run synchronously after every session transition.
    pub fn on_change(&self, listener: impl Fn(&SessionState) + Send + Sync + 'static) -> ListenerId {
        let id = ListenerId(self.inner.next_listener_id.fetch_add(1, Ordering::Relaxed));
        let listener: Listener = Arc::new(listener);
        self.inner.listeners.lock().push((id, listener));
        id
    }

    /// Returns false if the listener was already removed.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.inner.listeners.lock();
        let before = listeners.len();
        listeners.retain(|(lid, _)| *lid != id);
        listeners.len() != before
    }
}

impl SessionInner {
    /// Replace the session state and notify listeners.
    fn set_state(&self, state: SessionState) {
        *self.state.write() = state.clone();
        // Listeners may (un)subscribe from inside the callback
        let listeners: Vec<Listener> = self
            .listeners
            .lock()
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();
        for listener in listeners {
            listener(&state);
        }
    }

    fn persist(&self, key: StoreKey, value: &str) {
        if let Err(e) = self.store.put(key, value) {
            warn!(error = %e, key = key.as_str(), "Failed to persist session value");
        }
    }

    /// Rebuild state from the store. With `require_fresh`, only an unexpired
    /// token is accepted. Returns whether a token was loaded.
    pub(crate) fn load_from_store(&self, require_fresh: bool) -> bool {
        let Some(raw) = self.store.get(StoreKey::AuthToken) else {
            return false;
        };
        let claims = match codec::decode(&raw) {
            Ok(claims) => claims,
            Err(e) => {
                warn!(error = %e, "Stored access token is unreadable, ignoring it");
                return false;
            }
        };
        let fresh = !claims.is_expired();
        if require_fresh && !fresh {
            return false;
        }

        let current_user = if fresh {
            self.store
                .get(StoreKey::CurrentUser)
                .and_then(|snapshot| serde_json::from_str(&snapshot).ok())
        } else {
            None
        };
        debug!(subject = %claims.subject, fresh, "Session restored from store");
        self.set_state(SessionState::new(claims, current_user));
        true
    }

    async fn accept_login(&self, tokens: &TokenResponse) -> Result<()> {
        let claims = codec::decode(&tokens.access_token)
            .context("Backend issued an unreadable access token")?;
        info!(subject = %claims.subject, roles = ?claims.granted_roles, "Logged in");
        self.establish(tokens, claims).await;
        Ok(())
    }

    /// Store a newly issued credential pair, fetch the profile with it and
    /// publish the resulting state.
    pub(crate) async fn establish(&self, tokens: &TokenResponse, claims: Claims) {
        self.persist(StoreKey::AuthToken, &tokens.access_token);
        self.persist(StoreKey::RefreshToken, &tokens.refresh_token);
        if let Some(ref name) = tokens.display_name {
            self.persist(StoreKey::Username, name);
        }

        // The previous profile stays visible while the new one is fetched
        let previous_user = {
            let mut state = self.state.write();
            state.claims = Some(claims.clone());
            if claims.is_expired() {
                state.current_user.take()
            } else {
                state.current_user.clone()
            }
        };

        let profile = match self.backend.fetch_profile().await {
            Ok(profile) => Some(profile),
            Err(e) => {
                warn!(error = %e, "Profile fetch failed, using token response details");
                tokens.profile_hint().or(previous_user)
            }
        };

        let current_user = if claims.is_expired() {
            debug!("Issued token is already expired, not attaching a profile");
            None
        } else {
            profile
        };

        if let Some(ref profile) = current_user {
            match serde_json::to_string(profile) {
                Ok(snapshot) => self.persist(StoreKey::CurrentUser, &snapshot),
                Err(e) => warn!(error = %e, "Failed to serialize profile snapshot"),
            }
        }

        self.set_state(SessionState::new(claims, current_user));
    }

    /// Clear every persisted and in-memory credential.
    pub(crate) fn teardown(&self) {
        if let Err(e) = self.store.clear_all() {
            warn!(error = %e, "Failed to clear session store, clearing keys one by one");
            for key in StoreKey::ALL {
                let _ = self.store.clear(key);
            }
        }
        self.set_state(SessionState::default());
    }
}
