//! Session store: the single source of truth for "who is logged in".
//!
//! DESIGN
//! ======
//! A `SessionStore` is an explicit context object built once at the
//! application root (see [`crate::context::AppContext`]) and cloned into
//! whatever needs it. State lives in a `tokio::sync::watch` channel so every
//! transition is applied as one step and observers (route guards, the CLI)
//! always read a consistent [`SessionSnapshot`].
//!
//! `is_authenticated` is never stored: [`SessionSnapshot::is_authenticated`]
//! derives it from `user` on every read, so the two cannot drift.
//!
//! LIFECYCLE
//! =========
//! 1. Seeded from the persisted identity snapshot for a fast first paint.
//! 2. Reconciled by [`SessionStore::check_auth`], scheduled at launch.
//! 3. Mutated afterwards only by `login`, `logout`, reconciliation, and the
//!    storage listener reacting to credential changes from other instances.
//!
//! TRADE-OFFS
//! ==========
//! Overlapping `check_auth` calls are neither coalesced nor cancelled. Each
//! runs to completion and the last one to finish wins.

pub mod guard;
pub mod sign_in;
mod types;

pub use types::{LoginCredentials, LoginResponse, User, UserId};

use std::sync::{Arc, Mutex, PoisonError, Weak};

use tokio::sync::broadcast::error::RecvError;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::http::{ApiClient, ApiError, ApiRequest, endpoints};
use crate::storage::{ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, StorageEvent};

// =============================================================================
// SNAPSHOT
// =============================================================================

/// Point-in-time view of the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub user: Option<User>,
    /// A validation or login call is in flight.
    pub is_loading: bool,
    /// The first reconciliation has completed (successfully or not).
    pub is_initialized: bool,
}

impl SessionSnapshot {
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }
}

// =============================================================================
// STORE
// =============================================================================

#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    api: ApiClient,
    state: watch::Sender<SessionSnapshot>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for SessionInner {
    fn drop(&mut self) {
        let listener = self.listener.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(handle) = listener.take() {
            handle.abort();
        }
    }
}

impl SessionStore {
    /// Build a store seeded from the persisted identity snapshot.
    ///
    /// The store starts loading and uninitialized; call
    /// [`SessionStore::check_auth`] (or use [`SessionStore::launch`]) to
    /// reconcile it.
    #[must_use]
    pub fn new(api: ApiClient) -> Self {
        let seeded = SessionSnapshot {
            user: api.credentials().stored_user(),
            is_loading: true,
            is_initialized: false,
        };
        let (state, _) = watch::channel(seeded);
        Self { inner: Arc::new(SessionInner { api, state, listener: Mutex::new(None) }) }
    }

    /// Build a store, start listening for storage changes, and schedule the
    /// initial reconciliation.
    #[must_use]
    pub fn launch(api: ApiClient) -> Self {
        let store = Self::new(api);
        store.spawn_storage_listener();
        store.spawn_check_auth();
        store
    }

    #[must_use]
    pub fn api(&self) -> &ApiClient {
        &self.inner.api
    }

    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        self.inner.state.borrow().clone()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.inner.state.subscribe()
    }

    #[must_use]
    pub fn user(&self) -> Option<User> {
        self.inner.state.borrow().user.clone()
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.inner.state.borrow().is_authenticated()
    }

    /// Resolve once the first reconciliation has completed.
    pub async fn wait_until_initialized(&self) -> SessionSnapshot {
        let mut rx = self.subscribe();
        let initialized = rx.wait_for(|s| s.is_initialized).await.map(|s| (*s).clone());
        initialized.unwrap_or_else(|_| self.snapshot())
    }

    /// Exchange credentials for tokens and an identity.
    ///
    /// On failure the previous identity is left untouched and the error is
    /// returned for the caller to display. `is_loading` is reset on every
    /// exit path.
    ///
    /// # Errors
    ///
    /// Returns the backend rejection, a transport error, or a storage error
    /// if the tokens could not be persisted.
    pub async fn login(&self, credentials: &LoginCredentials) -> Result<User, ApiError> {
        tracing::info!(username = %credentials.username, "logging in");
        self.update(|s| s.is_loading = true);

        let result = self.request_login(credentials).await;
        match &result {
            Ok(user) => {
                tracing::info!(username = %user.username, "logged in");
                self.update(|s| {
                    s.user = Some(user.clone());
                    s.is_loading = false;
                });
            }
            Err(e) => {
                tracing::warn!(error = %e, username = %credentials.username, "login failed");
                self.update(|s| s.is_loading = false);
            }
        }
        result
    }

    /// Clear credentials and identity, then navigate to sign-in.
    ///
    /// The refresh token is not revoked server-side.
    pub fn logout(&self) {
        if let Err(e) = self.inner.api.credentials().clear() {
            tracing::warn!(error = %e, "failed to clear credentials on logout");
        }
        self.update(|s| s.user = None);
        tracing::info!("logged out");
        self.inner.api.navigate_to_sign_in();
    }

    /// Reconcile the session against the backend.
    ///
    /// Never fails: any error leaves the session signed out with cleared
    /// credentials. Always ends loaded and initialized.
    pub async fn check_auth(&self) {
        self.update(|s| s.is_loading = true);
        let user = self.reconcile().await;
        self.update(|s| {
            s.user = user;
            s.is_loading = false;
            s.is_initialized = true;
        });
    }

    /// Run [`SessionStore::check_auth`] as an independent task.
    pub fn spawn_check_auth(&self) -> JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move { store.check_auth().await })
    }

    /// React to credential changes made by this or any other instance.
    ///
    /// - A removed access or refresh token signs this session out at once.
    /// - An access token written by another instance triggers reconciliation,
    ///   whether or not this session is signed in.
    /// - A lagged event stream triggers reconciliation.
    ///
    /// At most one listener runs per store. The task holds only a weak
    /// reference and is aborted when the last store clone is dropped.
    pub fn spawn_storage_listener(&self) {
        let mut slot = self.inner.listener.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return;
        }
        let mut events = self.inner.api.credentials().subscribe();
        let weak: Weak<SessionInner> = Arc::downgrade(&self.inner);
        *slot = Some(tokio::spawn(async move {
            loop {
                let received = events.recv().await;
                let Some(inner) = weak.upgrade() else { break };
                let store = SessionStore { inner };
                match received {
                    Ok(event) => store.on_storage_event(&event),
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "storage events lagged; revalidating session");
                        store.spawn_check_auth();
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }));
    }

    fn origin(&self) -> Uuid {
        self.inner.api.credentials().origin()
    }

    fn on_storage_event(&self, event: &StorageEvent) {
        if event.key != ACCESS_TOKEN_KEY && event.key != REFRESH_TOKEN_KEY {
            return;
        }

        if event.new_value.is_none() {
            if self.is_authenticated() {
                tracing::info!(key = %event.key, "credential removed; signing out");
            }
            self.update(|s| s.user = None);
            return;
        }

        if event.key == ACCESS_TOKEN_KEY && event.origin != self.origin() {
            tracing::debug!(origin = %event.origin, "access token changed elsewhere; revalidating");
            self.spawn_check_auth();
        }
    }

    async fn request_login(&self, credentials: &LoginCredentials) -> Result<User, ApiError> {
        let request = ApiRequest::post(endpoints::LOGIN).anonymous().json(credentials)?;
        let login: LoginResponse = self.inner.api.execute(request).await?.json()?;
        self.inner.api.credentials().store_login(&login)?;
        Ok(login.user_data)
    }

    async fn reconcile(&self) -> Option<User> {
        let credentials = self.inner.api.credentials();
        if !credentials.has_token() {
            return None;
        }

        match self.inner.api.get_json::<User>(endpoints::ME).await {
            Ok(user) => {
                if let Err(e) = credentials.store_user(&user) {
                    tracing::warn!(error = %e, "failed to refresh stored user snapshot");
                }
                Some(user)
            }
            Err(e) => {
                tracing::warn!(error = %e, "session validation failed; clearing credentials");
                if let Err(e) = credentials.clear() {
                    tracing::warn!(error = %e, "failed to clear credentials");
                }
                None
            }
        }
    }

    fn update(&self, apply: impl FnOnce(&mut SessionSnapshot)) {
        self.inner.state.send_modify(apply);
    }
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
