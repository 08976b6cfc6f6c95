use super::*;
use crate::storage::{MemoryStorage, Storage, USER_KEY};
use crate::test_helpers::{Harness, Hits, alice, bearer, eventually, harness, harness_with_storage, json_response, spawn_backend};
use axum::Json;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use serde_json::{Value, json};
use std::time::Duration;

#[derive(Clone, Default)]
struct Backend {
    me: Hits,
    login: Hits,
}

/// Login accepts `alice`/`secret` and mints `a-1`; `/me` only accepts `a-1`.
fn auth_backend(backend: Backend) -> axum::Router {
    axum::Router::new()
        .route(
            endpoints::LOGIN,
            post(|State(b): State<Backend>, Json(body): Json<Value>| async move {
                b.login.bump();
                if body["username"] == "alice" && body["password"] == "secret" {
                    json_response(StatusCode::OK, json!({"access": "a-1", "refresh": "r-1", "user_data": alice()}))
                } else {
                    json_response(StatusCode::BAD_REQUEST, json!({"detail": "Invalid credentials"}))
                }
            }),
        )
        .route(
            endpoints::ME,
            get(|State(b): State<Backend>, headers: HeaderMap| async move {
                b.me.bump();
                if bearer(&headers).as_deref() == Some("a-1") {
                    json_response(StatusCode::OK, json!(alice()))
                } else {
                    json_response(StatusCode::UNAUTHORIZED, json!({"detail": "Token is invalid or expired"}))
                }
            }),
        )
        .route(
            endpoints::TOKEN_REFRESH,
            post(|| async { json_response(StatusCode::UNAUTHORIZED, json!({"detail": "Token is blacklisted"})) }),
        )
        .with_state(backend)
}

async fn setup() -> (Backend, Harness) {
    let backend = Backend::default();
    let base = spawn_backend(auth_backend(backend.clone())).await;
    (backend, harness(&base))
}

fn assert_consistent(snapshot: &SessionSnapshot) {
    assert_eq!(snapshot.is_authenticated(), snapshot.user.is_some());
}

// =============================================================================
// CONSTRUCTION AND RECONCILIATION
// =============================================================================

#[tokio::test]
async fn new_store_is_loading_and_uninitialized() {
    let (_backend, h) = setup().await;
    let store = SessionStore::new(h.api.clone());
    let snap = store.snapshot();
    assert!(snap.is_loading);
    assert!(!snap.is_initialized);
    assert!(snap.user.is_none());
}

#[tokio::test]
async fn new_store_is_seeded_from_stored_snapshot() {
    let (_backend, h) = setup().await;
    h.storage.set(USER_KEY, &serde_json::to_string(&alice()).unwrap()).unwrap();

    let store = SessionStore::new(h.api.clone());

    assert_eq!(store.user(), Some(alice()));
    assert!(store.is_authenticated());
    assert!(!store.snapshot().is_initialized);
}

#[tokio::test]
async fn check_auth_without_token_skips_network() {
    let (backend, h) = setup().await;
    h.storage.set(USER_KEY, &serde_json::to_string(&alice()).unwrap()).unwrap();
    let store = SessionStore::new(h.api.clone());

    store.check_auth().await;

    let snap = store.snapshot();
    assert!(snap.user.is_none());
    assert!(snap.is_initialized);
    assert!(!snap.is_loading);
    assert_consistent(&snap);
    assert_eq!(backend.me.get(), 0);
}

#[tokio::test]
async fn check_auth_with_valid_token_loads_identity() {
    let (backend, h) = setup().await;
    h.storage.set(ACCESS_TOKEN_KEY, "a-1").unwrap();
    let store = SessionStore::new(h.api.clone());

    store.check_auth().await;

    assert_eq!(store.user(), Some(alice()));
    assert_eq!(backend.me.get(), 1);
    assert_eq!(h.api.credentials().stored_user(), Some(alice()));
    assert_consistent(&store.snapshot());
}

#[tokio::test]
async fn check_auth_with_rejected_token_clears_everything() {
    let (_backend, h) = setup().await;
    h.storage.set(ACCESS_TOKEN_KEY, "expired").unwrap();
    h.storage.set(USER_KEY, &serde_json::to_string(&alice()).unwrap()).unwrap();
    let store = SessionStore::new(h.api.clone());
    assert!(store.is_authenticated(), "seeded optimistically");

    store.check_auth().await;

    let snap = store.snapshot();
    assert!(snap.user.is_none());
    assert!(snap.is_initialized);
    assert!(!snap.is_loading);
    assert!(h.storage.is_empty());
}

#[tokio::test]
async fn launch_reconciles_in_background() {
    let (_backend, h) = setup().await;
    h.storage.set(ACCESS_TOKEN_KEY, "a-1").unwrap();

    let store = SessionStore::launch(h.api.clone());
    let snap = tokio::time::timeout(Duration::from_secs(2), store.wait_until_initialized())
        .await
        .expect("initialization timed out");

    assert_eq!(snap.user, Some(alice()));
    assert!(!snap.is_loading);
}

#[tokio::test]
async fn initialized_never_reverts() {
    let (_backend, h) = setup().await;
    let store = SessionStore::new(h.api.clone());
    store.check_auth().await;
    assert!(store.snapshot().is_initialized);

    store.login(&LoginCredentials::new("alice", "secret")).await.unwrap();
    assert!(store.snapshot().is_initialized);
    store.logout();
    assert!(store.snapshot().is_initialized);
    store.check_auth().await;
    assert!(store.snapshot().is_initialized);
}

/// Login and `/me` both answer after `delay`.
fn slow_backend(delay: Duration) -> axum::Router {
    axum::Router::new()
        .route(
            endpoints::LOGIN,
            post(move || async move {
                tokio::time::sleep(delay).await;
                json_response(StatusCode::OK, json!({"access": "a-1", "refresh": "r-1", "user_data": alice()}))
            }),
        )
        .route(
            endpoints::ME,
            get(move || async move {
                tokio::time::sleep(delay).await;
                json_response(StatusCode::OK, json!(alice()))
            }),
        )
}

#[tokio::test]
async fn check_auth_reports_loading_while_in_flight() {
    let h = harness(&spawn_backend(slow_backend(Duration::from_millis(300))).await);
    let store = SessionStore::new(h.api.clone());
    store.check_auth().await;
    assert!(!store.snapshot().is_loading);
    h.storage.set(ACCESS_TOKEN_KEY, "a-1").unwrap();

    let task = store.spawn_check_auth();
    tokio::time::sleep(Duration::from_millis(100)).await;

    let during = store.snapshot();
    assert!(during.is_loading);
    assert!(during.user.is_none());

    task.await.unwrap();
    let after = store.snapshot();
    assert!(!after.is_loading);
    assert_eq!(after.user, Some(alice()));
}

// =============================================================================
// LOGIN / LOGOUT
// =============================================================================

#[tokio::test]
async fn login_reports_loading_while_in_flight() {
    let h = harness(&spawn_backend(slow_backend(Duration::from_millis(300))).await);
    let store = SessionStore::new(h.api.clone());
    store.check_auth().await;
    assert!(!store.snapshot().is_loading);

    let pending = store.clone();
    let task = tokio::spawn(async move { pending.login(&LoginCredentials::new("alice", "secret")).await });
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert!(store.snapshot().is_loading);
    assert!(store.user().is_none());

    task.await.unwrap().unwrap();
    assert!(!store.snapshot().is_loading);
    assert_eq!(store.user(), Some(alice()));
}

#[tokio::test]
async fn login_persists_tokens_and_sets_user() {
    let (_backend, h) = setup().await;
    let store = SessionStore::new(h.api.clone());
    store.check_auth().await;

    let user = store
        .login(&LoginCredentials::new("alice", "secret"))
        .await
        .expect("login should succeed");

    assert_eq!(user, alice());
    let snap = store.snapshot();
    assert_eq!(snap.user, Some(alice()));
    assert!(!snap.is_loading);
    assert_consistent(&snap);
    assert_eq!(h.storage.get(ACCESS_TOKEN_KEY).as_deref(), Some("a-1"));
    assert_eq!(h.storage.get(REFRESH_TOKEN_KEY).as_deref(), Some("r-1"));
    assert_eq!(h.api.credentials().stored_user(), Some(alice()));
}

#[tokio::test]
async fn rejected_login_leaves_state_untouched() {
    let (_backend, h) = setup().await;
    let store = SessionStore::new(h.api.clone());
    store.check_auth().await;

    let err = store
        .login(&LoginCredentials::new("alice", "wrong"))
        .await
        .expect_err("login should be rejected");

    assert_eq!(err.status(), Some(400));
    assert_eq!(err.detail().as_deref(), Some("Invalid credentials"));
    let snap = store.snapshot();
    assert!(snap.user.is_none());
    assert!(!snap.is_loading);
    assert!(h.storage.is_empty());
}

#[tokio::test]
async fn rejected_login_keeps_previous_identity() {
    let (_backend, h) = setup().await;
    let store = SessionStore::new(h.api.clone());
    store.login(&LoginCredentials::new("alice", "secret")).await.unwrap();

    store.login(&LoginCredentials::new("alice", "wrong")).await.unwrap_err();

    assert_eq!(store.user(), Some(alice()));
    assert_eq!(h.storage.get(ACCESS_TOKEN_KEY).as_deref(), Some("a-1"));
}

#[tokio::test]
async fn login_against_unreachable_backend_resets_loading() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let h = harness(&format!("http://{addr}"));
    let store = SessionStore::new(h.api.clone());

    let err = store.login(&LoginCredentials::new("alice", "secret")).await.unwrap_err();

    assert!(matches!(err, ApiError::Transport(_)));
    assert!(!store.snapshot().is_loading);
}

#[tokio::test]
async fn logout_clears_everything_and_redirects() {
    let (_backend, h) = setup().await;
    let store = SessionStore::new(h.api.clone());
    store.login(&LoginCredentials::new("alice", "secret")).await.unwrap();

    store.logout();

    assert!(store.user().is_none());
    assert!(!store.is_authenticated());
    assert!(h.storage.is_empty());
    assert_eq!(h.navigator.paths(), vec!["/sign-in".to_owned()]);
}

#[tokio::test]
async fn repeated_login_logout_never_leaves_residue() {
    let (_backend, h) = setup().await;
    let store = SessionStore::new(h.api.clone());

    for _ in 0..3 {
        store.login(&LoginCredentials::new("alice", "secret")).await.unwrap();
        assert_consistent(&store.snapshot());
        store.logout();
        assert_consistent(&store.snapshot());
        assert!(h.storage.is_empty());
        assert!(store.user().is_none());
    }
}

// =============================================================================
// STORAGE EVENTS
// =============================================================================

#[tokio::test]
async fn logout_in_another_instance_signs_this_one_out() {
    let backend = Backend::default();
    let base = spawn_backend(auth_backend(backend.clone())).await;
    let shared = MemoryStorage::new();
    let tab_a = harness_with_storage(&base, shared.clone());
    let tab_b = harness_with_storage(&base, shared.open());

    let store_a = SessionStore::new(tab_a.api.clone());
    let store_b = SessionStore::new(tab_b.api.clone());
    store_b.spawn_storage_listener();

    store_a.login(&LoginCredentials::new("alice", "secret")).await.unwrap();
    assert!(eventually(|| store_b.is_authenticated()).await, "tab B should pick up the login");

    store_a.logout();

    assert!(eventually(|| !store_b.is_authenticated()).await, "tab B should be signed out");
    assert!(tab_b.navigator.paths().is_empty());
}

#[tokio::test]
async fn token_written_elsewhere_triggers_revalidation() {
    let backend = Backend::default();
    let base = spawn_backend(auth_backend(backend.clone())).await;
    let shared = MemoryStorage::new();
    let tab_a = harness_with_storage(&base, shared.clone());
    let tab_b = harness_with_storage(&base, shared.open());

    let store_b = SessionStore::new(tab_b.api.clone());
    store_b.check_auth().await;
    store_b.spawn_storage_listener();
    assert_eq!(backend.me.get(), 0);

    let store_a = SessionStore::new(tab_a.api.clone());
    store_a.login(&LoginCredentials::new("alice", "secret")).await.unwrap();

    assert!(eventually(|| store_b.user() == Some(alice())).await);
    assert!(backend.me.get() >= 1);
}

#[tokio::test]
async fn own_token_writes_do_not_trigger_revalidation() {
    let (backend, h) = setup().await;
    let store = SessionStore::new(h.api.clone());
    store.spawn_storage_listener();

    store.login(&LoginCredentials::new("alice", "secret")).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(backend.me.get(), 0);
    assert!(store.is_authenticated());
}

#[tokio::test]
async fn http_layer_teardown_signs_session_out() {
    let (_backend, h) = setup().await;
    let store = SessionStore::new(h.api.clone());
    store.spawn_storage_listener();
    store.login(&LoginCredentials::new("alice", "secret")).await.unwrap();

    // Invalidate the access token so `/me` answers 401; the refresh endpoint
    // rejects too, which tears the session down.
    h.storage.set(ACCESS_TOKEN_KEY, "revoked").unwrap();
    let err = h.api.get_json::<User>(endpoints::ME).await.unwrap_err();
    assert!(err.is_session_expired());

    assert!(eventually(|| !store.is_authenticated()).await);
    assert!(h.storage.is_empty());
    assert_eq!(h.navigator.last().as_deref(), Some("/sign-in"));
}

#[tokio::test]
async fn lagged_listener_revalidates() {
    let (backend, h) = setup().await;
    let writer = h.storage.open();
    let store = SessionStore::new(h.api.clone());
    store.spawn_storage_listener();

    // The listener has not been polled yet, so these overflow its buffer.
    writer.set(ACCESS_TOKEN_KEY, "a-1").unwrap();
    for i in 0..crate::storage::EVENT_CAPACITY + 8 {
        writer.set("noise", &i.to_string()).unwrap();
    }

    assert!(eventually(|| backend.me.get() >= 1).await, "lag should trigger /me");
    assert!(eventually(|| store.user() == Some(alice())).await);
}

#[tokio::test]
async fn storage_listener_does_not_keep_store_alive() {
    let (_backend, h) = setup().await;
    let store = SessionStore::new(h.api.clone());
    store.spawn_storage_listener();
    let handle = store.inner.listener.lock().unwrap().take().expect("listener running");
    let weak = Arc::downgrade(&store.inner);

    drop(store);
    assert!(weak.upgrade().is_none());

    h.storage.set(USER_KEY, "{}").unwrap();
    tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .expect("listener should exit once the store is gone")
        .unwrap();
}

#[tokio::test]
async fn storage_listener_is_spawned_once() {
    let (backend, h) = setup().await;
    let writer = h.storage.open();
    let store = SessionStore::new(h.api.clone());
    store.spawn_storage_listener();
    store.spawn_storage_listener();

    writer.set(ACCESS_TOKEN_KEY, "a-1").unwrap();

    assert!(eventually(|| store.user() == Some(alice())).await);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(backend.me.get(), 1);
}
