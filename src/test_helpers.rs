//! Shared fixtures for unit tests: an in-process mock backend and a client
//! wired to in-memory storage and a recording navigator.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::Router;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use serde_json::Value;

use crate::config::PortalConfig;
use crate::http::ApiClient;
use crate::navigation::RecordingNavigator;
use crate::session::{User, UserId};
use crate::storage::{CredentialStore, MemoryStorage};

/// Serve `router` on an ephemeral local port and return its base URL.
pub async fn spawn_backend(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("mock backend should bind");
    let addr = listener.local_addr().expect("mock backend address");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("mock backend failed");
    });
    format!("http://{addr}")
}

pub fn json_response(status: StatusCode, body: Value) -> Response {
    (status, axum::Json(body)).into_response()
}

pub fn bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_owned)
}

/// Request counter shared between a mock handler and the test body.
#[derive(Clone, Default)]
pub struct Hits(Arc<AtomicUsize>);

impl Hits {
    pub fn bump(&self) -> usize {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

pub fn alice() -> User {
    User {
        id: UserId::Number(1),
        username: "alice".into(),
        email: "alice@example.test".into(),
        first_name: Some("Alice".into()),
        last_name: Some("Liddell".into()),
    }
}

pub struct Harness {
    pub storage: MemoryStorage,
    pub navigator: Arc<RecordingNavigator>,
    pub api: ApiClient,
}

pub fn harness(base_url: &str) -> Harness {
    harness_with_storage(base_url, MemoryStorage::new())
}

pub fn harness_with_storage(base_url: &str, storage: MemoryStorage) -> Harness {
    harness_with_config(PortalConfig::new(base_url).expect("mock base URL"), storage)
}

pub fn harness_with_config(config: PortalConfig, storage: MemoryStorage) -> Harness {
    let navigator = Arc::new(RecordingNavigator::new());
    let credentials = CredentialStore::new(Arc::new(storage.clone()));
    let api = ApiClient::new(config, credentials, navigator.clone()).expect("client should build");
    Harness { storage, navigator, api }
}

/// Poll `check` until it holds or a short deadline passes.
pub async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + Duration::from_millis(500);
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    check()
}
