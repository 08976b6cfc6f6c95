//! HTTP access layer: the single point of egress for backend calls.
//!
//! DESIGN
//! ======
//! Every call goes through [`ApiClient::execute`], which layers two
//! behaviors onto the request:
//!
//! - Outgoing: when the request is authenticated and an access token is
//!   persisted, attach it as `Authorization: Bearer <token>`.
//! - Incoming: a 401 on a request that has not been retried flips the
//!   request's `retried` flag, exchanges the persisted refresh token for a
//!   new access token, and re-issues the request once. A failed refresh, or
//!   a second 401, tears the session down (credentials cleared, navigator
//!   sent to sign-in) and surfaces [`ApiError::SessionExpired`].
//!
//! The retry flag lives on the request, not on the client, so each original
//! request costs at most one extra round trip and an invalid refresh token
//! can never cause a refresh loop.
//!
//! ERROR HANDLING
//! ==============
//! Transport failures and timeouts surface like any other rejected call.
//! When no refresh token is persisted, a 401 is returned as-is and nothing is
//! cleared: there is nothing to recover and nothing to tear down.

pub mod endpoints;
mod error;

pub use error::ApiError;

use std::sync::Arc;

use reqwest::Method;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::PortalConfig;
use crate::navigation::Navigator;
use crate::storage::CredentialStore;

const UNAUTHORIZED: u16 = 401;

// =============================================================================
// REQUEST / RESPONSE
// =============================================================================

/// Whether a request carries the persisted access token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Auth {
    /// Attach the bearer token and recover from 401 via refresh.
    Bearer,
    /// No bearer token and no refresh; used for the token endpoints.
    Anonymous,
}

#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    path: String,
    body: Option<Value>,
    auth: Auth,
    retried: bool,
}

impl ApiRequest {
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self { method, path: path.into(), body: None, auth: Auth::Bearer, retried: false }
    }

    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    #[must_use]
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    #[must_use]
    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    #[must_use]
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Attach a JSON body.
    ///
    /// # Errors
    ///
    /// Returns an error if `body` cannot be serialized.
    pub fn json(mut self, body: &impl Serialize) -> Result<Self, ApiError> {
        self.body = Some(serde_json::to_value(body).map_err(|e| ApiError::Encode(e.to_string()))?);
        Ok(self)
    }

    #[must_use]
    pub fn anonymous(mut self) -> Self {
        self.auth = Auth::Anonymous;
        self
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }
}

/// A completed response with its body read.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

impl ApiResponse {
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Deserialize the body.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Decode`] if the body does not match `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        serde_json::from_str(&self.body).map_err(|e| ApiError::Decode(e.to_string()))
    }

    fn into_result(self) -> Result<Self, ApiError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(ApiError::Status { status: self.status, body: self.body })
        }
    }
}

#[derive(Serialize)]
struct RefreshRequest<'a> {
    refresh: &'a str,
}

#[derive(Deserialize)]
struct RefreshResponse {
    access: String,
    #[serde(default)]
    refresh: Option<String>,
}

// =============================================================================
// CLIENT
// =============================================================================

/// Configured backend client. Cheap to clone; clones share credentials and
/// the navigator.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ApiInner>,
}

struct ApiInner {
    http: reqwest::Client,
    config: PortalConfig,
    credentials: CredentialStore,
    navigator: Arc<dyn Navigator>,
}

impl ApiClient {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(
        config: PortalConfig,
        credentials: CredentialStore,
        navigator: Arc<dyn Navigator>,
    ) -> Result<Self, ApiError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.timeouts.request())
            .connect_timeout(config.timeouts.connect())
            .build()
            .map_err(|e| ApiError::HttpClientBuild(e.to_string()))?;
        Ok(Self { inner: Arc::new(ApiInner { http, config, credentials, navigator }) })
    }

    #[must_use]
    pub fn config(&self) -> &PortalConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn credentials(&self) -> &CredentialStore {
        &self.inner.credentials
    }

    /// Send the navigator to the configured sign-in entry point.
    pub fn navigate_to_sign_in(&self) {
        self.inner.navigator.redirect(&self.inner.config.sign_in_path);
    }

    /// Issue `request`, recovering once from an expired access token.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Status`] for non-success responses,
    /// [`ApiError::SessionExpired`] when authentication could not be
    /// recovered, and transport/timeout errors as they occur.
    pub async fn execute(&self, mut request: ApiRequest) -> Result<ApiResponse, ApiError> {
        loop {
            let response = self.send(&request).await?;
            if response.status != UNAUTHORIZED || request.auth == Auth::Anonymous {
                return response.into_result();
            }

            if request.retried {
                tracing::warn!(path = %request.path, "401 after token refresh; ending session");
                self.teardown();
                return Err(ApiError::SessionExpired(Box::new(ApiError::Status {
                    status: response.status,
                    body: response.body,
                })));
            }
            request.retried = true;

            let Some(refresh) = self.inner.credentials.refresh_token() else {
                return response.into_result();
            };

            match self.refresh_access_token(&refresh).await {
                Ok(tokens) => {
                    self.inner
                        .credentials
                        .store_refreshed(&tokens.access, tokens.refresh.as_deref())?;
                    tracing::info!(path = %request.path, "access token refreshed; retrying request");
                }
                Err(e) => {
                    tracing::warn!(error = %e, path = %request.path, "token refresh failed; ending session");
                    self.teardown();
                    return Err(ApiError::SessionExpired(Box::new(e)));
                }
            }
        }
    }

    /// `GET` and deserialize.
    ///
    /// # Errors
    ///
    /// See [`ApiClient::execute`] and [`ApiResponse::json`].
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.execute(ApiRequest::get(path)).await?.json()
    }

    /// `POST` a JSON body and deserialize the response.
    ///
    /// # Errors
    ///
    /// See [`ApiClient::execute`] and [`ApiResponse::json`].
    pub async fn post_json<T: DeserializeOwned>(&self, path: &str, body: &impl Serialize) -> Result<T, ApiError> {
        self.execute(ApiRequest::post(path).json(body)?).await?.json()
    }

    /// `PUT` a JSON body and deserialize the response.
    ///
    /// # Errors
    ///
    /// See [`ApiClient::execute`] and [`ApiResponse::json`].
    pub async fn put_json<T: DeserializeOwned>(&self, path: &str, body: &impl Serialize) -> Result<T, ApiError> {
        self.execute(ApiRequest::put(path).json(body)?).await?.json()
    }

    /// `DELETE`, ignoring any response body.
    ///
    /// # Errors
    ///
    /// See [`ApiClient::execute`].
    pub async fn delete(&self, path: &str) -> Result<(), ApiError> {
        self.execute(ApiRequest::delete(path)).await?;
        Ok(())
    }

    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, ApiError> {
        let url = self.inner.config.url(&request.path);
        tracing::debug!(method = %request.method, path = %request.path, retried = request.retried, "dispatching request");

        let mut builder = self.inner.http.request(request.method.clone(), url);
        if request.auth == Auth::Bearer {
            if let Some(token) = self.inner.credentials.access_token() {
                builder = builder.bearer_auth(token);
            }
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(ApiError::from_reqwest)?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(ApiError::from_reqwest)?;
        Ok(ApiResponse { status, body })
    }

    async fn refresh_access_token(&self, refresh: &str) -> Result<RefreshResponse, ApiError> {
        let request = ApiRequest::post(endpoints::TOKEN_REFRESH)
            .anonymous()
            .json(&RefreshRequest { refresh })?;
        self.send(&request).await?.into_result()?.json()
    }

    /// Clear persisted credentials and send the navigator to sign-in.
    fn teardown(&self) {
        if let Err(e) = self.inner.credentials.clear() {
            tracing::warn!(error = %e, "failed to clear credentials during teardown");
        }
        self.navigate_to_sign_in();
    }
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
