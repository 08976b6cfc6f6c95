//! Errors produced by the HTTP access layer.

use serde_json::Value;

use crate::storage::StorageError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The underlying HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),

    /// The request exceeded the configured timeout.
    #[error("request timed out")]
    Timeout,

    /// Connection, TLS or protocol failure before a response arrived.
    #[error("http request failed: {0}")]
    Transport(String),

    /// The backend answered with a non-success status.
    #[error("request failed: HTTP {status}")]
    Status { status: u16, body: String },

    /// A request body could not be serialized.
    #[error("request body encode failed: {0}")]
    Encode(String),

    /// A success response body did not have the expected shape.
    #[error("response decode failed: {0}")]
    Decode(String),

    /// Authentication could not be recovered. Credentials were cleared and the
    /// navigator was sent to the sign-in entry point.
    #[error("session expired")]
    SessionExpired(#[source] Box<ApiError>),

    /// Persisted credentials could not be written.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl ApiError {
    pub(crate) fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() { Self::Timeout } else { Self::Transport(err.to_string()) }
    }

    /// HTTP status behind this error, looking through `SessionExpired`.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::SessionExpired(inner) => inner.status(),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_session_expired(&self) -> bool {
        matches!(self, Self::SessionExpired(_))
    }

    /// Human-readable message from a JSON error body.
    ///
    /// Understands the shapes a REST backend commonly sends: a `detail` or
    /// `message` string, `non_field_errors`, or a map of field name to a list
    /// of messages (first one wins).
    #[must_use]
    pub fn detail(&self) -> Option<String> {
        match self {
            Self::Status { body, .. } => extract_detail(body),
            Self::SessionExpired(inner) => inner.detail(),
            _ => None,
        }
    }

    /// [`ApiError::detail`] or `fallback`.
    #[must_use]
    pub fn user_message(&self, fallback: &str) -> String {
        self.detail().unwrap_or_else(|| fallback.to_owned())
    }
}

fn extract_detail(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    let object = value.as_object()?;

    for key in ["detail", "message", "error"] {
        if let Some(text) = object.get(key).and_then(first_text) {
            return Some(text);
        }
    }
    if let Some(text) = object.get("non_field_errors").and_then(first_text) {
        return Some(text);
    }
    object.values().find_map(first_text)
}

fn first_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Array(items) => items.iter().find_map(first_text),
        _ => None,
    }
}

#[cfg(test)]
#[path = "error_test.rs"]
mod tests;
