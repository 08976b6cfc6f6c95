//! Portal client configuration parsed from environment variables.

use std::time::Duration;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000/api";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_SIGN_IN_PATH: &str = "/sign-in";

/// Errors produced while building a [`PortalConfig`].
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    /// The base URL is not an absolute `http(s)` URL.
    #[error("invalid API base URL: {0}")]
    InvalidBaseUrl(String),
    /// A numeric setting could not be parsed.
    #[error("invalid value for {key}: {value}")]
    InvalidNumber { key: &'static str, value: String },
    /// The sign-in path is not absolute.
    #[error("sign-in path must start with '/': {0}")]
    InvalidSignInPath(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub request_secs: u64,
    pub connect_secs: u64,
}

impl Timeouts {
    #[must_use]
    pub fn request(self) -> Duration {
        Duration::from_secs(self.request_secs)
    }

    #[must_use]
    pub fn connect(self) -> Duration {
        Duration::from_secs(self.connect_secs)
    }
}

impl Default for Timeouts {
    fn default() -> Self {
        Self { request_secs: DEFAULT_REQUEST_TIMEOUT_SECS, connect_secs: DEFAULT_CONNECT_TIMEOUT_SECS }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortalConfig {
    /// Backend base URL without a trailing slash.
    pub api_base_url: String,
    pub timeouts: Timeouts,
    /// Entry point the navigator is sent to on logout or session teardown.
    pub sign_in_path: String,
}

impl PortalConfig {
    /// Build a config pointing at `base_url` with default timeouts.
    ///
    /// # Errors
    ///
    /// Returns an error if `base_url` is not an `http(s)` URL.
    pub fn new(base_url: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            api_base_url: normalize_base_url(base_url)?,
            timeouts: Timeouts::default(),
            sign_in_path: DEFAULT_SIGN_IN_PATH.to_owned(),
        })
    }

    /// Build typed config from environment variables.
    ///
    /// Optional:
    /// - `PORTAL_API_BASE_URL`: default `http://localhost:8000/api`
    /// - `PORTAL_REQUEST_TIMEOUT_SECS`: default 10
    /// - `PORTAL_CONNECT_TIMEOUT_SECS`: default 10
    /// - `PORTAL_SIGN_IN_PATH`: default `/sign-in`
    ///
    /// # Errors
    ///
    /// Returns an error if a value is present but malformed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`PortalConfig::from_env`], reading values through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns an error if a value is present but malformed.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let raw_base = lookup("PORTAL_API_BASE_URL")
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_owned());
        let api_base_url = normalize_base_url(&raw_base)?;

        let timeouts = Timeouts {
            request_secs: parse_secs(&lookup, "PORTAL_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS)?,
            connect_secs: parse_secs(&lookup, "PORTAL_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT_SECS)?,
        };

        let sign_in_path = match lookup("PORTAL_SIGN_IN_PATH") {
            Some(raw) => validate_sign_in_path(&raw)?,
            None => DEFAULT_SIGN_IN_PATH.to_owned(),
        };

        Ok(Self { api_base_url, timeouts, sign_in_path })
    }

    /// Replace the sign-in entry point.
    ///
    /// # Errors
    ///
    /// Returns an error if `path` does not start with `/`.
    pub fn with_sign_in_path(mut self, path: &str) -> Result<Self, ConfigError> {
        self.sign_in_path = validate_sign_in_path(path)?;
        Ok(self)
    }

    /// Join an endpoint path (which starts with `/`) onto the base URL.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_base_url, path)
    }
}

fn normalize_base_url(raw: &str) -> Result<String, ConfigError> {
    let trimmed = raw.trim().trim_end_matches('/');
    let valid = ["http://", "https://"]
        .iter()
        .any(|scheme| trimmed.len() > scheme.len() && trimmed.starts_with(scheme));
    if !valid {
        return Err(ConfigError::InvalidBaseUrl(raw.to_owned()));
    }
    Ok(trimmed.to_owned())
}

fn validate_sign_in_path(raw: &str) -> Result<String, ConfigError> {
    let trimmed = raw.trim();
    if trimmed.starts_with('/') {
        Ok(trimmed.to_owned())
    } else {
        Err(ConfigError::InvalidSignInPath(raw.to_owned()))
    }
}

fn parse_secs<F>(lookup: &F, key: &'static str, default: u64) -> Result<u64, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(default),
        Some(value) => match value.trim().parse::<u64>() {
            Ok(secs) if secs > 0 => Ok(secs),
            _ => Err(ConfigError::InvalidNumber { key, value }),
        },
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
