//! Typed access to the persisted credential pair and identity snapshot.

use std::sync::Arc;

use tokio::sync::broadcast;
use uuid::Uuid;

use super::{ACCESS_TOKEN_KEY, Change, REFRESH_TOKEN_KEY, Storage, StorageError, StorageEvent, USER_KEY};
use crate::session::{LoginResponse, User};

/// Facade over a [`Storage`] handle that knows the credential key layout.
#[derive(Clone)]
pub struct CredentialStore {
    storage: Arc<dyn Storage>,
}

impl CredentialStore {
    #[must_use]
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    #[must_use]
    pub fn origin(&self) -> Uuid {
        self.storage.origin()
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<StorageEvent> {
        self.storage.subscribe()
    }

    #[must_use]
    pub fn access_token(&self) -> Option<String> {
        self.storage.get(ACCESS_TOKEN_KEY).filter(|t| !t.is_empty())
    }

    #[must_use]
    pub fn refresh_token(&self) -> Option<String> {
        self.storage.get(REFRESH_TOKEN_KEY).filter(|t| !t.is_empty())
    }

    /// Presence check only; the server decides whether the token is valid.
    #[must_use]
    pub fn has_token(&self) -> bool {
        self.access_token().is_some()
    }

    /// Cached identity used as an optimistic seed. Malformed snapshots read
    /// as absent.
    #[must_use]
    pub fn stored_user(&self) -> Option<User> {
        let raw = self.storage.get(USER_KEY)?;
        match serde_json::from_str(&raw) {
            Ok(user) => Some(user),
            Err(e) => {
                tracing::warn!(error = %e, "ignoring malformed stored user snapshot");
                None
            }
        }
    }

    /// Persist tokens and identity from a successful login in one batch.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage backing cannot be written.
    pub fn store_login(&self, login: &LoginResponse) -> Result<(), StorageError> {
        let user = serde_json::to_string(&login.user_data)?;
        self.storage.apply(&[
            Change::Set { key: ACCESS_TOKEN_KEY, value: &login.access },
            Change::Set { key: REFRESH_TOKEN_KEY, value: &login.refresh },
            Change::Set { key: USER_KEY, value: &user },
        ])
    }

    /// # Errors
    ///
    /// Returns an error if the storage backing cannot be written.
    pub fn store_user(&self, user: &User) -> Result<(), StorageError> {
        let raw = serde_json::to_string(user)?;
        self.storage.set(USER_KEY, &raw)
    }

    /// Persist a freshly minted access token, and a rotated refresh token
    /// when the server issued one.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage backing cannot be written.
    pub fn store_refreshed(&self, access: &str, refresh: Option<&str>) -> Result<(), StorageError> {
        match refresh {
            Some(refresh) => self.storage.apply(&[
                Change::Set { key: ACCESS_TOKEN_KEY, value: access },
                Change::Set { key: REFRESH_TOKEN_KEY, value: refresh },
            ]),
            None => self.storage.set(ACCESS_TOKEN_KEY, access),
        }
    }

    /// Remove the credential pair and identity snapshot together.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage backing cannot be written; in that
    /// case nothing was removed.
    pub fn clear(&self) -> Result<(), StorageError> {
        self.storage.apply(&[
            Change::Remove { key: ACCESS_TOKEN_KEY },
            Change::Remove { key: REFRESH_TOKEN_KEY },
            Change::Remove { key: USER_KEY },
        ])
    }
}

#[cfg(test)]
#[path = "credentials_test.rs"]
mod tests;
