//! Persisted client-local key/value storage.
//!
//! DESIGN
//! ======
//! Credentials live outside the session object, in a small string key/value
//! store shared by every running instance of the application (the equivalent
//! of browser local storage shared across tabs). Every handle carries an
//! `origin` id; each committed change is broadcast as a [`StorageEvent`]
//! tagged with the origin that wrote it, so listeners can tell their own
//! writes from another instance's.
//!
//! Writes go through [`Storage::apply`], which commits a batch of changes
//! under one lock. Clearing the credential pair and identity snapshot is a
//! single batch, so no observer ever sees a partially cleared state.

mod credentials;
mod file;
mod memory;

pub use credentials::CredentialStore;
pub use file::FileStorage;
pub use memory::MemoryStorage;

use tokio::sync::broadcast;
use uuid::Uuid;

pub const ACCESS_TOKEN_KEY: &str = "access_token";
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";
pub const USER_KEY: &str = "user";

/// Capacity of the per-backing storage event channel.
pub(crate) const EVENT_CAPACITY: usize = 64;

// =============================================================================
// ERROR TYPE
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage file is not a valid key/value map: {0}")]
    Corrupt(#[from] serde_json::Error),
}

// =============================================================================
// CHANGES AND EVENTS
// =============================================================================

/// One mutation inside a [`Storage::apply`] batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change<'a> {
    Set { key: &'a str, value: &'a str },
    Remove { key: &'a str },
}

impl<'a> Change<'a> {
    #[must_use]
    pub fn key(&self) -> &'a str {
        match *self {
            Self::Set { key, .. } | Self::Remove { key } => key,
        }
    }

    #[must_use]
    pub fn value(&self) -> Option<&'a str> {
        match *self {
            Self::Set { value, .. } => Some(value),
            Self::Remove { .. } => None,
        }
    }
}

/// Notification that a key changed. `new_value` is `None` on removal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageEvent {
    pub key: String,
    pub new_value: Option<String>,
    pub origin: Uuid,
}

impl StorageEvent {
    pub(crate) fn from_change(change: &Change<'_>, origin: Uuid) -> Self {
        Self {
            key: change.key().to_owned(),
            new_value: change.value().map(str::to_owned),
            origin,
        }
    }
}

// =============================================================================
// STORAGE TRAIT
// =============================================================================

/// String key/value storage shared across application instances.
pub trait Storage: Send + Sync {
    /// Identifier of the instance this handle writes as.
    fn origin(&self) -> Uuid;

    fn get(&self, key: &str) -> Option<String>;

    /// Commit all `changes` together, then broadcast one event per change.
    /// Events from concurrent batches are delivered in commit order.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing medium cannot be written. On error no
    /// change in the batch is visible.
    fn apply(&self, changes: &[Change<'_>]) -> Result<(), StorageError>;

    /// Receive every change committed through any handle of this backing.
    fn subscribe(&self) -> broadcast::Receiver<StorageEvent>;

    /// # Errors
    ///
    /// See [`Storage::apply`].
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.apply(&[Change::Set { key, value }])
    }

    /// # Errors
    ///
    /// See [`Storage::apply`].
    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.apply(&[Change::Remove { key }])
    }
}

/// Broadcast events for a committed batch. Dropped when nobody listens.
pub(crate) fn publish(events: &broadcast::Sender<StorageEvent>, changes: &[Change<'_>], origin: Uuid) {
    for change in changes {
        let _ = events.send(StorageEvent::from_change(change, origin));
    }
}
