//! In-process storage backing.
//!
//! A `MemoryStorage` handle is one "tab": handles created with
//! [`MemoryStorage::open`] share the same map and event channel but each
//! writes with its own origin id.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::broadcast;
use uuid::Uuid;

use super::{Change, EVENT_CAPACITY, Storage, StorageError, StorageEvent, publish};

struct Backing {
    entries: Mutex<HashMap<String, String>>,
    events: broadcast::Sender<StorageEvent>,
}

#[derive(Clone)]
pub struct MemoryStorage {
    backing: Arc<Backing>,
    origin: Uuid,
}

impl MemoryStorage {
    /// Create an empty backing and return its first handle.
    #[must_use]
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            backing: Arc::new(Backing { entries: Mutex::new(HashMap::new()), events }),
            origin: Uuid::new_v4(),
        }
    }

    /// Open another handle onto the same backing with a fresh origin.
    #[must_use]
    pub fn open(&self) -> Self {
        Self { backing: Arc::clone(&self.backing), origin: Uuid::new_v4() }
    }

    /// Number of keys currently stored.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.backing
            .entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl Storage for MemoryStorage {
    fn origin(&self) -> Uuid {
        self.origin
    }

    fn get(&self, key: &str) -> Option<String> {
        self.lock().get(key).cloned()
    }

    fn apply(&self, changes: &[Change<'_>]) -> Result<(), StorageError> {
        let mut entries = self.lock();
        for change in changes {
            match *change {
                Change::Set { key, value } => {
                    entries.insert(key.to_owned(), value.to_owned());
                }
                Change::Remove { key } => {
                    entries.remove(key);
                }
            }
        }
        // Published under the lock so event order matches commit order.
        publish(&self.backing.events, changes, self.origin);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StorageEvent> {
        self.backing.events.subscribe()
    }
}

#[cfg(test)]
#[path = "memory_test.rs"]
mod tests;
