//! JSON-file storage backing used by the CLI between invocations.
//!
//! DESIGN
//! ======
//! The whole map is rewritten on every batch: read, mutate, write to a
//! sibling temp file, rename over the original. A rename is atomic on the
//! same filesystem, so a crash mid-write leaves either the old map or the new
//! one. Events are only broadcast to handles in this process; other processes
//! pick up changes on their next read.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tokio::sync::broadcast;
use uuid::Uuid;

use super::{Change, EVENT_CAPACITY, Storage, StorageError, StorageEvent, publish};

struct Backing {
    path: PathBuf,
    write_lock: Mutex<()>,
    events: broadcast::Sender<StorageEvent>,
}

#[derive(Clone)]
pub struct FileStorage {
    backing: Arc<Backing>,
    origin: Uuid,
}

impl FileStorage {
    /// Use `path` as the storage file. It is created on first write.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            backing: Arc::new(Backing { path: path.into(), write_lock: Mutex::new(()), events }),
            origin: Uuid::new_v4(),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.backing.path
    }

    fn read_map(&self) -> Result<BTreeMap<String, String>, StorageError> {
        match fs::read(&self.backing.path) {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(BTreeMap::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn write_map(&self, map: &BTreeMap<String, String>) -> Result<(), StorageError> {
        let path = &self.backing.path;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(map)?)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }
}

impl Storage for FileStorage {
    fn origin(&self) -> Uuid {
        self.origin
    }

    fn get(&self, key: &str) -> Option<String> {
        match self.read_map() {
            Ok(mut map) => map.remove(key),
            Err(e) => {
                tracing::warn!(error = %e, path = %self.backing.path.display(), "storage file unreadable");
                None
            }
        }
    }

    fn apply(&self, changes: &[Change<'_>]) -> Result<(), StorageError> {
        let _guard = self
            .backing
            .write_lock
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let mut map = self.read_map()?;
        for change in changes {
            match *change {
                Change::Set { key, value } => {
                    map.insert(key.to_owned(), value.to_owned());
                }
                Change::Remove { key } => {
                    map.remove(key);
                }
            }
        }
        self.write_map(&map)?;
        // Published under the lock so event order matches commit order.
        publish(&self.backing.events, changes, self.origin);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StorageEvent> {
        self.backing.events.subscribe()
    }
}

#[cfg(test)]
#[path = "file_test.rs"]
mod tests;
