//! Navigation seam used for "teardown + navigate".
//!
//! The core never restarts anything itself. Logout and unrecoverable
//! authentication failures clear persisted credentials and then hand the
//! sign-in entry point to a [`Navigator`], which the embedding application
//! turns into a router-level redirect (or, for the CLI, a message telling the
//! user to sign in again).

use std::sync::Mutex;

pub trait Navigator: Send + Sync {
    /// Leave the current screen for `path`, discarding view-local state.
    fn redirect(&self, path: &str);
}

/// Navigator that only records the redirect in the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNavigator;

impl Navigator for TracingNavigator {
    fn redirect(&self, path: &str) {
        tracing::info!(%path, "redirect requested");
    }
}

/// Navigator that keeps every requested path, for hosts that poll for
/// pending redirects.
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    paths: Mutex<Vec<String>>,
}

impl RecordingNavigator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All redirects requested so far, oldest first.
    #[must_use]
    pub fn paths(&self) -> Vec<String> {
        self.lock().clone()
    }

    /// Most recent redirect, if any.
    #[must_use]
    pub fn last(&self) -> Option<String> {
        self.lock().last().cloned()
    }

    /// Remove and return the pending redirects.
    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.lock())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<String>> {
        self.paths
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl Navigator for RecordingNavigator {
    fn redirect(&self, path: &str) {
        self.lock().push(path.to_owned());
    }
}

#[cfg(test)]
#[path = "navigation_test.rs"]
mod tests;
