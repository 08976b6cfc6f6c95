//! Application root: the one place where storage, HTTP client, session and
//! views are wired together.
//!
//! DESIGN
//! ======
//! Nothing in the crate reaches for global state. An embedding application
//! builds one `AppContext` per instance ("tab") and hands clones of its parts
//! to whatever needs them. Two contexts over the same storage backing behave
//! like two browser tabs sharing local storage.

use std::sync::Arc;

use crate::cities::{CitiesApi, CitiesView};
use crate::config::PortalConfig;
use crate::http::{ApiClient, ApiError};
use crate::navigation::Navigator;
use crate::session::SessionStore;
use crate::storage::{CredentialStore, Storage};

#[derive(Clone)]
pub struct AppContext {
    pub config: PortalConfig,
    pub api: ApiClient,
    pub session: SessionStore,
    pub cities: CitiesApi,
}

impl AppContext {
    /// Wire a context without starting any background work. The session
    /// stays uninitialized until [`SessionStore::check_auth`] runs.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::HttpClientBuild`] if the HTTP client cannot be
    /// constructed.
    pub fn new(
        config: PortalConfig,
        storage: Arc<dyn Storage>,
        navigator: Arc<dyn Navigator>,
    ) -> Result<Self, ApiError> {
        let credentials = CredentialStore::new(storage);
        let api = ApiClient::new(config.clone(), credentials, navigator)?;
        let session = SessionStore::new(api.clone());
        let cities = CitiesApi::new(api.clone());
        Ok(Self { config, api, session, cities })
    }

    /// Wire a context, start the storage listener and schedule the initial
    /// reconciliation. Must be called inside a tokio runtime.
    ///
    /// # Errors
    ///
    /// See [`AppContext::new`].
    pub fn launch(
        config: PortalConfig,
        storage: Arc<dyn Storage>,
        navigator: Arc<dyn Navigator>,
    ) -> Result<Self, ApiError> {
        let context = Self::new(config, storage, navigator)?;
        context.session.spawn_storage_listener();
        context.session.spawn_check_auth();
        tracing::debug!(base_url = %context.config.api_base_url, "application context launched");
        Ok(context)
    }

    /// Fresh state for the cities screen.
    #[must_use]
    pub fn cities_view(&self) -> CitiesView {
        CitiesView::new(self.cities.clone())
    }
}

#[cfg(test)]
#[path = "context_test.rs"]
mod tests;
