//! City management: REST calls against `/core/cities/` and the list screen
//! model built on top of them.

mod notice;
mod table;
mod view;

pub use notice::{Notice, Severity};
pub use table::{DEFAULT_ROWS_PER_PAGE, ROWS_PER_PAGE_OPTIONS, TableState};
pub use view::{CitiesView, CityRow, Editing};

use serde::{Deserialize, Serialize};

use crate::http::{ApiClient, ApiError, endpoints};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct City {
    pub id: u64,
    pub name: String,
}

#[derive(Serialize)]
struct CityPayload<'a> {
    name: &'a str,
}

/// Thin typed wrapper over the city endpoints.
#[derive(Clone)]
pub struct CitiesApi {
    api: ApiClient,
}

impl CitiesApi {
    #[must_use]
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    /// # Errors
    ///
    /// See [`ApiClient::execute`].
    pub async fn list(&self) -> Result<Vec<City>, ApiError> {
        tracing::info!("fetching cities");
        let cities: Vec<City> = self.api.get_json(endpoints::CITIES).await?;
        tracing::info!(count = cities.len(), "fetched cities");
        Ok(cities)
    }

    /// # Errors
    ///
    /// See [`ApiClient::execute`].
    pub async fn create(&self, name: &str) -> Result<City, ApiError> {
        tracing::info!(%name, "creating city");
        let city: City = self.api.post_json(endpoints::CITIES, &CityPayload { name }).await?;
        tracing::info!(id = city.id, %name, "created city");
        Ok(city)
    }

    /// # Errors
    ///
    /// See [`ApiClient::execute`].
    pub async fn update(&self, id: u64, name: &str) -> Result<City, ApiError> {
        tracing::info!(id, %name, "updating city");
        let city = self.api.put_json(&endpoints::city(id), &CityPayload { name }).await?;
        tracing::info!(id, "updated city");
        Ok(city)
    }

    /// # Errors
    ///
    /// See [`ApiClient::execute`].
    pub async fn delete(&self, id: u64) -> Result<(), ApiError> {
        tracing::info!(id, "deleting city");
        self.api.delete(&endpoints::city(id)).await?;
        tracing::info!(id, "deleted city");
        Ok(())
    }
}
