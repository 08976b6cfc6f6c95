//! State behind the "manage cities" screen.
//!
//! DESIGN
//! ======
//! The view owns a local copy of the city list and mutates it only after the
//! backend confirms a write. Filtering and pagination are computed on read
//! from that copy; nothing is re-fetched after create, update or delete.
//!
//! Every mutating operation returns the [`Notice`] the screen should show.
//! Backend failures never escape as errors; they are logged and turned into
//! an error notice so the caller's only job is rendering.

use super::notice::Notice;
use super::table::TableState;
use super::{CitiesApi, City};

pub const LOAD_FAILED_MESSAGE: &str = "Failed to load cities";
pub const NAME_REQUIRED_MESSAGE: &str = "Please enter a city name";
pub const ADDED_MESSAGE: &str = "City added successfully";
pub const ADD_FAILED_MESSAGE: &str = "Failed to add city";
pub const UPDATED_MESSAGE: &str = "City updated successfully";
pub const UPDATE_FAILED_MESSAGE: &str = "Failed to update city";
pub const DELETED_MESSAGE: &str = "City deleted successfully";
pub const DELETE_FAILED_MESSAGE: &str = "Failed to delete city";

/// One rendered table row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CityRow {
    /// 1-based position across the filtered list.
    pub serial: usize,
    pub city: City,
}

/// The row currently being edited in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Editing {
    pub id: u64,
    pub name: String,
}

pub struct CitiesView {
    api: CitiesApi,
    pub cities: Vec<City>,
    pub loading: bool,
    pub filter_name: String,
    pub table: TableState,
    /// Contents of the "new city" input.
    pub city_name: String,
    pub editing: Option<Editing>,
    pub pending_delete: Option<u64>,
}

impl CitiesView {
    #[must_use]
    pub fn new(api: CitiesApi) -> Self {
        Self {
            api,
            cities: Vec::new(),
            loading: false,
            filter_name: String::new(),
            table: TableState::default(),
            city_name: String::new(),
            editing: None,
            pending_delete: None,
        }
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Replace the local list with the backend's. On failure the previous
    /// list is kept and an error notice is returned.
    pub async fn load(&mut self) -> Option<Notice> {
        self.loading = true;
        let result = self.api.list().await;
        self.loading = false;
        match result {
            Ok(cities) => {
                self.cities = cities;
                None
            }
            Err(e) => {
                tracing::warn!(error = %e, "loading cities failed");
                Some(Notice::error(LOAD_FAILED_MESSAGE))
            }
        }
    }

    /// Cities whose name contains the filter, ignoring case.
    #[must_use]
    pub fn filtered(&self) -> Vec<&City> {
        let needle = self.filter_name.to_lowercase();
        self.cities
            .iter()
            .filter(|c| c.name.to_lowercase().contains(&needle))
            .collect()
    }

    /// True when a non-empty filter matches nothing.
    #[must_use]
    pub fn not_found(&self) -> bool {
        !self.filter_name.is_empty() && self.filtered().is_empty()
    }

    /// The filtered rows visible on the current page.
    #[must_use]
    pub fn page_rows(&self) -> Vec<CityRow> {
        let filtered = self.filtered();
        let window = self.table.window(filtered.len());
        filtered[window]
            .iter()
            .enumerate()
            .map(|(i, city)| CityRow { serial: self.table.serial(i), city: (*city).clone() })
            .collect()
    }

    pub fn set_filter(&mut self, filter: impl Into<String>) {
        self.filter_name = filter.into();
    }

    // =========================================================================
    // Create
    // =========================================================================

    pub async fn add_city(&mut self) -> Notice {
        let name = self.city_name.trim().to_owned();
        if name.is_empty() {
            return Notice::warning(NAME_REQUIRED_MESSAGE);
        }
        match self.api.create(&name).await {
            Ok(city) => {
                self.cities.push(city);
                self.city_name.clear();
                Notice::success(ADDED_MESSAGE)
            }
            Err(e) => {
                tracing::warn!(error = %e, %name, "adding city failed");
                Notice::error(ADD_FAILED_MESSAGE)
            }
        }
    }

    // =========================================================================
    // Update
    // =========================================================================

    /// Start editing `id`, seeding the input with its current name.
    /// Returns false when the id is not in the list.
    pub fn begin_edit(&mut self, id: u64) -> bool {
        let Some(city) = self.cities.iter().find(|c| c.id == id) else {
            return false;
        };
        self.editing = Some(Editing { id, name: city.name.clone() });
        true
    }

    pub fn set_edit_name(&mut self, name: impl Into<String>) {
        if let Some(editing) = self.editing.as_mut() {
            editing.name = name.into();
        }
    }

    pub fn cancel_edit(&mut self) {
        self.editing = None;
    }

    /// Persist the edit in progress. Returns `None` when nothing is being
    /// edited. The edit stays open on failure.
    pub async fn save_edit(&mut self) -> Option<Notice> {
        let editing = self.editing.clone()?;
        let name = editing.name.trim();
        if name.is_empty() {
            return Some(Notice::warning(NAME_REQUIRED_MESSAGE));
        }
        match self.api.update(editing.id, name).await {
            Ok(updated) => {
                if let Some(slot) = self.cities.iter_mut().find(|c| c.id == editing.id) {
                    *slot = updated;
                }
                self.editing = None;
                Some(Notice::success(UPDATED_MESSAGE))
            }
            Err(e) => {
                tracing::warn!(error = %e, id = editing.id, "updating city failed");
                Some(Notice::error(UPDATE_FAILED_MESSAGE))
            }
        }
    }

    // =========================================================================
    // Delete
    // =========================================================================

    /// Open the confirmation dialog for `id`.
    pub fn request_delete(&mut self, id: u64) {
        self.pending_delete = Some(id);
    }

    pub fn cancel_delete(&mut self) {
        self.pending_delete = None;
    }

    /// Delete the city awaiting confirmation. The row is removed only after
    /// the backend confirms; on failure the row and the dialog stay.
    pub async fn confirm_delete(&mut self) -> Option<Notice> {
        let id = self.pending_delete?;
        match self.api.delete(id).await {
            Ok(()) => {
                self.cities.retain(|c| c.id != id);
                self.pending_delete = None;
                Some(Notice::success(DELETED_MESSAGE))
            }
            Err(e) => {
                tracing::warn!(error = %e, id, "deleting city failed");
                Some(Notice::error(DELETE_FAILED_MESSAGE))
            }
        }
    }
}

#[cfg(test)]
#[path = "view_test.rs"]
mod tests;
