//! Client-side pagination state for list screens.

use std::ops::Range;

pub const ROWS_PER_PAGE_OPTIONS: [usize; 3] = [5, 10, 25];
pub const DEFAULT_ROWS_PER_PAGE: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableState {
    /// Zero-based page index.
    pub page: usize,
    pub rows_per_page: usize,
}

impl Default for TableState {
    fn default() -> Self {
        Self { page: 0, rows_per_page: DEFAULT_ROWS_PER_PAGE }
    }
}

impl TableState {
    pub fn set_page(&mut self, page: usize) {
        self.page = page;
    }

    /// Change the page size and go back to the first page. Zero is ignored.
    pub fn set_rows_per_page(&mut self, rows: usize) {
        if rows == 0 {
            return;
        }
        self.rows_per_page = rows;
        self.page = 0;
    }

    /// Index range of the current page within a list of `len` rows.
    #[must_use]
    pub fn window(&self, len: usize) -> Range<usize> {
        let start = self.page.saturating_mul(self.rows_per_page).min(len);
        let end = start.saturating_add(self.rows_per_page).min(len);
        start..end
    }

    /// 1-based serial number of the `index`-th row on the current page.
    #[must_use]
    pub fn serial(&self, index: usize) -> usize {
        self.page * self.rows_per_page + index + 1
    }

    #[must_use]
    pub fn page_count(&self, len: usize) -> usize {
        len.div_ceil(self.rows_per_page)
    }
}

#[cfg(test)]
#[path = "table_test.rs"]
mod tests;
