//! Page windows and navigation over the places catalogue.

use serde::Serialize;
use thiserror::Error;

use crate::{InvalidArgument, PlaceRecord};

/// Validated `(limit, offset)` window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    /// Number of records wanted.
    pub limit: usize,
    /// Number of leading records to skip.
    pub offset: usize,
}

impl PageRequest {
    /// Validate signed caller input.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidArgument`] when either value is negative.
    pub fn new(limit: i64, offset: i64) -> Result<Self, InvalidArgument> {
        let offset = usize::try_from(offset).map_err(|_| InvalidArgument::NegativeOffset(offset))?;
        let limit = usize::try_from(limit).map_err(|_| InvalidArgument::NegativeLimit(limit))?;
        Ok(Self { limit, offset })
    }

    /// Number of records that must be materialized to serve this window.
    #[must_use]
    pub const fn target(&self) -> usize {
        self.offset.saturating_add(self.limit)
    }
}

/// One window of places.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PlacePage {
    /// Records in backend sort order.
    pub records: Vec<PlaceRecord>,
    /// Backend-reported number of matching documents.
    pub total_matched: u64,
    /// Records materialized before the window was cut.
    pub fetched: usize,
}

impl PlacePage {
    /// Number of records in the window.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the window is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Requested page number outside the catalogue.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NavigationError {
    /// Page sizes must be positive.
    #[error("page size must be positive")]
    ZeroPageSize,
    /// Page is zero or past the last page.
    #[error("invalid 'page' value: {page} (expected 1..={total_pages})")]
    PageOutOfRange {
        /// Requested 1-based page.
        page: u64,
        /// Number of pages available.
        total_pages: u64,
    },
}

/// Links between fixed-size pages of a catalogue.
///
/// Previous links are only present away from the first page of a multi-page
/// catalogue; next links only before the last page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageNavigation {
    /// Current 1-based page.
    #[serde(skip)]
    pub page: u64,
    /// Number of pages.
    #[serde(skip)]
    pub total_pages: u64,
    /// First page link.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_page: Option<u64>,
    /// Previous page link.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prev_page: Option<u64>,
    /// Next page link.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_page: Option<u64>,
    /// Last page link.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_page: Option<u64>,
}

impl PageNavigation {
    /// Compute links for `page` in a catalogue of `total` records.
    ///
    /// # Errors
    ///
    /// Returns [`NavigationError`] when `page_size` is zero or `page` is not
    /// in `1..=ceil(total / page_size)`.
    ///
    /// # Examples
    ///
    /// ```
    /// use places_core::PageNavigation;
    ///
    /// # fn main() -> Result<(), places_core::NavigationError> {
    /// let nav = PageNavigation::for_page(3, 10, 45)?;
    /// assert_eq!(nav.total_pages, 5);
    /// assert_eq!((nav.prev_page, nav.next_page), (Some(2), Some(4)));
    /// # Ok(())
    /// # }
    /// ```
    pub fn for_page(page: u64, page_size: u64, total: u64) -> Result<Self, NavigationError> {
        if page_size == 0 {
            return Err(NavigationError::ZeroPageSize);
        }
        let total_pages = total.div_ceil(page_size);
        if page == 0 || page > total_pages {
            return Err(NavigationError::PageOutOfRange { page, total_pages });
        }
        let has_previous = page != 1 && total_pages != 1;
        let has_next = page != total_pages;
        Ok(Self {
            page,
            total_pages,
            first_page: has_previous.then_some(1),
            prev_page: has_previous.then(|| page - 1),
            next_page: has_next.then(|| page + 1),
            last_page: has_next.then_some(total_pages),
        })
    }

    /// Offset of the first record on the page.
    #[must_use]
    pub const fn offset(page: u64, page_size: u64) -> u64 {
        page.saturating_sub(1).saturating_mul(page_size)
    }
}
