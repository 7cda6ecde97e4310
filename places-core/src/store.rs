//! Read access to the places catalogue.

use async_trait::async_trait;

use crate::{Location, PaginateError, PlacePage, PlaceRecord};

/// Read-only access to indexed places.
///
/// # Examples
///
/// ```
/// use places_core::test_support::{MemoryIndex, block_on_for_tests, sample_places};
/// use places_core::{CursorPaginator, PlaceStore};
///
/// let index = MemoryIndex::with_places(sample_places(25));
/// let store = CursorPaginator::new(&index);
/// let page = block_on_for_tests(store.get_places(10, 20))?;
/// assert_eq!(page.len(), 5);
/// assert_eq!(page.total_matched, 25);
/// # Ok::<(), places_core::PaginateError>(())
/// ```
#[async_trait]
pub trait PlaceStore: Send + Sync {
    /// Return up to `limit` places after skipping `offset`, in catalogue
    /// order.
    ///
    /// A `limit` of zero returns an empty page without contacting the
    /// backend. An `offset` past the end returns an empty page.
    async fn get_places(&self, limit: i64, offset: i64) -> Result<PlacePage, PaginateError>;

    /// Return up to `count` places ordered by distance from `origin`.
    ///
    /// The lookup is one request: a `count` above the batch cap (10,000 by
    /// default) is rejected with [`crate::InvalidArgument::CountAboveCap`].
    async fn nearest(
        &self,
        origin: Location,
        count: usize,
    ) -> Result<Vec<PlaceRecord>, PaginateError>;
}
