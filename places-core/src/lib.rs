//! Core domain types and pagination engine for the places catalogue.
//!
//! Responsibilities:
//! - Model place records, sort specifications and continuation cursors.
//! - Build backend queries and decode backend documents.
//! - Page through arbitrarily large result sets with `search_after`.
//!
//! Boundaries:
//! - No transport code; backends are reached through [`SearchBackend`] and
//!   [`BulkSink`], implemented by `places-data`.
//!
//! Invariants:
//! - A window is cut only after every record before its end is materialized.
//! - No global mutable state.

pub mod backend;
pub mod codec;
pub mod cursor;
pub mod page;
pub mod paginate;
pub mod place;
pub mod query;
pub mod sort;
pub mod store;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use backend::{
    BackendError, BulkItem, BulkSink, BulkStats, HitsEnvelope, SearchBackend, SearchHit,
    SearchResponse, TotalHits, TotalRelation,
};
pub use codec::{DecodeError, RecordCodec};
pub use cursor::{Cursor, CursorValue};
pub use page::{NavigationError, PageNavigation, PageRequest, PlacePage};
pub use paginate::{CursorPaginator, DEFAULT_BATCH_CAP, PaginateError, PaginatorConfig};
pub use place::{DocumentId, Location, LocationError, PlaceRecord};
pub use query::{InvalidArgument, QueryDocument, build_query};
pub use sort::{SortKey, SortOrder, SortSpec};
pub use store::PlaceStore;
