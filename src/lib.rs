//! Facade crate for the places catalogue engine.
//!
//! This crate re-exports the core domain types and pagination engine, and
//! exposes the HTTP adapters and bulk ingestion behind the `http` feature.

#![forbid(unsafe_code)]

pub use places_core::{
    BackendError, BulkItem, BulkSink, BulkStats, Cursor, CursorPaginator, CursorValue,
    DEFAULT_BATCH_CAP, DecodeError, DocumentId, InvalidArgument, Location, LocationError,
    NavigationError, PageNavigation, PageRequest, PaginateError, PaginatorConfig, PlacePage,
    PlaceRecord, PlaceStore, QueryDocument, RecordCodec, SearchBackend, SearchHit, SearchResponse,
    SortKey, SortOrder, SortSpec, build_query,
};

#[cfg(feature = "test-support")]
pub use places_core::test_support;

#[cfg(feature = "http")]
pub use places_data::{
    BulkIngestor, Connection, ConnectionError, ConnectionSettings, HttpBulkSink,
    HttpBulkSinkConfig, HttpSearchBackend, IdPolicy, IndexAdmin, IngestConfig, IngestError,
    IngestSummary, TsvRows,
};
