//! HTTP adapters and bulk ingestion for the places catalogue.
//!
//! Responsibilities:
//! - Connect to an Elasticsearch-compatible service with basic auth and an
//!   optional private CA.
//! - Implement [`places_core::SearchBackend`] and [`places_core::BulkSink`]
//!   over HTTP.
//! - Recreate the places index and load tab-separated source files into it.
//!
//! Boundaries:
//! - Pagination and record decoding live in `places-core`.
//! - File access goes through `cap-std` with UTF-8 paths.
//!
//! Invariants:
//! - A failing source row never aborts an ingestion run.
//! - No global mutable state.

mod admin;
mod bulk;
mod connection;
pub mod fs;
pub mod ingest;
mod search;

pub use admin::{IndexAdmin, places_mapping};
pub use bulk::{
    DEFAULT_FLUSH_BYTES, DEFAULT_FLUSH_ITEMS, FlushReport, HttpBulkSink, HttpBulkSinkConfig,
    encode_item,
};
pub use connection::{
    Connection, ConnectionError, ConnectionSettings, DEFAULT_INDEX, DEFAULT_PASSWORD, DEFAULT_URL,
    DEFAULT_USER, DEFAULT_USER_AGENT, ENV_ELASTIC_PASSWORD, ENV_ELASTIC_URL, ENV_ELASTIC_USER,
};
pub use ingest::{
    BulkIngestor, IdPolicy, IngestConfig, IngestError, IngestFailure, IngestSummary, RowError,
    SourceError, SourceRow, TsvRows,
};
pub use search::HttpSearchBackend;
