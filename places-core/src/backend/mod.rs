//! Capabilities the engine needs from a search backend.
//!
//! [`SearchBackend`] answers one query per call; [`BulkSink`] accepts
//! documents for batched indexing. Both are object-safe async traits so that
//! HTTP adapters and in-memory fakes are interchangeable.

mod bulk;
mod error;
mod search;

pub use bulk::{BulkItem, BulkSink, BulkStats};
pub use error::BackendError;
pub use search::{HitsEnvelope, SearchBackend, SearchHit, SearchResponse, TotalHits, TotalRelation};
