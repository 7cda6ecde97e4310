use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::BackendError;
use crate::{CursorValue, QueryDocument};

/// Whether the reported total is exact or a lower bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TotalRelation {
    /// The total is exact.
    #[default]
    #[serde(rename = "eq")]
    Equal,
    /// The total is a lower bound.
    #[serde(rename = "gte")]
    AtLeast,
}

/// Total number of documents matching a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TotalHits {
    /// Matching document count.
    pub value: u64,
    /// Precision of `value`.
    #[serde(default)]
    pub relation: TotalRelation,
}

/// One matching document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    /// Document id.
    #[serde(rename = "_id", default)]
    pub id: Option<String>,
    /// Relevance score; absent when sorting without scoring.
    #[serde(rename = "_score", default)]
    pub score: Option<f64>,
    /// Stored document body.
    #[serde(rename = "_source", default)]
    pub source: Value,
    /// Sort values of this hit, used as the next cursor.
    #[serde(default)]
    pub sort: Vec<CursorValue>,
}

/// The `hits` object of a search response.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct HitsEnvelope {
    /// Total matching documents across all pages.
    #[serde(default)]
    pub total: Option<TotalHits>,
    /// Hits of this batch in sort order.
    #[serde(default)]
    pub hits: Vec<SearchHit>,
}

/// Response to a [`QueryDocument`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SearchResponse {
    /// Matching documents.
    pub hits: HitsEnvelope,
}

impl SearchResponse {
    /// Backend-reported total, or zero when the backend omitted it.
    #[must_use]
    pub fn total_matched(&self) -> u64 {
        self.hits.total.map_or(0, |total| total.value)
    }
}

/// Executes queries against a search index.
///
/// Implementations must be safe to share between tasks; the paginator issues
/// its round trips sequentially but several paginators may share one backend.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Run `query` and return one batch of hits.
    async fn search(&self, query: &QueryDocument) -> Result<SearchResponse, BackendError>;
}

#[async_trait]
impl<T: SearchBackend + ?Sized> SearchBackend for Arc<T> {
    async fn search(&self, query: &QueryDocument) -> Result<SearchResponse, BackendError> {
        (**self).search(query).await
    }
}

#[async_trait]
impl<T: SearchBackend + ?Sized> SearchBackend for &T {
    async fn search(&self, query: &QueryDocument) -> Result<SearchResponse, BackendError> {
        (**self).search(query).await
    }
}
