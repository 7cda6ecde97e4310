use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use super::BackendError;
use crate::DocumentId;

/// A document queued for indexing.
#[derive(Debug, Clone, PartialEq)]
pub struct BulkItem {
    /// Target id; `None` lets the backend assign one.
    pub id: Option<DocumentId>,
    /// Document body.
    pub document: Value,
}

impl BulkItem {
    /// Index `document` under `id`, replacing any existing document.
    #[must_use]
    pub const fn index(id: Option<DocumentId>, document: Value) -> Self {
        Self { id, document }
    }
}

/// Counters observed by a sink while flushing to the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct BulkStats {
    /// Bulk requests sent.
    pub flushes: u64,
    /// Items the backend acknowledged.
    pub indexed: u64,
    /// Items the backend refused or that were lost with a failed flush.
    pub rejected: u64,
}

/// Batched document writer.
///
/// `submit` only enqueues; an `Ok` means the item was accepted into the
/// sink's buffer. Backend outcomes surface through the [`BulkStats`] returned
/// by [`close`](Self::close), which must be awaited after the last submission.
#[async_trait]
pub trait BulkSink: Send + Sync {
    /// Enqueue one item, flushing a full buffer when needed.
    async fn submit(&self, item: BulkItem) -> Result<(), BackendError>;

    /// Flush any buffered items and stop accepting submissions.
    async fn close(&self) -> Result<BulkStats, BackendError>;
}

#[async_trait]
impl<T: BulkSink + ?Sized> BulkSink for Arc<T> {
    async fn submit(&self, item: BulkItem) -> Result<(), BackendError> {
        (**self).submit(item).await
    }

    async fn close(&self) -> Result<BulkStats, BackendError> {
        (**self).close().await
    }
}
