//! Buffered [`BulkSink`] writing NDJSON batches to the `_bulk` endpoint.
//!
//! Submissions are appended to an in-memory buffer that is flushed once it
//! holds [`HttpBulkSinkConfig::flush_items`] items or
//! [`HttpBulkSinkConfig::flush_bytes`] bytes. The submitting task that fills
//! the buffer takes it and sends it outside the lock, so other submitters keep
//! appending to a fresh buffer meanwhile.
//!
//! Flush failures never fail a submission. They are logged and tallied in the
//! [`BulkStats`] returned by [`BulkSink::close`].

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use log::{debug, warn};
use places_core::{BackendError, BulkItem, BulkSink, BulkStats};
use reqwest::Method;
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::Connection;

/// Default number of items per bulk request.
pub const DEFAULT_FLUSH_ITEMS: usize = 1_000;
/// Default body size that triggers a flush.
pub const DEFAULT_FLUSH_BYTES: usize = 5 * 1024 * 1024;

const NDJSON: &str = "application/x-ndjson";

/// Flush thresholds for [`HttpBulkSink`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpBulkSinkConfig {
    /// Flush when this many items are buffered.
    pub flush_items: NonZeroUsize,
    /// Flush when the buffered body reaches this many bytes.
    pub flush_bytes: usize,
}

impl Default for HttpBulkSinkConfig {
    fn default() -> Self {
        Self {
            flush_items: NonZeroUsize::new(DEFAULT_FLUSH_ITEMS).unwrap_or(NonZeroUsize::MIN),
            flush_bytes: DEFAULT_FLUSH_BYTES,
        }
    }
}

impl HttpBulkSinkConfig {
    /// Set the item threshold.
    #[must_use]
    pub const fn with_flush_items(mut self, flush_items: NonZeroUsize) -> Self {
        self.flush_items = flush_items;
        self
    }

    /// Set the byte threshold.
    #[must_use]
    pub const fn with_flush_bytes(mut self, flush_bytes: usize) -> Self {
        self.flush_bytes = flush_bytes;
        self
    }
}

#[derive(Debug, Default)]
struct PendingBatch {
    body: Vec<u8>,
    items: u64,
}

#[derive(Debug, Default)]
struct BufferState {
    batch: PendingBatch,
    closed: bool,
}

/// Per-item outcome counts of one bulk response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FlushReport {
    /// Items acknowledged with a 2xx status.
    pub indexed: u64,
    /// Items refused by the backend.
    pub rejected: u64,
}

#[derive(Debug, Deserialize)]
struct BulkResponse {
    #[serde(default)]
    errors: bool,
    #[serde(default)]
    items: Vec<HashMap<String, BulkItemResult>>,
}

#[derive(Debug, Deserialize)]
struct BulkItemResult {
    #[serde(rename = "_id", default)]
    id: Option<String>,
    status: u16,
    #[serde(default)]
    error: Option<Value>,
}

/// [`BulkSink`] posting to `{url}/{index}/_bulk`.
#[derive(Debug)]
pub struct HttpBulkSink {
    connection: Connection,
    index: String,
    config: HttpBulkSinkConfig,
    buffer: Mutex<BufferState>,
    stats: Mutex<BulkStats>,
}

impl HttpBulkSink {
    /// Write into `index` with default thresholds.
    pub fn new(connection: Connection, index: impl Into<String>) -> Self {
        Self::with_config(connection, index, HttpBulkSinkConfig::default())
    }

    /// Write into `index` with explicit thresholds.
    pub fn with_config(
        connection: Connection,
        index: impl Into<String>,
        config: HttpBulkSinkConfig,
    ) -> Self {
        Self {
            connection,
            index: index.into(),
            config,
            buffer: Mutex::new(BufferState::default()),
            stats: Mutex::new(BulkStats::default()),
        }
    }

    fn lock_buffer(&self) -> MutexGuard<'_, BufferState> {
        self.buffer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_stats(&self) -> MutexGuard<'_, BulkStats> {
        self.stats.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_full(&self, batch: &PendingBatch) -> bool {
        let items = usize::try_from(batch.items).unwrap_or(usize::MAX);
        items >= self.config.flush_items.get() || batch.body.len() >= self.config.flush_bytes
    }

    async fn flush(&self, batch: PendingBatch) {
        if batch.items == 0 {
            return;
        }
        debug!("flushing {} items to index {}", batch.items, self.index);
        let outcome = self.send(batch.body).await;
        let mut stats = self.lock_stats();
        stats.flushes += 1;
        match outcome {
            Ok(report) => {
                stats.indexed += report.indexed;
                stats.rejected += report.rejected;
            }
            Err(err) => {
                warn!("bulk flush of {} items failed: {err}", batch.items);
                stats.rejected += batch.items;
            }
        }
    }

    async fn send(&self, body: Vec<u8>) -> Result<FlushReport, BackendError> {
        let url = self.connection.endpoint(&format!("{}/_bulk", self.index));
        let response = self
            .connection
            .request(Method::POST, &url)
            .header(CONTENT_TYPE, NDJSON)
            .body(body)
            .send()
            .await
            .map_err(|err| self.connection.convert_reqwest_error(&err, &url))?
            .error_for_status()
            .map_err(|err| self.connection.convert_reqwest_error(&err, &url))?;
        let bytes = response
            .bytes()
            .await
            .map_err(|err| self.connection.convert_reqwest_error(&err, &url))?;
        parse_bulk_response(&bytes).map_err(|err| BackendError::MalformedResponse {
            url,
            message: err.to_string(),
        })
    }
}

#[async_trait]
impl BulkSink for HttpBulkSink {
    async fn submit(&self, item: BulkItem) -> Result<(), BackendError> {
        let mut lines = Vec::new();
        encode_item(&item, &mut lines)?;
        let ready = {
            let mut buffer = self.lock_buffer();
            if buffer.closed {
                return Err(BackendError::Closed);
            }
            buffer.batch.body.extend_from_slice(&lines);
            buffer.batch.items += 1;
            self.is_full(&buffer.batch)
                .then(|| std::mem::take(&mut buffer.batch))
        };
        if let Some(batch) = ready {
            self.flush(batch).await;
        }
        Ok(())
    }

    async fn close(&self) -> Result<BulkStats, BackendError> {
        let remaining = {
            let mut buffer = self.lock_buffer();
            if buffer.closed {
                None
            } else {
                buffer.closed = true;
                Some(std::mem::take(&mut buffer.batch))
            }
        };
        if let Some(batch) = remaining {
            self.flush(batch).await;
        }
        Ok(*self.lock_stats())
    }
}

/// Append the action and document lines for `item` to `out`.
///
/// # Errors
///
/// Returns [`BackendError::Encode`] when the document cannot be serialized.
pub fn encode_item(item: &BulkItem, out: &mut Vec<u8>) -> Result<(), BackendError> {
    let action = match &item.id {
        Some(id) => json!({"index": {"_id": id.as_str()}}),
        None => json!({"index": {}}),
    };
    let encode = |err: serde_json::Error| BackendError::Encode {
        message: err.to_string(),
    };
    serde_json::to_writer(&mut *out, &action).map_err(encode)?;
    out.push(b'\n');
    serde_json::to_writer(&mut *out, &item.document).map_err(encode)?;
    out.push(b'\n');
    Ok(())
}

fn parse_bulk_response(bytes: &[u8]) -> Result<FlushReport, serde_json::Error> {
    let response: BulkResponse = serde_json::from_slice(bytes)?;
    let mut report = FlushReport::default();
    for result in response.items.iter().flat_map(HashMap::values) {
        if (200..300).contains(&result.status) {
            report.indexed += 1;
        } else {
            report.rejected += 1;
            warn!(
                "bulk item {} rejected with status {}: {}",
                result.id.as_deref().unwrap_or("<auto>"),
                result.status,
                result.error.as_ref().map_or_else(String::new, Value::to_string)
            );
        }
    }
    if response.errors && report.rejected == 0 {
        debug!("bulk response flagged errors without rejected items");
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ConnectionSettings;
    use places_core::DocumentId;
    use places_core::test_support::block_on_for_tests;
    use rstest::{fixture, rstest};

    #[fixture]
    fn connection() -> Connection {
        Connection::open(&ConnectionSettings::default().with_url("http://127.0.0.1:1"))
            .expect("connection should build")
    }

    #[rstest]
    fn encodes_action_and_document_lines() {
        let item = BulkItem::index(Some(DocumentId::from(3)), json!({"name": "Bar"}));
        let mut out = Vec::new();
        encode_item(&item, &mut out).expect("encode");
        assert_eq!(
            String::from_utf8(out).expect("utf-8"),
            "{\"index\":{\"_id\":\"3\"}}\n{\"name\":\"Bar\"}\n"
        );
    }

    #[rstest]
    fn backend_assigned_ids_omit_id() {
        let item = BulkItem::index(None, json!({}));
        let mut out = Vec::new();
        encode_item(&item, &mut out).expect("encode");
        assert!(String::from_utf8(out).expect("utf-8").starts_with("{\"index\":{}}\n"));
    }

    #[rstest]
    fn counts_item_outcomes() {
        let body = json!({
            "took": 30,
            "errors": true,
            "items": [
                {"index": {"_id": "1", "status": 201}},
                {"index": {"_id": "2", "status": 200}},
                {"index": {"_id": "3", "status": 400, "error": {"type": "mapper_parsing_exception"}}}
            ]
        });
        let report =
            parse_bulk_response(body.to_string().as_bytes()).expect("parse bulk response");
        assert_eq!(
            report,
            FlushReport {
                indexed: 2,
                rejected: 1
            }
        );
    }

    #[rstest]
    fn buffer_is_flushed_at_item_threshold(connection: Connection) {
        let config = HttpBulkSinkConfig::default()
            .with_flush_items(NonZeroUsize::new(2).expect("non-zero"));
        let sink = HttpBulkSink::with_config(connection, "places", config);
        block_on_for_tests(async {
            for id in 1..=3_u64 {
                sink.submit(BulkItem::index(Some(id.into()), json!({"id": id})))
                    .await
                    .expect("submission is accepted");
            }
        });
        // Nothing listens on the target, so the flush of items 1-2 is rejected.
        let stats = *sink.lock_stats();
        assert_eq!(stats.flushes, 1);
        assert_eq!(stats.rejected, 2);
        assert_eq!(sink.lock_buffer().batch.items, 1);
    }

    #[rstest]
    fn close_flushes_remainder_and_refuses_more(connection: Connection) {
        let sink = HttpBulkSink::new(connection, "places");
        let stats = block_on_for_tests(async {
            sink.submit(BulkItem::index(None, json!({})))
                .await
                .expect("submission is accepted");
            sink.close().await
        })
        .expect("close");
        assert_eq!(stats.flushes, 1);
        assert_eq!(stats.indexed + stats.rejected, 1);

        let err = block_on_for_tests(sink.submit(BulkItem::index(None, json!({}))))
            .expect_err("closed sink");
        assert_eq!(err, BackendError::Closed);
    }
}
