//! Concurrent bulk ingestion of place rows.
//!
//! Each row becomes one unit of work on a [`JoinSet`]; a [`Semaphore`] bounds
//! how many units run at once. A unit transforms its row, encodes the record
//! and submits it to the [`BulkSink`]. Per-row failures are isolated: they are
//! logged, counted and returned with the row number, and never stop the run.
//! The sink is closed only after every unit has finished. Items the sink
//! reports as rejected when it flushes are moved from the success count to
//! the failure count.

mod source;
mod transform;

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use log::{info, warn};
use places_core::{BackendError, BulkItem, BulkSink, BulkStats, DocumentId, RecordCodec};
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;

pub use source::{SourceError, SourceRow, TsvRows};
pub use transform::{COLUMN_ID, TransformError, transform_row};

/// Default number of rows processed concurrently.
pub const DEFAULT_CONCURRENCY: usize = 64;

/// How stored document ids are chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IdPolicy {
    /// The 1-based data row number.
    #[default]
    SourceRow,
    /// The value of the id column.
    SourceColumn,
    /// Let the backend generate ids.
    BackendAssigned,
}

/// Settings for [`BulkIngestor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestConfig {
    /// Maximum rows in flight.
    pub concurrency: NonZeroUsize,
    /// Document id policy.
    pub id_policy: IdPolicy,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            concurrency: NonZeroUsize::new(DEFAULT_CONCURRENCY).unwrap_or(NonZeroUsize::MIN),
            id_policy: IdPolicy::default(),
        }
    }
}

impl IngestConfig {
    /// Set the concurrency bound.
    #[must_use]
    pub const fn with_concurrency(mut self, concurrency: NonZeroUsize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Set the id policy.
    #[must_use]
    pub const fn with_id_policy(mut self, id_policy: IdPolicy) -> Self {
        self.id_policy = id_policy;
        self
    }
}

/// Why a single row was not submitted.
#[derive(Debug, Error)]
pub enum RowError {
    /// The row could not be read.
    #[error(transparent)]
    Source(#[from] SourceError),
    /// The row does not describe a valid place.
    #[error(transparent)]
    Transform(#[from] TransformError),
    /// The sink refused the row.
    #[error("submission failed: {0}")]
    Submit(#[from] BackendError),
}

/// A row that failed, with its position in the source.
#[derive(Debug)]
pub struct IngestFailure {
    /// 1-based data row number.
    pub source_row_index: u64,
    /// Cause of the failure.
    pub error: RowError,
}

/// Outcome of an ingestion run.
#[derive(Debug, Default)]
pub struct IngestSummary {
    /// Data rows read from the source.
    pub read: u64,
    /// Rows stored by the sink.
    pub succeeded: u64,
    /// Rows that failed, including rows the sink rejected while flushing.
    pub failed: u64,
    /// Details of the failures tied to a row, in completion order.
    pub failures: Vec<IngestFailure>,
    /// What the sink observed while flushing.
    pub backend: BulkStats,
}

/// Errors that end an ingestion run.
#[derive(Debug, Error)]
pub enum IngestError {
    /// The run was cancelled; the summary covers the rows dispatched before.
    #[error("ingestion cancelled after {} rows", summary.read)]
    Cancelled {
        /// Partial results.
        summary: Box<IngestSummary>,
    },
    /// Closing the sink failed.
    #[error("failed to close bulk sink: {source}")]
    Close {
        /// Sink failure.
        #[source]
        source: BackendError,
        /// Results up to the close.
        summary: Box<IngestSummary>,
    },
    /// A worker task panicked or was aborted.
    #[error("ingestion worker failed: {0}")]
    Worker(#[source] JoinError),
}

type RowOutcome = Result<(), IngestFailure>;

/// Loads rows into a [`BulkSink`] with bounded concurrency.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use places_core::test_support::{MemoryIndex, block_on_for_tests};
/// use places_data::ingest::{BulkIngestor, IngestConfig, TsvRows};
/// use tokio_util::sync::CancellationToken;
///
/// let tsv = "ID\tName\tAddress\tPhone\tLongitude\tLatitude\n\
///            0\tSMETANA\tMoscow\t(499) 183-14-10\t37.714565\t55.879001\n";
/// let index = Arc::new(MemoryIndex::new());
/// let ingestor = BulkIngestor::new(Arc::clone(&index), IngestConfig::default());
/// let rows = TsvRows::new(tsv.as_bytes());
/// let summary = block_on_for_tests(ingestor.ingest(rows, &CancellationToken::new()))?;
/// assert_eq!((summary.read, summary.succeeded), (1, 1));
/// assert!(index.document("1").is_some());
/// # Ok::<(), places_data::ingest::IngestError>(())
/// ```
#[derive(Debug)]
pub struct BulkIngestor<S> {
    sink: Arc<S>,
    config: IngestConfig,
}

impl<S: BulkSink + 'static> BulkIngestor<S> {
    /// Ingest into `sink` with `config`.
    pub const fn new(sink: Arc<S>, config: IngestConfig) -> Self {
        Self { sink, config }
    }

    /// Process every row, then close the sink.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::Cancelled`] when `cancel` fires before all rows
    /// were dispatched, [`IngestError::Close`] when the final flush cannot be
    /// performed, and [`IngestError::Worker`] when a worker task panics.
    /// Per-row failures are reported in the summary instead.
    pub async fn ingest<I>(
        &self,
        rows: I,
        cancel: &CancellationToken,
    ) -> Result<IngestSummary, IngestError>
    where
        I: IntoIterator<Item = Result<SourceRow, SourceError>>,
    {
        let permits = Arc::new(Semaphore::new(self.config.concurrency.get()));
        let succeeded = Arc::new(AtomicU64::new(0));
        let mut tasks: JoinSet<RowOutcome> = JoinSet::new();
        let mut summary = IngestSummary::default();
        let mut cancelled = false;

        for row in rows {
            if cancel.is_cancelled() {
                cancelled = true;
                break;
            }
            let row = match row {
                Ok(row) => row,
                Err(err) => {
                    record_source_error(&mut summary, err);
                    continue;
                }
            };
            summary.read += 1;
            let permit = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    summary.read -= 1;
                    cancelled = true;
                    break;
                }
                permit = Arc::clone(&permits).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };
            let sink = Arc::clone(&self.sink);
            let succeeded = Arc::clone(&succeeded);
            let id_policy = self.config.id_policy;
            tasks.spawn(async move {
                let _permit = permit;
                let index = row.index;
                let outcome = process_row(sink.as_ref(), row, id_policy).await;
                if outcome.is_ok() {
                    succeeded.fetch_add(1, Ordering::Relaxed);
                }
                outcome.map_err(|error| failure(index, error))
            });
            while let Some(joined) = tasks.try_join_next() {
                record(&mut summary, joined.map_err(IngestError::Worker)?);
            }
        }

        while let Some(joined) = tasks.join_next().await {
            record(&mut summary, joined.map_err(IngestError::Worker)?);
        }
        summary.succeeded = succeeded.load(Ordering::Relaxed);

        match self.sink.close().await {
            Ok(stats) => {
                summary.backend = stats;
                let lost = stats.rejected.min(summary.succeeded);
                summary.succeeded -= lost;
                summary.failed += lost;
            }
            Err(source) => {
                return Err(IngestError::Close {
                    source,
                    summary: Box::new(summary),
                });
            }
        }

        info!(
            "ingested {} of {} rows ({} failed); backend indexed {} and rejected {} in {} flushes",
            summary.succeeded,
            summary.read,
            summary.failed,
            summary.backend.indexed,
            summary.backend.rejected,
            summary.backend.flushes
        );
        if cancelled {
            return Err(IngestError::Cancelled {
                summary: Box::new(summary),
            });
        }
        Ok(summary)
    }
}

const fn failure(source_row_index: u64, error: RowError) -> IngestFailure {
    IngestFailure {
        source_row_index,
        error,
    }
}

fn record(summary: &mut IngestSummary, outcome: RowOutcome) {
    if let Err(failure) = outcome {
        warn!(
            "row {} skipped: {}",
            failure.source_row_index, failure.error
        );
        summary.failed += 1;
        summary.failures.push(failure);
    }
}

fn record_source_error(summary: &mut IngestSummary, err: SourceError) {
    match err.row_index() {
        Some(source_row_index) => {
            summary.read += 1;
            record(summary, Err(failure(source_row_index, err.into())));
        }
        None => warn!("source skipped: {err}"),
    }
}

// The numeric id is the first catalogue sort key, so it must be unique per
// document for `search_after` to resume exactly.
fn document_for(row: &SourceRow, id_policy: IdPolicy) -> Result<(Option<DocumentId>, u64), RowError> {
    match id_policy {
        IdPolicy::SourceRow => Ok((Some(DocumentId::from(row.index)), row.index)),
        IdPolicy::SourceColumn => {
            let numeric = transform::numeric_id(row)?;
            Ok((Some(DocumentId::from(numeric)), numeric))
        }
        IdPolicy::BackendAssigned => Ok((None, row.index)),
    }
}

async fn process_row<S: BulkSink + ?Sized>(
    sink: &S,
    row: SourceRow,
    id_policy: IdPolicy,
) -> Result<(), RowError> {
    let record = transform_row(&row)?;
    let (id, numeric_id) = document_for(&row, id_policy)?;
    let document = RecordCodec::encode_with_id(&record, numeric_id);
    sink.submit(BulkItem::index(id, document)).await?;
    Ok(())
}
