//! Cursor-driven retrieval of arbitrarily large windows.
//!
//! The backend caps how many hits one request may return. To serve a window
//! `[offset, offset + limit)` the paginator walks the result set in batches
//! of at most [`DEFAULT_BATCH_CAP`] hits, resuming each batch after the sort
//! values of the previous batch's last hit, and cuts the window only once
//! enough records are materialized.

use std::num::NonZeroUsize;

use async_trait::async_trait;
use log::debug;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::{
    BackendError, Cursor, DecodeError, InvalidArgument, Location, PageRequest, PlacePage,
    PlaceRecord, PlaceStore, QueryDocument, RecordCodec, SearchBackend, SearchResponse, SortKey,
    SortSpec, build_query,
};

/// Largest batch the backend serves by default.
pub const DEFAULT_BATCH_CAP: usize = 10_000;

/// Errors from [`CursorPaginator`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PaginateError {
    /// Caller input was rejected.
    #[error(transparent)]
    InvalidArgument(#[from] InvalidArgument),
    /// A round trip failed.
    #[error("round trip {round_trip} failed: {source}")]
    Backend {
        /// 1-based round trip number.
        round_trip: usize,
        /// Backend failure.
        #[source]
        source: BackendError,
    },
    /// A hit could not be decoded.
    #[error("hit {position} could not be decoded: {source}")]
    Decode {
        /// Zero-based position in the materialized result set.
        position: usize,
        /// Decoding failure.
        #[source]
        source: DecodeError,
    },
    /// A hit carried no sort values to continue from.
    #[error("hit {position} has no sort values to continue from")]
    MissingSortValues {
        /// Zero-based position in the materialized result set.
        position: usize,
    },
    /// The backend returned the same cursor twice.
    #[error("cursor did not advance after round trip {round_trip}")]
    StalledCursor {
        /// 1-based round trip number.
        round_trip: usize,
    },
    /// The caller cancelled the operation.
    #[error("pagination was cancelled")]
    Cancelled,
}

/// Settings for [`CursorPaginator`].
#[derive(Debug, Clone, PartialEq)]
pub struct PaginatorConfig {
    /// Maximum hits requested per round trip.
    pub batch_cap: NonZeroUsize,
    /// Catalogue order; must be total for paging to be exact.
    pub sort: SortSpec,
}

impl Default for PaginatorConfig {
    fn default() -> Self {
        Self {
            batch_cap: NonZeroUsize::new(DEFAULT_BATCH_CAP).unwrap_or(NonZeroUsize::MIN),
            sort: SortSpec::default(),
        }
    }
}

impl PaginatorConfig {
    /// Set the per-request batch cap.
    #[must_use]
    pub const fn with_batch_cap(mut self, batch_cap: NonZeroUsize) -> Self {
        self.batch_cap = batch_cap;
        self
    }

    /// Set the catalogue order.
    #[must_use]
    pub fn with_sort(mut self, sort: SortSpec) -> Self {
        self.sort = sort;
        self
    }
}

/// [`PlaceStore`] that pages through a [`SearchBackend`] with
/// `search_after` cursors.
#[derive(Debug, Clone)]
pub struct CursorPaginator<B> {
    backend: B,
    config: PaginatorConfig,
}

impl<B: SearchBackend> CursorPaginator<B> {
    /// Create a paginator with the default batch cap and sort order.
    pub fn new(backend: B) -> Self {
        Self::with_config(backend, PaginatorConfig::default())
    }

    /// Create a paginator with explicit settings.
    pub const fn with_config(backend: B, config: PaginatorConfig) -> Self {
        Self { backend, config }
    }

    /// Borrow the settings.
    pub const fn config(&self) -> &PaginatorConfig {
        &self.config
    }

    /// Fetch the window `[offset, offset + limit)`, aborting when `cancel`
    /// fires.
    ///
    /// # Errors
    ///
    /// Returns [`PaginateError`] for negative input, any failed round trip,
    /// undecodable hits, or cancellation. No partial page is returned.
    pub async fn get_places_cancellable(
        &self,
        limit: i64,
        offset: i64,
        cancel: &CancellationToken,
    ) -> Result<PlacePage, PaginateError> {
        let request = PageRequest::new(limit, offset)?;
        if request.limit == 0 {
            return Ok(PlacePage::default());
        }
        let (fetched, total_matched) = self.materialize(request.target(), cancel).await?;
        let fetched_len = fetched.len();
        let records = fetched
            .into_iter()
            .skip(request.offset)
            .take(request.limit)
            .collect();
        Ok(PlacePage {
            records,
            total_matched,
            fetched: fetched_len,
        })
    }

    /// Fetch up to `count` places nearest to `origin`, aborting when `cancel`
    /// fires.
    ///
    /// The lookup is a single round trip, so `count` may not exceed the batch
    /// cap.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidArgument::CountAboveCap`] when `count` is larger than
    /// the batch cap, and [`PaginateError`] when the round trip fails or a hit
    /// cannot be decoded.
    pub async fn nearest_cancellable(
        &self,
        origin: Location,
        count: usize,
        cancel: &CancellationToken,
    ) -> Result<Vec<PlaceRecord>, PaginateError> {
        if count == 0 {
            return Ok(Vec::new());
        }
        let cap = self.config.batch_cap.get();
        if count > cap {
            return Err(InvalidArgument::CountAboveCap {
                requested: count,
                cap,
            }
            .into());
        }
        let sort = SortSpec::new(vec![SortKey::nearest_to(origin)]);
        let query = build_query(to_limit(count), None, &sort)?;
        let response = self.round_trip(&query, 1, cancel).await?;
        response
            .hits
            .hits
            .iter()
            .enumerate()
            .map(|(position, hit)| {
                RecordCodec::decode(hit).map_err(|source| PaginateError::Decode { position, source })
            })
            .collect()
    }

    async fn materialize(
        &self,
        target: usize,
        cancel: &CancellationToken,
    ) -> Result<(Vec<PlaceRecord>, u64), PaginateError> {
        let cap = self.config.batch_cap.get();
        let mut fetched: Vec<PlaceRecord> = Vec::with_capacity(target.min(cap));
        let mut cursor: Option<Cursor> = None;
        let mut total_matched = 0;
        let mut round_trip = 0;

        while fetched.len() < target {
            round_trip += 1;
            let size = cap.min(target - fetched.len());
            let query = build_query(to_limit(size), cursor.as_ref(), &self.config.sort)?;
            let response = self.round_trip(&query, round_trip, cancel).await?;
            total_matched = response.total_matched();
            let hits = response.hits.hits;
            debug!(
                "round trip {round_trip}: requested {size}, received {}",
                hits.len()
            );
            let Some(last) = hits.last() else {
                break;
            };
            if last.sort.is_empty() {
                return Err(PaginateError::MissingSortValues {
                    position: fetched.len() + hits.len() - 1,
                });
            }
            let next = Cursor::new(last.sort.clone());
            for hit in &hits {
                let record = RecordCodec::decode(hit).map_err(|source| PaginateError::Decode {
                    position: fetched.len(),
                    source,
                })?;
                fetched.push(record);
            }
            if cursor.as_ref() == Some(&next) {
                return Err(PaginateError::StalledCursor { round_trip });
            }
            cursor = Some(next);
        }
        Ok((fetched, total_matched))
    }

    async fn round_trip(
        &self,
        query: &QueryDocument,
        round_trip: usize,
        cancel: &CancellationToken,
    ) -> Result<SearchResponse, PaginateError> {
        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(PaginateError::Cancelled),
            result = self.backend.search(query) => {
                result.map_err(|source| PaginateError::Backend { round_trip, source })
            }
        }
    }
}

fn to_limit(size: usize) -> i64 {
    i64::try_from(size).unwrap_or(i64::MAX)
}

#[async_trait]
impl<B: SearchBackend> PlaceStore for CursorPaginator<B> {
    async fn get_places(&self, limit: i64, offset: i64) -> Result<PlacePage, PaginateError> {
        self.get_places_cancellable(limit, offset, &CancellationToken::new())
            .await
    }

    async fn nearest(
        &self,
        origin: Location,
        count: usize,
    ) -> Result<Vec<PlaceRecord>, PaginateError> {
        self.nearest_cancellable(origin, count, &CancellationToken::new())
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{MemoryIndex, block_on_for_tests, sample_places};
    use crate::{CursorValue, SearchHit};
    use rstest::{fixture, rstest};
    use serde_json::json;

    #[fixture]
    fn twenty() -> MemoryIndex {
        MemoryIndex::with_places(sample_places(20))
    }

    fn small_batches(cap: usize) -> PaginatorConfig {
        PaginatorConfig::default()
            .with_batch_cap(NonZeroUsize::new(cap).expect("non-zero cap"))
    }

    #[rstest]
    fn zero_limit_makes_no_round_trip(twenty: MemoryIndex) {
        let paginator = CursorPaginator::new(&twenty);
        let page = block_on_for_tests(paginator.get_places(0, 5)).expect("empty page");
        assert!(page.is_empty());
        assert_eq!(page.total_matched, 0);
        assert_eq!(twenty.round_trips(), 0);
    }

    #[rstest]
    #[case::negative_limit(-1, 0)]
    #[case::negative_offset(1, -1)]
    fn negative_input_is_rejected(twenty: MemoryIndex, #[case] limit: i64, #[case] offset: i64) {
        let paginator = CursorPaginator::new(&twenty);
        let err = block_on_for_tests(paginator.get_places(limit, offset)).expect_err("invalid");
        assert!(matches!(err, PaginateError::InvalidArgument(_)));
        assert_eq!(twenty.round_trips(), 0);
    }

    #[rstest]
    fn walks_batches_with_cursor(twenty: MemoryIndex) {
        let paginator = CursorPaginator::with_config(&twenty, small_batches(6));
        let page = block_on_for_tests(paginator.get_places(20, 0)).expect("page");
        let names: Vec<_> = page.records.iter().map(|r| r.name.clone()).collect();
        let expected: Vec<_> = (1..=20).map(|i| format!("Place {i}")).collect();
        assert_eq!(names, expected);

        let sizes: Vec<_> = twenty.requested_queries().iter().map(|q| q.size).collect();
        assert_eq!(sizes, vec![6, 6, 6, 2]);
        let second = twenty.requested_queries().get(1).cloned().expect("second query");
        assert_eq!(
            second.search_after.map(|c| c.values().to_vec()),
            Some(vec![CursorValue::Integer(6), CursorValue::Float(1.0)])
        );
    }

    #[rstest]
    fn stops_on_empty_batch(twenty: MemoryIndex) {
        let paginator = CursorPaginator::new(&twenty);
        let page = block_on_for_tests(paginator.get_places(100, 15)).expect("page");
        assert_eq!(page.len(), 5);
        assert_eq!(page.fetched, 20);
        assert_eq!(twenty.round_trips(), 2);
    }

    #[rstest]
    fn offset_beyond_end_is_empty(twenty: MemoryIndex) {
        let paginator = CursorPaginator::new(&twenty);
        let page = block_on_for_tests(paginator.get_places(10, 50)).expect("page");
        assert!(page.is_empty());
        assert_eq!(page.total_matched, 20);
    }

    #[rstest]
    fn backend_failure_aborts_without_partial_result(twenty: MemoryIndex) {
        twenty.fail_on_round_trip(
            2,
            BackendError::Network {
                url: "http://localhost:9200/places/_search".to_owned(),
                message: "connection reset".to_owned(),
            },
        );
        let paginator = CursorPaginator::with_config(&twenty, small_batches(5));
        let err = block_on_for_tests(paginator.get_places(20, 0)).expect_err("failure");
        assert!(matches!(
            err,
            PaginateError::Backend {
                round_trip: 2,
                source: BackendError::Network { .. }
            }
        ));
    }

    #[rstest]
    fn undecodable_hit_aborts() {
        let index = MemoryIndex::with_documents(vec![
            ("1".to_owned(), json!({"id": 1, "name": "only a name"})),
        ]);
        let paginator = CursorPaginator::new(&index);
        let err = block_on_for_tests(paginator.get_places(5, 0)).expect_err("decode failure");
        assert!(matches!(err, PaginateError::Decode { position: 0, .. }));
    }

    struct StuckBackend;

    #[async_trait]
    impl SearchBackend for StuckBackend {
        async fn search(&self, _query: &QueryDocument) -> Result<SearchResponse, BackendError> {
            let source = RecordCodec::encode(&sample_places(1).remove(0));
            let mut response = SearchResponse::default();
            response.hits.hits.push(SearchHit {
                id: Some("1".to_owned()),
                score: Some(1.0),
                source,
                sort: vec![CursorValue::Integer(1), CursorValue::Float(1.0)],
            });
            Ok(response)
        }
    }

    #[rstest]
    fn repeated_cursor_is_reported() {
        let paginator = CursorPaginator::with_config(StuckBackend, small_batches(1));
        let err = block_on_for_tests(paginator.get_places(3, 0)).expect_err("stalled");
        assert_eq!(err, PaginateError::StalledCursor { round_trip: 2 });
    }

    #[rstest]
    fn cancelled_token_aborts(twenty: MemoryIndex) {
        let paginator = CursorPaginator::new(&twenty);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = block_on_for_tests(paginator.get_places_cancellable(5, 0, &cancel))
            .expect_err("cancelled");
        assert_eq!(err, PaginateError::Cancelled);
    }

    #[rstest]
    fn nearest_sorts_by_distance() {
        let origin = Location::new(55.75, 37.62).expect("valid origin");
        let far = crate::PlaceRecord::new("far", "", "", Location::new(10.0, 10.0).expect("ok"));
        let near = crate::PlaceRecord::new("near", "", "", Location::new(55.76, 37.63).expect("ok"));
        let mid = crate::PlaceRecord::new("mid", "", "", Location::new(50.0, 30.0).expect("ok"));
        let index = MemoryIndex::with_places(vec![far, near, mid]);
        let paginator = CursorPaginator::new(&index);

        let places = block_on_for_tests(paginator.nearest(origin, 2)).expect("nearest");
        let names: Vec<_> = places.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["near", "mid"]);
    }

    #[rstest]
    fn nearest_rejects_counts_above_the_cap(twenty: MemoryIndex) {
        let paginator = CursorPaginator::with_config(&twenty, small_batches(5));
        let origin = Location::new(55.75, 37.62).expect("valid origin");

        let err = block_on_for_tests(paginator.nearest(origin, 6)).expect_err("too many");
        assert_eq!(
            err,
            PaginateError::InvalidArgument(InvalidArgument::CountAboveCap {
                requested: 6,
                cap: 5
            })
        );
        assert_eq!(twenty.round_trips(), 0);

        let places = block_on_for_tests(paginator.nearest(origin, 5)).expect("at the cap");
        assert_eq!(places.len(), 5);
    }

    #[rstest]
    fn nearest_with_zero_count_skips_backend(twenty: MemoryIndex) {
        let paginator = CursorPaginator::new(&twenty);
        let origin = Location::new(0.0, 0.0).expect("valid origin");
        let places = block_on_for_tests(paginator.nearest(origin, 0)).expect("nearest");
        assert!(places.is_empty());
        assert_eq!(twenty.round_trips(), 0);
    }
}
