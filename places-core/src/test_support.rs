//! In-memory search index used by unit and behaviour tests.
//!
//! [`MemoryIndex`] implements both [`SearchBackend`] and [`BulkSink`] with the
//! same `search_after` semantics as the real backend: hits come back in sort
//! order, missing values sort last, and a cursor resumes strictly after the
//! tuple it names. Every query is recorded so tests can count round trips.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde_json::Value;

use crate::sort::SCORE_FIELD;
use crate::{
    BackendError, BulkItem, BulkSink, BulkStats, CursorValue, HitsEnvelope, Location,
    PlaceRecord, QueryDocument, RecordCodec, SearchBackend, SearchHit, SearchResponse, SortKey,
    SortOrder, TotalHits, TotalRelation,
};

const EARTH_RADIUS_KM: f64 = 6_371.0;

#[derive(Debug, Clone)]
struct StoredDocument {
    id: String,
    source: Value,
}

#[derive(Debug, Default)]
struct IndexState {
    documents: Vec<StoredDocument>,
    positions: HashMap<String, usize>,
    queries: Vec<QueryDocument>,
    failures: HashMap<usize, BackendError>,
    rejected_ids: HashMap<String, BackendError>,
    submissions: u64,
    next_auto_id: u64,
    closed: bool,
}

/// Linear-scan index holding documents in memory.
#[derive(Debug, Default)]
pub struct MemoryIndex {
    state: Mutex<IndexState>,
}

impl MemoryIndex {
    /// Create an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an index holding `places` under ids `1..=n`, each document
    /// carrying its numeric `id` field.
    pub fn with_places<I>(places: I) -> Self
    where
        I: IntoIterator<Item = PlaceRecord>,
    {
        Self::with_documents((1_u64..).zip(places).map(|(id, place)| {
            (id.to_string(), RecordCodec::encode_with_id(&place, id))
        }))
    }

    /// Create an index from raw `(id, document)` pairs.
    pub fn with_documents<I>(documents: I) -> Self
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        let index = Self::new();
        {
            let mut state = index.lock();
            for (id, source) in documents {
                state.upsert(id, source);
            }
        }
        index
    }

    /// Fail the `round_trip`-th search (1-based) with `error`.
    pub fn fail_on_round_trip(&self, round_trip: usize, error: BackendError) {
        self.lock().failures.insert(round_trip, error);
    }

    /// Refuse submissions targeting `id` with `error`.
    pub fn reject_submissions_for(&self, id: impl Into<String>, error: BackendError) {
        self.lock().rejected_ids.insert(id.into(), error);
    }

    /// Queries received so far, in arrival order.
    #[must_use]
    pub fn requested_queries(&self) -> Vec<QueryDocument> {
        self.lock().queries.clone()
    }

    /// Number of searches received so far.
    #[must_use]
    pub fn round_trips(&self) -> usize {
        self.lock().queries.len()
    }

    /// Number of stored documents.
    #[must_use]
    pub fn document_count(&self) -> usize {
        self.lock().documents.len()
    }

    /// Number of accepted submissions, counting replacements.
    #[must_use]
    pub fn submissions(&self) -> u64 {
        self.lock().submissions
    }

    /// Stored document for `id`, if any.
    #[must_use]
    pub fn document(&self, id: &str) -> Option<Value> {
        let state = self.lock();
        state
            .positions
            .get(id)
            .and_then(|position| state.documents.get(*position))
            .map(|doc| doc.source.clone())
    }

    /// Whether [`BulkSink::close`] has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    fn lock(&self) -> MutexGuard<'_, IndexState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn run_query(state: &IndexState, query: &QueryDocument) -> SearchResponse {
        let keys = query.sort.keys();
        let mut ranked: Vec<(Vec<CursorValue>, &StoredDocument)> = state
            .documents
            .iter()
            .map(|doc| (sort_values(keys, doc), doc))
            .collect();
        ranked.sort_by(|(left, _), (right, _)| compare_tuples(keys, left, right));

        let size = usize::try_from(query.size).unwrap_or(usize::MAX);
        let hits = ranked
            .into_iter()
            .filter(|(values, _)| {
                query.search_after.as_ref().is_none_or(|cursor| {
                    compare_tuples(keys, values, cursor.values()) == Ordering::Greater
                })
            })
            .take(size)
            .map(|(sort, doc)| SearchHit {
                id: Some(doc.id.clone()),
                score: Some(1.0),
                source: doc.source.clone(),
                sort,
            })
            .collect();
        SearchResponse {
            hits: HitsEnvelope {
                total: Some(TotalHits {
                    value: u64::try_from(state.documents.len()).unwrap_or(u64::MAX),
                    relation: TotalRelation::Equal,
                }),
                hits,
            },
        }
    }
}

#[async_trait]
impl SearchBackend for MemoryIndex {
    async fn search(&self, query: &QueryDocument) -> Result<SearchResponse, BackendError> {
        let mut state = self.lock();
        state.queries.push(query.clone());
        let round_trip = state.queries.len();
        if let Some(error) = state.failures.remove(&round_trip) {
            return Err(error);
        }
        Ok(Self::run_query(&state, query))
    }
}

#[async_trait]
impl BulkSink for MemoryIndex {
    async fn submit(&self, item: BulkItem) -> Result<(), BackendError> {
        let mut state = self.lock();
        if state.closed {
            return Err(BackendError::Closed);
        }
        let id = match item.id {
            Some(id) => id.as_str().to_owned(),
            None => {
                state.next_auto_id += 1;
                format!("auto-{}", state.next_auto_id)
            }
        };
        if let Some(error) = state.rejected_ids.get(&id) {
            return Err(error.clone());
        }
        state.upsert(id, item.document);
        state.submissions += 1;
        Ok(())
    }

    async fn close(&self) -> Result<BulkStats, BackendError> {
        let mut state = self.lock();
        state.closed = true;
        Ok(BulkStats {
            flushes: u64::from(state.submissions > 0),
            indexed: state.submissions,
            rejected: 0,
        })
    }
}

impl IndexState {
    fn upsert(&mut self, id: String, source: Value) {
        if let Some(existing) = self
            .positions
            .get(&id)
            .and_then(|position| self.documents.get_mut(*position))
        {
            existing.source = source;
            return;
        }
        self.positions.insert(id.clone(), self.documents.len());
        self.documents.push(StoredDocument { id, source });
    }
}

fn sort_values(keys: &[SortKey], doc: &StoredDocument) -> Vec<CursorValue> {
    keys.iter()
        .map(|key| match key {
            SortKey::Field { field, .. } if field == "_id" => CursorValue::Text(doc.id.clone()),
            SortKey::Field { field, .. } if field == SCORE_FIELD => CursorValue::Float(1.0),
            SortKey::Field { field, .. } => doc
                .source
                .get(field)
                .and_then(CursorValue::from_json)
                .unwrap_or(CursorValue::Null),
            SortKey::GeoDistance { field, origin, .. } => doc
                .source
                .get(field)
                .and_then(|point| serde_json::from_value::<Location>(point.clone()).ok())
                .map_or(CursorValue::Float(f64::MAX), |location| {
                    CursorValue::Float(haversine_km(origin, &location))
                }),
        })
        .collect()
}

fn order_of(key: &SortKey) -> SortOrder {
    match key {
        SortKey::Field { order, .. } | SortKey::GeoDistance { order, .. } => *order,
    }
}

fn compare_tuples(keys: &[SortKey], left: &[CursorValue], right: &[CursorValue]) -> Ordering {
    keys.iter()
        .zip(left.iter().zip(right))
        .map(|(key, (l, r))| compare_values(order_of(key), l, r))
        .find(|ordering| ordering.is_ne())
        .unwrap_or(Ordering::Equal)
}

fn compare_values(order: SortOrder, left: &CursorValue, right: &CursorValue) -> Ordering {
    match (left, right) {
        (CursorValue::Null, CursorValue::Null) => Ordering::Equal,
        (CursorValue::Null, _) => Ordering::Greater,
        (_, CursorValue::Null) => Ordering::Less,
        _ => {
            let natural = natural_order(left, right);
            match order {
                SortOrder::Asc => natural,
                SortOrder::Desc => natural.reverse(),
            }
        }
    }
}

fn natural_order(left: &CursorValue, right: &CursorValue) -> Ordering {
    match (as_number(left), as_number(right)) {
        (Some(l), Some(r)) => l.total_cmp(&r),
        _ => match (left, right) {
            (CursorValue::Text(l), CursorValue::Text(r)) => l.cmp(r),
            (CursorValue::Boolean(l), CursorValue::Boolean(r)) => l.cmp(r),
            _ => rank(left).cmp(&rank(right)),
        },
    }
}

fn as_number(value: &CursorValue) -> Option<f64> {
    match value {
        CursorValue::Integer(v) => Some(*v as f64),
        CursorValue::Unsigned(v) => Some(*v as f64),
        CursorValue::Float(v) => Some(*v),
        _ => None,
    }
}

const fn rank(value: &CursorValue) -> u8 {
    match value {
        CursorValue::Boolean(_) => 0,
        CursorValue::Integer(_) | CursorValue::Unsigned(_) | CursorValue::Float(_) => 1,
        CursorValue::Text(_) => 2,
        CursorValue::Null => 3,
    }
}

/// Great-circle distance in kilometres.
#[must_use]
pub fn haversine_km(from: &Location, to: &Location) -> f64 {
    let (lat1, lat2) = (from.latitude.to_radians(), to.latitude.to_radians());
    let d_lat = lat2 - lat1;
    let d_lon = (to.longitude - from.longitude).to_radians();
    let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * a.sqrt().asin()
}

/// `count` distinct places named `Place 1` to `Place {count}`.
#[must_use]
pub fn sample_places(count: usize) -> Vec<PlaceRecord> {
    (1..=count)
        .map(|i| {
            let step = f64::from(u32::try_from(i % 1_000).unwrap_or(0)) / 1_000.0;
            let location = Location {
                latitude: 55.0 + step,
                longitude: 37.0 + step,
            };
            PlaceRecord::new(
                format!("Place {i}"),
                format!("{i} Test Street"),
                format!("+7 495 {i:07}"),
                location,
            )
        })
        .collect()
}

/// Drive `future` to completion on a fresh current-thread runtime.
///
/// # Panics
///
/// Panics if the runtime cannot be built.
pub fn block_on_for_tests<F: Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("test runtime should build")
        .block_on(future)
}
