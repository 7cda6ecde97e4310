//! Query documents for the search backend.
//!
//! [`build_query`] is pure: it validates its inputs and returns a typed
//! [`QueryDocument`] whose JSON form is what the backend receives.

use serde::Serialize;
use thiserror::Error;

use crate::{Cursor, SortSpec};

/// Caller-supplied arguments that cannot describe a valid request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidArgument {
    /// The requested number of records was negative.
    #[error("negative limit is not allowed (got {0})")]
    NegativeLimit(i64),
    /// The requested offset was negative.
    #[error("negative offset is not allowed (got {0})")]
    NegativeOffset(i64),
    /// No sort keys were supplied.
    #[error("at least one sort key is required")]
    EmptySortSpec,
    /// The cursor does not line up with the sort keys.
    #[error("cursor has {actual} values but the sort spec has {expected} keys")]
    CursorArity {
        /// Number of sort keys.
        expected: usize,
        /// Number of cursor values.
        actual: usize,
    },
    /// A cursor value cannot be represented in JSON.
    #[error("cursor value at position {position} is not a finite number")]
    NonFiniteCursorValue {
        /// Zero-based index into the cursor.
        position: usize,
    },
    /// A single-request lookup asked for more hits than one batch holds.
    #[error("count {requested} exceeds the batch cap of {cap}")]
    CountAboveCap {
        /// Requested number of hits.
        requested: usize,
        /// Largest batch the paginator requests.
        cap: usize,
    },
}

/// A single search request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryDocument {
    /// Maximum number of hits to return.
    pub size: u64,
    /// Sort order of the hits.
    pub sort: SortSpec,
    /// Resume strictly after this tuple of sort values.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_after: Option<Cursor>,
    /// Ask the backend for an exact total instead of a lower bound.
    pub track_total_hits: bool,
}

/// Build a query for up to `limit` hits ordered by `sort`, resuming after
/// `cursor` when one is given.
///
/// # Errors
///
/// Returns [`InvalidArgument`] when `limit` is negative, `sort` is empty, or
/// the cursor does not match the sort spec.
///
/// # Examples
///
/// ```
/// use places_core::{Cursor, CursorValue, SortSpec, build_query};
/// use serde_json::json;
///
/// let cursor = Cursor::new(vec![CursorValue::Integer(20), CursorValue::Float(1.0)]);
/// let query = build_query(10, Some(&cursor), &SortSpec::default())?;
/// assert_eq!(
///     serde_json::to_value(&query)?,
///     json!({
///         "size": 10,
///         "sort": [{"id": "asc"}, {"_score": "desc"}],
///         "search_after": [20, 1.0],
///         "track_total_hits": true
///     })
/// );
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn build_query(
    limit: i64,
    cursor: Option<&Cursor>,
    sort: &SortSpec,
) -> Result<QueryDocument, InvalidArgument> {
    let size = u64::try_from(limit).map_err(|_| InvalidArgument::NegativeLimit(limit))?;
    if sort.is_empty() {
        return Err(InvalidArgument::EmptySortSpec);
    }
    if let Some(cursor) = cursor {
        if cursor.len() != sort.len() {
            return Err(InvalidArgument::CursorArity {
                expected: sort.len(),
                actual: cursor.len(),
            });
        }
        if let Some(position) = cursor.values().iter().position(|value| !value.is_finite()) {
            return Err(InvalidArgument::NonFiniteCursorValue { position });
        }
    }
    Ok(QueryDocument {
        size,
        sort: sort.clone(),
        search_after: cursor.cloned(),
        track_total_hits: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CursorValue, SortKey};
    use rstest::{fixture, rstest};
    use serde_json::json;

    #[fixture]
    fn spec() -> SortSpec {
        SortSpec::default()
    }

    #[rstest]
    fn first_page_omits_search_after(spec: SortSpec) {
        let query = build_query(10_000, None, &spec).expect("query should build");
        let value = serde_json::to_value(&query).expect("serialise query");
        assert_eq!(
            value,
            json!({
                "size": 10_000,
                "sort": [{"id": "asc"}, {"_score": "desc"}],
                "track_total_hits": true
            })
        );
    }

    #[rstest]
    fn cursor_values_keep_their_type(spec: SortSpec) {
        let cursor = Cursor::new(vec![
            CursorValue::Text("Bar \"Moon\"".to_owned()),
            CursorValue::Float(0.5),
        ]);
        let query = build_query(3, Some(&cursor), &spec).expect("query should build");
        let value = serde_json::to_value(&query).expect("serialise query");
        assert_eq!(value["search_after"], json!(["Bar \"Moon\"", 0.5]));
    }

    #[rstest]
    fn zero_limit_is_allowed(spec: SortSpec) {
        let query = build_query(0, None, &spec).expect("zero is a valid size");
        assert_eq!(query.size, 0);
    }

    #[rstest]
    fn negative_limit_is_rejected(spec: SortSpec) {
        let err = build_query(-1, None, &spec).expect_err("negative limit must fail");
        assert_eq!(err, InvalidArgument::NegativeLimit(-1));
    }

    #[rstest]
    fn empty_sort_spec_is_rejected() {
        let err = build_query(5, None, &SortSpec::new(Vec::new())).expect_err("empty spec");
        assert_eq!(err, InvalidArgument::EmptySortSpec);
    }

    #[rstest]
    #[case(vec![CursorValue::Integer(1)])]
    #[case(vec![CursorValue::Integer(1), CursorValue::Null, CursorValue::Null])]
    fn cursor_arity_must_match(#[case] values: Vec<CursorValue>) {
        let spec = SortSpec::new(vec![SortKey::asc("id"), SortKey::desc("_score")]);
        let cursor = Cursor::new(values);
        let err = build_query(5, Some(&cursor), &spec).expect_err("arity mismatch");
        assert!(matches!(err, InvalidArgument::CursorArity { expected: 2, .. }));
    }

    #[rstest]
    fn non_finite_cursor_values_are_rejected(spec: SortSpec) {
        let cursor = Cursor::new(vec![CursorValue::Integer(1), CursorValue::Float(f64::NAN)]);
        let err = build_query(5, Some(&cursor), &spec).expect_err("NaN cursor");
        assert_eq!(err, InvalidArgument::NonFiniteCursorValue { position: 1 });
    }
}
