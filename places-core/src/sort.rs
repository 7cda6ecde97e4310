//! Sort specifications for place queries.
//!
//! `search_after` pagination only works when the sort order is total: every
//! spec used for paging should end in a field whose values are unique. The
//! default spec sorts by the numeric `id` field written at ingestion time and
//! breaks remaining ties by descending relevance score.

use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};

use crate::Location;

/// Name of the numeric identifier field written into every document.
pub const ID_FIELD: &str = "id";
/// Backend pseudo-field carrying the relevance score.
pub const SCORE_FIELD: &str = "_score";
/// Name of the geo-point field holding a place's location.
pub const LOCATION_FIELD: &str = "location";

/// Direction of a sort key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Smallest first.
    Asc,
    /// Largest first.
    Desc,
}

/// One key of a [`SortSpec`].
#[derive(Debug, Clone, PartialEq)]
pub enum SortKey {
    /// Order by the value of a document field.
    Field {
        /// Field name, or a pseudo-field such as `_score` or `_id`.
        field: String,
        /// Sort direction.
        order: SortOrder,
    },
    /// Order by arc distance in kilometres from `origin`.
    GeoDistance {
        /// Geo-point field to measure from.
        field: String,
        /// Reference point.
        origin: Location,
        /// Sort direction.
        order: SortOrder,
    },
}

impl SortKey {
    /// Ascending order on `field`.
    pub fn asc(field: impl Into<String>) -> Self {
        Self::Field {
            field: field.into(),
            order: SortOrder::Asc,
        }
    }

    /// Descending order on `field`.
    pub fn desc(field: impl Into<String>) -> Self {
        Self::Field {
            field: field.into(),
            order: SortOrder::Desc,
        }
    }

    /// Nearest-first order on the location field.
    #[must_use]
    pub fn nearest_to(origin: Location) -> Self {
        Self::GeoDistance {
            field: LOCATION_FIELD.to_owned(),
            origin,
            order: SortOrder::Asc,
        }
    }
}

#[derive(Serialize)]
struct GeoDistanceBody<'a> {
    #[serde(flatten)]
    point: GeoPointEntry<'a>,
    order: SortOrder,
    unit: &'static str,
    mode: &'static str,
    distance_type: &'static str,
    ignore_unmapped: bool,
}

struct GeoPointEntry<'a> {
    field: &'a str,
    origin: &'a Location,
}

impl Serialize for GeoPointEntry<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(self.field, self.origin)?;
        map.end()
    }
}

impl Serialize for SortKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        match self {
            Self::Field { field, order } => map.serialize_entry(field, order)?,
            Self::GeoDistance {
                field,
                origin,
                order,
            } => map.serialize_entry(
                "_geo_distance",
                &GeoDistanceBody {
                    point: GeoPointEntry { field, origin },
                    order: *order,
                    unit: "km",
                    mode: "min",
                    distance_type: "arc",
                    ignore_unmapped: true,
                },
            )?,
        }
        map.end()
    }
}

/// Ordered list of sort keys.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct SortSpec(Vec<SortKey>);

impl SortSpec {
    /// Wrap a list of keys. Emptiness is rejected when a query is built.
    #[must_use]
    pub const fn new(keys: Vec<SortKey>) -> Self {
        Self(keys)
    }

    /// Borrow the keys in priority order.
    #[must_use]
    pub fn keys(&self) -> &[SortKey] {
        &self.0
    }

    /// Number of keys, which is also the arity of every cursor.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no sort keys are set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for SortSpec {
    fn default() -> Self {
        Self(vec![SortKey::asc(ID_FIELD), SortKey::desc(SCORE_FIELD)])
    }
}

impl From<Vec<SortKey>> for SortSpec {
    fn from(keys: Vec<SortKey>) -> Self {
        Self(keys)
    }
}
