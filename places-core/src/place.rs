//! Place records and their geographic position.
//!
//! A [`PlaceRecord`] is the unit both the paginator returns and the ingestor
//! writes. Coordinates are WGS84 degrees and are validated on construction so
//! that every record reaching the index carries a usable geo-point.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Latitude and longitude of a place.
///
/// On the wire the location is a geo-point object `{"lat": .., "lon": ..}`;
/// the long-form keys `latitude` and `longitude` are accepted when decoding.
///
/// # Examples
///
/// ```
/// use places_core::Location;
///
/// # fn main() -> Result<(), places_core::LocationError> {
/// let location = Location::new(55.753_215, 37.622_504)?;
/// assert_eq!(location.latitude, 55.753_215);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// Degrees north of the equator, in `[-90, 90]`.
    #[serde(rename = "lat", alias = "latitude")]
    pub latitude: f64,
    /// Degrees east of the prime meridian, in `[-180, 180]`.
    #[serde(rename = "lon", alias = "longitude")]
    pub longitude: f64,
}

/// Errors returned by [`Location::new`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LocationError {
    /// A coordinate was NaN or infinite.
    #[error("coordinates must be finite (lat {latitude}, lon {longitude})")]
    NonFinite {
        /// Latitude as supplied.
        latitude: f64,
        /// Longitude as supplied.
        longitude: f64,
    },
    /// Latitude fell outside `[-90, 90]`.
    #[error("latitude {0} is outside [-90, 90]")]
    LatitudeOutOfRange(f64),
    /// Longitude fell outside `[-180, 180]`.
    #[error("longitude {0} is outside [-180, 180]")]
    LongitudeOutOfRange(f64),
}

impl Location {
    /// Validates and constructs a [`Location`].
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, LocationError> {
        if !latitude.is_finite() || !longitude.is_finite() {
            return Err(LocationError::NonFinite {
                latitude,
                longitude,
            });
        }
        if !(-90.0..=90.0).contains(&latitude) {
            return Err(LocationError::LatitudeOutOfRange(latitude));
        }
        if !(-180.0..=180.0).contains(&longitude) {
            return Err(LocationError::LongitudeOutOfRange(longitude));
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }
}

/// A point of interest as stored in the places index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceRecord {
    /// Display name.
    pub name: String,
    /// Free-form postal address.
    pub address: String,
    /// Contact phone number, possibly empty.
    pub phone: String,
    /// Geographic position.
    pub location: Location,
}

impl PlaceRecord {
    /// Construct a record from its parts.
    pub fn new(
        name: impl Into<String>,
        address: impl Into<String>,
        phone: impl Into<String>,
        location: Location,
    ) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            phone: phone.into(),
            location,
        }
    }
}

/// Caller-assigned document identifier.
///
/// Re-ingesting a record under the same id replaces the stored document, so
/// ids are what make repeated ingestion runs idempotent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    /// Wrap an identifier string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the identifier text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Numeric value of the identifier, when it is an unsigned integer.
    #[must_use]
    pub fn as_number(&self) -> Option<u64> {
        self.0.parse().ok()
    }
}

impl From<u64> for DocumentId {
    fn from(value: u64) -> Self {
        Self(value.to_string())
    }
}

impl AsRef<str> for DocumentId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
