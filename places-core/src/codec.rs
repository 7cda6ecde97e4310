//! Mapping between stored documents and [`PlaceRecord`] values.

use serde_json::{Map, Value, json};
use thiserror::Error;

use crate::sort::{ID_FIELD, LOCATION_FIELD};
use crate::{Location, LocationError, PlaceRecord, SearchHit};

/// A stored document that does not describe a place.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeError {
    /// The document body is not a JSON object.
    #[error("document is not a JSON object")]
    NotAnObject,
    /// A required field is absent.
    #[error("document is missing required field `{field}`")]
    MissingField {
        /// Dotted path of the field.
        field: &'static str,
    },
    /// A field has the wrong JSON type.
    #[error("field `{field}` must be {expected}")]
    InvalidField {
        /// Dotted path of the field.
        field: &'static str,
        /// Expected JSON type.
        expected: &'static str,
    },
    /// The location is not a valid coordinate pair.
    #[error("document location is invalid: {source}")]
    InvalidLocation {
        /// Validation failure.
        #[source]
        source: LocationError,
    },
}

/// Encoder and decoder for place documents.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecordCodec;

impl RecordCodec {
    /// Decode the `_source` of a search hit.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError`] when a required field is missing or malformed.
    pub fn decode(hit: &SearchHit) -> Result<PlaceRecord, DecodeError> {
        Self::decode_source(&hit.source)
    }

    /// Decode a stored document body.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError`] when a required field is missing or malformed.
    pub fn decode_source(source: &Value) -> Result<PlaceRecord, DecodeError> {
        let object = source.as_object().ok_or(DecodeError::NotAnObject)?;
        let name = text_field(object, "name")?;
        let address = text_field(object, "address")?;
        let phone = text_field(object, "phone")?;
        let location = location_field(object)?;
        Ok(PlaceRecord {
            name,
            address,
            phone,
            location,
        })
    }

    /// Encode a record as a stored document body.
    #[must_use]
    pub fn encode(record: &PlaceRecord) -> Value {
        json!({
            "name": record.name,
            "address": record.address,
            "phone": record.phone,
            LOCATION_FIELD: {
                "lat": record.location.latitude,
                "lon": record.location.longitude,
            },
        })
    }

    /// Encode a record with its numeric id, which the default sort uses as
    /// its unique tie-breaker.
    #[must_use]
    pub fn encode_with_id(record: &PlaceRecord, id: u64) -> Value {
        let mut document = Self::encode(record);
        if let Value::Object(fields) = &mut document {
            fields.insert(ID_FIELD.to_owned(), Value::from(id));
        }
        document
    }
}

fn text_field(object: &Map<String, Value>, field: &'static str) -> Result<String, DecodeError> {
    match object.get(field) {
        None | Some(Value::Null) => Err(DecodeError::MissingField { field }),
        Some(Value::String(text)) => Ok(text.clone()),
        Some(_) => Err(DecodeError::InvalidField {
            field,
            expected: "a string",
        }),
    }
}

fn coordinate(
    point: &Map<String, Value>,
    keys: [&str; 2],
    field: &'static str,
) -> Result<f64, DecodeError> {
    let value = keys
        .iter()
        .find_map(|key| point.get(*key))
        .ok_or(DecodeError::MissingField { field })?;
    value.as_f64().ok_or(DecodeError::InvalidField {
        field,
        expected: "a number",
    })
}

fn location_field(object: &Map<String, Value>) -> Result<Location, DecodeError> {
    let point = match object.get(LOCATION_FIELD) {
        None | Some(Value::Null) => {
            return Err(DecodeError::MissingField {
                field: LOCATION_FIELD,
            });
        }
        Some(Value::Object(point)) => point,
        Some(_) => {
            return Err(DecodeError::InvalidField {
                field: LOCATION_FIELD,
                expected: "a geo-point object",
            });
        }
    };
    let latitude = coordinate(point, ["lat", "latitude"], "location.lat")?;
    let longitude = coordinate(point, ["lon", "longitude"], "location.lon")?;
    Location::new(latitude, longitude).map_err(|source| DecodeError::InvalidLocation { source })
}
