//! Row-to-record conversion.
//!
//! Column layout: `0 id, 1 name, 2 address, 3 phone, 4 longitude, 5 latitude`.
//! Coordinates are parsed as `f64` and range-checked.

use places_core::{Location, LocationError, PlaceRecord};
use thiserror::Error;

use super::SourceRow;

/// Column holding the source identifier.
pub const COLUMN_ID: usize = 0;
const COLUMN_NAME: usize = 1;
const COLUMN_ADDRESS: usize = 2;
const COLUMN_PHONE: usize = 3;
const COLUMN_LONGITUDE: usize = 4;
const COLUMN_LATITUDE: usize = 5;

/// A row that cannot become a [`PlaceRecord`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransformError {
    /// The row has too few fields.
    #[error("missing column {column} ({name})")]
    MissingColumn {
        /// Zero-based column number.
        column: usize,
        /// Column meaning.
        name: &'static str,
    },
    /// A coordinate is not a decimal number.
    #[error("column {column} ({name}) is not a number: {value:?}")]
    InvalidCoordinate {
        /// Zero-based column number.
        column: usize,
        /// Column meaning.
        name: &'static str,
        /// Raw field text.
        value: String,
    },
    /// The id column does not hold an unsigned integer.
    #[error("column {column} (id) is not an unsigned integer: {value:?}")]
    InvalidId {
        /// Zero-based column number.
        column: usize,
        /// Raw field text.
        value: String,
    },
    /// The coordinates are outside the valid range.
    #[error("coordinates out of range: {0}")]
    OutOfRange(#[from] LocationError),
}

pub(super) fn required(
    row: &SourceRow,
    column: usize,
    name: &'static str,
) -> Result<String, TransformError> {
    row.field(column)
        .map(str::to_owned)
        .ok_or(TransformError::MissingColumn { column, name })
}

fn coordinate(row: &SourceRow, column: usize, name: &'static str) -> Result<f64, TransformError> {
    let raw = required(row, column, name)?;
    raw.trim()
        .parse()
        .map_err(|_| TransformError::InvalidCoordinate {
            column,
            name,
            value: raw.clone(),
        })
}

pub(super) fn numeric_id(row: &SourceRow) -> Result<u64, TransformError> {
    let raw = required(row, COLUMN_ID, "id")?;
    raw.trim().parse().map_err(|_| TransformError::InvalidId {
        column: COLUMN_ID,
        value: raw.clone(),
    })
}

/// Convert a source row into a place record.
///
/// # Errors
///
/// Returns [`TransformError`] when a column is missing, a coordinate does not
/// parse, or the coordinates are out of range.
pub fn transform_row(row: &SourceRow) -> Result<PlaceRecord, TransformError> {
    let name = required(row, COLUMN_NAME, "name")?;
    let address = required(row, COLUMN_ADDRESS, "address")?;
    let phone = required(row, COLUMN_PHONE, "phone")?;
    let longitude = coordinate(row, COLUMN_LONGITUDE, "longitude")?;
    let latitude = coordinate(row, COLUMN_LATITUDE, "latitude")?;
    let location = Location::new(latitude, longitude)?;
    Ok(PlaceRecord {
        name,
        address,
        phone,
        location,
    })
}
