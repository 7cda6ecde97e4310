//! Continuation cursors for `search_after` pagination.
//!
//! The backend attaches a tuple of sort values to every hit. Feeding the tuple
//! of the last hit back as `search_after` resumes the scan strictly after that
//! hit. Values keep their natural JSON type so they round-trip unchanged.

use serde::{Deserialize, Serialize};

/// One element of a hit's sort tuple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CursorValue {
    /// JSON boolean.
    Boolean(bool),
    /// Signed integer.
    Integer(i64),
    /// Unsigned integer beyond `i64::MAX`.
    Unsigned(u64),
    /// Floating point number, such as a score or distance.
    Float(f64),
    /// String value, such as a keyword or `_id`.
    Text(String),
    /// Missing value.
    Null,
}

impl CursorValue {
    /// Whether the value can be rendered as JSON without loss.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        match self {
            Self::Float(value) => value.is_finite(),
            _ => true,
        }
    }

    /// Convert a JSON value into a cursor value.
    ///
    /// Arrays and objects are not valid sort values and map to `None`.
    #[must_use]
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        use serde_json::Value;
        match value {
            Value::Null => Some(Self::Null),
            Value::Bool(flag) => Some(Self::Boolean(*flag)),
            Value::Number(number) => number
                .as_i64()
                .map(Self::Integer)
                .or_else(|| number.as_u64().map(Self::Unsigned))
                .or_else(|| number.as_f64().map(Self::Float)),
            Value::String(text) => Some(Self::Text(text.clone())),
            Value::Array(_) | Value::Object(_) => None,
        }
    }
}

impl From<i64> for CursorValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for CursorValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for CursorValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

/// Sort-value tuple of the last hit in a batch.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cursor(Vec<CursorValue>);

impl Cursor {
    /// Wrap a tuple of sort values.
    #[must_use]
    pub const fn new(values: Vec<CursorValue>) -> Self {
        Self(values)
    }

    /// Borrow the sort values.
    #[must_use]
    pub fn values(&self) -> &[CursorValue] {
        &self.0
    }

    /// Number of values in the tuple.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the tuple is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<CursorValue>> for Cursor {
    fn from(values: Vec<CursorValue>) -> Self {
        Self(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case(json!(7), CursorValue::Integer(7))]
    #[case(json!(u64::MAX), CursorValue::Unsigned(u64::MAX))]
    #[case(json!(1.25), CursorValue::Float(1.25))]
    #[case(json!("abc"), CursorValue::Text("abc".to_owned()))]
    #[case(json!(true), CursorValue::Boolean(true))]
    #[case(json!(null), CursorValue::Null)]
    fn decodes_sort_values_by_natural_type(
        #[case] raw: serde_json::Value,
        #[case] expected: CursorValue,
    ) {
        let decoded: CursorValue = serde_json::from_value(raw).expect("decode cursor value");
        assert_eq!(decoded, expected);
    }

    #[rstest]
    fn cursor_serialises_as_plain_array() {
        let cursor = Cursor::new(vec![CursorValue::Integer(20), CursorValue::Float(1.0)]);
        let value = serde_json::to_value(&cursor).expect("serialise cursor");
        assert_eq!(value, json!([20, 1.0]));
    }

    #[rstest]
    fn from_json_rejects_composite_values() {
        assert_eq!(CursorValue::from_json(&json!([1])), None);
        assert_eq!(CursorValue::from_json(&json!({"a": 1})), None);
    }

    #[rstest]
    fn non_finite_floats_are_flagged() {
        assert!(!CursorValue::Float(f64::NAN).is_finite());
        assert!(CursorValue::Text("x".to_owned()).is_finite());
    }
}
