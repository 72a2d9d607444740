//! Scalar values coerced from header attributes and extracted field text.

use std::cmp::Ordering;
use std::fmt;

use serde::Serialize;

/// A value parsed from tool output or a header attribute.
///
/// Text is coerced in preference order: integer, float, then string.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    /// An integer value.
    Integer(i64),
    /// A floating point value.
    Float(f64),
    /// Anything that did not parse as a number.
    String(String),
}

impl Value {
    /// Coerce raw text into the most specific value type.
    pub fn coerce(raw: &str) -> Self {
        let raw = raw.trim();
        if let Ok(n) = raw.parse::<i64>() {
            return Value::Integer(n);
        }
        if let Ok(f) = raw.parse::<f64>() {
            // "nan" and "inf" parse as floats but are not usable bounds.
            if f.is_finite() {
                return Value::Float(f);
            }
        }
        Value::String(raw.to_string())
    }

    /// Attempts to convert to a number.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Integer(n) => Some(*n as f64),
            Value::Float(f) => Some(*f),
            Value::String(_) => None,
        }
    }

    /// Returns true for integer and float values.
    pub fn is_numeric(&self) -> bool {
        !matches!(self, Value::String(_))
    }

    /// Total order used to sort distinct values: numbers compare
    /// numerically and sort before strings, strings compare lexically.
    pub fn total_cmp(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Integer(l), Value::Integer(r)) => l.cmp(r),
            (Value::String(l), Value::String(r)) => l.cmp(r),
            (Value::String(_), _) => Ordering::Greater,
            (_, Value::String(_)) => Ordering::Less,
            (l, r) => {
                let l = l.as_number().unwrap_or_default();
                let r = r.as_number().unwrap_or_default();
                l.total_cmp(&r)
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(n) => write!(f, "{}", n),
            Value::Float(n) => write!(f, "{}", n),
            Value::String(s) => write!(f, "{}", s),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

/// Sort values by [`Value::total_cmp`] and drop duplicates.
pub fn sorted_distinct(mut values: Vec<Value>) -> Vec<Value> {
    values.sort_by(Value::total_cmp);
    values.dedup_by(|a, b| a.total_cmp(b) == Ordering::Equal);
    values
}
