//! Decoded parameter and column values.

use std::fmt;

use bytes::Bytes;

use crate::temporal::Temporal;

/// A single value as it travels over the wire.
///
/// Strings and blobs are kept as raw bytes; character set handling belongs
/// to the executor.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// SQL NULL.
    Null,
    /// Signed integer.
    Int(i64),
    /// Unsigned integer.
    UInt(u64),
    /// Floating point (FLOAT values are widened).
    Double(f64),
    /// Fixed-point decimal in its textual form.
    Decimal(String),
    /// Date, date-time or time.
    Temporal(Temporal),
    /// String or blob bytes.
    Bytes(Bytes),
}

impl Value {
    /// Returns true for NULL.
    #[inline]
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Short name of the value kind, used in error messages.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Null => "NULL",
            Self::Int(_) => "integer",
            Self::UInt(_) => "unsigned integer",
            Self::Double(_) => "double",
            Self::Decimal(_) => "decimal",
            Self::Temporal(Temporal::Date(_)) => "date",
            Self::Temporal(Temporal::DateTime(_)) => "datetime",
            Self::Temporal(Temporal::Time(_)) => "time",
            Self::Bytes(_) => "bytes",
        }
    }

    /// Creates a byte value from a string.
    #[must_use]
    pub fn text(s: &str) -> Self {
        Self::Bytes(Bytes::copy_from_slice(s.as_bytes()))
    }

    /// Returns the byte payload of string values.
    #[must_use]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(b) => Some(b),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            Self::Int(v) => write!(f, "{v}"),
            Self::UInt(v) => write!(f, "{v}"),
            Self::Double(v) => write!(f, "{v}"),
            Self::Decimal(v) => write!(f, "{v}"),
            Self::Temporal(t) => write!(f, "{t}"),
            Self::Bytes(b) => write!(f, "{}", String::from_utf8_lossy(b)),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Self::UInt(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Double(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::text(v)
    }
}

impl From<Temporal> for Value {
    fn from(v: Temporal) -> Self {
        Self::Temporal(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::temporal::DateTimeParts;

    #[test]
    fn test_conversions() {
        assert_eq!(Value::from(7i32), Value::Int(7));
        assert_eq!(Value::from(7u64), Value::UInt(7));
        assert_eq!(Value::from("abc").as_bytes(), Some(&b"abc"[..]));
        assert_eq!(Value::from(None::<i64>), Value::Null);
        assert!(Value::Null.is_null());
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::Int(-3).to_string(), "-3");
        assert_eq!(Value::Decimal("1.50".into()).to_string(), "1.50");
        assert_eq!(
            Value::Temporal(Temporal::Date(DateTimeParts::date(2024, 1, 2))).to_string(),
            "2024-01-02"
        );
        assert_eq!(Value::text("hi").to_string(), "hi");
    }

    #[test]
    fn test_kind_name() {
        assert_eq!(Value::UInt(1).kind_name(), "unsigned integer");
        assert_eq!(
            Value::Temporal(Temporal::DateTime(DateTimeParts::default())).kind_name(),
            "datetime"
        );
    }
}
