//! Wire field types.
//!
//! The numeric codes match the MySQL binary protocol so that existing
//! client libraries can bind parameters without translation.

use std::fmt;

use crate::error::{WireError, WireResult};

/// Type code carried with every bound parameter and result column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FieldType {
    /// Legacy decimal, sent as text.
    Decimal = 0,
    /// 1-byte integer.
    Tiny = 1,
    /// 2-byte integer.
    Short = 2,
    /// 4-byte integer.
    Long = 3,
    /// 4-byte IEEE float.
    Float = 4,
    /// 8-byte IEEE double.
    Double = 5,
    /// SQL NULL with no payload.
    Null = 6,
    /// Timestamp, date-time layout.
    Timestamp = 7,
    /// 8-byte integer.
    LongLong = 8,
    /// 3-byte integer, sent in 4 bytes.
    Int24 = 9,
    /// Calendar date.
    Date = 10,
    /// Signed time duration.
    Time = 11,
    /// Date and time of day.
    DateTime = 12,
    /// Year, sent as 2-byte integer.
    Year = 13,
    /// Variable character string.
    VarChar = 15,
    /// Bit string, sent as bytes.
    Bit = 16,
    /// JSON document, sent as bytes.
    Json = 245,
    /// Fixed-point decimal, sent as text.
    NewDecimal = 246,
    /// Enumeration member, sent as text.
    Enum = 247,
    /// Set members, sent as text.
    Set = 248,
    /// Tiny blob.
    TinyBlob = 249,
    /// Medium blob.
    MediumBlob = 250,
    /// Long blob.
    LongBlob = 251,
    /// Blob.
    Blob = 252,
    /// Variable string.
    VarString = 253,
    /// Fixed string.
    String = 254,
    /// Geometry, sent as bytes.
    Geometry = 255,
}

impl FieldType {
    /// Converts from a raw type code.
    pub fn from_u8(value: u8) -> WireResult<Self> {
        let field_type = match value {
            0 => Self::Decimal,
            1 => Self::Tiny,
            2 => Self::Short,
            3 => Self::Long,
            4 => Self::Float,
            5 => Self::Double,
            6 => Self::Null,
            7 => Self::Timestamp,
            8 => Self::LongLong,
            9 => Self::Int24,
            10 => Self::Date,
            11 => Self::Time,
            12 => Self::DateTime,
            13 => Self::Year,
            15 => Self::VarChar,
            16 => Self::Bit,
            245 => Self::Json,
            246 => Self::NewDecimal,
            247 => Self::Enum,
            248 => Self::Set,
            249 => Self::TinyBlob,
            250 => Self::MediumBlob,
            251 => Self::LongBlob,
            252 => Self::Blob,
            253 => Self::VarString,
            254 => Self::String,
            255 => Self::Geometry,
            other => return Err(WireError::UnknownFieldType(other)),
        };
        Ok(field_type)
    }

    /// Returns the raw type code.
    #[inline]
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Returns the encoded width of fixed-width types.
    #[must_use]
    pub const fn fixed_width(self) -> Option<usize> {
        match self {
            Self::Null => Some(0),
            Self::Tiny => Some(1),
            Self::Short | Self::Year => Some(2),
            Self::Long | Self::Int24 | Self::Float => Some(4),
            Self::LongLong | Self::Double => Some(8),
            _ => None,
        }
    }

    /// Returns true for integer types (including YEAR).
    #[must_use]
    pub const fn is_integer(self) -> bool {
        matches!(
            self,
            Self::Tiny | Self::Short | Self::Long | Self::Int24 | Self::LongLong | Self::Year
        )
    }

    /// Returns true for decimal types sent as text.
    #[must_use]
    pub const fn is_decimal(self) -> bool {
        matches!(self, Self::Decimal | Self::NewDecimal)
    }

    /// Returns true for DATE, DATETIME, TIMESTAMP and TIME.
    #[must_use]
    pub const fn is_temporal(self) -> bool {
        matches!(
            self,
            Self::Date | Self::DateTime | Self::Timestamp | Self::Time
        )
    }

    /// Returns true for types whose payload is an opaque byte string.
    #[must_use]
    pub const fn is_byte_string(self) -> bool {
        matches!(
            self,
            Self::VarChar
                | Self::Bit
                | Self::Json
                | Self::Enum
                | Self::Set
                | Self::TinyBlob
                | Self::MediumBlob
                | Self::LongBlob
                | Self::Blob
                | Self::VarString
                | Self::String
                | Self::Geometry
        )
    }

    /// Returns true if a parameter bound with this type may receive
    /// streamed long data.
    #[must_use]
    pub const fn accepts_long_data(self) -> bool {
        matches!(
            self,
            Self::VarChar
                | Self::TinyBlob
                | Self::MediumBlob
                | Self::LongBlob
                | Self::Blob
                | Self::VarString
                | Self::String
        )
    }

    /// Returns true if values of this type carry an embedded length in a
    /// binary result row.
    #[must_use]
    pub const fn is_length_prefixed_in_row(self) -> bool {
        self.is_byte_string() || self.is_decimal()
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl TryFrom<u8> for FieldType {
    type Error = WireError;

    fn try_from(value: u8) -> WireResult<Self> {
        Self::from_u8(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_u8() {
        assert_eq!(FieldType::from_u8(3).unwrap(), FieldType::Long);
        assert_eq!(FieldType::from_u8(246).unwrap(), FieldType::NewDecimal);
        assert_eq!(FieldType::from_u8(14), Err(WireError::UnknownFieldType(14)));
        assert!(FieldType::try_from(100).is_err());
    }

    #[test]
    fn test_code_roundtrip() {
        for code in 0..=255u8 {
            if let Ok(ft) = FieldType::from_u8(code) {
                assert_eq!(ft.as_u8(), code);
            }
        }
    }

    #[test]
    fn test_fixed_width() {
        assert_eq!(FieldType::Tiny.fixed_width(), Some(1));
        assert_eq!(FieldType::Year.fixed_width(), Some(2));
        assert_eq!(FieldType::Int24.fixed_width(), Some(4));
        assert_eq!(FieldType::Double.fixed_width(), Some(8));
        assert_eq!(FieldType::VarString.fixed_width(), None);
        assert_eq!(FieldType::Date.fixed_width(), None);
    }

    #[test]
    fn test_long_data_types() {
        assert!(FieldType::Blob.accepts_long_data());
        assert!(FieldType::VarString.accepts_long_data());
        assert!(!FieldType::Long.accepts_long_data());
        assert!(!FieldType::Json.accepts_long_data());
    }
}
