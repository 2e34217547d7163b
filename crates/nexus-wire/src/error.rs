//! Wire codec error types.

use nexus_common::ErrorCode;
use thiserror::Error;

use crate::types::FieldType;

/// Result type for codec operations.
pub type WireResult<T> = Result<T, WireError>;

/// Errors raised while decoding or encoding wire values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WireError {
    /// Input ended before the value was complete.
    #[error("{field_type:?} value truncated: need {needed} bytes, have {available}")]
    Truncated {
        field_type: FieldType,
        needed: usize,
        available: usize,
    },

    /// Length code not valid for the type.
    #[error("invalid length code {length} for {field_type:?}")]
    InvalidLength { field_type: FieldType, length: u8 },

    /// Value does not fit the requested type.
    #[error("value out of range for {field_type:?}: {reason}")]
    OutOfRange {
        field_type: FieldType,
        reason: String,
    },

    /// Temporal sub-field outside its calendar range.
    #[error("invalid {field} {value} in {field_type:?} value")]
    InvalidTemporal {
        field_type: FieldType,
        field: &'static str,
        value: u32,
    },

    /// Value kind cannot be written as the requested type.
    #[error("cannot encode {kind} as {field_type:?}")]
    KindMismatch {
        field_type: FieldType,
        kind: &'static str,
    },

    /// Unknown wire type code.
    #[error("unknown field type code {0}")]
    UnknownFieldType(u8),

    /// Decimal text is not valid UTF-8.
    #[error("decimal value is not valid UTF-8")]
    InvalidDecimalText,

    /// Malformed packet payload.
    #[error("malformed packet: {0}")]
    Malformed(String),
}

impl WireError {
    /// Creates an out-of-range error.
    pub fn out_of_range(field_type: FieldType, reason: impl Into<String>) -> Self {
        Self::OutOfRange {
            field_type,
            reason: reason.into(),
        }
    }

    /// Creates a malformed packet error.
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::Malformed(reason.into())
    }

    /// Returns the error code for this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Truncated { .. } | Self::Malformed(_) => ErrorCode::Truncated,
            Self::InvalidLength { .. } => ErrorCode::InvalidLength,
            Self::OutOfRange { .. } | Self::KindMismatch { .. } | Self::InvalidDecimalText => {
                ErrorCode::ValueOutOfRange
            }
            Self::InvalidTemporal { .. } => ErrorCode::InvalidTemporal,
            Self::UnknownFieldType(_) => ErrorCode::UnknownFieldType,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = WireError::Truncated {
            field_type: FieldType::Long,
            needed: 4,
            available: 2,
        };
        assert_eq!(err.to_string(), "Long value truncated: need 4 bytes, have 2");
        assert_eq!(err.code(), ErrorCode::Truncated);
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(WireError::UnknownFieldType(99).code(), ErrorCode::UnknownFieldType);
        assert_eq!(
            WireError::out_of_range(FieldType::Tiny, "300").code(),
            ErrorCode::ValueOutOfRange
        );
    }
}
