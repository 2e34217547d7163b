//! Stable error codes.
//!
//! Codes are grouped by category in the high byte so clients can branch on
//! the category without matching every code.

use std::fmt;

use crate::constants::{SQLSTATE_GENERAL_ERROR, SQLSTATE_WARNING};

/// Error codes for categorizing errors and warnings.
///
/// These codes can be used for programmatic error handling and
/// are stable across versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum ErrorCode {
    // General errors (0x0000 - 0x00FF)
    /// Unknown or unspecified error.
    Unknown = 0x0000,
    /// Internal error (bug).
    Internal = 0x0001,
    /// Operation not supported.
    NotSupported = 0x0002,
    /// Invalid argument provided.
    InvalidArgument = 0x0003,

    // Wire errors (0x0100 - 0x01FF)
    /// Input ended before a value was complete.
    Truncated = 0x0100,
    /// Length code not valid for the type.
    InvalidLength = 0x0101,
    /// Value does not fit the requested type.
    ValueOutOfRange = 0x0102,
    /// Temporal field outside its calendar range.
    InvalidTemporal = 0x0103,
    /// Unknown wire type code.
    UnknownFieldType = 0x0104,

    // Parameter errors (0x0200 - 0x02FF)
    /// Wrong number of parameter values.
    ParamCountMismatch = 0x0200,
    /// Parameter value could not be decoded.
    ParamTypeInvalid = 0x0201,
    /// Long data sent for a parameter bound with a non-string type.
    StreamedDataIncompatible = 0x0202,
    /// Long data could not be accepted.
    LongDataFailed = 0x0203,
    /// String value was truncated while converting to a number (warning).
    TruncatedValue = 0x0204,

    // Statement errors (0x0300 - 0x03FF)
    /// Statement id not found in the session.
    UnknownStatement = 0x0300,
    /// Statement is already executing.
    StatementInUse = 0x0301,
    /// Per-session statement limit reached.
    TooManyStatements = 0x0302,
    /// Command not valid in the statement's lifecycle state.
    InvalidState = 0x0303,
    /// Statement text failed to compile.
    CompileFailed = 0x0304,
    /// Referenced metadata changed since the plan was compiled.
    StaleMetadata = 0x0305,
    /// Metadata kept changing across every allowed reprepare.
    ReprepareExhausted = 0x0306,
    /// Result set shape changed after a reprepare (warning).
    MetadataChanged = 0x0307,
    /// Execution refused by session policy.
    PolicyRejected = 0x0308,

    // Execution errors (0x0400 - 0x04FF)
    /// Plan execution failed.
    ExecutionFailed = 0x0400,
    /// Execution was interrupted by a kill request.
    Interrupted = 0x0401,
    /// Lock acquisition failed.
    LockFailed = 0x0402,
    /// Deadlock detected.
    Deadlock = 0x0403,

    // Cursor errors (0x0500 - 0x05FF)
    /// Fetch without an open cursor.
    CursorNotOpen = 0x0500,

    // Resource errors (0x0600 - 0x06FF)
    /// Memory allocation failed.
    OutOfMemory = 0x0600,
    /// Result sink could not accept output.
    SinkFailed = 0x0601,
}

impl ErrorCode {
    /// Returns the numeric code.
    #[inline]
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }

    /// Returns the error category name.
    #[must_use]
    pub const fn category(&self) -> &'static str {
        match (*self as u16) >> 8 {
            0x00 => "General",
            0x01 => "Wire",
            0x02 => "Parameter",
            0x03 => "Statement",
            0x04 => "Execution",
            0x05 => "Cursor",
            0x06 => "Resource",
            _ => "Unknown",
        }
    }

    /// Returns the five character SQLSTATE reported to clients.
    #[must_use]
    pub const fn sqlstate(&self) -> &'static str {
        match self {
            Self::TruncatedValue | Self::MetadataChanged => SQLSTATE_WARNING,
            Self::ParamTypeInvalid | Self::ValueOutOfRange => "22003",
            Self::InvalidTemporal => "22007",
            Self::CompileFailed => "42000",
            Self::Deadlock => "40001",
            Self::Interrupted => "70100",
            Self::CursorNotOpen => "24000",
            Self::NotSupported => "0A000",
            _ => SQLSTATE_GENERAL_ERROR,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category() {
        assert_eq!(ErrorCode::Internal.category(), "General");
        assert_eq!(ErrorCode::Truncated.category(), "Wire");
        assert_eq!(ErrorCode::ParamCountMismatch.category(), "Parameter");
        assert_eq!(ErrorCode::ReprepareExhausted.category(), "Statement");
        assert_eq!(ErrorCode::Interrupted.category(), "Execution");
        assert_eq!(ErrorCode::CursorNotOpen.category(), "Cursor");
        assert_eq!(ErrorCode::OutOfMemory.category(), "Resource");
    }

    #[test]
    fn test_sqlstate() {
        assert_eq!(ErrorCode::TruncatedValue.sqlstate(), "01000");
        assert_eq!(ErrorCode::CursorNotOpen.sqlstate(), "24000");
        assert_eq!(ErrorCode::StaleMetadata.sqlstate(), "HY000");
    }

    #[test]
    fn test_display() {
        assert_eq!(ErrorCode::StatementInUse.to_string(), "StatementInUse");
        assert_eq!(ErrorCode::StatementInUse.as_u16(), 0x0301);
    }
}
