//! Diagnostic conditions.
//!
//! A condition is one entry of a diagnostics area: an error, a warning or
//! a note, with the code and text reported to the client.

use std::fmt;

use thiserror::Error;

use super::ErrorCode;

/// Severity of a diagnostic condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    /// Informational note.
    Note,
    /// Warning; the statement still succeeded.
    Warning,
    /// Error; the statement failed.
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Note => write!(f, "Note"),
            Self::Warning => write!(f, "Warning"),
            Self::Error => write!(f, "Error"),
        }
    }
}

/// A single diagnostic condition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{severity} {} ({}): {message}", .code.as_u16(), .code.sqlstate())]
pub struct Condition {
    /// Severity level.
    pub severity: Severity,
    /// Stable error code.
    pub code: ErrorCode,
    /// Human readable message.
    pub message: String,
}

impl Condition {
    /// Creates an error condition.
    #[must_use]
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            code,
            message: message.into(),
        }
    }

    /// Creates a warning condition.
    #[must_use]
    pub fn warning(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            code,
            message: message.into(),
        }
    }

    /// Creates a note condition.
    #[must_use]
    pub fn note(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Note,
            code,
            message: message.into(),
        }
    }

    /// Returns true if this is an error.
    #[inline]
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    /// Returns the SQLSTATE for this condition's code.
    #[inline]
    #[must_use]
    pub fn sqlstate(&self) -> &'static str {
        self.code.sqlstate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors() {
        let err = Condition::error(ErrorCode::StaleMetadata, "table changed");
        assert!(err.is_error());
        let warn = Condition::warning(ErrorCode::TruncatedValue, "truncated");
        assert!(!warn.is_error());
        assert_eq!(warn.severity, Severity::Warning);
        assert_eq!(Condition::note(ErrorCode::Unknown, "n").severity, Severity::Note);
    }

    #[test]
    fn test_display() {
        let cond = Condition::error(ErrorCode::CursorNotOpen, "no cursor");
        assert_eq!(cond.to_string(), "Error 1280 (24000): no cursor");
    }

    #[test]
    fn test_condition_is_an_error() {
        let boxed: Box<dyn std::error::Error> =
            Box::new(Condition::error(ErrorCode::StaleMetadata, "table changed"));
        assert!(boxed.source().is_none());
        assert!(boxed.to_string().ends_with("table changed"));
    }

    #[test]
    fn test_severity_order() {
        assert!(Severity::Error > Severity::Warning);
        assert!(Severity::Warning > Severity::Note);
    }
}
