//! Identifier types for the statement layer.
//!
//! These wrap raw integers so that statement handles and session ids
//! cannot be mixed up at call sites.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Prepared statement identifier.
///
/// Statement ids are allocated per session, starting at 1. An id is only
/// meaningful inside the session that issued it.
///
/// # Example
///
/// ```rust
/// use nexus_common::types::StatementId;
///
/// let id = StatementId::new(7);
/// assert_eq!(id.as_u32(), 7);
/// assert!(!id.is_internal());
/// ```
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct StatementId(u32);

impl StatementId {
    /// Reserved id for statements that never enter a registry
    /// (headless execution).
    pub const INTERNAL: Self = Self(0);

    /// First id handed out by a session registry.
    pub const FIRST: Self = Self(1);

    /// Creates a new `StatementId` from a raw value.
    #[inline]
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the raw value.
    #[inline]
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    /// Returns the following id, or `None` when the space is exhausted.
    #[inline]
    #[must_use]
    pub const fn checked_next(self) -> Option<Self> {
        match self.0.checked_add(1) {
            Some(next) => Some(Self(next)),
            None => None,
        }
    }

    /// Returns true for the reserved internal id.
    #[inline]
    #[must_use]
    pub const fn is_internal(self) -> bool {
        self.0 == Self::INTERNAL.0
    }
}

impl fmt::Debug for StatementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_internal() {
            write!(f, "StatementId(INTERNAL)")
        } else {
            write!(f, "StatementId({})", self.0)
        }
    }
}

impl fmt::Display for StatementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for StatementId {
    #[inline]
    fn from(id: u32) -> Self {
        Self::new(id)
    }
}

impl From<StatementId> for u32 {
    #[inline]
    fn from(id: StatementId) -> Self {
        id.0
    }
}

/// Client session identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct SessionId(u64);

impl SessionId {
    /// Creates a new `SessionId` from a raw value.
    #[inline]
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw value.
    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for SessionId {
    #[inline]
    fn from(id: u64) -> Self {
        Self::new(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statement_id() {
        let id = StatementId::new(42);
        assert_eq!(id.as_u32(), 42);
        assert_eq!(u32::from(id), 42);
        assert_eq!(format!("{id}"), "42");
        assert_eq!(format!("{id:?}"), "StatementId(42)");
    }

    #[test]
    fn test_statement_id_internal() {
        assert!(StatementId::INTERNAL.is_internal());
        assert!(!StatementId::FIRST.is_internal());
        assert_eq!(format!("{:?}", StatementId::INTERNAL), "StatementId(INTERNAL)");
    }

    #[test]
    fn test_statement_id_next() {
        assert_eq!(StatementId::FIRST.checked_next(), Some(StatementId::new(2)));
        assert_eq!(StatementId::new(u32::MAX).checked_next(), None);
    }

    #[test]
    fn test_session_id() {
        let id = SessionId::from(9);
        assert_eq!(id.as_u64(), 9);
        assert_eq!(id.to_string(), "9");
    }
}
