//! Reprepare observer.
//!
//! One observer lives for the whole of an `execute` call. The executor uses
//! it to flag stale metadata; the retry loop uses it to bound reprepares.

use nexus_common::MAX_REPREPARE_ATTEMPTS;

/// Invalidation callback and reprepare budget for one execution.
#[derive(Debug, Default)]
pub struct ReprepareObserver {
    invalidated: bool,
    attempts: u32,
}

impl ReprepareObserver {
    /// Creates an observer with a full budget.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the current attempt's metadata as stale.
    pub fn report_stale(&mut self) {
        self.invalidated = true;
    }

    /// Returns true if the current attempt was invalidated.
    #[must_use]
    pub fn is_invalidated(&self) -> bool {
        self.invalidated
    }

    /// Returns true while another reprepare is allowed.
    #[must_use]
    pub fn can_retry(&self) -> bool {
        self.attempts < MAX_REPREPARE_ATTEMPTS
    }

    /// Reprepares performed so far.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Clears the invalidation flag before an execution attempt.
    pub(crate) fn begin_attempt(&mut self) {
        self.invalidated = false;
    }

    /// Charges one reprepare against the budget.
    pub(crate) fn record_reprepare(&mut self) {
        self.attempts += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_budget() {
        let mut observer = ReprepareObserver::new();
        for _ in 0..MAX_REPREPARE_ATTEMPTS {
            assert!(observer.can_retry());
            observer.record_reprepare();
        }
        assert!(!observer.can_retry());
        assert_eq!(observer.attempts(), MAX_REPREPARE_ATTEMPTS);
    }

    #[test]
    fn test_begin_attempt_clears_flag() {
        let mut observer = ReprepareObserver::new();
        observer.report_stale();
        assert!(observer.is_invalidated());
        observer.begin_attempt();
        assert!(!observer.is_invalidated());
    }
}
