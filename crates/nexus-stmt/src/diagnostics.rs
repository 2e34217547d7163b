//! Diagnostics areas.
//!
//! Every command reports into the current [`DiagnosticsArea`]. Nested
//! execution pushes a fresh area and pops it afterwards:
//!
//! ```text
//!   parent: [E1, w1]            parent: [E1, w1]
//!     push                         push
//!   nested: [w2]  ── ok ──►      nested: [E2]  ── fail ──►
//!     pop                          pop
//!   parent: [E1, w1, w2]         parent: [E2]
//! ```

use nexus_common::{Condition, Severity, DEFAULT_MAX_ERROR_COUNT};

/// Error and warnings of one command scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticsArea {
    error: Option<Condition>,
    conditions: Vec<Condition>,
    warning_count: usize,
    capacity: usize,
}

impl DiagnosticsArea {
    /// Creates an empty area keeping at most `capacity` conditions.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            error: None,
            conditions: Vec::new(),
            warning_count: 0,
            capacity,
        }
    }

    /// The recorded error, if any.
    #[must_use]
    pub fn error(&self) -> Option<&Condition> {
        self.error.as_ref()
    }

    /// Returns true if an error is recorded.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Stored warnings and notes.
    #[must_use]
    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    /// Warnings raised, including those not stored.
    #[must_use]
    pub fn warning_count(&self) -> usize {
        self.warning_count
    }

    /// Records the error, replacing any earlier one.
    pub fn set_error(&mut self, condition: Condition) {
        self.error = Some(condition);
    }

    /// Records a condition. Errors replace the recorded error; warnings and
    /// notes are stored up to the capacity and always counted.
    pub fn push(&mut self, condition: Condition) {
        if condition.severity == Severity::Error {
            self.set_error(condition);
            return;
        }
        if condition.severity == Severity::Warning {
            self.warning_count += 1;
        }
        if self.conditions.len() < self.capacity {
            self.conditions.push(condition);
        }
    }

    /// Clears everything.
    pub fn clear(&mut self) {
        self.error = None;
        self.conditions.clear();
        self.warning_count = 0;
    }

    fn absorb_warnings(&mut self, nested: Self) {
        let stored = nested
            .conditions
            .iter()
            .filter(|c| c.severity == Severity::Warning)
            .count();
        let overflow = nested.warning_count.saturating_sub(stored);
        for condition in nested.conditions {
            self.push(condition);
        }
        self.warning_count += overflow;
    }
}

impl Default for DiagnosticsArea {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ERROR_COUNT)
    }
}

/// Stack of diagnostics areas; never empty.
#[derive(Debug, Clone)]
pub struct DiagnosticsStack {
    areas: Vec<DiagnosticsArea>,
    capacity: usize,
}

impl DiagnosticsStack {
    /// Creates a stack with one empty area.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            areas: vec![DiagnosticsArea::new(capacity)],
            capacity,
        }
    }

    /// Number of areas.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.areas.len()
    }

    /// Innermost area.
    #[must_use]
    pub fn current(&self) -> &DiagnosticsArea {
        // The stack always holds at least one area.
        &self.areas[self.areas.len() - 1]
    }

    /// Innermost area, mutably.
    pub fn current_mut(&mut self) -> &mut DiagnosticsArea {
        let last = self.areas.len() - 1;
        &mut self.areas[last]
    }

    /// Error of the innermost area.
    #[must_use]
    pub fn error(&self) -> Option<&Condition> {
        self.current().error()
    }

    /// Opens a nested area.
    pub fn push(&mut self) {
        self.areas.push(DiagnosticsArea::new(self.capacity));
    }

    /// Closes the innermost area, merging it into its parent. A failed
    /// nested area replaces the parent; a successful one only adds its
    /// warnings. Popping the last area does nothing.
    pub fn pop(&mut self) {
        if self.areas.len() <= 1 {
            return;
        }
        let Some(nested) = self.areas.pop() else {
            return;
        };
        let parent = self.current_mut();
        if nested.is_error() {
            *parent = nested;
        } else {
            parent.absorb_warnings(nested);
        }
    }
}

impl Default for DiagnosticsStack {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ERROR_COUNT)
    }
}
