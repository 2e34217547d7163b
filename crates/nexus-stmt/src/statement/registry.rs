//! Session statement registry.

use std::collections::HashMap;
use std::mem;

use nexus_common::StatementId;

use super::Statement;
use crate::error::{StmtError, StmtResult};

#[derive(Debug)]
enum Entry {
    Idle(Box<Statement>),
    InUse,
}

/// Id and name lookup for the statements of one session.
///
/// A statement being executed is checked out of the registry; its entry
/// stays behind marked in use so that reentrant commands on the same id
/// fail instead of aliasing it.
#[derive(Debug)]
pub struct StatementRegistry {
    entries: HashMap<StatementId, Entry>,
    names: HashMap<String, StatementId>,
    next_id: StatementId,
    max_statements: usize,
}

impl StatementRegistry {
    /// Creates a registry holding at most `max_statements`.
    #[must_use]
    pub fn new(max_statements: usize) -> Self {
        Self {
            entries: HashMap::new(),
            names: HashMap::new(),
            next_id: StatementId::FIRST,
            max_statements,
        }
    }

    /// Number of statements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no statements are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns true if `id` is registered.
    #[must_use]
    pub fn contains(&self, id: StatementId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Returns true if `id` is currently executing.
    #[must_use]
    pub fn is_in_use(&self, id: StatementId) -> bool {
        matches!(self.entries.get(&id), Some(Entry::InUse))
    }

    /// Returns an idle statement.
    #[must_use]
    pub fn get(&self, id: StatementId) -> Option<&Statement> {
        match self.entries.get(&id) {
            Some(Entry::Idle(stmt)) => Some(stmt),
            _ => None,
        }
    }

    /// Resolves a SQL-level name.
    #[must_use]
    pub fn lookup_name(&self, name: &str) -> Option<StatementId> {
        self.names.get(&name.to_ascii_lowercase()).copied()
    }

    /// Fails if the registry is full.
    pub(crate) fn ensure_capacity(&self) -> StmtResult<()> {
        if self.entries.len() >= self.max_statements {
            return Err(StmtError::TooManyStatements(self.max_statements));
        }
        Ok(())
    }

    /// Id the next registered statement gets. The id is consumed by
    /// [`insert`](Self::insert), so a statement that fails to prepare
    /// leaves no gap.
    pub(crate) fn peek_id(&self) -> StmtResult<StatementId> {
        match self.next_id.checked_next() {
            Some(_) => Ok(self.next_id),
            None => Err(StmtError::TooManyStatements(self.max_statements)),
        }
    }

    /// Registers a prepared statement.
    pub(crate) fn insert(&mut self, stmt: Statement) -> StmtResult<StatementId> {
        self.ensure_capacity()?;
        let id = stmt.id();
        if id == self.next_id {
            if let Some(next) = id.checked_next() {
                self.next_id = next;
            }
        }
        if let Some(name) = stmt.name() {
            self.names.insert(name.to_ascii_lowercase(), id);
        }
        self.entries.insert(id, Entry::Idle(Box::new(stmt)));
        Ok(id)
    }

    /// Borrows an idle statement mutably.
    pub(crate) fn get_mut(&mut self, id: StatementId) -> StmtResult<&mut Statement> {
        match self.entries.get_mut(&id) {
            Some(Entry::Idle(stmt)) => Ok(stmt),
            Some(Entry::InUse) => Err(StmtError::StatementInUse(id)),
            None => Err(StmtError::UnknownStatement(id)),
        }
    }

    /// Takes a statement out for execution, leaving it marked in use.
    pub(crate) fn checkout(&mut self, id: StatementId) -> StmtResult<Box<Statement>> {
        let entry = self
            .entries
            .get_mut(&id)
            .ok_or(StmtError::UnknownStatement(id))?;
        match mem::replace(entry, Entry::InUse) {
            Entry::Idle(stmt) => Ok(stmt),
            Entry::InUse => Err(StmtError::StatementInUse(id)),
        }
    }

    /// Returns a checked out statement.
    pub(crate) fn checkin(&mut self, stmt: Box<Statement>) {
        self.entries.insert(stmt.id(), Entry::Idle(stmt));
    }

    /// Unregisters a statement.
    pub(crate) fn remove(&mut self, id: StatementId) -> StmtResult<Box<Statement>> {
        match self.entries.get(&id) {
            None => return Err(StmtError::UnknownStatement(id)),
            Some(Entry::InUse) => return Err(StmtError::StatementInUse(id)),
            Some(Entry::Idle(_)) => {}
        }
        let Some(Entry::Idle(stmt)) = self.entries.remove(&id) else {
            return Err(StmtError::UnknownStatement(id));
        };
        if let Some(name) = stmt.name() {
            self.names.remove(&name.to_ascii_lowercase());
        }
        Ok(stmt)
    }
}
