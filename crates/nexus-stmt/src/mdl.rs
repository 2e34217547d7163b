//! Session metadata-lock context.
//!
//! Tickets are kept on a stack so that a statement, or a reprepare within
//! it, can roll back to a savepoint and release exactly what it acquired.

use tracing::trace;

use crate::backend::{Backend, LockTicket};
use crate::error::InvokeError;
use crate::types::ObjectName;

/// Position in the ticket stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MdlSavepoint(usize);

/// Metadata locks held by a session.
#[derive(Debug, Default)]
pub struct MdlContext {
    tickets: Vec<LockTicket>,
}

impl MdlContext {
    /// Creates an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tickets held.
    #[must_use]
    pub fn held(&self) -> usize {
        self.tickets.len()
    }

    /// Marks the current position.
    #[must_use]
    pub fn savepoint(&self) -> MdlSavepoint {
        MdlSavepoint(self.tickets.len())
    }

    /// Locks `names` and keeps the ticket. Locking nothing is a no-op.
    pub fn acquire(&mut self, backend: &dyn Backend, names: &[ObjectName]) -> Result<(), InvokeError> {
        if names.is_empty() {
            return Ok(());
        }
        let ticket = backend.acquire_metadata_lock(names)?;
        trace!(ticket = ticket.id(), objects = names.len(), "acquired metadata lock");
        self.tickets.push(ticket);
        Ok(())
    }

    /// Releases every ticket acquired after `savepoint`, newest first.
    pub fn rollback_to(&mut self, savepoint: MdlSavepoint, backend: &dyn Backend) {
        while self.tickets.len() > savepoint.0 {
            if let Some(ticket) = self.tickets.pop() {
                trace!(ticket = ticket.id(), "released metadata lock");
                backend.release(ticket);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{Compiled, CompileRequest, CompiledPlan, InvokeContext, RowSource};
    use crate::error::CompileError;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Locks {
        next: Mutex<u64>,
        released: Mutex<Vec<u64>>,
    }

    impl Backend for Locks {
        fn compile(&self, _: &CompileRequest<'_>) -> Result<Compiled, CompileError> {
            Err(CompileError::Unsupported("locks only".into()))
        }

        fn invoke(&self, _: &dyn CompiledPlan, _: &mut InvokeContext<'_>) -> Result<(), InvokeError> {
            Err(InvokeError::internal("locks only"))
        }

        fn open_row_source(
            &self,
            _: &dyn CompiledPlan,
            _: &mut InvokeContext<'_>,
        ) -> Result<Box<dyn RowSource>, InvokeError> {
            Err(InvokeError::internal("locks only"))
        }

        fn acquire_metadata_lock(&self, names: &[ObjectName]) -> Result<LockTicket, InvokeError> {
            let mut next = self.next.lock();
            *next += 1;
            Ok(LockTicket::new(*next, names.to_vec()))
        }

        fn release(&self, ticket: LockTicket) {
            self.released.lock().push(ticket.id());
        }
    }

    #[test]
    fn test_rollback_to_savepoint() {
        let backend = Locks::default();
        let mut mdl = MdlContext::new();
        let t = [ObjectName::new("t")];

        mdl.acquire(&backend, &t).unwrap();
        let sp = mdl.savepoint();
        mdl.acquire(&backend, &t).unwrap();
        mdl.acquire(&backend, &t).unwrap();
        assert_eq!(mdl.held(), 3);

        mdl.rollback_to(sp, &backend);
        assert_eq!(mdl.held(), 1);
        assert_eq!(*backend.released.lock(), vec![3, 2]);
    }

    #[test]
    fn test_acquire_nothing() {
        let backend = Locks::default();
        let mut mdl = MdlContext::new();
        mdl.acquire(&backend, &[]).unwrap();
        assert_eq!(mdl.held(), 0);
    }
}
