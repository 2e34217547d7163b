//! Compiler and executor seam.
//!
//! The statement layer never parses SQL or touches storage. It hands
//! statement text to a [`Backend`] to obtain a [`CompiledPlan`], and hands
//! the plan back to the backend to run against bound parameters:
//!
//! ```text
//!   Session ──compile──► Backend ──► Compiled { plan, params }
//!      │                                  │
//!      └──invoke(plan, InvokeContext)─────┘──► rows/OK into ResultSink
//! ```
//!
//! The executor reports metadata staleness through the context's
//! [`ReprepareObserver`] or by tagging its error with `requires_reprepare`,
//! always before producing any output.

use std::any::Any;
use std::fmt;

use nexus_wire::Value;

use crate::error::{CompileError, InvokeError};
use crate::observer::ReprepareObserver;
use crate::param::ParamSlot;
use crate::session::Session;
use crate::sink::ResultSink;
use crate::types::{ColumnMeta, CommandClass, Engine, ObjectName, Row, SqlType};

/// Input to a compilation.
#[derive(Debug, Clone, Copy)]
pub struct CompileRequest<'a> {
    /// Statement text.
    pub text: &'a str,
    /// Current database, if any.
    pub database: Option<&'a str>,
    /// Per-placeholder type hints; `None` lets the compiler infer from context.
    pub hints: &'a [Option<SqlType>],
    /// Engine to compile for.
    pub engine: Engine,
}

impl CompileRequest<'_> {
    /// Returns the hint for a placeholder.
    #[must_use]
    pub fn hint(&self, index: usize) -> Option<SqlType> {
        self.hints.get(index).copied().flatten()
    }
}

/// Type information the compiler derived for one placeholder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamDeclaration {
    /// Declared type.
    pub declared: SqlType,
    /// Type fixed by an explicit cast; never re-derived.
    pub pinned: bool,
    /// Byte offset of the placeholder in the statement text.
    pub position: usize,
}

impl ParamDeclaration {
    /// Creates an unpinned declaration.
    #[must_use]
    pub const fn new(declared: SqlType, position: usize) -> Self {
        Self {
            declared,
            pinned: false,
            position,
        }
    }

    /// Creates a declaration pinned by a cast.
    #[must_use]
    pub const fn pinned(declared: SqlType, position: usize) -> Self {
        Self {
            declared,
            pinned: true,
            position,
        }
    }
}

/// Output of a successful compilation.
#[derive(Debug)]
pub struct Compiled {
    /// Executable plan.
    pub plan: Box<dyn CompiledPlan>,
    /// One declaration per placeholder, in text order.
    pub params: Vec<ParamDeclaration>,
}

/// An executable plan produced by the compiler.
pub trait CompiledPlan: fmt::Debug + Send + 'static {
    /// Command class of the statement.
    fn command(&self) -> CommandClass;

    /// Result columns; empty for statements that produce no rows.
    fn columns(&self) -> &[ColumnMeta];

    /// Engine the plan was compiled for.
    fn engine(&self) -> Engine {
        Engine::Primary
    }

    /// Objects whose metadata the plan depends on.
    fn dependencies(&self) -> &[ObjectName] {
        &[]
    }

    /// Returns true if the plan must be rebuilt before its next execution.
    fn requires_refresh(&self) -> bool {
        false
    }

    /// Lets the backend that built the plan recover its concrete type.
    fn as_any(&self) -> &dyn Any;
}

/// Everything the executor sees during one invocation.
pub struct InvokeContext<'a> {
    /// Bound parameters, in placeholder order.
    pub params: &'a [ParamSlot],
    /// Destination for rows and the terminal status.
    pub sink: &'a mut dyn ResultSink,
    /// Invalidation callback for metadata staleness.
    pub observer: &'a mut ReprepareObserver,
    /// Owning session.
    pub session: &'a mut Session,
}

impl InvokeContext<'_> {
    /// Returns the bound value of each parameter.
    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.params.iter().map(ParamSlot::value)
    }

    /// Reports stale metadata and returns the error to bail out with.
    pub fn stale(&mut self, message: impl Into<String>) -> InvokeError {
        self.observer.report_stale();
        InvokeError::stale(message)
    }
}

/// Incremental row producer backing an open cursor.
pub trait RowSource: Send {
    /// Returns up to `max_rows` rows. Fewer rows means the source is drained.
    fn fetch_rows(&mut self, max_rows: usize) -> Result<Vec<Row>, InvokeError>;

    /// Releases resources. Must be idempotent.
    fn close(&mut self);
}

/// A granted metadata lock.
#[derive(Debug, PartialEq, Eq)]
pub struct LockTicket {
    id: u64,
    names: Vec<ObjectName>,
}

impl LockTicket {
    /// Creates a ticket.
    #[must_use]
    pub fn new(id: u64, names: Vec<ObjectName>) -> Self {
        Self { id, names }
    }

    /// Ticket id assigned by the lock manager.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Locked objects.
    #[must_use]
    pub fn names(&self) -> &[ObjectName] {
        &self.names
    }
}

/// Compiler, executor and metadata lock manager.
pub trait Backend: Send + Sync {
    /// Compiles statement text.
    fn compile(&self, request: &CompileRequest<'_>) -> Result<Compiled, CompileError>;

    /// Runs a plan to completion, writing results to `ctx.sink`.
    fn invoke(&self, plan: &dyn CompiledPlan, ctx: &mut InvokeContext<'_>)
        -> Result<(), InvokeError>;

    /// Starts a plan and returns a source for incremental fetching. Writes
    /// nothing to the sink.
    fn open_row_source(
        &self,
        plan: &dyn CompiledPlan,
        ctx: &mut InvokeContext<'_>,
    ) -> Result<Box<dyn RowSource>, InvokeError>;

    /// Takes shared metadata locks on `names`.
    fn acquire_metadata_lock(&self, names: &[ObjectName]) -> Result<LockTicket, InvokeError>;

    /// Releases a ticket returned by `acquire_metadata_lock`.
    fn release(&self, ticket: LockTicket);
}
