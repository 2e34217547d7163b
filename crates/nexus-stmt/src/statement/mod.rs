//! Prepared statements.
//!
//! A [`Statement`] keeps its identity (id, registry entry, statistics,
//! engine choice) apart from everything a compilation produces, which
//! lives in one owned [`StatementBody`]. Reprepare exchanges the body as a
//! whole, so the statement is never observed half rebuilt.

mod registry;
mod reprepare;

use nexus_common::{StatementId, MAX_PARAMETERS};

use crate::backend::{Backend, CompileRequest, CompiledPlan};
use crate::cursor::{Cursor, FetchOutcome};
use crate::error::{CompileError, StmtError, StmtResult};
use crate::mdl::MdlContext;
use crate::param::ParamSlots;
use crate::sink::{ResultSink, SinkKind};
use crate::types::{ColumnMeta, CommandClass, Engine, SqlType};

pub use registry::StatementRegistry;
pub(crate) use reprepare::ReprepareReason;

/// Lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleState {
    /// Created, not compiled yet.
    Initialized,
    /// Compiled and ready to execute.
    Prepared,
    /// Executed at least once since the last reset.
    Executed,
}

/// Per-statement counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatementStats {
    /// Successful executions.
    pub executions: u64,
    /// Reprepares of any cause.
    pub reprepares: u64,
    /// Reprepares caused by a parameter type mismatch.
    pub type_reprepares: u64,
    /// Engine switches, including forced primary fallback.
    pub engine_switches: u64,
}

/// Everything a compilation produces, swapped as one unit on reprepare.
#[derive(Debug, Default)]
pub(crate) struct StatementBody {
    pub(crate) text: String,
    pub(crate) name: Option<String>,
    pub(crate) database: Option<String>,
    pub(crate) plan: Option<Box<dyn CompiledPlan>>,
    pub(crate) params: ParamSlots,
    pub(crate) columns: Vec<ColumnMeta>,
    pub(crate) cursor: Option<Cursor>,
}

impl StatementBody {
    /// Empty body carrying the identity fields of `other`.
    fn shell_of(other: &Self) -> Self {
        Self {
            text: other.text.clone(),
            name: other.name.clone(),
            database: other.database.clone(),
            ..Self::default()
        }
    }
}

/// A prepared statement.
#[derive(Debug)]
pub struct Statement {
    id: StatementId,
    state: LifecycleState,
    pub(crate) body: StatementBody,
    pub(crate) engine: Engine,
    pub(crate) force_primary: bool,
    pub(crate) last_sink: Option<SinkKind>,
    long_data_error: Option<StmtError>,
    pub(crate) metadata_changed: bool,
    pub(crate) stats: StatementStats,
}

impl Statement {
    pub(crate) fn new(
        id: StatementId,
        text: impl Into<String>,
        database: Option<String>,
        engine: Engine,
    ) -> Self {
        Self {
            id,
            state: LifecycleState::Initialized,
            body: StatementBody {
                text: text.into(),
                database,
                ..StatementBody::default()
            },
            engine,
            force_primary: false,
            last_sink: None,
            long_data_error: None,
            metadata_changed: false,
            stats: StatementStats::default(),
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Statement id.
    #[must_use]
    pub fn id(&self) -> StatementId {
        self.id
    }

    /// Lifecycle state.
    #[must_use]
    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Statement text.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.body.text
    }

    /// SQL-level name, if prepared by name.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.body.name.as_deref()
    }

    /// Database the statement was prepared in.
    #[must_use]
    pub fn database(&self) -> Option<&str> {
        self.body.database.as_deref()
    }

    /// Number of placeholders.
    #[must_use]
    pub fn param_count(&self) -> usize {
        self.body.params.len()
    }

    /// Parameter slots.
    #[must_use]
    pub fn params(&self) -> &ParamSlots {
        &self.body.params
    }

    /// Declared parameter types.
    #[must_use]
    pub fn param_types(&self) -> Vec<SqlType> {
        self.body.params.declared_types()
    }

    /// Result columns of the current plan.
    #[must_use]
    pub fn columns(&self) -> &[ColumnMeta] {
        &self.body.columns
    }

    /// Command class of the current plan.
    #[must_use]
    pub fn command(&self) -> Option<CommandClass> {
        self.body.plan.as_ref().map(|p| p.command())
    }

    /// Returns true while a cursor is open.
    #[must_use]
    pub fn has_open_cursor(&self) -> bool {
        self.body.cursor.as_ref().is_some_and(Cursor::is_open)
    }

    /// Engine the statement compiles for.
    #[must_use]
    pub fn engine(&self) -> Engine {
        if self.force_primary {
            Engine::Primary
        } else {
            self.engine
        }
    }

    /// Returns true once the statement fell back to the primary engine for good.
    #[must_use]
    pub fn is_primary_forced(&self) -> bool {
        self.force_primary
    }

    /// Returns true if the last execution changed the result column count.
    #[must_use]
    pub fn metadata_changed(&self) -> bool {
        self.metadata_changed
    }

    /// Counters.
    #[must_use]
    pub fn stats(&self) -> StatementStats {
        self.stats
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    pub(crate) fn set_name(&mut self, name: impl Into<String>) {
        self.body.name = Some(name.into());
    }

    pub(crate) fn mark_executed(&mut self) {
        self.state = LifecycleState::Executed;
        self.stats.executions += 1;
    }

    /// Compiles the statement for the first time.
    pub(crate) fn prepare(&mut self, backend: &dyn Backend, mdl: &mut MdlContext) -> StmtResult<()> {
        self.compile_body(backend, mdl, &[])?;
        self.state = LifecycleState::Prepared;
        Ok(())
    }

    /// Compiles the body's text into a fresh plan and slots.
    fn compile_body(
        &mut self,
        backend: &dyn Backend,
        mdl: &mut MdlContext,
        hints: &[Option<SqlType>],
    ) -> StmtResult<()> {
        let request = CompileRequest {
            text: &self.body.text,
            database: self.body.database.as_deref(),
            hints,
            engine: self.engine(),
        };
        let compiled = backend.compile(&request)?;
        if compiled.params.len() > MAX_PARAMETERS {
            return Err(CompileError::TooManyParams {
                count: compiled.params.len(),
                max: MAX_PARAMETERS,
            }
            .into());
        }
        mdl.acquire(backend, compiled.plan.dependencies())
            .map_err(|e| CompileError::Lock(e.message))?;
        self.body.columns = compiled.plan.columns().to_vec();
        self.body.params = ParamSlots::from_declarations(&compiled.params, hints);
        self.body.plan = Some(compiled.plan);
        Ok(())
    }

    /// Returns true if the plan asks to be rebuilt before running.
    pub(crate) fn plan_requires_refresh(&self) -> bool {
        self.body.plan.as_ref().is_some_and(|p| p.requires_refresh())
    }

    pub(crate) fn close_cursor(&mut self) {
        if let Some(mut cursor) = self.body.cursor.take() {
            cursor.close();
        }
    }

    /// Closes the cursor, drops long data and any saved long-data error.
    pub(crate) fn reset(&mut self) {
        self.close_cursor();
        self.body.params.clear_transient();
        self.long_data_error = None;
        if self.state == LifecycleState::Executed {
            self.state = LifecycleState::Prepared;
        }
    }

    /// Appends streamed data. Failures are kept for the next EXECUTE.
    pub(crate) fn send_long_data(&mut self, index: usize, chunk: &[u8], limit: usize) {
        if self.long_data_error.is_some() {
            return;
        }
        if let Err(err) = self.body.params.append_long_data(index, chunk, limit) {
            tracing::debug!(statement = %self.id, index, error = %err, "long data rejected");
            self.long_data_error = Some(err);
        }
    }

    pub(crate) fn take_long_data_error(&mut self) -> Option<StmtError> {
        self.long_data_error.take()
    }

    /// Fetches from the open cursor. A drained cursor is dropped and the
    /// parameters reset, leaving the statement ready to execute again.
    pub(crate) fn fetch(
        &mut self,
        max_rows: usize,
        sink: &mut dyn ResultSink,
    ) -> StmtResult<FetchOutcome> {
        let Some(cursor) = self.body.cursor.as_mut() else {
            return Err(StmtError::cursor(format!(
                "statement {} has no open cursor",
                self.id
            )));
        };
        let outcome = cursor.fetch(max_rows, sink);
        let drained = !cursor.is_open();
        if drained {
            self.body.cursor = None;
            self.body.params.clear_transient();
        }
        outcome
    }
}
