//! In-memory [`Backend`] for exercising the statement layer.
//!
//! [`MockBackend`] compiles a small SQL subset against an in-memory catalog
//! and runs it directly. Tests steer it through [`Faults`] (stale metadata,
//! engine rejection, failing compiles and locks) and an optional invoke
//! hook that runs with full access to the [`InvokeContext`], which is how
//! reentrant commands and kills are simulated.
//!
//! ```text
//!   compile ──► sql::parse ──► plan::bind(catalog, hints) ──► MockPlan
//!   invoke  ──► hook ──► faults ──► version check ──► MockPlan::run ──► sink
//! ```

pub mod catalog;
pub mod plan;
pub mod sql;
pub mod value;

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use nexus_stmt::{
    send_result_set, Backend, ColumnMeta, CompileError, CompileRequest, Compiled, CompiledPlan,
    Engine, InvokeContext, InvokeError, InvokeErrorKind, LockTicket, ObjectName, OkStatus,
    ParamDeclaration, Row, RowSource, SqlType,
};
use nexus_wire::Value;
use parking_lot::{Mutex, MutexGuard};
use tracing::{debug, trace};

use self::catalog::Catalog;
use self::plan::{MockPlan, Output};

/// Callback run at the start of every invocation.
pub type InvokeHook = Arc<dyn Fn(&mut InvokeContext<'_>) -> Result<(), InvokeError> + Send + Sync>;

/// Injected failures. Edit through [`MockBackend::faults`].
#[derive(Debug, Default)]
pub struct Faults {
    /// Every invocation reports stale metadata.
    pub always_stale: bool,
    /// The next this-many invocations report stale metadata.
    pub stale_invocations: u32,
    /// Returned by the next invocation.
    pub invoke_error: Option<InvokeError>,
    /// Plans compiled for these engines ask for the other engine.
    pub rejected_engines: Vec<Engine>,
    /// Returned by the next compilation.
    pub compile_error: Option<CompileError>,
    /// Extra string placeholders declared by every compilation.
    pub extra_params: usize,
    /// Plans ask to be rebuilt before each execution.
    pub refresh_plans: bool,
    /// Metadata lock requests fail.
    pub fail_locks: bool,
}

#[derive(Debug, Default)]
struct Counters {
    compiles: AtomicUsize,
    invokes: AtomicUsize,
    sources_opened: AtomicUsize,
    sources_closed: Arc<AtomicUsize>,
    locks_held: AtomicUsize,
    lock_acquisitions: AtomicUsize,
    next_ticket: AtomicU64,
}

/// In-memory compiler and executor.
#[derive(Default)]
pub struct MockBackend {
    catalog: Catalog,
    faults: Mutex<Faults>,
    hook: Mutex<Option<InvokeHook>>,
    counters: Counters,
}

impl MockBackend {
    /// Creates a backend with an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a backend holding table `t(id BIGINT NOT NULL, x VARCHAR)`
    /// with rows `(1, 'one')`, `(7, 'seven')` and `(i64::MAX, 'max')`.
    pub fn with_sample_data() -> Self {
        let backend = Self::new();
        backend.create_table(
            "t",
            vec![
                ColumnMeta::new("id", SqlType::BIGINT).not_null(),
                ColumnMeta::new("x", SqlType::String),
            ],
        );
        for (id, x) in [(1, "one"), (7, "seven"), (i64::MAX, "max")] {
            backend.insert_row("t", vec![Value::Int(id), Value::text(x)]);
        }
        backend
    }

    /// The table store.
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Creates or replaces a table.
    pub fn create_table(&self, name: &str, columns: Vec<ColumnMeta>) {
        self.catalog.create(name, columns);
    }

    /// Appends a row without going through SQL.
    pub fn insert_row(&self, table: &str, row: Row) -> bool {
        self.catalog
            .with_table_mut(table, |t| t.rows.push(row))
            .is_some()
    }

    /// Changes a table's metadata version, invalidating plans bound to it.
    pub fn touch(&self, table: &str) -> bool {
        self.catalog.touch(table)
    }

    /// Appends a column to a table.
    pub fn add_column(&self, table: &str, column: ColumnMeta) -> bool {
        self.catalog.add_column(table, column)
    }

    /// Injected failures, locked for editing.
    pub fn faults(&self) -> MutexGuard<'_, Faults> {
        self.faults.lock()
    }

    /// Installs or removes the invoke hook.
    pub fn set_hook(&self, hook: Option<InvokeHook>) {
        *self.hook.lock() = hook;
    }

    /// Compilations performed.
    pub fn compile_count(&self) -> usize {
        self.counters.compiles.load(Ordering::SeqCst)
    }

    /// Invocations attempted, including cursor opens.
    pub fn invoke_count(&self) -> usize {
        self.counters.invokes.load(Ordering::SeqCst)
    }

    /// Row sources opened.
    pub fn sources_opened(&self) -> usize {
        self.counters.sources_opened.load(Ordering::SeqCst)
    }

    /// Row sources closed.
    pub fn sources_closed(&self) -> usize {
        self.counters.sources_closed.load(Ordering::SeqCst)
    }

    /// Metadata lock tickets currently granted.
    pub fn locks_held(&self) -> usize {
        self.counters.locks_held.load(Ordering::SeqCst)
    }

    /// Metadata lock tickets granted in total.
    pub fn lock_acquisitions(&self) -> usize {
        self.counters.lock_acquisitions.load(Ordering::SeqCst)
    }

    fn downcast(plan: &dyn CompiledPlan) -> Result<&MockPlan, InvokeError> {
        plan.as_any()
            .downcast_ref::<MockPlan>()
            .ok_or_else(|| InvokeError::internal("plan was not built by this backend"))
    }

    /// Everything that may fail an invocation before it produces output.
    fn preflight(&self, plan: &MockPlan, ctx: &mut InvokeContext<'_>) -> Result<(), InvokeError> {
        self.counters.invokes.fetch_add(1, Ordering::SeqCst);
        let hook = self.hook.lock().clone();
        if let Some(hook) = hook {
            hook(ctx)?;
        }

        let stale = {
            let mut faults = self.faults.lock();
            if let Some(err) = faults.invoke_error.take() {
                return Err(err);
            }
            if faults.rejected_engines.contains(&plan.engine()) {
                return Err(InvokeError::alternate_engine(format!(
                    "statement cannot run on the {} engine",
                    plan.engine()
                )));
            }
            if faults.always_stale {
                true
            } else if faults.stale_invocations > 0 {
                faults.stale_invocations -= 1;
                true
            } else {
                false
            }
        };
        if stale {
            return Err(ctx.stale("table definition changed"));
        }

        for (table, version) in plan.versions() {
            if self.catalog.version(table) != Some(*version) {
                debug!(table = %table, "plan bound to an old table version");
                return Err(ctx.stale(format!("table {table} changed")));
            }
        }
        Ok(())
    }
}

impl fmt::Debug for MockBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockBackend")
            .field("tables", &self.catalog.names())
            .field("faults", &*self.faults.lock())
            .field("compiles", &self.compile_count())
            .field("invokes", &self.invoke_count())
            .finish_non_exhaustive()
    }
}

impl Backend for MockBackend {
    fn compile(&self, request: &CompileRequest<'_>) -> Result<Compiled, CompileError> {
        self.counters.compiles.fetch_add(1, Ordering::SeqCst);
        let (refresh, extra) = {
            let mut faults = self.faults.lock();
            if let Some(err) = faults.compile_error.take() {
                return Err(err);
            }
            (faults.refresh_plans, faults.extra_params)
        };

        let ast = sql::parse(request.text)?;
        let (plan, mut params) = plan::bind(ast, &self.catalog, request, refresh)?;
        let end = request.text.len();
        params.extend((0..extra).map(|_| ParamDeclaration::new(SqlType::String, end)));
        trace!(text = request.text, engine = %request.engine, params = params.len(), "compiled");
        Ok(Compiled {
            plan: Box::new(plan),
            params,
        })
    }

    fn invoke(
        &self,
        plan: &dyn CompiledPlan,
        ctx: &mut InvokeContext<'_>,
    ) -> Result<(), InvokeError> {
        let plan = Self::downcast(plan)?;
        self.preflight(plan, ctx)?;
        match plan.run(&self.catalog, ctx.params)? {
            Output::Rows(rows) => {
                send_result_set(ctx.sink, plan.columns(), &rows, &OkStatus::new())?;
            }
            Output::Affected(n) => ctx.sink.send_ok(&OkStatus::affected(n))?,
        }
        Ok(())
    }

    fn open_row_source(
        &self,
        plan: &dyn CompiledPlan,
        ctx: &mut InvokeContext<'_>,
    ) -> Result<Box<dyn RowSource>, InvokeError> {
        let plan = Self::downcast(plan)?;
        self.preflight(plan, ctx)?;
        let Output::Rows(rows) = plan.run(&self.catalog, ctx.params)? else {
            return Err(InvokeError::internal("cursor opened on a statement without rows"));
        };
        self.counters.sources_opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(VecSource {
            rows: rows.into(),
            closed: Arc::clone(&self.counters.sources_closed),
            open: true,
        }))
    }

    fn acquire_metadata_lock(&self, names: &[ObjectName]) -> Result<LockTicket, InvokeError> {
        if self.faults.lock().fail_locks {
            return Err(InvokeError::new(
                InvokeErrorKind::LockWait,
                "lock wait timeout exceeded",
            ));
        }
        let id = self.counters.next_ticket.fetch_add(1, Ordering::SeqCst);
        self.counters.locks_held.fetch_add(1, Ordering::SeqCst);
        self.counters.lock_acquisitions.fetch_add(1, Ordering::SeqCst);
        Ok(LockTicket::new(id, names.to_vec()))
    }

    fn release(&self, ticket: LockTicket) {
        trace!(ticket = ticket.id(), "metadata lock released");
        self.counters.locks_held.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Row source over a materialized result.
struct VecSource {
    rows: VecDeque<Row>,
    closed: Arc<AtomicUsize>,
    open: bool,
}

impl RowSource for VecSource {
    fn fetch_rows(&mut self, max_rows: usize) -> Result<Vec<Row>, InvokeError> {
        let n = max_rows.min(self.rows.len());
        Ok(self.rows.drain(..n).collect())
    }

    fn close(&mut self) {
        if self.open {
            self.open = false;
            self.closed.fetch_add(1, Ordering::SeqCst);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_data() {
        let backend = MockBackend::with_sample_data();
        let table = backend.catalog().get("t").unwrap();
        assert_eq!(table.rows.len(), 3);
        assert_eq!(table.rows[2][0], Value::Int(i64::MAX));
    }

    #[test]
    fn test_compile_counts_and_faults() {
        let backend = MockBackend::with_sample_data();
        let request = CompileRequest {
            text: "SELECT * FROM t WHERE id = ?",
            database: None,
            hints: &[],
            engine: Engine::Secondary,
        };
        let compiled = backend.compile(&request).unwrap();
        assert_eq!(compiled.params.len(), 1);
        assert_eq!(compiled.plan.engine(), Engine::Secondary);

        backend.faults().compile_error = Some(CompileError::Syntax("boom".into()));
        assert!(backend.compile(&request).is_err());
        assert!(backend.compile(&request).is_ok());

        backend.faults().extra_params = 2;
        assert_eq!(backend.compile(&request).unwrap().params.len(), 3);
        assert_eq!(backend.compile_count(), 4);
    }

    #[test]
    fn test_lock_accounting() {
        let backend = MockBackend::new();
        let ticket = backend.acquire_metadata_lock(&[ObjectName::new("t")]).unwrap();
        assert_eq!(backend.locks_held(), 1);
        backend.release(ticket);
        assert_eq!(backend.locks_held(), 0);
        assert_eq!(backend.lock_acquisitions(), 1);

        backend.faults().fail_locks = true;
        let err = backend.acquire_metadata_lock(&[ObjectName::new("t")]).unwrap_err();
        assert_eq!(err.kind, InvokeErrorKind::LockWait);
    }

    #[test]
    fn test_vec_source_close_is_idempotent() {
        let closed = Arc::new(AtomicUsize::new(0));
        let mut source = VecSource {
            rows: vec![vec![Value::Int(1)], vec![Value::Int(2)]].into(),
            closed: Arc::clone(&closed),
            open: true,
        };
        assert_eq!(source.fetch_rows(5).unwrap().len(), 2);
        source.close();
        source.close();
        assert_eq!(closed.load(Ordering::SeqCst), 1);
    }
}
