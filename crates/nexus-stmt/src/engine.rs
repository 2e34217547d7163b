//! Execution engine.
//!
//! Drives one EXECUTE of a prepared statement:
//!
//! ```text
//!   gates ─► bind ─► [refresh/sink reprepare] ─► loop {
//!       kill check
//!       type check ──incompatible (one reprepare per call)──► reprepare, continue
//!       invoke ──ok──► done
//!         │
//!         ├─ stale & retry allowed ──► reprepare (max 3), continue
//!         ├─ alternate engine ──────► switch / force primary, continue
//!         └─ anything else ─────────► error
//!   }
//! ```
//!
//! Metadata locks taken during the call are released when it ends, and the
//! parameters' transient state is cleared on every exit path.

use nexus_common::{Condition, ErrorCode};
use tracing::{debug, info, warn};

use crate::backend::{Backend, InvokeContext};
use crate::cursor::Cursor;
use crate::error::{InvokeError, InvokeErrorKind, StmtError, StmtResult};
use crate::observer::ReprepareObserver;
use crate::param::{ParamInput, SurplusPolicy};
use crate::session::Session;
use crate::sink::{OkStatus, ResultSink, ServerStatus};
use crate::statement::{LifecycleState, ReprepareReason, Statement};

bitflags::bitflags! {
    /// EXECUTE flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ExecuteFlags: u8 {
        /// Open a read-only cursor instead of sending rows.
        const CURSOR = 0x01;
    }
}

impl Default for ExecuteFlags {
    fn default() -> Self {
        Self::empty()
    }
}

/// Options for one execution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecuteOptions {
    /// Client flags.
    pub flags: ExecuteFlags,
    /// Handling of surplus parameter values.
    pub surplus: SurplusPolicy,
}

/// What an execution did besides producing output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecuteOutcome {
    /// A cursor was opened; rows come from FETCH.
    pub cursor_opened: bool,
    /// Reprepares performed during the call.
    pub reprepares: u64,
    /// The result column count changed during the call.
    pub metadata_changed: bool,
}

/// Executes `stmt` with `inputs`, writing results to `sink`.
pub(crate) fn execute(
    session: &mut Session,
    stmt: &mut Statement,
    inputs: &[ParamInput],
    options: ExecuteOptions,
    sink: &mut dyn ResultSink,
) -> StmtResult<ExecuteOutcome> {
    let result = run(session, stmt, inputs, options, sink);
    stmt.body.params.clear_transient();
    result
}

fn run(
    session: &mut Session,
    stmt: &mut Statement,
    inputs: &[ParamInput],
    options: ExecuteOptions,
    sink: &mut dyn ResultSink,
) -> StmtResult<ExecuteOutcome> {
    if let Some(err) = stmt.take_long_data_error() {
        return Err(err);
    }
    session.check_policy()?;
    if stmt.state() == LifecycleState::Initialized {
        return Err(StmtError::invalid_state(format!(
            "statement {} is not prepared",
            stmt.id()
        )));
    }

    stmt.close_cursor();
    stmt.metadata_changed = false;
    let warnings = stmt.body.params.bind(inputs, options.surplus)?;
    for warning in warnings {
        session.diagnostics.current_mut().push(warning);
    }

    let backend = session.backend_handle();
    let savepoint = session.mdl.savepoint();
    let reprepares_before = stmt.stats.reprepares;
    let result = execute_loop(session, &*backend, stmt, options, sink);
    session.mdl.rollback_to(savepoint, &*backend);

    let cursor_opened = result?;
    if stmt.metadata_changed {
        session.diagnostics.current_mut().push(Condition::warning(
            ErrorCode::MetadataChanged,
            format!("result metadata of statement {} changed", stmt.id()),
        ));
    }
    Ok(ExecuteOutcome {
        cursor_opened,
        reprepares: stmt.stats.reprepares - reprepares_before,
        metadata_changed: stmt.metadata_changed,
    })
}

/// Returns whether a cursor was opened.
fn execute_loop(
    session: &mut Session,
    backend: &dyn Backend,
    stmt: &mut Statement,
    options: ExecuteOptions,
    sink: &mut dyn ResultSink,
) -> StmtResult<bool> {
    let refresh = stmt.plan_requires_refresh();
    let sink_changed = stmt.last_sink.is_some_and(|kind| kind != sink.kind());
    if refresh || sink_changed {
        let reason = if refresh {
            ReprepareReason::RefreshRequired
        } else {
            ReprepareReason::SinkChanged
        };
        stmt.reprepare(backend, &mut session.mdl, reason)?;
    }
    stmt.last_sink = Some(sink.kind());

    let mut observer = ReprepareObserver::new();
    let mut type_reprepared = false;
    let mut engine_switches = 0u32;
    loop {
        session.check_killed()?;

        // Every attempt is checked; only one reprepare per call is charged
        // to a type mismatch.
        if !type_reprepared {
            if let Some((index, hint)) = stmt.body.params.first_incompatible() {
                debug!(statement = %stmt.id(), index, %hint, "parameter type incompatible with plan");
                type_reprepared = true;
                stmt.reprepare(backend, &mut session.mdl, ReprepareReason::TypeMismatch)?;
                continue;
            }
        }

        observer.begin_attempt();
        let err = match invoke(session, backend, stmt, options.flags, sink, &mut observer) {
            Ok(cursor_opened) => {
                stmt.mark_executed();
                return Ok(cursor_opened);
            }
            Err(err) => err,
        };

        if err.kind == InvokeErrorKind::OutOfMemory {
            return Err(err.into());
        }
        let stale = observer.is_invalidated() || err.requires_reprepare;
        let retry_allowed = stmt.command().is_some_and(|c| c.allows_retry());
        if !retry_allowed {
            return Err(if stale {
                StmtError::StaleMetadata
            } else {
                err.into()
            });
        }

        if stale {
            if !observer.can_retry() {
                warn!(
                    statement = %stmt.id(),
                    attempts = observer.attempts(),
                    "metadata kept changing, giving up"
                );
                session.diagnostics.current_mut().push(Condition::warning(
                    ErrorCode::StaleMetadata,
                    err.message,
                ));
                return Err(StmtError::ReprepareExhausted {
                    attempts: observer.attempts(),
                });
            }
            observer.record_reprepare();
            stmt.reprepare(backend, &mut session.mdl, ReprepareReason::StaleMetadata)?;
            continue;
        }

        if err.alternate_engine {
            match engine_switches {
                0 => {
                    stmt.engine = stmt.engine().other();
                    info!(statement = %stmt.id(), engine = %stmt.engine, "switching engine");
                }
                1 => {
                    stmt.force_primary = true;
                    info!(statement = %stmt.id(), "falling back to primary engine permanently");
                }
                _ => return Err(err.into()),
            }
            engine_switches += 1;
            stmt.stats.engine_switches += 1;
            stmt.reprepare(backend, &mut session.mdl, ReprepareReason::EngineSwitch)?;
            continue;
        }

        return Err(err.into());
    }
}

/// One attempt: lock dependencies, then run the plan or open a cursor.
fn invoke(
    session: &mut Session,
    backend: &dyn Backend,
    stmt: &mut Statement,
    flags: ExecuteFlags,
    sink: &mut dyn ResultSink,
    observer: &mut ReprepareObserver,
) -> Result<bool, InvokeError> {
    let id = stmt.id();
    let body = &mut stmt.body;
    let Some(plan) = body.plan.as_deref() else {
        return Err(InvokeError::internal(format!("statement {id} has no plan")));
    };
    session.mdl.acquire(backend, plan.dependencies())?;

    let want_cursor = flags.contains(ExecuteFlags::CURSOR)
        && plan.command().supports_cursor()
        && !plan.columns().is_empty();
    let mut ctx = InvokeContext {
        params: body.params.slots(),
        sink: &mut *sink,
        observer,
        session,
    };
    if !want_cursor {
        backend.invoke(plan, &mut ctx)?;
        return Ok(false);
    }

    let source = backend.open_row_source(plan, &mut ctx)?;
    let columns = plan.columns().to_vec();
    let mut cursor = Cursor::open(id, source, columns);
    sink.begin_metadata(cursor.columns())
        .and_then(|()| sink.end_metadata())
        .and_then(|()| sink.send_ok(&OkStatus::new().with_status(ServerStatus::CURSOR_EXISTS)))
        .map_err(|e| {
            cursor.close();
            InvokeError::from(e)
        })?;
    body.cursor = Some(cursor);
    Ok(true)
}
