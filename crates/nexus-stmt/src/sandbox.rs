//! Headless statement execution.
//!
//! Internal callers use the sandbox to run SQL on behalf of a session
//! without a client connection. Each call compiles a private statement
//! that never enters the registry, captures its output in memory, and
//! reports into a nested diagnostics area:
//!
//! ```text
//!   save display ─► push area ─► prepare ─► execute ─► pop area ─► restore display
//!                                    └────► CaptureSink ────► Vec<CapturedResultSet>
//! ```

use nexus_common::StatementId;
use tracing::debug;

use crate::engine::{self, ExecuteOptions};
use crate::error::StmtResult;
use crate::param::{ParamInput, SurplusPolicy};
use crate::session::Session;
use crate::sink::{CaptureSink, CapturedResultSet};
use crate::statement::Statement;

/// Runs SQL fragments with a session's identity.
#[derive(Debug)]
pub struct Sandbox<'s> {
    session: &'s mut Session,
}

impl<'s> Sandbox<'s> {
    pub(crate) fn new(session: &'s mut Session) -> Self {
        Self { session }
    }

    /// Runs `sql` and returns everything it produced.
    pub fn execute_direct(&mut self, sql: &str) -> StmtResult<Vec<CapturedResultSet>> {
        self.execute_direct_with_params(sql, &[])
    }

    /// Runs `sql` with bound parameters. The value count must match the
    /// placeholder count.
    pub fn execute_direct_with_params(
        &mut self,
        sql: &str,
        params: &[ParamInput],
    ) -> StmtResult<Vec<CapturedResultSet>> {
        let session = &mut *self.session;
        let saved_display = session.query_display.clone();
        session.diagnostics.push();

        let mut sink = CaptureSink::new();
        let result = run_private(session, sql, params, &mut sink);
        if let Err(err) = &result {
            debug!(session = %session.id(), error = %err, "sandboxed statement failed");
            session.diagnostics.current_mut().set_error(err.to_condition());
        }

        session.diagnostics.pop();
        session.query_display = saved_display;
        result.map(|()| sink.into_results())
    }
}

fn run_private(
    session: &mut Session,
    sql: &str,
    params: &[ParamInput],
    sink: &mut CaptureSink,
) -> StmtResult<()> {
    let backend = session.backend_handle();
    let mut stmt = Statement::new(
        StatementId::INTERNAL,
        sql,
        session.database().map(str::to_string),
        session.default_engine(),
    );

    let savepoint = session.mdl.savepoint();
    let prepared = stmt.prepare(&*backend, &mut session.mdl);
    session.mdl.rollback_to(savepoint, &*backend);
    prepared?;

    let options = ExecuteOptions {
        surplus: SurplusPolicy::Reject,
        ..ExecuteOptions::default()
    };
    engine::execute(session, &mut stmt, params, options, sink)?;
    Ok(())
}
