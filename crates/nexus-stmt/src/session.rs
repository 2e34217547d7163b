//! Client sessions.
//!
//! A [`Session`] represents one client connection as seen by the statement
//! layer. It owns the connection's prepared statements, diagnostics and
//! metadata locks, and exposes the prepared-statement commands:
//!
//! | Command | Method |
//! |---|---|
//! | `PREPARE` | [`Session::prepare`], [`Session::prepare_named`] |
//! | `EXECUTE` | [`Session::execute`], [`Session::execute_named`] |
//! | `SEND_LONG_DATA` | [`Session::send_long_data`] |
//! | `FETCH` | [`Session::fetch`] |
//! | `RESET` | [`Session::reset`] |
//! | `CLOSE` | [`Session::close`], [`Session::deallocate`] |

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use nexus_common::{SessionId, StatementConfig, StatementId};
use nexus_wire::packet;
use tracing::{debug, warn};

use crate::backend::Backend;
use crate::cursor::FetchOutcome;
use crate::diagnostics::DiagnosticsStack;
use crate::engine::{self, ExecuteFlags, ExecuteOptions, ExecuteOutcome};
use crate::error::{StmtError, StmtResult};
use crate::mdl::MdlContext;
use crate::param::{ParamInput, SurplusPolicy};
use crate::sandbox::Sandbox;
use crate::sink::ResultSink;
use crate::statement::{Statement, StatementRegistry};
use crate::types::{ColumnMeta, Engine, SqlType};

// =============================================================================
// Security and kill
// =============================================================================

/// Identity and credential state of the session's user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecurityContext {
    /// User name.
    pub user: String,
    /// Client host.
    pub host: String,
    /// The password expired; statements may not run until it is changed.
    pub password_expired: bool,
}

impl SecurityContext {
    /// Creates a context for `user`@`host`.
    pub fn new(user: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            host: host.into(),
            password_expired: false,
        }
    }
}

/// Cloneable handle for interrupting a session's running statement from
/// another thread.
#[derive(Debug, Clone, Default)]
pub struct KillHandle(Arc<AtomicBool>);

impl KillHandle {
    /// Requests that the current statement stop.
    pub fn kill_query(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Returns true if a kill is pending.
    #[must_use]
    pub fn is_killed(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn clear(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

// =============================================================================
// Replies
// =============================================================================

/// Reply to PREPARE.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrepareResponse {
    /// Assigned id.
    pub statement_id: StatementId,
    /// Number of placeholders.
    pub param_count: usize,
    /// Declared placeholder types.
    pub params: Vec<SqlType>,
    /// Result columns.
    pub columns: Vec<ColumnMeta>,
}

impl PrepareResponse {
    fn of(stmt: &Statement) -> Self {
        Self {
            statement_id: stmt.id(),
            param_count: stmt.param_count(),
            params: stmt.param_types(),
            columns: stmt.columns().to_vec(),
        }
    }

    /// Encodes the reply payloads: the prepare OK, one definition per
    /// parameter and per column, each group closed by EOF.
    #[must_use]
    pub fn to_payloads(&self, warnings: u16) -> Vec<Bytes> {
        let params = u16::try_from(self.param_count).unwrap_or(u16::MAX);
        let columns = u16::try_from(self.columns.len()).unwrap_or(u16::MAX);
        let mut payloads = vec![packet::prepare_ok_payload(
            self.statement_id.as_u32(),
            columns,
            params,
            warnings,
        )];
        let eof = || packet::eof_payload(0, crate::sink::ServerStatus::AUTOCOMMIT.bits());
        if !self.params.is_empty() {
            payloads.extend(
                self.params
                    .iter()
                    .map(|t| ColumnMeta::new("?", *t).to_definition().to_payload()),
            );
            payloads.push(eof());
        }
        if !self.columns.is_empty() {
            payloads.extend(self.columns.iter().map(|c| c.to_definition().to_payload()));
            payloads.push(eof());
        }
        payloads
    }
}

// =============================================================================
// Session
// =============================================================================

/// Statement-layer state of one client connection.
pub struct Session {
    id: SessionId,
    backend: Arc<dyn Backend>,
    config: StatementConfig,
    pub(crate) registry: StatementRegistry,
    pub(crate) diagnostics: DiagnosticsStack,
    pub(crate) mdl: MdlContext,
    security: SecurityContext,
    database: Option<String>,
    pub(crate) query_display: Option<String>,
    kill: KillHandle,
    depth: u32,
    created_at: Instant,
    last_activity: Instant,
}

impl Session {
    /// Creates a session.
    pub fn new(id: SessionId, backend: Arc<dyn Backend>, config: StatementConfig) -> Self {
        let now = Instant::now();
        Self {
            id,
            backend,
            registry: StatementRegistry::new(config.max_prepared_statements),
            diagnostics: DiagnosticsStack::new(config.max_error_count),
            mdl: MdlContext::new(),
            config,
            security: SecurityContext::default(),
            database: None,
            query_display: None,
            kill: KillHandle::default(),
            depth: 0,
            created_at: now,
            last_activity: now,
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Session id.
    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Statement configuration.
    #[must_use]
    pub fn config(&self) -> &StatementConfig {
        &self.config
    }

    /// The compiler and executor.
    #[must_use]
    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    pub(crate) fn backend_handle(&self) -> Arc<dyn Backend> {
        Arc::clone(&self.backend)
    }

    /// Diagnostics of the session.
    #[must_use]
    pub fn diagnostics(&self) -> &DiagnosticsStack {
        &self.diagnostics
    }

    /// Diagnostics of the session, mutably.
    pub fn diagnostics_mut(&mut self) -> &mut DiagnosticsStack {
        &mut self.diagnostics
    }

    /// Security context.
    #[must_use]
    pub fn security(&self) -> &SecurityContext {
        &self.security
    }

    /// Replaces the security context.
    pub fn set_security(&mut self, security: SecurityContext) {
        self.security = security;
    }

    /// Current database.
    #[must_use]
    pub fn database(&self) -> Option<&str> {
        self.database.as_deref()
    }

    /// Changes the current database.
    pub fn set_database(&mut self, database: Option<String>) {
        self.database = database;
    }

    /// Text shown for the session's running query.
    #[must_use]
    pub fn query_display(&self) -> Option<&str> {
        self.query_display.as_deref()
    }

    /// Sets the text shown for the session's running query.
    pub fn set_query_display(&mut self, text: Option<String>) {
        self.query_display = text;
    }

    /// Handle for interrupting this session.
    #[must_use]
    pub fn kill_handle(&self) -> KillHandle {
        self.kill.clone()
    }

    /// An idle statement by id.
    #[must_use]
    pub fn statement(&self, id: StatementId) -> Option<&Statement> {
        self.registry.get(id)
    }

    /// Id of a named statement.
    #[must_use]
    pub fn statement_id(&self, name: &str) -> Option<StatementId> {
        self.registry.lookup_name(name)
    }

    /// Number of prepared statements.
    #[must_use]
    pub fn statement_count(&self) -> usize {
        self.registry.len()
    }

    /// Metadata lock tickets held.
    #[must_use]
    pub fn held_metadata_locks(&self) -> usize {
        self.mdl.held()
    }

    /// Time since the session was created.
    #[must_use]
    pub fn age(&self) -> std::time::Duration {
        self.created_at.elapsed()
    }

    /// Time since the last command.
    #[must_use]
    pub fn idle_time(&self) -> std::time::Duration {
        self.last_activity.elapsed()
    }

    /// Headless executor running with this session's identity.
    pub fn sandbox(&mut self) -> Sandbox<'_> {
        Sandbox::new(self)
    }

    // =========================================================================
    // Commands
    // =========================================================================

    /// Compiles `text` into a new statement.
    pub fn prepare(&mut self, text: &str) -> StmtResult<PrepareResponse> {
        self.begin_command();
        let result = self.prepare_statement(text, None);
        self.end_command(result, None)
    }

    /// Executes a prepared statement.
    pub fn execute(
        &mut self,
        id: StatementId,
        params: &[ParamInput],
        flags: ExecuteFlags,
        sink: &mut dyn ResultSink,
    ) -> StmtResult<ExecuteOutcome> {
        self.begin_command();
        let options = ExecuteOptions {
            flags,
            surplus: SurplusPolicy::Ignore,
        };
        let result = self.execute_registered(id, params, options, sink);
        self.end_command(result, Some(sink))
    }

    /// Appends streamed data to a parameter. Failures are reported by the
    /// next EXECUTE of the statement.
    pub fn send_long_data(&mut self, id: StatementId, index: usize, chunk: &[u8]) -> StmtResult<()> {
        self.begin_command();
        let limit = self.config.max_long_data_size;
        let result = self
            .registry
            .get_mut(id)
            .map(|stmt| stmt.send_long_data(index, chunk, limit));
        self.end_command(result, None)
    }

    /// Fetches rows from the statement's open cursor.
    pub fn fetch(
        &mut self,
        id: StatementId,
        rows: usize,
        sink: &mut dyn ResultSink,
    ) -> StmtResult<FetchOutcome> {
        self.begin_command();
        let result = self
            .registry
            .get_mut(id)
            .and_then(|stmt| stmt.fetch(rows, &mut *sink));
        self.end_command(result, Some(sink))
    }

    /// Closes the cursor and discards long data and bound values.
    pub fn reset(&mut self, id: StatementId) -> StmtResult<()> {
        self.begin_command();
        let result = self.registry.get_mut(id).map(Statement::reset);
        self.end_command(result, None)
    }

    /// Destroys a statement.
    pub fn close(&mut self, id: StatementId) -> StmtResult<()> {
        self.begin_command();
        let result = self.registry.remove(id).map(|stmt| {
            debug!(session = %self.id, statement = %id, "statement closed");
            drop(stmt);
        });
        self.end_command(result, None)
    }

    /// `PREPARE name FROM text`. An existing statement of that name is
    /// replaced.
    pub fn prepare_named(&mut self, name: &str, text: &str) -> StmtResult<PrepareResponse> {
        self.begin_command();
        let result = self.replace_named(name, text);
        self.end_command(result, None)
    }

    /// `EXECUTE name USING ...`. The value count must match exactly.
    pub fn execute_named(
        &mut self,
        name: &str,
        params: &[ParamInput],
        sink: &mut dyn ResultSink,
    ) -> StmtResult<ExecuteOutcome> {
        self.begin_command();
        let options = ExecuteOptions {
            flags: ExecuteFlags::empty(),
            surplus: SurplusPolicy::Reject,
        };
        let result = self
            .registry
            .lookup_name(name)
            .ok_or_else(|| StmtError::UnknownStatementName(name.to_string()))
            .and_then(|id| self.execute_registered(id, params, options, sink));
        self.end_command(result, Some(sink))
    }

    /// `DEALLOCATE PREPARE name`.
    pub fn deallocate(&mut self, name: &str) -> StmtResult<()> {
        self.begin_command();
        let result = self
            .registry
            .lookup_name(name)
            .ok_or_else(|| StmtError::UnknownStatementName(name.to_string()))
            .and_then(|id| self.registry.remove(id))
            .map(drop);
        self.end_command(result, None)
    }

    // =========================================================================
    // Internals
    // =========================================================================

    pub(crate) fn default_engine(&self) -> Engine {
        if self.config.secondary_engine {
            Engine::Secondary
        } else {
            Engine::Primary
        }
    }

    pub(crate) fn check_policy(&self) -> StmtResult<()> {
        if self.security.password_expired {
            return Err(StmtError::PolicyRejected(
                "you must reset your password before executing statements".to_string(),
            ));
        }
        Ok(())
    }

    pub(crate) fn check_killed(&self) -> StmtResult<()> {
        if self.kill.is_killed() {
            return Err(StmtError::Interrupted);
        }
        Ok(())
    }

    fn begin_command(&mut self) {
        if self.depth == 0 {
            self.diagnostics.current_mut().clear();
            self.last_activity = Instant::now();
        }
        self.depth += 1;
    }

    fn end_command<T>(
        &mut self,
        result: StmtResult<T>,
        sink: Option<&mut dyn ResultSink>,
    ) -> StmtResult<T> {
        self.depth = self.depth.saturating_sub(1);
        if let Err(err) = &result {
            let condition = err.to_condition();
            debug!(session = %self.id, error = %condition, "command failed");
            if let Some(sink) = sink {
                if let Err(sink_err) = sink.send_error(&condition) {
                    warn!(session = %self.id, error = %sink_err, "failed to send error to client");
                }
            }
            self.diagnostics.current_mut().set_error(condition);
        }
        if self.depth == 0 {
            self.kill.clear();
        }
        result
    }

    fn prepare_statement(&mut self, text: &str, name: Option<&str>) -> StmtResult<PrepareResponse> {
        self.registry.ensure_capacity()?;
        let id = self.registry.peek_id()?;
        let mut stmt = Statement::new(id, text, self.database.clone(), self.default_engine());
        if let Some(name) = name {
            stmt.set_name(name);
        }
        self.query_display = Some(text.to_string());

        let backend = self.backend_handle();
        let savepoint = self.mdl.savepoint();
        let prepared = stmt.prepare(&*backend, &mut self.mdl);
        self.mdl.rollback_to(savepoint, &*backend);
        prepared?;

        let response = PrepareResponse::of(&stmt);
        self.registry.insert(stmt)?;
        debug!(
            session = %self.id,
            statement = %id,
            params = response.param_count,
            columns = response.columns.len(),
            "statement prepared"
        );
        Ok(response)
    }

    fn replace_named(&mut self, name: &str, text: &str) -> StmtResult<PrepareResponse> {
        if let Some(old) = self.registry.lookup_name(name) {
            self.registry.remove(old)?;
        }
        self.prepare_statement(text, Some(name))
    }

    fn execute_registered(
        &mut self,
        id: StatementId,
        params: &[ParamInput],
        options: ExecuteOptions,
        sink: &mut dyn ResultSink,
    ) -> StmtResult<ExecuteOutcome> {
        let mut stmt = self.registry.checkout(id)?;
        self.query_display = Some(stmt.text().to_string());
        let result = engine::execute(self, &mut stmt, params, options, sink);
        self.registry.checkin(stmt);
        result
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("statements", &self.registry.len())
            .field("database", &self.database)
            .field("user", &self.security.user)
            .finish_non_exhaustive()
    }
}
