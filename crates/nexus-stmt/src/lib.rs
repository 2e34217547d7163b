//! # nexus-stmt
//!
//! Prepared statement execution core for NexusDB.
//!
//! This crate compiles parameterized SQL once and runs it repeatedly while
//! schema metadata changes underneath it:
//!
//! - **Binding**: decodes wire parameters into typed [`param::ParamSlot`]s
//! - **Type checks**: recompiles once when a bound value does not fit the plan
//! - **Reprepare**: rebuilds stale plans transparently, at most three times
//! - **Engine fallback**: retries on the other engine, then on the primary
//! - **Cursors**: forward-only incremental fetch
//! - **Sinks**: network serialization or in-memory capture
//! - **Sandbox**: headless execution with nested diagnostics
//!
//! SQL compilation, execution and metadata locking are supplied by a
//! [`Backend`].
//!
//! ## Example
//!
//! ```rust,ignore
//! use nexus_stmt::{ExecuteFlags, NetworkSink, ParamInput, Session};
//!
//! let mut session = Session::new(SessionId::new(1), backend, StatementConfig::default());
//! let prepared = session.prepare("SELECT x FROM t WHERE id = ?")?;
//! let mut sink = NetworkSink::new();
//! session.execute(prepared.statement_id, &[ParamInput::long(7)], ExecuteFlags::empty(), &mut sink)?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]

pub mod backend;
pub mod cursor;
pub mod diagnostics;
pub mod engine;
pub mod error;
pub mod mdl;
pub mod observer;
pub mod param;
pub mod sandbox;
pub mod session;
pub mod sink;
pub mod statement;
pub mod types;

pub use backend::{
    Backend, CompileRequest, Compiled, CompiledPlan, InvokeContext, LockTicket, ParamDeclaration,
    RowSource,
};
pub use cursor::{Cursor, FetchOutcome};
pub use diagnostics::{DiagnosticsArea, DiagnosticsStack};
pub use engine::{ExecuteFlags, ExecuteOptions, ExecuteOutcome};
pub use error::{CompileError, InvokeError, InvokeErrorKind, StmtError, StmtResult};
pub use observer::ReprepareObserver;
pub use param::{ParamInput, ParamSlot, ParamSlots, SurplusPolicy};
pub use sandbox::Sandbox;
pub use session::{KillHandle, PrepareResponse, SecurityContext, Session};
pub use sink::{
    send_result_set, CaptureSink, CapturedResultSet, NetworkSink, OkStatus, ResultSink,
    ServerStatus, SinkError, SinkKind,
};
pub use statement::{LifecycleState, Statement, StatementStats};
pub use types::{ActualKind, ColumnMeta, CommandClass, Engine, ObjectName, Row, SqlType};
