//! Result sinks.
//!
//! A sink receives the output of one command in a fixed order:
//!
//! ```text
//!   begin_metadata(columns) → end_metadata()
//!   { start_row() → store_column(v)* → end_row() }*
//!   send_ok(status) | send_error(condition)
//! ```
//!
//! [`NetworkSink`] serializes to protocol payloads. [`CaptureSink`] keeps
//! results in memory for headless execution.

mod capture;
mod network;

use nexus_common::Condition;
use nexus_wire::{Value, WireError};
use thiserror::Error;

use crate::types::{ColumnMeta, Row};

pub use capture::{CaptureSink, CapturedResultSet};
pub use network::NetworkSink;

/// Result type for sink operations.
pub type SinkResult<T> = Result<T, SinkError>;

/// Sink failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SinkError {
    /// A value could not be encoded for its column.
    #[error("failed to encode result: {0}")]
    Encode(#[from] WireError),

    /// Operations arrived out of order.
    #[error("result sink protocol violation: {0}")]
    Protocol(String),

    /// Buffer growth failed.
    #[error("out of memory while buffering results")]
    OutOfMemory,
}

impl SinkError {
    pub(crate) fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol(message.into())
    }
}

/// Which sink implementation is attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SinkKind {
    /// Serializes to the client connection.
    Network,
    /// Captures in memory.
    Capture,
}

bitflags::bitflags! {
    /// Server status flags reported with OK and EOF.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ServerStatus: u16 {
        /// A transaction is open.
        const IN_TRANS = 0x0001;
        /// Autocommit is on.
        const AUTOCOMMIT = 0x0002;
        /// A cursor is open for the statement.
        const CURSOR_EXISTS = 0x0040;
        /// The cursor has been drained.
        const LAST_ROW_SENT = 0x0080;
        /// Result metadata changed since prepare.
        const METADATA_CHANGED = 0x0400;
    }
}

/// Terminal success status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OkStatus {
    /// Rows changed by the statement.
    pub affected_rows: u64,
    /// Last generated id.
    pub last_insert_id: u64,
    /// Warnings raised.
    pub warnings: u16,
    /// Status flags.
    pub status: ServerStatus,
    /// Informational message.
    pub message: String,
}

impl OkStatus {
    /// Plain OK with autocommit set.
    #[must_use]
    pub fn new() -> Self {
        Self {
            affected_rows: 0,
            last_insert_id: 0,
            warnings: 0,
            status: ServerStatus::AUTOCOMMIT,
            message: String::new(),
        }
    }

    /// OK reporting affected rows.
    #[must_use]
    pub fn affected(rows: u64) -> Self {
        Self {
            affected_rows: rows,
            ..Self::new()
        }
    }

    /// Adds status flags.
    #[must_use]
    pub fn with_status(mut self, status: ServerStatus) -> Self {
        self.status |= status;
        self
    }

    /// Sets the last insert id.
    #[must_use]
    pub fn with_last_insert_id(mut self, id: u64) -> Self {
        self.last_insert_id = id;
        self
    }
}

impl Default for OkStatus {
    fn default() -> Self {
        Self::new()
    }
}

/// Destination for command output.
pub trait ResultSink {
    /// Implementation kind.
    fn kind(&self) -> SinkKind;

    /// Starts a result set.
    fn begin_metadata(&mut self, columns: &[ColumnMeta]) -> SinkResult<()>;

    /// Ends the column metadata.
    fn end_metadata(&mut self) -> SinkResult<()>;

    /// Continues a result set whose metadata went out with an earlier
    /// command, as cursor fetches do.
    fn resume_rows(&mut self, columns: &[ColumnMeta]) -> SinkResult<()>;

    /// Starts a row.
    fn start_row(&mut self) -> SinkResult<()>;

    /// Stores the next column of the current row.
    fn store_column(&mut self, value: &Value) -> SinkResult<()>;

    /// Ends the current row.
    fn end_row(&mut self) -> SinkResult<()>;

    /// Terminates the command successfully.
    fn send_ok(&mut self, status: &OkStatus) -> SinkResult<()>;

    /// Terminates the command with an error.
    fn send_error(&mut self, condition: &Condition) -> SinkResult<()>;
}

/// Writes rows to a sink whose result set is already open.
pub fn send_rows(sink: &mut dyn ResultSink, rows: &[Row]) -> SinkResult<()> {
    for row in rows {
        sink.start_row()?;
        for value in row {
            sink.store_column(value)?;
        }
        sink.end_row()?;
    }
    Ok(())
}

/// Writes a whole result set: metadata, rows, then `status`.
pub fn send_result_set(
    sink: &mut dyn ResultSink,
    columns: &[ColumnMeta],
    rows: &[Row],
    status: &OkStatus,
) -> SinkResult<()> {
    sink.begin_metadata(columns)?;
    sink.end_metadata()?;
    send_rows(sink, rows)?;
    sink.send_ok(status)
}
