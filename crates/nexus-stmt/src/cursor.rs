//! Forward-only server-side cursors.
//!
//! A cursor wraps the [`RowSource`] opened by a cursor-mode EXECUTE and
//! hands out batches on FETCH. It closes itself once a fetch comes back
//! short, and closes its source when dropped.

use std::fmt;

use nexus_common::StatementId;
use tracing::debug;

use crate::backend::RowSource;
use crate::error::{StmtError, StmtResult};
use crate::sink::{send_rows, OkStatus, ResultSink, ServerStatus};
use crate::types::ColumnMeta;

/// Result of one fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchOutcome {
    /// Rows delivered.
    pub rows: usize,
    /// The cursor drained and closed.
    pub exhausted: bool,
}

/// An open cursor over a statement's result.
pub struct Cursor {
    statement: StatementId,
    source: Option<Box<dyn RowSource>>,
    columns: Vec<ColumnMeta>,
    rows_fetched: u64,
}

impl Cursor {
    pub(crate) fn open(
        statement: StatementId,
        source: Box<dyn RowSource>,
        columns: Vec<ColumnMeta>,
    ) -> Self {
        debug!(%statement, columns = columns.len(), "cursor opened");
        Self {
            statement,
            source: Some(source),
            columns,
            rows_fetched: 0,
        }
    }

    /// Owning statement.
    #[must_use]
    pub fn statement(&self) -> StatementId {
        self.statement
    }

    /// Returns true until the cursor drains or is closed.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.source.is_some()
    }

    /// Rows delivered so far.
    #[must_use]
    pub fn rows_fetched(&self) -> u64 {
        self.rows_fetched
    }

    /// Result columns.
    #[must_use]
    pub fn columns(&self) -> &[ColumnMeta] {
        &self.columns
    }

    /// Sends up to `max_rows` rows to `sink`, followed by a status carrying
    /// `CURSOR_EXISTS` or, once drained, `LAST_ROW_SENT`. A zero count
    /// sends an empty batch and leaves the cursor where it was.
    pub(crate) fn fetch(
        &mut self,
        max_rows: usize,
        sink: &mut dyn ResultSink,
    ) -> StmtResult<FetchOutcome> {
        let Some(source) = self.source.as_mut() else {
            return Err(StmtError::cursor(format!(
                "cursor for statement {} is closed",
                self.statement
            )));
        };
        let rows = match source.fetch_rows(max_rows) {
            Ok(rows) => rows,
            Err(err) => {
                self.close();
                return Err(err.into());
            }
        };
        let exhausted = max_rows > 0 && rows.len() < max_rows;
        self.rows_fetched += rows.len() as u64;

        sink.resume_rows(&self.columns)?;
        send_rows(sink, &rows)?;
        if exhausted {
            self.close();
        }
        let status = if exhausted {
            ServerStatus::LAST_ROW_SENT
        } else {
            ServerStatus::CURSOR_EXISTS
        };
        sink.send_ok(&OkStatus::new().with_status(status))?;
        Ok(FetchOutcome {
            rows: rows.len(),
            exhausted,
        })
    }

    /// Closes the row source. Safe to call repeatedly.
    pub fn close(&mut self) {
        if let Some(mut source) = self.source.take() {
            source.close();
            debug!(statement = %self.statement, rows = self.rows_fetched, "cursor closed");
        }
    }
}

impl fmt::Debug for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cursor")
            .field("statement", &self.statement)
            .field("open", &self.is_open())
            .field("columns", &self.columns.len())
            .field("rows_fetched", &self.rows_fetched)
            .finish()
    }
}

impl Drop for Cursor {
    fn drop(&mut self) {
        self.close();
    }
}
