//! In-memory capturing sink used by headless execution.

use nexus_common::Condition;
use nexus_wire::Value;

use super::{OkStatus, ResultSink, SinkError, SinkKind, SinkResult};
use crate::types::{ColumnMeta, Row};

/// One captured result: rows (if any) and the terminal status.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CapturedResultSet {
    /// Column metadata; empty for status-only results.
    pub columns: Vec<ColumnMeta>,
    /// Rows in delivery order.
    pub rows: Vec<Row>,
    /// Terminal status.
    pub status: Option<OkStatus>,
}

impl CapturedResultSet {
    /// Returns true if the result carried rows.
    #[must_use]
    pub fn has_result_set(&self) -> bool {
        !self.columns.is_empty()
    }

    /// Returns the value at `row`, `column`.
    #[must_use]
    pub fn value(&self, row: usize, column: usize) -> Option<&Value> {
        self.rows.get(row).and_then(|r| r.get(column))
    }
}

/// Sink accumulating discrete result sets in memory.
#[derive(Debug, Default)]
pub struct CaptureSink {
    results: Vec<CapturedResultSet>,
    current: Option<CapturedResultSet>,
    row: Option<Row>,
    error: Option<Condition>,
}

impl CaptureSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Completed results.
    #[must_use]
    pub fn results(&self) -> &[CapturedResultSet] {
        &self.results
    }

    /// Last error sent.
    #[must_use]
    pub fn error(&self) -> Option<&Condition> {
        self.error.as_ref()
    }

    /// Consumes the sink, returning completed results.
    #[must_use]
    pub fn into_results(self) -> Vec<CapturedResultSet> {
        self.results
    }

    /// Drains completed results.
    pub fn take_results(&mut self) -> Vec<CapturedResultSet> {
        std::mem::take(&mut self.results)
    }

    fn open(&mut self, columns: &[ColumnMeta]) {
        self.current = Some(CapturedResultSet {
            columns: columns.to_vec(),
            ..CapturedResultSet::default()
        });
        self.row = None;
    }

    fn current(&mut self) -> SinkResult<&mut CapturedResultSet> {
        self.current
            .as_mut()
            .ok_or_else(|| SinkError::protocol("row outside of a result set"))
    }
}

impl ResultSink for CaptureSink {
    fn kind(&self) -> SinkKind {
        SinkKind::Capture
    }

    fn begin_metadata(&mut self, columns: &[ColumnMeta]) -> SinkResult<()> {
        self.open(columns);
        Ok(())
    }

    fn end_metadata(&mut self) -> SinkResult<()> {
        self.current().map(|_| ())
    }

    fn resume_rows(&mut self, columns: &[ColumnMeta]) -> SinkResult<()> {
        self.open(columns);
        Ok(())
    }

    fn start_row(&mut self) -> SinkResult<()> {
        let width = self.current()?.columns.len();
        if self.row.is_some() {
            return Err(SinkError::protocol("start_row inside a row"));
        }
        self.row = Some(Vec::with_capacity(width));
        Ok(())
    }

    fn store_column(&mut self, value: &Value) -> SinkResult<()> {
        let row = self
            .row
            .as_mut()
            .ok_or_else(|| SinkError::protocol("store_column outside a row"))?;
        row.try_reserve(1).map_err(|_| SinkError::OutOfMemory)?;
        row.push(value.clone());
        Ok(())
    }

    fn end_row(&mut self) -> SinkResult<()> {
        let row = self
            .row
            .take()
            .ok_or_else(|| SinkError::protocol("end_row outside a row"))?;
        let current = self.current()?;
        current.rows.try_reserve(1).map_err(|_| SinkError::OutOfMemory)?;
        current.rows.push(row);
        Ok(())
    }

    fn send_ok(&mut self, status: &OkStatus) -> SinkResult<()> {
        let mut result = self.current.take().unwrap_or_default();
        result.status = Some(status.clone());
        self.row = None;
        self.results.push(result);
        Ok(())
    }

    fn send_error(&mut self, condition: &Condition) -> SinkResult<()> {
        self.current = None;
        self.row = None;
        self.error = Some(condition.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::send_result_set;
    use crate::types::SqlType;
    use nexus_common::ErrorCode;

    #[test]
    fn test_discrete_result_sets() {
        let columns = vec![ColumnMeta::new("n", SqlType::BIGINT)];
        let mut sink = CaptureSink::new();
        send_result_set(
            &mut sink,
            &columns,
            &[vec![Value::Int(1)], vec![Value::Int(2)]],
            &OkStatus::new(),
        )
        .unwrap();
        sink.send_ok(&OkStatus::affected(4)).unwrap();

        let results = sink.results();
        assert_eq!(results.len(), 2);
        assert!(results[0].has_result_set());
        assert_eq!(results[0].rows.len(), 2);
        assert_eq!(results[0].value(1, 0), Some(&Value::Int(2)));
        assert!(!results[1].has_result_set());
        assert_eq!(results[1].status.as_ref().map(|s| s.affected_rows), Some(4));
    }

    #[test]
    fn test_error_discards_partial_result() {
        let columns = vec![ColumnMeta::new("n", SqlType::BIGINT)];
        let mut sink = CaptureSink::new();
        sink.begin_metadata(&columns).unwrap();
        sink.end_metadata().unwrap();
        sink.start_row().unwrap();
        sink.send_error(&Condition::error(ErrorCode::ExecutionFailed, "boom"))
            .unwrap();
        assert!(sink.results().is_empty());
        assert_eq!(sink.error().map(|c| c.message.as_str()), Some("boom"));
    }

    #[test]
    fn test_protocol_violations() {
        let mut sink = CaptureSink::new();
        assert!(sink.end_metadata().is_err());
        assert!(sink.start_row().is_err());
        assert!(sink.end_row().is_err());
    }
}
