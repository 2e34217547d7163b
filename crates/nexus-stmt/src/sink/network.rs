//! Protocol-serializing sink.

use bytes::Bytes;
use nexus_common::Condition;
use nexus_wire::packet::{self, BinaryRowWriter};
use nexus_wire::Value;

use super::{OkStatus, ResultSink, SinkError, SinkKind, SinkResult};
use crate::types::ColumnMeta;

/// Sink producing MySQL-compatible packet payloads.
///
/// Payloads are queued unframed; the connection layer adds packet headers.
/// A result set is terminated by an EOF payload, a bare command by OK.
#[derive(Debug, Default)]
pub struct NetworkSink {
    packets: Vec<Bytes>,
    rows: Option<BinaryRowWriter>,
    in_row: bool,
}

impl NetworkSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queued payloads.
    #[must_use]
    pub fn packets(&self) -> &[Bytes] {
        &self.packets
    }

    /// Drains the queued payloads.
    pub fn take_packets(&mut self) -> Vec<Bytes> {
        std::mem::take(&mut self.packets)
    }

    fn open_rows(&mut self, columns: &[ColumnMeta]) {
        let layout = columns.iter().map(ColumnMeta::wire_type).collect();
        self.rows = Some(BinaryRowWriter::new(layout));
        self.in_row = false;
    }

    fn writer(&mut self) -> SinkResult<&mut BinaryRowWriter> {
        self.rows
            .as_mut()
            .ok_or_else(|| SinkError::protocol("row outside of a result set"))
    }
}

impl ResultSink for NetworkSink {
    fn kind(&self) -> SinkKind {
        SinkKind::Network
    }

    fn begin_metadata(&mut self, columns: &[ColumnMeta]) -> SinkResult<()> {
        self.packets.push(packet::column_count_payload(columns.len()));
        for column in columns {
            self.packets.push(column.to_definition().to_payload());
        }
        self.open_rows(columns);
        Ok(())
    }

    fn end_metadata(&mut self) -> SinkResult<()> {
        if self.rows.is_none() {
            return Err(SinkError::protocol("end_metadata without begin_metadata"));
        }
        self.packets
            .push(packet::eof_payload(0, super::ServerStatus::AUTOCOMMIT.bits()));
        Ok(())
    }

    fn resume_rows(&mut self, columns: &[ColumnMeta]) -> SinkResult<()> {
        self.open_rows(columns);
        Ok(())
    }

    fn start_row(&mut self) -> SinkResult<()> {
        if self.in_row {
            return Err(SinkError::protocol("start_row inside a row"));
        }
        self.writer()?.reset();
        self.in_row = true;
        Ok(())
    }

    fn store_column(&mut self, value: &Value) -> SinkResult<()> {
        if !self.in_row {
            return Err(SinkError::protocol("store_column outside a row"));
        }
        self.writer()?.push(value)?;
        Ok(())
    }

    fn end_row(&mut self) -> SinkResult<()> {
        if !self.in_row {
            return Err(SinkError::protocol("end_row outside a row"));
        }
        let payload = self.writer()?.finish()?;
        self.packets.push(payload);
        self.in_row = false;
        Ok(())
    }

    fn send_ok(&mut self, status: &OkStatus) -> SinkResult<()> {
        let payload = if self.rows.take().is_some() {
            packet::eof_payload(status.warnings, status.status.bits())
        } else {
            packet::ok_payload(
                status.affected_rows,
                status.last_insert_id,
                status.status.bits(),
                status.warnings,
                &status.message,
            )
        };
        self.packets.push(payload);
        self.in_row = false;
        Ok(())
    }

    fn send_error(&mut self, condition: &Condition) -> SinkResult<()> {
        self.rows = None;
        self.in_row = false;
        self.packets.push(packet::err_payload(
            condition.code.as_u16(),
            condition.sqlstate(),
            &condition.message,
        ));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::{send_result_set, ServerStatus};
    use crate::types::SqlType;
    use nexus_common::ErrorCode;
    use nexus_wire::packet::{decode_binary_row, ColumnDefinition, EOF_HEADER, ERR_HEADER, OK_HEADER};

    #[test]
    fn test_result_set_packets() {
        let columns = vec![
            ColumnMeta::new("id", SqlType::BIGINT),
            ColumnMeta::new("name", SqlType::String),
        ];
        let rows = vec![vec![Value::Int(7), Value::text("seven")], vec![Value::Int(8), Value::Null]];
        let mut sink = NetworkSink::new();
        send_result_set(&mut sink, &columns, &rows, &OkStatus::new()).unwrap();

        let packets = sink.take_packets();
        // count, 2 definitions, EOF, 2 rows, EOF
        assert_eq!(packets.len(), 7);
        assert_eq!(&packets[0][..], &[2u8][..]);
        let def = ColumnDefinition::from_payload(&packets[2]).unwrap();
        assert_eq!(def.name, "name");
        assert_eq!(packets[3][0], EOF_HEADER);

        let layout: Vec<_> = columns.iter().map(ColumnMeta::wire_type).collect();
        let row = decode_binary_row(&packets[5], &layout).unwrap();
        assert_eq!(row, vec![Value::Int(8), Value::Null]);
        assert_eq!(packets[6][0], EOF_HEADER);
        assert!(sink.packets().is_empty());
    }

    #[test]
    fn test_ok_and_error() {
        let mut sink = NetworkSink::new();
        sink.send_ok(&OkStatus::affected(3)).unwrap();
        sink.send_error(&Condition::error(ErrorCode::Interrupted, "killed"))
            .unwrap();
        let packets = sink.packets();
        assert_eq!(packets[0][0], OK_HEADER);
        assert_eq!(packets[0][1], 3);
        assert_eq!(packets[1][0], ERR_HEADER);
    }

    #[test]
    fn test_resumed_rows_end_with_status() {
        let columns = vec![ColumnMeta::new("id", SqlType::BIGINT)];
        let mut sink = NetworkSink::new();
        sink.resume_rows(&columns).unwrap();
        sink.start_row().unwrap();
        sink.store_column(&Value::Int(1)).unwrap();
        sink.end_row().unwrap();
        sink.send_ok(&OkStatus::new().with_status(ServerStatus::LAST_ROW_SENT))
            .unwrap();
        let packets = sink.packets();
        assert_eq!(packets.len(), 2);
        assert_eq!(packets[1][0], EOF_HEADER);
    }

    #[test]
    fn test_row_outside_result_set() {
        let mut sink = NetworkSink::new();
        assert!(matches!(sink.start_row(), Err(SinkError::Protocol(_))));
        assert!(matches!(
            sink.store_column(&Value::Null),
            Err(SinkError::Protocol(_))
        ));
    }
}
