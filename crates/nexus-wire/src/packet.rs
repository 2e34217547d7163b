//! Packet payload helpers.
//!
//! These build and parse the payloads that sit above the framing layer:
//! length-encoded integers, OK/ERR/EOF replies, column definitions, the
//! prepare reply header and binary result rows. Framing (3-byte length,
//! sequence id, splitting) is left to the transport.
//!
//! ```text
//! binary row: 0x00 | null bitmap (offset 2) | values...
//! ```

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::codec;
use crate::error::{WireError, WireResult};
use crate::types::FieldType;
use crate::value::Value;

/// OK packet header byte.
pub const OK_HEADER: u8 = 0x00;
/// EOF packet header byte.
pub const EOF_HEADER: u8 = 0xFE;
/// ERR packet header byte.
pub const ERR_HEADER: u8 = 0xFF;

/// Column flag: value can't be NULL.
pub const NOT_NULL_FLAG: u16 = 0x0001;
/// Column flag: unsigned integer.
pub const UNSIGNED_FLAG: u16 = 0x0020;
/// Column flag: binary collation.
pub const BINARY_FLAG: u16 = 0x0080;

/// utf8mb4 character set id.
pub const CHARSET_UTF8MB4: u16 = 45;
/// binary character set id.
pub const CHARSET_BINARY: u16 = 63;

/// Bit offset of the first column in a binary row null bitmap.
const ROW_NULL_BITMAP_OFFSET: usize = 2;

// =============================================================================
// Length-encoded values
// =============================================================================

/// Writes a length-encoded integer.
#[allow(clippy::cast_possible_truncation)]
pub fn put_lenenc_int<B: BufMut>(buf: &mut B, value: u64) {
    if value < 251 {
        buf.put_u8(value as u8);
    } else if value < 0x1_0000 {
        buf.put_u8(0xFC);
        buf.put_u16_le(value as u16);
    } else if value < 0x100_0000 {
        buf.put_u8(0xFD);
        buf.put_uint_le(value, 3);
    } else {
        buf.put_u8(0xFE);
        buf.put_u64_le(value);
    }
}

/// Writes a length-encoded byte string.
pub fn put_lenenc_bytes<B: BufMut>(buf: &mut B, bytes: &[u8]) {
    put_lenenc_int(buf, bytes.len() as u64);
    buf.put_slice(bytes);
}

fn need(buf: &[u8], n: usize, what: &str) -> WireResult<()> {
    if buf.remaining() < n {
        return Err(WireError::malformed(format!(
            "{what}: need {n} bytes, have {}",
            buf.remaining()
        )));
    }
    Ok(())
}

/// Reads a length-encoded integer, advancing `buf`.
pub fn get_lenenc_int(buf: &mut &[u8]) -> WireResult<u64> {
    need(buf, 1, "length-encoded integer")?;
    let first = buf.get_u8();
    let value = match first {
        0..=250 => u64::from(first),
        0xFC => {
            need(buf, 2, "length-encoded integer")?;
            u64::from(buf.get_u16_le())
        }
        0xFD => {
            need(buf, 3, "length-encoded integer")?;
            buf.get_uint_le(3)
        }
        0xFE => {
            need(buf, 8, "length-encoded integer")?;
            buf.get_u64_le()
        }
        other => {
            return Err(WireError::malformed(format!(
                "invalid length-encoded integer prefix {other:#04x}"
            )))
        }
    };
    Ok(value)
}

/// Reads a length-encoded byte string, advancing `buf`.
pub fn get_lenenc_bytes(buf: &mut &[u8]) -> WireResult<Bytes> {
    let len = usize::try_from(get_lenenc_int(buf)?)
        .map_err(|_| WireError::malformed("string length overflows usize"))?;
    need(buf, len, "length-encoded string")?;
    let bytes = Bytes::copy_from_slice(&buf[..len]);
    buf.advance(len);
    Ok(bytes)
}

// =============================================================================
// Replies
// =============================================================================

/// Builds an OK payload.
pub fn ok_payload(
    affected_rows: u64,
    last_insert_id: u64,
    status: u16,
    warnings: u16,
    info: &str,
) -> Bytes {
    let mut buf = BytesMut::with_capacity(16 + info.len());
    buf.put_u8(OK_HEADER);
    put_lenenc_int(&mut buf, affected_rows);
    put_lenenc_int(&mut buf, last_insert_id);
    buf.put_u16_le(status);
    buf.put_u16_le(warnings);
    buf.put_slice(info.as_bytes());
    buf.freeze()
}

/// Builds an ERR payload. `sqlstate` must be five characters.
pub fn err_payload(code: u16, sqlstate: &str, message: &str) -> Bytes {
    let mut buf = BytesMut::with_capacity(9 + message.len());
    buf.put_u8(ERR_HEADER);
    buf.put_u16_le(code);
    buf.put_u8(b'#');
    let state = sqlstate.as_bytes();
    for i in 0..5 {
        buf.put_u8(state.get(i).copied().unwrap_or(b'0'));
    }
    buf.put_slice(message.as_bytes());
    buf.freeze()
}

/// Builds an EOF payload.
pub fn eof_payload(warnings: u16, status: u16) -> Bytes {
    let mut buf = BytesMut::with_capacity(5);
    buf.put_u8(EOF_HEADER);
    buf.put_u16_le(warnings);
    buf.put_u16_le(status);
    buf.freeze()
}

/// Builds the first payload of a prepare reply.
pub fn prepare_ok_payload(statement_id: u32, columns: u16, params: u16, warnings: u16) -> Bytes {
    let mut buf = BytesMut::with_capacity(12);
    buf.put_u8(OK_HEADER);
    buf.put_u32_le(statement_id);
    buf.put_u16_le(columns);
    buf.put_u16_le(params);
    buf.put_u8(0);
    buf.put_u16_le(warnings);
    buf.freeze()
}

/// Builds a column count payload.
pub fn column_count_payload(count: usize) -> Bytes {
    let mut buf = BytesMut::with_capacity(9);
    put_lenenc_int(&mut buf, count as u64);
    buf.freeze()
}

/// Column definition (protocol 4.1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDefinition {
    /// Schema name.
    pub schema: String,
    /// Table name.
    pub table: String,
    /// Column name.
    pub name: String,
    /// Wire type.
    pub field_type: FieldType,
    /// Column flags.
    pub flags: u16,
    /// Display length.
    pub length: u32,
    /// Fractional digits.
    pub decimals: u8,
}

impl ColumnDefinition {
    /// Creates a definition with default length and flags.
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            schema: String::new(),
            table: String::new(),
            name: name.into(),
            field_type,
            flags: 0,
            length: 255,
            decimals: 0,
        }
    }

    /// Returns true if the unsigned flag is set.
    #[must_use]
    pub fn is_unsigned(&self) -> bool {
        self.flags & UNSIGNED_FLAG != 0
    }

    /// Encodes the definition payload.
    pub fn to_payload(&self) -> Bytes {
        let charset = if self.field_type.is_byte_string() && self.flags & BINARY_FLAG == 0 {
            CHARSET_UTF8MB4
        } else {
            CHARSET_BINARY
        };
        let mut buf = BytesMut::with_capacity(32 + self.name.len() * 2 + self.table.len() * 2);
        put_lenenc_bytes(&mut buf, b"def");
        put_lenenc_bytes(&mut buf, self.schema.as_bytes());
        put_lenenc_bytes(&mut buf, self.table.as_bytes());
        put_lenenc_bytes(&mut buf, self.table.as_bytes());
        put_lenenc_bytes(&mut buf, self.name.as_bytes());
        put_lenenc_bytes(&mut buf, self.name.as_bytes());
        put_lenenc_int(&mut buf, 0x0c);
        buf.put_u16_le(charset);
        buf.put_u32_le(self.length);
        buf.put_u8(self.field_type.as_u8());
        buf.put_u16_le(self.flags);
        buf.put_u8(self.decimals);
        buf.put_u16_le(0);
        buf.freeze()
    }

    /// Parses a definition payload.
    pub fn from_payload(payload: &[u8]) -> WireResult<Self> {
        let mut buf = payload;
        let _catalog = get_lenenc_bytes(&mut buf)?;
        let schema = lossy(&get_lenenc_bytes(&mut buf)?);
        let table = lossy(&get_lenenc_bytes(&mut buf)?);
        let _org_table = get_lenenc_bytes(&mut buf)?;
        let name = lossy(&get_lenenc_bytes(&mut buf)?);
        let _org_name = get_lenenc_bytes(&mut buf)?;
        if get_lenenc_int(&mut buf)? != 0x0c {
            return Err(WireError::malformed("bad column definition fixed length"));
        }
        need(buf, 12, "column definition")?;
        let _charset = buf.get_u16_le();
        let length = buf.get_u32_le();
        let field_type = FieldType::from_u8(buf.get_u8())?;
        let flags = buf.get_u16_le();
        let decimals = buf.get_u8();
        Ok(Self {
            schema,
            table,
            name,
            field_type,
            flags,
            length,
            decimals,
        })
    }
}

fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

// =============================================================================
// Binary rows
// =============================================================================

/// Incrementally builds binary result rows for a fixed column layout.
#[derive(Debug)]
pub struct BinaryRowWriter {
    columns: Vec<(FieldType, bool)>,
    null_bitmap: Vec<u8>,
    values: BytesMut,
    next: usize,
}

impl BinaryRowWriter {
    /// Creates a writer for columns given as (type, unsigned) pairs.
    pub fn new(columns: Vec<(FieldType, bool)>) -> Self {
        let bitmap_len = (columns.len() + 7 + ROW_NULL_BITMAP_OFFSET) / 8;
        Self {
            columns,
            null_bitmap: vec![0; bitmap_len],
            values: BytesMut::new(),
            next: 0,
        }
    }

    /// Number of columns per row.
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Appends the next column value of the current row.
    pub fn push(&mut self, value: &Value) -> WireResult<()> {
        let Some(&(field_type, unsigned)) = self.columns.get(self.next) else {
            return Err(WireError::malformed(format!(
                "row has more than {} columns",
                self.columns.len()
            )));
        };
        if value.is_null() {
            let bit = self.next + ROW_NULL_BITMAP_OFFSET;
            self.null_bitmap[bit / 8] |= 1 << (bit % 8);
        } else if field_type.is_length_prefixed_in_row() {
            let encoded = codec::encode_to_bytes(field_type, unsigned, value)?;
            put_lenenc_bytes(&mut self.values, &encoded);
        } else {
            codec::encode(field_type, unsigned, value, &mut self.values)?;
        }
        self.next += 1;
        Ok(())
    }

    /// Finishes the current row, returning its payload and resetting the
    /// writer for the next row.
    pub fn finish(&mut self) -> WireResult<Bytes> {
        if self.next != self.columns.len() {
            return Err(WireError::malformed(format!(
                "row has {} of {} columns",
                self.next,
                self.columns.len()
            )));
        }
        let mut buf = BytesMut::with_capacity(1 + self.null_bitmap.len() + self.values.len());
        buf.put_u8(OK_HEADER);
        buf.put_slice(&self.null_bitmap);
        buf.put_slice(&self.values);
        self.reset();
        Ok(buf.freeze())
    }

    /// Discards any partially built row.
    pub fn reset(&mut self) {
        self.null_bitmap.iter_mut().for_each(|b| *b = 0);
        self.values.clear();
        self.next = 0;
    }
}

/// Parses a binary row payload produced for the given column layout.
pub fn decode_binary_row(payload: &[u8], columns: &[(FieldType, bool)]) -> WireResult<Vec<Value>> {
    let mut buf = payload;
    need(buf, 1, "binary row")?;
    if buf.get_u8() != OK_HEADER {
        return Err(WireError::malformed("binary row must start with 0x00"));
    }
    let bitmap_len = (columns.len() + 7 + ROW_NULL_BITMAP_OFFSET) / 8;
    need(buf, bitmap_len, "null bitmap")?;
    let bitmap = buf[..bitmap_len].to_vec();
    buf.advance(bitmap_len);

    let mut row = Vec::with_capacity(columns.len());
    for (index, &(field_type, unsigned)) in columns.iter().enumerate() {
        let bit = index + ROW_NULL_BITMAP_OFFSET;
        if bitmap[bit / 8] & (1 << (bit % 8)) != 0 {
            row.push(Value::Null);
        } else if field_type.is_length_prefixed_in_row() {
            let bytes = get_lenenc_bytes(&mut buf)?;
            let (value, _) = codec::decode(field_type, unsigned, &bytes)?;
            row.push(value);
        } else {
            let (value, used) = codec::decode(field_type, unsigned, buf)?;
            buf.advance(used);
            row.push(value);
        }
    }
    if buf.has_remaining() {
        return Err(WireError::malformed(format!(
            "{} trailing bytes after binary row",
            buf.remaining()
        )));
    }
    Ok(row)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::temporal::{DateTimeParts, Temporal};

    #[test]
    fn test_lenenc_int_boundaries() {
        for value in [0u64, 250, 251, 0xFFFF, 0x1_0000, 0xFF_FFFF, 0x100_0000, u64::MAX] {
            let mut buf = BytesMut::new();
            put_lenenc_int(&mut buf, value);
            let mut slice = &buf[..];
            assert_eq!(get_lenenc_int(&mut slice).unwrap(), value);
            assert!(slice.is_empty());
        }
    }

    #[test]
    fn test_lenenc_invalid_prefix() {
        let mut slice: &[u8] = &[0xFF];
        assert!(get_lenenc_int(&mut slice).is_err());
        let mut short: &[u8] = &[0xFC, 1];
        assert!(get_lenenc_int(&mut short).is_err());
    }

    #[test]
    fn test_ok_payload() {
        let payload = ok_payload(3, 0, 0x0002, 1, "");
        assert_eq!(&payload[..], &[0x00, 3, 0, 0x02, 0x00, 0x01, 0x00]);
    }

    #[test]
    fn test_err_payload() {
        let payload = err_payload(1243, "HY000", "Unknown prepared statement handler");
        assert_eq!(payload[0], ERR_HEADER);
        assert_eq!(u16::from_le_bytes([payload[1], payload[2]]), 1243);
        assert_eq!(&payload[3..9], b"#HY000");
        assert!(payload.ends_with(b"handler"));
    }

    #[test]
    fn test_prepare_ok_payload() {
        let payload = prepare_ok_payload(7, 1, 2, 0);
        assert_eq!(payload.len(), 12);
        assert_eq!(u32::from_le_bytes([payload[1], payload[2], payload[3], payload[4]]), 7);
        assert_eq!(u16::from_le_bytes([payload[7], payload[8]]), 2);
    }

    #[test]
    fn test_column_definition_roundtrip() {
        let mut column = ColumnDefinition::new("id", FieldType::Long);
        column.table = "t".into();
        column.flags = NOT_NULL_FLAG | UNSIGNED_FLAG;
        let parsed = ColumnDefinition::from_payload(&column.to_payload()).unwrap();
        assert_eq!(parsed, column);
        assert!(parsed.is_unsigned());
    }

    #[test]
    fn test_binary_row() {
        let layout = vec![
            (FieldType::Long, false),
            (FieldType::VarString, false),
            (FieldType::Date, false),
            (FieldType::NewDecimal, false),
        ];
        let mut writer = BinaryRowWriter::new(layout.clone());
        let date = Value::Temporal(Temporal::Date(DateTimeParts::date(2024, 5, 6)));
        writer.push(&Value::Int(7)).unwrap();
        writer.push(&Value::Null).unwrap();
        writer.push(&date).unwrap();
        writer.push(&Value::Decimal("1.25".into())).unwrap();
        let payload = writer.finish().unwrap();

        // header + 1 byte bitmap, column 1 null => bit 3
        assert_eq!(payload[0], 0x00);
        assert_eq!(payload[1], 0b0000_1000);

        let row = decode_binary_row(&payload, &layout).unwrap();
        assert_eq!(
            row,
            vec![Value::Int(7), Value::Null, date, Value::Decimal("1.25".into())]
        );
    }

    #[test]
    fn test_binary_row_column_count_checked() {
        let mut writer = BinaryRowWriter::new(vec![(FieldType::Tiny, false)]);
        assert!(writer.finish().is_err());
        writer.push(&Value::Int(1)).unwrap();
        assert!(writer.push(&Value::Int(2)).is_err());
        assert!(writer.finish().is_ok());
        // writer is reusable after finish
        writer.push(&Value::Int(3)).unwrap();
        assert!(writer.finish().is_ok());
    }
}
