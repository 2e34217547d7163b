//! Scalar value codec for the binary protocol.
//!
//! `decode` reads one value of a given wire type from the front of a byte
//! span and reports how many bytes it consumed. Fixed-width numbers take
//! exactly their width; temporal values carry their own length byte;
//! decimals, strings and blobs take the whole span because their length is
//! supplied by the framing layer. `encode` is the exact inverse.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{WireError, WireResult};
use crate::temporal::{self, Temporal};
use crate::types::FieldType;
use crate::value::Value;

fn take<const N: usize>(field_type: FieldType, bytes: &[u8]) -> WireResult<[u8; N]> {
    bytes
        .get(..N)
        .and_then(|head| <[u8; N]>::try_from(head).ok())
        .ok_or(WireError::Truncated {
            field_type,
            needed: N,
            available: bytes.len(),
        })
}

/// Decodes one value from the front of `bytes`.
///
/// Returns the value and the number of bytes consumed. Never reads past the
/// end of `bytes`.
pub fn decode(field_type: FieldType, unsigned: bool, bytes: &[u8]) -> WireResult<(Value, usize)> {
    let decoded = match field_type {
        FieldType::Null => (Value::Null, 0),
        FieldType::Tiny => {
            let raw = take::<1>(field_type, bytes)?;
            let value = if unsigned {
                Value::UInt(u64::from(raw[0]))
            } else {
                Value::Int(i64::from(i8::from_le_bytes(raw)))
            };
            (value, 1)
        }
        FieldType::Short | FieldType::Year => {
            let raw = take::<2>(field_type, bytes)?;
            let value = if unsigned {
                Value::UInt(u64::from(u16::from_le_bytes(raw)))
            } else {
                Value::Int(i64::from(i16::from_le_bytes(raw)))
            };
            (value, 2)
        }
        FieldType::Long | FieldType::Int24 => {
            let raw = take::<4>(field_type, bytes)?;
            let value = if unsigned {
                Value::UInt(u64::from(u32::from_le_bytes(raw)))
            } else {
                Value::Int(i64::from(i32::from_le_bytes(raw)))
            };
            (value, 4)
        }
        FieldType::LongLong => {
            let raw = take::<8>(field_type, bytes)?;
            let value = if unsigned {
                Value::UInt(u64::from_le_bytes(raw))
            } else {
                Value::Int(i64::from_le_bytes(raw))
            };
            (value, 8)
        }
        FieldType::Float => {
            let raw = take::<4>(field_type, bytes)?;
            (Value::Double(f64::from(f32::from_le_bytes(raw))), 4)
        }
        FieldType::Double => {
            let raw = take::<8>(field_type, bytes)?;
            (Value::Double(f64::from_le_bytes(raw)), 8)
        }
        FieldType::Date => {
            let (parts, used) = temporal::decode_datetime(field_type, bytes)?;
            (Value::Temporal(Temporal::Date(parts)), used)
        }
        FieldType::DateTime | FieldType::Timestamp => {
            let (parts, used) = temporal::decode_datetime(field_type, bytes)?;
            (Value::Temporal(Temporal::DateTime(parts)), used)
        }
        FieldType::Time => {
            let (parts, used) = temporal::decode_time(bytes)?;
            (Value::Temporal(Temporal::Time(parts)), used)
        }
        FieldType::Decimal | FieldType::NewDecimal => {
            let text = std::str::from_utf8(bytes).map_err(|_| WireError::InvalidDecimalText)?;
            (Value::Decimal(text.to_owned()), bytes.len())
        }
        FieldType::VarChar
        | FieldType::Bit
        | FieldType::Json
        | FieldType::Enum
        | FieldType::Set
        | FieldType::TinyBlob
        | FieldType::MediumBlob
        | FieldType::LongBlob
        | FieldType::Blob
        | FieldType::VarString
        | FieldType::String
        | FieldType::Geometry => (Value::Bytes(Bytes::copy_from_slice(bytes)), bytes.len()),
    };
    Ok(decoded)
}

fn integer_in_range(field_type: FieldType, unsigned: bool, value: &Value) -> WireResult<i128> {
    let wide = match value {
        Value::Int(v) => i128::from(*v),
        Value::UInt(v) => i128::from(*v),
        other => {
            return Err(WireError::KindMismatch {
                field_type,
                kind: other.kind_name(),
            })
        }
    };
    let (min, max) = match (field_type, unsigned) {
        (FieldType::Tiny, false) => (i128::from(i8::MIN), i128::from(i8::MAX)),
        (FieldType::Tiny, true) => (0, i128::from(u8::MAX)),
        (FieldType::Short | FieldType::Year, false) => (i128::from(i16::MIN), i128::from(i16::MAX)),
        (FieldType::Short | FieldType::Year, true) => (0, i128::from(u16::MAX)),
        (FieldType::Long | FieldType::Int24, false) => (i128::from(i32::MIN), i128::from(i32::MAX)),
        (FieldType::Long | FieldType::Int24, true) => (0, i128::from(u32::MAX)),
        (_, false) => (i128::from(i64::MIN), i128::from(i64::MAX)),
        (_, true) => (0, i128::from(u64::MAX)),
    };
    if wide < min || wide > max {
        return Err(WireError::out_of_range(
            field_type,
            format!("{wide} not in [{min}, {max}]"),
        ));
    }
    Ok(wide)
}

/// Encodes `value` as `field_type` into `buf`.
///
/// Fails if the value kind does not match the type or does not fit its
/// width.
// Integer casts below follow a range check and cannot truncate.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn encode<B: BufMut>(
    field_type: FieldType,
    unsigned: bool,
    value: &Value,
    buf: &mut B,
) -> WireResult<()> {
    let mismatch = || WireError::KindMismatch {
        field_type,
        kind: value.kind_name(),
    };

    match field_type {
        FieldType::Null => {
            if !value.is_null() {
                return Err(mismatch());
            }
        }
        FieldType::Tiny => {
            let v = integer_in_range(field_type, unsigned, value)?;
            if unsigned {
                buf.put_u8(v as u8);
            } else {
                buf.put_i8(v as i8);
            }
        }
        FieldType::Short | FieldType::Year => {
            let v = integer_in_range(field_type, unsigned, value)?;
            if unsigned {
                buf.put_u16_le(v as u16);
            } else {
                buf.put_i16_le(v as i16);
            }
        }
        FieldType::Long | FieldType::Int24 => {
            let v = integer_in_range(field_type, unsigned, value)?;
            if unsigned {
                buf.put_u32_le(v as u32);
            } else {
                buf.put_i32_le(v as i32);
            }
        }
        FieldType::LongLong => {
            let v = integer_in_range(field_type, unsigned, value)?;
            if unsigned {
                buf.put_u64_le(v as u64);
            } else {
                buf.put_i64_le(v as i64);
            }
        }
        FieldType::Float => {
            let Value::Double(v) = value else {
                return Err(mismatch());
            };
            let narrow = *v as f32;
            if f64::from(narrow) != *v && !v.is_nan() {
                return Err(WireError::out_of_range(
                    field_type,
                    format!("{v} is not exactly representable as FLOAT"),
                ));
            }
            buf.put_f32_le(narrow);
        }
        FieldType::Double => {
            let Value::Double(v) = value else {
                return Err(mismatch());
            };
            buf.put_f64_le(*v);
        }
        FieldType::Date => match value {
            Value::Temporal(Temporal::Date(parts)) => {
                temporal::encode_datetime(field_type, parts, buf)?;
            }
            _ => return Err(mismatch()),
        },
        FieldType::DateTime | FieldType::Timestamp => match value {
            Value::Temporal(Temporal::DateTime(parts)) => {
                temporal::encode_datetime(field_type, parts, buf)?;
            }
            _ => return Err(mismatch()),
        },
        FieldType::Time => match value {
            Value::Temporal(Temporal::Time(parts)) => temporal::encode_time(parts, buf)?,
            _ => return Err(mismatch()),
        },
        FieldType::Decimal | FieldType::NewDecimal => match value {
            Value::Decimal(text) => buf.put_slice(text.as_bytes()),
            _ => return Err(mismatch()),
        },
        FieldType::VarChar
        | FieldType::Bit
        | FieldType::Json
        | FieldType::Enum
        | FieldType::Set
        | FieldType::TinyBlob
        | FieldType::MediumBlob
        | FieldType::LongBlob
        | FieldType::Blob
        | FieldType::VarString
        | FieldType::String
        | FieldType::Geometry => match value {
            Value::Bytes(bytes) => buf.put_slice(bytes),
            _ => return Err(mismatch()),
        },
    }
    Ok(())
}

/// Encodes `value` into a fresh buffer.
pub fn encode_to_bytes(field_type: FieldType, unsigned: bool, value: &Value) -> WireResult<Bytes> {
    let mut buf = BytesMut::new();
    encode(field_type, unsigned, value, &mut buf)?;
    Ok(buf.freeze())
}

/// Returns the wire type a value is sent as when no column type is known.
#[must_use]
pub fn natural_type(value: &Value) -> (FieldType, bool) {
    match value {
        Value::Null => (FieldType::Null, false),
        Value::Int(_) => (FieldType::LongLong, false),
        Value::UInt(_) => (FieldType::LongLong, true),
        Value::Double(_) => (FieldType::Double, false),
        Value::Decimal(_) => (FieldType::NewDecimal, false),
        Value::Temporal(Temporal::Date(_)) => (FieldType::Date, false),
        Value::Temporal(Temporal::DateTime(_)) => (FieldType::DateTime, false),
        Value::Temporal(Temporal::Time(_)) => (FieldType::Time, false),
        Value::Bytes(_) => (FieldType::VarString, false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::temporal::{DateTimeParts, TimeParts};
    use proptest::prelude::*;

    #[test]
    fn test_decode_fixed_width_consumes_exactly() {
        let bytes = [7, 0, 0, 0, 0xAA, 0xBB];
        let (value, used) = decode(FieldType::Long, false, &bytes).unwrap();
        assert_eq!(value, Value::Int(7));
        assert_eq!(used, 4);
    }

    #[test]
    fn test_decode_signedness() {
        let (signed, _) = decode(FieldType::Tiny, false, &[0xFF]).unwrap();
        let (unsigned, _) = decode(FieldType::Tiny, true, &[0xFF]).unwrap();
        assert_eq!(signed, Value::Int(-1));
        assert_eq!(unsigned, Value::UInt(255));
    }

    #[test]
    fn test_decode_truncated() {
        let err = decode(FieldType::LongLong, false, &[1, 2, 3]).unwrap_err();
        assert_eq!(
            err,
            WireError::Truncated {
                field_type: FieldType::LongLong,
                needed: 8,
                available: 3
            }
        );
    }

    #[test]
    fn test_decode_decimal_consumes_span() {
        let (value, used) = decode(FieldType::NewDecimal, false, b"-12.500").unwrap();
        assert_eq!(value, Value::Decimal("-12.500".into()));
        assert_eq!(used, 7);
        assert_eq!(
            decode(FieldType::NewDecimal, false, &[0xFF, 0xFE]).unwrap_err(),
            WireError::InvalidDecimalText
        );
    }

    #[test]
    fn test_decode_string_consumes_span() {
        let (value, used) = decode(FieldType::VarString, false, b"hello").unwrap();
        assert_eq!(value, Value::text("hello"));
        assert_eq!(used, 5);
        let (empty, used) = decode(FieldType::Blob, false, b"").unwrap();
        assert_eq!(empty, Value::text(""));
        assert_eq!(used, 0);
    }

    #[test]
    fn test_decode_null() {
        assert_eq!(decode(FieldType::Null, false, &[]).unwrap(), (Value::Null, 0));
    }

    #[test]
    fn test_encode_out_of_range() {
        let err = encode_to_bytes(FieldType::Tiny, false, &Value::Int(300)).unwrap_err();
        assert!(matches!(err, WireError::OutOfRange { .. }));
        let err = encode_to_bytes(FieldType::Short, true, &Value::Int(-1)).unwrap_err();
        assert!(matches!(err, WireError::OutOfRange { .. }));
    }

    #[test]
    fn test_encode_kind_mismatch() {
        let err = encode_to_bytes(FieldType::Long, false, &Value::text("7")).unwrap_err();
        assert_eq!(
            err,
            WireError::KindMismatch {
                field_type: FieldType::Long,
                kind: "bytes"
            }
        );
        assert!(encode_to_bytes(FieldType::Null, false, &Value::Int(1)).is_err());
    }

    #[test]
    fn test_encode_float_precision() {
        assert!(encode_to_bytes(FieldType::Float, false, &Value::Double(0.5)).is_ok());
        assert!(encode_to_bytes(FieldType::Float, false, &Value::Double(0.1)).is_err());
    }

    #[test]
    fn test_natural_type() {
        assert_eq!(natural_type(&Value::UInt(1)), (FieldType::LongLong, true));
        assert_eq!(natural_type(&Value::text("a")), (FieldType::VarString, false));
    }

    fn integer_case() -> impl Strategy<Value = (FieldType, bool, Value)> {
        prop_oneof![
            any::<i8>().prop_map(|v| (FieldType::Tiny, false, Value::Int(i64::from(v)))),
            any::<u8>().prop_map(|v| (FieldType::Tiny, true, Value::UInt(u64::from(v)))),
            any::<i16>().prop_map(|v| (FieldType::Short, false, Value::Int(i64::from(v)))),
            any::<u16>().prop_map(|v| (FieldType::Year, true, Value::UInt(u64::from(v)))),
            any::<i32>().prop_map(|v| (FieldType::Long, false, Value::Int(i64::from(v)))),
            any::<u32>().prop_map(|v| (FieldType::Int24, true, Value::UInt(u64::from(v)))),
            any::<i64>().prop_map(|v| (FieldType::LongLong, false, Value::Int(v))),
            any::<u64>().prop_map(|v| (FieldType::LongLong, true, Value::UInt(v))),
        ]
    }

    fn float_case() -> impl Strategy<Value = (FieldType, bool, Value)> {
        prop_oneof![
            any::<f32>()
                .prop_filter("not NaN", |v| !v.is_nan())
                .prop_map(|v| (FieldType::Float, false, Value::Double(f64::from(v)))),
            any::<f64>()
                .prop_filter("not NaN", |v| !v.is_nan())
                .prop_map(|v| (FieldType::Double, false, Value::Double(v))),
        ]
    }

    fn text_case() -> impl Strategy<Value = (FieldType, bool, Value)> {
        prop_oneof![
            "-?[0-9]{1,30}(\\.[0-9]{1,10})?"
                .prop_map(|s| (FieldType::NewDecimal, false, Value::Decimal(s))),
            prop::collection::vec(any::<u8>(), 0..64)
                .prop_map(|b| (FieldType::Blob, false, Value::Bytes(Bytes::from(b)))),
            "[a-z0-9 ]{0,32}".prop_map(|s| (FieldType::VarString, false, Value::text(&s))),
        ]
    }

    fn datetime_parts() -> impl Strategy<Value = DateTimeParts> {
        (
            0u16..=9999,
            0u8..=12,
            0u8..=31,
            0u8..=23,
            0u8..=59,
            0u8..=59,
            0u32..=999_999,
            prop::option::of(-840i16..=840),
        )
            .prop_map(
                |(year, month, day, hour, minute, second, micros, offset_minutes)| DateTimeParts {
                    year,
                    month,
                    day,
                    hour,
                    minute,
                    second,
                    micros,
                    offset_minutes,
                },
            )
    }

    fn temporal_case() -> impl Strategy<Value = (FieldType, bool, Value)> {
        let time = (
            any::<bool>(),
            0u32..=34,
            0u8..=23,
            0u8..=59,
            0u8..=59,
            0u32..=999_999,
        )
            .prop_map(|(negative, days, hour, minute, second, micros)| TimeParts {
                negative,
                days,
                hour,
                minute,
                second,
                micros,
            });
        prop_oneof![
            datetime_parts()
                .prop_map(|p| (FieldType::Date, false, Value::Temporal(Temporal::Date(p)))),
            datetime_parts().prop_map(|p| (
                FieldType::Timestamp,
                false,
                Value::Temporal(Temporal::DateTime(p))
            )),
            time.prop_map(|t| (FieldType::Time, false, Value::Temporal(Temporal::Time(t)))),
        ]
    }

    proptest! {
        #[test]
        fn prop_roundtrip(
            (field_type, unsigned, value) in prop_oneof![
                integer_case(),
                float_case(),
                text_case(),
                temporal_case(),
            ]
        ) {
            let encoded = encode_to_bytes(field_type, unsigned, &value).unwrap();
            let (decoded, used) = decode(field_type, unsigned, &encoded).unwrap();
            prop_assert_eq!(decoded, value);
            prop_assert_eq!(used, encoded.len());
        }

        #[test]
        fn prop_decode_never_overreads(
            code in prop::sample::select(vec![1u8, 2, 3, 4, 5, 7, 8, 9, 10, 11, 12, 13]),
            bytes in prop::collection::vec(any::<u8>(), 0..16),
        ) {
            let field_type = FieldType::from_u8(code).unwrap();
            if let Ok((_, used)) = decode(field_type, false, &bytes) {
                prop_assert!(used <= bytes.len());
            }
        }
    }
}
