//! Value conversion and comparison for the mock executor.

use std::cmp::Ordering;
use std::fmt;

use nexus_stmt::param::NumericParse;
use nexus_stmt::{InvokeError, InvokeErrorKind, SqlType};
use nexus_wire::Value;

/// Exact decimal number: `mantissa / 10^scale`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Num {
    mantissa: i128,
    scale: u32,
}

impl Num {
    /// Parses normalized numeric text such as `-12.50`.
    pub fn parse(text: &str) -> Option<Self> {
        let (negative, digits) = match text.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, text),
        };
        let (int, frac) = digits.split_once('.').unwrap_or((digits, ""));
        if int.is_empty() || int.len() + frac.len() > 38 {
            return None;
        }
        let mut mantissa: i128 = 0;
        for d in int.bytes().chain(frac.bytes()) {
            if !d.is_ascii_digit() {
                return None;
            }
            mantissa = mantissa * 10 + i128::from(d - b'0');
        }
        let scale = u32::try_from(frac.len()).ok()?;
        Some(Self {
            mantissa: if negative { -mantissa } else { mantissa },
            scale,
        })
    }

    /// Reads any numeric or string value. Strings are read up to the first
    /// character that cannot continue a number.
    pub fn from_value(value: &Value) -> Option<Self> {
        let lenient = |raw: &[u8]| Self::parse(&NumericParse::parse(raw, false).text);
        match value {
            Value::Int(v) => Some(Self::integer(i128::from(*v))),
            Value::UInt(v) => Some(Self::integer(i128::from(*v))),
            Value::Double(v) => lenient(format!("{v:.6}").as_bytes()),
            Value::Decimal(text) => lenient(text.as_bytes()),
            Value::Bytes(raw) => lenient(raw),
            Value::Null | Value::Temporal(_) => None,
        }
    }

    const fn integer(mantissa: i128) -> Self {
        Self { mantissa, scale: 0 }
    }

    fn rescaled(self, scale: u32) -> Option<i128> {
        let factor = 10i128.checked_pow(scale.checked_sub(self.scale)?)?;
        self.mantissa.checked_mul(factor)
    }

    /// Integer part, truncated toward zero.
    pub fn trunc(self) -> i128 {
        self.mantissa / 10i128.pow(self.scale)
    }

    #[allow(clippy::cast_precision_loss)]
    fn as_f64(self) -> f64 {
        self.mantissa as f64 / 10f64.powi(i32::try_from(self.scale).unwrap_or(i32::MAX))
    }
}

impl PartialOrd for Num {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        let scale = self.scale.max(other.scale);
        match (self.rescaled(scale), other.rescaled(scale)) {
            (Some(a), Some(b)) => Some(a.cmp(&b)),
            _ => self.as_f64().partial_cmp(&other.as_f64()),
        }
    }
}

impl fmt::Display for Num {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.scale == 0 {
            return write!(f, "{}", self.mantissa);
        }
        let sign = if self.mantissa < 0 { "-" } else { "" };
        let scale = self.scale as usize;
        let digits = format!("{:0>width$}", self.mantissa.unsigned_abs(), width = scale + 1);
        let (int, frac) = digits.split_at(digits.len() - scale);
        write!(f, "{sign}{int}.{frac}")
    }
}

fn data_error(message: String) -> InvokeError {
    InvokeError::new(InvokeErrorKind::Data, message)
}

/// Converts a value to the representation of `to`. Out-of-range integers
/// saturate.
pub fn coerce(value: &Value, to: SqlType) -> Result<Value, InvokeError> {
    if value.is_null() {
        return Ok(Value::Null);
    }
    let numeric = || {
        Num::from_value(value)
            .ok_or_else(|| data_error(format!("cannot convert {} to {to}", value.kind_name())))
    };
    let converted = match to {
        SqlType::Integer { unsigned: true } | SqlType::Bit => {
            let n = numeric()?.trunc().clamp(0, i128::from(u64::MAX));
            Value::UInt(u64::try_from(n).unwrap_or(u64::MAX))
        }
        SqlType::Integer { unsigned: false } | SqlType::Bool | SqlType::Year => {
            let n = numeric()?
                .trunc()
                .clamp(i128::from(i64::MIN), i128::from(i64::MAX));
            Value::Int(i64::try_from(n).unwrap_or(i64::MAX))
        }
        SqlType::Decimal => Value::Decimal(numeric()?.to_string()),
        SqlType::Float => match value {
            Value::Double(v) => Value::Double(*v),
            _ => Value::Double(numeric()?.as_f64()),
        },
        SqlType::String | SqlType::Blob => match value {
            Value::Bytes(_) => value.clone(),
            other => Value::text(&other.to_string()),
        },
        SqlType::Date | SqlType::Time | SqlType::DateTime => match value {
            Value::Temporal(_) => value.clone(),
            other => {
                return Err(data_error(format!(
                    "cannot convert {} to {to}",
                    other.kind_name()
                )))
            }
        },
    };
    Ok(converted)
}

fn is_number(value: &Value) -> bool {
    matches!(
        value,
        Value::Int(_) | Value::UInt(_) | Value::Double(_) | Value::Decimal(_)
    )
}

/// Compares two values. NULL compares as unknown.
pub fn compare(lhs: &Value, rhs: &Value) -> Option<Ordering> {
    if lhs.is_null() || rhs.is_null() {
        return None;
    }
    if is_number(lhs) || is_number(rhs) {
        return Num::from_value(lhs)?.partial_cmp(&Num::from_value(rhs)?);
    }
    match (lhs, rhs) {
        (Value::Bytes(a), Value::Bytes(b)) => Some(a.cmp(b)),
        _ => Some(lhs.to_string().cmp(&rhs.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn test_compare_matches_integer_order(a: i64, b: i64) {
            let decimal = Value::Decimal(b.to_string());
            prop_assert_eq!(compare(&Value::Int(a), &decimal), Some(a.cmp(&b)));
            prop_assert_eq!(coerce(&decimal, SqlType::BIGINT).unwrap(), Value::Int(b));
        }
    }

    #[test]
    fn test_num_parse_and_display() {
        assert_eq!(Num::parse("-12.50").unwrap().to_string(), "-12.50");
        assert_eq!(Num::parse("0.05").unwrap().to_string(), "0.05");
        assert_eq!(
            Num::parse("99999999999999999999").unwrap().trunc(),
            99_999_999_999_999_999_999
        );
        assert!(Num::parse("1e5").is_none());
        assert!(Num::parse("").is_none());
    }

    #[test]
    fn test_decimal_compare_beyond_i64() {
        let big = Value::Decimal("99999999999999999999".into());
        assert_eq!(compare(&Value::Int(i64::MAX), &big), Some(Ordering::Less));
        assert_eq!(
            compare(&Value::Int(7), &Value::Decimal("7.0".into())),
            Some(Ordering::Equal)
        );
    }

    #[test]
    fn test_coerce_saturates() {
        let big = Value::text("99999999999999999999");
        assert_eq!(coerce(&big, SqlType::BIGINT).unwrap(), Value::Int(i64::MAX));
        assert_eq!(
            coerce(&big, SqlType::Decimal).unwrap(),
            Value::Decimal("99999999999999999999".into())
        );
        assert_eq!(coerce(&Value::text("7"), SqlType::BIGINT).unwrap(), Value::Int(7));
        assert_eq!(coerce(&Value::Int(7), SqlType::String).unwrap(), Value::text("7"));
        assert_eq!(coerce(&Value::Null, SqlType::BIGINT).unwrap(), Value::Null);
    }

    #[test]
    fn test_compare_strings_and_nulls() {
        assert_eq!(
            compare(&Value::text("a"), &Value::text("b")),
            Some(Ordering::Less)
        );
        assert_eq!(compare(&Value::Null, &Value::Int(1)), None);
    }
}
