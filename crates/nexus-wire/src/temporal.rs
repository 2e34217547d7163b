//! Temporal values and their binary layout.
//!
//! DATE, DATETIME and TIMESTAMP share one layout selected by a leading
//! length byte:
//!
//! ```text
//! len  0: (nothing)                       all fields zero
//! len  4: year:u16 month:u8 day:u8
//! len  7: ... hour:u8 minute:u8 second:u8
//! len 11: ... micros:u32
//! len 13: ... offset_minutes:i16
//! ```
//!
//! TIME uses its own layout:
//!
//! ```text
//! len  0: (nothing)                       zero duration
//! len  8: negative:u8 days:u32 hour:u8 minute:u8 second:u8
//! len 12: ... micros:u32
//! ```
//!
//! Encoding always picks the shortest length that keeps every non-zero
//! field, so decoding an encoded value yields the same value.

use std::fmt;

use bytes::{Buf, BufMut};

use crate::error::{WireError, WireResult};
use crate::types::FieldType;

/// Calendar date with optional time of day, fraction and zone offset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DateTimeParts {
    /// Year (0-9999).
    pub year: u16,
    /// Month (0-12, 0 for zero dates).
    pub month: u8,
    /// Day of month (0-31).
    pub day: u8,
    /// Hour (0-23).
    pub hour: u8,
    /// Minute (0-59).
    pub minute: u8,
    /// Second (0-59).
    pub second: u8,
    /// Microseconds (0-999999).
    pub micros: u32,
    /// Zone offset in minutes, when present.
    pub offset_minutes: Option<i16>,
}

impl DateTimeParts {
    /// Creates a date with a zero time of day.
    #[must_use]
    pub const fn date(year: u16, month: u8, day: u8) -> Self {
        Self {
            year,
            month,
            day,
            hour: 0,
            minute: 0,
            second: 0,
            micros: 0,
            offset_minutes: None,
        }
    }

    /// Creates a date and time of day.
    #[must_use]
    pub const fn datetime(year: u16, month: u8, day: u8, hour: u8, minute: u8, second: u8) -> Self {
        Self {
            year,
            month,
            day,
            hour,
            minute,
            second,
            micros: 0,
            offset_minutes: None,
        }
    }

    /// Sets the fractional part.
    #[must_use]
    pub const fn with_micros(mut self, micros: u32) -> Self {
        self.micros = micros;
        self
    }

    /// Sets the zone offset.
    #[must_use]
    pub const fn with_offset(mut self, minutes: i16) -> Self {
        self.offset_minutes = Some(minutes);
        self
    }

    /// Returns the shortest length code that preserves every field.
    #[must_use]
    pub fn encoded_len(&self) -> u8 {
        if self.offset_minutes.is_some() {
            13
        } else if self.micros != 0 {
            11
        } else if self.hour != 0 || self.minute != 0 || self.second != 0 {
            7
        } else if self.year != 0 || self.month != 0 || self.day != 0 {
            4
        } else {
            0
        }
    }

    fn validate(&self, field_type: FieldType) -> WireResult<()> {
        let checks: [(&'static str, u32, u32); 6] = [
            ("month", u32::from(self.month), 12),
            ("day", u32::from(self.day), 31),
            ("hour", u32::from(self.hour), 23),
            ("minute", u32::from(self.minute), 59),
            ("second", u32::from(self.second), 59),
            ("microsecond", self.micros, 999_999),
        ];
        for (field, value, max) in checks {
            if value > max {
                return Err(WireError::InvalidTemporal {
                    field_type,
                    field,
                    value,
                });
            }
        }
        Ok(())
    }
}

impl fmt::Display for DateTimeParts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
            self.year, self.month, self.day, self.hour, self.minute, self.second
        )?;
        if self.micros != 0 {
            write!(f, ".{:06}", self.micros)?;
        }
        if let Some(offset) = self.offset_minutes {
            let sign = if offset < 0 { '-' } else { '+' };
            let abs = offset.unsigned_abs();
            write!(f, "{}{:02}:{:02}", sign, abs / 60, abs % 60)?;
        }
        Ok(())
    }
}

/// Signed time duration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeParts {
    /// True for negative durations.
    pub negative: bool,
    /// Whole days.
    pub days: u32,
    /// Hour (0-23).
    pub hour: u8,
    /// Minute (0-59).
    pub minute: u8,
    /// Second (0-59).
    pub second: u8,
    /// Microseconds (0-999999).
    pub micros: u32,
}

impl TimeParts {
    /// Creates a positive duration below one day.
    #[must_use]
    pub const fn new(hour: u8, minute: u8, second: u8) -> Self {
        Self {
            negative: false,
            days: 0,
            hour,
            minute,
            second,
            micros: 0,
        }
    }

    /// Returns the shortest length code that preserves every field.
    #[must_use]
    pub fn encoded_len(&self) -> u8 {
        if self.micros != 0 {
            12
        } else if self.negative
            || self.days != 0
            || self.hour != 0
            || self.minute != 0
            || self.second != 0
        {
            8
        } else {
            0
        }
    }

    fn validate(&self) -> WireResult<()> {
        let checks: [(&'static str, u32, u32); 4] = [
            ("hour", u32::from(self.hour), 23),
            ("minute", u32::from(self.minute), 59),
            ("second", u32::from(self.second), 59),
            ("microsecond", self.micros, 999_999),
        ];
        for (field, value, max) in checks {
            if value > max {
                return Err(WireError::InvalidTemporal {
                    field_type: FieldType::Time,
                    field,
                    value,
                });
            }
        }
        Ok(())
    }
}

impl fmt::Display for TimeParts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hours = u64::from(self.days) * 24 + u64::from(self.hour);
        if self.negative {
            write!(f, "-")?;
        }
        write!(f, "{:02}:{:02}:{:02}", hours, self.minute, self.second)?;
        if self.micros != 0 {
            write!(f, ".{:06}", self.micros)?;
        }
        Ok(())
    }
}

/// A decoded temporal value, tagged with the wire type family it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Temporal {
    /// DATE.
    Date(DateTimeParts),
    /// DATETIME or TIMESTAMP.
    DateTime(DateTimeParts),
    /// TIME.
    Time(TimeParts),
}

impl fmt::Display for Temporal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Date(d) => write!(f, "{:04}-{:02}-{:02}", d.year, d.month, d.day),
            Self::DateTime(dt) => write!(f, "{dt}"),
            Self::Time(t) => write!(f, "{t}"),
        }
    }
}

fn ensure(field_type: FieldType, bytes: &[u8], needed: usize) -> WireResult<()> {
    if bytes.len() < needed {
        return Err(WireError::Truncated {
            field_type,
            needed,
            available: bytes.len(),
        });
    }
    Ok(())
}

/// Decodes a DATE/DATETIME/TIMESTAMP value. Returns the parts and the
/// number of bytes consumed, including the length byte.
pub(crate) fn decode_datetime(
    field_type: FieldType,
    bytes: &[u8],
) -> WireResult<(DateTimeParts, usize)> {
    ensure(field_type, bytes, 1)?;
    let length = bytes[0];
    if !matches!(length, 0 | 4 | 7 | 11 | 13) {
        return Err(WireError::InvalidLength { field_type, length });
    }
    let total = 1 + usize::from(length);
    ensure(field_type, bytes, total)?;

    let mut buf = &bytes[1..total];
    let mut parts = DateTimeParts::default();
    if length >= 4 {
        parts.year = buf.get_u16_le();
        parts.month = buf.get_u8();
        parts.day = buf.get_u8();
    }
    if length >= 7 {
        parts.hour = buf.get_u8();
        parts.minute = buf.get_u8();
        parts.second = buf.get_u8();
    }
    if length >= 11 {
        parts.micros = buf.get_u32_le();
    }
    if length == 13 {
        parts.offset_minutes = Some(buf.get_i16_le());
    }
    parts.validate(field_type)?;
    Ok((parts, total))
}

/// Encodes a DATE/DATETIME/TIMESTAMP value with its length byte.
pub(crate) fn encode_datetime<B: BufMut>(
    field_type: FieldType,
    parts: &DateTimeParts,
    buf: &mut B,
) -> WireResult<()> {
    parts.validate(field_type)?;
    let length = parts.encoded_len();
    buf.put_u8(length);
    if length >= 4 {
        buf.put_u16_le(parts.year);
        buf.put_u8(parts.month);
        buf.put_u8(parts.day);
    }
    if length >= 7 {
        buf.put_u8(parts.hour);
        buf.put_u8(parts.minute);
        buf.put_u8(parts.second);
    }
    if length >= 11 {
        buf.put_u32_le(parts.micros);
    }
    if let Some(offset) = parts.offset_minutes {
        buf.put_i16_le(offset);
    }
    Ok(())
}

/// Decodes a TIME value. Returns the parts and the bytes consumed.
pub(crate) fn decode_time(bytes: &[u8]) -> WireResult<(TimeParts, usize)> {
    let field_type = FieldType::Time;
    ensure(field_type, bytes, 1)?;
    let length = bytes[0];
    if !matches!(length, 0 | 8 | 12) {
        return Err(WireError::InvalidLength { field_type, length });
    }
    let total = 1 + usize::from(length);
    ensure(field_type, bytes, total)?;

    let mut buf = &bytes[1..total];
    let mut parts = TimeParts::default();
    if length >= 8 {
        parts.negative = buf.get_u8() != 0;
        parts.days = buf.get_u32_le();
        parts.hour = buf.get_u8();
        parts.minute = buf.get_u8();
        parts.second = buf.get_u8();
    }
    if length == 12 {
        parts.micros = buf.get_u32_le();
    }
    parts.validate()?;
    Ok((parts, total))
}

/// Encodes a TIME value with its length byte.
pub(crate) fn encode_time<B: BufMut>(parts: &TimeParts, buf: &mut B) -> WireResult<()> {
    parts.validate()?;
    let length = parts.encoded_len();
    buf.put_u8(length);
    if length >= 8 {
        buf.put_u8(u8::from(parts.negative));
        buf.put_u32_le(parts.days);
        buf.put_u8(parts.hour);
        buf.put_u8(parts.minute);
        buf.put_u8(parts.second);
    }
    if length == 12 {
        buf.put_u32_le(parts.micros);
    }
    Ok(())
}
