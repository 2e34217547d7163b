//! Numeric reading of string parameters.
//!
//! A string bound to a numeric placeholder is read greedily: optional
//! whitespace, an optional sign, digits, an optional fraction. Exponents
//! are not recognised. Anything left over marks the read as truncated.

use crate::types::ActualKind;

/// Numeric family of a parsed literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericKind {
    /// Fits a 64-bit integer.
    Integer {
        /// Unsigned flag.
        unsigned: bool,
    },
    /// Has a fraction or exceeds 64 bits.
    Decimal,
}

/// Result of reading a string as a number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NumericParse {
    /// Numeric family.
    pub kind: NumericKind,
    /// The integer part does not fit any 64-bit integer.
    pub out_of_range: bool,
    /// Input had no digits or had trailing characters.
    pub truncated: bool,
    /// Normalised numeric prefix, e.g. `-12.50` or `0`.
    pub text: String,
}

impl NumericParse {
    /// Reads `input` as a number.
    ///
    /// Non-negative integers up to `i64::MAX` take the sign preference of
    /// the declared type. Larger values up to `u64::MAX` are unsigned.
    #[must_use]
    pub fn parse(input: &[u8], prefer_unsigned: bool) -> Self {
        let mut pos = skip_space(input, 0);
        let mut negative = false;
        match input.get(pos) {
            Some(b'-') => {
                negative = true;
                pos += 1;
            }
            Some(b'+') => pos += 1,
            _ => {}
        }

        let int_end = skip_digits(input, pos);
        let int_digits = &input[pos..int_end];
        pos = int_end;

        let mut frac_digits: &[u8] = &[];
        if input.get(pos) == Some(&b'.') {
            let frac_end = skip_digits(input, pos + 1);
            if frac_end > pos + 1 || !int_digits.is_empty() {
                frac_digits = &input[pos + 1..frac_end];
                pos = frac_end;
            }
        }

        if int_digits.is_empty() && frac_digits.is_empty() {
            return Self {
                kind: NumericKind::Integer { unsigned: false },
                out_of_range: false,
                truncated: true,
                text: "0".to_string(),
            };
        }

        let truncated = skip_space(input, pos) < input.len();
        let significant = strip_leading_zeros(int_digits);
        let magnitude = parse_magnitude(significant);
        let out_of_range = match magnitude {
            None => true,
            Some(m) if negative => m > u128::from(i64::MIN.unsigned_abs()),
            Some(m) => m > u128::from(u64::MAX),
        };
        let is_zero = magnitude == Some(0) && frac_digits.iter().all(|&d| d == b'0');
        let negative = negative && !is_zero;

        let kind = if !frac_digits.is_empty() || out_of_range {
            NumericKind::Decimal
        } else if negative {
            NumericKind::Integer { unsigned: false }
        } else if magnitude.is_some_and(|m| m <= u128::from(i64::MAX.unsigned_abs())) {
            NumericKind::Integer {
                unsigned: prefer_unsigned,
            }
        } else {
            NumericKind::Integer { unsigned: true }
        };

        let mut text = String::with_capacity(significant.len() + frac_digits.len() + 3);
        if negative {
            text.push('-');
        }
        if significant.is_empty() {
            text.push('0');
        } else {
            text.push_str(&String::from_utf8_lossy(significant));
        }
        if !frac_digits.is_empty() {
            text.push('.');
            text.push_str(&String::from_utf8_lossy(frac_digits));
        }

        Self {
            kind,
            out_of_range,
            truncated,
            text,
        }
    }

    /// Returns true if the whole input was a number.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        !self.truncated
    }

    /// Actual kind of the number.
    #[must_use]
    pub fn actual_kind(&self) -> ActualKind {
        match self.kind {
            NumericKind::Integer { unsigned } => ActualKind::Integer { unsigned },
            NumericKind::Decimal => ActualKind::Decimal,
        }
    }
}

fn skip_space(input: &[u8], mut pos: usize) -> usize {
    while input.get(pos).is_some_and(u8::is_ascii_whitespace) {
        pos += 1;
    }
    pos
}

fn skip_digits(input: &[u8], mut pos: usize) -> usize {
    while input.get(pos).is_some_and(u8::is_ascii_digit) {
        pos += 1;
    }
    pos
}

fn strip_leading_zeros(digits: &[u8]) -> &[u8] {
    let start = digits.iter().position(|&d| d != b'0').unwrap_or(digits.len());
    &digits[start..]
}

/// Magnitude of a digit run, or `None` past 38 digits.
fn parse_magnitude(digits: &[u8]) -> Option<u128> {
    if digits.len() > 38 {
        return None;
    }
    Some(
        digits
            .iter()
            .fold(0u128, |acc, &d| acc * 10 + u128::from(d - b'0')),
    )
}
