//! # Resource Quantities
//!
//! Parsing and exact comparison of resource-quantity strings such as
//! `100m`, `0.5`, `2Gi`, `1.5k` or `12e-3`.
//!
//! ## Grammar
//!
//! ```text
//! quantity := sign? number suffix?
//! sign     := '+' | '-'
//! number   := digits | digits '.' digits? | '.' digits
//! suffix   := 'n' | 'u' | 'm' | 'k' | 'M' | 'G' | 'T' | 'P' | 'E'      (powers of ten)
//!           | 'Ki' | 'Mi' | 'Gi' | 'Ti' | 'Pi' | 'Ei'                  (powers of 1024)
//!           | ('e' | 'E') sign? digits                                (decimal exponent)
//! ```
//!
//! ## Canonical Form
//!
//! Every quantity is reduced to `sign * mantissa * 10^exponent` where the
//! mantissa carries no trailing zeros. Two quantities are numerically equal
//! exactly when their canonical forms are equal, so `100m`, `0.1` and `1e-1`
//! all produce the same [`QuantityValue`]. Comparison never goes through
//! floating point: `1Gi` (1073741824) is strictly greater than `1000Mi`
//! (1048576000).

use std::cmp::Ordering;
use std::fmt;

use serde_json::Value;

use crate::error::QuantityError;

/// Largest accepted magnitude of the decimal exponent.
const MAX_EXPONENT: i64 = 1024;

/// A scalar that may denote a quantity, tagged by the representation it
/// arrived in.
#[derive(Debug, Clone, PartialEq)]
pub enum QuantityInput {
    /// A native integer.
    Integer(i128),
    /// A native floating-point number.
    Decimal(f64),
    /// A numeric or suffixed string.
    Text(String),
}

impl QuantityInput {
    /// Classify a JSON value. Returns `None` for values that can never be
    /// quantities: objects, arrays, booleans and null.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Some(Self::Integer(i128::from(i)))
                } else if let Some(u) = n.as_u64() {
                    Some(Self::Integer(i128::from(u)))
                } else {
                    n.as_f64().map(Self::Decimal)
                }
            }
            Value::String(s) => Some(Self::Text(s.clone())),
            Value::Null | Value::Bool(_) | Value::Array(_) | Value::Object(_) => None,
        }
    }

    /// Parse into canonical form.
    pub fn parse(&self) -> Result<QuantityValue, QuantityError> {
        match self {
            Self::Integer(i) => {
                let magnitude = i.unsigned_abs();
                Ok(QuantityValue::new(*i < 0, magnitude, 0))
            }
            Self::Decimal(f) => {
                if !f.is_finite() {
                    return Err(QuantityError::NotFinite(*f));
                }
                // f64's Display never uses exponent notation.
                parse_quantity(&f.to_string())
            }
            Self::Text(s) => parse_quantity(s),
        }
    }
}

impl From<&str> for QuantityInput {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for QuantityInput {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<i64> for QuantityInput {
    fn from(i: i64) -> Self {
        Self::Integer(i128::from(i))
    }
}

impl From<f64> for QuantityInput {
    fn from(f: f64) -> Self {
        Self::Decimal(f)
    }
}

/// A quantity in canonical decimal form: `(-1)^negative * mantissa * 10^exponent`.
///
/// # Invariants
///
/// - `mantissa` has no trailing decimal zeros.
/// - Zero is stored as `negative = false, mantissa = 0, exponent = 0`.
///
/// Equality and hashing are therefore numeric equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QuantityValue {
    negative: bool,
    mantissa: u128,
    exponent: i64,
}

impl QuantityValue {
    fn new(negative: bool, mut mantissa: u128, mut exponent: i64) -> Self {
        if mantissa == 0 {
            return Self {
                negative: false,
                mantissa: 0,
                exponent: 0,
            };
        }
        while mantissa % 10 == 0 {
            mantissa /= 10;
            exponent += 1;
        }
        Self {
            negative,
            mantissa,
            exponent,
        }
    }

    fn signum(&self) -> i8 {
        if self.mantissa == 0 {
            0
        } else if self.negative {
            -1
        } else {
            1
        }
    }

    /// Compare absolute values.
    fn cmp_magnitude(&self, other: &Self) -> Ordering {
        let a = self.mantissa.to_string();
        let b = other.mantissa.to_string();
        // Position of the leading digit; decides unless both lead at the same place.
        let lead_a = self.exponent + a.len() as i64;
        let lead_b = other.exponent + b.len() as i64;
        match lead_a.cmp(&lead_b) {
            // Neither digit string ends in '0', so a strict prefix is strictly smaller.
            Ordering::Equal => a.as_bytes().cmp(b.as_bytes()),
            unequal => unequal,
        }
    }
}

impl Ord for QuantityValue {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.signum().cmp(&other.signum()) {
            Ordering::Equal => {}
            unequal => return unequal,
        }
        match self.signum() {
            0 => Ordering::Equal,
            1 => self.cmp_magnitude(other),
            _ => self.cmp_magnitude(other).reverse(),
        }
    }
}

impl PartialOrd for QuantityValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for QuantityValue {
    /// Renders the canonical decimal string, e.g. `0.1`, `1073741824`, `-2.5`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.mantissa == 0 {
            return f.write_str("0");
        }
        if self.negative {
            f.write_str("-")?;
        }
        let digits = self.mantissa.to_string();
        if self.exponent >= 0 {
            f.write_str(&digits)?;
            for _ in 0..self.exponent {
                f.write_str("0")?;
            }
            return Ok(());
        }
        let point = digits.len() as i64 + self.exponent;
        if point > 0 {
            let (int_part, frac_part) = digits.split_at(point as usize);
            write!(f, "{int_part}.{frac_part}")
        } else {
            f.write_str("0.")?;
            for _ in 0..(-point) {
                f.write_str("0")?;
            }
            f.write_str(&digits)
        }
    }
}

impl std::str::FromStr for QuantityValue {
    type Err = QuantityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_quantity(s)
    }
}

/// Multiplier denoted by a suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scale {
    /// `10^n`
    Decimal(i64),
    /// `2^n`
    Binary(u32),
}

fn parse_suffix(input: &str, suffix: &str) -> Result<Scale, QuantityError> {
    let scale = match suffix {
        "" => Scale::Decimal(0),
        "n" => Scale::Decimal(-9),
        "u" => Scale::Decimal(-6),
        "m" => Scale::Decimal(-3),
        "k" => Scale::Decimal(3),
        "M" => Scale::Decimal(6),
        "G" => Scale::Decimal(9),
        "T" => Scale::Decimal(12),
        "P" => Scale::Decimal(15),
        "E" => Scale::Decimal(18),
        "Ki" => Scale::Binary(10),
        "Mi" => Scale::Binary(20),
        "Gi" => Scale::Binary(30),
        "Ti" => Scale::Binary(40),
        "Pi" => Scale::Binary(50),
        "Ei" => Scale::Binary(60),
        _ => return parse_exponent(input, suffix).map(Scale::Decimal),
    };
    Ok(scale)
}

/// Parse an `e<int>` / `E<int>` exponent suffix.
fn parse_exponent(input: &str, suffix: &str) -> Result<i64, QuantityError> {
    let unknown = || QuantityError::UnknownSuffix {
        input: input.to_string(),
        suffix: suffix.to_string(),
    };
    let rest = suffix
        .strip_prefix('e')
        .or_else(|| suffix.strip_prefix('E'))
        .ok_or_else(unknown)?;
    let digits = rest
        .strip_prefix('-')
        .or_else(|| rest.strip_prefix('+'))
        .unwrap_or(rest);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(unknown());
    }
    let exponent: i64 = rest
        .parse()
        .map_err(|_| QuantityError::OutOfRange(input.to_string()))?;
    if exponent.abs() > MAX_EXPONENT {
        return Err(QuantityError::OutOfRange(input.to_string()));
    }
    Ok(exponent)
}

/// Parse a quantity string into canonical form.
///
/// # Errors
///
/// - [`QuantityError::Empty`] for an empty string.
/// - [`QuantityError::InvalidNumber`] when the numeric part is missing or
///   malformed (this includes leading or trailing whitespace).
/// - [`QuantityError::UnknownSuffix`] for an unrecognized suffix.
/// - [`QuantityError::OutOfRange`] when the mantissa overflows 128 bits or
///   the exponent is out of bounds.
pub fn parse_quantity(input: &str) -> Result<QuantityValue, QuantityError> {
    if input.is_empty() {
        return Err(QuantityError::Empty);
    }
    let invalid = || QuantityError::InvalidNumber(input.to_string());
    let out_of_range = || QuantityError::OutOfRange(input.to_string());

    let (negative, unsigned) = match input.as_bytes()[0] {
        b'-' => (true, &input[1..]),
        b'+' => (false, &input[1..]),
        _ => (false, input),
    };

    let number_len = unsigned
        .bytes()
        .take_while(|b| b.is_ascii_digit() || *b == b'.')
        .count();
    let (number, suffix) = unsigned.split_at(number_len);

    let (int_part, frac_part) = match number.split_once('.') {
        Some((int_part, frac_part)) => (int_part, frac_part),
        None => (number, ""),
    };
    if frac_part.contains('.') || (int_part.is_empty() && frac_part.is_empty()) {
        return Err(invalid());
    }

    // Zeros are deferred so that long runs of trailing zeros never overflow.
    // Leading zeros carry no magnitude and are dropped.
    let mut mantissa: u128 = 0;
    let mut pending_zeros: u32 = 0;
    for b in int_part.bytes().chain(frac_part.bytes()) {
        let digit = u128::from(b - b'0');
        if digit == 0 {
            if mantissa != 0 {
                pending_zeros += 1;
            }
            continue;
        }
        if mantissa == 0 {
            mantissa = digit;
            continue;
        }
        let shift = 10u128
            .checked_pow(pending_zeros + 1)
            .ok_or_else(out_of_range)?;
        mantissa = mantissa
            .checked_mul(shift)
            .and_then(|m| m.checked_add(digit))
            .ok_or_else(out_of_range)?;
        pending_zeros = 0;
    }
    let mut exponent = i64::from(pending_zeros) - frac_part.len() as i64;

    match parse_suffix(input, suffix)? {
        Scale::Decimal(e) => exponent += e,
        Scale::Binary(bits) => {
            mantissa = mantissa
                .checked_mul(1u128 << bits)
                .ok_or_else(out_of_range)?;
        }
    }

    let value = QuantityValue::new(negative, mantissa, exponent);
    if value.exponent.abs() > 2 * MAX_EXPONENT {
        return Err(out_of_range());
    }
    Ok(value)
}

/// Parse both operands and compare them in canonical form.
///
/// # Errors
///
/// Returns the [`QuantityError`] of the first operand that fails to parse.
pub fn compare_quantities(
    a: impl Into<QuantityInput>,
    b: impl Into<QuantityInput>,
) -> Result<Ordering, QuantityError> {
    let a = a.into().parse()?;
    let b = b.into().parse()?;
    Ok(a.cmp(&b))
}
