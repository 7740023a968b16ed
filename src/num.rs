//! Ark numbers are arbitrary precision, and the bytecode stores them as text

use core::{fmt, num::IntErrorKind};

use arbitrary::{Arbitrary, Unstructured};
use num_bigint::{BigInt, Sign};

/// Fractional digits written before giving up on a non-terminating expansion
/// (1/10 has no finite base-16 form).
const MAX_FRACTION_DIGITS: usize = 32;

/// Largest decimal exponent accepted in a literal.
const MAX_EXPONENT: u64 = 4096;

/// An exact decimal `mantissa * 10^-scale`.
///
/// Always normalized: the mantissa has no trailing zero digits while
/// `scale > 0`, and zero has scale 0. Two numbers are therefore equal exactly
/// when their values are equal, which is what constant deduplication relies on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArkNumber {
    mantissa: BigInt,
    scale: u32,
}

#[derive(thiserror::Error, Debug, PartialEq, Clone)]
pub enum NumberError {
    #[error("malformed number")]
    Malformed,
    #[error("number literal too big")]
    TooBig,
}

impl ArkNumber {
    pub fn integer(value: impl Into<BigInt>) -> Self {
        Self {
            mantissa: value.into(),
            scale: 0,
        }
    }

    /// Builds `mantissa * 10^exponent`.
    pub fn from_parts(mantissa: BigInt, exponent: i64) -> Result<Self, NumberError> {
        if exponent.unsigned_abs() > MAX_EXPONENT {
            return Err(NumberError::TooBig);
        }

        let number = if exponent >= 0 {
            Self {
                mantissa: mantissa * BigInt::from(10u32).pow(exponent as u32),
                scale: 0,
            }
        } else {
            Self {
                mantissa,
                scale: exponent.unsigned_abs() as u32,
            }
        };
        Ok(number.normalized())
    }

    /// Parses the literal syntax `[+-]?digits(.digits?)?([eE][+-]?digits)?`.
    pub fn parse(text: &str) -> Result<Self, NumberError> {
        let (significand, exponent) = match text.find(|c: char| c == 'e' || c == 'E') {
            Some(at) => {
                let exponent = text[at + 1..].parse::<i64>().map_err(|err| match err.kind() {
                    IntErrorKind::PosOverflow | IntErrorKind::NegOverflow => NumberError::TooBig,
                    _ => NumberError::Malformed,
                })?;
                (&text[..at], exponent)
            }
            None => (text, 0),
        };

        let (is_neg, unsigned) = match significand.as_bytes().first() {
            Some(b'-') => (true, &significand[1..]),
            Some(b'+') => (false, &significand[1..]),
            _ => (false, significand),
        };
        let (whole, fraction) = unsigned.split_once('.').unwrap_or((unsigned, ""));

        if whole.is_empty()
            || !whole.bytes().all(|b| b.is_ascii_digit())
            || !fraction.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(NumberError::Malformed);
        }

        let mut digits = String::with_capacity(whole.len() + fraction.len() + 1);
        if is_neg {
            digits.push('-');
        }
        digits.push_str(whole);
        digits.push_str(fraction);
        let mantissa = digits
            .parse::<BigInt>()
            .map_err(|_| NumberError::Malformed)?;

        let exponent = exponent
            .checked_sub(fraction.len() as i64)
            .ok_or(NumberError::TooBig)?;
        Self::from_parts(mantissa, exponent)
    }

    pub fn is_integer(&self) -> bool {
        self.scale == 0
    }

    pub fn is_neg(&self) -> bool {
        self.mantissa.sign() == Sign::Minus
    }

    fn normalized(mut self) -> Self {
        let ten = BigInt::from(10u32);
        let zero = BigInt::from(0u32);
        if self.mantissa == zero {
            self.scale = 0;
        }
        while self.scale > 0 && (&self.mantissa % &ten) == zero {
            self.mantissa /= &ten;
            self.scale -= 1;
        }
        self
    }

    /// Renders the number in one of the radixes 2, 8, 10 or 16.
    ///
    /// Integers come out as their digits (`-ff`). Non-integers get a `.` and
    /// fractional digits, cut after a fixed number of digits when the
    /// expansion does not terminate in that radix.
    pub fn display(&self, radix: u32) -> Option<Box<str>> {
        [2, 8, 10, 16]
            .contains(&radix)
            .then(|| self.render(radix))
    }

    /// The base 16 text the value table stores.
    pub fn display_hex(&self) -> Box<str> {
        self.render(16)
    }

    fn render(&self, radix: u32) -> Box<str> {
        let denominator = BigInt::from(10u32).pow(self.scale);
        let magnitude = BigInt::from(self.mantissa.magnitude().clone());
        let whole = &magnitude / &denominator;
        let mut remainder = &magnitude % &denominator;

        let mut output = String::new();
        if self.is_neg() {
            output.push('-');
        }
        output.push_str(&whole.to_str_radix(radix));

        let zero = BigInt::from(0u32);
        if remainder != zero {
            output.push('.');
            let radix_big = BigInt::from(radix);
            for _ in 0..MAX_FRACTION_DIGITS {
                remainder *= &radix_big;
                let digit = &remainder / &denominator;
                remainder %= &denominator;
                output.push_str(&digit.to_str_radix(radix));
                if remainder == zero {
                    break;
                }
            }
        }

        Box::from(output.as_str())
    }
}

impl fmt::Display for ArkNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(10))
    }
}

impl From<i64> for ArkNumber {
    fn from(value: i64) -> Self {
        Self::integer(value)
    }
}

// Derived impls would build unnormalized numbers, so go through `from_parts`.
impl<'a> Arbitrary<'a> for ArkNumber {
    fn arbitrary(u: &mut Unstructured<'a>) -> arbitrary::Result<Self> {
        let mantissa = BigInt::from(i64::arbitrary(u)?);
        let exponent = u.int_in_range(-6i64..=6)?;
        Self::from_parts(mantissa, exponent).map_err(|_| arbitrary::Error::IncorrectFormat)
    }
}
