//! Arbitrary-precision fixed-point quantities.
//!
//! A [`Quantity`] is a `BigInt` mantissa scaled by a decimal display
//! precision: mantissa `1050` with precision `2` is the number `10.50`.
//! Amounts treat the quantity as opaque; the payload wire shape lives
//! entirely in this module so serializers never inspect the mantissa.
//!
//! ## Payload wire format
//!
//! ```text
//! len:       u16 LE    magnitude byte count
//! magnitude: [u8; len] big-endian, most significant byte first
//! sign:      u8        1 = negative, 0 otherwise
//! precision: u8
//! ```
//!
//! [`write_quantity`] increments a caller-provided counter once per payload
//! so a serializer can back-patch the total payload count into its header;
//! [`read_quantity`] does the same on the read side so a loader can verify
//! that count.

use num_bigint::{BigInt, Sign};
use std::fmt;
use std::io::{self, Read, Write};

/// An arbitrary-precision quantity with a decimal display precision.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Quantity {
    mantissa: BigInt,
    precision: u8,
}

impl Quantity {
    /// Build a quantity from a raw mantissa and precision.
    pub fn new(mantissa: BigInt, precision: u8) -> Self {
        Self { mantissa, precision }
    }

    /// The zero quantity at precision 0.
    pub fn zero() -> Self {
        Self::default()
    }

    /// A whole number at precision 0.
    pub fn from_i64(value: i64) -> Self {
        Self {
            mantissa: BigInt::from(value),
            precision: 0,
        }
    }

    /// A pre-scaled mantissa: `from_scaled_i64(1050, 2)` is `10.50`.
    pub fn from_scaled_i64(mantissa: i64, precision: u8) -> Self {
        Self {
            mantissa: BigInt::from(mantissa),
            precision,
        }
    }

    /// Parse a plain decimal string such as `"10.50"` or `"-3"`.
    ///
    /// The precision is taken from the number of fractional digits.
    /// Returns `None` for anything that is not a plain decimal.
    pub fn parse(text: &str) -> Option<Self> {
        let (sign, digits) = match text.strip_prefix('-') {
            Some(rest) => (Sign::Minus, rest),
            None => (Sign::Plus, text),
        };
        let (whole, frac) = match digits.split_once('.') {
            Some((w, f)) => (w, f),
            None => (digits, ""),
        };
        if whole.is_empty() && frac.is_empty() {
            return None;
        }
        if !whole.bytes().all(|b| b.is_ascii_digit()) || !frac.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        if frac.len() > u8::MAX as usize {
            return None;
        }
        let mut mantissa = BigInt::default();
        for b in whole.bytes().chain(frac.bytes()) {
            mantissa = mantissa * 10 + (b - b'0');
        }
        if sign == Sign::Minus {
            mantissa = -mantissa;
        }
        Some(Self {
            mantissa,
            precision: frac.len() as u8,
        })
    }

    /// The raw mantissa.
    pub fn mantissa(&self) -> &BigInt {
        &self.mantissa
    }

    /// Decimal display precision.
    pub fn precision(&self) -> u8 {
        self.precision
    }

    pub fn is_zero(&self) -> bool {
        self.mantissa.sign() == Sign::NoSign
    }

    pub fn is_negative(&self) -> bool {
        self.mantissa.sign() == Sign::Minus
    }

    /// The same magnitude with the opposite sign.
    pub fn negated(&self) -> Self {
        Self {
            mantissa: -self.mantissa.clone(),
            precision: self.precision,
        }
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let magnitude = self.mantissa.magnitude().to_string();
        let precision = self.precision as usize;
        if self.is_negative() {
            f.write_str("-")?;
        }
        if precision == 0 {
            return f.write_str(&magnitude);
        }
        if magnitude.len() <= precision {
            // All fractional: pad with leading zeros.
            write!(f, "0.{}{}", "0".repeat(precision - magnitude.len()), magnitude)
        } else {
            let (whole, frac) = magnitude.split_at(magnitude.len() - precision);
            write!(f, "{whole}.{frac}")
        }
    }
}

/// Serialize a quantity payload, advancing the caller's payload counter.
pub fn write_quantity<W: Write + ?Sized>(
    out: &mut W,
    quantity: &Quantity,
    bigints_count: &mut u32,
) -> io::Result<()> {
    let (sign, magnitude) = quantity.mantissa.to_bytes_be();
    if magnitude.len() > u16::MAX as usize {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("quantity magnitude of {} bytes is unencodable", magnitude.len()),
        ));
    }
    out.write_all(&(magnitude.len() as u16).to_le_bytes())?;
    out.write_all(&magnitude)?;
    out.write_all(&[u8::from(sign == Sign::Minus)])?;
    out.write_all(&[quantity.precision])?;
    *bigints_count += 1;
    Ok(())
}

/// Deserialize a quantity payload, advancing the caller's payload counter.
pub fn read_quantity<R: Read + ?Sized>(
    input: &mut R,
    bigints_read: &mut u32,
) -> io::Result<Quantity> {
    let mut len_buf = [0u8; 2];
    input.read_exact(&mut len_buf)?;
    let len = u16::from_le_bytes(len_buf) as usize;
    let mut magnitude = vec![0u8; len];
    input.read_exact(&mut magnitude)?;
    let mut tail = [0u8; 2];
    input.read_exact(&mut tail)?;
    let sign = if tail[0] == 1 { Sign::Minus } else { Sign::Plus };
    *bigints_read += 1;
    Ok(Quantity {
        mantissa: BigInt::from_bytes_be(sign, &magnitude),
        precision: tail[1],
    })
}
