//! Primitive wire I/O: integers, strings, and the back-patching encoder.
//!
//! All multi-byte fields are little-endian with pinned widths, and every
//! count field is a `u32`, so the image is stable across word sizes and
//! byte orders.
//!
//! ## Strings
//!
//! ```text
//! 0x00                           empty
//! len: u8 ∈ 1..=254, bytes       short string
//! 0xFF, len: u16 LE, bytes       long string (max 65,535 bytes)
//! ```
//!
//! With guard framing enabled, every string -- streamed or pooled -- is
//! bracketed by the `u16` constants `0x3001` (before) and `0x3002`
//! (after). Guarded and unguarded images are distinct formats: guarded
//! images carry [`MAGIC_GUARDED`] instead of [`MAGIC`], so mixing the two
//! settings surfaces as "not a cache" rather than a mid-stream guard
//! failure. Both peers must still agree on the setting.

use std::io::{self, Read, Write};

use crate::error::{CacheError, Result};

/// Magic word opening every unguarded cache image.
pub const MAGIC: u32 = 0xFFEE_D765;

/// Magic word opening every guard-framed cache image.
pub const MAGIC_GUARDED: u32 = 0xFFEE_D766;

/// Format version; readers require exact equality.
pub const FORMAT_VERSION: u32 = 0x0002_0019;

/// Ident sentinel meaning "none" (no parent, no commodity).
pub const NO_IDENT: u32 = 0xFFFF_FFFF;

/// Guard constant written before each string when framing is on.
pub const GUARD_BEFORE: u16 = 0x3001;

/// Guard constant written after each string when framing is on.
pub const GUARD_AFTER: u16 = 0x3002;

/// String length prefix announcing a `u16` length to follow.
const LONG_STRING_MARKER: u8 = 0xFF;

// ============================================================================
// Stream readers
// ============================================================================

pub fn read_u8<R: Read + ?Sized>(input: &mut R) -> io::Result<u8> {
    let mut buf = [0u8; 1];
    input.read_exact(&mut buf)?;
    Ok(buf[0])
}

pub fn read_u16<R: Read + ?Sized>(input: &mut R) -> io::Result<u16> {
    let mut buf = [0u8; 2];
    input.read_exact(&mut buf)?;
    Ok(u16::from_le_bytes(buf))
}

pub fn read_u32<R: Read + ?Sized>(input: &mut R) -> io::Result<u32> {
    let mut buf = [0u8; 4];
    input.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

pub fn read_i64<R: Read + ?Sized>(input: &mut R) -> io::Result<i64> {
    let mut buf = [0u8; 8];
    input.read_exact(&mut buf)?;
    Ok(i64::from_le_bytes(buf))
}

fn check_guard(found: u16, expected: u16) -> Result<()> {
    if found != expected {
        return Err(CacheError::Corrupt(format!(
            "string guard mismatch: expected {expected:#06x}, found {found:#06x}"
        )));
    }
    Ok(())
}

/// Read a length-prefixed string directly from the stream.
pub fn read_string<R: Read + ?Sized>(input: &mut R, guards: bool) -> Result<String> {
    if guards {
        check_guard(read_u16(input)?, GUARD_BEFORE)?;
    }
    let prefix = read_u8(input)?;
    let len = if prefix == LONG_STRING_MARKER {
        read_u16(input)? as usize
    } else {
        prefix as usize
    };
    let mut bytes = vec![0u8; len];
    input.read_exact(&mut bytes)?;
    let text = String::from_utf8(bytes)
        .map_err(|e| CacheError::Corrupt(format!("string is not valid UTF-8: {e}")))?;
    if guards {
        check_guard(read_u16(input)?, GUARD_AFTER)?;
    }
    Ok(text)
}

/// Decode one length-prefixed string from a byte region, advancing `pos`.
///
/// This is the pooled-string entry point: the bytes were read as a single
/// block up front and are consumed here in write order.
pub fn take_string(data: &[u8], pos: &mut usize, guards: bool) -> Result<String> {
    if guards {
        check_guard(take_u16(data, pos)?, GUARD_BEFORE)?;
    }
    let prefix = take_u8(data, pos)?;
    let len = if prefix == LONG_STRING_MARKER {
        take_u16(data, pos)? as usize
    } else {
        prefix as usize
    };
    if *pos + len > data.len() {
        return Err(CacheError::Corrupt(format!(
            "string of {len} bytes overruns the pool at offset {pos}"
        )));
    }
    let text = std::str::from_utf8(&data[*pos..*pos + len])
        .map_err(|e| CacheError::Corrupt(format!("string is not valid UTF-8: {e}")))?
        .to_string();
    *pos += len;
    if guards {
        check_guard(take_u16(data, pos)?, GUARD_AFTER)?;
    }
    Ok(text)
}

fn take_u8(data: &[u8], pos: &mut usize) -> Result<u8> {
    let b = *data
        .get(*pos)
        .ok_or_else(|| CacheError::corrupt("unexpected end of string pool"))?;
    *pos += 1;
    Ok(b)
}

fn take_u16(data: &[u8], pos: &mut usize) -> Result<u16> {
    if *pos + 2 > data.len() {
        return Err(CacheError::corrupt("unexpected end of string pool"));
    }
    let v = u16::from_le_bytes([data[*pos], data[*pos + 1]]);
    *pos += 2;
    Ok(v)
}

// ============================================================================
// Encoder
// ============================================================================

/// Handle to a reserved little-endian `u32` slot in the output.
#[derive(Debug, Clone, Copy)]
pub struct Patch(usize);

/// Write-side buffer with deferred-value support.
///
/// The whole image is encoded in memory and flushed to the sink in one
/// write, so [`Encoder::reserve_u32`] / [`Encoder::patch_u32`] never need
/// a seekable sink.
pub struct Encoder {
    buf: Vec<u8>,
    guards: bool,
}

impl Encoder {
    pub fn new(guards: bool) -> Self {
        Self {
            buf: Vec::new(),
            guards,
        }
    }

    /// Current byte offset from the start of the image.
    pub fn position(&self) -> usize {
        self.buf.len()
    }

    pub fn guards(&self) -> bool {
        self.guards
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    pub fn put_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    pub fn put_u16(&mut self, value: u16) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn put_u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn put_i64(&mut self, value: i64) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    /// Append a length-prefixed string, guard-framed when enabled.
    pub fn put_string(&mut self, text: &str) -> Result<()> {
        if self.guards {
            self.put_u16(GUARD_BEFORE);
        }
        let len = text.len();
        if len >= LONG_STRING_MARKER as usize {
            if len > u16::MAX as usize {
                return Err(CacheError::StringTooLong(len));
            }
            self.put_u8(LONG_STRING_MARKER);
            self.put_u16(len as u16);
        } else {
            self.put_u8(len as u8);
        }
        self.buf.extend_from_slice(text.as_bytes());
        if self.guards {
            self.put_u16(GUARD_AFTER);
        }
        Ok(())
    }

    /// Reserve a `u32` slot to be filled in later.
    pub fn reserve_u32(&mut self) -> Patch {
        let at = self.buf.len();
        self.put_u32(0);
        Patch(at)
    }

    /// Fill a slot reserved with [`Encoder::reserve_u32`].
    pub fn patch_u32(&mut self, patch: Patch, value: u32) {
        self.buf[patch.0..patch.0 + 4].copy_from_slice(&value.to_le_bytes());
    }
}

impl Write for Encoder {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
