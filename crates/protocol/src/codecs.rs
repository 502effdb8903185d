//! Wire codecs for the biased-by-32 integer encoding
//!
//! Every integer on the wire is a string of base-224 digits, least
//! significant first, with 32 added to each digit so the byte stays out of
//! the control-character range. Fixed widths: GChar (1 byte), GShort (2),
//! GInt3 (3), GInt4 (4), GInt5 (5). Strings are GChar-length-prefixed.
//!
//! Writers refuse values outside the encoding range instead of clamping;
//! an out-of-range outbound value is a caller bug and silently truncating
//! it would desync the world state the server sees.

use bytes::{Buf, BufMut, BytesMut};
use reborn_core::{RebornError, Result};

/// Digit base of the encoding. A digit byte is `digit + 32`, so the
/// largest digit is 223 (byte 255).
pub const DIGIT_BASE: u64 = 224;

/// Byte offset applied to every digit
pub const DIGIT_BIAS: u8 = 32;

/// Largest value a single GChar can carry
pub const GCHAR_MAX: u64 = DIGIT_BASE - 1;

/// Largest value a GShort can carry (224^2 - 1)
pub const GSHORT_MAX: u64 = DIGIT_BASE * DIGIT_BASE - 1;

/// Largest value a GInt3 can carry (224^3 - 1)
pub const GINT3_MAX: u64 = DIGIT_BASE * DIGIT_BASE * DIGIT_BASE - 1;

/// Largest value a GInt4 can carry (224^4 - 1)
pub const GINT4_MAX: u64 = DIGIT_BASE * DIGIT_BASE * DIGIT_BASE * DIGIT_BASE - 1;

/// Largest value a GInt5 can carry (224^5 - 1); covers the full u32 range
pub const GINT5_MAX: u64 = DIGIT_BASE * DIGIT_BASE * DIGIT_BASE * DIGIT_BASE * DIGIT_BASE - 1;

/// Longest string a GString can carry
pub const GSTRING_MAX: usize = GCHAR_MAX as usize;

fn write_digits(buf: &mut BytesMut, val: u64, width: usize, max: u64, what: &str) -> Result<()> {
    if val > max {
        return Err(RebornError::ValueOutOfRange(format!(
            "{} {} exceeds {}",
            what, val, max
        )));
    }
    let mut rem = val;
    for _ in 0..width {
        buf.put_u8((rem % DIGIT_BASE) as u8 + DIGIT_BIAS);
        rem /= DIGIT_BASE;
    }
    Ok(())
}

fn read_digits(buf: &mut BytesMut, width: usize, what: &str) -> Result<u64> {
    if buf.remaining() < width {
        return Err(RebornError::SubpacketMalformed(format!(
            "not enough bytes for {}",
            what
        )));
    }
    let mut val: u64 = 0;
    let mut scale: u64 = 1;
    for _ in 0..width {
        let digit = buf.get_u8().saturating_sub(DIGIT_BIAS) as u64;
        val += digit * scale;
        scale *= DIGIT_BASE;
    }
    Ok(val)
}

/// Write a GChar (1 byte, 0..=223)
#[inline]
pub fn write_gchar(buf: &mut BytesMut, val: u8) -> Result<()> {
    write_digits(buf, val as u64, 1, GCHAR_MAX, "GChar")
}

/// Read a GChar
#[inline]
pub fn read_gchar(buf: &mut BytesMut) -> Result<u8> {
    Ok(read_digits(buf, 1, "GChar")? as u8)
}

/// Write a GShort (2 bytes)
#[inline]
pub fn write_gshort(buf: &mut BytesMut, val: u16) -> Result<()> {
    write_digits(buf, val as u64, 2, GSHORT_MAX, "GShort")
}

/// Read a GShort
#[inline]
pub fn read_gshort(buf: &mut BytesMut) -> Result<u16> {
    Ok(read_digits(buf, 2, "GShort")? as u16)
}

/// Write a GInt3 (3 bytes)
#[inline]
pub fn write_gint3(buf: &mut BytesMut, val: u32) -> Result<()> {
    write_digits(buf, val as u64, 3, GINT3_MAX, "GInt3")
}

/// Read a GInt3
#[inline]
pub fn read_gint3(buf: &mut BytesMut) -> Result<u32> {
    Ok(read_digits(buf, 3, "GInt3")? as u32)
}

/// Write a GInt4 (4 bytes)
#[inline]
pub fn write_gint4(buf: &mut BytesMut, val: u32) -> Result<()> {
    write_digits(buf, val as u64, 4, GINT4_MAX, "GInt4")
}

/// Read a GInt4
#[inline]
pub fn read_gint4(buf: &mut BytesMut) -> Result<u32> {
    Ok(read_digits(buf, 4, "GInt4")? as u32)
}

/// Write a GInt5 (5 bytes). Any u32 fits.
#[inline]
pub fn write_gint5(buf: &mut BytesMut, val: u32) -> Result<()> {
    write_digits(buf, val as u64, 5, GINT5_MAX, "GInt5")
}

/// Read a GInt5
#[inline]
pub fn read_gint5(buf: &mut BytesMut) -> Result<u32> {
    let val = read_digits(buf, 5, "GInt5")?;
    Ok(val as u32)
}

/// Write a variable-length GUInt: shortest fixed width that fits the value,
/// preceded by a GChar byte count. Used for lengths larger than one GChar.
pub fn write_guint(buf: &mut BytesMut, val: u32) -> Result<()> {
    let width = match val as u64 {
        v if v <= GCHAR_MAX => 1,
        v if v <= GSHORT_MAX => 2,
        v if v <= GINT3_MAX => 3,
        v if v <= GINT4_MAX => 4,
        _ => 5,
    };
    write_gchar(buf, width as u8)?;
    write_digits(buf, val as u64, width, GINT5_MAX, "GUInt")
}

/// Read a variable-length GUInt
pub fn read_guint(buf: &mut BytesMut) -> Result<u32> {
    let width = read_gchar(buf)? as usize;
    if width == 0 || width > 5 {
        return Err(RebornError::SubpacketMalformed(format!(
            "GUInt width {} out of range",
            width
        )));
    }
    Ok(read_digits(buf, width, "GUInt")? as u32)
}

/// Write a GString (GChar length prefix, then raw bytes)
///
/// Strings longer than 223 bytes are refused, matching what the length
/// prefix can express.
pub fn write_gstring(buf: &mut BytesMut, val: &str) -> Result<()> {
    let bytes = val.as_bytes();
    if bytes.len() > GSTRING_MAX {
        return Err(RebornError::ValueOutOfRange(format!(
            "GString of {} bytes exceeds {}",
            bytes.len(),
            GSTRING_MAX
        )));
    }
    write_gchar(buf, bytes.len() as u8)?;
    buf.put_slice(bytes);
    Ok(())
}

/// Read a GString
///
/// The declared length is validated against the remaining buffer before
/// any bytes are taken.
pub fn read_gstring(buf: &mut BytesMut) -> Result<String> {
    let len = read_gchar(buf)? as usize;
    if buf.remaining() < len {
        return Err(RebornError::SubpacketMalformed(format!(
            "GString length {} exceeds remaining {}",
            len,
            buf.remaining()
        )));
    }
    let bytes = buf.copy_to_bytes(len);
    // The wire is latin-1; lossy conversion keeps every byte readable.
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Read bytes up to (not including) the next newline, consuming the
/// newline if present. Used for the trailing free-text field of several
/// packets.
pub fn read_line_string(buf: &mut BytesMut) -> String {
    let end = buf.iter().position(|&b| b == b'\n').unwrap_or(buf.len());
    let bytes = buf.copy_to_bytes(end);
    if buf.has_remaining() {
        buf.advance(1);
    }
    String::from_utf8_lossy(&bytes).into_owned()
}

/// Write a signed half-tile position as a GInt3
///
/// World coordinates can be negative while the digit encoding cannot, so
/// the value goes on the wire as `abs(pixels) << 1 | sign` where pixels
/// are sixteenths of a tile. Half-tile positions survive exactly.
pub fn write_gpos(buf: &mut BytesMut, tiles: f32) -> Result<()> {
    let pixels = (tiles * 16.0).round() as i32;
    let sign = if pixels < 0 { 1u32 } else { 0u32 };
    let magnitude = pixels.unsigned_abs();
    write_gint3(buf, (magnitude << 1) | sign)
}

/// Read a signed half-tile position
pub fn read_gpos(buf: &mut BytesMut) -> Result<f32> {
    let raw = read_gint3(buf)?;
    let magnitude = (raw >> 1) as f32;
    let pixels = if raw & 1 == 1 { -magnitude } else { magnitude };
    Ok(pixels / 16.0)
}
