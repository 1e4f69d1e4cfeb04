//! 7-bit value packing used on the Firmata data channel.
//!
//! Every data byte on the wire carries 7 bits, so wider integers travel as an
//! LSB/MSB pair and text travels as one pair per character.

use core::fmt;

/// Largest value [`pack16`] accepts.
pub const MAX_PACKED: u16 = 32_767;

/// A value does not fit the protocol representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RangeError {
    /// The rejected value.
    pub value: u32,
    /// The largest accepted value.
    pub max: u32,
}

impl fmt::Display for RangeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "value {} exceeds maximum {}", self.value, self.max)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for RangeError {}

/// Split `value` into `(lsb, msb)` with `lsb = value % 128` and `msb = value >> 7`.
///
/// # Example
///
/// ```
/// use firmata_proto::pack16;
///
/// assert_eq!(pack16(544), Ok((0x20, 0x04)));
/// assert!(pack16(32_768).is_err());
/// ```
#[inline]
pub fn pack16(value: u16) -> Result<(u8, u8), RangeError> {
    if value > MAX_PACKED {
        return Err(RangeError {
            value: value as u32,
            max: MAX_PACKED as u32,
        });
    }
    Ok(((value % 128) as u8, (value >> 7) as u8))
}

/// Join an LSB/MSB pair back into an integer: `(msb << 7) | lsb`.
#[inline]
#[must_use]
pub const fn unpack16(lsb: u8, msb: u8) -> u16 {
    ((msb as u16) << 7) | lsb as u16
}

/// Iterate the packed byte pairs of every character in `s`.
///
/// Characters whose code point exceeds [`MAX_PACKED`] yield a [`RangeError`].
pub fn pack_chars(s: &str) -> impl Iterator<Item = Result<[u8; 2], RangeError>> + '_ {
    s.chars().map(|c| {
        let code = c as u32;
        if code > MAX_PACKED as u32 {
            return Err(RangeError {
                value: code,
                max: MAX_PACKED as u32,
            });
        }
        let (lsb, msb) = pack16(code as u16)?;
        Ok([lsb, msb])
    })
}

/// Decode pairs of packed bytes into characters.
///
/// A trailing unmatched byte is treated as an LSB with MSB = 0. Pairs that do
/// not form a valid scalar value decode as U+FFFD.
pub fn unpack_chars(bytes: &[u8]) -> impl Iterator<Item = char> + '_ {
    bytes.chunks(2).map(|pair| {
        let lsb = pair[0];
        let msb = pair.get(1).copied().unwrap_or(0);
        char::from_u32(unpack16(lsb, msb) as u32).unwrap_or(char::REPLACEMENT_CHARACTER)
    })
}

/// Pack a whole string, two bytes per character.
#[cfg(feature = "std")]
pub fn pack_string(s: &str) -> Result<std::vec::Vec<u8>, RangeError> {
    let mut out = std::vec::Vec::with_capacity(s.len() * 2);
    for pair in pack_chars(s) {
        out.extend_from_slice(&pair?);
    }
    Ok(out)
}

/// Inverse of [`pack_string`].
#[cfg(feature = "std")]
#[must_use]
pub fn unpack_string(bytes: &[u8]) -> std::string::String {
    unpack_chars(bytes).collect()
}
