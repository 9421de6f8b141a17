//! ASCII hex nibble codec
//!
//! Fields are fixed-width runs of hex characters at fixed offsets. Decoding
//! accepts both cases; encoding always emits upper case.

/// Errors from reading or writing a hex field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FieldError {
    /// Character at this offset is not a hex digit
    InvalidDigit { offset: usize },
    /// Field extends past the end of the frame
    OutOfBounds { offset: usize },
    /// Width is not one of 1, 2 or 4 characters
    UnsupportedWidth,
}

/// Value of a single hex character
pub const fn nibble_value(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'A'..=b'F' => Some(c - b'A' + 10),
        b'a'..=b'f' => Some(c - b'a' + 10),
        _ => None,
    }
}

/// Upper-case hex character for the low nibble of `n`
pub const fn nibble_char(n: u8) -> u8 {
    let n = n & 0x0F;
    if n < 10 {
        b'0' + n
    } else {
        b'A' + n - 10
    }
}

/// Read a 1, 2 or 4 character field starting at `offset`
pub fn read_field(buf: &[u8], offset: usize, chars: usize) -> Result<u16, FieldError> {
    if !matches!(chars, 1 | 2 | 4) {
        return Err(FieldError::UnsupportedWidth);
    }
    let digits = buf
        .get(offset..offset + chars)
        .ok_or(FieldError::OutOfBounds { offset })?;

    digits.iter().enumerate().try_fold(0u16, |acc, (i, &c)| {
        let n = nibble_value(c).ok_or(FieldError::InvalidDigit { offset: offset + i })?;
        Ok((acc << 4) | u16::from(n))
    })
}

/// Write `value` as `2 * byte_count` hex characters starting at `offset`
///
/// Bits above `8 * byte_count` are dropped.
pub fn write_field(
    buf: &mut [u8],
    offset: usize,
    byte_count: usize,
    value: u32,
) -> Result<(), FieldError> {
    if !matches!(byte_count, 1 | 2 | 4) {
        return Err(FieldError::UnsupportedWidth);
    }
    let chars = byte_count * 2;
    let out = buf
        .get_mut(offset..offset + chars)
        .ok_or(FieldError::OutOfBounds { offset })?;

    for (i, slot) in out.iter_mut().enumerate() {
        let shift = 4 * (chars - 1 - i);
        *slot = nibble_char((value >> shift) as u8);
    }
    Ok(())
}
