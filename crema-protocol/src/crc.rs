//! CRC-8 over frame characters
//!
//! Polynomial 0x07 (x^8 + x^2 + x + 1), initial value 0, MSB first.

use crate::frame::{CRC_FIELD, CRC_PLACEHOLDER};

/// CRC-8 of a byte slice
pub fn crc8(data: &[u8]) -> u8 {
    data.iter().fold(0u8, |crc, &byte| crc8_step(crc, byte))
}

/// Fold one byte into a running CRC-8
#[inline]
pub fn crc8_step(mut crc: u8, byte: u8) -> u8 {
    let mut current = byte;
    for _ in 0..8 {
        if ((crc >> 7) ^ (current >> 7)) != 0 {
            crc = (crc << 1) ^ 0x07;
        } else {
            crc <<= 1;
        }
        current <<= 1;
    }
    crc
}

/// CRC-8 of a complete frame
///
/// The two CRC characters are read as [`CRC_PLACEHOLDER`] whatever they
/// currently hold, so sender and receiver agree on the checksum without a
/// fixed point.
pub fn frame_crc(frame: &[u8]) -> u8 {
    frame.iter().enumerate().fold(0u8, |crc, (i, &byte)| {
        let byte = if CRC_FIELD.contains(&i) {
            CRC_PLACEHOLDER[i - CRC_FIELD.start]
        } else {
            byte
        };
        crc8_step(crc, byte)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crc8_empty() {
        assert_eq!(crc8(&[]), 0);
    }

    #[test]
    fn test_crc8_check_value() {
        // CRC-8/SMBUS check value
        assert_eq!(crc8(b"123456789"), 0xF4);
    }

    #[test]
    fn test_frame_crc_ignores_crc_field() {
        let a = *b"/10C3100";
        let mut b = a;
        b[6] = b'F';
        b[7] = b'7';
        assert_eq!(frame_crc(&a), frame_crc(&b));
        assert_eq!(frame_crc(&a), crc8(&a));
    }

    #[test]
    fn test_frame_crc_short_buffer() {
        // Shorter than the CRC field; must not index out of range
        assert_eq!(frame_crc(b"/1"), crc8(b"/1"));
    }
}
