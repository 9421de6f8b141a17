//! Frame reassembly for the host link
//!
//! Bytes arrive one at a time from the UART. A `'/'` always restarts
//! reassembly, even in the middle of a frame, so a truncated frame is simply
//! replaced by the next one. The header is decoded on the fly; payload
//! characters are stored verbatim and decoded later through [`Frame::field`].

use core::ops::Range;

use heapless::Vec;

use crate::crc::frame_crc;
use crate::hex::{nibble_value, read_field, FieldError};

/// Frame synchronization character
pub const FRAME_START: u8 = b'/';

/// Protocol version this firmware speaks
pub const PROTOCOL_VERSION: u8 = 1;

/// Longest frame in characters
pub const MAX_FRAME_LEN: usize = 255;

/// Characters before the first request field
pub const HEADER_LEN: usize = 8;

/// Offset of the single version digit
pub const VERSION_OFFSET: usize = 1;
/// Offset of the two length characters
pub const LENGTH_OFFSET: usize = 2;
/// Offset of the two message type characters
pub const TYPE_OFFSET: usize = 4;
/// Characters holding the CRC
pub const CRC_FIELD: Range<usize> = 6..8;
/// Offset of the two status characters in replies
pub const STATUS_OFFSET: usize = 8;
/// First payload character of a reply
pub const PAYLOAD_OFFSET: usize = 10;

/// Value the CRC characters take while the checksum is computed
pub const CRC_PLACEHOLDER: [u8; 2] = *b"00";

/// Errors raised while reassembling a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameError {
    /// A header character was not a hex digit
    InvalidHeader,
    /// Declared length cannot even hold the header
    LengthTooShort,
    /// Reply payload would exceed the maximum frame length
    PayloadTooLarge,
}

/// A complete frame as received
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    raw: Vec<u8, MAX_FRAME_LEN>,
    version: u8,
    msg_type: u8,
    crc: u8,
}

impl Frame {
    /// Build a frame from raw characters, decoding the header
    ///
    /// Mostly useful for tests and host tooling; the firmware receives frames
    /// through [`FrameAssembler`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, FrameError> {
        let mut assembler = FrameAssembler::new();
        for &b in bytes {
            assembler.feed(b)?;
        }
        assembler.take().ok_or(FrameError::LengthTooShort)
    }

    /// Protocol version digit
    pub fn version(&self) -> u8 {
        self.version
    }

    /// Message type byte
    pub fn msg_type(&self) -> u8 {
        self.msg_type
    }

    /// CRC carried in the frame
    pub fn received_crc(&self) -> u8 {
        self.crc
    }

    /// CRC recomputed over the received characters
    pub fn computed_crc(&self) -> u8 {
        frame_crc(&self.raw)
    }

    /// Whether the carried CRC matches the characters
    pub fn crc_ok(&self) -> bool {
        self.computed_crc() == self.crc
    }

    /// Raw characters of the frame
    pub fn as_bytes(&self) -> &[u8] {
        &self.raw
    }

    /// Frame length in characters
    pub fn len(&self) -> usize {
        self.raw.len()
    }

    /// Always false; a frame holds at least its header
    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// Decode a numeric field of `chars` hex characters at `offset`
    pub fn field(&self, offset: usize, chars: usize) -> Result<u16, FieldError> {
        read_field(&self.raw, offset, chars)
    }
}

/// Byte-at-a-time reassembly of incoming frames
///
/// Completion is a level: [`FrameAssembler::is_ready`] stays true until the
/// frame is taken, so the dispatcher can poll on its own cadence.
#[derive(Debug, Clone)]
pub struct FrameAssembler {
    buffer: [u8; MAX_FRAME_LEN],
    counter: usize,
    length: usize,
    version: u8,
    msg_type: u8,
    crc: u8,
}

impl Default for FrameAssembler {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameAssembler {
    /// Create an empty assembler waiting for a start marker
    pub const fn new() -> Self {
        Self {
            buffer: [0; MAX_FRAME_LEN],
            counter: 0,
            length: 0,
            version: 0,
            msg_type: 0,
            crc: 0,
        }
    }

    /// Drop any partial frame and wait for the next start marker
    pub fn reset(&mut self) {
        self.counter = 0;
        self.length = 0;
        self.version = 0;
        self.msg_type = 0;
        self.crc = 0;
    }

    /// Characters stored so far for the current frame
    pub fn counter(&self) -> usize {
        self.counter
    }

    /// Feed one received byte
    ///
    /// Header decode errors drop the partial frame. Bytes outside a frame,
    /// and bytes past the declared length, are ignored.
    pub fn feed(&mut self, byte: u8) -> Result<(), FrameError> {
        if byte == FRAME_START {
            self.reset();
            self.buffer[0] = byte;
            self.counter = 1;
            return Ok(());
        }

        match self.counter {
            0 => Ok(()),
            VERSION_OFFSET => {
                self.version = self.header_nibble(byte)?;
                self.store(byte);
                Ok(())
            }
            2 => {
                self.length = usize::from(self.header_nibble(byte)?) << 4;
                self.store(byte);
                Ok(())
            }
            3 => {
                self.length += usize::from(self.header_nibble(byte)?);
                self.length = self.length.min(MAX_FRAME_LEN);
                if self.length < HEADER_LEN {
                    self.reset();
                    return Err(FrameError::LengthTooShort);
                }
                self.store(byte);
                Ok(())
            }
            4 => {
                self.msg_type = self.header_nibble(byte)? << 4;
                self.store(byte);
                Ok(())
            }
            5 => {
                self.msg_type |= self.header_nibble(byte)?;
                self.store(byte);
                Ok(())
            }
            6 => {
                self.crc = self.header_nibble(byte)? << 4;
                self.store(byte);
                Ok(())
            }
            7 => {
                self.crc |= self.header_nibble(byte)?;
                self.store(byte);
                Ok(())
            }
            n if n < self.length => {
                self.store(byte);
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Feed a run of bytes, stopping at the first header error
    pub fn feed_bytes(&mut self, bytes: &[u8]) -> Result<(), FrameError> {
        for &byte in bytes {
            self.feed(byte)?;
        }
        Ok(())
    }

    /// Whether a complete frame is waiting
    pub fn is_ready(&self) -> bool {
        self.counter >= HEADER_LEN && self.counter == self.length
    }

    /// Take the complete frame, if any, and clear the assembler
    pub fn take(&mut self) -> Option<Frame> {
        if !self.is_ready() {
            return None;
        }
        let mut raw = Vec::new();
        // length never exceeds MAX_FRAME_LEN, so this cannot fail
        let _ = raw.extend_from_slice(&self.buffer[..self.length]);
        let frame = Frame {
            raw,
            version: self.version,
            msg_type: self.msg_type,
            crc: self.crc,
        };
        self.reset();
        Some(frame)
    }

    fn header_nibble(&mut self, byte: u8) -> Result<u8, FrameError> {
        match nibble_value(byte) {
            Some(n) => Ok(n),
            None => {
                self.reset();
                Err(FrameError::InvalidHeader)
            }
        }
    }

    fn store(&mut self, byte: u8) {
        self.buffer[self.counter] = byte;
        self.counter += 1;
    }
}
