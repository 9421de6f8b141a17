//! Reply frame builder
//!
//! A reply echoes the request header, carries a status at characters 8..10
//! and appends 4-character fields from character 10 onward. Length and CRC
//! are only filled in by [`Response::finish`].

use heapless::Vec;

use crate::crc::frame_crc;
use crate::frame::{
    Frame, FrameError, CRC_FIELD, CRC_PLACEHOLDER, FRAME_START, LENGTH_OFFSET, MAX_FRAME_LEN,
    PAYLOAD_OFFSET, PROTOCOL_VERSION, STATUS_OFFSET, TYPE_OFFSET, VERSION_OFFSET,
};
use crate::hex::{nibble_char, write_field};
use crate::status::Status;

/// Reply under construction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    buf: Vec<u8, MAX_FRAME_LEN>,
}

impl Response {
    /// Start a reply for `msg_type` with an empty payload
    pub fn new(msg_type: u8) -> Self {
        let mut buf = Vec::new();
        let _ = buf.resize(PAYLOAD_OFFSET, b'0');
        buf[0] = FRAME_START;
        buf[VERSION_OFFSET] = nibble_char(PROTOCOL_VERSION);
        buf[TYPE_OFFSET] = nibble_char(msg_type >> 4);
        buf[TYPE_OFFSET + 1] = nibble_char(msg_type & 0x0F);
        Self { buf }
    }

    /// Start a reply that echoes the header of `request`
    ///
    /// The version and type characters are copied as received, so a reply to
    /// a request with the wrong version still carries that version.
    pub fn to(request: &Frame) -> Self {
        let mut response = Self::new(request.msg_type());
        let raw = request.as_bytes();
        response.buf[VERSION_OFFSET] = raw[VERSION_OFFSET];
        response.buf[TYPE_OFFSET..TYPE_OFFSET + 2].copy_from_slice(&raw[TYPE_OFFSET..TYPE_OFFSET + 2]);
        response
    }

    /// Append a 2-byte field (4 characters)
    pub fn push_u16(&mut self, value: u16) -> Result<(), FrameError> {
        self.push(2, u32::from(value))
    }

    /// Append a 1-byte field (2 characters)
    pub fn push_u8(&mut self, value: u8) -> Result<(), FrameError> {
        self.push(1, u32::from(value))
    }

    /// Append every value as a 2-byte field
    pub fn extend_u16(&mut self, values: &[u16]) -> Result<(), FrameError> {
        values.iter().try_for_each(|&v| self.push_u16(v))
    }

    /// Number of payload characters appended so far
    pub fn payload_len(&self) -> usize {
        self.buf.len() - PAYLOAD_OFFSET
    }

    /// Message type echoed by this reply
    pub fn msg_type(&self) -> u8 {
        let hi = crate::hex::nibble_value(self.buf[TYPE_OFFSET]).unwrap_or(0);
        let lo = crate::hex::nibble_value(self.buf[TYPE_OFFSET + 1]).unwrap_or(0);
        (hi << 4) | lo
    }

    /// Fill in status, length and CRC and return the wire bytes
    pub fn finish(&mut self, status: Status) -> &[u8] {
        let len = self.buf.len();
        // Both fields fit by construction: len <= 255 and status is one byte
        let _ = write_field(&mut self.buf, STATUS_OFFSET, 1, u32::from(status.code()));
        let _ = write_field(&mut self.buf, LENGTH_OFFSET, 1, len as u32);
        self.buf[CRC_FIELD].copy_from_slice(&CRC_PLACEHOLDER);
        let crc = frame_crc(&self.buf);
        let _ = write_field(&mut self.buf, CRC_FIELD.start, 1, u32::from(crc));
        &self.buf
    }

    fn push(&mut self, byte_count: usize, value: u32) -> Result<(), FrameError> {
        let at = self.buf.len();
        self.buf
            .resize(at + byte_count * 2, b'0')
            .map_err(|_| FrameError::PayloadTooLarge)?;
        write_field(&mut self.buf, at, byte_count, value).map_err(|_| FrameError::PayloadTooLarge)
    }
}
