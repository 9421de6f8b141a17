//! Host link protocol
//!
//! The Linux host talks to the controller over a UART using short frames
//! made of printable characters. Apart from the start marker and the single
//! version digit, every numeric field travels as ASCII hex nibbles, most
//! significant nibble first.
//!
//! ```text
//! ┌─────┬─────────┬────────┬──────┬──────┬────────┬─────────────┐
//! │ '/' │ VERSION │ LENGTH │ TYPE │ CRC  │ STATUS │ PAYLOAD     │
//! │ 0   │ 1       │ 2..3   │ 4..5 │ 6..7 │ 8..9   │ 10..LENGTH  │
//! └─────┴─────────┴────────┴──────┴──────┴────────┴─────────────┘
//! ```
//!
//! LENGTH counts every character of the frame, start marker included, and
//! never exceeds 255. STATUS is only meaningful in replies; requests put
//! their own fields from offset 8 onwards.

#![no_std]
#![deny(unsafe_code)]

pub mod crc;
pub mod frame;
pub mod hex;
pub mod messages;
pub mod response;
pub mod status;

pub use crc::{crc8, frame_crc};
pub use frame::{Frame, FrameAssembler, FrameError, FRAME_START, MAX_FRAME_LEN, PROTOCOL_VERSION};
pub use hex::FieldError;
pub use messages::{MessageClass, MessageType};
pub use response::Response;
pub use status::Status;
