//! Property tests for frame reassembly and CRC checking

use crema_protocol::hex::write_field;
use crema_protocol::{frame_crc, FrameAssembler, Response, Status, FRAME_START};
use proptest::prelude::*;

/// Build a request with a correct CRC around `body`
fn request(msg_type: u8, body: &[u8]) -> Vec<u8> {
    let len = 8 + body.len();
    let mut buf = vec![b'0'; len];
    buf[0] = FRAME_START;
    buf[1] = b'1';
    write_field(&mut buf, 2, 1, len as u32).unwrap();
    write_field(&mut buf, 4, 1, u32::from(msg_type)).unwrap();
    buf[8..].copy_from_slice(body);
    let crc = frame_crc(&buf);
    write_field(&mut buf, 6, 1, u32::from(crc)).unwrap();
    buf
}

fn hex_body() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(
        prop::sample::select(b"0123456789ABCDEF".to_vec()),
        0..200,
    )
}

proptest! {
    #[test]
    fn single_frame_is_reassembled_intact(msg_type in 0u8..=0x6F, body in hex_body()) {
        let bytes = request(msg_type, &body);
        let mut assembler = FrameAssembler::new();
        assembler.feed_bytes(&bytes).unwrap();

        let frame = assembler.take().unwrap();
        prop_assert_eq!(frame.as_bytes(), &bytes[..]);
        prop_assert_eq!(frame.msg_type(), msg_type);
        prop_assert!(frame.crc_ok());
    }

    #[test]
    fn single_bit_flip_is_detected(
        body in hex_body(),
        position in any::<prop::sample::Index>(),
        bit in 0u8..8,
    ) {
        let mut bytes = request(0x01, &body);
        // Header flips either corrupt the framing or are caught by the CRC
        let i = 8 + position.index(body.len().max(1));
        prop_assume!(i < bytes.len());
        bytes[i] ^= 1 << bit;
        prop_assume!(bytes[i] != FRAME_START);

        let mut assembler = FrameAssembler::new();
        assembler.feed_bytes(&bytes).unwrap();
        let frame = assembler.take().unwrap();
        prop_assert!(!frame.crc_ok());
    }

    #[test]
    fn resync_discards_partial_frame(
        partial in hex_body(),
        cut in 1usize..40,
        body in hex_body(),
    ) {
        let aborted = request(0x02, &partial);
        let cut = cut.min(aborted.len() - 1);
        let fresh = request(0x33, &body);

        let mut assembler = FrameAssembler::new();
        // Header errors in the aborted prefix are irrelevant to what follows
        let _ = assembler.feed_bytes(&aborted[..cut]);
        assembler.feed_bytes(&fresh).unwrap();

        let frame = assembler.take().unwrap();
        prop_assert_eq!(frame.as_bytes(), &fresh[..]);
        prop_assert!(frame.crc_ok());
    }

    #[test]
    fn replies_always_carry_valid_crc(
        msg_type in any::<u8>(),
        fields in prop::collection::vec(any::<u16>(), 0..50),
    ) {
        let mut response = Response::new(msg_type);
        response.extend_u16(&fields).unwrap();
        let bytes = response.finish(Status::Success).to_vec();

        let mut assembler = FrameAssembler::new();
        assembler.feed_bytes(&bytes).unwrap();
        let frame = assembler.take().unwrap();
        prop_assert!(frame.crc_ok());
        prop_assert_eq!(frame.len(), 10 + 4 * fields.len());
        prop_assert_eq!(frame.field(8, 2).unwrap(), 0x01);
    }
}
