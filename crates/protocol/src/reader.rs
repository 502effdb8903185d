//! Sub-packet stream splitting
//!
//! A decoded frame carries newline-separated sub-packets, each starting
//! with its id as `byte - 32`. Two things complicate a plain split:
//!
//! - `RAW_DATA(N)` switches the stream into a byte-counted mode where the
//!   next N bytes form one sub-packet regardless of newlines, and the N
//!   bytes may span several frames.
//! - A frame's final sub-packet may arrive without a trailing newline.
//!
//! The splitter owns that state, so callers just feed decoded frames and
//! receive whole sub-packets in arrival order.

use crate::codecs::read_gint3;
use crate::packets::ServerPacketId;
use bytes::BytesMut;

/// Upper bound a RAW_DATA window may declare. Anything beyond this is a
/// corrupt length; the frame is dropped and the stream keeps going.
pub const MAX_RAW_WINDOW: usize = 8 * 1024 * 1024;

/// Byte length of a LEVEL_BOARD body (4096 tiles, 2 bytes each)
const BOARD_BODY_LEN: usize = 8192;

/// One decoded sub-packet
#[derive(Debug, Clone, PartialEq)]
pub struct SubPacket {
    /// Decoded packet id (wire byte minus 32)
    pub id: u8,

    /// Body bytes after the id
    pub body: BytesMut,
}

impl SubPacket {
    pub fn new(id: u8, body: &[u8]) -> Self {
        Self {
            id,
            body: BytesMut::from(body),
        }
    }
}

/// Stateful splitter of decoded frames into sub-packets
#[derive(Debug, Default)]
pub struct SubPacketStream {
    /// Bytes still owed to an open RAW_DATA window
    raw_remaining: usize,

    /// Accumulated window bytes, emitted once complete
    raw_accum: BytesMut,
}

impl SubPacketStream {
    pub fn new() -> Self {
        Self::default()
    }

    /// True while a RAW_DATA window is waiting for more bytes.
    pub fn in_raw_window(&self) -> bool {
        self.raw_remaining > 0
    }

    /// Split one decoded frame, honoring any open RAW_DATA window.
    pub fn feed(&mut self, frame: &[u8]) -> Vec<SubPacket> {
        let mut packets = Vec::new();
        let mut pos = 0;

        while pos < frame.len() {
            if self.raw_remaining > 0 {
                let take = self.raw_remaining.min(frame.len() - pos);
                self.raw_accum.extend_from_slice(&frame[pos..pos + take]);
                self.raw_remaining -= take;
                pos += take;

                if self.raw_remaining == 0 {
                    let mut window = std::mem::take(&mut self.raw_accum);
                    if window.is_empty() {
                        continue;
                    }
                    let id = window[0].saturating_sub(32);
                    let _ = window.split_to(1);
                    packets.push(SubPacket { id, body: window });
                }
                continue;
            }

            // LEVEL_BOARD carries its tiles inline without a RAW_DATA
            // window; the body is binary, so newline scanning would
            // shred it. Fixed length, taken verbatim.
            if frame[pos].saturating_sub(32) == ServerPacketId::LevelBoard.as_u8()
                && frame.len() - pos > BOARD_BODY_LEN
            {
                let body = &frame[pos + 1..pos + 1 + BOARD_BODY_LEN];
                packets.push(SubPacket::new(ServerPacketId::LevelBoard.as_u8(), body));
                pos += 1 + BOARD_BODY_LEN;
                if frame.get(pos) == Some(&b'\n') {
                    pos += 1;
                }
                continue;
            }

            let line_end = frame[pos..]
                .iter()
                .position(|&b| b == b'\n')
                .map(|nl| pos + nl)
                .unwrap_or(frame.len());
            let line = &frame[pos..line_end];
            pos = line_end + 1;

            if line.is_empty() {
                continue;
            }

            let id = line[0].saturating_sub(32);
            let packet = SubPacket::new(id, &line[1..]);

            if id == ServerPacketId::RawData.as_u8() {
                match self.open_raw_window(&packet) {
                    Ok(()) => packets.push(packet),
                    Err(declared) => {
                        tracing::warn!(
                            declared,
                            "RAW_DATA window exceeds sanity bound, dropping rest of frame"
                        );
                        break;
                    }
                }
            } else {
                packets.push(packet);
            }
        }

        packets
    }

    fn open_raw_window(&mut self, packet: &SubPacket) -> std::result::Result<(), usize> {
        let mut body = packet.body.clone();
        let declared = match read_gint3(&mut body) {
            Ok(n) => n as usize,
            Err(_) => return Err(0),
        };
        if declared > MAX_RAW_WINDOW {
            return Err(declared);
        }
        self.raw_remaining = declared;
        self.raw_accum = BytesMut::with_capacity(declared.min(64 * 1024));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codecs::write_gint3;
    use bytes::BufMut;

    fn raw_data_header(n: u32) -> Vec<u8> {
        let mut buf = BytesMut::new();
        buf.put_u8(ServerPacketId::RawData.as_u8() + 32);
        write_gint3(&mut buf, n).unwrap();
        buf.put_u8(b'\n');
        buf.to_vec()
    }

    #[test]
    fn test_split_newline_separated() {
        let mut stream = SubPacketStream::new();
        let frame = b"\x26hello\n\x29world\n";
        let packets = stream.feed(frame);
        assert_eq!(packets.len(), 2);
        assert_eq!(packets[0].id, 6);
        assert_eq!(&packets[0].body[..], b"hello");
        assert_eq!(packets[1].id, 9);
        assert_eq!(&packets[1].body[..], b"world");
    }

    #[test]
    fn test_final_packet_without_newline() {
        let mut stream = SubPacketStream::new();
        let packets = stream.feed(b"\x26abc\n\x2a tail");
        assert_eq!(packets.len(), 2);
        assert_eq!(packets[1].id, 10);
        assert_eq!(&packets[1].body[..], b" tail");
    }

    #[test]
    fn test_empty_lines_skipped() {
        let mut stream = SubPacketStream::new();
        let packets = stream.feed(b"\n\n\x26x\n\n");
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].id, 6);
    }

    #[test]
    fn test_level_board_taken_verbatim() {
        let mut stream = SubPacketStream::new();

        // Board body riddled with newline bytes, then a normal packet
        let mut frame = vec![ServerPacketId::LevelBoard.as_u8() + 32];
        frame.extend(std::iter::repeat(b'\n').take(BOARD_BODY_LEN));
        frame.extend_from_slice(b"\x26after\n");

        let packets = stream.feed(&frame);
        assert_eq!(packets.len(), 2);
        assert_eq!(packets[0].id, ServerPacketId::LevelBoard.as_u8());
        assert_eq!(packets[0].body.len(), BOARD_BODY_LEN);
        assert_eq!(packets[1].id, 6);
        assert_eq!(&packets[1].body[..], b"after");
    }

    #[test]
    fn test_raw_window_ignores_newlines() {
        let mut stream = SubPacketStream::new();

        // BOARD_PACKET payload of 8 bytes, containing newlines
        let mut frame = raw_data_header(9);
        frame.push(101 + 32);
        frame.extend_from_slice(b"ab\ncd\nef");

        let packets = stream.feed(&frame);
        assert_eq!(packets.len(), 2);
        assert_eq!(packets[0].id, ServerPacketId::RawData.as_u8());
        assert_eq!(packets[1].id, 101);
        assert_eq!(&packets[1].body[..], b"ab\ncd\nef");
        assert!(!stream.in_raw_window());
    }

    #[test]
    fn test_raw_window_spans_frames() {
        let mut stream = SubPacketStream::new();

        let mut first = raw_data_header(11);
        first.push(101 + 32);
        first.extend_from_slice(b"12345");

        let packets = stream.feed(&first);
        assert_eq!(packets.len(), 1); // only the RAW_DATA announcement
        assert!(stream.in_raw_window());

        let packets = stream.feed(b"67890\x26next\n");
        assert_eq!(packets.len(), 2);
        assert_eq!(packets[0].id, 101);
        assert_eq!(&packets[0].body[..], b"1234567890");
        assert_eq!(packets[1].id, 6);
        assert_eq!(&packets[1].body[..], b"next");
    }

    #[test]
    fn test_oversized_raw_window_drops_frame() {
        let mut stream = SubPacketStream::new();
        let mut frame = raw_data_header((MAX_RAW_WINDOW + 1) as u32);
        frame.extend_from_slice(b"\x26should not appear\n");

        let packets = stream.feed(&frame);
        assert!(packets.is_empty());
        assert!(!stream.in_raw_window());

        // Stream keeps working on the next frame
        let packets = stream.feed(b"\x26ok\n");
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].id, 6);
    }
}
