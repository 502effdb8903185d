//! Frame encode/decode
//!
//! Every TCP frame is `[u16 big-endian length][payload]`. The payload
//! pipeline depends on the negotiated generation:
//!
//! | Generation | Compression          | Obfuscation            |
//! |------------|----------------------|------------------------|
//! | Gen1       | none                 | none                   |
//! | Gen2       | zlib                 | none                   |
//! | Gen3       | zlib                 | spliced marker byte    |
//! | Gen4       | bzip2                | XOR stream, 4 groups   |
//! | Gen5       | per-frame tag 0/1/2  | XOR stream, 4/12 groups|
//!
//! A Gen5 receiver honors whatever tag arrives regardless of what it
//! would pick itself. The codec holds one cipher per direction; frames
//! MUST pass through it in wire order or the streams desynchronize.

use crate::cipher::{CipherCoverage, StreamCipher};
use crate::compression::{compress, decompress, CompressionType};
use reborn_core::{Generation, RebornError, Result};

/// Largest payload a frame can carry after the length header
pub const MAX_FRAME_PAYLOAD: usize = u16::MAX as usize;

/// Largest pre-compression payload a Gen5 frame accepts
pub const MAX_GEN5_PAYLOAD: usize = 0xFFFC;

/// Per-connection frame codec
#[derive(Debug)]
pub struct FrameCodec {
    generation: Generation,
    send_cipher: StreamCipher,
    recv_cipher: StreamCipher,
}

impl FrameCodec {
    pub fn new(generation: Generation, key: u8) -> Self {
        Self {
            generation,
            send_cipher: StreamCipher::new(key),
            recv_cipher: StreamCipher::new(key),
        }
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Frame a payload without compression or obfuscation.
    ///
    /// Used for the version sub-packet that precedes key agreement; there
    /// is nothing to cipher with yet.
    pub fn encode_plaintext(payload: &[u8]) -> Result<Vec<u8>> {
        if payload.len() > MAX_FRAME_PAYLOAD {
            return Err(RebornError::ValueOutOfRange(format!(
                "frame payload of {} bytes",
                payload.len()
            )));
        }
        let mut out = Vec::with_capacity(2 + payload.len());
        out.extend_from_slice(&(payload.len() as u16).to_be_bytes());
        out.extend_from_slice(payload);
        Ok(out)
    }

    /// Encode one outbound frame, length header included.
    pub fn encode(&mut self, payload: &[u8]) -> Result<Vec<u8>> {
        let body = match self.generation {
            Generation::Gen1 => payload.to_vec(),
            Generation::Gen2 => compress(payload, CompressionType::Zlib)?,
            Generation::Gen3 => {
                let compressed = compress(payload, CompressionType::Zlib)?;
                self.send_cipher.gen3_insert(&compressed)
            }
            Generation::Gen4 => {
                let mut compressed = compress(payload, CompressionType::Bzip2)?;
                self.send_cipher
                    .apply(&mut compressed, CipherCoverage::Groups(4));
                compressed
            }
            Generation::Gen5 => {
                if payload.len() > MAX_GEN5_PAYLOAD {
                    return Err(RebornError::ValueOutOfRange(format!(
                        "generation-5 frame of {} bytes exceeds {}",
                        payload.len(),
                        MAX_GEN5_PAYLOAD
                    )));
                }
                let method = CompressionType::pick_for_len(payload.len());
                let mut compressed = compress(payload, method)?;
                self.send_cipher.apply(
                    &mut compressed,
                    CipherCoverage::for_compression(method != CompressionType::None),
                );
                let mut tagged = Vec::with_capacity(1 + compressed.len());
                tagged.push(method.tag());
                tagged.extend_from_slice(&compressed);
                tagged
            }
        };
        if body.len() > MAX_FRAME_PAYLOAD {
            return Err(RebornError::ValueOutOfRange(format!(
                "encoded frame of {} bytes",
                body.len()
            )));
        }
        let mut out = Vec::with_capacity(2 + body.len());
        out.extend_from_slice(&(body.len() as u16).to_be_bytes());
        out.extend_from_slice(&body);
        Ok(out)
    }

    /// Decode one inbound frame payload (the bytes after the length
    /// header) into the sub-packet stream it carries.
    pub fn decode(&mut self, frame: &[u8]) -> Result<Vec<u8>> {
        match self.generation {
            Generation::Gen1 => Ok(frame.to_vec()),
            Generation::Gen2 => decompress(frame, CompressionType::Zlib),
            Generation::Gen3 => {
                let stripped = self.recv_cipher.gen3_remove(frame)?;
                decompress(&stripped, CompressionType::Zlib)
            }
            Generation::Gen4 => {
                let mut data = frame.to_vec();
                self.recv_cipher.apply(&mut data, CipherCoverage::Groups(4));
                decompress(&data, CompressionType::Bzip2)
            }
            Generation::Gen5 => {
                let (&tag, rest) = frame
                    .split_first()
                    .ok_or_else(|| RebornError::TransportCorrupt("empty generation-5 frame".into()))?;
                let method = CompressionType::from_tag(tag).ok_or_else(|| {
                    RebornError::TransportCorrupt(format!("unknown compression tag {}", tag))
                })?;
                let mut data = rest.to_vec();
                self.recv_cipher.apply(
                    &mut data,
                    CipherCoverage::for_compression(method != CompressionType::None),
                );
                decompress(&data, method)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Encode with one codec, decode with a peer holding the same key.
    fn roundtrip(generation: Generation, payload: &[u8]) -> Vec<u8> {
        let mut sender = FrameCodec::new(generation, 77);
        let mut receiver = FrameCodec::new(generation, 77);
        let wire = sender.encode(payload).unwrap();
        let (len_hdr, body) = wire.split_at(2);
        assert_eq!(
            u16::from_be_bytes([len_hdr[0], len_hdr[1]]) as usize,
            body.len()
        );
        receiver.decode(body).unwrap()
    }

    #[test]
    fn test_frame_roundtrip_all_generations() {
        let payload = b"&hello world sub-packet\n";
        for generation in [
            Generation::Gen1,
            Generation::Gen2,
            Generation::Gen3,
            Generation::Gen4,
            Generation::Gen5,
        ] {
            assert_eq!(
                roundtrip(generation, payload),
                payload.to_vec(),
                "failed for {:?}",
                generation
            );
        }
    }

    #[test]
    fn test_gen5_large_payload_uses_bzip2_tag() {
        let payload = vec![7u8; 0x3000];
        let mut sender = FrameCodec::new(Generation::Gen5, 3);
        let wire = sender.encode(&payload).unwrap();
        assert_eq!(wire[2], CompressionType::Bzip2.tag());

        let mut receiver = FrameCodec::new(Generation::Gen5, 3);
        assert_eq!(receiver.decode(&wire[2..]).unwrap(), payload);
    }

    #[test]
    fn test_gen5_small_payload_stays_raw() {
        let payload = b"&x\n";
        let mut sender = FrameCodec::new(Generation::Gen5, 3);
        let wire = sender.encode(payload).unwrap();
        assert_eq!(wire[2], CompressionType::None.tag());
    }

    #[test]
    fn test_gen5_receiver_accepts_any_tag() {
        // A sender that always zlib-compresses even below the threshold
        let payload = b"&x\n";
        let compressed = compress(payload, CompressionType::Zlib).unwrap();
        let mut cipher = StreamCipher::new(9);
        let mut data = compressed;
        cipher.apply(&mut data, CipherCoverage::Groups(4));
        let mut frame = vec![CompressionType::Zlib.tag()];
        frame.extend_from_slice(&data);

        let mut receiver = FrameCodec::new(Generation::Gen5, 9);
        assert_eq!(receiver.decode(&frame).unwrap(), payload.to_vec());
    }

    #[test]
    fn test_sequential_frames_stay_in_sync() {
        let mut sender = FrameCodec::new(Generation::Gen5, 200);
        let mut receiver = FrameCodec::new(Generation::Gen5, 200);
        for i in 0..10u8 {
            let payload = vec![i; 20 + i as usize];
            let wire = sender.encode(&payload).unwrap();
            assert_eq!(receiver.decode(&wire[2..]).unwrap(), payload, "frame {}", i);
        }
    }

    #[test]
    fn test_corrupt_frame_fails_decode() {
        let mut sender = FrameCodec::new(Generation::Gen4, 10);
        let mut wire = sender.encode(b"some sub-packets here").unwrap();
        let last = wire.len() - 1;
        wire[last] ^= 0xFF;

        let mut receiver = FrameCodec::new(Generation::Gen4, 10);
        assert!(matches!(
            receiver.decode(&wire[2..]),
            Err(RebornError::TransportCorrupt(_))
        ));
    }

    #[test]
    fn test_gen5_rejects_oversized_payload() {
        let mut sender = FrameCodec::new(Generation::Gen5, 1);
        let payload = vec![0u8; MAX_GEN5_PAYLOAD + 1];
        assert!(sender.encode(&payload).is_err());
    }

    #[test]
    fn test_plaintext_frame() {
        let wire = FrameCodec::encode_plaintext(b"version").unwrap();
        assert_eq!(&wire[..2], &7u16.to_be_bytes());
        assert_eq!(&wire[2..], b"version");
    }
}
