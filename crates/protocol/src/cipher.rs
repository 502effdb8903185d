//! Frame obfuscation cipher
//!
//! Generations 4 and 5 XOR the frame payload against a rolling iterator
//! stream seeded by the key byte exchanged at handshake. The iterator
//! steps once per 4-byte group (`iter = iter * 0x8088405 + key`) and the
//! group XORs against the iterator's little-endian bytes. Generation 3
//! does not XOR; it splices a single marker byte into the compressed
//! payload at an iterator-derived position.
//!
//! Each direction of a connection keeps its own cipher so the send and
//! receive streams advance independently.

use reborn_core::{RebornError, Result};

/// Iterator seed used by generations 3..=5
const ITERATOR_START: u32 = 0x04A8_0B38;

/// Multiplier of the iterator step
const ITERATOR_MUL: u32 = 0x0808_8405;

/// Marker byte generation 3 splices into the payload
const GEN3_MARKER: u8 = b')';

/// How much of a frame the XOR stream covers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CipherCoverage {
    /// The whole payload
    Full,
    /// Only the first N 4-byte groups; the rest passes through
    Groups(u32),
}

impl CipherCoverage {
    /// Coverage a Gen5 frame gets for a given compression choice.
    /// Compressed payloads only need their header scrambled; raw payloads
    /// get three times as much.
    pub fn for_compression(compressed: bool) -> Self {
        if compressed {
            Self::Groups(4)
        } else {
            Self::Groups(12)
        }
    }
}

/// One direction's cipher state
#[derive(Debug, Clone)]
pub struct StreamCipher {
    key: u8,
    iterator: u32,
}

impl StreamCipher {
    pub fn new(key: u8) -> Self {
        Self {
            key,
            iterator: ITERATOR_START,
        }
    }

    /// Step the iterator once and return its new value.
    fn step(&mut self) -> u32 {
        self.iterator = self
            .iterator
            .wrapping_mul(ITERATOR_MUL)
            .wrapping_add(self.key as u32);
        self.iterator
    }

    /// XOR `data` in place against the iterator stream.
    ///
    /// Symmetric: applying twice with the same starting state restores the
    /// input, which is how decryption works.
    pub fn apply(&mut self, data: &mut [u8], coverage: CipherCoverage) {
        let mut groups_left = match coverage {
            CipherCoverage::Full => u32::MAX,
            CipherCoverage::Groups(n) => n,
        };
        let mut stream = [0u8; 4];
        for (i, byte) in data.iter_mut().enumerate() {
            if i % 4 == 0 {
                if groups_left == 0 {
                    break;
                }
                groups_left -= 1;
                stream = self.step().to_le_bytes();
            }
            *byte ^= stream[i % 4];
        }
    }

    /// Splice the generation-3 marker byte into an outbound payload.
    ///
    /// The position depends on one iterator step, so both ends stay in
    /// lockstep as long as every frame goes through this exact path.
    pub fn gen3_insert(&mut self, payload: &[u8]) -> Vec<u8> {
        let pos = if payload.is_empty() {
            0
        } else {
            ((self.step() & 0xFFFF) as usize) % payload.len()
        };
        let mut out = Vec::with_capacity(payload.len() + 1);
        out.extend_from_slice(&payload[..pos]);
        out.push(GEN3_MARKER);
        out.extend_from_slice(&payload[pos..]);
        out
    }

    /// Remove the generation-3 marker byte from an inbound payload.
    pub fn gen3_remove(&mut self, payload: &[u8]) -> Result<Vec<u8>> {
        if payload.is_empty() {
            return Err(RebornError::TransportCorrupt(
                "empty generation-3 payload".into(),
            ));
        }
        let original_len = payload.len() - 1;
        let pos = if original_len == 0 {
            0
        } else {
            ((self.step() & 0xFFFF) as usize) % original_len
        };
        if payload[pos] != GEN3_MARKER {
            return Err(RebornError::TransportCorrupt(format!(
                "generation-3 marker missing at offset {}",
                pos
            )));
        }
        let mut out = Vec::with_capacity(original_len);
        out.extend_from_slice(&payload[..pos]);
        out.extend_from_slice(&payload[pos + 1..]);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_xor_is_symmetric() {
        let mut enc = StreamCipher::new(42);
        let mut dec = StreamCipher::new(42);

        let original: Vec<u8> = (0..100u8).collect();
        let mut data = original.clone();

        enc.apply(&mut data, CipherCoverage::Full);
        assert_ne!(data, original);

        dec.apply(&mut data, CipherCoverage::Full);
        assert_eq!(data, original);
    }

    #[test]
    fn test_limited_coverage_leaves_tail_alone() {
        let mut cipher = StreamCipher::new(7);
        let original: Vec<u8> = (0..64u8).collect();
        let mut data = original.clone();

        cipher.apply(&mut data, CipherCoverage::Groups(4));

        // First 16 bytes scrambled, rest untouched
        assert_ne!(&data[..16], &original[..16]);
        assert_eq!(&data[16..], &original[16..]);
    }

    #[test]
    fn test_streams_diverge_per_direction() {
        let mut a = StreamCipher::new(9);
        let mut b = StreamCipher::new(9);

        let mut first = vec![0u8; 8];
        a.apply(&mut first, CipherCoverage::Full);

        // b has not advanced; encrypting with b now matches a's FIRST frame,
        // not its second.
        let mut second_a = vec![0u8; 8];
        a.apply(&mut second_a, CipherCoverage::Full);
        let mut first_b = vec![0u8; 8];
        b.apply(&mut first_b, CipherCoverage::Full);

        assert_eq!(first, first_b);
        assert_ne!(second_a, first_b);
    }

    #[test]
    fn test_gen3_marker_roundtrip() {
        let mut enc = StreamCipher::new(123);
        let mut dec = StreamCipher::new(123);

        for len in [1usize, 2, 17, 300] {
            let payload: Vec<u8> = (0..len).map(|i| (i % 200) as u8 + 1).collect();
            let spliced = enc.gen3_insert(&payload);
            assert_eq!(spliced.len(), payload.len() + 1);
            let restored = dec.gen3_remove(&spliced).unwrap();
            assert_eq!(restored, payload, "failed for len {}", len);
        }
    }

    #[test]
    fn test_gen3_detects_missing_marker() {
        let mut enc = StreamCipher::new(5);
        let payload = vec![1u8; 32];
        let mut spliced = enc.gen3_insert(&payload);

        // Corrupt every byte so the marker cannot be where it is expected
        for b in spliced.iter_mut() {
            *b = 0;
        }
        let mut dec = StreamCipher::new(5);
        assert!(dec.gen3_remove(&spliced).is_err());
    }

    #[test]
    fn test_deterministic_across_instances() {
        let mut a = StreamCipher::new(50);
        let mut b = StreamCipher::new(50);
        let mut data_a = vec![0xAAu8; 40];
        let mut data_b = vec![0xAAu8; 40];
        a.apply(&mut data_a, CipherCoverage::Groups(12));
        b.apply(&mut data_b, CipherCoverage::Groups(12));
        assert_eq!(data_a, data_b);
    }
}
