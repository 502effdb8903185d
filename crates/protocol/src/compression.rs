//! Compression layer for protocol frames

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use reborn_core::{RebornError, Result};
use std::io::{Read, Write};

/// Compression method of a frame payload
///
/// The discriminants are the one-byte tags a Gen5 frame carries in front of
/// its payload; older generations imply the method from the generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionType {
    None = 0,
    Zlib = 1,
    Bzip2 = 2,
}

impl CompressionType {
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Self::None),
            1 => Some(Self::Zlib),
            2 => Some(Self::Bzip2),
            _ => None,
        }
    }

    pub fn tag(&self) -> u8 {
        *self as u8
    }

    /// Method a Gen5 sender picks for a payload of this size: bzip2 pays
    /// off only on big boards, zlib on anything beyond a chat line.
    pub fn pick_for_len(len: usize) -> Self {
        if len > 0x2000 {
            Self::Bzip2
        } else if len > 55 {
            Self::Zlib
        } else {
            Self::None
        }
    }
}

/// Compress data using the specified method
pub fn compress(data: &[u8], method: CompressionType) -> Result<Vec<u8>> {
    match method {
        CompressionType::None => Ok(data.to_vec()),
        CompressionType::Zlib => {
            let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(data)?;
            Ok(encoder.finish()?)
        }
        CompressionType::Bzip2 => {
            let mut compressed = Vec::new();
            {
                let mut encoder =
                    bzip2::write::BzEncoder::new(&mut compressed, bzip2::Compression::default());
                encoder.write_all(data)?;
            }
            Ok(compressed)
        }
    }
}

/// Decompress data using the specified method
///
/// A decode failure means the frame survived the cipher with garbage in
/// it; that is a `TransportCorrupt` session-fatal condition.
pub fn decompress(data: &[u8], method: CompressionType) -> Result<Vec<u8>> {
    match method {
        CompressionType::None => Ok(data.to_vec()),
        CompressionType::Zlib => {
            let mut decoder = ZlibDecoder::new(data);
            let mut decompressed = Vec::new();
            decoder
                .read_to_end(&mut decompressed)
                .map_err(|e| RebornError::TransportCorrupt(format!("zlib: {}", e)))?;
            Ok(decompressed)
        }
        CompressionType::Bzip2 => {
            let mut decoder = bzip2::read::BzDecoder::new(data);
            let mut decompressed = Vec::new();
            decoder
                .read_to_end(&mut decompressed)
                .map_err(|e| RebornError::TransportCorrupt(format!("bzip2: {}", e)))?;
            Ok(decompressed)
        }
    }
}
