//! # Reborn Protocol Library
//!
//! Wire-level implementation of the Reborn/Graal-family client protocol.
//!
//! ## Architecture
//!
//! The protocol is layered bottom-up:
//!
//! ### 1. Codecs ([`codecs`])
//! The biased-by-32 base-224 integer encodings and length-prefixed
//! strings used by every packet:
//! - GChar: 1 byte (0..=223)
//! - GShort / GInt3 / GInt4 / GInt5: 2..5 fixed digits, little-endian
//! - GUInt: variable width for large lengths
//! - GString: GChar length prefix + raw bytes
//!
//! ### 2. Frames ([`framing`], [`cipher`], [`compression`])
//! `[u16 BE length][payload]` framing with per-generation compression
//! (none/zlib/bzip2/auto) and obfuscation (marker splice or XOR stream,
//! one cipher per direction).
//!
//! ### 3. Sub-packets ([`reader`], [`packets`])
//! Newline-separated sub-packet splitting with the RAW_DATA byte-counted
//! escape, and the id catalogues for both directions.
//!
//! ### 4. Payloads ([`props`], [`builder`], [`rc`])
//! The player-property encoding table and the pure builders for every
//! outbound action, including the RC family.

pub mod builder;
pub mod cipher;
pub mod codecs;
pub mod compression;
pub mod framing;
pub mod packets;
pub mod props;
pub mod rc;
pub mod reader;

pub use builder::*;
pub use cipher::{CipherCoverage, StreamCipher};
pub use codecs::*;
pub use compression::{compress, decompress, CompressionType};
pub use framing::{FrameCodec, MAX_FRAME_PAYLOAD, MAX_GEN5_PAYLOAD};
pub use packets::{ClientPacketId, ServerPacketId};
pub use props::{read_prop_pairs, read_prop_value, write_prop_pairs, write_prop_value, PlayerProp, PropValue, PROP_COUNT};
pub use rc::*;
pub use reader::{SubPacket, SubPacketStream, MAX_RAW_WINDOW};
