//! Core types shared by every crate in the Reborn client workspace

pub mod error;
pub mod positions;
pub mod types;

pub use error::{DisconnectReason, RebornError, Result};
pub use positions::{LocalPos, SegmentCoord, WorldPos, SEGMENT_TILES};
pub use types::{ClientType, Direction, Generation, NpcId, PlayerId};
