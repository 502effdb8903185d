//! Level and GMAP model for the Reborn client
//!
//! Boards, levels with their entity collections, the text formats the
//! file pipeline delivers (`GLEVNW01` levels, `GRMAP001` maps), the GMAP
//! adjacency engine, and the segment cache.

pub mod board;
pub mod cache;
pub mod error;
pub mod gmap;
pub mod level;
pub mod parser;

pub use board::{tile_to_tileset, Board, BOARD_BYTES, BOARD_EDGE, BOARD_TILES, TILE_ID_MAX};
pub use cache::{LevelHandle, SegmentCache};
pub use error::{LevelError, Result};
pub use gmap::{CrossingOutcome, Gmap, GmapFile, PrefetchTracker, SegmentName, PREFETCH_TIMEOUT};
pub use level::{Chest, Item, Level, Link, Npc, Sign};
pub use parser::LevelParser;
