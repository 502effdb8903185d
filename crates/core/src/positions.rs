//! Position types for the segment/world coordinate model
//!
//! Every GMAP segment is a 64x64 tile board. A position is either local
//! (tiles within the current segment) or world (tiles from the map origin).
//! The two are related by `world = segment * 64 + local`.

use serde::{Deserialize, Serialize};

/// Tiles per segment edge
pub const SEGMENT_TILES: i32 = 64;

/// Grid cell of a segment inside a GMAP
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SegmentCoord {
    /// Column (0-based, `a` in the segment name)
    pub col: i32,

    /// Row (0-based, decimal suffix in the segment name)
    pub row: i32,
}

impl SegmentCoord {
    pub const fn new(col: i32, row: i32) -> Self {
        Self { col, row }
    }
}

/// Position in tiles within a single segment, half-tile resolution
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocalPos {
    pub x: f32,
    pub y: f32,
}

impl LocalPos {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// True when the position lies inside the segment board.
    pub fn in_bounds(&self) -> bool {
        self.x >= 0.0 && self.x < SEGMENT_TILES as f32 && self.y >= 0.0 && self.y < SEGMENT_TILES as f32
    }

    /// Convert to world tiles given the containing segment.
    pub fn to_world(&self, segment: SegmentCoord) -> WorldPos {
        WorldPos {
            x: segment.col as f32 * SEGMENT_TILES as f32 + self.x,
            y: segment.row as f32 * SEGMENT_TILES as f32 + self.y,
        }
    }
}

/// Position in tiles from the GMAP origin
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WorldPos {
    pub x: f32,
    pub y: f32,
}

impl WorldPos {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Split into the containing segment and the offset inside it.
    ///
    /// Any world coordinate maps to exactly one segment; fractional parts
    /// stay with the local offset.
    pub fn to_local(&self) -> (LocalPos, SegmentCoord) {
        let col = (self.x / SEGMENT_TILES as f32).floor() as i32;
        let row = (self.y / SEGMENT_TILES as f32).floor() as i32;
        let local = LocalPos {
            x: self.x - col as f32 * SEGMENT_TILES as f32,
            y: self.y - row as f32 * SEGMENT_TILES as f32,
        };
        (local, SegmentCoord::new(col, row))
    }

    pub fn distance_to(&self, other: WorldPos) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_to_world() {
        let local = LocalPos::new(30.5, 12.0);
        let world = local.to_world(SegmentCoord::new(3, 8));
        assert_eq!(world.x, 3.0 * 64.0 + 30.5);
        assert_eq!(world.y, 8.0 * 64.0 + 12.0);
    }

    #[test]
    fn test_world_to_local() {
        let world = WorldPos::new(3.0 * 64.0 + 30.5, 8.0 * 64.0 + 12.0);
        let (local, segment) = world.to_local();
        assert_eq!(segment, SegmentCoord::new(3, 8));
        assert!((local.x - 30.5).abs() < 1e-5);
        assert!((local.y - 12.0).abs() < 1e-5);
    }

    #[test]
    fn test_roundtrip_preserves_fraction() {
        let local = LocalPos::new(63.5, 0.5);
        let seg = SegmentCoord::new(0, 1);
        let (back, seg_back) = local.to_world(seg).to_local();
        assert_eq!(seg, seg_back);
        assert!((back.x - 63.5).abs() < 1e-5);
        assert!((back.y - 0.5).abs() < 1e-5);
    }

    #[test]
    fn test_in_bounds() {
        assert!(LocalPos::new(0.0, 0.0).in_bounds());
        assert!(LocalPos::new(63.5, 63.5).in_bounds());
        assert!(!LocalPos::new(64.0, 0.0).in_bounds());
        assert!(!LocalPos::new(-0.5, 10.0).in_bounds());
    }

    #[test]
    fn test_distance() {
        let a = WorldPos::new(0.0, 0.0);
        let b = WorldPos::new(3.0, 4.0);
        assert!((a.distance_to(b) - 5.0).abs() < 1e-5);
    }
}
