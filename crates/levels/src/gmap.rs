//! GMAP engine: segment naming, grid, adjacency, boundary resolution
//!
//! A GMAP stitches 64x64 segments into one world. Segments are
//! addressable levels named `<base>-<col><row>.nw` where the column is a
//! lower-case letter run (`a` = 0, `z` = 25, `aa` = 26) and the row is a
//! decimal integer.
//!
//! Neighbor resolution goes through a directed adjacency map filled in
//! as segments register, never through arithmetic on the name: when a
//! gmap file lists unusual neighbors the client follows the file.

use crate::error::{LevelError, Result};
use nom::{
    bytes::complete::take_while1,
    combinator::all_consuming,
    sequence::pair,
    IResult,
};
use reborn_core::{Direction, LocalPos, SegmentCoord, SEGMENT_TILES};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Parsed segment name
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SegmentName {
    /// Name part before the cell suffix, e.g. `zlttp`
    pub base: String,

    /// Grid cell encoded in the suffix
    pub coord: SegmentCoord,
}

fn cell_suffix(input: &str) -> IResult<&str, (&str, &str)> {
    all_consuming(pair(
        take_while1(|c: char| c.is_ascii_lowercase()),
        take_while1(|c: char| c.is_ascii_digit()),
    ))(input)
}

/// Column letters to 0-based index: `a`..`z` then `aa`, `ab`, ...
fn letters_to_col(letters: &str) -> i32 {
    let mut acc: i64 = 0;
    for c in letters.bytes() {
        acc = acc * 26 + (c - b'a' + 1) as i64;
    }
    (acc - 1) as i32
}

/// Inverse of [`letters_to_col`].
fn col_to_letters(col: i32) -> String {
    let mut n = col as i64 + 1;
    let mut out = Vec::new();
    while n > 0 {
        let rem = ((n - 1) % 26) as u8;
        out.push(b'a' + rem);
        n = (n - 1) / 26;
    }
    out.reverse();
    String::from_utf8(out).expect("ascii letters")
}

impl SegmentName {
    /// Parse a level name into its base and grid cell.
    ///
    /// Returns `NotASegment` for standalone level names, which is how
    /// callers distinguish GMAP residency.
    pub fn parse(name: &str) -> Result<Self> {
        let stem = name
            .strip_suffix(".nw")
            .ok_or_else(|| LevelError::NotASegment(name.to_string()))?;
        let dash = stem
            .rfind('-')
            .ok_or_else(|| LevelError::NotASegment(name.to_string()))?;
        let (base, suffix) = (&stem[..dash], &stem[dash + 1..]);
        let (_, (letters, digits)) =
            cell_suffix(suffix).map_err(|_| LevelError::NotASegment(name.to_string()))?;
        let row: i32 = digits
            .parse()
            .map_err(|_| LevelError::NotASegment(name.to_string()))?;
        Ok(Self {
            base: base.to_string(),
            coord: SegmentCoord::new(letters_to_col(letters), row),
        })
    }

    /// Reassemble the level name.
    pub fn to_level_name(&self) -> String {
        format!(
            "{}-{}{}.nw",
            self.base,
            col_to_letters(self.coord.col),
            self.coord.row
        )
    }

    /// Name of the same base at another cell.
    pub fn at(&self, coord: SegmentCoord) -> SegmentName {
        SegmentName {
            base: self.base.clone(),
            coord,
        }
    }
}

/// Parsed `.gmap` file
#[derive(Debug, Clone, Default)]
pub struct GmapFile {
    pub name: String,
    pub width: u32,
    pub height: u32,

    /// Level name of each occupied grid cell
    pub segments: Vec<(String, SegmentCoord)>,
}

impl GmapFile {
    /// Parse gmap text.
    ///
    /// # File Format
    /// ```text
    /// GRMAP001
    /// WIDTH 8
    /// HEIGHT 8
    /// LEVELNAMES
    /// "zlttp-a0.nw","zlttp-b0.nw",...
    /// ...
    /// LEVELNAMESEND
    /// ```
    ///
    /// The older `LEVELS`/`LEVELSEND` block with `name col row` lines is
    /// accepted too.
    pub fn parse(name: &str, data: &str) -> Result<Self> {
        let mut lines = data.lines();
        let magic = lines
            .next()
            .map(str::trim)
            .ok_or_else(|| LevelError::InvalidGmap("empty file".into()))?;
        if magic != "GRMAP001" && magic != "GMAP001" {
            return Err(LevelError::InvalidGmap(format!("bad magic {:?}", magic)));
        }

        let mut gmap = GmapFile {
            name: name.to_string(),
            ..Default::default()
        };

        let mut in_names = false;
        let mut in_levels = false;
        let mut names_row: i32 = 0;

        for raw in lines {
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }

            if in_names {
                if line == "LEVELNAMESEND" {
                    in_names = false;
                    continue;
                }
                for (col, quoted) in line.split(',').enumerate() {
                    let level = quoted.trim().trim_matches('"');
                    if !level.is_empty() {
                        gmap.segments
                            .push((level.to_string(), SegmentCoord::new(col as i32, names_row)));
                    }
                }
                names_row += 1;
                continue;
            }

            if in_levels {
                if line == "LEVELSEND" {
                    in_levels = false;
                    continue;
                }
                let parts: Vec<&str> = line.split_whitespace().collect();
                if parts.len() >= 3 {
                    if let (Ok(col), Ok(row)) = (parts[1].parse(), parts[2].parse()) {
                        gmap.segments
                            .push((parts[0].to_string(), SegmentCoord::new(col, row)));
                    }
                }
                continue;
            }

            if line == "LEVELNAMES" {
                in_names = true;
            } else if line == "LEVELS" {
                in_levels = true;
            } else if let Some(rest) = line.strip_prefix("WIDTH ") {
                gmap.width = rest.trim().parse().unwrap_or(0);
            } else if let Some(rest) = line.strip_prefix("HEIGHT ") {
                gmap.height = rest.trim().parse().unwrap_or(0);
            }
        }

        if gmap.segments.is_empty() {
            return Err(LevelError::InvalidGmap("no segments listed".into()));
        }
        Ok(gmap)
    }
}

/// Outcome of resolving a boundary crossing
#[derive(Debug, Clone, PartialEq)]
pub enum CrossingOutcome {
    /// No neighbor in that direction; the boundary is a wall
    Blocked,

    /// The move lands in an adjacent segment
    Entered {
        target: String,
        coord: SegmentCoord,
        local: LocalPos,
    },
}

/// Runtime GMAP state: grid, directed adjacency, active segment
#[derive(Debug, Clone, Default)]
pub struct Gmap {
    pub name: String,
    pub width: u32,
    pub height: u32,

    cells: HashMap<SegmentCoord, String>,
    by_name: HashMap<String, SegmentCoord>,
    adjacency: HashMap<String, HashMap<Direction, String>>,

    /// Segment the camera currently lives in
    active: Option<String>,
}

impl Gmap {
    /// Build the grid and adjacency from a parsed gmap file.
    pub fn from_file(file: &GmapFile) -> Self {
        let mut gmap = Gmap {
            name: file.name.clone(),
            width: file.width,
            height: file.height,
            ..Default::default()
        };
        for (level, coord) in &file.segments {
            gmap.register_segment(level.clone(), *coord);
        }
        gmap
    }

    /// Record a segment at a grid cell and wire adjacency both ways with
    /// every neighbor already present.
    pub fn register_segment(&mut self, level: String, coord: SegmentCoord) {
        self.cells.insert(coord, level.clone());
        self.by_name.insert(level.clone(), coord);

        for dir in [Direction::Up, Direction::Left, Direction::Down, Direction::Right] {
            let neighbor_coord = Self::step(coord, dir);
            if let Some(neighbor) = self.cells.get(&neighbor_coord).cloned() {
                self.adjacency
                    .entry(level.clone())
                    .or_default()
                    .insert(dir, neighbor.clone());
                self.adjacency
                    .entry(neighbor)
                    .or_default()
                    .insert(dir.opposite(), level.clone());
            }
        }
    }

    fn step(coord: SegmentCoord, dir: Direction) -> SegmentCoord {
        match dir {
            Direction::Up => SegmentCoord::new(coord.col, coord.row - 1),
            Direction::Down => SegmentCoord::new(coord.col, coord.row + 1),
            Direction::Left => SegmentCoord::new(coord.col - 1, coord.row),
            Direction::Right => SegmentCoord::new(coord.col + 1, coord.row),
        }
    }

    /// Neighbor in a direction, from the adjacency map only.
    pub fn neighbor(&self, level: &str, dir: Direction) -> Option<&str> {
        self.adjacency.get(level)?.get(&dir).map(String::as_str)
    }

    pub fn segment_at(&self, coord: SegmentCoord) -> Option<&str> {
        self.cells.get(&coord).map(String::as_str)
    }

    pub fn coord_of(&self, level: &str) -> Option<SegmentCoord> {
        self.by_name.get(level).copied()
    }

    pub fn contains(&self, level: &str) -> bool {
        self.by_name.contains_key(level)
    }

    pub fn active_segment(&self) -> Option<&str> {
        self.active.as_deref()
    }

    pub fn set_active_segment(&mut self, level: &str) {
        self.active = Some(level.to_string());
    }

    pub fn segment_count(&self) -> usize {
        self.cells.len()
    }

    /// Segment names in the 3x3 window centered on a level, center
    /// excluded. These are the prefetch candidates when the center
    /// becomes active.
    pub fn window3x3(&self, center: &str) -> Vec<String> {
        let Some(coord) = self.coord_of(center) else {
            return Vec::new();
        };
        let mut out = Vec::new();
        for drow in -1..=1 {
            for dcol in -1..=1 {
                if dcol == 0 && drow == 0 {
                    continue;
                }
                let cell = SegmentCoord::new(coord.col + dcol, coord.row + drow);
                if let Some(level) = self.cells.get(&cell) {
                    out.push(level.clone());
                }
            }
        }
        out
    }

    /// Resolve a local position that stepped outside `[0, 64)` into the
    /// neighboring segment, or a wall at the edge of the world.
    ///
    /// The wrapped coordinate continues the motion: a step to `64.4`
    /// east lands at `0.4` in the east neighbor.
    pub fn resolve_crossing(&self, current: &str, x: f32, y: f32) -> CrossingOutcome {
        let edge = SEGMENT_TILES as f32;
        let dir = if x < 0.0 {
            Direction::Left
        } else if x >= edge {
            Direction::Right
        } else if y < 0.0 {
            Direction::Up
        } else if y >= edge {
            Direction::Down
        } else {
            return CrossingOutcome::Blocked;
        };

        let Some(target) = self.neighbor(current, dir) else {
            return CrossingOutcome::Blocked;
        };
        let Some(coord) = self.coord_of(target) else {
            return CrossingOutcome::Blocked;
        };

        let local = match dir {
            Direction::Left => LocalPos::new(x + edge, y),
            Direction::Right => LocalPos::new(x - edge, y),
            Direction::Up => LocalPos::new(x, y + edge),
            Direction::Down => LocalPos::new(x, y - edge),
        };

        CrossingOutcome::Entered {
            target: target.to_string(),
            coord,
            local,
        }
    }
}

/// Re-request window for outstanding segment fetches
pub const PREFETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Tracks which segments have an outstanding file request
#[derive(Debug, Default)]
pub struct PrefetchTracker {
    requested: HashMap<String, Instant>,
}

impl PrefetchTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a segment as requested. Returns false while a previous
    /// request is still inside the timeout window, true when the caller
    /// should actually send the request.
    pub fn mark_requested(&mut self, level: &str) -> bool {
        let now = Instant::now();
        match self.requested.get(level) {
            Some(at) if now.duration_since(*at) < PREFETCH_TIMEOUT => false,
            _ => {
                self.requested.insert(level.to_string(), now);
                true
            }
        }
    }

    /// A board arrived; the request is settled.
    pub fn complete(&mut self, level: &str) {
        self.requested.remove(level);
    }

    pub fn pending_count(&self) -> usize {
        self.requested.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_name_parse() {
        let seg = SegmentName::parse("zlttp-d8.nw").unwrap();
        assert_eq!(seg.base, "zlttp");
        assert_eq!(seg.coord, SegmentCoord::new(3, 8));
        assert_eq!(seg.to_level_name(), "zlttp-d8.nw");
    }

    #[test]
    fn test_segment_name_multi_digit_row() {
        let seg = SegmentName::parse("world-a12.nw").unwrap();
        assert_eq!(seg.coord, SegmentCoord::new(0, 12));
    }

    #[test]
    fn test_segment_name_multi_letter_col() {
        let seg = SegmentName::parse("big-aa3.nw").unwrap();
        assert_eq!(seg.coord, SegmentCoord::new(26, 3));
        assert_eq!(seg.to_level_name(), "big-aa3.nw");
    }

    #[test]
    fn test_segment_name_base_with_dash() {
        let seg = SegmentName::parse("new-world-c2.nw").unwrap();
        assert_eq!(seg.base, "new-world");
        assert_eq!(seg.coord, SegmentCoord::new(2, 2));
    }

    #[test]
    fn test_non_segment_names_rejected() {
        assert!(SegmentName::parse("onlinestartlocal.nw").is_err());
        assert!(SegmentName::parse("zlttp-d8.graal").is_err());
        assert!(SegmentName::parse("zlttp-8d.nw").is_err());
    }

    #[test]
    fn test_col_letters_roundtrip() {
        for col in [0, 1, 25, 26, 51, 52, 700] {
            assert_eq!(letters_to_col(&col_to_letters(col)), col);
        }
        assert_eq!(col_to_letters(0), "a");
        assert_eq!(col_to_letters(3), "d");
        assert_eq!(col_to_letters(26), "aa");
    }

    #[test]
    fn test_gmap_file_levelnames_format() {
        let data = r#"GRMAP001
WIDTH 3
HEIGHT 2
LEVELNAMES
"map-a0.nw","map-b0.nw","map-c0.nw"
"map-a1.nw","map-b1.nw","map-c1.nw"
LEVELNAMESEND
"#;
        let file = GmapFile::parse("map.gmap", data).unwrap();
        assert_eq!(file.width, 3);
        assert_eq!(file.height, 2);
        assert_eq!(file.segments.len(), 6);
        assert!(file
            .segments
            .contains(&("map-b1.nw".to_string(), SegmentCoord::new(1, 1))));
    }

    #[test]
    fn test_gmap_file_levels_format() {
        let data = "GMAP001\nWIDTH 2\nHEIGHT 2\nLEVELS\nmap-a0.nw 0 0\nmap-b1.nw 1 1\nLEVELSEND\n";
        let file = GmapFile::parse("map.gmap", data).unwrap();
        assert_eq!(file.segments.len(), 2);
    }

    #[test]
    fn test_gmap_file_rejects_garbage() {
        assert!(GmapFile::parse("x.gmap", "not a gmap").is_err());
        assert!(GmapFile::parse("x.gmap", "GRMAP001\nWIDTH 2\n").is_err());
    }

    fn three_by_three() -> Gmap {
        let mut segments = Vec::new();
        for row in 7..=9 {
            for col in 2..=4 {
                let name = SegmentName {
                    base: "zlttp".into(),
                    coord: SegmentCoord::new(col, row),
                };
                segments.push((name.to_level_name(), name.coord));
            }
        }
        Gmap::from_file(&GmapFile {
            name: "zlttp.gmap".into(),
            width: 8,
            height: 10,
            segments,
        })
    }

    #[test]
    fn test_adjacency_directed_map() {
        let gmap = three_by_three();
        assert_eq!(gmap.neighbor("zlttp-d8.nw", Direction::Right), Some("zlttp-e8.nw"));
        assert_eq!(gmap.neighbor("zlttp-d8.nw", Direction::Left), Some("zlttp-c8.nw"));
        assert_eq!(gmap.neighbor("zlttp-d8.nw", Direction::Up), Some("zlttp-d7.nw"));
        assert_eq!(gmap.neighbor("zlttp-d8.nw", Direction::Down), Some("zlttp-d9.nw"));
        // Corner has no neighbor beyond the registered grid
        assert_eq!(gmap.neighbor("zlttp-c7.nw", Direction::Up), None);
        assert_eq!(gmap.neighbor("zlttp-c7.nw", Direction::Left), None);
    }

    #[test]
    fn test_adjacency_follows_file_not_names() {
        // A gmap that wraps: the east neighbor of the last column is the
        // first column. Name arithmetic would get this wrong.
        let mut gmap = Gmap::default();
        gmap.register_segment("ring-a0.nw".into(), SegmentCoord::new(0, 0));
        gmap.register_segment("ring-b0.nw".into(), SegmentCoord::new(1, 0));
        gmap.adjacency
            .get_mut("ring-b0.nw")
            .unwrap()
            .insert(Direction::Right, "ring-a0.nw".into());

        assert_eq!(gmap.neighbor("ring-b0.nw", Direction::Right), Some("ring-a0.nw"));
    }

    #[test]
    fn test_window3x3() {
        let gmap = three_by_three();
        let window = gmap.window3x3("zlttp-d8.nw");
        assert_eq!(window.len(), 8);
        assert!(window.contains(&"zlttp-e8.nw".to_string()));
        assert!(!window.contains(&"zlttp-d8.nw".to_string()));

        // Corner window only sees the registered cells
        let corner = gmap.window3x3("zlttp-c7.nw");
        assert_eq!(corner.len(), 3);
    }

    #[test]
    fn test_crossing_east() {
        let gmap = three_by_three();
        let outcome = gmap.resolve_crossing("zlttp-d8.nw", 64.4, 30.0);
        match outcome {
            CrossingOutcome::Entered { target, coord, local } => {
                assert_eq!(target, "zlttp-e8.nw");
                assert_eq!(coord, SegmentCoord::new(4, 8));
                assert!((local.x - 0.4).abs() < 1e-5);
                assert!((local.y - 30.0).abs() < 1e-5);
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[test]
    fn test_crossing_west_wraps_to_far_edge() {
        let gmap = three_by_three();
        match gmap.resolve_crossing("zlttp-d8.nw", -0.5, 12.0) {
            CrossingOutcome::Entered { target, local, .. } => {
                assert_eq!(target, "zlttp-c8.nw");
                assert!((local.x - 63.5).abs() < 1e-5);
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[test]
    fn test_crossing_at_world_edge_blocked() {
        let gmap = three_by_three();
        assert_eq!(
            gmap.resolve_crossing("zlttp-c7.nw", 30.0, -0.2),
            CrossingOutcome::Blocked
        );
        assert_eq!(
            gmap.resolve_crossing("zlttp-c7.nw", -0.2, 30.0),
            CrossingOutcome::Blocked
        );
    }

    #[test]
    fn test_prefetch_tracker_dedupes() {
        let mut tracker = PrefetchTracker::new();
        assert!(tracker.mark_requested("zlttp-e8.nw"));
        assert!(!tracker.mark_requested("zlttp-e8.nw"));
        assert_eq!(tracker.pending_count(), 1);

        tracker.complete("zlttp-e8.nw");
        assert!(tracker.mark_requested("zlttp-e8.nw"));
    }
}
