//! Level file parser
//!
//! Parses the `GLEVNW01` text format a server streams for prefetched
//! GMAP segments. Tile rows are encoded two characters per tile in the
//! protocol's base-64 alphabet.

use crate::board::{Board, BOARD_EDGE};
use crate::error::{LevelError, Result};
use crate::level::{Chest, Level, Link, Sign};

/// The protocol's base-64 tile alphabet
const TILE_ALPHABET: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

fn tile_digit(c: u8) -> Option<u16> {
    TILE_ALPHABET.iter().position(|&a| a == c).map(|p| p as u16)
}

/// Level text parser
pub struct LevelParser;

impl LevelParser {
    /// Parse level text into a Level carrying the given name.
    pub fn parse(name: &str, data: &str) -> Result<Level> {
        let lines: Vec<&str> = data.lines().collect();

        if lines.is_empty() {
            return Err(LevelError::InvalidFormat("empty file".into()));
        }

        let magic = lines[0].trim();
        if magic != "GLEVNW01" {
            return Err(LevelError::UnsupportedVersion(magic.to_string()));
        }

        let mut level = Level::new(name);
        let mut board = Board::filled(0);
        let mut saw_board = false;

        let mut i = 1;
        while i < lines.len() {
            let line = lines[i].trim_end();

            if line.is_empty() {
                i += 1;
                continue;
            }

            if let Some(rest) = line.strip_prefix("BOARD ") {
                Self::parse_board_row(&mut board, rest, i)?;
                saw_board = true;
            } else if let Some(rest) = line.strip_prefix("LINK ") {
                if let Some(link) = Link::parse_line(rest) {
                    level.add_link(link);
                }
            } else if let Some(rest) = line.strip_prefix("SIGN ") {
                let (sign, consumed) = Self::parse_sign(rest, &lines[i + 1..], i)?;
                level.add_sign(sign);
                i += consumed;
            } else if let Some(rest) = line.strip_prefix("CHEST ") {
                if let Some(chest) = Self::parse_chest(rest) {
                    level.add_chest(chest);
                }
            } else if line.starts_with("NPC") {
                // NPC blocks carry server script, which the server never
                // streams to clients in level files; skip to the end marker.
                while i < lines.len() && lines[i].trim() != "NPCEND" {
                    i += 1;
                }
            }

            i += 1;
        }

        if saw_board {
            level.board = Some(board);
        }
        Ok(level)
    }

    /// Parse one `BOARD x y width layer data` row.
    fn parse_board_row(board: &mut Board, rest: &str, line_no: usize) -> Result<()> {
        let parts: Vec<&str> = rest.split_whitespace().collect();
        if parts.len() != 5 {
            return Err(LevelError::ParseError {
                line: line_no,
                message: format!("BOARD expects 5 fields, got {}", parts.len()),
            });
        }

        let parse_u8 = |s: &str, what: &str| {
            s.parse::<u8>().map_err(|_| LevelError::ParseError {
                line: line_no,
                message: format!("bad {}: {}", what, s),
            })
        };
        let x = parse_u8(parts[0], "x")?;
        let y = parse_u8(parts[1], "y")?;
        let width = parse_u8(parts[2], "width")?;
        let layer = parse_u8(parts[3], "layer")?;
        let data = parts[4].as_bytes();

        // The client board is the ground layer; decorative layers are a
        // renderer concern and are not modeled here.
        if layer != 0 {
            return Ok(());
        }

        if x as usize + width as usize > BOARD_EDGE || y as usize >= BOARD_EDGE {
            return Err(LevelError::ParseError {
                line: line_no,
                message: format!("BOARD row out of bounds: x={} y={} width={}", x, y, width),
            });
        }
        if data.len() < width as usize * 2 {
            return Err(LevelError::ParseError {
                line: line_no,
                message: format!("BOARD row data too short: {} chars", data.len()),
            });
        }

        for col in 0..width as usize {
            let hi = tile_digit(data[col * 2]);
            let lo = tile_digit(data[col * 2 + 1]);
            let (hi, lo) = match (hi, lo) {
                (Some(hi), Some(lo)) => (hi, lo),
                _ => {
                    return Err(LevelError::ParseError {
                        line: line_no,
                        message: format!("bad tile characters at column {}", col),
                    })
                }
            };
            board.set(x + col as u8, y, hi * 64 + lo);
        }
        Ok(())
    }

    /// Parse `SIGN x y` followed by text lines up to SIGNEND.
    fn parse_sign(rest: &str, following: &[&str], line_no: usize) -> Result<(Sign, usize)> {
        let parts: Vec<&str> = rest.split_whitespace().collect();
        if parts.len() < 2 {
            return Err(LevelError::ParseError {
                line: line_no,
                message: "SIGN expects x and y".into(),
            });
        }
        let x = parts[0].parse().map_err(|_| LevelError::ParseError {
            line: line_no,
            message: format!("bad sign x: {}", parts[0]),
        })?;
        let y = parts[1].parse().map_err(|_| LevelError::ParseError {
            line: line_no,
            message: format!("bad sign y: {}", parts[1]),
        })?;

        let mut text_lines = Vec::new();
        let mut consumed = 0;
        for line in following {
            consumed += 1;
            if line.trim() == "SIGNEND" {
                break;
            }
            text_lines.push(*line);
        }

        Ok((
            Sign {
                x,
                y,
                text: text_lines.join("\n"),
            },
            consumed,
        ))
    }

    /// Parse `CHEST x y item signindex`.
    fn parse_chest(rest: &str) -> Option<Chest> {
        let parts: Vec<&str> = rest.split_whitespace().collect();
        if parts.len() < 4 {
            return None;
        }
        Some(Chest {
            x: parts[0].parse().ok()?,
            y: parts[1].parse().ok()?,
            item: parts[2].parse().ok()?,
            sign_index: parts[3].parse().ok()?,
            opened: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row_of(tile: u16, width: usize) -> String {
        let hi = TILE_ALPHABET[(tile / 64) as usize] as char;
        let lo = TILE_ALPHABET[(tile % 64) as usize] as char;
        std::iter::repeat(format!("{}{}", hi, lo))
            .take(width)
            .collect()
    }

    #[test]
    fn test_parse_minimal_level() {
        let data = format!(
            "GLEVNW01\nBOARD 0 0 64 0 {}\nBOARD 0 1 64 0 {}\n",
            row_of(0, 64),
            row_of(170, 64)
        );
        let level = LevelParser::parse("test.nw", &data).unwrap();
        assert_eq!(level.name, "test.nw");
        assert!(level.is_loaded());
        let board = level.board.unwrap();
        assert_eq!(board.get(0, 0), 0);
        assert_eq!(board.get(63, 1), 170);
    }

    #[test]
    fn test_parse_rejects_bad_magic() {
        assert!(matches!(
            LevelParser::parse("x.nw", "GLEVNW02\n"),
            Err(LevelError::UnsupportedVersion(_))
        ));
    }

    #[test]
    fn test_parse_link_line() {
        let data = format!(
            "GLEVNW01\nBOARD 0 0 64 0 {}\nLINK next.nw 63 0 1 64 0 playery\n",
            row_of(0, 64)
        );
        let level = LevelParser::parse("test.nw", &data).unwrap();
        assert_eq!(level.links.len(), 1);
        let link = &level.links[0];
        assert_eq!(link.target_level, "next.nw");
        assert_eq!(link.x, 63);
        assert_eq!(link.height, 64);
        assert_eq!(link.target_x, Some(0.0));
        assert_eq!(link.target_y, None); // playery
    }

    #[test]
    fn test_parse_sign_block() {
        let data = format!(
            "GLEVNW01\nBOARD 0 0 64 0 {}\nSIGN 12 34\nWelcome to\nthe test level\nSIGNEND\n",
            row_of(0, 64)
        );
        let level = LevelParser::parse("test.nw", &data).unwrap();
        assert_eq!(level.signs.len(), 1);
        assert_eq!(level.signs[0].x, 12);
        assert_eq!(level.signs[0].text, "Welcome to\nthe test level");
    }

    #[test]
    fn test_parse_chest_line() {
        let data = format!(
            "GLEVNW01\nBOARD 0 0 64 0 {}\nCHEST 5 6 2 -1\n",
            row_of(0, 64)
        );
        let level = LevelParser::parse("test.nw", &data).unwrap();
        assert_eq!(level.chests.len(), 1);
        assert_eq!(level.chests[0].item, 2);
        assert!(!level.chests[0].opened);
    }

    #[test]
    fn test_npc_blocks_skipped() {
        let data = format!(
            "GLEVNW01\nBOARD 0 0 64 0 {}\nNPC door.png 30 30\nif (playerenters) {{}}\nNPCEND\nCHEST 1 1 0 -1\n",
            row_of(0, 64)
        );
        let level = LevelParser::parse("test.nw", &data).unwrap();
        assert_eq!(level.chests.len(), 1);
    }

    #[test]
    fn test_decorative_layers_ignored() {
        let data = format!(
            "GLEVNW01\nBOARD 0 0 64 0 {}\nBOARD 0 0 64 1 {}\n",
            row_of(7, 64),
            row_of(200, 64)
        );
        let level = LevelParser::parse("test.nw", &data).unwrap();
        assert_eq!(level.board.unwrap().get(0, 0), 7);
    }
}
