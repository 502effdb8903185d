//! Level model
//!
//! A Level is either a standalone `.nw` level or one segment of a GMAP;
//! structurally they are identical. The board may lag the name: a level
//! exists from its first LEVEL_NAME and fills in when LEVEL_BOARD or a
//! raw level file arrives.

use crate::board::Board;
use reborn_core::{NpcId, PlayerId};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// A link to another level: a trigger rectangle plus destination
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    /// Trigger rectangle origin (tiles)
    pub x: u8,
    pub y: u8,
    pub width: u8,
    pub height: u8,

    /// Destination level name
    pub target_level: String,

    /// Destination position; `playerx`/`playery` in the source format
    /// mean "keep the player's coordinate" and arrive as None.
    pub target_x: Option<f32>,
    pub target_y: Option<f32>,
}

impl Link {
    /// Parse the `target x y w h destx desty` text layout shared by level
    /// files and the LEVEL_LINK packet. `destx`/`desty` may be the
    /// literals `playerx`/`playery`, meaning the crossing player keeps
    /// that coordinate.
    pub fn parse_line(text: &str) -> Option<Link> {
        let parts: Vec<&str> = text.split_whitespace().collect();
        if parts.len() < 7 {
            return None;
        }
        Some(Link {
            target_level: parts[0].to_string(),
            x: parts[1].parse().ok()?,
            y: parts[2].parse().ok()?,
            width: parts[3].parse().ok()?,
            height: parts[4].parse().ok()?,
            target_x: parts[5].parse().ok(),
            target_y: parts[6].parse().ok(),
        })
    }

    /// True when a tile position lies inside the trigger rectangle.
    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= self.x as f32
            && x < (self.x + self.width) as f32
            && y >= self.y as f32
            && y < (self.y + self.height) as f32
    }
}

/// A sign with its text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sign {
    pub x: u8,
    pub y: u8,
    pub text: String,
}

/// A chest and its contents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chest {
    pub x: u8,
    pub y: u8,
    pub item: u8,
    pub sign_index: i8,
    pub opened: bool,
}

/// An item lying on the board
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub x: f32,
    pub y: f32,
    pub item: u8,
}

/// An NPC as the client sees it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Npc {
    pub id: NpcId,
    pub x: f32,
    pub y: f32,
    pub image: String,
    pub gani: String,
    /// Undecoded property bytes, kept for scripts and tooling
    pub props: Vec<u8>,
}

impl Npc {
    pub fn new(id: NpcId) -> Self {
        Self {
            id,
            x: 0.0,
            y: 0.0,
            image: String::new(),
            gani: String::new(),
            props: Vec::new(),
        }
    }
}

/// A single level
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Level {
    /// Level name, e.g. `onlinestartlocal.nw` or `zlttp-d8.nw`
    pub name: String,

    /// Modification time reported by the server
    pub mod_time: u32,

    /// Tile grid; None until LEVEL_BOARD (or a level file) arrives
    pub board: Option<Board>,

    /// Warp triggers, keyed by rectangle origin for idempotent re-adds
    pub links: Vec<Link>,

    /// Signs, keyed by position
    pub signs: Vec<Sign>,

    /// Chests, keyed by position
    pub chests: Vec<Chest>,

    /// Items lying on the board
    pub items: Vec<Item>,

    /// NPC table; removal is authoritative
    pub npcs: HashMap<NpcId, Npc>,

    /// Players currently in this level
    pub players: HashSet<PlayerId>,
}

impl Level {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Whether the board has arrived.
    pub fn is_loaded(&self) -> bool {
        self.board.is_some()
    }

    /// Add a link; a retransmission of the same rectangle replaces the
    /// previous entry instead of duplicating it.
    pub fn add_link(&mut self, link: Link) {
        if let Some(existing) = self
            .links
            .iter_mut()
            .find(|l| l.x == link.x && l.y == link.y && l.width == link.width && l.height == link.height)
        {
            *existing = link;
        } else {
            self.links.push(link);
        }
    }

    /// Add a sign, idempotent by position.
    pub fn add_sign(&mut self, sign: Sign) {
        if let Some(existing) = self.signs.iter_mut().find(|s| s.x == sign.x && s.y == sign.y) {
            *existing = sign;
        } else {
            self.signs.push(sign);
        }
    }

    /// Add a chest, idempotent by position. The opened flag survives a
    /// retransmission so reopening animations do not replay.
    pub fn add_chest(&mut self, chest: Chest) {
        if let Some(existing) = self.chests.iter_mut().find(|c| c.x == chest.x && c.y == chest.y) {
            let opened = existing.opened;
            *existing = chest;
            existing.opened |= opened;
        } else {
            self.chests.push(chest);
        }
    }

    /// Find the link whose trigger rectangle contains a position.
    pub fn link_at(&self, x: f32, y: f32) -> Option<&Link> {
        self.links.iter().find(|l| l.contains(x, y))
    }

    /// Add an item, idempotent by position.
    pub fn add_item(&mut self, item: Item) {
        if !self
            .items
            .iter()
            .any(|i| (i.x - item.x).abs() < 0.5 && (i.y - item.y).abs() < 0.5)
        {
            self.items.push(item);
        }
    }

    /// Remove the item at a position.
    pub fn remove_item_at(&mut self, x: f32, y: f32) -> bool {
        let before = self.items.len();
        self.items
            .retain(|i| (i.x - x).abs() >= 0.5 || (i.y - y).abs() >= 0.5);
        self.items.len() != before
    }

    /// Insert or update an NPC.
    pub fn upsert_npc(&mut self, npc: Npc) {
        self.npcs.insert(npc.id, npc);
    }

    pub fn remove_npc(&mut self, id: NpcId) -> Option<Npc> {
        self.npcs.remove(&id)
    }
}
