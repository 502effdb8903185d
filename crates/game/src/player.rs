//! Player model
//!
//! A typed record of everything the props stream can say about a player.
//! Position is the one delicate part: in GMAP mode the world coordinates
//! `(x2, y2)` must equal `segment * 64 + local` at every observable
//! moment, so local and world position can only move through
//! [`Player::set_local_pos`] and friends — there is no way to assign
//! `x2`/`y2` on their own.

use reborn_core::{Direction, LocalPos, PlayerId, SegmentCoord, WorldPos, SEGMENT_TILES};
use reborn_protocol::{PlayerProp, PropValue};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Sword or shield: image plus power level
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Equip {
    pub power: u8,
    pub image: String,
}

/// One player, local or remote
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    /// Server-assigned id; immutable for the session
    pub id: PlayerId,

    /// Account name; immutable after login
    pub account: String,

    pub nickname: String,

    /// Chat bubble text
    pub chat: String,

    /// Position in tiles within the current segment
    x: f32,
    y: f32,

    /// World position in tiles; tracks `segment * 64 + local` in GMAP mode
    x2: f32,
    y2: f32,

    /// Current GMAP segment, when in a GMAP
    segment: Option<SegmentCoord>,

    pub direction: Direction,

    /// Animation name, e.g. `idle` or `walk`
    pub gani: String,

    /// Sprite base the gani indexes into
    pub sprite: u8,

    /// Carried-object sprite tag; 255 = nothing
    pub carry_sprite: u8,

    // Appearance
    pub head_image: String,
    pub body_image: String,
    pub horse_image: String,
    pub sword: Equip,
    pub shield: Equip,
    pub colors: [u8; 5],

    // Counters
    pub hearts: f32,
    pub max_hearts: f32,
    pub rupees: u32,
    pub bombs: u8,
    pub arrows: u8,
    pub keys: u8,

    /// Raw status flags byte
    pub status: u8,

    pub gani_attributes: HashMap<u8, String>,

    /// Level the player is in
    pub level_name: String,

    /// Props outside the catalogue, kept verbatim by id
    pub extra: HashMap<u8, Vec<u8>>,
}

impl Player {
    pub fn new(id: PlayerId) -> Self {
        Self {
            id,
            account: String::new(),
            nickname: String::new(),
            chat: String::new(),
            x: 30.0,
            y: 30.0,
            x2: 30.0,
            y2: 30.0,
            segment: None,
            direction: Direction::default(),
            gani: "idle".into(),
            sprite: 0,
            carry_sprite: 255,
            head_image: String::new(),
            body_image: String::new(),
            horse_image: String::new(),
            sword: Equip::default(),
            shield: Equip::default(),
            colors: [0; 5],
            hearts: 3.0,
            max_hearts: 3.0,
            rupees: 0,
            bombs: 0,
            arrows: 0,
            keys: 0,
            status: 0,
            gani_attributes: HashMap::new(),
            level_name: String::new(),
            extra: HashMap::new(),
        }
    }

    pub fn x(&self) -> f32 {
        self.x
    }

    pub fn y(&self) -> f32 {
        self.y
    }

    pub fn x2(&self) -> f32 {
        self.x2
    }

    pub fn y2(&self) -> f32 {
        self.y2
    }

    pub fn local_pos(&self) -> LocalPos {
        LocalPos::new(self.x, self.y)
    }

    pub fn world_pos(&self) -> WorldPos {
        WorldPos::new(self.x2, self.y2)
    }

    pub fn segment(&self) -> Option<SegmentCoord> {
        self.segment
    }

    pub fn gmap_mode(&self) -> bool {
        self.segment.is_some()
    }

    /// Move within the current segment, keeping world coordinates in
    /// lockstep when in GMAP mode.
    pub fn set_local_pos(&mut self, x: f32, y: f32) {
        self.x = x;
        self.y = y;
        match self.segment {
            Some(seg) => {
                self.x2 = seg.col as f32 * SEGMENT_TILES as f32 + x;
                self.y2 = seg.row as f32 * SEGMENT_TILES as f32 + y;
            }
            None => {
                self.x2 = x;
                self.y2 = y;
            }
        }
    }

    /// Enter a GMAP segment; the local position is preserved and world
    /// coordinates recomputed against the new segment.
    pub fn set_segment(&mut self, segment: SegmentCoord) {
        self.segment = Some(segment);
        self.set_local_pos(self.x, self.y);
    }

    /// Leave GMAP mode (entered a standalone level).
    pub fn clear_segment(&mut self) {
        self.segment = None;
        self.set_local_pos(self.x, self.y);
    }

    /// Position from a world coordinate: derives the segment and local
    /// offset in one step.
    pub fn set_world_pos(&mut self, x2: f32, y2: f32) {
        let (local, seg) = WorldPos::new(x2, y2).to_local();
        if self.segment.is_some() {
            self.segment = Some(seg);
        }
        self.set_local_pos(local.x, local.y);
    }

    /// Apply one decoded property write.
    ///
    /// `allow_direction` is false for server echoes addressed to the
    /// local player: the client is authoritative on facing, so the
    /// direction carried by a Sprite write is dropped while the sprite
    /// base still lands.
    pub fn apply_prop(&mut self, prop_id: u8, value: &PropValue, allow_direction: bool) {
        let Some(prop) = PlayerProp::from_u8(prop_id) else {
            if let PropValue::Raw(bytes) = value {
                self.extra.insert(prop_id, bytes.clone());
            }
            return;
        };

        match (prop, value) {
            (PlayerProp::Id, PropValue::Short(v)) => self.id = PlayerId::new(*v),
            (PlayerProp::Nickname, PropValue::Str(s)) => self.nickname = s.clone(),
            (PlayerProp::AccountName, PropValue::Str(s)) => {
                if self.account.is_empty() {
                    self.account = s.clone();
                }
            }
            (PlayerProp::CurChat, PropValue::Str(s)) => self.chat = s.clone(),
            (PlayerProp::MaxPower, PropValue::Byte(v)) => self.max_hearts = *v as f32 / 2.0,
            (PlayerProp::CurPower, PropValue::Byte(v)) => self.hearts = *v as f32 / 2.0,
            (PlayerProp::Rupees, PropValue::Int(v)) => self.rupees = *v,
            (PlayerProp::Arrows, PropValue::Byte(v)) => self.arrows = *v,
            (PlayerProp::Bombs, PropValue::Byte(v)) => self.bombs = *v,
            (PlayerProp::Gani, PropValue::Str(s)) => self.gani = s.clone(),
            (PlayerProp::HeadImage, PropValue::Str(s)) => self.head_image = s.clone(),
            (PlayerProp::BodyImage, PropValue::Str(s)) => self.body_image = s.clone(),
            (PlayerProp::HorseImage, PropValue::Str(s)) => self.horse_image = s.clone(),
            (PlayerProp::SwordPower, PropValue::PowerImage { power, image }) => {
                self.sword = Equip {
                    power: *power,
                    image: image.clone(),
                }
            }
            (PlayerProp::ShieldPower, PropValue::PowerImage { power, image }) => {
                self.shield = Equip {
                    power: *power,
                    image: image.clone(),
                }
            }
            (PlayerProp::Colors, PropValue::Colors(c)) => self.colors = *c,
            (PlayerProp::X, PropValue::HalfTile(tiles)) => self.set_local_pos(*tiles, self.y),
            (PlayerProp::Y, PropValue::HalfTile(tiles)) => self.set_local_pos(self.x, *tiles),
            (PlayerProp::X2, PropValue::WorldCoord(tiles)) => self.set_world_pos(*tiles, self.y2),
            (PlayerProp::Y2, PropValue::WorldCoord(tiles)) => self.set_world_pos(self.x2, *tiles),
            (PlayerProp::GmapLevelX, PropValue::Byte(col)) => {
                let row = self.segment.map(|s| s.row).unwrap_or(0);
                self.set_segment(SegmentCoord::new(*col as i32, row));
            }
            (PlayerProp::GmapLevelY, PropValue::Byte(row)) => {
                let col = self.segment.map(|s| s.col).unwrap_or(0);
                self.set_segment(SegmentCoord::new(col, *row as i32));
            }
            (PlayerProp::Sprite, PropValue::Byte(v)) => {
                self.sprite = *v;
                if allow_direction {
                    if let Some(dir) = Direction::from_u8(*v % 4) {
                        self.direction = dir;
                    }
                }
            }
            (PlayerProp::Status, PropValue::Byte(v)) => self.status = *v,
            (PlayerProp::CarrySprite, PropValue::Byte(v)) => self.carry_sprite = *v,
            (PlayerProp::CurLevel, PropValue::Str(s)) => self.level_name = s.clone(),
            (_, PropValue::Str(s)) if matches!(prop_id, 37..=41 | 46..=49 | 54..=74) => {
                // Gani attributes; sparse map keyed by prop id
                self.gani_attributes.insert(prop_id, s.clone());
            }
            (_, PropValue::Raw(bytes)) => {
                self.extra.insert(prop_id, bytes.clone());
            }
            (prop, value) => {
                tracing::trace!(?prop, ?value, "prop accepted but not modeled, keeping opaque");
            }
        }
    }
}

impl Default for Player {
    fn default() -> Self {
        Self::new(PlayerId::new(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_world_coords_follow_local_in_gmap() {
        let mut player = Player::new(PlayerId::new(1));
        player.set_segment(SegmentCoord::new(3, 8));
        player.set_local_pos(30.5, 12.0);

        assert_eq!(player.x2(), 3.0 * 64.0 + 30.5);
        assert_eq!(player.y2(), 8.0 * 64.0 + 12.0);

        // Every local write keeps the invariant
        player.set_local_pos(0.5, 63.5);
        assert_eq!(player.x2(), 192.5);
        assert_eq!(player.y2(), 575.5);
    }

    #[test]
    fn test_world_coords_equal_local_outside_gmap() {
        let mut player = Player::new(PlayerId::new(1));
        player.set_local_pos(10.0, 20.0);
        assert_eq!(player.x2(), 10.0);
        assert_eq!(player.y2(), 20.0);
    }

    #[test]
    fn test_set_world_pos_derives_segment() {
        let mut player = Player::new(PlayerId::new(1));
        player.set_segment(SegmentCoord::new(0, 0));
        player.set_world_pos(3.0 * 64.0 + 15.0, 8.0 * 64.0 + 40.0);

        assert_eq!(player.segment(), Some(SegmentCoord::new(3, 8)));
        assert_eq!(player.x(), 15.0);
        assert_eq!(player.y(), 40.0);
    }

    #[test]
    fn test_direction_discarded_when_not_allowed() {
        let mut player = Player::new(PlayerId::new(1));
        player.direction = Direction::Right;

        player.apply_prop(
            PlayerProp::Sprite.as_u8(),
            &PropValue::Byte(Direction::Up.as_u8()),
            false,
        );
        assert_eq!(player.direction, Direction::Right);
        assert_eq!(player.sprite, Direction::Up.as_u8());

        player.apply_prop(
            PlayerProp::Sprite.as_u8(),
            &PropValue::Byte(Direction::Left.as_u8()),
            true,
        );
        assert_eq!(player.direction, Direction::Left);
    }

    #[test]
    fn test_gmaplevel_props_recompute_world() {
        let mut player = Player::new(PlayerId::new(1));
        player.set_local_pos(10.0, 10.0);
        player.apply_prop(PlayerProp::GmapLevelX.as_u8(), &PropValue::Byte(2), true);
        player.apply_prop(PlayerProp::GmapLevelY.as_u8(), &PropValue::Byte(5), true);

        assert_eq!(player.segment(), Some(SegmentCoord::new(2, 5)));
        assert_eq!(player.x2(), 2.0 * 64.0 + 10.0);
        assert_eq!(player.y2(), 5.0 * 64.0 + 10.0);
    }

    #[test]
    fn test_unknown_prop_lands_in_extra() {
        let mut player = Player::new(PlayerId::new(1));
        player.apply_prop(90, &PropValue::Raw(vec![1, 2, 3]), true);
        assert_eq!(player.extra.get(&90), Some(&vec![1, 2, 3]));
    }

    #[test]
    fn test_account_immutable_after_first_set() {
        let mut player = Player::new(PlayerId::new(1));
        player.apply_prop(
            PlayerProp::AccountName.as_u8(),
            &PropValue::Str("first".into()),
            true,
        );
        player.apply_prop(
            PlayerProp::AccountName.as_u8(),
            &PropValue::Str("second".into()),
            true,
        );
        assert_eq!(player.account, "first");
    }

    #[test]
    fn test_counters() {
        let mut player = Player::new(PlayerId::new(1));
        player.apply_prop(PlayerProp::CurPower.as_u8(), &PropValue::Byte(7), true);
        player.apply_prop(PlayerProp::Rupees.as_u8(), &PropValue::Int(250), true);
        assert_eq!(player.hearts, 3.5);
        assert_eq!(player.rupees, 250);
    }
}
