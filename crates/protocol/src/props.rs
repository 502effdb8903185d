//! Player property catalogue and its wire encodings
//!
//! A PLAYER_PROPS / OTHER_PLAYER_PROPS body is a sequence of
//! `(prop id, value)` pairs where the value encoding is fixed per id.
//! The table below is the single source of truth for both directions;
//! the reducer and the action builders never touch raw prop bytes.

use crate::codecs::*;
use bytes::{Buf, BytesMut};
use reborn_core::{RebornError, Result};
use serde::{Deserialize, Serialize};

/// Player property ids
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PlayerProp {
    Nickname = 0,
    MaxPower = 1,
    CurPower = 2,
    Rupees = 3,
    Arrows = 4,
    Bombs = 5,
    GlovePower = 6,
    BombPower = 7,
    SwordPower = 8,
    ShieldPower = 9,
    Gani = 10,
    HeadImage = 11,
    CurChat = 12,
    Colors = 13,
    Id = 14,
    X = 15,
    Y = 16,
    Sprite = 17,
    Status = 18,
    CarrySprite = 19,
    CurLevel = 20,
    HorseImage = 21,
    HorseBushes = 22,
    EffectColors = 23,
    CarryNpc = 24,
    ApCounter = 25,
    MagicPoints = 26,
    Kills = 27,
    Deaths = 28,
    OnlineSecs = 29,
    IpAddr = 30,
    UdpPort = 31,
    Alignment = 32,
    AdditFlags = 33,
    AccountName = 34,
    BodyImage = 35,
    Rating = 36,
    GAttrib1 = 37,
    GAttrib2 = 38,
    GAttrib3 = 39,
    GAttrib4 = 40,
    GAttrib5 = 41,
    AttachNpc = 42,
    GmapLevelX = 43,
    GmapLevelY = 44,
    Z = 45,
    GAttrib6 = 46,
    GAttrib7 = 47,
    GAttrib8 = 48,
    GAttrib9 = 49,
    JoinLeaveLevel = 50,
    Disconnect = 51,
    Language = 52,
    PlayerListStatus = 53,
    GAttrib10 = 54,
    GAttrib11 = 55,
    GAttrib12 = 56,
    GAttrib13 = 57,
    GAttrib14 = 58,
    GAttrib15 = 59,
    GAttrib16 = 60,
    GAttrib17 = 61,
    GAttrib18 = 62,
    GAttrib19 = 63,
    GAttrib20 = 64,
    GAttrib21 = 65,
    GAttrib22 = 66,
    GAttrib23 = 67,
    GAttrib24 = 68,
    GAttrib25 = 69,
    GAttrib26 = 70,
    GAttrib27 = 71,
    GAttrib28 = 72,
    GAttrib29 = 73,
    GAttrib30 = 74,
    OsType = 75,
    TextCodePage = 76,
    OnlineSecs2 = 77,
    X2 = 78,
    Y2 = 79,
    Z2 = 80,
    PlayerListCategory = 81,
    CommunityName = 82,
    Unknown83 = 83,
}

/// One past the last known prop id
pub const PROP_COUNT: u8 = 84;

impl PlayerProp {
    pub fn from_u8(val: u8) -> Option<Self> {
        if val < PROP_COUNT {
            // Covered exhaustively: discriminants are 0..PROP_COUNT
            Some(unsafe { std::mem::transmute(val) })
        } else {
            None
        }
    }

    pub fn as_u8(&self) -> u8 {
        *self as u8
    }

    fn is_gattrib(&self) -> bool {
        matches!(self.as_u8(), 37..=41 | 46..=49 | 54..=74)
    }
}

/// Tile offset applied to Z so sub-ground positions stay encodable
const Z_TILE_OFFSET: f32 = 50.0;

/// Decoded value of one property
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PropValue {
    /// Single GChar
    Byte(u8),
    /// GShort
    Short(u16),
    /// GInt3
    Int(u32),
    /// GInt5
    Int5(u32),
    /// Length-prefixed string
    Str(String),
    /// Tile coordinate at half-tile resolution (GChar of tiles*2)
    HalfTile(f32),
    /// Z tile coordinate, offset by 50 tiles on the wire
    HalfTileZ(f32),
    /// Signed world coordinate in tiles (sign-flagged pixel GInt3)
    WorldCoord(f32),
    /// Five color slots
    Colors([u8; 5]),
    /// Power + image combination (sword, shield)
    PowerImage { power: u8, image: String },
    /// Attached NPC
    AttachNpc { kind: u8, id: u32 },
    /// Unknown property: everything that remained in the sub-packet
    Raw(Vec<u8>),
}

/// Wire shape of a property value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Encoding {
    Byte,
    Short,
    Int,
    Int5,
    Str,
    HalfTile,
    HalfTileZ,
    WorldCoord,
    Colors,
    PowerImage,
    AttachNpc,
}

/// Fixed encoding for a prop id
fn encoding_of(prop: PlayerProp) -> Encoding {
    use PlayerProp::*;
    if prop.is_gattrib() {
        return Encoding::Str;
    }
    match prop {
        Nickname | Gani | HeadImage | CurChat | CurLevel | HorseImage | AccountName
        | BodyImage | Language | OsType | CommunityName => Encoding::Str,
        MaxPower | CurPower | Arrows | Bombs | GlovePower | BombPower | Sprite | Status
        | CarrySprite | HorseBushes | MagicPoints | Alignment | AdditFlags | GmapLevelX
        | GmapLevelY | JoinLeaveLevel | Disconnect | PlayerListStatus | PlayerListCategory => {
            Encoding::Byte
        }
        Rupees | CarryNpc | Kills | Deaths | OnlineSecs | UdpPort | Rating | TextCodePage => {
            Encoding::Int
        }
        IpAddr | OnlineSecs2 | Unknown83 => Encoding::Int5,
        Id | ApCounter => Encoding::Short,
        X | Y => Encoding::HalfTile,
        Z => Encoding::HalfTileZ,
        X2 | Y2 | Z2 => Encoding::WorldCoord,
        Colors | EffectColors => Encoding::Colors,
        SwordPower | ShieldPower => Encoding::PowerImage,
        AttachNpc => Encoding::AttachNpc,
        _ => unreachable!(),
    }
}

/// Decode one property value by its id's fixed encoding.
pub fn read_prop_value(prop: PlayerProp, buf: &mut BytesMut) -> Result<PropValue> {
    Ok(match encoding_of(prop) {
        Encoding::Byte => PropValue::Byte(read_gchar(buf)?),
        Encoding::Short => PropValue::Short(read_gshort(buf)?),
        Encoding::Int => PropValue::Int(read_gint3(buf)?),
        Encoding::Int5 => PropValue::Int5(read_gint5(buf)?),
        Encoding::Str => PropValue::Str(read_gstring(buf)?),
        Encoding::HalfTile => PropValue::HalfTile(read_gchar(buf)? as f32 / 2.0),
        Encoding::HalfTileZ => {
            PropValue::HalfTileZ(read_gchar(buf)? as f32 / 2.0 - Z_TILE_OFFSET)
        }
        Encoding::WorldCoord => PropValue::WorldCoord(read_gpos(buf)?),
        Encoding::Colors => {
            let mut colors = [0u8; 5];
            for slot in colors.iter_mut() {
                *slot = read_gchar(buf)?;
            }
            PropValue::Colors(colors)
        }
        Encoding::PowerImage => PropValue::PowerImage {
            power: read_gchar(buf)?,
            image: read_gstring(buf)?,
        },
        Encoding::AttachNpc => PropValue::AttachNpc {
            kind: read_gchar(buf)?,
            id: read_gint3(buf)?,
        },
    })
}

/// Encode one property value, validating it against the id's encoding.
pub fn write_prop_value(prop: PlayerProp, value: &PropValue, buf: &mut BytesMut) -> Result<()> {
    let mismatch = || {
        RebornError::ValueOutOfRange(format!("value {:?} does not fit prop {:?}", value, prop))
    };
    match (encoding_of(prop), value) {
        (Encoding::Byte, PropValue::Byte(v)) => write_gchar(buf, *v)?,
        (Encoding::Short, PropValue::Short(v)) => write_gshort(buf, *v)?,
        (Encoding::Int, PropValue::Int(v)) => write_gint3(buf, *v)?,
        (Encoding::Int5, PropValue::Int5(v)) => write_gint5(buf, *v)?,
        (Encoding::Str, PropValue::Str(v)) => write_gstring(buf, v)?,
        (Encoding::HalfTile, PropValue::HalfTile(tiles)) => {
            let half = (tiles * 2.0).round();
            if !(0.0..=GCHAR_MAX as f32).contains(&half) {
                return Err(mismatch());
            }
            write_gchar(buf, half as u8)?;
        }
        (Encoding::HalfTileZ, PropValue::HalfTileZ(tiles)) => {
            let half = ((tiles + Z_TILE_OFFSET) * 2.0).round();
            if !(0.0..=GCHAR_MAX as f32).contains(&half) {
                return Err(mismatch());
            }
            write_gchar(buf, half as u8)?;
        }
        (Encoding::WorldCoord, PropValue::WorldCoord(tiles)) => write_gpos(buf, *tiles)?,
        (Encoding::Colors, PropValue::Colors(colors)) => {
            for c in colors {
                write_gchar(buf, *c)?;
            }
        }
        (Encoding::PowerImage, PropValue::PowerImage { power, image }) => {
            write_gchar(buf, *power)?;
            write_gstring(buf, image)?;
        }
        (Encoding::AttachNpc, PropValue::AttachNpc { kind, id }) => {
            write_gchar(buf, *kind)?;
            write_gint3(buf, *id)?;
        }
        _ => return Err(mismatch()),
    }
    Ok(())
}

/// Parse a full props body into `(id, value)` pairs.
///
/// An id outside the catalogue makes the rest of the body undecodable
/// (its length is unknown), so the remainder is captured verbatim under
/// that id for the caller's `extra` map and parsing stops.
pub fn read_prop_pairs(buf: &mut BytesMut) -> Result<Vec<(u8, PropValue)>> {
    let mut pairs = Vec::new();
    while buf.has_remaining() {
        let id = read_gchar(buf)?;
        match PlayerProp::from_u8(id) {
            Some(prop) => pairs.push((id, read_prop_value(prop, buf)?)),
            None => {
                tracing::debug!(prop = id, "unknown player prop, keeping bytes opaque");
                let rest = buf.copy_to_bytes(buf.remaining());
                pairs.push((id, PropValue::Raw(rest.to_vec())));
            }
        }
    }
    Ok(pairs)
}

/// Write `(prop, value)` pairs as one props body.
pub fn write_prop_pairs(pairs: &[(PlayerProp, PropValue)], buf: &mut BytesMut) -> Result<()> {
    for (prop, value) in pairs {
        write_gchar(buf, prop.as_u8())?;
        write_prop_value(*prop, value, buf)?;
    }
    Ok(())
}
