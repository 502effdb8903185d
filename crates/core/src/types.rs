//! Core type definitions

use serde::{Deserialize, Serialize};

/// Player ID (16-bit unsigned, assigned by the server at login)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlayerId(pub u16);

impl PlayerId {
    pub const fn new(id: u16) -> Self {
        Self(id)
    }

    pub fn get(&self) -> u16 {
        self.0
    }
}

impl From<u16> for PlayerId {
    fn from(id: u16) -> Self {
        Self(id)
    }
}

/// NPC ID (32-bit unsigned)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NpcId(pub u32);

impl NpcId {
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn get(&self) -> u32 {
        self.0
    }
}

impl From<u32> for NpcId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

/// Facing direction, wire value 0..3
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Direction {
    Up = 0,
    Left = 1,
    Down = 2,
    Right = 3,
}

impl Direction {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Up),
            1 => Some(Self::Left),
            2 => Some(Self::Down),
            3 => Some(Self::Right),
            _ => None,
        }
    }

    pub fn as_u8(&self) -> u8 {
        *self as u8
    }

    /// Direction of travel implied by a movement delta.
    /// Horizontal movement wins ties, matching how the stock client
    /// picks a walk animation for diagonals.
    pub fn from_delta(dx: f32, dy: f32) -> Option<Self> {
        if dx.abs() >= dy.abs() && dx != 0.0 {
            Some(if dx < 0.0 { Self::Left } else { Self::Right })
        } else if dy != 0.0 {
            Some(if dy < 0.0 { Self::Up } else { Self::Down })
        } else {
            None
        }
    }

    pub fn opposite(&self) -> Self {
        match self {
            Self::Up => Self::Down,
            Self::Left => Self::Right,
            Self::Down => Self::Up,
            Self::Right => Self::Left,
        }
    }
}

impl Default for Direction {
    fn default() -> Self {
        Self::Down
    }
}

/// Protocol generation negotiated at handshake
///
/// The generation determines both the frame compression scheme and the
/// obfuscation cipher applied to each frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Generation {
    /// Plaintext frames, no cipher
    Gen1 = 1,
    /// zlib frames, no cipher (listserver generation)
    Gen2 = 2,
    /// zlib frames, in-band marker byte splice
    Gen3 = 3,
    /// bzip2 frames, iterator XOR stream
    Gen4 = 4,
    /// per-frame compression choice, iterator XOR stream
    Gen5 = 5,
}

impl Generation {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Gen1),
            2 => Some(Self::Gen2),
            3 => Some(Self::Gen3),
            4 => Some(Self::Gen4),
            5 => Some(Self::Gen5),
            _ => None,
        }
    }

    pub fn as_u8(&self) -> u8 {
        *self as u8
    }

    /// Whether frames in this generation carry the XOR stream cipher.
    pub fn uses_stream_cipher(&self) -> bool {
        matches!(self, Self::Gen4 | Self::Gen5)
    }
}

impl Default for Generation {
    fn default() -> Self {
        Self::Gen5
    }
}

/// Client type declared in the first handshake byte
///
/// RC types unlock the remote-control packet family after login.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClientType {
    /// Regular game client
    Client = 0,
    /// Old remote-control client
    Rc = 1,
    /// Modern game client
    Client3 = 5,
    /// Modern remote-control client
    Rc2 = 6,
}

impl ClientType {
    pub fn as_u8(&self) -> u8 {
        *self as u8
    }

    pub fn is_rc(&self) -> bool {
        matches!(self, Self::Rc | Self::Rc2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_roundtrip() {
        for v in 0..4u8 {
            let dir = Direction::from_u8(v).unwrap();
            assert_eq!(dir.as_u8(), v);
        }
        assert_eq!(Direction::from_u8(4), None);
    }

    #[test]
    fn test_direction_from_delta() {
        assert_eq!(Direction::from_delta(1.0, 0.0), Some(Direction::Right));
        assert_eq!(Direction::from_delta(-0.5, 0.0), Some(Direction::Left));
        assert_eq!(Direction::from_delta(0.0, -1.0), Some(Direction::Up));
        assert_eq!(Direction::from_delta(0.0, 2.0), Some(Direction::Down));
        assert_eq!(Direction::from_delta(0.0, 0.0), None);
    }

    #[test]
    fn test_generation_cipher() {
        assert!(!Generation::Gen1.uses_stream_cipher());
        assert!(!Generation::Gen3.uses_stream_cipher());
        assert!(Generation::Gen4.uses_stream_cipher());
        assert!(Generation::Gen5.uses_stream_cipher());
    }
}
