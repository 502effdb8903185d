//! World state
//!
//! One mutable view of everything the server has told us: the local
//! player, other players, the current level, GMAP residency, flags and
//! transient effects. All writes happen on the reducer; readers take
//! cloned snapshots.

use crate::effects::Effects;
use crate::player::Player;
use reborn_core::{PlayerId, SegmentCoord};
use reborn_levels::{Gmap, LevelHandle, PrefetchTracker, SegmentCache};
use std::collections::{HashMap, HashSet};
use std::time::Instant;

/// Read-only copy handed to renderers and bots
#[derive(Debug, Clone)]
pub struct WorldSnapshot {
    pub local_player: Player,
    pub players: Vec<Player>,
    pub level_name: Option<String>,
    pub gmap_name: Option<String>,
    pub active_segment: Option<String>,
    pub flags: HashMap<String, String>,
}

/// The reducer-owned world
pub struct WorldState {
    pub local_player: Player,

    /// Other players by id
    pub players: HashMap<PlayerId, Player>,

    /// Loaded levels, including GMAP segments
    pub cache: SegmentCache,

    /// Level the camera points at; swapped whole, never piecewise
    current_level: Option<LevelHandle>,

    /// GMAP residency, when inside one
    pub gmap: Option<Gmap>,

    pub prefetch: PrefetchTracker,

    pub effects: Effects,

    /// Server flags
    pub flags: HashMap<String, String>,

    /// Weapon scripts granted to the player
    pub weapons: HashSet<String>,

    pub default_weapon: Option<u8>,

    /// Last NEW_WORLD_TIME value
    pub server_time: u32,

    /// When the last NEW_WORLD_TIME arrived; the keepalive watchdog
    /// compares against this
    pub last_world_time: Option<Instant>,

    pub is_leader: bool,
}

impl WorldState {
    pub fn new() -> Self {
        Self {
            local_player: Player::default(),
            players: HashMap::new(),
            cache: SegmentCache::default(),
            current_level: None,
            gmap: None,
            prefetch: PrefetchTracker::new(),
            effects: Effects::new(),
            flags: HashMap::new(),
            weapons: HashSet::new(),
            default_weapon: None,
            server_time: 0,
            last_world_time: None,
            is_leader: false,
        }
    }

    pub fn current_level(&self) -> Option<LevelHandle> {
        self.current_level.clone()
    }

    pub fn current_level_name(&self) -> Option<String> {
        self.current_level.as_ref().map(|l| l.read().name.clone())
    }

    /// Point the world at a level, creating a board-pending entry when
    /// it has not been seen yet. The swap is a single pointer move so a
    /// reader never observes a half-switched level.
    pub fn enter_level(&mut self, name: &str) -> LevelHandle {
        let handle = self.cache.get_or_insert(name);
        handle.write().players.insert(self.local_player.id);
        self.current_level = Some(handle.clone());
        self.local_player.level_name = name.to_string();
        handle
    }

    /// Segment coordinate of the active level, when it is a GMAP segment
    /// known to the grid.
    pub fn active_segment_coord(&self) -> Option<SegmentCoord> {
        let gmap = self.gmap.as_ref()?;
        gmap.coord_of(gmap.active_segment()?)
    }

    pub fn snapshot(&self) -> WorldSnapshot {
        WorldSnapshot {
            local_player: self.local_player.clone(),
            players: self.players.values().cloned().collect(),
            level_name: self.current_level_name(),
            gmap_name: self.gmap.as_ref().map(|g| g.name.clone()),
            active_segment: self
                .gmap
                .as_ref()
                .and_then(|g| g.active_segment())
                .map(String::from),
            flags: self.flags.clone(),
        }
    }

    /// Drop everything tied to a session. Called on disconnect so a
    /// reconnect starts from a clean world.
    pub fn reset(&mut self) {
        let id = self.local_player.id;
        *self = Self::new();
        self.local_player.id = id;
    }
}

impl Default for WorldState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enter_level_swaps_pointer() {
        let mut state = WorldState::new();
        assert!(state.current_level_name().is_none());

        state.enter_level("first.nw");
        assert_eq!(state.current_level_name().as_deref(), Some("first.nw"));
        assert_eq!(state.local_player.level_name, "first.nw");

        state.enter_level("second.nw");
        assert_eq!(state.current_level_name().as_deref(), Some("second.nw"));
        // The first level stays cached for a revisit
        assert!(state.cache.contains("first.nw"));
    }

    #[test]
    fn test_snapshot_is_detached() {
        let mut state = WorldState::new();
        state.enter_level("a.nw");
        state.local_player.set_local_pos(5.0, 6.0);

        let snap = state.snapshot();
        state.local_player.set_local_pos(50.0, 60.0);

        assert_eq!(snap.local_player.x(), 5.0);
        assert_eq!(state.local_player.x(), 50.0);
    }

    #[test]
    fn test_reset_keeps_player_id() {
        let mut state = WorldState::new();
        state.local_player.id = PlayerId::new(77);
        state.enter_level("a.nw");
        state.flags.insert("k".into(), "v".into());

        state.reset();
        assert_eq!(state.local_player.id, PlayerId::new(77));
        assert!(state.current_level_name().is_none());
        assert!(state.flags.is_empty());
    }
}
