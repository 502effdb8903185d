//! Short-lived battle and display effects
//!
//! Bombs, arrows, explosions and shown images live outside the level
//! model: the server announces them with an implied or explicit expiry
//! and the renderer consumes them. The reducer sweeps expired entries on
//! every world tick.

use reborn_core::PlayerId;
use std::time::{Duration, Instant};

/// Lifetime of an arrow in flight
const ARROW_LIFETIME: Duration = Duration::from_millis(1500);

/// Lifetime of an explosion flash
const EXPLOSION_LIFETIME: Duration = Duration::from_millis(700);

/// Tick length the bomb timer field counts in
const BOMB_TICK: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, PartialEq)]
pub struct Bomb {
    pub owner: PlayerId,
    pub x: f32,
    pub y: f32,
    pub power: u8,
    pub expires_at: Instant,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Arrow {
    pub owner: PlayerId,
    pub x: f32,
    pub y: f32,
    pub direction: u8,
    pub expires_at: Instant,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Explosion {
    pub x: f32,
    pub y: f32,
    pub power: u8,
    pub expires_at: Instant,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShownImage {
    pub spec: String,
    pub expires_at: Instant,
}

/// All live effects
#[derive(Debug, Default, Clone)]
pub struct Effects {
    pub bombs: Vec<Bomb>,
    pub arrows: Vec<Arrow>,
    pub explosions: Vec<Explosion>,
    pub images: Vec<ShownImage>,
}

impl Effects {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_bomb(&mut self, owner: PlayerId, x: f32, y: f32, power: u8, timer_ticks: u8) {
        self.bombs.push(Bomb {
            owner,
            x,
            y,
            power,
            expires_at: Instant::now() + BOMB_TICK * timer_ticks as u32,
        });
    }

    /// Remove the bomb at a position; the key the server deletes by.
    pub fn remove_bomb_at(&mut self, x: f32, y: f32) -> bool {
        let before = self.bombs.len();
        self.bombs
            .retain(|b| (b.x - x).abs() >= 0.5 || (b.y - y).abs() >= 0.5);
        self.bombs.len() != before
    }

    pub fn add_arrow(&mut self, owner: PlayerId, x: f32, y: f32, direction: u8) {
        self.arrows.push(Arrow {
            owner,
            x,
            y,
            direction,
            expires_at: Instant::now() + ARROW_LIFETIME,
        });
    }

    pub fn add_explosion(&mut self, x: f32, y: f32, power: u8) {
        self.explosions.push(Explosion {
            x,
            y,
            power,
            expires_at: Instant::now() + EXPLOSION_LIFETIME,
        });
    }

    pub fn add_image(&mut self, spec: String, lifetime: Duration) {
        self.images.push(ShownImage {
            spec,
            expires_at: Instant::now() + lifetime,
        });
    }

    /// Drop everything whose expiry has passed.
    pub fn sweep(&mut self, now: Instant) {
        self.bombs.retain(|b| b.expires_at > now);
        self.arrows.retain(|a| a.expires_at > now);
        self.explosions.retain(|e| e.expires_at > now);
        self.images.retain(|i| i.expires_at > now);
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bomb_removal_by_position() {
        let mut effects = Effects::new();
        effects.add_bomb(PlayerId::new(1), 10.0, 10.0, 1, 55);
        effects.add_bomb(PlayerId::new(1), 20.0, 20.0, 1, 55);

        assert!(effects.remove_bomb_at(10.0, 10.0));
        assert_eq!(effects.bombs.len(), 1);
        assert_eq!(effects.bombs[0].x, 20.0);

        assert!(!effects.remove_bomb_at(40.0, 40.0));
    }

    #[test]
    fn test_sweep_removes_expired() {
        let mut effects = Effects::new();
        effects.add_arrow(PlayerId::new(1), 5.0, 5.0, 3);
        effects.add_explosion(1.0, 1.0, 2);

        // Nothing expires immediately
        effects.sweep(Instant::now());
        assert_eq!(effects.arrows.len(), 1);
        assert_eq!(effects.explosions.len(), 1);

        // Far future: everything is gone
        effects.sweep(Instant::now() + Duration::from_secs(60));
        assert!(effects.arrows.is_empty());
        assert!(effects.explosions.is_empty());
    }
}
