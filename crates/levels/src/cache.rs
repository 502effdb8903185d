//! Segment cache
//!
//! Keeps recently visited levels loaded so re-entering a segment does
//! not cost another board transfer. Capacity-bounded with
//! least-recently-used eviction; the active level is pinned by being
//! held separately in the world state.

use crate::level::Level;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Shared, independently lockable level handle
pub type LevelHandle = Arc<RwLock<Level>>;

struct CacheEntry {
    level: LevelHandle,
    last_used: u64,
}

/// LRU cache of loaded levels keyed by level name
pub struct SegmentCache {
    entries: DashMap<String, CacheEntry>,
    max_levels: usize,
    tick: AtomicU64,
}

impl SegmentCache {
    pub fn new(max_levels: usize) -> Self {
        Self {
            entries: DashMap::new(),
            max_levels: max_levels.max(1),
            tick: AtomicU64::new(0),
        }
    }

    fn next_tick(&self) -> u64 {
        self.tick.fetch_add(1, Ordering::Relaxed)
    }

    /// Fetch a level, refreshing its recency.
    pub fn get(&self, name: &str) -> Option<LevelHandle> {
        let mut entry = self.entries.get_mut(name)?;
        entry.last_used = self.next_tick();
        Some(Arc::clone(&entry.level))
    }

    /// Fetch a level, creating an empty (board-pending) one if absent.
    pub fn get_or_insert(&self, name: &str) -> LevelHandle {
        if let Some(level) = self.get(name) {
            return level;
        }
        let handle: LevelHandle = Arc::new(RwLock::new(Level::new(name)));
        self.insert(name, Arc::clone(&handle));
        handle
    }

    /// Insert a level, evicting the least recently used entries when
    /// over capacity.
    pub fn insert(&self, name: &str, level: LevelHandle) {
        self.entries.insert(
            name.to_string(),
            CacheEntry {
                level,
                last_used: self.next_tick(),
            },
        );
        self.evict_if_needed();
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// True when the named level exists and its board has arrived.
    pub fn is_loaded(&self, name: &str) -> bool {
        self.entries
            .get(name)
            .map(|e| e.level.read().is_loaded())
            .unwrap_or(false)
    }

    pub fn remove(&self, name: &str) {
        self.entries.remove(name);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    fn evict_if_needed(&self) {
        while self.entries.len() > self.max_levels {
            let oldest = self
                .entries
                .iter()
                .min_by_key(|e| e.value().last_used)
                .map(|e| e.key().clone());
            match oldest {
                Some(key) => {
                    tracing::debug!(level = %key, "evicting least recently used segment");
                    self.entries.remove(&key);
                }
                None => break,
            }
        }
    }
}

impl Default for SegmentCache {
    fn default() -> Self {
        Self::new(32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::Board;

    #[test]
    fn test_get_or_insert_shares_handle() {
        let cache = SegmentCache::new(8);
        let a = cache.get_or_insert("seg-a0.nw");
        let b = cache.get_or_insert("seg-a0.nw");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_is_loaded_tracks_board() {
        let cache = SegmentCache::new(8);
        let handle = cache.get_or_insert("seg-a0.nw");
        assert!(!cache.is_loaded("seg-a0.nw"));

        handle.write().board = Some(Board::filled(0));
        assert!(cache.is_loaded("seg-a0.nw"));
    }

    #[test]
    fn test_lru_eviction() {
        let cache = SegmentCache::new(2);
        cache.get_or_insert("one.nw");
        cache.get_or_insert("two.nw");

        // Touch "one" so "two" is the eviction candidate
        cache.get("one.nw");
        cache.get_or_insert("three.nw");

        assert_eq!(cache.len(), 2);
        assert!(cache.contains("one.nw"));
        assert!(!cache.contains("two.nw"));
        assert!(cache.contains("three.nw"));
    }
}
