//! Use-counted tile storage.

use crate::{Tile, TileName};
use geogrid::TileMatrix;
use log::debug;
use std::{
    collections::{BTreeMap, VecDeque},
    sync::Arc,
};

/// Default number of idle tiles kept by [EvictionPolicy::KeepInactive].
pub const DEFAULT_KEEP_INACTIVE: usize = 16;

/// Which idle tiles a cache discards.
///
/// Tiles in use are never evicted under any policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictionPolicy {
    /// Keep at most this many idle tiles.
    KeepInactive(usize),
    /// Evict idle tiles while the cache holds more than this many
    /// sample bytes.
    MaxBytes(usize),
    /// Never evict.
    Unbounded,
}

impl Default for EvictionPolicy {
    fn default() -> Self {
        Self::KeepInactive(DEFAULT_KEEP_INACTIVE)
    }
}

/// Snapshot of a [TileCache]'s occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    /// Cached tiles, in use or idle.
    pub entries: usize,
    /// Cached tiles with no outstanding uses.
    pub inactive: usize,
    /// Sample bytes held by all cached tiles.
    pub bytes: usize,
}

#[derive(Debug)]
struct Entry {
    tile: Arc<Tile>,
    use_count: u32,
}

/// Tiles keyed by [TileName], each with a use count.
///
/// Tiles whose count drops to zero are queued, most recently idle at
/// the front, and purged from the back.
#[derive(Debug, Default)]
pub struct TileCache {
    entries: BTreeMap<TileName, Entry>,
    inactive: VecDeque<TileName>,
    cumulative_bytes: usize,
}

impl TileCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes ownership of `tile` with a use count of one, returning
    /// the cached handle.
    ///
    /// If a tile of the same name is already cached, that tile gains
    /// the use instead.
    pub fn add(&mut self, tile: Arc<Tile>) -> Arc<Tile> {
        let name = tile.name();
        if let Some(cached) = self.use_name(name) {
            return cached;
        }
        self.cumulative_bytes += tile.data_size();
        self.entries.insert(
            name,
            Entry {
                tile: Arc::clone(&tile),
                use_count: 1,
            },
        );
        tile
    }

    /// Looks up tile (`row`, `col`) of `matrix`, counting a use on hit.
    pub fn use_at(&mut self, matrix: &TileMatrix, row: usize, col: usize) -> Option<Arc<Tile>> {
        self.use_name(TileName::new(matrix.id(), matrix.index(row, col)))
    }

    /// Looks up `name`, counting a use on hit.
    pub fn use_name(&mut self, name: TileName) -> Option<Arc<Tile>> {
        let entry = self.entries.get_mut(&name)?;
        entry.use_count += 1;
        let tile = Arc::clone(&entry.tile);
        if entry.use_count == 1 {
            let pos = self
                .inactive
                .iter()
                .position(|queued| *queued == name)
                .unwrap_or_else(|| panic!("idle tile {name} missing from the inactive queue"));
            self.inactive.remove(pos);
        }
        Some(tile)
    }

    /// Returns one use of `name`.
    ///
    /// # Panics
    ///
    /// If `name` is not cached or has no outstanding uses.
    pub fn release(&mut self, name: TileName) {
        let entry = self
            .entries
            .get_mut(&name)
            .unwrap_or_else(|| panic!("release of uncached tile {name}"));
        assert!(entry.use_count > 0, "use count underflow on tile {name}");
        entry.use_count -= 1;
        if entry.use_count == 0 {
            self.inactive.push_front(name);
        }
    }

    /// Evicts the longest-idle tiles until at most `keep` idle tiles
    /// remain. Returns the number evicted.
    pub fn purge_inactive(&mut self, keep: usize) -> usize {
        let mut evicted = 0;
        while self.inactive.len() > keep {
            self.evict_oldest();
            evicted += 1;
        }
        evicted
    }

    /// Evicts the longest-idle tiles until the cache holds at most
    /// `max_bytes`, or no idle tiles remain. Returns the number
    /// evicted.
    pub fn purge_to_bytes(&mut self, max_bytes: usize) -> usize {
        let mut evicted = 0;
        while self.cumulative_bytes > max_bytes && !self.inactive.is_empty() {
            self.evict_oldest();
            evicted += 1;
        }
        evicted
    }

    pub fn apply(&mut self, policy: EvictionPolicy) -> usize {
        match policy {
            EvictionPolicy::KeepInactive(keep) => self.purge_inactive(keep),
            EvictionPolicy::MaxBytes(max_bytes) => self.purge_to_bytes(max_bytes),
            EvictionPolicy::Unbounded => 0,
        }
    }

    /// Evicts every idle tile.
    pub fn flush(&mut self) -> usize {
        self.purge_inactive(0)
    }

    pub fn contains(&self, name: TileName) -> bool {
        self.entries.contains_key(&name)
    }

    pub fn use_count(&self, name: TileName) -> Option<u32> {
        self.entries.get(&name).map(|entry| entry.use_count)
    }

    /// True if `name` is waiting in the inactive queue.
    pub fn is_inactive(&self, name: TileName) -> bool {
        self.inactive.contains(&name)
    }

    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn cumulative_bytes(&self) -> usize {
        self.cumulative_bytes
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            inactive: self.inactive.len(),
            bytes: self.cumulative_bytes,
        }
    }

    fn evict_oldest(&mut self) {
        let Some(name) = self.inactive.pop_back() else {
            return;
        };
        let entry = self
            .entries
            .remove(&name)
            .unwrap_or_else(|| panic!("inactive tile {name} has no cache entry"));
        assert_eq!(entry.use_count, 0, "evicting active tile {name}");
        self.cumulative_bytes -= entry.tile.data_size();
        debug!("evicting {name}");
    }
}
