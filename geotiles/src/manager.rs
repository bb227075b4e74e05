//! On-demand tile loading through a use-counted cache.

use crate::{CacheStats, EvictionPolicy, Tile, TileCache, TileName, DEFAULT_KEEP_INACTIVE};
use geogrid::{GeoRect, Grid, GridError, TileMatrix, C};
use log::{debug, warn};
use parking_lot::ReentrantMutex;
use std::{cell::RefCell, fmt, sync::Arc};

/// The on-disk encodings a [TileManager] can serve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    Dted,
    Adrg,
    FloatGrid,
    LandUse,
    GeoTiff,
    Bathymetry,
}

impl Format {
    pub const ALL: [Self; 6] = [
        Self::Dted,
        Self::Adrg,
        Self::FloatGrid,
        Self::LandUse,
        Self::GeoTiff,
        Self::Bathymetry,
    ];

    pub fn default_policy(self) -> EvictionPolicy {
        match self {
            Self::Bathymetry => EvictionPolicy::Unbounded,
            _ => EvictionPolicy::KeepInactive(DEFAULT_KEEP_INACTIVE),
        }
    }

    /// Prefix of this format's cache environment variables, e.g.
    /// `DTED` for `DTED_TILE_CACHE_SIZE`.
    pub fn env_prefix(self) -> &'static str {
        match self {
            Self::Dted => "DTED",
            Self::Adrg => "ADRG",
            Self::FloatGrid => "FLOAT_GRID",
            Self::LandUse => "LAND_USE",
            Self::GeoTiff => "GEOTIFF",
            Self::Bathymetry => "BATHYMETRY",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Dted => "DTED",
            Self::Adrg => "ADRG",
            Self::FloatGrid => "float grid",
            Self::LandUse => "land use",
            Self::GeoTiff => "GeoTIFF",
            Self::Bathymetry => "bathymetry",
        };
        f.write_str(name)
    }
}

/// Where a point resolves to within a source.
#[derive(Debug, Clone)]
pub struct Location {
    pub matrix: Arc<TileMatrix>,
    pub row: usize,
    pub col: usize,
    /// Source-specific handle of the backing file, or `None` when no
    /// configured data covers the point.
    pub entry: Option<usize>,
}

impl Location {
    pub fn index(&self) -> usize {
        self.matrix.index(self.row, self.col)
    }

    pub fn name(&self) -> TileName {
        TileName::new(self.matrix.id(), self.index())
    }

    /// Footprint of the located tile.
    pub fn rect(&self) -> GeoRect {
        self.matrix.tile_rect(self.row, self.col)
    }
}

/// A format's directory index and loader.
pub trait TileSource: Send {
    fn format(&self) -> Format;

    /// Resolves a point to a tile. Every point resolves, possibly to
    /// a location with no entry.
    fn locate(&self, lat: C, lon: C) -> Location;

    /// Reads the backing file of a located tile.
    fn load(&self, location: &Location) -> Result<Grid, GridError>;
}

/// Type-erased tile loading, shared by all managers.
pub trait TileService: Send + Sync {
    fn format(&self) -> Format;
    fn load_tile(&self, lat: C, lon: C) -> Arc<Tile>;
    fn unload_tile(&self, tile: &Tile);
    fn get_cached_tile(&self, lat: C, lon: C) -> Option<Arc<Tile>>;
}

struct State<S> {
    source: S,
    cache: TileCache,
    policy: EvictionPolicy,
}

/// Serves tiles of one format from a [TileSource] through a
/// [TileCache].
///
/// All state sits behind one re-entrant lock. Loads of uncached tiles
/// run while the lock is held, so concurrent misses on the same
/// manager serialize.
pub struct TileManager<S> {
    state: ReentrantMutex<RefCell<State<S>>>,
}

impl<S: TileSource> TileManager<S> {
    /// Creates a manager using the format's default eviction policy.
    pub fn new(source: S) -> Self {
        let policy = source.format().default_policy();
        Self::with_policy(source, policy)
    }

    pub fn with_policy(source: S, policy: EvictionPolicy) -> Self {
        Self {
            state: ReentrantMutex::new(RefCell::new(State {
                source,
                cache: TileCache::new(),
                policy,
            })),
        }
    }

    pub fn format(&self) -> Format {
        self.state.lock().borrow().source.format()
    }

    /// Returns the tile covering (`lat`, `lon`), loading it if needed.
    ///
    /// Never fails: missing or unreadable data yields a dummy tile.
    /// Each call must be matched by one [unload_tile](Self::unload_tile).
    pub fn load_tile(&self, lat: C, lon: C) -> Arc<Tile> {
        let guard = self.state.lock();
        if let Some(tile) = self.get_cached_tile(lat, lon) {
            return tile;
        }

        let tile = {
            let state = guard.borrow();
            let location = state.source.locate(lat, lon);
            let grid = match location.entry {
                None => {
                    debug!("no {} data at ({lat}, {lon})", state.source.format());
                    dummy(&location)
                }
                Some(_) => {
                    debug!("loading {} tile {}", state.source.format(), location.name());
                    state.source.load(&location).unwrap_or_else(|err| {
                        warn!(
                            "{} tile {} unavailable ({:?} failure): {err}",
                            state.source.format(),
                            location.name(),
                            err.kind()
                        );
                        dummy(&location)
                    })
                }
            };
            Tile::new(&location.matrix, location.index(), grid)
        };
        let tile = guard.borrow_mut().cache.add(Arc::new(tile));
        self.purge();
        tile
    }

    /// Returns one use of `tile`, making it eligible for eviction when
    /// no uses remain.
    ///
    /// # Panics
    ///
    /// If `tile` is not cached by this manager or has no outstanding
    /// uses.
    pub fn unload_tile(&self, tile: &Tile) {
        let guard = self.state.lock();
        guard.borrow_mut().cache.release(tile.name());
        self.purge();
    }

    /// Returns the cached tile covering (`lat`, `lon`) without ever
    /// reading from disk. A hit counts as a use.
    pub fn get_cached_tile(&self, lat: C, lon: C) -> Option<Arc<Tile>> {
        let guard = self.state.lock();
        let name = guard.borrow().source.locate(lat, lon).name();
        let tile = guard.borrow_mut().cache.use_name(name);
        if tile.is_some() {
            debug!("cache hit {name}");
        }
        tile
    }

    /// Runs `f` against the source, e.g. to add directories.
    pub fn with_source<R>(&self, f: impl FnOnce(&mut S) -> R) -> R {
        let guard = self.state.lock();
        let mut state = guard.borrow_mut();
        f(&mut state.source)
    }

    /// Replaces the eviction policy and applies it immediately.
    pub fn set_policy(&self, policy: EvictionPolicy) {
        let guard = self.state.lock();
        guard.borrow_mut().policy = policy;
        self.purge();
    }

    pub fn policy(&self) -> EvictionPolicy {
        self.state.lock().borrow().policy
    }

    pub fn stats(&self) -> CacheStats {
        self.state.lock().borrow().cache.stats()
    }

    /// Outstanding uses of `tile`, or `None` if it is not cached.
    pub fn use_count(&self, tile: &Tile) -> Option<u32> {
        self.state.lock().borrow().cache.use_count(tile.name())
    }

    /// Evicts every inactive tile, returning how many were evicted.
    pub fn flush(&self) -> usize {
        self.state.lock().borrow_mut().cache.flush()
    }

    fn purge(&self) -> usize {
        let guard = self.state.lock();
        let mut state = guard.borrow_mut();
        let policy = state.policy;
        state.cache.apply(policy)
    }
}

impl<S: TileSource> TileService for TileManager<S> {
    fn format(&self) -> Format {
        TileManager::format(self)
    }

    fn load_tile(&self, lat: C, lon: C) -> Arc<Tile> {
        TileManager::load_tile(self, lat, lon)
    }

    fn unload_tile(&self, tile: &Tile) {
        TileManager::unload_tile(self, tile);
    }

    fn get_cached_tile(&self, lat: C, lon: C) -> Option<Arc<Tile>> {
        TileManager::get_cached_tile(self, lat, lon)
    }
}

impl<S> fmt::Debug for TileManager<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TileManager").finish_non_exhaustive()
    }
}

fn dummy(location: &Location) -> Grid {
    let rect = location.rect();
    Grid::dummy(
        rect.sw_lat(),
        rect.sw_lon(),
        rect.lat_extent(),
        rect.lon_extent(),
    )
}
