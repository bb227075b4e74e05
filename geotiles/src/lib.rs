//! Use-counted caches of geographic raster tiles.
//!
//! Each supported [Format] has a [TileSource] that indexes files on
//! disk and a [TileManager] that loads the tile covering a point on
//! demand, holds it in a [TileCache] while callers use it, and evicts
//! it under an [EvictionPolicy] once released.
//!
//! ```no_run
//! use geotiles::{sources::DtedSource, TileManager};
//!
//! let mut source = DtedSource::new();
//! source.add_directory("/data/dted", 1)?;
//! let manager = TileManager::new(source);
//! let tile = manager.load_tile(44.2705, -71.3033);
//! let elevation = tile.interp(44.2705, -71.3033);
//! manager.unload_tile(&tile);
//! # Ok::<(), geotiles::TileError>(())
//! ```

mod bsp;
mod cache;
mod cursor;
mod error;
mod layers;
mod manager;
pub mod sources;
mod tile;

pub use crate::{
    bsp::{Axis, Comparison, Edge, SpatialPartitionTree},
    cache::{CacheStats, EvictionPolicy, TileCache, DEFAULT_KEEP_INACTIVE},
    cursor::{sample_line, ElevationCursor, Profile, Sample},
    error::TileError,
    layers::{Layer, Layers},
    manager::{Format, Location, TileManager, TileService, TileSource},
    tile::{Tile, TileName},
};
