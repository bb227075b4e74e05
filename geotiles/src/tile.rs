use geogrid::{GeoRect, Grid, MatrixId, TileMatrix, C};
use std::{
    fmt,
    sync::{Arc, Weak},
};

/// Cache key of a tile: the owning matrix, then the tile's index in
/// that matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TileName {
    matrix: MatrixId,
    index: usize,
}

impl TileName {
    pub fn new(matrix: MatrixId, index: usize) -> Self {
        Self { matrix, index }
    }

    pub fn matrix(&self) -> MatrixId {
        self.matrix
    }

    pub fn index(&self) -> usize {
        self.index
    }
}

impl fmt::Display for TileName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.matrix, self.index)
    }
}

/// A loaded tile.
///
/// Tiles are handed out as `Arc<Tile>` by a
/// [TileManager](crate::TileManager) and must be returned with
/// `unload_tile` once the caller is done sampling.
#[derive(Debug)]
pub struct Tile {
    name: TileName,
    matrix: Weak<TileMatrix>,
    grid: Grid,
}

impl Tile {
    pub fn new(matrix: &Arc<TileMatrix>, index: usize, grid: Grid) -> Self {
        Self {
            name: TileName::new(matrix.id(), index),
            matrix: Arc::downgrade(matrix),
            grid,
        }
    }

    pub fn name(&self) -> TileName {
        self.name
    }

    pub fn index(&self) -> usize {
        self.name.index
    }

    /// Returns the owning matrix, if its source is still alive.
    pub fn matrix(&self) -> Option<Arc<TileMatrix>> {
        self.matrix.upgrade()
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn bounds(&self) -> &GeoRect {
        self.grid.bounds()
    }

    pub fn contains(&self, lat: C, lon: C) -> bool {
        self.grid.bounds().contains(lat, lon)
    }

    /// True if this tile stands in for data that could not be loaded.
    pub fn is_dummy(&self) -> bool {
        self.grid.is_dummy()
    }

    pub fn data_size(&self) -> usize {
        self.grid.data_size()
    }

    pub fn approx(&self, lat: C, lon: C) -> Option<C> {
        self.grid.approx(lat, lon)
    }

    pub fn interp(&self, lat: C, lon: C) -> Option<C> {
        self.grid.interp(lat, lon)
    }

    pub fn approx_band(&self, band: usize, lat: C, lon: C) -> Option<C> {
        self.grid.approx_band(band, lat, lon)
    }

    pub fn interp_band(&self, band: usize, lat: C, lon: C) -> Option<C> {
        self.grid.interp_band(band, lat, lon)
    }
}
