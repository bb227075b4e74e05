use crate::{rect::wrap_lon, GeoRect, C};
use std::{
    fmt,
    sync::atomic::{AtomicU32, Ordering},
};

static NEXT_MATRIX_ID: AtomicU32 = AtomicU32::new(0);

/// Process-unique identity of a [TileMatrix].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MatrixId(u32);

impl MatrixId {
    fn next() -> Self {
        Self(NEXT_MATRIX_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for MatrixId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "m{}", self.0)
    }
}

/// A [GeoRect] divided into `rows` x `cols` equally sized tiles.
///
/// Row 0 is the northernmost row.
#[derive(Debug)]
pub struct TileMatrix {
    id: MatrixId,
    rect: GeoRect,
    rows: usize,
    cols: usize,
    lat_tile_deg: C,
    lon_tile_deg: C,
}

impl TileMatrix {
    pub fn new(rect: GeoRect, rows: usize, cols: usize) -> Self {
        assert!(rows > 0 && cols > 0, "empty tile matrix {rows}x{cols}");
        #[allow(clippy::cast_precision_loss)]
        let (lat_tile_deg, lon_tile_deg) = (
            rect.lat_extent() / rows as C,
            rect.lon_extent() / cols as C,
        );
        Self {
            id: MatrixId::next(),
            rect,
            rows,
            cols,
            lat_tile_deg,
            lon_tile_deg,
        }
    }

    /// Returns a matrix of `tile_deg` square tiles over `rect`.
    pub fn with_tile_size(rect: GeoRect, tile_deg: C) -> Self {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let (rows, cols) = (
            ((rect.lat_extent() / tile_deg).round() as usize).max(1),
            ((rect.lon_extent() / tile_deg).round() as usize).max(1),
        );
        Self::new(rect, rows, cols)
    }

    /// Returns a whole-globe matrix of `tile_deg` square tiles.
    pub fn global(tile_deg: C) -> Self {
        Self::with_tile_size(GeoRect::world(), tile_deg)
    }

    pub fn id(&self) -> MatrixId {
        self.id
    }

    pub fn rect(&self) -> &GeoRect {
        &self.rect
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn lat_tile_deg(&self) -> C {
        self.lat_tile_deg
    }

    pub fn lon_tile_deg(&self) -> C {
        self.lon_tile_deg
    }

    pub fn contains(&self, lat: C, lon: C) -> bool {
        self.rect.contains(lat, lon)
    }

    /// Returns the row holding `lat`, clamped to `[0, rows - 1]`.
    pub fn row(&self, lat: C) -> usize {
        clamp_index((self.rect.ne_lat() - lat) / self.lat_tile_deg, self.rows)
    }

    /// Returns the column holding `lon`, clamped to `[0, cols - 1]`.
    pub fn col(&self, lon: C) -> usize {
        let mut offset = lon - self.rect.sw_lon();
        if self.rect.spans_dateline() && offset < 0.0 {
            offset += 360.0;
        }
        clamp_index(offset / self.lon_tile_deg, self.cols)
    }

    pub fn row_col(&self, lat: C, lon: C) -> (usize, usize) {
        (self.row(lat), self.col(lon))
    }

    pub fn index(&self, row: usize, col: usize) -> usize {
        debug_assert!(row < self.rows && col < self.cols);
        row * self.cols + col
    }

    /// Returns the footprint of the tile at (`row`, `col`).
    pub fn tile_rect(&self, row: usize, col: usize) -> GeoRect {
        #[allow(clippy::cast_precision_loss)]
        let (row, col) = (row as C, col as C);
        let ne_lat = self.rect.ne_lat() - row * self.lat_tile_deg;
        let sw_lon = wrap_lon(self.rect.sw_lon() + col * self.lon_tile_deg);
        GeoRect::from_sw(
            ne_lat - self.lat_tile_deg,
            sw_lon,
            self.lat_tile_deg,
            self.lon_tile_deg,
        )
    }
}

fn clamp_index(fractional: C, len: usize) -> usize {
    let floor = fractional.floor();
    if floor <= 0.0 || floor.is_nan() {
        0
    } else {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let idx = floor as usize;
        idx.min(len - 1)
    }
}

#[cfg(test)]
mod tests {
    use super::{GeoRect, TileMatrix};

    #[test]
    fn test_row_col() {
        let matrix = TileMatrix::global(1.0);
        assert_eq!((matrix.rows(), matrix.cols()), (180, 360));
        // Row 0 is the northernmost.
        assert_eq!(matrix.row(89.5), 0);
        assert_eq!(matrix.row(-89.5), 179);
        assert_eq!(matrix.row_col(44.27, -71.3), (45, 108));
        assert_eq!(matrix.index(45, 108), 45 * 360 + 108);
    }

    #[test]
    fn test_clamping() {
        let matrix = TileMatrix::new(GeoRect::new(40.0, -75.0, 45.0, -70.0), 5, 5);
        assert_eq!(matrix.row(50.0), 0);
        assert_eq!(matrix.row(30.0), 4);
        assert_eq!(matrix.row(40.0), 4);
        assert_eq!(matrix.col(-80.0), 0);
        assert_eq!(matrix.col(-60.0), 4);
        assert_eq!(matrix.col(-70.0), 4);
    }

    #[test]
    fn test_tile_rect() {
        let matrix = TileMatrix::global(1.0);
        let (row, col) = matrix.row_col(44.27, -71.3);
        let rect = matrix.tile_rect(row, col);
        assert_eq!(rect, GeoRect::new(44.0, -72.0, 45.0, -71.0));
        assert!(rect.contains(44.27, -71.3));
    }

    #[test]
    fn test_dateline_matrix() {
        let matrix = TileMatrix::new(GeoRect::new(-10.0, 170.0, 10.0, -170.0), 2, 4);
        assert_eq!(matrix.lon_tile_deg(), 5.0);
        assert_eq!(matrix.col(171.0), 0);
        assert_eq!(matrix.col(179.0), 1);
        assert_eq!(matrix.col(-179.0), 2);
        assert_eq!(matrix.col(-171.0), 3);
        let rect = matrix.tile_rect(0, 2);
        assert_eq!(rect, GeoRect::new(0.0, 180.0, 10.0, -175.0));
        assert!(rect.contains(5.0, -177.0));
    }

    #[test]
    fn test_ids_are_unique() {
        let a = TileMatrix::global(1.0);
        let b = TileMatrix::global(1.0);
        assert_ne!(a.id(), b.id());
    }
}
