//! Per-format directory indexes implementing [TileSource](crate::TileSource).

mod adrg;
mod dted;
mod files;
mod zone;

pub use self::{
    adrg::AdrgSource,
    dted::DtedSource,
    files::{FloatGridSource, LandUseSource},
    zone::ZoneSource,
};

use crate::{Location, TileError};
use geogrid::{GeoRect, GridError, TileMatrix, C};
use std::{
    collections::HashMap,
    io,
    path::{Path, PathBuf},
    sync::Arc,
};

/// Integer (latitude, longitude) of a 1 degree cell's southwest corner.
pub(crate) type CellKey = (i32, i32);

/// Something a [Catalog] can search: a matrix plus knowledge of which
/// of its tiles have data.
pub(crate) trait Entry {
    fn matrix(&self) -> &Arc<TileMatrix>;
    fn has_tile(&self, row: usize, col: usize) -> bool;
}

/// Entries of one source in insertion order. Later entries win.
#[derive(Debug)]
pub(crate) struct Catalog<E> {
    entries: Vec<E>,
    /// Resolves points no entry covers.
    fallback: Arc<TileMatrix>,
}

impl<E: Entry> Catalog<E> {
    pub(crate) fn new() -> Self {
        Self {
            entries: Vec::new(),
            fallback: Arc::new(TileMatrix::global(1.0)),
        }
    }

    pub(crate) fn push(&mut self, entry: E) {
        self.entries.push(entry);
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns the entry a location was resolved to.
    pub(crate) fn entry(&self, location: &Location) -> Result<&E, GridError> {
        location
            .entry
            .and_then(|index| self.entries.get(index))
            .ok_or_else(|| GridError::Io(io::ErrorKind::NotFound.into()))
    }

    pub(crate) fn locate(&self, lat: C, lon: C) -> Location {
        for (index, entry) in self.entries.iter().enumerate().rev() {
            let matrix = entry.matrix();
            if !matrix.contains(lat, lon) {
                continue;
            }
            let (row, col) = matrix.row_col(lat, lon);
            if entry.has_tile(row, col) {
                return Location {
                    matrix: Arc::clone(matrix),
                    row,
                    col,
                    entry: Some(index),
                };
            }
        }
        fallback(&self.fallback, lat, lon)
    }
}

/// Location of a point no configured data covers.
pub(crate) fn fallback(matrix: &Arc<TileMatrix>, lat: C, lon: C) -> Location {
    let (row, col) = matrix.row_col(lat, lon);
    Location {
        matrix: Arc::clone(matrix),
        row,
        col,
        entry: None,
    }
}

/// Returns the integer southwest corner of tile (`row`, `col`).
pub(crate) fn cell_key(matrix: &TileMatrix, row: usize, col: usize) -> CellKey {
    let sw = matrix.tile_rect(row, col).sw();
    #[allow(clippy::cast_possible_truncation)]
    let key = (sw.y.round() as i32, sw.x.round() as i32);
    // The east edge of a dateline matrix wraps to +180.
    if key.1 == 180 {
        (key.0, -180)
    } else {
        key
    }
}

/// True for a non-empty rectangle on whole degrees.
pub(crate) fn is_cell_aligned(rect: &GeoRect) -> bool {
    let whole = |v: C| v.fract() == 0.0;
    rect.lat_extent() > 0.0
        && rect.lon_extent() > 0.0
        && rect.sw_lat() >= -90.0
        && rect.ne_lat() <= 90.0
        && [rect.sw_lat(), rect.sw_lon(), rect.ne_lat(), rect.ne_lon()]
            .into_iter()
            .all(whole)
}

/// Parses a hemisphere-prefixed integer such as `n44` or `w072`.
pub(crate) fn parse_coord(text: &str, positive: char, negative: char) -> Option<i32> {
    let mut chars = text.chars();
    let hemisphere = chars.next()?.to_ascii_lowercase();
    let digits = chars.as_str();
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let value: i32 = digits.parse().ok()?;
    match hemisphere {
        h if h == positive => Some(value),
        h if h == negative => Some(-value),
        _ => None,
    }
}

/// Parses a cell name like `n44w072` into its southwest corner.
pub(crate) fn parse_cell_name(stem: &str) -> Option<CellKey> {
    if stem.len() != 7 || !stem.is_ascii() {
        return None;
    }
    let (lat, lon) = stem.split_at(3);
    Some((parse_coord(lat, 'n', 's')?, parse_coord(lon, 'e', 'w')?))
}

/// True if `path` has extension `ext`, ignoring case.
pub(crate) fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .map_or(false, |found| found.to_string_lossy().eq_ignore_ascii_case(ext))
}

/// Returns the files directly in `dir`, sorted by name.
pub(crate) fn list_files(dir: &Path) -> Result<Vec<PathBuf>, TileError> {
    if !dir.is_dir() {
        return Err(TileError::Directory(dir.to_path_buf()));
    }
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Maps cell names of `ext` files in `dir` to their paths.
pub(crate) fn scan_cells(dir: &Path, ext: &str) -> Result<HashMap<CellKey, PathBuf>, TileError> {
    Ok(list_files(dir)?
        .into_iter()
        .filter(|path| has_extension(path, ext))
        .filter_map(|path| {
            let key = parse_cell_name(&path.file_stem()?.to_string_lossy())?;
            Some((key, path))
        })
        .collect())
}
