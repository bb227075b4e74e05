//! Sources whose tiles are individual files named after their cell.

use super::{cell_key, is_cell_aligned, parse_cell_name, scan_cells, Catalog, CellKey, Entry};
use crate::{Format, Location, TileError, TileSource};
use geogrid::{float_grid, land_use, GeoRect, Grid, GridError, ReadMode, TileMatrix, C};
use log::info;
use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::Arc,
};

#[derive(Debug)]
enum Files {
    /// 1 degree cells keyed by southwest corner.
    Cells(HashMap<CellKey, PathBuf>),
    /// One file spanning the whole matrix.
    Single(PathBuf),
}

#[derive(Debug)]
struct FileEntry {
    matrix: Arc<TileMatrix>,
    files: Files,
}

impl FileEntry {
    fn path(&self, row: usize, col: usize) -> Option<&Path> {
        match &self.files {
            Files::Cells(cells) => cells
                .get(&cell_key(&self.matrix, row, col))
                .map(PathBuf::as_path),
            Files::Single(path) => Some(path.as_path()),
        }
    }
}

impl Entry for FileEntry {
    fn matrix(&self) -> &Arc<TileMatrix> {
        &self.matrix
    }

    fn has_tile(&self, row: usize, col: usize) -> bool {
        self.path(row, col).is_some()
    }
}

/// Catalog shared by the float grid and land use sources.
#[derive(Debug)]
struct CellFiles {
    format: Format,
    extensions: &'static [&'static str],
    catalog: Catalog<FileEntry>,
    mode: ReadMode,
}

impl CellFiles {
    fn new(format: Format, extensions: &'static [&'static str]) -> Self {
        Self {
            format,
            extensions,
            catalog: Catalog::new(),
            mode: ReadMode::InMem,
        }
    }

    fn add_directory(&mut self, dir: &Path, rect: GeoRect) -> Result<usize, TileError> {
        if !is_cell_aligned(&rect) {
            return Err(TileError::Bounds(rect));
        }
        let mut cells = HashMap::new();
        for ext in self.extensions {
            // Earlier extensions take precedence for the same cell.
            for (key, path) in scan_cells(dir, ext)? {
                cells.entry(key).or_insert(path);
            }
        }
        cells.retain(|&(lat, lon), _| rect.contains(C::from(lat) + 0.5, C::from(lon) + 0.5));
        if cells.is_empty() {
            return Err(TileError::Empty {
                format: self.format,
                path: dir.to_path_buf(),
            });
        }
        let count = cells.len();
        info!("added {} directory {dir:?} with {count} cells", self.format);
        self.catalog.push(FileEntry {
            matrix: Arc::new(TileMatrix::with_tile_size(rect, 1.0)),
            files: Files::Cells(cells),
        });
        Ok(count)
    }

    fn add_file(&mut self, path: &Path, rect: GeoRect) {
        info!("added {} file {path:?} over {rect:?}", self.format);
        self.catalog.push(FileEntry {
            matrix: Arc::new(TileMatrix::new(rect, 1, 1)),
            files: Files::Single(path.to_path_buf()),
        });
    }

    fn path(&self, location: &Location) -> Result<&Path, GridError> {
        self.catalog
            .entry(location)?
            .path(location.row, location.col)
            .ok_or_else(|| GridError::Io(std::io::ErrorKind::NotFound.into()))
    }

    /// Footprint of a float grid file from its header.
    fn float_grid_bounds(&self, path: &Path) -> Result<GeoRect, TileError> {
        let wrap = |source: GridError| TileError::Grid {
            path: path.to_path_buf(),
            source,
        };
        let bytes = self.mode.open(path).map_err(|e| wrap(e.into()))?;
        let (header, _) = float_grid::parse_header(&bytes).map_err(wrap)?;
        Ok(header.layout().bounds())
    }
}

/// ESRI float grid elevation tiles.
#[derive(Debug)]
pub struct FloatGridSource(CellFiles);

impl Default for FloatGridSource {
    fn default() -> Self {
        Self::new()
    }
}

impl FloatGridSource {
    pub fn new() -> Self {
        Self(CellFiles::new(Format::FloatGrid, &["flt"]))
    }

    pub fn set_read_mode(&mut self, mode: ReadMode) {
        self.0.mode = mode;
    }

    /// Indexes `<n|s>DD<e|w>DDD.flt` tiles in `dir` lying inside
    /// `rect`, returning how many were found.
    pub fn add_directory(&mut self, dir: impl AsRef<Path>, rect: GeoRect) -> Result<usize, TileError> {
        self.0.add_directory(dir.as_ref(), rect)
    }

    /// Adds a single grid covering whatever its header says.
    pub fn add_file(&mut self, path: impl AsRef<Path>) -> Result<(), TileError> {
        let path = path.as_ref();
        let rect = self.0.float_grid_bounds(path)?;
        self.0.add_file(path, rect);
        Ok(())
    }

    pub fn entries(&self) -> usize {
        self.0.catalog.len()
    }
}

impl TileSource for FloatGridSource {
    fn format(&self) -> Format {
        Format::FloatGrid
    }

    fn locate(&self, lat: C, lon: C) -> Location {
        self.0.catalog.locate(lat, lon)
    }

    fn load(&self, location: &Location) -> Result<Grid, GridError> {
        float_grid::load(self.0.path(location)?, self.0.mode)
    }
}

/// Land-use category tiles, as bitmaps or float grids.
#[derive(Debug)]
pub struct LandUseSource(CellFiles);

impl Default for LandUseSource {
    fn default() -> Self {
        Self::new()
    }
}

impl LandUseSource {
    pub fn new() -> Self {
        Self(CellFiles::new(Format::LandUse, &["bmp", "flt"]))
    }

    pub fn set_read_mode(&mut self, mode: ReadMode) {
        self.0.mode = mode;
    }

    /// Indexes cell-named `.bmp` and `.flt` tiles in `dir` lying
    /// inside `rect`. A bitmap wins over a float grid for the same
    /// cell.
    pub fn add_directory(&mut self, dir: impl AsRef<Path>, rect: GeoRect) -> Result<usize, TileError> {
        self.0.add_directory(dir.as_ref(), rect)
    }

    /// Adds a single tile. Bitmaps carry no georeferencing and must be
    /// named after their 1 degree cell.
    pub fn add_file(&mut self, path: impl AsRef<Path>) -> Result<(), TileError> {
        let path = path.as_ref();
        let rect = if super::has_extension(path, "bmp") {
            path.file_stem()
                .and_then(|stem| parse_cell_name(&stem.to_string_lossy()))
                .map(|(lat, lon)| GeoRect::from_sw(C::from(lat), C::from(lon), 1.0, 1.0))
                .ok_or_else(|| TileError::Grid {
                    path: path.to_path_buf(),
                    source: GridError::MissingField("cell name"),
                })?
        } else {
            self.0.float_grid_bounds(path)?
        };
        self.0.add_file(path, rect);
        Ok(())
    }

    pub fn entries(&self) -> usize {
        self.0.catalog.len()
    }
}

impl TileSource for LandUseSource {
    fn format(&self) -> Format {
        Format::LandUse
    }

    fn locate(&self, lat: C, lon: C) -> Location {
        self.0.catalog.locate(lat, lon)
    }

    fn load(&self, location: &Location) -> Result<Grid, GridError> {
        land_use::load(self.0.path(location)?, &location.rect(), self.0.mode)
    }
}
