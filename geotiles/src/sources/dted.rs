use super::{cell_key, is_cell_aligned, list_files, parse_coord, Catalog, CellKey, Entry};
use crate::{Format, Location, TileError, TileSource};
use geogrid::{
    dted::{self, DtedOptions},
    GeoRect, Grid, GridError, ReadMode, TileMatrix, C,
};
use log::info;
use std::{
    collections::HashSet,
    path::{Path, PathBuf},
    sync::Arc,
};

const MAX_LEVEL: u8 = 2;

#[derive(Debug)]
struct DtedDirectory {
    root: PathBuf,
    level: u8,
    matrix: Arc<TileMatrix>,
    /// Cells found on disk; `None` for raw directories, which are
    /// trusted to hold every cell of their footprint.
    cells: Option<HashSet<CellKey>>,
}

impl Entry for DtedDirectory {
    fn matrix(&self) -> &Arc<TileMatrix> {
        &self.matrix
    }

    fn has_tile(&self, row: usize, col: usize) -> bool {
        self.cells
            .as_ref()
            .map_or(true, |cells| cells.contains(&cell_key(&self.matrix, row, col)))
    }
}

/// DTED cells laid out as `<root>/<e|w>DDD/<n|s>DD.dt<level>`.
#[derive(Debug)]
pub struct DtedSource {
    catalog: Catalog<DtedDirectory>,
    options: DtedOptions,
}

impl Default for DtedSource {
    fn default() -> Self {
        Self::new()
    }
}

impl DtedSource {
    pub fn new() -> Self {
        Self {
            catalog: Catalog::new(),
            options: DtedOptions::default(),
        }
    }

    pub fn validate_checksum(&self) -> bool {
        self.options.validate_checksum
    }

    /// Enables or disables per-record checksum validation for
    /// subsequent loads.
    pub fn set_validate_checksum(&mut self, validate: bool) {
        self.options.validate_checksum = validate;
    }

    pub fn set_read_mode(&mut self, mode: ReadMode) {
        self.options.mode = mode;
    }

    pub fn directories(&self) -> usize {
        self.catalog.len()
    }

    /// Indexes the cells present under `root`, returning how many
    /// were found.
    pub fn add_directory(&mut self, root: impl AsRef<Path>, level: u8) -> Result<usize, TileError> {
        let root = root.as_ref();
        check_level(level)?;
        let cells = scan(root, level)?;
        if cells.is_empty() {
            return Err(TileError::Empty {
                format: Format::Dted,
                path: root.to_path_buf(),
            });
        }
        let count = cells.len();
        info!("added DTED level {level} directory {root:?} with {count} cells");
        self.catalog.push(DtedDirectory {
            root: root.to_path_buf(),
            level,
            matrix: Arc::new(TileMatrix::global(1.0)),
            cells: Some(cells),
        });
        Ok(count)
    }

    /// Adds a directory without scanning it. Every cell inside `rect`
    /// is assumed present; missing ones load as dummies.
    pub fn add_raw_directory(
        &mut self,
        root: impl AsRef<Path>,
        level: u8,
        rect: GeoRect,
    ) -> Result<(), TileError> {
        let root = root.as_ref();
        check_level(level)?;
        if !root.is_dir() {
            return Err(TileError::Directory(root.to_path_buf()));
        }
        if !is_cell_aligned(&rect) {
            return Err(TileError::Bounds(rect));
        }
        info!("added raw DTED level {level} directory {root:?} over {rect:?}");
        self.catalog.push(DtedDirectory {
            root: root.to_path_buf(),
            level,
            matrix: Arc::new(TileMatrix::with_tile_size(rect, 1.0)),
            cells: None,
        });
        Ok(())
    }
}

impl TileSource for DtedSource {
    fn format(&self) -> Format {
        Format::Dted
    }

    fn locate(&self, lat: C, lon: C) -> Location {
        self.catalog.locate(lat, lon)
    }

    fn load(&self, location: &Location) -> Result<Grid, GridError> {
        let directory = self.catalog.entry(location)?;
        let (sw_lat, sw_lon) = cell_key(&location.matrix, location.row, location.col);
        let path = dted::cell_path(&directory.root, directory.level, sw_lat, sw_lon);
        dted::load(&path, self.options)
    }
}

fn check_level(level: u8) -> Result<(), TileError> {
    if level > MAX_LEVEL {
        return Err(TileError::Level(level));
    }
    Ok(())
}

fn scan(root: &Path, level: u8) -> Result<HashSet<CellKey>, TileError> {
    if !root.is_dir() {
        return Err(TileError::Directory(root.to_path_buf()));
    }
    let extension = format!("dt{level}");
    let mut cells = HashSet::new();
    for entry in std::fs::read_dir(root)? {
        let lon_dir = entry?.path();
        let Some(lon) = lon_dir
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .filter(|name| name.len() == 4)
            .and_then(|name| parse_coord(&name, 'e', 'w'))
        else {
            continue;
        };
        if !lon_dir.is_dir() {
            continue;
        }
        for file in list_files(&lon_dir)? {
            if !super::has_extension(&file, &extension) {
                continue;
            }
            let lat = file
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .filter(|stem| stem.len() == 3)
                .and_then(|stem| parse_coord(&stem, 'n', 's'));
            if let Some(lat) = lat {
                cells.insert((lat, lon));
            }
        }
    }
    Ok(cells)
}
