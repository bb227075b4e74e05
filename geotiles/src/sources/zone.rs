use super::{fallback, has_extension, list_files};
use crate::{Format, Location, SpatialPartitionTree, TileError, TileSource};
use geogrid::{bathymetry, geotiff, GeoRect, Grid, GridError, ReadMode, TileMatrix, C};
use log::{info, warn};
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    GeoTiff,
    Bathymetry,
}

impl Kind {
    fn extensions(self) -> &'static [&'static str] {
        match self {
            Self::GeoTiff => &["tif", "tiff"],
            Self::Bathymetry => &["xyz"],
        }
    }

    fn load(self, path: &Path, mode: ReadMode) -> Result<Grid, GridError> {
        match self {
            Self::GeoTiff => geotiff::load(path, mode),
            Self::Bathymetry => bathymetry::load(path, mode),
        }
    }

    fn footprint(self, path: &Path, mode: ReadMode) -> Result<GeoRect, GridError> {
        match self {
            Self::GeoTiff => geotiff::bounds(&mode.open(path)?),
            // XYZ files carry no header; the lattice must be read.
            Self::Bathymetry => Ok(*bathymetry::load(path, mode)?.bounds()),
        }
    }
}

#[derive(Debug)]
struct ZoneFile {
    path: PathBuf,
    matrix: Arc<TileMatrix>,
}

/// Files with arbitrary footprints, located through a
/// [SpatialPartitionTree]. Each file is a single tile.
#[derive(Debug)]
pub struct ZoneSource {
    kind: Kind,
    mode: ReadMode,
    tree: SpatialPartitionTree,
    files: Vec<ZoneFile>,
    fallback: Arc<TileMatrix>,
}

impl ZoneSource {
    fn new(kind: Kind) -> Self {
        Self {
            kind,
            mode: ReadMode::InMem,
            tree: SpatialPartitionTree::new(),
            files: Vec::new(),
            fallback: Arc::new(TileMatrix::global(1.0)),
        }
    }

    /// A source of single-band GeoTIFF rasters.
    pub fn geotiff() -> Self {
        Self::new(Kind::GeoTiff)
    }

    /// A source of `lon lat depth` XYZ grids.
    pub fn bathymetry() -> Self {
        Self::new(Kind::Bathymetry)
    }

    pub fn set_read_mode(&mut self, mode: ReadMode) {
        self.mode = mode;
    }

    /// Adds one file, which takes precedence over every file added
    /// before it where they overlap.
    pub fn add_file(&mut self, path: impl AsRef<Path>) -> Result<(), TileError> {
        let path = path.as_ref();
        let rect = self
            .kind
            .footprint(path, self.mode)
            .map_err(|source| TileError::Grid {
                path: path.to_path_buf(),
                source,
            })?;
        let zone = self.files.len();
        self.tree.insert_rect(&rect, zone);
        self.files.push(ZoneFile {
            path: path.to_path_buf(),
            matrix: Arc::new(TileMatrix::new(rect, 1, 1)),
        });
        info!("added {} file {path:?} over {rect:?}", self.format());
        Ok(())
    }

    /// Adds the readable files in `dir` in name order, returning how
    /// many were added.
    pub fn add_directory(&mut self, dir: impl AsRef<Path>) -> Result<usize, TileError> {
        let dir = dir.as_ref();
        let mut added = 0;
        for path in list_files(dir)? {
            if !self.kind.extensions().iter().any(|ext| has_extension(&path, ext)) {
                continue;
            }
            match self.add_file(&path) {
                Ok(()) => added += 1,
                Err(e) => warn!("skipping {} file: {e}", self.format()),
            }
        }
        if added == 0 {
            return Err(TileError::Empty {
                format: self.format(),
                path: dir.to_path_buf(),
            });
        }
        Ok(added)
    }

    pub fn files(&self) -> usize {
        self.files.len()
    }
}

impl TileSource for ZoneSource {
    fn format(&self) -> Format {
        match self.kind {
            Kind::GeoTiff => Format::GeoTiff,
            Kind::Bathymetry => Format::Bathymetry,
        }
    }

    fn locate(&self, lat: C, lon: C) -> Location {
        match self.tree.lookup(lon, lat) {
            Some(zone) => Location {
                matrix: Arc::clone(&self.files[zone].matrix),
                row: 0,
                col: 0,
                entry: Some(zone),
            },
            None => fallback(&self.fallback, lat, lon),
        }
    }

    fn load(&self, location: &Location) -> Result<Grid, GridError> {
        let file = location
            .entry
            .and_then(|zone| self.files.get(zone))
            .ok_or_else(|| GridError::Io(std::io::ErrorKind::NotFound.into()))?;
        self.kind.load(&file.path, self.mode)
    }
}
