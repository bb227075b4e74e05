use crate::Format;
use geogrid::{GeoRect, GridError};
use std::path::PathBuf;
use thiserror::Error;

/// Failures while configuring a tile source.
///
/// Failures while loading an individual tile never surface as errors;
/// managers substitute a dummy tile instead.
#[derive(Error, Debug)]
pub enum TileError {
    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("not a directory {0}")]
    Directory(PathBuf),

    #[error("no {format} files in {path}")]
    Empty { format: Format, path: PathBuf },

    #[error("unsupported DTED level {0}")]
    Level(u8),

    #[error("invalid bounds {0:?}")]
    Bounds(GeoRect),

    #[error("{path}: {source}")]
    Grid { path: PathBuf, source: GridError },
}
