//! Geographic sample grids and the legacy raster formats that fill them.
//!
//! A [Grid] is a regular lattice of samples anchored at its southwest
//! sample, with rows advancing north and columns advancing east. The
//! format modules decode one backing file into one grid:
//!
//! | module         | format                                             |
//! |----------------|----------------------------------------------------|
//! | [dted]         | DTED level 0/1/2 elevation cells                   |
//! | [adrg]         | ADRG scanned map imagery ([iso8211] containers)    |
//! | [float_grid]   | ESRI float grids (`.flt` with ASCII header)        |
//! | [land_use]     | land-use codes as float grids or 8-bit bitmaps     |
//! | [geotiff]      | single-image GeoTIFF                               |
//! | [bathymetry]   | `lon lat depth` XYZ text grids                     |
//!
//! # References
//!
//! 1. [MIL-PRF-89020B, Digital Terrain Elevation Data](https://www.dlr.de/eoc/Portaldata/60/Resources/dokumente/7_sat_miss/SRTM-XSAR-DEM-DTED-1.1.pdf)
//! 1. [ISO/IEC 8211 data descriptive file](https://en.wikipedia.org/wiki/ISO/IEC_8211)
//! 1. [ESRI grid float](https://desktop.arcgis.com/en/arcmap/latest/tools/conversion-toolbox/float-to-raster.htm)
//! 1. [GeoTIFF format specification](http://geotiff.maptools.org/spec/geotiffhome.html)

pub mod adrg;
pub mod bathymetry;
pub mod dted;
mod error;
pub mod float_grid;
pub mod geotiff;
mod grid;
pub mod iso8211;
pub mod land_use;
mod matrix;
mod rect;
mod source;

pub use crate::{
    error::{FailureKind, GridError},
    grid::{ElementType, Grid, GridLayout, SampleStore, StorageOrder},
    matrix::{MatrixId, TileMatrix},
    rect::{wrap_lon, GeoRect},
    source::{FileBytes, ReadMode},
};

/// Base floating point type used for all coordinates and samples.
pub type C = f64;

/// Parses a decimal field, tolerating surrounding blanks.
pub(crate) fn parse_field<T: std::str::FromStr>(
    field: &'static str,
    raw: &str,
) -> Result<T, GridError> {
    raw.trim()
        .parse()
        .map_err(|_| GridError::header(field, raw.trim()))
}
