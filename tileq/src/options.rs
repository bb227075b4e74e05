use anyhow::{anyhow, bail, Error as AnyError};
use clap::{Parser, Subcommand};
use geo::geometry::Coord;
use geotiles::{Format, Layer};
use std::{path::PathBuf, str::FromStr};

/// Samples terrain, vegetation, bathymetry, land use and imagery tiles.
///
/// Each layer takes one or more `KIND:PATH` sources, where KIND is
/// one of dted0, dted1, dted2, adrg, flt, landuse, tif or xyz and PATH
/// is a directory or a single file. Later sources win where they
/// overlap. All sources of one layer must be of the same format.
#[derive(Parser, Debug)]
pub struct Cli {
    #[arg(long)]
    pub terrain: Vec<SourceArg>,

    #[arg(long)]
    pub vegetation: Vec<SourceArg>,

    #[arg(long)]
    pub bathymetry: Vec<SourceArg>,

    #[arg(long)]
    pub land_use: Vec<SourceArg>,

    #[arg(long)]
    pub imagery: Vec<SourceArg>,

    /// Memory map files instead of reading them.
    #[arg(long)]
    pub mmap: bool,

    /// Print JSON instead of text.
    #[arg(long)]
    pub json: bool,

    #[command(subcommand)]
    pub cmd: Command,
}

impl Cli {
    pub fn sources(&self) -> [(Layer, &[SourceArg]); 5] {
        [
            (Layer::Terrain, self.terrain.as_slice()),
            (Layer::Vegetation, self.vegetation.as_slice()),
            (Layer::Bathymetry, self.bathymetry.as_slice()),
            (Layer::LandUse, self.land_use.as_slice()),
            (Layer::Imagery, self.imagery.as_slice()),
        ]
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Sample every layer at one point.
    Point {
        /// "lat,lon"
        at: LatLon,
    },

    /// Sample every layer along the great circle between two points.
    Line {
        /// Start "lat,lon"
        #[arg(long)]
        start: LatLon,

        /// Destination "lat,lon"
        #[arg(long)]
        dest: LatLon,

        /// Number of samples, endpoints included.
        #[arg(short, long, default_value_t = 100)]
        points: usize,
    },
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LatLon(pub Coord<f64>);

impl FromStr for LatLon {
    type Err = AnyError;
    fn from_str(s: &str) -> Result<Self, AnyError> {
        let (lat_str, lon_str) = s
            .split_once(',')
            .ok_or_else(|| anyhow!("not a valid lat,lon pair"))?;
        let lat = f64::from_str(lat_str.trim())?;
        let lon = f64::from_str(lon_str.trim())?;
        if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
            bail!("{s} is out of range");
        }
        Ok(Self(Coord { y: lat, x: lon }))
    }
}

/// One `KIND:PATH` layer source.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceArg {
    pub format: Format,
    /// DTED level, for DTED sources only.
    pub level: Option<u8>,
    pub path: PathBuf,
}

impl FromStr for SourceArg {
    type Err = AnyError;
    fn from_str(s: &str) -> Result<Self, AnyError> {
        let (kind, path) = s
            .split_once(':')
            .ok_or_else(|| anyhow!("expected KIND:PATH, got {s}"))?;
        if path.is_empty() {
            bail!("missing path in {s}");
        }
        let (format, level) = match kind.to_ascii_lowercase().as_str() {
            "dted0" => (Format::Dted, Some(0)),
            "dted1" => (Format::Dted, Some(1)),
            "dted2" => (Format::Dted, Some(2)),
            "adrg" => (Format::Adrg, None),
            "flt" => (Format::FloatGrid, None),
            "landuse" => (Format::LandUse, None),
            "tif" | "geotiff" => (Format::GeoTiff, None),
            "xyz" | "bathymetry" => (Format::Bathymetry, None),
            other => bail!("unknown source kind {other}"),
        };
        Ok(Self {
            format,
            level,
            path: PathBuf::from(path),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{Cli, Command, LatLon, SourceArg};
    use clap::Parser;
    use geotiles::Format;
    use std::path::Path;

    #[test]
    fn test_lat_lon() {
        let LatLon(coord) = "44.27, -71.3".parse().unwrap();
        assert_eq!((coord.y, coord.x), (44.27, -71.3));
        assert!("44.27".parse::<LatLon>().is_err());
        assert!("91,0".parse::<LatLon>().is_err());
        assert!("north,0".parse::<LatLon>().is_err());
    }

    #[test]
    fn test_source_arg() {
        let arg: SourceArg = "dted2:/data/dted".parse().unwrap();
        assert_eq!(arg.format, Format::Dted);
        assert_eq!(arg.level, Some(2));
        assert_eq!(arg.path, Path::new("/data/dted"));
        let arg: SourceArg = "XYZ:gulf.xyz".parse().unwrap();
        assert_eq!((arg.format, arg.level), (Format::Bathymetry, None));
        assert!("dted3:/data".parse::<SourceArg>().is_err());
        assert!("flt:".parse::<SourceArg>().is_err());
        assert!("/data/dted".parse::<SourceArg>().is_err());
    }

    #[test]
    fn test_parse_cli() {
        let cli = Cli::try_parse_from([
            "tileq",
            "--terrain",
            "dted1:/a",
            "--terrain",
            "dted2:/b",
            "--land-use",
            "landuse:/c",
            "--json",
            "line",
            "--start",
            "44,-72",
            "--dest",
            "45,-71",
        ])
        .unwrap();
        assert_eq!(cli.terrain.len(), 2);
        assert_eq!(cli.land_use[0].format, Format::LandUse);
        assert!(cli.json && !cli.mmap);
        assert!(matches!(cli.cmd, Command::Line { points: 100, .. }));
    }
}
