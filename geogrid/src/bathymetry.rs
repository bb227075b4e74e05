//! Bathymetry XYZ text grids.
//!
//! One `lon lat depth` triple per line, separated by whitespace or
//! commas. Blank lines and `#` comments are ignored. The points must
//! form a complete, regularly spaced lattice, in any order.

use crate::{Grid, GridError, GridLayout, ReadMode, SampleStore, StorageOrder, C};
use geo::geometry::Coord;
use std::path::Path;

/// Fraction of an interval a coordinate may stray from its lattice
/// position.
const TOLERANCE: C = 1e-6;

pub fn decode(bytes: &[u8]) -> Result<Grid, GridError> {
    let text = std::str::from_utf8(bytes).map_err(|_| GridError::header("xyz", "non-UTF-8"))?;
    let mut points = Vec::new();
    for line in text.lines() {
        let line = line.split('#').next().unwrap_or_default();
        let mut values = line
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|word| !word.is_empty());
        let Some(first) = values.next() else {
            continue;
        };
        let lon: C = crate::parse_field("xyz longitude", first)?;
        let lat: C = crate::parse_field(
            "xyz latitude",
            values.next().ok_or(GridError::MissingField("xyz latitude"))?,
        )?;
        let depth: C = crate::parse_field(
            "xyz depth",
            values.next().ok_or(GridError::MissingField("xyz depth"))?,
        )?;
        points.push((lon, lat, depth));
    }

    let lons = Axis::new(points.iter().map(|p| p.0))?;
    let lats = Axis::new(points.iter().map(|p| p.1))?;
    let dimension_err = || GridError::Dimensions {
        lat_points: lats.points,
        lon_points: lons.points,
        samples: points.len(),
    };
    if lons.points * lats.points != points.len() {
        return Err(dimension_err());
    }

    let mut samples = vec![C::NAN; points.len()];
    for &(lon, lat, depth) in &points {
        let index = lats.index(lat).ok_or_else(dimension_err)? * lons.points
            + lons.index(lon).ok_or_else(dimension_err)?;
        if !samples[index].is_nan() {
            return Err(dimension_err());
        }
        samples[index] = depth;
    }

    let layout = GridLayout {
        origin: Coord {
            x: lons.min,
            y: lats.min,
        },
        lat_points: lats.points,
        lon_points: lons.points,
        lat_interval: lats.interval,
        lon_interval: lons.interval,
        order: StorageOrder::RowMajor,
    };
    Grid::new(layout, SampleStore::Float64(samples.into_boxed_slice()))
}

pub fn load(path: &Path, mode: ReadMode) -> Result<Grid, GridError> {
    decode(&mode.open(path)?)
}

/// Distinct, evenly spaced coordinates along one axis.
struct Axis {
    min: C,
    interval: C,
    points: usize,
}

impl Axis {
    fn new(coords: impl Iterator<Item = C>) -> Result<Self, GridError> {
        let mut distinct: Vec<C> = coords.collect();
        distinct.sort_by(C::total_cmp);
        distinct.dedup();
        let (Some(&min), Some(&max)) = (distinct.first(), distinct.last()) else {
            return Err(GridError::MissingField("xyz points"));
        };
        if distinct.len() < 2 {
            return Err(GridError::Dimensions {
                lat_points: distinct.len(),
                lon_points: distinct.len(),
                samples: distinct.len(),
            });
        }
        #[allow(clippy::cast_precision_loss)]
        let axis = Self {
            min,
            interval: (max - min) / (distinct.len() - 1) as C,
            points: distinct.len(),
        };
        for (i, &coord) in distinct.iter().enumerate() {
            if axis.index(coord) != Some(i) {
                return Err(GridError::header("xyz spacing", coord.to_string()));
            }
        }
        Ok(axis)
    }

    fn index(&self, coord: C) -> Option<usize> {
        let fractional = (coord - self.min) / self.interval;
        let nearest = fractional.round();
        if (fractional - nearest).abs() > TOLERANCE || nearest < 0.0 {
            return None;
        }
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let index = nearest as usize;
        (index < self.points).then_some(index)
    }
}

#[cfg(test)]
mod tests {
    use super::{decode, load};
    use crate::{ElementType, GridError, ReadMode};

    const XYZ: &str = "# lon lat depth\n\
                       -70.0 40.0 -100\n\
                       -69.5,40.0,-120.5\n\
                       -70.0 40.5 -80 # shoal\n\
                       \n\
                       -69.5\t40.5\t-90\n";

    #[test]
    fn test_decode() {
        let grid = decode(XYZ.as_bytes()).unwrap();
        assert_eq!(grid.element_type(), ElementType::Float64);
        assert_eq!((grid.lat_points(), grid.lon_points()), (2, 2));
        assert_eq!(grid.lat_interval(), 0.5);
        assert_eq!(grid.get(0, 1), -120.5);
        assert_eq!(grid.approx(40.5, -70.0), Some(-80.0));
        assert_eq!(grid.interp(40.25, -69.75), Some(-97.625));
    }

    #[test]
    fn test_incomplete_lattice() {
        let missing = "0 0 1\n1 0 1\n0 1 1\n";
        assert!(matches!(
            decode(missing.as_bytes()),
            Err(GridError::Dimensions { samples: 3, .. })
        ));
        let duplicate = "0 0 1\n1 0 1\n0 1 1\n0 1 2\n";
        assert!(matches!(
            decode(duplicate.as_bytes()),
            Err(GridError::Dimensions { .. })
        ));
        let uneven = "0 0 1\n1 0 1\n3 0 1\n0 1 1\n1 1 1\n3 1 1\n";
        assert!(matches!(
            decode(uneven.as_bytes()),
            Err(GridError::Header {
                field: "xyz spacing",
                ..
            })
        ));
        assert!(matches!(
            decode(b"1 2\n"),
            Err(GridError::MissingField("xyz depth"))
        ));
    }

    #[test]
    fn test_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gulf.xyz");
        std::fs::write(&path, XYZ).unwrap();
        let grid = load(&path, ReadMode::InMem).unwrap();
        assert_eq!(grid.value_range(), (-120.5, -80.0));
    }
}
