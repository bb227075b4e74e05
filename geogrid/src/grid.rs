use crate::{GeoRect, GridError, C};
use geo::geometry::Coord;
use num_traits::AsPrimitive;
use std::{mem::size_of, sync::OnceLock};

/// How a band's 2-D samples are flattened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageOrder {
    /// `row * lon_points + col`
    RowMajor,
    /// `col * lat_points + row`
    ColumnMajor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementType {
    Byte,
    Int16,
    Float32,
    Float64,
}

impl ElementType {
    pub fn size(self) -> usize {
        match self {
            Self::Byte => size_of::<u8>(),
            Self::Int16 => size_of::<i16>(),
            Self::Float32 => size_of::<f32>(),
            Self::Float64 => size_of::<f64>(),
        }
    }
}

/// Flat, band-sequential sample buffer.
#[derive(Debug, Clone, PartialEq)]
pub enum SampleStore {
    Byte(Box<[u8]>),
    Int16(Box<[i16]>),
    Float32(Box<[f32]>),
    Float64(Box<[f64]>),
}

impl SampleStore {
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        match self {
            Self::Byte(s) => s.len(),
            Self::Int16(s) => s.len(),
            Self::Float32(s) => s.len(),
            Self::Float64(s) => s.len(),
        }
    }

    pub fn element_type(&self) -> ElementType {
        match self {
            Self::Byte(_) => ElementType::Byte,
            Self::Int16(_) => ElementType::Int16,
            Self::Float32(_) => ElementType::Float32,
            Self::Float64(_) => ElementType::Float64,
        }
    }

    pub fn byte_size(&self) -> usize {
        self.len() * self.element_type().size()
    }

    fn get(&self, index: usize) -> C {
        fn at<T: AsPrimitive<C>>(samples: &[T], index: usize) -> C {
            samples[index].as_()
        }
        match self {
            Self::Byte(s) => at(s, index),
            Self::Int16(s) => at(s, index),
            Self::Float32(s) => at(s, index),
            Self::Float64(s) => at(s, index),
        }
    }

    fn range(&self, len: usize) -> (C, C) {
        (0..len)
            .map(|i| self.get(i))
            .fold((C::INFINITY, C::NEG_INFINITY), |(lo, hi), v| {
                (lo.min(v), hi.max(v))
            })
    }
}

/// Lattice geometry of a decoded grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridLayout {
    /// Position of sample (0, 0), the southwest-most sample.
    pub origin: Coord<C>,
    pub lat_points: usize,
    pub lon_points: usize,
    /// Degrees between adjacent rows.
    pub lat_interval: C,
    /// Degrees between adjacent columns.
    pub lon_interval: C,
    pub order: StorageOrder,
}

impl GridLayout {
    /// Returns the rectangle spanned by the outermost samples.
    #[allow(clippy::cast_precision_loss)]
    pub fn bounds(&self) -> GeoRect {
        GeoRect::from_sw(
            self.origin.y,
            self.origin.x,
            self.lat_points.saturating_sub(1) as C * self.lat_interval,
            self.lon_points.saturating_sub(1) as C * self.lon_interval,
        )
    }
}

/// A regular grid of samples with nearest and bilinear lookup.
#[derive(Debug)]
pub struct Grid {
    bounds: GeoRect,
    lat_points: usize,
    lon_points: usize,
    lat_interval: C,
    lon_interval: C,
    order: StorageOrder,
    bands: usize,
    samples: SampleStore,
    is_dummy: bool,
    /// Lazily computed (min, max) of band 0.
    range: OnceLock<(C, C)>,
}

impl Grid {
    /// Returns a grid over `samples`, which hold one or more
    /// band-sequential planes of `lat_points * lon_points` samples.
    pub fn new(layout: GridLayout, samples: SampleStore) -> Result<Self, GridError> {
        let GridLayout {
            lat_points,
            lon_points,
            lat_interval,
            lon_interval,
            order,
            ..
        } = layout;
        let dimension_err = || GridError::Dimensions {
            lat_points,
            lon_points,
            samples: samples.len(),
        };
        if lat_points < 2 || lon_points < 2 {
            return Err(dimension_err());
        }
        let plane = lat_points.checked_mul(lon_points).ok_or_else(dimension_err)?;
        // At least one band.
        if samples.len() < plane || samples.len() % plane != 0 {
            return Err(dimension_err());
        }
        if !(lat_interval > 0.0 && lon_interval > 0.0) {
            return Err(GridError::header("interval", format!("{lat_interval}x{lon_interval}")));
        }
        Ok(Self {
            bounds: layout.bounds(),
            lat_points,
            lon_points,
            lat_interval,
            lon_interval,
            order,
            bands: samples.len() / plane,
            samples,
            is_dummy: false,
            range: OnceLock::new(),
        })
    }

    /// Returns a zero-valued 2x2 stand-in covering
    /// `[lat, lat + lat_extent] x [lon, lon + lon_extent]`.
    pub fn dummy(lat: C, lon: C, lat_extent: C, lon_extent: C) -> Self {
        Self {
            bounds: GeoRect::from_sw(lat, lon, lat_extent, lon_extent),
            lat_points: 2,
            lon_points: 2,
            lat_interval: lat_extent / 2.0,
            lon_interval: lon_extent / 2.0,
            order: StorageOrder::RowMajor,
            bands: 1,
            samples: SampleStore::Int16(vec![0; 4].into_boxed_slice()),
            is_dummy: true,
            range: OnceLock::new(),
        }
    }

    pub fn bounds(&self) -> &GeoRect {
        &self.bounds
    }

    pub fn lat_points(&self) -> usize {
        self.lat_points
    }

    pub fn lon_points(&self) -> usize {
        self.lon_points
    }

    pub fn lat_interval(&self) -> C {
        self.lat_interval
    }

    pub fn lon_interval(&self) -> C {
        self.lon_interval
    }

    pub fn order(&self) -> StorageOrder {
        self.order
    }

    pub fn element_type(&self) -> ElementType {
        self.samples.element_type()
    }

    pub fn bands(&self) -> usize {
        self.bands
    }

    pub fn samples(&self) -> &SampleStore {
        &self.samples
    }

    pub fn is_dummy(&self) -> bool {
        self.is_dummy
    }

    /// Returns the number of bytes held by the sample buffer.
    pub fn data_size(&self) -> usize {
        self.samples.byte_size()
    }

    /// Returns the band 0 sample at (`row`, `col`); row 0 is the
    /// southernmost row.
    pub fn get(&self, row: usize, col: usize) -> C {
        self.get_band(0, row, col)
    }

    pub fn get_band(&self, band: usize, row: usize, col: usize) -> C {
        assert!(band < self.bands && row < self.lat_points && col < self.lon_points);
        let plane = self.lat_points * self.lon_points;
        let offset = match self.order {
            StorageOrder::RowMajor => row * self.lon_points + col,
            StorageOrder::ColumnMajor => col * self.lat_points + row,
        };
        self.samples.get(band * plane + offset)
    }

    /// Returns the band 0 (min, max) sample values.
    pub fn value_range(&self) -> (C, C) {
        *self
            .range
            .get_or_init(|| self.samples.range(self.lat_points * self.lon_points))
    }

    /// Returns the band 0 sample nearest to (`lat`, `lon`).
    pub fn approx(&self, lat: C, lon: C) -> Option<C> {
        self.approx_band(0, lat, lon)
    }

    /// Returns the sample nearest to (`lat`, `lon`) in `band`, or
    /// `None` when the point falls outside the sample lattice.
    pub fn approx_band(&self, band: usize, lat: C, lon: C) -> Option<C> {
        if !lat.is_finite() || !lon.is_finite() {
            return None;
        }
        if self.is_dummy {
            return self.bounds.contains(lat, lon).then_some(0.0);
        }
        let (lat_offset, lon_offset) = self.offsets(lat, lon);
        if lat_offset < 0.0 || lon_offset < 0.0 {
            return None;
        }
        let row = nearest(lat_offset, self.lat_interval, self.lat_points)?;
        let col = nearest(lon_offset, self.lon_interval, self.lon_points)?;
        Some(self.get_band(band, row, col))
    }

    /// Returns the band 0 value at (`lat`, `lon`), bilinearly
    /// interpolated from the four surrounding samples.
    pub fn interp(&self, lat: C, lon: C) -> Option<C> {
        self.interp_band(0, lat, lon)
    }

    pub fn interp_band(&self, band: usize, lat: C, lon: C) -> Option<C> {
        if !lat.is_finite() || !lon.is_finite() || !self.bounds.contains(lat, lon) {
            return None;
        }
        if self.is_dummy {
            return Some(0.0);
        }
        let (lat_offset, lon_offset) = self.offsets(lat, lon);
        let (r0, v) = split(lat_offset / self.lat_interval, self.lat_points);
        let (c0, u) = split(lon_offset / self.lon_interval, self.lon_points);
        let f00 = self.get_band(band, r0, c0);
        let f10 = self.get_band(band, r0, c0 + 1);
        let f01 = self.get_band(band, r0 + 1, c0);
        let f11 = self.get_band(band, r0 + 1, c0 + 1);
        Some(f00 + (f10 - f00) * u + ((f01 - f00) + (f11 - f10 - (f01 - f00)) * u) * v)
    }

    /// Degrees north and east of sample (0, 0).
    fn offsets(&self, lat: C, lon: C) -> (C, C) {
        let mut lon_offset = lon - self.bounds.sw_lon();
        if self.bounds.spans_dateline() && lon_offset < 0.0 {
            lon_offset += 360.0;
        }
        (lat - self.bounds.sw_lat(), lon_offset)
    }
}

/// Rounds `offset` to the nearest sample index below `points`.
fn nearest(offset: C, interval: C, points: usize) -> Option<usize> {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let index = ((offset + interval / 2.0) / interval) as usize;
    (index < points).then_some(index)
}

/// Splits a fractional index into a cell index in `[0, points - 2]`
/// and the remaining fraction.
fn split(fractional: C, points: usize) -> (usize, C) {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let cell = (fractional.max(0.0) as usize).min(points - 2);
    #[allow(clippy::cast_precision_loss)]
    (cell, fractional - cell as C)
}

#[cfg(test)]
mod tests {
    use super::{Coord, ElementType, Grid, GridError, GridLayout, SampleStore, StorageOrder, C};
    use approx::assert_relative_eq;

    fn layout(lat_points: usize, lon_points: usize, order: StorageOrder) -> GridLayout {
        GridLayout {
            origin: Coord { x: 10.0, y: 20.0 },
            lat_points,
            lon_points,
            lat_interval: 0.5,
            lon_interval: 0.25,
            order,
        }
    }

    #[test]
    fn test_interp_center() {
        let samples = SampleStore::Float32(vec![0.0, 0.0, 10.0, 10.0].into_boxed_slice());
        let grid = Grid::new(layout(2, 2, StorageOrder::RowMajor), samples).unwrap();
        assert_eq!(grid.interp(20.25, 10.125), Some(5.0));
        assert_eq!(grid.interp(20.0, 10.0), Some(0.0));
        assert_eq!(grid.interp(20.5, 10.25), Some(10.0));
    }

    #[test]
    fn test_interp_matches_expansion() {
        let values: Vec<i16> = vec![3, -7, 12, 40, 5, -2, 9, 18, 33];
        let grid = Grid::new(
            layout(3, 3, StorageOrder::RowMajor),
            SampleStore::Int16(values.clone().into_boxed_slice()),
        )
        .unwrap();
        for (lat, lon) in [(20.1, 10.05), (20.7, 10.3), (20.99, 10.49), (20.5, 10.25)] {
            let (fr, fc) = ((lat - 20.0) / 0.5, (lon - 10.0) / 0.25);
            let (r0, c0) = ((fr as usize).min(1), (fc as usize).min(1));
            let (v, u) = (fr - r0 as C, fc - c0 as C);
            let f = |r: usize, c: usize| C::from(values[r * 3 + c]);
            let a = f(r0, c0);
            let b = f(r0, c0 + 1) - a;
            let c = f(r0 + 1, c0) - a;
            let d = f(r0 + 1, c0 + 1) - f(r0, c0 + 1) - f(r0 + 1, c0) + a;
            let expected = a + b * u + c * v + d * u * v;
            assert_relative_eq!(grid.interp(lat, lon).unwrap(), expected, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_storage_order() {
        // 2 rows x 3 cols; the same grid flattened both ways.
        let row_major = Grid::new(
            layout(2, 3, StorageOrder::RowMajor),
            SampleStore::Byte(vec![1, 2, 3, 4, 5, 6].into_boxed_slice()),
        )
        .unwrap();
        let col_major = Grid::new(
            layout(2, 3, StorageOrder::ColumnMajor),
            SampleStore::Byte(vec![1, 4, 2, 5, 3, 6].into_boxed_slice()),
        )
        .unwrap();
        for (lat, lon) in [(20.0, 10.0), (20.5, 10.5), (20.3, 10.3), (20.1, 10.4)] {
            assert_eq!(row_major.approx(lat, lon), col_major.approx(lat, lon));
            assert_eq!(row_major.interp(lat, lon), col_major.interp(lat, lon));
        }
        assert_eq!(row_major.get(1, 2), 6.0);
        assert_eq!(col_major.get(1, 2), 6.0);
        assert_eq!(row_major.element_type(), ElementType::Byte);
        assert_eq!(row_major.data_size(), 6);
    }

    #[test]
    fn test_approx() {
        let grid = Grid::new(
            layout(2, 3, StorageOrder::RowMajor),
            SampleStore::Float64(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0].into_boxed_slice()),
        )
        .unwrap();
        assert_eq!(grid.approx(20.0, 10.0), Some(1.0));
        // Rounds to the nearest sample.
        assert_eq!(grid.approx(20.24, 10.12), Some(1.0));
        assert_eq!(grid.approx(20.26, 10.13), Some(5.0));
        assert_eq!(grid.approx(20.5, 10.5), Some(6.0));
        // South or west of the origin.
        assert_eq!(grid.approx(19.9, 10.0), None);
        assert_eq!(grid.approx(20.0, 9.9), None);
        // Past the last sample by more than half an interval.
        assert_eq!(grid.approx(20.8, 10.0), None);
        assert_eq!(grid.interp(20.6, 10.0), None);
    }

    #[test]
    fn test_bands() {
        let samples: Vec<u8> = (0..12).collect();
        let grid = Grid::new(
            layout(2, 2, StorageOrder::RowMajor),
            SampleStore::Byte(samples.into_boxed_slice()),
        )
        .unwrap();
        assert_eq!(grid.bands(), 3);
        assert_eq!(grid.approx_band(0, 20.5, 10.25), Some(3.0));
        assert_eq!(grid.approx_band(2, 20.5, 10.25), Some(11.0));
        assert_eq!(grid.interp_band(1, 20.25, 10.125), Some(5.5));
    }

    #[test]
    fn test_dimensions_rejected() {
        let err = Grid::new(
            layout(2, 2, StorageOrder::RowMajor),
            SampleStore::Byte(vec![0; 5].into_boxed_slice()),
        )
        .unwrap_err();
        assert!(matches!(err, GridError::Dimensions { samples: 5, .. }));
        assert!(Grid::new(
            layout(1, 4, StorageOrder::RowMajor),
            SampleStore::Byte(vec![0; 4].into_boxed_slice()),
        )
        .is_err());
        // No samples means no bands.
        let err = Grid::new(
            layout(2, 2, StorageOrder::RowMajor),
            SampleStore::Int16(Vec::new().into_boxed_slice()),
        )
        .unwrap_err();
        assert!(matches!(err, GridError::Dimensions { samples: 0, .. }));
        assert!(Grid::new(
            layout(usize::MAX, 2, StorageOrder::RowMajor),
            SampleStore::Byte(vec![0; 4].into_boxed_slice()),
        )
        .is_err());
    }

    #[test]
    fn test_degenerate_layout_bounds() {
        let bounds = layout(0, 0, StorageOrder::RowMajor).bounds();
        assert_eq!((bounds.sw_lat(), bounds.sw_lon()), (20.0, 10.0));
        assert_eq!((bounds.lat_extent(), bounds.lon_extent()), (0.0, 0.0));
    }

    #[test]
    fn test_non_finite_points() {
        let samples = SampleStore::Float32(vec![1.0, 2.0, 3.0, 4.0].into_boxed_slice());
        let grid = Grid::new(layout(2, 2, StorageOrder::RowMajor), samples).unwrap();
        let dummy = Grid::dummy(20.0, 10.0, 1.0, 1.0);
        let points = [
            (C::NAN, 10.1),
            (20.1, C::NAN),
            (C::INFINITY, 10.1),
            (20.1, C::NEG_INFINITY),
        ];
        for (lat, lon) in points {
            assert_eq!(grid.approx(lat, lon), None);
            assert_eq!(grid.interp(lat, lon), None);
            assert_eq!(dummy.approx(lat, lon), None);
            assert_eq!(dummy.interp(lat, lon), None);
        }
        assert_eq!(grid.approx(20.0, 10.0), Some(1.0));
    }

    #[test]
    fn test_dummy() {
        let grid = Grid::dummy(44.0, -72.0, 1.0, 1.0);
        assert!(grid.is_dummy());
        assert_eq!((grid.lat_points(), grid.lon_points()), (2, 2));
        assert_eq!((grid.lat_interval(), grid.lon_interval()), (0.5, 0.5));
        assert!(grid.bounds().contains(44.27, -71.3));
        for row in 0..2 {
            for col in 0..2 {
                assert_eq!(grid.get(row, col), 0.0);
            }
        }
        assert_eq!(grid.approx(44.9, -71.1), Some(0.0));
        assert_eq!(grid.interp(44.27, -71.3), Some(0.0));
        assert_eq!(grid.interp(45.5, -71.3), None);
    }

    #[test]
    fn test_value_range() {
        let grid = Grid::new(
            layout(2, 2, StorageOrder::RowMajor),
            SampleStore::Int16(vec![-12, 40, 7, 3].into_boxed_slice()),
        )
        .unwrap();
        assert_eq!(grid.value_range(), (-12.0, 40.0));
        assert_eq!(grid.value_range(), (-12.0, 40.0));
    }

    #[test]
    fn test_dateline_grid() {
        let grid = Grid::new(
            GridLayout {
                origin: Coord { x: 179.5, y: 0.0 },
                lat_points: 2,
                lon_points: 3,
                lat_interval: 1.0,
                lon_interval: 0.5,
                order: StorageOrder::RowMajor,
            },
            SampleStore::Float32(vec![0.0, 1.0, 2.0, 0.0, 1.0, 2.0].into_boxed_slice()),
        )
        .unwrap();
        assert!(grid.bounds().spans_dateline());
        assert_eq!(grid.approx(0.0, -180.0), Some(1.0));
        assert_eq!(grid.approx(1.0, -179.5), Some(2.0));
        assert_relative_eq!(grid.interp(0.5, -179.75).unwrap(), 1.5);
    }
}
