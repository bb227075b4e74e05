//! Single-image, single-band GeoTIFF rasters.
//!
//! Georeferencing comes from the ModelTiepoint and ModelPixelScale
//! tags; rotated or sheared ModelTransformation rasters are rejected.

use crate::{GeoRect, Grid, GridError, GridLayout, ReadMode, SampleStore, StorageOrder, C};
use geo::geometry::Coord;
use std::{io::Cursor, path::Path};
use tiff::{
    decoder::{Decoder, DecodingResult, Limits},
    tags::Tag,
    ColorType,
};

pub const MODEL_PIXEL_SCALE: u16 = 33550;
pub const MODEL_TIEPOINT: u16 = 33922;

/// Raster placement read from the GeoTIFF tags.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Georef {
    /// Upper-left corner of the upper-left pixel.
    pub upper_left: Coord<C>,
    /// Degrees per pixel (x = longitude, y = latitude).
    pub scale: Coord<C>,
}

impl Georef {
    fn read<R: std::io::Read + std::io::Seek>(decoder: &mut Decoder<R>) -> Result<Self, GridError> {
        let tiepoint = decoder
            .get_tag_f64_vec(Tag::from_u16_exhaustive(MODEL_TIEPOINT))
            .map_err(|_| GridError::MissingField("ModelTiepoint"))?;
        let scale = decoder
            .get_tag_f64_vec(Tag::from_u16_exhaustive(MODEL_PIXEL_SCALE))
            .map_err(|_| GridError::MissingField("ModelPixelScale"))?;
        let (&[i, j, _, x, y, ..], &[sx, sy, ..]) = (tiepoint.as_slice(), scale.as_slice()) else {
            return Err(GridError::header(
                "ModelTiepoint",
                format!("{tiepoint:?} / {scale:?}"),
            ));
        };
        if !(sx > 0.0 && sy > 0.0) {
            return Err(GridError::header("ModelPixelScale", format!("{scale:?}")));
        }
        Ok(Self {
            upper_left: Coord {
                x: x - i * sx,
                y: y + j * sy,
            },
            scale: Coord { x: sx, y: sy },
        })
    }

    /// Returns the layout of a `width` x `height` raster, sampled at
    /// pixel centers.
    #[allow(clippy::cast_precision_loss)]
    pub fn layout(&self, width: usize, height: usize) -> GridLayout {
        GridLayout {
            origin: Coord {
                x: self.upper_left.x + self.scale.x / 2.0,
                y: self.upper_left.y - (height as C - 0.5) * self.scale.y,
            },
            lat_points: height,
            lon_points: width,
            lat_interval: self.scale.y,
            lon_interval: self.scale.x,
            order: StorageOrder::RowMajor,
        }
    }
}

pub fn decode(bytes: &[u8]) -> Result<Grid, GridError> {
    let mut decoder = Decoder::new(Cursor::new(bytes))?.with_limits(Limits::unlimited());
    let color = decoder.colortype()?;
    if !matches!(color, ColorType::Gray(_)) {
        return Err(GridError::Unsupported(format!("GeoTIFF color type {color:?}")));
    }
    let (width, height) = decoder.dimensions()?;
    let (width, height) = (width as usize, height as usize);
    let georef = Georef::read(&mut decoder)?;

    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    let samples = match decoder.read_image()? {
        DecodingResult::U8(data) => SampleStore::Byte(flip_rows(data, width)),
        DecodingResult::I8(data) => {
            SampleStore::Int16(flip_rows(data.into_iter().map(i16::from).collect(), width))
        }
        DecodingResult::I16(data) => SampleStore::Int16(flip_rows(data, width)),
        DecodingResult::U16(data) => {
            SampleStore::Float32(flip_rows(data.into_iter().map(f32::from).collect(), width))
        }
        DecodingResult::I32(data) => {
            SampleStore::Float32(flip_rows(data.into_iter().map(|v| v as f32).collect(), width))
        }
        DecodingResult::U32(data) => {
            SampleStore::Float32(flip_rows(data.into_iter().map(|v| v as f32).collect(), width))
        }
        DecodingResult::F32(data) => SampleStore::Float32(flip_rows(data, width)),
        DecodingResult::F64(data) => SampleStore::Float64(flip_rows(data, width)),
        DecodingResult::I64(data) => {
            SampleStore::Float64(flip_rows(data.into_iter().map(|v| v as f64).collect(), width))
        }
        DecodingResult::U64(data) => {
            SampleStore::Float64(flip_rows(data.into_iter().map(|v| v as f64).collect(), width))
        }
    };
    Grid::new(georef.layout(width, height), samples)
}

pub fn load(path: &Path, mode: ReadMode) -> Result<Grid, GridError> {
    decode(&mode.open(path)?)
}

/// Returns the footprint a decoded raster would have, reading only
/// the image header and georeferencing tags.
pub fn bounds(bytes: &[u8]) -> Result<GeoRect, GridError> {
    let mut decoder = Decoder::new(Cursor::new(bytes))?;
    let (width, height) = decoder.dimensions()?;
    let (width, height) = (width as usize, height as usize);
    if width < 2 || height < 2 {
        return Err(GridError::Dimensions {
            lat_points: height,
            lon_points: width,
            samples: 0,
        });
    }
    let georef = Georef::read(&mut decoder)?;
    Ok(georef.layout(width, height).bounds())
}

/// Reverses row order so the southernmost row comes first.
fn flip_rows<T: Copy>(data: Vec<T>, width: usize) -> Box<[T]> {
    if width == 0 {
        return data.into_boxed_slice();
    }
    data.chunks_exact(width)
        .rev()
        .flatten()
        .copied()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{bounds, decode, load, MODEL_PIXEL_SCALE, MODEL_TIEPOINT};
    use crate::{ElementType, GridError, ReadMode};
    use approx::assert_relative_eq;
    use std::io::Cursor;
    use tiff::{
        encoder::{colortype, TiffEncoder},
        tags::Tag,
    };

    /// A 4x3 raster whose upper-left corner is (45N, 72W) with
    /// 0.25 degree pixels.
    fn encode_f32(data: &[f32], georeferenced: bool) -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut encoder = TiffEncoder::new(&mut cursor).unwrap();
            let mut image = encoder.new_image::<colortype::Gray32Float>(4, 3).unwrap();
            if georeferenced {
                image
                    .encoder()
                    .write_tag(
                        Tag::from_u16_exhaustive(MODEL_TIEPOINT),
                        &[0.0, 0.0, 0.0, -72.0, 45.0, 0.0][..],
                    )
                    .unwrap();
                image
                    .encoder()
                    .write_tag(
                        Tag::from_u16_exhaustive(MODEL_PIXEL_SCALE),
                        &[0.25, 0.25, 0.0][..],
                    )
                    .unwrap();
            }
            image.write_data(data).unwrap();
        }
        cursor.into_inner()
    }

    #[test]
    fn test_decode() {
        let data: Vec<f32> = (0..12).map(|v| v as f32).collect();
        let grid = decode(&encode_f32(&data, true)).unwrap();
        assert_eq!(grid.element_type(), ElementType::Float32);
        assert_eq!((grid.lat_points(), grid.lon_points()), (3, 4));
        // Pixel centers are inset half a pixel from the raster edge.
        assert_relative_eq!(grid.bounds().sw_lat(), 44.375);
        assert_relative_eq!(grid.bounds().sw_lon(), -71.875);
        assert_relative_eq!(grid.bounds().ne_lat(), 44.875);
        // Top image row is the northernmost grid row.
        assert_eq!(grid.get(0, 0), 8.0);
        assert_eq!(grid.get(2, 3), 3.0);
        assert_eq!(grid.approx(44.875, -71.875), Some(0.0));
        assert_relative_eq!(grid.interp(44.5, -71.75).unwrap(), 6.5);
    }

    #[test]
    fn test_bounds_match_decode() {
        let bytes = encode_f32(&[1.0; 12], true);
        let footprint = bounds(&bytes).unwrap();
        assert_eq!(&footprint, decode(&bytes).unwrap().bounds());
        assert_relative_eq!(footprint.ne_lon(), -71.125);
    }

    #[test]
    fn test_single_pixel_rejected() {
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut encoder = TiffEncoder::new(&mut cursor).unwrap();
            let image = encoder.new_image::<colortype::Gray8>(1, 1).unwrap();
            image.write_data(&[7u8]).unwrap();
        }
        let bytes = cursor.into_inner();
        assert!(matches!(
            bounds(&bytes),
            Err(GridError::Dimensions {
                lat_points: 1,
                lon_points: 1,
                ..
            })
        ));
        assert!(decode(&bytes).is_err());
    }

    #[test]
    fn test_missing_georef() {
        let data = [0f32; 12];
        assert!(matches!(
            decode(&encode_f32(&data, false)),
            Err(GridError::MissingField("ModelTiepoint"))
        ));
    }

    #[test]
    fn test_int16_and_load() {
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut encoder = TiffEncoder::new(&mut cursor).unwrap();
            let mut image = encoder.new_image::<colortype::GrayI16>(2, 2).unwrap();
            image
                .encoder()
                .write_tag(
                    Tag::from_u16_exhaustive(MODEL_TIEPOINT),
                    &[0.0, 0.0, 0.0, 10.0, 1.0, 0.0][..],
                )
                .unwrap();
            image
                .encoder()
                .write_tag(Tag::from_u16_exhaustive(MODEL_PIXEL_SCALE), &[0.5, 0.5, 0.0][..])
                .unwrap();
            image.write_data(&[-3i16, 4, 100, -200]).unwrap();
        }
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("depth.tif");
        std::fs::write(&path, cursor.into_inner()).unwrap();
        let grid = load(&path, ReadMode::MemMap).unwrap();
        assert_eq!(grid.element_type(), ElementType::Int16);
        assert_eq!(grid.value_range(), (-200.0, 100.0));
        assert_eq!(grid.get(1, 0), -3.0);
    }
}
