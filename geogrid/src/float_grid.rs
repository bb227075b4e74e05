//! ESRI float grids.
//!
//! A short ASCII header of `key value` lines, ending with the
//! `byteorder` line, followed by `nrows * ncols` 32-bit floats, row
//! major, northernmost row first.
//!
//! ```text
//! ncols         1201
//! nrows         1201
//! xllcorner     -72.0
//! yllcorner     44.0
//! cellsize      0.000833333
//! NODATA_value  -9999
//! byteorder     LSBFIRST
//! ```

use crate::{Grid, GridError, GridLayout, ReadMode, SampleStore, StorageOrder, C};
use byteorder::{BigEndian, ByteOrder, LittleEndian};
use geo::geometry::Coord;
use std::{mem::size_of, path::Path};

/// Header lines scanned before giving up on finding `byteorder`.
const MAX_HEADER_LINES: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endian {
    Lsb,
    Msb,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Header {
    pub ncols: usize,
    pub nrows: usize,
    /// Longitude of the southwest sample.
    pub xll: C,
    /// Latitude of the southwest sample.
    pub yll: C,
    pub cellsize: C,
    pub nodata: Option<f32>,
    pub endian: Endian,
}

impl Header {
    pub fn layout(&self) -> GridLayout {
        GridLayout {
            origin: Coord {
                x: self.xll,
                y: self.yll,
            },
            lat_points: self.nrows,
            lon_points: self.ncols,
            lat_interval: self.cellsize,
            lon_interval: self.cellsize,
            order: StorageOrder::RowMajor,
        }
    }

    /// Byte length of the sample data, or an error if the dimensions
    /// cannot describe a grid.
    pub fn data_len(&self) -> Result<usize, GridError> {
        let Self { ncols, nrows, .. } = *self;
        let invalid = || GridError::Dimensions {
            lat_points: nrows,
            lon_points: ncols,
            samples: 0,
        };
        if ncols < 2 || nrows < 2 {
            return Err(invalid());
        }
        ncols
            .checked_mul(nrows)
            .and_then(|samples| samples.checked_mul(size_of::<f32>()))
            .ok_or_else(invalid)
    }
}

/// Parses the header, returning it and the offset of the first
/// sample.
pub fn parse_header(bytes: &[u8]) -> Result<(Header, usize), GridError> {
    let (mut ncols, mut nrows, mut xll, mut yll, mut cellsize, mut nodata) =
        (None, None, None, None, None, None);
    let mut offset = 0;
    for _ in 0..MAX_HEADER_LINES {
        let Some(len) = bytes[offset..].iter().position(|&b| b == b'\n') else {
            break;
        };
        let Ok(line) = std::str::from_utf8(&bytes[offset..offset + len]) else {
            break;
        };
        offset += len + 1;
        let mut words = line.split_whitespace();
        let (Some(key), Some(value)) = (words.next(), words.next()) else {
            continue;
        };
        match key.to_ascii_lowercase().as_str() {
            "ncols" => ncols = Some(crate::parse_field("ncols", value)?),
            "nrows" => nrows = Some(crate::parse_field("nrows", value)?),
            "xllcorner" | "xllcenter" => xll = Some(crate::parse_field("xllcorner", value)?),
            "yllcorner" | "yllcenter" => yll = Some(crate::parse_field("yllcorner", value)?),
            "cellsize" => cellsize = Some(crate::parse_field("cellsize", value)?),
            "nodata_value" => nodata = Some(crate::parse_field("NODATA_value", value)?),
            "byteorder" => {
                let endian = match value.to_ascii_uppercase().as_str() {
                    "LSBFIRST" => Endian::Lsb,
                    "MSBFIRST" => Endian::Msb,
                    _ => return Err(GridError::header("byteorder", value)),
                };
                let header = Header {
                    ncols: ncols.ok_or(GridError::MissingField("ncols"))?,
                    nrows: nrows.ok_or(GridError::MissingField("nrows"))?,
                    xll: xll.ok_or(GridError::MissingField("xllcorner"))?,
                    yll: yll.ok_or(GridError::MissingField("yllcorner"))?,
                    cellsize: cellsize.ok_or(GridError::MissingField("cellsize"))?,
                    nodata,
                    endian,
                };
                header.data_len()?;
                return Ok((header, offset));
            }
            _ => (),
        }
    }
    Err(GridError::MissingField("byteorder"))
}

/// Decodes the header and returns the samples south row first, with
/// NODATA samples replaced by 0.
pub(crate) fn decode_values(bytes: &[u8]) -> Result<(Header, Vec<f32>), GridError> {
    let (header, offset) = parse_header(bytes)?;
    let Header { ncols, nrows, .. } = header;
    let row_bytes = ncols * size_of::<f32>();
    let data = crate::error::slice(bytes, offset, header.data_len()?)?;

    let mut values = vec![0f32; ncols * nrows];
    for (r, src) in data.chunks_exact(row_bytes).enumerate() {
        let south_row = nrows - 1 - r;
        let dst = &mut values[south_row * ncols..(south_row + 1) * ncols];
        match header.endian {
            Endian::Lsb => LittleEndian::read_f32_into(src, dst),
            Endian::Msb => BigEndian::read_f32_into(src, dst),
        }
    }
    if let Some(nodata) = header.nodata {
        values
            .iter_mut()
            .filter(|v| **v == nodata)
            .for_each(|v| *v = 0.0);
    }
    Ok((header, values))
}

pub fn decode(bytes: &[u8]) -> Result<Grid, GridError> {
    let (header, values) = decode_values(bytes)?;
    Grid::new(
        header.layout(),
        SampleStore::Float32(values.into_boxed_slice()),
    )
}

pub fn load(path: &Path, mode: ReadMode) -> Result<Grid, GridError> {
    decode(&mode.open(path)?)
}

/// Returns the conventional name of the tile whose southwest corner
/// is (`sw_lat`, `sw_lon`), e.g. `n44w072.flt`.
pub fn tile_file_name(sw_lat: i32, sw_lon: i32, extension: &str) -> String {
    format!(
        "{}{:02}{}{:03}.{extension}",
        if sw_lat < 0 { 's' } else { 'n' },
        sw_lat.unsigned_abs(),
        if sw_lon < 0 { 'w' } else { 'e' },
        sw_lon.unsigned_abs()
    )
}

#[cfg(test)]
pub(crate) fn encode(header: &str, rows_north_first: &[&[f32]], endian: Endian) -> Vec<u8> {
    let mut bytes = header.as_bytes().to_vec();
    for row in rows_north_first {
        for &v in *row {
            match endian {
                Endian::Lsb => bytes.extend(v.to_le_bytes()),
                Endian::Msb => bytes.extend(v.to_be_bytes()),
            }
        }
    }
    bytes
}

#[cfg(test)]
mod tests {
    use super::{decode, encode, load, parse_header, tile_file_name, Endian};
    use crate::{ElementType, FailureKind, GridError, ReadMode};

    const HEADER: &str = "ncols 3\nnrows 2\nxllcorner -72.0\nyllcorner 44.0\n\
                          cellsize 0.5\nNODATA_value -9999\nbyteorder LSBFIRST\n";

    #[test]
    fn test_header() {
        let (header, offset) = parse_header(HEADER.as_bytes()).unwrap();
        assert_eq!((header.ncols, header.nrows), (3, 2));
        assert_eq!((header.xll, header.yll, header.cellsize), (-72.0, 44.0, 0.5));
        assert_eq!(header.nodata, Some(-9999.0));
        assert_eq!(header.endian, Endian::Lsb);
        assert_eq!(offset, HEADER.len());
    }

    #[test]
    fn test_decode_flips_rows() {
        let bytes = encode(
            HEADER,
            &[&[4.0, 5.0, -9999.0], &[1.0, 2.0, 3.0]],
            Endian::Lsb,
        );
        let grid = decode(&bytes).unwrap();
        assert_eq!(grid.element_type(), ElementType::Float32);
        assert_eq!(grid.get(0, 0), 1.0);
        assert_eq!(grid.get(1, 1), 5.0);
        // NODATA reads as 0.
        assert_eq!(grid.get(1, 2), 0.0);
        assert_eq!(grid.approx(44.5, -72.0), Some(4.0));
        assert_eq!(grid.interp(44.25, -71.75), Some(3.0));
    }

    #[test]
    fn test_msb_and_case() {
        let header = "NCOLS 2\nNROWS 2\nXLLCENTER 10\nYLLCENTER -5\nCELLSIZE 1\nBYTEORDER msbfirst\n";
        let bytes = encode(header, &[&[7.5, 8.5], &[-1.0, 2.0]], Endian::Msb);
        let grid = decode(&bytes).unwrap();
        assert_eq!(grid.get(1, 1), 8.5);
        assert_eq!(grid.get(0, 0), -1.0);
        assert_eq!(grid.bounds().sw_lat(), -5.0);
    }

    #[test]
    fn test_malformed() {
        let no_order = "ncols 2\nnrows 2\nxllcorner 0\nyllcorner 0\ncellsize 1\n";
        assert!(matches!(
            parse_header(no_order.as_bytes()),
            Err(GridError::MissingField("byteorder"))
        ));
        let no_cols = "nrows 2\nxllcorner 0\nyllcorner 0\ncellsize 1\nbyteorder LSBFIRST\n";
        assert!(matches!(
            parse_header(no_cols.as_bytes()),
            Err(GridError::MissingField("ncols"))
        ));
        let bad = "ncols two\n";
        assert!(matches!(
            parse_header(bad.as_bytes()),
            Err(GridError::Header { field: "ncols", .. })
        ));
        let short = encode(HEADER, &[&[1.0, 2.0, 3.0]], Endian::Lsb);
        assert!(matches!(decode(&short), Err(GridError::ShortRead { .. })));
    }

    #[test]
    fn test_degenerate_dimensions() {
        let no_cols = "ncols 0\nnrows 2\nxllcorner 0\nyllcorner 0\ncellsize 0.5\nbyteorder LSBFIRST\n";
        assert!(matches!(
            decode(no_cols.as_bytes()),
            Err(GridError::Dimensions { lon_points: 0, .. })
        ));
        let one_row = "ncols 3\nnrows 1\nxllcorner 0\nyllcorner 0\ncellsize 0.5\nbyteorder LSBFIRST\n";
        assert!(matches!(
            parse_header(one_row.as_bytes()),
            Err(GridError::Dimensions { lat_points: 1, .. })
        ));
        let huge = format!(
            "ncols {}\nnrows 4\nxllcorner 0\nyllcorner 0\ncellsize 0.5\nbyteorder LSBFIRST\n",
            usize::MAX / 2
        );
        let err = decode(huge.as_bytes()).unwrap_err();
        assert!(matches!(err, GridError::Dimensions { lat_points: 4, .. }));
        assert_eq!(err.kind(), FailureKind::Format);
    }

    #[test]
    fn test_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(tile_file_name(44, -72, "flt"));
        assert!(path.ends_with("n44w072.flt"));
        std::fs::write(
            &path,
            encode(HEADER, &[&[0.0; 3], &[9.0; 3]], Endian::Lsb),
        )
        .unwrap();
        let grid = load(&path, ReadMode::MemMap).unwrap();
        assert_eq!(grid.value_range(), (0.0, 9.0));
        assert_eq!(tile_file_name(-3, 5, "bmp"), "s03e005.bmp");
    }
}
