//! Land-use category grids.
//!
//! Categories come either as a [float_grid](crate::float_grid) whose
//! values are integral codes, or as an 8-bit palettized Windows bitmap
//! covering one tile, where the palette index is the code. Bitmaps
//! carry no georeferencing so the tile footprint is supplied by the
//! caller.

use crate::{
    error::slice, float_grid, GeoRect, Grid, GridError, GridLayout, ReadMode, SampleStore,
    StorageOrder, C,
};
use byteorder::{ByteOrder, LittleEndian as LE};
use std::path::Path;

const BMP_HEADER_LEN: usize = 54;

/// Decodes a float grid of category codes.
pub fn decode_float_grid(bytes: &[u8]) -> Result<Grid, GridError> {
    let (header, values) = float_grid::decode_values(bytes)?;
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let codes: Vec<u8> = values
        .into_iter()
        .map(|v| v.round().clamp(0.0, 255.0) as u8)
        .collect();
    Grid::new(header.layout(), SampleStore::Byte(codes.into_boxed_slice()))
}

/// Decodes an uncompressed 8-bit bitmap spanning `rect`.
pub fn decode_bitmap(bytes: &[u8], rect: &GeoRect) -> Result<Grid, GridError> {
    let header = slice(bytes, 0, BMP_HEADER_LEN)?;
    if &header[0..2] != b"BM" {
        return Err(GridError::Sentinel {
            expected: "BM",
            offset: 0,
        });
    }
    let data_offset = LE::read_u32(&header[10..14]) as usize;
    let width = LE::read_i32(&header[18..22]);
    let height = LE::read_i32(&header[22..26]);
    let bits = LE::read_u16(&header[28..30]);
    let compression = LE::read_u32(&header[30..34]);
    if bits != 8 || compression != 0 {
        return Err(GridError::Unsupported(format!(
            "{bits}-bit bitmap with compression {compression}"
        )));
    }
    if width < 2 || height.unsigned_abs() < 2 {
        return Err(GridError::header("bitmap size", format!("{width}x{height}")));
    }

    let (cols, rows) = (width as usize, height.unsigned_abs() as usize);
    let stride = (cols + 3) & !3;
    let data = slice(bytes, data_offset, stride * rows)?;
    let mut codes = vec![0u8; cols * rows];
    for (r, line) in data.chunks_exact(stride).enumerate() {
        // Positive heights are stored bottom row first.
        let south_row = if height > 0 { r } else { rows - 1 - r };
        codes[south_row * cols..(south_row + 1) * cols].copy_from_slice(&line[..cols]);
    }

    #[allow(clippy::cast_precision_loss)]
    let layout = GridLayout {
        origin: rect.sw(),
        lat_points: rows,
        lon_points: cols,
        lat_interval: rect.lat_extent() / (rows - 1) as C,
        lon_interval: rect.lon_extent() / (cols - 1) as C,
        order: StorageOrder::RowMajor,
    };
    Grid::new(layout, SampleStore::Byte(codes.into_boxed_slice()))
}

/// Loads the land-use tile at `path`, choosing the decoder by file
/// extension; `rect` is the footprint used for bitmaps.
pub fn load(path: &Path, rect: &GeoRect, mode: ReadMode) -> Result<Grid, GridError> {
    let extension = path
        .extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase());
    match extension.as_deref() {
        Some("bmp") => decode_bitmap(&mode.open(path)?, rect),
        Some("flt") => decode_float_grid(&mode.open(path)?),
        other => Err(GridError::Unsupported(format!(
            "land use file extension {other:?}"
        ))),
    }
}

/// Encodes an 8-bit grayscale-palette bitmap from rows given north
/// first.
#[cfg(test)]
pub(crate) fn encode_bitmap(rows_north_first: &[&[u8]], top_down: bool) -> Vec<u8> {
    let rows = rows_north_first.len();
    let cols = rows_north_first[0].len();
    let stride = (cols + 3) & !3;
    let data_offset = BMP_HEADER_LEN + 256 * 4;
    let file_len = data_offset + stride * rows;
    let height = if top_down { -(rows as i32) } else { rows as i32 };

    let mut bytes = vec![0u8; BMP_HEADER_LEN];
    bytes[0..2].copy_from_slice(b"BM");
    LE::write_u32(&mut bytes[2..6], file_len as u32);
    LE::write_u32(&mut bytes[10..14], data_offset as u32);
    LE::write_u32(&mut bytes[14..18], 40);
    LE::write_i32(&mut bytes[18..22], cols as i32);
    LE::write_i32(&mut bytes[22..26], height);
    LE::write_u16(&mut bytes[26..28], 1);
    LE::write_u16(&mut bytes[28..30], 8);
    for i in 0..=255u8 {
        bytes.extend([i, i, i, 0]);
    }
    let mut emit = |row: &[u8]| {
        bytes.extend_from_slice(row);
        bytes.extend(std::iter::repeat(0).take(stride - cols));
    };
    if top_down {
        rows_north_first.iter().for_each(|row| emit(*row));
    } else {
        rows_north_first.iter().rev().for_each(|row| emit(*row));
    }
    bytes
}
