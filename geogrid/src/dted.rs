//! DTED level 0/1/2 elevation cells.
//!
//! A cell is three fixed-size header records followed by one data
//! record per longitude line, west to east:
//!
//! ```text
//! 0     UHL  user header label          80 bytes
//! 80    DSI  data set identification   648 bytes
//! 728   ACC  accuracy description     2700 bytes
//! 3428  data records
//!         0xAA, block count (3), lon count (2), lat count (2)
//!         lat_points x i16 sign-magnitude, big endian, south to north
//!         checksum (u32, big endian)
//! ```

use crate::{
    error::slice, GridError, Grid, GridLayout, ReadMode, SampleStore, StorageOrder, C,
};
use byteorder::{BigEndian as BE, ByteOrder};
use geo::geometry::Coord;
use std::path::{Path, PathBuf};

pub const UHL_LEN: usize = 80;
pub const DSI_LEN: usize = 648;
pub const ACC_LEN: usize = 2700;
pub const DATA_OFFSET: usize = UHL_LEN + DSI_LEN + ACC_LEN;
pub const RECORD_HEADER_LEN: usize = 8;
pub const CHECKSUM_LEN: usize = 4;
pub const RECORD_SENTINEL: u8 = 0xAA;

const TENTHS_ARCSEC_PER_DEG: C = 36_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DtedOptions {
    /// Reject cells whose per-record checksum does not match.
    pub validate_checksum: bool,
    pub mode: ReadMode,
}

impl Default for DtedOptions {
    fn default() -> Self {
        Self {
            validate_checksum: true,
            mode: ReadMode::InMem,
        }
    }
}

/// Geometry fields of the UHL record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Header {
    /// Position of the southwest-most post.
    pub origin: Coord<C>,
    pub lon_interval_tenths: u32,
    pub lat_interval_tenths: u32,
    pub lon_lines: usize,
    pub lat_points: usize,
}

impl Header {
    pub fn record_len(&self) -> usize {
        RECORD_HEADER_LEN + 2 * self.lat_points + CHECKSUM_LEN
    }
}

/// Parses the UHL record at the start of `bytes`.
pub fn parse_header(bytes: &[u8]) -> Result<Header, GridError> {
    let uhl = slice(bytes, 0, UHL_LEN)?;
    expect_sentinel(uhl, "UHL", 0)?;
    let lon = parse_angle("origin longitude", &uhl[4..12])?;
    let lat = parse_angle("origin latitude", &uhl[12..20])?;
    let lon_interval_tenths = parse_digits("longitude interval", &uhl[20..24])?;
    let lat_interval_tenths = parse_digits("latitude interval", &uhl[24..28])?;
    let lon_lines = parse_digits("longitude lines", &uhl[47..51])?;
    let lat_points = parse_digits("latitude points", &uhl[51..55])?;
    if lon_interval_tenths == 0 || lat_interval_tenths == 0 {
        return Err(GridError::header("interval", "0"));
    }
    Ok(Header {
        origin: Coord { x: lon, y: lat },
        lon_interval_tenths,
        lat_interval_tenths,
        lon_lines: lon_lines as usize,
        lat_points: lat_points as usize,
    })
}

/// Decodes a whole cell.
pub fn decode(bytes: &[u8], validate_checksum: bool) -> Result<Grid, GridError> {
    let header = parse_header(bytes)?;
    expect_sentinel(slice(bytes, UHL_LEN, DSI_LEN)?, "DSI", UHL_LEN)?;
    expect_sentinel(slice(bytes, UHL_LEN + DSI_LEN, ACC_LEN)?, "ACC", UHL_LEN + DSI_LEN)?;

    let Header {
        lat_points,
        lon_lines,
        ..
    } = header;
    let record_len = header.record_len();
    // Header counts are only trusted once the file is long enough.
    let data = slice(bytes, DATA_OFFSET, lon_lines * record_len)?;
    let mut samples = Vec::with_capacity(lat_points * lon_lines);
    for (record, raw) in data.chunks_exact(record_len).enumerate() {
        let offset = DATA_OFFSET + record * record_len;
        if raw[0] != RECORD_SENTINEL {
            return Err(GridError::Sentinel {
                expected: "0xAA",
                offset,
            });
        }
        let (body, trailer) = raw.split_at(record_len - CHECKSUM_LEN);
        if validate_checksum {
            let computed = checksum(body);
            let stored = BE::read_u32(trailer);
            if computed != stored {
                return Err(GridError::Checksum {
                    record,
                    computed,
                    stored,
                });
            }
        }
        samples.extend(
            body[RECORD_HEADER_LEN..]
                .chunks_exact(2)
                .map(|post| from_sign_magnitude(BE::read_u16(post))),
        );
    }

    let layout = GridLayout {
        origin: header.origin,
        lat_points,
        lon_points: lon_lines,
        lat_interval: C::from(header.lat_interval_tenths) / TENTHS_ARCSEC_PER_DEG,
        lon_interval: C::from(header.lon_interval_tenths) / TENTHS_ARCSEC_PER_DEG,
        order: StorageOrder::ColumnMajor,
    };
    Grid::new(layout, SampleStore::Int16(samples.into_boxed_slice()))
}

/// Reads and decodes the cell at `path`.
pub fn load(path: &Path, options: DtedOptions) -> Result<Grid, GridError> {
    let bytes = options.mode.open(path)?;
    decode(&bytes, options.validate_checksum)
}

/// Returns the conventional location of the cell whose southwest
/// corner is (`sw_lat`, `sw_lon`): `<dir>/<e|w>DDD/<n|s>DD.dt<level>`.
pub fn cell_path(dir: &Path, level: u8, sw_lat: i32, sw_lon: i32) -> PathBuf {
    let lon_dir = format!(
        "{}{:03}",
        if sw_lon < 0 { 'w' } else { 'e' },
        sw_lon.unsigned_abs()
    );
    let lat_file = format!(
        "{}{:02}.dt{level}",
        if sw_lat < 0 { 's' } else { 'n' },
        sw_lat.unsigned_abs()
    );
    dir.join(lon_dir).join(lat_file)
}

/// Sum of all bytes in a record's header and data.
pub fn checksum(body: &[u8]) -> u32 {
    body.iter()
        .fold(0u32, |sum, &byte| sum.wrapping_add(u32::from(byte)))
}

fn from_sign_magnitude(raw: u16) -> i16 {
    #[allow(clippy::cast_possible_wrap)]
    let magnitude = (raw & 0x7FFF) as i16;
    if raw & 0x8000 == 0 {
        magnitude
    } else {
        -magnitude
    }
}

fn expect_sentinel(record: &[u8], expected: &'static str, offset: usize) -> Result<(), GridError> {
    if record.starts_with(expected.as_bytes()) {
        Ok(())
    } else {
        Err(GridError::Sentinel { expected, offset })
    }
}

fn parse_digits(field: &'static str, raw: &[u8]) -> Result<u32, GridError> {
    let text = std::str::from_utf8(raw).map_err(|_| GridError::header(field, "non-ASCII"))?;
    crate::parse_field(field, text)
}

/// Parses a `DDDMMSSH` angle.
fn parse_angle(field: &'static str, raw: &[u8]) -> Result<C, GridError> {
    let text = std::str::from_utf8(raw).map_err(|_| GridError::header(field, "non-ASCII"))?;
    let malformed = || GridError::header(field, text);
    if text.len() != 8 || !text.is_ascii() {
        return Err(malformed());
    }
    let (digits, hemisphere) = text.split_at(7);
    let sign = match hemisphere {
        "N" | "E" => 1.0,
        "S" | "W" => -1.0,
        _ => return Err(malformed()),
    };
    let deg: u32 = digits[0..3].parse().map_err(|_| malformed())?;
    let min: u32 = digits[3..5].parse().map_err(|_| malformed())?;
    let sec: u32 = digits[5..7].parse().map_err(|_| malformed())?;
    Ok(sign * (C::from(deg) + C::from(min) / 60.0 + C::from(sec) / 3600.0))
}
