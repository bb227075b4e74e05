#![allow(dead_code)]

use geogrid::dted::{self, ACC_LEN, DSI_LEN, RECORD_SENTINEL, UHL_LEN};
use std::path::{Path, PathBuf};

/// Posts per side of the cells written by [write_dted_cell]. Spacing
/// is 0.25 degrees.
pub const POSTS: usize = 5;

fn angle(value: i32, positive: char, negative: char) -> String {
    let hemisphere = if value < 0 { negative } else { positive };
    format!("{:03}0000{hemisphere}", value.unsigned_abs())
}

/// A 1 degree DTED cell whose post at (`row`, `col`) holds
/// `base + 10 * row + col`.
pub fn dted_cell(sw_lat: i32, sw_lon: i32, base: i16) -> Vec<u8> {
    let mut uhl = format!(
        "UHL1{}{}90009000",
        angle(sw_lon, 'E', 'W'),
        angle(sw_lat, 'N', 'S'),
    );
    uhl.push_str(&" ".repeat(47 - uhl.len()));
    uhl.push_str(&format!("{POSTS:04}{POSTS:04}"));
    uhl.push_str(&" ".repeat(UHL_LEN - uhl.len()));

    let mut bytes = uhl.into_bytes();
    bytes.extend(b"DSI".iter().chain([b' '; DSI_LEN - 3].iter()));
    bytes.extend(b"ACC".iter().chain([b' '; ACC_LEN - 3].iter()));
    for col in 0..POSTS {
        let mut record = vec![RECORD_SENTINEL, 0, 0, col as u8, 0, col as u8, 0, 0];
        for row in 0..POSTS {
            let value = base + 10 * row as i16 + col as i16;
            let raw = if value < 0 {
                0x8000 | value.unsigned_abs()
            } else {
                value as u16
            };
            record.extend(raw.to_be_bytes());
        }
        let sum = dted::checksum(&record);
        record.extend(sum.to_be_bytes());
        bytes.extend(record);
    }
    bytes
}

/// Writes a cell at its conventional place under `root`.
pub fn write_dted_cell(root: &Path, level: u8, sw_lat: i32, sw_lon: i32, base: i16) -> PathBuf {
    let path = dted::cell_path(root, level, sw_lat, sw_lon);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, dted_cell(sw_lat, sw_lon, base)).unwrap();
    path
}

/// Flips a bit in the last checksum of the cell at `path`.
pub fn corrupt(path: &Path) {
    let mut bytes = std::fs::read(path).unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0x01;
    std::fs::write(path, bytes).unwrap();
}

/// Writes a 3x3 float grid covering the 1 degree cell at
/// (`sw_lat`, `sw_lon`) with every sample equal to `value`.
pub fn write_float_grid(dir: &Path, sw_lat: i32, sw_lon: i32, value: f32) -> PathBuf {
    let path = dir.join(geogrid::float_grid::tile_file_name(sw_lat, sw_lon, "flt"));
    let mut bytes = format!(
        "ncols 3\nnrows 3\nxllcorner {sw_lon}\nyllcorner {sw_lat}\ncellsize 0.5\n\
         NODATA_value -9999\nbyteorder LSBFIRST\n"
    )
    .into_bytes();
    for _ in 0..9 {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    std::fs::write(&path, bytes).unwrap();
    path
}
