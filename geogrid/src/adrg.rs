//! ADRG (ARC Digitized Raster Graphics) distribution rectangles.
//!
//! A rectangle is a `<name>.GEN` general information file and a
//! `<name>.IMG` image file, both [iso8211] containers. The image is
//! divided into 128x128 pixel tiles stored band-sequentially (red,
//! green, blue planes), top row first.

use crate::{
    iso8211::{self, Field},
    GeoRect, Grid, GridError, GridLayout, ReadMode, SampleStore, StorageOrder, C,
};
use std::path::{Path, PathBuf};

/// Pixels along each edge of an image tile.
pub const TILE_DIM: usize = 128;
pub const BANDS: usize = 3;
pub const TILE_BYTES: usize = TILE_DIM * TILE_DIM * BANDS;

/// Contents of a `.GEN` file.
#[derive(Debug, Clone, PartialEq)]
pub struct Overview {
    /// Distribution rectangle name from the `DRT` field.
    pub name: String,
    pub rect: GeoRect,
    pub tile_rows: usize,
    pub tile_cols: usize,
    /// One-based image slot per tile, row-major from the north; 0
    /// marks a tile with no image data. `None` means every tile is
    /// present in order.
    pub tile_map: Option<Box<[u32]>>,
}

impl Overview {
    pub fn decode(bytes: &[u8]) -> Result<Self, GridError> {
        let records = iso8211::parse_records(bytes)?;
        let field = |tag: &'static str| {
            iso8211::find_field(&records, tag).ok_or(GridError::MissingField(tag))
        };
        field("TRH")?;
        let name = field("DRT")?.text(0).unwrap_or_default().to_owned();
        let gin = field("GIN")?;
        let (sw_lat, ne_lat): (C, C) = (
            number(gin, 1, "GIN SW latitude")?,
            number(gin, 3, "GIN NE latitude")?,
        );
        if !(sw_lat < ne_lat) {
            return Err(GridError::header("GIN latitudes", format!("{sw_lat} {ne_lat}")));
        }
        let rect = GeoRect::new(
            sw_lat,
            number(gin, 0, "GIN SW longitude")?,
            ne_lat,
            number(gin, 2, "GIN NE longitude")?,
        );
        let tile_rows = number(gin, 4, "GIN tile rows")?;
        let tile_cols = number(gin, 5, "GIN tile columns")?;
        if tile_rows == 0 || tile_cols == 0 {
            return Err(GridError::header("GIN tile count", format!("{tile_rows}x{tile_cols}")));
        }
        let tile_map = match iso8211::find_field(&records, "TIM") {
            None => None,
            Some(tim) => Some(parse_tile_map(tim, tile_rows * tile_cols)?),
        };
        Ok(Self {
            name,
            rect,
            tile_rows,
            tile_cols,
            tile_map,
        })
    }

    pub fn load(path: &Path, mode: ReadMode) -> Result<Self, GridError> {
        Self::decode(&mode.open(path)?)
    }

    /// Returns the image file paired with the `.GEN` at `gen_path`.
    pub fn image_path(gen_path: &Path) -> PathBuf {
        let upper = gen_path
            .extension()
            .map_or(true, |ext| ext.to_string_lossy().chars().all(|c| !c.is_lowercase()));
        gen_path.with_extension(if upper { "IMG" } else { "img" })
    }

    /// Returns the zero-based image slot of tile (`row`, `col`).
    pub fn slot(&self, row: usize, col: usize) -> Result<usize, GridError> {
        let index = row * self.tile_cols + col;
        match &self.tile_map {
            None => Ok(index),
            Some(map) => match map.get(index) {
                Some(0) | None => Err(GridError::AbsentTile(index)),
                Some(&slot) => Ok(slot as usize - 1),
            },
        }
    }

    /// Returns the footprint of tile (`row`, `col`), row 0 north.
    pub fn tile_rect(&self, row: usize, col: usize) -> GeoRect {
        #[allow(clippy::cast_precision_loss)]
        let (lat_deg, lon_deg) = (
            self.rect.lat_extent() / self.tile_rows as C,
            self.rect.lon_extent() / self.tile_cols as C,
        );
        #[allow(clippy::cast_precision_loss)]
        let ne_lat = self.rect.ne_lat() - row as C * lat_deg;
        #[allow(clippy::cast_precision_loss)]
        let sw_lon = crate::wrap_lon(self.rect.sw_lon() + col as C * lon_deg);
        GeoRect::from_sw(ne_lat - lat_deg, sw_lon, lat_deg, lon_deg)
    }

    /// Decodes tile (`row`, `col`) from the image file's bytes.
    pub fn decode_tile(&self, image: &[u8], row: usize, col: usize) -> Result<Grid, GridError> {
        let slot = self.slot(row, col)?;
        let records = iso8211::parse_records(image)?;
        let pixels = iso8211::find_field(&records, "IMG")
            .ok_or(GridError::MissingField("IMG"))?
            .data;
        let tile = crate::error::slice(pixels, slot * TILE_BYTES, TILE_BYTES)?;

        // Flip each band from top-first to bottom-first.
        let mut samples = vec![0u8; TILE_BYTES];
        let plane = TILE_DIM * TILE_DIM;
        for (src, dst) in tile.chunks_exact(plane).zip(samples.chunks_exact_mut(plane)) {
            for (r, line) in src.chunks_exact(TILE_DIM).enumerate() {
                let flipped = (TILE_DIM - 1 - r) * TILE_DIM;
                dst[flipped..flipped + TILE_DIM].copy_from_slice(line);
            }
        }

        let rect = self.tile_rect(row, col);
        #[allow(clippy::cast_precision_loss)]
        let steps = (TILE_DIM - 1) as C;
        let layout = GridLayout {
            origin: rect.sw(),
            lat_points: TILE_DIM,
            lon_points: TILE_DIM,
            lat_interval: rect.lat_extent() / steps,
            lon_interval: rect.lon_extent() / steps,
            order: StorageOrder::RowMajor,
        };
        Grid::new(layout, SampleStore::Byte(samples.into_boxed_slice()))
    }

    /// Reads the image file at `image_path` and decodes one tile.
    pub fn load_tile(
        &self,
        image_path: &Path,
        mode: ReadMode,
        row: usize,
        col: usize,
    ) -> Result<Grid, GridError> {
        // Check the tile map before touching the file.
        self.slot(row, col)?;
        let image = mode.open(image_path)?;
        self.decode_tile(&image, row, col)
    }
}

fn number<T: std::str::FromStr>(
    field: &Field<'_>,
    n: usize,
    name: &'static str,
) -> Result<T, GridError> {
    let text = field.text(n).ok_or(GridError::MissingField(name))?;
    crate::parse_field(name, text)
}

/// Parses `count` five digit slots, optionally split across
/// subfields.
fn parse_tile_map(tim: &Field<'_>, count: usize) -> Result<Box<[u32]>, GridError> {
    let digits: Vec<u8> = tim
        .subfields()
        .flat_map(|sub| sub.iter().copied())
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    if digits.len() != count * 5 {
        return Err(GridError::header(
            "TIM",
            format!("{} digits for {count} tiles", digits.len()),
        ));
    }
    digits
        .chunks_exact(5)
        .map(|slot| {
            std::str::from_utf8(slot)
                .map_err(|_| GridError::header("TIM", "non-ASCII"))
                .and_then(|text| crate::parse_field("TIM", text))
        })
        .collect()
}
