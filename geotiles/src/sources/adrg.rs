use super::{has_extension, list_files, Catalog, Entry};
use crate::{Format, Location, TileError, TileSource};
use geogrid::{adrg::Overview, Grid, GridError, ReadMode, TileMatrix, C};
use log::{info, warn};
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

#[derive(Debug)]
struct Rectangle {
    overview: Overview,
    image: PathBuf,
    matrix: Arc<TileMatrix>,
}

impl Entry for Rectangle {
    fn matrix(&self) -> &Arc<TileMatrix> {
        &self.matrix
    }

    fn has_tile(&self, row: usize, col: usize) -> bool {
        self.overview.slot(row, col).is_ok()
    }
}

/// ADRG distribution rectangles, one tile matrix per `.GEN` file.
#[derive(Debug)]
pub struct AdrgSource {
    catalog: Catalog<Rectangle>,
    mode: ReadMode,
}

impl Default for AdrgSource {
    fn default() -> Self {
        Self::new()
    }
}

impl AdrgSource {
    pub fn new() -> Self {
        Self {
            catalog: Catalog::new(),
            mode: ReadMode::InMem,
        }
    }

    pub fn set_read_mode(&mut self, mode: ReadMode) {
        self.mode = mode;
    }

    /// Adds every readable `.GEN` rectangle in `dir`, returning how
    /// many were added.
    pub fn add_directory(&mut self, dir: impl AsRef<Path>) -> Result<usize, TileError> {
        let dir = dir.as_ref();
        let mut added = 0;
        for path in list_files(dir)? {
            if !has_extension(&path, "gen") {
                continue;
            }
            match self.add_file(&path) {
                Ok(()) => added += 1,
                Err(e) => warn!("skipping ADRG rectangle: {e}"),
            }
        }
        if added == 0 {
            return Err(TileError::Empty {
                format: Format::Adrg,
                path: dir.to_path_buf(),
            });
        }
        Ok(added)
    }

    /// Adds the rectangle described by the `.GEN` file at `path`.
    pub fn add_file(&mut self, path: impl AsRef<Path>) -> Result<(), TileError> {
        let path = path.as_ref();
        let overview = Overview::load(path, self.mode).map_err(|source| TileError::Grid {
            path: path.to_path_buf(),
            source,
        })?;
        let matrix = TileMatrix::new(overview.rect, overview.tile_rows, overview.tile_cols);
        info!(
            "added ADRG rectangle {} ({}x{} tiles) from {path:?}",
            overview.name, overview.tile_rows, overview.tile_cols
        );
        self.catalog.push(Rectangle {
            image: Overview::image_path(path),
            overview,
            matrix: Arc::new(matrix),
        });
        Ok(())
    }

    pub fn rectangles(&self) -> usize {
        self.catalog.len()
    }
}

impl TileSource for AdrgSource {
    fn format(&self) -> Format {
        Format::Adrg
    }

    fn locate(&self, lat: C, lon: C) -> Location {
        self.catalog.locate(lat, lon)
    }

    fn load(&self, location: &Location) -> Result<Grid, GridError> {
        let rectangle = self.catalog.entry(location)?;
        rectangle
            .overview
            .load_tile(&rectangle.image, self.mode, location.row, location.col)
    }
}

#[cfg(test)]
mod tests {
    use super::AdrgSource;
    use crate::{TileError, TileSource};

    /// One ISO 8211 data record holding `fields`.
    fn record(fields: &[(&str, &str)]) -> Vec<u8> {
        let (mut directory, mut area) = (Vec::new(), Vec::new());
        for (tag, data) in fields {
            let len = data.len() + 1;
            directory.extend(format!("{tag}{len:03}{:04}", area.len()).into_bytes());
            area.extend_from_slice(data.as_bytes());
            area.push(0x1E);
        }
        directory.push(0x1E);
        let base = 24 + directory.len();
        let mut bytes = format!("{:05}3D     {base:05}   3403", base + area.len()).into_bytes();
        bytes.extend(directory);
        bytes.extend(area);
        bytes
    }

    #[test]
    fn test_rectangles_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        let gin = ["10", "20", "12", "21", "2", "4"].join("\u{1f}");
        // Only the northwest tile is present.
        let tim = "00001 00000 00000 00000 00000 00000 00000 00000";
        std::fs::write(
            dir.path().join("RECT01.GEN"),
            record(&[("TRH", "T"), ("DRT", "RECT01"), ("GIN", &gin), ("TIM", tim)]),
        )
        .unwrap();
        std::fs::write(dir.path().join("BROKEN.GEN"), b"nonsense").unwrap();
        std::fs::write(dir.path().join("README.TXT"), b"").unwrap();

        let mut source = AdrgSource::new();
        assert_eq!(source.add_directory(dir.path()).unwrap(), 1);
        let location = source.locate(20.75, 10.25);
        assert_eq!(location.entry, Some(0));
        assert_eq!((location.row, location.col), (0, 0));
        // The image file is missing.
        assert!(source.load(&location).is_err());
        // Absent tiles fall back to the catch-all matrix.
        assert_eq!(source.locate(20.25, 11.75).entry, None);
        assert_eq!(source.rectangles(), 1);
    }

    #[test]
    fn test_empty_directory() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = AdrgSource::new();
        assert!(matches!(
            source.add_directory(dir.path()),
            Err(TileError::Empty { .. })
        ));
    }
}
