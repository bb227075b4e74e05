//! Named tile services shared across threads.

use crate::{Tile, TileService};
use dashmap::DashMap;
use geogrid::C;
use std::{fmt, sync::Arc};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Layer {
    /// Bare-earth elevation.
    Terrain,
    /// Height of vegetation above the terrain.
    Vegetation,
    Bathymetry,
    LandUse,
    Imagery,
}

impl Layer {
    pub const ALL: [Self; 5] = [
        Self::Terrain,
        Self::Vegetation,
        Self::Bathymetry,
        Self::LandUse,
        Self::Imagery,
    ];
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Terrain => "terrain",
            Self::Vegetation => "vegetation",
            Self::Bathymetry => "bathymetry",
            Self::LandUse => "land use",
            Self::Imagery => "imagery",
        };
        f.write_str(name)
    }
}

/// Registry of the tile service backing each [Layer].
///
/// Sampling a layer with nothing registered yields 0.
#[derive(Default)]
pub struct Layers {
    services: DashMap<Layer, Arc<dyn TileService>>,
}

impl Layers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `service` for `layer`, returning the service it
    /// replaced.
    pub fn register(
        &self,
        layer: Layer,
        service: Arc<dyn TileService>,
    ) -> Option<Arc<dyn TileService>> {
        self.services.insert(layer, service)
    }

    pub fn unregister(&self, layer: Layer) -> Option<Arc<dyn TileService>> {
        self.services.remove(&layer).map(|(_, service)| service)
    }

    pub fn get(&self, layer: Layer) -> Option<Arc<dyn TileService>> {
        self.services
            .get(&layer)
            .map(|service| Arc::clone(service.value()))
    }

    pub fn contains(&self, layer: Layer) -> bool {
        self.services.contains_key(&layer)
    }

    /// Nearest sample of `layer` at (`lat`, `lon`).
    pub fn approx(&self, layer: Layer, lat: C, lon: C) -> C {
        self.sample(layer, lat, lon, |tile| tile.approx(lat, lon))
    }

    /// Interpolated value of `layer` at (`lat`, `lon`).
    pub fn interp(&self, layer: Layer, lat: C, lon: C) -> C {
        self.sample(layer, lat, lon, |tile| tile.interp(lat, lon))
    }

    fn sample(
        &self,
        layer: Layer,
        lat: C,
        lon: C,
        lookup: impl Fn(&Tile) -> Option<C>,
    ) -> C {
        // Clone out of the map so no shard lock is held while loading.
        let Some(service) = self.get(layer) else {
            return 0.0;
        };
        let tile = service.load_tile(lat, lon);
        let value = lookup(&tile).unwrap_or(0.0);
        service.unload_tile(&tile);
        value
    }
}

impl fmt::Debug for Layers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registered: Vec<Layer> = Layer::ALL
            .into_iter()
            .filter(|&layer| self.contains(layer))
            .collect();
        f.debug_struct("Layers")
            .field("registered", &registered)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::{Layer, Layers};
    use crate::{Format, Location, TileManager, TileService, TileSource};
    use geogrid::{Grid, GridError, GridLayout, SampleStore, StorageOrder, TileMatrix, C};
    use std::sync::Arc;

    /// Every cell holds `self.1`.
    struct Flat(Arc<TileMatrix>, f32);

    impl TileSource for Flat {
        fn format(&self) -> Format {
            Format::FloatGrid
        }

        fn locate(&self, lat: C, lon: C) -> Location {
            let (row, col) = self.0.row_col(lat, lon);
            Location {
                matrix: Arc::clone(&self.0),
                row,
                col,
                entry: Some(0),
            }
        }

        fn load(&self, location: &Location) -> Result<Grid, GridError> {
            let layout = GridLayout {
                origin: location.rect().sw(),
                lat_points: 2,
                lon_points: 2,
                lat_interval: 1.0,
                lon_interval: 1.0,
                order: StorageOrder::ColumnMajor,
            };
            Grid::new(layout, SampleStore::Float32(vec![self.1; 4].into_boxed_slice()))
        }
    }

    fn flat(value: f32) -> Arc<TileManager<Flat>> {
        Arc::new(TileManager::new(Flat(
            Arc::new(TileMatrix::global(1.0)),
            value,
        )))
    }

    #[test]
    fn test_register_and_sample() {
        let layers = Layers::new();
        assert_eq!(layers.interp(Layer::Terrain, 44.27, -71.3), 0.0);
        let terrain = flat(1917.0);
        assert!(layers.register(Layer::Terrain, terrain.clone()).is_none());
        assert!(layers.contains(Layer::Terrain));
        assert!(!layers.contains(Layer::Vegetation));
        assert_eq!(layers.interp(Layer::Terrain, 44.27, -71.3), 1917.0);
        assert_eq!(layers.approx(Layer::Terrain, 44.27, -71.3), 1917.0);
        // Samples never leave tiles in use.
        assert_eq!(terrain.stats().entries, 1);
        assert_eq!(terrain.stats().inactive, 1);

        let replaced = layers.register(Layer::Terrain, flat(5.0)).unwrap();
        assert_eq!(replaced.format(), Format::FloatGrid);
        assert_eq!(layers.approx(Layer::Terrain, 0.5, 0.5), 5.0);
        assert!(layers.unregister(Layer::Terrain).is_some());
        assert!(layers.get(Layer::Terrain).is_none());
    }

    #[test]
    fn test_shared_across_threads() {
        let layers = Layers::new();
        layers.register(Layer::Bathymetry, flat(-40.0));
        std::thread::scope(|scope| {
            for t in 0..4 {
                let layers = &layers;
                scope.spawn(move || {
                    for i in 0..50 {
                        let lon = f64::from(t * 50 + i) * 0.5 - 90.0;
                        assert_eq!(layers.interp(Layer::Bathymetry, 10.5, lon), -40.0);
                    }
                });
            }
        });
        assert_eq!(format!("{layers:?}"), "Layers { registered: [Bathymetry] }");
    }
}
