//! Repeated sampling of nearby points without a cache round trip per
//! point.

use crate::{Tile, TileService};
use geo::{
    algorithm::{HaversineDistance, HaversineIntermediate},
    geometry::{Coord, Point},
};
use geogrid::C;
use log::debug;
use num_traits::{Float, FromPrimitive};
use std::sync::Arc;

/// One sampled value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    /// The sampled value, or 0 when the covering tile has no value
    /// at the point.
    pub value: C,
    /// True if the cursor had to load a different tile.
    pub switched: bool,
}

/// Holds the most recently used tile of a [TileService] and samples
/// from it while queries stay inside it.
///
/// The held tile is unloaded when the cursor moves to another tile
/// and when the cursor is dropped.
pub struct ElevationCursor<'a> {
    service: &'a dyn TileService,
    tile: Option<Arc<Tile>>,
}

impl<'a> ElevationCursor<'a> {
    pub fn new(service: &'a dyn TileService) -> Self {
        Self {
            service,
            tile: None,
        }
    }

    /// The tile currently held, if any.
    pub fn tile(&self) -> Option<&Arc<Tile>> {
        self.tile.as_ref()
    }

    /// Nearest sample at (`lat`, `lon`).
    pub fn approx(&mut self, lat: C, lon: C) -> Sample {
        self.sample(lat, lon, Tile::approx)
    }

    /// Bilinearly interpolated value at (`lat`, `lon`).
    pub fn interp(&mut self, lat: C, lon: C) -> Sample {
        self.sample(lat, lon, Tile::interp)
    }

    /// Unloads the held tile, if any.
    pub fn release(&mut self) {
        if let Some(tile) = self.tile.take() {
            self.service.unload_tile(&tile);
        }
    }

    fn sample(&mut self, lat: C, lon: C, lookup: impl Fn(&Tile, C, C) -> Option<C>) -> Sample {
        let switched = self.ensure(lat, lon);
        let value = self
            .tile
            .as_deref()
            .and_then(|tile| lookup(tile, lat, lon))
            .unwrap_or(0.0);
        Sample { value, switched }
    }

    /// Makes the held tile one covering the point, returning true if
    /// that took a load.
    fn ensure(&mut self, lat: C, lon: C) -> bool {
        if matches!(&self.tile, Some(tile) if tile.contains(lat, lon)) {
            return false;
        }
        self.release();
        self.tile = Some(self.service.load_tile(lat, lon));
        true
    }
}

impl Drop for ElevationCursor<'_> {
    fn drop(&mut self) {
        self.release();
    }
}

/// Values sampled along a great circle.
#[derive(Debug, Clone, PartialEq)]
pub struct Profile {
    /// Total distance from start to end in meters.
    pub distance: C,

    /// Sample locations, start and end included.
    pub great_circle: Vec<Point<C>>,

    /// Interpolated value at each location.
    pub values: Vec<C>,

    /// Number of tile loads needed.
    pub switches: usize,
}

/// Samples `n` evenly spaced points on the great circle from `start`
/// to `end`.
pub fn sample_line(service: &dyn TileService, start: Coord<C>, end: Coord<C>, n: usize) -> Profile {
    let (start, end) = (Point::from(start), Point::from(end));
    let great_circle: Vec<Point<C>> = linspace(0.0, 1.0, n)
        .map(|f| start.haversine_intermediate(&end, f))
        .collect();

    let mut cursor = ElevationCursor::new(service);
    let mut switches = 0;
    let values = great_circle
        .iter()
        .map(|point| {
            let sample = cursor.interp(point.y(), point.x());
            switches += usize::from(sample.switched);
            sample.value
        })
        .collect();
    debug!(
        "sampled {} points over {} tiles from {:?}",
        great_circle.len(),
        switches,
        service.format()
    );

    Profile {
        distance: start.haversine_distance(&end),
        great_circle,
        values,
        switches,
    }
}

/// `n` evenly spaced values from `start` to `end` inclusive.
fn linspace<T>(start: T, end: T, n: usize) -> impl Iterator<Item = T>
where
    T: Float + FromPrimitive,
{
    let intervals = T::from_usize(n.saturating_sub(1).max(1)).unwrap_or_else(T::one);
    let step = (end - start) / intervals;
    (0..n).map(move |i| start + T::from_usize(i).unwrap_or_else(T::zero) * step)
}
