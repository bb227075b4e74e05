use crate::C;
use geo::geometry::Coord;

/// A geographic rectangle given by its southwest and northeast
/// corners, in decimal degrees.
///
/// `sw_lon > ne_lon` is a valid encoding: the rectangle wraps across
/// the ±180° meridian.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoRect {
    sw_lat: C,
    sw_lon: C,
    ne_lat: C,
    ne_lon: C,
}

impl GeoRect {
    pub fn new(sw_lat: C, sw_lon: C, ne_lat: C, ne_lon: C) -> Self {
        debug_assert!(sw_lat <= ne_lat, "sw_lat {sw_lat} > ne_lat {ne_lat}");
        Self {
            sw_lat,
            sw_lon,
            ne_lat,
            ne_lon,
        }
    }

    /// The whole globe.
    pub fn world() -> Self {
        Self::new(-90.0, -180.0, 90.0, 180.0)
    }

    /// Returns a rectangle of `lat_extent` by `lon_extent` degrees
    /// anchored at its southwest corner.
    pub fn from_sw(sw_lat: C, sw_lon: C, lat_extent: C, lon_extent: C) -> Self {
        Self::new(
            sw_lat,
            sw_lon,
            sw_lat + lat_extent,
            wrap_lon(sw_lon + lon_extent),
        )
    }

    pub fn sw_lat(&self) -> C {
        self.sw_lat
    }

    pub fn sw_lon(&self) -> C {
        self.sw_lon
    }

    pub fn ne_lat(&self) -> C {
        self.ne_lat
    }

    pub fn ne_lon(&self) -> C {
        self.ne_lon
    }

    pub fn sw(&self) -> Coord<C> {
        Coord {
            x: self.sw_lon,
            y: self.sw_lat,
        }
    }

    pub fn ne(&self) -> Coord<C> {
        Coord {
            x: self.ne_lon,
            y: self.ne_lat,
        }
    }

    pub fn spans_dateline(&self) -> bool {
        self.sw_lon > self.ne_lon
    }

    pub fn lat_extent(&self) -> C {
        self.ne_lat - self.sw_lat
    }

    pub fn lon_extent(&self) -> C {
        if self.spans_dateline() {
            self.ne_lon - self.sw_lon + 360.0
        } else {
            self.ne_lon - self.sw_lon
        }
    }

    /// Returns true if (`lat`, `lon`) lies inside or on the edge of
    /// this rectangle.
    pub fn contains(&self, lat: C, lon: C) -> bool {
        if lat < self.sw_lat || lat > self.ne_lat {
            return false;
        }
        if self.spans_dateline() {
            if lon >= 0.0 {
                lon >= self.sw_lon
            } else {
                lon <= self.ne_lon
            }
        } else {
            self.sw_lon <= lon && lon <= self.ne_lon
        }
    }

    pub fn contains_coord(&self, Coord { x, y }: Coord<C>) -> bool {
        self.contains(y, x)
    }

    /// Returns true if the two rectangles share at least one point.
    pub fn intersects(&self, other: &Self) -> bool {
        if self.sw_lat > other.ne_lat || other.sw_lat > self.ne_lat {
            return false;
        }
        match (self.spans_dateline(), other.spans_dateline()) {
            (false, false) => self.sw_lon <= other.ne_lon && other.sw_lon <= self.ne_lon,
            // `self` covers [sw_lon, 180] and [-180, ne_lon].
            (true, false) => other.ne_lon >= self.sw_lon || other.sw_lon <= self.ne_lon,
            (false, true) => self.ne_lon >= other.sw_lon || self.sw_lon <= other.ne_lon,
            // Both contain the antimeridian.
            (true, true) => true,
        }
    }

    /// Clamps latitudes to [-90, 90] and wraps longitudes into
    /// [-180, 180].
    pub fn normalized(&self) -> Self {
        Self {
            sw_lat: self.sw_lat.clamp(-90.0, 90.0),
            sw_lon: wrap_lon(self.sw_lon),
            ne_lat: self.ne_lat.clamp(-90.0, 90.0),
            ne_lon: wrap_lon(self.ne_lon),
        }
    }
}

/// Wraps `lon` into [-180, 180] by whole turns.
pub fn wrap_lon(mut lon: C) -> C {
    while lon > 180.0 {
        lon -= 360.0;
    }
    while lon < -180.0 {
        lon += 360.0;
    }
    lon
}
