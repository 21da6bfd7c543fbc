//! Geodesic primitives: points, locations, and spherical math.
//!
//! All distance, bearing, projection, and midpoint computations use the
//! WGS84 equatorial radius so results are bit-reproducible across the
//! pipeline. Two distance variants are provided: a fast equirectangular
//! approximation used for most internal geometry, and the haversine
//! great-circle distance used where angular accuracy matters.

use serde::{Deserialize, Serialize};

/// WGS84 equatorial radius in meters.
pub const EARTH_RADIUS_M: f64 = 6_378_137.0;

/// A bare latitude/longitude pair in degrees.
///
/// Equality is exact on the stored degree pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub lat: f64,
    pub lon: f64,
}

impl Point {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Check the point lies within valid geographic ranges.
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lon)
    }
}

/// A geographic location: a [`Point`] plus an optional unique id.
///
/// Equality is exact on the degree pair and the id, so two locations at the
/// same coordinates with different ids compare unequal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub lat: f64,
    pub lon: f64,
    pub uid: u64,
}

impl Location {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon, uid: 0 }
    }

    pub fn with_uid(lat: f64, lon: f64, uid: u64) -> Self {
        Self { lat, lon, uid }
    }

    pub fn point(&self) -> Point {
        Point::new(self.lat, self.lon)
    }

    /// Equirectangular approximation of the distance to `other` in meters.
    pub fn distance_to(&self, other: &Location) -> f64 {
        distance(self.lat, self.lon, other.lat, other.lon)
    }

    /// Haversine great-circle distance to `other` in meters.
    pub fn distance_to_haversine(&self, other: &Location) -> f64 {
        distance_haversine(self.lat, self.lon, other.lat, other.lon)
    }

    /// Initial bearing of the great-circle path to `other`, in `[0, 360)`.
    pub fn bearing_to(&self, other: &Location) -> f64 {
        bearing(self.lat, self.lon, other.lat, other.lon)
    }

    /// Destination reached by travelling `distance_m` meters from this
    /// location along the given initial bearing (degrees).
    pub fn project_position(&self, bearing_deg: f64, distance_m: f64) -> Location {
        let lat1 = self.lat.to_radians();
        let lon1 = self.lon.to_radians();
        let theta = bearing_deg.to_radians();
        let delta = distance_m / EARTH_RADIUS_M;

        let lat2 = (lat1.sin() * delta.cos() + lat1.cos() * delta.sin() * theta.cos()).asin();
        let lon2 = lon1
            + (theta.sin() * delta.sin() * lat1.cos()).atan2(delta.cos() - lat1.sin() * lat2.sin());

        Location::new(lat2.to_degrees(), normalize_lon(lon2.to_degrees()))
    }

    /// Geodesic midpoint between this location and `other`.
    pub fn midpoint(&self, other: &Location) -> Location {
        let lat1 = self.lat.to_radians();
        let lon1 = self.lon.to_radians();
        let lat2 = other.lat.to_radians();
        let dlon = (other.lon - self.lon).to_radians();

        let bx = lat2.cos() * dlon.cos();
        let by = lat2.cos() * dlon.sin();
        let lat3 = (lat1.sin() + lat2.sin())
            .atan2(((lat1.cos() + bx).powi(2) + by.powi(2)).sqrt());
        let lon3 = lon1 + by.atan2(lat1.cos() + bx);

        Location::new(lat3.to_degrees(), normalize_lon(lon3.to_degrees()))
    }
}

impl From<Location> for Point {
    fn from(loc: Location) -> Self {
        Point::new(loc.lat, loc.lon)
    }
}

/// Equirectangular approximation of the distance between two coordinates,
/// in meters. Fast and adequate at road-network scales.
pub fn distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let x = (lon2 - lon1).to_radians() * ((lat1 + lat2) / 2.0).to_radians().cos();
    let y = (lat2 - lat1).to_radians();
    EARTH_RADIUS_M * (x * x + y * y).sqrt()
}

/// Haversine great-circle distance between two coordinates, in meters.
pub fn distance_haversine(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let dlat = (lat2 - lat1).to_radians();
    let dlon = (lon2 - lon1).to_radians();
    let a = (dlat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * a.sqrt().atan2((1.0 - a).sqrt())
}

/// Axis-aligned ("Manhattan") distance between two coordinates, in meters:
/// the north-south leg plus the east-west leg.
pub fn distance_manhattan(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let ns = distance(lat1, lon1, lat2, lon1);
    let ew = distance(lat2, lon1, lat2, lon2);
    ns + ew
}

/// Initial bearing in degrees `[0, 360)` of the great-circle path from
/// `(lat1, lon1)` to `(lat2, lon2)`.
pub fn bearing(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let dlon = (lon2 - lon1).to_radians();

    let y = dlon.sin() * phi2.cos();
    let x = phi1.cos() * phi2.sin() - phi1.sin() * phi2.cos() * dlon.cos();
    (y.atan2(x).to_degrees() + 360.0) % 360.0
}

/// Smallest circular difference between two headings, in degrees `[0, 180]`.
pub fn heading_delta(a: f64, b: f64) -> f64 {
    let d = (a - b).rem_euclid(360.0);
    if d > 180.0 {
        360.0 - d
    } else {
        d
    }
}

/// Normalize a longitude into `[-180, 180]`.
fn normalize_lon(lon: f64) -> f64 {
    let mut l = (lon + 180.0).rem_euclid(360.0) - 180.0;
    // rem_euclid maps exactly +180 to -180; keep -180 stable instead.
    if l == 180.0 {
        l = -180.0;
    }
    l
}
