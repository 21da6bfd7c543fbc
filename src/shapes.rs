//! Geometric shapes used by the spatial index and the map fitters.
//!
//! [`Bounds`] is the axis-aligned rectangle the quad-tree partitions;
//! [`Area`] is the buffered quadrilateral around a road edge used for
//! containment tests; [`Circle`] and [`Grid`] cover the remaining
//! road-network shape kinds. [`Entity`] is the closed variant stored in the
//! quad-tree: every geometric kind the index can hold, with the shared
//! `get_type` / `touches` capability implemented per variant.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SanitizeError};
use crate::geo::{self, Location, Point, EARTH_RADIUS_M};
use crate::network::Edge;

/// Cross product of `(q - p) x (r - p)` in the lat/lon plane.
fn cross(p: Point, q: Point, r: Point) -> f64 {
    (q.lon - p.lon) * (r.lat - p.lat) - (q.lat - p.lat) * (r.lon - p.lon)
}

/// Planar segment intersection test in lat/lon coordinates.
pub(crate) fn segments_intersect(a1: Point, a2: Point, b1: Point, b2: Point) -> bool {
    let d1 = cross(b1, b2, a1);
    let d2 = cross(b1, b2, a2);
    let d3 = cross(a1, a2, b1);
    let d4 = cross(a1, a2, b2);

    if ((d1 > 0.0 && d2 < 0.0) || (d1 < 0.0 && d2 > 0.0))
        && ((d3 > 0.0 && d4 < 0.0) || (d3 < 0.0 && d4 > 0.0))
    {
        return true;
    }

    let on_segment = |p: Point, q: Point, r: Point| {
        r.lon >= p.lon.min(q.lon)
            && r.lon <= p.lon.max(q.lon)
            && r.lat >= p.lat.min(q.lat)
            && r.lat <= p.lat.max(q.lat)
    };

    (d1 == 0.0 && on_segment(b1, b2, a1))
        || (d2 == 0.0 && on_segment(b1, b2, a2))
        || (d3 == 0.0 && on_segment(a1, a2, b1))
        || (d4 == 0.0 && on_segment(a1, a2, b2))
}

/// Distance in meters from `p` to the segment `a`-`b`.
///
/// The foot of the perpendicular is found by projecting in plain degree
/// space, clamped to the segment; the returned value is the haversine
/// distance from `p` to that foot. A zero-length segment yields the
/// distance to `a`.
pub(crate) fn point_segment_distance(p: Point, a: Point, b: Point) -> f64 {
    let dx = b.lon - a.lon;
    let dy = b.lat - a.lat;
    let len2 = dx * dx + dy * dy;
    if len2 == 0.0 {
        return geo::distance_haversine(p.lat, p.lon, a.lat, a.lon);
    }
    let t = (((p.lon - a.lon) * dx + (p.lat - a.lat) * dy) / len2).clamp(0.0, 1.0);
    let foot = Point::new(a.lat + t * dy, a.lon + t * dx);
    geo::distance_haversine(p.lat, p.lon, foot.lat, foot.lon)
}

/// Axis-aligned rectangle defined by its southwest and northeast corners.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub sw: Point,
    pub ne: Point,
}

impl Bounds {
    pub fn new(sw: Point, ne: Point) -> Self {
        Self { sw, ne }
    }

    pub fn nw(&self) -> Point {
        Point::new(self.ne.lat, self.sw.lon)
    }

    pub fn se(&self) -> Point {
        Point::new(self.sw.lat, self.ne.lon)
    }

    /// Width in degrees of longitude.
    pub fn width(&self) -> f64 {
        self.ne.lon - self.sw.lon
    }

    /// Height in degrees of latitude.
    pub fn height(&self) -> f64 {
        self.ne.lat - self.sw.lat
    }

    pub fn center(&self) -> Point {
        Point::new(
            (self.sw.lat + self.ne.lat) / 2.0,
            (self.sw.lon + self.ne.lon) / 2.0,
        )
    }

    pub fn north_midpoint(&self) -> Point {
        Point::new(self.ne.lat, (self.sw.lon + self.ne.lon) / 2.0)
    }

    pub fn south_midpoint(&self) -> Point {
        Point::new(self.sw.lat, (self.sw.lon + self.ne.lon) / 2.0)
    }

    pub fn east_midpoint(&self) -> Point {
        Point::new((self.sw.lat + self.ne.lat) / 2.0, self.ne.lon)
    }

    pub fn west_midpoint(&self) -> Point {
        Point::new((self.sw.lat + self.ne.lat) / 2.0, self.sw.lon)
    }

    /// Inclusive point containment.
    pub fn contains(&self, p: &Point) -> bool {
        p.lat >= self.sw.lat && p.lat <= self.ne.lat && p.lon >= self.sw.lon && p.lon <= self.ne.lon
    }

    pub fn contains_location(&self, loc: &Location) -> bool {
        self.contains(&loc.point())
    }

    /// Both endpoints of the edge fall inside.
    pub fn contains_edge(&self, edge: &Edge) -> bool {
        self.contains(&edge.p1.point()) && self.contains(&edge.p2.point())
    }

    /// The edge's segment crosses the rectangle boundary.
    pub fn intersects_edge(&self, edge: &Edge) -> bool {
        self.intersects_segment(edge.p1.point(), edge.p2.point())
    }

    /// The segment `p1`-`p2` crosses any of the four boundary sides.
    pub fn intersects_segment(&self, p1: Point, p2: Point) -> bool {
        let corners = [self.nw(), self.ne, self.se(), self.sw];
        for i in 0..4 {
            if segments_intersect(p1, p2, corners[i], corners[(i + 1) % 4]) {
                return true;
            }
        }
        false
    }

    pub fn contains_or_intersects_edge(&self, edge: &Edge) -> bool {
        self.contains_edge(edge) || self.intersects_edge(edge)
    }

    pub fn contains_bounds(&self, other: &Bounds) -> bool {
        self.contains(&other.sw) && self.contains(&other.ne)
    }

    /// Axis-aligned overlap, boundary-touching included.
    pub fn intersects_bounds(&self, other: &Bounds) -> bool {
        self.sw.lat <= other.ne.lat
            && self.ne.lat >= other.sw.lat
            && self.sw.lon <= other.ne.lon
            && self.ne.lon >= other.sw.lon
    }

    /// Circle lies entirely inside: its center is contained and every
    /// boundary side keeps at least the radius away from the center.
    pub fn contains_circle(&self, circle: &Circle) -> bool {
        let center = circle.center.point();
        if !self.contains(&center) {
            return false;
        }
        let corners = [self.nw(), self.ne, self.se(), self.sw];
        (0..4).all(|i| {
            point_segment_distance(center, corners[i], corners[(i + 1) % 4]) >= circle.radius
        })
    }

    /// The circle boundary crosses the rectangle boundary: some side has
    /// points both inside and outside the circle. A bounds entirely inside
    /// a large circle does not intersect it.
    pub fn intersects_circle(&self, circle: &Circle) -> bool {
        let center = circle.center.point();
        let corners = [self.nw(), self.ne, self.se(), self.sw];
        let dist_to = |p: Point| geo::distance(center.lat, center.lon, p.lat, p.lon);
        for i in 0..4 {
            let a = corners[i];
            let b = corners[(i + 1) % 4];
            let min = point_segment_distance(center, a, b);
            let max = dist_to(a).max(dist_to(b));
            if min <= circle.radius && max >= circle.radius {
                return true;
            }
        }
        false
    }

    pub fn contains_or_intersects_circle(&self, circle: &Circle) -> bool {
        self.contains_circle(circle) || self.intersects_circle(circle)
    }

    /// Epsilon-inflated copy: each dimension grows by `factor` of its extent
    /// on each side. The quad-tree uses this for boundary-tolerant tests.
    pub fn inflate(&self, factor: f64) -> Bounds {
        let dlat = self.height() * factor;
        let dlon = self.width() * factor;
        Bounds::new(
            Point::new(self.sw.lat - dlat, self.sw.lon - dlon),
            Point::new(self.ne.lat + dlat, self.ne.lon + dlon),
        )
    }
}

/// Buffered quadrilateral around a road edge.
///
/// Corners are ordered v1-left, v2-left, v2-right, v1-right so consecutive
/// corners form the four boundary half-planes tested by [`Area::outside_edge`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Area {
    pub corners: [Point; 4],
}

impl Area {
    pub fn new(c0: Point, c1: Point, c2: Point, c3: Point) -> Self {
        Self {
            corners: [c0, c1, c2, c3],
        }
    }

    /// Build the buffer around the segment `p1`-`p2`.
    ///
    /// `extension` lengthens the rectangle beyond each endpoint. Fails when
    /// `width` is non-positive or `extension` is negative.
    pub fn from_segment(p1: &Location, p2: &Location, width: f64, extension: f64) -> Result<Area> {
        if width <= 0.0 {
            return Err(SanitizeError::invalid_shape(format!(
                "area width must be positive, got {}",
                width
            )));
        }
        if extension < 0.0 {
            return Err(SanitizeError::invalid_shape(format!(
                "area extension must be non-negative, got {}",
                extension
            )));
        }

        let theta = p1.bearing_to(p2);
        let base1 = if extension > 0.0 {
            p1.project_position((theta + 180.0) % 360.0, extension)
        } else {
            *p1
        };
        let base2 = if extension > 0.0 {
            p2.project_position(theta, extension)
        } else {
            *p2
        };

        let half = width / 2.0;
        let left = (theta + 270.0) % 360.0;
        let right = (theta + 90.0) % 360.0;
        Ok(Area::new(
            base1.project_position(left, half).point(),
            base2.project_position(left, half).point(),
            base2.project_position(right, half).point(),
            base1.project_position(right, half).point(),
        ))
    }

    /// Whether `p` falls strictly on the outer side of boundary half-plane
    /// `index` (the polygon side from corner `index` to the next corner).
    /// Indices outside `[0, 3]` report `false`.
    pub fn outside_edge(&self, index: i32, p: &Point) -> bool {
        if !(0..4).contains(&index) {
            return false;
        }
        let i = index as usize;
        let a = self.corners[i];
        let b = self.corners[(i + 1) % 4];
        let centroid = self.centroid();

        let side_p = cross(a, b, *p);
        let side_in = cross(a, b, centroid);
        side_p * side_in < 0.0
    }

    /// A point is inside iff it is not outside any of the four sides.
    pub fn contains(&self, p: &Point) -> bool {
        (0..4).all(|i| !self.outside_edge(i, p))
    }

    pub fn centroid(&self) -> Point {
        let lat = self.corners.iter().map(|c| c.lat).sum::<f64>() / 4.0;
        let lon = self.corners.iter().map(|c| c.lon).sum::<f64>() / 4.0;
        Point::new(lat, lon)
    }

    pub fn bounding_box(&self) -> Bounds {
        let mut min_lat = f64::MAX;
        let mut max_lat = f64::MIN;
        let mut min_lon = f64::MAX;
        let mut max_lon = f64::MIN;
        for c in &self.corners {
            min_lat = min_lat.min(c.lat);
            max_lat = max_lat.max(c.lat);
            min_lon = min_lon.min(c.lon);
            max_lon = max_lon.max(c.lon);
        }
        Bounds::new(Point::new(min_lat, min_lon), Point::new(max_lat, max_lon))
    }

    /// Bounding-box overlap with `bounds`.
    pub fn touches(&self, bounds: &Bounds) -> bool {
        self.bounding_box().intersects_bounds(bounds)
    }
}

/// Circle defined by a center location and a radius in meters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Circle {
    pub center: Location,
    pub radius: f64,
}

impl Circle {
    pub fn new(center: Location, radius: f64) -> Self {
        Self { center, radius }
    }

    /// Strict containment: a zero-radius circle contains no point.
    pub fn contains(&self, loc: &Location) -> bool {
        self.center.distance_to_haversine(loc) < self.radius
    }

    /// Circle-circle containment combines center distance and radii.
    pub fn contains_circle(&self, other: &Circle) -> bool {
        self.center.distance_to_haversine(&other.center) <= self.radius + other.radius
    }

    pub fn bounding_box(&self) -> Bounds {
        let dlat = (self.radius / EARTH_RADIUS_M).to_degrees();
        let dlon = dlat / self.center.lat.to_radians().cos().abs().max(1e-12);
        Bounds::new(
            Point::new(self.center.lat - dlat, self.center.lon - dlon),
            Point::new(self.center.lat + dlat, self.center.lon + dlon),
        )
    }

    pub fn touches(&self, bounds: &Bounds) -> bool {
        self.bounding_box().intersects_bounds(bounds)
    }
}

/// One cell of a regular mesh over a [`Bounds`], anchored at the northwest
/// corner. Each cell stores its own four corners.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grid {
    pub bounds: Bounds,
    pub row: u32,
    pub col: u32,
    pub nw: Location,
    pub ne: Location,
    pub sw: Location,
    pub se: Location,
}

impl Grid {
    /// Partition `bounds` into cells of side `cell_size_m` meters, walking
    /// south and east from the northwest corner. Row/column counts round up
    /// so the mesh covers the whole bounds with contiguous, disjoint cells.
    pub fn build_grid(bounds: &Bounds, cell_size_m: f64) -> Result<Vec<Grid>> {
        if cell_size_m <= 0.0 {
            return Err(SanitizeError::config(format!(
                "grid cell size must be positive, got {}",
                cell_size_m
            )));
        }

        let nw = Location::new(bounds.ne.lat, bounds.sw.lon);
        let ne = Location::new(bounds.ne.lat, bounds.ne.lon);
        let sw = Location::new(bounds.sw.lat, bounds.sw.lon);
        let height_m = nw.distance_to_haversine(&sw);
        let width_m = nw.distance_to_haversine(&ne);

        let rows = (height_m / cell_size_m).ceil().max(1.0) as u32;
        let cols = (width_m / cell_size_m).ceil().max(1.0) as u32;

        let mut grids = Vec::with_capacity((rows * cols) as usize);
        for r in 0..rows {
            let row_anchor = nw.project_position(180.0, r as f64 * cell_size_m);
            for c in 0..cols {
                let cell_nw = row_anchor.project_position(90.0, c as f64 * cell_size_m);
                let cell_ne = cell_nw.project_position(90.0, cell_size_m);
                let cell_sw = cell_nw.project_position(180.0, cell_size_m);
                let cell_se = cell_sw.project_position(90.0, cell_size_m);
                grids.push(Grid {
                    bounds: Bounds::new(
                        Point::new(cell_sw.lat, cell_sw.lon),
                        Point::new(cell_ne.lat, cell_ne.lon),
                    ),
                    row: r,
                    col: c,
                    nw: cell_nw,
                    ne: cell_ne,
                    sw: cell_sw,
                    se: cell_se,
                });
            }
        }
        Ok(grids)
    }

    pub fn contains(&self, loc: &Location) -> bool {
        self.bounds.contains_location(loc)
    }

    pub fn touches(&self, bounds: &Bounds) -> bool {
        self.bounds.intersects_bounds(bounds)
    }
}

/// The closed set of geometric kinds the quad-tree stores.
///
/// Heavyweight variants are shared via `Arc`: inserting an entity into the
/// index references it, the index never copies the underlying geometry.
#[derive(Debug, Clone)]
pub enum Entity {
    Location(Location),
    Edge(Arc<Edge>),
    Area(Arc<Area>),
    Circle(Circle),
    Bounds(Bounds),
    Grid(Arc<Grid>),
}

impl Entity {
    pub fn get_type(&self) -> &'static str {
        match self {
            Entity::Location(_) => "location",
            Entity::Edge(_) => "edge",
            Entity::Area(_) => "area",
            Entity::Circle(_) => "circle",
            Entity::Bounds(_) => "bounds",
            Entity::Grid(_) => "grid",
        }
    }

    /// Whether this entity's extent overlaps `bounds`.
    pub fn touches(&self, bounds: &Bounds) -> bool {
        match self {
            Entity::Location(loc) => bounds.contains_location(loc),
            Entity::Edge(edge) => edge.bounding_box().intersects_bounds(bounds),
            Entity::Area(area) => area.touches(bounds),
            Entity::Circle(circle) => circle.touches(bounds),
            Entity::Bounds(b) => b.intersects_bounds(bounds),
            Entity::Grid(grid) => grid.touches(bounds),
        }
    }
}

impl PartialEq for Entity {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Entity::Location(a), Entity::Location(b)) => a == b,
            (Entity::Edge(a), Entity::Edge(b)) => a.uid == b.uid,
            (Entity::Area(a), Entity::Area(b)) => a == b,
            (Entity::Circle(a), Entity::Circle(b)) => a == b,
            (Entity::Bounds(a), Entity::Bounds(b)) => a == b,
            (Entity::Grid(a), Entity::Grid(b)) => a.row == b.row && a.col == b.col && a.bounds == b.bounds,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{Edge, WayType};

    // Pat Head Summitt St, used across the original reference scenarios.
    fn summitt_edge() -> Edge {
        Edge::explicit(
            1,
            Location::with_uid(35.952500, -83.932434, 1),
            Location::with_uid(35.948878, -83.928081, 2),
            WayType::Secondary,
        )
    }

    fn campus_bounds() -> Bounds {
        Bounds::new(
            Point::new(35.951853, -83.932832),
            Point::new(35.953642, -83.929975),
        )
    }

    #[test]
    fn test_area_construction_checks() {
        let e = summitt_edge();
        assert!(Area::from_segment(&e.p1, &e.p2, 0.0, 10.0).is_err());
        assert!(Area::from_segment(&e.p1, &e.p2, -1.0, 10.0).is_err());
        assert!(Area::from_segment(&e.p1, &e.p2, 10.0, 5.0).is_ok());
    }

    #[test]
    fn test_area_dimensions() {
        let e = summitt_edge();
        let area = Area::from_segment(&e.p1, &e.p2, 17.0, 0.0).unwrap();
        let c = &area.corners;

        let long_side = crate::geo::distance_haversine(c[0].lat, c[0].lon, c[1].lat, c[1].lon);
        let short_side = crate::geo::distance_haversine(c[0].lat, c[0].lon, c[3].lat, c[3].lon);
        assert!((long_side - e.length_haversine()).abs() < 0.01);
        assert!((short_side - 17.0).abs() < 0.01);
    }

    #[test]
    fn test_area_containment() {
        let e = summitt_edge();
        let area = Area::from_segment(&e.p1, &e.p2, 17.0, 0.0).unwrap();

        // Midpoint on the road is inside; a far point is not.
        let midsum = Point::new(35.950689, -83.930257);
        assert!(area.contains(&midsum));
        assert!(!area.contains(&Point::new(90.0, 180.0)));

        // Just beyond the v1 end, inside only once the area is extended.
        let past_end = Point::new(35.952511, -83.932457);
        assert!(!area.contains(&past_end));
        let extended = Area::from_segment(&e.p1, &e.p2, 17.0, 10.0).unwrap();
        assert!(extended.contains(&past_end));
    }

    #[test]
    fn test_area_outside_edge_indices() {
        let e = summitt_edge();
        let area = Area::from_segment(&e.p1, &e.p2, 17.0, 0.0).unwrap();
        let inside = area.centroid();
        assert!(!area.outside_edge(-1, &inside));
        assert!(!area.outside_edge(20, &inside));
        // A point outside exactly one half-plane is outside that one only.
        let out = Point::new(90.0, 180.0);
        let outside_count = (0..4).filter(|i| area.outside_edge(*i, &out)).count();
        assert!(outside_count >= 1);
        assert!(!area.contains(&out));
    }

    #[test]
    fn test_circle_containment() {
        let cage = Location::new(35.951250, -83.931861);
        let c1 = Circle::new(cage, 10.0);
        let c2 = Circle::new(cage, 0.0);
        let c3 = Circle::new(cage, -1.0);
        let inside = Location::new(35.951295, -83.931768);
        let far = Location::new(90.0, 180.0);

        assert!(c1.contains(&inside));
        assert!(!c1.contains(&far));
        // Zero-radius circle contains no point, but circle-circle
        // containment combines both radii.
        assert!(!c2.contains(&inside));
        assert!(c2.contains_circle(&c1));
        assert!(c1.contains_circle(&c2));
        assert!(!c3.contains_circle(&c2));
    }

    #[test]
    fn test_bounds_point_and_edge() {
        let b = campus_bounds();
        assert!(b.contains(&b.sw));
        assert!(b.contains(&b.ne));
        assert!(!b.contains(&Point::new(90.0, 180.0)));

        let phss = summitt_edge();
        // Summitt St crosses the boundary: not contained, but intersecting.
        assert!(!b.contains_edge(&phss));
        assert!(b.intersects_edge(&phss));
        assert!(b.contains_or_intersects_edge(&phss));

        // Andy Holt East lies fully inside: contained, not intersecting.
        let ahe = Edge::explicit(
            3,
            Location::with_uid(35.953302, -83.931344, 4),
            Location::with_uid(35.952500, -83.932434, 1),
            WayType::Secondary,
        );
        assert!(b.contains_edge(&ahe));
        assert!(!b.intersects_edge(&ahe));
    }

    #[test]
    fn test_bounds_circle_relationships() {
        let b = campus_bounds();
        let inside = Location::new(35.952670, -83.931534);
        let small = Circle::new(inside, 10.0);
        // The northern side is about 127 m away, so a 200 m circle
        // crosses it while staying short of the far corners.
        let medium = Circle::new(inside, 200.0);
        let huge = Circle::new(inside, 1200.0);

        assert!(b.contains_circle(&small));
        assert!(!b.contains_circle(&medium));
        assert!(b.intersects_circle(&medium));
        // Bounds entirely inside the circle: boundary never crosses.
        assert!(!b.intersects_circle(&huge));
        assert!(!b.contains_or_intersects_circle(&huge));
        // All three still touch via bounding boxes.
        assert!(small.touches(&b));
        assert!(medium.touches(&b));
        assert!(huge.touches(&b));
    }

    #[test]
    fn test_bounds_midpoints() {
        let b = campus_bounds();
        assert_eq!(b.center().lat, b.east_midpoint().lat);
        assert_eq!(b.center().lat, b.west_midpoint().lat);
        assert_eq!(b.center().lon, b.north_midpoint().lon);
        assert_eq!(b.center().lon, b.south_midpoint().lon);
        assert!(b.width() > 0.0 && b.height() > 0.0);
    }

    #[test]
    fn test_grid_build() {
        let b = campus_bounds();
        let grids = Grid::build_grid(&b, 10.0).unwrap();
        assert!(!grids.is_empty());

        // Every cell is cell_size on a side and touches the parent bounds.
        for g in &grids {
            let top = g.nw.distance_to_haversine(&g.ne);
            let side = g.nw.distance_to_haversine(&g.sw);
            assert!((top - 10.0).abs() < 0.01);
            assert!((side - 10.0).abs() < 0.01);
            assert!(g.touches(&b));
        }

        // A probe point lands in exactly one cell.
        let probe = Location::new(35.952670, -83.931534);
        let holding = grids.iter().filter(|g| g.contains(&probe)).count();
        assert_eq!(holding, 1);

        assert!(Grid::build_grid(&b, 0.0).is_err());
        assert!(Grid::build_grid(&b, -5.0).is_err());
    }

    #[test]
    fn test_entity_types_and_touches() {
        let b = campus_bounds();
        let inside = Location::new(35.952670, -83.931534);
        let phss = Arc::new(summitt_edge());
        let area = Arc::new(Area::from_segment(&phss.p1, &phss.p2, 17.0, 0.0).unwrap());
        let circle = Circle::new(inside, 10.0);

        assert_eq!(Entity::Location(inside).get_type(), "location");
        assert_eq!(Entity::Edge(phss.clone()).get_type(), "edge");
        assert_eq!(Entity::Area(area.clone()).get_type(), "area");
        assert_eq!(Entity::Circle(circle).get_type(), "circle");
        assert_eq!(Entity::Bounds(b).get_type(), "bounds");

        assert!(Entity::Location(inside).touches(&b));
        assert!(Entity::Edge(phss).touches(&b));
        assert!(Entity::Area(area).touches(&b));
        assert!(Entity::Circle(circle).touches(&b));
    }
}
