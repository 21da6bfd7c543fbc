//! Quad-tree spatial index over geographic entities.
//!
//! The tree partitions a fixed geographic bounds into rectangular cells.
//! Each node also carries "fuzzy" bounds, inflated by 10% per side, so
//! extended entities near a cell edge are indexed by every cell they
//! plausibly serve; point entities go only to the cell that plainly
//! contains them. Insertion uses the fuzzy bounds; retrieval uses the
//! plain bounds, so a query point returns only cells it actually falls
//! in.
//!
//! Cells split when their element count exceeds a maximum. The split axis
//! follows the cell's degree aspect ratio: wide cells split their
//! longitude span, tall cells split their latitude span, and near-square
//! cells split four ways. A split along an axis is refused when it would
//! produce cells narrower than a minimum degree extent, so repeated
//! inserts at a single coordinate cannot recurse without bound.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SanitizeError};
use crate::geo::Point;
use crate::shapes::{Bounds, Entity};

/// Per-side inflation factor for fuzzy bounds.
const FUZZY_FACTOR: f64 = 0.1;

/// Tuning parameters for the quad-tree.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct QuadConfig {
    /// Element count a cell may hold before it attempts to split.
    pub max_elements: usize,
    /// Maximum node depth; the root is at level 0.
    pub max_depth: u32,
    /// Minimum cell extent, in degrees, on either axis after a split.
    pub min_cell_degrees: f64,
    /// Degree aspect ratio (width over height) at or beyond which a cell
    /// splits a single axis instead of splitting four ways.
    pub split_ratio: f64,
}

impl Default for QuadConfig {
    fn default() -> Self {
        Self {
            max_elements: 32,
            max_depth: 16,
            min_cell_degrees: 0.003,
            split_ratio: 1.2,
        }
    }
}

impl QuadConfig {
    fn validate(&self) -> Result<()> {
        if self.max_elements == 0 {
            return Err(SanitizeError::config("max_elements must be at least 1"));
        }
        if self.min_cell_degrees <= 0.0 {
            return Err(SanitizeError::config("min_cell_degrees must be positive"));
        }
        if self.split_ratio <= 1.0 {
            return Err(SanitizeError::config("split_ratio must exceed 1.0"));
        }
        Ok(())
    }
}

enum SplitAxis {
    Longitude,
    Latitude,
    Quarter,
}

/// A quad-tree node. The root owns the whole index.
#[derive(Debug)]
pub struct Quad {
    bounds: Bounds,
    fuzzy: Bounds,
    level: u32,
    config: QuadConfig,
    elements: Vec<Entity>,
    children: Vec<Quad>,
}

impl Quad {
    /// Create an empty tree over `bounds` with default tuning.
    pub fn new(bounds: Bounds) -> Self {
        let fuzzy = bounds.inflate(FUZZY_FACTOR);
        Self {
            bounds,
            fuzzy,
            level: 0,
            config: QuadConfig::default(),
            elements: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Create an empty tree over `bounds` with explicit tuning.
    pub fn with_config(bounds: Bounds, config: QuadConfig) -> Result<Self> {
        config.validate()?;
        let fuzzy = bounds.inflate(FUZZY_FACTOR);
        Ok(Self {
            bounds,
            fuzzy,
            level: 0,
            config,
            elements: Vec::new(),
            children: Vec::new(),
        })
    }

    fn child(&self, bounds: Bounds) -> Quad {
        let fuzzy = bounds.inflate(FUZZY_FACTOR);
        Quad {
            bounds,
            fuzzy,
            level: self.level + 1,
            config: self.config,
            elements: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn bounds(&self) -> &Bounds {
        &self.bounds
    }

    pub fn fuzzy_bounds(&self) -> &Bounds {
        &self.fuzzy
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Elements held directly by this node, not its descendants.
    pub fn element_count(&self) -> usize {
        self.elements.len()
    }

    /// Insert an entity. Returns false when the entity does not touch this
    /// node's fuzzy bounds and was not stored.
    ///
    /// An entity may be stored in several leaves when it touches more than
    /// one; retrieval de-duplicates.
    pub fn insert(&mut self, entity: Entity) -> bool {
        if !entity.touches(&self.fuzzy) {
            return false;
        }
        if !self.children.is_empty() {
            let mut placed = false;
            for child in &mut self.children {
                placed |= child.insert_from_parent(&entity);
            }
            if !placed {
                // Touches the parent fringe but no child; keep it here.
                self.elements.push(entity);
            }
            return true;
        }
        self.elements.push(entity);
        if self.elements.len() > self.config.max_elements {
            self.split();
        }
        true
    }

    /// Dispatch from a parent node. A zero-extent point goes only to
    /// children whose plain bounds contain it; the fuzzy fringe only
    /// duplicates extended entities near cell borders.
    fn insert_from_parent(&mut self, entity: &Entity) -> bool {
        if let Entity::Location(loc) = entity {
            if !self.bounds.contains_location(loc) {
                return false;
            }
        }
        self.insert(entity.clone())
    }

    /// All entities indexed at `point`, in insertion order, de-duplicated.
    ///
    /// Containment is tested against plain node bounds, so a point inside
    /// the fuzzy fringe but outside the root bounds returns nothing.
    pub fn retrieve_elements(&self, point: Point) -> Vec<Entity> {
        let mut found: Vec<Entity> = Vec::new();
        self.collect_elements(point, &mut found);
        found
    }

    fn collect_elements(&self, point: Point, found: &mut Vec<Entity>) {
        if !self.bounds.contains(&point) {
            return;
        }
        for entity in &self.elements {
            if !found.contains(entity) {
                found.push(entity.clone());
            }
        }
        for child in &self.children {
            child.collect_elements(point, found);
        }
    }

    /// Bounds of the leaf cell `point` falls in, or `None` when the point
    /// lies outside the root. With `fuzzy` set the leaf's inflated bounds
    /// are returned instead.
    pub fn retrieve_bounds(&self, point: Point, fuzzy: bool) -> Option<Bounds> {
        if !self.bounds.contains(&point) {
            return None;
        }
        for child in &self.children {
            if let Some(b) = child.retrieve_bounds(point, fuzzy) {
                return Some(b);
            }
        }
        // Leaf, or a boundary point that float rounding pushed between
        // child cells; either way this node's bounds answer the query.
        Some(if fuzzy { self.fuzzy } else { self.bounds })
    }

    /// Bounds of every node in the tree, optionally restricted to leaves
    /// and to nodes that hold at least one element directly.
    pub fn retrieve_all_bounds(&self, leaves_only: bool, non_empty_only: bool) -> Vec<Bounds> {
        let mut out = Vec::new();
        self.collect_bounds(leaves_only, non_empty_only, &mut out);
        out
    }

    fn collect_bounds(&self, leaves_only: bool, non_empty_only: bool, out: &mut Vec<Bounds>) {
        let keep = (!leaves_only || self.is_leaf()) && (!non_empty_only || !self.elements.is_empty());
        if keep {
            out.push(self.bounds);
        }
        for child in &self.children {
            child.collect_bounds(leaves_only, non_empty_only, out);
        }
    }

    fn split(&mut self) {
        if self.level >= self.config.max_depth {
            return;
        }
        let width = self.bounds.width();
        let height = self.bounds.height();
        if height <= 0.0 || width <= 0.0 {
            return;
        }
        let min = self.config.min_cell_degrees;
        let can_lon = width / 2.0 >= min;
        let can_lat = height / 2.0 >= min;

        let aspect = width / height;
        let preferred = if aspect >= self.config.split_ratio {
            SplitAxis::Longitude
        } else if aspect <= 1.0 / self.config.split_ratio {
            SplitAxis::Latitude
        } else {
            SplitAxis::Quarter
        };
        // Degrade toward whatever the minimum cell extent still allows.
        let axis = match preferred {
            SplitAxis::Quarter if can_lon && can_lat => SplitAxis::Quarter,
            SplitAxis::Quarter | SplitAxis::Longitude if can_lon => SplitAxis::Longitude,
            _ if can_lat => SplitAxis::Latitude,
            _ if can_lon => SplitAxis::Longitude,
            _ => return,
        };

        let sw = self.bounds.sw;
        let ne = self.bounds.ne;
        let mid_lat = (sw.lat + ne.lat) / 2.0;
        let mid_lon = (sw.lon + ne.lon) / 2.0;
        let children = match axis {
            SplitAxis::Longitude => vec![
                self.child(Bounds::new(sw, Point::new(ne.lat, mid_lon))),
                self.child(Bounds::new(Point::new(sw.lat, mid_lon), ne)),
            ],
            SplitAxis::Latitude => vec![
                self.child(Bounds::new(sw, Point::new(mid_lat, ne.lon))),
                self.child(Bounds::new(Point::new(mid_lat, sw.lon), ne)),
            ],
            SplitAxis::Quarter => vec![
                self.child(Bounds::new(sw, Point::new(mid_lat, mid_lon))),
                self.child(Bounds::new(
                    Point::new(sw.lat, mid_lon),
                    Point::new(mid_lat, ne.lon),
                )),
                self.child(Bounds::new(
                    Point::new(mid_lat, sw.lon),
                    Point::new(ne.lat, mid_lon),
                )),
                self.child(Bounds::new(Point::new(mid_lat, mid_lon), ne)),
            ],
        };
        debug!(
            "splitting level {} cell into {} children ({} elements)",
            self.level,
            children.len(),
            self.elements.len()
        );
        self.children = children;

        let elements = std::mem::take(&mut self.elements);
        for entity in elements {
            let mut placed = false;
            for child in &mut self.children {
                placed |= child.insert_from_parent(&entity);
            }
            if !placed {
                self.elements.push(entity);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::{distance_haversine, Location};
    use crate::network::{Edge, WayType};
    use std::sync::Arc;

    const TEST_POINT: Point = Point {
        lat: 35.951959,
        lon: -83.931815,
    };

    fn campus_bounds() -> Bounds {
        Bounds::new(
            Point::new(35.948378, -83.936072),
            Point::new(35.953811, -83.928997),
        )
    }

    fn edge_entity(uid: u64, lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> Entity {
        Entity::Edge(Arc::new(Edge::explicit(
            uid,
            Location::with_uid(lat1, lon1, 2 * uid),
            Location::with_uid(lat2, lon2, 2 * uid + 1),
            WayType::Secondary,
        )))
    }

    fn campus_edges() -> Vec<Entity> {
        vec![
            // Pat Head Summitt St.
            edge_entity(1, 35.952500, -83.932434, 35.948878, -83.928081),
            // Andy Holt West.
            edge_entity(2, 35.950715, -83.934971, 35.952500, -83.932434),
            // Andy Holt East.
            edge_entity(3, 35.953302, -83.931344, 35.952500, -83.932434),
            // 20th St.
            edge_entity(4, 35.952175, -83.936688, 35.950715, -83.934971),
            // UT Dr.
            edge_entity(5, 35.949813, -83.936214, 35.948272, -83.934421),
        ]
    }

    fn fill_same_point(quad: &mut Quad, n: u64) {
        for i in 0..n {
            let loc = Location::with_uid(TEST_POINT.lat, TEST_POINT.lon, i);
            assert!(quad.insert(Entity::Location(loc)));
        }
    }

    #[test]
    fn test_fuzzy_bounds() {
        let quad = Quad::new(campus_bounds());
        let f = quad.fuzzy_bounds();
        assert!((f.sw.lat - 35.9478347).abs() < 1e-9);
        assert!((f.sw.lon - (-83.9367795)).abs() < 1e-9);
        assert!((f.ne.lat - 35.9543543).abs() < 1e-9);
        assert!((f.ne.lon - (-83.9282895)).abs() < 1e-9);
    }

    #[test]
    fn test_insert_and_retrieve_without_split() {
        let mut quad = Quad::new(campus_bounds());
        for entity in campus_edges() {
            assert!(quad.insert(entity));
        }

        // No split below the element maximum, so any interior point sees
        // the full element list.
        assert_eq!(quad.retrieve_elements(TEST_POINT).len(), 5);
        assert_eq!(
            quad.retrieve_elements(Point::new(35.952500, -83.932434)).len(),
            5
        );
        assert_eq!(
            quad.retrieve_elements(Point::new(35.949098, -83.935403)).len(),
            5
        );

        // UT Dr endpoints sit in the fuzzy fringe, outside the plain
        // bounds, so retrieval there finds nothing.
        assert!(quad
            .retrieve_elements(Point::new(35.949813, -83.936214))
            .is_empty());
        assert!(quad
            .retrieve_elements(Point::new(35.948272, -83.934421))
            .is_empty());

        assert!(quad.retrieve_bounds(Point::new(90.0, 180.0), false).is_none());
        let fuzzy = quad.retrieve_bounds(TEST_POINT, true).unwrap();
        assert!((fuzzy.sw.lat - 35.9478347).abs() < 1e-6);
        assert!((fuzzy.ne.lon - (-83.9282895)).abs() < 1e-6);
    }

    #[test]
    fn test_insert_outside_fuzzy_rejected() {
        let mut quad = Quad::new(campus_bounds());
        let far = Location::new(36.2, -84.5);
        assert!(!quad.insert(Entity::Location(far)));
        assert_eq!(quad.element_count(), 0);
    }

    #[test]
    fn test_no_split_at_max_elements() {
        let mut quad = Quad::new(campus_bounds());
        fill_same_point(&mut quad, 32);

        assert!(quad.is_leaf());
        let b = quad.retrieve_bounds(TEST_POINT, false).unwrap();
        // Full cell height, roughly 605 m.
        let nw = b.nw();
        let h = distance_haversine(nw.lat, nw.lon, b.sw.lat, b.sw.lon);
        assert!((h - 604.7987).abs() < 0.01);
    }

    #[test]
    fn test_longitude_split_then_minimum_cell() {
        // The campus bounds are wide (aspect about 1.3), so the first
        // split halves the longitude span.
        let mut quad = Quad::new(campus_bounds());
        fill_same_point(&mut quad, 33);

        let b = quad.retrieve_bounds(TEST_POINT, false).unwrap();
        let nw = b.nw();
        let w = distance_haversine(nw.lat, nw.lon, b.ne.lat, b.ne.lon);
        assert!((w - 318.771477).abs() < 0.01);

        // Another insert at the same point cannot split further: both
        // axes would fall under the minimum cell extent.
        let loc = Location::with_uid(TEST_POINT.lat, TEST_POINT.lon, 33);
        assert!(quad.insert(Entity::Location(loc)));
        let b = quad.retrieve_bounds(TEST_POINT, false).unwrap();
        assert!(b.ne.lon - b.sw.lon >= 0.003);
        assert!(b.ne.lat - b.sw.lat >= 0.003);

        assert_eq!(quad.retrieve_elements(TEST_POINT).len(), 34);
        // One split total: root plus two leaves, one of them empty.
        assert_eq!(quad.retrieve_all_bounds(false, false).len(), 3);
        assert_eq!(quad.retrieve_all_bounds(true, false).len(), 2);
        assert_eq!(quad.retrieve_all_bounds(true, true).len(), 1);
    }

    #[test]
    fn test_four_way_split() {
        // Near-square bounds split into quarters.
        let bounds = Bounds::new(
            Point::new(35.948378, -83.936072),
            Point::new(35.955110, -83.928997),
        );
        let mut quad = Quad::new(bounds);
        fill_same_point(&mut quad, 33);

        assert!(!quad.is_leaf());
        assert_eq!(quad.retrieve_all_bounds(true, false).len(), 4);
        // The fill point sits about 24 m north of the split line, well
        // inside the southern cells' fuzzy fringe, but points are not
        // duplicated across leaves: exactly one leaf holds all of them.
        assert_eq!(quad.retrieve_all_bounds(true, true).len(), 1);
        assert_eq!(quad.retrieve_elements(TEST_POINT).len(), 33);
        let b = quad.retrieve_bounds(TEST_POINT, false).unwrap();
        assert!((b.width() - 0.0035375).abs() < 1e-7);
        assert!((b.height() - 0.003366).abs() < 1e-7);
    }

    #[test]
    fn test_latitude_split() {
        // Tall bounds halve the latitude span.
        let bounds = Bounds::new(
            Point::new(35.948378, -83.934448),
            Point::new(35.955110, -83.928997),
        );
        let mut quad = Quad::new(bounds);
        fill_same_point(&mut quad, 33);

        assert_eq!(quad.retrieve_all_bounds(true, false).len(), 2);
        let b = quad.retrieve_bounds(TEST_POINT, false).unwrap();
        assert!((b.width() - 0.005451).abs() < 1e-7);
        assert!((b.height() - 0.003366).abs() < 1e-7);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let cfg = QuadConfig {
            max_elements: 0,
            ..QuadConfig::default()
        };
        assert!(Quad::with_config(campus_bounds(), cfg).is_err());

        let cfg = QuadConfig {
            split_ratio: 0.9,
            ..QuadConfig::default()
        };
        assert!(Quad::with_config(campus_bounds(), cfg).is_err());
    }
}
