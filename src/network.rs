//! Road network model: vertices, edges, and way classifications.
//!
//! Vertices live in an arena keyed by their unique id; edges reference their
//! endpoint vertices by id and carry copies of the endpoint coordinates so
//! edge geometry never needs a network lookup. The network is built once by
//! the ingestion layer and treated as immutable while trajectories are
//! being fit against it.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SanitizeError};
use crate::geo::{Location, Point};
use crate::shapes::{self, Area, Bounds};

/// Road classification with an associated physical width in meters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WayType {
    Motorway,
    Trunk,
    Primary,
    Secondary,
    Tertiary,
    Residential,
    Service,
    Other,
}

impl WayType {
    /// Physical width of a road of this classification, in meters.
    pub fn width(&self) -> f64 {
        match self {
            WayType::Motorway => 30.0,
            WayType::Trunk => 22.0,
            WayType::Primary => 20.0,
            WayType::Secondary => 17.0,
            WayType::Tertiary => 12.0,
            WayType::Residential => 10.0,
            WayType::Service => 8.0,
            WayType::Other => 15.0,
        }
    }
}

/// A road-network junction: a location plus its incident edge ids.
#[derive(Debug, Clone)]
pub struct Vertex {
    pub uid: u64,
    pub location: Location,
    incident: HashSet<u64>,
    outgoing: HashSet<u64>,
}

impl Vertex {
    pub fn new(lat: f64, lon: f64, uid: u64) -> Self {
        Self {
            uid,
            location: Location::with_uid(lat, lon, uid),
            incident: HashSet::new(),
            outgoing: HashSet::new(),
        }
    }

    /// Attach an incident edge. Idempotent: re-attaching an edge already
    /// present reports failure and changes nothing.
    pub fn add_edge(&mut self, edge_uid: u64, outgoing: bool) -> bool {
        let added = self.incident.insert(edge_uid);
        if added && outgoing {
            self.outgoing.insert(edge_uid);
        }
        added
    }

    /// Attach a batch of incident edges; true only when all were new.
    pub fn add_edges<I>(&mut self, edges: I) -> bool
    where
        I: IntoIterator<Item = (u64, bool)>,
    {
        let mut all_new = true;
        for (uid, outgoing) in edges {
            all_new &= self.add_edge(uid, outgoing);
        }
        all_new
    }

    /// Count of all incident edges, incoming and outgoing.
    pub fn degree(&self) -> usize {
        self.incident.len()
    }

    /// Count of directed edges leaving this vertex.
    pub fn out_degree(&self) -> usize {
        self.outgoing.len()
    }

    pub fn incident_edges(&self) -> impl Iterator<Item = &u64> {
        self.incident.iter()
    }
}

/// A directed road segment between two vertices.
///
/// Endpoint coordinates are copied in at construction; `v1`/`v2` keep the
/// vertex arena ids for degree lookups. Explicit edges come from the road
/// network; implicit edges are inferred between fit anchors during map
/// matching.
#[derive(Debug, Clone)]
pub struct Edge {
    pub uid: u64,
    pub p1: Location,
    pub p2: Location,
    pub way_type: WayType,
    explicit: bool,
}

impl Edge {
    pub fn explicit(uid: u64, p1: Location, p2: Location, way_type: WayType) -> Self {
        Self {
            uid,
            p1,
            p2,
            way_type,
            explicit: true,
        }
    }

    pub fn implicit(uid: u64, p1: Location, p2: Location) -> Self {
        Self {
            uid,
            p1,
            p2,
            way_type: WayType::Other,
            explicit: false,
        }
    }

    pub fn is_explicit(&self) -> bool {
        self.explicit
    }

    pub fn is_implicit(&self) -> bool {
        !self.explicit
    }

    /// Width of the road this edge models, from its way type.
    pub fn width(&self) -> f64 {
        self.way_type.width()
    }

    /// Planar (equirectangular) length in meters. Zero-length edges are
    /// legal and yield 0.
    pub fn length(&self) -> f64 {
        self.p1.distance_to(&self.p2)
    }

    /// Haversine length in meters.
    pub fn length_haversine(&self) -> f64 {
        self.p1.distance_to_haversine(&self.p2)
    }

    pub fn dlatitude(&self) -> f64 {
        self.p2.lat - self.p1.lat
    }

    pub fn dlongitude(&self) -> f64 {
        self.p2.lon - self.p1.lon
    }

    /// Initial bearing from v1 toward v2 in `[0, 360)`.
    pub fn bearing(&self) -> f64 {
        self.p1.bearing_to(&self.p2)
    }

    /// Perpendicular distance in meters from `loc` to this segment,
    /// clamped to the endpoints.
    pub fn distance_from_point(&self, loc: &Location) -> f64 {
        shapes::point_segment_distance(loc.point(), self.p1.point(), self.p2.point())
    }

    /// Segment-intersection test against another edge.
    pub fn intersects(&self, other: &Edge) -> bool {
        shapes::segments_intersect(
            self.p1.point(),
            self.p2.point(),
            other.p1.point(),
            other.p2.point(),
        )
    }

    /// Segment-intersection test against a literal 4-coordinate segment.
    pub fn intersects_coords(&self, lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> bool {
        shapes::segments_intersect(
            self.p1.point(),
            self.p2.point(),
            Point::new(lat1, lon1),
            Point::new(lat2, lon2),
        )
    }

    /// Buffer this edge into an [`Area`] using its way-type width.
    pub fn to_area(&self) -> Result<Area> {
        Area::from_segment(&self.p1, &self.p2, self.width(), 0.0)
    }

    /// Buffer with the way-type width and a forward/backward extension.
    pub fn to_area_extended(&self, extension: f64) -> Result<Area> {
        Area::from_segment(&self.p1, &self.p2, self.width(), extension)
    }

    /// Buffer with an explicit width and extension.
    pub fn to_area_custom(&self, width: f64, extension: f64) -> Result<Area> {
        Area::from_segment(&self.p1, &self.p2, width, extension)
    }

    pub fn bounding_box(&self) -> Bounds {
        Bounds::new(
            Point::new(self.p1.lat.min(self.p2.lat), self.p1.lon.min(self.p2.lon)),
            Point::new(self.p1.lat.max(self.p2.lat), self.p1.lon.max(self.p2.lon)),
        )
    }

    /// Id of the endpoint vertex nearer to `loc`.
    pub fn nearer_vertex(&self, loc: &Location) -> u64 {
        if loc.distance_to(&self.p1) <= loc.distance_to(&self.p2) {
            self.p1.uid
        } else {
            self.p2.uid
        }
    }
}

impl PartialEq for Edge {
    fn eq(&self, other: &Self) -> bool {
        self.uid == other.uid
    }
}

/// Vertex arena plus the explicit edge set of a road network.
#[derive(Debug, Default)]
pub struct RoadNetwork {
    vertices: HashMap<u64, Vertex>,
    edges: Vec<Arc<Edge>>,
}

impl RoadNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a vertex, keeping the first definition when the id repeats (the
    /// ingestion layer may reference a vertex from several edge records).
    pub fn add_vertex(&mut self, vertex: Vertex) -> &Vertex {
        self.vertices.entry(vertex.uid).or_insert(vertex)
    }

    pub fn vertex(&self, uid: u64) -> Option<&Vertex> {
        self.vertices.get(&uid)
    }

    /// Out-degree of a vertex, 0 when unknown.
    pub fn out_degree(&self, uid: u64) -> usize {
        self.vertices.get(&uid).map_or(0, Vertex::out_degree)
    }

    /// Create an explicit edge between two known vertices, attaching it to
    /// both (outgoing on `v1`).
    pub fn add_edge(&mut self, uid: u64, v1: u64, v2: u64, way_type: WayType) -> Result<Arc<Edge>> {
        let p1 = self
            .vertices
            .get(&v1)
            .map(|v| v.location)
            .ok_or_else(|| SanitizeError::network(format!("unknown vertex {}", v1)))?;
        let p2 = self
            .vertices
            .get(&v2)
            .map(|v| v.location)
            .ok_or_else(|| SanitizeError::network(format!("unknown vertex {}", v2)))?;

        let edge = Arc::new(Edge::explicit(uid, p1, p2, way_type));
        if let Some(v) = self.vertices.get_mut(&v1) {
            v.add_edge(uid, true);
        }
        if let Some(v) = self.vertices.get_mut(&v2) {
            v.add_edge(uid, false);
        }
        self.edges.push(edge.clone());
        debug!("added edge {} ({} -> {})", uid, v1, v2);
        Ok(edge)
    }

    pub fn edges(&self) -> &[Arc<Edge>] {
        &self.edges
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }
}
