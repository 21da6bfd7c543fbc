//! Map matching: snapping trajectory points onto road-network edges.
//!
//! Fitting runs in two passes. The explicit fitter queries the quad-tree
//! for edges near each sample and picks the closest edge whose bearing is
//! consistent with the sample's heading. The implicit fitter then bridges
//! short runs of leftover unfit points between two explicit anchors with
//! an inferred edge, so brief GPS noise or unmapped connector roads do
//! not fragment the fitted trajectory.

use std::sync::Arc;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::geo::{heading_delta, Location, Point};
use crate::network::Edge;
use crate::quad::Quad;
use crate::shapes::Entity;
use crate::trajectory::{FitState, Trajectory};

/// Tuning for the explicit map fitter.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MapFitterConfig {
    /// Scale applied to each candidate edge's road width when buffering
    /// it into a match area.
    pub area_scale: f64,
    /// Forward/backward extension of the match area, in meters, so points
    /// just past an edge endpoint still match.
    pub area_extension: f64,
    /// Largest tolerated difference, in degrees, between a sample heading
    /// and the candidate edge bearing (in either direction of travel).
    pub heading_tolerance: f64,
}

impl Default for MapFitterConfig {
    fn default() -> Self {
        Self {
            area_scale: 1.0,
            area_extension: 5.0,
            heading_tolerance: 30.0,
        }
    }
}

/// Snaps trajectory points onto explicit road-network edges using a
/// quad-tree index.
pub struct MapFitter<'a> {
    quad: &'a Quad,
    config: MapFitterConfig,
}

impl<'a> MapFitter<'a> {
    pub fn new(quad: &'a Quad, config: MapFitterConfig) -> Self {
        Self { quad, config }
    }

    /// Fit every point of `trajectory` that a candidate edge accepts.
    /// Points with no acceptable candidate stay unfit.
    pub fn fit(&self, trajectory: &mut Trajectory) {
        let mut n_fit = 0usize;
        for point in trajectory.iter_mut() {
            if let Some(edge) = self.best_edge(point.location.point(), point.heading) {
                point.fit = FitState::Explicit(edge);
                n_fit += 1;
            }
        }
        debug!("explicitly fit {} of {} points", n_fit, trajectory.len());
    }

    fn best_edge(&self, point: Point, heading: f64) -> Option<Arc<Edge>> {
        let mut best: Option<(f64, Arc<Edge>)> = None;
        for entity in self.quad.retrieve_elements(point) {
            let edge = match entity {
                Entity::Edge(e) => e,
                _ => continue,
            };
            if !self.accepts(&edge, point, heading) {
                continue;
            }
            let d = edge.distance_from_point(&Location::new(point.lat, point.lon));
            match &best {
                Some((best_d, _)) if *best_d <= d => {}
                _ => best = Some((d, edge)),
            }
        }
        best.map(|(_, e)| e)
    }

    fn accepts(&self, edge: &Edge, point: Point, heading: f64) -> bool {
        let bearing = edge.bearing();
        let delta = heading_delta(heading, bearing).min(heading_delta(heading, bearing + 180.0));
        if delta > self.config.heading_tolerance {
            return false;
        }
        let width = edge.width() * self.config.area_scale;
        match edge.to_area_custom(width, self.config.area_extension) {
            Ok(area) => area.contains(&point),
            // Degenerate edge; fall back to a plain radius test.
            Err(_) => {
                edge.distance_from_point(&Location::new(point.lat, point.lon)) <= width / 2.0
            }
        }
    }
}

/// Tuning for the implicit map fitter.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ImplicitFitterConfig {
    /// Longest run of unfit points that may be bridged.
    pub max_gap: usize,
    /// Longest anchor-to-anchor span, in meters, that may be bridged.
    pub max_span: f64,
}

impl Default for ImplicitFitterConfig {
    fn default() -> Self {
        Self {
            max_gap: 50,
            max_span: 500.0,
        }
    }
}

/// Bridges unfit runs between explicit anchors with inferred edges.
///
/// Implicit fitting never overwrites an explicit fit.
pub struct ImplicitMapFitter {
    config: ImplicitFitterConfig,
    next_uid: u64,
}

impl ImplicitMapFitter {
    /// Implicit edge ids start in a range explicit network ids never use.
    const UID_BASE: u64 = 1 << 48;

    pub fn new(config: ImplicitFitterConfig) -> Self {
        Self {
            config,
            next_uid: Self::UID_BASE,
        }
    }

    pub fn fit(&mut self, trajectory: &mut Trajectory) {
        let n = trajectory.len();
        let mut n_fit = 0usize;
        let mut i = 0usize;
        while i < n {
            if trajectory[i].is_fit() {
                i += 1;
                continue;
            }
            // Unfit run [i, j).
            let mut j = i;
            while j < n && !trajectory[j].is_fit() {
                j += 1;
            }
            if i > 0 && j < n && j - i <= self.config.max_gap {
                let left = &trajectory[i - 1];
                let right = &trajectory[j];
                let span = left.location.distance_to(&right.location);
                if left.is_explicitly_fit() && right.is_explicitly_fit() && span <= self.config.max_span
                {
                    let edge = Arc::new(Edge::implicit(
                        self.next_uid,
                        left.location,
                        right.location,
                    ));
                    self.next_uid += 1;
                    for k in i..j {
                        trajectory[k].fit = FitState::Implicit(edge.clone());
                        n_fit += 1;
                    }
                }
            }
            i = j;
        }
        debug!("implicitly fit {} points", n_fit);
    }
}
