//! Trajectories, trajectory points, and labeled index intervals.
//!
//! A trajectory is an ordered, index-addressable sequence of GPS samples.
//! It is never re-ordered once built. Detectors and interval finders only
//! annotate points in place; the de-identifier is the only stage that
//! produces a new, shorter trajectory.

use std::ops::{Index, IndexMut};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::geo::Location;
use crate::network::Edge;

/// Map-matching state of a single trajectory point.
///
/// Explicit fits reference a road-network edge; implicit fits reference an
/// edge inferred between two explicit anchors.
#[derive(Debug, Clone, Default)]
pub enum FitState {
    #[default]
    Unfit,
    Explicit(Arc<Edge>),
    Implicit(Arc<Edge>),
}

/// One GPS sample within a trajectory.
#[derive(Debug, Clone)]
pub struct TrajectoryPoint {
    pub location: Location,
    /// Sample time in seconds.
    pub timestamp: f64,
    /// Reported heading in degrees `[0, 360)`.
    pub heading: f64,
    /// Reported speed in meters per second.
    pub speed: f64,
    /// 0-based position within the owning trajectory.
    pub index: usize,
    /// Identifier carried over from the raw record.
    pub raw_id: String,
    pub fit: FitState,
    /// Out-degree of the nearer junction of the fitted edge, attached by
    /// the intersection counter.
    pub out_degree: u32,
    pub is_critical: bool,
    pub is_private: bool,
}

impl TrajectoryPoint {
    pub fn new(
        location: Location,
        timestamp: f64,
        heading: f64,
        speed: f64,
        index: usize,
        raw_id: impl Into<String>,
    ) -> Self {
        Self {
            location,
            timestamp,
            heading,
            speed,
            index,
            raw_id: raw_id.into(),
            fit: FitState::Unfit,
            out_degree: 0,
            is_critical: false,
            is_private: false,
        }
    }

    pub fn is_fit(&self) -> bool {
        !matches!(self.fit, FitState::Unfit)
    }

    pub fn is_explicitly_fit(&self) -> bool {
        matches!(self.fit, FitState::Explicit(_))
    }

    pub fn is_implicitly_fit(&self) -> bool {
        matches!(self.fit, FitState::Implicit(_))
    }

    /// The fitted edge, explicit or implicit.
    pub fn fit_edge(&self) -> Option<&Arc<Edge>> {
        match &self.fit {
            FitState::Unfit => None,
            FitState::Explicit(e) | FitState::Implicit(e) => Some(e),
        }
    }
}

/// An ordered sequence of trajectory points.
#[derive(Debug, Clone, Default)]
pub struct Trajectory {
    points: Vec<TrajectoryPoint>,
}

impl Trajectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an already-indexed point sequence.
    pub fn from_points(points: Vec<TrajectoryPoint>) -> Self {
        Self { points }
    }

    /// Append a point, assigning it the next sequence index.
    pub fn push(&mut self, mut point: TrajectoryPoint) {
        point.index = self.points.len();
        self.points.push(point);
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TrajectoryPoint> {
        self.points.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, TrajectoryPoint> {
        self.points.iter_mut()
    }

    pub fn points(&self) -> &[TrajectoryPoint] {
        &self.points
    }

    pub fn points_mut(&mut self) -> &mut [TrajectoryPoint] {
        &mut self.points
    }
}

impl Index<usize> for Trajectory {
    type Output = TrajectoryPoint;

    fn index(&self, index: usize) -> &TrajectoryPoint {
        &self.points[index]
    }
}

impl IndexMut<usize> for Trajectory {
    fn index_mut(&mut self, index: usize) -> &mut TrajectoryPoint {
        &mut self.points[index]
    }
}

impl<'a> IntoIterator for &'a Trajectory {
    type Item = &'a TrajectoryPoint;
    type IntoIter = std::slice::Iter<'a, TrajectoryPoint>;

    fn into_iter(self) -> Self::IntoIter {
        self.points.iter()
    }
}

/// A half-open index range `[left, right)` over a trajectory, with a label
/// recording why the interval exists ("stop", "ta", "forward:ci", ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interval {
    left: usize,
    right: usize,
    aux: String,
}

impl Interval {
    pub fn new(left: usize, right: usize, aux: impl Into<String>) -> Self {
        debug_assert!(left <= right);
        Self {
            left,
            right,
            aux: aux.into(),
        }
    }

    pub fn left(&self) -> usize {
        self.left
    }

    pub fn right(&self) -> usize {
        self.right
    }

    pub fn aux(&self) -> &str {
        &self.aux
    }

    pub fn len(&self) -> usize {
        self.right - self.left
    }

    pub fn is_empty(&self) -> bool {
        self.left == self.right
    }

    /// Inclusive-left, exclusive-right containment.
    pub fn contains(&self, index: usize) -> bool {
        self.left <= index && index < self.right
    }
}
