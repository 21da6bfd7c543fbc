//! Interval marking and privacy-interval expansion.
//!
//! The interval marker stamps detector output onto trajectory points.
//! The privacy-interval finder then grows each maximal critical region
//! outward in both directions, accumulating distance and intersection
//! degree from the region boundary, until a stopping rule fires or the
//! walk reaches the trajectory boundary, another critical region, or an
//! already-produced privacy interval.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::geo::distance_manhattan;
use crate::trajectory::{Interval, Trajectory};

/// Sets `is_critical` on every point covered by any given interval.
///
/// Marking is monotone; points already critical stay critical.
pub struct IntervalMarker {
    intervals: Vec<Interval>,
}

impl IntervalMarker {
    /// Flattens any number of detector interval lists into one marker.
    pub fn new<I>(lists: I) -> Self
    where
        I: IntoIterator<Item = Vec<Interval>>,
    {
        Self {
            intervals: lists.into_iter().flatten().collect(),
        }
    }

    pub fn mark_trajectory(&self, trajectory: &mut Trajectory) {
        for interval in &self.intervals {
            for index in interval.left()..interval.right().min(trajectory.len()) {
                trajectory[index].is_critical = true;
            }
        }
    }
}

/// Sets `is_private` from a privacy-interval list; mechanics identical to
/// [`IntervalMarker`].
pub struct PrivacyIntervalMarker {
    intervals: Vec<Interval>,
}

impl PrivacyIntervalMarker {
    pub fn new<I>(lists: I) -> Self
    where
        I: IntoIterator<Item = Vec<Interval>>,
    {
        Self {
            intervals: lists.into_iter().flatten().collect(),
        }
    }

    pub fn mark_trajectory(&self, trajectory: &mut Trajectory) {
        for interval in &self.intervals {
            for index in interval.left()..interval.right().min(trajectory.len()) {
                trajectory[index].is_private = true;
            }
        }
    }
}

/// How the expansion rules combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StoppingMode {
    /// Stop at the first point where any single threshold is exceeded.
    Any,
    /// Stop at the first point where every threshold has been exceeded,
    /// so the walk satisfies the smallest remaining requirement last.
    Min,
}

/// Per-direction expansion limits.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ExpansionThresholds {
    /// Cumulative haversine path distance, in meters.
    pub max_direct_distance: f64,
    /// Cumulative axis-aligned path distance, in meters.
    pub max_manhattan_distance: f64,
    /// Cumulative intersection out-degree crossed since the boundary.
    pub max_out_degree: u32,
}

impl Default for ExpansionThresholds {
    fn default() -> Self {
        Self {
            max_direct_distance: 1_000.0,
            max_manhattan_distance: 1_300.0,
            max_out_degree: 4,
        }
    }
}

/// Configuration for [`PrivacyIntervalFinder`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PrivacyIntervalConfig {
    pub forward: ExpansionThresholds,
    pub backward: ExpansionThresholds,
    pub mode: StoppingMode,
}

impl Default for PrivacyIntervalConfig {
    fn default() -> Self {
        Self {
            forward: ExpansionThresholds::default(),
            backward: ExpansionThresholds::default(),
            mode: StoppingMode::Any,
        }
    }
}

#[derive(Clone, Copy)]
enum Direction {
    Forward,
    Backward,
}

impl Direction {
    fn label(self, reason: &str) -> String {
        match self {
            Direction::Forward => format!("forward:{}", reason),
            Direction::Backward => format!("backward:{}", reason),
        }
    }
}

/// Expands critical regions into labeled privacy intervals.
///
/// For every maximal run of critical points, the finder walks outward
/// from each boundary, one point at a time. The walk accumulates the
/// haversine and Manhattan path distance and the out-degree of every
/// intersection crossed (an intersection is crossed when the fitted edge
/// changes). The stopping point itself is excluded from the produced
/// interval. Labels record the direction and the stopping reason:
/// "ci" for reaching another critical region, "pi" for reaching the
/// trajectory boundary or an earlier privacy interval, "max_dist",
/// "max_out_degree", and "min" for threshold rules.
pub struct PrivacyIntervalFinder {
    config: PrivacyIntervalConfig,
}

impl PrivacyIntervalFinder {
    pub fn new(config: PrivacyIntervalConfig) -> Self {
        Self { config }
    }

    /// Privacy intervals in discovery order: critical regions left to
    /// right, forward expansion before backward. Zero-length expansions
    /// are suppressed.
    pub fn find_intervals(&self, trajectory: &Trajectory) -> Vec<Interval> {
        let n = trajectory.len();
        if n == 0 {
            return Vec::new();
        }
        let mut covered = vec![false; n];
        let mut intervals = Vec::new();

        for (start, end) in critical_runs(trajectory) {
            if let Some(iv) = self.expand(
                trajectory,
                &covered,
                Direction::Forward,
                end,
                self.config.forward,
            ) {
                cover(&mut covered, &iv);
                intervals.push(iv);
            }
            if let Some(iv) = self.expand(
                trajectory,
                &covered,
                Direction::Backward,
                start,
                self.config.backward,
            ) {
                cover(&mut covered, &iv);
                intervals.push(iv);
            }
        }
        debug!(
            "found {} privacy intervals over {} critical regions",
            intervals.len(),
            critical_runs(trajectory).len()
        );
        intervals
    }

    /// Walk outward from a critical-region boundary. `from` is the first
    /// index past the region in the walk direction (`end` going forward,
    /// `start` going backward).
    fn expand(
        &self,
        trajectory: &Trajectory,
        covered: &[bool],
        direction: Direction,
        from: usize,
        thresholds: ExpansionThresholds,
    ) -> Option<Interval> {
        let n = trajectory.len();
        let mut direct = 0.0;
        let mut manhattan = 0.0;
        let mut degree: u64 = 0;

        // The accumulation baseline is the boundary critical point.
        let (boundary, steps): (usize, Box<dyn Iterator<Item = usize>>) = match direction {
            Direction::Forward => {
                if from >= n {
                    return None;
                }
                (from - 1, Box::new(from..n))
            }
            Direction::Backward => {
                if from == 0 {
                    return None;
                }
                (from, Box::new((0..from).rev()))
            }
        };
        let mut prev_edge = trajectory[boundary].fit_edge().map(|e| e.uid);
        let mut last = boundary;

        for i in steps {
            if trajectory[i].is_critical {
                return self.emit(direction, from, i, "ci");
            }
            if covered[i] {
                return self.emit(direction, from, i, "pi");
            }

            let a = &trajectory[last].location;
            let b = &trajectory[i].location;
            direct += a.distance_to_haversine(b);
            manhattan += distance_manhattan(a.lat, a.lon, b.lat, b.lon);
            if let Some(edge) = trajectory[i].fit_edge() {
                if prev_edge != Some(edge.uid) {
                    degree += u64::from(trajectory[i].out_degree);
                    prev_edge = Some(edge.uid);
                }
            }
            last = i;

            let dist_fired =
                direct > thresholds.max_direct_distance || manhattan > thresholds.max_manhattan_distance;
            let degree_fired = degree > u64::from(thresholds.max_out_degree);
            match self.config.mode {
                StoppingMode::Any if dist_fired => {
                    return self.emit(direction, from, i, "max_dist");
                }
                StoppingMode::Any if degree_fired => {
                    return self.emit(direction, from, i, "max_out_degree");
                }
                StoppingMode::Min
                    if direct > thresholds.max_direct_distance
                        && manhattan > thresholds.max_manhattan_distance
                        && degree_fired =>
                {
                    return self.emit(direction, from, i, "min");
                }
                _ => {}
            }
        }

        // Ran off the trajectory boundary.
        match direction {
            Direction::Forward => self.emit(direction, from, n, "pi"),
            Direction::Backward => {
                let label = direction.label("pi");
                if from == 0 {
                    None
                } else {
                    Some(Interval::new(0, from, label))
                }
            }
        }
    }

    /// Build the interval from the boundary to (excluding) the stopping
    /// point, suppressing zero-length results.
    fn emit(
        &self,
        direction: Direction,
        from: usize,
        stop: usize,
        reason: &str,
    ) -> Option<Interval> {
        let (left, right) = match direction {
            Direction::Forward => (from, stop),
            Direction::Backward => (stop + 1, from),
        };
        if left >= right {
            return None;
        }
        Some(Interval::new(left, right, direction.label(reason)))
    }
}

/// Maximal runs of critical points as half-open `(start, end)` pairs.
fn critical_runs(trajectory: &Trajectory) -> Vec<(usize, usize)> {
    let mut out = Vec::new();
    let mut start = None;
    for (i, p) in trajectory.iter().enumerate() {
        match (p.is_critical, start) {
            (true, None) => start = Some(i),
            (false, Some(s)) => {
                out.push((s, i));
                start = None;
            }
            _ => {}
        }
    }
    if let Some(s) = start {
        out.push((s, trajectory.len()));
    }
    out
}

fn cover(covered: &mut [bool], interval: &Interval) {
    for flag in covered
        .iter_mut()
        .take(interval.right())
        .skip(interval.left())
    {
        *flag = true;
    }
}
