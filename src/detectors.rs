//! Feature detectors: labeled critical intervals over a fitted trajectory.
//!
//! Each detector scans a trajectory and produces half-open index
//! intervals labeling privacy-sensitive regions. Detectors never modify
//! points; the interval marker applies their output.

use serde::{Deserialize, Serialize};

use crate::geo::heading_delta;
use crate::network::RoadNetwork;
use crate::trajectory::{FitState, Interval, Trajectory};

/// Attaches intersection out-degrees to explicitly fit points.
///
/// For every explicitly fit point the out-degree of the nearer endpoint
/// junction of its edge is recorded on the point. The privacy-interval
/// finder's degree rule consumes these values.
pub struct IntersectionCounter<'a> {
    network: &'a RoadNetwork,
}

impl<'a> IntersectionCounter<'a> {
    pub fn new(network: &'a RoadNetwork) -> Self {
        Self { network }
    }

    pub fn count_intersections(&self, trajectory: &mut Trajectory) {
        for point in trajectory.iter_mut() {
            point.out_degree = match &point.fit {
                FitState::Explicit(edge) => {
                    let vertex = edge.nearer_vertex(&point.location);
                    self.network.out_degree(vertex) as u32
                }
                _ => 0,
            };
        }
    }
}

/// Tuning for turn-around detection.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TurnAroundConfig {
    /// Largest number of trailing points compared against each sample.
    pub window: usize,
    /// Speed, in meters per second, above which reversals are treated as
    /// ordinary driving rather than a turn-around maneuver.
    pub max_speed: f64,
    /// Largest distance, in meters, between compared samples.
    pub max_distance: f64,
    /// Smallest heading reversal, in degrees, that counts.
    pub heading_threshold: f64,
}

impl Default for TurnAroundConfig {
    fn default() -> Self {
        Self {
            window: 20,
            max_speed: 30.0,
            max_distance: 100.0,
            heading_threshold: 90.0,
        }
    }
}

/// Detects low-speed heading reversals (U-turns, driveway turns).
pub struct TurnAroundDetector {
    config: TurnAroundConfig,
}

impl TurnAroundDetector {
    pub fn new(config: TurnAroundConfig) -> Self {
        Self { config }
    }

    /// One maximal interval per detected event, labeled "ta_fit" when the
    /// interval's first point is map-fit and "ta" otherwise.
    pub fn find_turn_arounds(&self, trajectory: &Trajectory) -> Vec<Interval> {
        let n = trajectory.len();
        let mut flagged = vec![false; n];

        for i in 1..n {
            let pi = &trajectory[i];
            if pi.speed > self.config.max_speed {
                continue;
            }
            let lo = i.saturating_sub(self.config.window);
            for j in (lo..i).rev() {
                let pj = &trajectory[j];
                if pi.location.distance_to(&pj.location) > self.config.max_distance {
                    break;
                }
                if pj.speed > self.config.max_speed {
                    continue;
                }
                if heading_delta(pi.heading, pj.heading) > self.config.heading_threshold {
                    for f in flagged.iter_mut().take(i + 1).skip(j) {
                        *f = true;
                    }
                }
            }
        }

        runs(&flagged)
            .into_iter()
            .map(|(left, right)| {
                let aux = if trajectory[left].is_fit() {
                    "ta_fit"
                } else {
                    "ta"
                };
                Interval::new(left, right, aux)
            })
            .collect()
    }
}

/// Tuning for stop detection.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct StopConfig {
    /// Speed, in meters per second, at or below which a point counts as
    /// stopped.
    pub max_speed: f64,
    /// Shortest stopped duration, in seconds, worth reporting.
    pub min_duration: f64,
    /// Largest distance, in meters, a "stopped" run may drift.
    pub max_distance: f64,
}

impl Default for StopConfig {
    fn default() -> Self {
        Self {
            max_speed: 2.5,
            min_duration: 120.0,
            max_distance: 50.0,
        }
    }
}

/// Detects maximal low-speed runs held long enough to be a stop.
pub struct StopDetector {
    config: StopConfig,
}

impl StopDetector {
    pub fn new(config: StopConfig) -> Self {
        Self { config }
    }

    pub fn find_stops(&self, trajectory: &Trajectory) -> Vec<Interval> {
        let n = trajectory.len();
        let mut intervals = Vec::new();
        let mut i = 0usize;
        while i < n {
            if trajectory[i].speed > self.config.max_speed {
                i += 1;
                continue;
            }
            // Maximal low-speed run [i, j) within the drift limit.
            let mut j = i + 1;
            let mut drift = 0.0;
            while j < n && trajectory[j].speed <= self.config.max_speed {
                let step = trajectory[j - 1]
                    .location
                    .distance_to(&trajectory[j].location);
                if drift + step > self.config.max_distance {
                    break;
                }
                drift += step;
                j += 1;
            }
            let duration = trajectory[j - 1].timestamp - trajectory[i].timestamp;
            if duration >= self.config.min_duration {
                intervals.push(Interval::new(i, j, "stop"));
            }
            i = j;
        }
        intervals
    }
}

/// Marks the trip start and end points themselves.
pub struct StartEndIntervals;

impl StartEndIntervals {
    /// `[0, 1)` labeled "start_pt" and `[n-1, n)` labeled "end_pt"; empty
    /// for an empty trajectory.
    pub fn get_start_end_intervals(&self, trajectory: &Trajectory) -> Vec<Interval> {
        let n = trajectory.len();
        if n == 0 {
            return Vec::new();
        }
        vec![
            Interval::new(0, 1, "start_pt"),
            Interval::new(n - 1, n, "end_pt"),
        ]
    }
}

/// Maximal true runs of a flag vector as half-open ranges.
fn runs(flags: &[bool]) -> Vec<(usize, usize)> {
    let mut out = Vec::new();
    let mut start = None;
    for (i, &f) in flags.iter().enumerate() {
        match (f, start) {
            (true, None) => start = Some(i),
            (false, Some(s)) => {
                out.push((s, i));
                start = None;
            }
            _ => {}
        }
    }
    if let Some(s) = start {
        out.push((s, flags.len()));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::Location;
    use crate::network::{Vertex, WayType};
    use crate::trajectory::{FitState, TrajectoryPoint};
    use std::sync::Arc;

    fn sample(lat: f64, lon: f64, t: f64, heading: f64, speed: f64) -> TrajectoryPoint {
        TrajectoryPoint::new(Location::new(lat, lon), t, heading, speed, 0, "r")
    }

    #[test]
    fn test_start_end_intervals() {
        let mut traj = Trajectory::new();
        for i in 0..5 {
            traj.push(sample(35.95, -83.93 + 0.0001 * i as f64, i as f64, 90.0, 10.0));
        }
        let sei = StartEndIntervals;
        let intervals = sei.get_start_end_intervals(&traj);
        assert_eq!(intervals.len(), 2);
        assert_eq!((intervals[0].left(), intervals[0].right()), (0, 1));
        assert_eq!(intervals[0].aux(), "start_pt");
        assert_eq!((intervals[1].left(), intervals[1].right()), (4, 5));
        assert_eq!(intervals[1].aux(), "end_pt");

        assert!(sei.get_start_end_intervals(&Trajectory::new()).is_empty());
    }

    #[test]
    fn test_stop_detector() {
        let mut traj = Trajectory::new();
        // Ten seconds stationary, ten seconds driving, six stationary.
        for i in 0..10 {
            traj.push(sample(35.95, -83.93, i as f64, 90.0, 0.5));
        }
        for i in 10..20 {
            traj.push(sample(
                35.95,
                -83.93 + 0.0002 * (i - 9) as f64,
                i as f64,
                90.0,
                15.0,
            ));
        }
        for i in 20..26 {
            traj.push(sample(35.95, -83.9322, i as f64, 90.0, 0.5));
        }

        let detector = StopDetector::new(StopConfig {
            max_speed: 2.5,
            min_duration: 6.0,
            max_distance: 50.0,
        });
        let stops = detector.find_stops(&traj);
        assert_eq!(stops.len(), 1);
        assert_eq!((stops[0].left(), stops[0].right()), (0, 10));
        assert_eq!(stops[0].aux(), "stop");

        // Lowering the duration floor admits the tail run too.
        let detector = StopDetector::new(StopConfig {
            max_speed: 2.5,
            min_duration: 5.0,
            max_distance: 50.0,
        });
        let stops = detector.find_stops(&traj);
        assert_eq!(stops.len(), 2);
        assert_eq!((stops[1].left(), stops[1].right()), (20, 26));
    }

    #[test]
    fn test_turn_around_detector() {
        let mut traj = Trajectory::new();
        // Eastbound approach.
        for i in 0..10 {
            traj.push(sample(
                35.95,
                -83.9310 + 0.00005 * i as f64,
                i as f64,
                90.0,
                8.0,
            ));
        }
        // Slow reversal back westbound over the same stretch.
        for i in 10..20 {
            traj.push(sample(
                35.95,
                -83.93055 - 0.00005 * (i - 10) as f64,
                i as f64,
                270.0,
                4.0,
            ));
        }

        let detector = TurnAroundDetector::new(TurnAroundConfig {
            window: 20,
            max_speed: 30.0,
            max_distance: 100.0,
            heading_threshold: 90.0,
        });
        let tas = detector.find_turn_arounds(&traj);
        assert_eq!(tas.len(), 1);
        assert_eq!(tas[0].aux(), "ta");
        assert!(tas[0].left() < 10 && tas[0].right() > 10);

        // A fast reversal is ordinary driving, not a turn-around.
        let mut fast = Trajectory::new();
        for i in 0..10 {
            fast.push(sample(
                35.95,
                -83.9310 + 0.00005 * i as f64,
                i as f64,
                90.0,
                40.0,
            ));
        }
        for i in 10..20 {
            fast.push(sample(
                35.95,
                -83.93055 - 0.00005 * (i - 10) as f64,
                i as f64,
                270.0,
                40.0,
            ));
        }
        assert!(detector.find_turn_arounds(&fast).is_empty());
    }

    #[test]
    fn test_intersection_counter() {
        let mut net = RoadNetwork::new();
        net.add_vertex(Vertex::new(35.952500, -83.932434, 1));
        net.add_vertex(Vertex::new(35.948878, -83.928081, 2));
        net.add_vertex(Vertex::new(35.950715, -83.934971, 3));
        let e1 = net.add_edge(1, 1, 2, WayType::Secondary).unwrap();
        net.add_edge(2, 1, 3, WayType::Secondary).unwrap();

        let mut traj = Trajectory::new();
        // Near vertex 1, which has out-degree 2.
        let mut p = sample(35.952400, -83.932300, 0.0, 136.0, 10.0);
        p.fit = FitState::Explicit(Arc::clone(&e1));
        traj.push(p);
        // Near vertex 2, out-degree 0.
        let mut p = sample(35.949000, -83.928200, 1.0, 136.0, 10.0);
        p.fit = FitState::Explicit(e1);
        traj.push(p);
        // Unfit point.
        traj.push(sample(35.95, -83.93, 2.0, 136.0, 10.0));

        let counter = IntersectionCounter::new(&net);
        counter.count_intersections(&mut traj);
        assert_eq!(traj[0].out_degree, 2);
        assert_eq!(traj[1].out_degree, 0);
        assert_eq!(traj[2].out_degree, 0);
    }
}
