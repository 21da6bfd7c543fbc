//! The end-to-end sanitization pipeline.
//!
//! [`Sanitizer`] wires the stages together in their required order:
//! error correction, explicit and implicit map fitting, intersection
//! counting, feature detection, critical marking, privacy-interval
//! expansion, privacy marking, and finally de-identification. The
//! quad-tree and road network are shared read-only, so one sanitizer can
//! process many trajectories, including concurrently from several
//! threads.

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::deidentify::{DeIdentifier, ErrorCorrector};
use crate::detectors::{
    IntersectionCounter, StartEndIntervals, StopConfig, StopDetector, TurnAroundConfig,
    TurnAroundDetector,
};
use crate::error::{Result, SanitizeError};
use crate::fitting::{ImplicitFitterConfig, ImplicitMapFitter, MapFitter, MapFitterConfig};
use crate::instrument::PointCounter;
use crate::intervals::{
    IntervalMarker, PrivacyIntervalConfig, PrivacyIntervalFinder, PrivacyIntervalMarker,
};
use crate::network::RoadNetwork;
use crate::quad::Quad;
use crate::trajectory::{Interval, Trajectory};

/// Combined configuration for every pipeline stage.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SanitizerConfig {
    pub fitter: MapFitterConfig,
    pub implicit_fitter: ImplicitFitterConfig,
    pub turn_around: TurnAroundConfig,
    pub stop: StopConfig,
    pub privacy: PrivacyIntervalConfig,
    /// Raw-id duplicate look-back for the error corrector; 0 disables
    /// duplicate detection.
    pub error_look_back: usize,
}

impl Default for SanitizerConfig {
    fn default() -> Self {
        Self {
            fitter: MapFitterConfig::default(),
            implicit_fitter: ImplicitFitterConfig::default(),
            turn_around: TurnAroundConfig::default(),
            stop: StopConfig::default(),
            privacy: PrivacyIntervalConfig::default(),
            error_look_back: 50,
        }
    }
}

/// Everything one sanitization run produces.
#[derive(Debug)]
pub struct SanitizeOutcome {
    /// The de-identified trajectory.
    pub trajectory: Trajectory,
    /// Point statistics for this run.
    pub counter: PointCounter,
    /// The privacy intervals applied, with their stopping labels.
    pub privacy_intervals: Vec<Interval>,
}

/// One-stop driver for the whole de-identification pipeline.
pub struct Sanitizer<'a> {
    quad: &'a Quad,
    network: &'a RoadNetwork,
    config: SanitizerConfig,
}

impl<'a> Sanitizer<'a> {
    pub fn new(quad: &'a Quad, network: &'a RoadNetwork, config: SanitizerConfig) -> Self {
        Self {
            quad,
            network,
            config,
        }
    }

    /// Run every stage over one raw trajectory.
    ///
    /// Trajectories need at least two points; start/end marking and
    /// interval expansion are meaningless below that.
    pub fn sanitize(&self, raw: &Trajectory) -> Result<SanitizeOutcome> {
        if raw.len() < 2 {
            return Err(SanitizeError::InsufficientPoints {
                point_count: raw.len(),
                minimum_required: 2,
            });
        }
        let mut counter = PointCounter::new();
        // Raw ingested points, before any stage removes anything.
        counter.n_points = raw.len() as u64;

        let corrector = ErrorCorrector::new(self.config.error_look_back);
        let mut trajectory = corrector.correct(raw, &mut counter);
        if trajectory.len() < 2 {
            return Err(SanitizeError::InsufficientPoints {
                point_count: trajectory.len(),
                minimum_required: 2,
            });
        }

        MapFitter::new(self.quad, self.config.fitter).fit(&mut trajectory);
        ImplicitMapFitter::new(self.config.implicit_fitter).fit(&mut trajectory);
        IntersectionCounter::new(self.network).count_intersections(&mut trajectory);

        let se_intervals = StartEndIntervals.get_start_end_intervals(&trajectory);
        let ta_intervals =
            TurnAroundDetector::new(self.config.turn_around).find_turn_arounds(&trajectory);
        let stop_intervals = StopDetector::new(self.config.stop).find_stops(&trajectory);
        debug!(
            "critical intervals: {} start/end, {} turn-around, {} stop",
            se_intervals.len(),
            ta_intervals.len(),
            stop_intervals.len()
        );

        IntervalMarker::new([se_intervals, ta_intervals, stop_intervals])
            .mark_trajectory(&mut trajectory);

        let privacy_intervals =
            PrivacyIntervalFinder::new(self.config.privacy).find_intervals(&trajectory);
        PrivacyIntervalMarker::new([privacy_intervals.clone()]).mark_trajectory(&mut trajectory);

        let clean = DeIdentifier::new().de_identify_counted(&trajectory, &mut counter);
        info!(
            "sanitized trajectory: {} raw, {} kept, {} privacy intervals",
            raw.len(),
            clean.len(),
            privacy_intervals.len()
        );

        Ok(SanitizeOutcome {
            trajectory: clean,
            counter,
            privacy_intervals,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::Location;
    use crate::intervals::{ExpansionThresholds, StoppingMode};
    use crate::trajectory::TrajectoryPoint;
    use crate::shapes::Bounds;
    use crate::geo::Point;

    fn empty_index() -> (Quad, RoadNetwork) {
        let quad = Quad::new(Bounds::new(
            Point::new(35.90, -84.00),
            Point::new(36.00, -83.90),
        ));
        (quad, RoadNetwork::new())
    }

    fn eastbound_line(n: usize) -> Trajectory {
        let origin = Location::new(35.95, -83.93);
        let mut traj = Trajectory::new();
        for i in 0..n {
            let loc = origin.project_position(90.0, 10.0 * i as f64);
            traj.push(TrajectoryPoint::new(
                loc,
                i as f64,
                90.0,
                10.0,
                i,
                format!("r-{}", i),
            ));
        }
        traj
    }

    #[test]
    fn test_rejects_tiny_trajectories() {
        let (quad, network) = empty_index();
        let sanitizer = Sanitizer::new(&quad, &network, SanitizerConfig::default());
        let mut traj = Trajectory::new();
        assert!(sanitizer.sanitize(&traj).is_err());
        traj.push(TrajectoryPoint::new(
            Location::new(35.95, -83.93),
            0.0,
            90.0,
            10.0,
            0,
            "r",
        ));
        assert!(sanitizer.sanitize(&traj).is_err());
    }

    #[test]
    fn test_redacts_trip_endpoints() {
        let (quad, network) = empty_index();
        // 55 m redaction window at each end of a 1 km drive; with 10 m
        // steps the cumulative walk passes it at the sixth point out.
        let window = ExpansionThresholds {
            max_direct_distance: 55.0,
            max_manhattan_distance: 1.0e6,
            max_out_degree: 1000,
        };
        let config = SanitizerConfig {
            privacy: PrivacyIntervalConfig {
                forward: window,
                backward: window,
                mode: StoppingMode::Any,
            },
            ..SanitizerConfig::default()
        };
        let sanitizer = Sanitizer::new(&quad, &network, config);
        let raw = eastbound_line(100);
        let outcome = sanitizer.sanitize(&raw).unwrap();

        // Points 0..=5 and 94..=99 go: the endpoints themselves plus the
        // expansion on each side (the stopping point survives).
        assert_eq!(outcome.trajectory.len(), 88);
        assert_eq!(outcome.counter.n_points, 100);
        assert_eq!(outcome.counter.n_ci_points, 2);
        assert_eq!(outcome.counter.n_pi_points, 10);
        assert_eq!(outcome.privacy_intervals.len(), 2);
        assert_eq!(outcome.privacy_intervals[0].aux(), "forward:max_dist");
        assert_eq!(
            (
                outcome.privacy_intervals[0].left(),
                outcome.privacy_intervals[0].right()
            ),
            (1, 6)
        );
        assert_eq!(outcome.privacy_intervals[1].aux(), "backward:max_dist");
        assert_eq!(
            (
                outcome.privacy_intervals[1].left(),
                outcome.privacy_intervals[1].right()
            ),
            (94, 99)
        );

        // The first surviving point is the forward stopping point.
        assert_eq!(outcome.trajectory[0].raw_id, "r-6");
        assert_eq!(outcome.trajectory[0].index, 0);
    }

    #[test]
    fn test_counts_corrected_points() {
        let (quad, network) = empty_index();
        let sanitizer = Sanitizer::new(&quad, &network, SanitizerConfig::default());
        let mut raw = eastbound_line(50);
        raw[10].location = Location::new(95.0, -83.93);
        raw[11].heading = 400.0;

        let outcome = sanitizer.sanitize(&raw).unwrap();
        assert_eq!(outcome.counter.n_invalid_geo_points, 1);
        assert_eq!(outcome.counter.n_invalid_heading_points, 1);
        assert_eq!(outcome.counter.n_error_points, 2);
        // Raw count, not the corrected count.
        assert_eq!(outcome.counter.n_points, 50);
    }
}
