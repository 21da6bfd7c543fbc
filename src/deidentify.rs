//! De-identification and raw-point error correction.

use std::collections::VecDeque;

use log::debug;

use crate::instrument::PointCounter;
use crate::trajectory::Trajectory;

/// Strips privacy-marked points from a trajectory.
#[derive(Debug, Default)]
pub struct DeIdentifier;

impl DeIdentifier {
    pub fn new() -> Self {
        Self
    }

    /// A new trajectory with every critical or privacy-marked point
    /// removed, remaining points in their original relative order,
    /// re-indexed from 0.
    ///
    /// Critical points are removed even when no expansion covered them;
    /// they are the sensitive locations themselves.
    pub fn de_identify(&self, trajectory: &Trajectory) -> Trajectory {
        let mut out = Trajectory::new();
        for point in trajectory {
            if !point.is_private && !point.is_critical {
                out.push(point.clone());
            }
        }
        debug!(
            "de-identified trajectory: {} of {} points kept",
            out.len(),
            trajectory.len()
        );
        out
    }

    /// Like [`de_identify`](Self::de_identify), also tallying the critical
    /// and privacy-marked points before removal. `n_points` is the
    /// caller's business; the pipeline counts raw ingested points there.
    pub fn de_identify_counted(
        &self,
        trajectory: &Trajectory,
        counter: &mut PointCounter,
    ) -> Trajectory {
        for point in trajectory {
            if point.is_critical {
                counter.n_ci_points += 1;
            }
            if point.is_private {
                counter.n_pi_points += 1;
            }
        }
        self.de_identify(trajectory)
    }
}

/// Removes malformed raw points before map fitting.
///
/// Drops points with out-of-range coordinates or headings and points
/// whose raw record id repeats within a look-back window (a common data
/// logger fault). Every dropped point counts toward `n_error_points`;
/// geo and heading drops additionally count their own category. The
/// surviving points form a re-indexed trajectory for the fitters.
#[derive(Debug)]
pub struct ErrorCorrector {
    look_back: usize,
}

impl ErrorCorrector {
    pub fn new(look_back: usize) -> Self {
        Self { look_back }
    }

    pub fn correct(&self, trajectory: &Trajectory, counter: &mut PointCounter) -> Trajectory {
        let mut recent: VecDeque<String> = VecDeque::with_capacity(self.look_back);
        let mut out = Trajectory::new();

        for point in trajectory {
            if !point.location.point().is_valid() {
                counter.n_invalid_geo_points += 1;
                counter.n_error_points += 1;
                continue;
            }
            if !point.heading.is_finite() || !(0.0..=360.0).contains(&point.heading) {
                counter.n_invalid_heading_points += 1;
                counter.n_error_points += 1;
                continue;
            }
            if self.look_back > 0 && recent.contains(&point.raw_id) {
                counter.n_error_points += 1;
                continue;
            }
            if self.look_back > 0 {
                if recent.len() == self.look_back {
                    recent.pop_front();
                }
                recent.push_back(point.raw_id.clone());
            }
            out.push(point.clone());
        }
        debug!(
            "error correction kept {} of {} points",
            out.len(),
            trajectory.len()
        );
        out
    }
}
