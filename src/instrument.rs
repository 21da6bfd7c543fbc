//! Per-trajectory processing statistics.

use std::ops::{Add, AddAssign};

use serde::{Deserialize, Serialize};

/// Additive accumulator of per-trajectory point statistics.
///
/// Counters from independently processed trajectories combine with `+`,
/// field by field, so batch drivers can aggregate after each worker
/// returns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointCounter {
    /// Points seen across ingestion and de-identification.
    pub n_points: u64,
    /// Points dropped for a malformed or missing record field.
    pub n_invalid_field_points: u64,
    /// Points dropped for coordinates outside valid ranges.
    pub n_invalid_geo_points: u64,
    /// Points dropped for an out-of-range heading.
    pub n_invalid_heading_points: u64,
    /// Points removed by the error corrector (duplicates and the like).
    pub n_error_points: u64,
    /// Points inside a critical interval at de-identification time.
    pub n_ci_points: u64,
    /// Points inside a privacy interval at de-identification time.
    pub n_pi_points: u64,
}

impl PointCounter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Add for PointCounter {
    type Output = PointCounter;

    fn add(self, other: PointCounter) -> PointCounter {
        PointCounter {
            n_points: self.n_points + other.n_points,
            n_invalid_field_points: self.n_invalid_field_points + other.n_invalid_field_points,
            n_invalid_geo_points: self.n_invalid_geo_points + other.n_invalid_geo_points,
            n_invalid_heading_points: self.n_invalid_heading_points
                + other.n_invalid_heading_points,
            n_error_points: self.n_error_points + other.n_error_points,
            n_ci_points: self.n_ci_points + other.n_ci_points,
            n_pi_points: self.n_pi_points + other.n_pi_points,
        }
    }
}

impl AddAssign for PointCounter {
    fn add_assign(&mut self, other: PointCounter) {
        *self = *self + other;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_addition_is_field_wise() {
        let a = PointCounter {
            n_points: 281,
            n_invalid_field_points: 0,
            n_invalid_geo_points: 0,
            n_invalid_heading_points: 0,
            n_error_points: 0,
            n_ci_points: 21,
            n_pi_points: 126,
        };
        let b = PointCounter {
            n_points: 138,
            n_invalid_field_points: 0,
            n_invalid_geo_points: 3,
            n_invalid_heading_points: 1,
            n_error_points: 4,
            n_ci_points: 2,
            n_pi_points: 128,
        };

        let c = a + b;
        assert_eq!(c.n_points, 419);
        assert_eq!(c.n_invalid_geo_points, 3);
        assert_eq!(c.n_invalid_heading_points, 1);
        assert_eq!(c.n_error_points, 4);
        assert_eq!(c.n_ci_points, 23);
        assert_eq!(c.n_pi_points, 254);
        // Commutative.
        assert_eq!(b + a, c);

        let mut d = a;
        d += b;
        assert_eq!(d, c);
    }

    #[test]
    fn test_serde_round_trip() {
        let a = PointCounter {
            n_points: 5,
            ..PointCounter::default()
        };
        let json = serde_json::to_string(&a).unwrap();
        let back: PointCounter = serde_json::from_str(&json).unwrap();
        assert_eq!(a, back);
    }
}
