//! Shared helpers for the integration tests.

mod config_files;
mod properties;
mod scenarios;
mod stepping;
mod waypoints;

use otg_common::kinematics::KinematicState;
use otg_planner::{AxisLimits, MotionRequest};

/// Request with `limits` per axis, starting at rest at zero and targeting
/// rest at `targets`.
pub fn rest_to_rest(targets: &[f64], limits: AxisLimits) -> MotionRequest {
    let all = vec![limits; targets.len()];
    let mut request = MotionRequest::new(&all).unwrap();
    for (target, &p) in request.target.iter_mut().zip(targets) {
        *target = KinematicState::at_rest(p);
    }
    request
}

/// Unit velocity, acceleration and jerk limits.
pub const UNIT: AxisLimits = AxisLimits::symmetric(1.0, 1.0, 1.0);

/// Deterministic pseudo-random sequence in [0, 1).
pub struct Lcg(u64);

impl Lcg {
    pub fn new(seed: u64) -> Self {
        Self(seed)
    }

    pub fn next(&mut self) -> f64 {
        self.0 = self
            .0
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        (self.0 >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Uniform in [lo, hi).
    pub fn range(&mut self, lo: f64, hi: f64) -> f64 {
        lo + (hi - lo) * self.next()
    }
}
