//! Time-optimal change of velocity and acceleration.
//!
//! A velocity step moves an axis from `(v0, a0)` to `(v1, a1)` with at most
//! three segments: a jerk ramp to a peak acceleration, an optional hold at
//! the acceleration limit, and a ramp back with opposite jerk. Position is
//! not constrained. The step is also the complete profile of the velocity
//! interface and the two outer legs of every position profile.

use otg_common::kinematics::KinematicState;

use super::roots::{TIME_EPS, bisect_boundary, clamped_sqrt, tolerance};
use super::{AxisTask, Blocked};
use crate::error::SynthesisError;
use crate::profile::{AxisProfile, ReachedLimits};

/// Smallest acceleration scale tried when stretching a velocity step.
const MIN_ACCELERATION_SCALE: f64 = 1e-9;

/// Ramp, hold, ramp.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VelocityStep {
    /// Duration of the first ramp [s].
    pub ramp_in: f64,
    /// Duration at the peak acceleration [s].
    pub hold: f64,
    /// Duration of the second ramp [s].
    pub ramp_out: f64,
    /// Jerk of the first ramp; the second ramp uses the negation.
    pub jerk: f64,
    /// Acceleration reached between the ramps.
    pub peak: f64,
}

impl VelocityStep {
    #[inline]
    pub fn duration(&self) -> f64 {
        self.ramp_in + self.hold + self.ramp_out
    }

    /// State reached from `start`.
    #[inline]
    pub fn end_from(&self, start: KinematicState) -> KinematicState {
        start
            .integrate(self.jerk, self.ramp_in)
            .integrate(0.0, self.hold)
            .integrate(-self.jerk, self.ramp_out)
    }

    /// Position change of the step when started at `(velocity, acceleration)`.
    #[inline]
    pub fn distance(&self, velocity: f64, acceleration: f64) -> f64 {
        self.end_from(KinematicState::new(0.0, velocity, acceleration))
            .position
    }

    pub fn append_to(&self, profile: &mut AxisProfile) -> Result<(), SynthesisError> {
        profile.push(self.ramp_in, self.jerk)?;
        profile.push(self.hold, 0.0)?;
        profile.push(self.ramp_out, -self.jerk)?;
        if self.hold > 0.0 {
            profile.mark(ReachedLimits::ACCELERATION);
        }
        Ok(())
    }
}

/// Time-optimal step from `(v0, a0)` to `(v1, a1)`.
///
/// Two shapes exist: up-down (jerk `+j` to a peak above both boundary
/// accelerations, then `-j`) and down-up (the mirror image). Each peak
/// solves a quadratic; both roots of both shapes are candidates, a peak
/// beyond `[min_acceleration, max_acceleration]` is clamped with a hold
/// absorbing the remaining velocity change, and the shortest candidate wins.
pub fn velocity_step(
    v0: f64,
    a0: f64,
    v1: f64,
    a1: f64,
    max_acceleration: f64,
    min_acceleration: f64,
    jerk: f64,
) -> Result<VelocityStep, SynthesisError> {
    if !(jerk > 0.0) {
        return Err(SynthesisError::NonPositiveLimit("jerk"));
    }

    let dv = v1 - v0;
    let j = jerk;
    let upper = a0.max(a1);
    let lower = a0.min(a1);
    let squares = a0 * a0 + a1 * a1;
    let scale = squares + (2.0 * j * dv).abs();
    let mut best: Option<VelocityStep> = None;
    let mut offer = |step: VelocityStep| {
        if step.hold >= 0.0 && best.is_none_or(|b| step.duration() < b.duration()) {
            best = Some(step);
        }
    };

    // Up-down: dv = (2·peak² − a0² − a1²) / 2j with peak ≥ max(a0, a1).
    if let Some(root) = clamped_sqrt((2.0 * j * dv + squares) / 2.0, scale) {
        for peak in [root, -root] {
            if peak < upper - tolerance(1e-9, upper) {
                continue;
            }
            let peak = peak.max(upper);
            let cap = max_acceleration.max(upper);
            let (peak, hold) = if peak > cap {
                (cap, (dv - (2.0 * cap * cap - squares) / (2.0 * j)) / cap)
            } else {
                (peak, 0.0)
            };
            offer(VelocityStep {
                ramp_in: (peak - a0) / j,
                hold,
                ramp_out: (peak - a1) / j,
                jerk: j,
                peak,
            });
        }
    }

    // Down-up: dv = (a0² + a1² − 2·peak²) / 2j with peak ≤ min(a0, a1).
    if let Some(root) = clamped_sqrt((squares - 2.0 * j * dv) / 2.0, scale) {
        for peak in [root, -root] {
            if peak > lower + tolerance(1e-9, lower) {
                continue;
            }
            let peak = peak.min(lower);
            let cap = min_acceleration.min(lower);
            let (peak, hold) = if peak < cap {
                (cap, (dv - (squares - 2.0 * cap * cap) / (2.0 * j)) / cap)
            } else {
                (peak, 0.0)
            };
            offer(VelocityStep {
                ramp_in: (a0 - peak) / j,
                hold,
                ramp_out: (a1 - peak) / j,
                jerk: -j,
                peak,
            });
        }
    }

    best.ok_or(SynthesisError::NoSolution)
}

// ─── Velocity Interface ─────────────────────────────────────────────

fn step_with_scale(task: &AxisTask, scale: f64) -> Result<VelocityStep, SynthesisError> {
    let b = &task.bounds;
    velocity_step(
        task.start.velocity,
        task.start.acceleration,
        task.target.velocity,
        task.target.acceleration,
        b.max_acceleration * scale,
        b.min_acceleration * scale,
        b.jerk,
    )
}

fn build(task: &AxisTask, step: &VelocityStep, pad: f64) -> Result<AxisProfile, SynthesisError> {
    let mut profile = AxisProfile::new(task.start);
    step.append_to(&mut profile)?;
    let mut profile = task.finish(profile)?;
    profile.push(pad, 0.0)?;
    Ok(profile)
}

/// Time-optimal profile for the velocity interface.
pub(crate) fn plan(task: &AxisTask) -> Result<AxisProfile, SynthesisError> {
    build(task, &step_with_scale(task, 1.0)?, 0.0)
}

/// Velocity-interface profile lasting `duration`.
///
/// Lowers the acceleration caps until the step is long enough. When that
/// cannot reach `duration` and the target acceleration is zero, the
/// optimal step is followed by constant velocity.
pub(crate) fn fit(
    task: &AxisTask,
    duration: f64,
    optimal: &AxisProfile,
) -> Result<AxisProfile, Blocked> {
    let time_at = |scale: f64| step_with_scale(task, scale).map_or(f64::INFINITY, |s| s.duration());
    let coasting = task.target.acceleration == 0.0;

    if time_at(MIN_ACCELERATION_SCALE) >= duration {
        let (_, scale) = bisect_boundary(MIN_ACCELERATION_SCALE, 1.0, |s| time_at(s) > duration);
        if let Ok(step) = step_with_scale(task, scale) {
            let slack = duration - step.duration();
            let pad = if coasting && slack > TIME_EPS { slack } else { 0.0 };
            if slack >= -TIME_EPS {
                if let Ok(profile) = build(task, &step, pad) {
                    return Ok(profile);
                }
            }
        }
    }

    if coasting && !optimal.is_full() {
        let mut profile = optimal.clone();
        if profile.push(duration - optimal.duration(), 0.0).is_ok() {
            return Ok(profile);
        }
    }
    Err(Blocked::none())
}
