//! Single-axis synthesis.
//!
//! [`AxisTask`] bundles one axis's boundary conditions and limits for one
//! section. [`AxisTask::optimal`] returns its time-optimal profile;
//! [`AxisTask::fit`] returns a profile lasting a prescribed duration, which
//! is what cross-axis synchronization asks for.
//!
//! # Module Structure
//!
//! - [`velocity_step`] - closed-form velocity/acceleration change, velocity interface
//! - [`position`] - cruise-velocity search for the position interface
//! - [`roots`] - bounded bisection and tolerances

pub mod position;
pub mod roots;
pub mod velocity_step;

use otg_common::kinematics::KinematicState;

use crate::error::SynthesisError;
use crate::profile::AxisProfile;
use crate::request::{AxisLimits, ControlInterface};
use roots::{POSITION_EPS, STATE_EPS, TIME_EPS, tolerance};

pub use velocity_step::{VelocityStep, velocity_step};

// ─── Bounds ─────────────────────────────────────────────────────────

/// Resolved kinematic bounds of one axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub max_velocity: f64,
    pub min_velocity: f64,
    pub max_acceleration: f64,
    pub min_acceleration: f64,
    pub jerk: f64,
}

impl Bounds {
    pub fn from_limits(limits: &AxisLimits) -> Self {
        let (min_velocity, max_velocity) = limits.velocity_range();
        let (min_acceleration, max_acceleration) = limits.acceleration_range();
        Self {
            max_velocity,
            min_velocity,
            max_acceleration,
            min_acceleration,
            jerk: limits.max_jerk,
        }
    }

    /// Speed limit in `direction` (positive: forward).
    #[inline]
    pub fn velocity_limit(&self, direction: f64) -> f64 {
        if direction >= 0.0 {
            self.max_velocity
        } else {
            -self.min_velocity
        }
    }

    /// True when `profile` stays inside these bounds.
    pub fn admits(&self, profile: &AxisProfile) -> bool {
        let (vmin, vmax) = profile.velocity_extrema();
        let (amin, amax) = profile.acceleration_extrema();
        vmax <= self.max_velocity + tolerance(STATE_EPS, self.max_velocity)
            && vmin >= self.min_velocity - tolerance(STATE_EPS, self.min_velocity)
            && amax <= self.max_acceleration + tolerance(STATE_EPS, self.max_acceleration)
            && amin >= self.min_acceleration - tolerance(STATE_EPS, self.min_acceleration)
            && profile.peak_jerk() <= self.jerk + tolerance(STATE_EPS, self.jerk)
    }
}

// ─── Axis Task ──────────────────────────────────────────────────────

/// A fixed-duration fit did not succeed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Blocked {
    /// Shortest duration above the requested one that is known to work.
    pub next_feasible: Option<f64>,
}

impl Blocked {
    pub const fn none() -> Self {
        Self {
            next_feasible: None,
        }
    }
}

/// Boundary conditions and limits of one axis over one section.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisTask {
    pub interface: ControlInterface,
    pub start: KinematicState,
    pub target: KinematicState,
    pub bounds: Bounds,
}

impl AxisTask {
    pub fn new(
        interface: ControlInterface,
        start: KinematicState,
        target: KinematicState,
        limits: &AxisLimits,
    ) -> Self {
        Self {
            interface,
            start,
            target,
            bounds: Bounds::from_limits(limits),
        }
    }

    /// Commanded position change.
    #[inline]
    pub fn distance(&self) -> f64 {
        self.target.position - self.start.position
    }

    /// True when the start already satisfies the target.
    pub fn is_satisfied(&self) -> bool {
        let (s, t) = (&self.start, &self.target);
        match self.interface {
            ControlInterface::Position => s == t,
            ControlInterface::Velocity => {
                s.velocity == t.velocity && s.acceleration == t.acceleration
            }
            ControlInterface::Acceleration => s.acceleration == t.acceleration,
        }
    }

    fn check(&self) -> Result<(), SynthesisError> {
        let b = &self.bounds;
        for (name, value) in [
            ("velocity", b.max_velocity.min(-b.min_velocity)),
            ("acceleration", b.max_acceleration.min(-b.min_acceleration)),
            ("jerk", b.jerk),
        ] {
            if !(value > 0.0) {
                return Err(SynthesisError::NonPositiveLimit(name));
            }
        }

        for value in [self.start.acceleration, self.target.acceleration] {
            if value > b.max_acceleration + tolerance(STATE_EPS, b.max_acceleration)
                || value < b.min_acceleration - tolerance(STATE_EPS, b.min_acceleration)
            {
                return Err(SynthesisError::AccelerationOutOfRange {
                    value,
                    min: b.min_acceleration,
                    max: b.max_acceleration,
                });
            }
        }

        let vf = self.target.velocity;
        if self.interface != ControlInterface::Acceleration
            && (vf > b.max_velocity + tolerance(STATE_EPS, b.max_velocity)
                || vf < b.min_velocity - tolerance(STATE_EPS, b.min_velocity))
        {
            return Err(SynthesisError::TargetVelocityOutOfRange {
                value: vf,
                min: b.min_velocity,
                max: b.max_velocity,
            });
        }
        Ok(())
    }

    /// Time-optimal profile, or the reason none exists.
    pub fn optimal(&self) -> Result<AxisProfile, SynthesisError> {
        self.check()?;
        if self.is_satisfied() {
            return Ok(AxisProfile::new(self.start));
        }
        match self.interface {
            ControlInterface::Position => position::plan(self),
            ControlInterface::Velocity => velocity_step::plan(self),
            ControlInterface::Acceleration => self.ramp(),
        }
    }

    /// Profile lasting `duration`, given this task's optimal profile.
    ///
    /// Durations within `TIME_EPS` of the optimum return the optimum itself.
    pub fn fit(&self, duration: f64, optimal: &AxisProfile) -> Result<AxisProfile, Blocked> {
        let shortest = optimal.duration();
        if duration < shortest - TIME_EPS {
            return Err(Blocked {
                next_feasible: Some(shortest),
            });
        }
        if duration - shortest <= TIME_EPS {
            return Ok(optimal.clone());
        }
        match self.interface {
            ControlInterface::Position => position::fit(self, duration, optimal),
            ControlInterface::Velocity => velocity_step::fit(self, duration, optimal),
            ControlInterface::Acceleration => self.stretched_ramp(duration),
        }
    }

    /// Verify the end of `profile` against the target and snap it exactly.
    pub(crate) fn finish(&self, mut profile: AxisProfile) -> Result<AxisProfile, SynthesisError> {
        let (end, t) = (profile.end(), &self.target);
        let close = |eps: f64, a: f64, b: f64| (a - b).abs() <= tolerance(eps, b);
        let mut exact = end;

        if self.interface == ControlInterface::Position {
            if !close(POSITION_EPS, end.position, t.position) {
                return Err(SynthesisError::NoSolution);
            }
            exact.position = t.position;
        }
        if self.interface != ControlInterface::Acceleration {
            if !close(STATE_EPS, end.velocity, t.velocity) {
                return Err(SynthesisError::NoSolution);
            }
            exact.velocity = t.velocity;
        }
        if !close(STATE_EPS, end.acceleration, t.acceleration) {
            return Err(SynthesisError::NoSolution);
        }
        exact.acceleration = t.acceleration;

        profile.snap_end(exact);
        Ok(profile)
    }

    // ─── Acceleration Interface ─────────────────────────────────────

    fn ramp(&self) -> Result<AxisProfile, SynthesisError> {
        let change = self.target.acceleration - self.start.acceleration;
        let mut profile = AxisProfile::new(self.start);
        profile.push(change.abs() / self.bounds.jerk, self.bounds.jerk.copysign(change))?;
        self.finish(profile)
    }

    fn stretched_ramp(&self, duration: f64) -> Result<AxisProfile, Blocked> {
        let change = self.target.acceleration - self.start.acceleration;
        let mut profile = AxisProfile::new(self.start);
        profile
            .push(duration, change / duration)
            .map_err(|_| Blocked::none())?;
        self.finish(profile).map_err(|_| Blocked::none())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits() -> AxisLimits {
        AxisLimits::symmetric(1.0, 1.0, 1.0)
    }

    #[test]
    fn satisfied_task_yields_empty_profile() {
        let here = KinematicState::new(2.0, 0.5, 0.0);
        let task = AxisTask::new(ControlInterface::Position, here, here, &limits());
        let p = task.optimal().unwrap();
        assert_eq!(p.duration(), 0.0);
        assert!(p.segments().is_empty());
    }

    #[test]
    fn acceleration_out_of_range_is_specific() {
        let task = AxisTask::new(
            ControlInterface::Position,
            KinematicState::new(0.0, 0.0, 2.0),
            KinematicState::at_rest(1.0),
            &limits(),
        );
        assert!(matches!(
            task.optimal(),
            Err(SynthesisError::AccelerationOutOfRange { value, .. }) if value == 2.0
        ));
    }

    #[test]
    fn target_velocity_out_of_range() {
        let task = AxisTask::new(
            ControlInterface::Velocity,
            KinematicState::ZERO,
            KinematicState::new(0.0, 3.0, 0.0),
            &limits(),
        );
        assert!(matches!(
            task.optimal(),
            Err(SynthesisError::TargetVelocityOutOfRange { .. })
        ));
    }

    #[test]
    fn zero_jerk_cannot_move() {
        let mut l = limits();
        l.max_jerk = 0.0;
        let task = AxisTask::new(
            ControlInterface::Position,
            KinematicState::ZERO,
            KinematicState::at_rest(1.0),
            &l,
        );
        assert_eq!(task.optimal(), Err(SynthesisError::NonPositiveLimit("jerk")));
    }

    #[test]
    fn acceleration_interface_ramps_and_stretches() {
        let task = AxisTask::new(
            ControlInterface::Acceleration,
            KinematicState::new(0.0, 0.0, 0.2),
            KinematicState::new(0.0, 0.0, -0.8),
            &limits(),
        );
        let optimal = task.optimal().unwrap();
        assert!((optimal.duration() - 1.0).abs() < 1e-12);
        assert_eq!(optimal.end().acceleration, -0.8);

        let slow = task.fit(4.0, &optimal).unwrap();
        assert!((slow.duration() - 4.0).abs() < 1e-12);
        assert!((slow.peak_jerk() - 0.25).abs() < 1e-12);
    }

    #[test]
    fn fit_below_optimum_reports_optimum() {
        let task = AxisTask::new(
            ControlInterface::Position,
            KinematicState::ZERO,
            KinematicState::at_rest(10.0),
            &limits(),
        );
        let optimal = task.optimal().unwrap();
        assert_eq!(
            task.fit(5.0, &optimal),
            Err(Blocked {
                next_feasible: Some(optimal.duration())
            })
        );
    }

    #[test]
    fn bounds_admit_optimal_profiles() {
        let task = AxisTask::new(
            ControlInterface::Position,
            KinematicState::new(0.0, -0.5, 0.4),
            KinematicState::new(3.0, 0.2, 0.0),
            &limits(),
        );
        let p = task.optimal().unwrap();
        assert!(task.bounds.admits(&p));
    }
}
