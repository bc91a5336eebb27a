//! Kinematic state of a single axis.
//!
//! Units are caller-defined (joint or Cartesian); the planner only assumes
//! that velocity is the time derivative of position, and so on.

use serde::{Deserialize, Serialize};

/// Position, velocity and acceleration of one axis at one instant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct KinematicState {
    /// Position [user units].
    #[serde(default)]
    pub position: f64,
    /// Velocity [user units/s].
    #[serde(default)]
    pub velocity: f64,
    /// Acceleration [user units/s²].
    #[serde(default)]
    pub acceleration: f64,
}

impl KinematicState {
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0);

    #[inline]
    pub const fn new(position: f64, velocity: f64, acceleration: f64) -> Self {
        Self {
            position,
            velocity,
            acceleration,
        }
    }

    /// State at rest at the given position.
    #[inline]
    pub const fn at_rest(position: f64) -> Self {
        Self::new(position, 0.0, 0.0)
    }

    /// Advance the state by `dt` seconds under constant `jerk`.
    #[inline]
    pub fn integrate(&self, jerk: f64, dt: f64) -> Self {
        let dt2 = dt * dt;
        Self {
            position: self.position
                + self.velocity * dt
                + self.acceleration * dt2 / 2.0
                + jerk * dt2 * dt / 6.0,
            velocity: self.velocity + self.acceleration * dt + jerk * dt2 / 2.0,
            acceleration: self.acceleration + jerk * dt,
        }
    }

    /// True when velocity and acceleration are both exactly zero.
    #[inline]
    pub fn is_at_rest(&self) -> bool {
        self.velocity == 0.0 && self.acceleration == 0.0
    }

    /// True when all three components are finite.
    #[inline]
    pub fn is_finite(&self) -> bool {
        self.position.is_finite() && self.velocity.is_finite() && self.acceleration.is_finite()
    }
}
