//! Motion request: the caller-owned input of one planning cycle.
//!
//! A request describes every axis of one synchronized group: where it is,
//! where it should go, which limits apply and how the axes are coupled in
//! time. The stepper compares requests by value to decide when to replan,
//! so every field here takes part in that comparison.

use heapless::Vec;
use otg_common::consts::{MAX_AXES, MAX_WAYPOINTS};
use otg_common::kinematics::KinematicState;
use serde::{Deserialize, Serialize};

use crate::error::InputError;

/// Per-axis fixed-capacity vector.
pub type AxisVec<T> = Vec<T, MAX_AXES>;

/// One intermediate waypoint: a position per axis.
pub type Waypoint = Vec<f64, MAX_AXES>;

// ─── Enumerations ───────────────────────────────────────────────────

/// Which kinematic quantity the target constrains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlInterface {
    /// Reach target position, velocity and acceleration.
    #[default]
    Position,
    /// Reach target velocity and acceleration; position is free.
    Velocity,
    /// Reach target acceleration; position and velocity are free.
    Acceleration,
}

/// How the per-axis durations are coupled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Synchronization {
    /// Every enabled axis finishes at the common duration.
    #[default]
    Time,
    /// Only axes with a moving target are stretched to the common duration.
    TimeIfNecessary,
    /// Axes follow a scaled copy of the limiting axis when their boundary
    /// conditions are collinear; otherwise behaves like `Time`.
    Phase,
    /// Every axis follows its own time-optimal profile.
    None,
}

/// Whether the total duration is rounded up to the control cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DurationDiscretization {
    #[default]
    Continuous,
    Discrete,
}

// ─── Axis Limits ────────────────────────────────────────────────────

/// Kinematic limits of one axis.
///
/// `min_*` values default to the negated maximum, so symmetric limits only
/// need the three `max_*` fields.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisLimits {
    /// Maximum velocity [units/s], > 0.
    pub max_velocity: f64,
    /// Minimum velocity [units/s], < 0. Defaults to `-max_velocity`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_velocity: Option<f64>,
    /// Maximum acceleration [units/s²], > 0.
    pub max_acceleration: f64,
    /// Minimum acceleration [units/s²], < 0. Defaults to `-max_acceleration`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_acceleration: Option<f64>,
    /// Maximum jerk magnitude [units/s³], > 0.
    pub max_jerk: f64,
    /// Lower position bound, checked on the planned motion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_position: Option<f64>,
    /// Upper position bound, checked on the planned motion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_position: Option<f64>,
}

impl AxisLimits {
    /// Symmetric limits without position bounds.
    pub const fn symmetric(velocity: f64, acceleration: f64, jerk: f64) -> Self {
        Self {
            max_velocity: velocity,
            min_velocity: None,
            max_acceleration: acceleration,
            min_acceleration: None,
            max_jerk: jerk,
            min_position: None,
            max_position: None,
        }
    }

    /// `(min, max)` velocity.
    #[inline]
    pub fn velocity_range(&self) -> (f64, f64) {
        (
            self.min_velocity.unwrap_or(-self.max_velocity),
            self.max_velocity,
        )
    }

    /// `(min, max)` acceleration.
    #[inline]
    pub fn acceleration_range(&self) -> (f64, f64) {
        (
            self.min_acceleration.unwrap_or(-self.max_acceleration),
            self.max_acceleration,
        )
    }

    /// True when any position bound is configured.
    #[inline]
    pub fn has_position_bounds(&self) -> bool {
        self.min_position.is_some() || self.max_position.is_some()
    }

    /// Check signs and finiteness.
    pub fn validate(&self, axis: usize) -> Result<(), InputError> {
        let positive = [
            ("max_velocity", self.max_velocity),
            ("max_acceleration", self.max_acceleration),
            ("max_jerk", self.max_jerk),
        ];
        for (limit, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(InputError::InvalidLimit { axis, limit, value });
            }
        }

        let negative = [
            ("min_velocity", self.min_velocity),
            ("min_acceleration", self.min_acceleration),
        ];
        for (limit, value) in negative {
            match value {
                Some(value) if !(value.is_finite() && value < 0.0) => {
                    return Err(InputError::InvalidLimit { axis, limit, value });
                }
                _ => {}
            }
        }

        for (limit, value) in [
            ("min_position", self.min_position),
            ("max_position", self.max_position),
        ] {
            match value {
                Some(value) if !value.is_finite() => {
                    return Err(InputError::InvalidLimit { axis, limit, value });
                }
                _ => {}
            }
        }
        match (self.min_position, self.max_position) {
            (Some(lo), Some(hi)) if lo > hi => Err(InputError::InvalidLimit {
                axis,
                limit: "min_position",
                value: lo,
            }),
            _ => Ok(()),
        }
    }
}

// ─── Motion Request ─────────────────────────────────────────────────

/// Inputs of one planning cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotionRequest {
    /// Current state per axis. Its length fixes the axis count.
    pub current: AxisVec<KinematicState>,
    /// Target state per axis.
    pub target: AxisVec<KinematicState>,
    /// Intermediate positions between current and target.
    #[serde(default)]
    pub waypoints: Vec<Waypoint, MAX_WAYPOINTS>,
    /// Limits per axis. Scenario files may omit them to use the configured
    /// axis limits.
    #[serde(default)]
    pub limits: AxisVec<AxisLimits>,
    /// Enable flag per axis. Empty means all enabled.
    #[serde(default)]
    pub enabled: AxisVec<bool>,
    #[serde(default)]
    pub interface: ControlInterface,
    #[serde(default)]
    pub synchronization: Synchronization,
    #[serde(default)]
    pub discretization: DurationDiscretization,
    /// Lower bound on the total duration [s].
    #[serde(default)]
    pub minimum_duration: Option<f64>,
    /// Per-axis deviation allowed when collapsing waypoints.
    #[serde(default)]
    pub waypoint_filter: Option<AxisVec<f64>>,
}

impl MotionRequest {
    /// Request with every axis at rest at zero, targeting zero.
    pub fn new(limits: &[AxisLimits]) -> Result<Self, InputError> {
        let count = limits.len();
        let too_many = InputError::AxisCountMismatch {
            expected: MAX_AXES,
            actual: count,
        };
        let limits = AxisVec::from_slice(limits).map_err(|_| too_many)?;
        let mut states = AxisVec::new();
        states
            .resize(count, KinematicState::ZERO)
            .map_err(|_| too_many)?;

        Ok(Self {
            current: states.clone(),
            target: states,
            waypoints: Vec::new(),
            limits,
            enabled: AxisVec::new(),
            interface: ControlInterface::default(),
            synchronization: Synchronization::default(),
            discretization: DurationDiscretization::default(),
            minimum_duration: None,
            waypoint_filter: None,
        })
    }

    /// Number of axes, as implied by the current state.
    #[inline]
    pub fn axis_count(&self) -> usize {
        self.current.len()
    }

    #[inline]
    pub fn is_enabled(&self, axis: usize) -> bool {
        self.enabled.get(axis).copied().unwrap_or(true)
    }

    /// Append a waypoint.
    pub fn push_waypoint(&mut self, position: &[f64]) -> Result<(), InputError> {
        let index = self.waypoints.len();
        let point = Waypoint::from_slice(position).map_err(|_| InputError::WaypointDimension {
            index,
            expected: self.axis_count(),
            actual: position.len(),
        })?;
        self.waypoints
            .push(point)
            .map_err(|_| InputError::TooManyWaypoints {
                count: index + 1,
                capacity: MAX_WAYPOINTS,
            })
    }

    /// True when everything except the current state matches `other`.
    pub fn same_goal(&self, other: &Self) -> bool {
        self.target == other.target
            && self.waypoints == other.waypoints
            && self.limits == other.limits
            && self.enabled == other.enabled
            && self.interface == other.interface
            && self.synchronization == other.synchronization
            && self.discretization == other.discretization
            && self.minimum_duration == other.minimum_duration
            && self.waypoint_filter == other.waypoint_filter
    }

    /// Validate against the engine's fixed shape.
    ///
    /// O(axes + waypoints). Nothing is clamped: the first violation found
    /// is returned.
    pub fn validate(
        &self,
        axis_count: usize,
        waypoint_capacity: usize,
        cycle_time: f64,
    ) -> Result<(), InputError> {
        if self.current.len() != axis_count {
            return Err(InputError::AxisCountMismatch {
                expected: axis_count,
                actual: self.current.len(),
            });
        }
        check_len("target", self.target.len(), axis_count)?;
        check_len("limits", self.limits.len(), axis_count)?;
        if !self.enabled.is_empty() {
            check_len("enabled", self.enabled.len(), axis_count)?;
        }

        for (axis, limits) in self.limits.iter().enumerate() {
            limits.validate(axis)?;
        }
        for (axis, (current, target)) in self.current.iter().zip(&self.target).enumerate() {
            check_state(axis, "current", current)?;
            check_state(axis, "target", target)?;
        }

        if self.waypoints.len() > waypoint_capacity {
            return Err(InputError::TooManyWaypoints {
                count: self.waypoints.len(),
                capacity: waypoint_capacity,
            });
        }
        if !self.waypoints.is_empty() && self.interface != ControlInterface::Position {
            return Err(InputError::WaypointsRequirePosition);
        }
        for (index, point) in self.waypoints.iter().enumerate() {
            if point.len() != axis_count {
                return Err(InputError::WaypointDimension {
                    index,
                    expected: axis_count,
                    actual: point.len(),
                });
            }
            if let Some(axis) = point.iter().position(|p| !p.is_finite()) {
                return Err(InputError::NonFinite {
                    axis,
                    field: "waypoint",
                });
            }
        }

        if let Some(thresholds) = &self.waypoint_filter {
            check_len("waypoint_filter", thresholds.len(), axis_count)?;
            for (axis, &value) in thresholds.iter().enumerate() {
                if !(value.is_finite() && value >= 0.0) {
                    return Err(InputError::InvalidThreshold { axis, value });
                }
            }
        }

        if self.discretization == DurationDiscretization::Discrete
            && !(cycle_time.is_finite() && cycle_time > 0.0)
        {
            return Err(InputError::NonPositiveCycleTime(cycle_time));
        }
        match self.minimum_duration {
            Some(minimum) if !(minimum.is_finite() && minimum >= 0.0) => {
                Err(InputError::InvalidMinimumDuration(minimum))
            }
            _ => Ok(()),
        }
    }
}

fn check_len(field: &'static str, actual: usize, expected: usize) -> Result<(), InputError> {
    if actual == expected {
        Ok(())
    } else {
        Err(InputError::FieldLength {
            field,
            expected,
            actual,
        })
    }
}

fn check_state(axis: usize, field: &'static str, state: &KinematicState) -> Result<(), InputError> {
    if state.is_finite() {
        Ok(())
    } else {
        Err(InputError::NonFinite { axis, field })
    }
}
