//! Error types of the planner.
//!
//! Three layers: request validation ([`InputError`]), single-axis synthesis
//! ([`SynthesisError`]) and the per-plan outcome ([`PlanError`]) that the
//! stepper hands back to its caller. None of them is retried internally.

use thiserror::Error;

/// A request failed validation. Never clamped or ignored.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum InputError {
    /// The request carries a different number of axes than the engine.
    #[error("axis count {actual} does not match configured {expected}")]
    AxisCountMismatch { expected: usize, actual: usize },

    /// A per-axis vector is shorter or longer than the axis count.
    #[error("{field}: {actual} entries, expected {expected}")]
    FieldLength {
        field: &'static str,
        expected: usize,
        actual: usize,
    },

    /// A limit is zero, has the wrong sign, or is not finite.
    #[error("axis {axis}: {limit} = {value} is not a valid limit")]
    InvalidLimit {
        axis: usize,
        limit: &'static str,
        value: f64,
    },

    /// A state or target component is NaN or infinite.
    #[error("axis {axis}: {field} is not finite")]
    NonFinite { axis: usize, field: &'static str },

    /// More waypoints than the pre-allocated capacity.
    #[error("{count} waypoints exceed capacity {capacity}")]
    TooManyWaypoints { count: usize, capacity: usize },

    /// A waypoint has a different dimension than the axis count.
    #[error("waypoint {index}: {actual} coordinates, expected {expected}")]
    WaypointDimension {
        index: usize,
        expected: usize,
        actual: usize,
    },

    /// Waypoints are positions; they need the position interface.
    #[error("waypoints require the position control interface")]
    WaypointsRequirePosition,

    /// A waypoint filter threshold is negative or not finite.
    #[error("axis {axis}: waypoint threshold {value} is invalid")]
    InvalidThreshold { axis: usize, value: f64 },

    /// Discrete durations need a positive cycle period.
    #[error("cycle time {0} s must be positive for discrete durations")]
    NonPositiveCycleTime(f64),

    /// The caller minimum duration is negative or not finite.
    #[error("minimum duration {0} s is invalid")]
    InvalidMinimumDuration(f64),
}

/// No feasible single-axis profile exists for the given boundary conditions.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum SynthesisError {
    /// A boundary acceleration lies outside `[min, max]`.
    #[error("boundary acceleration {value} outside [{min}, {max}]")]
    AccelerationOutOfRange { value: f64, min: f64, max: f64 },

    /// The target velocity lies outside `[min, max]`.
    #[error("target velocity {value} outside [{min}, {max}]")]
    TargetVelocityOutOfRange { value: f64, min: f64, max: f64 },

    /// A zero (or negative) limit was asked to produce motion.
    #[error("non-positive {0} limit cannot produce motion")]
    NonPositiveLimit(&'static str),

    /// The bounded search found no profile meeting the boundary conditions.
    #[error("no profile satisfies the boundary conditions")]
    NoSolution,
}

/// Outcome of a failed (re)plan.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum PlanError {
    /// Request rejected before planning.
    #[error("invalid input: {0}")]
    InvalidInput(#[from] InputError),

    /// One axis has no feasible profile on its own.
    #[error("axis {axis}, section {section}: {source}")]
    Synthesis {
        axis: usize,
        section: usize,
        #[source]
        source: SynthesisError,
    },

    /// No profile of the common duration exists for some axis.
    #[error("axis {axis}, section {section}: cannot span {duration} s")]
    SynchronizationFailed {
        axis: usize,
        section: usize,
        duration: f64,
    },

    /// The planned motion leaves the configured position bounds.
    #[error("axis {axis}: planned range [{reached_min}, {reached_max}] exceeds position limits")]
    PositionLimits {
        axis: usize,
        reached_min: f64,
        reached_max: f64,
    },

    /// Planning was interrupted before any trajectory existed.
    #[error("planning interrupted")]
    Interrupted,
}

impl PlanError {
    /// Short category name used in logs and CLI output.
    pub const fn category(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid-input",
            Self::Synthesis { .. } => "synthesis",
            Self::SynchronizationFailed { .. } => "synchronization",
            Self::PositionLimits { .. } => "position-limits",
            Self::Interrupted => "interrupted",
        }
    }
}
