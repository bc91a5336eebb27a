//! # OTG Planner Library
//!
//! Online jerk-limited trajectory generation for a synchronized group of
//! axes. Every control cycle the caller hands in a [`MotionRequest`]; the
//! [`Stepper`] replans when the request changed and returns the sampled
//! state of every axis for this cycle.
//!
//! ## Pipeline
//!
//! 1. **Waypoints** - path `current → waypoints → target`, optional filtering
//! 2. **Synthesis** - time-optimal constant-jerk profile per axis and section
//! 3. **Synchronization** - common section duration, per-axis refit
//! 4. **Stepping** - fixed-period sampling of the active trajectory
//!
//! ## Bounded Time
//!
//! Validation is O(axes + waypoints). Root finding uses fixed bracket and
//! bisection counts, synchronization retries are bounded by the axis count.
//! All per-axis and per-section storage is fixed-capacity; the stepper
//! allocates its trajectory buffers once.
//!
//! # Module Structure
//!
//! - [`request`] - motion request, limits, interface and policy enums
//! - [`profile`] - single-axis constant-jerk profile
//! - [`synthesis`] - single-axis time-optimal and fixed-duration synthesis
//! - [`sync`] - cross-axis synchronization policies
//! - [`waypoints`] - path boundaries and waypoint filtering
//! - [`trajectory`] - multi-section trajectory and sampling
//! - [`synthesizer`] - stateless request → trajectory orchestration
//! - [`stepper`] - per-cycle state machine
//! - [`offload`] - planning on a worker thread
//! - [`interrupt`] - cooperative interruption sources
//! - [`config`] - TOML planner configuration
//! - [`error`] - error types

pub mod config;
pub mod error;
pub mod interrupt;
pub mod offload;
pub mod profile;
pub mod request;
pub mod stepper;
pub mod sync;
pub mod synthesis;
pub mod synthesizer;
pub mod trajectory;
pub mod waypoints;

pub use config::{LimitPolicy, PlannerConfig, load_config, load_config_from_str};
pub use error::{InputError, PlanError, SynthesisError};
pub use interrupt::{Deadline, Interrupt, NeverInterrupt};
pub use offload::OffloadStepper;
pub use profile::{AxisProfile, ReachedLimits, Segment};
pub use request::{
    AxisLimits, ControlInterface, DurationDiscretization, MotionRequest, Synchronization,
};
pub use stepper::{CycleResult, CycleStatus, PlanStats, Stepper, StepperState};
pub use synthesizer::{PlanOutcome, Synthesizer};
pub use trajectory::{AxisSample, Section, Trajectory};
pub use waypoints::{WaypointPath, filter_waypoints};
