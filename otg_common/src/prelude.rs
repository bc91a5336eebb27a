//! Prelude module for common re-exports.
//!
//! ```rust
//! use otg_common::prelude::*;
//! ```

use std::time::Duration;

// ─── Logging ────────────────────────────────────────────────────────
pub use crate::config::LogLevel;

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{ConfigError, ConfigLoader, SharedConfig};

// ─── Capacities ─────────────────────────────────────────────────────
pub use crate::consts::{
    CYCLE_TIME_US, MAX_AXES, MAX_PATH_POINTS, MAX_SECTIONS, MAX_SEGMENTS, MAX_WAYPOINTS,
};

// ─── Kinematics ─────────────────────────────────────────────────────
pub use crate::kinematics::KinematicState;

/// Default control cycle time as Duration.
pub const DEFAULT_CYCLE_TIME: Duration = Duration::from_micros(CYCLE_TIME_US);
