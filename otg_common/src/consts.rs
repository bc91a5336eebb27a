//! System-wide constants for the OTG workspace.
//!
//! Single source of truth for all capacity limits and cycle-time bounds.
//! Every fixed-capacity buffer in the planner is sized from here.

use static_assertions::const_assert;

/// Maximum number of axes in one synchronized group.
pub const MAX_AXES: usize = 16;

/// Maximum number of intermediate waypoints per request.
pub const MAX_WAYPOINTS: usize = 32;

/// Maximum number of constant-jerk segments in one axis profile.
pub const MAX_SEGMENTS: usize = 7;

/// Maximum number of sections in a trajectory (one per waypoint leg).
pub const MAX_SECTIONS: usize = MAX_WAYPOINTS + 1;

/// Maximum number of points on a waypoint path (current + waypoints + target).
pub const MAX_PATH_POINTS: usize = MAX_WAYPOINTS + 2;

/// Default control cycle time in microseconds (1 kHz = 1000 µs).
pub const CYCLE_TIME_US: u64 = 1000;

/// Lower bound for a configured cycle time [µs].
pub const CYCLE_TIME_US_MIN: u64 = 50;

/// Upper bound for a configured cycle time [µs].
pub const CYCLE_TIME_US_MAX: u64 = 100_000;

/// Default configuration directory path.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/otg/config";

// Section indices and segment indices are reported as u8 in diagnostics.
const_assert!(MAX_SECTIONS <= u8::MAX as usize);
const_assert!(MAX_SEGMENTS == 7);
const_assert!(MAX_AXES > 0);
const_assert!(CYCLE_TIME_US_MIN <= CYCLE_TIME_US && CYCLE_TIME_US <= CYCLE_TIME_US_MAX);
