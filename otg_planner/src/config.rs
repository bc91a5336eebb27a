//! Planner configuration loaded from TOML.
//!
//! ```toml
//! [shared]
//! service_name = "otg-planner"
//!
//! [planner]
//! cycle_time_us = 1000
//! axis_count = 2
//! limit_policy = "reject"
//!
//! [[axes]]
//! name = "x"
//! max_velocity = 1.0
//! max_acceleration = 1.0
//! max_jerk = 1.0
//! ```
//!
//! Numeric parameters are checked against const bounds. Optional fields use
//! `#[serde(default)]`.

use std::path::Path;
use std::time::Duration;

use otg_common::config::{ConfigError, ConfigLoader, SharedConfig};
use otg_common::consts::{CYCLE_TIME_US, CYCLE_TIME_US_MAX, CYCLE_TIME_US_MIN, MAX_AXES, MAX_WAYPOINTS};
use serde::{Deserialize, Serialize};

use crate::error::InputError;
use crate::request::{AxisLimits, MotionRequest};

/// Upper bound for the planning budget [µs].
pub const PLAN_BUDGET_US_MAX: u64 = 1_000_000;

// ─── Limit Policy ───────────────────────────────────────────────────

/// What to do with a plan that leaves the configured position bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitPolicy {
    /// Reject the plan and keep the previous trajectory.
    #[default]
    Reject,
    /// Accept the plan and flag `limits_violated` in the cycle result.
    BestEffort,
}

// ─── [planner] ──────────────────────────────────────────────────────

/// Engine shape and timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannerSection {
    /// Control cycle [µs] (default: 1000 = 1 ms).
    #[serde(default = "default_cycle_time_us")]
    pub cycle_time_us: u64,

    /// Number of axes in the synchronized group.
    pub axis_count: usize,

    /// Maximum waypoints per request (default: `MAX_WAYPOINTS`).
    #[serde(default = "default_waypoint_capacity")]
    pub waypoint_capacity: usize,

    /// Wall-clock budget for one replan [µs]. Unset means unbounded.
    #[serde(default)]
    pub plan_budget_us: Option<u64>,

    #[serde(default)]
    pub limit_policy: LimitPolicy,
}

fn default_cycle_time_us() -> u64 {
    CYCLE_TIME_US
}
fn default_waypoint_capacity() -> usize {
    MAX_WAYPOINTS
}

impl PlannerSection {
    #[inline]
    pub fn cycle_time(&self) -> Duration {
        Duration::from_micros(self.cycle_time_us)
    }

    #[inline]
    pub fn plan_budget(&self) -> Option<Duration> {
        self.plan_budget_us.map(Duration::from_micros)
    }

    /// Validate parameter bounds.
    pub fn validate(&self) -> Result<(), String> {
        if self.cycle_time_us < CYCLE_TIME_US_MIN || self.cycle_time_us > CYCLE_TIME_US_MAX {
            return Err(format!(
                "cycle_time_us {} out of range [{}, {}]",
                self.cycle_time_us, CYCLE_TIME_US_MIN, CYCLE_TIME_US_MAX
            ));
        }
        if self.axis_count == 0 || self.axis_count > MAX_AXES {
            return Err(format!(
                "axis_count {} out of range [1, {}]",
                self.axis_count, MAX_AXES
            ));
        }
        if self.waypoint_capacity > MAX_WAYPOINTS {
            return Err(format!(
                "waypoint_capacity {} exceeds {}",
                self.waypoint_capacity, MAX_WAYPOINTS
            ));
        }
        if let Some(budget) = self.plan_budget_us {
            if budget == 0 || budget > PLAN_BUDGET_US_MAX {
                return Err(format!(
                    "plan_budget_us {} out of range [1, {}]",
                    budget, PLAN_BUDGET_US_MAX
                ));
            }
        }
        Ok(())
    }
}

// ─── [[axes]] ───────────────────────────────────────────────────────

/// One named axis and its limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AxisConfig {
    pub name: String,
    #[serde(flatten)]
    pub limits: AxisLimits,
}

// ─── Top-Level Config ───────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannerConfig {
    pub shared: SharedConfig,
    pub planner: PlannerSection,
    #[serde(default)]
    pub axes: Vec<AxisConfig>,
}

impl PlannerConfig {
    /// Validate every section and the axis table.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.shared.validate()?;
        self.planner.validate().map_err(ConfigError::ValidationError)?;

        if self.axes.len() != self.planner.axis_count {
            return Err(ConfigError::ValidationError(format!(
                "{} [[axes]] entries for axis_count {}",
                self.axes.len(),
                self.planner.axis_count
            )));
        }
        for (index, axis) in self.axes.iter().enumerate() {
            if axis.name.is_empty() {
                return Err(ConfigError::ValidationError(format!(
                    "axis {index}: name cannot be empty"
                )));
            }
            if self.axes[..index].iter().any(|a| a.name == axis.name) {
                return Err(ConfigError::ValidationError(format!(
                    "duplicate axis name '{}'",
                    axis.name
                )));
            }
            axis.limits
                .validate(index)
                .map_err(|e| ConfigError::ValidationError(e.to_string()))?;
        }
        Ok(())
    }

    /// Axis names in configuration order.
    pub fn axis_names(&self) -> impl Iterator<Item = &str> {
        self.axes.iter().map(|a| a.name.as_str())
    }

    /// Request with the configured limits, every axis at rest at zero.
    pub fn request_template(&self) -> Result<MotionRequest, InputError> {
        let limits: heapless::Vec<AxisLimits, MAX_AXES> = self
            .axes
            .iter()
            .take(MAX_AXES)
            .map(|a| a.limits)
            .collect();
        MotionRequest::new(&limits)
    }
}

/// Load and validate a planner configuration file.
pub fn load_config(path: &Path) -> Result<PlannerConfig, ConfigError> {
    let config = PlannerConfig::load(path)?;
    config.validate()?;
    Ok(config)
}

/// Parse and validate a planner configuration from a string.
pub fn load_config_from_str(content: &str) -> Result<PlannerConfig, ConfigError> {
    let config = PlannerConfig::from_toml(content)?;
    config.validate()?;
    Ok(config)
}
