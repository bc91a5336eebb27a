//! Profile synthesizer: request in, complete trajectory out.
//!
//! Stateless orchestration of one plan:
//!
//! 1. validate the request against the engine shape
//! 2. build the waypoint path, filter it if requested
//! 3. per section: single-axis synthesis, then cross-axis synchronization
//! 4. distribute the caller minimum duration across sections
//! 5. evaluate the configured position bounds
//!
//! The interrupt is polled between these phases. Every loop is bounded by
//! the axis count and the section count.

use std::time::Duration;

use heapless::Vec;
use otg_common::consts::{MAX_AXES, MAX_SECTIONS, MAX_WAYPOINTS};
use otg_common::kinematics::KinematicState;
use tracing::{trace, warn};

use crate::config::{LimitPolicy, PlannerConfig};
use crate::error::{InputError, PlanError};
use crate::interrupt::Interrupt;
use crate::profile::AxisProfile;
use crate::request::{DurationDiscretization, MotionRequest};
use crate::sync::{AxisInput, SyncOptions, synchronize};
use crate::synthesis::AxisTask;
use crate::synthesis::roots::{POSITION_EPS, TIME_EPS, tolerance};
use crate::trajectory::{Section, Trajectory};
use crate::waypoints::{Boundaries, WaypointPath};

/// Side results of a successful plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PlanOutcome {
    /// The plan leaves a position bound and was accepted under
    /// [`LimitPolicy::BestEffort`].
    pub limits_violated: bool,
    /// Interior waypoints collapsed by the waypoint filter.
    pub removed_waypoints: usize,
}

/// Stateless trajectory planner for a fixed axis group.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Synthesizer {
    axis_count: usize,
    waypoint_capacity: usize,
    cycle_time: f64,
    limit_policy: LimitPolicy,
}

impl Synthesizer {
    /// Planner for `axis_count` axes stepped every `cycle_time`.
    pub fn new(axis_count: usize, cycle_time: Duration) -> Self {
        Self {
            axis_count,
            waypoint_capacity: MAX_WAYPOINTS,
            cycle_time: cycle_time.as_secs_f64(),
            limit_policy: LimitPolicy::default(),
        }
    }

    /// Planner shaped by a validated configuration.
    pub fn from_config(config: &PlannerConfig) -> Self {
        Self::new(config.planner.axis_count, config.planner.cycle_time())
            .with_waypoint_capacity(config.planner.waypoint_capacity)
            .with_limit_policy(config.planner.limit_policy)
    }

    /// Cap accepted waypoints (never above `MAX_WAYPOINTS`).
    pub fn with_waypoint_capacity(mut self, capacity: usize) -> Self {
        self.waypoint_capacity = capacity.min(MAX_WAYPOINTS);
        self
    }

    pub fn with_limit_policy(mut self, policy: LimitPolicy) -> Self {
        self.limit_policy = policy;
        self
    }

    #[inline]
    pub fn axis_count(&self) -> usize {
        self.axis_count
    }

    /// Control cycle [s].
    #[inline]
    pub fn cycle_time(&self) -> f64 {
        self.cycle_time
    }

    #[inline]
    pub fn limit_policy(&self) -> LimitPolicy {
        self.limit_policy
    }

    /// Validate `request` against this planner's shape. O(axes + waypoints).
    pub fn validate(&self, request: &MotionRequest) -> Result<(), InputError> {
        if !(self.cycle_time.is_finite() && self.cycle_time > 0.0) {
            return Err(InputError::NonPositiveCycleTime(self.cycle_time));
        }
        request.validate(self.axis_count, self.waypoint_capacity, self.cycle_time)
    }

    /// Plan `request` into `trajectory`.
    ///
    /// On error the content of `trajectory` is unspecified; callers plan into
    /// a scratch buffer and keep their previous trajectory.
    pub fn calculate<I: Interrupt + ?Sized>(
        &self,
        request: &MotionRequest,
        trajectory: &mut Trajectory,
        interrupt: &I,
    ) -> Result<PlanOutcome, PlanError> {
        self.validate(request)?;
        if interrupt.should_interrupt() {
            return Err(PlanError::Interrupted);
        }

        let mut path = WaypointPath::from_request(request);
        let removed_waypoints = match &request.waypoint_filter {
            Some(thresholds) => path.filter(thresholds),
            None => 0,
        };
        let mut boundaries = Boundaries::new();
        path.boundaries(request, &mut boundaries);

        let cycle_time = match request.discretization {
            DurationDiscretization::Continuous => None,
            DurationDiscretization::Discrete => Some(self.cycle_time),
        };
        self.plan_sections(request, &boundaries, cycle_time, None, trajectory, interrupt)?;

        // Stretch sections proportionally to honour the caller minimum.
        if let Some(minimum) = request.minimum_duration {
            let total = trajectory.duration();
            if minimum > total + TIME_EPS {
                let mut shares: Vec<f64, MAX_SECTIONS> = Vec::new();
                let count = trajectory.sections().len().max(1) as f64;
                for section in trajectory.sections() {
                    let share = if total > 0.0 {
                        minimum * section.duration() / total
                    } else {
                        minimum / count
                    };
                    let _ = shares.push(share);
                }
                trace!(minimum, total, "stretching sections to minimum duration");
                self.plan_sections(
                    request,
                    &boundaries,
                    cycle_time,
                    Some(&shares[..]),
                    trajectory,
                    interrupt,
                )?;
            }
        }

        let limits_violated = self.check_position_limits(request, trajectory)?;
        Ok(PlanOutcome {
            limits_violated,
            removed_waypoints,
        })
    }

    /// Plan every section, chaining each start from the previous section end.
    fn plan_sections<I: Interrupt + ?Sized>(
        &self,
        request: &MotionRequest,
        boundaries: &Boundaries,
        cycle_time: Option<f64>,
        minimums: Option<&[f64]>,
        trajectory: &mut Trajectory,
        interrupt: &I,
    ) -> Result<(), PlanError> {
        let axis_count = request.axis_count();
        trajectory.clear(axis_count);

        let mut starts: Vec<KinematicState, MAX_AXES> = request.current.clone();
        let mut tasks: Vec<AxisTask, MAX_AXES> = Vec::new();
        let mut optimal: Vec<AxisProfile, MAX_AXES> = Vec::new();

        for (section, goal) in boundaries.iter().skip(1).enumerate() {
            tasks.clear();
            optimal.clear();
            for axis in 0..axis_count {
                let task = AxisTask::new(
                    request.interface,
                    starts[axis],
                    goal[axis],
                    &request.limits[axis],
                );
                let profile = if request.is_enabled(axis) {
                    task.optimal()
                        .map_err(|source| PlanError::Synthesis {
                            axis,
                            section,
                            source,
                        })?
                } else {
                    AxisProfile::new(task.start)
                };
                // Both vectors hold MAX_AXES entries; the axis count is validated.
                let _ = tasks.push(task);
                let _ = optimal.push(profile);
            }
            if interrupt.should_interrupt() {
                return Err(PlanError::Interrupted);
            }

            let inputs: Vec<AxisInput<'_>, MAX_AXES> = tasks
                .iter()
                .zip(&optimal)
                .enumerate()
                .map(|(axis, (task, optimal))| AxisInput {
                    task,
                    optimal,
                    enabled: request.is_enabled(axis),
                })
                .collect();
            let options = SyncOptions {
                policy: request.synchronization,
                minimum: match minimums {
                    Some(shares) => shares.get(section).copied(),
                    None => request.minimum_duration.filter(|_| boundaries.len() == 2),
                },
                cycle_time,
            };

            let mut planned = Section::new();
            synchronize(section, &inputs, &options, &mut planned)?;
            trace!(section, duration = planned.duration(), "section synchronized");

            for (start, profile) in starts.iter_mut().zip(planned.profiles()) {
                *start = profile.end();
            }
            trajectory.push_section(planned).map_err(|_| {
                PlanError::InvalidInput(InputError::TooManyWaypoints {
                    count: section,
                    capacity: self.waypoint_capacity,
                })
            })?;

            if interrupt.should_interrupt() {
                return Err(PlanError::Interrupted);
            }
        }
        Ok(())
    }

    /// True when a bound is left and the policy accepts it.
    fn check_position_limits(
        &self,
        request: &MotionRequest,
        trajectory: &Trajectory,
    ) -> Result<bool, PlanError> {
        let mut violated = false;
        for (axis, limits) in request.limits.iter().enumerate() {
            if !limits.has_position_bounds() {
                continue;
            }
            let Some((reached_min, reached_max)) = trajectory.position_extrema(axis) else {
                continue;
            };
            let below = limits
                .min_position
                .is_some_and(|lo| reached_min < lo - tolerance(POSITION_EPS, lo));
            let above = limits
                .max_position
                .is_some_and(|hi| reached_max > hi + tolerance(POSITION_EPS, hi));
            if !(below || above) {
                continue;
            }

            match self.limit_policy {
                LimitPolicy::Reject => {
                    return Err(PlanError::PositionLimits {
                        axis,
                        reached_min,
                        reached_max,
                    });
                }
                LimitPolicy::BestEffort => {
                    warn!(
                        axis,
                        reached_min, reached_max, "planned motion exceeds position limits"
                    );
                    violated = true;
                }
            }
        }
        Ok(violated)
    }
}
