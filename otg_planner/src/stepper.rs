//! Per-cycle stepper.
//!
//! Called once per control cycle with the caller's current request. The
//! stepper replans only when the request differs from the one it accepted,
//! then advances its clock by one cycle and samples the active trajectory.
//!
//! ## State Machine
//!
//! ```text
//! Unplanned ──plan──▶ Tracking ──duration reached──▶ Finished
//!                        ▲                               │
//!                        └──────── changed request ──────┘
//! ```
//!
//! Two trajectory buffers are allocated at construction. A replan writes
//! into the scratch buffer and the buffers are swapped only on success, so
//! a rejected or interrupted plan never disturbs the motion in progress.

use std::time::{Duration, Instant};

use otg_common::kinematics::KinematicState;
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::PlannerConfig;
use crate::error::PlanError;
use crate::interrupt::{Deadline, Either, Interrupt, NeverInterrupt};
use crate::request::{AxisVec, MotionRequest};
use crate::synthesis::roots::TIME_EPS;
use crate::synthesizer::{PlanOutcome, Synthesizer};
use crate::trajectory::{AxisSample, Trajectory};

// ─── Status ─────────────────────────────────────────────────────────

/// Result of one successful cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleStatus {
    /// Motion in progress.
    Working,
    /// The trajectory duration is reached; the final state is held.
    Finished,
}

/// Lifecycle state of a stepper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepperState {
    /// No trajectory accepted yet (or after `reset`).
    #[default]
    Unplanned,
    Tracking,
    Finished,
}

// ─── Cycle Result ───────────────────────────────────────────────────

/// Output of one cycle, written into caller storage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleResult {
    /// Time since the active trajectory was planned [s].
    pub time: f64,
    /// Sampled state, jerk and segment index per axis.
    pub axes: AxisVec<AxisSample>,
    /// Active section of the trajectory.
    pub section: usize,
    /// A new trajectory was accepted in this cycle.
    pub new_calculation: bool,
    /// The section or an axis segment advanced in this cycle.
    pub segment_changed: bool,
    /// Wall-clock time spent planning in this cycle.
    #[serde(with = "duration_us")]
    pub calculation_duration: Duration,
    /// A replan was interrupted; the previous trajectory is still followed.
    pub was_interrupted: bool,
    /// The active trajectory leaves a position bound (best-effort policy).
    pub limits_violated: bool,
    /// Total duration of the active trajectory [s].
    pub duration: f64,
}

impl CycleResult {
    /// Empty result sized for `axis_count` axes.
    pub fn new(axis_count: usize) -> Self {
        let mut axes = AxisVec::new();
        // Excess axes are dropped here and rejected by request validation.
        let _ = axes.resize(axis_count.min(axes.capacity()), AxisSample::default());
        Self {
            time: 0.0,
            axes,
            section: 0,
            new_calculation: false,
            segment_changed: false,
            calculation_duration: Duration::ZERO,
            was_interrupted: false,
            limits_violated: false,
            duration: 0.0,
        }
    }

    /// Feed the sampled state back as the current state of `request`.
    pub fn pass_to(&self, request: &mut MotionRequest) {
        for (current, sample) in request.current.iter_mut().zip(&self.axes) {
            *current = sample.state;
        }
    }

    fn begin_cycle(&mut self) {
        self.new_calculation = false;
        self.segment_changed = false;
        self.calculation_duration = Duration::ZERO;
        self.was_interrupted = false;
    }
}

mod duration_us {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_micros() as u64)
    }
}

// ─── Plan Statistics ────────────────────────────────────────────────

/// O(1) replan timing statistics.
#[derive(Debug, Clone, Serialize)]
pub struct PlanStats {
    /// Accepted plans.
    pub plan_count: u64,
    /// Plans rejected with an error.
    pub rejected: u64,
    /// Plans abandoned by an interrupt.
    pub interrupted: u64,
    /// Last plan duration [ns].
    pub last_ns: u64,
    pub min_ns: u64,
    pub max_ns: u64,
    /// Running sum for average computation.
    pub sum_ns: u64,
    /// Running sum of squares for stddev computation.
    pub sum_sq_ns: u128,
}

impl PlanStats {
    pub const fn new() -> Self {
        Self {
            plan_count: 0,
            rejected: 0,
            interrupted: 0,
            last_ns: 0,
            min_ns: u64::MAX,
            max_ns: 0,
            sum_ns: 0,
            sum_sq_ns: 0,
        }
    }

    /// Record an accepted plan. O(1), no allocation.
    #[inline]
    pub fn record(&mut self, elapsed: Duration) {
        let ns = elapsed.as_nanos().min(u64::MAX as u128) as u64;
        self.plan_count += 1;
        self.last_ns = ns;
        self.min_ns = self.min_ns.min(ns);
        self.max_ns = self.max_ns.max(ns);
        self.sum_ns = self.sum_ns.saturating_add(ns);
        self.sum_sq_ns = self.sum_sq_ns.saturating_add((ns as u128) * (ns as u128));
    }

    /// Average plan time [ns] (0 if nothing was planned).
    #[inline]
    pub fn avg_ns(&self) -> u64 {
        if self.plan_count == 0 {
            0
        } else {
            self.sum_ns / self.plan_count
        }
    }

    /// Standard deviation of the plan time [ns].
    pub fn stddev_ns(&self) -> f64 {
        if self.plan_count == 0 {
            return 0.0;
        }
        let n = self.plan_count as f64;
        let mean = self.sum_ns as f64 / n;
        (self.sum_sq_ns as f64 / n - mean * mean).max(0.0).sqrt()
    }
}

impl Default for PlanStats {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Playback ───────────────────────────────────────────────────────

/// Clock and sampling state of the active trajectory.
#[derive(Debug, Clone, Default)]
pub(crate) struct Playback {
    cycles: u64,
    section: usize,
    segments: AxisVec<usize>,
    last_sample: AxisVec<KinematicState>,
    limits_violated: bool,
}

impl Playback {
    /// Restart the clock on a freshly accepted trajectory.
    pub(crate) fn restart(&mut self, axis_count: usize, limits_violated: bool) {
        self.cycles = 0;
        self.section = 0;
        self.segments.clear();
        let _ = self.segments.resize(axis_count, 0);
        self.limits_violated = limits_violated;
    }

    /// True when `current` is the state sampled in the previous cycle.
    pub(crate) fn is_last_sample(&self, current: &[KinematicState]) -> bool {
        !self.last_sample.is_empty() && self.last_sample.as_slice() == current
    }

    /// Advance one cycle of `cycle_time` seconds and sample `trajectory`.
    pub(crate) fn advance(
        &mut self,
        trajectory: &Trajectory,
        cycle_time: f64,
        result: &mut CycleResult,
    ) -> CycleStatus {
        let axis_count = trajectory.axis_count();
        self.cycles += 1;
        let time = self.cycles as f64 * cycle_time;
        let duration = trajectory.duration();
        let finished = time >= duration - TIME_EPS;

        if result.axes.len() != axis_count {
            result.axes.clear();
            // Validated axis counts fit MAX_AXES.
            let _ = result.axes.resize(axis_count, AxisSample::default());
        }
        // Past the end every axis holds its exact final state.
        let at = if finished { f64::INFINITY } else { time };
        let section = trajectory.sample(at, &mut result.axes);

        let advanced = section > self.section
            || (section == self.section
                && result
                    .axes
                    .iter()
                    .zip(&self.segments)
                    .any(|(sample, &last)| sample.segment > last));
        result.segment_changed |= advanced;
        if section != self.section {
            self.segments.iter_mut().for_each(|s| *s = 0);
        }
        self.section = section;
        for (last, sample) in self.segments.iter_mut().zip(&result.axes) {
            *last = (*last).max(sample.segment);
        }

        self.last_sample.clear();
        for sample in &result.axes {
            let _ = self.last_sample.push(sample.state);
        }

        result.time = time;
        result.section = section;
        result.duration = duration;
        result.limits_violated = self.limits_violated;
        if finished {
            CycleStatus::Finished
        } else {
            CycleStatus::Working
        }
    }
}

// ─── Stepper ────────────────────────────────────────────────────────

/// Online trajectory generator for one axis group.
///
/// Not reentrant: one `step` per control cycle from a single thread.
#[derive(Debug)]
pub struct Stepper {
    synthesizer: Synthesizer,
    plan_budget: Option<Duration>,
    active: Box<Trajectory>,
    scratch: Box<Trajectory>,
    accepted: Option<Box<MotionRequest>>,
    playback: Playback,
    state: StepperState,
    stats: PlanStats,
}

impl Stepper {
    /// Stepper for `axis_count` axes at `cycle_time` per step.
    pub fn new(axis_count: usize, cycle_time: Duration) -> Self {
        Self::with_synthesizer(Synthesizer::new(axis_count, cycle_time))
    }

    /// Stepper around a preconfigured synthesizer.
    pub fn with_synthesizer(synthesizer: Synthesizer) -> Self {
        Self {
            synthesizer,
            plan_budget: None,
            active: Box::new(Trajectory::new()),
            scratch: Box::new(Trajectory::new()),
            accepted: None,
            playback: Playback::default(),
            state: StepperState::Unplanned,
            stats: PlanStats::new(),
        }
    }

    /// Stepper shaped by a validated configuration.
    pub fn from_config(config: &PlannerConfig) -> Self {
        let mut stepper = Self::with_synthesizer(Synthesizer::from_config(config));
        stepper.plan_budget = config.planner.plan_budget();
        stepper
    }

    /// Abandon replans that take longer than `budget`.
    pub fn with_plan_budget(mut self, budget: Duration) -> Self {
        self.plan_budget = Some(budget);
        self
    }

    #[inline]
    pub fn synthesizer(&self) -> &Synthesizer {
        &self.synthesizer
    }

    #[inline]
    pub fn status(&self) -> StepperState {
        self.state
    }

    #[inline]
    pub fn stats(&self) -> &PlanStats {
        &self.stats
    }

    /// The trajectory currently followed.
    #[inline]
    pub fn trajectory(&self) -> &Trajectory {
        &self.active
    }

    /// Run one control cycle.
    pub fn step(
        &mut self,
        request: &MotionRequest,
        result: &mut CycleResult,
    ) -> Result<CycleStatus, PlanError> {
        self.step_with_interrupt(request, result, &NeverInterrupt)
    }

    /// Run one control cycle; a replan polls `interrupt` between phases.
    pub fn step_with_interrupt<I: Interrupt + ?Sized>(
        &mut self,
        request: &MotionRequest,
        result: &mut CycleResult,
        interrupt: &I,
    ) -> Result<CycleStatus, PlanError> {
        result.begin_cycle();
        if self.has_changed(request) {
            self.replan(request, result, interrupt)?;
        }

        let status = self
            .playback
            .advance(&self.active, self.synthesizer.cycle_time(), result);
        self.state = match status {
            CycleStatus::Working => StepperState::Tracking,
            CycleStatus::Finished => StepperState::Finished,
        };
        Ok(status)
    }

    /// Forget the accepted request; the next step replans.
    pub fn reset(&mut self) {
        self.accepted = None;
        self.active.clear(0);
        self.playback = Playback::default();
        self.state = StepperState::Unplanned;
    }

    /// Plan `request` into `trajectory` without touching the stepper state.
    pub fn calculate(
        &self,
        request: &MotionRequest,
        trajectory: &mut Trajectory,
    ) -> Result<PlanOutcome, PlanError> {
        self.synthesizer
            .calculate(request, trajectory, &NeverInterrupt)
    }

    /// A request is unchanged when its goal matches the accepted one and its
    /// current state is either the accepted current state or the last
    /// sampled state fed back.
    fn has_changed(&self, request: &MotionRequest) -> bool {
        match &self.accepted {
            None => true,
            Some(accepted) => {
                !(accepted.same_goal(request)
                    && (accepted.current == request.current
                        || self.playback.is_last_sample(&request.current)))
            }
        }
    }

    fn replan<I: Interrupt + ?Sized>(
        &mut self,
        request: &MotionRequest,
        result: &mut CycleResult,
        interrupt: &I,
    ) -> Result<(), PlanError> {
        let started = Instant::now();
        let deadline = self.plan_budget.map(Deadline::after);
        let outcome = self
            .synthesizer
            .calculate(request, &mut self.scratch, &Either(interrupt, deadline));
        let elapsed = started.elapsed();
        result.calculation_duration = elapsed;

        match outcome {
            Ok(outcome) => {
                std::mem::swap(&mut self.active, &mut self.scratch);
                match &mut self.accepted {
                    Some(accepted) => (**accepted).clone_from(request),
                    None => self.accepted = Some(Box::new(request.clone())),
                }
                self.playback
                    .restart(request.axis_count(), outcome.limits_violated);
                self.stats.record(elapsed);
                result.new_calculation = true;
                debug!(
                    duration = self.active.duration(),
                    sections = self.active.sections().len(),
                    removed_waypoints = outcome.removed_waypoints,
                    elapsed_us = elapsed.as_micros() as u64,
                    "trajectory replanned"
                );
                Ok(())
            }
            Err(PlanError::Interrupted) => {
                self.stats.interrupted += 1;
                if self.active.is_planned() {
                    warn!("replan interrupted, keeping previous trajectory");
                    result.was_interrupted = true;
                    Ok(())
                } else {
                    warn!("planning interrupted before any trajectory existed");
                    Err(PlanError::Interrupted)
                }
            }
            Err(e) => {
                self.stats.rejected += 1;
                warn!(category = e.category(), "plan rejected: {e}");
                Err(e)
            }
        }
    }
}
