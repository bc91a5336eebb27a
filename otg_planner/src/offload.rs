//! Planning on a worker thread.
//!
//! [`OffloadStepper`] behaves like [`Stepper`](crate::stepper::Stepper)
//! except that replans run on a background thread. The control cycle never
//! waits: while a plan is pending it keeps sampling the previous trajectory,
//! or holds the requested current state if there is none yet.
//!
//! Trajectory buffers travel between the cycle and the worker and are
//! recycled, so steady-state stepping does not allocate. At most one plan
//! is in flight. A newer request supersedes it: the worker abandons the old
//! plan at its next interrupt checkpoint and the newer request is submitted
//! once the buffer comes back.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, warn};

use crate::config::PlannerConfig;
use crate::error::PlanError;
use crate::interrupt::{Deadline, Either, Interrupt};
use crate::request::MotionRequest;
use crate::stepper::{CycleResult, CycleStatus, PlanStats, Playback, StepperState};
use crate::synthesizer::{PlanOutcome, Synthesizer};
use crate::trajectory::{AxisSample, Trajectory};

/// Errors starting the worker.
#[derive(Debug, Error)]
pub enum OffloadError {
    #[error("failed to spawn planning worker: {0}")]
    Spawn(#[from] std::io::Error),
}

struct Job {
    generation: u64,
    request: Box<MotionRequest>,
    buffer: Box<Trajectory>,
}

struct Reply {
    generation: u64,
    request: Box<MotionRequest>,
    buffer: Box<Trajectory>,
    outcome: Result<PlanOutcome, PlanError>,
    elapsed: Duration,
}

/// Interrupts a job once a newer generation was issued.
struct Superseded<'a> {
    latest: &'a AtomicU64,
    generation: u64,
}

impl Interrupt for Superseded<'_> {
    #[inline]
    fn should_interrupt(&self) -> bool {
        self.latest.load(Ordering::Relaxed) != self.generation
    }
}

/// Stepper whose replans run on a worker thread.
pub struct OffloadStepper {
    synthesizer: Synthesizer,
    jobs: Option<Sender<Job>>,
    replies: Receiver<Reply>,
    worker: Option<JoinHandle<()>>,
    latest: Arc<AtomicU64>,

    active: Box<Trajectory>,
    /// Buffer available for the next job; `None` while a job is in flight.
    spare: Option<Box<Trajectory>>,
    /// Request box available for the next job.
    spare_request: Option<Box<MotionRequest>>,
    /// Goal of the active trajectory.
    accepted: Option<Box<MotionRequest>>,
    /// Copy of the request being planned.
    pending: Option<Box<MotionRequest>>,
    in_flight: bool,

    playback: Playback,
    state: StepperState,
    stats: PlanStats,
}

impl OffloadStepper {
    /// Start a worker planning with `synthesizer`.
    pub fn spawn(
        synthesizer: Synthesizer,
        plan_budget: Option<Duration>,
    ) -> Result<Self, OffloadError> {
        let (jobs, job_rx) = mpsc::channel::<Job>();
        let (reply_tx, replies) = mpsc::channel::<Reply>();
        let latest = Arc::new(AtomicU64::new(0));

        let worker_latest = Arc::clone(&latest);
        let worker = std::thread::Builder::new()
            .name("otg-planner".into())
            .spawn(move || {
                while let Ok(mut job) = job_rx.recv() {
                    let started = Instant::now();
                    let superseded = Superseded {
                        latest: &worker_latest,
                        generation: job.generation,
                    };
                    let deadline = plan_budget.map(Deadline::after);
                    let outcome = synthesizer.calculate(
                        &job.request,
                        &mut job.buffer,
                        &Either(superseded, deadline),
                    );
                    let reply = Reply {
                        generation: job.generation,
                        request: job.request,
                        buffer: job.buffer,
                        outcome,
                        elapsed: started.elapsed(),
                    };
                    if reply_tx.send(reply).is_err() {
                        break;
                    }
                }
            })?;

        Ok(Self {
            synthesizer,
            jobs: Some(jobs),
            replies,
            worker: Some(worker),
            latest,
            active: Box::new(Trajectory::new()),
            spare: Some(Box::new(Trajectory::new())),
            spare_request: None,
            accepted: None,
            pending: None,
            in_flight: false,
            playback: Playback::default(),
            state: StepperState::Unplanned,
            stats: PlanStats::new(),
        })
    }

    /// Worker shaped by a validated configuration.
    pub fn from_config(config: &PlannerConfig) -> Result<Self, OffloadError> {
        Self::spawn(Synthesizer::from_config(config), config.planner.plan_budget())
    }

    #[inline]
    pub fn status(&self) -> StepperState {
        self.state
    }

    #[inline]
    pub fn stats(&self) -> &PlanStats {
        &self.stats
    }

    #[inline]
    pub fn trajectory(&self) -> &Trajectory {
        &self.active
    }

    /// True while a plan is being computed.
    #[inline]
    pub fn is_planning(&self) -> bool {
        self.in_flight
    }

    /// Run one control cycle without waiting for the worker.
    ///
    /// Invalid requests are rejected synchronously. A plan that fails on the
    /// worker is reported by the cycle that receives it.
    pub fn step(
        &mut self,
        request: &MotionRequest,
        result: &mut CycleResult,
    ) -> Result<CycleStatus, PlanError> {
        result.new_calculation = false;
        result.segment_changed = false;
        result.was_interrupted = false;
        result.calculation_duration = Duration::ZERO;

        self.collect(result)?;

        if self.has_changed(request) {
            self.synthesizer.validate(request)?;
            if self.in_flight {
                // Supersede the plan in flight; resubmitted once it returns.
                self.latest.fetch_add(1, Ordering::Relaxed);
            } else {
                self.submit(request);
            }
        }

        if !self.active.is_planned() {
            hold(request, result);
            return Ok(CycleStatus::Working);
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

    /// Forget the accepted request and any plan in flight.
    pub fn reset(&mut self) {
        self.latest.fetch_add(1, Ordering::Relaxed);
        self.accepted = None;
        self.active.clear(0);
        self.playback = Playback::default();
        self.state = StepperState::Unplanned;
    }

    fn has_changed(&self, request: &MotionRequest) -> bool {
        let reference = if self.in_flight {
            self.pending.as_deref()
        } else {
            self.accepted.as_deref()
        };
        !reference.is_some_and(|r| self.is_same(r, request))
    }

    /// Same goal, and the current state is unchanged or the fed-back sample.
    fn is_same(&self, reference: &MotionRequest, request: &MotionRequest) -> bool {
        reference.same_goal(request)
            && (reference.current == request.current
                || self.playback.is_last_sample(&request.current))
    }

    fn submit(&mut self, request: &MotionRequest) {
        let (Some(jobs), Some(buffer)) = (&self.jobs, self.spare.take()) else {
            return;
        };
        let generation = self.latest.fetch_add(1, Ordering::Relaxed) + 1;

        let mut boxed = self
            .spare_request
            .take()
            .unwrap_or_else(|| Box::new(request.clone()));
        (*boxed).clone_from(request);
        match &mut self.pending {
            Some(pending) => (**pending).clone_from(request),
            None => self.pending = Some(Box::new(request.clone())),
        }

        let job = Job {
            generation,
            request: boxed,
            buffer,
        };
        match jobs.send(job) {
            Ok(()) => {
                self.in_flight = true;
                debug!(generation, "plan submitted to worker");
            }
            Err(mpsc::SendError(job)) => {
                warn!("planning worker is gone");
                self.spare = Some(job.buffer);
                self.spare_request = Some(job.request);
            }
        }
    }

    /// Take a finished plan from the worker, if any.
    fn collect(&mut self, result: &mut CycleResult) -> Result<(), PlanError> {
        let reply = match self.replies.try_recv() {
            Ok(reply) => reply,
            Err(TryRecvError::Empty) => return Ok(()),
            Err(TryRecvError::Disconnected) => {
                self.in_flight = false;
                return Ok(());
            }
        };
        self.in_flight = false;
        let current = reply.generation == self.latest.load(Ordering::Relaxed);
        result.calculation_duration = reply.elapsed;

        match reply.outcome {
            Ok(outcome) if current => {
                let previous = std::mem::replace(&mut self.active, reply.buffer);
                self.spare = Some(previous);
                match &mut self.accepted {
                    Some(accepted) => (**accepted).clone_from(&reply.request),
                    None => self.accepted = Some(Box::new((*reply.request).clone())),
                }
                self.spare_request = Some(reply.request);
                self.playback
                    .restart(self.active.axis_count(), outcome.limits_violated);
                self.stats.record(reply.elapsed);
                result.new_calculation = true;
                debug!(
                    duration = self.active.duration(),
                    elapsed_us = reply.elapsed.as_micros() as u64,
                    "offloaded trajectory accepted"
                );
                Ok(())
            }
            Ok(_) | Err(PlanError::Interrupted) => {
                // Superseded or over budget.
                self.stats.interrupted += 1;
                result.was_interrupted = self.active.is_planned();
                self.spare = Some(reply.buffer);
                self.spare_request = Some(reply.request);
                Ok(())
            }
            Err(e) => {
                self.stats.rejected += 1;
                self.spare = Some(reply.buffer);
                self.spare_request = Some(reply.request);
                if current {
                    warn!(category = e.category(), "offloaded plan rejected: {e}");
                    Err(e)
                } else {
                    Ok(())
                }
            }
        }
    }
}

/// Report the requested current state with zero jerk.
fn hold(request: &MotionRequest, result: &mut CycleResult) {
    result.axes.clear();
    for state in &request.current {
        let _ = result.axes.push(AxisSample {
            state: *state,
            jerk: 0.0,
            segment: 0,
        });
    }
    result.time = 0.0;
    result.section = 0;
    result.duration = 0.0;
}

impl Drop for OffloadStepper {
    fn drop(&mut self) {
        // Closing the channel ends the worker loop.
        self.jobs = None;
        self.latest.fetch_add(1, Ordering::Relaxed);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}
