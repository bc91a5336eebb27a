//! Position interface: step to a cruise velocity, cruise, step to the target.
//!
//! Every position profile is `step(v0, a0 → vc, 0)`, a constant-velocity
//! cruise at `vc`, and `step(vc, 0 → vf, af)`. The cruise velocity is the
//! only unknown. For a given `vc` the two steps are closed form, and the
//! distance they leave over fixes the cruise time `(Δp − D(vc)) / vc`,
//! which must be non-negative.
//!
//! The optimal profile takes the largest-magnitude feasible `vc` in each
//! direction (the backward direction covers overshoot-then-return) and
//! keeps the faster one. A fixed-duration fit walks the branch connected
//! to `vc = 0`, where the duration grows without bound.

use heapless::Vec;
use static_assertions::const_assert;

use super::roots::{BRACKET_POINTS, POSITION_EPS, TIME_EPS, bisect_boundary, tolerance};
use super::velocity_step::{VelocityStep, velocity_step};
use super::{AxisTask, Blocked};
use crate::error::SynthesisError;
use crate::profile::{AxisProfile, ReachedLimits};

/// Smallest fraction of the branch edge tried when stretching.
const MIN_SPEED_FRACTION: f64 = 1e-9;

/// Octaves below the linear grid scanned for the connected edge.
const LOW_SPEED_OCTAVES: usize = 24;

/// Linear grid points up to the velocity limit.
const EDGE_GRID_POINTS: usize = 32;

const EDGE_GRID_CAPACITY: usize = LOW_SPEED_OCTAVES + EDGE_GRID_POINTS + 2;

// Every speed the optimal scan tries is also on the edge grid.
const_assert!(EDGE_GRID_POINTS % BRACKET_POINTS == 0);
const_assert!(LOW_SPEED_OCTAVES < u64::BITS as usize);

#[derive(Debug, Clone, Copy)]
struct Cruise {
    first: VelocityStep,
    second: VelocityStep,
    /// Time spent cruising.
    hold: f64,
    at_limit: bool,
}

impl Cruise {
    #[inline]
    fn duration(&self) -> f64 {
        self.first.duration() + self.hold + self.second.duration()
    }
}

/// The two steps through cruise velocity `vc` and the distance left over.
fn legs(task: &AxisTask, vc: f64) -> Result<(VelocityStep, VelocityStep, f64), SynthesisError> {
    let (s, t, b) = (&task.start, &task.target, &task.bounds);
    let first = velocity_step(
        s.velocity,
        s.acceleration,
        vc,
        0.0,
        b.max_acceleration,
        b.min_acceleration,
        b.jerk,
    )?;
    let second = velocity_step(
        vc,
        0.0,
        t.velocity,
        t.acceleration,
        b.max_acceleration,
        b.min_acceleration,
        b.jerk,
    )?;
    let residual =
        task.distance() - first.distance(s.velocity, s.acceleration) - second.distance(vc, 0.0);
    Ok((first, second, residual))
}

/// Cruise through `vc` if that leaves a non-negative cruise time.
fn cruise_at(task: &AxisTask, vc: f64) -> Option<Cruise> {
    if vc == 0.0 {
        return None;
    }
    let (first, second, residual) = legs(task, vc).ok()?;
    let hold = residual / vc;
    (hold >= 0.0).then_some(Cruise {
        first,
        second,
        hold,
        at_limit: false,
    })
}

fn build(task: &AxisTask, cruise: &Cruise) -> Result<AxisProfile, SynthesisError> {
    let mut profile = AxisProfile::new(task.start);
    cruise.first.append_to(&mut profile)?;
    profile.push(cruise.hold, 0.0)?;
    cruise.second.append_to(&mut profile)?;
    if cruise.at_limit && cruise.hold > 0.0 {
        profile.mark(ReachedLimits::VELOCITY);
    }
    task.finish(profile)
}

/// Fastest cruise in `direction` (±1), searched from the velocity limit down.
fn fastest_cruise(task: &AxisTask, direction: f64, rest_residual: f64) -> Option<Cruise> {
    let limit = task.bounds.velocity_limit(direction);
    let points = BRACKET_POINTS as f64;
    let refine = |feasible: f64, infeasible: f64| {
        let (speed, _) = bisect_boundary(feasible, infeasible, |speed| {
            cruise_at(task, direction * speed).is_some()
        });
        cruise_at(task, direction * speed)
    };

    let mut above = limit;
    for k in 0..BRACKET_POINTS {
        let speed = limit * (BRACKET_POINTS - k) as f64 / points;
        if let Some(cruise) = cruise_at(task, direction * speed) {
            if k == 0 {
                return Some(Cruise {
                    at_limit: true,
                    ..cruise
                });
            }
            return refine(speed, above);
        }
        above = speed;
    }

    // Feasible only below the first grid point.
    if direction * rest_residual > 0.0 {
        refine(0.0, limit / points)
    } else {
        None
    }
}

/// Time-optimal position profile.
pub(crate) fn plan(task: &AxisTask) -> Result<AxisProfile, SynthesisError> {
    let (first, second, rest_residual) = legs(task, 0.0)?;
    let mut best = None::<Cruise>;

    if rest_residual.abs() <= tolerance(POSITION_EPS, task.distance()) {
        best = Some(Cruise {
            first,
            second,
            hold: 0.0,
            at_limit: false,
        });
    }
    for direction in [1.0, -1.0] {
        if let Some(cruise) = fastest_cruise(task, direction, rest_residual) {
            if best.is_none_or(|b| cruise.duration() < b.duration()) {
                best = Some(cruise);
            }
        }
    }

    let cruise = best.ok_or(SynthesisError::NoSolution)?;
    build(task, &cruise)
}

/// Ascending speeds in `(0, limit]` scanned for the connected edge: octaves
/// towards zero, a linear grid up to the limit, and the two speeds at which
/// a boundary step collapses, where narrow feasible pockets open up.
fn edge_grid(task: &AxisTask, direction: f64, limit: f64) -> Vec<f64, EDGE_GRID_CAPACITY> {
    let (s, t, j) = (&task.start, &task.target, task.bounds.jerk);
    let mut grid = Vec::new();
    let linear = EDGE_GRID_POINTS as f64;
    for octave in (1..=LOW_SPEED_OCTAVES).rev() {
        let _ = grid.push(limit / linear / (1u64 << octave) as f64);
    }
    for k in 1..=EDGE_GRID_POINTS {
        let _ = grid.push(limit * k as f64 / linear);
    }
    let collapses = [
        s.velocity + s.acceleration * s.acceleration.abs() / (2.0 * j),
        t.velocity - t.acceleration * t.acceleration.abs() / (2.0 * j),
    ];
    for speed in collapses.map(|v| direction * v) {
        if speed > 0.0 && speed < limit {
            let _ = grid.push(speed);
        }
    }
    grid.sort_unstable_by(f64::total_cmp);
    grid
}

/// Outer edge of the feasible speeds connected to `vc = 0` in `direction`.
fn connected_edge(task: &AxisTask, direction: f64) -> Option<f64> {
    let limit = task.bounds.velocity_limit(direction);
    let feasible = |speed: f64| cruise_at(task, direction * speed).is_some();
    let mut last = 0.0;
    for speed in edge_grid(task, direction, limit) {
        if !feasible(speed) {
            let (edge, _) = bisect_boundary(last, speed, |s| feasible(s));
            return (edge > 0.0).then_some(edge);
        }
        last = speed;
    }
    Some(limit)
}

/// Profile cruising at `velocity` for whatever `duration` leaves after the
/// two steps, if that cruise covers the remaining distance.
fn hold_for(task: &AxisTask, velocity: f64, duration: f64) -> Option<AxisProfile> {
    let (first, second, residual) = legs(task, velocity).ok()?;
    let hold = duration - first.duration() - second.duration();
    let covered = (hold * velocity - residual).abs() <= tolerance(POSITION_EPS, task.distance());
    if hold < -TIME_EPS || !covered {
        return None;
    }
    build(
        task,
        &Cruise {
            first,
            second,
            hold: hold.max(0.0),
            at_limit: false,
        },
    )
    .ok()
}

/// Slow the cruise down until the profile lasts exactly `duration`.
///
/// Infeasible speeds count as fast, so the bracket never leaves the branch
/// below `edge` for a disconnected one.
fn stretch(task: &AxisTask, direction: f64, edge: f64, duration: f64) -> Option<AxisProfile> {
    let slower = |speed: f64| {
        cruise_at(task, direction * speed).is_some_and(|c| c.duration() > duration)
    };
    let (lo, hi) = bisect_boundary(edge * MIN_SPEED_FRACTION, edge, slower);
    [hi, lo]
        .into_iter()
        .find_map(|speed| hold_for(task, direction * speed, duration))
}

/// Position profile lasting `duration`.
pub(crate) fn fit(
    task: &AxisTask,
    duration: f64,
    optimal: &AxisProfile,
) -> Result<AxisProfile, Blocked> {
    let (first, second, rest_residual) = legs(task, 0.0).map_err(|_| Blocked::none())?;
    let base = first.duration() + second.duration();

    // The boundary steps cover the distance: wait at zero velocity between them.
    if rest_residual.abs() <= tolerance(POSITION_EPS, task.distance())
        && duration >= base - TIME_EPS
    {
        let rest = Cruise {
            first,
            second,
            hold: (duration - base).max(0.0),
            at_limit: false,
        };
        return build(task, &rest).map_err(|_| Blocked::none());
    }

    let mut next_feasible = None;
    if rest_residual != 0.0 {
        let direction = rest_residual.signum();
        if let Some(edge) = connected_edge(task, direction) {
            let fastest = cruise_at(task, direction * edge).map(|c| c.duration());
            match fastest {
                Some(fastest) if duration >= fastest - TIME_EPS => {
                    if let Some(profile) = stretch(task, direction, edge, duration) {
                        return Ok(profile);
                    }
                }
                Some(fastest) => next_feasible = Some(fastest),
                None => {}
            }
        }
    }

    // A target at rest can simply be held after arriving early.
    if task.target.is_at_rest() && !optimal.is_full() {
        let mut profile = optimal.clone();
        if profile.push(duration - optimal.duration(), 0.0).is_ok() {
            return Ok(profile);
        }
    }
    Err(Blocked { next_feasible })
}
