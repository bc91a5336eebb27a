//! Waypoint handling: path construction, filtering and section boundaries.
//!
//! The path of a request is `current → waypoints… → target`. Each leg becomes
//! one trajectory section. Interior points are passed with a velocity
//! estimated from the adjacent legs and zero acceleration.
//!
//! Filtering collapses interior points lying close to the chord between
//! their neighbours. A point is removed when some chord parameter
//! `s ∈ [0, 1]` keeps every axis within its threshold, measured against the
//! chord between its surviving neighbours in the list being scanned. Scans
//! repeat on the shortened list until nothing changes, which makes filtering
//! idempotent. The first and last points are never removed.

use heapless::Vec;
use otg_common::consts::MAX_PATH_POINTS;
use otg_common::kinematics::KinematicState;

use crate::request::{AxisLimits, AxisVec, MotionRequest, Waypoint};

/// Boundary states of every path point, one per axis.
pub type Boundaries = Vec<AxisVec<KinematicState>, MAX_PATH_POINTS>;

/// Positions along a path, with the first and last points fixed.
#[derive(Debug, Clone, PartialEq)]
pub struct WaypointPath {
    points: Vec<Waypoint, MAX_PATH_POINTS>,
}

impl WaypointPath {
    /// Path of a request that already passed validation.
    pub fn from_request(request: &MotionRequest) -> Self {
        let mut points = Vec::new();
        let positions = |states: &[KinematicState]| -> Waypoint {
            states.iter().map(|s| s.position).collect()
        };
        // Validation bounds the waypoint count below MAX_PATH_POINTS - 2.
        let _ = points.push(positions(&request.current));
        for waypoint in &request.waypoints {
            let _ = points.push(waypoint.clone());
        }
        let _ = points.push(positions(&request.target));
        Self { points }
    }

    /// Path through explicit points.
    pub fn from_points(points: Vec<Waypoint, MAX_PATH_POINTS>) -> Self {
        Self { points }
    }

    #[inline]
    pub fn points(&self) -> &[Waypoint] {
        &self.points
    }

    /// Number of legs, i.e. trajectory sections.
    #[inline]
    pub fn section_count(&self) -> usize {
        self.points.len().saturating_sub(1)
    }

    /// Remove interior points within `thresholds` of the chord between their
    /// neighbours. Returns the number of removed points.
    pub fn filter(&mut self, thresholds: &[f64]) -> usize {
        filter_waypoints(&mut self.points, thresholds)
    }

    /// Boundary state of every point for `request`'s axes.
    ///
    /// The first and last entries are the request's current and target
    /// states. Interior entries carry the estimated pass-through velocity.
    pub fn boundaries(&self, request: &MotionRequest, out: &mut Boundaries) {
        out.clear();
        let last = self.points.len().saturating_sub(1);
        for index in 0..self.points.len() {
            let states: AxisVec<KinematicState> = if index == 0 {
                request.current.clone()
            } else if index == last {
                request.target.clone()
            } else {
                (0..request.axis_count())
                    .map(|axis| {
                        let velocity = if request.is_enabled(axis) {
                            self.pass_velocity(index, axis, &request.limits[axis])
                        } else {
                            0.0
                        };
                        KinematicState::new(self.points[index][axis], velocity, 0.0)
                    })
                    .collect()
            };
            // `out` has the same capacity as `self.points`.
            let _ = out.push(states);
        }
    }

    /// Velocity of `axis` when passing interior point `index`.
    ///
    /// Zero on a reversal or next to an empty leg. Otherwise the smallest of
    /// the velocity limit and two reachable-from-rest estimates over half of
    /// the shorter adjacent leg.
    fn pass_velocity(&self, index: usize, axis: usize, limits: &AxisLimits) -> f64 {
        let here = self.points[index][axis];
        let before = here - self.points[index - 1][axis];
        let after = self.points[index + 1][axis] - here;
        if before * after <= 0.0 {
            return 0.0;
        }

        let direction = after.signum();
        let half_leg = 0.5 * before.abs().min(after.abs());
        let (vmin, vmax) = limits.velocity_range();
        let (amin, amax) = limits.acceleration_range();
        let speed_limit = if direction > 0.0 { vmax } else { -vmin };
        let acceleration = amax.min(-amin);

        let by_acceleration = (acceleration * half_leg).sqrt();
        let by_jerk = (half_leg * limits.max_jerk.sqrt() / 2.0).powf(2.0 / 3.0);
        direction * speed_limit.min(by_acceleration).min(by_jerk)
    }
}

// ─── Filter ─────────────────────────────────────────────────────────

/// Remove near-collinear interior points from `points` in place.
///
/// `thresholds` holds one allowed deviation per axis. Passes repeat until
/// one removes nothing, so filtered output is a fixed point. Returns the
/// number of removed points. Usable without a planner.
pub fn filter_waypoints<const N: usize>(
    points: &mut Vec<Waypoint, N>,
    thresholds: &[f64],
) -> usize {
    let before = points.len();
    while filter_pass(points, thresholds) > 0 {}
    before - points.len()
}

/// One left-to-right scan. Every scanned point between two survivors lies
/// within `thresholds` of their chord. Returns the number of removed points.
fn filter_pass<const N: usize>(points: &mut Vec<Waypoint, N>, thresholds: &[f64]) -> usize {
    let mut keep: Vec<bool, N> = Vec::new();
    for _ in 0..points.len() {
        let _ = keep.push(true);
    }

    let mut start = 0;
    for end in 1..points.len().saturating_sub(1) {
        if chord_covers(points, start, end + 1, thresholds) {
            keep[end] = false;
        } else {
            start = end;
        }
    }

    let before = points.len();
    let mut index = 0;
    points.retain(|_| {
        let kept = keep[index];
        index += 1;
        kept
    });
    before - points.len()
}

/// True when every point strictly between `start` and `end` lies within
/// `thresholds` of the chord `start → end`.
fn chord_covers(points: &[Waypoint], start: usize, end: usize, thresholds: &[f64]) -> bool {
    let (from, to) = (&points[start], &points[end]);
    points[start + 1..end].iter().all(|point| {
        let (mut lo, mut hi) = (0.0_f64, 1.0_f64);
        for (axis, &threshold) in thresholds.iter().enumerate() {
            let (Some(&s), Some(&e), Some(&p)) = (from.get(axis), to.get(axis), point.get(axis))
            else {
                continue;
            };
            let span = e - s;
            if span == 0.0 {
                if (p - s).abs() > threshold {
                    return false;
                }
                continue;
            }
            let a = (p - threshold - s) / span;
            let b = (p + threshold - s) / span;
            lo = lo.max(a.min(b));
            hi = hi.min(a.max(b));
            if lo > hi {
                return false;
            }
        }
        true
    })
}
