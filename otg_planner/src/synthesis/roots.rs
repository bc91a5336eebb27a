//! Bounded root-finding helpers and numeric tolerances.
//!
//! Every search in the planner goes through these helpers, so the work per
//! plan is capped by [`BRACKET_POINTS`] and [`BISECTION_ITERATIONS`]
//! regardless of the request.

use heapless::Vec;

/// Number of grid points used to bracket a root before bisection.
pub const BRACKET_POINTS: usize = 16;

/// Bisection iteration cap.
pub const BISECTION_ITERATIONS: usize = 64;

/// Relative tolerance below which a negative discriminant is treated as zero.
pub const DISCRIMINANT_EPS: f64 = 1e-12;

/// Duration tolerance [s].
pub const TIME_EPS: f64 = 1e-9;

/// Position tolerance, scaled by `max(1, |distance|)`.
pub const POSITION_EPS: f64 = 1e-8;

/// Velocity and acceleration tolerance, scaled by `max(1, |value|)`.
pub const STATE_EPS: f64 = 1e-8;

/// Square root with near-zero negative radicands clamped to zero.
///
/// `scale` is the magnitude of the terms that produced `x`; a radicand
/// more negative than `DISCRIMINANT_EPS * scale` yields `None`.
#[inline]
pub fn clamped_sqrt(x: f64, scale: f64) -> Option<f64> {
    if x >= 0.0 {
        Some(x.sqrt())
    } else if x > -DISCRIMINANT_EPS * scale.abs().max(1.0) {
        Some(0.0)
    } else {
        None
    }
}

/// Scaled tolerance for comparing two values of magnitude around `reference`.
#[inline]
pub fn tolerance(eps: f64, reference: f64) -> f64 {
    eps * reference.abs().max(1.0)
}

/// Narrow `[lo, hi]` onto the boundary of `pred`.
///
/// Expects `pred(lo)` true and `pred(hi)` false; returns the final bracket
/// with the same property. Stops early once the midpoint no longer moves.
pub fn bisect_boundary(mut lo: f64, mut hi: f64, mut pred: impl FnMut(f64) -> bool) -> (f64, f64) {
    for _ in 0..BISECTION_ITERATIONS {
        let mid = 0.5 * (lo + hi);
        if mid == lo || mid == hi {
            break;
        }
        if pred(mid) {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    (lo, hi)
}

/// Real roots of `a·t² + b·t + c` that lie strictly inside `(0, end)`.
pub fn quadratic_roots_in(a: f64, b: f64, c: f64, end: f64) -> Vec<f64, 2> {
    let mut roots = Vec::new();
    let mut keep = |t: f64| {
        if t > 0.0 && t < end {
            // Capacity is two and at most two roots are offered.
            let _ = roots.push(t);
        }
    };

    if a == 0.0 {
        if b != 0.0 {
            keep(-c / b);
        }
    } else if let Some(root) = clamped_sqrt(b * b - 4.0 * a * c, b * b + (4.0 * a * c).abs()) {
        // Numerically stable form: avoids cancellation when b² ≫ 4ac.
        let q = -0.5 * (b + b.signum() * root);
        if q == 0.0 {
            keep(0.0);
        } else {
            keep(q / a);
            keep(c / q);
        }
    }
    roots
}
