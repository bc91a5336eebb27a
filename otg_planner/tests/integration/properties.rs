//! Integration test: invariants over generated single- and multi-axis
//! requests.

use otg_common::kinematics::KinematicState;
use otg_planner::{
    AxisLimits, AxisProfile, MotionRequest, NeverInterrupt, Synchronization, Synthesizer,
    Trajectory,
};
use std::time::Duration;

use super::Lcg;

const CASES: usize = 60;

fn limits(rng: &mut Lcg) -> AxisLimits {
    AxisLimits::symmetric(rng.range(0.5, 2.0), rng.range(0.5, 3.0), rng.range(1.0, 10.0))
}

/// Start with zero acceleration and a velocity well inside the limit.
fn state(rng: &mut Lcg, limits: &AxisLimits, moving: bool) -> KinematicState {
    let velocity = if moving {
        rng.range(-0.5, 0.5) * limits.max_velocity
    } else {
        0.0
    };
    KinematicState::new(rng.range(-5.0, 5.0), velocity, 0.0)
}

fn request(rng: &mut Lcg, axes: usize) -> MotionRequest {
    let all: Vec<AxisLimits> = (0..axes).map(|_| limits(rng)).collect();
    let mut request = MotionRequest::new(&all).unwrap();
    for axis in 0..axes {
        request.current[axis] = state(rng, &all[axis], true);
        let moving = rng.next() < 0.3;
        request.target[axis] = state(rng, &all[axis], moving);
    }
    request
}

/// Limits whose negative side is 0.5 to 1.5 times the positive side.
fn asymmetric_limits(rng: &mut Lcg) -> AxisLimits {
    let mut limits = limits(rng);
    limits.min_velocity = Some(-limits.max_velocity * rng.range(0.5, 1.5));
    limits.min_acceleration = Some(-limits.max_acceleration * rng.range(0.5, 1.5));
    limits
}

/// Moving and accelerating state. Ramping the acceleration out changes the
/// velocity by at most a fifth of the tighter velocity limit, so every state
/// stays well inside the limits.
fn accelerating_state(rng: &mut Lcg, limits: &AxisLimits) -> KinematicState {
    let (vmin, vmax) = limits.velocity_range();
    let (amin, amax) = limits.acceleration_range();
    let speed = vmax.min(-vmin);
    let cap = (0.5 * amax.min(-amin)).min((0.4 * limits.max_jerk * speed).sqrt());
    KinematicState::new(
        rng.range(-5.0, 5.0),
        rng.range(-0.4, 0.4) * speed,
        rng.range(-cap, cap),
    )
}

fn accelerating_request(rng: &mut Lcg, axes: usize) -> MotionRequest {
    let all: Vec<AxisLimits> = (0..axes).map(|_| asymmetric_limits(rng)).collect();
    let mut request = MotionRequest::new(&all).unwrap();
    for axis in 0..axes {
        request.current[axis] = accelerating_state(rng, &all[axis]);
        request.target[axis] = accelerating_state(rng, &all[axis]);
    }
    request
}

fn plan(request: &MotionRequest) -> Trajectory {
    let mut trajectory = Trajectory::new();
    Synthesizer::new(request.axis_count(), Duration::from_millis(1))
        .calculate(request, &mut trajectory, &NeverInterrupt)
        .unwrap_or_else(|e| panic!("{e} for {request:?}"));
    trajectory
}

fn assert_within_limits(profile: &AxisProfile, limits: &AxisLimits) {
    let eps = 1e-6;
    let (vlo, vhi) = limits.velocity_range();
    let (alo, ahi) = limits.acceleration_range();
    let (vmin, vmax) = profile.velocity_extrema();
    let (amin, amax) = profile.acceleration_extrema();
    assert!(vmax <= vhi + eps, "vmax {vmax} > {vhi}");
    assert!(vmin >= vlo - eps, "vmin {vmin} < {vlo}");
    assert!(amax <= ahi + eps, "amax {amax} > {ahi}");
    assert!(amin >= alo - eps, "amin {amin} < {alo}");
    assert!(profile.peak_jerk() <= limits.max_jerk + eps);
}

fn assert_reaches(profile: &AxisProfile, target: &KinematicState) {
    let end = profile.sample(profile.duration()).state;
    assert!((end.position - target.position).abs() < 1e-7, "{end:?} != {target:?}");
    assert!((end.velocity - target.velocity).abs() < 1e-7, "{end:?} != {target:?}");
    assert!((end.acceleration - target.acceleration).abs() < 1e-7, "{end:?} != {target:?}");
}

fn assert_continuous(profile: &AxisProfile) {
    for pair in profile.segments().windows(2) {
        let end = pair[0].start.integrate(pair[0].jerk, pair[0].duration);
        let next = pair[1].start;
        let tol = |x: f64| 1e-9 * x.abs().max(1.0);
        assert!((end.position - next.position).abs() <= tol(next.position));
        assert!((end.velocity - next.velocity).abs() <= tol(next.velocity));
        assert!((end.acceleration - next.acceleration).abs() <= tol(next.acceleration));
    }
}

#[test]
fn single_axis_profiles_respect_limits() {
    let mut rng = Lcg::new(7);
    for _ in 0..CASES {
        let request = request(&mut rng, 1);
        let trajectory = plan(&request);
        let profile = &trajectory.sections()[0].profiles()[0];
        assert_within_limits(profile, &request.limits[0]);

        // Dense sampling agrees with the analytic extrema.
        let mut t = 0.0;
        while t <= profile.duration() {
            let s = profile.sample(t).state;
            assert!(s.velocity.abs() <= request.limits[0].max_velocity + 1e-6);
            assert!(s.acceleration.abs() <= request.limits[0].max_acceleration + 1e-6);
            t += 0.005;
        }
    }
}

#[test]
fn segment_boundaries_are_continuous() {
    let mut rng = Lcg::new(11);
    for _ in 0..CASES {
        let request = request(&mut rng, 3);
        for profile in plan(&request).sections()[0].profiles() {
            assert_continuous(profile);
        }
    }
}

#[test]
fn sampling_round_trips_boundary_states() {
    let mut rng = Lcg::new(23);
    for _ in 0..CASES {
        let request = request(&mut rng, 2);
        let trajectory = plan(&request);
        for (axis, profile) in trajectory.sections()[0].profiles().iter().enumerate() {
            assert_eq!(profile.sample(0.0).state, request.current[axis]);
            assert_reaches(profile, &request.target[axis]);
        }
    }
}

#[test]
fn synchronized_axes_share_duration() {
    let mut rng = Lcg::new(42);
    for policy in [Synchronization::Time, Synchronization::Phase] {
        for _ in 0..CASES / 2 {
            let mut request = request(&mut rng, 4);
            request.synchronization = policy;
            let trajectory = plan(&request);
            let section = &trajectory.sections()[0];
            for (axis, profile) in section.profiles().iter().enumerate() {
                assert!(
                    (profile.duration() - section.duration()).abs() < 1e-6,
                    "{policy:?} axis {axis}: {} vs {}",
                    profile.duration(),
                    section.duration()
                );
                assert_within_limits(profile, &request.limits[axis]);
            }
        }
    }
}

#[test]
fn accelerating_boundaries_under_asymmetric_limits() {
    let mut rng = Lcg::new(101);
    for _ in 0..CASES {
        let request = accelerating_request(&mut rng, 1);
        let trajectory = plan(&request);
        let profile = &trajectory.sections()[0].profiles()[0];
        assert_eq!(profile.sample(0.0).state, request.current[0]);
        assert_reaches(profile, &request.target[0]);
        assert_continuous(profile);
        assert_within_limits(profile, &request.limits[0]);
    }
}

#[test]
fn synchronized_accelerating_axes_share_duration() {
    let mut rng = Lcg::new(202);
    for policy in [Synchronization::Time, Synchronization::Phase] {
        for _ in 0..CASES {
            let mut request = accelerating_request(&mut rng, 3);
            request.synchronization = policy;
            let trajectory = plan(&request);
            let section = &trajectory.sections()[0];
            for (axis, profile) in section.profiles().iter().enumerate() {
                assert!(
                    (profile.duration() - section.duration()).abs() < 1e-6,
                    "{policy:?} axis {axis}: {} vs {}",
                    profile.duration(),
                    section.duration()
                );
                assert_reaches(profile, &request.target[axis]);
                assert_continuous(profile);
                assert_within_limits(profile, &request.limits[axis]);
            }
        }
    }
}
