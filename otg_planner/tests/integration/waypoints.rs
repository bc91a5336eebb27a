//! Integration test: multi-section trajectories through waypoints.

use otg_common::kinematics::KinematicState;
use otg_planner::request::Waypoint;
use otg_planner::{
    AxisSample, NeverInterrupt, Synchronization, Synthesizer, Trajectory, filter_waypoints,
};
use std::time::Duration;

use super::{Lcg, UNIT, rest_to_rest};

fn plan(request: &otg_planner::MotionRequest) -> Trajectory {
    let mut trajectory = Trajectory::new();
    Synthesizer::new(request.axis_count(), Duration::from_millis(1))
        .calculate(request, &mut trajectory, &NeverInterrupt)
        .unwrap();
    trajectory
}

#[test]
fn trajectory_passes_through_waypoints() {
    let mut request = rest_to_rest(&[3.0, 0.0], UNIT);
    request.push_waypoint(&[1.0, 1.0]).unwrap();
    request.push_waypoint(&[2.0, 1.5]).unwrap();
    let trajectory = plan(&request);
    assert_eq!(trajectory.sections().len(), 3);

    let mut samples = [AxisSample::default(); 2];
    let mut offset = 0.0;
    for (section, waypoint) in trajectory.sections().iter().zip(&request.waypoints) {
        offset += section.duration();
        for (profile, &position) in section.profiles().iter().zip(waypoint.iter()) {
            assert!((profile.end().position - position).abs() < 1e-9);
            assert_eq!(profile.end().acceleration, 0.0);
        }
        // Sampling at the boundary lands on the waypoint.
        trajectory.sample(offset, &mut samples);
        for (sample, &position) in samples.iter().zip(waypoint.iter()) {
            assert!((sample.state.position - position).abs() < 1e-6);
        }
    }
    assert_eq!(trajectory.end_state(0), Some(KinematicState::at_rest(3.0)));
    assert_eq!(trajectory.end_state(1), Some(KinematicState::at_rest(0.0)));
}

#[test]
fn waypoint_motion_does_not_stop_on_straight_legs() {
    let mut request = rest_to_rest(&[4.0], UNIT);
    request.push_waypoint(&[2.0]).unwrap();
    let trajectory = plan(&request);
    let pass = trajectory.sections()[0].profiles()[0].end();
    assert!(pass.velocity > 0.0);
    assert!(pass.velocity <= 1.0);
}

#[test]
fn sections_synchronize_independently() {
    let mut request = rest_to_rest(&[2.0, 2.0], UNIT);
    request.synchronization = Synchronization::Time;
    request.push_waypoint(&[1.0, 0.1]).unwrap();
    let trajectory = plan(&request);
    for section in trajectory.sections() {
        for profile in section.profiles() {
            assert!((profile.duration() - section.duration()).abs() < 1e-6);
        }
    }
}

fn random_path(rng: &mut Lcg, len: usize) -> heapless::Vec<Waypoint, 34> {
    let mut y = 0.0;
    (0..len)
        .map(|i| {
            y += rng.range(-0.05, 0.05);
            Waypoint::from_slice(&[i as f64 * 0.1, y]).unwrap()
        })
        .collect()
}

#[test]
fn filter_is_idempotent_and_keeps_order() {
    let mut rng = Lcg::new(5);
    let thresholds = [0.02, 0.02];
    for _ in 0..40 {
        let original = random_path(&mut rng, 20);
        let mut filtered = original.clone();
        filter_waypoints(&mut filtered, &thresholds);

        assert_eq!(filtered.first(), original.first());
        assert_eq!(filtered.last(), original.last());

        let again = filtered.clone();
        assert_eq!(filter_waypoints(&mut filtered, &thresholds), 0);
        assert_eq!(filtered, again);

        // Survivors keep their original order.
        let kept: Vec<usize> = filtered
            .iter()
            .map(|p| original.iter().position(|o| o == p).unwrap())
            .collect();
        assert!(kept.windows(2).all(|pair| pair[0] < pair[1]));
    }
}
