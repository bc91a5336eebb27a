//! Integration test: reference scenarios.

use otg_common::kinematics::KinematicState;
use otg_planner::{
    CycleResult, CycleStatus, NeverInterrupt, Stepper, Synchronization, Synthesizer, Trajectory,
    filter_waypoints,
};
use otg_planner::request::Waypoint;
use std::time::Duration;

use super::{UNIT, rest_to_rest};

const DT: Duration = Duration::from_millis(10);

fn plan(request: &otg_planner::MotionRequest) -> Trajectory {
    let mut trajectory = Trajectory::new();
    Synthesizer::new(request.axis_count(), DT)
        .calculate(request, &mut trajectory, &NeverInterrupt)
        .unwrap();
    trajectory
}

#[test]
fn single_axis_ten_units() {
    let trajectory = plan(&rest_to_rest(&[10.0], UNIT));
    let duration = trajectory.duration();
    assert!(duration > 0.0);

    let mut sample = [otg_planner::AxisSample::default()];
    let mut t = 0.0;
    while t <= duration {
        trajectory.sample(t, &mut sample);
        assert!(sample[0].state.velocity <= 1.0 + 1e-9);
        assert!(sample[0].state.acceleration.abs() <= 1.0 + 1e-9);
        t += 0.001;
    }

    trajectory.sample(duration, &mut sample);
    assert!(sample[0].state.velocity.abs() < 1e-9);
    assert!((sample[0].state.position - 10.0).abs() < 1e-9);
}

#[test]
fn faster_axis_stretched_to_slower() {
    // Optimal durations: 2.0 s for 0.25, 1.2 s for 0.054.
    let mut request = rest_to_rest(&[0.25, 0.054], UNIT);
    request.synchronization = Synchronization::Time;
    let trajectory = plan(&request);

    assert!((trajectory.duration() - 2.0).abs() < 1e-6);
    let section = &trajectory.sections()[0];
    for profile in section.profiles() {
        assert!((profile.duration() - 2.0).abs() < 1e-6);
    }

    let fast = &section.profiles()[1];
    let end = fast.sample(2.0).state;
    assert!((end.position - 0.054).abs() < 1e-9);
    assert!(end.velocity.abs() < 1e-9);
}

#[test]
fn stepping_finishes_after_ceil_cycles() {
    let request = rest_to_rest(&[0.25, 0.054], UNIT);
    let mut stepper = Stepper::new(2, DT);
    let mut result = CycleResult::new(2);

    let mut steps = 0usize;
    let status = loop {
        let status = stepper.step(&request, &mut result).unwrap();
        steps += 1;
        if status == CycleStatus::Finished || steps > 1_000 {
            break status;
        }
    };

    assert_eq!(status, CycleStatus::Finished);
    let duration = result.duration;
    // Finished exactly on the first cycle at or past the duration.
    assert!(steps as f64 * 0.01 >= duration - 1e-9);
    assert!((steps - 1) as f64 * 0.01 < duration - 1e-9);
    assert_eq!(result.axes[0].state, KinematicState::at_rest(0.25));
    assert_eq!(result.axes[1].state, KinematicState::at_rest(0.054));
}

fn three_points() -> heapless::Vec<Waypoint, 8> {
    [[0.0, 0.0], [1.0, 0.001], [2.0, 0.0]]
        .iter()
        .map(|p| Waypoint::from_slice(p).unwrap())
        .collect()
}

#[test]
fn near_collinear_waypoint_threshold() {
    let mut loose = three_points();
    assert_eq!(filter_waypoints(&mut loose, &[0.01, 0.01]), 1);
    assert_eq!(loose.len(), 2);

    let mut tight = three_points();
    assert_eq!(filter_waypoints(&mut tight, &[0.0001, 0.0001]), 0);
    assert_eq!(tight.len(), 3);
}
