//! Integration test: per-cycle stepping, replanning and rejection.

use otg_common::kinematics::KinematicState;
use otg_planner::config::LimitPolicy;
use otg_planner::{
    CycleResult, CycleStatus, InputError, OffloadStepper, PlanError, Stepper, StepperState,
    Synthesizer,
};
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use super::{UNIT, rest_to_rest};

const DT: Duration = Duration::from_millis(1);

#[test]
fn unchanged_request_replans_once() {
    let request = rest_to_rest(&[1.0, -2.0], UNIT);
    let mut stepper = Stepper::new(2, DT);
    let mut result = CycleResult::new(2);

    stepper.step(&request, &mut result).unwrap();
    assert!(result.new_calculation);
    stepper.step(&request, &mut result).unwrap();
    assert!(!result.new_calculation);
    assert_eq!(stepper.stats().plan_count, 1);
}

#[test]
fn target_change_mid_motion_replans_from_sampled_state() {
    let mut request = rest_to_rest(&[2.0], UNIT);
    let mut stepper = Stepper::new(1, DT);
    let mut result = CycleResult::new(1);

    for _ in 0..1_000 {
        stepper.step(&request, &mut result).unwrap();
        result.pass_to(&mut request);
    }
    let before = result.axes[0].state;
    assert!(before.velocity > 0.0);

    request.target[0] = KinematicState::at_rest(-1.0);
    stepper.step(&request, &mut result).unwrap();
    assert!(result.new_calculation);
    assert_eq!(stepper.trajectory().sections()[0].profiles()[0].start(), before);

    // One cycle later the state moved on continuously.
    let after = result.axes[0].state;
    assert!((after.position - before.position).abs() < 2.0 * DT.as_secs_f64());
    assert!((after.velocity - before.velocity).abs() < 2.0 * DT.as_secs_f64());

    let mut status = CycleStatus::Working;
    for _ in 0..100_000 {
        status = stepper.step(&request, &mut result).unwrap();
        result.pass_to(&mut request);
        if status == CycleStatus::Finished {
            break;
        }
    }
    assert_eq!(status, CycleStatus::Finished);
    assert_eq!(result.axes[0].state, KinematicState::at_rest(-1.0));
    assert_eq!(stepper.stats().plan_count, 2);
}

#[test]
fn rejected_request_keeps_motion() {
    let request = rest_to_rest(&[1.0], UNIT);
    let mut stepper = Stepper::new(1, DT);
    let mut result = CycleResult::new(1);
    stepper.step(&request, &mut result).unwrap();
    let planned = stepper.trajectory().clone();

    let mut wrong_shape = rest_to_rest(&[1.0, 1.0], UNIT);
    wrong_shape.target[1] = KinematicState::at_rest(3.0);
    assert_eq!(
        stepper.step(&wrong_shape, &mut result),
        Err(PlanError::InvalidInput(InputError::AxisCountMismatch {
            expected: 1,
            actual: 2
        }))
    );
    assert_eq!(stepper.trajectory(), &planned);
    assert_eq!(stepper.status(), StepperState::Tracking);

    // The original request continues without a replan.
    stepper.step(&request, &mut result).unwrap();
    assert!(!result.new_calculation);
}

#[test]
fn too_many_waypoints_rejected() {
    let mut request = rest_to_rest(&[1.0], UNIT);
    for i in 0..4 {
        request.push_waypoint(&[i as f64 * 0.1]).unwrap();
    }
    let synthesizer = Synthesizer::new(1, DT).with_waypoint_capacity(3);
    let mut stepper = Stepper::with_synthesizer(synthesizer);
    let mut result = CycleResult::new(1);
    assert_eq!(
        stepper.step(&request, &mut result),
        Err(PlanError::InvalidInput(InputError::TooManyWaypoints {
            count: 4,
            capacity: 3
        }))
    );
    assert_eq!(stepper.status(), StepperState::Unplanned);
}

#[test]
fn interrupted_replan_is_retried() {
    let mut stepper = Stepper::new(1, DT);
    let mut result = CycleResult::new(1);
    stepper
        .step(&rest_to_rest(&[1.0], UNIT), &mut result)
        .unwrap();

    let moved = rest_to_rest(&[5.0], UNIT);
    let stop = AtomicBool::new(true);
    stepper
        .step_with_interrupt(&moved, &mut result, &stop)
        .unwrap();
    assert!(result.was_interrupted);
    assert_eq!(stepper.trajectory().end_state(0), Some(KinematicState::at_rest(1.0)));

    stepper.step(&moved, &mut result).unwrap();
    assert!(result.new_calculation);
    assert_eq!(stepper.trajectory().end_state(0), Some(KinematicState::at_rest(5.0)));
}

#[test]
fn position_limit_policy() {
    let mut request = rest_to_rest(&[0.5], UNIT);
    // The start velocity carries the axis to 1.0 before it can stop.
    request.current[0] = KinematicState::new(0.0, 1.0, 0.0);
    request.limits[0].max_position = Some(0.8);

    let mut result = CycleResult::new(1);
    let mut strict = Stepper::new(1, DT);
    assert!(matches!(
        strict.step(&request, &mut result),
        Err(PlanError::PositionLimits { axis: 0, .. })
    ));
    assert_eq!(strict.status(), StepperState::Unplanned);

    let lenient = Synthesizer::new(1, DT).with_limit_policy(LimitPolicy::BestEffort);
    let mut lenient = Stepper::with_synthesizer(lenient);
    lenient.step(&request, &mut result).unwrap();
    assert!(result.limits_violated);
}

#[test]
fn offloaded_stepping_reaches_target() {
    let mut request = rest_to_rest(&[0.5, 0.25], UNIT);
    let synthesizer = Synthesizer::new(2, Duration::from_millis(10));
    let mut stepper = OffloadStepper::spawn(synthesizer, None).unwrap();
    let mut result = CycleResult::new(2);

    let mut status = CycleStatus::Working;
    for _ in 0..100_000 {
        status = stepper.step(&request, &mut result).unwrap();
        result.pass_to(&mut request);
        if status == CycleStatus::Finished {
            break;
        }
        if stepper.is_planning() {
            std::thread::sleep(Duration::from_micros(50));
        }
    }
    assert_eq!(status, CycleStatus::Finished);
    assert_eq!(result.axes[0].state, KinematicState::at_rest(0.5));
    assert_eq!(result.axes[1].state, KinematicState::at_rest(0.25));
    assert_eq!(stepper.stats().plan_count, 1);
}
