//! Integration test: configuration and request files.

use std::io::Write;
use std::path::PathBuf;

use otg_common::config::ConfigError;
use otg_planner::config::{LimitPolicy, load_config};
use otg_planner::{CycleResult, CycleStatus, MotionRequest, Stepper};

fn repo_config(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("config")
        .join(name)
}

#[test]
fn load_config_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
[shared]
service_name = "otg-file-test"

[planner]
cycle_time_us = 500
axis_count = 1
limit_policy = "best_effort"

[[axes]]
name = "spindle"
max_velocity = 3.0
max_acceleration = 2.0
max_jerk = 8.0
"#
    )
    .unwrap();

    let config = load_config(file.path()).unwrap();
    assert_eq!(config.planner.cycle_time_us, 500);
    assert_eq!(config.planner.limit_policy, LimitPolicy::BestEffort);
    assert_eq!(config.axes[0].name, "spindle");
}

#[test]
fn missing_config_file() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
        load_config(&dir.path().join("absent.toml")),
        Err(ConfigError::FileNotFound)
    ));
}

#[test]
fn shipped_config_and_request_run_to_completion() {
    let config = load_config(&repo_config("planner.toml")).unwrap();
    let content = std::fs::read_to_string(repo_config("request.toml")).unwrap();
    let mut request: MotionRequest = toml::from_str(&content).unwrap();
    assert!(request.limits.is_empty());
    request.limits = config.request_template().unwrap().limits;

    let mut stepper = Stepper::from_config(&config);
    let mut result = CycleResult::new(config.planner.axis_count);
    let mut status = CycleStatus::Working;
    for _ in 0..1_000_000 {
        status = stepper.step(&request, &mut result).unwrap();
        result.pass_to(&mut request);
        if status == CycleStatus::Finished {
            break;
        }
    }
    assert_eq!(status, CycleStatus::Finished);
    assert!((result.axes[0].state.position - 1.0).abs() < 1e-9);
    assert_eq!(stepper.stats().plan_count, 1);
}
