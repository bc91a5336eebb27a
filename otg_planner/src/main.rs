//! # OTG Planner
//!
//! Command-line driver for the trajectory engine.
//!
//! Loads a planner configuration and a motion request, then either prints a
//! JSON summary of the planned trajectory (`--plan-only`) or steps the
//! engine cycle by cycle, feeding each sampled state back into the request,
//! and prints the samples as CSV or JSON lines.
//!
//! With `--realtime` cycles are paced to the configured period. Ctrl-C stops
//! the loop and interrupts a replan in progress.

use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use clap::{Parser, ValueEnum};
use otg_common::config::LogLevel;
use otg_planner::config::{PlannerConfig, load_config};
use otg_planner::{
    CycleResult, CycleStatus, MotionRequest, OffloadStepper, PlanError, Stepper, Trajectory,
};
use serde::Serialize;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// OTG Planner: online jerk-limited trajectory generation
#[derive(Parser, Debug)]
#[command(name = "otg_planner")]
#[command(version)]
#[command(about = "Plan and step jerk-limited multi-axis trajectories")]
struct Args {
    /// Planner configuration TOML ([shared], [planner], [[axes]]).
    #[arg(short, long, default_value = "config/planner.toml")]
    config: PathBuf,

    /// Motion request TOML (current, target, waypoints, policies).
    #[arg(short, long)]
    request: PathBuf,

    /// Plan once and print a JSON summary instead of stepping.
    #[arg(long)]
    plan_only: bool,

    /// Sample output format.
    #[arg(long, value_enum, default_value_t = SampleFormat::Csv)]
    format: SampleFormat,

    /// Print every N-th cycle (the final cycle is always printed).
    #[arg(long, default_value_t = 1)]
    every: u64,

    /// Stop after this many cycles.
    #[arg(long, default_value_t = 1_000_000)]
    max_cycles: u64,

    /// Pace cycles to the configured cycle time.
    #[arg(long)]
    realtime: bool,

    /// Plan on a worker thread.
    #[arg(long)]
    offload: bool,

    /// Enable verbose logging (DEBUG level).
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum SampleFormat {
    Csv,
    Json,
}

fn main() {
    let args = Args::parse();
    let config = load_config(&args.config);
    let level = config
        .as_ref()
        .map_or(LogLevel::default(), |c| c.shared.log_level);
    setup_tracing(&args, level);

    info!("OTG Planner v{} starting...", env!("CARGO_PKG_VERSION"));

    let result = match config {
        Ok(config) => run(&args, &config),
        Err(e) => Err(e.into()),
    };
    if let Err(e) = result {
        error!("FATAL: {e}");
        process::exit(1);
    }
}

fn run(args: &Args, config: &PlannerConfig) -> Result<(), Box<dyn std::error::Error>> {
    info!(
        service = %config.shared.service_name,
        "Config OK: cycle_time={}µs, axes={}",
        config.planner.cycle_time_us, config.planner.axis_count
    );
    let mut request = load_request(&args.request, config)?;

    let stop = Arc::new(AtomicBool::new(false));
    let s = Arc::clone(&stop);
    ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        s.store(true, Ordering::SeqCst);
    })?;

    if args.plan_only {
        return plan_only(config, &request);
    }

    let mut driver = if args.offload {
        Driver::Offload(Box::new(OffloadStepper::from_config(config)?))
    } else {
        Driver::Inline(Box::new(Stepper::from_config(config)))
    };

    let stdout = std::io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    if args.format == SampleFormat::Csv {
        write_csv_header(&mut out, config)?;
    }

    let period = config.planner.cycle_time();
    let every = args.every.max(1);
    let mut result = CycleResult::new(config.planner.axis_count);
    let mut next_tick = Instant::now();

    for cycle in 0..args.max_cycles {
        if stop.load(Ordering::SeqCst) {
            warn!(cycle, "stopped before the trajectory finished");
            break;
        }
        let status = driver.step(&request, &mut result, &stop)?;
        result.pass_to(&mut request);

        let finished = status == CycleStatus::Finished;
        if cycle % every == 0 || finished {
            match args.format {
                SampleFormat::Csv => write_csv_row(&mut out, &result)?,
                SampleFormat::Json => {
                    serde_json::to_writer(&mut out, &result)?;
                    writeln!(out)?;
                }
            }
        }
        if finished {
            info!(cycles = cycle + 1, duration = result.duration, "trajectory finished");
            break;
        }

        if args.realtime {
            out.flush()?;
            next_tick += period;
            let now = Instant::now();
            if next_tick > now {
                std::thread::sleep(next_tick - now);
            } else {
                next_tick = now;
            }
        }
    }
    out.flush()?;
    Ok(())
}

/// The two stepping modes behind one call.
enum Driver {
    Inline(Box<Stepper>),
    Offload(Box<OffloadStepper>),
}

impl Driver {
    fn step(
        &mut self,
        request: &MotionRequest,
        result: &mut CycleResult,
        stop: &AtomicBool,
    ) -> Result<CycleStatus, PlanError> {
        match self {
            Self::Inline(stepper) => stepper.step_with_interrupt(request, result, stop),
            Self::Offload(stepper) => stepper.step(request, result),
        }
    }
}

/// Read a request file; omitted limits come from the configuration.
fn load_request(
    path: &Path,
    config: &PlannerConfig,
) -> Result<MotionRequest, Box<dyn std::error::Error>> {
    let content = std::fs::read_to_string(path)?;
    let mut request: MotionRequest = toml::from_str(&content)?;
    if request.limits.is_empty() {
        request.limits = config.request_template()?.limits;
    }
    info!(
        axes = request.axis_count(),
        waypoints = request.waypoints.len(),
        "Loaded request from {}",
        path.display()
    );
    Ok(request)
}

// ─── Plan Summary ───────────────────────────────────────────────────

#[derive(Serialize)]
struct PlanSummary<'a> {
    duration: f64,
    removed_waypoints: usize,
    limits_violated: bool,
    sections: Vec<SectionSummary<'a>>,
}

#[derive(Serialize)]
struct SectionSummary<'a> {
    duration: f64,
    axes: Vec<AxisSummary<'a>>,
}

#[derive(Serialize)]
struct AxisSummary<'a> {
    name: &'a str,
    duration: f64,
    segments: usize,
    reached_velocity_limit: bool,
    reached_acceleration_limit: bool,
    end: otg_common::kinematics::KinematicState,
}

fn plan_only(
    config: &PlannerConfig,
    request: &MotionRequest,
) -> Result<(), Box<dyn std::error::Error>> {
    use otg_planner::ReachedLimits;

    let stepper = Stepper::from_config(config);
    let mut trajectory = Box::new(Trajectory::new());
    let started = Instant::now();
    let outcome = stepper.calculate(request, &mut trajectory)?;
    info!(elapsed_us = started.elapsed().as_micros() as u64, "plan complete");

    let sections = trajectory
        .sections()
        .iter()
        .map(|section| SectionSummary {
            duration: section.duration(),
            axes: section
                .profiles()
                .iter()
                .zip(config.axis_names())
                .map(|(profile, name)| AxisSummary {
                    name,
                    duration: profile.duration(),
                    segments: profile.segments().len(),
                    reached_velocity_limit: profile
                        .reached_limits()
                        .contains(ReachedLimits::VELOCITY),
                    reached_acceleration_limit: profile
                        .reached_limits()
                        .contains(ReachedLimits::ACCELERATION),
                    end: profile.end(),
                })
                .collect(),
        })
        .collect();
    let summary = PlanSummary {
        duration: trajectory.duration(),
        removed_waypoints: outcome.removed_waypoints,
        limits_violated: outcome.limits_violated,
        sections,
    };
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

// ─── CSV ────────────────────────────────────────────────────────────

fn write_csv_header(out: &mut impl Write, config: &PlannerConfig) -> std::io::Result<()> {
    write!(out, "time,section,new_calculation")?;
    for name in config.axis_names() {
        write!(out, ",{name}_p,{name}_v,{name}_a,{name}_j")?;
    }
    writeln!(out)
}

fn write_csv_row(out: &mut impl Write, result: &CycleResult) -> std::io::Result<()> {
    write!(
        out,
        "{:.6},{},{}",
        result.time, result.section, result.new_calculation as u8
    )?;
    for axis in &result.axes {
        let s = axis.state;
        write!(
            out,
            ",{:.9},{:.9},{:.9},{:.9}",
            s.position, s.velocity, s.acceleration, axis.jerk
        )?;
    }
    writeln!(out)
}

/// Setup tracing subscriber. `--verbose` overrides the configured level and
/// `RUST_LOG` overrides both.
fn setup_tracing(args: &Args, level: LogLevel) {
    let directive = if args.verbose {
        LogLevel::Debug.as_directive()
    } else {
        level.as_directive()
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));

    // Samples go to stdout; logs go to stderr.
    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .compact()
            .init();
    }
}
