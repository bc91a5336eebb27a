//! Cross-axis synchronization of one section.
//!
//! Picks the governing duration (slowest enabled axis, the caller minimum,
//! rounded up to the control cycle under discrete durations) and refits the
//! axes to it according to the [`Synchronization`] policy.
//!
//! A fit may land in a blocked interval of some axis: a range of durations
//! no profile of that axis can take. The axis then reports the next
//! duration it can reach, the governing duration is raised and every axis
//! is refitted. The number of raises is bounded by the axis count.

use tracing::{debug, trace};

use crate::error::PlanError;
use crate::profile::AxisProfile;
use crate::request::{ControlInterface, Synchronization};
use crate::synthesis::roots::{STATE_EPS, TIME_EPS, tolerance};
use crate::synthesis::{AxisTask, Blocked};
use crate::trajectory::Section;

/// Extra raise attempts beyond one per axis.
const EXTRA_ATTEMPTS: usize = 2;

/// Policy inputs for one section.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyncOptions {
    pub policy: Synchronization,
    /// Lower bound on the section duration [s].
    pub minimum: Option<f64>,
    /// Control cycle [s] when durations are discretized.
    pub cycle_time: Option<f64>,
}

impl SyncOptions {
    /// Round `duration` up to the cycle grid, if any.
    pub fn discretize(&self, duration: f64) -> f64 {
        match self.cycle_time {
            Some(cycle) => ((duration / cycle) - 1e-9).ceil().max(0.0) * cycle,
            None => duration,
        }
    }
}

/// Per-axis inputs of one section.
#[derive(Debug, Clone, Copy)]
pub struct AxisInput<'a> {
    pub task: &'a AxisTask,
    pub optimal: &'a AxisProfile,
    pub enabled: bool,
}

/// Synchronize `axes` into `out`.
pub fn synchronize(
    section: usize,
    axes: &[AxisInput<'_>],
    options: &SyncOptions,
    out: &mut Section,
) -> Result<(), PlanError> {
    let limiting = axes
        .iter()
        .enumerate()
        .filter(|(_, a)| a.enabled)
        .max_by(|(_, a), (_, b)| a.optimal.duration().total_cmp(&b.optimal.duration()))
        .map(|(index, _)| index);
    let fastest = limiting.map_or(0.0, |i| axes[i].optimal.duration());
    let duration = options.discretize(fastest.max(options.minimum.unwrap_or(0.0)));

    match options.policy {
        Synchronization::None => independent(section, axes, options, duration, out),
        Synchronization::Phase => {
            if let Some(lead) = limiting {
                if duration <= fastest + TIME_EPS && phase(axes, lead, out) {
                    return Ok(());
                }
            }
            debug!(section, "phase synchronization not applicable, using time");
            by_time(section, axes, options, duration, limiting, out)
        }
        Synchronization::Time | Synchronization::TimeIfNecessary => {
            by_time(section, axes, options, duration, limiting, out)
        }
    }
}

fn push(section: usize, out: &mut Section, profile: AxisProfile) -> Result<(), PlanError> {
    // Sections hold MAX_AXES profiles; the axis count is validated against it.
    let duration = profile.duration();
    out.push(profile).map_err(|_| PlanError::SynchronizationFailed {
        axis: out.profiles().len(),
        section,
        duration,
    })
}

fn by_time(
    section: usize,
    axes: &[AxisInput<'_>],
    options: &SyncOptions,
    mut duration: f64,
    limiting: Option<usize>,
    out: &mut Section,
) -> Result<(), PlanError> {
    let keep_resting = options.policy == Synchronization::TimeIfNecessary;

    for _ in 0..axes.len() + EXTRA_ATTEMPTS {
        *out = Section::new();
        let mut raise: Option<f64> = None;

        for (axis, input) in axes.iter().enumerate() {
            let profile = if !input.enabled {
                AxisProfile::constant(input.task.start, duration)
            } else if keep_resting && input.task.target.is_at_rest() {
                input.optimal.clone()
            } else {
                match input.task.fit(duration, input.optimal) {
                    Ok(profile) => profile,
                    Err(Blocked {
                        next_feasible: Some(next),
                    }) if next > duration => {
                        raise = Some(raise.map_or(next, |r: f64| r.max(next)));
                        continue;
                    }
                    Err(_) => {
                        return Err(PlanError::SynchronizationFailed {
                            axis,
                            section,
                            duration,
                        });
                    }
                }
            };
            push(section, out, profile)?;
        }

        match raise {
            Some(next) => {
                trace!(section, from = duration, to = next, "raising section duration");
                duration = options.discretize(next);
            }
            None => {
                out.extend_to(duration);
                return Ok(());
            }
        }
    }

    Err(PlanError::SynchronizationFailed {
        axis: limiting.unwrap_or(0),
        section,
        duration,
    })
}

fn independent(
    section: usize,
    axes: &[AxisInput<'_>],
    options: &SyncOptions,
    duration: f64,
    out: &mut Section,
) -> Result<(), PlanError> {
    *out = Section::new();
    let minimum = options.minimum.map(|m| options.discretize(m));

    for (axis, input) in axes.iter().enumerate() {
        let profile = if !input.enabled {
            AxisProfile::constant(input.task.start, duration)
        } else {
            match minimum {
                Some(min) if input.optimal.duration() < min - TIME_EPS => {
                    let fitted = match input.task.fit(min, input.optimal) {
                        Err(Blocked {
                            next_feasible: Some(next),
                        }) => input.task.fit(options.discretize(next), input.optimal),
                        other => other,
                    };
                    fitted.map_err(|_| PlanError::SynchronizationFailed {
                        axis,
                        section,
                        duration: min,
                    })?
                }
                _ => input.optimal.clone(),
            }
        };
        push(section, out, profile)?;
    }
    out.extend_to(options.discretize(out.duration()));
    Ok(())
}

/// Boundary quantities that a scaled copy of the lead profile must match.
fn boundary_vector(task: &AxisTask) -> [f64; 5] {
    let (s, t) = (&task.start, &task.target);
    match task.interface {
        ControlInterface::Position => [
            task.distance(),
            s.velocity,
            t.velocity,
            s.acceleration,
            t.acceleration,
        ],
        ControlInterface::Velocity => [0.0, s.velocity, t.velocity, s.acceleration, t.acceleration],
        ControlInterface::Acceleration => [0.0, 0.0, 0.0, s.acceleration, t.acceleration],
    }
}

/// Scale the lead profile onto every other axis. False if any axis has
/// non-collinear boundary conditions or the scaled copy breaks its limits.
fn phase(axes: &[AxisInput<'_>], lead: usize, out: &mut Section) -> bool {
    let reference = boundary_vector(axes[lead].task);
    let norm2: f64 = reference.iter().map(|r| r * r).sum();
    if norm2 == 0.0 {
        return false;
    }
    let lead_profile = axes[lead].optimal;

    let mut section = Section::new();
    for (axis, input) in axes.iter().enumerate() {
        let profile = if !input.enabled {
            AxisProfile::constant(input.task.start, lead_profile.duration())
        } else if axis == lead {
            lead_profile.clone()
        } else {
            let vector = boundary_vector(input.task);
            let ratio = vector.iter().zip(&reference).map(|(v, r)| v * r).sum::<f64>() / norm2;
            let collinear = vector
                .iter()
                .zip(&reference)
                .all(|(v, r)| (v - ratio * r).abs() <= tolerance(STATE_EPS, *v));
            if !collinear {
                return false;
            }

            let mut scaled = AxisProfile::new(input.task.start);
            for segment in lead_profile.segments() {
                if scaled.push(segment.duration, segment.jerk * ratio).is_err() {
                    return false;
                }
            }
            match input.task.finish(scaled) {
                Ok(profile) if input.task.bounds.admits(&profile) => profile,
                _ => return false,
            }
        };
        if section.push(profile).is_err() {
            return false;
        }
    }
    *out = section;
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::AxisLimits;
    use otg_common::kinematics::KinematicState;

    fn tasks(distances: &[f64], limits: AxisLimits) -> std::vec::Vec<AxisTask> {
        distances
            .iter()
            .map(|&d| {
                AxisTask::new(
                    ControlInterface::Position,
                    KinematicState::ZERO,
                    KinematicState::at_rest(d),
                    &limits,
                )
            })
            .collect()
    }

    fn run(
        tasks: &[AxisTask],
        enabled: &[bool],
        options: SyncOptions,
    ) -> Result<Section, PlanError> {
        let optimal: std::vec::Vec<AxisProfile> =
            tasks.iter().map(|t| t.optimal().unwrap()).collect();
        let inputs: std::vec::Vec<AxisInput<'_>> = tasks
            .iter()
            .zip(&optimal)
            .zip(enabled)
            .map(|((task, optimal), &enabled)| AxisInput {
                task,
                optimal,
                enabled,
            })
            .collect();
        let mut out = Section::new();
        synchronize(0, &inputs, &options, &mut out).map(|_| out)
    }

    fn options(policy: Synchronization) -> SyncOptions {
        SyncOptions {
            policy,
            minimum: None,
            cycle_time: None,
        }
    }

    #[test]
    fn time_sync_stretches_faster_axis() {
        let t = tasks(&[0.25, 0.054], AxisLimits::symmetric(1.0, 1.0, 1.0));
        let section = run(&t, &[true, true], options(Synchronization::Time)).unwrap();
        assert!((section.duration() - 2.0).abs() < 1e-6);
        for profile in section.profiles() {
            assert!((profile.duration() - section.duration()).abs() < 1e-6);
        }
        let fast = &section.profiles()[1];
        let end = fast.sample(section.duration()).state;
        assert!((end.position - 0.054).abs() < 1e-9);
        assert!(end.velocity.abs() < 1e-9);
    }

    #[test]
    fn minimum_duration_raises_all_axes() {
        let t = tasks(&[1.0, 2.0], AxisLimits::symmetric(1.0, 1.0, 1.0));
        let mut opts = options(Synchronization::Time);
        opts.minimum = Some(10.0);
        let section = run(&t, &[true, true], opts).unwrap();
        assert!((section.duration() - 10.0).abs() < 1e-9);
        assert!(section.profiles().iter().all(|p| (p.duration() - 10.0).abs() < 1e-6));
    }

    #[test]
    fn discrete_duration_is_cycle_multiple() {
        let t = tasks(&[0.25, 0.054], AxisLimits::symmetric(1.0, 1.0, 1.0));
        let mut opts = options(Synchronization::Time);
        opts.minimum = Some(2.0034);
        opts.cycle_time = Some(0.01);
        let section = run(&t, &[true, true], opts).unwrap();
        let cycles = section.duration() / 0.01;
        assert!((cycles - cycles.round()).abs() < 1e-6);
        assert!((section.duration() - 2.01).abs() < 1e-9);
    }

    #[test]
    fn time_if_necessary_keeps_resting_targets_optimal() {
        let t = tasks(&[0.25, 0.054], AxisLimits::symmetric(1.0, 1.0, 1.0));
        let section = run(&t, &[true, true], options(Synchronization::TimeIfNecessary)).unwrap();
        assert!((section.duration() - 2.0).abs() < 1e-6);
        assert!((section.profiles()[1].duration() - 1.2).abs() < 1e-6);
    }

    #[test]
    fn no_sync_keeps_individual_durations() {
        let t = tasks(&[0.25, 0.054], AxisLimits::symmetric(1.0, 1.0, 1.0));
        let section = run(&t, &[true, true], options(Synchronization::None)).unwrap();
        assert!((section.profiles()[0].duration() - 2.0).abs() < 1e-6);
        assert!((section.profiles()[1].duration() - 1.2).abs() < 1e-6);
    }

    #[test]
    fn phase_sync_scales_limiting_shape() {
        let t = tasks(&[2.0, 1.0, -0.5], AxisLimits::symmetric(1.0, 1.0, 1.0));
        let section = run(&t, &[true, true, true], options(Synchronization::Phase)).unwrap();
        let lead = &section.profiles()[0];
        for (profile, ratio) in section.profiles().iter().zip([1.0, 0.5, -0.25]) {
            assert_eq!(profile.segments().len(), lead.segments().len());
            for (s, l) in profile.segments().iter().zip(lead.segments()) {
                assert!((s.duration - l.duration).abs() < 1e-12);
                assert!((s.jerk - ratio * l.jerk).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn phase_falls_back_to_time_when_not_collinear() {
        let limits = AxisLimits::symmetric(1.0, 1.0, 1.0);
        let mut t = tasks(&[2.0, 1.0], limits);
        t[1].start.velocity = 0.3;
        let section = run(&t, &[true, true], options(Synchronization::Phase)).unwrap();
        let d = section.duration();
        assert!(section.profiles().iter().all(|p| (p.duration() - d).abs() < 1e-6));
    }

    #[test]
    fn disabled_axis_keeps_constant_acceleration() {
        let limits = AxisLimits::symmetric(1.0, 1.0, 1.0);
        let mut t = tasks(&[0.25, 0.0], limits);
        t[1].start = KinematicState::new(0.0, 0.5, 0.0);
        t[1].target = t[1].start;
        let section = run(&t, &[true, false], options(Synchronization::Time)).unwrap();
        let held = &section.profiles()[1];
        assert!((held.duration() - 2.0).abs() < 1e-6);
        assert!((held.end().position - 1.0).abs() < 1e-6);
    }

    #[test]
    fn discretize_rounds_up_to_grid() {
        let opts = SyncOptions {
            policy: Synchronization::Time,
            minimum: None,
            cycle_time: Some(0.01),
        };
        assert!((opts.discretize(1.234) - 1.24).abs() < 1e-12);
        assert!((opts.discretize(1.24) - 1.24).abs() < 1e-12);
        assert_eq!(options(Synchronization::Time).discretize(1.234), 1.234);
    }
}
