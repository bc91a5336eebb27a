//! Piecewise constant-jerk motion of a single axis.
//!
//! An [`AxisProfile`] stores at most [`MAX_SEGMENTS`] segments. Each segment
//! keeps the state at its start, so sampling never integrates across more
//! than one segment and stays exact to rounding.

use bitflags::bitflags;
use heapless::Vec;
use otg_common::consts::MAX_SEGMENTS;
use otg_common::kinematics::KinematicState;
use serde::Serialize;

use crate::error::SynthesisError;
use crate::synthesis::roots::quadratic_roots_in;

bitflags! {
    /// Kinematic limits a profile actually reaches.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ReachedLimits: u8 {
        /// Cruises at the velocity limit.
        const VELOCITY = 1 << 0;
        /// Holds an acceleration limit for a non-zero time.
        const ACCELERATION = 1 << 1;
    }
}

/// One constant-jerk piece.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    /// Duration [s], > 0.
    pub duration: f64,
    /// Constant jerk over the segment [units/s³].
    pub jerk: f64,
    /// State at the start of the segment.
    pub start: KinematicState,
}

/// Sampled value of one profile.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct ProfileSample {
    pub state: KinematicState,
    pub jerk: f64,
    /// Index of the active segment.
    pub segment: usize,
}

/// Planned motion of one axis.
#[derive(Debug, Clone, PartialEq)]
pub struct AxisProfile {
    segments: Vec<Segment, MAX_SEGMENTS>,
    start: KinematicState,
    end: KinematicState,
    duration: f64,
    reached: ReachedLimits,
}

impl AxisProfile {
    /// Zero-duration profile resting in `start`.
    pub const fn new(start: KinematicState) -> Self {
        Self {
            segments: Vec::new(),
            start,
            end: start,
            duration: 0.0,
            reached: ReachedLimits::empty(),
        }
    }

    /// Constant-acceleration motion from `start` for `duration` seconds.
    pub fn constant(start: KinematicState, duration: f64) -> Self {
        let mut profile = Self::new(start);
        // A fresh profile always has room for one segment.
        let _ = profile.push(duration, 0.0);
        profile
    }

    /// Append a segment. Non-positive durations are skipped.
    pub fn push(&mut self, duration: f64, jerk: f64) -> Result<(), SynthesisError> {
        if duration <= 0.0 {
            return Ok(());
        }
        let start = self.end;
        self.segments
            .push(Segment {
                duration,
                jerk,
                start,
            })
            .map_err(|_| SynthesisError::NoSolution)?;
        self.end = start.integrate(jerk, duration);
        self.duration += duration;
        Ok(())
    }

    /// Replace the integrated end state by the exact boundary value.
    pub fn snap_end(&mut self, end: KinematicState) {
        self.end = end;
    }

    pub fn mark(&mut self, reached: ReachedLimits) {
        self.reached |= reached;
    }

    #[inline]
    pub fn duration(&self) -> f64 {
        self.duration
    }

    #[inline]
    pub fn start(&self) -> KinematicState {
        self.start
    }

    #[inline]
    pub fn end(&self) -> KinematicState {
        self.end
    }

    #[inline]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    #[inline]
    pub fn reached_limits(&self) -> ReachedLimits {
        self.reached
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.segments.is_full()
    }

    /// State, jerk and active segment at time `t`.
    ///
    /// Before zero the start state is returned; at or past the duration the
    /// exact end state is held with zero jerk.
    pub fn sample(&self, t: f64) -> ProfileSample {
        if t <= 0.0 {
            return ProfileSample {
                state: self.start,
                jerk: self.segments.first().map_or(0.0, |s| s.jerk),
                segment: 0,
            };
        }

        let mut elapsed = 0.0;
        for (index, segment) in self.segments.iter().enumerate() {
            if t < elapsed + segment.duration {
                return ProfileSample {
                    state: segment.start.integrate(segment.jerk, t - elapsed),
                    jerk: segment.jerk,
                    segment: index,
                };
            }
            elapsed += segment.duration;
        }

        ProfileSample {
            state: self.end,
            jerk: 0.0,
            segment: self.segments.len().saturating_sub(1),
        }
    }

    /// `(min, max)` position over the whole profile.
    pub fn position_extrema(&self) -> (f64, f64) {
        let mut range = Extrema::new(self.start.position);
        range.include(self.end.position);
        for s in &self.segments {
            // Interior extrema where v(t) = v0 + a0 t + j t²/2 = 0.
            for t in quadratic_roots_in(s.jerk / 2.0, s.start.acceleration, s.start.velocity, s.duration) {
                range.include(s.start.integrate(s.jerk, t).position);
            }
            range.include(s.start.integrate(s.jerk, s.duration).position);
        }
        range.into_tuple()
    }

    /// `(min, max)` velocity over the whole profile.
    pub fn velocity_extrema(&self) -> (f64, f64) {
        let mut range = Extrema::new(self.start.velocity);
        range.include(self.end.velocity);
        for s in &self.segments {
            if s.jerk != 0.0 {
                let t = -s.start.acceleration / s.jerk;
                if t > 0.0 && t < s.duration {
                    range.include(s.start.integrate(s.jerk, t).velocity);
                }
            }
            range.include(s.start.integrate(s.jerk, s.duration).velocity);
        }
        range.into_tuple()
    }

    /// `(min, max)` acceleration over the whole profile.
    pub fn acceleration_extrema(&self) -> (f64, f64) {
        let mut range = Extrema::new(self.start.acceleration);
        range.include(self.end.acceleration);
        for s in &self.segments {
            range.include(s.start.acceleration + s.jerk * s.duration);
        }
        range.into_tuple()
    }

    /// Largest jerk magnitude used by any segment.
    pub fn peak_jerk(&self) -> f64 {
        self.segments.iter().fold(0.0, |m, s| m.max(s.jerk.abs()))
    }
}

struct Extrema {
    min: f64,
    max: f64,
}

impl Extrema {
    fn new(value: f64) -> Self {
        Self {
            min: value,
            max: value,
        }
    }

    #[inline]
    fn include(&mut self, value: f64) {
        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }

    fn into_tuple(self) -> (f64, f64) {
        (self.min, self.max)
    }
}
