//! Multi-axis trajectory: synchronized sections of per-axis profiles.
//!
//! A trajectory is a sequence of sections, one per waypoint leg. Inside a
//! section every axis has one [`AxisProfile`]; the section lasts as long as
//! its longest profile, and shorter profiles hold their end state.
//!
//! Storage is fixed-capacity. A trajectory is large, so the stepper keeps
//! two boxed instances and swaps them instead of reallocating.

use heapless::Vec;
use otg_common::consts::{MAX_AXES, MAX_SECTIONS};
use otg_common::kinematics::KinematicState;

use crate::profile::{AxisProfile, ProfileSample};

/// One leg of the path.
#[derive(Debug, Clone, PartialEq)]
pub struct Section {
    duration: f64,
    profiles: Vec<AxisProfile, MAX_AXES>,
}

impl Section {
    pub const fn new() -> Self {
        Self {
            duration: 0.0,
            profiles: Vec::new(),
        }
    }

    /// Append an axis profile; the section lasts at least as long as it.
    pub fn push(&mut self, profile: AxisProfile) -> Result<(), AxisProfile> {
        self.duration = self.duration.max(profile.duration());
        self.profiles.push(profile)
    }

    /// Extend the section to `duration` (never shortens it).
    pub fn extend_to(&mut self, duration: f64) {
        self.duration = self.duration.max(duration);
    }

    #[inline]
    pub fn duration(&self) -> f64 {
        self.duration
    }

    #[inline]
    pub fn profiles(&self) -> &[AxisProfile] {
        &self.profiles
    }
}

impl Default for Section {
    fn default() -> Self {
        Self::new()
    }
}

/// Sampled state of one axis.
pub type AxisSample = ProfileSample;

/// Complete planned motion of an axis group.
#[derive(Debug, Clone, PartialEq)]
pub struct Trajectory {
    sections: Vec<Section, MAX_SECTIONS>,
    duration: f64,
    axis_count: usize,
}

impl Trajectory {
    pub const fn new() -> Self {
        Self {
            sections: Vec::new(),
            duration: 0.0,
            axis_count: 0,
        }
    }

    /// Drop all sections and prepare for `axis_count` axes.
    pub fn clear(&mut self, axis_count: usize) {
        self.sections.clear();
        self.duration = 0.0;
        self.axis_count = axis_count;
    }

    /// Append a section. Fails when the section capacity is exhausted.
    pub fn push_section(&mut self, section: Section) -> Result<(), Section> {
        let duration = section.duration();
        self.sections.push(section)?;
        self.duration += duration;
        Ok(())
    }

    #[inline]
    pub fn duration(&self) -> f64 {
        self.duration
    }

    #[inline]
    pub fn axis_count(&self) -> usize {
        self.axis_count
    }

    #[inline]
    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    /// True once at least one section has been planned.
    #[inline]
    pub fn is_planned(&self) -> bool {
        !self.sections.is_empty()
    }

    /// Sample every axis at `time` into `out`; returns the active section.
    ///
    /// `out` must hold one entry per axis. Times past the duration hold the
    /// final state. Allocation-free.
    pub fn sample(&self, time: f64, out: &mut [AxisSample]) -> usize {
        let last = self.sections.len().saturating_sub(1);
        let mut offset = 0.0;
        for (index, section) in self.sections.iter().enumerate() {
            if index == last || time < offset + section.duration() {
                for (slot, profile) in out.iter_mut().zip(section.profiles()) {
                    *slot = profile.sample(time - offset);
                }
                return index;
            }
            offset += section.duration();
        }
        0
    }

    /// Final state of `axis`.
    pub fn end_state(&self, axis: usize) -> Option<KinematicState> {
        self.sections
            .last()
            .and_then(|s| s.profiles().get(axis))
            .map(AxisProfile::end)
    }

    /// `(min, max)` position of `axis` over the whole trajectory.
    pub fn position_extrema(&self, axis: usize) -> Option<(f64, f64)> {
        self.sections
            .iter()
            .filter_map(|s| s.profiles().get(axis))
            .map(AxisProfile::position_extrema)
            .reduce(|(lo, hi), (a, b)| (lo.min(a), hi.max(b)))
    }
}

impl Default for Trajectory {
    fn default() -> Self {
        Self::new()
    }
}
