//! OTG Common Library
//!
//! Shared constants, the kinematic state value type, and configuration
//! loading utilities for all OTG workspace crates.
//!
//! # Module Structure
//!
//! - [`consts`] - Capacity limits and cycle-time bounds
//! - [`kinematics`] - Position/velocity/acceleration state under constant jerk
//! - [`config`] - Configuration loading traits and types
//! - [`prelude`] - Common re-exports for convenience
//!
//! # Usage
//!
//! ```rust
//! use otg_common::prelude::*;
//!
//! let s = KinematicState::new(0.0, 1.0, 0.0).integrate(0.0, 2.0);
//! assert_eq!(s.position, 2.0);
//! ```

pub mod config;
pub mod consts;
pub mod kinematics;
pub mod prelude;
