//! Integration tests for the OTG planner.
//!
//! These tests drive the public API end to end: request → synthesizer →
//! trajectory → stepper, plus configuration loading and waypoint handling.

mod integration;
