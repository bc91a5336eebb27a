//! Cooperative interruption of planning.
//!
//! The synthesizer polls an [`Interrupt`] between bounded phases (after
//! validation, after each section's single-axis synthesis and after each
//! synchronization). Nothing is preempted: an interrupted plan is simply
//! discarded and the previous trajectory stays in use.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Source of an interruption request.
pub trait Interrupt {
    /// True when planning should stop at the next checkpoint.
    fn should_interrupt(&self) -> bool;
}

/// Never interrupts.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverInterrupt;

impl Interrupt for NeverInterrupt {
    #[inline]
    fn should_interrupt(&self) -> bool {
        false
    }
}

/// Flag set from another thread or a signal handler.
impl Interrupt for AtomicBool {
    #[inline]
    fn should_interrupt(&self) -> bool {
        self.load(Ordering::Relaxed)
    }
}

impl<T: Interrupt + ?Sized> Interrupt for &T {
    #[inline]
    fn should_interrupt(&self) -> bool {
        (**self).should_interrupt()
    }
}

/// Wall-clock planning budget.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    at: Instant,
}

impl Deadline {
    /// Deadline `budget` from now.
    pub fn after(budget: Duration) -> Self {
        Self {
            at: Instant::now() + budget,
        }
    }
}

impl Interrupt for Deadline {
    #[inline]
    fn should_interrupt(&self) -> bool {
        Instant::now() >= self.at
    }
}

/// Either source may interrupt.
#[derive(Debug, Clone, Copy)]
pub struct Either<A, B>(pub A, pub B);

impl<A: Interrupt, B: Interrupt> Interrupt for Either<A, B> {
    #[inline]
    fn should_interrupt(&self) -> bool {
        self.0.should_interrupt() || self.1.should_interrupt()
    }
}

impl<T: Interrupt> Interrupt for Option<T> {
    #[inline]
    fn should_interrupt(&self) -> bool {
        self.as_ref().is_some_and(Interrupt::should_interrupt)
    }
}
