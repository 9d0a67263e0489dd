//! Real-time clocks.
use std::time::{Duration, Instant};

use crate::constants::*;

/// Fixed interval clock, used to pace the interpreter and the timers
/// against wall time.
///
/// It is designed to work with the yielding cooperative pattern
/// of the interpreter loop. When the VM yields control back to the
/// caller, time elapses until it is resumed. Once the interpreter
/// is resumed, the elapsed time is taken into account when determining
/// the next cycle.
#[derive(Debug)]
pub(crate) struct Clock {
    interval: Duration,
    last: Instant,
}

impl Clock {
    /// Creates a new clock with the current time as internal state.
    pub(crate) fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: Instant::now(),
        }
    }

    /// Clock for the 60Hz delay and sound timers.
    pub(crate) fn timer() -> Self {
        Self::new(Duration::from_nanos(CLOCK_CYCLE_TIME))
    }

    /// Set the clock state back to zero.
    pub(crate) fn reset(&mut self) {
        self.last = Instant::now()
    }

    /// A clock with a zero interval ticks on every check.
    pub(crate) fn is_unthrottled(&self) -> bool {
        self.interval.is_zero()
    }

    /// Check whether a cycle has elapsed, and start the next cycle if so.
    pub(crate) fn tick(&mut self) -> bool {
        let elapsed = self.last.elapsed();
        if elapsed < self.interval {
            return false;
        }

        if elapsed >= self.interval * 2 {
            // Reset back to zero, rather than trying to catch up.
            //
            // If the VM was paused for debugging, and a large
            // amount of time has elapsed until it is resumed,
            // it should simply continue at the next cycle running
            // at its usual speed.
            self.reset();
        } else {
            // Keep the phase so the average rate stays exact.
            self.last += self.interval;
        }

        true
    }
}
