//! [`LoopRate`] – wall-clock pacer for the control loops.
//!
//! Sleeps for whatever is left of the current period so the loop body plus
//! the sleep add up to one period.  When the body overruns the period the
//! sleep is skipped; when it overruns by more than a whole period the
//! schedule is re-anchored at the current instant instead of trying to catch
//! up with a burst of zero-length ticks.

use std::time::{Duration, Instant};

use tracing::trace;
use turtle_middleware::Pacer;

/// Fixed-rate real-time [`Pacer`].
#[derive(Debug, Default)]
pub struct LoopRate {
    cycle_start: Option<Instant>,
    overruns: u64,
}

impl LoopRate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of periods whose body took longer than the period itself.
    pub fn overruns(&self) -> u64 {
        self.overruns
    }
}

impl Pacer for LoopRate {
    fn sleep(&mut self, period: Duration) {
        let now = Instant::now();
        let start = *self.cycle_start.get_or_insert(now);
        let expected_end = start + period;

        if now < expected_end {
            std::thread::sleep(expected_end - now);
            self.cycle_start = Some(expected_end);
            return;
        }

        self.overruns += 1;
        trace!(late_by = ?(now - expected_end), "control period overrun");
        self.cycle_start = if now > expected_end + period {
            Some(now)
        } else {
            Some(expected_end)
        };
    }
}
