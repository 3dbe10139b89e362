//! Cooperative tick scheduling.
//!
//! The controller is a single blocking loop.  Two timing constructs exist:
//!
//! ```text
//!  ┌──────────── tick period (default 200 ms) ────────────┐
//!  │ override poll → batch pass → live match → write-back │ idle wait
//!  └──────────────────────────────────────────────────────┘
//!                       │
//!                       ▼ (only when a batch opened something)
//!            ┌──── dwell window (default 60 s) ────┐
//!            │ poll ▸ poll ▸ poll ▸ … every 100 ms │  liveness only
//!            └─────────────────────────────────────┘
//! ```
//!
//! [`TickScheduler`] measures how long the tick body took against a
//! monotonic clock and only waits out the remainder of the period; a tick
//! that ran long (a servo sweep takes ~2.7 s) starts the next one at once.
//! [`DwellWindow`] is the only place execution suspends mid-tick.

use embedded_hal::delay::DelayNs;
use log::debug;

// ═══════════════════════════════════════════════════════════════
//  Tick scheduler
// ═══════════════════════════════════════════════════════════════

pub struct TickScheduler {
    period_ms: u32,
    tick_started_ms: Option<u64>,
    ticks: u64,
    overruns: u64,
}

impl TickScheduler {
    pub fn new(period_ms: u32) -> Self {
        Self {
            period_ms,
            tick_started_ms: None,
            ticks: 0,
            overruns: 0,
        }
    }

    /// Mark the start of a tick at monotonic time `now_ms`.
    pub fn start_tick(&mut self, now_ms: u64) {
        self.tick_started_ms = Some(now_ms);
        self.ticks += 1;
    }

    /// Milliseconds left in the current period.  Zero if the tick overran.
    pub fn remaining_ms(&mut self, now_ms: u64) -> u32 {
        let Some(started) = self.tick_started_ms else {
            return 0;
        };
        let elapsed = now_ms.saturating_sub(started);
        let period = u64::from(self.period_ms);
        if elapsed >= period {
            if elapsed > period {
                self.overruns += 1;
                debug!("Tick {} overran by {} ms", self.ticks, elapsed - period);
            }
            0
        } else {
            (period - elapsed) as u32
        }
    }

    /// Block until the current period is over.
    pub fn wait_for_next(&mut self, now_ms: u64, delay: &mut impl DelayNs) {
        let remaining = self.remaining_ms(now_ms);
        if remaining > 0 {
            delay.delay_ms(remaining);
        }
    }

    pub fn period_ms(&self) -> u32 {
        self.period_ms
    }

    /// Ticks started so far.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn overruns(&self) -> u64 {
        self.overruns
    }
}

// ═══════════════════════════════════════════════════════════════
//  Dwell window
// ═══════════════════════════════════════════════════════════════

/// A fixed hold period subdivided into equal poll intervals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DwellWindow {
    duration_ms: u32,
    poll_ms: u32,
}

impl DwellWindow {
    pub fn new(duration_ms: u32, poll_ms: u32) -> Self {
        Self {
            duration_ms,
            poll_ms: poll_ms.max(1),
        }
    }

    /// Number of poll intervals in the window (rounded up).
    pub fn polls(&self) -> u32 {
        self.duration_ms.div_ceil(self.poll_ms)
    }

    pub fn duration_secs(&self) -> u32 {
        self.duration_ms / 1000
    }

    /// Wait out the window, calling `check` after every poll interval.
    /// Stops early with the first error `check` returns.
    pub fn wait<E>(
        &self,
        delay: &mut impl DelayNs,
        mut check: impl FnMut() -> Result<(), E>,
    ) -> Result<(), E> {
        for _ in 0..self.polls() {
            delay.delay_ms(self.poll_ms);
            check()?;
        }
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════
