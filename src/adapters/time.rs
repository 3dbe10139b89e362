//! Clock adapters.
//!
//! - [`SystemClock`] — local wall-clock time for the live match pass.  The
//!   system clock is set by SNTP; readings before 2020 mean it has not
//!   synced yet and are reported as `None`.
//! - [`MonotonicClock`] — milliseconds since boot for the tick scheduler.
//!   `esp_timer_get_time()` on ESP-IDF, `std::time::Instant` elsewhere.

use chrono::{DateTime, FixedOffset, NaiveDateTime, Offset, Utc};

use crate::app::ports::ClockPort;

/// 2020-01-01T00:00:00Z.
const EPOCH_2020: i64 = 1_577_836_800;

pub struct SystemClock {
    offset: FixedOffset,
}

impl SystemClock {
    /// `utc_offset_secs` out of chrono's range falls back to UTC.
    pub fn new(utc_offset_secs: i32) -> Self {
        Self {
            offset: FixedOffset::east_opt(utc_offset_secs).unwrap_or_else(|| Utc.fix()),
        }
    }

    /// Convert a UTC instant to local time, rejecting unsynced readings.
    pub fn localise(&self, utc: DateTime<Utc>) -> Option<NaiveDateTime> {
        if utc.timestamp() < EPOCH_2020 {
            return None;
        }
        Some(utc.with_timezone(&self.offset).naive_local())
    }
}

impl ClockPort for SystemClock {
    fn now(&self) -> Option<NaiveDateTime> {
        self.localise(Utc::now())
    }
}

/// Monotonic milliseconds since boot.
pub struct MonotonicClock {
    #[cfg(not(target_os = "espidf"))]
    start: std::time::Instant,
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            #[cfg(not(target_os = "espidf"))]
            start: std::time::Instant::now(),
        }
    }

    #[cfg(target_os = "espidf")]
    pub fn uptime_ms(&self) -> u64 {
        (unsafe { esp_idf_svc::sys::esp_timer_get_time() }) as u64 / 1_000
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn uptime_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}
