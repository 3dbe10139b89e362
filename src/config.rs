//! System configuration parameters
//!
//! All tunable parameters for the Pillbox dispenser.
//! Values can be overridden via NVS (non-volatile storage).
//!
//! The servo step rate is deliberately absent: it is a mechanical limit,
//! see [`SWEEP_STEP_MS`](crate::app::actuators::SWEEP_STEP_MS).

use serde::{Deserialize, Serialize};

use crate::app::ports::ConfigError;

/// Copy `s` into a fixed-capacity string, truncating at a char boundary.
pub fn bounded<const N: usize>(s: &str) -> heapless::String<N> {
    let mut out = heapless::String::new();
    for c in s.chars() {
        if out.push(c).is_err() {
            break;
        }
    }
    out
}

/// Connection parameters for the schedule store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreCredentials {
    pub host: heapless::String<64>,
    pub port: u16,
    pub user: heapless::String<32>,
    pub password: heapless::String<64>,
    pub database: heapless::String<32>,
}

impl Default for StoreCredentials {
    fn default() -> Self {
        Self {
            host: bounded("pillbox-store.local"),
            port: 8080,
            user: bounded("pillbox"),
            password: heapless::String::new(),
            database: bounded("pillbox"),
        }
    }
}

/// Core system configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispenserConfig {
    // --- Timing ---
    /// Control loop period between tick starts (milliseconds)
    pub tick_interval_ms: u32,
    /// How long batch-opened compartments stay open (seconds)
    pub dwell_secs: u32,
    /// Store liveness check interval inside the dwell window (milliseconds)
    pub liveness_poll_ms: u32,
    /// Ticks between diagnostic counter reports
    pub stats_interval_ticks: u32,

    // --- Clock ---
    /// Local time offset from UTC (seconds)
    pub utc_offset_secs: i32,

    // --- Network ---
    pub wifi_ssid: heapless::String<32>,
    pub wifi_password: heapless::String<64>,
    pub store: StoreCredentials,
}

impl Default for DispenserConfig {
    fn default() -> Self {
        Self {
            // Timing
            tick_interval_ms: 200,
            dwell_secs: 60,
            liveness_poll_ms: 100,
            stats_interval_ticks: 300, // ~1/min at the default tick

            // Manila, UTC+8, no DST
            utc_offset_secs: 8 * 3600,

            wifi_ssid: heapless::String::new(),
            wifi_password: heapless::String::new(),
            store: StoreCredentials::default(),
        }
    }
}

impl DispenserConfig {
    /// Range-check every field.  Out-of-range values are rejected, not clamped.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(50..=5000).contains(&self.tick_interval_ms) {
            return Err(ConfigError::ValidationFailed(
                "tick_interval_ms must be 50–5000",
            ));
        }
        if !(5..=600).contains(&self.dwell_secs) {
            return Err(ConfigError::ValidationFailed("dwell_secs must be 5–600"));
        }
        if !(10..=1000).contains(&self.liveness_poll_ms) {
            return Err(ConfigError::ValidationFailed(
                "liveness_poll_ms must be 10–1000",
            ));
        }
        if self.liveness_poll_ms >= self.dwell_secs * 1000 {
            return Err(ConfigError::ValidationFailed(
                "liveness_poll_ms must be shorter than the dwell window",
            ));
        }
        if self.stats_interval_ticks == 0 {
            return Err(ConfigError::ValidationFailed(
                "stats_interval_ticks must be non-zero",
            ));
        }
        if !(-14 * 3600..=14 * 3600).contains(&self.utc_offset_secs) {
            return Err(ConfigError::ValidationFailed(
                "utc_offset_secs must be within ±14 h",
            ));
        }
        if self.store.host.is_empty() {
            return Err(ConfigError::ValidationFailed("store.host must be set"));
        }
        if self.store.port == 0 {
            return Err(ConfigError::ValidationFailed("store.port must be non-zero"));
        }
        Ok(())
    }

    /// Dwell window in milliseconds.
    pub fn dwell_ms(&self) -> u32 {
        self.dwell_secs * 1000
    }
}
