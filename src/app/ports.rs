//! Port traits — the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ DispenserService (domain)
//! ```
//!
//! Driven adapters (servos, schedule store, clock, buttons, event sinks,
//! config storage) implement these traits.  The
//! [`DispenserService`](super::service::DispenserService) consumes them via
//! generics, so the domain core never touches hardware or the network
//! directly.
//!
//! Blocking waits go through [`embedded_hal::delay::DelayNs`] rather than a
//! port of our own; tests inject a virtual delay.

use chrono::{NaiveDate, NaiveDateTime};

use crate::config::{DispenserConfig, StoreCredentials};

use super::commands::OverrideCommand;
use super::reminder::{ReminderId, ReminderRow};

// ───────────────────────────────────────────────────────────────
// Clock port (driven adapter: wall clock → domain)
// ───────────────────────────────────────────────────────────────

/// Local wall-clock time, already timezone-adjusted.
pub trait ClockPort {
    /// `None` while the clock has not been synchronised.
    fn now(&self) -> Option<NaiveDateTime>;
}

// ───────────────────────────────────────────────────────────────
// Servo port (driven adapter: domain → hardware)
// ───────────────────────────────────────────────────────────────

/// Raw positional control of the servo channels.
///
/// Angle-to-pulse translation belongs to the adapter.  Sequencing, sweep
/// direction and open/closed bookkeeping live in
/// [`ActuatorBank`](super::actuators::ActuatorBank).
pub trait ServoPort {
    /// Command `channel` (zero-based) to `degrees` (0–180).
    fn write_angle(&mut self, channel: usize, degrees: u8);
}

// ───────────────────────────────────────────────────────────────
// Schedule store port (driven adapter: domain ↔ remote store)
// ───────────────────────────────────────────────────────────────

/// Parameterized query contract of the remote reminder store.
///
/// Implementations never build queries from strings; every value travels
/// as a typed parameter.  Any call may fail with
/// [`StoreError::Unreachable`] if the transport drops underneath it.
pub trait StorePort {
    /// Liveness of the underlying connection.  May change between calls.
    fn is_connected(&self) -> bool;

    /// (Re)establish the connection.
    fn connect(&mut self, credentials: &StoreCredentials) -> Result<(), StoreError>;

    /// The maximum `date` across all reminders, `None` if the store is empty.
    fn latest_date(&mut self) -> Result<Option<NaiveDate>, StoreError>;

    /// Reminders on `date` with `box_status = open` and `status != completed`,
    /// ordered by `time` ascending; ties keep the store's native row order.
    fn fetch_open_batch(&mut self, date: NaiveDate) -> Result<Vec<ReminderRow>, StoreError>;

    /// Reminders on `date` with `status = waiting`, ordered by `time` ascending.
    fn fetch_waiting(&mut self, date: NaiveDate) -> Result<Vec<ReminderRow>, StoreError>;

    /// Set `box_status = closed` for `id`.
    fn mark_closed(&mut self, id: ReminderId) -> Result<(), StoreError>;

    /// Set `status = completed` for `id` only where it is still `waiting`.
    /// Returns `true` if a row changed.
    fn mark_completed(&mut self, id: ReminderId) -> Result<bool, StoreError>;
}

// ───────────────────────────────────────────────────────────────
// Manual override port (driven adapter: buttons → domain)
// ───────────────────────────────────────────────────────────────

/// Sampled once per tick, ahead of the reconciliation engine.
pub trait OverridePort {
    fn poll(&mut self) -> Option<OverrideCommand>;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.  Adapters decide where they go (serial log,
/// telemetry uplink, test recorder).
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: domain ↔ persistent config)
// ───────────────────────────────────────────────────────────────

/// Loads and persists system configuration.
///
/// Implementations MUST validate before persisting.  Invalid ranges are
/// rejected with [`ConfigError::ValidationFailed`], never silently clamped.
pub trait ConfigPort {
    /// Returns [`DispenserConfig::default()`] if no stored config exists.
    fn load(&self) -> Result<DispenserConfig, ConfigError>;

    /// Validate and persist configuration.
    fn save(&self, config: &DispenserConfig) -> Result<(), ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`StorePort`] operations.  Both are recoverable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreError {
    /// Connection is down and could not be re-established.  The caller skips
    /// the rest of this tick's store work.
    Unreachable,
    /// The store answered but the query failed.  Fetches treat this as
    /// "no rows"; writes are retried on a later tick.
    QueryFailed,
}

/// Errors from [`ConfigPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// Stored config failed deserialization.
    Corrupted,
    /// A config field failed range validation.
    ValidationFailed(&'static str),
    /// Generic I/O error from the storage backend.
    IoError,
}

impl core::fmt::Display for StoreError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Unreachable => write!(f, "store unreachable"),
            Self::QueryFailed => write!(f, "query failed"),
        }
    }
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}
