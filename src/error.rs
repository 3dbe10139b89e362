//! Unified error types for the Pillbox firmware.
//!
//! Every subsystem error converts into the top-level [`Error`], keeping the
//! control loop's handling uniform.  All variants are `Copy` so they can be
//! passed through the engine and logged without allocation.
//!
//! None of these are fatal: the tick loop is the top level, and each kind
//! is handled inside the tick that produced it.

use core::fmt;

use crate::app::ports::{ConfigError, StoreError};

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fallible operation in the firmware funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The schedule store could not be reached or rejected a query.
    Store(StoreError),
    /// A reminder could not be dispensed.
    Dispense(DispenseError),
    /// Configuration is invalid or could not be loaded.
    Config(ConfigError),
    /// Peripheral or network bring-up failed.
    Init(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Store(e) => write!(f, "store: {e}"),
            Self::Dispense(e) => write!(f, "dispense: {e}"),
            Self::Config(e) => write!(f, "config: {e}"),
            Self::Init(msg) => write!(f, "init: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<StoreError> for Error {
    fn from(e: StoreError) -> Self {
        Self::Store(e)
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

// ---------------------------------------------------------------------------
// Dispense errors
// ---------------------------------------------------------------------------

/// Problems with a single reminder.  The offending reminder is skipped and
/// the rest of the batch carries on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispenseError {
    /// `medication_slot` outside `1..=SLOT_COUNT`.  Carries the raw value.
    InvalidSlot(i32),
}

impl fmt::Display for DispenseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidSlot(raw) => write!(f, "invalid medication slot {raw}"),
        }
    }
}

impl From<DispenseError> for Error {
    fn from(e: DispenseError) -> Self {
        Self::Dispense(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
