//! Inbound commands to the application service.
//!
//! The only commands that bypass normal timing logic come from the two
//! physical buttons, surfaced through the
//! [`OverridePort`](super::ports::OverridePort).

/// Manual override requested on this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverrideCommand {
    /// Close every open compartment now, then continue the tick.
    ForceCloseAll,

    /// Close everything, drop all in-memory state and restart the process.
    ResetSystem,
}
