//! Outbound application events.
//!
//! The [`DispenserService`](super::service::DispenserService) and the
//! reconciliation engine emit these through the
//! [`EventSink`](super::ports::EventSink) port.  Together they form the
//! diagnostic stream: every fetch, every open/close, every reconnect attempt
//! and its outcome, every store write.

use chrono::NaiveDate;

use super::reminder::{ReminderId, SlotIndex};

/// Which engine pass produced an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pass {
    /// Recovery of reminders already marked `box_status = open`.
    DailyBatch,
    /// Firing of `waiting` reminders at their due minute.
    LiveMatch,
}

/// Where a reconnect was attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectContext {
    Startup,
    Fetch,
    Dwell,
    WriteBack,
}

/// Which guarded store write failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreWrite {
    MarkClosed,
    MarkCompleted,
}

/// Structured events emitted by the application core.
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    /// The service has started.
    Started { slots: usize },

    /// Latest scheduled date pinned for this tick.
    LatestDate(NaiveDate),

    /// The store holds no reminders at all.
    NoSchedule,

    /// A fetch query returned `count` rows.
    Fetched { pass: Pass, date: NaiveDate, count: usize },

    /// A fetch query failed; treated as no rows.
    FetchFailed { pass: Pass },

    /// No wall-clock reading; live matching skipped this tick.
    ClockUnavailable,

    /// A reminder referenced a slot outside the board and was skipped.
    InvalidSlot { reminder: ReminderId, raw_slot: i32 },

    /// A compartment finished its opening sweep.
    SlotOpened { slot: SlotIndex, reminder: ReminderId, pass: Pass },

    /// A compartment finished its closing sweep.
    SlotClosed { slot: SlotIndex },

    /// Batch compartments are open and the dwell window started.
    DwellStarted { secs: u32, slots: usize },

    /// A batch gave up for this tick because the store stayed unreachable.
    BatchAbandoned { context: ReconnectContext },

    /// Store connection found dead; reconnecting.
    Reconnecting(ReconnectContext),

    /// Reconnect succeeded.
    Reconnected(ReconnectContext),

    /// Reconnect failed.
    ReconnectFailed(ReconnectContext),

    /// `box_status = closed` written.
    MarkedClosed(ReminderId),

    /// `status = completed` written.
    MarkedCompleted(ReminderId),

    /// Guarded completion write matched no `waiting` row.
    AlreadyCompleted(ReminderId),

    /// A store write failed and will be retried.
    WriteFailed { reminder: ReminderId, write: StoreWrite },

    /// Force-close button handled.
    ManualCloseAll { closed: usize },

    /// Reset button handled; restart follows.
    ResetRequested,

    /// Periodic counters.
    Stats(ServiceStats),
}

/// Running counters since the last restart.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServiceStats {
    pub ticks: u64,
    pub slots_opened: u32,
    pub live_fires: u32,
    pub reconnect_attempts: u32,
    pub reconnect_failures: u32,
    pub batches_abandoned: u32,
    pub pending_completions: usize,
}
