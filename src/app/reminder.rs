//! Schedule data model.
//!
//! A [`Reminder`] is one scheduled dosing event as persisted in the schedule
//! store.  Rows are created and owned by whoever edits the schedule; the
//! controller only reads them and updates `status` / `box_status`.

use chrono::{NaiveDate, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::error::DispenseError;

/// Number of medication compartments on the board.
pub const SLOT_COUNT: usize = 7;

/// Store-assigned reminder identifier, stable for the reminder's lifetime.
pub type ReminderId = u32;

// ───────────────────────────────────────────────────────────────
// Slot index
// ───────────────────────────────────────────────────────────────

/// A validated medication slot number in `1..=SLOT_COUNT`.
///
/// The store keeps `medication_slot` as a raw integer, so anything can show
/// up there.  Construct through [`SlotIndex::new`] to reject bad values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SlotIndex(pub(super) u8);

impl SlotIndex {
    pub fn new(raw: i32) -> Result<Self, DispenseError> {
        match u8::try_from(raw) {
            Ok(n) if n >= 1 && usize::from(n) <= SLOT_COUNT => Ok(Self(n)),
            _ => Err(DispenseError::InvalidSlot(raw)),
        }
    }

    /// One-based slot number, as stored.
    pub fn get(self) -> u8 {
        self.0
    }

    /// Zero-based position, used for arrays and servo channels.
    pub fn position(self) -> usize {
        usize::from(self.0) - 1
    }

    /// Every slot on the board, in ascending order.
    pub fn all() -> impl Iterator<Item = SlotIndex> {
        (1..=SLOT_COUNT as u8).map(SlotIndex)
    }
}

impl core::fmt::Display for SlotIndex {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ───────────────────────────────────────────────────────────────
// Status fields
// ───────────────────────────────────────────────────────────────

/// Dosing status.  `Completed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReminderStatus {
    Waiting,
    Completed,
}

/// Whether the compartment is recorded as physically open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoxStatus {
    Open,
    Closed,
}

// ───────────────────────────────────────────────────────────────
// Reminder
// ───────────────────────────────────────────────────────────────

/// A full reminder row as held by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reminder {
    pub id: ReminderId,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub medication_slot: i32,
    pub status: ReminderStatus,
    pub box_status: BoxStatus,
}

impl Reminder {
    /// A fresh `waiting` / `closed` reminder.
    pub fn waiting(id: ReminderId, date: NaiveDate, time: NaiveTime, medication_slot: i32) -> Self {
        Self {
            id,
            date,
            time,
            medication_slot,
            status: ReminderStatus::Waiting,
            box_status: BoxStatus::Closed,
        }
    }

    /// The projection returned by the fetch queries.
    pub fn row(&self) -> ReminderRow {
        ReminderRow {
            id: self.id,
            time: self.time,
            medication_slot: self.medication_slot,
        }
    }
}

/// Columns returned by `fetch_open_batch` / `fetch_waiting`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReminderRow {
    pub id: ReminderId,
    pub time: NaiveTime,
    pub medication_slot: i32,
}

/// Minute-granularity comparison; seconds and below are ignored.
pub fn same_minute(a: NaiveTime, b: NaiveTime) -> bool {
    a.hour() == b.hour() && a.minute() == b.minute()
}
