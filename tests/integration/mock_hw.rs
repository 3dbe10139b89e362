//! Mock adapters for integration tests.
//!
//! Records every servo write and every emitted event so tests can assert
//! on the full history without touching real GPIO/PWM registers or a
//! network store.  Time is virtual: delays only advance a counter.

use std::cell::Cell;
use std::collections::VecDeque;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use embedded_hal::delay::DelayNs;
use pillbox::adapters::memory_store::InMemoryStore;
use pillbox::app::commands::OverrideCommand;
use pillbox::app::events::{AppEvent, Pass};
use pillbox::app::ports::{ClockPort, EventSink, OverridePort, ServoPort};
use pillbox::app::reminder::{BoxStatus, Reminder, ReminderId};
use pillbox::app::service::DispenserService;
use pillbox::config::DispenserConfig;

// ── RecordingServos ───────────────────────────────────────────

#[derive(Default)]
pub struct RecordingServos {
    pub writes: Vec<(usize, u8)>,
}

#[allow(dead_code)]
impl RecordingServos {
    /// Last angle commanded on `channel`.
    pub fn position(&self, channel: usize) -> Option<u8> {
        self.writes
            .iter()
            .rev()
            .find(|(c, _)| *c == channel)
            .map(|(_, a)| *a)
    }
}

impl ServoPort for RecordingServos {
    fn write_angle(&mut self, channel: usize, degrees: u8) {
        self.writes.push((channel, degrees));
    }
}

// ── VirtualDelay ──────────────────────────────────────────────

#[derive(Default)]
pub struct VirtualDelay {
    pub elapsed_ms: u64,
}

impl DelayNs for VirtualDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.elapsed_ms += u64::from(ns) / 1_000_000;
    }

    fn delay_ms(&mut self, ms: u32) {
        self.elapsed_ms += u64::from(ms);
    }
}

// ── FixedClock ────────────────────────────────────────────────

pub struct FixedClock {
    now: Cell<Option<NaiveDateTime>>,
}

#[allow(dead_code)]
impl FixedClock {
    pub fn at(h: u32, m: u32, s: u32) -> Self {
        Self {
            now: Cell::new(Some(at(h, m, s))),
        }
    }

    pub fn unsynced() -> Self {
        Self {
            now: Cell::new(None),
        }
    }

    pub fn set(&self, h: u32, m: u32, s: u32) {
        self.now.set(Some(at(h, m, s)));
    }
}

impl ClockPort for FixedClock {
    fn now(&self) -> Option<NaiveDateTime> {
        self.now.get()
    }
}

// ── ScriptedOverrides ─────────────────────────────────────────

/// Button panel replaying one entry per tick; idle once exhausted.
#[derive(Default)]
pub struct ScriptedOverrides {
    script: VecDeque<Option<OverrideCommand>>,
}

#[allow(dead_code)]
impl ScriptedOverrides {
    pub fn idle() -> Self {
        Self::default()
    }

    pub fn once(cmd: OverrideCommand) -> Self {
        Self {
            script: VecDeque::from([Some(cmd)]),
        }
    }
}

impl OverridePort for ScriptedOverrides {
    fn poll(&mut self) -> Option<OverrideCommand> {
        self.script.pop_front().flatten()
    }
}

// ── RecordingSink ─────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn contains(&self, event: &AppEvent) -> bool {
        self.events.contains(event)
    }

    pub fn count(&self, pred: impl Fn(&AppEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }

    /// `(slot, reminder, pass)` of every opening sweep, in order.
    pub fn opened(&self) -> Vec<(u8, ReminderId, Pass)> {
        self.events
            .iter()
            .filter_map(|e| match e {
                AppEvent::SlotOpened {
                    slot,
                    reminder,
                    pass,
                } => Some((slot.get(), *reminder, *pass)),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}

// ── Fixtures ──────────────────────────────────────────────────

pub type TestService = DispenserService<InMemoryStore, RecordingServos>;

pub fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 3).unwrap()
}

pub fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
    day().and_time(NaiveTime::from_hms_opt(h, m, s).unwrap())
}

/// A `waiting` reminder on [`day`] at `h:m:00`.
pub fn waiting(id: ReminderId, h: u32, m: u32, slot: i32) -> Reminder {
    Reminder::waiting(id, day(), NaiveTime::from_hms_opt(h, m, 0).unwrap(), slot)
}

/// A reminder the store records as physically open.
#[allow(dead_code)]
pub fn recorded_open(id: ReminderId, h: u32, m: u32, slot: i32) -> Reminder {
    let mut r = waiting(id, h, m, slot);
    r.box_status = BoxStatus::Open;
    r
}

pub fn service_with(reminders: Vec<Reminder>) -> TestService {
    let mut store = InMemoryStore::new();
    for r in reminders {
        store.insert(r);
    }
    DispenserService::new(&DispenserConfig::default(), store, RecordingServos::default())
}
