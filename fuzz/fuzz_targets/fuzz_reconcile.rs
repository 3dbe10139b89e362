//! Fuzz target: reconciliation over arbitrary schedules
//!
//! Interprets the input as a list of reminder rows followed by a tick
//! script, runs the dispenser service against the in-memory store and
//! asserts the bank never reports more open slots than it has.
//!
//! cargo fuzz run fuzz_reconcile

#![no_main]

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use libfuzzer_sys::fuzz_target;
use pillbox::adapters::memory_store::InMemoryStore;
use pillbox::app::commands::OverrideCommand;
use pillbox::app::events::AppEvent;
use pillbox::app::ports::{ClockPort, EventSink, OverridePort, ServoPort};
use pillbox::app::reminder::{BoxStatus, Reminder, SLOT_COUNT};
use pillbox::app::service::DispenserService;
use pillbox::config::DispenserConfig;

struct Servos;

impl ServoPort for Servos {
    fn write_angle(&mut self, _: usize, _: u8) {}
}

struct NoDelay;

impl embedded_hal::delay::DelayNs for NoDelay {
    fn delay_ns(&mut self, _: u32) {}
}

struct Clock(Option<NaiveDateTime>);

impl ClockPort for Clock {
    fn now(&self) -> Option<NaiveDateTime> {
        self.0
    }
}

struct Panel(Option<OverrideCommand>);

impl OverridePort for Panel {
    fn poll(&mut self) -> Option<OverrideCommand> {
        self.0.take()
    }
}

struct Discard;

impl EventSink for Discard {
    fn emit(&mut self, _: &AppEvent) {}
}

fuzz_target!(|data: &[u8]| {
    let Some(date) = NaiveDate::from_ymd_opt(2024, 6, 3) else {
        return;
    };
    let (rows, script) = data.split_at(data.len() / 2);

    let mut store = InMemoryStore::new();
    for (i, chunk) in rows.chunks_exact(3).enumerate() {
        let time = NaiveTime::from_hms_opt(8, u32::from(chunk[0] % 4), 0).unwrap_or_default();
        let mut r = Reminder::waiting(i as u32, date, time, i32::from(chunk[1] as i8));
        if chunk[2] & 1 == 1 {
            r.box_status = BoxStatus::Open;
        }
        store.insert(r);
    }

    let mut config = DispenserConfig::default();
    config.dwell_secs = 5;
    let mut svc = DispenserService::new(&config, store, Servos);

    for byte in script {
        let cmd = match byte >> 6 {
            0 => Some(OverrideCommand::ForceCloseAll),
            1 => Some(OverrideCommand::ResetSystem),
            _ => None,
        };
        let minute = u32::from(byte & 0x03);
        let now = NaiveTime::from_hms_opt(8, minute, u32::from((byte >> 2) & 0x0f))
            .map(|t| date.and_time(t));
        if byte & 0x3c == 0x3c {
            svc.store_mut().fail_queries(1);
        }
        let _ = svc.tick(&mut Panel(cmd), &Clock(now), &mut NoDelay, &mut Discard);
        assert!(svc.bank().open_slots().count() <= SLOT_COUNT);
    }
});
