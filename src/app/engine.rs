//! Reconciliation engine: keeps the compartments in step with the schedule.
//!
//! Each tick runs, in order:
//!
//! 1. **Date pin**: `latest_date()` once; both passes use that date.
//! 2. **Daily batch pass**: reminders the store records as `box_status =
//!    open` are (re)opened, held for the dwell window, closed, and written
//!    back as `closed`.  This is also how a restart recovers.
//! 3. **Live match pass**: `waiting` reminders due this minute open their
//!    compartment, at most once per reminder.
//! 4. **Completion write-back**: reminders we opened whose compartment has
//!    since closed are marked `completed`, guarded on `status = waiting`.
//!
//! A [`StoreError::Unreachable`] anywhere ends the tick's store work; the
//! next tick starts over from the date pin.

use chrono::{NaiveDate, NaiveDateTime};
use embedded_hal::delay::DelayNs;
use log::{debug, info, warn};

use crate::scheduler::DwellWindow;

use super::actuators::ActuatorBank;
use super::connection::ResilientStore;
use super::events::{AppEvent, Pass, ReconnectContext, StoreWrite};
use super::ports::{EventSink, ServoPort, StoreError, StorePort};
use super::reminder::{ReminderId, ReminderRow, SlotIndex, same_minute};
use super::tracker::DedupTracker;

pub struct ReconciliationEngine {
    tracker: DedupTracker,
    dwell: DwellWindow,
    slots_opened: u32,
    live_fires: u32,
    batches_abandoned: u32,
}

impl ReconciliationEngine {
    pub fn new(dwell: DwellWindow) -> Self {
        Self {
            tracker: DedupTracker::new(),
            dwell,
            slots_opened: 0,
            live_fires: 0,
            batches_abandoned: 0,
        }
    }

    // ── Tick ──────────────────────────────────────────────────

    /// One full reconciliation cycle.  `now` is the local wall-clock reading,
    /// `None` if the clock is not synchronised.
    pub fn run_tick<S: StorePort, H: ServoPort>(
        &mut self,
        now: Option<NaiveDateTime>,
        bank: &mut ActuatorBank<H>,
        store: &mut ResilientStore<S>,
        delay: &mut impl DelayNs,
        sink: &mut impl EventSink,
    ) -> Result<(), StoreError> {
        self.reconcile(now, bank, store, delay, sink)?;
        self.write_back_completions(store, sink)
    }

    fn reconcile<S: StorePort, H: ServoPort>(
        &mut self,
        now: Option<NaiveDateTime>,
        bank: &mut ActuatorBank<H>,
        store: &mut ResilientStore<S>,
        delay: &mut impl DelayNs,
        sink: &mut impl EventSink,
    ) -> Result<(), StoreError> {
        let date = match store.latest_date(sink) {
            Ok(Some(date)) => date,
            Ok(None) => {
                sink.emit(&AppEvent::NoSchedule);
                return Ok(());
            }
            Err(StoreError::QueryFailed) => {
                warn!("Engine: latest-date query failed, skipping passes");
                return Ok(());
            }
            Err(e) => return Err(e),
        };
        sink.emit(&AppEvent::LatestDate(date));

        self.run_daily_batch(date, bank, store, delay, sink)?;

        match now {
            Some(now) => self.run_live_match(date, now, bank, store, delay, sink),
            None => {
                sink.emit(&AppEvent::ClockUnavailable);
                Ok(())
            }
        }
    }

    // ── Daily batch pass ──────────────────────────────────────

    /// Reopen, hold and close every reminder the store records as open on
    /// `date`, then persist `box_status = closed`.
    pub fn run_daily_batch<S: StorePort, H: ServoPort>(
        &mut self,
        date: NaiveDate,
        bank: &mut ActuatorBank<H>,
        store: &mut ResilientStore<S>,
        delay: &mut impl DelayNs,
        sink: &mut impl EventSink,
    ) -> Result<(), StoreError> {
        let rows = fetch_rows(Pass::DailyBatch, date, store, sink, |s, d, k| {
            s.fetch_open_batch(d, k)
        })?;
        if rows.is_empty() {
            return Ok(());
        }

        let mut batch: Vec<(ReminderId, SlotIndex)> = Vec::with_capacity(rows.len());
        for row in &rows {
            let Some(slot) = validate_slot(row, sink) else {
                continue;
            };
            if bank.is_open(slot) {
                debug!("Engine: slot {} already open for reminder {}", slot, row.id);
            } else {
                bank.open(slot, delay);
                self.slots_opened += 1;
                sink.emit(&AppEvent::SlotOpened {
                    slot,
                    reminder: row.id,
                    pass: Pass::DailyBatch,
                });
            }
            self.tracker.record_batch_open(row.id, slot);
            batch.push((row.id, slot));
        }
        if batch.is_empty() {
            return Ok(());
        }

        // ── Dwell ──
        let mut open_slots: heapless::Vec<SlotIndex, { super::reminder::SLOT_COUNT }> =
            heapless::Vec::new();
        for (_, slot) in &batch {
            if !open_slots.contains(slot) {
                // At most one entry per slot, so capacity is never exceeded.
                let _ = open_slots.push(*slot);
            }
        }
        sink.emit(&AppEvent::DwellStarted {
            secs: self.dwell.duration_secs(),
            slots: open_slots.len(),
        });
        let dwell = self.dwell;
        let held = dwell.wait(delay, || {
            store.ensure_connected(ReconnectContext::Dwell, &mut *sink)
        });
        if let Err(e) = held {
            self.abandon(ReconnectContext::Dwell, sink);
            return Err(e);
        }

        // ── Close ──
        for slot in &open_slots {
            if bank.is_open(*slot) {
                bank.close(*slot, delay);
                sink.emit(&AppEvent::SlotClosed { slot: *slot });
            }
            self.tracker.mark_slot_closed(*slot);
        }

        // ── Persist `closed` ──
        for (id, slot) in batch {
            match store.mark_closed(id, sink) {
                Ok(()) => {
                    sink.emit(&AppEvent::MarkedClosed(id));
                    self.tracker.owe_completion(id, slot);
                }
                Err(StoreError::QueryFailed) => {
                    sink.emit(&AppEvent::WriteFailed {
                        reminder: id,
                        write: StoreWrite::MarkClosed,
                    });
                }
                Err(e) => {
                    self.abandon(ReconnectContext::WriteBack, sink);
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    // ── Live match pass ───────────────────────────────────────

    /// Open the compartment of every `waiting` reminder due this minute.
    pub fn run_live_match<S: StorePort, H: ServoPort>(
        &mut self,
        date: NaiveDate,
        now: NaiveDateTime,
        bank: &mut ActuatorBank<H>,
        store: &mut ResilientStore<S>,
        delay: &mut impl DelayNs,
        sink: &mut impl EventSink,
    ) -> Result<(), StoreError> {
        let rows = fetch_rows(Pass::LiveMatch, date, store, sink, |s, d, k| {
            s.fetch_waiting(d, k)
        })?;

        let current = now.time();
        for row in &rows {
            if !same_minute(row.time, current) || self.tracker.is_triggered(row.id) {
                continue;
            }
            let Some(slot) = validate_slot(row, sink) else {
                continue;
            };
            if !self.tracker.may_fire(row.id, slot) {
                debug!("Engine: reminder {} due but slot {} is open", row.id, slot);
                continue;
            }

            info!("Engine: reminder {} due at {}, opening slot {}", row.id, row.time, slot);
            bank.open(slot, delay);
            self.tracker.record_fire(row.id, slot);
            self.slots_opened += 1;
            self.live_fires += 1;
            sink.emit(&AppEvent::SlotOpened {
                slot,
                reminder: row.id,
                pass: Pass::LiveMatch,
            });
        }
        Ok(())
    }

    // ── Completion write-back ─────────────────────────────────

    /// Mark `completed` every reminder we opened whose compartment is closed.
    /// Failed writes stay queued for the next tick.
    pub fn write_back_completions<S: StorePort>(
        &mut self,
        store: &mut ResilientStore<S>,
        sink: &mut impl EventSink,
    ) -> Result<(), StoreError> {
        for id in self.tracker.completions_ready() {
            match store.mark_completed(id, sink) {
                Ok(true) => {
                    sink.emit(&AppEvent::MarkedCompleted(id));
                    self.tracker.settle(id);
                }
                Ok(false) => {
                    sink.emit(&AppEvent::AlreadyCompleted(id));
                    self.tracker.settle(id);
                }
                Err(StoreError::QueryFailed) => {
                    sink.emit(&AppEvent::WriteFailed {
                        reminder: id,
                        write: StoreWrite::MarkCompleted,
                    });
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    // ── Override hooks ────────────────────────────────────────

    /// A slot was closed outside the engine (manual force-close).
    pub fn note_slot_closed(&mut self, slot: SlotIndex) {
        self.tracker.mark_slot_closed(slot);
    }

    /// Forget every dispense this engine has recorded.
    pub fn reset(&mut self) {
        self.tracker.reset();
    }

    pub fn tracker(&self) -> &DedupTracker {
        &self.tracker
    }

    pub fn slots_opened(&self) -> u32 {
        self.slots_opened
    }

    pub fn live_fires(&self) -> u32 {
        self.live_fires
    }

    pub fn batches_abandoned(&self) -> u32 {
        self.batches_abandoned
    }

    fn abandon(&mut self, context: ReconnectContext, sink: &mut impl EventSink) {
        warn!("Engine: batch abandoned ({:?}), retrying next tick", context);
        self.batches_abandoned += 1;
        sink.emit(&AppEvent::BatchAbandoned { context });
    }
}

/// Run a fetch, folding `QueryFailed` into an empty result.
fn fetch_rows<S: StorePort, K: EventSink>(
    pass: Pass,
    date: NaiveDate,
    store: &mut ResilientStore<S>,
    sink: &mut K,
    fetch: impl FnOnce(&mut ResilientStore<S>, NaiveDate, &mut K) -> Result<Vec<ReminderRow>, StoreError>,
) -> Result<Vec<ReminderRow>, StoreError> {
    match fetch(store, date, sink) {
        Ok(rows) => {
            sink.emit(&AppEvent::Fetched {
                pass,
                date,
                count: rows.len(),
            });
            Ok(rows)
        }
        Err(StoreError::QueryFailed) => {
            sink.emit(&AppEvent::FetchFailed { pass });
            Ok(Vec::new())
        }
        Err(e) => Err(e),
    }
}

fn validate_slot(row: &ReminderRow, sink: &mut impl EventSink) -> Option<SlotIndex> {
    match SlotIndex::new(row.medication_slot) {
        Ok(slot) => Some(slot),
        Err(e) => {
            warn!("Engine: reminder {}: {}", row.id, e);
            sink.emit(&AppEvent::InvalidSlot {
                reminder: row.id,
                raw_slot: row.medication_slot,
            });
            None
        }
    }
}
