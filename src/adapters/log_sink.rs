//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the ESP-IDF logger (UART in production).  Each line carries a fixed
//! prefix so the serial stream can be grepped by concern.

use log::{debug, info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`] to the serial console.
pub struct LogEventSink;

impl Default for LogEventSink {
    fn default() -> Self {
        Self::new()
    }
}

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Started { slots } => info!("START | slots={}", slots),
            AppEvent::LatestDate(date) => debug!("FETCH | latest_date={}", date),
            AppEvent::NoSchedule => debug!("FETCH | no reminders in store"),
            AppEvent::Fetched { pass, date, count } => {
                // Empty fetches happen every tick; keep them out of the info log.
                if *count == 0 {
                    debug!("FETCH | {:?} {} rows=0", pass, date);
                } else {
                    info!("FETCH | {:?} {} rows={}", pass, date, count);
                }
            }
            AppEvent::FetchFailed { pass } => warn!("FETCH | {:?} query failed", pass),
            AppEvent::ClockUnavailable => warn!("FETCH | clock not synced, live match skipped"),
            AppEvent::InvalidSlot { reminder, raw_slot } => {
                warn!("SLOT  | reminder {} invalid slot {}", reminder, raw_slot);
            }
            AppEvent::SlotOpened {
                slot,
                reminder,
                pass,
            } => info!("SLOT  | open slot={} reminder={} pass={:?}", slot, reminder, pass),
            AppEvent::SlotClosed { slot } => info!("SLOT  | closed slot={}", slot),
            AppEvent::DwellStarted { secs, slots } => {
                info!("SLOT  | holding {} slot(s) open for {} s", slots, secs);
            }
            AppEvent::BatchAbandoned { context } => {
                warn!("SLOT  | batch abandoned ({:?}), retry next tick", context);
            }
            AppEvent::Reconnecting(ctx) => warn!("STORE | reconnecting ({:?})", ctx),
            AppEvent::Reconnected(ctx) => info!("STORE | reconnected ({:?})", ctx),
            AppEvent::ReconnectFailed(ctx) => warn!("STORE | reconnect failed ({:?})", ctx),
            AppEvent::MarkedClosed(id) => info!("WRITE | reminder {} box_status=closed", id),
            AppEvent::MarkedCompleted(id) => info!("WRITE | reminder {} status=completed", id),
            AppEvent::AlreadyCompleted(id) => debug!("WRITE | reminder {} already completed", id),
            AppEvent::WriteFailed { reminder, write } => {
                warn!("WRITE | {:?} failed for reminder {}, will retry", write, reminder);
            }
            AppEvent::ManualCloseAll { closed } => {
                info!("OVERRIDE | force-close, {} slot(s) closed", closed);
            }
            AppEvent::ResetRequested => warn!("OVERRIDE | reset requested, restarting"),
            AppEvent::Stats(s) => info!(
                "STATS | ticks={} opened={} live={} reconnects={} failed={} abandoned={} pending={}",
                s.ticks,
                s.slots_opened,
                s.live_fires,
                s.reconnect_attempts,
                s.reconnect_failures,
                s.batches_abandoned,
                s.pending_completions,
            ),
        }
    }
}
