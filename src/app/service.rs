//! Application service — the hexagonal core.
//!
//! [`DispenserService`] owns the reconciliation engine, the actuator bank
//! and the resilient store connection.  All I/O flows through port traits
//! injected at construction or at call sites, making the entire service
//! testable with mock adapters.
//!
//! ```text
//!  OverridePort ──▶ ┌──────────────────────────┐ ──▶ EventSink
//!  ClockPort ─────▶ │    DispenserService      │
//!  StorePort ◀────▶ │ Engine · Bank · Tracker  │ ──▶ ServoPort
//!                   └──────────────────────────┘
//! ```

use embedded_hal::delay::DelayNs;
use log::{info, warn};

use crate::config::DispenserConfig;
use crate::scheduler::DwellWindow;

use super::actuators::ActuatorBank;
use super::commands::OverrideCommand;
use super::connection::ResilientStore;
use super::engine::ReconciliationEngine;
use super::events::{AppEvent, ReconnectContext, ServiceStats};
use super::ports::{ClockPort, EventSink, OverridePort, ServoPort, StoreError, StorePort};
use super::reminder::SLOT_COUNT;

/// What the main loop should do after a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Tick ran to completion.
    Completed,
    /// The store could not be reached; remaining store work was skipped.
    StoreUnavailable,
    /// Reset was requested and handled; the process must restart now.
    RestartRequested,
}

// ───────────────────────────────────────────────────────────────
// DispenserService
// ───────────────────────────────────────────────────────────────

pub struct DispenserService<S: StorePort, H: ServoPort> {
    engine: ReconciliationEngine,
    bank: ActuatorBank<H>,
    store: ResilientStore<S>,
    ticks: u64,
}

impl<S: StorePort, H: ServoPort> DispenserService<S, H> {
    /// Construct the service.  Every compartment is assumed closed.
    pub fn new(config: &DispenserConfig, store: S, servos: H) -> Self {
        let dwell = DwellWindow::new(config.dwell_ms(), config.liveness_poll_ms);
        Self {
            engine: ReconciliationEngine::new(dwell),
            bank: ActuatorBank::new(servos),
            store: ResilientStore::new(store, config.store.clone()),
            ticks: 0,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Announce start-up and open the store connection.  A failure here is
    /// not fatal; every tick retries.
    pub fn start(&mut self, sink: &mut impl EventSink) -> Result<(), StoreError> {
        sink.emit(&AppEvent::Started { slots: SLOT_COUNT });
        info!("DispenserService started ({} slots)", SLOT_COUNT);
        let connected = self.store.ensure_connected(ReconnectContext::Startup, sink);
        if connected.is_err() {
            warn!("Store unavailable at start-up, retrying every tick");
        }
        connected
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// Run one control cycle: overrides → reconciliation → write-back.
    pub fn tick(
        &mut self,
        overrides: &mut impl OverridePort,
        clock: &impl ClockPort,
        delay: &mut impl DelayNs,
        sink: &mut impl EventSink,
    ) -> TickOutcome {
        self.ticks += 1;

        match overrides.poll() {
            Some(OverrideCommand::ResetSystem) => return self.reset(delay, sink),
            Some(OverrideCommand::ForceCloseAll) => {
                if self.force_close_all(delay, sink).is_err() {
                    return TickOutcome::StoreUnavailable;
                }
            }
            None => {}
        }

        let now = clock.now();
        match self
            .engine
            .run_tick(now, &mut self.bank, &mut self.store, delay, sink)
        {
            Ok(()) => TickOutcome::Completed,
            Err(StoreError::Unreachable) => TickOutcome::StoreUnavailable,
            Err(StoreError::QueryFailed) => {
                warn!("Tick ended on an unhandled query failure");
                TickOutcome::Completed
            }
        }
    }

    // ── Overrides ─────────────────────────────────────────────

    /// Close every open compartment, then settle the completions it unblocks.
    fn force_close_all(
        &mut self,
        delay: &mut impl DelayNs,
        sink: &mut impl EventSink,
    ) -> Result<(), StoreError> {
        let closed = self.close_all(delay, sink);
        info!("Force-close: {} slot(s) closed", closed);
        sink.emit(&AppEvent::ManualCloseAll { closed });
        self.engine.write_back_completions(&mut self.store, sink)
    }

    /// Close everything and forget all in-memory state.  The caller restarts
    /// the process; the daily batch pass recovers anything still recorded
    /// as open.
    fn reset(&mut self, delay: &mut impl DelayNs, sink: &mut impl EventSink) -> TickOutcome {
        sink.emit(&AppEvent::ResetRequested);
        let closed = self.close_all(delay, sink);
        warn!("Reset: {} slot(s) closed, clearing state", closed);
        self.engine.reset();
        self.bank.reset();
        TickOutcome::RestartRequested
    }

    fn close_all(&mut self, delay: &mut impl DelayNs, sink: &mut impl EventSink) -> usize {
        let closed = self.bank.close_all(delay);
        for slot in &closed {
            self.engine.note_slot_closed(*slot);
            sink.emit(&AppEvent::SlotClosed { slot: *slot });
        }
        closed.len()
    }

    // ── Queries ───────────────────────────────────────────────

    /// Running counters since start-up.
    pub fn stats(&self) -> ServiceStats {
        ServiceStats {
            ticks: self.ticks,
            slots_opened: self.engine.slots_opened(),
            live_fires: self.engine.live_fires(),
            reconnect_attempts: self.store.reconnect_attempts(),
            reconnect_failures: self.store.reconnect_failures(),
            batches_abandoned: self.engine.batches_abandoned(),
            pending_completions: self.engine.tracker().pending_count(),
        }
    }

    /// Total ticks executed since start-up.
    pub fn tick_count(&self) -> u64 {
        self.ticks
    }

    pub fn engine(&self) -> &ReconciliationEngine {
        &self.engine
    }

    pub fn bank(&self) -> &ActuatorBank<H> {
        &self.bank
    }

    pub fn store(&self) -> &S {
        self.store.inner()
    }

    /// Direct access to the store adapter, e.g. to script faults in tests.
    pub fn store_mut(&mut self) -> &mut S {
        self.store.inner_mut()
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDateTime;

    use super::*;
    use crate::adapters::memory_store::InMemoryStore;

    struct NullServos;

    impl ServoPort for NullServos {
        fn write_angle(&mut self, _: usize, _: u8) {}
    }

    struct NoDelay;

    impl DelayNs for NoDelay {
        fn delay_ns(&mut self, _: u32) {}
    }

    struct NoClock;

    impl ClockPort for NoClock {
        fn now(&self) -> Option<NaiveDateTime> {
            None
        }
    }

    struct Panel(Option<OverrideCommand>);

    impl OverridePort for Panel {
        fn poll(&mut self) -> Option<OverrideCommand> {
            self.0
        }
    }

    #[derive(Default)]
    struct Events(Vec<AppEvent>);

    impl EventSink for Events {
        fn emit(&mut self, event: &AppEvent) {
            self.0.push(event.clone());
        }
    }

    fn service() -> DispenserService<InMemoryStore, NullServos> {
        DispenserService::new(&DispenserConfig::default(), InMemoryStore::new(), NullServos)
    }

    #[test]
    fn start_announces_slot_count() {
        let mut svc = service();
        let mut events = Events::default();
        assert!(svc.start(&mut events).is_ok());
        assert_eq!(events.0[0], AppEvent::Started { slots: SLOT_COUNT });
    }

    #[test]
    fn reset_requests_restart() {
        let mut svc = service();
        let mut events = Events::default();
        let outcome = svc.tick(
            &mut Panel(Some(OverrideCommand::ResetSystem)),
            &NoClock,
            &mut NoDelay,
            &mut events,
        );
        assert_eq!(outcome, TickOutcome::RestartRequested);
        assert!(events.0.contains(&AppEvent::ResetRequested));
    }

    #[test]
    fn unreachable_store_is_reported() {
        let mut svc = service();
        svc.store_mut().sever();
        svc.store_mut().refuse_connects(1);
        let mut events = Events::default();
        let outcome = svc.tick(&mut Panel(None), &NoClock, &mut NoDelay, &mut events);
        assert_eq!(outcome, TickOutcome::StoreUnavailable);
        assert_eq!(svc.stats().reconnect_failures, 1);
        assert_eq!(svc.stats().ticks, 1);
    }
}
