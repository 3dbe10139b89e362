//! Front-panel override tests: force-close write-back, reset teardown and
//! the button panel driven through real `embedded-hal` input pins.

use std::cell::Cell;
use std::convert::Infallible;
use std::rc::Rc;

use embedded_hal::digital::{ErrorType, InputPin};
use pillbox::app::commands::OverrideCommand;
use pillbox::app::events::{AppEvent, StoreWrite};
use pillbox::app::manual::ManualOverride;
use pillbox::app::reminder::{ReminderStatus, SlotIndex};
use pillbox::app::service::TickOutcome;
use pillbox::drivers::button::ActiveLowButton;

use crate::mock_hw::{
    FixedClock, RecordingSink, ScriptedOverrides, TestService, VirtualDelay, service_with, waiting,
};

fn idle_tick(svc: &mut TestService, clock: &FixedClock, sink: &mut RecordingSink) -> TickOutcome {
    svc.tick(
        &mut ScriptedOverrides::idle(),
        clock,
        &mut VirtualDelay::default(),
        sink,
    )
}

fn press(
    svc: &mut TestService,
    cmd: OverrideCommand,
    clock: &FixedClock,
    sink: &mut RecordingSink,
) -> TickOutcome {
    svc.tick(
        &mut ScriptedOverrides::once(cmd),
        clock,
        &mut VirtualDelay::default(),
        sink,
    )
}

fn slot(n: i32) -> SlotIndex {
    SlotIndex::new(n).unwrap()
}

// ── Force-close ───────────────────────────────────────────────

#[test]
fn force_close_marks_fired_reminders_completed() {
    let mut svc = service_with(vec![waiting(1, 8, 0, 1), waiting(2, 8, 0, 6)]);
    let clock = FixedClock::at(8, 0, 0);
    let mut sink = RecordingSink::default();
    idle_tick(&mut svc, &clock, &mut sink);
    assert_eq!(svc.bank().open_slots().count(), 2);
    assert!(svc.store().writes().is_empty(), "nothing completes while open");

    clock.set(8, 3, 0);
    let outcome = press(&mut svc, OverrideCommand::ForceCloseAll, &clock, &mut sink);
    assert_eq!(outcome, TickOutcome::Completed);
    assert!(sink.contains(&AppEvent::ManualCloseAll { closed: 2 }));
    assert!(sink.contains(&AppEvent::MarkedCompleted(1)));
    assert!(sink.contains(&AppEvent::MarkedCompleted(2)));
    assert_eq!(svc.bank().open_slots().count(), 0);
    assert_eq!(svc.stats().pending_completions, 0);
}

#[test]
fn force_close_with_nothing_open_moves_no_servo() {
    let mut svc = service_with(vec![]);
    let clock = FixedClock::at(8, 0, 0);
    let mut sink = RecordingSink::default();

    press(&mut svc, OverrideCommand::ForceCloseAll, &clock, &mut sink);
    assert!(sink.contains(&AppEvent::ManualCloseAll { closed: 0 }));
    assert!(svc.bank().servos().writes.is_empty());
}

#[test]
fn held_force_close_is_harmless() {
    let mut svc = service_with(vec![waiting(1, 8, 0, 2)]);
    let clock = FixedClock::at(8, 0, 0);
    let mut sink = RecordingSink::default();
    idle_tick(&mut svc, &clock, &mut sink);

    press(&mut svc, OverrideCommand::ForceCloseAll, &clock, &mut sink);
    let sweeps = svc.bank().servos().writes.len();
    for _ in 0..5 {
        press(&mut svc, OverrideCommand::ForceCloseAll, &clock, &mut sink);
    }
    assert_eq!(svc.bank().servos().writes.len(), sweeps);
    assert_eq!(
        sink.count(|e| matches!(e, AppEvent::SlotClosed { .. })),
        1
    );
    assert_eq!(sink.count(|e| matches!(e, AppEvent::MarkedCompleted(_))), 1);
}

#[test]
fn completion_is_skipped_when_store_already_completed() {
    let mut svc = service_with(vec![waiting(4, 8, 0, 3)]);
    let clock = FixedClock::at(8, 0, 0);
    let mut sink = RecordingSink::default();
    idle_tick(&mut svc, &clock, &mut sink);

    // Someone completed the dose from another client meanwhile.
    svc.store_mut().reminder_mut(4).unwrap().status = ReminderStatus::Completed;

    press(&mut svc, OverrideCommand::ForceCloseAll, &clock, &mut sink);
    assert!(sink.contains(&AppEvent::AlreadyCompleted(4)));
    assert!(!sink.contains(&AppEvent::MarkedCompleted(4)));
    assert!(
        !svc.store()
            .writes()
            .contains(&(StoreWrite::MarkCompleted, 4))
    );
    assert_eq!(svc.stats().pending_completions, 0);
}

#[test]
fn force_close_during_outage_completes_once_store_returns() {
    let mut svc = service_with(vec![waiting(1, 8, 0, 1)]);
    let clock = FixedClock::at(8, 0, 0);
    let mut sink = RecordingSink::default();
    idle_tick(&mut svc, &clock, &mut sink);

    svc.store_mut().sever();
    svc.store_mut().refuse_connects(1);
    let outcome = press(&mut svc, OverrideCommand::ForceCloseAll, &clock, &mut sink);
    assert_eq!(outcome, TickOutcome::StoreUnavailable);
    assert!(!svc.bank().is_open(slot(1)), "the close itself needs no store");
    assert_eq!(
        svc.store().reminder(1).unwrap().status,
        ReminderStatus::Waiting
    );

    assert_eq!(idle_tick(&mut svc, &clock, &mut sink), TickOutcome::Completed);
    assert_eq!(
        svc.store().reminder(1).unwrap().status,
        ReminderStatus::Completed
    );
}

// ── Reset ─────────────────────────────────────────────────────

#[test]
fn reset_closes_everything_and_clears_state() {
    let mut svc = service_with(vec![waiting(1, 8, 0, 1), waiting(2, 8, 0, 7)]);
    let clock = FixedClock::at(8, 0, 0);
    let mut sink = RecordingSink::default();
    idle_tick(&mut svc, &clock, &mut sink);
    assert_eq!(svc.engine().tracker().triggered_count(), 2);

    let outcome = press(&mut svc, OverrideCommand::ResetSystem, &clock, &mut sink);
    assert_eq!(outcome, TickOutcome::RestartRequested);
    assert!(sink.contains(&AppEvent::ResetRequested));
    assert!(sink.contains(&AppEvent::SlotClosed { slot: slot(1) }));
    assert!(sink.contains(&AppEvent::SlotClosed { slot: slot(7) }));

    assert_eq!(svc.bank().open_slots().count(), 0);
    assert_eq!(svc.engine().tracker().triggered_count(), 0);
    assert_eq!(svc.engine().tracker().pending_count(), 0);
    // Reset does no store work; the rows are left for the restarted process.
    assert!(svc.store().writes().is_empty());
}

#[test]
fn reset_preempts_reconciliation() {
    let mut svc = service_with(vec![waiting(1, 8, 0, 1)]);
    let clock = FixedClock::at(8, 0, 0);
    let mut sink = RecordingSink::default();

    press(&mut svc, OverrideCommand::ResetSystem, &clock, &mut sink);
    assert!(sink.opened().is_empty());
    assert!(!sink.contains(&AppEvent::LatestDate(crate::mock_hw::day())));
}

// ── Panel wiring ──────────────────────────────────────────────

/// Input level shared between the test and the button driver.
#[derive(Clone)]
struct SharedLevel(Rc<Cell<bool>>);

impl SharedLevel {
    fn released() -> Self {
        Self(Rc::new(Cell::new(true)))
    }

    fn set_pressed(&self, pressed: bool) {
        self.0.set(!pressed);
    }
}

impl ErrorType for SharedLevel {
    type Error = Infallible;
}

impl InputPin for SharedLevel {
    fn is_high(&mut self) -> Result<bool, Infallible> {
        Ok(self.0.get())
    }

    fn is_low(&mut self) -> Result<bool, Infallible> {
        Ok(!self.0.get())
    }
}

#[test]
fn panel_buttons_drive_the_service() {
    let force = SharedLevel::released();
    let reset = SharedLevel::released();
    let mut panel = ManualOverride::new(
        ActiveLowButton::new(force.clone(), 27),
        ActiveLowButton::new(reset.clone(), 25),
    );

    let mut svc = service_with(vec![waiting(1, 8, 0, 5)]);
    let clock = FixedClock::at(8, 0, 0);
    let mut sink = RecordingSink::default();
    let mut delay = VirtualDelay::default();

    assert_eq!(
        svc.tick(&mut panel, &clock, &mut delay, &mut sink),
        TickOutcome::Completed
    );
    assert!(svc.bank().is_open(slot(5)));

    force.set_pressed(true);
    svc.tick(&mut panel, &clock, &mut delay, &mut sink);
    assert!(!svc.bank().is_open(slot(5)));
    assert!(sink.contains(&AppEvent::MarkedCompleted(1)));

    force.set_pressed(false);
    reset.set_pressed(true);
    assert_eq!(
        svc.tick(&mut panel, &clock, &mut delay, &mut sink),
        TickOutcome::RestartRequested
    );
}
