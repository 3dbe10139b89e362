//! Integration tests for the DispenserService → engine → bank → store
//! pipeline, driven tick by tick with a virtual clock and delay.

use pillbox::app::events::{AppEvent, Pass, ReconnectContext, StoreWrite};
use pillbox::app::reminder::{BoxStatus, ReminderStatus, SlotIndex};
use pillbox::app::service::TickOutcome;

use crate::mock_hw::{
    FixedClock, RecordingSink, ScriptedOverrides, TestService, VirtualDelay, recorded_open,
    service_with, waiting,
};

fn tick(svc: &mut TestService, clock: &FixedClock, sink: &mut RecordingSink) -> TickOutcome {
    svc.tick(
        &mut ScriptedOverrides::idle(),
        clock,
        &mut VirtualDelay::default(),
        sink,
    )
}

fn slot(n: i32) -> SlotIndex {
    SlotIndex::new(n).unwrap()
}

// ── Live match ────────────────────────────────────────────────

#[test]
fn two_reminders_same_minute_open_together_and_never_refire() {
    let mut svc = service_with(vec![waiting(1, 8, 0, 1), waiting(2, 8, 0, 2)]);
    let clock = FixedClock::at(8, 0, 30);
    let mut sink = RecordingSink::default();

    assert_eq!(tick(&mut svc, &clock, &mut sink), TickOutcome::Completed);
    assert_eq!(
        sink.opened(),
        vec![(1, 1, Pass::LiveMatch), (2, 2, Pass::LiveMatch)]
    );
    assert!(svc.bank().is_open(slot(1)));
    assert!(svc.bank().is_open(slot(2)));

    let writes_after_first_tick = svc.bank().servos().writes.len();
    for (m, s) in [(0, 45), (0, 59), (1, 0), (1, 30)] {
        clock.set(8, m, s);
        tick(&mut svc, &clock, &mut sink);
    }
    assert_eq!(sink.opened().len(), 2, "no reminder may fire twice");
    assert_eq!(svc.bank().servos().writes.len(), writes_after_first_tick);
    assert_eq!(svc.stats().live_fires, 2);
}

#[test]
fn fires_only_inside_the_due_minute() {
    let mut svc = service_with(vec![waiting(1, 8, 0, 3)]);
    let clock = FixedClock::at(7, 59, 59);
    let mut sink = RecordingSink::default();

    tick(&mut svc, &clock, &mut sink);
    assert!(sink.opened().is_empty());

    clock.set(8, 0, 0);
    tick(&mut svc, &clock, &mut sink);
    assert_eq!(sink.opened(), vec![(3, 1, Pass::LiveMatch)]);
}

#[test]
fn invalid_slot_is_skipped_and_later_reminders_still_fire() {
    let mut svc = service_with(vec![waiting(1, 8, 0, 99), waiting(2, 8, 0, 3)]);
    let clock = FixedClock::at(8, 0, 10);
    let mut sink = RecordingSink::default();

    assert_eq!(tick(&mut svc, &clock, &mut sink), TickOutcome::Completed);
    assert!(sink.contains(&AppEvent::InvalidSlot {
        reminder: 1,
        raw_slot: 99
    }));
    assert_eq!(sink.opened(), vec![(3, 2, Pass::LiveMatch)]);
}

#[test]
fn shared_slot_fires_second_reminder_only_after_close() {
    let mut svc = service_with(vec![waiting(1, 8, 0, 1), waiting(2, 8, 0, 1)]);
    let clock = FixedClock::at(8, 0, 5);
    let mut sink = RecordingSink::default();

    tick(&mut svc, &clock, &mut sink);
    clock.set(8, 0, 20);
    tick(&mut svc, &clock, &mut sink);
    assert_eq!(sink.opened(), vec![(1, 1, Pass::LiveMatch)]);

    // Force-close frees the slot; the same tick's live match picks up id 2.
    clock.set(8, 0, 40);
    svc.tick(
        &mut ScriptedOverrides::once(pillbox::app::commands::OverrideCommand::ForceCloseAll),
        &clock,
        &mut VirtualDelay::default(),
        &mut sink,
    );
    assert_eq!(
        sink.opened(),
        vec![(1, 1, Pass::LiveMatch), (1, 2, Pass::LiveMatch)]
    );
    assert_eq!(
        svc.store().reminder(1).unwrap().status,
        ReminderStatus::Completed
    );
}

#[test]
fn unsynced_clock_skips_live_match() {
    let mut svc = service_with(vec![waiting(1, 8, 0, 1)]);
    let clock = FixedClock::unsynced();
    let mut sink = RecordingSink::default();

    assert_eq!(tick(&mut svc, &clock, &mut sink), TickOutcome::Completed);
    assert!(sink.contains(&AppEvent::ClockUnavailable));
    assert!(sink.opened().is_empty());
}

// ── Daily batch / restart recovery ────────────────────────────

#[test]
fn restart_recovers_compartments_recorded_open() {
    // A fresh service has an empty tracker, as after a restart.
    let mut svc = service_with(vec![recorded_open(5, 7, 0, 4), waiting(6, 21, 0, 5)]);
    let clock = FixedClock::at(12, 0, 0);
    let mut sink = RecordingSink::default();
    let mut delay = VirtualDelay::default();

    let outcome = svc.tick(&mut ScriptedOverrides::idle(), &clock, &mut delay, &mut sink);
    assert_eq!(outcome, TickOutcome::Completed);

    assert_eq!(sink.opened(), vec![(4, 5, Pass::DailyBatch)]);
    assert!(sink.contains(&AppEvent::SlotClosed { slot: slot(4) }));
    assert!(!svc.bank().is_open(slot(4)));
    assert!(delay.elapsed_ms >= 60_000, "compartment held for the dwell window");

    let row = svc.store().reminder(5).unwrap();
    assert_eq!(row.box_status, BoxStatus::Closed);
    assert_eq!(row.status, ReminderStatus::Completed);
    assert_eq!(
        svc.store().writes(),
        &[(StoreWrite::MarkClosed, 5), (StoreWrite::MarkCompleted, 5)],
        "completed is written only after closed"
    );

    // Unrelated reminder untouched.
    assert_eq!(svc.store().reminder(6).unwrap().status, ReminderStatus::Waiting);
}

#[test]
fn batch_does_not_reopen_after_write_back() {
    let mut svc = service_with(vec![recorded_open(5, 7, 0, 4)]);
    let clock = FixedClock::at(12, 0, 0);
    let mut sink = RecordingSink::default();

    tick(&mut svc, &clock, &mut sink);
    tick(&mut svc, &clock, &mut sink);
    tick(&mut svc, &clock, &mut sink);
    assert_eq!(sink.opened().len(), 1);
}

// ── Store resilience ──────────────────────────────────────────

#[test]
fn reconnects_mid_dwell_and_finishes_the_batch() {
    let mut svc = service_with(vec![recorded_open(5, 7, 0, 4)]);
    let clock = FixedClock::at(12, 0, 0);
    let mut sink = RecordingSink::default();
    svc.store_mut().drop_connection_after(10);

    assert_eq!(tick(&mut svc, &clock, &mut sink), TickOutcome::Completed);
    assert!(sink.contains(&AppEvent::Reconnecting(ReconnectContext::Dwell)));
    assert!(sink.contains(&AppEvent::Reconnected(ReconnectContext::Dwell)));
    assert!(sink.contains(&AppEvent::MarkedClosed(5)));
    assert_eq!(svc.store().connect_count(), 1);
}

#[test]
fn persistent_outage_never_writes_and_recovers_later() {
    let mut svc = service_with(vec![recorded_open(5, 7, 0, 4)]);
    let clock = FixedClock::at(12, 0, 0);
    let mut sink = RecordingSink::default();
    svc.store_mut().drop_connection_after(10);
    svc.store_mut().refuse_connects(u32::MAX);

    assert_eq!(tick(&mut svc, &clock, &mut sink), TickOutcome::StoreUnavailable);
    assert!(sink.contains(&AppEvent::BatchAbandoned {
        context: ReconnectContext::Dwell
    }));
    assert!(svc.bank().is_open(slot(4)), "abandoned batch leaves the slot open");

    for _ in 0..3 {
        assert_eq!(tick(&mut svc, &clock, &mut sink), TickOutcome::StoreUnavailable);
    }
    assert!(svc.store().writes().is_empty());
    assert_eq!(svc.store().reminder(5).unwrap().box_status, BoxStatus::Open);
    assert_eq!(svc.stats().reconnect_failures, 4);
    assert_eq!(svc.stats().batches_abandoned, 1);

    // Link comes back: the still-open slot is held, closed and written back
    // without a second opening sweep.
    svc.store_mut().refuse_connects(0);
    assert_eq!(tick(&mut svc, &clock, &mut sink), TickOutcome::Completed);
    assert_eq!(sink.opened().len(), 1);
    assert!(!svc.bank().is_open(slot(4)));
    assert_eq!(
        svc.store().reminder(5).unwrap().status,
        ReminderStatus::Completed
    );
}

#[test]
fn failed_completion_write_is_retried_by_the_next_write_back() {
    let mut svc = service_with(vec![waiting(3, 8, 0, 2)]);
    let clock = FixedClock::at(8, 0, 0);
    let mut sink = RecordingSink::default();
    tick(&mut svc, &clock, &mut sink);

    // The force-close write-back is the next query; make it fail once.
    svc.store_mut().fail_queries(1);
    clock.set(8, 0, 30);
    svc.tick(
        &mut ScriptedOverrides::once(pillbox::app::commands::OverrideCommand::ForceCloseAll),
        &clock,
        &mut VirtualDelay::default(),
        &mut sink,
    );
    assert!(sink.contains(&AppEvent::WriteFailed {
        reminder: 3,
        write: StoreWrite::MarkCompleted
    }));
    assert_eq!(svc.stats().pending_completions, 0, "the tick after the override retries the write");
    assert!(sink.contains(&AppEvent::MarkedCompleted(3)));
}

#[test]
fn link_lost_during_dwell_is_reconnected_before_write_back() {
    let mut svc = service_with(vec![recorded_open(5, 7, 0, 4)]);
    let clock = FixedClock::at(12, 0, 0);
    let mut sink = RecordingSink::default();
    let mut delay = VirtualDelay::default();
    // Liveness polls keep passing; the drop only shows on the first write.
    svc.store_mut().drop_link_on_write(0);

    let outcome = svc.tick(&mut ScriptedOverrides::idle(), &clock, &mut delay, &mut sink);
    assert_eq!(outcome, TickOutcome::Completed);
    assert!(sink.contains(&AppEvent::Reconnecting(ReconnectContext::WriteBack)));
    assert!(sink.contains(&AppEvent::Reconnected(ReconnectContext::WriteBack)));
    assert!(sink.contains(&AppEvent::MarkedClosed(5)));
    assert_eq!(sink.count(|e| matches!(e, AppEvent::BatchAbandoned { .. })), 0);
    assert_eq!(svc.store().connect_count(), 1);
    assert_eq!(
        svc.store().reminder(5).unwrap().status,
        ReminderStatus::Completed
    );

    svc.tick(&mut ScriptedOverrides::idle(), &clock, &mut delay, &mut sink);
    assert_eq!(sink.opened().len(), 1, "compartment opened once");
    assert!(delay.elapsed_ms < 120_000, "held for a single dwell window");
}

#[test]
fn partial_write_back_retries_only_the_unwritten_reminder() {
    let mut svc = service_with(vec![recorded_open(5, 7, 0, 4), recorded_open(6, 7, 30, 6)]);
    let clock = FixedClock::at(12, 0, 0);
    let mut sink = RecordingSink::default();
    // First `closed` write lands; the second kills the link and the single
    // reconnect is refused.
    svc.store_mut().drop_link_on_write(1);
    svc.store_mut().refuse_connects(1);

    assert_eq!(tick(&mut svc, &clock, &mut sink), TickOutcome::StoreUnavailable);
    assert!(sink.contains(&AppEvent::BatchAbandoned {
        context: ReconnectContext::WriteBack
    }));
    assert!(sink.contains(&AppEvent::MarkedClosed(5)));
    assert!(!sink.contains(&AppEvent::MarkedClosed(6)));
    assert_eq!(svc.store().reminder(5).unwrap().box_status, BoxStatus::Closed);
    assert_eq!(svc.store().reminder(6).unwrap().box_status, BoxStatus::Open);
    assert_eq!(
        svc.store().reminder(5).unwrap().status,
        ReminderStatus::Waiting,
        "completion is owed, not yet written"
    );
    assert_eq!(svc.stats().pending_completions, 1);
    assert_eq!(svc.bank().open_slots().count(), 0);

    assert_eq!(tick(&mut svc, &clock, &mut sink), TickOutcome::Completed);
    assert_eq!(
        sink.opened(),
        vec![
            (4, 5, Pass::DailyBatch),
            (6, 6, Pass::DailyBatch),
            (6, 6, Pass::DailyBatch),
        ],
        "only the unwritten reminder is batched again"
    );
    assert_eq!(
        svc.store().writes(),
        &[
            (StoreWrite::MarkClosed, 5),
            (StoreWrite::MarkClosed, 6),
            (StoreWrite::MarkCompleted, 5),
            (StoreWrite::MarkCompleted, 6),
        ]
    );
    assert_eq!(svc.stats().pending_completions, 0);
}
