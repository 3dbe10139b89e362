//! In-memory record of what this controller has dispensed.
//!
//! Nothing here is persisted.  A reset (button or process restart) clears it
//! all, and the physical compartments are assumed closed; the daily batch
//! pass then recovers anything the store still records as open.

use std::collections::{BTreeMap, BTreeSet};

use super::reminder::{ReminderId, SLOT_COUNT, SlotIndex};

#[derive(Debug, Default)]
pub struct DedupTracker {
    /// Reminders that already opened a compartment since the last reset.
    triggered: BTreeSet<ReminderId>,
    /// Fast-path mirror of `ActuatorSlot::is_open`.
    slot_open: [bool; SLOT_COUNT],
    /// Reminders whose compartment was opened by us and whose `completed`
    /// write has not landed yet.
    pending_completion: BTreeMap<ReminderId, SlotIndex>,
}

impl DedupTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_triggered(&self, id: ReminderId) -> bool {
        self.triggered.contains(&id)
    }

    pub fn is_slot_open(&self, slot: SlotIndex) -> bool {
        self.slot_open[slot.position()]
    }

    /// Live-match firing gate.
    pub fn may_fire(&self, id: ReminderId, slot: SlotIndex) -> bool {
        !self.is_slot_open(slot) && !self.is_triggered(id)
    }

    /// Record a live-match fire: slot open, ID triggered, completion owed.
    pub fn record_fire(&mut self, id: ReminderId, slot: SlotIndex) {
        self.slot_open[slot.position()] = true;
        self.triggered.insert(id);
        self.pending_completion.insert(id, slot);
    }

    /// Record a batch open.  Completion is only owed once `box_status =
    /// closed` has been written, see [`Self::owe_completion`].
    pub fn record_batch_open(&mut self, id: ReminderId, slot: SlotIndex) {
        self.slot_open[slot.position()] = true;
        self.triggered.insert(id);
    }

    pub fn owe_completion(&mut self, id: ReminderId, slot: SlotIndex) {
        self.pending_completion.insert(id, slot);
    }

    pub fn mark_slot_closed(&mut self, slot: SlotIndex) {
        self.slot_open[slot.position()] = false;
    }

    /// Pending completions whose compartment is no longer open, in ID order.
    pub fn completions_ready(&self) -> Vec<ReminderId> {
        self.pending_completion
            .iter()
            .filter(|(_, slot)| !self.is_slot_open(**slot))
            .map(|(id, _)| *id)
            .collect()
    }

    /// Drop a reminder from the completion queue once the store agrees.
    pub fn settle(&mut self, id: ReminderId) {
        self.pending_completion.remove(&id);
    }

    pub fn pending_count(&self) -> usize {
        self.pending_completion.len()
    }

    pub fn triggered_count(&self) -> usize {
        self.triggered.len()
    }

    /// Forget everything.  Invoked by the reset override.
    pub fn reset(&mut self) {
        self.triggered.clear();
        self.slot_open = [false; SLOT_COUNT];
        self.pending_completion.clear();
    }
}
