//! Sequenced servo sweeps for the medication compartments.
//!
//! Each slot maps 1:1 to a servo channel and has a fixed sweep convention
//! set by how the servo is mounted:
//!
//! | Slots | Convention | Open sweep | Close sweep |
//! |-------|------------|------------|-------------|
//! | 1–4   | Normal     | 180° → 0°  | 0° → 180°   |
//! | 5–7   | Reversed   | 0° → 180°  | 180° → 0°   |
//!
//! Sweeps advance one degree at a time with a fixed 15 ms per step.  The
//! servos share one supply, so the step rate bounds current draw and sweeps
//! are never run concurrently.  Every sweep blocks the control thread.

use embedded_hal::delay::DelayNs;
use log::{debug, info};

use super::ports::ServoPort;
use super::reminder::{SLOT_COUNT, SlotIndex};

/// Per-degree step delay.  A property of the mechanism, not a tunable.
pub const SWEEP_STEP_MS: u32 = 15;

/// Full travel of every compartment servo.
pub const TRAVEL_DEG: u8 = 180;

/// Direction convention of a mounted servo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sweep {
    /// Opens by decreasing angle.
    Normal,
    /// Opens by increasing angle.
    Reversed,
}

impl Sweep {
    /// `(from, to)` angles of the opening sweep.
    pub fn open_endpoints(self) -> (u8, u8) {
        match self {
            Self::Normal => (TRAVEL_DEG, 0),
            Self::Reversed => (0, TRAVEL_DEG),
        }
    }

    /// `(from, to)` angles of the closing sweep.
    pub fn close_endpoints(self) -> (u8, u8) {
        let (from, to) = self.open_endpoints();
        (to, from)
    }
}

/// Board wiring: slot N uses `SLOT_SWEEPS[N - 1]`.
pub const SLOT_SWEEPS: [Sweep; SLOT_COUNT] = [
    Sweep::Normal,
    Sweep::Normal,
    Sweep::Normal,
    Sweep::Normal,
    Sweep::Reversed,
    Sweep::Reversed,
    Sweep::Reversed,
];

/// Every intermediate position from `from` to `to`, both inclusive.
pub fn sweep_path(from: u8, to: u8) -> impl Iterator<Item = u8> {
    let rising = from <= to;
    (0..=from.abs_diff(to)).map(move |step| if rising { from + step } else { from - step })
}

/// One physical compartment mechanism.
#[derive(Debug, Clone, Copy)]
pub struct ActuatorSlot {
    pub index: SlotIndex,
    /// Zero-based servo channel.
    pub channel: usize,
    pub sweep: Sweep,
    is_open: bool,
}

impl ActuatorSlot {
    pub fn is_open(&self) -> bool {
        self.is_open
    }
}

/// The fixed set of compartment actuators.
///
/// `is_open` is the controller's authoritative belief about physical state.
/// The bank does not guard against opening an open slot; callers check
/// [`is_open`](Self::is_open) (or the dedup tracker) first.
pub struct ActuatorBank<H: ServoPort> {
    servos: H,
    slots: [ActuatorSlot; SLOT_COUNT],
    sweeps: u32,
}

impl<H: ServoPort> ActuatorBank<H> {
    /// All slots start closed.  After a restart that is an assumption, not a
    /// measurement; there is no position feedback.
    pub fn new(servos: H) -> Self {
        let slots = core::array::from_fn(|i| ActuatorSlot {
            index: SlotIndex(i as u8 + 1),
            channel: i,
            sweep: SLOT_SWEEPS[i],
            is_open: false,
        });
        Self {
            servos,
            slots,
            sweeps: 0,
        }
    }

    /// Sweep `slot` open.  Blocks for `TRAVEL_DEG + 1` steps.
    pub fn open(&mut self, slot: SlotIndex, delay: &mut impl DelayNs) {
        let (from, to) = self.slots[slot.position()].sweep.open_endpoints();
        info!("Bank: opening slot {}", slot);
        self.run_sweep(slot, from, to, delay);
        self.slots[slot.position()].is_open = true;
    }

    /// Sweep `slot` back to rest.
    pub fn close(&mut self, slot: SlotIndex, delay: &mut impl DelayNs) {
        let (from, to) = self.slots[slot.position()].sweep.close_endpoints();
        info!("Bank: closing slot {}", slot);
        self.run_sweep(slot, from, to, delay);
        self.slots[slot.position()].is_open = false;
    }

    /// Close every open slot in ascending order; closed slots are skipped.
    /// Returns the slots that were closed.
    pub fn close_all(&mut self, delay: &mut impl DelayNs) -> heapless::Vec<SlotIndex, SLOT_COUNT> {
        let mut closed = heapless::Vec::new();
        for slot in SlotIndex::all() {
            if self.is_open(slot) {
                self.close(slot, delay);
                // Capacity equals the slot count.
                let _ = closed.push(slot);
            }
        }
        closed
    }

    pub fn is_open(&self, slot: SlotIndex) -> bool {
        self.slots[slot.position()].is_open
    }

    pub fn open_slots(&self) -> impl Iterator<Item = SlotIndex> + '_ {
        self.slots.iter().filter(|s| s.is_open).map(|s| s.index)
    }

    pub fn slot(&self, slot: SlotIndex) -> &ActuatorSlot {
        &self.slots[slot.position()]
    }

    /// Total sweeps (open or close) run since start.
    pub fn sweep_count(&self) -> u32 {
        self.sweeps
    }

    /// Forget every open flag without moving anything.
    pub fn reset(&mut self) {
        for slot in &mut self.slots {
            slot.is_open = false;
        }
    }

    pub fn servos(&self) -> &H {
        &self.servos
    }

    fn run_sweep(&mut self, slot: SlotIndex, from: u8, to: u8, delay: &mut impl DelayNs) {
        let channel = self.slots[slot.position()].channel;
        for angle in sweep_path(from, to) {
            self.servos.write_angle(channel, angle);
            delay.delay_ms(SWEEP_STEP_MS);
        }
        self.sweeps += 1;
        debug!("Bank: slot {} swept {}° → {}°", slot, from, to);
    }
}
