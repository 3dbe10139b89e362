//! Manual override controller for the two front-panel buttons.
//!
//! Sampled once per tick before the reconciliation engine runs.  Reset
//! wins when both buttons are held.  Both commands are level-triggered:
//! holding force-close keeps re-issuing it every tick, which is harmless
//! because closing an already-closed bank moves nothing.

use embedded_hal::digital::InputPin;

use crate::drivers::button::ActiveLowButton;

use super::commands::OverrideCommand;
use super::ports::OverridePort;

pub struct ManualOverride<F: InputPin, R: InputPin> {
    force_close: ActiveLowButton<F>,
    reset: ActiveLowButton<R>,
}

impl<F: InputPin, R: InputPin> ManualOverride<F, R> {
    pub fn new(force_close: ActiveLowButton<F>, reset: ActiveLowButton<R>) -> Self {
        Self { force_close, reset }
    }
}

impl<F: InputPin, R: InputPin> OverridePort for ManualOverride<F, R> {
    fn poll(&mut self) -> Option<OverrideCommand> {
        if self.reset.is_asserted() {
            Some(OverrideCommand::ResetSystem)
        } else if self.force_close.is_asserted() {
            Some(OverrideCommand::ForceCloseAll)
        } else {
            None
        }
    }
}
