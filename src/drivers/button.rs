//! Momentary push-button input.
//!
//! ## Hardware
//!
//! Active-low switch to ground with the internal pull-up enabled.  Both
//! front-panel buttons are debounced by an RC network on the board, so the
//! driver samples the level as-is.  The control loop polls once per tick;
//! a press shorter than one tick may be missed.

use embedded_hal::digital::InputPin;
use log::warn;

pub struct ActiveLowButton<P: InputPin> {
    pin: P,
    gpio: i32,
}

impl<P: InputPin> ActiveLowButton<P> {
    pub fn new(pin: P, gpio: i32) -> Self {
        Self { pin, gpio }
    }

    /// `true` while the button is held.  A read error counts as released.
    pub fn is_asserted(&mut self) -> bool {
        match self.pin.is_low() {
            Ok(low) => low,
            Err(e) => {
                warn!("Button GPIO{}: read failed: {:?}", self.gpio, e);
                false
            }
        }
    }

    /// GPIO pin this button is attached to.
    pub fn gpio(&self) -> i32 {
        self.gpio
    }
}
