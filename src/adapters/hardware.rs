//! Hardware adapter — bridges the servo drivers to [`ServoPort`].
//!
//! Owns one [`ServoDriver`] per compartment, indexed by servo channel.
//! On ESP-IDF `P` is an LEDC channel; the host tests use mock PWM pins.

use embedded_hal::pwm::SetDutyCycle;
use log::warn;

use crate::app::ports::ServoPort;
use crate::app::reminder::SLOT_COUNT;
use crate::drivers::servo::ServoDriver;

pub struct HardwareAdapter<P: SetDutyCycle> {
    servos: [ServoDriver<P>; SLOT_COUNT],
}

impl<P: SetDutyCycle> HardwareAdapter<P> {
    /// `channels[i]` drives servo channel `i` (slot `i + 1`).
    pub fn new(channels: [P; SLOT_COUNT]) -> Self {
        Self {
            servos: channels.map(ServoDriver::new),
        }
    }

    /// Last commanded angle on `channel`.
    pub fn angle(&self, channel: usize) -> Option<u8> {
        self.servos.get(channel).and_then(ServoDriver::angle)
    }
}

impl<P: SetDutyCycle> ServoPort for HardwareAdapter<P> {
    fn write_angle(&mut self, channel: usize, degrees: u8) {
        match self.servos.get_mut(channel) {
            Some(servo) => servo.write_angle(degrees),
            None => warn!("HardwareAdapter: no servo on channel {}", channel),
        }
    }
}
