//! Hobby servo driver (SG90-class, one per compartment).
//!
//! Position is set by a 50 Hz PWM pulse: 500 µs = 0°, 2500 µs = 180°,
//! linear in between.
//!
//! ## Dual-target design
//!
//! Generic over [`SetDutyCycle`]: on ESP-IDF this is an LEDC channel, in
//! tests a recording mock.  The driver has no position feedback; it only
//! remembers the last angle it commanded.

use embedded_hal::pwm::SetDutyCycle;
use log::warn;

/// PWM period at 50 Hz.
pub const PERIOD_US: u32 = 20_000;
pub const MIN_PULSE_US: u32 = 500;
pub const MAX_PULSE_US: u32 = 2_500;
pub const MAX_ANGLE: u8 = 180;

/// Pulse width for `angle`, clamped to 0–180°.
pub fn pulse_width_us(angle: u8) -> u32 {
    let angle = u32::from(angle.min(MAX_ANGLE));
    MIN_PULSE_US + (MAX_PULSE_US - MIN_PULSE_US) * angle / u32::from(MAX_ANGLE)
}

pub struct ServoDriver<P: SetDutyCycle> {
    pwm: P,
    angle: Option<u8>,
}

impl<P: SetDutyCycle> ServoDriver<P> {
    pub fn new(pwm: P) -> Self {
        Self { pwm, angle: None }
    }

    /// Command a new position.  PWM errors are logged; the sweep carries on.
    pub fn write_angle(&mut self, angle: u8) {
        let pulse = pulse_width_us(angle);
        // Pulse and period are both ≤ 20 000, so they fit u16.
        match self
            .pwm
            .set_duty_cycle_fraction(pulse as u16, PERIOD_US as u16)
        {
            Ok(()) => self.angle = Some(angle.min(MAX_ANGLE)),
            Err(e) => warn!("Servo: PWM write failed: {:?}", e),
        }
    }

    /// Last successfully commanded angle.  `None` until the first write.
    pub fn angle(&self) -> Option<u8> {
        self.angle
    }
}
