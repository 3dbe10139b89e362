//! GPIO / peripheral pin assignments for the Pillbox board (ESP32-WROOM).
//!
//! `main` hands concrete pin peripherals to the LEDC and GPIO drivers, then
//! checks their GPIO numbers against this map before anything moves.

use core::fmt;

use crate::app::reminder::SLOT_COUNT;

// ---------------------------------------------------------------------------
// Compartment servos (LEDC, 50 Hz)
// ---------------------------------------------------------------------------

/// Servo signal GPIO per compartment; index 0 is slot 1.
pub const SERVO_GPIOS: [i32; SLOT_COUNT] = [15, 2, 16, 17, 18, 19, 22];

pub const SERVO_PWM_FREQ_HZ: u32 = 50;

const SERVO_ROLES: [&str; SLOT_COUNT] = [
    "servo 1", "servo 2", "servo 3", "servo 4", "servo 5", "servo 6", "servo 7",
];

// ---------------------------------------------------------------------------
// Front-panel buttons (active-low, internal pull-up)
// ---------------------------------------------------------------------------

/// Close every open compartment.
pub const FORCE_CLOSE_BUTTON_GPIO: i32 = 27;
/// Close everything and restart the controller.
pub const RESET_BUTTON_GPIO: i32 = 25;

// ---------------------------------------------------------------------------
// Wiring check
// ---------------------------------------------------------------------------

/// A driver was handed a different GPIO than this map assigns it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WiringMismatch {
    pub role: &'static str,
    pub expected: i32,
    pub wired: i32,
}

impl fmt::Display for WiringMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} wired to GPIO{}, pin map says GPIO{}",
            self.role, self.wired, self.expected
        )
    }
}

fn check(role: &'static str, expected: i32, wired: i32) -> Result<(), WiringMismatch> {
    if expected == wired {
        Ok(())
    } else {
        Err(WiringMismatch { role, expected, wired })
    }
}

/// `wired[i]` is the GPIO driving slot `i + 1`.
pub fn check_servo_wiring(wired: &[i32; SLOT_COUNT]) -> Result<(), WiringMismatch> {
    for ((role, expected), wired) in SERVO_ROLES.iter().zip(SERVO_GPIOS).zip(wired) {
        check(role, expected, *wired)?;
    }
    Ok(())
}

pub fn check_button_wiring(force_close: i32, reset: i32) -> Result<(), WiringMismatch> {
    check("force-close button", FORCE_CLOSE_BUTTON_GPIO, force_close)?;
    check("reset button", RESET_BUTTON_GPIO, reset)
}
