//! Peripheral drivers for the compartment servos and front-panel buttons.

pub mod button;
pub mod servo;
