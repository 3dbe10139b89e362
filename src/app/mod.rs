//! Application core — pure domain logic, zero I/O.
//!
//! This module contains the business rules for the Pillbox dispenser:
//! schedule reconciliation, compartment sequencing, dispense dedup and the
//! manual overrides.  All interaction with hardware and the schedule store
//! happens through **port traits** defined in [`ports`], keeping this layer
//! fully testable without real peripherals.

pub mod actuators;
pub mod commands;
pub mod connection;
pub mod engine;
pub mod events;
pub mod manual;
pub mod ports;
pub mod reminder;
pub mod service;
pub mod tracker;
