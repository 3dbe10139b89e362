//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that exercises the dispenser against
//! mock adapters.  All tests run on the host (x86_64) with no real hardware
//! or network store required.

mod dispenser_tests;
mod mock_hw;
mod override_tests;
