//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that exercises one part of the feeder
//! against mock adapters. Everything runs on the host with a simulated
//! clock; no real hardware required.

mod feed_session_tests;
mod gateway_tests;
mod mock_hw;
mod schedule_tests;
mod water_tests;
