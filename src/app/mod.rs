//! Application core: pure domain logic, zero I/O.
//!
//! Command dispatch, device status and the busy guard live here. All
//! interaction with hardware happens through **port traits** defined in
//! [`ports`], keeping this layer fully testable without real peripherals.

pub mod commands;
pub mod context;
pub mod events;
pub mod ports;
pub mod service;
