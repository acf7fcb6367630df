//! Actuator drivers, hardware initialisation, and peripheral helpers.

pub mod button;
pub mod hatch;
pub mod hw_init;
pub mod pump;
pub mod watchdog;
