//! Water pump relay driver.
//!
//! The pump is a fixed-speed 5 V unit switched by a relay. The driver is a
//! dumb actuator; run-time limits are enforced by the water controller.
//!
//! ## Dual-target design
//!
//! On ESP-IDF: drives the relay GPIO via hw_init helpers.
//! On host/test: tracks state in-memory only.

use log::debug;

use crate::drivers::hw_init;
use crate::pins;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpState {
    Stopped,
    Running,
}

pub struct PumpDriver {
    state: PumpState,
}

impl Default for PumpDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl PumpDriver {
    pub fn new() -> Self {
        hw_init::gpio_write(pins::PUMP_RELAY_GPIO, false);
        Self {
            state: PumpState::Stopped,
        }
    }

    pub fn start(&mut self) {
        hw_init::gpio_write(pins::PUMP_RELAY_GPIO, true);
        if self.state != PumpState::Running {
            debug!("pump: relay on");
        }
        self.state = PumpState::Running;
    }

    pub fn stop(&mut self) {
        hw_init::gpio_write(pins::PUMP_RELAY_GPIO, false);
        if self.state != PumpState::Stopped {
            debug!("pump: relay off");
        }
        self.state = PumpState::Stopped;
    }

    pub fn state(&self) -> PumpState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == PumpState::Running
    }
}
