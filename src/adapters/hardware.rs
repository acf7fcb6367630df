//! Hardware adapter: bridges the real peripherals to the domain ports.
//!
//! Owns the load cell, the ultrasonic sensor, the hatch servo and the pump
//! relay, and exposes them through [`SensorPort`], [`ActuatorPort`],
//! [`DelayNs`] and [`Clock`]. This is the only module in the system that
//! touches actual hardware. On non-espidf targets the drivers underneath use
//! their simulation backends.

use embedded_hal::delay::DelayNs;

use crate::adapters::time::SystemClock;
use crate::app::ports::{ActuatorPort, Clock, HatchPosition, SensorPort};
use crate::config::FeederConfig;
use crate::drivers::hatch::HatchDriver;
use crate::drivers::hw_init;
use crate::drivers::pump::PumpDriver;
use crate::error::SensorError;
use crate::sensors::load_cell::LoadCell;
use crate::sensors::ultrasonic::Ultrasonic;

/// Concrete adapter that combines all hardware behind port traits.
pub struct HardwareAdapter {
    scale: LoadCell,
    sonar: Ultrasonic,
    hatch: HatchDriver,
    pump: PumpDriver,
    clock: SystemClock,
}

impl HardwareAdapter {
    pub fn new(
        scale: LoadCell,
        sonar: Ultrasonic,
        hatch: HatchDriver,
        pump: PumpDriver,
        clock: SystemClock,
    ) -> Self {
        Self {
            scale,
            sonar,
            hatch,
            pump,
            clock,
        }
    }

    /// Build every driver from the config. The hatch starts closed and
    /// the pump off.
    pub fn from_config(cfg: &FeederConfig) -> Self {
        Self::new(
            LoadCell::new(cfg.scale_calibration),
            Ultrasonic::new(cfg.sensor_max_distance_cm),
            HatchDriver::new(cfg.hatch_open_angle, cfg.hatch_closed_angle),
            PumpDriver::new(),
            SystemClock::new(),
        )
    }

    /// Zero the scale with whatever is on the platform now.
    pub fn tare_scale(&mut self, reads: u8) -> Result<(), SensorError> {
        self.scale.tare(reads)
    }

    pub fn clock(&self) -> &SystemClock {
        &self.clock
    }
}

// ── SensorPort implementation ─────────────────────────────────

impl SensorPort for HardwareAdapter {
    fn scale_ready(&mut self) -> bool {
        self.scale.is_ready()
    }

    fn read_scale(&mut self, reads: u8) -> Result<f32, SensorError> {
        self.scale.read_grams(reads)
    }

    fn ping_cm(&mut self) -> Result<f32, SensorError> {
        self.sonar.ping_cm()
    }
}

// ── ActuatorPort implementation ───────────────────────────────

impl ActuatorPort for HardwareAdapter {
    fn set_hatch(&mut self, position: HatchPosition) {
        self.hatch.set(position);
    }

    fn hatch(&self) -> HatchPosition {
        self.hatch.position()
    }

    fn set_pump(&mut self, on: bool) {
        if on {
            self.pump.start();
        } else {
            self.pump.stop();
        }
    }

    fn pump_on(&self) -> bool {
        self.pump.is_running()
    }

    fn all_off(&mut self) {
        self.pump.stop();
        self.hatch.close();
    }
}

// ── Delay / clock ─────────────────────────────────────────────

impl DelayNs for HardwareAdapter {
    fn delay_ns(&mut self, ns: u32) {
        let us = ns.div_ceil(1_000);
        if us < 1_000 {
            hw_init::delay_us(us);
        } else {
            // Yields to the scheduler so the idle task can run.
            std::thread::sleep(std::time::Duration::from_micros(u64::from(us)));
        }
    }

    fn delay_ms(&mut self, ms: u32) {
        std::thread::sleep(std::time::Duration::from_millis(u64::from(ms)));
    }
}

impl Clock for HardwareAdapter {
    fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }
}
