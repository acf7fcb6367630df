//! HX711 load-cell amplifier under the food bowl.
//!
//! Bit-banged two-wire protocol: DOUT goes LOW when a conversion is ready,
//! then 24 clock pulses shift the sample out MSB first and a 25th pulse
//! selects channel A / gain 128 for the next conversion. At 10 SPS the next
//! conversion lands ~100 ms later, so every conversion waits for DOUT first.
//!
//! ## Dual-target design
//!
//! On ESP-IDF: [`GpioBus`] drives the real pins via hw_init helpers.
//! On host/test: [`SimBus`] shifts out a simulated raw value set through
//! [`sim_set_raw`].

use core::sync::atomic::{AtomicBool, AtomicI32, Ordering};

use log::{debug, info};

#[cfg(target_os = "espidf")]
use crate::drivers::hw_init;
use crate::error::SensorError;
#[cfg(target_os = "espidf")]
use crate::pins;

/// Longest wait for DOUT to fall before one conversion (µs).
pub const CONVERSION_TIMEOUT_US: u32 = 150_000;

/// DOUT re-check interval while waiting (µs).
const READY_POLL_US: u32 = 1_000;

/// Clock pulses after the data bits: 1 = channel A, gain 128.
const GAIN_PULSES: u8 = 1;

// ───────────────────────────────────────────────────────────────
// Bus
// ───────────────────────────────────────────────────────────────

/// The two HX711 lines.
pub trait Hx711Bus {
    /// DOUT level. LOW means a conversion is ready.
    fn dout_high(&mut self) -> bool;

    /// One SCK pulse; returns DOUT sampled while SCK is HIGH.
    fn pulse(&mut self) -> bool;

    fn delay_us(&mut self, us: u32);
}

/// Wait for DOUT to fall, then clock one 24-bit sample out.
///
/// Nothing is clocked while DOUT is HIGH, so a conversion still in progress
/// can never be read as `0xFFFFFF`.
pub fn read_conversion(bus: &mut impl Hx711Bus, timeout_us: u32) -> Result<i32, SensorError> {
    let mut waited = 0u32;
    while bus.dout_high() {
        if waited >= timeout_us {
            return Err(SensorError::NotReady);
        }
        bus.delay_us(READY_POLL_US);
        waited = waited.saturating_add(READY_POLL_US);
    }

    let mut value: u32 = 0;
    for _ in 0..24 {
        value = (value << 1) | u32::from(bus.pulse());
    }
    for _ in 0..GAIN_PULSES {
        bus.pulse();
    }
    // Sign-extend the 24-bit two's complement sample.
    Ok(((value << 8) as i32) >> 8)
}

#[cfg(target_os = "espidf")]
pub struct GpioBus;

#[cfg(target_os = "espidf")]
impl Hx711Bus for GpioBus {
    fn dout_high(&mut self) -> bool {
        hw_init::gpio_read(pins::LOADCELL_DOUT_GPIO)
    }

    fn pulse(&mut self) -> bool {
        hw_init::gpio_write(pins::LOADCELL_SCK_GPIO, true);
        hw_init::delay_us(1);
        let bit = hw_init::gpio_read(pins::LOADCELL_DOUT_GPIO);
        hw_init::gpio_write(pins::LOADCELL_SCK_GPIO, false);
        hw_init::delay_us(1);
        bit
    }

    fn delay_us(&mut self, us: u32) {
        hw_init::delay_us(us);
    }
}

static SIM_RAW: AtomicI32 = AtomicI32::new(0);
static SIM_READY: AtomicBool = AtomicBool::new(true);

/// Raw counts the simulated amplifier reports.
#[cfg(not(target_os = "espidf"))]
pub fn sim_set_raw(counts: i32) {
    SIM_RAW.store(counts, Ordering::Relaxed);
}

#[cfg(not(target_os = "espidf"))]
pub fn sim_set_ready(ready: bool) {
    SIM_READY.store(ready, Ordering::Relaxed);
}

/// Simulated amplifier: always ready unless told otherwise, shifting out
/// the current [`sim_set_raw`] value.
#[derive(Debug, Default)]
pub struct SimBus {
    latched: u32,
    bit: u8,
}

impl Hx711Bus for SimBus {
    fn dout_high(&mut self) -> bool {
        !SIM_READY.load(Ordering::Relaxed)
    }

    fn pulse(&mut self) -> bool {
        if self.bit == 0 {
            self.latched = SIM_RAW.load(Ordering::Relaxed) as u32 & 0x00FF_FFFF;
        }
        let out = self.bit < 24 && (self.latched >> (23 - self.bit)) & 1 == 1;
        self.bit = (self.bit + 1) % (24 + GAIN_PULSES);
        out
    }

    fn delay_us(&mut self, _us: u32) {}
}

#[cfg(target_os = "espidf")]
pub type DefaultBus = GpioBus;
#[cfg(not(target_os = "espidf"))]
pub type DefaultBus = SimBus;

// ───────────────────────────────────────────────────────────────
// Load cell
// ───────────────────────────────────────────────────────────────

pub struct LoadCell<B: Hx711Bus = DefaultBus> {
    bus: B,
    /// Raw counts per gram.
    scale: f32,
    /// Raw counts with an empty bowl platform.
    offset: i32,
}

impl LoadCell {
    pub fn new(calibration: f32) -> Self {
        #[cfg(target_os = "espidf")]
        let bus = GpioBus;
        #[cfg(not(target_os = "espidf"))]
        let bus = SimBus::default();
        Self::with_bus(bus, calibration)
    }
}

impl<B: Hx711Bus> LoadCell<B> {
    pub fn with_bus(bus: B, calibration: f32) -> Self {
        Self {
            bus,
            scale: if calibration.abs() > f32::EPSILON {
                calibration
            } else {
                1.0
            },
            offset: 0,
        }
    }

    /// Whether a conversion is waiting to be clocked out.
    pub fn is_ready(&mut self) -> bool {
        !self.bus.dout_high()
    }

    /// Average of up to `reads` conversions, in grams relative to the tare
    /// point. Conversions whose ready wait expires are left out.
    pub fn read_grams(&mut self, reads: u8) -> Result<f32, SensorError> {
        let avg = self.read_average(reads)?;
        Ok((avg - self.offset as f32) / self.scale)
    }

    /// Record the current raw average as zero. The old offset is kept if
    /// no conversion arrives.
    pub fn tare(&mut self, reads: u8) -> Result<(), SensorError> {
        self.offset = self.read_average(reads)?.round() as i32;
        info!("Load cell tared (offset={})", self.offset);
        Ok(())
    }

    fn read_average(&mut self, reads: u8) -> Result<f32, SensorError> {
        let reads = reads.max(1);
        let mut total: i64 = 0;
        let mut got = 0u8;
        for _ in 0..reads {
            match read_conversion(&mut self.bus, CONVERSION_TIMEOUT_US) {
                Ok(raw) => {
                    total += i64::from(raw);
                    got += 1;
                }
                Err(e) => debug!("load cell: conversion skipped ({})", e),
            }
        }
        if got == 0 {
            return Err(SensorError::NotReady);
        }
        Ok(total as f32 / f32::from(got))
    }
}
