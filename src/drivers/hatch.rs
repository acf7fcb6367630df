//! Food hatch servo driver.
//!
//! A hobby servo on LEDC channel 0 (50 Hz). Only the two configured end
//! stops are ever commanded; the servo needs `hatch_motion_ms` to travel
//! between them, which the feed controller accounts for.
//!
//! ## Dual-target design
//!
//! On ESP-IDF: writes the LEDC duty via hw_init helpers.
//! On host/test: tracks state in-memory only.

use log::debug;

use crate::app::ports::HatchPosition;
use crate::drivers::hw_init;
use crate::pins;

pub struct HatchDriver {
    open_angle: u8,
    closed_angle: u8,
    position: HatchPosition,
}

impl HatchDriver {
    /// Build the driver and drive the servo to the closed stop.
    pub fn new(open_angle: u8, closed_angle: u8) -> Self {
        let mut hatch = Self {
            open_angle: open_angle.min(180),
            closed_angle: closed_angle.min(180),
            position: HatchPosition::Closed,
        };
        hatch.write_angle(hatch.closed_angle);
        hatch
    }

    pub fn open(&mut self) {
        self.set(HatchPosition::Open);
    }

    pub fn close(&mut self) {
        self.set(HatchPosition::Closed);
    }

    pub fn set(&mut self, position: HatchPosition) {
        let angle = match position {
            HatchPosition::Open => self.open_angle,
            HatchPosition::Closed => self.closed_angle,
        };
        self.write_angle(angle);
        if position != self.position {
            debug!("hatch: {:?} -> {:?} ({}°)", self.position, position, angle);
        }
        self.position = position;
    }

    pub fn position(&self) -> HatchPosition {
        self.position
    }

    fn write_angle(&mut self, angle: u8) {
        hw_init::ledc_set(hw_init::LEDC_CH_SERVO, angle_to_duty(angle));
    }
}

/// LEDC duty for a servo angle at the configured frame rate and resolution.
pub fn angle_to_duty(angle: u8) -> u32 {
    let angle = u32::from(angle.min(180));
    let span = pins::SERVO_MAX_PULSE_US - pins::SERVO_MIN_PULSE_US;
    let pulse_us = pins::SERVO_MIN_PULSE_US + span * angle / 180;
    let period_us = 1_000_000 / pins::SERVO_PWM_FREQ_HZ;
    let max_duty = (1u32 << pins::SERVO_PWM_RESOLUTION_BITS) - 1;
    pulse_us * max_duty / period_us
}
