//! HC-SR04 ultrasonic ranger mounted above the water tank.
//!
//! A 10 µs trigger pulse starts a burst; the echo line then stays HIGH for
//! the round-trip time. Distance (cm) = echo µs / 58.
//!
//! ## Dual-target design
//!
//! On ESP-IDF: times the echo with `esp_timer_get_time`.
//! On host/test: returns a simulated distance set through [`sim_set_distance`].

use core::sync::atomic::{AtomicU32, Ordering};

#[cfg(target_os = "espidf")]
use crate::drivers::hw_init;
use crate::error::SensorError;
#[cfg(target_os = "espidf")]
use crate::pins;

/// Round-trip µs per centimetre at ~20 °C.
pub const US_PER_CM: f32 = 58.0;

/// f32 bits; 0.0 means "no echo".
static SIM_DISTANCE_BITS: AtomicU32 = AtomicU32::new(0);

#[cfg(not(target_os = "espidf"))]
pub fn sim_set_distance(cm: Option<f32>) {
    SIM_DISTANCE_BITS.store(cm.unwrap_or(0.0).to_bits(), Ordering::Relaxed);
}

pub struct Ultrasonic {
    /// Echo wait cut-off derived from the maximum distance of interest.
    timeout_us: i64,
}

impl Ultrasonic {
    pub fn new(max_distance_cm: f32) -> Self {
        Self {
            timeout_us: (max_distance_cm * US_PER_CM) as i64 + 1_000,
        }
    }

    /// One ping, in cm.
    ///
    /// `NoEcho` when the echo line never rises; `OutOfRange` when it stays
    /// HIGH past the cut-off (target beyond the maximum distance).
    #[cfg(target_os = "espidf")]
    pub fn ping_cm(&mut self) -> Result<f32, SensorError> {
        hw_init::gpio_write(pins::SONAR_TRIG_GPIO, false);
        hw_init::delay_us(2);
        hw_init::gpio_write(pins::SONAR_TRIG_GPIO, true);
        hw_init::delay_us(10);
        hw_init::gpio_write(pins::SONAR_TRIG_GPIO, false);

        let start = hw_init::now_us();
        while !hw_init::gpio_read(pins::SONAR_ECHO_GPIO) {
            if hw_init::now_us() - start > self.timeout_us {
                return Err(SensorError::NoEcho);
            }
        }
        let rise = hw_init::now_us();
        while hw_init::gpio_read(pins::SONAR_ECHO_GPIO) {
            if hw_init::now_us() - rise > self.timeout_us {
                return Err(SensorError::OutOfRange);
            }
        }
        self.classify(hw_init::now_us() - rise)
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn ping_cm(&mut self) -> Result<f32, SensorError> {
        let cm = f32::from_bits(SIM_DISTANCE_BITS.load(Ordering::Relaxed));
        if cm <= 0.0 {
            return Err(SensorError::NoEcho);
        }
        self.classify((cm * US_PER_CM) as i64)
    }

    /// Echo pulse width to distance.
    fn classify(&self, width_us: i64) -> Result<f32, SensorError> {
        if width_us > self.timeout_us {
            return Err(SensorError::OutOfRange);
        }
        Ok(width_us as f32 / US_PER_CM)
    }
}
