//! System configuration parameters
//!
//! All tunable parameters for the PetFeeder system.
//! Values can be overridden via NVS (non-volatile storage) or the remote
//! `settings` message.

use serde::{Deserialize, Serialize};

use crate::app::ports::ConfigError;

/// Core system configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeederConfig {
    // --- Portions ---
    /// Portion dispensed when a request carries no override (g)
    pub default_portion_g: f32,
    /// Smallest portion a request may ask for (g)
    pub min_portion_g: f32,
    /// Largest portion a request may ask for (g)
    pub max_portion_g: f32,
    /// Bowl weight above which a feed asks for confirmation first (g)
    pub existing_food_threshold_g: f32,
    /// Hopper capacity used for the food level estimate (g)
    pub hopper_capacity_g: f32,

    // --- Feed control ---
    /// Close the hatch once this fraction of the target is dispensed
    pub pre_close_factor: f32,
    /// Accept the dispense once this fraction of the target is settled
    pub complete_factor: f32,
    /// Force-close when this multiple of the target is exceeded
    pub excess_factor: f32,
    /// Reopen attempts after a settled shortfall
    pub max_retries: u8,
    /// Upper bound on a dispensing session (ms)
    pub max_feed_duration_ms: u32,
    /// Weight poll interval while the hatch is open (ms)
    pub weight_poll_interval_ms: u32,
    /// Settle time after a pre-close and before the final reading (ms)
    pub settle_ms: u32,
    /// Wait after the hatch closes for good, before the final reading (ms)
    pub final_settle_ms: u32,
    /// Hatch held open on a retry before polling resumes (ms)
    pub retry_open_ms: u32,
    /// Servo travel time before a reading is trusted (ms)
    pub hatch_motion_ms: u32,
    /// Countdown for the existing-food prompt (ms)
    pub confirm_timeout_ms: u32,

    // --- Scale ---
    /// HX711 counts per gram
    pub scale_calibration: f32,
    /// Max (max - min) spread of a stable round (g)
    pub stability_threshold_g: f32,
    /// Readiness wait at session start (ms)
    pub scale_timeout_ms: u32,
    /// Bounded recovery probe when the scale drops out mid-session (ms)
    pub recovery_probe_ms: u32,
    /// Ready-line wait before each weight poll; an expired wait skips the poll (ms)
    pub scale_ready_wait_ms: u32,
    /// Rounds a stable read may take before it settles for an unstable mean
    pub max_stability_rounds: u8,

    // --- Water ---
    /// Sensor-to-surface distance of an empty tank (cm)
    pub water_empty_distance_cm: f32,
    /// Sensor-to-surface distance of a full tank (cm)
    pub water_full_distance_cm: f32,
    /// Refill below this water height (cm)
    pub water_critical_height_cm: f32,
    /// Readings beyond this are implausible (cm)
    pub sensor_max_distance_cm: f32,
    /// Pings averaged per distance reading
    pub ping_samples: u8,
    /// Passive level check interval (ms)
    pub water_check_interval_ms: u32,
    /// Fixed pump run time of a passive refill (ms)
    pub refill_duration_ms: u32,
    /// Lockout after a refill before the level is checked again (ms)
    pub cooldown_ms: u32,
    /// Manual watering: pump time per mL requested
    pub water_ms_per_ml: u32,
    /// Volume used when a water request carries none (mL)
    pub default_water_ml: u16,
    /// Manual watering lower bound (ms)
    pub manual_water_min_ms: u32,
    /// Manual watering upper bound (ms)
    pub manual_water_max_ms: u32,
    /// Pump test pulse length (ms)
    pub test_water_ms: u32,

    // --- Hatch servo ---
    pub hatch_open_angle: u8,
    pub hatch_closed_angle: u8,

    // --- Timing ---
    /// Control loop interval (milliseconds)
    pub control_loop_interval_ms: u32,
    /// Status report interval (seconds)
    pub status_interval_secs: u32,
    /// Local time offset from UTC (seconds)
    pub utc_offset_secs: i32,
}

impl Default for FeederConfig {
    fn default() -> Self {
        Self {
            // Portions
            default_portion_g: 65.0,
            min_portion_g: 5.0,
            max_portion_g: 150.0,
            existing_food_threshold_g: 50.0,
            hopper_capacity_g: 200.0,

            // Feed control
            pre_close_factor: 0.9,
            complete_factor: 0.95,
            excess_factor: 1.25,
            max_retries: 2,
            max_feed_duration_ms: 30_000,
            weight_poll_interval_ms: 100,
            settle_ms: 2_000,
            final_settle_ms: 2_000,
            retry_open_ms: 500,
            hatch_motion_ms: 500,
            confirm_timeout_ms: 20_000,

            // Scale
            scale_calibration: 374.13,
            stability_threshold_g: 0.3,
            scale_timeout_ms: 3_000,
            recovery_probe_ms: 500,
            scale_ready_wait_ms: 100,
            max_stability_rounds: 3,

            // Water
            water_empty_distance_cm: 19.0,
            water_full_distance_cm: 16.0,
            water_critical_height_cm: 2.0,
            sensor_max_distance_cm: 100.0,
            ping_samples: 5,
            water_check_interval_ms: 10_000,
            refill_duration_ms: 10_000,
            cooldown_ms: 300_000, // 5 min
            water_ms_per_ml: 50,
            default_water_ml: 100,
            manual_water_min_ms: 1_000,
            manual_water_max_ms: 15_000,
            test_water_ms: 2_000,

            // Hatch servo
            hatch_open_angle: 60,
            hatch_closed_angle: 180,

            // Timing
            control_loop_interval_ms: 50,
            status_interval_secs: 5,
            utc_offset_secs: 7 * 3600, // UTC+7
        }
    }
}

impl FeederConfig {
    /// Range-check every field that feeds a control decision.
    ///
    /// Rejects instead of clamping so a bad `settings` message can never
    /// produce a config that keeps the hatch or pump open indefinitely.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.min_portion_g > 0.0 && self.min_portion_g < self.max_portion_g) {
            return Err(ConfigError::ValidationFailed(
                "min_portion_g must be > 0 and < max_portion_g",
            ));
        }
        if !(self.min_portion_g..=self.max_portion_g).contains(&self.default_portion_g) {
            return Err(ConfigError::ValidationFailed(
                "default_portion_g must lie within the portion range",
            ));
        }
        if self.max_portion_g > self.hopper_capacity_g {
            return Err(ConfigError::ValidationFailed(
                "max_portion_g must not exceed hopper_capacity_g",
            ));
        }
        if !(0.5..1.0).contains(&self.pre_close_factor)
            || !(self.pre_close_factor..=1.0).contains(&self.complete_factor)
        {
            return Err(ConfigError::ValidationFailed(
                "factors must satisfy 0.5 <= pre_close < 1.0 and pre_close <= complete <= 1.0",
            ));
        }
        if !(1.0..=2.0).contains(&self.excess_factor) {
            return Err(ConfigError::ValidationFailed("excess_factor must be 1.0–2.0"));
        }
        if self.retry_open_ms < self.hatch_motion_ms {
            return Err(ConfigError::ValidationFailed(
                "retry_open_ms must cover hatch_motion_ms",
            ));
        }
        if self.max_retries > 5 {
            return Err(ConfigError::ValidationFailed("max_retries must be 0–5"));
        }
        if !(5_000..=120_000).contains(&self.max_feed_duration_ms) {
            return Err(ConfigError::ValidationFailed(
                "max_feed_duration_ms must be 5000–120000",
            ));
        }
        if self.water_empty_distance_cm <= self.water_full_distance_cm
            || self.water_full_distance_cm <= 0.0
        {
            return Err(ConfigError::ValidationFailed(
                "water_empty_distance_cm must be > water_full_distance_cm > 0",
            ));
        }
        if self.water_empty_distance_cm > self.sensor_max_distance_cm {
            return Err(ConfigError::ValidationFailed(
                "water_empty_distance_cm must be within sensor range",
            ));
        }
        if !(1_000..=60_000).contains(&self.refill_duration_ms) {
            return Err(ConfigError::ValidationFailed(
                "refill_duration_ms must be 1000–60000",
            ));
        }
        if self.cooldown_ms < self.refill_duration_ms {
            return Err(ConfigError::ValidationFailed(
                "cooldown_ms must be >= refill_duration_ms",
            ));
        }
        if self.manual_water_min_ms > self.manual_water_max_ms
            || self.manual_water_max_ms > 60_000
        {
            return Err(ConfigError::ValidationFailed(
                "manual water bounds must satisfy min <= max <= 60000",
            ));
        }
        if self.max_stability_rounds == 0 || self.scale_ready_wait_ms == 0 {
            return Err(ConfigError::ValidationFailed(
                "max_stability_rounds and scale_ready_wait_ms must be >= 1",
            ));
        }
        if self.ping_samples == 0 {
            return Err(ConfigError::ValidationFailed("ping_samples must be >= 1"));
        }
        if !(10..=1000).contains(&self.control_loop_interval_ms) {
            return Err(ConfigError::ValidationFailed(
                "control_loop_interval_ms must be 10–1000",
            ));
        }
        Ok(())
    }

    /// Usable water column between the empty and full marks (cm).
    pub fn water_span_cm(&self) -> f32 {
        self.water_empty_distance_cm - self.water_full_distance_cm
    }
}
