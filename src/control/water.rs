//! Water level maintenance and manual watering.
//!
//! Passive refill cycle:
//!
//! ```text
//!  CheckWater ──(height ≤ critical)──▶ RefillRunning ──(refill_duration)──▶ Cooldown
//!      ▲                                                                      │
//!      └────────────────────────────(cooldown)───────────────────────────────┘
//! ```
//!
//! The level is never re-polled while a refill runs or during cooldown, so
//! the ripple from the pump cannot re-trigger it. Manual watering is a
//! separate one-shot; the pump output is the OR of both demands.

use log::{info, warn};

use crate::app::ports::Hardware;
use crate::config::FeederConfig;
use crate::sensors::sampler::{SamplerConfig, SensorSampler};

/// Percent reported while the last distance reading is unusable.
pub const UNKNOWN_LEVEL_PCT: f32 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaterPhase {
    CheckWater,
    RefillRunning,
    Cooldown,
}

/// Passive cycle state. Lives for the whole process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaterState {
    pub phase: WaterPhase,
    pub phase_start_ms: u64,
}

/// One interpreted distance reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WaterLevel {
    pub distance_cm: f32,
    /// Water column above the empty mark (cm).
    pub height_cm: f32,
    pub percent: f32,
}

impl WaterLevel {
    /// Interpret a distance. `None` when the reading is out of range.
    pub fn from_distance(cfg: &FeederConfig, distance_cm: f32) -> Option<Self> {
        if !(distance_cm > 0.0 && distance_cm <= cfg.sensor_max_distance_cm) {
            return None;
        }
        let span = cfg.water_span_cm();
        let height_cm = (cfg.water_empty_distance_cm - distance_cm).clamp(0.0, span);
        let percent = if span > 0.0 {
            height_cm / span * 100.0
        } else {
            0.0
        };
        Some(Self {
            distance_cm,
            height_cm,
            percent,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WaterEvent {
    /// Distance reading out of range; no actuation.
    SensorError { distance_cm: f32 },
    LevelOk(WaterLevel),
    RefillStarted(WaterLevel),
    RefillComplete,
    /// Cooldown over, level checks resume.
    Ready,
    /// Manual or test watering finished. `None` if the follow-up reading failed.
    ManualComplete(Option<WaterLevel>),
}

/// Events produced by one tick.
pub type WaterEvents = heapless::Vec<WaterEvent, 3>;

pub struct WaterController {
    cfg: FeederConfig,
    sampler: SensorSampler,
    state: WaterState,
    next_check_ms: u64,
    refill_demand: bool,
    /// Deadline of a running manual shot.
    manual_until_ms: Option<u64>,
    last_level: Option<WaterLevel>,
}

impl WaterController {
    pub fn new(cfg: FeederConfig, now_ms: u64) -> Self {
        let sampler = SensorSampler::new(SamplerConfig::from_config(&cfg));
        Self {
            cfg,
            sampler,
            state: WaterState {
                phase: WaterPhase::CheckWater,
                phase_start_ms: now_ms,
            },
            next_check_ms: now_ms,
            refill_demand: false,
            manual_until_ms: None,
            last_level: None,
        }
    }

    pub fn set_config(&mut self, cfg: FeederConfig) {
        self.sampler = SensorSampler::new(SamplerConfig::from_config(&cfg));
        self.cfg = cfg;
    }

    pub fn state(&self) -> WaterState {
        self.state
    }

    pub fn phase(&self) -> WaterPhase {
        self.state.phase
    }

    pub fn manual_active(&self) -> bool {
        self.manual_until_ms.is_some()
    }

    pub fn last_level(&self) -> Option<WaterLevel> {
        self.last_level
    }

    /// Last known percent, or [`UNKNOWN_LEVEL_PCT`] without a valid reading.
    pub fn level_percent(&self) -> f32 {
        self.last_level.map_or(UNKNOWN_LEVEL_PCT, |l| l.percent)
    }

    /// Pump time for a manual request.
    pub fn manual_duration_ms(&self, volume_ml: Option<u16>, duration_secs: Option<u16>) -> u32 {
        let raw = match duration_secs {
            Some(secs) if secs > 0 => u32::from(secs) * 1000,
            _ => {
                let ml = volume_ml
                    .filter(|&v| v > 0)
                    .unwrap_or(self.cfg.default_water_ml);
                u32::from(ml).saturating_mul(self.cfg.water_ms_per_ml)
            }
        };
        raw.clamp(self.cfg.manual_water_min_ms, self.cfg.manual_water_max_ms)
    }

    /// Start a one-shot pump run. Returns `false` if one is already running.
    pub fn start_manual(&mut self, duration_ms: u32, hw: &mut impl Hardware) -> bool {
        if self.manual_active() {
            warn!("water: manual run already active");
            return false;
        }
        let until = hw.now_ms() + u64::from(duration_ms);
        self.manual_until_ms = Some(until);
        info!("water: manual run for {}ms", duration_ms);
        self.apply_pump(hw);
        true
    }

    /// Measure the level now, outside the passive cycle.
    pub fn measure(&mut self, hw: &mut impl Hardware) -> Option<WaterLevel> {
        let distance = self
            .sampler
            .read_distance(hw, self.cfg.ping_samples.max(1));
        let level = WaterLevel::from_distance(&self.cfg, distance);
        if level.is_some() {
            self.last_level = level;
        }
        level
    }

    /// Advance both the passive cycle and any manual shot.
    ///
    /// `check_allowed` gates only the sensing step of `CheckWater`; the
    /// refill and cooldown deadlines always advance.
    pub fn tick(&mut self, now_ms: u64, check_allowed: bool, hw: &mut impl Hardware) -> WaterEvents {
        let mut events = WaterEvents::new();

        if self.manual_until_ms.is_some_and(|until| now_ms >= until) {
            self.manual_until_ms = None;
            self.apply_pump(hw);
            let level = self.measure(hw);
            match level {
                Some(l) => info!("water: manual run done, level {:.0}%", l.percent),
                None => warn!("water: manual run done, level unreadable"),
            }
            let _ = events.push(WaterEvent::ManualComplete(level));
        }

        match self.state.phase {
            WaterPhase::CheckWater => {
                if check_allowed && now_ms >= self.next_check_ms {
                    self.next_check_ms = now_ms + u64::from(self.cfg.water_check_interval_ms);
                    if let Some(ev) = self.check_level(hw) {
                        let _ = events.push(ev);
                    }
                }
            }
            WaterPhase::RefillRunning => {
                if now_ms.saturating_sub(self.state.phase_start_ms)
                    >= u64::from(self.cfg.refill_duration_ms)
                {
                    self.refill_demand = false;
                    self.apply_pump(hw);
                    self.enter(WaterPhase::Cooldown, hw.now_ms());
                    info!("water: refill done, cooling down {}ms", self.cfg.cooldown_ms);
                    let _ = events.push(WaterEvent::RefillComplete);
                }
            }
            WaterPhase::Cooldown => {
                if now_ms.saturating_sub(self.state.phase_start_ms)
                    >= u64::from(self.cfg.cooldown_ms)
                {
                    self.enter(WaterPhase::CheckWater, now_ms);
                    self.next_check_ms = now_ms;
                    info!("water: cooldown over");
                    let _ = events.push(WaterEvent::Ready);
                }
            }
        }

        events
    }

    /// Release both pump demands.
    pub fn stop(&mut self, hw: &mut impl Hardware) {
        self.manual_until_ms = None;
        self.refill_demand = false;
        hw.set_pump(false);
    }

    fn check_level(&mut self, hw: &mut impl Hardware) -> Option<WaterEvent> {
        let distance = self
            .sampler
            .read_distance(hw, self.cfg.ping_samples.max(1));
        let Some(level) = WaterLevel::from_distance(&self.cfg, distance) else {
            warn!("water: distance {:.1}cm out of range", distance);
            return Some(WaterEvent::SensorError {
                distance_cm: distance,
            });
        };
        self.last_level = Some(level);

        if level.height_cm <= self.cfg.water_critical_height_cm {
            info!(
                "water: low ({:.1}cm, {:.0}%), refilling for {}ms",
                level.height_cm, level.percent, self.cfg.refill_duration_ms
            );
            self.refill_demand = true;
            self.apply_pump(hw);
            self.enter(WaterPhase::RefillRunning, hw.now_ms());
            return Some(WaterEvent::RefillStarted(level));
        }
        Some(WaterEvent::LevelOk(level))
    }

    fn enter(&mut self, phase: WaterPhase, now_ms: u64) {
        self.state = WaterState {
            phase,
            phase_start_ms: now_ms,
        };
    }

    fn apply_pump(&self, hw: &mut impl Hardware) {
        let want = self.refill_demand || self.manual_until_ms.is_some();
        if hw.pump_on() != want {
            hw.set_pump(want);
        }
    }
}
