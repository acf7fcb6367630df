//! Filtered sensor reads on top of the raw [`SensorPort`].
//!
//! Every wait in here is bounded and expressed through
//! [`DelayNs`](embedded_hal::delay::DelayNs), so a mock delay that advances
//! a simulated clock makes the whole sampler deterministic in tests.
//!
//! Failures are never fatal: a weight read that got no conversion comes
//! back `valid = false`, and a distance read with no echo comes back as
//! `0.0`. Callers decide whether to fall back to a cached value or abort
//! the current operation.

use embedded_hal::delay::DelayNs;
use log::{debug, warn};

use crate::app::ports::SensorPort;
use crate::config::FeederConfig;
use crate::error::SensorError;

/// Most polls a single weight read will average.
pub const MAX_SAMPLES: usize = 10;

/// One averaged weight poll.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightSample {
    pub grams: f32,
    pub valid: bool,
}

impl WeightSample {
    pub const INVALID: Self = Self {
        grams: 0.0,
        valid: false,
    };
}

/// Result of [`SensorSampler::read_stable_weight`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StableWeight {
    pub grams: f32,
    /// `false` when the round cap was hit before the spread settled.
    pub stable: bool,
}

/// Timing knobs for the sampler.
#[derive(Debug, Clone, Copy)]
pub struct SamplerConfig {
    /// Bounded wait for the ready line before each poll (ms).
    pub scale_ready_wait_ms: u32,
    /// Ready-line re-check interval inside a wait (ms).
    pub ready_poll_ms: u32,
    /// Gap between consecutive polls of one read (ms).
    pub inter_poll_ms: u32,
    /// Gap between consecutive ultrasonic pings (ms).
    pub ping_gap_ms: u32,
    /// Rounds [`SensorSampler::read_stable_weight`] tries before giving up.
    pub max_stability_rounds: u8,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            scale_ready_wait_ms: 100,
            ready_poll_ms: 10,
            inter_poll_ms: 50,
            ping_gap_ms: 10,
            max_stability_rounds: 3,
        }
    }
}

impl SamplerConfig {
    /// Scale knobs from the device config; poll spacing keeps its defaults.
    pub fn from_config(cfg: &FeederConfig) -> Self {
        Self {
            scale_ready_wait_ms: cfg.scale_ready_wait_ms,
            max_stability_rounds: cfg.max_stability_rounds,
            ..Self::default()
        }
    }
}

pub struct SensorSampler {
    cfg: SamplerConfig,
}

impl SensorSampler {
    pub fn new(cfg: SamplerConfig) -> Self {
        Self { cfg }
    }

    pub fn config(&self) -> &SamplerConfig {
        &self.cfg
    }

    /// Wait up to `timeout_ms` for the scale's ready line.
    pub fn wait_ready(&self, hw: &mut (impl SensorPort + DelayNs), timeout_ms: u32) -> bool {
        let step = self.cfg.ready_poll_ms.max(1);
        let mut waited = 0u32;
        loop {
            if hw.scale_ready() {
                return true;
            }
            if waited >= timeout_ms {
                return false;
            }
            hw.delay_ms(step);
            waited = waited.saturating_add(step);
        }
    }

    /// Mean of `samples` polls, each averaging `per_sample_reads` conversions.
    ///
    /// A poll whose ready wait expires is skipped. Invalid only if every
    /// poll was skipped.
    pub fn read_weight(
        &self,
        hw: &mut (impl SensorPort + DelayNs),
        samples: u8,
        per_sample_reads: u8,
    ) -> WeightSample {
        let mut polls = heapless::Vec::<f32, MAX_SAMPLES>::new();
        self.collect(hw, samples, per_sample_reads, &mut polls);
        if polls.is_empty() {
            return WeightSample::INVALID;
        }
        WeightSample {
            grams: mean(&polls),
            valid: true,
        }
    }

    /// Single fast conversion, used by the feed loop between polls.
    pub fn read_fast(&self, hw: &mut (impl SensorPort + DelayNs)) -> WeightSample {
        self.read_weight(hw, 1, 1)
    }

    /// Repeat rounds of [`read_weight`](Self::read_weight) until one round's
    /// spread is within `stability_threshold`, or the round cap is hit.
    ///
    /// On cap the last valid round's mean is returned with `stable = false`.
    pub fn read_stable_weight(
        &self,
        hw: &mut (impl SensorPort + DelayNs),
        samples: u8,
        per_sample_reads: u8,
        stability_threshold: f32,
    ) -> Result<StableWeight, SensorError> {
        let rounds = self.cfg.max_stability_rounds.max(1);
        let mut last_mean: Option<f32> = None;
        let mut last_spread = 0.0f32;

        for round in 0..rounds {
            let mut polls = heapless::Vec::<f32, MAX_SAMPLES>::new();
            self.collect(hw, samples, per_sample_reads, &mut polls);
            if polls.is_empty() {
                debug!("stable weight: round {} produced no valid poll", round + 1);
                continue;
            }

            let (lo, hi) = polls
                .iter()
                .fold((f32::MAX, f32::MIN), |(lo, hi), &w| (lo.min(w), hi.max(w)));
            let avg = mean(&polls);
            last_spread = hi - lo;
            last_mean = Some(avg);

            debug!(
                "stable weight: round {} avg={:.2}g spread={:.2}g",
                round + 1,
                avg,
                last_spread
            );

            if last_spread <= stability_threshold {
                return Ok(StableWeight {
                    grams: avg,
                    stable: true,
                });
            }
        }

        match last_mean {
            Some(grams) => {
                warn!(
                    "Scale not stable after {} rounds (spread {:.2}g), using {:.2}g",
                    rounds, last_spread, grams
                );
                Ok(StableWeight {
                    grams,
                    stable: false,
                })
            }
            None => Err(SensorError::NotReady),
        }
    }

    /// Mean of the pings that returned an echo, in cm. `0.0` if none did.
    pub fn read_distance(&self, hw: &mut (impl SensorPort + DelayNs), ping_count: u8) -> f32 {
        let mut total = 0.0f32;
        let mut valid = 0u8;
        for i in 0..ping_count {
            match hw.ping_cm() {
                Ok(cm) => {
                    total += cm;
                    valid += 1;
                }
                Err(e) => debug!("distance: ping {} failed ({})", i + 1, e),
            }
            if i + 1 < ping_count {
                hw.delay_ms(self.cfg.ping_gap_ms);
            }
        }
        if valid == 0 {
            debug!("distance: no echo in {} pings", ping_count);
            return 0.0;
        }
        total / valid as f32
    }

    fn collect(
        &self,
        hw: &mut (impl SensorPort + DelayNs),
        samples: u8,
        per_sample_reads: u8,
        out: &mut heapless::Vec<f32, MAX_SAMPLES>,
    ) {
        let samples = (samples as usize).clamp(1, MAX_SAMPLES);
        let reads = per_sample_reads.max(1);
        for i in 0..samples {
            if self.wait_ready(hw, self.cfg.scale_ready_wait_ms) {
                match hw.read_scale(reads) {
                    // Capacity equals the clamped sample count.
                    Ok(grams) => {
                        let _ = out.push(grams);
                    }
                    Err(e) => debug!("weight: poll {} skipped ({})", i + 1, e),
                }
            }
            if i + 1 < samples {
                hw.delay_ms(self.cfg.inter_poll_ms);
            }
        }
    }
}

fn mean(values: &[f32]) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f32>() / values.len() as f32
}
