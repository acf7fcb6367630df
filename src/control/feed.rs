//! Food dispensing controller.
//!
//! Turns a target mass into an open/close schedule for the hatch using the
//! bowl scale as feedback:
//!
//! ```text
//!  Idle ─start─▶ CheckExisting ─confirm─▶ OpenDispense ◀──────────┐
//!    │               │ timeout               │ pre-close          │
//!    │               ▼                       ▼                    │
//!    │           Complete ◀── FinalSettle ◀─ PreCloseSettle ─▶ RetryOpen
//!    └────────── (W0 below threshold) ──▶ OpenDispense
//! ```
//!
//! * The excess guard runs on the instantaneous sample so a single-poll jump
//!   is caught; pre-close runs on a 3-sample moving average seeded with W0.
//! * Every terminal path goes through `FinalSettle`, which closes the hatch.
//! * Dispensed weight is clamped at zero everywhere.

use log::{info, warn};
use serde::Serialize;

use crate::app::commands::CommandSource;
use crate::app::ports::{DisplayPort, Hardware, HatchPosition};
use crate::config::FeederConfig;
use crate::sensors::sampler::{SamplerConfig, SensorSampler};

use super::lcd_line;

/// Moving-average window for the pre-close decision.
const AVG_WINDOW: usize = 3;

/// Polls × reads for the initial and the post-pre-close settled readings.
const SETTLED_SAMPLES: (u8, u8) = (5, 2);
/// Polls × reads for the final reading.
const FINAL_SAMPLES: (u8, u8) = (5, 5);

// ───────────────────────────────────────────────────────────────
// Public types
// ───────────────────────────────────────────────────────────────

/// What the gateway asks for.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeedRequest {
    /// Portion override (g). `None` or non-positive uses the configured default.
    pub portion_g: Option<f32>,
    pub source: CommandSource,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FeedPhase {
    Idle,
    /// Bowl already held food; waiting for the button or the deadline.
    CheckExisting { confirm_deadline_ms: u64 },
    /// Hatch open, polling the scale.
    OpenDispense { next_poll_ms: u64 },
    /// Hatch closed early; waiting for falling food to land.
    PreCloseSettle { settle_until_ms: u64 },
    /// Hatch reopened after a shortfall; polling resumes at `resume_ms`.
    RetryOpen { resume_ms: u64 },
    /// Hatch closed for good; final reading at `until_ms`.
    FinalSettle { until_ms: u64 },
    Complete,
}

/// How a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedOutcome {
    OnTarget,
    /// Retries exhausted below the completion factor.
    Shortfall,
    /// Excess guard tripped.
    Excess,
    /// Overall dispensing time limit hit.
    Timeout,
    /// Existing-food prompt expired without confirmation.
    Cancelled,
    /// Scale unavailable at start or after the recovery probe.
    SensorFault,
}

impl FeedOutcome {
    /// Whether food was (or may have been) dispensed as a normal session.
    pub fn is_completed(self) -> bool {
        !matches!(self, Self::Cancelled | Self::SensorFault)
    }
}

/// Accuracy band of a finished session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedQuality {
    Perfect,
    Under,
    Over,
    Ok,
}

impl FeedQuality {
    pub fn classify(accuracy_pct: f32) -> Self {
        if (95.0..=105.0).contains(&accuracy_pct) {
            Self::Perfect
        } else if accuracy_pct < 80.0 {
            Self::Under
        } else if accuracy_pct > 120.0 {
            Self::Over
        } else {
            Self::Ok
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            Self::Perfect => "Perfect portion!",
            Self::Under => "Underfed",
            Self::Over => "Overfed - adjust",
            Self::Ok => "Good enough",
        }
    }
}

/// Produced once per session.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedReport {
    pub initial_g: f32,
    pub final_g: f32,
    pub target_g: f32,
    pub dispensed_g: f32,
    pub accuracy_pct: f32,
    pub quality: FeedQuality,
    pub outcome: FeedOutcome,
    pub retries: u8,
    pub source: CommandSource,
}

// ───────────────────────────────────────────────────────────────
// Session
// ───────────────────────────────────────────────────────────────

/// Live state of one dispensing run. Never persisted.
#[derive(Debug, Clone, Copy)]
struct DispenseSession {
    initial_weight: f32,
    /// Portion asked for (g).
    target_g: f32,
    /// Absolute bowl weight at which the portion is complete.
    target_weight: f32,
    dispensed_weight: f32,
    retry_count: u8,
    pre_close_executed: bool,
    /// When the hatch first opened; the overall timeout counts from here.
    start_time_ms: Option<u64>,
    source: CommandSource,
    window: [f32; AVG_WINDOW],
    window_idx: usize,
    /// Most recent trustworthy bowl weight.
    last_weight: f32,
    outcome: Option<FeedOutcome>,
    /// Last countdown second shown on the prompt.
    prompt_secs: Option<u64>,
}

impl DispenseSession {
    fn new(initial_weight: f32, target_g: f32, source: CommandSource) -> Self {
        Self {
            initial_weight,
            target_g,
            target_weight: initial_weight + target_g,
            dispensed_weight: 0.0,
            retry_count: 0,
            pre_close_executed: false,
            start_time_ms: None,
            source,
            window: [initial_weight; AVG_WINDOW],
            window_idx: 0,
            last_weight: initial_weight,
            outcome: None,
            prompt_secs: None,
        }
    }

    fn push_sample(&mut self, grams: f32) -> f32 {
        self.window[self.window_idx] = grams;
        self.window_idx = (self.window_idx + 1) % AVG_WINDOW;
        self.window.iter().sum::<f32>() / AVG_WINDOW as f32
    }

    fn reseed(&mut self, grams: f32) {
        self.window = [grams; AVG_WINDOW];
        self.window_idx = 0;
    }

    fn dispensed_from(&self, weight: f32) -> f32 {
        (weight - self.initial_weight).max(0.0)
    }
}

// ───────────────────────────────────────────────────────────────
// Controller
// ───────────────────────────────────────────────────────────────

pub struct FeedController {
    cfg: FeederConfig,
    sampler: SensorSampler,
    phase: FeedPhase,
    session: Option<DispenseSession>,
}

impl FeedController {
    pub fn new(cfg: FeederConfig) -> Self {
        let sampler = SensorSampler::new(SamplerConfig::from_config(&cfg));
        Self {
            cfg,
            sampler,
            phase: FeedPhase::Idle,
            session: None,
        }
    }

    /// Swap in new tunables. A running session keeps its resolved target.
    pub fn set_config(&mut self, cfg: FeederConfig) {
        self.sampler = SensorSampler::new(SamplerConfig::from_config(&cfg));
        self.cfg = cfg;
    }

    pub fn phase(&self) -> FeedPhase {
        self.phase
    }

    /// A session is live (anything but `Idle`/`Complete`).
    pub fn is_active(&self) -> bool {
        !matches!(self.phase, FeedPhase::Idle | FeedPhase::Complete)
    }

    pub fn awaiting_confirmation(&self) -> bool {
        matches!(self.phase, FeedPhase::CheckExisting { .. })
    }

    pub fn retries(&self) -> u8 {
        self.session.map_or(0, |s| s.retry_count)
    }

    /// Dispensed so far in the live session (g).
    pub fn dispensed(&self) -> f32 {
        self.session.map_or(0.0, |s| s.dispensed_weight)
    }

    /// Portion a request resolves to, clamped to the configured range.
    pub fn resolve_portion(&self, portion_g: Option<f32>) -> f32 {
        let portion = match portion_g {
            Some(p) if p > 0.0 => p,
            _ => self.cfg.default_portion_g,
        };
        portion.clamp(self.cfg.min_portion_g, self.cfg.max_portion_g)
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Begin a session. Returns a report right away when the session ends
    /// before any actuation (scale not ready).
    pub fn start(
        &mut self,
        request: FeedRequest,
        now_ms: u64,
        hw: &mut impl Hardware,
        display: &mut impl DisplayPort,
    ) -> Option<FeedReport> {
        if self.is_active() {
            warn!("feed: start ignored, session already in {:?}", self.phase);
            return None;
        }

        display.show("Feeding time", "Checking scale");
        if !self.sampler.wait_ready(hw, self.cfg.scale_timeout_ms) {
            warn!("feed: scale not ready after {}ms", self.cfg.scale_timeout_ms);
            display.show("Error", "Scale not ready!");
            return Some(self.abort_before_open(0.0, request, FeedOutcome::SensorFault));
        }

        display.show("Feeding time", "Checking bowl...");
        let (samples, reads) = SETTLED_SAMPLES;
        let initial = match self.sampler.read_stable_weight(
            hw,
            samples,
            reads,
            self.cfg.stability_threshold_g,
        ) {
            Ok(w) => w.grams.max(0.0),
            Err(e) => {
                warn!("feed: initial weight unavailable ({})", e);
                display.show("Error", "Scale not ready!");
                return Some(self.abort_before_open(0.0, request, FeedOutcome::SensorFault));
            }
        };

        let target_g = self.resolve_portion(request.portion_g);
        self.session = Some(DispenseSession::new(initial, target_g, request.source));
        info!(
            "feed: start source={:?} W0={:.1}g target={:.1}g",
            request.source, initial, target_g
        );

        if initial >= self.cfg.existing_food_threshold_g {
            info!("feed: {:.1}g already in bowl, asking for confirmation", initial);
            display.show("Food detected!", &lcd_line(format_args!("Weight: {:.1}g", initial)));
            self.phase = FeedPhase::CheckExisting {
                confirm_deadline_ms: now_ms.max(hw.now_ms())
                    + u64::from(self.cfg.confirm_timeout_ms),
            };
            return None;
        }

        self.open_hatch(hw, display);
        None
    }

    /// Local button during the existing-food prompt: go ahead and dispense.
    pub fn confirm(&mut self, hw: &mut impl Hardware, display: &mut impl DisplayPort) -> bool {
        if !self.awaiting_confirmation() {
            return false;
        }
        info!("feed: existing food confirmed, continuing");
        display.show("Continuing...", "Adding more food");
        self.open_hatch(hw, display);
        true
    }

    /// Advance the session by one control tick.
    pub fn tick(
        &mut self,
        now_ms: u64,
        hw: &mut impl Hardware,
        display: &mut impl DisplayPort,
    ) -> Option<FeedReport> {
        let mut session = self.session?;
        let result = self.step(&mut session, now_ms, hw, display);
        if self.session.is_some() {
            self.session = Some(session);
        }
        result
    }

    /// Force the hatch closed and drop any session.
    pub fn abort(&mut self, hw: &mut impl Hardware) {
        hw.set_hatch(HatchPosition::Closed);
        if self.is_active() {
            warn!("feed: session aborted in {:?}", self.phase);
        }
        self.session = None;
        self.phase = FeedPhase::Idle;
    }

    // ── Internal ──────────────────────────────────────────────

    fn step(
        &mut self,
        s: &mut DispenseSession,
        now_ms: u64,
        hw: &mut impl Hardware,
        display: &mut impl DisplayPort,
    ) -> Option<FeedReport> {
        match self.phase {
            FeedPhase::Idle | FeedPhase::Complete => None,

            FeedPhase::CheckExisting {
                confirm_deadline_ms,
            } => {
                if now_ms >= confirm_deadline_ms {
                    info!("feed: prompt expired, cancelling");
                    display.show(
                        "Feeding canceled",
                        &lcd_line(format_args!("{:.1}g in bowl", s.initial_weight)),
                    );
                    let report = self.report(s, s.initial_weight, FeedOutcome::Cancelled);
                    self.finish();
                    return Some(report);
                }
                let secs_left = (confirm_deadline_ms - now_ms).div_ceil(1000);
                if s.prompt_secs != Some(secs_left) {
                    s.prompt_secs = Some(secs_left);
                    display.show(
                        "Food already in",
                        &lcd_line(format_args!("Btn:feed Wait:{}s", secs_left)),
                    );
                }
                None
            }

            FeedPhase::OpenDispense { next_poll_ms } => {
                if self.timed_out(s, now_ms) {
                    self.enter_final(s, FeedOutcome::Timeout, hw, display);
                    return None;
                }
                if now_ms < next_poll_ms {
                    return None;
                }
                self.poll(s, now_ms, hw, display);
                None
            }

            FeedPhase::PreCloseSettle { settle_until_ms } => {
                if self.timed_out(s, now_ms) {
                    self.enter_final(s, FeedOutcome::Timeout, hw, display);
                    return None;
                }
                if now_ms < settle_until_ms {
                    return None;
                }
                self.evaluate_settled(s, hw, display);
                None
            }

            FeedPhase::RetryOpen { resume_ms } => {
                if self.timed_out(s, now_ms) {
                    self.enter_final(s, FeedOutcome::Timeout, hw, display);
                    return None;
                }
                if now_ms >= resume_ms {
                    self.phase = FeedPhase::OpenDispense {
                        next_poll_ms: now_ms,
                    };
                }
                None
            }

            FeedPhase::FinalSettle { until_ms } => {
                if now_ms < until_ms {
                    return None;
                }
                hw.set_hatch(HatchPosition::Closed);
                display.show("Measuring final", "weight...");
                let (samples, reads) = FINAL_SAMPLES;
                let final_read = self.sampler.read_weight(hw, samples, reads);
                let final_g = if final_read.valid {
                    final_read.grams
                } else {
                    warn!(
                        "feed: final reading invalid, using last known {:.1}g",
                        s.last_weight
                    );
                    s.last_weight
                };
                let outcome = s.outcome.unwrap_or(FeedOutcome::OnTarget);
                let report = self.report(s, final_g, outcome);
                display.show(
                    &lcd_line(format_args!("Added: {:.1}g", report.dispensed_g)),
                    &lcd_line(format_args!(
                        "{:.0}% {}",
                        report.accuracy_pct,
                        report.quality.message()
                    )),
                );
                info!(
                    "feed: done outcome={:?} dispensed={:.1}g/{:.1}g ({:.0}%, {:?}) retries={}",
                    report.outcome,
                    report.dispensed_g,
                    report.target_g,
                    report.accuracy_pct,
                    report.quality,
                    report.retries
                );
                self.finish();
                Some(report)
            }
        }
    }

    /// One scale poll while the hatch is open.
    fn poll(
        &mut self,
        s: &mut DispenseSession,
        now_ms: u64,
        hw: &mut impl Hardware,
        display: &mut impl DisplayPort,
    ) {
        let mut sample = self.sampler.read_fast(hw);
        if !sample.valid {
            warn!(
                "feed: scale dropped out, probing for {}ms",
                self.cfg.recovery_probe_ms
            );
            if self.sampler.wait_ready(hw, self.cfg.recovery_probe_ms) {
                sample = self.sampler.read_fast(hw);
            }
        }
        if !sample.valid {
            warn!("feed: scale lost mid-session, closing hatch");
            display.show("Scale error!", "Closing hatch");
            self.enter_final(s, FeedOutcome::SensorFault, hw, display);
            return;
        }

        s.last_weight = sample.grams;
        let instantaneous = s.dispensed_from(sample.grams);
        let avg = s.push_sample(sample.grams);
        s.dispensed_weight = s.dispensed_from(avg);

        if instantaneous >= s.target_g * self.cfg.excess_factor {
            warn!(
                "feed: excess {:.1}g >= {:.1}g, force-closing",
                instantaneous,
                s.target_g * self.cfg.excess_factor
            );
            display.show("Warning!", "Excess food!");
            s.dispensed_weight = instantaneous;
            self.enter_final(s, FeedOutcome::Excess, hw, display);
            return;
        }

        if !s.pre_close_executed && s.dispensed_weight >= s.target_g * self.cfg.pre_close_factor {
            hw.set_hatch(HatchPosition::Closed);
            s.pre_close_executed = true;
            info!(
                "feed: pre-close at {:.1}g (avg {:.1}g of {:.1}g)",
                s.dispensed_weight, avg, s.target_weight
            );
            display.show("Almost there...", "Food settling");
            self.phase = FeedPhase::PreCloseSettle {
                settle_until_ms: hw.now_ms() + u64::from(self.cfg.settle_ms),
            };
            return;
        }

        let pct = (s.dispensed_weight / s.target_g * 100.0).clamp(0.0, 100.0);
        display.show(
            &lcd_line(format_args!("Feeding: {:.0}%", pct)),
            &lcd_line(format_args!("Target: {:.0}g", s.target_g)),
        );
        self.phase = FeedPhase::OpenDispense {
            next_poll_ms: now_ms + u64::from(self.cfg.weight_poll_interval_ms),
        };
    }

    /// Settle deadline reached after a pre-close.
    fn evaluate_settled(
        &mut self,
        s: &mut DispenseSession,
        hw: &mut impl Hardware,
        display: &mut impl DisplayPort,
    ) {
        let (samples, reads) = SETTLED_SAMPLES;
        let settled = self.sampler.read_weight(hw, samples, reads);
        let weight = if settled.valid {
            settled.grams
        } else {
            warn!("feed: settled reading invalid, using last known weight");
            s.last_weight
        };
        s.last_weight = weight;
        s.reseed(weight);
        s.dispensed_weight = s.dispensed_from(weight);

        if s.dispensed_weight >= s.target_g * self.cfg.complete_factor {
            display.show(
                "Target reached!",
                &lcd_line(format_args!("Dispensed: {:.1}g", s.dispensed_weight)),
            );
            self.enter_final(s, FeedOutcome::OnTarget, hw, display);
        } else if s.retry_count < self.cfg.max_retries {
            s.retry_count += 1;
            s.pre_close_executed = false;
            info!(
                "feed: short at {:.1}g of {:.1}g, retry #{}",
                s.dispensed_weight, s.target_g, s.retry_count
            );
            display.show("Need more food", &lcd_line(format_args!("Retry #{}", s.retry_count)));
            hw.set_hatch(HatchPosition::Open);
            self.phase = FeedPhase::RetryOpen {
                resume_ms: hw.now_ms() + u64::from(self.cfg.retry_open_ms),
            };
        } else {
            warn!(
                "feed: shortfall {:.1}g of {:.1}g after {} retries",
                s.dispensed_weight, s.target_g, s.retry_count
            );
            display.show(
                "Warning: Only",
                &lcd_line(format_args!("{:.1}g dispensed", s.dispensed_weight)),
            );
            self.enter_final(s, FeedOutcome::Shortfall, hw, display);
        }
    }

    fn open_hatch(&mut self, hw: &mut impl Hardware, display: &mut impl DisplayPort) {
        display.show("Starting feed", "Opening hatch...");
        hw.set_hatch(HatchPosition::Open);
        let opened = hw.now_ms();
        if let Some(s) = self.session.as_mut() {
            s.start_time_ms = Some(opened);
        }
        self.phase = FeedPhase::OpenDispense {
            next_poll_ms: opened + u64::from(self.cfg.hatch_motion_ms),
        };
    }

    /// Close the hatch and wait out the final settle.
    fn enter_final(
        &mut self,
        s: &mut DispenseSession,
        outcome: FeedOutcome,
        hw: &mut impl Hardware,
        _display: &mut impl DisplayPort,
    ) {
        hw.set_hatch(HatchPosition::Closed);
        if outcome == FeedOutcome::Timeout {
            warn!(
                "feed: timeout after {}ms, {:.1}g dispensed",
                self.cfg.max_feed_duration_ms, s.dispensed_weight
            );
        }
        s.outcome = Some(outcome);
        self.phase = FeedPhase::FinalSettle {
            until_ms: hw.now_ms() + u64::from(self.cfg.final_settle_ms),
        };
    }

    fn timed_out(&self, s: &DispenseSession, now_ms: u64) -> bool {
        s.start_time_ms.is_some_and(|start| {
            now_ms.saturating_sub(start) >= u64::from(self.cfg.max_feed_duration_ms)
        })
    }

    fn report(&self, s: &DispenseSession, final_g: f32, outcome: FeedOutcome) -> FeedReport {
        let dispensed_g = s.dispensed_from(final_g);
        let accuracy_pct = if s.target_g > 0.0 {
            dispensed_g / s.target_g * 100.0
        } else {
            0.0
        };
        FeedReport {
            initial_g: s.initial_weight,
            final_g,
            target_g: s.target_g,
            dispensed_g,
            accuracy_pct,
            quality: FeedQuality::classify(accuracy_pct),
            outcome,
            retries: s.retry_count,
            source: s.source,
        }
    }

    fn abort_before_open(
        &mut self,
        initial: f32,
        request: FeedRequest,
        outcome: FeedOutcome,
    ) -> FeedReport {
        let s = DispenseSession::new(initial, self.resolve_portion(request.portion_g), request.source);
        let report = self.report(&s, initial, outcome);
        self.finish();
        report
    }

    fn finish(&mut self) {
        self.session = None;
        self.phase = FeedPhase::Complete;
    }
}
