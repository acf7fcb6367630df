//! Mock hardware adapter for integration tests.
//!
//! Records every actuator call and runs a simulated millisecond clock that
//! only moves when the code under test delays or a test advances it. The
//! bowl weight comes either from a script or from a small physical model
//! (food flows while the hatch is open and lands after a fall delay).

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;

use embedded_hal::delay::DelayNs;
use petfeeder::app::events::{AppEvent, CommandResponse, LogKind};
use petfeeder::app::ports::{
    ActuatorPort, Clock, ConfigError, ConfigPort, DisplayPort, EventSink, HatchPosition,
    SensorPort,
};
use petfeeder::app::service::FeederService;
use petfeeder::config::FeederConfig;
use petfeeder::error::SensorError;

// ── Actuator call record ──────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum ActuatorCall {
    SetHatch(HatchPosition),
    SetPump(bool),
    AllOff,
}

// ── Bowl model ────────────────────────────────────────────────

/// Where bowl weights come from.
pub enum BowlModel {
    /// Each read pops the next value; the last one repeats.
    Script { queue: VecDeque<f32>, last: f32 },
    /// Food leaves the hopper at `rate_g_per_s` while the hatch is open and
    /// lands `lag_ms` later.
    Flow {
        bowl_g: f32,
        hopper_g: f32,
        rate_g_per_s: f32,
        lag_ms: u64,
        in_flight: VecDeque<(u64, f32)>,
    },
}

// ── MockHardware ──────────────────────────────────────────────

pub struct MockHardware {
    pub calls: Vec<ActuatorCall>,
    pub now_ms: u64,
    pub scale_ready: bool,
    /// Distance every ping returns. `None` means no echo.
    pub distance_cm: Option<f32>,
    pub bowl: BowlModel,
    hatch: HatchPosition,
    pump: bool,
    pump_starts: usize,
    pending_ns: u64,
}

#[allow(dead_code)]
impl MockHardware {
    /// Empty bowl, plenty of food, water at the full mark.
    pub fn new() -> Self {
        Self::with_flow(0.0, 1_000.0, 20.0, 300)
    }

    pub fn with_flow(bowl_g: f32, hopper_g: f32, rate_g_per_s: f32, lag_ms: u64) -> Self {
        Self {
            calls: Vec::new(),
            now_ms: 1_000,
            scale_ready: true,
            distance_cm: Some(16.0),
            bowl: BowlModel::Flow {
                bowl_g,
                hopper_g,
                rate_g_per_s,
                lag_ms,
                in_flight: VecDeque::new(),
            },
            hatch: HatchPosition::Closed,
            pump: false,
            pump_starts: 0,
            pending_ns: 0,
        }
    }

    pub fn with_script(weights: &[f32]) -> Self {
        let mut hw = Self::new();
        hw.bowl = BowlModel::Script {
            queue: weights.iter().copied().collect(),
            last: weights.last().copied().unwrap_or(0.0),
        };
        hw
    }

    /// Move the simulated clock, running the flow model as it goes.
    pub fn advance(&mut self, ms: u64) {
        if ms == 0 {
            return;
        }
        self.now_ms += ms;
        let now = self.now_ms;
        let open = self.hatch == HatchPosition::Open;
        if let BowlModel::Flow {
            bowl_g,
            hopper_g,
            rate_g_per_s,
            lag_ms,
            in_flight,
        } = &mut self.bowl
        {
            if open {
                let amount = (*rate_g_per_s * ms as f32 / 1000.0).min(*hopper_g);
                if amount > 0.0 {
                    *hopper_g -= amount;
                    in_flight.push_back((now + *lag_ms, amount));
                }
            }
            while let Some(&(lands_at, grams)) = in_flight.front() {
                if lands_at > now {
                    break;
                }
                *bowl_g += grams;
                in_flight.pop_front();
            }
        }
    }

    pub fn hatch_opens(&self) -> usize {
        self.calls
            .iter()
            .filter(|c| **c == ActuatorCall::SetHatch(HatchPosition::Open))
            .count()
    }

    /// Off-to-on pump transitions.
    pub fn pump_starts(&self) -> usize {
        self.pump_starts
    }

    pub fn last_call(&self) -> Option<&ActuatorCall> {
        self.calls.last()
    }
}

impl Default for MockHardware {
    fn default() -> Self {
        Self::new()
    }
}

impl ActuatorPort for MockHardware {
    fn set_hatch(&mut self, position: HatchPosition) {
        self.calls.push(ActuatorCall::SetHatch(position));
        self.hatch = position;
    }

    fn hatch(&self) -> HatchPosition {
        self.hatch
    }

    fn set_pump(&mut self, on: bool) {
        self.calls.push(ActuatorCall::SetPump(on));
        if on && !self.pump {
            self.pump_starts += 1;
        }
        self.pump = on;
    }

    fn pump_on(&self) -> bool {
        self.pump
    }

    fn all_off(&mut self) {
        self.calls.push(ActuatorCall::AllOff);
        self.hatch = HatchPosition::Closed;
        self.pump = false;
    }
}

// ── SensorPort for MockHardware ──────────────────────────────

impl SensorPort for MockHardware {
    fn scale_ready(&mut self) -> bool {
        self.scale_ready
    }

    fn read_scale(&mut self, _reads: u8) -> Result<f32, SensorError> {
        if !self.scale_ready {
            return Err(SensorError::NotReady);
        }
        Ok(match &mut self.bowl {
            BowlModel::Script { queue, last } => {
                if let Some(w) = queue.pop_front() {
                    *last = w;
                }
                *last
            }
            BowlModel::Flow { bowl_g, .. } => *bowl_g,
        })
    }

    fn ping_cm(&mut self) -> Result<f32, SensorError> {
        self.distance_cm.ok_or(SensorError::NoEcho)
    }
}

impl DelayNs for MockHardware {
    fn delay_ns(&mut self, ns: u32) {
        self.pending_ns += u64::from(ns);
        let ms = self.pending_ns / 1_000_000;
        self.pending_ns %= 1_000_000;
        self.advance(ms);
    }
}

impl Clock for MockHardware {
    fn now_ms(&self) -> u64 {
        self.now_ms
    }
}

// ── Display ───────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingDisplay {
    pub frames: Vec<(String, String)>,
}

#[allow(dead_code)]
impl RecordingDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn showed(&self, line1: &str) -> bool {
        self.frames.iter().any(|(l1, _)| l1 == line1)
    }
}

impl DisplayPort for RecordingDisplay {
    fn show(&mut self, line1: &str, line2: &str) {
        self.frames.push((line1.to_owned(), line2.to_owned()));
    }
}

// ── Event sink ────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replies(&self) -> Vec<&CommandResponse> {
        self.events
            .iter()
            .filter_map(|e| match e {
                AppEvent::CommandResponse(r) => Some(r),
                _ => None,
            })
            .collect()
    }

    pub fn logs(&self, kind: LogKind) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, AppEvent::DeviceLog(l) if l.kind == kind))
            .count()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}

// ── MockNvs ───────────────────────────────────────────────────

#[derive(Default)]
pub struct MockNvs {
    pub stored: RefCell<Option<FeederConfig>>,
    pub saves: Cell<u32>,
}

#[allow(dead_code)]
impl MockNvs {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ConfigPort for MockNvs {
    fn load(&self) -> Result<FeederConfig, ConfigError> {
        Ok(self.stored.borrow().clone().unwrap_or_default())
    }

    fn save(&self, config: &FeederConfig) -> Result<(), ConfigError> {
        config.validate()?;
        *self.stored.borrow_mut() = Some(config.clone());
        self.saves.set(self.saves.get() + 1);
        Ok(())
    }
}

// ── Rig: service + mocks, stepped like the control loop ──────

pub struct Rig {
    pub app: FeederService,
    pub hw: MockHardware,
    pub display: RecordingDisplay,
    pub sink: RecordingSink,
    /// Unix seconds at simulated time zero. `None` keeps the clock unsynced.
    pub wall_base: Option<u64>,
}

#[allow(dead_code)]
impl Rig {
    pub fn new(hw: MockHardware) -> Self {
        Self::with_config(FeederConfig::default(), hw)
    }

    pub fn with_config(config: FeederConfig, hw: MockHardware) -> Self {
        let app = FeederService::new(config, hw.now_ms);
        Self {
            app,
            hw,
            display: RecordingDisplay::new(),
            sink: RecordingSink::new(),
            wall_base: None,
        }
    }

    /// One control-loop pass after `ms` of simulated time.
    pub fn step(&mut self, ms: u64) {
        self.hw.advance(ms);
        let unix = self.unix_secs();
        self.app
            .tick(unix, &mut self.hw, &mut self.display, &mut self.sink);
    }

    pub fn unix_secs(&self) -> Option<u64> {
        self.wall_base.map(|base| base + self.hw.now_ms / 1000)
    }

    /// Sync the wall clock so that it reads `unix_secs` right now.
    pub fn set_wall_clock(&mut self, unix_secs: u64) {
        self.wall_base = Some(unix_secs - self.hw.now_ms / 1000);
    }

    /// Step at the loop interval for up to `max_ms`. Returns `true` once idle.
    pub fn run_until_idle(&mut self, max_ms: u64) -> bool {
        let deadline = self.hw.now_ms + max_ms;
        while self.hw.now_ms < deadline {
            self.step(50);
            if !self.app.is_busy() {
                return true;
            }
        }
        false
    }

    pub fn run_for(&mut self, ms: u64) {
        let until = self.hw.now_ms + ms;
        while self.hw.now_ms < until {
            self.step(50);
        }
    }

    pub fn command(&mut self, req: &petfeeder::app::commands::CommandRequest) {
        self.app
            .handle_command(req, &mut self.hw, &mut self.display, &mut self.sink);
    }

    pub fn inbound(&mut self, msg: petfeeder::app::commands::Inbound) {
        self.app
            .handle_inbound(msg, &mut self.hw, &mut self.display, &mut self.sink);
    }

    pub fn button(&mut self) {
        self.app
            .on_button(&mut self.hw, &mut self.display, &mut self.sink);
    }
}
