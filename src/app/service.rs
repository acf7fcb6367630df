//! Application service: the command gateway.
//!
//! [`FeederService`] owns both controllers, the schedule and the device
//! context. Remote commands, the local button and schedule firings all come
//! through here, and only one actuation session may hold the busy flag at
//! a time. All I/O flows through port traits passed in at call sites.
//!
//! ```text
//!  RemoteLink ──▶ ┌──────────────────────────┐ ──▶ EventSink
//!  Button ──────▶ │      FeederService       │
//!  Schedule ────▶ │  FeedCtl · WaterCtl      │ ──▶ DisplayPort
//!                 └────────────┬─────────────┘
//!                              ▼
//!                   SensorPort · ActuatorPort
//! ```

use log::{info, warn};

use crate::config::FeederConfig;
use crate::error::CommandError;
use crate::control::feed::{FeedController, FeedReport, FeedRequest};
use crate::control::water::{WaterController, WaterEvent, WaterLevel};
use crate::scheduler::{self, FeedSchedule};

use super::commands::{AppCommand, CommandRequest, CommandSource, Inbound, SettingsUpdate};
use super::context::{ActiveSession, DeviceContext};
use super::events::{
    AppEvent, CommandResponse, LogEntry, LogKind, Registration, ReplyStatus, WaterCondition,
    WaterStatus,
};
use super::ports::{ConfigPort, DisplayPort, EventSink, Hardware};

/// Quiet period after the last settings change before it is persisted.
const AUTO_SAVE_DELAY_MS: u64 = 5_000;

// ───────────────────────────────────────────────────────────────
// FeederService
// ───────────────────────────────────────────────────────────────

pub struct FeederService {
    config: FeederConfig,
    ctx: DeviceContext,
    feed: FeedController,
    water: WaterController,
    schedule: FeedSchedule,
    /// Wall clock from the last tick, Unix seconds. `None` until synced.
    unix_secs: Option<u64>,
    last_status_ms: u64,
    config_dirty: bool,
    dirty_since_ms: u64,
}

impl FeederService {
    pub fn new(config: FeederConfig, now_ms: u64) -> Self {
        let feed = FeedController::new(config.clone());
        let water = WaterController::new(config.clone(), now_ms);
        let ctx = DeviceContext::new(water.level_percent());
        Self {
            config,
            ctx,
            feed,
            water,
            schedule: FeedSchedule::new(),
            unix_secs: None,
            last_status_ms: now_ms,
            config_dirty: false,
            dirty_since_ms: 0,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Announce the device once the remote link is up.
    pub fn on_link_up(&mut self, sink: &mut impl EventSink) {
        sink.emit(&AppEvent::Register(Registration::default()));
        sink.emit(&AppEvent::GetSettings);
        sink.emit(&AppEvent::GetSchedules);
        info!("Link up, registered and requested settings/schedules");
    }

    /// Drop every session and leave all actuators off.
    pub fn shutdown(&mut self, hw: &mut impl Hardware) {
        self.feed.abort(hw);
        self.water.stop(hw);
        hw.all_off();
        if let Some(active) = self.ctx.end() {
            warn!("Shutdown with {} in progress", active.command.name());
        }
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// One control-loop pass: advance both controllers, poll the schedule,
    /// and emit the periodic status.
    pub fn tick(
        &mut self,
        unix_secs: Option<u64>,
        hw: &mut impl Hardware,
        display: &mut impl DisplayPort,
        sink: &mut impl EventSink,
    ) {
        if unix_secs.is_some() {
            self.unix_secs = unix_secs;
        }
        let now = hw.now_ms();

        if let Some(report) = self.feed.tick(now, hw, display) {
            self.finish_feed(report, hw, sink);
        }

        let events = self.water.tick(hw.now_ms(), !self.ctx.is_busy(), hw);
        for event in events {
            self.on_water_event(event, sink);
        }

        if let Some(epoch_min) = self.local_epoch_min() {
            if self.schedule.poll(epoch_min) {
                self.on_schedule_fired(hw, display, sink);
            }
        }

        let now = hw.now_ms();
        let interval = u64::from(self.config.status_interval_secs) * 1000;
        if interval > 0 && now.saturating_sub(self.last_status_ms) >= interval {
            self.last_status_ms = now;
            sink.emit(&AppEvent::DeviceStatus(self.ctx.status_report()));
        }
    }

    // ── Inbound handling ──────────────────────────────────────

    pub fn handle_inbound(
        &mut self,
        inbound: Inbound,
        hw: &mut impl Hardware,
        display: &mut impl DisplayPort,
        sink: &mut impl EventSink,
    ) {
        match inbound {
            Inbound::Command(req) => self.handle_command(&req, hw, display, sink),
            Inbound::Schedules(wire) => {
                let entries = scheduler::parse_entries(&wire);
                self.schedule.replace(&entries, self.local_epoch_min());
            }
            Inbound::Settings(update) => self.apply_settings(update, hw.now_ms()),
        }
    }

    /// Dispatch one command request.
    pub fn handle_command(
        &mut self,
        req: &CommandRequest,
        hw: &mut impl Hardware,
        display: &mut impl DisplayPort,
        sink: &mut impl EventSink,
    ) {
        let cmd = match AppCommand::from_request(req) {
            Ok(cmd) => cmd,
            Err(e) => {
                warn!("Rejected command {:?}: {}", req.command.as_str(), e);
                sink.emit(&AppEvent::CommandResponse(
                    CommandResponse::new(e.status(), &req.command).with_message(e.reply_message()),
                ));
                return;
            }
        };

        if !cmd.is_actuation() {
            sink.emit(&AppEvent::DeviceStatus(self.ctx.status_report()));
            sink.emit(&AppEvent::CommandResponse(CommandResponse::new(
                ReplyStatus::Completed,
                cmd.name(),
            )));
            return;
        }

        let session = ActiveSession {
            command: cmd,
            source: req.source,
            started_ms: hw.now_ms(),
        };
        if !self.ctx.begin(session) {
            info!(
                "Busy with {:?}, rejecting {}",
                self.ctx.active().map(|a| a.command.name()),
                cmd.name()
            );
            sink.emit(&AppEvent::CommandResponse(
                CommandResponse::new(CommandError::Busy.status(), cmd.name())
                    .with_message(CommandError::Busy.reply_message()),
            ));
            return;
        }

        sink.emit(&AppEvent::CommandResponse(CommandResponse::new(
            ReplyStatus::Executing,
            cmd.name(),
        )));

        match cmd {
            AppCommand::Feed { portion_g } => {
                let detail = match req.source {
                    CommandSource::Schedule => "Scheduled feeding initiated",
                    CommandSource::Button => "Button feeding initiated",
                    _ => "Manual feeding initiated",
                };
                self.log(sink, LogKind::FeedingStart, detail);
                let request = FeedRequest {
                    portion_g,
                    source: req.source,
                };
                let now = hw.now_ms();
                if let Some(report) = self.feed.start(request, now, hw, display) {
                    self.finish_feed(report, hw, sink);
                }
            }
            AppCommand::Water {
                volume_ml,
                duration_secs,
            } => {
                let ms = self.water.manual_duration_ms(volume_ml, duration_secs);
                display.show("Watering", &crate::control::lcd_line(format_args!("{}s", ms / 1000)));
                self.start_manual_water(cmd, ms, hw, sink);
            }
            AppCommand::TestWater => {
                display.show("Pump test", "Running...");
                self.start_manual_water(cmd, self.config.test_water_ms, hw, sink);
            }
            AppCommand::GetStatus => {}
        }
    }

    /// Local button release.
    pub fn on_button(
        &mut self,
        hw: &mut impl Hardware,
        display: &mut impl DisplayPort,
        sink: &mut impl EventSink,
    ) {
        if self.feed.confirm(hw, display) {
            return;
        }
        let req = CommandRequest::named("feed", CommandSource::Button);
        self.handle_command(&req, hw, display, sink);
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn context(&self) -> &DeviceContext {
        &self.ctx
    }

    pub fn is_busy(&self) -> bool {
        self.ctx.is_busy()
    }

    pub fn feed_controller(&self) -> &FeedController {
        &self.feed
    }

    pub fn water_controller(&self) -> &WaterController {
        &self.water
    }

    pub fn schedule(&self) -> &FeedSchedule {
        &self.schedule
    }

    pub fn config(&self) -> &FeederConfig {
        &self.config
    }

    // ── Config dirty-flag management ──────────────────────────

    pub fn is_config_dirty(&self) -> bool {
        self.config_dirty
    }

    /// Persist the config once it has been unchanged for 5 s.
    /// Returns `true` if the config was saved.
    pub fn auto_save_if_needed(&mut self, now_ms: u64, storage: &impl ConfigPort) -> bool {
        if !self.config_dirty || now_ms.saturating_sub(self.dirty_since_ms) < AUTO_SAVE_DELAY_MS
        {
            return false;
        }
        match storage.save(&self.config) {
            Ok(()) => {
                self.config_dirty = false;
                info!("Config auto-saved");
                true
            }
            Err(e) => {
                warn!("Config auto-save failed: {}", e);
                false
            }
        }
    }

    // ── Internal ──────────────────────────────────────────────

    fn start_manual_water(
        &mut self,
        cmd: AppCommand,
        ms: u32,
        hw: &mut impl Hardware,
        sink: &mut impl EventSink,
    ) {
        if !self.water.start_manual(ms, hw) {
            self.ctx.end();
            sink.emit(&AppEvent::CommandResponse(
                CommandResponse::new(ReplyStatus::Failed, cmd.name())
                    .with_message("Pump already running"),
            ));
        }
    }

    fn finish_feed(&mut self, report: FeedReport, hw: &mut impl Hardware, sink: &mut impl EventSink) {
        self.ctx
            .record_feed(report.dispensed_g, self.config.hopper_capacity_g);
        if let Some(level) = self.water.measure(hw) {
            self.ctx.set_water_level(level.percent);
        }

        let status = if report.outcome.is_completed() {
            ReplyStatus::Completed
        } else {
            ReplyStatus::Failed
        };
        let mut reply = CommandResponse::new(status, "feed");
        reply.food_level = Some(self.ctx.food_level());
        reply.water_level = Some(self.ctx.water_level());
        reply.dispensed = Some(report.dispensed_g);
        if status == ReplyStatus::Failed {
            reply.message = Some(format!("{:?}", report.outcome).to_lowercase());
        }

        sink.emit(&AppEvent::FeedingComplete(report));
        self.log(
            sink,
            LogKind::FeedingComplete,
            &format!(
                "{:.1}g dispensed, food: {:.0}%, water: {:.0}%",
                report.dispensed_g,
                self.ctx.food_level(),
                self.ctx.water_level()
            ),
        );
        sink.emit(&AppEvent::CommandResponse(reply));
        self.ctx.end();
    }

    fn finish_water(&mut self, level: Option<WaterLevel>, sink: &mut impl EventSink) {
        if let Some(l) = level {
            self.ctx.set_water_level(l.percent);
        }
        if !self.ctx.is_watering() {
            return;
        }
        let Some(active) = self.ctx.active() else {
            return;
        };
        let mut reply = CommandResponse::new(ReplyStatus::Completed, active.command.name());
        reply.food_level = Some(self.ctx.food_level());
        reply.water_level = Some(self.ctx.water_level());
        if level.is_none() {
            reply.message = Some("Water level unreadable".into());
        }
        sink.emit(&AppEvent::WaterStatus(WaterStatus {
            status: WaterCondition::Ok,
            water_level: self.ctx.water_level(),
        }));
        sink.emit(&AppEvent::CommandResponse(reply));
        self.ctx.end();
    }

    fn on_water_event(&mut self, event: WaterEvent, sink: &mut impl EventSink) {
        match event {
            WaterEvent::SensorError { distance_cm } => {
                self.log(
                    sink,
                    LogKind::SensorError,
                    &format!("Water sensor out of range: {:.1}cm", distance_cm),
                );
            }
            WaterEvent::LevelOk(level) => {
                self.ctx.set_water_level(level.percent);
            }
            WaterEvent::RefillStarted(level) => {
                self.ctx.set_water_level(level.percent);
                self.log(
                    sink,
                    LogKind::WaterLow,
                    &format!("Water low ({:.0}%), refilling", level.percent),
                );
                sink.emit(&AppEvent::WaterStatus(WaterStatus {
                    status: WaterCondition::Low,
                    water_level: level.percent,
                }));
                sink.emit(&AppEvent::WaterStatus(WaterStatus {
                    status: WaterCondition::Refilling,
                    water_level: level.percent,
                }));
            }
            WaterEvent::RefillComplete => {
                self.log(sink, LogKind::WaterRefilled, "Water bowl refilled");
            }
            WaterEvent::Ready => {
                self.log(sink, LogKind::WaterReady, "Water system ready");
                sink.emit(&AppEvent::WaterStatus(WaterStatus {
                    status: WaterCondition::Ready,
                    water_level: self.ctx.water_level(),
                }));
            }
            WaterEvent::ManualComplete(level) => self.finish_water(level, sink),
        }
    }

    fn on_schedule_fired(
        &mut self,
        hw: &mut impl Hardware,
        display: &mut impl DisplayPort,
        sink: &mut impl EventSink,
    ) {
        if self.ctx.is_busy() {
            warn!("Scheduled feeding skipped, device busy");
            self.log(
                sink,
                LogKind::ScheduleSkipped,
                "Scheduled feeding skipped: device busy",
            );
            return;
        }
        info!("Scheduled feeding due");
        let req = CommandRequest::named("feed", CommandSource::Schedule);
        self.handle_command(&req, hw, display, sink);
    }

    fn apply_settings(&mut self, update: SettingsUpdate, now_ms: u64) {
        let mut next = self.config.clone();
        if let Some(p) = update.portion_size.filter(|p| *p > 0.0) {
            next.default_portion_g = p;
        }
        if let Some(ml) = update.water_amount.filter(|ml| *ml > 0) {
            next.default_water_ml = ml;
        }
        if let Err(e) = next.validate() {
            warn!("Settings rejected: {}", e);
            return;
        }
        info!(
            "Settings updated: portion={:.0}g water={}mL",
            next.default_portion_g, next.default_water_ml
        );
        self.feed.set_config(next.clone());
        self.water.set_config(next.clone());
        self.config = next;
        self.config_dirty = true;
        self.dirty_since_ms = now_ms;
    }

    fn log(&self, sink: &mut impl EventSink, kind: LogKind, details: &str) {
        sink.emit(&AppEvent::DeviceLog(LogEntry {
            kind,
            details: details.into(),
            timestamp: self.unix_secs.unwrap_or(0),
        }));
    }

    /// Local wall-clock minutes since the epoch.
    fn local_epoch_min(&self) -> Option<u64> {
        let secs = i64::try_from(self.unix_secs?).ok()?;
        let local = secs.checked_add(i64::from(self.config.utc_offset_secs))?;
        u64::try_from(local / 60).ok()
    }
}
