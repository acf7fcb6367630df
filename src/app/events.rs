//! Outbound application events.
//!
//! The [`FeederService`](super::service::FeederService) emits these through
//! the [`EventSink`](super::ports::EventSink) port. Adapters on the other
//! side decide what to do with them: log to serial, write a JSON frame to
//! the relay server, or mirror into cloud properties.
//!
//! The serde representation is the link envelope itself:
//! `{"eventType": "<name>", "data": {...}}`.

use serde::Serialize;

use crate::app::commands::MAX_COMMAND_NAME;
use crate::control::feed::FeedReport;

/// Structured events emitted by the application core.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "eventType", content = "data")]
pub enum AppEvent {
    /// Sent once the link is up.
    #[serde(rename = "register")]
    Register(Registration),

    /// Ask the server for the stored settings.
    #[serde(rename = "getSettings")]
    GetSettings,

    /// Ask the server for the schedule list.
    #[serde(rename = "getSchedules")]
    GetSchedules,

    /// Reply to a `command` message.
    #[serde(rename = "commandResponse")]
    CommandResponse(CommandResponse),

    /// Status snapshot, on request and periodically.
    #[serde(rename = "device-status")]
    DeviceStatus(StatusReport),

    /// Notable occurrence for the server's activity log.
    #[serde(rename = "device-log")]
    DeviceLog(LogEntry),

    /// Full result of a dispensing session.
    #[serde(rename = "feeding-complete")]
    FeedingComplete(FeedReport),

    /// Water level after a passive check or a manual watering.
    #[serde(rename = "water-status")]
    WaterStatus(WaterStatus),
}

/// Payload of the `register` message.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub device_type: &'static str,
    pub version: &'static str,
    pub capabilities: &'static str,
}

impl Default for Registration {
    fn default() -> Self {
        Self {
            device_type: "feeder-device",
            version: env!("CARGO_PKG_VERSION"),
            capabilities: "feeding,water",
        }
    }
}

/// Reply status of a `commandResponse`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplyStatus {
    Executing,
    Completed,
    Failed,
    Busy,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandResponse {
    pub status: ReplyStatus,
    pub command: heapless::String<MAX_COMMAND_NAME>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub food_level: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub water_level: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dispensed: Option<f32>,
}

impl CommandResponse {
    /// Bare reply carrying only a status and the echoed command name.
    pub fn new(status: ReplyStatus, command: &str) -> Self {
        let mut name = heapless::String::new();
        for ch in command.chars() {
            if name.push(ch).is_err() {
                break;
            }
        }
        Self {
            status,
            command: name,
            message: None,
            food_level: None,
            water_level: None,
            dispensed: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// Payload of `device-status`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub busy: bool,
    pub feeding: bool,
    pub watering: bool,
    pub food_level: f32,
    pub water_level: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_feed_weight: Option<f32>,
}

/// `device-log` categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogKind {
    FeedingStart,
    FeedingComplete,
    WaterLow,
    WaterRefilled,
    WaterReady,
    SensorError,
    ScheduleSkipped,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogEntry {
    #[serde(rename = "type")]
    pub kind: LogKind,
    pub details: String,
    /// Unix seconds, or 0 before the wall clock is synced.
    pub timestamp: u64,
}

/// Coarse water state for `water-status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WaterCondition {
    Ok,
    Low,
    Refilling,
    Ready,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WaterStatus {
    pub status: WaterCondition,
    pub water_level: f32,
}
