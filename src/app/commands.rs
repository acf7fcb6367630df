//! Inbound requests to the application service.
//!
//! Remote links decode their wire format into [`Inbound`]; the
//! [`FeederService`](super::service::FeederService) turns a
//! [`CommandRequest`] into a typed [`AppCommand`] before acting on it.

use serde::Deserialize;

use crate::error::CommandError;

/// Longest command name kept from the wire. Longer names are unknown by
/// construction.
pub const MAX_COMMAND_NAME: usize = 24;

/// Who asked for an operation. Carried through to reports and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CommandSource {
    /// JSON link (dashboard relay server).
    #[default]
    Remote,
    /// Cloud-property trigger.
    Cloud,
    /// Local push button.
    Button,
    /// Schedule firing.
    Schedule,
}

/// A `command` message as it arrives on the wire.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandRequest {
    pub command: heapless::String<MAX_COMMAND_NAME>,
    #[serde(default)]
    pub portion_size: Option<f32>,
    #[serde(default)]
    pub water_amount: Option<u16>,
    /// Manual watering duration in seconds. Overrides `water_amount`.
    #[serde(default)]
    pub duration: Option<u16>,
    #[serde(skip)]
    pub source: CommandSource,
    /// Set by a link when the payload could not be taken as sent. The
    /// gateway answers with this error instead of dispatching.
    #[serde(skip)]
    pub rejection: Option<CommandError>,
}

impl CommandRequest {
    /// Request with only a name set. Unknown names are truncated.
    pub fn named(name: &str, source: CommandSource) -> Self {
        let mut command = heapless::String::new();
        for ch in name.chars() {
            if command.push(ch).is_err() {
                break;
            }
        }
        Self {
            command,
            source,
            ..Self::default()
        }
    }
}

/// One schedule entry as the server sends it.
#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleWire {
    pub time: String,
    #[serde(default)]
    pub enabled: bool,
}

/// Partial settings update.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsUpdate {
    #[serde(default)]
    pub portion_size: Option<f32>,
    #[serde(default)]
    pub water_amount: Option<u16>,
}

/// Everything a remote link can hand to the service.
#[derive(Debug, Clone)]
pub enum Inbound {
    Command(CommandRequest),
    Schedules(Vec<ScheduleWire>),
    Settings(SettingsUpdate),
}

/// Validated command the gateway dispatches to a controller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AppCommand {
    /// Dispense food. `None` or a non-positive portion uses the configured default.
    Feed { portion_g: Option<f32> },
    /// One-shot manual watering.
    Water {
        volume_ml: Option<u16>,
        duration_secs: Option<u16>,
    },
    /// Short pump pulse followed by a level report.
    TestWater,
    /// Reply with a `device-status` message.
    GetStatus,
}

impl AppCommand {
    /// Map a wire request onto a command, rejecting unknown names.
    pub fn from_request(req: &CommandRequest) -> Result<Self, CommandError> {
        if let Some(e) = req.rejection {
            return Err(e);
        }
        match req.command.as_str() {
            "feed" => Ok(Self::Feed {
                portion_g: req.portion_size,
            }),
            "water" => Ok(Self::Water {
                volume_ml: req.water_amount,
                duration_secs: req.duration,
            }),
            "test-water" => Ok(Self::TestWater),
            "get-status" => Ok(Self::GetStatus),
            _ => Err(CommandError::Unknown),
        }
    }

    /// Wire name, echoed back in replies.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Feed { .. } => "feed",
            Self::Water { .. } => "water",
            Self::TestWater => "test-water",
            Self::GetStatus => "get-status",
        }
    }

    /// Whether this command moves an actuator (and is therefore gated by busy).
    pub fn is_actuation(&self) -> bool {
        !matches!(self, Self::GetStatus)
    }
}
