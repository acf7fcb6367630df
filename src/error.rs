//! Domain error types for the PetFeeder firmware.
//!
//! Sensor faults travel up from the drivers through [`SensorPort`]; command
//! rejections are turned into link replies by the gateway. Everything is
//! `Copy` so it passes through the controllers without allocation.
//!
//! [`SensorPort`]: crate::app::ports::SensorPort

use core::fmt;

use crate::app::events::ReplyStatus;

// ---------------------------------------------------------------------------
// Sensor errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    /// The load cell never raised its ready line within the bounded wait.
    NotReady,
    /// No ultrasonic ping returned an echo.
    NoEcho,
    /// Reading is outside the physically plausible range.
    OutOfRange,
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotReady => write!(f, "scale not ready"),
            Self::NoEcho => write!(f, "no echo"),
            Self::OutOfRange => write!(f, "reading out of range"),
        }
    }
}

// ---------------------------------------------------------------------------
// Command errors
// ---------------------------------------------------------------------------

/// Rejections produced by the command gateway. None of them change state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandError {
    /// Command name is not one the gateway dispatches.
    Unknown,
    /// Payload could not be parsed.
    Malformed,
    /// An actuation request arrived while a session is running.
    Busy,
}

impl CommandError {
    /// Reply status sent back on the link for this rejection.
    pub const fn status(self) -> ReplyStatus {
        match self {
            Self::Busy => ReplyStatus::Busy,
            Self::Unknown | Self::Malformed => ReplyStatus::Error,
        }
    }

    /// Reply `message` for this rejection.
    pub const fn reply_message(self) -> &'static str {
        match self {
            Self::Unknown => "Unknown command",
            Self::Malformed => "Invalid command payload",
            Self::Busy => "Device is busy",
        }
    }
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown => write!(f, "unknown command"),
            Self::Malformed => write!(f, "malformed payload"),
            Self::Busy => write!(f, "device busy"),
        }
    }
}
