//! Port traits — the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ FeederService (domain)
//! ```
//!
//! Driven adapters (scale, ultrasonic, hatch, pump, display, event sinks,
//! storage, remote links) implement these traits. The
//! [`FeederService`](super::service::FeederService) and the controllers
//! consume them via generics, so the domain core never touches hardware
//! directly.

use embedded_hal::delay::DelayNs;

use crate::config::FeederConfig;
use crate::error::SensorError;

use super::commands::Inbound;
use super::events::AppEvent;

// ───────────────────────────────────────────────────────────────
// Sensor port (driven adapter: hardware → domain)
// ───────────────────────────────────────────────────────────────

/// Raw sensor access. Filtering lives in [`SensorSampler`](crate::sensors::sampler::SensorSampler).
pub trait SensorPort {
    /// Whether the load cell has a conversion ready right now.
    fn scale_ready(&mut self) -> bool;

    /// Average of `reads` raw conversions, tared and calibrated to grams.
    /// Each conversion waits (bounded) for the ready line itself.
    fn read_scale(&mut self, reads: u8) -> Result<f32, SensorError>;

    /// One ultrasonic ping, in cm.
    fn ping_cm(&mut self) -> Result<f32, SensorError>;
}

// ───────────────────────────────────────────────────────────────
// Actuator port (driven adapter: domain → hardware)
// ───────────────────────────────────────────────────────────────

/// Hatch servo position. Only the two end stops are ever commanded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HatchPosition {
    Open,
    Closed,
}

/// Write-side port: the domain calls this to command actuators.
pub trait ActuatorPort {
    /// Drive the hatch servo to an end stop.
    fn set_hatch(&mut self, position: HatchPosition);

    /// Last commanded hatch position.
    fn hatch(&self) -> HatchPosition;

    /// Energise or release the pump relay.
    fn set_pump(&mut self, on: bool);

    /// Whether the pump relay is energised.
    fn pump_on(&self) -> bool;

    /// Close the hatch and stop the pump.
    fn all_off(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Clock port
// ───────────────────────────────────────────────────────────────

/// Monotonic milliseconds since boot.
///
/// Deadlines armed right after an actuation are stamped with a fresh read
/// of this clock, so time spent inside bounded sensor reads is never
/// counted as settle or motion time.
pub trait Clock {
    fn now_ms(&self) -> u64;
}

/// Everything a controller touches in one tick: raw sensors, actuators,
/// bounded delays, and the monotonic clock.
pub trait Hardware: SensorPort + ActuatorPort + DelayNs + Clock {}

impl<T: SensorPort + ActuatorPort + DelayNs + Clock> Hardware for T {}

// ───────────────────────────────────────────────────────────────
// Display port
// ───────────────────────────────────────────────────────────────

/// Two-line text display. Rendering details belong to the adapter.
pub trait DisplayPort {
    fn show(&mut self, line1: &str, line2: &str);
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → link / logging)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`]s through this port.
/// Adapters decide where they go (serial log, JSON link, cloud properties).
pub trait EventSink {
    fn emit(&mut self, event: &AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Remote link port (driving adapter: network → domain)
// ───────────────────────────────────────────────────────────────

/// Inbound side of a remote transport.
///
/// Implementations never block; `None` means nothing is pending this tick.
pub trait RemoteLink {
    fn receive(&mut self) -> Option<Inbound>;
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: domain ↔ persistent config)
// ───────────────────────────────────────────────────────────────

/// Loads and persists system configuration.
///
/// Implementations MUST validate config values before persisting.
/// Invalid ranges are rejected with [`ConfigError::ValidationFailed`],
/// not silently clamped.
pub trait ConfigPort {
    /// Load configuration from persistent storage.
    /// Returns [`FeederConfig::default()`] if no stored config exists.
    fn load(&self) -> Result<FeederConfig, ConfigError>;

    /// Validate and persist configuration.
    fn save(&self, config: &FeederConfig) -> Result<(), ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`ConfigPort`] operations.
#[derive(Debug)]
pub enum ConfigError {
    /// No config found in storage (first boot).
    NotFound,
    /// Stored config failed deserialization.
    Corrupted,
    /// A config field failed range validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
    /// Underlying storage is full.
    StorageFull,
    /// Generic I/O error from the storage backend.
    IoError,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "config not found"),
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::StorageFull => write!(f, "storage full"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Fan-out
// ───────────────────────────────────────────────────────────────

impl<T: EventSink + ?Sized> EventSink for &mut T {
    fn emit(&mut self, event: &AppEvent) {
        (**self).emit(event);
    }
}

/// Emit to both sinks, first to second.
impl<A: EventSink, B: EventSink> EventSink for (A, B) {
    fn emit(&mut self, event: &AppEvent) {
        self.0.emit(event);
        self.1.emit(event);
    }
}

impl<T: DisplayPort + ?Sized> DisplayPort for &mut T {
    fn show(&mut self, line1: &str, line2: &str) {
        (**self).show(line1, line2);
    }
}
