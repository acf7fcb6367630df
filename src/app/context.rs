//! Device context: status flags and last-known sensor values.
//!
//! Owned by [`FeederService`](super::service::FeederService). The controller
//! running the current session is the only writer of the flags; everything
//! else reads them through accessors.

use super::commands::{AppCommand, CommandSource};
use super::events::StatusReport;

/// Command currently holding the busy flag.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActiveSession {
    pub command: AppCommand,
    pub source: CommandSource,
    pub started_ms: u64,
}

#[derive(Debug, Clone, Default)]
pub struct DeviceContext {
    active: Option<ActiveSession>,
    /// Estimated hopper level (%).
    food_level: f32,
    /// Last water level (%).
    water_level: f32,
    last_feed_weight: Option<f32>,
}

impl DeviceContext {
    pub fn new(water_level: f32) -> Self {
        Self {
            active: None,
            food_level: 100.0,
            water_level,
            last_feed_weight: None,
        }
    }

    pub fn is_busy(&self) -> bool {
        self.active.is_some()
    }

    pub fn is_feeding(&self) -> bool {
        matches!(
            self.active,
            Some(ActiveSession {
                command: AppCommand::Feed { .. },
                ..
            })
        )
    }

    pub fn is_watering(&self) -> bool {
        matches!(
            self.active,
            Some(ActiveSession {
                command: AppCommand::Water { .. } | AppCommand::TestWater,
                ..
            })
        )
    }

    pub fn active(&self) -> Option<ActiveSession> {
        self.active
    }

    /// Take the busy flag. Fails if a session already holds it.
    pub fn begin(&mut self, session: ActiveSession) -> bool {
        if self.active.is_some() {
            return false;
        }
        self.active = Some(session);
        true
    }

    /// Release the busy flag, returning the session that held it.
    pub fn end(&mut self) -> Option<ActiveSession> {
        self.active.take()
    }

    pub fn food_level(&self) -> f32 {
        self.food_level
    }

    pub fn water_level(&self) -> f32 {
        self.water_level
    }

    pub fn last_feed_weight(&self) -> Option<f32> {
        self.last_feed_weight
    }

    /// Record a finished feed and re-estimate the hopper level from it.
    pub fn record_feed(&mut self, dispensed_g: f32, hopper_capacity_g: f32) {
        let dispensed_g = dispensed_g.max(0.0);
        self.last_feed_weight = Some(dispensed_g);
        self.food_level = if hopper_capacity_g > 0.0 {
            ((hopper_capacity_g - dispensed_g) / hopper_capacity_g * 100.0).clamp(0.0, 100.0)
        } else {
            0.0
        };
    }

    pub fn set_water_level(&mut self, percent: f32) {
        self.water_level = percent.clamp(0.0, 100.0);
    }

    pub fn status_report(&self) -> StatusReport {
        StatusReport {
            busy: self.is_busy(),
            feeding: self.is_feeding(),
            watering: self.is_watering(),
            food_level: self.food_level,
            water_level: self.water_level,
            last_feed_weight: self.last_feed_weight,
        }
    }
}
