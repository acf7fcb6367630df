//! Cloud-property adapter.
//!
//! The cloud dashboard exposes a handful of synced properties instead of a
//! message stream: two momentary triggers plus the amounts they use, and
//! read-only mirrors of the device state. This adapter maps trigger edges to
//! [`Inbound`] commands and mirrors outbound events back into properties.
//! Whatever binds the properties to the cloud service owns the sync; this
//! side only reads and writes [`CloudProperties`].

use log::info;

use crate::app::commands::{CommandRequest, CommandSource, Inbound};
use crate::app::events::{AppEvent, ReplyStatus};
use crate::app::ports::{EventSink, RemoteLink};

/// Synced property set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CloudProperties {
    /// Momentary "feed now" switch. Cleared once consumed.
    pub feed_now: bool,
    /// Momentary "water now" switch. Cleared once consumed.
    pub water_now: bool,
    /// Portion for `feed_now` (g); `0` uses the device default.
    pub portion_size: i32,
    /// Volume for `water_now` (mL); `0` uses the device default.
    pub water_amount: i32,

    pub food_level: f32,
    pub water_level: f32,
    pub device_busy: bool,
    pub device_status: String,
    pub last_feed_weight: f32,
}

#[derive(Debug, Default)]
pub struct CloudPropsLink {
    props: CloudProperties,
}

impl CloudPropsLink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn props(&self) -> &CloudProperties {
        &self.props
    }

    /// Write access for the property binding.
    pub fn props_mut(&mut self) -> &mut CloudProperties {
        &mut self.props
    }
}

impl RemoteLink for CloudPropsLink {
    fn receive(&mut self) -> Option<Inbound> {
        if core::mem::take(&mut self.props.feed_now) {
            let mut req = CommandRequest::named("feed", CommandSource::Cloud);
            req.portion_size = (self.props.portion_size > 0).then_some(self.props.portion_size as f32);
            info!("cloud: feed_now (portion {:?})", req.portion_size);
            return Some(Inbound::Command(req));
        }
        if core::mem::take(&mut self.props.water_now) {
            let mut req = CommandRequest::named("water", CommandSource::Cloud);
            req.water_amount = u16::try_from(self.props.water_amount)
                .ok()
                .filter(|ml| *ml > 0);
            info!("cloud: water_now (amount {:?})", req.water_amount);
            return Some(Inbound::Command(req));
        }
        None
    }
}

impl EventSink for CloudPropsLink {
    fn emit(&mut self, event: &AppEvent) {
        let p = &mut self.props;
        match event {
            AppEvent::CommandResponse(r) => {
                match r.status {
                    ReplyStatus::Executing => {
                        p.device_busy = true;
                        p.device_status = format!("{}: running", r.command.as_str());
                    }
                    ReplyStatus::Completed | ReplyStatus::Failed => {
                        p.device_busy = false;
                        p.device_status = format!(
                            "{}: {}",
                            r.command.as_str(),
                            if r.status == ReplyStatus::Completed { "done" } else { "failed" }
                        );
                    }
                    ReplyStatus::Busy | ReplyStatus::Error => {}
                }
                if let Some(f) = r.food_level {
                    p.food_level = f;
                }
                if let Some(w) = r.water_level {
                    p.water_level = w;
                }
                if let Some(d) = r.dispensed {
                    p.last_feed_weight = d;
                }
            }
            AppEvent::DeviceStatus(s) => {
                p.device_busy = s.busy;
                p.food_level = s.food_level;
                p.water_level = s.water_level;
                if let Some(w) = s.last_feed_weight {
                    p.last_feed_weight = w;
                }
            }
            AppEvent::WaterStatus(w) => p.water_level = w.water_level,
            _ => {}
        }
    }
}
