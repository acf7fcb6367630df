//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to the
//! ESP-IDF logger (UART / USB-CDC in production). Paired with a link sink
//! through the tuple fan-out so every outbound message also lands on serial.

use log::{info, warn};

use crate::app::events::{AppEvent, ReplyStatus};
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`] to the serial console.
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Register(r) => {
                info!("LINK  | register {} v{} [{}]", r.device_type, r.version, r.capabilities);
            }
            AppEvent::GetSettings => info!("LINK  | request settings"),
            AppEvent::GetSchedules => info!("LINK  | request schedules"),
            AppEvent::CommandResponse(r) => {
                let line = format!(
                    "REPLY | {} -> {:?}{}{}{}",
                    r.command.as_str(),
                    r.status,
                    r.dispensed
                        .map(|d| format!(" | dispensed={:.1}g", d))
                        .unwrap_or_default(),
                    r.food_level
                        .map(|f| format!(" | food={:.0}%", f))
                        .unwrap_or_default(),
                    r.message
                        .as_deref()
                        .map(|m| format!(" | {}", m))
                        .unwrap_or_default(),
                );
                if matches!(r.status, ReplyStatus::Failed | ReplyStatus::Error) {
                    warn!("{}", line);
                } else {
                    info!("{}", line);
                }
            }
            AppEvent::DeviceStatus(s) => {
                info!(
                    "STATUS| busy={} feeding={} watering={} | food={:.0}% water={:.0}%",
                    s.busy, s.feeding, s.watering, s.food_level, s.water_level
                );
            }
            AppEvent::DeviceLog(entry) => {
                info!("EVENT | {:?} | {} @{}", entry.kind, entry.details, entry.timestamp);
            }
            AppEvent::FeedingComplete(r) => {
                info!(
                    "FEED  | {:?} | {:.1}g -> {:.1}g | +{:.1}g of {:.1}g ({:.0}%, {:?}) | retries={} | {:?}",
                    r.outcome,
                    r.initial_g,
                    r.final_g,
                    r.dispensed_g,
                    r.target_g,
                    r.accuracy_pct,
                    r.quality,
                    r.retries,
                    r.source,
                );
            }
            AppEvent::WaterStatus(w) => {
                info!("WATER | {:?} | level={:.0}%", w.status, w.water_level);
            }
        }
    }
}
