//! JSON link adapter.
//!
//! Speaks the relay server's envelope, one JSON object per line:
//!
//! ```text
//! {"eventType":"command","data":{"command":"feed","portionSize":40}}
//! {"eventType":"schedules","data":[{"time":"08:00","enabled":true}]}
//! {"eventType":"settings","data":{"portionSize":60,"waterAmount":120}}
//! ```
//!
//! Inbound lines become [`Inbound`] values through [`RemoteLink`]; outbound
//! [`AppEvent`]s are serialised and written through [`EventSink`]. Unknown
//! event types and unparseable lines are logged and dropped. A `command`
//! whose payload does not decode is still passed on, flagged, so the
//! sender gets an `error` reply.

use log::{debug, warn};
use serde::Deserialize;
use serde_json::Value;

use crate::app::commands::{
    CommandRequest, CommandSource, Inbound, MAX_COMMAND_NAME, ScheduleWire, SettingsUpdate,
};
use crate::app::events::AppEvent;
use crate::app::ports::{EventSink, RemoteLink};
use crate::error::CommandError;

use super::channels::MAX_FRAME;
use super::transport::Transport;

/// Inbound envelope.
#[derive(Debug, Deserialize)]
#[serde(tag = "eventType", content = "data")]
enum WireInbound {
    #[serde(rename = "command")]
    Command(Value),
    #[serde(rename = "schedules")]
    Schedules(Vec<ScheduleWire>),
    #[serde(rename = "settings")]
    Settings(SettingsUpdate),
}

impl From<WireInbound> for Inbound {
    fn from(w: WireInbound) -> Self {
        match w {
            WireInbound::Command(data) => Self::Command(decode_command(&data)),
            WireInbound::Schedules(s) => Self::Schedules(s),
            WireInbound::Settings(s) => Self::Settings(s),
        }
    }
}

/// Decode a `command` payload. An oversized name is unknown by
/// construction; anything else that fails to decode is malformed.
fn decode_command(data: &Value) -> CommandRequest {
    match CommandRequest::deserialize(data) {
        Ok(req) => req,
        Err(e) => {
            let name = data.get("command").and_then(Value::as_str);
            let rejection = match name {
                Some(n) if n.len() > MAX_COMMAND_NAME => CommandError::Unknown,
                _ => CommandError::Malformed,
            };
            warn!("link: command payload rejected ({}): {}", rejection, e);
            let mut req = CommandRequest::named(name.unwrap_or_default(), CommandSource::Remote);
            req.rejection = Some(rejection);
            req
        }
    }
}

/// Decode one line. `None` for anything the device does not handle.
pub fn decode_line(line: &[u8]) -> Option<Inbound> {
    match serde_json::from_slice::<WireInbound>(line) {
        Ok(msg) => Some(msg.into()),
        Err(e) => {
            warn!(
                "link: dropping frame ({}): {}",
                e,
                String::from_utf8_lossy(&line[..line.len().min(64)])
            );
            None
        }
    }
}

pub struct JsonLink<T: Transport> {
    transport: T,
    line: heapless::Vec<u8, MAX_FRAME>,
    /// Current line overflowed; discard until the next newline.
    discarding: bool,
}

impl<T: Transport> JsonLink<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            line: heapless::Vec::new(),
            discarding: false,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Feed bytes into the line buffer; returns a complete line when one ends.
    fn next_line(&mut self) -> Option<heapless::Vec<u8, MAX_FRAME>> {
        let mut byte = [0u8; 1];
        loop {
            match self.transport.read(&mut byte) {
                Ok(1) => {}
                Ok(_) => return None,
                Err(e) => {
                    warn!("link: read error {:?}", e);
                    return None;
                }
            }
            match byte[0] {
                b'\n' => {
                    let line = core::mem::take(&mut self.line);
                    if core::mem::take(&mut self.discarding) {
                        warn!("link: inbound frame over {} bytes dropped", MAX_FRAME);
                        continue;
                    }
                    if line.iter().all(u8::is_ascii_whitespace) {
                        continue;
                    }
                    return Some(line);
                }
                b => {
                    if !self.discarding && self.line.push(b).is_err() {
                        self.discarding = true;
                    }
                }
            }
        }
    }
}

impl<T: Transport> RemoteLink for JsonLink<T> {
    fn receive(&mut self) -> Option<Inbound> {
        while let Some(line) = self.next_line() {
            if let Some(msg) = decode_line(&line) {
                debug!("link: <- {:?}", msg);
                return Some(msg);
            }
        }
        None
    }
}

impl<T: Transport> EventSink for JsonLink<T> {
    fn emit(&mut self, event: &AppEvent) {
        let mut bytes = match serde_json::to_vec(event) {
            Ok(b) => b,
            Err(e) => {
                warn!("link: encode failed: {}", e);
                return;
            }
        };
        bytes.push(b'\n');
        if let Err(e) = self
            .transport
            .write(&bytes)
            .and_then(|_| self.transport.flush())
        {
            warn!("link: write error {:?}", e);
        }
    }
}
