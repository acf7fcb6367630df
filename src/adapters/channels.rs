//! Link inter-task channels.
//!
//! `embassy-sync` bounded channels bridge the network I/O thread with the
//! synchronous control loop. Both sides share these statics without heap
//! allocation; a full channel drops the newest frame.
//!
//! ```text
//! ┌──────────────┐  INBOUND_FRAMES  ┌──────────────┐
//! │  I/O thread  │────────────────▶│ Control loop │
//! │ (websocket)  │◀────────────────│ (JsonLink)   │
//! └──────────────┘  OUTBOUND_FRAMES └──────────────┘
//! ```

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;

/// Largest JSON frame carried either way.
pub const MAX_FRAME: usize = 1024;

/// Frame plus its `\n` terminator.
pub const TRANSPORT_BUF: usize = MAX_FRAME + 1;

/// One JSON message without terminator.
pub type LinkFrame = heapless::Vec<u8, MAX_FRAME>;

const INBOUND_DEPTH: usize = 4;
const OUTBOUND_DEPTH: usize = 8;

/// I/O thread → control loop.
pub static INBOUND_FRAMES: Channel<CriticalSectionRawMutex, LinkFrame, INBOUND_DEPTH> =
    Channel::new();

/// Control loop → I/O thread.
pub static OUTBOUND_FRAMES: Channel<CriticalSectionRawMutex, LinkFrame, OUTBOUND_DEPTH> =
    Channel::new();

/// I/O side: queue a received message. `false` if it was too large or the
/// channel is full.
pub fn push_inbound(message: &[u8]) -> bool {
    let Ok(frame) = LinkFrame::from_slice(message) else {
        return false;
    };
    INBOUND_FRAMES.try_send(frame).is_ok()
}

/// I/O side: next message to send, if any.
pub fn pop_outbound() -> Option<LinkFrame> {
    OUTBOUND_FRAMES.try_receive().ok()
}
