//! Fuzz target: `JsonLink` inbound framing and envelope decoding
//!
//! Feeds arbitrary bytes through a `MemoryTransport` and drains the link.
//!
//! Invariants checked:
//! - No panics under any byte sequence
//! - Every decoded command name fits the fixed-capacity name buffer
//! - A well-formed frame appended after the garbage is still decoded
//!
//! cargo fuzz run fuzz_link_decode

#![no_main]

use libfuzzer_sys::fuzz_target;
use petfeeder::adapters::json_link::JsonLink;
use petfeeder::adapters::transport::MemoryTransport;
use petfeeder::app::commands::{Inbound, MAX_COMMAND_NAME};
use petfeeder::app::ports::RemoteLink;

const SENTINEL: &str = r#"{"eventType":"command","data":{"command":"get-status"}}"#;

fuzz_target!(|data: &[u8]| {
    let mut link = JsonLink::new(MemoryTransport::new());
    link.transport_mut().rx.extend(data);
    link.transport_mut().push_frame("");
    link.transport_mut().push_frame(SENTINEL);

    let mut last = None;
    while let Some(msg) = link.receive() {
        if let Inbound::Command(req) = &msg {
            assert!(req.command.len() <= MAX_COMMAND_NAME);
        }
        last = Some(msg);
    }

    match last {
        Some(Inbound::Command(req)) => assert_eq!(req.command.as_str(), "get-status"),
        other => panic!("sentinel frame lost: {:?}", other),
    }
});
