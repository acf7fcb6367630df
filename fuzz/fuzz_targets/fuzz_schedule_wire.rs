//! Fuzz target: schedule list parsing and arming
//!
//! Splits the input into `"HH:MM"`-ish strings plus a clock reading.
//!
//! Invariants checked:
//! - No panics under any input
//! - At most `MAX_SCHEDULES` entries survive parsing, all of them enabled
//! - An armed due instant is never in the past and at most one day ahead
//!
//! cargo fuzz run fuzz_schedule_wire

#![no_main]

use libfuzzer_sys::fuzz_target;
use petfeeder::app::commands::ScheduleWire;
use petfeeder::scheduler::{self, FeedSchedule, MAX_SCHEDULES, MINUTES_PER_DAY};

fuzz_target!(|data: &[u8]| {
    if data.len() < 8 {
        return;
    }
    let (clock, rest) = data.split_at(8);
    let mut now = [0u8; 8];
    now.copy_from_slice(clock);
    // Keep clear of overflow when adding a day.
    let now = u64::from_le_bytes(now) >> 8;

    let wire: Vec<ScheduleWire> = rest
        .split(|b| *b == b',')
        .map(|chunk| ScheduleWire {
            time: String::from_utf8_lossy(chunk).into_owned(),
            enabled: chunk.len() % 2 == 0,
        })
        .collect();

    let entries = scheduler::parse_entries(&wire);
    assert!(entries.len() <= MAX_SCHEDULES);
    assert!(entries.iter().all(|e| e.enabled));

    let mut sched = FeedSchedule::new();
    sched.replace(&entries, Some(now));
    if let Some(due) = sched.armed_due() {
        assert!(due >= now && due <= now + u64::from(MINUTES_PER_DAY));
    }
    let _ = sched.poll(now + u64::from(MINUTES_PER_DAY));
});
