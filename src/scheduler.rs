//! Feeding schedule.
//!
//! The remote server owns the schedule list and replaces it wholesale. The
//! scheduler only answers "how long until the next enabled entry" and turns
//! that into a single armed due instant on the wall clock.
//!
//! ```text
//!   schedules msg ──▶ replace() ──▶ armed_due = now + next_due(now)
//!                                        │
//!   control tick ──▶ poll(now) ──────────┤ armed_due ≤ now and not yet fired
//!                                        ▼
//!                                  fire, last_fired = armed_due,
//!                                  armed_due = now + next_due(now)
//! ```
//!
//! All instants are local wall-clock minutes since the Unix epoch. Re-arming
//! keys on the last fired instant, so repeated polls inside one minute or a
//! stall across the minute boundary still fire exactly once.

use log::{info, warn};

use crate::app::commands::ScheduleWire;

/// Minutes in a day; the modulus of every time-of-day computation.
pub const MINUTES_PER_DAY: u16 = 1440;

/// Enabled entries kept from one schedule list.
pub const MAX_SCHEDULES: usize = 10;

// ═══════════════════════════════════════════════════════════════
//  Schedule entries
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleEntry {
    /// 0..1439
    pub minute_of_day: u16,
    pub enabled: bool,
}

impl ScheduleEntry {
    pub fn new(hour: u8, minute: u8, enabled: bool) -> Option<Self> {
        if hour > 23 || minute > 59 {
            return None;
        }
        Some(Self {
            minute_of_day: u16::from(hour) * 60 + u16::from(minute),
            enabled,
        })
    }

    /// Parse `"HH:MM"` (a single-digit hour is accepted).
    pub fn parse(time: &str, enabled: bool) -> Option<Self> {
        let (h, m) = time.trim().split_once(':')?;
        if h.is_empty() || h.len() > 2 || m.len() != 2 {
            return None;
        }
        let hour: u8 = h.parse().ok()?;
        let minute: u8 = m.parse().ok()?;
        Self::new(hour, minute, enabled)
    }
}

/// Minutes from `now_minute_of_day` to the nearest enabled entry.
///
/// An entry at `now` is a full day away. `None` without enabled entries.
pub fn next_due(entries: &[ScheduleEntry], now_minute_of_day: u16) -> Option<u16> {
    let now = now_minute_of_day % MINUTES_PER_DAY;
    entries
        .iter()
        .filter(|e| e.enabled && e.minute_of_day < MINUTES_PER_DAY)
        .map(|e| {
            let d = (e.minute_of_day + MINUTES_PER_DAY - now) % MINUTES_PER_DAY;
            if d == 0 { MINUTES_PER_DAY } else { d }
        })
        .min()
}

/// Parse a wire list into its enabled entries, dropping invalid times.
///
/// Disabled entries never fire, so only enabled ones count toward
/// [`MAX_SCHEDULES`].
pub fn parse_entries(wire: &[ScheduleWire]) -> heapless::Vec<ScheduleEntry, MAX_SCHEDULES> {
    let mut out = heapless::Vec::new();
    for item in wire.iter().filter(|w| w.enabled) {
        let Some(entry) = ScheduleEntry::parse(&item.time, true) else {
            warn!("Schedule: skipping invalid time {:?}", item.time);
            continue;
        };
        if out.push(entry).is_err() {
            warn!(
                "Schedule: more than {} enabled entries, keeping the first",
                MAX_SCHEDULES
            );
            break;
        }
    }
    out
}

// ═══════════════════════════════════════════════════════════════
//  Armed schedule
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Default)]
pub struct FeedSchedule {
    entries: heapless::Vec<ScheduleEntry, MAX_SCHEDULES>,
    armed_due: Option<u64>,
    last_fired: Option<u64>,
    last_poll: Option<u64>,
}

impl FeedSchedule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[ScheduleEntry] {
        &self.entries
    }

    /// Next armed due instant (epoch minutes).
    pub fn armed_due(&self) -> Option<u64> {
        self.armed_due
    }

    /// Replace the whole list and re-arm against `now_epoch_min`.
    pub fn replace(&mut self, entries: &[ScheduleEntry], now_epoch_min: Option<u64>) {
        self.entries.clear();
        for e in entries.iter().take(MAX_SCHEDULES) {
            let _ = self.entries.push(*e);
        }
        if entries.len() > MAX_SCHEDULES {
            warn!(
                "Schedule: {} entries dropped",
                entries.len() - MAX_SCHEDULES
            );
        }
        self.armed_due = None;
        if let Some(now) = now_epoch_min {
            self.arm_including(now);
        }
        info!(
            "Schedule: {} entries ({} enabled), next due {:?}",
            self.entries.len(),
            self.entries.iter().filter(|e| e.enabled).count(),
            self.armed_due
        );
    }

    /// `true` exactly once per due instant.
    pub fn poll(&mut self, now_epoch_min: u64) -> bool {
        let jumped_back = self
            .last_poll
            .is_some_and(|prev| now_epoch_min + u64::from(MINUTES_PER_DAY) < prev);
        self.last_poll = Some(now_epoch_min);

        if jumped_back {
            warn!("Schedule: clock moved back more than a day, re-arming");
            self.arm(now_epoch_min);
        } else if self.armed_due.is_none() {
            // First poll after a list arrived before the clock was synced.
            self.arm_including(now_epoch_min);
        }

        let Some(due) = self.armed_due else {
            return false;
        };
        if due > now_epoch_min || self.last_fired == Some(due) {
            return false;
        }

        self.last_fired = Some(due);
        self.arm(now_epoch_min);
        info!(
            "Schedule: fired for {:02}:{:02}, next due {:?}",
            (due % u64::from(MINUTES_PER_DAY)) / 60,
            due % 60,
            self.armed_due
        );
        true
    }

    /// Arm counting the current minute as still due, unless it already fired.
    fn arm_including(&mut self, now_epoch_min: u64) {
        if self.last_fired == Some(now_epoch_min) {
            self.arm(now_epoch_min);
        } else {
            self.arm(now_epoch_min.saturating_sub(1));
        }
    }

    fn arm(&mut self, now_epoch_min: u64) {
        let minute_of_day = (now_epoch_min % u64::from(MINUTES_PER_DAY)) as u16;
        self.armed_due =
            next_due(&self.entries, minute_of_day).map(|d| now_epoch_min + u64::from(d));
    }
}

// ═══════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════
