//! System time adapter.
//!
//! Monotonic uptime for controller deadlines plus the synced wall clock for
//! the schedule and log timestamps.
//!
//! - **`target_os = "espidf"`**: `esp_timer_get_time()` and
//!   `gettimeofday()` (set by SNTP).
//! - **host**: `std::time::Instant` and `SystemTime`.

use crate::app::ports::Clock;

/// Anything before 2020-01-01 means SNTP has not run yet.
const EPOCH_2020: u64 = 1_577_836_800;

pub struct SystemClock {
    #[cfg(not(target_os = "espidf"))]
    start: std::time::Instant,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            #[cfg(not(target_os = "espidf"))]
            start: std::time::Instant::now(),
        }
    }

    /// Milliseconds since boot (monotonic).
    #[cfg(target_os = "espidf")]
    pub fn uptime_ms(&self) -> u64 {
        (unsafe { esp_idf_svc::sys::esp_timer_get_time() }) as u64 / 1_000
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn uptime_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    /// Unix seconds, `None` until the wall clock is synced.
    #[cfg(target_os = "espidf")]
    pub fn unix_secs(&self) -> Option<u64> {
        let mut tv = esp_idf_svc::sys::timeval {
            tv_sec: 0,
            tv_usec: 0,
        };
        if unsafe { esp_idf_svc::sys::gettimeofday(&mut tv, core::ptr::null_mut()) } != 0 {
            return None;
        }
        synced(u64::try_from(tv.tv_sec).ok()?)
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn unix_secs(&self) -> Option<u64> {
        let secs = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .ok()?
            .as_secs();
        synced(secs)
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        self.uptime_ms()
    }
}

fn synced(secs: u64) -> Option<u64> {
    (secs >= EPOCH_2020).then_some(secs)
}
