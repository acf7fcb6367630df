//! ISR-debounced manual feed button.
//!
//! ## Hardware
//!
//! Active-low momentary switch with internal pull-up. The GPIO fires on
//! the falling edge; the ISR records the raw timestamp into an atomic, and
//! `tick()` (called from the main loop at control-tick rate) runs the
//! debounce and release detection.
//!
//! A press counts once the line has stayed low for the debounce window and
//! is reported on release, so holding the button never repeats.

use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

const DEBOUNCE_MS: u64 = 50;

/// Raw ISR timestamp (milliseconds since boot, truncated to u32).
/// Written by the ISR, read by the main loop. Only compared for change,
/// so truncation is harmless; debounce timing uses the caller's u64 clock.
static BUTTON_ISR_TIMESTAMP: AtomicU32 = AtomicU32::new(0);

/// Simulated line level for host builds. `true` = held down.
static SIM_PRESSED: AtomicBool = AtomicBool::new(false);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonEvent {
    Press,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PressState {
    Idle,
    Debounce { since_ms: u64 },
    Held,
}

pub struct ButtonDriver {
    state: PressState,
    last_isr_ms: u32,
}

impl Default for ButtonDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl ButtonDriver {
    pub fn new() -> Self {
        Self {
            state: PressState::Idle,
            last_isr_ms: 0,
        }
    }

    /// Call once per control tick. Returns `Some` on a debounced release.
    pub fn tick(&mut self, now_ms: u64) -> Option<ButtonEvent> {
        let isr_ms = BUTTON_ISR_TIMESTAMP.load(Ordering::Acquire);
        let new_edge = isr_ms != 0 && isr_ms != self.last_isr_ms;

        match self.state {
            PressState::Idle => {
                if new_edge {
                    self.last_isr_ms = isr_ms;
                    self.state = PressState::Debounce { since_ms: now_ms };
                }
                None
            }
            PressState::Debounce { since_ms } => {
                if now_ms.saturating_sub(since_ms) < DEBOUNCE_MS {
                    return None;
                }
                // Bounce that released inside the window is noise.
                self.state = if Self::is_pressed_hw() {
                    PressState::Held
                } else {
                    PressState::Idle
                };
                None
            }
            PressState::Held => {
                if Self::is_pressed_hw() {
                    return None;
                }
                self.state = PressState::Idle;
                // Edges from the release bounce are consumed here.
                self.last_isr_ms = BUTTON_ISR_TIMESTAMP.load(Ordering::Acquire);
                Some(ButtonEvent::Press)
            }
        }
    }

    #[cfg(target_os = "espidf")]
    fn is_pressed_hw() -> bool {
        !crate::drivers::hw_init::gpio_read(crate::pins::BUTTON_GPIO)
    }

    #[cfg(not(target_os = "espidf"))]
    fn is_pressed_hw() -> bool {
        SIM_PRESSED.load(Ordering::Relaxed)
    }
}

/// ISR handler — register this on the button GPIO falling edge.
/// Safe to call from interrupt context (lock-free atomic store).
#[allow(unused)]
pub fn button_isr_handler(now_ms: u32) {
    BUTTON_ISR_TIMESTAMP.store(now_ms, Ordering::Release);
}

/// Host-only: press (and hold) the simulated button at `now_ms`.
#[cfg(not(target_os = "espidf"))]
pub fn sim_press(now_ms: u32) {
    SIM_PRESSED.store(true, Ordering::Relaxed);
    button_isr_handler(now_ms.max(1));
}

/// Host-only: release the simulated button.
#[cfg(not(target_os = "espidf"))]
pub fn sim_release() {
    SIM_PRESSED.store(false, Ordering::Relaxed);
}
