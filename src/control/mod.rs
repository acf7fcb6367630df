//! Closed-loop actuator controllers.
//!
//! Each controller is one tagged-variant state machine. Timed phases carry
//! their deadline and are re-checked once per control tick; nothing in here
//! blocks beyond the sampler's bounded reads.

pub mod feed;
pub mod water;

use core::fmt::{self, Write};

/// Width of one display line.
pub const LCD_COLS: usize = 16;

pub type LcdLine = heapless::String<LCD_COLS>;

/// Format one display line, truncated to the display width.
pub fn lcd_line(args: fmt::Arguments<'_>) -> LcdLine {
    let mut line = LcdLine::new();
    // Overflow only drops the tail.
    let _ = line.write_fmt(args);
    line
}
