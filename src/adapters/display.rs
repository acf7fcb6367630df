//! Display adapter.
//!
//! Mirrors the two-line display to the log. Only changes are logged, so a
//! progress line redrawn every poll with the same text stays quiet.

use log::info;

use crate::app::ports::DisplayPort;
use crate::control::LcdLine;

#[derive(Debug, Default)]
pub struct LogDisplay {
    line1: LcdLine,
    line2: LcdLine,
}

impl LogDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current content, as last shown.
    pub fn lines(&self) -> (&str, &str) {
        (self.line1.as_str(), self.line2.as_str())
    }
}

impl DisplayPort for LogDisplay {
    fn show(&mut self, line1: &str, line2: &str) {
        let l1 = truncate(line1);
        let l2 = truncate(line2);
        if l1 == self.line1 && l2 == self.line2 {
            return;
        }
        info!("LCD   | {:<16} | {:<16}", l1.as_str(), l2.as_str());
        self.line1 = l1;
        self.line2 = l2;
    }
}

fn truncate(s: &str) -> LcdLine {
    let mut line = LcdLine::new();
    for ch in s.chars() {
        if line.push(ch).is_err() {
            break;
        }
    }
    line
}
