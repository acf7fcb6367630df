//! Transport abstraction: any byte-oriented channel carrying link frames.
//!
//! Concrete implementations:
//! - [`ChannelTransport`]: the control-loop end of the link channels, fed by
//!   the network I/O thread.
//! - [`MemoryTransport`]: in-memory queues for host tests and simulation.
//! - [`NullTransport`]: no link at all.
//!
//! The JSON link is generic over `Transport`, so a new carrier needs no
//! change to message handling.

use std::collections::VecDeque;

use log::warn;

use super::channels::{INBOUND_FRAMES, LinkFrame, OUTBOUND_FRAMES, TRANSPORT_BUF};

/// Byte-oriented transport channel.
pub trait Transport {
    type Error: core::fmt::Debug;

    /// Read up to `buf.len()` bytes. `Ok(0)` if nothing is pending; never blocks.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error>;

    /// Write `data`, returning the number of bytes accepted.
    fn write(&mut self, data: &[u8]) -> Result<usize, Self::Error>;

    fn flush(&mut self) -> Result<(), Self::Error>;

    fn available(&self) -> bool;
}

/// Discards all writes and never reads.
pub struct NullTransport;

impl Transport for NullTransport {
    type Error = ();

    fn read(&mut self, _buf: &mut [u8]) -> Result<usize, ()> {
        Ok(0)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, ()> {
        Ok(data.len())
    }

    fn flush(&mut self) -> Result<(), ()> {
        Ok(())
    }

    fn available(&self) -> bool {
        false
    }
}

// ───────────────────────────────────────────────────────────────
// In-memory
// ───────────────────────────────────────────────────────────────

/// Loopback queues: tests push into `rx` and inspect `tx`.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    pub rx: VecDeque<u8>,
    pub tx: Vec<u8>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue one newline-terminated frame for reading.
    pub fn push_frame(&mut self, frame: &str) {
        self.rx.extend(frame.as_bytes());
        self.rx.push_back(b'\n');
    }

    /// Drain everything written so far, split into frames.
    pub fn take_frames(&mut self) -> Vec<String> {
        let out = String::from_utf8_lossy(&self.tx)
            .split('\n')
            .filter(|l| !l.is_empty())
            .map(str::to_owned)
            .collect();
        self.tx.clear();
        out
    }
}

impl Transport for MemoryTransport {
    type Error = core::convert::Infallible;

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        let n = buf.len().min(self.rx.len());
        for (slot, byte) in buf.iter_mut().zip(self.rx.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, Self::Error> {
        self.tx.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn available(&self) -> bool {
        !self.rx.is_empty()
    }
}

// ───────────────────────────────────────────────────────────────
// Link channels
// ───────────────────────────────────────────────────────────────

/// Control-loop end of [`INBOUND_FRAMES`] / [`OUTBOUND_FRAMES`].
///
/// Frames on the channels carry no terminator; this side adds a `\n` after
/// each inbound frame and splits outbound bytes on `\n`.
#[derive(Default)]
pub struct ChannelTransport {
    pending: heapless::Vec<u8, TRANSPORT_BUF>,
    pos: usize,
    out: LinkFrame,
    overflowed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelError {
    /// Outbound channel full; the frame was dropped.
    Full,
}

impl ChannelTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn refill(&mut self) -> bool {
        if self.pos < self.pending.len() {
            return true;
        }
        let Ok(frame) = INBOUND_FRAMES.try_receive() else {
            return false;
        };
        self.pending.clear();
        self.pos = 0;
        // Capacity is one byte larger than a frame.
        let _ = self.pending.extend_from_slice(&frame);
        let _ = self.pending.push(b'\n');
        true
    }

    fn send_out(&mut self) -> Result<(), ChannelError> {
        let frame = core::mem::take(&mut self.out);
        if self.overflowed {
            self.overflowed = false;
            warn!("link: outbound frame over {} bytes dropped", frame.capacity());
            return Ok(());
        }
        OUTBOUND_FRAMES.try_send(frame).map_err(|_| {
            warn!("link: outbound channel full, frame dropped");
            ChannelError::Full
        })
    }
}

impl Transport for ChannelTransport {
    type Error = ChannelError;

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, ChannelError> {
        if !self.refill() {
            return Ok(0);
        }
        let n = buf.len().min(self.pending.len() - self.pos);
        buf[..n].copy_from_slice(&self.pending[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, ChannelError> {
        for &b in data {
            if b == b'\n' {
                self.send_out()?;
            } else if self.out.push(b).is_err() {
                self.overflowed = true;
            }
        }
        Ok(data.len())
    }

    fn flush(&mut self) -> Result<(), ChannelError> {
        if self.out.is_empty() {
            return Ok(());
        }
        self.send_out()
    }

    fn available(&self) -> bool {
        self.pos < self.pending.len() || !INBOUND_FRAMES.is_empty()
    }
}
