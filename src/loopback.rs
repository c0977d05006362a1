//! In-memory link: whatever is written can be read back in order. Handy for
//! tests and for wiring two sessions together on the host.

extern crate alloc;

use alloc::collections::VecDeque;

use crate::transport::{ByteSink, ByteSource};

#[derive(Debug, Default, Clone)]
pub struct Loopback {
    buf: VecDeque<u8>,
}

impl Loopback {
    pub fn new() -> Loopback {
        Loopback::default()
    }

    pub fn from_bytes(data: &[u8]) -> Loopback {
        Loopback {
            buf: data.iter().copied().collect(),
        }
    }

    pub fn push(&mut self, byte: u8) {
        self.buf.push_back(byte);
    }

    pub fn extend(&mut self, data: &[u8]) {
        self.buf.extend(data.iter().copied());
    }

    /// Unread bytes, oldest first.
    pub fn pending(&mut self) -> &[u8] {
        self.buf.make_contiguous()
    }

    /// Move everything unread into `other`, as if it crossed the wire.
    pub fn transfer_to(&mut self, other: &mut Loopback) {
        other.buf.extend(self.buf.drain(..));
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}

impl ByteSource for Loopback {
    fn bytes_available(&mut self) -> usize {
        self.buf.len()
    }

    fn read_byte(&mut self) -> Option<u8> {
        self.buf.pop_front()
    }
}

impl ByteSink for Loopback {
    fn write_byte(&mut self, byte: u8) {
        self.buf.push_back(byte);
    }
}
