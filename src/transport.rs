//! Capabilities the host hands to a [`Session`](crate::Session).

/// Receive half of the link.
pub trait ByteSource {
    /// Count (or at least presence) of unread bytes.
    fn bytes_available(&mut self) -> usize;

    /// Only called after `bytes_available` reported something. `None` means the
    /// byte went missing anyway and ends the current poll.
    fn read_byte(&mut self) -> Option<u8>;
}

/// Transmit half of the link. Outcome of a write is not this layer's concern.
pub trait ByteSink {
    fn write_byte(&mut self, byte: u8);
}

/// Monotonic time source, used only to stamp when a frame started.
pub trait Clock {
    type Instant: Copy;

    fn now(&self) -> Self::Instant;
}

impl<F, I> Clock for F
where
    F: Fn() -> I,
    I: Copy,
{
    type Instant = I;

    fn now(&self) -> I {
        self()
    }
}

impl<T: ByteSource + ?Sized> ByteSource for &mut T {
    fn bytes_available(&mut self) -> usize {
        (**self).bytes_available()
    }

    fn read_byte(&mut self) -> Option<u8> {
        (**self).read_byte()
    }
}

impl<T: ByteSink + ?Sized> ByteSink for &mut T {
    fn write_byte(&mut self, byte: u8) {
        (**self).write_byte(byte)
    }
}
