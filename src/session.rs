use core::fmt;

use log::info;

use crate::{
    receiver::{ErrorCounts, FrameError, Receiver, Step},
    sender::{self, EncodeError},
    transport::{ByteSink, ByteSource, Clock},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionError {
    /// A receive buffer has to hold at least one byte
    ZeroCapacity,
    /// `start` while a buffer is already allocated; `stop` first
    AlreadyStarted,
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::ZeroCapacity => write!(f, "receive capacity must be 1-255"),
            SessionError::AlreadyStarted => write!(f, "session already started"),
        }
    }
}

impl core::error::Error for SessionError {}

/// One end of a half-duplex link.
///
/// Either half of the transport may be left out: without a source `poll` always
/// reports nothing, without a sink `send` does nothing. Receiving also needs a
/// buffer, which only exists between [`start`](Session::start) and
/// [`stop`](Session::stop).
///
/// A typical control loop:
///
/// ```
/// use rs485_nonblocking::{Loopback, Session};
///
/// let mut wire = Loopback::new();
/// let mut tx = Session::<Loopback, _, _>::new(None, Some(&mut wire), || 0u32);
/// tx.send(b"ping").unwrap();
///
/// let mut rx = Session::<_, Loopback, _>::new(Some(wire), None, || 0u32);
/// rx.start(16).unwrap();
/// if rx.poll() {
///     assert_eq!(rx.packet_data(), Some(&b"ping"[..]));
///     rx.reset();
/// }
/// ```
pub struct Session<Rx, Tx, C: Clock> {
    rx: Option<Rx>,
    tx: Option<Tx>,
    clock: C,
    receiver: Option<Receiver<C::Instant>>,
}

impl<Rx, Tx, C> Session<Rx, Tx, C>
where
    Rx: ByteSource,
    Tx: ByteSink,
    C: Clock,
{
    pub fn new(rx: Option<Rx>, tx: Option<Tx>, clock: C) -> Session<Rx, Tx, C> {
        Session {
            rx,
            tx,
            clock,
            receiver: None,
        }
    }

    /// Allocate a receive buffer of `capacity` bytes and clear all state,
    /// error counts included.
    pub fn start(&mut self, capacity: u8) -> Result<(), SessionError> {
        if capacity == 0 {
            return Err(SessionError::ZeroCapacity);
        }
        if self.receiver.is_some() {
            return Err(SessionError::AlreadyStarted);
        }
        self.receiver = Some(Receiver::new(capacity.into()));
        info!("session started, capacity {}", capacity);
        Ok(())
    }

    /// Release the buffer. Receiving is off until the next `start`.
    pub fn stop(&mut self) {
        if self.receiver.take().is_some() {
            info!("session stopped");
        }
    }

    pub fn is_started(&self) -> bool {
        self.receiver.is_some()
    }

    /// Work through whatever the transport has buffered. True as soon as a new
    /// packet is ready; bytes after it stay in the transport for the next call.
    ///
    /// A held packet stays readable until `reset` or the next STX. Other bytes
    /// that arrive meanwhile are dropped.
    pub fn poll(&mut self) -> bool {
        let (Some(receiver), Some(rx)) = (self.receiver.as_mut(), self.rx.as_mut()) else {
            return false;
        };
        let clock = &self.clock;
        while rx.bytes_available() > 0 {
            let Some(byte) = rx.read_byte() else {
                break;
            };
            if receiver.feed(byte, || clock.now()) == Step::Ready {
                return true;
            }
        }
        false
    }

    /// Abandon the current frame or held packet, e.g. after a timeout. Does
    /// not count as an error.
    pub fn reset(&mut self) {
        if let Some(receiver) = self.receiver.as_mut() {
            receiver.reset();
        }
    }

    /// Frame and write `payload` (1 to 255 bytes). Does nothing without a sink.
    pub fn send(&mut self, payload: &[u8]) -> Result<(), EncodeError> {
        match self.tx.as_mut() {
            Some(tx) => sender::send_message(tx, payload),
            None => Ok(()),
        }
    }

    pub fn is_packet_ready(&self) -> bool {
        self.receiver.as_ref().is_some_and(Receiver::is_packet_ready)
    }

    /// The received payload, only while a packet is ready.
    pub fn packet_data(&self) -> Option<&[u8]> {
        self.receiver.as_ref().and_then(Receiver::packet)
    }

    /// Bytes collected for the current frame; the packet length once ready.
    pub fn packet_len(&self) -> usize {
        self.receiver.as_ref().map_or(0, Receiver::len)
    }

    pub fn capacity(&self) -> usize {
        self.receiver.as_ref().map_or(0, Receiver::capacity)
    }

    pub fn error_count(&self) -> u32 {
        self.receiver.as_ref().map_or(0, Receiver::error_count)
    }

    pub fn error_counts(&self) -> ErrorCounts {
        self.receiver
            .as_ref()
            .map(Receiver::error_counts)
            .unwrap_or_default()
    }

    pub fn last_error(&self) -> Option<FrameError> {
        self.receiver.as_ref().and_then(Receiver::last_error)
    }

    /// When the frame in progress (or the held packet) started.
    pub fn frame_start_time(&self) -> Option<C::Instant> {
        self.receiver.as_ref().and_then(Receiver::frame_start)
    }

    /// True between STX and the end of the frame. False once its packet is
    /// ready.
    pub fn is_frame_started(&self) -> bool {
        self.receiver.as_ref().is_some_and(Receiver::is_frame_started)
    }

    pub fn rx_mut(&mut self) -> Option<&mut Rx> {
        self.rx.as_mut()
    }

    pub fn tx_mut(&mut self) -> Option<&mut Tx> {
        self.tx.as_mut()
    }

    pub fn into_parts(self) -> (Option<Rx>, Option<Tx>, C) {
        (self.rx, self.tx, self.clock)
    }
}
