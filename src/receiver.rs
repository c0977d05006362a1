extern crate alloc;

use core::fmt;

use alloc::vec::Vec;
use bilge::prelude::u4;
use log::{debug, trace, warn};

use crate::{
    Decode,
    codec::{self, ETX, MAX_PAYLOAD_SIZE, STX},
};

/// Everything that can kill a frame in flight. None of these are returned to
/// the caller of `poll`; they reset the receiver and bump its counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    /// A byte inside the frame wasn't a nibble/complement unit, or the end
    /// marker split a byte in half.
    InvalidUnit { found: u8 },
    /// More payload than the buffer holds.
    Overflow { capacity: usize },
    ChecksumMismatch { calculated: u8, found: u8 },
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameError::InvalidUnit { found } => write!(f, "invalid unit {found:#04x}"),
            FrameError::Overflow { capacity } => {
                write!(f, "payload overflows {capacity} byte buffer")
            }
            FrameError::ChecksumMismatch { calculated, found } => write!(
                f,
                "checksum mismatch: calculated {calculated:#04x}, found {found:#04x}"
            ),
        }
    }
}

impl core::error::Error for FrameError {}

/// Per-kind error tallies. The sum is the session's error count.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ErrorCounts {
    pub invalid_unit: u32,
    pub overflow: u32,
    pub checksum: u32,
}

impl ErrorCounts {
    pub fn total(&self) -> u32 {
        self.invalid_unit
            .saturating_add(self.overflow)
            .saturating_add(self.checksum)
    }

    fn record(&mut self, error: &FrameError) {
        let slot = match error {
            FrameError::InvalidUnit { .. } => &mut self.invalid_unit,
            FrameError::Overflow { .. } => &mut self.overflow,
            FrameError::ChecksumMismatch { .. } => &mut self.checksum,
        };
        *slot = slot.saturating_add(1);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Waiting for STX
    Idle,
    /// Collecting payload units
    InFrame,
    /// ETX seen, collecting the two CRC units
    AwaitingChecksum,
    /// A checksummed packet sits in the buffer
    Ready,
}

/// What a single byte did to the receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Dropped as noise while no frame was open.
    Discarded,
    /// Consumed, frame still open.
    Pending,
    /// The frame completed and checked out.
    Ready,
    /// The frame was thrown away.
    Rejected(FrameError),
}

/// Byte-at-a-time frame decoder. Owns the packet buffer; knows nothing about
/// where the bytes come from.
#[derive(Debug)]
pub struct Receiver<I> {
    buffer: Vec<u8>,
    capacity: usize,
    state: State,
    high_nibble: Option<u4>,
    errors: ErrorCounts,
    last_error: Option<FrameError>,
    frame_start: Option<I>,
}

impl<I: Copy> Receiver<I> {
    /// `capacity` is clamped to what a frame can carry.
    pub fn new(capacity: usize) -> Receiver<I> {
        let capacity = capacity.min(MAX_PAYLOAD_SIZE);
        Receiver {
            buffer: Vec::with_capacity(capacity),
            capacity,
            state: State::Idle,
            high_nibble: None,
            errors: ErrorCounts::default(),
            last_error: None,
            frame_start: None,
        }
    }

    /// Drop whatever frame is open (or held) and wait for the next STX.
    pub fn reset(&mut self) {
        self.state = State::Idle;
        self.buffer.clear();
        self.high_nibble = None;
        self.frame_start = None;
    }

    fn reject(&mut self, error: FrameError) -> Step {
        warn!("frame dropped: {}", error);
        self.reset();
        self.errors.record(&error);
        self.last_error = Some(error);
        Step::Rejected(error)
    }

    /// Feed one byte off the wire. `now` is only called when a frame starts.
    pub fn feed(&mut self, byte: u8, now: impl FnOnce() -> I) -> Step {
        if byte == STX {
            self.reset();
            self.state = State::InFrame;
            self.frame_start = Some(now());
            debug!("frame start");
            return Step::Pending;
        }

        match self.state {
            State::Idle => {
                trace!("discarding {:#04x} outside of a frame", byte);
                return Step::Discarded;
            }
            // A held packet stays put until `reset` or the next STX
            State::Ready => {
                trace!("discarding {:#04x} while a packet is held", byte);
                return Step::Discarded;
            }
            State::InFrame | State::AwaitingChecksum => {}
        }

        if byte == ETX {
            if self.high_nibble.is_some() {
                return self.reject(FrameError::InvalidUnit { found: byte });
            }
            self.state = State::AwaitingChecksum;
            return Step::Pending;
        }

        let Some(nibble) = codec::decode_unit(byte) else {
            return self.reject(FrameError::InvalidUnit { found: byte });
        };

        let Some(high) = self.high_nibble.take() else {
            self.high_nibble = Some(nibble);
            return Step::Pending;
        };
        let decoded = codec::join_nibbles(high, nibble);

        if self.state == State::AwaitingChecksum {
            let calculated = codec::crc8(&self.buffer);
            if calculated != decoded {
                return self.reject(FrameError::ChecksumMismatch {
                    calculated,
                    found: decoded,
                });
            }
            self.state = State::Ready;
            debug!("packet ready, {} bytes", self.buffer.len());
            return Step::Ready;
        }

        if self.buffer.len() < self.capacity {
            self.buffer.push(decoded);
            Step::Pending
        } else {
            self.reject(FrameError::Overflow {
                capacity: self.capacity,
            })
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_packet_ready(&self) -> bool {
        self.state == State::Ready
    }

    /// True from STX until the frame completes, fails or is reset.
    pub fn is_frame_started(&self) -> bool {
        matches!(self.state, State::InFrame | State::AwaitingChecksum)
    }

    /// The checked payload, only while a packet is held.
    pub fn packet(&self) -> Option<&[u8]> {
        self.is_packet_ready().then_some(self.buffer.as_slice())
    }

    /// Bytes committed so far for the current frame.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn error_count(&self) -> u32 {
        self.errors.total()
    }

    pub fn error_counts(&self) -> ErrorCounts {
        self.errors
    }

    pub fn last_error(&self) -> Option<FrameError> {
        self.last_error
    }

    pub fn frame_start(&self) -> Option<I> {
        self.frame_start
    }
}

/// Payload of a frame decoded in one go from a captured byte slice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub data: heapless::Vec<u8, MAX_PAYLOAD_SIZE>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    /// The last frame in the slice was broken
    Frame(FrameError),
    /// Ran out of bytes before a frame completed
    Incomplete,
}

impl From<FrameError> for DecodeError {
    fn from(value: FrameError) -> Self {
        DecodeError::Frame(value)
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::Frame(e) => write!(f, "{e}"),
            DecodeError::Incomplete => write!(f, "no complete frame"),
        }
    }
}

impl core::error::Error for DecodeError {}

impl<'a> Decode<'a> for Packet {
    type Error = DecodeError;

    /// Scan `data` for the first frame that checks out. Broken frames before it
    /// are skipped, just as the live receiver would skip them.
    fn decode(data: &'a [u8]) -> Result<Self, Self::Error> {
        let mut rx = Receiver::<()>::new(MAX_PAYLOAD_SIZE);
        for &byte in data {
            if rx.feed(byte, || ()) == Step::Ready {
                let data = heapless::Vec::from_slice(&rx.buffer).map_err(|_| {
                    DecodeError::Frame(FrameError::Overflow {
                        capacity: MAX_PAYLOAD_SIZE,
                    })
                })?;
                return Ok(Packet { data });
            }
        }
        match rx.last_error() {
            Some(e) if !rx.is_frame_started() => Err(DecodeError::Frame(e)),
            _ => Err(DecodeError::Incomplete),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Encode, Message};

    fn feed_all(rx: &mut Receiver<u32>, bytes: &[u8]) -> Option<Step> {
        let mut last = None;
        for &b in bytes {
            let step = rx.feed(b, || 7);
            last = Some(step);
            if matches!(step, Step::Ready | Step::Rejected(_)) {
                break;
            }
        }
        last
    }

    fn frame(payload: &[u8]) -> heapless::Vec<u8, { codec::MAX_ENCODED_SIZE }> {
        let mut buf = [0u8; codec::MAX_ENCODED_SIZE];
        let n = Message::new(payload).encode(&mut buf).unwrap();
        heapless::Vec::from_slice(&buf[..n]).unwrap()
    }

    #[test]
    fn receives_example_frame() {
        let mut rx = Receiver::new(10);
        let wire = [STX, 0x4B, 0x1E, 0x4B, 0x2D, ETX, 0xA5, 0x5A];
        assert_eq!(feed_all(&mut rx, &wire), Some(Step::Ready));
        assert_eq!(rx.packet(), Some(&[0x41, 0x42][..]));
        assert_eq!(rx.len(), 2);
        assert_eq!(rx.error_count(), 0);
        assert_eq!(rx.frame_start(), Some(7));
    }

    #[test]
    fn noise_before_start_is_not_an_error() {
        let mut rx = Receiver::<u32>::new(10);
        assert_eq!(rx.feed(0x55, || 0), Step::Discarded);
        assert_eq!(rx.feed(ETX, || 0), Step::Discarded);
        assert_eq!(rx.feed(0x4B, || 0), Step::Discarded);
        assert!(!rx.is_frame_started());
        assert_eq!(rx.error_count(), 0);
    }

    #[test]
    fn invalid_unit_resets_with_error() {
        let mut rx = Receiver::<u32>::new(10);
        rx.feed(STX, || 1);
        assert_eq!(
            rx.feed(0x44, || 1),
            Step::Rejected(FrameError::InvalidUnit { found: 0x44 })
        );
        assert!(!rx.is_frame_started());
        assert_eq!(rx.frame_start(), None);
        assert_eq!(rx.error_counts().invalid_unit, 1);
        assert_eq!(rx.error_count(), 1);
    }

    #[test]
    fn end_marker_between_nibbles_is_invalid() {
        let mut rx = Receiver::<u32>::new(10);
        let step = feed_all(&mut rx, &[STX, 0x4B, ETX]);
        assert_eq!(step, Some(Step::Rejected(FrameError::InvalidUnit { found: ETX })));
        assert_eq!(rx.error_count(), 1);
    }

    #[test]
    fn overflow_never_truncates() {
        let mut rx = Receiver::<u32>::new(2);
        let step = feed_all(&mut rx, &frame(&[1, 2, 3]));
        assert_eq!(step, Some(Step::Rejected(FrameError::Overflow { capacity: 2 })));
        assert!(!rx.is_packet_ready());
        assert_eq!(rx.error_counts().overflow, 1);
    }

    #[test]
    fn bad_checksum_is_rejected() {
        let mut rx = Receiver::<u32>::new(10);
        let mut wire = frame(&[0x41, 0x42]);
        let n = wire.len();
        // 0xA5 -> 0xA4 as the CRC
        wire[n - 1] = 0x4B;
        let step = feed_all(&mut rx, &wire);
        assert_eq!(
            step,
            Some(Step::Rejected(FrameError::ChecksumMismatch {
                calculated: 0xA5,
                found: 0xA4
            }))
        );
        assert_eq!(rx.error_counts().checksum, 1);
    }

    #[test]
    fn start_marker_resynchronises() {
        let mut rx = Receiver::new(10);
        let mut wire: heapless::Vec<u8, 64> = heapless::Vec::new();
        wire.extend_from_slice(&[STX, 0x4B, 0xB4, 0x1E]).unwrap();
        wire.extend_from_slice(&frame(&[9, 8, 7])).unwrap();
        assert_eq!(feed_all(&mut rx, &wire), Some(Step::Ready));
        assert_eq!(rx.packet(), Some(&[9, 8, 7][..]));
        assert_eq!(rx.error_count(), 0);
    }

    #[test]
    fn empty_frame_is_accepted() {
        let mut rx = Receiver::<u32>::new(4);
        assert_eq!(feed_all(&mut rx, &[STX, ETX, 0x0F, 0x0F]), Some(Step::Ready));
        assert_eq!(rx.packet(), Some(&[][..]));
    }

    #[test]
    fn held_packet_ignores_bytes_until_reset() {
        let mut rx = Receiver::new(10);
        feed_all(&mut rx, &frame(&[1]));
        assert!(!rx.is_frame_started());
        assert_eq!(rx.frame_start(), Some(7));
        assert_eq!(rx.feed(0x0F, || 0), Step::Discarded);
        assert_eq!(rx.feed(ETX, || 0), Step::Discarded);
        assert_eq!(rx.packet(), Some(&[1][..]));
        assert_eq!(rx.error_count(), 0);
        rx.reset();
        assert!(rx.packet().is_none());
        assert!(!rx.is_frame_started());
    }

    #[test]
    fn capacity_is_clamped() {
        let rx = Receiver::<()>::new(1000);
        assert_eq!(rx.capacity(), MAX_PAYLOAD_SIZE);
    }

    #[test]
    fn decode_finds_first_good_frame() {
        let mut wire: heapless::Vec<u8, 64> = heapless::Vec::new();
        wire.extend_from_slice(&[0xFF, STX, 0x12]).unwrap();
        wire.extend_from_slice(&frame(b"hi")).unwrap();
        let packet = Packet::decode(&wire).unwrap();
        assert_eq!(packet.data.as_slice(), b"hi");
    }

    #[test]
    fn decode_reports_errors() {
        assert_eq!(Packet::decode(&frame(b"hi")[..4]), Err(DecodeError::Incomplete));
        assert_eq!(
            Packet::decode(&[STX, 0x12]),
            Err(DecodeError::Frame(FrameError::InvalidUnit { found: 0x12 }))
        );
        assert_eq!(Packet::decode(&[]), Err(DecodeError::Incomplete));
    }
}
