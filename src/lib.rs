//! Non-blocking framing for half-duplex RS485 style links.
//!
//! Every frame on the wire looks like
//!
//! ```text
//! STX (0x02) | payload units | ETX (0x03) | CRC units
//! ```
//!
//! where each payload or CRC byte goes out as two units, one per nibble, each
//! unit carrying the nibble in its top half and the nibble's complement in its
//! bottom half. A corrupted unit is caught on its own; anything that slips
//! past is caught by the Dallas/Maxim CRC-8 over the payload.
//!
//! [`Session`] is the piece a control loop talks to: call
//! [`poll`](Session::poll) as often as convenient and it decodes whatever the
//! transport has buffered without ever waiting on it.

#![cfg_attr(not(test), no_std)]

pub mod codec;
pub mod loopback;
pub mod receiver;
pub mod sender;
pub mod serial;
pub mod session;
pub mod transport;

pub trait Encode {
    type Error;

    /// Write the encoded form into `buffer`, returning how many bytes it took.
    fn encode(&self, buffer: &mut [u8]) -> Result<usize, Self::Error>;
}

pub trait Decode<'a>
where
    Self: Sized,
{
    type Error;

    fn decode(data: &'a [u8]) -> Result<Self, Self::Error>;
}

pub use codec::{ETX, MAX_ENCODED_SIZE, MAX_PAYLOAD_SIZE, STX, crc8, encoded_len};
pub use loopback::Loopback;
pub use receiver::{DecodeError, ErrorCounts, FrameError, Packet, Receiver, Step};
pub use sender::{EncodeError, Message, send_message};
pub use serial::{BufferedRx, BufferedTx, IoSink, IoSource};
pub use session::{Session, SessionError};
pub use transport::{ByteSink, ByteSource, Clock};
