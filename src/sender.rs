use core::fmt;

use log::debug;

use crate::{
    Encode,
    codec::{self, ETX, MAX_PAYLOAD_SIZE, STX},
    transport::ByteSink,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeError {
    EmptyPayload,
    PayloadTooLarge { found: usize },
    BufferTooSmall { expected: usize, found: usize },
}

impl fmt::Display for EncodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncodeError::EmptyPayload => write!(f, "payload is empty"),
            EncodeError::PayloadTooLarge { found } => write!(
                f,
                "payload of {found} bytes exceeds {MAX_PAYLOAD_SIZE}"
            ),
            EncodeError::BufferTooSmall { expected, found } => write!(
                f,
                "encode buffer holds {found} bytes, frame needs {expected}"
            ),
        }
    }
}

impl core::error::Error for EncodeError {}

/// A payload of 1 to 255 bytes about to go on the wire.
#[derive(Debug, Clone, Copy)]
pub struct Message<'a> {
    data: &'a [u8],
}

impl<'a> Message<'a> {
    pub fn new(data: &'a [u8]) -> Message<'a> {
        Message { data }
    }

    pub fn check(&self) -> Result<(), EncodeError> {
        match self.data.len() {
            0 => Err(EncodeError::EmptyPayload),
            n if n > MAX_PAYLOAD_SIZE => Err(EncodeError::PayloadTooLarge { found: n }),
            _ => Ok(()),
        }
    }

    /// Length of the encoded frame, markers and CRC included.
    pub fn size(&self) -> usize {
        codec::encoded_len(self.data.len())
    }

    pub fn crc(&self) -> u8 {
        codec::crc8(self.data)
    }

    /// Wire bytes in order: STX, payload units, ETX, CRC units.
    pub fn bytes(&self) -> impl Iterator<Item = u8> + '_ {
        let payload = self.data.iter().flat_map(|b| codec::encode_byte(*b));
        core::iter::once(STX)
            .chain(payload)
            .chain(core::iter::once(ETX))
            .chain(codec::encode_byte(self.crc()))
    }
}

impl Encode for Message<'_> {
    type Error = EncodeError;

    fn encode(&self, buffer: &mut [u8]) -> Result<usize, Self::Error> {
        self.check()?;
        let size = self.size();
        if buffer.len() < size {
            return Err(EncodeError::BufferTooSmall {
                expected: size,
                found: buffer.len(),
            });
        }
        for (slot, byte) in buffer.iter_mut().zip(self.bytes()) {
            *slot = byte;
        }
        Ok(size)
    }
}

/// Write one whole frame for `payload` to `tx`. Nothing is awaited.
pub fn send_message<Tx: ByteSink>(tx: &mut Tx, payload: &[u8]) -> Result<(), EncodeError> {
    let message = Message::new(payload);
    message.check()?;
    for byte in message.bytes() {
        tx.write_byte(byte);
    }
    debug!("sent {} byte payload as {} byte frame", payload.len(), message.size());
    Ok(())
}
