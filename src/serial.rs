//! Adapters from the `embedded-hal-nb` and `embedded-io` serial traits to the
//! [`ByteSource`]/[`ByteSink`] capabilities.

extern crate alloc;

use alloc::collections::VecDeque;
use embedded_hal_nb::serial::{Read, Write};
use log::warn;

use crate::transport::{ByteSink, ByteSource};

/// Pulls everything a non-blocking serial reader has into a queue, so the
/// receiver can ask how much is waiting.
#[derive(Debug)]
pub struct BufferedRx<Rx: Read> {
    pub rx: Rx,
    pub buf: VecDeque<u8>,
}

impl<Rx: Read> BufferedRx<Rx> {
    pub fn new(rx: Rx) -> BufferedRx<Rx> {
        BufferedRx {
            rx,
            buf: VecDeque::new(),
        }
    }

    /// Load as much as we can from rx into the internal buf, until it would
    /// block. A read error is logged and ends the drain; whatever the UART
    /// lost shows up as a broken frame further up.
    pub fn buffer(&mut self) {
        loop {
            match self.rx.read() {
                Ok(x) => self.buf.push_back(x),
                Err(nb::Error::WouldBlock) => break,
                Err(nb::Error::Other(e)) => {
                    warn!("serial read error: {:?}", e);
                    break;
                }
            }
        }
    }

    pub fn into_inner(self) -> Rx {
        self.rx
    }
}

impl<Rx: Read> ByteSource for BufferedRx<Rx> {
    fn bytes_available(&mut self) -> usize {
        self.buffer();
        self.buf.len()
    }

    fn read_byte(&mut self) -> Option<u8> {
        self.buf.pop_front()
    }
}

/// Queues outgoing bytes and hands them to the peripheral on `flush`, never
/// waiting on a full transmit register.
#[derive(Debug)]
pub struct BufferedTx<Tx: Write> {
    tx: Tx,
    pub buf: VecDeque<u8>,
}

impl<Tx: Write> BufferedTx<Tx> {
    pub fn new(tx: Tx) -> BufferedTx<Tx> {
        BufferedTx {
            tx,
            buf: VecDeque::new(),
        }
    }

    /// Push queued bytes out until the peripheral would block. Ok once the
    /// queue is empty.
    pub fn flush(&mut self) -> nb::Result<(), Tx::Error> {
        while let Some(&x) = self.buf.front() {
            // Attempt to write, and we'll drop out if write WouldBlock or Err
            self.tx.write(x)?;
            self.buf.pop_front();
        }
        self.tx.flush()
    }

    pub fn into_inner(self) -> Tx {
        self.tx
    }
}

impl<Tx: Write> ByteSink for BufferedTx<Tx> {
    fn write_byte(&mut self, byte: u8) {
        self.buf.push_back(byte);
    }
}

/// Receive side over an `embedded-io` stream that can say whether a read
/// would return immediately.
#[derive(Debug)]
pub struct IoSource<R> {
    inner: R,
}

impl<R: embedded_io::Read + embedded_io::ReadReady> IoSource<R> {
    pub fn new(inner: R) -> IoSource<R> {
        IoSource { inner }
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: embedded_io::Read + embedded_io::ReadReady> ByteSource for IoSource<R> {
    fn bytes_available(&mut self) -> usize {
        match self.inner.read_ready() {
            Ok(ready) => usize::from(ready),
            Err(e) => {
                warn!("read_ready failed: {:?}", e);
                0
            }
        }
    }

    fn read_byte(&mut self) -> Option<u8> {
        let mut b = [0; 1];
        match self.inner.read(&mut b) {
            Ok(1) => Some(b[0]),
            Ok(_) => None,
            Err(e) => {
                warn!("read failed: {:?}", e);
                None
            }
        }
    }
}

/// Transmit side over a blocking `embedded-io` writer.
#[derive(Debug)]
pub struct IoSink<W> {
    inner: W,
}

impl<W: embedded_io::Write> IoSink<W> {
    pub fn new(inner: W) -> IoSink<W> {
        IoSink { inner }
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: embedded_io::Write> ByteSink for IoSink<W> {
    fn write_byte(&mut self, byte: u8) {
        if let Err(e) = self.inner.write_all(&[byte]) {
            warn!("write failed: {:?}", e);
        }
    }
}
