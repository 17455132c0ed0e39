//! Transport trait for reader communication.
//!
//! The [`Transport`] trait abstracts over the physical link to an RFID
//! reader. Implementations exist for serial ports (USB virtual COM, RS-232)
//! and TCP sockets (Ethernet reader models), and for mock transports in
//! tests.
//!
//! The protocol engine in `taglink-ascii` operates on a `Transport` rather
//! than directly on a serial port, enabling both real hardware control and
//! deterministic unit testing with `MockTransport` from the
//! `taglink-test-harness` crate.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::{Error, Result};

/// Asynchronous byte-level transport to a reader.
///
/// Implementations handle buffering and error recovery at the physical
/// layer. Protocol-level concerns (line termination, CRC suffixes, response
/// classification) are handled by the engine that consumes this trait.
///
/// Exactly one medium-specific parameter exists per implementation: the
/// baud rate on serial links, the network endpoint on sockets. Reading the
/// parameter of the other medium is a usage error and returns
/// [`Error::Unsupported`], never a silent default.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send raw bytes to the reader.
    ///
    /// Implementations block until all bytes have been written to the
    /// underlying transport (serial TX buffer, TCP socket). A partial
    /// write is an error, not a success state.
    async fn send(&mut self, data: &[u8]) -> Result<()>;

    /// Receive bytes from the reader into the provided buffer.
    ///
    /// Returns the number of bytes actually read. Waits up to `timeout`
    /// for data to arrive; returns [`Error::Timeout`] if no data is
    /// received within the deadline.
    async fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize>;

    /// Shut the channel down.
    ///
    /// Idempotent. After calling `close()`, subsequent `send()` and
    /// `receive()` calls return [`Error::NotConnected`].
    async fn close(&mut self) -> Result<()>;

    /// Whether the channel is currently open.
    fn is_connected(&self) -> bool;

    /// The configured baud rate, for serial-backed transports.
    fn baud_rate(&self) -> Result<u32> {
        Err(Error::Unsupported(
            "baud rate is only available on serial transports".into(),
        ))
    }

    /// The remote endpoint (`host:port`), for network-backed transports.
    fn endpoint(&self) -> Result<String> {
        Err(Error::Unsupported(
            "endpoint is only available on network transports".into(),
        ))
    }
}
