//! Serial port transport for reader communication.
//!
//! This module provides [`SerialTransport`], which implements the
//! [`Transport`] trait for USB virtual COM ports and physical RS-232
//! serial connections.
//!
//! Desktop and panel readers enumerate as USB CDC devices and speak the
//! ASCII protocol at 115200 baud, 8 data bits, no parity, 1 stop bit.
//! Older RS-232 models run the same framing at lower rates.
//!
//! # Example
//!
//! ```no_run
//! use taglink_transport::SerialTransport;
//! use taglink_core::transport::Transport;
//! use std::time::Duration;
//!
//! # async fn example() -> taglink_core::Result<()> {
//! let mut transport = SerialTransport::open("/dev/ttyUSB0", 115200).await?;
//!
//! // Query the firmware revision
//! transport.send(b"REV\r").await?;
//!
//! let mut buf = [0u8; 128];
//! let n = transport.receive(&mut buf, Duration::from_millis(500)).await?;
//! println!("reply: {}", String::from_utf8_lossy(&buf[..n]));
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use std::time::Duration;
use taglink_core::error::{Error, Result};
use taglink_core::transport::Transport;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_serial::{SerialPortBuilderExt, SerialStream};

/// Serial port configuration.
///
/// Defaults match the reader family's factory settings: 115200 baud,
/// 8 data bits, 1 stop bit, no parity.
#[derive(Debug, Clone)]
pub struct SerialConfig {
    /// Line speed in bits per second.
    pub baud_rate: u32,
    /// Data bits per character frame.
    pub data_bits: DataBits,
    /// Stop bits terminating each character frame.
    pub stop_bits: StopBits,
    /// Parity scheme, `None` for all known reader firmware.
    pub parity: Parity,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            baud_rate: 115200,
            data_bits: DataBits::Eight,
            stop_bits: StopBits::One,
            parity: Parity::None,
        }
    }
}

/// Data bits carried in each character frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataBits {
    Five,
    Six,
    Seven,
    Eight,
}

impl From<DataBits> for tokio_serial::DataBits {
    fn from(bits: DataBits) -> Self {
        match bits {
            DataBits::Five => tokio_serial::DataBits::Five,
            DataBits::Six => tokio_serial::DataBits::Six,
            DataBits::Seven => tokio_serial::DataBits::Seven,
            DataBits::Eight => tokio_serial::DataBits::Eight,
        }
    }
}

/// Stop bits sent after each character frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopBits {
    One,
    Two,
}

impl From<StopBits> for tokio_serial::StopBits {
    fn from(bits: StopBits) -> Self {
        match bits {
            StopBits::One => tokio_serial::StopBits::One,
            StopBits::Two => tokio_serial::StopBits::Two,
        }
    }
}

/// Parity bit scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parity {
    None,
    Odd,
    Even,
}

impl From<Parity> for tokio_serial::Parity {
    fn from(parity: Parity) -> Self {
        match parity {
            Parity::None => tokio_serial::Parity::None,
            Parity::Odd => tokio_serial::Parity::Odd,
            Parity::Even => tokio_serial::Parity::Even,
        }
    }
}

/// Serial port transport for reader communication.
///
/// Wraps a [`SerialStream`] and surfaces it through the [`Transport`]
/// trait, covering both USB CDC devices and true RS-232 ports.
pub struct SerialTransport {
    /// The underlying serial port stream, `None` after `close()`.
    port: Option<SerialStream>,
    /// Port name for logging/debugging.
    port_name: String,
    /// Configured baud rate, reported by [`Transport::baud_rate`].
    baud_rate: u32,
}

impl SerialTransport {
    /// Open a serial port at the given baud rate with 8N1 framing.
    ///
    /// `port` is the device path: `/dev/ttyUSB0` on Linux, `COM3` on
    /// Windows.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use taglink_transport::SerialTransport;
    /// # async fn example() -> taglink_core::Result<()> {
    /// let transport = SerialTransport::open("/dev/ttyUSB0", 115200).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn open(port: &str, baud_rate: u32) -> Result<Self> {
        let config = SerialConfig {
            baud_rate,
            ..Default::default()
        };
        Self::open_with_config(port, config).await
    }

    /// Open a serial port with explicit line settings.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use taglink_transport::{SerialTransport, SerialConfig, StopBits};
    /// # async fn example() -> taglink_core::Result<()> {
    /// let config = SerialConfig {
    ///     baud_rate: 57600,
    ///     stop_bits: StopBits::Two,
    ///     ..Default::default()
    /// };
    /// let link = SerialTransport::open_with_config("/dev/ttyACM0", config).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn open_with_config(port: &str, config: SerialConfig) -> Result<Self> {
        tracing::debug!(
            port = %port,
            baud_rate = config.baud_rate,
            data_bits = ?config.data_bits,
            stop_bits = ?config.stop_bits,
            parity = ?config.parity,
            "opening serial port"
        );

        let serial_stream = tokio_serial::new(port, config.baud_rate)
            .data_bits(config.data_bits.into())
            .stop_bits(config.stop_bits.into())
            .parity(config.parity.into())
            .open_native_async()
            .map_err(|e| {
                tracing::error!(port = %port, error = %e, "open failed");
                Error::Transport(format!("failed to open serial port {port}: {e}"))
            })?;

        tracing::info!(port = %port, baud_rate = config.baud_rate, "serial port open");

        Ok(Self {
            port: Some(serial_stream),
            port_name: port.to_string(),
            baud_rate: config.baud_rate,
        })
    }

    /// The device path this transport was opened on.
    pub fn port_name(&self) -> &str {
        &self.port_name
    }
}

/// Fold an I/O error into the right error variant. A USB adapter being
/// unplugged surfaces as a broken pipe, which is a lost link, not a
/// generic I/O failure.
fn classify_io_error(e: std::io::Error) -> Error {
    use std::io::ErrorKind;
    match e.kind() {
        ErrorKind::BrokenPipe | ErrorKind::NotConnected => Error::ConnectionLost,
        _ => Error::Io(e),
    }
}

#[async_trait]
impl Transport for SerialTransport {
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        let port = self.port.as_mut().ok_or(Error::NotConnected)?;

        tracing::trace!(
            port = %self.port_name,
            bytes = data.len(),
            data = %String::from_utf8_lossy(data).escape_debug(),
            "send"
        );

        port.write_all(data).await.map_err(|e| {
            tracing::error!(port = %self.port_name, error = %e, "send failed");
            classify_io_error(e)
        })?;

        port.flush().await.map_err(|e| {
            tracing::error!(port = %self.port_name, error = %e, "flush failed");
            classify_io_error(e)
        })?;

        Ok(())
    }

    async fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        let port = self.port.as_mut().ok_or(Error::NotConnected)?;

        match tokio::time::timeout(timeout, port.read(buf)).await {
            Ok(Ok(n)) => {
                tracing::trace!(
                    port = %self.port_name,
                    bytes = n,
                    data = %String::from_utf8_lossy(&buf[..n]).escape_debug(),
                    "recv"
                );
                Ok(n)
            }
            Ok(Err(e)) => {
                tracing::error!(port = %self.port_name, error = %e, "receive failed");
                Err(classify_io_error(e))
            }
            Err(_) => {
                tracing::trace!(
                    port = %self.port_name,
                    timeout_ms = timeout.as_millis(),
                    "receive timed out"
                );
                Err(Error::Timeout)
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(mut port) = self.port.take() {
            tracing::debug!(port = %self.port_name, "closing serial port");

            if let Err(e) = port.flush().await {
                tracing::warn!(port = %self.port_name, error = %e, "flush before close failed");
            }

            // Dropping the stream here releases the descriptor.
            tracing::info!(port = %self.port_name, "serial port closed");
        }

        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.port.is_some()
    }

    fn baud_rate(&self) -> Result<u32> {
        Ok(self.baud_rate)
    }
}

impl Drop for SerialTransport {
    fn drop(&mut self) {
        if self.port.is_some() {
            tracing::debug!(port = %self.port_name, "dropped with the port still open");
        }
    }
}
