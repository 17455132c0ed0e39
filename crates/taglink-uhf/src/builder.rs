//! UhfReaderBuilder -- fluent builder for constructing [`UhfReader`]
//! instances.
//!
//! Separates link selection and timing configuration from connection
//! establishment: [`build()`](UhfReaderBuilder::build) returns a detached
//! reader, and [`connect()`](taglink_core::Reader::connect) opens the
//! transport and runs the handshake.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use taglink_core::Reader;
//! use taglink_uhf::builder::UhfReaderBuilder;
//! use taglink_uhf::models::tl_p400;
//!
//! # async fn example() -> taglink_core::Result<()> {
//! let reader = UhfReaderBuilder::new(tl_p400())
//!     .serial_port("/dev/ttyUSB0")
//!     .command_timeout(Duration::from_secs(1))
//!     .build()?;
//! reader.connect().await?;
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use taglink_ascii::EngineConfig;
use taglink_core::error::{Error, Result};

use crate::models::UhfModel;
use crate::reader::{Endpoint, UhfReader};

/// Fluent builder for [`UhfReader`].
///
/// Exactly one link must be chosen: either
/// [`serial_port()`](Self::serial_port) or
/// [`tcp_endpoint()`](Self::tcp_endpoint). Everything else has defaults
/// derived from the [`UhfModel`].
pub struct UhfReaderBuilder {
    model: UhfModel,
    serial_port: Option<String>,
    baud_rate: Option<u32>,
    tcp_endpoint: Option<String>,
    handshake_timeout: Duration,
    engine_config: EngineConfig,
}

impl UhfReaderBuilder {
    /// Create a new builder for the given reader model.
    pub fn new(model: UhfModel) -> Self {
        UhfReaderBuilder {
            model,
            serial_port: None,
            baud_rate: None,
            tcp_endpoint: None,
            handshake_timeout: Duration::from_secs(2),
            engine_config: EngineConfig::default(),
        }
    }

    /// Reach the reader over a serial port, e.g. `/dev/ttyUSB0` or `COM3`.
    pub fn serial_port(mut self, port: &str) -> Self {
        self.serial_port = Some(port.to_string());
        self
    }

    /// Use a non-factory baud rate instead of the model default.
    pub fn baud_rate(mut self, baud: u32) -> Self {
        self.baud_rate = Some(baud);
        self
    }

    /// Set the TCP endpoint as `host:port`.
    ///
    /// A bare host gets the model's default port appended.
    pub fn tcp_endpoint(mut self, addr: &str) -> Self {
        self.tcp_endpoint = Some(addr.to_string());
        self
    }

    /// Set the per-reply wait during the connection handshake
    /// (default: 2s). A sleeping reader doubles this once for the wake
    /// retry.
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Set the timeout for a single command/reply exchange (default: 2s).
    pub fn command_timeout(mut self, timeout: Duration) -> Self {
        self.engine_config.command_timeout = timeout;
        self
    }

    /// Set the timeout for a single-shot inventory round (default: 5s).
    /// Large tag populations need room for one line per tag.
    pub fn inventory_timeout(mut self, timeout: Duration) -> Self {
        self.engine_config.inventory_timeout = timeout;
        self
    }

    /// Build a detached [`UhfReader`].
    ///
    /// Validates that exactly one link was chosen and that the model
    /// supports it. No I/O happens here; call
    /// [`connect()`](taglink_core::Reader::connect) on the result.
    pub fn build(self) -> Result<UhfReader> {
        let endpoint = match (self.serial_port, self.tcp_endpoint) {
            (None, None) => {
                return Err(Error::InvalidParameter(
                    "a serial port or a TCP endpoint is required".into(),
                ))
            }
            (Some(_), Some(_)) => {
                return Err(Error::InvalidParameter(
                    "serial port and TCP endpoint are mutually exclusive".into(),
                ))
            }
            (Some(port), None) => {
                if !self.model.link.allows_serial() {
                    return Err(Error::InvalidParameter(format!(
                        "{} has no serial interface",
                        self.model.name
                    )));
                }
                Endpoint::Serial {
                    port,
                    baud_rate: self.baud_rate.unwrap_or(self.model.default_baud_rate),
                }
            }
            (None, Some(addr)) => {
                if !self.model.link.allows_tcp() {
                    return Err(Error::InvalidParameter(format!(
                        "{} has no network interface",
                        self.model.name
                    )));
                }
                let addr = if addr.contains(':') {
                    addr
                } else {
                    format!("{addr}:{}", self.model.default_tcp_port)
                };
                Endpoint::Tcp { addr }
            }
        };

        Ok(UhfReader::new(
            self.model,
            endpoint,
            self.handshake_timeout,
            self.engine_config,
        ))
    }
}
