//! Transport implementations for taglink.
//!
//! This crate provides concrete implementations of the
//! [`Transport`](taglink_core::Transport) trait from `taglink-core` for
//! the physical connection types the reader family ships with:
//!
//! - [`SerialTransport`]: USB virtual COM ports and RS-232 serial
//!   connections (desktop and panel readers)
//! - [`TcpTransport`]: TCP connections for Ethernet-attached gate and
//!   portal readers
//!
//! # Example
//!
//! ```no_run
//! use taglink_transport::TcpTransport;
//! use taglink_core::transport::Transport;
//! use std::time::Duration;
//!
//! # async fn example() -> taglink_core::Result<()> {
//! // A portal reader on the factory network.
//! let mut transport = TcpTransport::connect("10.0.0.5:2101").await?;
//! transport.send(b"REV\r").await?;
//!
//! let mut buf = [0u8; 128];
//! let n = transport.receive(&mut buf, Duration::from_millis(500)).await?;
//! println!("firmware: {}", String::from_utf8_lossy(&buf[..n]).trim_end());
//! # Ok(())
//! # }
//! ```

pub mod serial;
pub mod tcp;

pub use serial::{DataBits, Parity, SerialConfig, SerialTransport, StopBits};
pub use tcp::TcpTransport;
