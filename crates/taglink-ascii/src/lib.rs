//! Wire protocol and IO engine for ASCII-protocol RFID readers.
//!
//! The readers speak a line-oriented ASCII protocol: short uppercase
//! commands terminated by a carriage return, replies and pushed traffic
//! (heartbeats, input changes, tag reports) interleaved on the same
//! stream. This crate implements the protocol layers and the IO task
//! that reader drivers in `taglink-uhf` are built on.
//!
//! # Architecture
//!
//! - [`crc`] — the CRC16 frame checksum
//! - [`frame`] — outbound frame encoding and inbound line scanning
//! - [`classify`] — telling pushes, markers, and replies apart
//! - [`codes`] — reply codes and the error taxonomy
//! - [`session`] — negotiated per-connection state
//! - [`handshake`] — break/wake negotiation and link configuration
//! - [`engine`] — the IO task: one owner for the transport, commands
//!   serialized over a channel, pushes fanned out as events

pub mod classify;
pub mod codes;
pub mod crc;
pub mod engine;
pub mod frame;
pub mod handshake;
pub mod session;

pub use engine::{spawn_engine, EngineConfig, ReaderEngine, Request};
pub use frame::LineScanner;
pub use handshake::negotiate;
pub use session::{Session, SessionApply};
