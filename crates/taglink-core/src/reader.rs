//! The `Reader` trait -- unified interface for all reader backends.
//!
//! This trait is the primary API surface of taglink. Inventory services,
//! access-control daemons, and test tooling program against `dyn Reader`
//! without needing to know which reader family is on the other end of the
//! link.
//!
//! Each reader family crate (taglink-uhf, and AT-variant crates in the
//! future) provides a concrete type that implements this trait on top of
//! the shared protocol engine.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::error::{Error, Result};
use crate::events::ReaderEvent;
use crate::types::ReaderIdentity;

/// Unified asynchronous interface for controlling an RFID reader.
///
/// All methods that communicate with the device are `async` because the
/// underlying transport involves serial I/O or network round-trips. The
/// command primitives (`execute_command`, `set_command`, `get_command`)
/// are the surface on which model-specific operations are built; the
/// inventory and configuration methods are conveniences over them.
///
/// # Event Subscription
///
/// Use [`subscribe()`](Reader::subscribe) to obtain a broadcast receiver
/// for tag inventories, GPIO changes, and connection status. Continuous
/// scanning only makes sense with a subscriber attached.
#[async_trait]
pub trait Reader: Send + Sync {
    /// Open the transport and run the connection handshake.
    ///
    /// Idempotent: connecting an already-connected reader is a no-op.
    async fn connect(&self) -> Result<()>;

    /// Stop background processing and release the transport.
    ///
    /// Idempotent, and safe to call while reads are in flight.
    async fn disconnect(&self) -> Result<()>;

    /// Check whether a session is currently established.
    fn is_connected(&self) -> bool;

    /// Obtain a broadcast receiver for reader events.
    ///
    /// Multiple subscribers can be created; each gets an independent copy
    /// of every event.
    fn subscribe(&self) -> broadcast::Receiver<ReaderEvent>;

    /// Firmware/hardware identity captured during the handshake.
    async fn identity(&self) -> Result<ReaderIdentity>;

    /// Execute a raw command and return its reply line verbatim.
    ///
    /// The reply retains any CRC suffix (already validated when CRC mode
    /// is active). Most callers want [`set_command`](Reader::set_command)
    /// or [`get_command`](Reader::get_command) instead.
    async fn execute_command(&self, command: &str, timeout: Duration) -> Result<String>;

    /// Execute a configuration command that must be acknowledged.
    ///
    /// Fails with a typed error when the reply carries anything other
    /// than the affirmative acknowledgement token.
    async fn set_command(&self, command: &str) -> Result<()>;

    /// Execute a query command and return its CRC-stripped payload.
    async fn get_command(&self, command: &str) -> Result<String>;

    /// Start continuous-scan mode.
    ///
    /// Tag rounds are delivered as [`ReaderEvent::TagInventory`] events
    /// until [`stop_inventory`](Reader::stop_inventory) is called. The
    /// start command itself is fire-and-forget; it produces no reply.
    async fn start_inventory(&self) -> Result<()>;

    /// Stop continuous-scan mode.
    async fn stop_inventory(&self) -> Result<()>;

    /// Run a single inventory round and return the raw tag frames.
    ///
    /// Also publishes the round as a [`ReaderEvent::TagInventory`] event
    /// for any subscribers.
    async fn get_inventory(&self) -> Result<Vec<String>>;

    /// Set the heartbeat interval in seconds; `0` disables the heartbeat.
    async fn set_heartbeat_interval(&self, seconds: u16) -> Result<()>;

    /// Select the active antenna port.
    async fn set_antenna(&self, port: u8) -> Result<()>;

    /// Set the number of antenna ports cycled during inventory.
    async fn set_multiplex_count(&self, count: u8) -> Result<()> {
        let _ = count;
        Err(Error::Unsupported(
            "antenna multiplexing not supported".into(),
        ))
    }

    /// Set the response verbosity level.
    async fn set_verbosity(&self, level: u8) -> Result<()>;

    /// Enable or disable CRC protection on both directions of the link.
    async fn set_crc_mode(&self, enabled: bool) -> Result<()>;

    /// Enable or disable end-of-frame mode (CR vs. CR+LF termination).
    async fn set_end_of_frame(&self, enabled: bool) -> Result<()>;

    /// Set RF output power in dBm.
    ///
    /// Range depends on the model; out-of-range values are rejected
    /// before touching the wire.
    async fn set_power(&self, dbm: u8) -> Result<()> {
        let _ = dbm;
        Err(Error::Unsupported("power control not supported".into()))
    }

    /// Read the current level of a GPIO input pin.
    async fn read_input(&self, pin: u8) -> Result<bool> {
        let _ = pin;
        Err(Error::Unsupported("GPIO inputs not supported".into()))
    }

    /// Drive a GPIO output pin.
    async fn set_output(&self, pin: u8, level: bool) -> Result<()> {
        let _ = (pin, level);
        Err(Error::Unsupported("GPIO outputs not supported".into()))
    }
}
