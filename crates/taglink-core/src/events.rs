//! Asynchronous reader event types.
//!
//! Events are emitted by reader drivers through a [`tokio::sync::broadcast`]
//! channel: tag inventories arriving in continuous-scan mode, GPIO input
//! transitions, and connection lifecycle changes. Access-control and
//! inventory applications subscribe to these instead of polling.

use std::time::SystemTime;

use crate::types::ConnectionState;

/// An event emitted by a reader driver.
///
/// Subscribe via [`crate::reader::Reader::subscribe()`]. Events are
/// delivered on a best-effort basis through a bounded broadcast channel;
/// slow consumers may miss events under heavy load (e.g. a dense tag
/// population in continuous-scan mode).
#[derive(Debug, Clone)]
pub enum ReaderEvent {
    /// A tag inventory round arrived.
    ///
    /// Emitted for every round while continuous scanning is active, and
    /// once per [`get_inventory`](crate::reader::Reader::get_inventory)
    /// call. `frames` holds the raw tag frame text in arrival order;
    /// interpreting the frames (EPC layout, RSSI suffix) is up to the
    /// subscriber.
    TagInventory {
        /// When the round was received.
        timestamp: SystemTime,
        /// Raw tag frames, one per tag, in arrival order.
        frames: Vec<String>,
    },

    /// A GPIO input pin changed level.
    InputChanged {
        /// Input pin number as reported by the reader.
        pin: u8,
        /// `true` for high, `false` for low.
        level: bool,
    },

    /// The connection lifecycle state changed.
    ConnectionStatus {
        /// New state.
        state: ConnectionState,
        /// Human-readable context (endpoint, error text on loss, ...).
        message: String,
    },
}
