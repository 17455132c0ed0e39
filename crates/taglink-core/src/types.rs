//! Core types used throughout taglink.
//!
//! These types are protocol-agnostic: they describe connection lifecycle
//! and device identity without reference to any particular command set.

use std::fmt;

/// Lifecycle state of a reader connection.
///
/// Carried by [`ReaderEvent::ConnectionStatus`](crate::events::ReaderEvent)
/// so subscribers can track the session without polling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// Transport is being opened and the handshake is in progress.
    Connecting,
    /// Handshake completed; commands and events are live.
    Connected,
    /// The session ended, either by request or by link loss.
    Disconnected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Disconnected => "disconnected",
        };
        write!(f, "{s}")
    }
}

/// Reader family, i.e. which protocol driver crate services a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReaderFamily {
    /// TL-series UHF readers (taglink-uhf).
    Uhf,
}

impl fmt::Display for ReaderFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ReaderFamily::Uhf => "UHF",
        };
        write!(f, "{s}")
    }
}

/// A reader model available through taglink, described in
/// family-agnostic terms.
///
/// Obtained via `taglink::supported_readers()` (facade crate) or by
/// converting a family-specific model type (e.g. `UhfModel`) via its
/// `From` implementation. Useful for model-picker UIs and configuration
/// validation.
#[derive(Debug, Clone)]
pub struct ReaderDefinition {
    /// The reader family this model belongs to.
    pub family: ReaderFamily,
    /// Human-readable model name (e.g. "TL-P400").
    pub model_name: &'static str,
    /// Default serial baud rate; `None` for network-only models.
    pub default_baud_rate: Option<u32>,
    /// Default TCP port; `None` for serial-only models.
    pub default_tcp_port: Option<u16>,
    /// Number of antenna ports the model drives.
    pub antenna_count: u8,
}

/// Firmware and hardware identity strings reported by the reader.
///
/// Populated during the post-handshake identity query. Both fields are the
/// raw payload text of the respective query replies; the format varies by
/// firmware revision, so no further structure is imposed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReaderIdentity {
    /// Firmware name and revision, e.g. `"PANEL_M4 0312"`.
    pub firmware: String,
    /// Hardware revision string, e.g. `"HW 0100"`.
    pub hardware: String,
}

impl ReaderIdentity {
    /// `true` if no identity query has populated this record yet.
    pub fn is_empty(&self) -> bool {
        self.firmware.is_empty() && self.hardware.is_empty()
    }
}

impl fmt::Display for ReaderIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            write!(f, "(unidentified)")
        } else {
            write!(f, "{} / {}", self.firmware, self.hardware)
        }
    }
}
