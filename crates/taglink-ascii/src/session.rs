//! Per-connection protocol session state.

use taglink_core::types::ReaderIdentity;

/// Negotiated and configured protocol state for one reader connection.
///
/// Created with safe defaults before the handshake, mutated by the
/// handshake and by acknowledged configuration commands, and read by the
/// IO task when encoding frames and routing replies. All mutation after
/// engine start happens inside the IO task, applied through
/// [`SessionApply`] once the reader acknowledges the command.
#[derive(Debug, Clone)]
pub struct Session {
    /// Frames in both directions carry a CRC16 suffix.
    pub crc_mode: bool,
    /// The reader terminates its lines with CR+LF instead of bare CR.
    pub end_of_frame: bool,
    /// Heartbeat interval in seconds; 0 disables the heartbeat.
    pub heartbeat_interval: u16,
    /// Currently selected antenna port.
    pub antenna: u8,
    /// Firmware and hardware identity, filled after the handshake.
    pub identity: ReaderIdentity,
    /// Continuous-scan mode is active and tag lines arrive as pushes.
    pub push_mode: bool,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            crc_mode: false,
            end_of_frame: false,
            heartbeat_interval: 0,
            antenna: 0,
            identity: ReaderIdentity::default(),
            push_mode: false,
        }
    }
}

/// A session field update applied after a command is acknowledged.
///
/// Configuration commands change reader state only once the reader
/// accepts them, so the matching session update is carried alongside the
/// request and applied by the IO task on an affirmative reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionApply {
    /// No session change.
    None,
    CrcMode(bool),
    EndOfFrame(bool),
    HeartbeatInterval(u16),
    Antenna(u8),
    PushMode(bool),
}

impl Session {
    /// Apply an acknowledged field update.
    pub fn apply(&mut self, change: SessionApply) {
        match change {
            SessionApply::None => {}
            SessionApply::CrcMode(on) => self.crc_mode = on,
            SessionApply::EndOfFrame(on) => self.end_of_frame = on,
            SessionApply::HeartbeatInterval(secs) => self.heartbeat_interval = secs,
            SessionApply::Antenna(port) => self.antenna = port,
            SessionApply::PushMode(on) => self.push_mode = on,
        }
    }
}
