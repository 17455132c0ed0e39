//! UHF command builders and reply parsers.
//!
//! Functions here construct command text for the ASCII protocol and
//! parse model-specific replies. All functions are pure; the engine in
//! `taglink-ascii` handles CRC suffixes, terminators, and I/O.

use taglink_ascii::codes;
use taglink_core::error::{Error, Result};

/// Build a single-shot inventory command (`INV`).
pub fn cmd_inventory() -> String {
    "INV".to_string()
}

/// Build a continuous inventory command (`CNR INV`).
///
/// `CNR` re-issues the wrapped command after every round until a break
/// arrives.
pub fn cmd_continuous_inventory() -> String {
    "CNR INV".to_string()
}

/// Build a "set RF output power" command (`PWR {dbm}`).
///
/// Range checking is the caller's job; the model table knows the limits.
pub fn cmd_set_power(dbm: u8) -> String {
    format!("PWR {dbm}")
}

/// Build a "select antenna port" command (`SAP {port}`). Ports count
/// from 1.
pub fn cmd_select_antenna(port: u8) -> String {
    format!("SAP {port}")
}

/// Build a "set multiplex count" command (`SMX {count}`).
///
/// The reader cycles through this many antenna ports during inventory.
pub fn cmd_multiplex_count(count: u8) -> String {
    format!("SMX {count}")
}

/// Build a "set verbosity level" command (`VBL {level}`).
pub fn cmd_verbosity(level: u8) -> String {
    format!("VBL {level}")
}

/// Build a "query firmware revision" command (`REV`).
pub fn cmd_firmware_revision() -> String {
    "REV".to_string()
}

/// Build a "query hardware revision" command (`RHW`).
pub fn cmd_hardware_revision() -> String {
    "RHW".to_string()
}

/// Build a "soft reset" command (`RST`).
pub fn cmd_reset() -> String {
    "RST".to_string()
}

/// Build a "enter standby" command (`STB`). A wake command ends standby.
pub fn cmd_standby() -> String {
    "STB".to_string()
}

/// Build a "read GPIO input" command (`RIP {pin}`).
pub fn cmd_read_input(pin: u8) -> String {
    format!("RIP {pin}")
}

/// Build a "write GPIO output" command (`WOP {pin} {0|1}`).
pub fn cmd_write_output(pin: u8, level: bool) -> String {
    format!("WOP {} {}", pin, if level { 1 } else { 0 })
}

/// Build a "set heartbeat interval" command (`HBT {seconds}`); 0
/// disables the heartbeat.
pub fn cmd_heartbeat_interval(seconds: u16) -> String {
    format!("{} {}", codes::CMD_HEARTBEAT, seconds)
}

/// Build a CRC mode command (`CON` / `COF`).
pub fn cmd_crc_mode(enabled: bool) -> String {
    if enabled {
        codes::CMD_CRC_ON.to_string()
    } else {
        codes::CMD_CRC_OFF.to_string()
    }
}

/// Build an end-of-frame mode command (`EOF` / `NEF`).
pub fn cmd_end_of_frame(enabled: bool) -> String {
    if enabled {
        codes::CMD_END_OF_FRAME_ON.to_string()
    } else {
        codes::CMD_END_OF_FRAME_OFF.to_string()
    }
}

/// Parse the level token of a GPIO input reply.
///
/// Firmware revisions differ on how much they echo (`HI`, `2 HI`, or
/// the full command), so the level is taken from the last token.
pub fn parse_input_level(reply: &str) -> Result<bool> {
    match reply.split_ascii_whitespace().last() {
        Some("HI") => Ok(true),
        Some("LO") => Ok(false),
        _ => Err(Error::Protocol(format!(
            "unrecognized input level reply: {reply}"
        ))),
    }
}
