//! Reply codes and the error taxonomy.
//!
//! Failure replies are fixed 3-letter codes. Hardware self-reports map
//! to [`Error::Hardware`] with a remediation hint, parser and framing
//! codes map to [`Error::Protocol`], and everything else is an
//! air-interface condition the caller may retry, passed through as
//! [`Error::TagCommunication`] with the raw code.

use taglink_core::error::Error;

/// Break command: interrupts whatever the reader is doing, including
/// continuous-scan mode, and elicits an acknowledgement.
pub const CMD_BREAK: &str = "BRK";

/// Wake command for readers in low-power sleep.
pub const CMD_WAKE: &str = "WAK";

/// Heartbeat interval command; takes the interval in seconds, 0 to
/// disable.
pub const CMD_HEARTBEAT: &str = "HBT";

/// Enable end-of-frame mode (replies terminated by CR+LF).
pub const CMD_END_OF_FRAME_ON: &str = "EOF";

/// Disable end-of-frame mode.
pub const CMD_END_OF_FRAME_OFF: &str = "NEF";

/// Enable CRC mode.
pub const CMD_CRC_ON: &str = "CON";

/// Disable CRC mode.
pub const CMD_CRC_OFF: &str = "COF";

/// Affirmative acknowledgement token carried by accepted set commands.
pub const ACK_OK: &str = "OK!";

/// Acknowledgement to a break command from a listening reader.
pub const ACK_BREAK: &str = "BRA";

/// "No command running" acknowledgement.
pub const ACK_NO_COMMAND: &str = "NCM";

/// Prefix of a mode-query reply.
pub const ACK_MODE_PREFIX: &str = "MOD";

/// The reader rejected our frame's checksum.
pub const CODE_CRC_ERROR: &str = "CCE";

/// The reader does not understand the command at all.
pub const CODE_UNKNOWN_COMMAND: &str = "UCO";

/// Hardware fault codes: (code, description, remediation hint).
const HARDWARE_CODES: &[(&str, &str, &str)] = &[
    ("ARH", "antenna reflectivity too high", "check antenna cabling and tuning"),
    ("BOD", "supply brownout detected", "check the power supply voltage"),
    ("BOF", "receive buffer overflow", "reduce tag population or polling rate"),
    ("TOR", "receiver timeout", "check the antenna connection"),
    ("HWF", "hardware failure", "power-cycle the reader"),
    ("PLE", "PLL lock error", "power-cycle the reader"),
    ("SRT", "unexpected hardware reset", "check power stability"),
    ("UER", "unknown internal error", "power-cycle the reader"),
    ("URE", "UART receive error", "check serial wiring and baud rate"),
];

/// Codes recognized anywhere in the reply text, not just leading.
/// Some firmware revisions append these to an otherwise normal reply.
const EMBEDDED_CODES: &[&str] = &["PLE", "SRT"];

/// Protocol and parser fault codes: (code, description).
const PROTOCOL_CODES: &[(&str, &str)] = &[
    (CODE_UNKNOWN_COMMAND, "unsupported command"),
    (CODE_CRC_ERROR, "frame rejected by reader CRC check"),
    ("EDX", "read issued during an open write transfer"),
    ("EHX", "write issued during an open read transfer"),
    ("WDL", "write data length mismatch"),
    ("UPA", "unexpected parameter"),
];

/// True when the reply acknowledges an accepted set command.
pub fn is_affirmative(line: &str) -> bool {
    line.contains(ACK_OK)
}

/// True for replies that indicate a listening, recognized reader during
/// the connection handshake.
pub fn is_handshake_ack(line: &str) -> bool {
    line.starts_with(ACK_BREAK)
        || line.starts_with(ACK_NO_COMMAND)
        || line.starts_with(ACK_MODE_PREFIX)
        || line.starts_with(ACK_OK)
}

/// Map a reply to a typed error if it matches a known fault code.
///
/// Returns `None` for replies that are not in the hardware or protocol
/// tables, so ordinary payloads are never misclassified.
pub fn known_failure(text: &str) -> Option<Error> {
    for (code, description, hint) in HARDWARE_CODES {
        let hit = if EMBEDDED_CODES.contains(code) {
            text.contains(code)
        } else {
            text.starts_with(code)
        };
        if hit {
            return Some(Error::Hardware {
                code: (*code).to_string(),
                message: format!("{}; {}", description, hint),
            });
        }
    }
    for (code, description) in PROTOCOL_CODES {
        if text.starts_with(code) {
            return Some(Error::Protocol(format!("{}: {}", code, description)));
        }
    }
    None
}

/// Map a non-affirmative reply to a typed error.
///
/// Replies not in the fault tables are air-interface conditions and
/// become [`Error::TagCommunication`] carrying the reply's leading code.
pub fn error_for_reply(text: &str) -> Error {
    known_failure(text).unwrap_or_else(|| {
        let code = text.split_ascii_whitespace().next().unwrap_or(text);
        Error::TagCommunication {
            code: code.to_string(),
        }
    })
}
