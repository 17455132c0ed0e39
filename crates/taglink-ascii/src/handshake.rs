//! Connection handshake and capability negotiation.
//!
//! After the transport opens, the reader's wakefulness and CRC mode are
//! unknown and it may still be streaming tags from a previous session.
//! [`negotiate`] drives the break/acknowledge state machine until the
//! reader is ready, then puts the link into its canonical configuration:
//! heartbeat off, end-of-frame on, CRC on, heartbeat back on at the
//! default interval.
//!
//! The handshake runs with exclusive transport access, before the IO
//! task is spawned. Identity queries and everything else go through the
//! engine afterwards.

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, trace, warn};

use taglink_core::error::{Error, Result};
use taglink_core::transport::Transport;

use crate::classify;
use crate::codes;
use crate::crc;
use crate::frame::{self, LineScanner};
use crate::session::Session;

/// Heartbeat interval restored at the end of the handshake, in seconds.
pub const DEFAULT_HEARTBEAT_SECS: u16 = 10;

/// Negotiate a freshly opened connection into a usable session.
///
/// Runs [`await_ready`] and then the fixed configuration sequence. The
/// sequence order matters: end-of-frame changes the reply terminator, so
/// it is enabled before anything else depends on reply framing, and the
/// heartbeat is silenced first so alive markers cannot interleave with
/// the configuration replies.
///
/// On a timeout or a protocol error the caller must disconnect; the
/// session may be half-configured.
pub async fn negotiate(
    transport: &mut dyn Transport,
    session: &mut Session,
    scanner: &mut LineScanner,
    timeout: Duration,
) -> Result<()> {
    await_ready(transport, session, scanner, timeout).await?;

    let heartbeat_off = format!("{} 0", codes::CMD_HEARTBEAT);
    set_exchange(transport, session, scanner, &heartbeat_off, timeout).await?;
    session.heartbeat_interval = 0;

    set_exchange(transport, session, scanner, codes::CMD_END_OF_FRAME_ON, timeout).await?;
    session.end_of_frame = true;

    set_exchange(transport, session, scanner, codes::CMD_CRC_ON, timeout).await?;
    session.crc_mode = true;

    let heartbeat_on = format!("{} {}", codes::CMD_HEARTBEAT, DEFAULT_HEARTBEAT_SECS);
    set_exchange(transport, session, scanner, &heartbeat_on, timeout).await?;
    session.heartbeat_interval = DEFAULT_HEARTBEAT_SECS;

    Ok(())
}

/// Drive the break/acknowledge state machine until the reader is ready.
///
/// Sends a break and classifies the reply:
/// - an acknowledgement means the reader is listening; done.
/// - the CRC-error code means the reader only accepts checksummed
///   frames; CRC mode is enabled in the session and the break is
///   re-sent (as a wake if the reader was just woken).
/// - the unknown-command code means whatever answered is not one of
///   these readers; fatal.
/// - silence means the reader may be in low-power sleep; a single wake
///   is sent and awaited. A second silence is fatal.
pub async fn await_ready(
    transport: &mut dyn Transport,
    session: &mut Session,
    scanner: &mut LineScanner,
    timeout: Duration,
) -> Result<()> {
    let mut woke = false;
    let mut timeouts = 0u8;
    let mut command = codes::CMD_BREAK;

    loop {
        send_frame(transport, session, command).await?;

        match read_signal(transport, session, scanner, timeout).await {
            Ok(signal) => {
                if signal.starts_with(codes::CODE_CRC_ERROR) {
                    if session.crc_mode {
                        return Err(Error::Protocol(
                            "reader rejected a checksummed frame during handshake".into(),
                        ));
                    }
                    debug!("reader requires CRC frames, enabling CRC mode");
                    session.crc_mode = true;
                    command = if woke {
                        codes::CMD_WAKE
                    } else {
                        codes::CMD_BREAK
                    };
                } else if signal.starts_with(codes::CODE_UNKNOWN_COMMAND) {
                    return Err(Error::Protocol("not a recognized reader".into()));
                } else {
                    debug!(reply = %signal, "reader is ready");
                    return Ok(());
                }
            }
            Err(Error::Timeout) => {
                timeouts += 1;
                if timeouts >= 2 {
                    return Err(Error::Timeout);
                }
                debug!("no reply to break, waking a possibly sleeping reader");
                woke = true;
                command = codes::CMD_WAKE;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Send one configuration command and require an affirmative reply.
async fn set_exchange(
    transport: &mut dyn Transport,
    session: &mut Session,
    scanner: &mut LineScanner,
    text: &str,
    timeout: Duration,
) -> Result<()> {
    send_frame(transport, session, text).await?;

    let deadline = Instant::now() + timeout;
    let reply = next_reply_line(transport, session, scanner, deadline).await?;
    if codes::is_affirmative(&reply) {
        Ok(())
    } else {
        Err(codes::error_for_reply(&reply))
    }
}

/// Encode and send one frame under the session's current CRC mode.
async fn send_frame(
    transport: &mut dyn Transport,
    session: &Session,
    text: &str,
) -> Result<()> {
    let frame = frame::encode_frame(text, session.crc_mode);
    trace!(frame = %frame.escape_debug(), "handshake send");
    transport.send(frame.as_bytes()).await
}

/// Read until a line that can advance the break state machine arrives.
///
/// Only acknowledgements, the CRC-error code, and the unknown-command
/// code are returned; pushes and stray lines left over from a previous
/// session are skipped so they cannot trigger a spurious re-send.
async fn read_signal(
    transport: &mut dyn Transport,
    session: &Session,
    scanner: &mut LineScanner,
    timeout: Duration,
) -> Result<String> {
    let deadline = Instant::now() + timeout;
    loop {
        let line = next_reply_line(transport, session, scanner, deadline).await?;
        if line.starts_with(codes::CODE_CRC_ERROR)
            || line.starts_with(codes::CODE_UNKNOWN_COMMAND)
            || codes::is_handshake_ack(&line)
        {
            return Ok(line);
        }
        debug!(line = %line, "ignoring stray line during handshake");
    }
}

/// Pump the transport until a non-push line arrives or the deadline
/// passes.
async fn next_reply_line(
    transport: &mut dyn Transport,
    session: &Session,
    scanner: &mut LineScanner,
    deadline: Instant,
) -> Result<String> {
    loop {
        while let Some(raw) = scanner.next_line() {
            match reply_text(&raw, session) {
                Some(result) => return result,
                None => continue,
            }
        }

        let now = Instant::now();
        if now >= deadline {
            return Err(Error::Timeout);
        }

        let mut buf = [0u8; 256];
        let n = transport.receive(&mut buf, deadline - now).await?;
        scanner.push_bytes(&buf[..n]);
        if scanner.buffered_len() > frame::MAX_BUFFER {
            warn!(len = scanner.buffered_len(), "handshake buffer overflow, resetting");
            scanner.clear();
        }
    }
}

/// Validate and classify one line; `None` for lines the handshake skips.
fn reply_text(raw: &str, session: &Session) -> Option<Result<String>> {
    if raw.is_empty() {
        return None;
    }

    let text = if session.crc_mode {
        match crc::validate_and_strip(raw) {
            Some(text) => text.to_string(),
            None => {
                return Some(Err(Error::Protocol(format!(
                    "CRC validation failed: {raw}"
                ))))
            }
        }
    } else {
        raw.to_string()
    };

    if classify::is_heartbeat(&text) {
        return None;
    }
    if classify::is_inventory_lead(&text) || classify::is_inventory_trailer(&text) {
        return None;
    }
    if classify::parse_input_change(&text).is_some() {
        return None;
    }

    Some(Ok(text))
}
