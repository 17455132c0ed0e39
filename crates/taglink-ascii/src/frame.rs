//! Outbound frame encoding and inbound line scanning.
//!
//! Commands go to the reader as ASCII text terminated by a carriage
//! return. Replies come back terminated by a carriage return alone, or
//! by carriage-return + line-feed once end-of-frame mode has been
//! negotiated. [`LineScanner`] accepts both terminators at all times, so
//! the switch mid-handshake cannot desynchronize the stream.

use crate::crc;

/// Carriage return, the base line terminator.
pub const CR: u8 = b'\r';

/// Line feed, appended to the terminator in end-of-frame mode.
pub const LF: u8 = b'\n';

/// Maximum bytes buffered while waiting for a terminator.
///
/// Frames are tens of bytes; a buffer this large means the stream is
/// noise or the terminator was lost, and the scanner should be reset.
pub const MAX_BUFFER: usize = 8192;

/// Build an outbound command frame.
///
/// Appends the frame checksum when CRC mode is active, then the
/// carriage-return terminator. Outbound frames always end with a bare
/// carriage return regardless of end-of-frame mode; that mode only
/// changes the terminator the reader sends back.
pub fn encode_frame(text: &str, crc_mode: bool) -> String {
    let mut frame = if crc_mode {
        crc::append_crc(text)
    } else {
        text.to_string()
    };
    frame.push(CR as char);
    frame
}

/// Incremental splitter for terminator-delimited reply lines.
///
/// Bytes are pushed in as they arrive from the transport and complete
/// lines are pulled out with the terminator stripped. A line feed
/// immediately following a carriage return is swallowed, even across
/// a read boundary.
#[derive(Debug, Default)]
pub struct LineScanner {
    buf: Vec<u8>,
    /// Set when the last drained line ended exactly at the buffer end,
    /// so a line feed arriving in the next read belongs to it.
    skip_lf: bool,
}

impl LineScanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append received bytes to the scan buffer.
    pub fn push_bytes(&mut self, data: &[u8]) {
        let mut data = data;
        if self.skip_lf && !data.is_empty() {
            if data[0] == LF {
                data = &data[1..];
            }
            self.skip_lf = false;
        }
        self.buf.extend_from_slice(data);
    }

    /// Pull the next complete line, with its terminator removed.
    ///
    /// Returns `None` until a carriage return has been buffered.
    pub fn next_line(&mut self) -> Option<String> {
        let pos = self.buf.iter().position(|&b| b == CR)?;
        let line = String::from_utf8_lossy(&self.buf[..pos]).into_owned();

        let mut consumed = pos + 1;
        if consumed < self.buf.len() {
            if self.buf[consumed] == LF {
                consumed += 1;
            }
        } else {
            self.skip_lf = true;
        }
        self.buf.drain(..consumed);

        Some(line)
    }

    /// Number of bytes buffered without a terminator.
    pub fn buffered_len(&self) -> usize {
        self.buf.len()
    }

    /// Discard all buffered bytes.
    pub fn clear(&mut self) {
        self.buf.clear();
        self.skip_lf = false;
    }
}
