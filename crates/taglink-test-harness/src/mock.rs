//! Mock transport for deterministic testing of the protocol engine.
//!
//! [`MockTransport`] plays the reader's side of a conversation from a
//! script of request/reply pairs loaded up front. Frame encoding,
//! handshake sequences, and response routing can all be exercised this
//! way without hardware on the bench.
//!
//! # Example
//!
//! ```
//! use taglink_test_harness::MockTransport;
//!
//! let mut mock = MockTransport::new();
//! // When the engine sends this frame, answer with this reply.
//! mock.expect("BRK\r", "BRA\r");
//! ```

use async_trait::async_trait;
use std::collections::VecDeque;
use std::time::Duration;

use taglink_core::error::{Error, Result};
use taglink_core::transport::Transport;

/// One scripted exchange: a frame the engine must send and the reply the
/// mock answers with. A `None` reply scripts a device that stays silent,
/// so every following receive times out.
#[derive(Debug, Clone)]
struct Exchange {
    request: Vec<u8>,
    reply: Option<Vec<u8>>,
}

/// A scripted [`Transport`] standing in for a live reader.
///
/// The script is consumed in order: each `send()` is matched against the
/// next scripted request, and the matching reply is then handed out by
/// `receive()`, split across as many reads as the caller's buffer
/// requires. Bytes queued with
/// [`push_incoming`](MockTransport::push_incoming) model unsolicited
/// device traffic (heartbeats, inventory pushes) and drain ahead of any
/// scripted reply.
///
/// A send that deviates from the script, or runs past its end, fails the
/// call with [`Error::Protocol`], so frame-ordering bugs surface at the
/// exact exchange that went wrong.
#[derive(Debug)]
pub struct MockTransport {
    script: VecDeque<Exchange>,
    unsolicited: VecDeque<u8>,
    /// Reply for the exchange most recently matched by `send()`.
    reply: Option<Vec<u8>>,
    /// How much of that reply has already been read out.
    reply_pos: usize,
    connected: bool,
    outbound: Vec<Vec<u8>>,
}

impl MockTransport {
    /// A fresh mock with an empty script, already "connected".
    pub fn new() -> Self {
        MockTransport {
            script: VecDeque::new(),
            unsolicited: VecDeque::new(),
            reply: None,
            reply_pos: 0,
            connected: true,
            outbound: Vec::new(),
        }
    }

    /// Script one exchange, both sides as raw wire text (terminators
    /// included).
    pub fn expect(&mut self, request: &str, response: &str) {
        self.expect_bytes(request.as_bytes(), response.as_bytes());
    }

    /// Script an exchange where the device never answers.
    ///
    /// Every `receive()` after the matching send returns
    /// [`Error::Timeout`]; sleep-recovery and wake-retry paths are
    /// scripted with this.
    pub fn expect_silence(&mut self, request: &str) {
        self.script.push_back(Exchange {
            request: request.as_bytes().to_vec(),
            reply: None,
        });
    }

    /// Byte-level variant of [`expect`](MockTransport::expect).
    pub fn expect_bytes(&mut self, request: &[u8], response: &[u8]) {
        self.script.push_back(Exchange {
            request: request.to_vec(),
            reply: Some(response.to_vec()),
        });
    }

    /// Queue unsolicited device traffic.
    ///
    /// `receive()` hands these bytes out before any scripted reply,
    /// modeling pushes that arrive while no command is in flight.
    pub fn push_incoming(&mut self, data: &str) {
        self.unsolicited.extend(data.as_bytes());
    }

    /// Every frame sent through this transport, in order, one entry per
    /// `send()` call.
    pub fn sent_data(&self) -> &[Vec<u8>] {
        &self.outbound
    }

    /// Sent frames decoded as text, for assertions on command order.
    pub fn sent_text(&self) -> Vec<String> {
        self.outbound
            .iter()
            .map(|f| String::from_utf8_lossy(f).into_owned())
            .collect()
    }

    /// How many scripted exchanges have not been played yet.
    pub fn remaining_expectations(&self) -> usize {
        self.script.len()
    }

    /// Force the connected state.
    ///
    /// With `false`, both `send()` and `receive()` fail with
    /// [`Error::NotConnected`].
    pub fn set_connected(&mut self, connected: bool) {
        self.connected = connected;
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        if !self.connected {
            return Err(Error::NotConnected);
        }

        // Log the frame even if it turns out to deviate from the script.
        self.outbound.push(data.to_vec());

        match self.script.pop_front() {
            Some(exchange) if data == exchange.request.as_slice() => {
                self.reply = exchange.reply;
                self.reply_pos = 0;
                Ok(())
            }
            Some(exchange) => Err(Error::Protocol(format!(
                "mock script mismatch: scripted {:?}, engine sent {:?}",
                String::from_utf8_lossy(&exchange.request),
                String::from_utf8_lossy(data)
            ))),
            None => Err(Error::Protocol("mock script exhausted".into())),
        }
    }

    async fn receive(&mut self, buf: &mut [u8], _timeout: Duration) -> Result<usize> {
        if !self.connected {
            return Err(Error::NotConnected);
        }

        // Unsolicited traffic drains first.
        if !self.unsolicited.is_empty() {
            let n = self.unsolicited.len().min(buf.len());
            for (slot, byte) in buf.iter_mut().zip(self.unsolicited.drain(..n)) {
                *slot = byte;
            }
            return Ok(n);
        }

        if let Some(ref reply) = self.reply {
            let remaining = &reply[self.reply_pos..];
            if remaining.is_empty() {
                self.reply = None;
                self.reply_pos = 0;
                return Err(Error::Timeout);
            }
            let n = remaining.len().min(buf.len());
            buf[..n].copy_from_slice(&remaining[..n]);
            self.reply_pos += n;
            if self.reply_pos >= reply.len() {
                self.reply = None;
                self.reply_pos = 0;
            }
            Ok(n)
        } else {
            Err(Error::Timeout)
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.connected = false;
        self.reply = None;
        self.reply_pos = 0;
        self.unsolicited.clear();
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}
