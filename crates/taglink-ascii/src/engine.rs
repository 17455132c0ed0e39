//! The reader IO engine.
//!
//! One spawned task owns the transport exclusively. Callers send
//! [`Request`]s over an mpsc channel and await the reply on a oneshot;
//! the channel serializes commands, so at most one exchange is on the
//! wire at any time. Between commands the task keeps reading, because
//! the reader pushes heartbeats, input changes, and (in continuous-scan
//! mode) tag reports on the same line stream that carries replies.
//!
//! A line's shape decides whether it is a push or a reply, never the
//! question of whether a command happens to be pending. [`Router`] makes
//! that call for every line and emits push events on a broadcast
//! channel.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tokio::sync::{broadcast, mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use taglink_core::error::{Error, Result};
use taglink_core::events::ReaderEvent;
use taglink_core::transport::Transport;
use taglink_core::types::ConnectionState;

use crate::classify;
use crate::codes;
use crate::crc;
use crate::frame::{self, LineScanner};
use crate::session::{Session, SessionApply};

/// Timing configuration for the IO task.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Timeout for a single command/reply exchange.
    pub command_timeout: Duration,
    /// Timeout for a single-shot inventory round, which spans one tag
    /// line per tag in the field plus the terminator.
    pub inventory_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            command_timeout: Duration::from_secs(2),
            inventory_timeout: Duration::from_secs(5),
        }
    }
}

/// A request sent from reader methods to the IO task.
pub enum Request {
    /// A query command; resolves with its reply lines.
    Execute {
        text: String,
        timeout: Duration,
        /// Number of reply lines the command produces.
        expect_lines: usize,
        /// Strip CRC suffixes from the returned lines.
        strip_crc: bool,
        reply: oneshot::Sender<Result<Vec<String>>>,
    },
    /// A configuration command; an affirmative reply applies the
    /// session change.
    Set {
        text: String,
        apply: SessionApply,
        reply: oneshot::Sender<Result<()>>,
    },
    /// A single-shot inventory; resolves with the round's tag lines.
    InventoryOnce {
        text: String,
        reply: oneshot::Sender<Result<Vec<String>>>,
    },
    /// Start continuous scanning. Fire-and-forget on the wire; tag
    /// reports arrive as events from then on.
    InventoryStart {
        text: String,
        reply: oneshot::Sender<Result<()>>,
    },
    /// Break the reader out of continuous scanning.
    InventoryStop {
        reply: oneshot::Sender<Result<()>>,
    },
    /// Graceful shutdown; returns the transport for recovery.
    Shutdown {
        reply: oneshot::Sender<Box<dyn Transport>>,
    },
}

/// How the reply to an in-flight command is collected.
#[derive(Debug, Clone, Copy)]
enum ReplyMode {
    /// Collect this many reply lines, optionally stripping the CRC
    /// suffix from each.
    Lines { count: usize, strip: bool },
    /// Collect tag lines until the round terminator.
    InventoryRound,
    /// Wait for a break acknowledgement, letting straggler tag lines
    /// pass into the round collector.
    BreakAck,
}

/// What the router decided about one inbound line.
#[derive(Debug)]
enum LineOutcome {
    /// A push or heartbeat, fully handled.
    Consumed,
    /// A reply line belonging to the pending command; `raw` keeps the
    /// CRC suffix, `text` has it stripped.
    Reply { raw: String, text: String },
    /// A line that poisons the pending command.
    Invalid(Error),
    /// An inventory round terminator, carrying the round's tag lines.
    RoundComplete(Vec<String>),
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Classifies inbound lines and emits push events.
///
/// Tag lines from multi-line firmware carry no marker of their own, so
/// the router accumulates them in `round` until the count line
/// terminates the round. Compact firmware marks each tag line, making
/// it a self-contained round.
struct Router {
    /// Tag lines accumulated for the current inventory round.
    round: Vec<String>,
    event_tx: broadcast::Sender<ReaderEvent>,
}

impl Router {
    fn new(event_tx: broadcast::Sender<ReaderEvent>) -> Self {
        Router {
            round: Vec::new(),
            event_tx,
        }
    }

    /// Classify one line. CRC validation happens here because
    /// classification must look at the payload, not the suffix.
    fn route(&mut self, raw: String, crc_mode: bool) -> LineOutcome {
        if raw.is_empty() {
            return LineOutcome::Consumed;
        }

        let text = if crc_mode {
            match crc::validate_and_strip(&raw) {
                Some(text) => text.to_string(),
                None => {
                    return LineOutcome::Invalid(Error::Protocol(format!(
                        "CRC validation failed: {raw}"
                    )))
                }
            }
        } else {
            raw.clone()
        };

        if classify::is_heartbeat(&text) {
            trace!("heartbeat");
            return LineOutcome::Consumed;
        }

        if classify::is_inventory_lead(&text) {
            let frames = std::mem::take(&mut self.round);
            if let Some(count) = classify::inventory_count(&text) {
                if count != frames.len() {
                    debug!(count, got = frames.len(), "inventory count mismatch");
                }
            }
            self.emit_inventory(frames.clone());
            return LineOutcome::RoundComplete(frames);
        }

        if classify::is_inventory_trailer(&text) {
            // Compact firmware: the tag data and the round marker share
            // one line.
            self.emit_inventory(vec![text.clone()]);
            return LineOutcome::RoundComplete(vec![text]);
        }

        if let Some((pin, level)) = classify::parse_input_change(&text) {
            let _ = self
                .event_tx
                .send(ReaderEvent::InputChanged { pin, level });
            return LineOutcome::Consumed;
        }

        if text.starts_with(codes::CODE_CRC_ERROR) {
            return LineOutcome::Invalid(Error::Protocol(format!(
                "reader rejected our frame: {text}"
            )));
        }

        LineOutcome::Reply { raw, text }
    }

    /// Add a tag line to the round in progress.
    fn collect_tag(&mut self, text: String) {
        self.round.push(text);
    }

    /// Drop a round that will never see its terminator.
    fn abandon_round(&mut self) {
        if !self.round.is_empty() {
            debug!(len = self.round.len(), "abandoning partial inventory round");
            self.round.clear();
        }
    }

    /// Emit a tag inventory event. Rounds with no tags are not worth an
    /// event; continuous scanning produces them every cycle.
    fn emit_inventory(&self, frames: Vec<String>) {
        if frames.is_empty() {
            return;
        }
        let _ = self.event_tx.send(ReaderEvent::TagInventory {
            timestamp: SystemTime::now(),
            frames,
        });
    }

    fn emit_status(&self, state: ConnectionState, message: impl Into<String>) {
        let _ = self.event_tx.send(ReaderEvent::ConnectionStatus {
            state,
            message: message.into(),
        });
    }
}

// ---------------------------------------------------------------------------
// Engine handle
// ---------------------------------------------------------------------------

/// Handle to the IO task. Stored inside the reader driver struct.
///
/// Handles are cheap to clone; every clone drives the same IO task, so
/// a caller can hold a driver lock just long enough to clone the handle
/// and run the exchange without it.
#[derive(Clone)]
pub struct ReaderEngine {
    tx: mpsc::Sender<Request>,
    cancel: CancellationToken,
    task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl ReaderEngine {
    /// Send a command and await its raw reply lines, CRC suffixes
    /// intact.
    ///
    /// `timeout` bounds the wire exchange only; time spent queued
    /// behind an in-flight command is not charged against it.
    /// `expect_lines` is clamped to at least 1.
    pub async fn execute(
        &self,
        text: impl Into<String>,
        expect_lines: usize,
        timeout: Duration,
    ) -> Result<Vec<String>> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(Request::Execute {
                text: text.into(),
                timeout,
                expect_lines,
                strip_crc: false,
                reply: reply_tx,
            })
            .await
            .map_err(|_| Error::NotConnected)?;
        reply_rx.await.map_err(|_| Error::ConnectionLost)?
    }

    /// Send a query command and return its single reply line, with the
    /// CRC suffix stripped and failure codes mapped to typed errors.
    pub async fn get(&self, text: impl Into<String>, timeout: Duration) -> Result<String> {
        let lines = self.get_lines(text, 1, timeout).await?;
        lines
            .into_iter()
            .next()
            .ok_or_else(|| Error::Protocol("empty reply".into()))
    }

    /// Multi-line variant of [`get`](ReaderEngine::get).
    pub async fn get_lines(
        &self,
        text: impl Into<String>,
        expect_lines: usize,
        timeout: Duration,
    ) -> Result<Vec<String>> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(Request::Execute {
                text: text.into(),
                timeout,
                expect_lines,
                strip_crc: true,
                reply: reply_tx,
            })
            .await
            .map_err(|_| Error::NotConnected)?;
        let lines = reply_rx.await.map_err(|_| Error::ConnectionLost)??;

        // Some firmware revisions deliver fault codes in place of (or
        // appended to) an otherwise normal reply.
        for line in &lines {
            if let Some(err) = codes::known_failure(line) {
                return Err(err);
            }
        }
        Ok(lines)
    }

    /// Send a configuration command and require an affirmative reply.
    pub async fn set(&self, text: impl Into<String>) -> Result<()> {
        self.set_with(text, SessionApply::None).await
    }

    /// Like [`set`](ReaderEngine::set), additionally applying a session
    /// field update once the reader acknowledges.
    pub async fn set_with(&self, text: impl Into<String>, apply: SessionApply) -> Result<()> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(Request::Set {
                text: text.into(),
                apply,
                reply: reply_tx,
            })
            .await
            .map_err(|_| Error::NotConnected)?;
        reply_rx.await.map_err(|_| Error::ConnectionLost)?
    }

    /// Run one inventory round and return its tag report lines.
    ///
    /// An empty field resolves with an empty list. The round is also
    /// published on the event channel.
    pub async fn inventory_once(&self, text: impl Into<String>) -> Result<Vec<String>> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(Request::InventoryOnce {
                text: text.into(),
                reply: reply_tx,
            })
            .await
            .map_err(|_| Error::NotConnected)?;
        reply_rx.await.map_err(|_| Error::ConnectionLost)?
    }

    /// Put the reader into continuous-scan mode. Tag rounds arrive as
    /// [`ReaderEvent::TagInventory`] until [`stop_inventory`] is called.
    ///
    /// [`stop_inventory`]: ReaderEngine::stop_inventory
    pub async fn start_inventory(&self, text: impl Into<String>) -> Result<()> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(Request::InventoryStart {
                text: text.into(),
                reply: reply_tx,
            })
            .await
            .map_err(|_| Error::NotConnected)?;
        reply_rx.await.map_err(|_| Error::ConnectionLost)?
    }

    /// Break the reader out of continuous-scan mode.
    ///
    /// Tag lines already in flight keep arriving until the reader
    /// processes the break; they are routed as usual, and a round left
    /// without its terminator is dropped. Push mode is cleared even
    /// when the acknowledgement never arrives, since the break was
    /// sent either way.
    pub async fn stop_inventory(&self) -> Result<()> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(Request::InventoryStop { reply: reply_tx })
            .await
            .map_err(|_| Error::NotConnected)?;
        reply_rx.await.map_err(|_| Error::ConnectionLost)?
    }

    /// Abort the IO task without waiting for it.
    ///
    /// Any in-flight command resolves with a link-lost error and the
    /// transport is closed by the exiting task.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Whether the IO task is still accepting requests.
    pub fn is_running(&self) -> bool {
        !self.tx.is_closed()
    }

    /// Wait for the IO task to exit. Used after [`cancel`] when the
    /// caller needs the transport fully released before returning.
    ///
    /// [`cancel`]: ReaderEngine::cancel
    pub async fn join(&self) {
        if let Some(task) = self.task.lock().await.take() {
            let _ = task.await;
        }
    }

    /// Shut the IO task down and recover the transport.
    pub async fn shutdown(&self) -> Result<Box<dyn Transport>> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(Request::Shutdown { reply: reply_tx })
            .await
            .map_err(|_| Error::NotConnected)?;

        let transport = reply_rx.await.map_err(|_| Error::ConnectionLost)?;
        self.cancel.cancel();
        if let Some(task) = self.task.lock().await.take() {
            let _ = task.await;
        }
        Ok(transport)
    }
}

/// Spawn the IO task. Returns the handle for sending commands.
///
/// The scanner is passed in rather than created here because the
/// handshake may leave partial inbound data buffered, and losing it
/// would desynchronize the line stream.
pub fn spawn_engine(
    transport: Box<dyn Transport>,
    scanner: LineScanner,
    session: Arc<Mutex<Session>>,
    config: EngineConfig,
    event_tx: broadcast::Sender<ReaderEvent>,
) -> ReaderEngine {
    let (tx, rx) = mpsc::channel::<Request>(32);
    let cancel = CancellationToken::new();
    let cancel_clone = cancel.clone();

    let task = tokio::spawn(io_loop(
        transport,
        scanner,
        session,
        config,
        event_tx,
        rx,
        cancel_clone,
    ));

    ReaderEngine {
        tx,
        cancel,
        task: Arc::new(Mutex::new(Some(task))),
    }
}

// ---------------------------------------------------------------------------
// IO loop
// ---------------------------------------------------------------------------

/// The main IO loop. Runs as a spawned Tokio task.
///
/// Uses `tokio::select! { biased; }` to prioritize:
/// 1. Cancellation
/// 2. Command dispatch
/// 3. Idle push reading
async fn io_loop(
    mut transport: Box<dyn Transport>,
    mut scanner: LineScanner,
    session: Arc<Mutex<Session>>,
    config: EngineConfig,
    event_tx: broadcast::Sender<ReaderEvent>,
    mut rx: mpsc::Receiver<Request>,
    cancel: CancellationToken,
) {
    let mut router = Router::new(event_tx);

    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                debug!("reader IO task cancelled");
                break;
            }

            req = rx.recv() => {
                match req {
                    Some(Request::Shutdown { reply }) => {
                        debug!("IO task shutdown requested");
                        let _ = reply.send(transport);
                        return;
                    }
                    Some(req) => {
                        let alive = handle_request(
                            req, &mut transport, &mut scanner, &mut router,
                            &session, &config, &cancel,
                        ).await;
                        if !alive {
                            break;
                        }
                    }
                    None => {
                        debug!("request channel closed, exiting IO task");
                        break;
                    }
                }
            }

            // Idle: read pushed traffic while no command is pending.
            link_down = idle_read(&mut *transport, &mut scanner, &mut router, &session) => {
                if link_down {
                    router.emit_status(
                        ConnectionState::Disconnected,
                        "connection lost while idle",
                    );
                    break;
                }
            }
        }
    }

    let _ = transport.close().await;
}

/// One idle read slice. Returns `true` when the link is down.
async fn idle_read(
    transport: &mut dyn Transport,
    scanner: &mut LineScanner,
    router: &mut Router,
    session: &Arc<Mutex<Session>>,
) -> bool {
    let mut buf = [0u8; 256];
    match transport.receive(&mut buf, Duration::from_millis(100)).await {
        Ok(n) if n > 0 => {
            scanner.push_bytes(&buf[..n]);
            if scanner.buffered_len() > frame::MAX_BUFFER {
                warn!(len = scanner.buffered_len(), "idle buffer overflow, resetting");
                scanner.clear();
                return false;
            }

            let (crc_mode, push_mode) = {
                let session = session.lock().await;
                (session.crc_mode, session.push_mode)
            };

            while let Some(raw) = scanner.next_line() {
                match router.route(raw, crc_mode) {
                    LineOutcome::Consumed | LineOutcome::RoundComplete(_) => {}
                    LineOutcome::Reply { text, .. } => {
                        if push_mode {
                            router.collect_tag(text);
                        } else {
                            debug!(line = %text, "unexpected line with no command pending");
                        }
                    }
                    LineOutcome::Invalid(err) => {
                        warn!(error = %err, "discarding invalid pushed line");
                    }
                }
            }
            false
        }
        Ok(_) | Err(Error::Timeout) => {
            // Yield briefly so the loop can check for requests or
            // cancellation.
            tokio::time::sleep(Duration::from_millis(10)).await;
            false
        }
        Err(e) => {
            warn!(error = %e, "idle read failed");
            e.is_link_lost()
        }
    }
}

/// Dispatch a single request on the transport.
///
/// Returns `false` when the link was lost during the exchange; the
/// caller has already been given the error by then.
async fn handle_request(
    req: Request,
    transport: &mut Box<dyn Transport>,
    scanner: &mut LineScanner,
    router: &mut Router,
    session: &Arc<Mutex<Session>>,
    config: &EngineConfig,
    cancel: &CancellationToken,
) -> bool {
    match req {
        Request::Execute {
            text,
            timeout,
            expect_lines,
            strip_crc,
            reply,
        } => {
            let crc_mode = session.lock().await.crc_mode;
            let mode = ReplyMode::Lines {
                count: expect_lines.max(1),
                strip: strip_crc,
            };
            let result = round_trip(
                &mut **transport,
                scanner,
                router,
                cancel,
                crc_mode,
                &text,
                timeout,
                mode,
            )
            .await;
            finish(result, reply, router)
        }

        Request::Set { text, apply, reply } => {
            let crc_mode = session.lock().await.crc_mode;
            let result = round_trip(
                &mut **transport,
                scanner,
                router,
                cancel,
                crc_mode,
                &text,
                config.command_timeout,
                ReplyMode::Lines {
                    count: 1,
                    strip: true,
                },
            )
            .await;
            let result = match result {
                Ok(lines) => {
                    let line = lines.first().map(String::as_str).unwrap_or("");
                    if codes::is_affirmative(line) {
                        session.lock().await.apply(apply);
                        Ok(())
                    } else {
                        Err(codes::error_for_reply(line))
                    }
                }
                Err(e) => Err(e),
            };
            finish(result, reply, router)
        }

        Request::InventoryOnce { text, reply } => {
            let crc_mode = session.lock().await.crc_mode;
            let result = round_trip(
                &mut **transport,
                scanner,
                router,
                cancel,
                crc_mode,
                &text,
                config.inventory_timeout,
                ReplyMode::InventoryRound,
            )
            .await;
            finish(result, reply, router)
        }

        Request::InventoryStart { text, reply } => {
            let crc_mode = session.lock().await.crc_mode;
            let frame = frame::encode_frame(&text, crc_mode);
            trace!(frame = %frame.escape_debug(), "send");
            let result = transport.send(frame.as_bytes()).await;
            if result.is_ok() {
                session.lock().await.apply(SessionApply::PushMode(true));
            }
            finish(result, reply, router)
        }

        Request::InventoryStop { reply } => {
            let crc_mode = session.lock().await.crc_mode;
            let result = round_trip(
                &mut **transport,
                scanner,
                router,
                cancel,
                crc_mode,
                codes::CMD_BREAK,
                config.command_timeout,
                ReplyMode::BreakAck,
            )
            .await;
            // The break went out even if the acknowledgement never
            // arrived; stop treating inbound lines as scan pushes.
            router.abandon_round();
            session.lock().await.apply(SessionApply::PushMode(false));
            finish(result.map(|_| ()), reply, router)
        }

        Request::Shutdown { .. } => unreachable!("Shutdown handled in io_loop"),
    }
}

/// Resolve the caller, then report whether the link survived.
fn finish<T>(result: Result<T>, reply: oneshot::Sender<Result<T>>, router: &Router) -> bool {
    let link_down = matches!(result.as_ref(), Err(e) if e.is_link_lost());
    let _ = reply.send(result);
    if link_down {
        router.emit_status(ConnectionState::Disconnected, "connection lost");
    }
    !link_down
}

// ---------------------------------------------------------------------------
// Command execution
// ---------------------------------------------------------------------------

/// One full command/reply exchange on the wire.
///
/// Sends the frame and pumps the line stream until the reply is
/// complete per `mode`. Pushes interleaved with the reply are routed as
/// usual; a line that fails validation or reports a frame rejection
/// poisons the whole exchange, partial reply included.
#[allow(clippy::too_many_arguments)]
async fn round_trip(
    transport: &mut dyn Transport,
    scanner: &mut LineScanner,
    router: &mut Router,
    cancel: &CancellationToken,
    crc_mode: bool,
    text: &str,
    timeout: Duration,
    mode: ReplyMode,
) -> Result<Vec<String>> {
    let frame = frame::encode_frame(text, crc_mode);
    trace!(frame = %frame.escape_debug(), "send");
    transport.send(frame.as_bytes()).await?;

    let deadline = Instant::now() + timeout;
    let mut recv_buf = [0u8; 256];
    let mut lines = Vec::new();

    loop {
        while let Some(raw) = scanner.next_line() {
            match router.route(raw, crc_mode) {
                LineOutcome::Consumed => {}
                LineOutcome::Reply { raw, text } => match mode {
                    ReplyMode::Lines { count, strip } => {
                        lines.push(if strip { text } else { raw });
                        if lines.len() >= count {
                            return Ok(lines);
                        }
                    }
                    ReplyMode::InventoryRound => {
                        router.collect_tag(text);
                    }
                    ReplyMode::BreakAck => {
                        if codes::is_handshake_ack(&text) {
                            return Ok(vec![text]);
                        }
                        // A tag line still in flight from continuous
                        // scanning.
                        router.collect_tag(text);
                    }
                },
                LineOutcome::RoundComplete(frames) => {
                    if matches!(mode, ReplyMode::InventoryRound) {
                        return Ok(frames);
                    }
                    // A round finishing under another command belongs
                    // to the event stream, which route() already fed.
                }
                LineOutcome::Invalid(err) => {
                    router.abandon_round();
                    return Err(err);
                }
            }
        }

        if cancel.is_cancelled() {
            return Err(Error::ConnectionLost);
        }
        let now = Instant::now();
        if now >= deadline {
            return Err(Error::Timeout);
        }
        let slice = (deadline - now).min(Duration::from_millis(100));

        match transport.receive(&mut recv_buf, slice).await {
            Ok(n) if n > 0 => {
                scanner.push_bytes(&recv_buf[..n]);
                if scanner.buffered_len() > frame::MAX_BUFFER {
                    warn!(
                        len = scanner.buffered_len(),
                        "reply buffer overflow, resetting"
                    );
                    scanner.clear();
                }
            }
            Ok(_) | Err(Error::Timeout) => {
                // Let the deadline govern retries instead of spinning
                // on an empty transport.
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use taglink_core::error::ErrorCategory;
    use taglink_test_harness::MockTransport;
    use tokio::sync::broadcast::error::TryRecvError;

    fn test_config() -> EngineConfig {
        EngineConfig {
            command_timeout: Duration::from_millis(200),
            inventory_timeout: Duration::from_millis(400),
        }
    }

    fn spawn_with(
        mock: MockTransport,
        session: Session,
    ) -> (
        ReaderEngine,
        Arc<Mutex<Session>>,
        broadcast::Receiver<ReaderEvent>,
    ) {
        let session = Arc::new(Mutex::new(session));
        let (event_tx, event_rx) = broadcast::channel(16);
        let engine = spawn_engine(
            Box::new(mock),
            LineScanner::new(),
            session.clone(),
            test_config(),
            event_tx,
        );
        (engine, session, event_rx)
    }

    fn crc_session() -> Session {
        Session {
            crc_mode: true,
            end_of_frame: true,
            ..Session::default()
        }
    }

    /// Corrupt the last CRC digit of a checksummed line.
    fn corrupt(mut line: String) -> String {
        let last = line.pop().unwrap();
        line.push(if last == 'A' { 'B' } else { 'A' });
        line
    }

    #[test]
    fn engine_config_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.command_timeout, Duration::from_secs(2));
        assert_eq!(config.inventory_timeout, Duration::from_secs(5));
    }

    // =======================================================================
    // Execute / Get
    // =======================================================================

    #[tokio::test]
    async fn execute_resolves_with_reply_line() {
        let mut mock = MockTransport::new();
        mock.expect("REV\r", "PANEL_M4 0312\r");
        let (engine, _session, _rx) = spawn_with(mock, Session::default());

        let lines = engine
            .execute("REV", 1, Duration::from_millis(200))
            .await
            .unwrap();
        assert_eq!(lines, vec!["PANEL_M4 0312"]);
    }

    #[tokio::test]
    async fn execute_collects_multiple_lines() {
        let mut mock = MockTransport::new();
        mock.expect("RDT 0 3\r", "0011\r2233\r4455\r");
        let (engine, _session, _rx) = spawn_with(mock, Session::default());

        let lines = engine
            .execute("RDT 0 3", 3, Duration::from_millis(200))
            .await
            .unwrap();
        assert_eq!(lines, vec!["0011", "2233", "4455"]);
    }

    #[tokio::test]
    async fn execute_keeps_crc_suffix() {
        let wire = crc::append_crc("PANEL_M4 0312");
        let mut mock = MockTransport::new();
        mock.expect(
            &format!("{}\r", crc::append_crc("REV")),
            &format!("{wire}\r\n"),
        );
        let (engine, _session, _rx) = spawn_with(mock, crc_session());

        let lines = engine
            .execute("REV", 1, Duration::from_millis(200))
            .await
            .unwrap();
        assert_eq!(lines, vec![wire]);
    }

    #[tokio::test]
    async fn get_strips_crc_suffix() {
        let mut mock = MockTransport::new();
        mock.expect(
            &format!("{}\r", crc::append_crc("REV")),
            &format!("{}\r\n", crc::append_crc("PANEL_M4 0312")),
        );
        let (engine, _session, _rx) = spawn_with(mock, crc_session());

        let line = engine.get("REV", Duration::from_millis(200)).await.unwrap();
        assert_eq!(line, "PANEL_M4 0312");
    }

    #[tokio::test]
    async fn get_maps_failure_reply_to_error() {
        let mut mock = MockTransport::new();
        mock.expect("RHW\r", "HWF\r");
        let (engine, _session, _rx) = spawn_with(mock, Session::default());

        let err = engine
            .get("RHW", Duration::from_millis(200))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Hardware { .. }));
    }

    #[tokio::test]
    async fn corrupted_reply_crc_fails_the_command() {
        let mut mock = MockTransport::new();
        mock.expect(
            &format!("{}\r", crc::append_crc("REV")),
            &format!("{}\r", corrupt(crc::append_crc("PANEL_M4 0312"))),
        );
        let (engine, _session, _rx) = spawn_with(mock, crc_session());

        let err = engine
            .execute("REV", 1, Duration::from_millis(200))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
    }

    #[tokio::test]
    async fn corrupted_segment_fails_the_whole_reply() {
        let l1 = crc::append_crc("0011");
        let l2 = corrupt(crc::append_crc("2233"));
        let l3 = crc::append_crc("4455");
        let mut mock = MockTransport::new();
        mock.expect(
            &format!("{}\r", crc::append_crc("RDT 0 3")),
            &format!("{l1}\r{l2}\r{l3}\r"),
        );
        let (engine, _session, _rx) = spawn_with(mock, crc_session());

        let err = engine
            .execute("RDT 0 3", 3, Duration::from_millis(200))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
    }

    #[tokio::test]
    async fn crc_rejection_reply_fails_the_command() {
        let mut mock = MockTransport::new();
        mock.expect("REV\r", "CCE\r");
        let (engine, _session, _rx) = spawn_with(mock, Session::default());

        let err = engine
            .execute("REV", 1, Duration::from_millis(200))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
    }

    // =======================================================================
    // Set
    // =======================================================================

    #[tokio::test]
    async fn set_applies_session_change_on_ack() {
        let mut mock = MockTransport::new();
        mock.expect("SAP 2\r", "OK!\r");
        let (engine, session, _rx) = spawn_with(mock, Session::default());

        engine
            .set_with("SAP 2", SessionApply::Antenna(2))
            .await
            .unwrap();
        assert_eq!(session.lock().await.antenna, 2);
    }

    #[tokio::test]
    async fn set_rejection_maps_to_typed_errors() {
        let mut mock = MockTransport::new();
        mock.expect("PWR 99\r", "UPA\r");
        mock.expect("SAP 5\r", "ARH\r");
        let (engine, session, _rx) = spawn_with(mock, Session::default());

        let err = engine.set("PWR 99").await.unwrap_err();
        assert_eq!(err.category(), ErrorCategory::ProtocolViolation);

        let err = engine
            .set_with("SAP 5", SessionApply::Antenna(5))
            .await
            .unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Hardware);

        // The rejected change was not applied.
        assert_eq!(session.lock().await.antenna, 0);
    }

    // =======================================================================
    // Pushes interleaved with replies
    // =======================================================================

    #[tokio::test]
    async fn pushes_interleaved_with_reply_are_routed() {
        let mut mock = MockTransport::new();
        // A heartbeat and an input change arrive ahead of the reply.
        mock.expect("REV\r", "HBT\rINC 2 HI\rPANEL_M4 0312\r");
        let (engine, _session, mut event_rx) = spawn_with(mock, Session::default());

        let lines = engine
            .execute("REV", 1, Duration::from_millis(200))
            .await
            .unwrap();
        assert_eq!(lines, vec!["PANEL_M4 0312"]);

        match event_rx.recv().await.unwrap() {
            ReaderEvent::InputChanged { pin, level } => {
                assert_eq!(pin, 2);
                assert!(level);
            }
            other => panic!("expected InputChanged, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn tag_pushes_do_not_steal_the_reply() {
        let mut mock = MockTransport::new();
        mock.expect(
            "VBL 2\r",
            "3034F00A2B5C1D80 IVF 01\r3034F00A2B5C1D81 IVF 01\rOK!\r",
        );
        let (engine, _session, mut event_rx) = spawn_with(mock, Session::default());

        let lines = engine
            .execute("VBL 2", 1, Duration::from_millis(200))
            .await
            .unwrap();
        assert_eq!(lines, vec!["OK!"]);

        // Both rounds surfaced as events, in arrival order.
        for expected in ["3034F00A2B5C1D80 IVF 01", "3034F00A2B5C1D81 IVF 01"] {
            match event_rx.recv().await.unwrap() {
                ReaderEvent::TagInventory { frames, .. } => {
                    assert_eq!(frames, vec![expected]);
                }
                other => panic!("expected TagInventory, got {other:?}"),
            }
        }
    }

    // =======================================================================
    // Serialization and timeouts
    // =======================================================================

    #[tokio::test]
    async fn concurrent_commands_serialize_in_order() {
        let mut mock = MockTransport::new();
        // The mock errors on out-of-order sends, so passing proves the
        // exchanges did not interleave.
        mock.expect("REV\r", "PANEL_M4 0312\r");
        mock.expect("RHW\r", "HW 0100\r");
        let (engine, _session, _rx) = spawn_with(mock, Session::default());

        let (a, b) = tokio::join!(
            engine.execute("REV", 1, Duration::from_millis(200)),
            engine.execute("RHW", 1, Duration::from_millis(200)),
        );
        assert_eq!(a.unwrap(), vec!["PANEL_M4 0312"]);
        assert_eq!(b.unwrap(), vec!["HW 0100"]);
    }

    #[tokio::test]
    async fn timeout_releases_the_transport_for_the_next_command() {
        let mut mock = MockTransport::new();
        mock.expect_silence("INV\r");
        mock.expect("REV\r", "PANEL_M4 0312\r");
        let (engine, _session, _rx) = spawn_with(mock, Session::default());

        let err = engine
            .execute("INV", 1, Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Timeout));

        let lines = engine
            .execute("REV", 1, Duration::from_millis(200))
            .await
            .unwrap();
        assert_eq!(lines, vec!["PANEL_M4 0312"]);
    }

    // =======================================================================
    // Inventory
    // =======================================================================

    #[tokio::test]
    async fn single_shot_inventory_collects_the_round() {
        let mut mock = MockTransport::new();
        mock.expect("INV EPC\r", "3034F00A2B5C1D80\r3034F00A2B5C1D81\rIVF 02\r");
        let (engine, _session, mut event_rx) = spawn_with(mock, Session::default());

        let frames = engine.inventory_once("INV EPC").await.unwrap();
        assert_eq!(frames, vec!["3034F00A2B5C1D80", "3034F00A2B5C1D81"]);

        match event_rx.recv().await.unwrap() {
            ReaderEvent::TagInventory { frames, .. } => assert_eq!(frames.len(), 2),
            other => panic!("expected TagInventory, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_inventory_round_resolves_empty() {
        let mut mock = MockTransport::new();
        mock.expect("INV\r", "IVF 00\r");
        let (engine, _session, mut event_rx) = spawn_with(mock, Session::default());

        let frames = engine.inventory_once("INV").await.unwrap();
        assert!(frames.is_empty());
        assert!(matches!(event_rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn compact_inventory_line_is_self_contained() {
        let mut mock = MockTransport::new();
        mock.expect("INV\r", "3034F00A2B5C1D80 IVF 01\r");
        let (engine, _session, _rx) = spawn_with(mock, Session::default());

        let frames = engine.inventory_once("INV").await.unwrap();
        assert_eq!(frames, vec!["3034F00A2B5C1D80 IVF 01"]);
    }

    #[tokio::test]
    async fn continuous_scan_start_and_stop() {
        let mut mock = MockTransport::new();
        mock.expect("CNR INV\r", "3034F00A2B5C1D80 IVF 01\r");
        mock.expect("BRK\r", "BRA\r");
        let (engine, session, mut event_rx) = spawn_with(mock, Session::default());

        engine.start_inventory("CNR INV").await.unwrap();
        assert!(session.lock().await.push_mode);

        match event_rx.recv().await.unwrap() {
            ReaderEvent::TagInventory { frames, .. } => {
                assert_eq!(frames, vec!["3034F00A2B5C1D80 IVF 01"]);
            }
            other => panic!("expected TagInventory, got {other:?}"),
        }

        engine.stop_inventory().await.unwrap();
        assert!(!session.lock().await.push_mode);
    }

    #[tokio::test]
    async fn continuous_rounds_accumulate_across_pushes() {
        let mut mock = MockTransport::new();
        mock.expect("CNR INV\r", "3034F00A2B5C1D80\r3034F00A2B5C1D81\rIVF 02\r");
        let (engine, _session, mut event_rx) = spawn_with(mock, Session::default());

        engine.start_inventory("CNR INV").await.unwrap();

        match event_rx.recv().await.unwrap() {
            ReaderEvent::TagInventory { frames, .. } => {
                assert_eq!(frames, vec!["3034F00A2B5C1D80", "3034F00A2B5C1D81"]);
            }
            other => panic!("expected TagInventory, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn stop_clears_push_mode_even_on_timeout() {
        let mut mock = MockTransport::new();
        mock.expect("CNR INV\r", "");
        mock.expect_silence("BRK\r");
        let (engine, session, _rx) = spawn_with(mock, Session::default());

        engine.start_inventory("CNR INV").await.unwrap();
        let err = engine.stop_inventory().await.unwrap_err();
        assert!(matches!(err, Error::Timeout));
        assert!(!session.lock().await.push_mode);
    }

    #[tokio::test]
    async fn stop_ignores_straggler_tag_lines() {
        let mut mock = MockTransport::new();
        mock.expect("CNR INV\r", "");
        // Tag lines already in flight arrive before the break-ack.
        mock.expect("BRK\r", "3034F00A2B5C1D80\r3034F00A2B5C1D81\rBRA\r");
        let (engine, session, _rx) = spawn_with(mock, Session::default());

        engine.start_inventory("CNR INV").await.unwrap();
        engine.stop_inventory().await.unwrap();
        assert!(!session.lock().await.push_mode);
    }

    // =======================================================================
    // Idle push handling
    // =======================================================================

    #[tokio::test]
    async fn input_change_push_becomes_event() {
        let mut mock = MockTransport::new();
        mock.push_incoming("INC 3 LO\r");
        let (engine, _session, mut event_rx) = spawn_with(mock, Session::default());

        match event_rx.recv().await.unwrap() {
            ReaderEvent::InputChanged { pin, level } => {
                assert_eq!(pin, 3);
                assert!(!level);
            }
            other => panic!("expected InputChanged, got {other:?}"),
        }
        drop(engine);
    }

    #[tokio::test]
    async fn heartbeats_are_discarded() {
        let mut mock = MockTransport::new();
        mock.push_incoming("HBT\r");
        mock.expect("REV\r", "PANEL_M4 0312\r");
        let (engine, _session, mut event_rx) = spawn_with(mock, Session::default());

        // Give the idle arm a chance to drain the heartbeat.
        tokio::time::sleep(Duration::from_millis(50)).await;

        let lines = engine
            .execute("REV", 1, Duration::from_millis(200))
            .await
            .unwrap();
        assert_eq!(lines, vec!["PANEL_M4 0312"]);
        assert!(matches!(event_rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn stray_line_while_idle_is_not_fatal() {
        let mut mock = MockTransport::new();
        mock.push_incoming("0000\r");
        mock.expect("REV\r", "PANEL_M4 0312\r");
        let (engine, _session, _rx) = spawn_with(mock, Session::default());

        tokio::time::sleep(Duration::from_millis(50)).await;

        let lines = engine
            .execute("REV", 1, Duration::from_millis(200))
            .await
            .unwrap();
        assert_eq!(lines, vec!["PANEL_M4 0312"]);
    }

    #[tokio::test]
    async fn corrupted_push_is_discarded() {
        let mut mock = MockTransport::new();
        mock.push_incoming(&format!(
            "{}\r",
            corrupt(crc::append_crc("3034F00A2B5C1D80 IVF 01"))
        ));
        mock.expect(
            &format!("{}\r", crc::append_crc("REV")),
            &format!("{}\r\n", crc::append_crc("PANEL_M4 0312")),
        );
        let (engine, _session, mut event_rx) = spawn_with(mock, crc_session());

        tokio::time::sleep(Duration::from_millis(50)).await;

        let line = engine.get("REV", Duration::from_millis(200)).await.unwrap();
        assert_eq!(line, "PANEL_M4 0312");
        assert!(matches!(event_rx.try_recv(), Err(TryRecvError::Empty)));
    }

    // =======================================================================
    // Lifecycle
    // =======================================================================

    #[tokio::test]
    async fn lost_link_fails_commands_and_emits_status() {
        let mut mock = MockTransport::new();
        mock.set_connected(false);
        let (engine, _session, mut event_rx) = spawn_with(mock, Session::default());

        let err = engine
            .execute("REV", 1, Duration::from_millis(200))
            .await
            .unwrap_err();
        assert!(err.is_link_lost());

        match event_rx.recv().await.unwrap() {
            ReaderEvent::ConnectionStatus { state, .. } => {
                assert_eq!(state, ConnectionState::Disconnected);
            }
            other => panic!("expected ConnectionStatus, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn engine_handle_fails_after_cancel() {
        let mock = MockTransport::new();
        let (engine, _session, _rx) = spawn_with(mock, Session::default());

        engine.cancel();
        tokio::time::sleep(Duration::from_millis(20)).await;

        let err = engine
            .execute("REV", 1, Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(err.is_link_lost());
    }

    #[tokio::test]
    async fn shutdown_returns_the_transport() {
        let mut mock = MockTransport::new();
        mock.expect("REV\r", "PANEL_M4 0312\r");
        let (engine, _session, _rx) = spawn_with(mock, Session::default());

        engine
            .execute("REV", 1, Duration::from_millis(200))
            .await
            .unwrap();

        let transport = engine.shutdown().await.unwrap();
        assert!(transport.is_connected());
    }
}
