//! UhfReader -- the [`Reader`] trait implementation for TagLink UHF
//! readers.
//!
//! Ties the ASCII protocol engine (`taglink-ascii`) to a [`Transport`]
//! to produce a working reader driver. Connecting runs the break/wake
//! handshake, switches the link to CR+LF framing with CRC16 protection,
//! and queries the firmware and hardware revisions; after that every
//! exchange goes through the background IO task, which also routes
//! inventory and GPIO pushes into broadcast events.
//!
//! Model differences (antenna count, power range, GPIO population) are
//! data in the [`UhfModel`] table; out-of-range parameters are rejected
//! here before anything touches the wire.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info};

use taglink_ascii::{
    negotiate, spawn_engine, EngineConfig, LineScanner, ReaderEngine, Session, SessionApply,
};
use taglink_core::error::{Error, Result};
use taglink_core::events::ReaderEvent;
use taglink_core::reader::Reader;
use taglink_core::transport::Transport;
use taglink_core::types::{ConnectionState, ReaderIdentity};
use taglink_transport::{SerialTransport, TcpTransport};

use crate::commands;
use crate::models::UhfModel;

/// Where the reader lives. Fixed at build time.
pub(crate) enum Endpoint {
    Serial { port: String, baud_rate: u32 },
    Tcp { addr: String },
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Serial { port, baud_rate } => write!(f, "serial {port} @ {baud_rate}"),
            Endpoint::Tcp { addr } => write!(f, "tcp {addr}"),
        }
    }
}

/// A UHF reader controlled over the ASCII line protocol.
///
/// Constructed via [`UhfReaderBuilder`](crate::builder::UhfReaderBuilder)
/// in a detached state; [`connect()`](Reader::connect) opens the
/// configured endpoint. GPIO pins and antenna ports count from 1.
pub struct UhfReader {
    model: UhfModel,
    endpoint: Endpoint,
    handshake_timeout: Duration,
    engine_config: EngineConfig,
    /// Handle to the background IO task while connected.
    engine: Mutex<Option<ReaderEngine>>,
    /// Protocol session state, shared with the IO task.
    session: Arc<Mutex<Session>>,
    event_tx: broadcast::Sender<ReaderEvent>,
    connected: AtomicBool,
}

impl UhfReader {
    /// Create a detached reader. Called by
    /// [`UhfReaderBuilder`](crate::builder::UhfReaderBuilder); use the
    /// builder API instead.
    pub(crate) fn new(
        model: UhfModel,
        endpoint: Endpoint,
        handshake_timeout: Duration,
        engine_config: EngineConfig,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(256);
        UhfReader {
            model,
            endpoint,
            handshake_timeout,
            engine_config,
            engine: Mutex::new(None),
            session: Arc::new(Mutex::new(Session::default())),
            event_tx,
            connected: AtomicBool::new(false),
        }
    }

    /// The model this reader was built for.
    pub fn model(&self) -> &UhfModel {
        &self.model
    }

    /// Human-readable link description, e.g. `serial /dev/ttyUSB0 @ 115200`.
    pub fn endpoint_text(&self) -> String {
        self.endpoint.to_string()
    }

    /// Snapshot of the protocol session: CRC and framing modes,
    /// heartbeat interval, antenna port, identity, push mode.
    pub async fn session(&self) -> Session {
        self.session.lock().await.clone()
    }

    /// Execute a raw command with the default command timeout.
    pub async fn execute(&self, command: &str) -> Result<String> {
        self.execute_command(command, self.engine_config.command_timeout)
            .await
    }

    /// Execute a command that replies with `expect_lines` lines. The
    /// lines keep their CRC suffixes.
    pub async fn execute_lines(&self, command: &str, expect_lines: usize) -> Result<Vec<String>> {
        let engine = self.engine_handle().await?;
        engine
            .execute(command, expect_lines, self.engine_config.command_timeout)
            .await
    }

    /// Multi-line variant of [`get_command`](Reader::get_command):
    /// CRC-stripped payload lines, fault codes mapped to typed errors.
    pub async fn get_command_lines(
        &self,
        command: &str,
        expect_lines: usize,
    ) -> Result<Vec<String>> {
        let engine = self.engine_handle().await?;
        engine
            .get_lines(command, expect_lines, self.engine_config.command_timeout)
            .await
    }

    /// Connect using a caller-provided transport.
    ///
    /// This is the entry point for testing (pass a `MockTransport` from
    /// `taglink-test-harness`) and for callers that manage the transport
    /// themselves. [`connect()`](Reader::connect) opens the configured
    /// endpoint and delegates here.
    pub async fn connect_with_transport(&self, transport: Box<dyn Transport>) -> Result<()> {
        let mut engine_guard = self.engine.lock().await;
        if engine_guard.is_some() {
            return Ok(());
        }
        self.emit_status(
            ConnectionState::Connecting,
            format!("connecting via {}", self.endpoint),
        );
        self.establish(&mut engine_guard, transport).await
    }

    /// Handshake, spawn the IO task, and query identity. The engine
    /// slot guard is held by the caller, so connects are serialized.
    async fn establish(
        &self,
        slot: &mut Option<ReaderEngine>,
        mut transport: Box<dyn Transport>,
    ) -> Result<()> {
        let mut session = Session::default();
        let mut scanner = LineScanner::new();
        if let Err(e) = negotiate(
            transport.as_mut(),
            &mut session,
            &mut scanner,
            self.handshake_timeout,
        )
        .await
        {
            let _ = transport.close().await;
            self.emit_status(
                ConnectionState::Disconnected,
                format!("handshake failed: {e}"),
            );
            return Err(e);
        }
        *self.session.lock().await = session;

        // The scanner moves with the transport: the handshake may leave
        // inbound bytes buffered and the engine must not lose them.
        let engine = spawn_engine(
            transport,
            scanner,
            Arc::clone(&self.session),
            self.engine_config.clone(),
            self.event_tx.clone(),
        );

        let identity = match self.query_identity(&engine).await {
            Ok(identity) => identity,
            Err(e) => {
                engine.cancel();
                engine.join().await;
                self.emit_status(
                    ConnectionState::Disconnected,
                    format!("identity query failed: {e}"),
                );
                return Err(e);
            }
        };

        info!(model = self.model.name, %identity, "reader connected");
        self.session.lock().await.identity = identity.clone();
        *slot = Some(engine);
        self.connected.store(true, Ordering::SeqCst);
        self.emit_status(ConnectionState::Connected, identity.to_string());
        Ok(())
    }

    async fn open_transport(&self) -> Result<Box<dyn Transport>> {
        match &self.endpoint {
            Endpoint::Serial { port, baud_rate } => {
                let transport = SerialTransport::open(port, *baud_rate).await?;
                Ok(Box::new(transport))
            }
            Endpoint::Tcp { addr } => {
                let transport = TcpTransport::connect(addr).await?;
                Ok(Box::new(transport))
            }
        }
    }

    async fn query_identity(&self, engine: &ReaderEngine) -> Result<ReaderIdentity> {
        let timeout = self.engine_config.command_timeout;
        let firmware = engine
            .get(commands::cmd_firmware_revision(), timeout)
            .await?;
        let hardware = engine
            .get(commands::cmd_hardware_revision(), timeout)
            .await?;
        Ok(ReaderIdentity { firmware, hardware })
    }

    /// Clone the engine handle, briefly locking the slot. The exchange
    /// itself runs without the lock, so `disconnect()` is never queued
    /// behind a slow command.
    async fn engine_handle(&self) -> Result<ReaderEngine> {
        let guard = self.engine.lock().await;
        guard.as_ref().cloned().ok_or(Error::NotConnected)
    }

    fn emit_status(&self, state: ConnectionState, message: impl Into<String>) {
        let _ = self.event_tx.send(ReaderEvent::ConnectionStatus {
            state,
            message: message.into(),
        });
    }
}

impl Drop for UhfReader {
    fn drop(&mut self) {
        // Signal the IO task to exit at its next select iteration; the
        // task owns the transport and closes it on the way out.
        if let Some(engine) = self.engine.get_mut() {
            engine.cancel();
        }
    }
}

#[async_trait]
impl Reader for UhfReader {
    async fn connect(&self) -> Result<()> {
        let mut engine_guard = self.engine.lock().await;
        if engine_guard.is_some() {
            return Ok(());
        }
        self.emit_status(
            ConnectionState::Connecting,
            format!("connecting via {}", self.endpoint),
        );
        let transport = match self.open_transport().await {
            Ok(transport) => transport,
            Err(e) => {
                self.emit_status(
                    ConnectionState::Disconnected,
                    format!("connect failed: {e}"),
                );
                return Err(e);
            }
        };
        self.establish(&mut engine_guard, transport).await
    }

    async fn disconnect(&self) -> Result<()> {
        let mut engine_guard = self.engine.lock().await;
        let engine = match engine_guard.take() {
            Some(engine) => engine,
            None => return Ok(()),
        };
        self.connected.store(false, Ordering::SeqCst);
        debug!(model = self.model.name, "disconnecting");

        // Cancel rather than queue a shutdown request: a command already
        // on the wire resolves with a link-lost error instead of holding
        // the disconnect behind its timeout. Join so the port is fully
        // released when this returns.
        engine.cancel();
        engine.join().await;

        *self.session.lock().await = Session::default();
        self.emit_status(ConnectionState::Disconnected, "disconnected");
        Ok(())
    }

    fn is_connected(&self) -> bool {
        if !self.connected.load(Ordering::SeqCst) {
            return false;
        }
        // Sync method, so try_lock: a held slot means connect or
        // disconnect is mid-flight and the flag is the best answer.
        match self.engine.try_lock() {
            Ok(guard) => matches!(guard.as_ref(), Some(engine) if engine.is_running()),
            Err(_) => true,
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<ReaderEvent> {
        self.event_tx.subscribe()
    }

    async fn identity(&self) -> Result<ReaderIdentity> {
        let identity = self.session.lock().await.identity.clone();
        if identity.is_empty() {
            return Err(Error::NotConnected);
        }
        Ok(identity)
    }

    async fn execute_command(&self, command: &str, timeout: Duration) -> Result<String> {
        let engine = self.engine_handle().await?;
        let lines = engine.execute(command, 1, timeout).await?;
        lines
            .into_iter()
            .next()
            .ok_or_else(|| Error::Protocol("empty reply".into()))
    }

    async fn set_command(&self, command: &str) -> Result<()> {
        self.engine_handle().await?.set(command).await
    }

    async fn get_command(&self, command: &str) -> Result<String> {
        let engine = self.engine_handle().await?;
        engine
            .get(command, self.engine_config.command_timeout)
            .await
    }

    async fn start_inventory(&self) -> Result<()> {
        self.engine_handle()
            .await?
            .start_inventory(commands::cmd_continuous_inventory())
            .await
    }

    async fn stop_inventory(&self) -> Result<()> {
        self.engine_handle().await?.stop_inventory().await
    }

    async fn get_inventory(&self) -> Result<Vec<String>> {
        self.engine_handle()
            .await?
            .inventory_once(commands::cmd_inventory())
            .await
    }

    async fn set_heartbeat_interval(&self, seconds: u16) -> Result<()> {
        self.engine_handle()
            .await?
            .set_with(
                commands::cmd_heartbeat_interval(seconds),
                SessionApply::HeartbeatInterval(seconds),
            )
            .await
    }

    async fn set_antenna(&self, port: u8) -> Result<()> {
        if !self.model.antenna_in_range(port) {
            return Err(Error::InvalidParameter(format!(
                "antenna port {port} out of range for {} (1..={})",
                self.model.name, self.model.antenna_count
            )));
        }
        self.engine_handle()
            .await?
            .set_with(
                commands::cmd_select_antenna(port),
                SessionApply::Antenna(port),
            )
            .await
    }

    async fn set_multiplex_count(&self, count: u8) -> Result<()> {
        if self.model.antenna_count <= 1 {
            return Err(Error::Unsupported(format!(
                "{} has a single antenna port",
                self.model.name
            )));
        }
        if count == 0 || count > self.model.antenna_count {
            return Err(Error::InvalidParameter(format!(
                "multiplex count {count} out of range for {} (1..={})",
                self.model.name, self.model.antenna_count
            )));
        }
        self.engine_handle()
            .await?
            .set(commands::cmd_multiplex_count(count))
            .await
    }

    async fn set_verbosity(&self, level: u8) -> Result<()> {
        self.engine_handle()
            .await?
            .set(commands::cmd_verbosity(level))
            .await
    }

    async fn set_crc_mode(&self, enabled: bool) -> Result<()> {
        self.engine_handle()
            .await?
            .set_with(commands::cmd_crc_mode(enabled), SessionApply::CrcMode(enabled))
            .await
    }

    async fn set_end_of_frame(&self, enabled: bool) -> Result<()> {
        self.engine_handle()
            .await?
            .set_with(
                commands::cmd_end_of_frame(enabled),
                SessionApply::EndOfFrame(enabled),
            )
            .await
    }

    async fn set_power(&self, dbm: u8) -> Result<()> {
        if !self.model.power_in_range(dbm) {
            return Err(Error::InvalidParameter(format!(
                "{} dBm out of range for {} ({}..={} dBm)",
                dbm,
                self.model.name,
                self.model.power_range_dbm.start(),
                self.model.power_range_dbm.end()
            )));
        }
        self.engine_handle()
            .await?
            .set(commands::cmd_set_power(dbm))
            .await
    }

    async fn read_input(&self, pin: u8) -> Result<bool> {
        if self.model.gpio_inputs == 0 {
            return Err(Error::Unsupported(format!(
                "{} has no GPIO inputs",
                self.model.name
            )));
        }
        if pin == 0 || pin > self.model.gpio_inputs {
            return Err(Error::InvalidParameter(format!(
                "input pin {pin} out of range for {} (1..={})",
                self.model.name, self.model.gpio_inputs
            )));
        }
        let engine = self.engine_handle().await?;
        let reply = engine
            .get(
                commands::cmd_read_input(pin),
                self.engine_config.command_timeout,
            )
            .await?;
        commands::parse_input_level(&reply)
    }

    async fn set_output(&self, pin: u8, level: bool) -> Result<()> {
        if self.model.gpio_outputs == 0 {
            return Err(Error::Unsupported(format!(
                "{} has no GPIO outputs",
                self.model.name
            )));
        }
        if pin == 0 || pin > self.model.gpio_outputs {
            return Err(Error::InvalidParameter(format!(
                "output pin {pin} out of range for {} (1..={})",
                self.model.name, self.model.gpio_outputs
            )));
        }
        self.engine_handle()
            .await?
            .set(commands::cmd_write_output(pin, level))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::UhfReaderBuilder;
    use crate::models::{tl_d100, tl_p400};
    use taglink_ascii::crc;
    use taglink_test_harness::MockTransport;

    const FIRMWARE: &str = "PANEL_M4 0312";
    const HARDWARE: &str = "HW 0100";

    /// A host-to-reader frame under CRC mode.
    fn cmd(text: &str) -> String {
        format!("{}\r", crc::append_crc(text))
    }

    /// A reader-to-host line under CRC mode and end-of-frame framing.
    fn reply(text: &str) -> String {
        format!("{}\r\n", crc::append_crc(text))
    }

    /// Script the full break handshake, link configuration, and
    /// identity exchange.
    fn script_connect(mock: &mut MockTransport) {
        mock.expect("BRK\r", "OK!\r");
        mock.expect("HBT 0\r", "OK!\r");
        mock.expect("EOF\r", "OK!\r\n");
        // The CON reply arrives before our CRC flag flips, so it is bare.
        mock.expect("CON\r", "OK!\r\n");
        mock.expect(&cmd("HBT 10"), &reply("OK!"));
        mock.expect(&cmd("REV"), &reply(FIRMWARE));
        mock.expect(&cmd("RHW"), &reply(HARDWARE));
    }

    fn detached(model: UhfModel) -> UhfReader {
        UhfReaderBuilder::new(model)
            .serial_port("/dev/ttyUSB0")
            .build()
            .unwrap()
    }

    async fn connected(model: UhfModel, mock: MockTransport) -> UhfReader {
        let reader = detached(model);
        reader
            .connect_with_transport(Box::new(mock))
            .await
            .unwrap();
        reader
    }

    // -----------------------------------------------------------------
    // Connection lifecycle
    // -----------------------------------------------------------------

    #[tokio::test]
    async fn connect_negotiates_and_queries_identity() {
        let mut mock = MockTransport::new();
        script_connect(&mut mock);

        let reader = connected(tl_p400(), mock).await;
        assert!(reader.is_connected());

        let identity = reader.identity().await.unwrap();
        assert_eq!(identity.firmware, FIRMWARE);
        assert_eq!(identity.hardware, HARDWARE);

        let session = reader.session().await;
        assert!(session.crc_mode);
        assert!(session.end_of_frame);
        assert_eq!(session.heartbeat_interval, 10);
    }

    #[tokio::test]
    async fn connect_is_idempotent() {
        let mut mock = MockTransport::new();
        script_connect(&mut mock);

        let reader = connected(tl_p400(), mock).await;

        // A second connect is a no-op; the unscripted mock is dropped
        // without a single byte sent to it.
        let spare = MockTransport::new();
        reader
            .connect_with_transport(Box::new(spare))
            .await
            .unwrap();
        assert!(reader.is_connected());
    }

    #[tokio::test]
    async fn connect_emits_the_status_sequence() {
        let mut mock = MockTransport::new();
        script_connect(&mut mock);

        let reader = detached(tl_p400());
        let mut events = reader.subscribe();
        reader
            .connect_with_transport(Box::new(mock))
            .await
            .unwrap();

        match events.recv().await.unwrap() {
            ReaderEvent::ConnectionStatus { state, .. } => {
                assert_eq!(state, ConnectionState::Connecting);
            }
            other => panic!("expected status event, got {other:?}"),
        }
        match events.recv().await.unwrap() {
            ReaderEvent::ConnectionStatus { state, message } => {
                assert_eq!(state, ConnectionState::Connected);
                assert!(message.contains(FIRMWARE));
            }
            other => panic!("expected status event, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unknown_device_fails_the_connect() {
        let mut mock = MockTransport::new();
        mock.expect("BRK\r", "UCO 01\r");

        let reader = detached(tl_p400());
        let mut events = reader.subscribe();
        let result = reader.connect_with_transport(Box::new(mock)).await;

        assert!(matches!(result, Err(Error::Protocol(_))));
        assert!(!reader.is_connected());

        // Connecting, then Disconnected with the failure reason.
        let _ = events.recv().await.unwrap();
        match events.recv().await.unwrap() {
            ReaderEvent::ConnectionStatus { state, message } => {
                assert_eq!(state, ConnectionState::Disconnected);
                assert!(message.contains("handshake failed"));
            }
            other => panic!("expected status event, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn identity_fault_tears_the_connection_down() {
        let mut mock = MockTransport::new();
        mock.expect("BRK\r", "OK!\r");
        mock.expect("HBT 0\r", "OK!\r");
        mock.expect("EOF\r", "OK!\r\n");
        mock.expect("CON\r", "OK!\r\n");
        mock.expect(&cmd("HBT 10"), &reply("OK!"));
        mock.expect(&cmd("REV"), &reply("HWF 255"));

        let reader = detached(tl_p400());
        let result = reader.connect_with_transport(Box::new(mock)).await;

        assert!(matches!(result, Err(Error::Hardware { .. })));
        assert!(!reader.is_connected());
        assert!(matches!(
            reader.execute("INV").await,
            Err(Error::NotConnected)
        ));
    }

    #[tokio::test]
    async fn disconnect_is_idempotent() {
        let mut mock = MockTransport::new();
        script_connect(&mut mock);

        let reader = connected(tl_p400(), mock).await;
        let mut events = reader.subscribe();

        reader.disconnect().await.unwrap();
        assert!(!reader.is_connected());
        reader.disconnect().await.unwrap();

        match events.recv().await.unwrap() {
            ReaderEvent::ConnectionStatus { state, message } => {
                assert_eq!(state, ConnectionState::Disconnected);
                assert_eq!(message, "disconnected");
            }
            other => panic!("expected status event, got {other:?}"),
        }

        assert!(matches!(
            reader.get_command("REV").await,
            Err(Error::NotConnected)
        ));
        assert!(matches!(
            reader.identity().await,
            Err(Error::NotConnected)
        ));
    }

    #[tokio::test]
    async fn detached_reader_rejects_commands() {
        let reader = detached(tl_p400());
        assert!(!reader.is_connected());
        assert!(matches!(
            reader.execute("INV").await,
            Err(Error::NotConnected)
        ));
        assert!(matches!(
            reader.set_command("VBL 1").await,
            Err(Error::NotConnected)
        ));
        assert!(matches!(
            reader.get_inventory().await,
            Err(Error::NotConnected)
        ));
        assert!(matches!(
            reader.identity().await,
            Err(Error::NotConnected)
        ));
    }

    // -----------------------------------------------------------------
    // Command surface
    // -----------------------------------------------------------------

    #[tokio::test]
    async fn execute_keeps_crc_and_get_strips_it() {
        let mut mock = MockTransport::new();
        script_connect(&mut mock);
        mock.expect(&cmd("REV"), &reply(FIRMWARE));
        mock.expect(&cmd("REV"), &reply(FIRMWARE));

        let reader = connected(tl_p400(), mock).await;

        let raw = reader.execute("REV").await.unwrap();
        assert_eq!(raw, crc::append_crc(FIRMWARE));

        let stripped = reader.get_command("REV").await.unwrap();
        assert_eq!(stripped, FIRMWARE);
    }

    #[tokio::test]
    async fn inventory_round_resolves_with_stripped_frames() {
        let tag = "U 3005FB63AC1F3681EC880468";
        let mut mock = MockTransport::new();
        script_connect(&mut mock);
        mock.expect(
            &cmd("INV"),
            &format!("{}{}", reply(tag), reply("IVF 01")),
        );

        let reader = connected(tl_p400(), mock).await;
        let frames = reader.get_inventory().await.unwrap();
        assert_eq!(frames, vec![tag.to_string()]);
    }

    #[tokio::test]
    async fn continuous_scan_rounds_become_events() {
        let tag = "U 3005FB63AC1F3681EC880468";
        let mut mock = MockTransport::new();
        script_connect(&mut mock);
        // The start command gets no correlated reply; the scripted bytes
        // are the pushes the reader sends once scanning.
        mock.expect(
            &cmd("CNR INV"),
            &format!("{}{}", reply(tag), reply("IVF 01")),
        );
        mock.expect(&cmd("BRK"), &reply("BRA 0312"));

        let reader = connected(tl_p400(), mock).await;
        let mut events = reader.subscribe();

        reader.start_inventory().await.unwrap();
        assert!(reader.session().await.push_mode);

        match events.recv().await.unwrap() {
            ReaderEvent::TagInventory { frames, .. } => {
                assert_eq!(frames, vec![tag.to_string()]);
            }
            other => panic!("expected tag inventory, got {other:?}"),
        }

        reader.stop_inventory().await.unwrap();
        assert!(!reader.session().await.push_mode);
    }

    // -----------------------------------------------------------------
    // Parameter validation against the model table
    // -----------------------------------------------------------------

    #[tokio::test]
    async fn set_power_validates_against_the_model_range() {
        let mut mock = MockTransport::new();
        script_connect(&mut mock);
        mock.expect(&cmd("PWR 12"), &reply("OK!"));

        // TL-D100 tops out at 12 dBm.
        let reader = connected(tl_d100(), mock).await;
        assert!(matches!(
            reader.set_power(13).await,
            Err(Error::InvalidParameter(_))
        ));
        assert!(matches!(
            reader.set_power(4).await,
            Err(Error::InvalidParameter(_))
        ));
        reader.set_power(12).await.unwrap();
    }

    #[tokio::test]
    async fn set_antenna_validates_and_updates_the_session() {
        let mut mock = MockTransport::new();
        script_connect(&mut mock);
        mock.expect(&cmd("SAP 2"), &reply("OK!"));

        let reader = connected(tl_p400(), mock).await;
        assert!(matches!(
            reader.set_antenna(0).await,
            Err(Error::InvalidParameter(_))
        ));
        assert!(matches!(
            reader.set_antenna(5).await,
            Err(Error::InvalidParameter(_))
        ));

        reader.set_antenna(2).await.unwrap();
        assert_eq!(reader.session().await.antenna, 2);
    }

    #[tokio::test]
    async fn multiplex_needs_more_than_one_antenna() {
        let mut d100_mock = MockTransport::new();
        script_connect(&mut d100_mock);
        let d100 = connected(tl_d100(), d100_mock).await;
        assert!(matches!(
            d100.set_multiplex_count(1).await,
            Err(Error::Unsupported(_))
        ));

        let mut p400_mock = MockTransport::new();
        script_connect(&mut p400_mock);
        p400_mock.expect(&cmd("SMX 4"), &reply("OK!"));
        let p400 = connected(tl_p400(), p400_mock).await;
        assert!(matches!(
            p400.set_multiplex_count(0).await,
            Err(Error::InvalidParameter(_))
        ));
        assert!(matches!(
            p400.set_multiplex_count(5).await,
            Err(Error::InvalidParameter(_))
        ));
        p400.set_multiplex_count(4).await.unwrap();
    }

    #[tokio::test]
    async fn gpio_is_gated_by_the_model_table() {
        let mut d100_mock = MockTransport::new();
        script_connect(&mut d100_mock);
        let d100 = connected(tl_d100(), d100_mock).await;
        assert!(matches!(
            d100.read_input(1).await,
            Err(Error::Unsupported(_))
        ));
        assert!(matches!(
            d100.set_output(1, true).await,
            Err(Error::Unsupported(_))
        ));

        let mut p400_mock = MockTransport::new();
        script_connect(&mut p400_mock);
        p400_mock.expect(&cmd("RIP 2"), &reply("RIP 2 HI"));
        p400_mock.expect(&cmd("WOP 1 1"), &reply("OK!"));
        let p400 = connected(tl_p400(), p400_mock).await;
        assert!(matches!(
            p400.read_input(0).await,
            Err(Error::InvalidParameter(_))
        ));
        assert!(matches!(
            p400.read_input(5).await,
            Err(Error::InvalidParameter(_))
        ));
        assert!(p400.read_input(2).await.unwrap());
        p400.set_output(1, true).await.unwrap();
    }

    #[tokio::test]
    async fn set_crc_mode_off_updates_the_session() {
        let mut mock = MockTransport::new();
        script_connect(&mut mock);
        // The COF command still goes out CRC-protected; only after the
        // ack does the session drop the flag.
        mock.expect(&cmd("COF"), &reply("OK!"));

        let reader = connected(tl_p400(), mock).await;
        reader.set_crc_mode(false).await.unwrap();
        assert!(!reader.session().await.crc_mode);
    }

    #[tokio::test]
    async fn rejected_set_leaves_the_session_alone() {
        let mut mock = MockTransport::new();
        script_connect(&mut mock);
        mock.expect(&cmd("SAP 3"), &reply("UPA 1"));

        let reader = connected(tl_p400(), mock).await;
        let result = reader.set_antenna(3).await;
        assert!(matches!(result, Err(Error::Protocol(_))));
        assert_eq!(reader.session().await.antenna, 0);
    }
}
