//! TCP transport for network-attached readers.
//!
//! This module provides [`TcpTransport`], which implements the
//! [`Transport`] trait for readers with an Ethernet interface. Gate and
//! portal readers expose the same ASCII protocol over a raw TCP socket
//! that serial models speak over a COM port.
//!
//! # Example
//!
//! ```no_run
//! use taglink_transport::TcpTransport;
//! use taglink_core::transport::Transport;
//! use std::time::Duration;
//!
//! # async fn example() -> taglink_core::Result<()> {
//! let mut transport = TcpTransport::connect("192.168.1.50:10001").await?;
//! transport.send(b"REV\r").await?;
//!
//! let mut buf = [0u8; 128];
//! let n = transport.receive(&mut buf, Duration::from_millis(500)).await?;
//! println!("firmware: {}", String::from_utf8_lossy(&buf[..n]).trim_end());
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use std::time::Duration;
use taglink_core::error::{Error, Result};
use taglink_core::transport::Transport;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// Default timeout for establishing a TCP connection.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// TCP transport for network-attached readers.
///
/// Implements the [`Transport`] trait over a TCP socket. Nagle's
/// algorithm is disabled so short command frames go out immediately.
pub struct TcpTransport {
    /// The TCP stream, `None` after `close()`.
    stream: Option<TcpStream>,
    /// Remote address for logging and [`Transport::endpoint`].
    addr: String,
}

impl TcpTransport {
    /// Connect to a reader at the given address with the default
    /// connection timeout.
    ///
    /// `addr` is in `host:port` form, e.g. `192.168.1.50:10001`.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use taglink_transport::TcpTransport;
    /// # async fn example() -> taglink_core::Result<()> {
    /// let transport = TcpTransport::connect("192.168.1.50:10001").await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn connect(addr: &str) -> Result<Self> {
        Self::connect_with_timeout(addr, DEFAULT_CONNECT_TIMEOUT).await
    }

    /// Connect to a reader with a custom connection timeout.
    pub async fn connect_with_timeout(addr: &str, timeout: Duration) -> Result<Self> {
        tracing::debug!(addr = %addr, timeout_ms = timeout.as_millis(), "connecting");

        let stream = tokio::time::timeout(timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| {
                tracing::error!(addr = %addr, "connect timed out");
                Error::Timeout
            })?
            .map_err(|e| map_connect_error(addr, e))?;

        // Command frames are a handful of bytes; don't let Nagle hold them.
        if let Err(e) = stream.set_nodelay(true) {
            tracing::warn!(addr = %addr, error = %e, "TCP_NODELAY failed");
        }

        tracing::info!(addr = %addr, "connected");

        Ok(Self {
            stream: Some(stream),
            addr: addr.to_string(),
        })
    }

    /// Wrap an already-connected [`TcpStream`].
    ///
    /// Useful for tests and for callers that manage their own sockets.
    pub fn from_stream(stream: TcpStream) -> Self {
        let addr = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        if let Err(e) = stream.set_nodelay(true) {
            tracing::warn!(addr = %addr, error = %e, "TCP_NODELAY failed");
        }

        Self {
            stream: Some(stream),
            addr,
        }
    }

    /// Get the remote address this transport is connected to.
    pub fn addr(&self) -> &str {
        &self.addr
    }
}

/// Map a connection error to a transport error with a useful message.
fn map_connect_error(addr: &str, e: std::io::Error) -> Error {
    tracing::error!(addr = %addr, error = %e, "connect failed");
    match e.kind() {
        std::io::ErrorKind::ConnectionRefused => {
            Error::Transport(format!("connection refused: {addr}"))
        }
        _ => Error::Transport(format!("failed to connect to {addr}: {e}")),
    }
}

/// Fold a send/receive I/O error into the right error variant. The
/// kinds a dying socket produces all collapse to a lost link.
fn classify_io_error(e: std::io::Error) -> Error {
    use std::io::ErrorKind;
    match e.kind() {
        ErrorKind::BrokenPipe
        | ErrorKind::ConnectionReset
        | ErrorKind::ConnectionAborted
        | ErrorKind::NotConnected => Error::ConnectionLost,
        _ => Error::Io(e),
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        let stream = self.stream.as_mut().ok_or(Error::NotConnected)?;

        tracing::trace!(
            addr = %self.addr,
            bytes = data.len(),
            data = %String::from_utf8_lossy(data).escape_debug(),
            "send"
        );

        stream.write_all(data).await.map_err(|e| {
            tracing::error!(addr = %self.addr, error = %e, "send failed");
            classify_io_error(e)
        })?;

        stream.flush().await.map_err(|e| {
            tracing::error!(addr = %self.addr, error = %e, "flush failed");
            classify_io_error(e)
        })?;

        Ok(())
    }

    async fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        let stream = self.stream.as_mut().ok_or(Error::NotConnected)?;

        let result = tokio::time::timeout(timeout, stream.read(buf)).await;

        match result {
            Ok(Ok(0)) => {
                // Clean EOF from the peer means the reader closed on us.
                tracing::warn!(addr = %self.addr, "peer closed the connection");
                self.stream = None;
                Err(Error::ConnectionLost)
            }
            Ok(Ok(n)) => {
                tracing::trace!(
                    addr = %self.addr,
                    bytes = n,
                    data = %String::from_utf8_lossy(&buf[..n]).escape_debug(),
                    "recv"
                );
                Ok(n)
            }
            Ok(Err(e)) => {
                tracing::error!(addr = %self.addr, error = %e, "receive failed");
                let err = classify_io_error(e);
                if matches!(err, Error::ConnectionLost) {
                    self.stream = None;
                }
                Err(err)
            }
            Err(_) => {
                tracing::trace!(
                    addr = %self.addr,
                    timeout_ms = timeout.as_millis(),
                    "receive timed out"
                );
                Err(Error::Timeout)
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(mut stream) = self.stream.take() {
            tracing::debug!(addr = %self.addr, "closing");

            if let Err(e) = stream.flush().await {
                tracing::warn!(addr = %self.addr, error = %e, "flush before close failed");
            }

            if let Err(e) = stream.shutdown().await {
                tracing::warn!(addr = %self.addr, error = %e, "shutdown was not clean");
            }

            tracing::info!(addr = %self.addr, "closed");
        }

        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    fn endpoint(&self) -> Result<String> {
        Ok(self.addr.clone())
    }
}

impl Drop for TcpTransport {
    fn drop(&mut self) {
        if self.stream.is_some() {
            tracing::debug!(addr = %self.addr, "dropped with the connection still open");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Start a listener that echoes everything it receives back to the
    /// client, and return its local address.
    async fn local_listener() -> (TcpListener, String) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        (listener, addr)
    }

    #[tokio::test]
    async fn connect_success() {
        let (listener, addr) = local_listener().await;

        let accept = tokio::spawn(async move { listener.accept().await.unwrap() });

        let transport = TcpTransport::connect(&addr).await.unwrap();
        assert!(transport.is_connected());
        assert_eq!(transport.endpoint().unwrap(), addr);

        accept.await.unwrap();
    }

    #[tokio::test]
    async fn connect_refused() {
        // Bind and immediately drop to get a port nothing is listening on.
        let (listener, addr) = local_listener().await;
        drop(listener);

        let result = TcpTransport::connect(&addr).await;
        match result {
            Err(Error::Transport(msg)) => {
                assert!(msg.contains("connection refused"), "got: {}", msg);
            }
            other => panic!("expected Transport error, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn connect_timeout() {
        // 192.0.2.0/24 is TEST-NET-1, guaranteed unroutable.
        let result =
            TcpTransport::connect_with_timeout("192.0.2.1:10001", Duration::from_millis(100))
                .await;
        assert!(matches!(result, Err(Error::Timeout)));
    }

    #[tokio::test]
    async fn send_and_receive() {
        let (listener, addr) = local_listener().await;

        let echo = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 256];
            let n = socket.read(&mut buf).await.unwrap();
            socket.write_all(&buf[..n]).await.unwrap();
        });

        let mut transport = TcpTransport::connect(&addr).await.unwrap();
        transport.send(b"REV\r").await.unwrap();

        let mut buf = [0u8; 256];
        let n = transport
            .receive(&mut buf, Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(&buf[..n], b"REV\r");

        echo.await.unwrap();
    }

    #[tokio::test]
    async fn receive_timeout() {
        let (listener, addr) = local_listener().await;

        // Accept but never send anything.
        let silent = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(2)).await;
            drop(socket);
        });

        let mut transport = TcpTransport::connect(&addr).await.unwrap();

        let mut buf = [0u8; 256];
        let result = transport.receive(&mut buf, Duration::from_millis(100)).await;
        assert!(matches!(result, Err(Error::Timeout)));

        silent.abort();
    }

    #[tokio::test]
    async fn detects_remote_close() {
        let (listener, addr) = local_listener().await;

        let closer = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            drop(socket);
        });

        let mut transport = TcpTransport::connect(&addr).await.unwrap();
        closer.await.unwrap();

        let mut buf = [0u8; 256];
        let result = transport.receive(&mut buf, Duration::from_secs(1)).await;
        assert!(matches!(result, Err(Error::ConnectionLost)));

        // Once the peer is gone, the transport reports disconnected.
        assert!(!transport.is_connected());
    }

    #[tokio::test]
    async fn send_after_close() {
        let (listener, addr) = local_listener().await;

        let accept = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_millis(500)).await;
            drop(socket);
        });

        let mut transport = TcpTransport::connect(&addr).await.unwrap();
        transport.close().await.unwrap();
        assert!(!transport.is_connected());

        let result = transport.send(b"REV\r").await;
        assert!(matches!(result, Err(Error::NotConnected)));

        accept.abort();
    }

    #[tokio::test]
    async fn from_stream_wraps_connected_socket() {
        let (listener, addr) = local_listener().await;

        let accept = tokio::spawn(async move { listener.accept().await.unwrap() });

        let stream = TcpStream::connect(&addr).await.unwrap();
        let transport = TcpTransport::from_stream(stream);
        assert!(transport.is_connected());

        accept.await.unwrap();
    }

    #[tokio::test]
    async fn reconnect_cycle() {
        for _ in 0..3 {
            let (listener, addr) = local_listener().await;
            let accept = tokio::spawn(async move { listener.accept().await.unwrap() });

            let mut transport = TcpTransport::connect(&addr).await.unwrap();
            assert!(transport.is_connected());
            transport.close().await.unwrap();
            assert!(!transport.is_connected());

            accept.await.unwrap();
        }
    }
}
