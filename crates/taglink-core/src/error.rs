//! Error types for taglink.
//!
//! All fallible operations across the library return [`Result<T>`], which
//! uses [`Error`] as the error type. Transport-layer, protocol-layer, and
//! device-reported errors are all captured here, and every variant maps
//! onto one of the five [`ErrorCategory`] classes that callers use to
//! decide on retry policy.

/// The error type for all taglink operations.
///
/// Variants cover the full range of failure modes encountered when
/// communicating with RFID readers: physical transport failures, protocol
/// decode errors, device-reported faults, timeouts, and unsupported
/// operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A transport-level error (serial port, TCP socket).
    #[error("transport error: {0}")]
    Transport(String),

    /// A protocol-level error (CRC mismatch, malformed line, framing desync).
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A fault the reader reported about its own hardware.
    ///
    /// The message carries a remediation hint (check antenna, check power
    /// supply, ...). These are not auto-retried; the condition usually
    /// persists until the operator intervenes.
    #[error("hardware fault {code}: {message}")]
    Hardware {
        /// The 3-letter response code as received.
        code: String,
        /// Human-readable description with a remediation hint.
        message: String,
    },

    /// An air-interface or tag-level error code.
    ///
    /// These occur during normal operation (tag out of field, collision,
    /// memory locked) and are safe to retry at the application level.
    #[error("tag communication error: {code}")]
    TagCommunication {
        /// The raw 3-letter response code as received.
        code: String,
    },

    /// Timed out waiting for a response from the reader.
    ///
    /// This typically indicates the reader is powered off, asleep, or the
    /// connection parameters are wrong.
    #[error("timeout waiting for response")]
    Timeout,

    /// The requested operation is not supported by this reader or transport.
    #[error("unsupported operation: {0}")]
    Unsupported(String),

    /// An invalid parameter was passed to a reader command or builder.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// No connection to the reader has been established.
    #[error("not connected")]
    NotConnected,

    /// The connection to the reader was lost unexpectedly.
    #[error("connection lost")]
    ConnectionLost,

    /// An underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse error classification used for retry decisions.
///
/// Every [`Error`] belongs to exactly one category. `LinkLost` is fatal to
/// the session and requires a full reconnect; `Timeout` and
/// `TagCommunication` are recoverable; `Hardware` and `ProtocolViolation`
/// indicate conditions a retry will not fix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Device self-reported hardware fault.
    Hardware,
    /// CRC mismatch, unsupported command, malformed frame, or API misuse.
    ProtocolViolation,
    /// Air-interface or tag-level condition, retryable by the caller.
    TagCommunication,
    /// No reply within the deadline.
    Timeout,
    /// The transport is broken or was never established.
    LinkLost,
}

impl Error {
    /// Classify this error into its [`ErrorCategory`].
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Hardware { .. } => ErrorCategory::Hardware,
            Error::Protocol(_) | Error::Unsupported(_) | Error::InvalidParameter(_) => {
                ErrorCategory::ProtocolViolation
            }
            Error::TagCommunication { .. } => ErrorCategory::TagCommunication,
            Error::Timeout => ErrorCategory::Timeout,
            Error::Transport(_) | Error::NotConnected | Error::ConnectionLost | Error::Io(_) => {
                ErrorCategory::LinkLost
            }
        }
    }

    /// `true` if the session must be torn down and reconnected.
    pub fn is_link_lost(&self) -> bool {
        self.category() == ErrorCategory::LinkLost
    }
}

/// A convenience `Result` alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;
