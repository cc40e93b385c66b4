//! NSM client error types.
//!
//! # Error Classification
//!
//! Failures fall into three groups with different propagation rules:
//!
//! - **Handshake phase** (`Configuration`, `Connection`, `ConnectionTimeout`,
//!   `HandshakeRejected`, `HandshakeTimeout`): returned from
//!   [`SessionClient::connect`](crate::client::SessionClient::connect), never
//!   swallowed. No client handle is produced.
//! - **Post-handshake transport failure** (`Transport`): recorded on the
//!   client as `last_error` and observed by polling
//!   [`ClientState::Error`](crate::client::ClientState::Error).
//! - **Handler failure**: not an `NsmError` at all. Handlers return
//!   [`HandlerError`](crate::client::HandlerError), which the command router
//!   turns into an `/error` reply.

use thiserror::Error;

use crate::protocol::ErrorCode;

/// NSM client errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NsmError {
    /// Missing handler, capability without handler, or bad server address.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Transport could not be opened or the announce could not be sent.
    #[error("Connection error: {0}")]
    Connection(String),

    /// Transport did not report readiness in time.
    #[error("Connection timed out after {0} ms")]
    ConnectionTimeout(u64),

    /// Server answered the announce with an error reply.
    #[error("Server rejected announce with error {code}: {message}")]
    HandshakeRejected {
        /// Code supplied by the server.
        code: ErrorCode,
        /// Message supplied by the server.
        message: String,
    },

    /// No announce reply arrived in time.
    #[error("Timeout after {0} ms while waiting for server announce reply")]
    HandshakeTimeout(u64),

    /// Fatal receive failure on an established connection.
    #[error("Transport error: {0}")]
    Transport(String),

    /// OSC encode/decode failure.
    #[error("OSC error: {0}")]
    Osc(String),

    /// I/O error.
    #[error("IO error: {0}")]
    Io(String),
}

impl NsmError {
    /// Whether the failure happened before any network activity.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }
}

/// Result type alias for NSM client operations
pub type Result<T> = std::result::Result<T, NsmError>;

impl From<std::io::Error> for NsmError {
    fn from(err: std::io::Error) -> Self {
        NsmError::Io(err.to_string())
    }
}

impl From<rosc::OscError> for NsmError {
    fn from(err: rosc::OscError) -> Self {
        NsmError::Osc(format!("{err:?}"))
    }
}

impl From<toml::de::Error> for NsmError {
    fn from(err: toml::de::Error) -> Self {
        NsmError::Configuration(format!("Failed to parse settings: {err}"))
    }
}

impl From<url::ParseError> for NsmError {
    fn from(err: url::ParseError) -> Self {
        NsmError::Configuration(format!("Invalid server URL: {err}"))
    }
}
