//! Error types for the Rookline session client.

use std::time::Duration;

use thiserror::Error;

/// Failure to establish a channel connection.
///
/// Surfaced once, to the caller of the first `connect()`; later reconnection
/// failures are handled by the transport and only logged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectionError {
    /// The transport could not reach the endpoint
    #[error("Transport error: {0}")]
    Transport(String),

    /// The server refused the namespace connection
    #[error("Connection rejected by server: {0}")]
    Rejected(String),

    /// Neither a connect nor a connect-error signal arrived in time
    #[error("Connection attempt timed out after {0:?}")]
    Timeout(Duration),

    /// The connection attempt was torn down before it completed
    #[error("Connection attempt aborted")]
    Aborted,
}

/// An inbound or outbound message that violates the event contract.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// Event name not part of the channel's contract
    #[error("Unknown event '{0}'")]
    UnknownEvent(String),

    /// Payload is missing fields or carries an illegal value
    #[error("Invalid payload for '{event}': {reason}")]
    InvalidPayload { event: String, reason: String },

    /// Move string is not coordinate notation
    #[error("Invalid move '{0}'")]
    InvalidMove(String),

    /// Frame could not be decoded at the wire level
    #[error("Malformed packet: {0}")]
    MalformedPacket(String),
}

/// Outbound message dropped because the channel has no live connection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Channel '{namespace}' is not connected; '{event}' was dropped")]
pub struct NotConnected {
    pub namespace: String,
    pub event: String,
}

/// Why an outbound event was not handed to the transport.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EmitError {
    #[error(transparent)]
    NotConnected(#[from] NotConnected),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Acknowledgment that never arrived.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AckError {
    /// The connection went away before the server answered
    #[error("Acknowledgment for '{0}' lost")]
    Lost(String),

    #[error("Acknowledgment for '{event}' timed out after {timeout:?}")]
    Timeout { event: String, timeout: Duration },
}

/// Errors raised by a transport implementation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Endpoint URL could not be turned into a transport address
    #[error("Invalid endpoint '{0}'")]
    InvalidEndpoint(String),

    /// The transport task is gone
    #[error("Transport closed")]
    Closed,
}

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Base URL without a supported scheme
    #[error("Unsupported base URL '{0}' (expected http, https, ws or wss)")]
    UnsupportedScheme(String),

    /// Environment value could not be parsed
    #[error("Invalid value for {key}: '{value}'")]
    InvalidValue { key: String, value: String },
}

/// Client-level errors surfaced by the terminal client.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Emit(#[from] EmitError),

    #[error(transparent)]
    Ack(#[from] AckError),

    /// Server reported a domain error (e.g. lobby full, invalid move)
    #[error("Server error: {0}")]
    Server(String),

    /// The session ended before the expected event arrived
    #[error("Session closed: {0}")]
    SessionClosed(String),
}

impl From<TransportError> for ConnectionError {
    fn from(error: TransportError) -> Self {
        ConnectionError::Transport(error.to_string())
    }
}
