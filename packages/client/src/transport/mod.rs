//! Transport abstraction beneath the session channels.
//!
//! A [`Connector`] opens one connection per channel and hands back a
//! [`TransportLink`]: an exclusively owned [`TransportHandle`] for outbound
//! traffic plus an ordered stream of [`TransportSignal`]s. Framing, delivery
//! order and automatic reconnection are the transport's responsibility.

use serde_json::Value;
use tokio::sync::{mpsc, oneshot};

use crate::{
    config::{Endpoint, ReconnectPolicy},
    error::{ConnectionError, ProtocolError, TransportError},
};

pub mod packet;
pub mod websocket;

#[cfg(test)]
pub(crate) mod fake;

pub use websocket::WebSocketConnector;

/// Lifecycle and traffic reported by a transport, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportSignal {
    /// Namespace connection acknowledged by the server
    Connected,
    /// A connection attempt failed (first attempt or a reconnection)
    ConnectError(ConnectionError),
    /// An established connection was lost; the reason is informational
    Disconnected(String),
    /// Inbound application event
    Event { name: String, payload: Value },
    /// Frame that could not be decoded; the connection stays up
    Malformed(ProtocolError),
}

/// Receiving half of a transport's signal stream.
///
/// The stream ends when the transport stops for good (closed by the client,
/// closed by the server, or reconnection attempts exhausted).
pub type SignalReceiver = mpsc::UnboundedReceiver<TransportSignal>;

/// Acknowledgment arguments sent back by the server.
pub type AckReceiver = oneshot::Receiver<Vec<Value>>;

/// Options fixed for both channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportOptions {
    /// Persistent streaming transport only, no long-polling fallback
    pub websocket_only: bool,
    pub reconnect: ReconnectPolicy,
}

impl From<ReconnectPolicy> for TransportOptions {
    fn from(reconnect: ReconnectPolicy) -> Self {
        Self {
            websocket_only: true,
            reconnect,
        }
    }
}

impl Default for TransportOptions {
    fn default() -> Self {
        ReconnectPolicy::default().into()
    }
}

/// An open (or opening) connection, as returned by [`Connector::open`].
pub struct TransportLink {
    pub handle: Box<dyn TransportHandle>,
    pub signals: SignalReceiver,
}

/// Opens transport connections.
#[cfg_attr(test, mockall::automock)]
pub trait Connector: Send + Sync {
    /// Start connecting to `endpoint`. Must not block; progress is reported
    /// through the returned signal stream.
    fn open(
        &self,
        endpoint: &Endpoint,
        options: &TransportOptions,
    ) -> Result<TransportLink, TransportError>;
}

/// Outbound side of one connection.
#[cfg_attr(test, mockall::automock)]
pub trait TransportHandle: Send {
    /// Fire-and-forget event.
    fn send(&self, event: &str, payload: Value) -> Result<(), TransportError>;

    /// Event carrying an acknowledgment id; the receiver resolves with the
    /// server's ack arguments, or errors if the connection goes away first.
    fn send_with_ack(&self, event: &str, payload: Value) -> Result<AckReceiver, TransportError>;

    /// Tear the connection down. Must not block and must be idempotent.
    fn close(&mut self);
}
