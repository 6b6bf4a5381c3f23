//! Session channels: one logical real-time connection per namespace.

use std::time::Duration;

use serde_json::Value;

use crate::{
    contract::{GameContract, LobbyContract},
    error::{AckError, ConnectionError, ProtocolError},
    transport::AckReceiver,
};

mod game;
mod lobby;
mod session;

pub use session::SessionChannel;

/// Channel bound to the lobby namespace.
pub type LobbyChannel = SessionChannel<LobbyContract>;
/// Channel bound to the game namespace.
pub type GameChannel = SessionChannel<GameContract>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Result of [`SessionChannel::emit`]. Dropped messages are never queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Sent,
    Dropped,
}

impl Delivery {
    pub fn is_sent(&self) -> bool {
        matches!(self, Delivery::Sent)
    }
}

/// Lifecycle notifications delivered to the hook set with
/// [`SessionChannel::on_notice`].
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelNotice {
    Connected,
    Disconnected { reason: String },
    ConnectFailed(ConnectionError),
    /// Inbound message rejected at the boundary; it was not forwarded
    ProtocolViolation(ProtocolError),
    /// The transport stopped for good (closed by the server or out of
    /// reconnection attempts)
    TransportClosed,
}

/// Pending application-level acknowledgment of an emitted event.
///
/// Awaiting it is optional; dropping it simply ignores the server's answer.
#[derive(Debug)]
pub struct Acknowledgement {
    event: &'static str,
    receiver: AckReceiver,
}

impl Acknowledgement {
    pub(crate) fn new(event: &'static str, receiver: AckReceiver) -> Self {
        Self { event, receiver }
    }

    pub fn event_name(&self) -> &'static str {
        self.event
    }

    /// Wait for the server's acknowledgment arguments.
    pub async fn wait(self) -> Result<Vec<Value>, AckError> {
        self.receiver
            .await
            .map_err(|_| AckError::Lost(self.event.to_string()))
    }

    /// Like [`Acknowledgement::wait`], bounded by `timeout`.
    pub async fn wait_timeout(self, timeout: Duration) -> Result<Vec<Value>, AckError> {
        let event = self.event;
        tokio::time::timeout(timeout, self.wait())
            .await
            .unwrap_or_else(|_| {
                Err(AckError::Timeout {
                    event: event.to_string(),
                    timeout,
                })
            })
    }
}
