//! Client ↔ server event contract.
//!
//! Each channel is described by a [`ChannelContract`]: the namespace it lives
//! in, the closed set of inbound events it may receive, and the outbound
//! events it may send. Decoding happens once, at the boundary; listeners only
//! ever see values that satisfy the contract.

use std::{fmt, hash::Hash};

use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::{config::Namespace, error::ProtocolError};

pub mod chess_move;
pub mod dto;
pub mod game;
pub mod lobby;

pub use chess_move::{ChessMove, PromotionPiece, Square};
pub use dto::*;
pub use game::{GameContract, GameEventKind, GameInbound, GameOutbound};
pub use lobby::{LobbyContract, LobbyEventKind, LobbyInbound, LobbyOutbound};

/// Name of the generic server error event shared by both namespaces.
pub const SERVER_ERROR_EVENT: &str = "err";

/// Discriminant of an inbound event, used as the listener key.
pub trait EventKind: Copy + Eq + Hash + fmt::Debug + Send + Sync + 'static {
    /// Canonical wire name of the event
    fn event_name(&self) -> &'static str;
}

/// Closed set of server → client events of one channel.
pub trait InboundEvent: fmt::Debug + Send + Sized + 'static {
    type Kind: EventKind;

    /// Decode a raw `(event, payload)` pair received from the transport.
    fn decode(event: &str, payload: Value) -> Result<Self, ProtocolError>;

    fn kind(&self) -> Self::Kind;
}

/// Closed set of client → server events of one channel.
pub trait OutboundEvent: fmt::Debug + Send + 'static {
    fn event_name(&self) -> &'static str;

    /// JSON payload sent alongside the event name.
    fn payload(&self) -> Result<Value, ProtocolError>;
}

/// Binds a namespace to its inbound and outbound event sets.
pub trait ChannelContract: Send + Sync + 'static {
    const NAMESPACE: Namespace;
    type Inbound: InboundEvent;
    type Outbound: OutboundEvent;
}

/// Deserialize an event payload, mapping failures to [`ProtocolError`].
pub(crate) fn decode_payload<T: DeserializeOwned>(
    event: &str,
    payload: Value,
) -> Result<T, ProtocolError> {
    serde_json::from_value(payload).map_err(|e| ProtocolError::InvalidPayload {
        event: event.to_string(),
        reason: e.to_string(),
    })
}

/// Serialize an outbound payload, mapping failures to [`ProtocolError`].
pub(crate) fn encode_payload<T: Serialize>(event: &str, payload: &T) -> Result<Value, ProtocolError> {
    serde_json::to_value(payload).map_err(|e| ProtocolError::InvalidPayload {
        event: event.to_string(),
        reason: e.to_string(),
    })
}
