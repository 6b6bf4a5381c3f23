//! Lobby namespace contract: matchmaking until a game starts.

use serde_json::Value;

use crate::{config::Namespace, error::ProtocolError};

use super::{
    ChannelContract, EventKind, InboundEvent, OutboundEvent, SERVER_ERROR_EVENT,
    decode_payload,
    dto::{CreateLobbyRequest, GameSession, JoinLobbyRequest, LobbyRoster, Notice},
    encode_payload,
};

/// Older servers announce the match under this name.
const LEGACY_GAME_STARTED: &str = "game:started";

/// Lobby channel contract marker.
#[derive(Debug)]
pub enum LobbyContract {}

impl ChannelContract for LobbyContract {
    const NAMESPACE: Namespace = Namespace::Lobby;
    type Inbound = LobbyInbound;
    type Outbound = LobbyOutbound;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LobbyEventKind {
    Created,
    Update,
    LobbyError,
    GameStart,
    ServerError,
}

impl LobbyEventKind {
    pub const ALL: [LobbyEventKind; 5] = [
        LobbyEventKind::Created,
        LobbyEventKind::Update,
        LobbyEventKind::LobbyError,
        LobbyEventKind::GameStart,
        LobbyEventKind::ServerError,
    ];

    /// Resolve a wire name, folding legacy aliases onto their canonical kind.
    pub fn from_event_name(event: &str) -> Option<Self> {
        match event {
            "lobby:created" => Some(LobbyEventKind::Created),
            "lobby:update" => Some(LobbyEventKind::Update),
            "lobby:error" => Some(LobbyEventKind::LobbyError),
            "game:start" | LEGACY_GAME_STARTED => Some(LobbyEventKind::GameStart),
            SERVER_ERROR_EVENT => Some(LobbyEventKind::ServerError),
            _ => None,
        }
    }
}

impl EventKind for LobbyEventKind {
    fn event_name(&self) -> &'static str {
        match self {
            LobbyEventKind::Created => "lobby:created",
            LobbyEventKind::Update => "lobby:update",
            LobbyEventKind::LobbyError => "lobby:error",
            LobbyEventKind::GameStart => "game:start",
            LobbyEventKind::ServerError => SERVER_ERROR_EVENT,
        }
    }
}

/// Server → client lobby events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LobbyInbound {
    Created(LobbyRoster),
    Update(LobbyRoster),
    LobbyError(Notice),
    GameStart(Box<GameSession>),
    ServerError(Notice),
}

impl InboundEvent for LobbyInbound {
    type Kind = LobbyEventKind;

    fn decode(event: &str, payload: Value) -> Result<Self, ProtocolError> {
        let kind = LobbyEventKind::from_event_name(event)
            .ok_or_else(|| ProtocolError::UnknownEvent(event.to_string()))?;

        if event == LEGACY_GAME_STARTED {
            tracing::debug!("Normalizing legacy event '{}' to 'game:start'", event);
        }

        Ok(match kind {
            LobbyEventKind::Created => LobbyInbound::Created(decode_payload(event, payload)?),
            LobbyEventKind::Update => LobbyInbound::Update(decode_payload(event, payload)?),
            LobbyEventKind::LobbyError => LobbyInbound::LobbyError(decode_payload(event, payload)?),
            LobbyEventKind::GameStart => LobbyInbound::GameStart(decode_payload(event, payload)?),
            LobbyEventKind::ServerError => {
                LobbyInbound::ServerError(decode_payload(event, payload)?)
            }
        })
    }

    fn kind(&self) -> LobbyEventKind {
        match self {
            LobbyInbound::Created(_) => LobbyEventKind::Created,
            LobbyInbound::Update(_) => LobbyEventKind::Update,
            LobbyInbound::LobbyError(_) => LobbyEventKind::LobbyError,
            LobbyInbound::GameStart(_) => LobbyEventKind::GameStart,
            LobbyInbound::ServerError(_) => LobbyEventKind::ServerError,
        }
    }
}

/// Client → server lobby events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LobbyOutbound {
    Create(CreateLobbyRequest),
    Join(JoinLobbyRequest),
}

impl OutboundEvent for LobbyOutbound {
    fn event_name(&self) -> &'static str {
        match self {
            LobbyOutbound::Create(_) => "lobby:create",
            LobbyOutbound::Join(_) => "lobby:join",
        }
    }

    fn payload(&self) -> Result<Value, ProtocolError> {
        let event = self.event_name();
        match self {
            LobbyOutbound::Create(request) => encode_payload(event, request),
            LobbyOutbound::Join(request) => encode_payload(event, request),
        }
    }
}
