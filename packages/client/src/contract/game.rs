//! Game namespace contract: one in-progress game.

use serde_json::Value;

use crate::{config::Namespace, error::ProtocolError};

use super::{
    ChannelContract, EventKind, InboundEvent, OutboundEvent, SERVER_ERROR_EVENT,
    decode_payload,
    dto::{
        ClockTick, DrawOffered, GameJoinRequest, GameResult, GameSession, MoveRequest, Notice,
        RoomRef,
    },
    encode_payload,
};

/// Game channel contract marker.
#[derive(Debug)]
pub enum GameContract {}

impl ChannelContract for GameContract {
    const NAMESPACE: Namespace = Namespace::Game;
    type Inbound = GameInbound;
    type Outbound = GameOutbound;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GameEventKind {
    Joined,
    OpponentReady,
    Update,
    Result,
    DrawOffered,
    Finished,
    Clock,
    GameError,
    OpponentDisconnected,
    ServerError,
}

impl GameEventKind {
    pub const ALL: [GameEventKind; 10] = [
        GameEventKind::Joined,
        GameEventKind::OpponentReady,
        GameEventKind::Update,
        GameEventKind::Result,
        GameEventKind::DrawOffered,
        GameEventKind::Finished,
        GameEventKind::Clock,
        GameEventKind::GameError,
        GameEventKind::OpponentDisconnected,
        GameEventKind::ServerError,
    ];

    pub fn from_event_name(event: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.event_name() == event)
    }
}

impl EventKind for GameEventKind {
    fn event_name(&self) -> &'static str {
        match self {
            GameEventKind::Joined => "game:joined",
            GameEventKind::OpponentReady => "game:opponentReady",
            GameEventKind::Update => "game:update",
            GameEventKind::Result => "game:result",
            GameEventKind::DrawOffered => "game:draw:offered",
            GameEventKind::Finished => "game:finished",
            GameEventKind::Clock => "game:clock",
            GameEventKind::GameError => "game:error",
            GameEventKind::OpponentDisconnected => "game:opponentDisconnected",
            GameEventKind::ServerError => SERVER_ERROR_EVENT,
        }
    }
}

/// Server → client game events.
#[derive(Debug, Clone, PartialEq)]
pub enum GameInbound {
    Joined(Notice),
    OpponentReady(Notice),
    Update(Box<GameSession>),
    Result(GameResult),
    DrawOffered(DrawOffered),
    Finished(Notice),
    Clock(ClockTick),
    GameError(Notice),
    OpponentDisconnected(Notice),
    ServerError(Notice),
}

impl InboundEvent for GameInbound {
    type Kind = GameEventKind;

    fn decode(event: &str, payload: Value) -> Result<Self, ProtocolError> {
        let kind = GameEventKind::from_event_name(event)
            .ok_or_else(|| ProtocolError::UnknownEvent(event.to_string()))?;

        Ok(match kind {
            GameEventKind::Joined => GameInbound::Joined(decode_payload(event, payload)?),
            GameEventKind::OpponentReady => {
                GameInbound::OpponentReady(decode_payload(event, payload)?)
            }
            GameEventKind::Update => GameInbound::Update(decode_payload(event, payload)?),
            GameEventKind::Result => GameInbound::Result(decode_payload(event, payload)?),
            GameEventKind::DrawOffered => GameInbound::DrawOffered(decode_payload(event, payload)?),
            GameEventKind::Finished => GameInbound::Finished(decode_payload(event, payload)?),
            GameEventKind::Clock => GameInbound::Clock(decode_payload(event, payload)?),
            GameEventKind::GameError => GameInbound::GameError(decode_payload(event, payload)?),
            GameEventKind::OpponentDisconnected => {
                GameInbound::OpponentDisconnected(decode_payload(event, payload)?)
            }
            GameEventKind::ServerError => GameInbound::ServerError(decode_payload(event, payload)?),
        })
    }

    fn kind(&self) -> GameEventKind {
        match self {
            GameInbound::Joined(_) => GameEventKind::Joined,
            GameInbound::OpponentReady(_) => GameEventKind::OpponentReady,
            GameInbound::Update(_) => GameEventKind::Update,
            GameInbound::Result(_) => GameEventKind::Result,
            GameInbound::DrawOffered(_) => GameEventKind::DrawOffered,
            GameInbound::Finished(_) => GameEventKind::Finished,
            GameInbound::Clock(_) => GameEventKind::Clock,
            GameInbound::GameError(_) => GameEventKind::GameError,
            GameInbound::OpponentDisconnected(_) => GameEventKind::OpponentDisconnected,
            GameInbound::ServerError(_) => GameEventKind::ServerError,
        }
    }
}

/// Client → server game events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameOutbound {
    Join(GameJoinRequest),
    Move(MoveRequest),
    DrawOffer(RoomRef),
    DrawAccept(RoomRef),
    Resign(RoomRef),
}

impl OutboundEvent for GameOutbound {
    fn event_name(&self) -> &'static str {
        match self {
            GameOutbound::Join(_) => "game:join",
            GameOutbound::Move(_) => "game:move",
            GameOutbound::DrawOffer(_) => "game:draw:offer",
            GameOutbound::DrawAccept(_) => "game:draw:accept",
            GameOutbound::Resign(_) => "game:resign",
        }
    }

    fn payload(&self) -> Result<Value, ProtocolError> {
        let event = self.event_name();
        match self {
            GameOutbound::Join(request) => encode_payload(event, request),
            GameOutbound::Move(request) => encode_payload(event, request),
            GameOutbound::DrawOffer(room)
            | GameOutbound::DrawAccept(room)
            | GameOutbound::Resign(room) => encode_payload(event, room),
        }
    }
}
