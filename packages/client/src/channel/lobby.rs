//! Lobby operations: create a lobby, join one by id.

use crate::{
    contract::{CreateLobbyRequest, JoinLobbyRequest, LobbyContract, LobbyOutbound},
    error::EmitError,
};

use super::{Acknowledgement, Delivery, SessionChannel};

impl SessionChannel<LobbyContract> {
    /// Emit `lobby:create` for `player_name`.
    pub fn create_lobby(&self, player_name: &str) -> Delivery {
        self.emit(LobbyOutbound::Create(CreateLobbyRequest {
            name: player_name.to_string(),
        }))
    }

    /// Emit `lobby:create` and keep the server's acknowledgment.
    pub fn create_lobby_acked(&self, player_name: &str) -> Result<Acknowledgement, EmitError> {
        self.emit_with_ack(LobbyOutbound::Create(CreateLobbyRequest {
            name: player_name.to_string(),
        }))
    }

    /// Emit `lobby:join` for an existing room.
    pub fn join_lobby(&self, room_id: &str, player_name: &str) -> Delivery {
        self.emit(LobbyOutbound::Join(JoinLobbyRequest {
            room_id: room_id.to_string(),
            name: player_name.to_string(),
        }))
    }
}
