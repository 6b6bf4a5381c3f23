//! Data Transfer Objects exchanged with the chess server.
//!
//! Field names follow the server's camelCase JSON. Enumerated fields are
//! closed Rust enums, so an out-of-contract value fails to decode instead of
//! reaching the application.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::chess_move::ChessMove;

// ========================================
// Shared value types
// ========================================

/// Side of the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    White,
    Black,
}

impl Color {
    pub fn opponent(&self) -> Color {
        match self {
            Color::White => Color::Black,
            Color::Black => Color::White,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Color::White => "white",
            Color::Black => "black",
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl std::str::FromStr for Color {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "white" | "w" => Ok(Color::White),
            "black" | "b" => Ok(Color::Black),
            other => Err(format!("unknown color '{}'", other)),
        }
    }
}

/// Server-side game status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameStatus {
    Waiting,
    Playing,
    Finished,
    Draw,
}

impl GameStatus {
    /// No further moves will be accepted.
    pub fn is_terminal(&self) -> bool {
        matches!(self, GameStatus::Finished | GameStatus::Draw)
    }
}

/// Lobby room status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LobbyStatus {
    Waiting,
    Ingame,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub id: String,
    pub name: String,
}

// ========================================
// Requests (client → server)
// ========================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateLobbyRequest {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinLobbyRequest {
    pub room_id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameJoinRequest {
    pub room_id: String,
    pub player_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveRequest {
    pub room_id: String,
    #[serde(rename = "move")]
    pub chess_move: ChessMove,
    pub player_name: String,
}

/// Payload that only names the room (draw offer/accept, resign).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomRef {
    pub room_id: String,
}

// ========================================
// Server state and notifications (server → client)
// ========================================

/// One side of a game as reported by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeatInfo {
    pub name: String,
    #[serde(default)]
    pub socket_id: Option<String>,
    pub is_current: bool,
}

/// Full server-authoritative game state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameSession {
    pub game_id: String,
    /// Color assigned to this client, when the server includes it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player_color: Option<Color>,
    pub white_player: SeatInfo,
    pub black_player: SeatInfo,
    #[serde(default)]
    pub fen: Option<String>,
    #[serde(default)]
    pub legal_moves: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub draw_offer_from: Option<Color>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub game_status: Option<GameStatus>,
}

impl GameSession {
    pub fn seat(&self, color: Color) -> &SeatInfo {
        match color {
            Color::White => &self.white_player,
            Color::Black => &self.black_player,
        }
    }

    /// Side to move, derived from the `isCurrent` flags.
    pub fn side_to_move(&self) -> Option<Color> {
        match (self.white_player.is_current, self.black_player.is_current) {
            (true, false) => Some(Color::White),
            (false, true) => Some(Color::Black),
            _ => None,
        }
    }

    /// Resolve this client's color: the server's assignment wins, otherwise
    /// the seat whose name matches `player_name`.
    pub fn color_of(&self, player_name: &str) -> Option<Color> {
        self.player_color.or_else(|| {
            if self.white_player.name == player_name {
                Some(Color::White)
            } else if self.black_player.name == player_name {
                Some(Color::Black)
            } else {
                None
            }
        })
    }

    pub fn is_finished(&self) -> bool {
        self.game_status.is_some_and(|status| status.is_terminal())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LobbyRoom {
    pub room_id: String,
    pub players: Vec<Player>,
    pub status: LobbyStatus,
}

/// `lobby:created` / `lobby:update` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LobbyRoster {
    pub room_id: String,
    pub players: Vec<Player>,
    pub message: String,
}

/// Payload carrying a single human-readable message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameResult {
    pub winner: String,
    pub loser: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrawOffered {
    pub from: Color,
}

/// Remaining time per side, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClockTick {
    pub white: f64,
    pub black: f64,
}

impl ClockTick {
    pub fn remaining_millis(&self, color: Color) -> i64 {
        let value = match color {
            Color::White => self.white,
            Color::Black => self.black,
        };
        value.round() as i64
    }
}
