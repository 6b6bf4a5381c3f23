//! Message formatting utilities for the terminal client.

use rookline_shared::time::{format_clock_millis, timestamp_to_rfc3339};

use crate::{
    channel::ChannelNotice,
    contract::{ClockTick, Color, GameResult, GameSession, GameStatus, LobbyRoster},
};

const RULE: &str = "============================================================";

/// Message formatter for client display
pub struct MessageFormatter;

impl MessageFormatter {
    /// Format the lobby roster sent with `lobby:created` / `lobby:update`
    ///
    /// # Arguments
    ///
    /// * `roster` - Room id, players and server message
    /// * `me` - This client's player name (to mark as "me")
    ///
    /// # Returns
    ///
    /// A formatted string with the room id and player list
    pub fn format_roster(roster: &LobbyRoster, me: &str) -> String {
        let mut output = String::new();
        output.push_str(&format!("\n\n{}\n", RULE));
        output.push_str(&format!("{}\n", roster.message));
        output.push_str(&format!("Room: {}\n", roster.room_id));
        output.push_str("Players:\n");

        if roster.players.is_empty() {
            output.push_str("(No players)\n");
        } else {
            for player in &roster.players {
                let me_suffix = if player.name == me { " (me)" } else { "" };
                output.push_str(&format!("  {}{}\n", player.name, me_suffix));
            }
        }

        output.push_str(&format!("{}\n", RULE));
        output
    }

    /// Format the server-authoritative game state
    ///
    /// # Arguments
    ///
    /// * `session` - Game state from `game:start` or `game:update`
    /// * `my_color` - This client's color, if known
    ///
    /// # Returns
    ///
    /// A formatted block with seats, side to move, position and status
    pub fn format_game_state(session: &GameSession, my_color: Option<Color>) -> String {
        let seat_line = |color: Color| {
            let seat = session.seat(color);
            let me_suffix = if my_color == Some(color) { " (me)" } else { "" };
            let turn_marker = if seat.is_current { " *" } else { "" };
            format!("{:<6} {}{}{}\n", color, seat.name, me_suffix, turn_marker)
        };

        let mut output = String::new();
        output.push_str(&format!("\n{}\n", RULE));
        output.push_str(&format!("Game {}\n", session.game_id));
        output.push_str(&seat_line(Color::White));
        output.push_str(&seat_line(Color::Black));

        if let Some(fen) = &session.fen {
            output.push_str(&format!("FEN: {}\n", fen));
        }
        if let Some(moves) = &session.legal_moves {
            output.push_str(&format!("Legal moves: {}\n", moves.len()));
        }
        if let Some(status) = session.game_status {
            output.push_str(&format!("Status: {}\n", status_label(status)));
        }
        if let Some(from) = session.draw_offer_from {
            output.push_str(&format!("Draw offered by {}\n", from));
        }

        output.push_str(&format!("{}\n", RULE));
        output
    }

    /// Format a `game:clock` tick
    pub fn format_clock(tick: &ClockTick) -> String {
        format!(
            "\n[clock] white {} | black {}\n",
            format_clock_millis(tick.remaining_millis(Color::White)),
            format_clock_millis(tick.remaining_millis(Color::Black))
        )
    }

    /// Format the terminal `game:result`
    ///
    /// # Arguments
    ///
    /// * `result` - Winner and loser names
    /// * `me` - This client's player name
    pub fn format_result(result: &GameResult, me: &str) -> String {
        let verdict = if result.winner == me {
            "You won!"
        } else if result.loser == me {
            "You lost."
        } else {
            "Game over."
        };
        format!(
            "\n\n{}\n{} Winner: {}, loser: {}\n{}\n",
            RULE, verdict, result.winner, result.loser, RULE
        )
    }

    pub fn format_draw_offered(from: Color, can_accept: bool) -> String {
        if can_accept {
            format!("\n{} offers a draw. Type 'accept' to agree.\n", from)
        } else {
            "\nDraw offer sent.\n".to_string()
        }
    }

    /// Format an informational server message (`game:joined`, `game:finished`, ...)
    ///
    /// # Arguments
    ///
    /// * `message` - Message text from the server
    /// * `received_at` - Unix timestamp when the message arrived (milliseconds)
    pub fn format_info(message: &str, received_at: i64) -> String {
        format!(
            "\n← {} ({})\n",
            message,
            timestamp_to_rfc3339(received_at)
        )
    }

    /// Format a server-reported error (`err`, `lobby:error`, `game:error`)
    pub fn format_server_error(message: &str) -> String {
        format!("\n! {}\n", message)
    }

    /// Format a connection lifecycle notice, or `None` for notices not shown
    pub fn format_notice(notice: &ChannelNotice) -> Option<String> {
        match notice {
            ChannelNotice::Connected => Some("\n(connected)\n".to_string()),
            ChannelNotice::Disconnected { reason } => {
                Some(format!("\n(disconnected: {}, reconnecting...)\n", reason))
            }
            ChannelNotice::ConnectFailed(error) => {
                Some(format!("\n(reconnection failed: {})\n", error))
            }
            ChannelNotice::TransportClosed => Some("\n(connection closed)\n".to_string()),
            ChannelNotice::ProtocolViolation(_) => None,
        }
    }

    pub fn format_help() -> String {
        "\nCommands:\n  \
         <move>   coordinate notation, e.g. e2e4 or e7e8q\n  \
         draw     offer a draw\n  \
         accept   accept the opponent's draw offer\n  \
         resign   resign the game\n  \
         quit     leave the board\n"
            .to_string()
    }
}

fn status_label(status: GameStatus) -> &'static str {
    match status {
        GameStatus::Waiting => "waiting for opponent",
        GameStatus::Playing => "playing",
        GameStatus::Finished => "finished",
        GameStatus::Draw => "draw",
    }
}
