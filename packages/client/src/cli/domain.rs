//! Pure decisions of the board session, kept free of I/O for testing.

use crate::{
    contract::{ChessMove, Color, GameSession},
    error::ProtocolError,
};

/// A line typed at the board prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoardCommand {
    Move(ChessMove),
    OfferDraw,
    AcceptDraw,
    Resign,
    Quit,
    Help,
}

/// Parse one prompt line.
///
/// # Arguments
///
/// * `line` - Trimmed or untrimmed user input
///
/// # Returns
///
/// The command, or `ProtocolError::InvalidMove` when the line is neither a
/// keyword nor coordinate notation
pub fn parse_command(line: &str) -> Result<BoardCommand, ProtocolError> {
    let line = line.trim();
    match line.to_ascii_lowercase().as_str() {
        "draw" | "offer" => Ok(BoardCommand::OfferDraw),
        "accept" => Ok(BoardCommand::AcceptDraw),
        "resign" => Ok(BoardCommand::Resign),
        "quit" | "exit" | "q" => Ok(BoardCommand::Quit),
        "help" | "?" => Ok(BoardCommand::Help),
        _ => line.parse().map(BoardCommand::Move),
    }
}

/// Whether a move typed now would be the client's turn.
///
/// Unknown color or unknown side to move never blocks; the server decides.
pub fn is_my_turn(session: &GameSession, my_color: Option<Color>) -> bool {
    match (my_color, session.side_to_move()) {
        (Some(mine), Some(to_move)) => mine == to_move,
        _ => true,
    }
}

/// Whether `game:draw:offered` came from the opponent and can be accepted.
pub fn can_accept_draw(offered_by: Color, my_color: Option<Color>) -> bool {
    my_color.is_none_or(|mine| mine != offered_by)
}
