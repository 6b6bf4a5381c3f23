//! Terminal client: lobby flows and the interactive board.

mod domain;
mod formatter;
mod runner;
mod session;
mod ui;

pub use domain::{BoardCommand, parse_command};
pub use runner::{LobbyMode, run_board, run_create_lobby, run_join_lobby};
pub use session::BoardOptions;
