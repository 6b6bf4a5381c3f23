//! Client flows: create or join a lobby, then sit at the board.

use std::time::Duration;

use tokio::sync::mpsc;

use crate::{
    channel::{ChannelNotice, GameChannel, LobbyChannel},
    config::ClientConfig,
    contract::{GameSession, LobbyEventKind, LobbyInbound},
    error::ClientError,
};

use super::{
    formatter::MessageFormatter,
    session::{BoardOptions, run_board_session},
    ui::show,
};

const ACK_TIMEOUT: Duration = Duration::from_secs(10);

/// How a lobby is entered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LobbyMode {
    Create,
    Join { room_id: String },
}

enum LobbyInput {
    Event(LobbyInbound),
    Notice(ChannelNotice),
}

/// Create a lobby, wait for an opponent, then play.
pub async fn run_create_lobby(config: ClientConfig, player_name: String) -> Result<(), ClientError> {
    run_lobby(config, LobbyMode::Create, player_name).await
}

/// Join an existing lobby, wait for the game to start, then play.
pub async fn run_join_lobby(
    config: ClientConfig,
    room_id: String,
    player_name: String,
) -> Result<(), ClientError> {
    run_lobby(config, LobbyMode::Join { room_id }, player_name).await
}

async fn run_lobby(
    config: ClientConfig,
    mode: LobbyMode,
    player_name: String,
) -> Result<(), ClientError> {
    let lobby = LobbyChannel::websocket(&config);
    tracing::info!("Connecting to {} as '{}'", lobby.endpoint(), player_name);
    lobby.connect().await?;

    let (tx, mut rx) = mpsc::unbounded_channel();
    for kind in LobbyEventKind::ALL {
        let tx = tx.clone();
        lobby.on(kind, move |event| {
            let _ = tx.send(LobbyInput::Event(event));
        });
    }
    lobby.on_notice(move |notice| {
        let _ = tx.send(LobbyInput::Notice(notice.clone()));
    });

    let mut room_id = match &mode {
        LobbyMode::Create if config.await_lobby_ack => {
            let args = lobby
                .create_lobby_acked(&player_name)?
                .wait_timeout(ACK_TIMEOUT)
                .await?;
            tracing::debug!("lobby:create acknowledged with {:?}", args);
            None
        }
        LobbyMode::Create => {
            let _ = lobby.create_lobby(&player_name);
            None
        }
        LobbyMode::Join { room_id } => {
            let _ = lobby.join_lobby(room_id, &player_name);
            Some(room_id.clone())
        }
    };

    println!("\nWaiting for an opponent...");

    let session = loop {
        let Some(input) = rx.recv().await else {
            return Err(ClientError::SessionClosed("lobby channel closed".to_string()));
        };
        match input {
            LobbyInput::Event(LobbyInbound::Created(roster))
            | LobbyInput::Event(LobbyInbound::Update(roster)) => {
                print!("{}", MessageFormatter::format_roster(&roster, &player_name));
                room_id = Some(roster.room_id);
            }
            LobbyInput::Event(LobbyInbound::GameStart(session)) => break *session,
            LobbyInput::Event(LobbyInbound::LobbyError(notice))
            | LobbyInput::Event(LobbyInbound::ServerError(notice)) => {
                lobby.disconnect();
                return Err(ClientError::Server(notice.message));
            }
            LobbyInput::Notice(ChannelNotice::TransportClosed) => {
                return Err(ClientError::SessionClosed(
                    "lobby connection lost".to_string(),
                ));
            }
            LobbyInput::Notice(notice) => {
                if let Some(output) = MessageFormatter::format_notice(&notice) {
                    print!("{}", output);
                }
            }
        }
    };

    lobby.disconnect();

    let Some(room_id) = room_id else {
        return Err(ClientError::SessionClosed(
            "game started before a room was assigned".to_string(),
        ));
    };

    run_board(config, board_options(room_id, player_name, &session)).await
}

fn board_options(room_id: String, player_name: String, session: &GameSession) -> BoardOptions {
    BoardOptions {
        color: session.color_of(&player_name),
        game_id: Some(session.game_id.clone()),
        room_id,
        player_name,
    }
}

/// Connect the game channel and run the board prompt.
pub async fn run_board(config: ClientConfig, options: BoardOptions) -> Result<(), ClientError> {
    let game = GameChannel::websocket(&config);
    tracing::info!(
        "Connecting to {} for room {}",
        game.endpoint(),
        options.room_id
    );
    game.connect().await?;

    if let Some(color) = options.color {
        show(&format!("\nYou play {}.\n", color), &options.player_name);
    }

    run_board_session(&game, &options).await
}
