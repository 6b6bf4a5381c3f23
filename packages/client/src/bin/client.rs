//! Terminal client for Rookline online chess.
//!
//! Creates or joins a lobby over the `/lobby` namespace, then plays the game
//! over the `/game` namespace from an interactive prompt.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin rookline-client -- lobby create --name alice
//! cargo run --bin rookline-client -- lobby join --room-id r1 --name bob
//! cargo run --bin rookline-client -- board --room-id r1 --name bob --color black
//! ```

use std::time::Duration;

use clap::{Parser, Subcommand};

use rookline_client::{
    ClientConfig, ClientError,
    cli::{BoardOptions, run_board, run_create_lobby, run_join_lobby},
    config::{API_URL_ENV, AWAIT_LOBBY_ACK_ENV, CONNECT_TIMEOUT_ENV},
    contract::Color,
};
use rookline_shared::logger::setup_logger;

#[derive(Parser, Debug)]
#[command(name = "rookline-client")]
#[command(about = "Online chess client: lobby matchmaking and game board", long_about = None)]
struct Args {
    /// Server base URL (namespaces are appended)
    #[arg(short = 'u', long, global = true, env = API_URL_ENV)]
    url: Option<String>,

    /// Give up on a connection attempt after this many milliseconds (0 waits forever)
    #[arg(long, global = true, env = CONNECT_TIMEOUT_ENV)]
    connect_timeout_ms: Option<u64>,

    /// Wait for the server to acknowledge lobby:create
    #[arg(long, global = true, env = AWAIT_LOBBY_ACK_ENV)]
    await_ack: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create or join a lobby, then play once matched
    Lobby {
        #[command(subcommand)]
        action: LobbyAction,
    },
    /// Sit at the board of an existing room
    Board {
        #[arg(short = 'r', long)]
        room_id: String,

        #[arg(short = 'n', long)]
        name: String,

        #[arg(short = 'g', long)]
        game_id: Option<String>,

        /// white or black
        #[arg(short = 'c', long)]
        color: Option<Color>,
    },
}

#[derive(Subcommand, Debug)]
enum LobbyAction {
    /// Create a new lobby and wait for an opponent
    Create {
        #[arg(short = 'n', long)]
        name: String,
    },
    /// Join a lobby by room id
    Join {
        #[arg(short = 'r', long)]
        room_id: String,

        #[arg(short = 'n', long)]
        name: String,
    },
}

impl Args {
    fn config(&self) -> Result<ClientConfig, ClientError> {
        let mut config = ClientConfig::from_env()?;
        if let Some(url) = &self.url {
            config.base_url = ClientConfig::new(url.as_str())?.base_url;
        }
        if let Some(millis) = self.connect_timeout_ms {
            config.connect_timeout = (millis > 0).then(|| Duration::from_millis(millis));
        }
        config.await_lobby_ack = self.await_ack;
        Ok(config)
    }
}

async fn run(args: Args) -> Result<(), ClientError> {
    let config = args.config()?;

    match args.command {
        Command::Lobby {
            action: LobbyAction::Create { name },
        } => run_create_lobby(config, name).await,
        Command::Lobby {
            action: LobbyAction::Join { room_id, name },
        } => run_join_lobby(config, room_id, name).await,
        Command::Board {
            room_id,
            name,
            game_id,
            color,
        } => {
            let options = BoardOptions {
                room_id,
                player_name: name,
                game_id,
                color,
            };
            run_board(config, options).await
        }
    }
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    setup_logger(env!("CARGO_BIN_NAME"), "info");

    let args = Args::parse();

    if let Err(e) = run(args).await {
        tracing::error!("Client error: {}", e);
        std::process::exit(1);
    }
}
