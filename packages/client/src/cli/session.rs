//! Interactive board session over the game channel.

use rookline_shared::time::{Clock, SystemClock};
use rustyline::{DefaultEditor, error::ReadlineError};
use tokio::sync::mpsc;

use crate::{
    channel::{ChannelNotice, Delivery, GameChannel},
    contract::{Color, GameEventKind, GameInbound, GameSession},
    error::ClientError,
};

use super::{
    domain::{BoardCommand, can_accept_draw, is_my_turn, parse_command},
    formatter::MessageFormatter,
    ui::{redisplay_prompt, show},
};

/// Who is sitting at the board.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardOptions {
    pub room_id: String,
    pub player_name: String,
    /// Game id announced by `game:start`, if already known
    pub game_id: Option<String>,
    /// Color announced by the server, if already known
    pub color: Option<Color>,
}

enum BoardInput {
    Line(String),
    InputClosed,
    Event(GameInbound),
    Notice(ChannelNotice),
}

/// What the session loop does after handling one input.
#[derive(Debug, PartialEq, Eq)]
enum Step {
    Continue,
    Finished,
}

/// Client-side view of the game, rebuilt from server events.
struct BoardState {
    clock: Box<dyn Clock>,
    player_name: String,
    my_color: Option<Color>,
    session: Option<GameSession>,
    draw_offer_from: Option<Color>,
}

impl BoardState {
    fn new(options: &BoardOptions, clock: Box<dyn Clock>) -> Self {
        Self {
            clock,
            player_name: options.player_name.clone(),
            my_color: options.color,
            session: None,
            draw_offer_from: None,
        }
    }

    /// Fold a server event into the view and render it.
    fn apply(&mut self, event: GameInbound) -> (String, Step) {
        match event {
            GameInbound::Joined(notice)
            | GameInbound::OpponentReady(notice)
            | GameInbound::OpponentDisconnected(notice) => (
                MessageFormatter::format_info(&notice.message, self.clock.now_millis()),
                Step::Continue,
            ),
            GameInbound::Update(session) => {
                if let Some(color) = session.color_of(&self.player_name) {
                    self.my_color = Some(color);
                }
                self.draw_offer_from = session.draw_offer_from;
                let output = MessageFormatter::format_game_state(&session, self.my_color);
                self.session = Some(*session);
                (output, Step::Continue)
            }
            GameInbound::Clock(tick) => (MessageFormatter::format_clock(&tick), Step::Continue),
            GameInbound::DrawOffered(offer) => {
                self.draw_offer_from = Some(offer.from);
                (
                    MessageFormatter::format_draw_offered(
                        offer.from,
                        can_accept_draw(offer.from, self.my_color),
                    ),
                    Step::Continue,
                )
            }
            GameInbound::Result(result) => (
                MessageFormatter::format_result(&result, &self.player_name),
                Step::Finished,
            ),
            GameInbound::Finished(notice) => (
                MessageFormatter::format_info(&notice.message, self.clock.now_millis()),
                Step::Finished,
            ),
            GameInbound::GameError(notice) | GameInbound::ServerError(notice) => (
                MessageFormatter::format_server_error(&notice.message),
                Step::Continue,
            ),
        }
    }

    fn game_over(&self) -> bool {
        self.session.as_ref().is_some_and(GameSession::is_finished)
    }

    fn my_turn(&self) -> bool {
        self.session
            .as_ref()
            .is_none_or(|session| is_my_turn(session, self.my_color))
    }

    fn acceptable_draw(&self) -> bool {
        self.draw_offer_from
            .is_some_and(|from| can_accept_draw(from, self.my_color))
    }
}

/// Run the board prompt until the game ends, the user quits or the
/// connection is gone for good. The channel must already be connected.
pub async fn run_board_session(
    channel: &GameChannel,
    options: &BoardOptions,
) -> Result<(), ClientError> {
    let (input_tx, mut input_rx) = mpsc::unbounded_channel::<BoardInput>();

    for kind in GameEventKind::ALL {
        let tx = input_tx.clone();
        channel.on(kind, move |event| {
            let _ = tx.send(BoardInput::Event(event));
        });
    }
    let notice_tx = input_tx.clone();
    channel.on_notice(move |notice| {
        let _ = notice_tx.send(BoardInput::Notice(notice.clone()));
    });

    if !channel.join_game(&options.room_id, &options.player_name).is_sent() {
        return Err(ClientError::SessionClosed(
            "could not send game:join".to_string(),
        ));
    }

    match &options.game_id {
        Some(game_id) => tracing::info!(
            "Joined room {} (game {}) as '{}'",
            options.room_id,
            game_id,
            options.player_name
        ),
        None => tracing::info!("Joined room {} as '{}'", options.room_id, options.player_name),
    }
    println!(
        "\nYou are '{}'. Type a move (e.g. e2e4) or 'help'. Type 'quit' to leave.\n",
        options.player_name
    );

    spawn_readline(options.player_name.clone(), input_tx);

    let prompt = options.player_name.as_str();
    let mut state = BoardState::new(options, Box::new(SystemClock));

    while let Some(input) = input_rx.recv().await {
        match input {
            BoardInput::Line(line) => {
                if handle_line(channel, options, &state, &line) == Step::Finished {
                    break;
                }
            }
            BoardInput::InputClosed => break,
            BoardInput::Event(event) => {
                let (output, step) = state.apply(event);
                show(&output, prompt);
                if step == Step::Finished {
                    println!();
                    break;
                }
            }
            BoardInput::Notice(notice) => {
                if let ChannelNotice::Connected = notice {
                    // The server forgets the seat when the socket changes.
                    let _ = channel.join_game(&options.room_id, &options.player_name);
                }
                if let Some(output) = MessageFormatter::format_notice(&notice) {
                    show(&output, prompt);
                }
                if notice == ChannelNotice::TransportClosed {
                    return Err(ClientError::SessionClosed("connection lost".to_string()));
                }
            }
        }
    }

    channel.disconnect();
    tracing::info!("Board session ended");
    Ok(())
}

fn handle_line(
    channel: &GameChannel,
    options: &BoardOptions,
    state: &BoardState,
    line: &str,
) -> Step {
    let prompt = options.player_name.as_str();
    let room_id = options.room_id.as_str();

    let command = parse_command(line);
    if state.game_over()
        && matches!(
            command,
            Ok(BoardCommand::Move(_) | BoardCommand::OfferDraw | BoardCommand::AcceptDraw)
        )
    {
        show("The game is over.\n", prompt);
        return Step::Continue;
    }

    let delivery = match command {
        Ok(BoardCommand::Move(chess_move)) => {
            if !state.my_turn() {
                show("Not your turn.\n", prompt);
                return Step::Continue;
            }
            channel.make_move(room_id, &options.player_name, chess_move)
        }
        Ok(BoardCommand::OfferDraw) => channel.offer_draw(room_id),
        Ok(BoardCommand::AcceptDraw) => {
            if !state.acceptable_draw() {
                show("No draw offer to accept.\n", prompt);
                return Step::Continue;
            }
            channel.accept_draw(room_id)
        }
        Ok(BoardCommand::Resign) => channel.resign(room_id),
        Ok(BoardCommand::Quit) => return Step::Finished,
        Ok(BoardCommand::Help) => {
            show(&MessageFormatter::format_help(), prompt);
            return Step::Continue;
        }
        Err(e) => {
            show(&format!("{}. Type 'help' for commands.\n", e), prompt);
            return Step::Continue;
        }
    };

    if delivery == Delivery::Dropped {
        show("Not connected; command dropped.\n", prompt);
    } else {
        redisplay_prompt(prompt);
    }
    Step::Continue
}

/// Read prompt lines on a blocking thread (rustyline is synchronous).
fn spawn_readline(player_name: String, input_tx: mpsc::UnboundedSender<BoardInput>) {
    std::thread::spawn(move || {
        let mut rl = match DefaultEditor::new() {
            Ok(rl) => rl,
            Err(e) => {
                tracing::error!("Failed to initialize readline: {}", e);
                let _ = input_tx.send(BoardInput::InputClosed);
                return;
            }
        };

        let prompt = format!("{}> ", player_name);

        loop {
            match rl.readline(&prompt) {
                Ok(line) => {
                    let line = line.trim();
                    if !line.is_empty() {
                        rl.add_history_entry(line).ok();
                        if input_tx.send(BoardInput::Line(line.to_string())).is_err() {
                            break;
                        }
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    // Ctrl+C
                    tracing::info!("Interrupted");
                    break;
                }
                Err(ReadlineError::Eof) => {
                    // Ctrl+D
                    tracing::info!("EOF");
                    break;
                }
                Err(err) => {
                    tracing::error!("Readline error: {}", err);
                    break;
                }
            }
        }

        let _ = input_tx.send(BoardInput::InputClosed);
    });
}
