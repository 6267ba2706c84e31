use clap::Parser;
use client::HEARTBEAT;
use client::connection::WebSocketTransport;
use client::console::{Command, HELP, parse_command, render_state};
use client::game_client::{ClientEvent, ConnectionState, GameClient};
use client::lobby_pages::LobbyPages;
use common::{JoinRequest, MAX_PLAYER_NAME_LENGTH, MAX_ROOM_NAME_LENGTH, SessionPhase};
use std::io::BufRead;
use std::process::ExitCode;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Console client for tic-tac-toe
#[derive(Parser, Debug)]
#[command(name = "client")]
#[command(about = "Joins a tic-tac-toe session and plays it on the console", long_about = None)]
#[command(version)]
struct Cli {
    /// Name shown to the opponent
    #[arg(short, long)]
    name: String,

    /// Server to connect to (host:port)
    #[arg(short, long, default_value = "127.0.0.1:8080")]
    server: String,

    /// Room to join, leave empty to get matched with anyone waiting
    #[arg(short, long, default_value = "")]
    room: String,
}

/// How the session ended for us.
enum Ending {
    /// The game reached a result or the user quit.
    Regular,
    /// Anything else: lost connection, timeout, server error.
    Failure(String),
}

fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let name = cli.name.trim().to_string();
    if name.is_empty() || name.chars().count() > MAX_PLAYER_NAME_LENGTH {
        anyhow::bail!(
            "the name must have between 1 and {} characters",
            MAX_PLAYER_NAME_LENGTH
        );
    }

    let room = cli.room.trim().to_string();
    if room.chars().count() > MAX_ROOM_NAME_LENGTH {
        anyhow::bail!(
            "the room name may have at most {} characters",
            MAX_ROOM_NAME_LENGTH
        );
    }

    let pages = LobbyPages::new(&cli.server)?;
    let url = format!("ws://{}/ws", cli.server);
    let transport = WebSocketTransport::connect(&url)?;
    let join_request = JoinRequest {
        player_name: name.clone(),
        room_id: room,
    };
    let mut game_client = GameClient::new(transport, join_request);
    println!("Connecting to {}...", cli.server);

    let lookup = Lookup { pages, name };
    match run(&mut game_client, spawn_input_reader(), &lookup) {
        Ending::Regular => Ok(ExitCode::SUCCESS),
        Ending::Failure(reason) => {
            eprintln!("{}", reason);
            Ok(ExitCode::FAILURE)
        }
    }
}

/// What the lobby commands need.
struct Lookup {
    pages: LobbyPages,
    name: String,
}

impl Lookup {
    /// Fetches a page on its own thread and prints it, so the heartbeat goes on meanwhile.
    fn show(&self, command: Command) {
        let pages = self.pages.clone();
        let name = self.name.clone();
        std::thread::spawn(move || {
            let page = match command {
                Command::Stats => pages.player_stats(&name),
                _ => pages.rooms(),
            };
            match page {
                Ok(text) => println!("{}", text),
                Err(error) => println!("Could not fetch the page: {}", error),
            }
        });
    }
}

/// Reads stdin on its own thread, so the heartbeat never blocks on the user.
fn spawn_input_reader() -> Receiver<String> {
    let (sender, receiver) = mpsc::channel();
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if sender.send(line).is_err() {
                break;
            }
        }
    });
    receiver
}

/// The heartbeat loop: network update, events out, user input in.
fn run(
    game_client: &mut GameClient<WebSocketTransport>,
    input: Receiver<String>,
    lookup: &Lookup,
) -> Ending {
    loop {
        game_client.update();

        while let Some(event) = game_client.next_event() {
            match event {
                ClientEvent::State(state) => {
                    let Some(symbol) = game_client.symbol() else {
                        continue;
                    };
                    println!("\n{}", render_state(&state, symbol));
                    if state.phase == SessionPhase::Terminal {
                        game_client.acknowledge();
                        return Ending::Regular;
                    }
                }
                ClientEvent::Rejected(error) => println!("Not accepted: {}", error),
                ClientEvent::Chat(line) => println!("[{}] {}", line.from, line.text),
                ClientEvent::OpponentLeft(departure) => {
                    return Ending::Failure(format!("Game ended: {}", departure));
                }
                ClientEvent::SessionAborted(reason) => return Ending::Failure(reason),
            }
        }

        match game_client.connection_state() {
            ConnectionState::Disconnected { error_string } => {
                return match error_string {
                    Some(error) => Ending::Failure(error.clone()),
                    None => Ending::Regular,
                };
            }
            ConnectionState::Connected { .. } => {}
            ConnectionState::AwaitingHandshake | ConnectionState::ExecutingHandshake => {
                std::thread::sleep(HEARTBEAT);
                continue;
            }
        }

        loop {
            match input.try_recv() {
                Ok(line) => {
                    if let Some(ending) = handle_line(game_client, &line, lookup) {
                        return ending;
                    }
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    // End of input counts as quitting.
                    game_client.leave();
                    return Ending::Regular;
                }
            }
        }

        std::thread::sleep(HEARTBEAT);
    }
}

fn handle_line(
    game_client: &mut GameClient<WebSocketTransport>,
    line: &str,
    lookup: &Lookup,
) -> Option<Ending> {
    match parse_command(line) {
        Ok(Command::Place { row, column }) => {
            if let Err(error) = game_client.place_mark(row, column) {
                println!("Not possible: {}", error);
            }
        }
        Ok(Command::Say(text)) => game_client.send_chat(text),
        Ok(command @ (Command::Rooms | Command::Stats)) => lookup.show(command),
        Ok(Command::Help) => println!("{}", HELP),
        Ok(Command::Quit) => {
            game_client.leave();
            return Some(Ending::Regular);
        }
        Err(error) => println!("{}", error),
    }
    None
}
