//! Turns console lines into commands and states into text.

use common::{BOARD_SIZE, GameResult, SessionPhase, StateUpdate, Symbol};
use derive_more::{Display, Error};

/// What the user can ask for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Place { row: u8, column: u8 },
    Say(String),
    /// Lists the rooms on the server.
    Rooms,
    /// Shows the own win, loss and draw counts.
    Stats,
    Help,
    Quit,
}

#[derive(Clone, Debug, PartialEq, Eq, Display, Error)]
pub enum CommandError {
    #[display("nothing entered")]
    Empty,
    #[display("'{input}' is not a command, type help for the list")]
    Unknown { input: String },
    #[display("row and column must lie between 0 and 2")]
    OutOfRange,
    #[display("say needs some text")]
    EmptyChat,
}

pub const HELP: &str = "Commands:\n  <row> <col>   place your mark, for example 1 2 or 1,2\n  say <text>    send a chat line to the room\n  rooms         list the active rooms on the server\n  stats         show your wins, losses and draws\n  quit          leave the session\n  help          show this list";

/// Parses one line typed by the user.
pub fn parse_command(line: &str) -> Result<Command, CommandError> {
    let line = line.trim();
    if line.is_empty() {
        return Err(CommandError::Empty);
    }
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };
    match word.to_ascii_lowercase().as_str() {
        "quit" | "exit" if rest.is_empty() => return Ok(Command::Quit),
        "help" | "?" if rest.is_empty() => return Ok(Command::Help),
        "rooms" if rest.is_empty() => return Ok(Command::Rooms),
        "stats" if rest.is_empty() => return Ok(Command::Stats),
        "say" => {
            return if rest.is_empty() {
                Err(CommandError::EmptyChat)
            } else {
                Ok(Command::Say(rest.to_string()))
            };
        }
        _ => {}
    }

    let coordinates: Vec<&str> = line
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|part| !part.is_empty())
        .collect();
    let [row, column] = coordinates.as_slice() else {
        return Err(CommandError::Unknown {
            input: line.to_string(),
        });
    };
    let (Ok(row), Ok(column)) = (row.parse::<u8>(), column.parse::<u8>()) else {
        return Err(CommandError::Unknown {
            input: line.to_string(),
        });
    };
    if usize::from(row) >= BOARD_SIZE || usize::from(column) >= BOARD_SIZE {
        return Err(CommandError::OutOfRange);
    }
    Ok(Command::Place { row, column })
}

/// Renders the board together with a status line written for the player holding `me`.
pub fn render_state(state: &StateUpdate, me: Symbol) -> String {
    let name = |symbol| state.player_name(symbol).unwrap_or("?");
    let mut text = format!(
        "{} (X) vs {} (O)\n{}",
        name(Symbol::X),
        name(Symbol::O),
        state.board
    );
    if let Some(last_move) = &state.last_move {
        text.push_str(&format!("Last move: {}\n", last_move));
    }
    let status = match state.phase {
        SessionPhase::WaitingForPlayers => "Waiting for an opponent to join.".to_string(),
        SessionPhase::InProgress if state.turn == me => {
            format!("Your turn, you play {}.", me)
        }
        SessionPhase::InProgress => format!("Waiting for {} to move.", name(state.turn)),
        SessionPhase::Terminal => match state.result {
            GameResult::Draw => "Game over: draw.".to_string(),
            result if result.winner() == Some(me) => "Game over: you win!".to_string(),
            _ => "Game over: you lose.".to_string(),
        },
    };
    text.push_str(&status);
    text
}
