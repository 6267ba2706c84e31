//! The authoritative state of one game between two players.
//!
//! ```text
//! [WaitingForPlayers] --second player seated--> [InProgress] --terminal result--> [Terminal]
//! ```
//!
//! The phase is derived from the seats and the result, it is never stored. A [`Session`] is
//! owned by exactly one session task, so nothing in here needs to be thread safe.

use common::{
    Board, GameResult, Move, MoveError, SessionError, SessionPhase, StateUpdate, Symbol,
    apply_move, compute_result, validate_move,
};

/// One game instance with its two seats.
#[derive(Debug)]
pub struct Session {
    board: Board,
    turn: Symbol,
    result: GameResult,
    /// Player names indexed by [`Symbol::index`].
    players: [Option<String>; 2],
    /// Who has seen the terminal result, indexed by [`Symbol::index`].
    acknowledged: [bool; 2],
    history: Vec<Move>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Session {
        Session {
            board: Board::new(),
            turn: Symbol::X,
            result: GameResult::InProgress,
            players: [None, None],
            acknowledged: [false, false],
            history: Vec::new(),
        }
    }

    pub fn phase(&self) -> SessionPhase {
        if self.result.is_terminal() {
            SessionPhase::Terminal
        } else if self.players.iter().all(Option::is_some) {
            SessionPhase::InProgress
        } else {
            SessionPhase::WaitingForPlayers
        }
    }

    /// Seats a new player. The first one gets X and opens the game, the second one gets O.
    pub fn seat_player(&mut self, name: String) -> Result<Symbol, SessionError> {
        let seat = [Symbol::X, Symbol::O]
            .into_iter()
            .find(|symbol| self.players[symbol.index()].is_none())
            .ok_or(SessionError::SessionFull)?;
        self.players[seat.index()] = Some(name);
        Ok(seat)
    }

    /// Validates and applies a move sent by the player seated as `seat`. On success the board,
    /// the history, the result and the turn are updated and the new result is returned. On
    /// failure nothing changes.
    pub fn submit_move(&mut self, seat: Symbol, mv: &Move) -> Result<GameResult, SessionError> {
        match self.phase() {
            SessionPhase::WaitingForPlayers => return Err(SessionError::WaitingForOpponent),
            SessionPhase::Terminal => return Err(SessionError::GameOver),
            SessionPhase::InProgress => {}
        }
        if mv.symbol != seat {
            return Err(MoveError::WrongSymbol { seat }.into());
        }
        validate_move(&self.board, self.turn, mv)?;
        self.board = apply_move(&self.board, mv)?;
        self.history.push(*mv);
        self.result = compute_result(&self.board);
        self.turn = self.turn.other();
        Ok(self.result)
    }

    /// Records that `seat` is done with a finished game. Returns true as soon as both seats
    /// have acknowledged. Before the game is over this does nothing.
    pub fn acknowledge(&mut self, seat: Symbol) -> bool {
        if self.phase() != SessionPhase::Terminal {
            return false;
        }
        self.acknowledged[seat.index()] = true;
        self.acknowledged.iter().all(|done| *done)
    }

    pub fn player_name(&self, seat: Symbol) -> Option<&str> {
        self.players[seat.index()].as_deref()
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn result(&self) -> GameResult {
        self.result
    }

    pub fn turn(&self) -> Symbol {
        self.turn
    }

    pub fn history(&self) -> &[Move] {
        &self.history
    }

    /// The state as it gets broadcast to the clients.
    pub fn snapshot(&self) -> StateUpdate {
        StateUpdate {
            board: self.board,
            turn: self.turn,
            result: self.result,
            phase: self.phase(),
            player_x: self.players[Symbol::X.index()].clone(),
            player_o: self.players[Symbol::O.index()].clone(),
            last_move: self.history.last().copied(),
        }
    }
}
