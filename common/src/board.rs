//! The board representation and the rules of the game.
//!
//! Nothing in here performs I/O or mutates shared state. The server validates with
//! [`validate_move`], produces the next board with [`apply_move`] and derives the outcome with
//! [`compute_result`]; the client uses the same types to render what it receives.

use crate::error::MoveError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Side length of the board.
pub const BOARD_SIZE: usize = 3;

/// All eight winning lines: three rows, three columns and the two diagonals.
const LINES: [[(usize, usize); BOARD_SIZE]; 8] = [
    [(0, 0), (0, 1), (0, 2)],
    [(1, 0), (1, 1), (1, 2)],
    [(2, 0), (2, 1), (2, 2)],
    [(0, 0), (1, 0), (2, 0)],
    [(0, 1), (1, 1), (2, 1)],
    [(0, 2), (1, 2), (2, 2)],
    [(0, 0), (1, 1), (2, 2)],
    [(0, 2), (1, 1), (2, 0)],
];

/// The mark a player puts on the board. X always opens the game.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Symbol {
    X,
    O,
}

impl Symbol {
    /// The symbol of the opponent.
    pub fn other(self) -> Symbol {
        match self {
            Symbol::X => Symbol::O,
            Symbol::O => Symbol::X,
        }
    }

    /// Index into per-seat arrays, X is 0 and O is 1.
    pub fn index(self) -> usize {
        match self {
            Symbol::X => 0,
            Symbol::O => 1,
        }
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Symbol::X => write!(f, "X"),
            Symbol::O => write!(f, "O"),
        }
    }
}

/// The state of a single cell.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Cell {
    #[default]
    Empty,
    Marked(Symbol),
}

/// The outcome derived from a board. It is never stored on its own, only recomputed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameResult {
    InProgress,
    XWins,
    OWins,
    Draw,
}

impl GameResult {
    /// True for every result except [`GameResult::InProgress`].
    pub fn is_terminal(self) -> bool {
        self != GameResult::InProgress
    }

    /// The winning symbol, if any.
    pub fn winner(self) -> Option<Symbol> {
        match self {
            GameResult::XWins => Some(Symbol::X),
            GameResult::OWins => Some(Symbol::O),
            GameResult::InProgress | GameResult::Draw => None,
        }
    }

    fn win_for(symbol: Symbol) -> GameResult {
        match symbol {
            Symbol::X => GameResult::XWins,
            Symbol::O => GameResult::OWins,
        }
    }
}

impl fmt::Display for GameResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameResult::InProgress => write!(f, "in progress"),
            GameResult::XWins => write!(f, "X wins"),
            GameResult::OWins => write!(f, "O wins"),
            GameResult::Draw => write!(f, "draw"),
        }
    }
}

/// A request to put `symbol` at the given position. Rows and columns are zero based.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Move {
    pub symbol: Symbol,
    pub row: u8,
    pub column: u8,
}

impl Move {
    pub fn new(symbol: Symbol, row: u8, column: u8) -> Move {
        Move {
            symbol,
            row,
            column,
        }
    }

    /// The position as array indices, if it lies on the board.
    fn position(&self) -> Option<(usize, usize)> {
        let (row, column) = (self.row as usize, self.column as usize);
        (row < BOARD_SIZE && column < BOARD_SIZE).then_some((row, column))
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at ({}, {})", self.symbol, self.row, self.column)
    }
}

/// The 3x3 grid. Boards are small and `Copy`, so rule functions hand out new boards instead
/// of mutating the one they got.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Board {
    cells: [[Cell; BOARD_SIZE]; BOARD_SIZE],
}

impl Board {
    /// An empty board.
    pub fn new() -> Board {
        Board::default()
    }

    /// Parses a compact layout like `["XO ", " X ", "  O"]`. `X` and `O` are marks, a blank or
    /// `.` is an empty cell. Returns `None` for rows of the wrong length or unknown characters.
    pub fn from_rows(rows: [&str; BOARD_SIZE]) -> Option<Board> {
        let mut board = Board::new();
        for (row_index, row) in rows.iter().enumerate() {
            if row.chars().count() != BOARD_SIZE {
                return None;
            }
            for (column_index, character) in row.chars().enumerate() {
                board.cells[row_index][column_index] = match character {
                    'X' | 'x' => Cell::Marked(Symbol::X),
                    'O' | 'o' => Cell::Marked(Symbol::O),
                    ' ' | '.' => Cell::Empty,
                    _ => return None,
                };
            }
        }
        Some(board)
    }

    /// The cell at the given position, `None` when off the board.
    pub fn cell(&self, row: usize, column: usize) -> Option<Cell> {
        self.cells.get(row)?.get(column).copied()
    }

    /// How many marks of `symbol` are on the board.
    pub fn marks_of(&self, symbol: Symbol) -> usize {
        self.cells
            .iter()
            .flatten()
            .filter(|cell| **cell == Cell::Marked(symbol))
            .count()
    }

    /// Total amount of marks on the board.
    pub fn mark_count(&self) -> usize {
        self.cells
            .iter()
            .flatten()
            .filter(|cell| **cell != Cell::Empty)
            .count()
    }

    pub fn is_full(&self) -> bool {
        self.cells.iter().flatten().all(|cell| *cell != Cell::Empty)
    }

    /// Checks all rows, columns and diagonals for three marks of `symbol`.
    pub fn has_line(&self, symbol: Symbol) -> bool {
        LINES.iter().any(|line| {
            line.iter()
                .all(|&(row, column)| self.cells[row][column] == Cell::Marked(symbol))
        })
    }
}

impl fmt::Display for Board {
    /// Renders the board with zero based row and column labels for the console.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "    0   1   2")?;
        for (row_index, row) in self.cells.iter().enumerate() {
            let marks: Vec<&str> = row
                .iter()
                .map(|cell| match cell {
                    Cell::Empty => " ",
                    Cell::Marked(Symbol::X) => "X",
                    Cell::Marked(Symbol::O) => "O",
                })
                .collect();
            writeln!(f, "{}   {}", row_index, marks.join(" | "))?;
            if row_index + 1 < BOARD_SIZE {
                writeln!(f, "   ---+---+---")?;
            }
        }
        Ok(())
    }
}

/// Checks that `mv` may be played on `board` when it is `turn`'s move.
pub fn validate_move(board: &Board, turn: Symbol, mv: &Move) -> Result<(), MoveError> {
    if mv.symbol != turn {
        return Err(MoveError::WrongTurn { expected: turn });
    }
    let (row, column) = mv.position().ok_or(MoveError::OutOfBounds {
        row: mv.row,
        column: mv.column,
    })?;
    if board.cells[row][column] != Cell::Empty {
        return Err(MoveError::CellOccupied {
            row: mv.row,
            column: mv.column,
        });
    }
    Ok(())
}

/// Returns the board with `mv` applied. Turn order is not checked here, only that the target
/// cell exists and is empty.
pub fn apply_move(board: &Board, mv: &Move) -> Result<Board, MoveError> {
    let (row, column) = mv.position().ok_or(MoveError::OutOfBounds {
        row: mv.row,
        column: mv.column,
    })?;
    if board.cells[row][column] != Cell::Empty {
        return Err(MoveError::CellOccupied {
            row: mv.row,
            column: mv.column,
        });
    }
    let mut next = *board;
    next.cells[row][column] = Cell::Marked(mv.symbol);
    Ok(next)
}

/// Derives the outcome: a completed line wins, otherwise a full board is a draw.
pub fn compute_result(board: &Board) -> GameResult {
    for symbol in [Symbol::X, Symbol::O] {
        if board.has_line(symbol) {
            return GameResult::win_for(symbol);
        }
    }
    if board.is_full() {
        GameResult::Draw
    } else {
        GameResult::InProgress
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn board(rows: [&str; 3]) -> Board {
        Board::from_rows(rows).unwrap()
    }

    #[test]
    fn empty_board_is_in_progress() {
        assert_eq!(compute_result(&Board::new()), GameResult::InProgress);
    }

    #[test]
    fn every_line_of_x_wins() {
        let layouts = [
            ["XXX", "OO ", "   "],
            ["OO ", "XXX", "   "],
            ["OO ", "   ", "XXX"],
            ["XO ", "XO ", "X  "],
            ["OX ", "OX ", " X "],
            ["O X", "O X", "  X"],
            ["XO ", "OX ", "  X"],
            ["O X", " XO", "X  "],
        ];
        for layout in layouts {
            assert_eq!(compute_result(&board(layout)), GameResult::XWins, "{layout:?}");
        }
    }

    #[test]
    fn column_of_o_wins() {
        assert_eq!(compute_result(&board(["XOX", " O ", "XO "])), GameResult::OWins);
    }

    #[test]
    fn full_board_without_line_is_draw() {
        assert_eq!(compute_result(&board(["XOX", "XOO", "OXX"])), GameResult::Draw);
    }

    #[test]
    fn winning_last_move_on_full_board_is_not_a_draw() {
        assert_eq!(compute_result(&board(["XOX", "OXO", "OXX"])), GameResult::XWins);
    }

    #[test]
    fn occupied_cell_is_rejected_and_board_untouched() {
        let before = board(["X  ", "   ", "   "]);
        let result = apply_move(&before, &Move::new(Symbol::O, 0, 0));
        assert_eq!(result, Err(MoveError::CellOccupied { row: 0, column: 0 }));
        assert_eq!(before, board(["X  ", "   ", "   "]));
    }

    #[test]
    fn out_of_range_is_rejected() {
        let result = validate_move(&Board::new(), Symbol::X, &Move::new(Symbol::X, 3, 1));
        assert_eq!(result, Err(MoveError::OutOfBounds { row: 3, column: 1 }));
    }

    #[test]
    fn wrong_turn_is_checked_first() {
        let result = validate_move(&Board::new(), Symbol::X, &Move::new(Symbol::O, 9, 9));
        assert_eq!(result, Err(MoveError::WrongTurn { expected: Symbol::X }));
    }

    #[test]
    fn apply_returns_new_board() {
        let empty = Board::new();
        let next = apply_move(&empty, &Move::new(Symbol::X, 1, 2)).unwrap();
        assert_eq!(next.cell(1, 2), Some(Cell::Marked(Symbol::X)));
        assert_eq!(empty.mark_count(), 0);
        assert_eq!(next.mark_count(), 1);
    }

    #[test]
    fn from_rows_rejects_garbage() {
        assert!(Board::from_rows(["XX", "   ", "   "]).is_none());
        assert!(Board::from_rows(["XQX", "   ", "   "]).is_none());
    }

    #[test]
    fn renders_with_labels() {
        let text = board(["X  ", " O ", "   "]).to_string();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "    0   1   2");
        assert_eq!(lines[1], "0   X |   |  ");
        assert_eq!(lines[3], "1     | O |  ");
        assert_eq!(lines.len(), 6);
    }
}
