use std::{fmt, num::ParseIntError};

use sodium::{Cell, CellLoop, SodiumCtx, Stream};
use thiserror::Error;

mod board;
pub mod config;
pub mod setup;
pub mod store;
pub mod theme;
pub mod visits;

pub use board::{Board, Mark, SQUARES};

#[derive(Clone, Debug, Error)]
pub enum Error {
    #[error("invalid move: square {0} is already taken!")]
    InvalidMove(usize),

    #[error("invalid index: {0}!")]
    InvalidIndex(usize),

    #[error("the game is over, reset to play again!")]
    GameOver,

    #[error("invalid input: {0}!")]
    InvalidInteger(ParseIntError),

    #[error("unknown command: {0:?}")]
    UnknownCommand(String),

    #[error("invalid board: {0}")]
    InvalidBoard(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("preference store error: {0}")]
    Store(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(String),
}

/// What the status line under the board should say.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Status {
    InProgress(Mark),
    Won(Mark),
    Draw,
}

impl Status {
    pub fn is_over(&self) -> bool {
        !matches!(self, Status::InProgress(_))
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::InProgress(mark) => write!(f, "Current player: {mark}"),
            Status::Won(mark) => write!(f, "Player {mark} wins!"),
            Status::Draw => f.write_str("It's a draw!"),
        }
    }
}

pub struct TicTacToe {
    pub board: Cell<Board>,
    pub turn: Cell<Mark>,
    pub winner: Cell<Option<Mark>>,
    pub is_draw: Cell<bool>,
    pub status: Cell<Status>,
    pub moves: Stream<(usize, Mark)>,
    pub winner_found: Stream<Mark>,
    pub rejected: Stream<Error>,
}

#[derive(Copy, Clone, Debug)]
struct Placement {
    index: usize,
    mark: Mark,
    board: Board,
}

impl Placement {
    fn is_winning(&self) -> bool {
        self.board.has_winner()
    }
}

struct MoveValidator {
    valid_move_stream: Stream<usize>,
    error_stream: Stream<Error>,
}

/// Checks a requested square against the current board and winner.
pub fn validate_move(board: &Board, winner: Option<Mark>, index: usize) -> Result<usize, Error> {
    if index >= SQUARES {
        Err(Error::InvalidIndex(index))
    } else if winner.is_some() {
        Err(Error::GameOver)
    } else if !board.is_valid_move(index) {
        Err(Error::InvalidMove(index))
    } else {
        Ok(index)
    }
}

impl TicTacToe {
    pub fn new(ctx: &SodiumCtx, move_input: &Stream<usize>, resets: &Stream<()>) -> TicTacToe {
        ctx.transaction(|| {
            let board_cell_loop: CellLoop<Board> = ctx.new_cell_loop();
            let board_cell_fwd = board_cell_loop.cell();
            let winner_cell_loop: CellLoop<Option<Mark>> = ctx.new_cell_loop();
            let winner_cell_fwd = winner_cell_loop.cell();
            let turn_cell_loop: CellLoop<Mark> = ctx.new_cell_loop();
            let turn_cell_fwd = turn_cell_loop.cell();

            let MoveValidator {
                valid_move_stream,
                error_stream,
            } = MoveValidator::new(move_input, &board_cell_fwd, &winner_cell_fwd);

            let placement_stream = valid_move_stream.snapshot3(
                &board_cell_fwd,
                &turn_cell_fwd,
                |index: &usize, board: &Board, mark: &Mark| Placement {
                    index: *index,
                    mark: *mark,
                    board: board.mark(*index, *mark),
                },
            );

            let board_cell = placement_stream
                .map(|p: &Placement| p.board)
                .or_else(&resets.map_to(Board::new()))
                .hold(Board::new());
            board_cell_loop.loop_(&board_cell);

            // The player only changes hands when the move did not end the game
            let turn_cell = placement_stream
                .filter(|p: &Placement| !p.is_winning())
                .map(|p: &Placement| p.mark.swap())
                .or_else(&resets.map_to(Mark::X))
                .hold(Mark::X);
            turn_cell_loop.loop_(&turn_cell);

            let winner_found = placement_stream
                .filter(|p: &Placement| p.is_winning())
                .map(|p: &Placement| p.mark);
            let winner_cell = winner_found
                .map(|mark: &Mark| Some(*mark))
                .or_else(&resets.map_to(None))
                .hold(None);
            winner_cell_loop.loop_(&winner_cell);

            let is_draw = board_cell.lift2(&winner_cell, |board: &Board, winner: &Option<Mark>| {
                winner.is_none() && board.is_full()
            });

            let status = board_cell.lift3(
                &turn_cell,
                &winner_cell,
                |board: &Board, turn: &Mark, winner: &Option<Mark>| match winner {
                    Some(mark) => Status::Won(*mark),
                    None if board.is_full() => Status::Draw,
                    None => Status::InProgress(*turn),
                },
            );

            let moves = placement_stream.map(|p: &Placement| (p.index, p.mark));

            TicTacToe {
                board: board_cell,
                turn: turn_cell,
                winner: winner_cell,
                is_draw,
                status,
                moves,
                winner_found,
                rejected: error_stream,
            }
        })
    }
}

impl MoveValidator {
    fn new(
        input_stream: &Stream<usize>,
        board_cell: &Cell<Board>,
        winner_cell: &Cell<Option<Mark>>,
    ) -> MoveValidator {
        let (valid_move_stream, error_stream) = input_stream
            .snapshot3(
                board_cell,
                winner_cell,
                |index: &usize, board: &Board, winner: &Option<Mark>| {
                    validate_move(board, *winner, *index)
                },
            )
            .split_res();

        MoveValidator {
            valid_move_stream,
            error_stream,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use sodium::StreamSink;

    use super::*;

    struct Harness {
        moves: StreamSink<usize>,
        resets: StreamSink<()>,
        game: TicTacToe,
    }

    impl Harness {
        fn new() -> Harness {
            let ctx = SodiumCtx::new();
            let moves: StreamSink<usize> = ctx.new_stream_sink();
            let resets: StreamSink<()> = ctx.new_stream_sink();
            let game = TicTacToe::new(&ctx, &moves.stream(), &resets.stream());
            Harness {
                moves,
                resets,
                game,
            }
        }

        fn play(&self, indices: &[usize]) {
            for index in indices {
                self.moves.send(*index);
            }
        }

        fn snapshot(&self) -> (Board, Mark, Option<Mark>) {
            (
                self.game.board.sample(),
                self.game.turn.sample(),
                self.game.winner.sample(),
            )
        }
    }

    #[test]
    fn starts_empty_with_x() {
        let h = Harness::new();
        assert_eq!(h.snapshot(), (Board::new(), Mark::X, None));
        assert!(!h.game.is_draw.sample());
        assert_eq!(h.game.status.sample(), Status::InProgress(Mark::X));
    }

    #[test]
    fn players_alternate() {
        let h = Harness::new();
        h.play(&[4]);
        assert_eq!(h.game.board.sample().get(4), Some(Mark::X));
        assert_eq!(h.game.turn.sample(), Mark::O);
        h.play(&[0]);
        assert_eq!(h.game.board.sample().get(0), Some(Mark::O));
        assert_eq!(h.game.turn.sample(), Mark::X);
    }

    #[test]
    fn occupied_square_is_ignored() {
        let h = Harness::new();
        h.play(&[4]);
        let before = h.snapshot();
        h.play(&[4]);
        assert_eq!(h.snapshot(), before);
    }

    #[test]
    fn out_of_range_is_ignored() {
        let h = Harness::new();
        h.play(&[2]);
        let before = h.snapshot();
        h.play(&[9]);
        h.play(&[usize::MAX]);
        assert_eq!(h.snapshot(), before);
    }

    #[test]
    fn column_win_for_x() {
        let h = Harness::new();
        h.play(&[0, 1, 3, 2, 6]);
        assert_eq!(h.game.winner.sample(), Some(Mark::X));
        assert_eq!(h.game.turn.sample(), Mark::X);
        assert!(!h.game.is_draw.sample());
        assert_eq!(h.game.status.sample(), Status::Won(Mark::X));
    }

    #[test]
    fn moves_after_win_are_ignored() {
        let h = Harness::new();
        h.play(&[0, 1, 3, 2, 6]);
        let before = h.snapshot();
        h.play(&[8]);
        assert_eq!(h.snapshot(), before);
    }

    #[test]
    fn full_board_without_line_is_a_draw() {
        let h = Harness::new();
        // X,O,X / X,O,O / O,X,X
        h.play(&[0, 1, 2, 4, 3, 5, 7, 6, 8]);
        assert_eq!(h.game.board.sample(), "XOX/XOO/OXX".parse::<Board>().unwrap());
        assert_eq!(h.game.winner.sample(), None);
        assert!(h.game.is_draw.sample());
        assert_eq!(h.game.status.sample(), Status::Draw);
    }

    #[test]
    fn last_square_win_is_not_a_draw() {
        let h = Harness::new();
        // X completes the main diagonal on the ninth move
        h.play(&[0, 1, 2, 3, 4, 5, 7, 6, 8]);
        assert!(h.game.board.sample().is_full());
        assert_eq!(h.game.winner.sample(), Some(Mark::X));
        assert!(!h.game.is_draw.sample());
    }

    #[test]
    fn reset_from_any_state() {
        let h = Harness::new();
        h.resets.send(());
        assert_eq!(h.snapshot(), (Board::new(), Mark::X, None));

        h.play(&[4, 0]);
        h.resets.send(());
        assert_eq!(h.snapshot(), (Board::new(), Mark::X, None));

        h.play(&[0, 1, 3, 2, 6]);
        h.resets.send(());
        assert_eq!(h.snapshot(), (Board::new(), Mark::X, None));

        h.play(&[4]);
        assert_eq!(h.game.board.sample().get(4), Some(Mark::X));
    }

    #[test]
    fn rejections_are_reported() {
        let h = Harness::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let _l = h.game.rejected.listen({
            let seen = seen.clone();
            move |err: &Error| seen.lock().unwrap().push(err.to_string())
        });

        h.play(&[0, 0, 12]);
        h.play(&[3, 1, 4, 2]);
        h.play(&[8]);

        let seen = seen.lock().unwrap();
        assert_eq!(
            *seen,
            vec![
                Error::InvalidMove(0).to_string(),
                Error::InvalidIndex(12).to_string(),
                Error::GameOver.to_string(),
            ]
        );
    }

    #[test]
    fn accepted_moves_are_announced() {
        let h = Harness::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let _l = h.game.moves.listen({
            let seen = seen.clone();
            move |m: &(usize, Mark)| seen.lock().unwrap().push(*m)
        });
        h.play(&[4, 4, 0]);
        assert_eq!(*seen.lock().unwrap(), vec![(4, Mark::X), (0, Mark::O)]);
    }

    #[test]
    fn validate_move_checks_in_order() {
        let b: Board = "X.. ... ...".parse().unwrap();
        assert!(matches!(validate_move(&b, None, 9), Err(Error::InvalidIndex(9))));
        assert!(matches!(validate_move(&b, Some(Mark::O), 4), Err(Error::GameOver)));
        assert!(matches!(validate_move(&b, None, 0), Err(Error::InvalidMove(0))));
        assert!(matches!(validate_move(&b, None, 4), Ok(4)));
    }
}
