use std::{fmt, str::FromStr};

use crate::Error;

pub const SQUARES: usize = 9;

const WIN_SEQUENCES: [[usize; 3]; 8] = [
    // Horizontal
    [0, 1, 2],
    [3, 4, 5],
    [6, 7, 8],
    // Vertical
    [0, 3, 6],
    [1, 4, 7],
    [2, 5, 8],
    // Diagonal
    [0, 4, 8],
    [2, 4, 6],
];

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Mark {
    X,
    O,
}

impl Mark {
    pub fn swap(&self) -> Mark {
        match self {
            Mark::X => Mark::O,
            Mark::O => Mark::X,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Mark::X => "X",
            Mark::O => "O",
        }
    }
}

impl fmt::Display for Mark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A 3x3 grid stored row-major, index 0 top left.
///
/// Boards are values: [`Board::mark`] returns a new board and leaves the
/// receiver untouched.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Board {
    squares: [Option<Mark>; SQUARES],
}

impl Board {
    pub fn new() -> Self {
        let squares = [None; SQUARES];
        Self { squares }
    }

    /// Places `mark` at `index`. Indices off the board leave it unchanged.
    pub fn mark(&self, index: usize, mark: Mark) -> Board {
        let mut new_board = *self;
        if let Some(square) = new_board.squares.get_mut(index) {
            *square = Some(mark);
        }
        new_board
    }

    pub fn get(&self, index: usize) -> Option<Mark> {
        self.squares.get(index).copied().flatten()
    }

    fn display_squares(&self) -> [&'static str; SQUARES] {
        let mut display = [""; SQUARES];
        for (dsquare, square) in display.iter_mut().zip(self.squares.iter()) {
            *dsquare = match square {
                Some(mark) => mark.as_str(),
                None => " ",
            };
        }
        display
    }

    /// True when `index` is on the board and nobody has played there yet.
    pub fn is_valid_move(&self, index: usize) -> bool {
        index < SQUARES && self.squares[index].is_none()
    }

    pub fn is_full(&self) -> bool {
        self.squares.iter().all(Option::is_some)
    }

    pub fn is_empty(&self) -> bool {
        self.squares.iter().all(Option::is_none)
    }

    pub fn winner(&self) -> Option<Mark> {
        for seq in WIN_SEQUENCES {
            let first = self.squares[seq[0]];
            if first.is_some() && seq.iter().map(|i| self.squares[*i]).all(|x| x == first) {
                return first;
            }
        }
        None
    }

    /// Whether any row, column or diagonal holds three equal marks.
    pub fn has_winner(&self) -> bool {
        self.winner().is_some()
    }
}

impl FromStr for Board {
    type Err = Error;

    /// Parses nine cells written as `X`, `O` or one of `.`, `-`, `_` for
    /// an empty square. Whitespace and `/` row separators are skipped.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut squares = [None; SQUARES];
        let mut cells = s
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '/')
            .map(|c| match c {
                'X' | 'x' => Ok(Some(Mark::X)),
                'O' | 'o' => Ok(Some(Mark::O)),
                '.' | '-' | '_' => Ok(None),
                other => Err(Error::InvalidBoard(format!("unexpected square {other:?}"))),
            });

        for square in squares.iter_mut() {
            match cells.next() {
                Some(cell) => *square = cell?,
                None => return Err(Error::InvalidBoard(format!("expected {SQUARES} squares"))),
            }
        }
        if cells.next().is_some() {
            return Err(Error::InvalidBoard(format!("expected {SQUARES} squares")));
        }

        Ok(Board { squares })
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ds = self.display_squares();
        writeln!(f, " {} | {} | {}", ds[0], ds[1], ds[2])?;
        f.write_str("---+---+---\n")?;
        writeln!(f, " {} | {} | {}", ds[3], ds[4], ds[5])?;
        f.write_str("---+---+---\n")?;
        writeln!(f, " {} | {} | {}", ds[6], ds[7], ds[8])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn board(s: &str) -> Board {
        s.parse().unwrap()
    }

    #[test]
    fn every_line_wins_for_both_marks() {
        for mark in [Mark::X, Mark::O] {
            for seq in WIN_SEQUENCES {
                let b = seq.iter().fold(Board::new(), |b, i| b.mark(*i, mark));
                assert!(b.has_winner(), "{seq:?} should win for {mark}");
                assert_eq!(b.winner(), Some(mark));
            }
        }
    }

    #[test]
    fn mixed_lines_do_not_win() {
        for seq in WIN_SEQUENCES {
            let b = Board::new()
                .mark(seq[0], Mark::X)
                .mark(seq[1], Mark::O)
                .mark(seq[2], Mark::X);
            assert!(!b.has_winner(), "{seq:?} is mixed");
        }
    }

    #[test]
    fn two_in_a_row_is_not_a_win() {
        for seq in WIN_SEQUENCES {
            let b = Board::new().mark(seq[0], Mark::O).mark(seq[1], Mark::O);
            assert!(!b.has_winner());
        }
    }

    #[test]
    fn empty_board_has_no_winner() {
        let b = Board::new();
        assert!(!b.has_winner());
        assert!(b.is_empty());
        assert!(!b.is_full());
    }

    #[test]
    fn full_board_without_line() {
        let b = board("XOX/XOO/OXX");
        assert!(b.is_full());
        assert!(!b.has_winner());
    }

    #[test]
    fn full_board_with_line() {
        let b = board("XXX/OOX/XOO");
        assert!(b.is_full());
        assert_eq!(b.winner(), Some(Mark::X));
    }

    #[test]
    fn mark_leaves_original_untouched() {
        let b = Board::new();
        let next = b.mark(4, Mark::O);
        assert_eq!(b.get(4), None);
        assert_eq!(next.get(4), Some(Mark::O));
    }

    #[test]
    fn mark_off_the_board_is_ignored() {
        let b = board("X.. .O. ...");
        assert_eq!(b.mark(9, Mark::X), b);
        assert_eq!(b.mark(usize::MAX, Mark::O), b);
    }

    #[test]
    fn winner_matches_rows_columns_and_diagonals_on_every_board() {
        let mut checked = 0;
        for code in 0..3usize.pow(SQUARES as u32) {
            let mut b = Board::new();
            let mut rest = code;
            for index in 0..SQUARES {
                match rest % 3 {
                    1 => b = b.mark(index, Mark::X),
                    2 => b = b.mark(index, Mark::O),
                    _ => {}
                }
                rest /= 3;
            }

            let at = |row: usize, col: usize| b.get(row * 3 + col);
            let same = |cells: [Option<Mark>; 3]| {
                cells[0].is_some() && cells.iter().all(|c| *c == cells[0])
            };
            let expected = (0..3).any(|r| same([at(r, 0), at(r, 1), at(r, 2)]))
                || (0..3).any(|c| same([at(0, c), at(1, c), at(2, c)]))
                || same([at(0, 0), at(1, 1), at(2, 2)])
                || same([at(0, 2), at(1, 1), at(2, 0)]);

            assert_eq!(b.has_winner(), expected, "board:\n{b}");
            checked += 1;
        }
        assert_eq!(checked, 19683);
    }

    #[test]
    fn valid_moves() {
        let b = board("X.. ... ...");
        assert!(!b.is_valid_move(0));
        assert!(b.is_valid_move(1));
        assert!(b.is_valid_move(8));
        assert!(!b.is_valid_move(9));
        assert_eq!(b.get(42), None);
    }

    #[test]
    fn parse_rejects_bad_input() {
        assert!(matches!("XO".parse::<Board>(), Err(Error::InvalidBoard(_))));
        assert!(matches!("XOX/XOO/OXXX".parse::<Board>(), Err(Error::InvalidBoard(_))));
        assert!(matches!("XOX/XZO/OXX".parse::<Board>(), Err(Error::InvalidBoard(_))));
    }

    #[test]
    fn display_is_row_major() {
        let b = board("X.. ... ..O");
        let text = b.to_string();
        let first = text.lines().next().unwrap();
        let last = text.lines().last().unwrap();
        assert_eq!(first, " X |   |  ");
        assert_eq!(last, "   |   | O");
    }
}
