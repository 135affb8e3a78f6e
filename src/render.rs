use serde::Serialize;

use crate::constants::COL_LABEL_BASE;
use crate::models::{Board, RoundStatus};

/// What a viewer sees in one cell. Hidden cells leak nothing about what is
/// underneath.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CellView {
    Hidden,
    Empty,
    Count(u8),
    Mine,
}

impl CellView {
    fn glyph(self) -> char {
        match self {
            Self::Hidden => '#',
            Self::Empty => '.',
            Self::Count(n) => (b'0' + n) as char,
            Self::Mine => 'x',
        }
    }
}

/// Read-only projection of a round's board, row-major.
#[derive(Debug, Clone, Serialize)]
pub struct BoardView {
    pub round_id: i64,
    pub status: RoundStatus,
    pub rows: usize,
    pub cols: usize,
    pub grid: Vec<Vec<CellView>>,
}

impl BoardView {
    pub fn project(round_id: i64, status: RoundStatus, board: &Board) -> Self {
        let grid = (0..board.rows())
            .map(|row| {
                (0..board.cols())
                    .map(|col| {
                        let cell = board.cell(row, col);
                        if !cell.revealed {
                            CellView::Hidden
                        } else if cell.is_mine {
                            CellView::Mine
                        } else if cell.count == 0 {
                            CellView::Empty
                        } else {
                            CellView::Count(cell.count)
                        }
                    })
                    .collect()
            })
            .collect();

        Self {
            round_id,
            status,
            rows: board.rows(),
            cols: board.cols(),
            grid,
        }
    }

    pub fn revealed_count(&self) -> usize {
        self.grid
            .iter()
            .flatten()
            .filter(|view| !matches!(view, CellView::Hidden))
            .count()
    }

    /// Text rendering with the same column letters and row numbers moves
    /// are addressed by.
    pub fn to_ascii(&self) -> String {
        let mut out = String::new();
        out.push_str("  ");
        for col in 0..self.cols {
            out.push(' ');
            out.push((COL_LABEL_BASE + col as u8) as char);
        }
        out.push('\n');

        for (row, cells) in self.grid.iter().enumerate() {
            out.push_str(&format!("{row:>2}"));
            for view in cells {
                out.push(' ');
                out.push(view.glyph());
            }
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hidden_cells_never_leak_mines() {
        let board = Board::with_mines(8, 8, &[(0, 0)]);
        let view = BoardView::project(1, RoundStatus::Playing, &board);
        assert_eq!(view.revealed_count(), 0);
        assert!(view
            .grid
            .iter()
            .flatten()
            .all(|cell| *cell == CellView::Hidden));
    }

    #[test]
    fn projection_distinguishes_empty_count_and_mine() {
        let mut board = Board::with_mines(2, 2, &[(0, 0)]);
        board.reveal_cascade(0, 0);
        board.reveal_cascade(1, 1);
        let view = BoardView::project(1, RoundStatus::Lost, &board);
        assert_eq!(view.grid[0][0], CellView::Mine);
        assert_eq!(view.grid[1][1], CellView::Count(1));
        assert_eq!(view.grid[0][1], CellView::Hidden);
        assert_eq!(view.revealed_count(), 2);
    }

    #[test]
    fn ascii_rendering_labels_columns_and_rows() {
        let mut board = Board::with_mines(2, 2, &[(0, 0)]);
        board.reveal_cascade(1, 1);
        let view = BoardView::project(1, RoundStatus::Playing, &board);
        assert_eq!(view.to_ascii(), "   A B\n 0 # #\n 1 # 1\n");
    }
}
