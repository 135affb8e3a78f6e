use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::error::{GameError, Result};

/// One grid position. `count` is only meaningful for non-mine cells and is
/// fixed at generation time; `revealed` only ever flips false -> true.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cell {
    pub is_mine: bool,
    pub revealed: bool,
    pub count: u8,
}

/// Persisted projection of one cell, keyed by (round_id, row, col).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardCell {
    pub round_id: i64,
    pub row: usize,
    pub col: usize,
    pub is_mine: bool,
    pub revealed: bool,
    pub count: u8,
}

/// Everything a single reveal changed in memory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CascadeResult {
    /// Newly revealed coordinates, target first.
    pub opened: Vec<(usize, usize)>,
    pub hit_mine: bool,
}

impl CascadeResult {
    pub fn is_noop(&self) -> bool {
        self.opened.is_empty()
    }
}

/// Row-major minesweeper grid. The in-memory board for a round is the
/// working copy; the store holds the authoritative persisted projection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board {
    rows: usize,
    cols: usize,
    cells: Vec<Vec<Cell>>,
}

impl Board {
    fn empty(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            cells: vec![vec![Cell::default(); cols]; rows],
        }
    }

    /// Fresh board with exactly `mines` mines placed uniformly at random
    /// without replacement, and all adjacency counts computed.
    pub fn generate<R: Rng>(rows: usize, cols: usize, mines: usize, rng: &mut R) -> Self {
        let mut board = Self::empty(rows, cols);

        // Rejection sampling; terminates with probability 1 while
        // mines < rows * cols (enforced by GameConfig::validate).
        let mut placed = 0;
        while placed < mines {
            let row = rng.random_range(0..rows);
            let col = rng.random_range(0..cols);
            if !board.cells[row][col].is_mine {
                board.cells[row][col].is_mine = true;
                placed += 1;
            }
        }

        board.compute_counts();
        board
    }

    /// Board with a fixed mine layout, counts computed. Used for fixtures
    /// and deterministic play.
    pub fn with_mines(rows: usize, cols: usize, mines: &[(usize, usize)]) -> Self {
        let mut board = Self::empty(rows, cols);
        for &(row, col) in mines {
            board.cells[row][col].is_mine = true;
        }
        board.compute_counts();
        board
    }

    /// Rebuild the working copy from persisted cell records.
    pub fn from_records(rows: usize, cols: usize, records: &[BoardCell]) -> Result<Self> {
        let mut board = Self::empty(rows, cols);
        for record in records {
            if record.row >= rows || record.col >= cols {
                return Err(GameError::Internal(format!(
                    "Persisted cell ({}, {}) outside the {}x{} grid",
                    record.row, record.col, rows, cols
                )));
            }
            board.cells[record.row][record.col] = Cell {
                is_mine: record.is_mine,
                revealed: record.revealed,
                count: record.count,
            };
        }
        Ok(board)
    }

    /// Persisted projection of the full grid for `round_id`.
    pub fn to_records(&self, round_id: i64) -> Vec<BoardCell> {
        let mut records = Vec::with_capacity(self.rows * self.cols);
        for (row, cells) in self.cells.iter().enumerate() {
            for (col, cell) in cells.iter().enumerate() {
                records.push(BoardCell {
                    round_id,
                    row,
                    col,
                    is_mine: cell.is_mine,
                    revealed: cell.revealed,
                    count: cell.count,
                });
            }
        }
        records
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn in_bounds(&self, row: i64, col: i64) -> bool {
        row >= 0 && col >= 0 && (row as usize) < self.rows && (col as usize) < self.cols
    }

    pub fn cell(&self, row: usize, col: usize) -> &Cell {
        &self.cells[row][col]
    }

    pub fn mine_count(&self) -> usize {
        self.cells
            .iter()
            .flatten()
            .filter(|cell| cell.is_mine)
            .count()
    }

    pub fn safe_cells_remaining(&self) -> usize {
        self.cells
            .iter()
            .flatten()
            .filter(|cell| !cell.is_mine && !cell.revealed)
            .count()
    }

    /// True once every non-mine cell is revealed.
    pub fn is_cleared(&self) -> bool {
        self.safe_cells_remaining() == 0
    }

    fn neighbors(&self, row: usize, col: usize) -> impl Iterator<Item = (usize, usize)> + '_ {
        let rows = self.rows as i64;
        let cols = self.cols as i64;
        (-1i64..=1).flat_map(move |dr| {
            (-1i64..=1).filter_map(move |dc| {
                if dr == 0 && dc == 0 {
                    return None;
                }
                let nr = row as i64 + dr;
                let nc = col as i64 + dc;
                if nr < 0 || nr >= rows || nc < 0 || nc >= cols {
                    return None;
                }
                Some((nr as usize, nc as usize))
            })
        })
    }

    fn compute_counts(&mut self) {
        for row in 0..self.rows {
            for col in 0..self.cols {
                if self.cells[row][col].is_mine {
                    continue;
                }
                let count = self
                    .neighbors(row, col)
                    .filter(|&(nr, nc)| self.cells[nr][nc].is_mine)
                    .count() as u8;
                self.cells[row][col].count = count;
            }
        }
    }

    /// Reveal `(row, col)` and flood across the 8-connected zero-count
    /// region when the target has no adjacent mines. Iterative worklist;
    /// the `revealed` flags are the visited set, so the traversal is
    /// bounded by the grid. Out-of-bounds and already-revealed targets
    /// are silent no-ops.
    pub fn reveal_cascade(&mut self, row: i64, col: i64) -> CascadeResult {
        let mut result = CascadeResult::default();
        if !self.in_bounds(row, col) {
            return result;
        }

        let target = (row as usize, col as usize);
        if self.cells[target.0][target.1].revealed {
            return result;
        }

        self.cells[target.0][target.1].revealed = true;
        result.opened.push(target);

        if self.cells[target.0][target.1].is_mine {
            // Never cascade from a mine.
            result.hit_mine = true;
            return result;
        }

        let mut worklist = VecDeque::new();
        if self.cells[target.0][target.1].count == 0 {
            worklist.extend(self.neighbors(target.0, target.1));
        }

        while let Some((r, c)) = worklist.pop_front() {
            if self.cells[r][c].revealed {
                continue;
            }
            self.cells[r][c].revealed = true;
            result.opened.push((r, c));

            // A zero-count cell has no mined neighbor, so the frontier of
            // the flood is always safe; only zero cells keep expanding.
            if self.cells[r][c].count == 0 {
                worklist.extend(self.neighbors(r, c));
            }
        }

        result
    }
}
