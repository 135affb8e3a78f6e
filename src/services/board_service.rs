use std::sync::Arc;

use crate::config::GameConfig;
use crate::error::Result;
use crate::models::Board;
use crate::store::BoardStore;

/// Board Generator: loads the persisted grid for a round, or generates and
/// persists one when the round has no cells yet.
pub struct BoardService {
    store: Arc<dyn BoardStore>,
    config: GameConfig,
}

impl BoardService {
    pub fn new(store: Arc<dyn BoardStore>, config: GameConfig) -> Self {
        Self { store, config }
    }

    /// Idempotent per round: once cells are persisted they are loaded
    /// verbatim and the mine layout is never re-randomized.
    pub async fn load_or_generate(&self, round_id: i64) -> Result<Board> {
        let existing = self.store.find_board_cells(round_id).await?;
        if !existing.is_empty() {
            tracing::debug!(round_id, cells = existing.len(), "Loaded persisted board");
            return Board::from_records(self.config.rows, self.config.cols, &existing);
        }

        // Build the grid fully in memory before the first store write so a
        // persistence failure never leaves a half-initialized board behind.
        let board = Board::generate(
            self.config.rows,
            self.config.cols,
            self.config.mines,
            &mut rand::rng(),
        );

        let inserted = self
            .store
            .bulk_insert_cells(round_id, &board.to_records(round_id))
            .await?;

        if inserted == 0 {
            // A concurrent generator won the race; its grid is the
            // authoritative one.
            tracing::warn!(round_id, "Lost board generation race, re-loading");
            let persisted = self.store.find_board_cells(round_id).await?;
            return Board::from_records(self.config.rows, self.config.cols, &persisted);
        }

        tracing::info!(
            round_id,
            mines = self.config.mines,
            "Generated and persisted board"
        );
        Ok(board)
    }
}
