use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

use crate::error::{GameError, Result};
use crate::models::{BoardCell, MoveLog, Round, RoundStatus};
use crate::store::BoardStore;

#[derive(Default)]
struct MemoryState {
    rounds: BTreeMap<i64, Round>,
    cells: HashMap<(i64, usize, usize), BoardCell>,
    moves: Vec<MoveLog>,
}

/// In-memory store used by the simulator binary and tests. Mirrors the
/// duplicate-skipping insert semantics the durable store is expected to
/// provide.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of persisted move logs, for assertions.
    pub async fn move_log_count(&self) -> usize {
        self.state.read().await.moves.len()
    }

    /// Persisted revealed coordinates of a round, sorted, for assertions.
    pub async fn revealed_cells(&self, round_id: i64) -> Vec<(usize, usize)> {
        let state = self.state.read().await;
        let mut coords: Vec<(usize, usize)> = state
            .cells
            .values()
            .filter(|cell| cell.round_id == round_id && cell.revealed)
            .map(|cell| (cell.row, cell.col))
            .collect();
        coords.sort_unstable();
        coords
    }
}

#[async_trait]
impl BoardStore for MemoryStore {
    async fn create_round(&self) -> Result<i64> {
        let mut state = self.state.write().await;
        let id = state.rounds.keys().next_back().copied().unwrap_or(0) + 1;
        state.rounds.insert(
            id,
            Round {
                id,
                status: RoundStatus::Playing,
                created_at: Utc::now(),
            },
        );
        Ok(id)
    }

    async fn max_round_id(&self) -> Result<Option<i64>> {
        let state = self.state.read().await;
        Ok(state.rounds.keys().next_back().copied())
    }

    async fn round_status(&self, round_id: i64) -> Result<Option<RoundStatus>> {
        let state = self.state.read().await;
        Ok(state.rounds.get(&round_id).map(|round| round.status))
    }

    async fn update_round_status(&self, round_id: i64, status: RoundStatus) -> Result<()> {
        let mut state = self.state.write().await;
        let round = state
            .rounds
            .get_mut(&round_id)
            .ok_or(GameError::RoundNotFound(round_id))?;
        round.status = status;
        Ok(())
    }

    async fn find_board_cells(&self, round_id: i64) -> Result<Vec<BoardCell>> {
        let state = self.state.read().await;
        let mut cells: Vec<BoardCell> = state
            .cells
            .values()
            .filter(|cell| cell.round_id == round_id)
            .cloned()
            .collect();
        cells.sort_unstable_by_key(|cell| (cell.row, cell.col));
        Ok(cells)
    }

    async fn bulk_insert_cells(&self, round_id: i64, cells: &[BoardCell]) -> Result<u64> {
        let mut state = self.state.write().await;
        let mut inserted = 0;
        for cell in cells {
            let key = (round_id, cell.row, cell.col);
            if state.cells.contains_key(&key) {
                continue;
            }
            let mut cell = cell.clone();
            cell.round_id = round_id;
            state.cells.insert(key, cell);
            inserted += 1;
        }
        Ok(inserted)
    }

    async fn mark_cells_revealed(&self, round_id: i64, coords: &[(usize, usize)]) -> Result<()> {
        let mut state = self.state.write().await;
        for &(row, col) in coords {
            let cell = state
                .cells
                .get_mut(&(round_id, row, col))
                .ok_or_else(|| {
                    GameError::Store(format!(
                        "No persisted cell at ({row}, {col}) for round {round_id}"
                    ))
                })?;
            cell.revealed = true;
        }
        Ok(())
    }

    async fn insert_move_log(&self, log: &MoveLog) -> Result<()> {
        let mut state = self.state.write().await;
        state.moves.push(log.clone());
        Ok(())
    }
}
