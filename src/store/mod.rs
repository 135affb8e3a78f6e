pub mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{BoardCell, MoveLog, RoundStatus};

/// Durable persistence collaborator. Cells are keyed uniquely by
/// (round_id, row, col); the store is the source of truth across process
/// restarts, the in-memory board is just the working copy.
#[async_trait]
pub trait BoardStore: Send + Sync {
    /// Open a new round in PLAYING state and return its id. The largest
    /// round id is always the current round.
    async fn create_round(&self) -> Result<i64>;

    async fn max_round_id(&self) -> Result<Option<i64>>;

    async fn round_status(&self, round_id: i64) -> Result<Option<RoundStatus>>;

    async fn update_round_status(&self, round_id: i64, status: RoundStatus) -> Result<()>;

    async fn find_board_cells(&self, round_id: i64) -> Result<Vec<BoardCell>>;

    /// Insert the full grid in one batch, skipping rows whose key already
    /// exists. Returns the number of rows actually inserted, so a caller
    /// that lost a generation race can tell and re-load.
    async fn bulk_insert_cells(&self, round_id: i64, cells: &[BoardCell]) -> Result<u64>;

    /// Flip `revealed` to true for every listed coordinate in one batch.
    async fn mark_cells_revealed(&self, round_id: i64, coords: &[(usize, usize)]) -> Result<()>;

    async fn insert_move_log(&self, log: &MoveLog) -> Result<()>;
}
