use chrono::Utc;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::timeout;

use crate::config::GameConfig;
use crate::error::{GameError, Result};
use crate::models::{Board, MoveLog, RoundStatus};
use crate::parser::{MoveEvent, MoveParser};
use crate::render::BoardView;
use crate::services::BoardService;
use crate::store::BoardStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RevealOutcome {
    /// Coordinate off the grid; nothing changed. Cascade probes and junk
    /// row numbers land here.
    OutOfBounds,
    /// Target already open; nothing changed.
    AlreadyRevealed,
    /// Target was a mine. Exactly one cell opened, round lost.
    HitMine,
    Revealed { opened: usize },
    /// This reveal opened the last safe cell.
    Won { opened: usize },
}

/// Result of one accepted move from the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MoveReport {
    pub round_id: i64,
    pub row: i64,
    pub col: i64,
    pub is_win: bool,
    pub outcome: RevealOutcome,
}

type BoardHandle = Arc<Mutex<Option<Board>>>;

/// Reveal Engine. Boards are round-scoped handles, each behind its own
/// mutex so concurrent deliveries for one round serialize instead of
/// interleaving on shared cells.
pub struct GameService {
    store: Arc<dyn BoardStore>,
    boards: BoardService,
    parser: MoveParser,
    config: GameConfig,
    rounds: Mutex<HashMap<i64, BoardHandle>>,
}

impl GameService {
    pub fn new(store: Arc<dyn BoardStore>, config: GameConfig) -> Self {
        Self {
            boards: BoardService::new(store.clone(), config.clone()),
            store,
            parser: MoveParser::new(),
            config,
            rounds: Mutex::new(HashMap::new()),
        }
    }

    /// The round moves currently apply to: the one with the largest id.
    pub async fn current_round(&self) -> Result<i64> {
        self.store
            .max_round_id()
            .await?
            .ok_or(GameError::NoActiveRound)
    }

    /// Open a fresh round and generate + persist its board. The new round
    /// supersedes the previous one as current.
    pub async fn reset_round(&self) -> Result<i64> {
        let round_id = self.store.create_round().await?;
        let handle = {
            let mut rounds = self.rounds.lock().await;
            // Superseded rounds drop their cached boards here, so the handle
            // map stays bounded; a later reveal on an old round reloads its
            // board from the store.
            rounds.retain(|id, _| *id == round_id);
            rounds.entry(round_id).or_default().clone()
        };
        let mut guard = handle.lock().await;
        *guard = Some(self.boards.load_or_generate(round_id).await?);
        tracing::info!(round_id, "Round reset");
        Ok(round_id)
    }

    /// Reveal one cell and cascade across zero-count neighbors. The whole
    /// newly revealed set is persisted in a single bounded batch write;
    /// a write that still fails after the retry budget surfaces as
    /// `RevealNotPersisted` while the in-memory reveals stay applied.
    pub async fn reveal(&self, round_id: i64, row: i64, col: i64) -> Result<RevealOutcome> {
        self.store
            .round_status(round_id)
            .await?
            .ok_or(GameError::RoundNotFound(round_id))?;

        let handle = self.handle(round_id).await;
        let mut guard = handle.lock().await;
        if guard.is_none() {
            *guard = Some(self.boards.load_or_generate(round_id).await?);
        }
        let board = guard
            .as_mut()
            .ok_or_else(|| GameError::Internal("Board handle empty after load".into()))?;

        let cascade = board.reveal_cascade(row, col);
        if cascade.is_noop() {
            return Ok(if board.in_bounds(row, col) {
                RevealOutcome::AlreadyRevealed
            } else {
                RevealOutcome::OutOfBounds
            });
        }

        let opened = cascade.opened.len();
        let persisted = self.persist_revealed(round_id, &cascade.opened).await;

        // The terminal transition happens before the cell-write result is
        // inspected: a failed batch write must not leave a finished round
        // PLAYING in the store.
        if cascade.hit_mine {
            self.finish_round(round_id, RoundStatus::Lost).await?;
        } else if board.is_cleared() {
            self.finish_round(round_id, RoundStatus::Won).await?;
        }

        persisted.map_err(|source| GameError::RevealNotPersisted {
            round_id,
            pending: opened,
            source: Box::new(source),
        })?;

        if cascade.hit_mine {
            tracing::warn!(round_id, row, col, "Mine revealed, round lost");
            return Ok(RevealOutcome::HitMine);
        }

        tracing::debug!(round_id, row, col, opened, "Revealed cells");

        if board.is_cleared() {
            tracing::info!(round_id, "All safe cells revealed, round won");
            return Ok(RevealOutcome::Won { opened });
        }

        Ok(RevealOutcome::Revealed { opened })
    }

    /// Webhook-handler flow minus the HTTP: decode the memo, record the
    /// move, then reveal. `is_win` is judged on the targeted cell before
    /// any mutation, matching what the submitter is paid on.
    pub async fn apply_move(&self, event: &MoveEvent) -> Result<MoveReport> {
        let coord = self.parser.parse_move(&event.memo)?;
        let round_id = self.current_round().await?;
        let is_win = self.is_safe_cell(round_id, coord.row, coord.col).await?;

        self.store
            .insert_move_log(&MoveLog {
                tx_hash: event.tx_hash.clone(),
                owner: event.owner.clone(),
                memo: event.memo.clone(),
                round_id,
                is_win,
                created_at: Utc::now(),
            })
            .await?;

        let outcome = self.reveal(round_id, coord.row, coord.col).await?;
        tracing::info!(
            round_id,
            row = coord.row,
            col = coord.col,
            is_win,
            ?outcome,
            tx = %event.tx_hash,
            "Move applied"
        );

        Ok(MoveReport {
            round_id,
            row: coord.row,
            col: coord.col,
            is_win,
            outcome,
        })
    }

    /// Read projection of a round's board for rendering.
    pub async fn board_view(&self, round_id: i64) -> Result<BoardView> {
        let status = self
            .store
            .round_status(round_id)
            .await?
            .ok_or(GameError::RoundNotFound(round_id))?;

        let handle = self.ensure_board(round_id).await?;
        let guard = handle.lock().await;
        let board = guard
            .as_ref()
            .ok_or_else(|| GameError::Internal("Board handle empty after load".into()))?;
        Ok(BoardView::project(round_id, status, board))
    }

    async fn is_safe_cell(&self, round_id: i64, row: i64, col: i64) -> Result<bool> {
        let handle = self.ensure_board(round_id).await?;
        let guard = handle.lock().await;
        let board = guard
            .as_ref()
            .ok_or_else(|| GameError::Internal("Board handle empty after load".into()))?;
        Ok(board.in_bounds(row, col) && !board.cell(row as usize, col as usize).is_mine)
    }

    async fn handle(&self, round_id: i64) -> BoardHandle {
        let mut rounds = self.rounds.lock().await;
        rounds.entry(round_id).or_default().clone()
    }

    async fn ensure_board(&self, round_id: i64) -> Result<BoardHandle> {
        if self.store.round_status(round_id).await?.is_none() {
            return Err(GameError::RoundNotFound(round_id));
        }
        let handle = self.handle(round_id).await;
        {
            let mut guard = handle.lock().await;
            if guard.is_none() {
                *guard = Some(self.boards.load_or_generate(round_id).await?);
            }
        }
        Ok(handle)
    }

    /// Terminal statuses are sticky: a lost round never becomes won and
    /// vice versa. The status is re-read at transition time, under the
    /// caller's board lock, never judged from a snapshot taken before the
    /// lock was acquired.
    async fn finish_round(&self, round_id: i64, next: RoundStatus) -> Result<()> {
        let current = self
            .store
            .round_status(round_id)
            .await?
            .ok_or(GameError::RoundNotFound(round_id))?;
        if current.is_terminal() {
            return Ok(());
        }
        self.store.update_round_status(round_id, next).await
    }

    #[cfg(test)]
    async fn cached_rounds(&self) -> Vec<i64> {
        let rounds = self.rounds.lock().await;
        let mut ids: Vec<i64> = rounds.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    async fn persist_revealed(&self, round_id: i64, coords: &[(usize, usize)]) -> Result<()> {
        let timeout_ms = self.config.store_write_timeout_ms;
        let attempts = self.config.store_write_retries + 1;
        let mut last_err = GameError::StoreTimeout {
            attempts,
            timeout_ms,
        };

        for attempt in 1..=attempts {
            let write = self.store.mark_cells_revealed(round_id, coords);
            match timeout(Duration::from_millis(timeout_ms), write).await {
                Ok(Ok(())) => return Ok(()),
                Ok(Err(err)) => {
                    tracing::warn!(round_id, attempt, %err, "Store write failed");
                    last_err = err;
                }
                Err(_) => {
                    tracing::warn!(round_id, attempt, timeout_ms, "Store write timed out");
                    last_err = GameError::StoreTimeout {
                        attempts,
                        timeout_ms,
                    };
                }
            }
        }

        Err(last_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};

    async fn service_with_mines(mines: &[(usize, usize)]) -> (Arc<MemoryStore>, GameService, i64) {
        let store = Arc::new(MemoryStore::new());
        let round_id = store.create_round().await.unwrap();
        let board = Board::with_mines(8, 8, mines);
        store
            .bulk_insert_cells(round_id, &board.to_records(round_id))
            .await
            .unwrap();
        let service = GameService::new(store.clone(), GameConfig::default());
        (store, service, round_id)
    }

    #[tokio::test]
    async fn revealing_a_mine_loses_the_round_without_cascading() {
        let (store, service, round_id) = service_with_mines(&[(3, 3)]).await;

        let outcome = service.reveal(round_id, 3, 3).await.unwrap();
        assert_eq!(outcome, RevealOutcome::HitMine);
        assert_eq!(store.revealed_cells(round_id).await, vec![(3, 3)]);
        assert_eq!(
            store.round_status(round_id).await.unwrap(),
            Some(RoundStatus::Lost)
        );
    }

    #[tokio::test]
    async fn corner_mine_cascade_wins_in_one_reveal() {
        let (store, service, round_id) = service_with_mines(&[(0, 0)]).await;

        let outcome = service.reveal(round_id, 7, 7).await.unwrap();
        assert_eq!(outcome, RevealOutcome::Won { opened: 63 });
        assert_eq!(store.revealed_cells(round_id).await.len(), 63);
        assert_eq!(
            store.round_status(round_id).await.unwrap(),
            Some(RoundStatus::Won)
        );
    }

    #[tokio::test]
    async fn noop_reveals_touch_neither_memory_nor_store() {
        let (store, service, round_id) = service_with_mines(&[(0, 0), (0, 2)]).await;

        assert_eq!(
            service.reveal(round_id, -1, 0).await.unwrap(),
            RevealOutcome::OutOfBounds
        );
        assert_eq!(
            service.reveal(round_id, 0, 8).await.unwrap(),
            RevealOutcome::OutOfBounds
        );
        assert!(store.revealed_cells(round_id).await.is_empty());

        service.reveal(round_id, 0, 1).await.unwrap();
        let persisted = store.revealed_cells(round_id).await;
        assert_eq!(
            service.reveal(round_id, 0, 1).await.unwrap(),
            RevealOutcome::AlreadyRevealed
        );
        assert_eq!(store.revealed_cells(round_id).await, persisted);
    }

    #[tokio::test]
    async fn play_continues_after_a_loss_but_status_stays_lost() {
        let (store, service, round_id) = service_with_mines(&[(0, 0)]).await;

        assert_eq!(
            service.reveal(round_id, 0, 0).await.unwrap(),
            RevealOutcome::HitMine
        );
        // Clearing the rest would normally win; the terminal status sticks.
        let outcome = service.reveal(round_id, 7, 7).await.unwrap();
        assert_eq!(outcome, RevealOutcome::Won { opened: 63 });
        assert_eq!(
            store.round_status(round_id).await.unwrap(),
            Some(RoundStatus::Lost)
        );
    }

    #[tokio::test]
    async fn concurrent_reveals_serialize_and_stay_consistent() {
        let (store, service, round_id) = service_with_mines(&[(0, 0), (0, 2), (2, 0)]).await;
        let service = Arc::new(service);

        let a = {
            let service = service.clone();
            tokio::spawn(async move { service.reveal(round_id, 7, 7).await })
        };
        let b = {
            let service = service.clone();
            tokio::spawn(async move { service.reveal(round_id, 1, 1).await })
        };
        a.await.unwrap().unwrap();
        b.await.unwrap().unwrap();

        // Whatever the interleaving, the persisted projection must match
        // the in-memory board exactly.
        let view = service.board_view(round_id).await.unwrap();
        let persisted = store.revealed_cells(round_id).await;
        assert_eq!(view.revealed_count(), persisted.len());
    }

    #[tokio::test]
    async fn unknown_round_is_an_error() {
        let store = Arc::new(MemoryStore::new());
        let service = GameService::new(store, GameConfig::default());
        assert!(matches!(
            service.current_round().await,
            Err(GameError::NoActiveRound)
        ));
        assert!(matches!(
            service.reveal(42, 0, 0).await,
            Err(GameError::RoundNotFound(42))
        ));
    }

    #[tokio::test]
    async fn reset_round_supersedes_the_previous_one() {
        let store = Arc::new(MemoryStore::new());
        let service = GameService::new(store.clone(), GameConfig::default());

        let first = service.reset_round().await.unwrap();
        let second = service.reset_round().await.unwrap();
        assert!(second > first);
        assert_eq!(service.current_round().await.unwrap(), second);
        assert_eq!(store.find_board_cells(second).await.unwrap().len(), 64);
    }

    #[tokio::test]
    async fn reset_round_evicts_superseded_board_handles() {
        let store = Arc::new(MemoryStore::new());
        let service = GameService::new(store.clone(), GameConfig::default());

        let first = service.reset_round().await.unwrap();
        service.reveal(first, 0, 0).await.unwrap();
        let second = service.reset_round().await.unwrap();
        assert_eq!(service.cached_rounds().await, vec![second]);

        // The old round is still playable; its board comes back from the
        // store on demand.
        service.reveal(first, 1, 1).await.unwrap();
        assert_eq!(service.cached_rounds().await, vec![first, second]);
    }

    #[tokio::test]
    async fn apply_move_logs_and_reveals() {
        let (store, service, round_id) = service_with_mines(&[(0, 0)]).await;

        let event = MoveEvent {
            tx_hash: "5Sig111".into(),
            owner: "Player111".into(),
            memo: "H:7".into(),
            signer: Some("Player111".into()),
        };
        let report = service.apply_move(&event).await.unwrap();
        assert_eq!(report.round_id, round_id);
        assert!(report.is_win);
        assert_eq!(report.outcome, RevealOutcome::Won { opened: 63 });
        assert_eq!(store.move_log_count().await, 1);
    }

    #[tokio::test]
    async fn apply_move_on_a_mine_is_logged_as_not_winning() {
        let (store, service, _) = service_with_mines(&[(0, 0)]).await;

        let event = MoveEvent {
            tx_hash: "5Sig222".into(),
            owner: "Player111".into(),
            memo: "A:0".into(),
            signer: None,
        };
        let report = service.apply_move(&event).await.unwrap();
        assert!(!report.is_win);
        assert_eq!(report.outcome, RevealOutcome::HitMine);
        assert_eq!(store.move_log_count().await, 1);
    }

    #[tokio::test]
    async fn malformed_memo_never_reaches_the_engine() {
        let (store, service, round_id) = service_with_mines(&[(0, 0)]).await;
        let event = MoveEvent {
            tx_hash: "5Sig333".into(),
            owner: "Player111".into(),
            memo: "A-1".into(),
            signer: None,
        };
        assert!(matches!(
            service.apply_move(&event).await,
            Err(GameError::InvalidMove(_))
        ));
        assert_eq!(store.move_log_count().await, 0);
        assert!(store.revealed_cells(round_id).await.is_empty());
    }

    struct FlakyStore {
        inner: MemoryStore,
        fail_reveals: AtomicBool,
    }

    #[async_trait]
    impl BoardStore for FlakyStore {
        async fn create_round(&self) -> Result<i64> {
            self.inner.create_round().await
        }
        async fn max_round_id(&self) -> Result<Option<i64>> {
            self.inner.max_round_id().await
        }
        async fn round_status(&self, round_id: i64) -> Result<Option<RoundStatus>> {
            self.inner.round_status(round_id).await
        }
        async fn update_round_status(&self, round_id: i64, status: RoundStatus) -> Result<()> {
            self.inner.update_round_status(round_id, status).await
        }
        async fn find_board_cells(&self, round_id: i64) -> Result<Vec<crate::models::BoardCell>> {
            self.inner.find_board_cells(round_id).await
        }
        async fn bulk_insert_cells(
            &self,
            round_id: i64,
            cells: &[crate::models::BoardCell],
        ) -> Result<u64> {
            self.inner.bulk_insert_cells(round_id, cells).await
        }
        async fn mark_cells_revealed(
            &self,
            round_id: i64,
            coords: &[(usize, usize)],
        ) -> Result<()> {
            if self.fail_reveals.load(Ordering::SeqCst) {
                return Err(GameError::Store("injected write failure".into()));
            }
            self.inner.mark_cells_revealed(round_id, coords).await
        }
        async fn insert_move_log(&self, log: &MoveLog) -> Result<()> {
            self.inner.insert_move_log(log).await
        }
    }

    #[tokio::test]
    async fn failed_batch_write_surfaces_as_partial_reveal() {
        let store = Arc::new(FlakyStore {
            inner: MemoryStore::new(),
            fail_reveals: AtomicBool::new(false),
        });
        let round_id = store.create_round().await.unwrap();
        let board = Board::with_mines(8, 8, &[(0, 0)]);
        store
            .bulk_insert_cells(round_id, &board.to_records(round_id))
            .await
            .unwrap();

        let config = GameConfig {
            store_write_retries: 1,
            ..GameConfig::default()
        };
        let service = GameService::new(store.clone(), config);

        store.fail_reveals.store(true, Ordering::SeqCst);
        let err = service.reveal(round_id, 7, 7).await.unwrap_err();
        assert!(matches!(
            err,
            GameError::RevealNotPersisted {
                round_id: r,
                pending: 63,
                ..
            } if r == round_id
        ));

        // The in-memory reveal stays applied: retrying the same cell is a
        // no-op rather than a second cascade.
        store.fail_reveals.store(false, Ordering::SeqCst);
        assert_eq!(
            service.reveal(round_id, 7, 7).await.unwrap(),
            RevealOutcome::AlreadyRevealed
        );
    }

    #[tokio::test]
    async fn failed_mine_write_still_marks_the_round_lost() {
        let store = Arc::new(FlakyStore {
            inner: MemoryStore::new(),
            fail_reveals: AtomicBool::new(true),
        });
        let round_id = store.create_round().await.unwrap();
        let board = Board::with_mines(8, 8, &[(0, 0)]);
        store
            .bulk_insert_cells(round_id, &board.to_records(round_id))
            .await
            .unwrap();

        let config = GameConfig {
            store_write_retries: 0,
            ..GameConfig::default()
        };
        let service = GameService::new(store.clone(), config);

        // The cell write fails, but the LOST transition must land anyway:
        // the in-memory mine stays revealed, so this reveal can never be
        // replayed to set the status later.
        let err = service.reveal(round_id, 0, 0).await.unwrap_err();
        assert!(matches!(
            err,
            GameError::RevealNotPersisted { pending: 1, .. }
        ));
        assert_eq!(
            store.round_status(round_id).await.unwrap(),
            Some(RoundStatus::Lost)
        );
    }

    /// Store wrapper that lands a concurrent LOST while a batch cell write
    /// is in flight.
    struct LostMidWriteStore {
        inner: MemoryStore,
        lose_once: AtomicBool,
    }

    #[async_trait]
    impl BoardStore for LostMidWriteStore {
        async fn create_round(&self) -> Result<i64> {
            self.inner.create_round().await
        }
        async fn max_round_id(&self) -> Result<Option<i64>> {
            self.inner.max_round_id().await
        }
        async fn round_status(&self, round_id: i64) -> Result<Option<RoundStatus>> {
            self.inner.round_status(round_id).await
        }
        async fn update_round_status(&self, round_id: i64, status: RoundStatus) -> Result<()> {
            self.inner.update_round_status(round_id, status).await
        }
        async fn find_board_cells(&self, round_id: i64) -> Result<Vec<crate::models::BoardCell>> {
            self.inner.find_board_cells(round_id).await
        }
        async fn bulk_insert_cells(
            &self,
            round_id: i64,
            cells: &[crate::models::BoardCell],
        ) -> Result<u64> {
            self.inner.bulk_insert_cells(round_id, cells).await
        }
        async fn mark_cells_revealed(
            &self,
            round_id: i64,
            coords: &[(usize, usize)],
        ) -> Result<()> {
            if self.lose_once.swap(false, Ordering::SeqCst) {
                self.inner
                    .update_round_status(round_id, RoundStatus::Lost)
                    .await?;
            }
            self.inner.mark_cells_revealed(round_id, coords).await
        }
        async fn insert_move_log(&self, log: &MoveLog) -> Result<()> {
            self.inner.insert_move_log(log).await
        }
    }

    #[tokio::test]
    async fn terminal_status_landed_mid_reveal_is_never_overwritten() {
        let store = Arc::new(LostMidWriteStore {
            inner: MemoryStore::new(),
            lose_once: AtomicBool::new(true),
        });
        let round_id = store.create_round().await.unwrap();
        let board = Board::with_mines(8, 8, &[(0, 0)]);
        store
            .bulk_insert_cells(round_id, &board.to_records(round_id))
            .await
            .unwrap();
        let service = GameService::new(store.clone(), GameConfig::default());

        // A mine reveal marks the round LOST while this winning reveal's
        // batch write is still in flight. The WON transition must yield.
        let outcome = service.reveal(round_id, 7, 7).await.unwrap();
        assert_eq!(outcome, RevealOutcome::Won { opened: 63 });
        assert_eq!(
            store.round_status(round_id).await.unwrap(),
            Some(RoundStatus::Lost)
        );
    }

    struct StalledStore {
        inner: MemoryStore,
    }

    #[async_trait]
    impl BoardStore for StalledStore {
        async fn create_round(&self) -> Result<i64> {
            self.inner.create_round().await
        }
        async fn max_round_id(&self) -> Result<Option<i64>> {
            self.inner.max_round_id().await
        }
        async fn round_status(&self, round_id: i64) -> Result<Option<RoundStatus>> {
            self.inner.round_status(round_id).await
        }
        async fn update_round_status(&self, round_id: i64, status: RoundStatus) -> Result<()> {
            self.inner.update_round_status(round_id, status).await
        }
        async fn find_board_cells(&self, round_id: i64) -> Result<Vec<crate::models::BoardCell>> {
            self.inner.find_board_cells(round_id).await
        }
        async fn bulk_insert_cells(
            &self,
            round_id: i64,
            cells: &[crate::models::BoardCell],
        ) -> Result<u64> {
            self.inner.bulk_insert_cells(round_id, cells).await
        }
        async fn mark_cells_revealed(&self, _: i64, _: &[(usize, usize)]) -> Result<()> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(())
        }
        async fn insert_move_log(&self, log: &MoveLog) -> Result<()> {
            self.inner.insert_move_log(log).await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_store_write_aborts_after_the_timeout_budget() {
        let store = Arc::new(StalledStore {
            inner: MemoryStore::new(),
        });
        let round_id = store.create_round().await.unwrap();
        let board = Board::with_mines(8, 8, &[(0, 0)]);
        store
            .bulk_insert_cells(round_id, &board.to_records(round_id))
            .await
            .unwrap();

        let config = GameConfig {
            store_write_timeout_ms: 50,
            store_write_retries: 1,
            ..GameConfig::default()
        };
        let service = GameService::new(store.clone(), config);

        let err = service.reveal(round_id, 7, 7).await.unwrap_err();
        let GameError::RevealNotPersisted { source, .. } = err else {
            panic!("expected RevealNotPersisted, got {err:?}");
        };
        assert!(matches!(
            *source,
            GameError::StoreTimeout {
                attempts: 2,
                timeout_ms: 50
            }
        ));
    }
}
