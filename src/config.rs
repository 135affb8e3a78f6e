use std::env;

use crate::constants::{
    DEFAULT_NUM_COLS, DEFAULT_NUM_MINES, DEFAULT_NUM_ROWS, DEFAULT_STORE_WRITE_RETRIES,
    DEFAULT_STORE_WRITE_TIMEOUT_MS, MAX_COLS,
};

#[derive(Debug, Clone)]
pub struct GameConfig {
    // Board
    pub rows: usize,
    pub cols: usize,
    pub mines: usize,

    // Store write bounds
    pub store_write_timeout_ms: u64,
    pub store_write_retries: u32,
}

impl GameConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        Ok(GameConfig {
            rows: env::var("BOARD_ROWS")
                .unwrap_or_else(|_| DEFAULT_NUM_ROWS.to_string())
                .parse()?,
            cols: env::var("BOARD_COLS")
                .unwrap_or_else(|_| DEFAULT_NUM_COLS.to_string())
                .parse()?,
            mines: env::var("BOARD_MINES")
                .unwrap_or_else(|_| DEFAULT_NUM_MINES.to_string())
                .parse()?,

            store_write_timeout_ms: env::var("STORE_WRITE_TIMEOUT_MS")
                .unwrap_or_else(|_| DEFAULT_STORE_WRITE_TIMEOUT_MS.to_string())
                .parse()?,
            store_write_retries: env::var("STORE_WRITE_RETRIES")
                .unwrap_or_else(|_| DEFAULT_STORE_WRITE_RETRIES.to_string())
                .parse()?,
        })
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.rows == 0 || self.cols == 0 {
            anyhow::bail!("Board must have at least one row and one column");
        }
        if self.cols > MAX_COLS {
            anyhow::bail!("Board width exceeds column label range (max {})", MAX_COLS);
        }
        if self.mines >= self.rows * self.cols {
            anyhow::bail!(
                "Mine count {} does not leave a safe cell on a {}x{} board",
                self.mines,
                self.rows,
                self.cols
            );
        }

        if self.mines == 0 {
            tracing::warn!("Board has no mines; every reveal cascades");
        }
        if self.mines * 2 > self.rows * self.cols {
            tracing::warn!("More than half the board is mined; rejection sampling will be slow");
        }
        if self.store_write_timeout_ms == 0 {
            tracing::warn!("STORE_WRITE_TIMEOUT_MS is 0; every store write will time out");
        }

        Ok(())
    }

    pub fn cell_count(&self) -> usize {
        self.rows * self.cols
    }
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            rows: DEFAULT_NUM_ROWS,
            cols: DEFAULT_NUM_COLS,
            mines: DEFAULT_NUM_MINES,
            store_write_timeout_ms: DEFAULT_STORE_WRITE_TIMEOUT_MS,
            store_write_retries: DEFAULT_STORE_WRITE_RETRIES,
        }
    }
}
