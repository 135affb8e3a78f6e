use thiserror::Error;

#[derive(Error, Debug)]
pub enum GameError {
    #[error("Invalid move: {0}")]
    InvalidMove(String),

    #[error("No memo instruction found in transaction logs")]
    MissingMemo,

    #[error("Malformed webhook payload: {0}")]
    BadPayload(String),

    #[error("No active round")]
    NoActiveRound,

    #[error("Round {0} not found")]
    RoundNotFound(i64),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Store write timed out after {attempts} attempts ({timeout_ms}ms each)")]
    StoreTimeout { attempts: u32, timeout_ms: u64 },

    #[error("Reveal applied in memory but {pending} cell(s) of round {round_id} were not persisted: {source}")]
    RevealNotPersisted {
        round_id: i64,
        pending: usize,
        #[source]
        source: Box<GameError>,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, GameError>;
