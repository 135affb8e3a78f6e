pub mod config;
pub mod constants;
pub mod error;
pub mod models;
pub mod parser;
pub mod render;
pub mod services;
pub mod store;

pub use config::GameConfig;
pub use error::{GameError, Result};
pub use models::{Board, BoardCell, CascadeResult, Cell, MoveLog, Round, RoundStatus};
pub use parser::{MoveCoord, MoveEvent, MoveParser};
pub use render::{BoardView, CellView};
pub use services::{BoardService, GameService, MoveReport, RevealOutcome};
pub use store::{BoardStore, MemoryStore};
