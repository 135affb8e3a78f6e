pub mod board_service;
pub mod game_service;

pub use board_service::BoardService;
pub use game_service::{GameService, MoveReport, RevealOutcome};
