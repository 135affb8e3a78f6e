pub mod board;
pub mod round;

// Re-export commonly used types so other modules can use `crate::models::X`
pub use board::{Board, BoardCell, CascadeResult, Cell};
pub use round::{MoveLog, Round, RoundStatus};
