/// Application constants

// Board geometry
pub const DEFAULT_NUM_ROWS: usize = 8;
pub const DEFAULT_NUM_COLS: usize = 8;
pub const DEFAULT_NUM_MINES: usize = 20;

// Column labels run A.. in the move protocol, so the grid can never be
// wider than the alphabet.
pub const MAX_COLS: usize = 26;
pub const COL_LABEL_BASE: u8 = b'A';

// Move input protocol ("<COL>:<ROW>")
pub const MEMO_SEPARATOR: char = ':';
pub const MEMO_PART_MAX_LEN: usize = 4;

// Ledger log-line markers
pub const MEMO_LOG_MARKER: &str = "Program log: Memo";
pub const SIGNER_LOG_MARKER: &str = "Program log: Signed by ";

// Store write bounds
pub const DEFAULT_STORE_WRITE_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_STORE_WRITE_RETRIES: u32 = 2;
