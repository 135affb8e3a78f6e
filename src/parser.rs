use serde_json::Value;

use crate::constants::{
    COL_LABEL_BASE, MEMO_LOG_MARKER, MEMO_PART_MAX_LEN, MEMO_SEPARATOR, SIGNER_LOG_MARKER,
};
use crate::error::{GameError, Result};

/// A move decoded from a memo string. Coordinates are signed on purpose:
/// values that parse but fall outside the grid are the reveal engine's
/// out-of-bounds no-op, not a parse error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveCoord {
    pub row: i64,
    pub col: i64,
}

/// One game-relevant transaction pulled out of a ledger webhook delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveEvent {
    pub tx_hash: String,
    pub owner: String,
    pub memo: String,
    /// Address from the memo program's "Signed by" log, when present.
    pub signer: Option<String>,
}

/// Move Parser - decodes memo strings and webhook payloads into moves
pub struct MoveParser;

impl MoveParser {
    pub fn new() -> Self {
        Self
    }

    /// Parse `"<COL_LETTER>:<ROW_NUMBER>"`, e.g. `"A:1"` -> row 1, col 0.
    pub fn parse_move(&self, memo: &str) -> Result<MoveCoord> {
        let parts: Vec<&str> = memo.split(MEMO_SEPARATOR).collect();
        if parts.len() != 2 {
            return Err(GameError::InvalidMove(format!(
                "Expected <COL>{MEMO_SEPARATOR}<ROW>, got {memo:?}"
            )));
        }
        let (col_part, row_part) = (parts[0], parts[1]);

        if col_part.is_empty() || row_part.is_empty() {
            return Err(GameError::InvalidMove(format!("Empty field in {memo:?}")));
        }
        if col_part.len() > MEMO_PART_MAX_LEN || row_part.len() > MEMO_PART_MAX_LEN {
            return Err(GameError::InvalidMove(format!("Field too long in {memo:?}")));
        }

        let col = column_index(col_part)
            .ok_or_else(|| GameError::InvalidMove(format!("Bad column label {col_part:?}")))?;
        let row: i64 = row_part
            .parse()
            .map_err(|_| GameError::InvalidMove(format!("Bad row number {row_part:?}")))?;

        Ok(MoveCoord { row, col })
    }

    /// Pull the quoted memo text out of the transaction log lines, e.g.
    /// `Program log: Memo (len 3): "A:1"` -> `A:1`.
    pub fn extract_memo(&self, logs: &[String]) -> Result<String> {
        let line = logs
            .iter()
            .find(|line| line.contains(MEMO_LOG_MARKER))
            .ok_or(GameError::MissingMemo)?;
        quoted_value(line)
            .map(str::to_owned)
            .ok_or_else(|| GameError::InvalidMove(format!("No quoted memo in {line:?}")))
    }

    /// Address from the memo program's `Signed by <address>` log line.
    pub fn extract_signer(&self, logs: &[String]) -> Option<String> {
        let line = logs.iter().find(|line| line.contains(SIGNER_LOG_MARKER))?;
        let rest = &line[line.find(SIGNER_LOG_MARKER)? + SIGNER_LOG_MARKER.len()..];
        let address = rest.split_whitespace().next()?;
        if address.is_empty() {
            None
        } else {
            Some(address.to_owned())
        }
    }

    /// Decode one webhook delivery (an array of transaction notifications;
    /// only the first entry carries the move) into a `MoveEvent`.
    pub fn parse_webhook(&self, payload: &Value) -> Result<MoveEvent> {
        let entry = payload
            .get(0)
            .ok_or_else(|| GameError::BadPayload("Empty notification array".into()))?;

        let tx_hash = entry
            .pointer("/transaction/signatures/0")
            .and_then(Value::as_str)
            .ok_or_else(|| GameError::BadPayload("Missing transaction signature".into()))?
            .to_owned();

        let owner = entry
            .pointer("/transaction/message/accountKeys/0")
            .and_then(Value::as_str)
            .ok_or_else(|| GameError::BadPayload("Missing fee payer account".into()))?
            .to_owned();

        let logs: Vec<String> = entry
            .pointer("/meta/logMessages")
            .and_then(Value::as_array)
            .ok_or_else(|| GameError::BadPayload("Missing log messages".into()))?
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_owned)
            .collect();

        let memo = self.extract_memo(&logs)?;
        let signer = self.extract_signer(&logs);

        Ok(MoveEvent {
            tx_hash,
            owner,
            memo,
            signer,
        })
    }
}

impl Default for MoveParser {
    fn default() -> Self {
        Self::new()
    }
}

fn column_index(part: &str) -> Option<i64> {
    let mut chars = part.chars();
    let letter = chars.next()?;
    if chars.next().is_some() || !letter.is_ascii_uppercase() {
        return None;
    }
    Some((letter as u8 - COL_LABEL_BASE) as i64)
}

fn quoted_value(line: &str) -> Option<&str> {
    let start = line.find(": \"")? + 3;
    let end = line[start..].find('"')?;
    if end == 0 {
        return None;
    }
    Some(&line[start..start + end])
}
