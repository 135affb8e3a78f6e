use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoundStatus {
    Playing,
    Lost,
    Won,
}

impl RoundStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Playing => "PLAYING",
            Self::Lost => "LOST",
            Self::Won => "WON",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "PLAYING" => Some(Self::Playing),
            "LOST" => Some(Self::Lost),
            "WON" => Some(Self::Won),
            _ => None,
        }
    }

    /// LOST and WON are terminal; a round never leaves them.
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Playing)
    }
}

/// One play-through: a board generation plus its status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Round {
    pub id: i64,
    pub status: RoundStatus,
    pub created_at: DateTime<Utc>,
}

/// Audit row for one accepted move, keyed by the submitting transaction.
/// `is_win` records whether the targeted cell was safe at submission time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveLog {
    pub tx_hash: String,
    pub owner: String,
    pub memo: String,
    pub round_id: i64,
    pub is_win: bool,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_strings() {
        for status in [RoundStatus::Playing, RoundStatus::Lost, RoundStatus::Won] {
            assert_eq!(RoundStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(RoundStatus::parse("playing"), None);
    }

    #[test]
    fn only_playing_is_non_terminal() {
        assert!(!RoundStatus::Playing.is_terminal());
        assert!(RoundStatus::Lost.is_terminal());
        assert!(RoundStatus::Won.is_terminal());
    }
}
