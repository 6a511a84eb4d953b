//! Player data models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Player ID type
pub type PlayerId = i64;

/// Player lifecycle. ELIMINATED is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlayerStatus {
    Registered,
    Seated,
    Eliminated,
}

impl PlayerStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PlayerStatus::Registered => "REGISTERED",
            PlayerStatus::Seated => "SEATED",
            PlayerStatus::Eliminated => "ELIMINATED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "REGISTERED" => Some(PlayerStatus::Registered),
            "SEATED" => Some(PlayerStatus::Seated),
            "ELIMINATED" => Some(PlayerStatus::Eliminated),
            _ => None,
        }
    }

    /// Still in the tournament
    pub fn is_active(self) -> bool {
        self != PlayerStatus::Eliminated
    }
}

/// Player as tracked by the registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: PlayerId,
    pub tournament_id: i64,
    pub username: String,
    pub status: PlayerStatus,
    /// Present iff SEATED
    pub table_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl Player {
    /// Mark eliminated and drop the seat
    pub fn eliminate(&mut self) {
        self.status = PlayerStatus::Eliminated;
        self.table_id = None;
    }
}

/// Result of processing one elimination
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EliminationOutcome {
    /// The player was already out. `winner` is set only when this call
    /// completed a winner declaration an earlier attempt left pending.
    AlreadyEliminated { winner: Option<Player> },
    /// The player is now out
    Eliminated {
        remaining: i64,
        /// Set when exactly one player is left
        winner: Option<Player>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eliminate_clears_table() {
        let mut player = Player {
            id: 1,
            tournament_id: 1,
            username: "a".to_string(),
            status: PlayerStatus::Seated,
            table_id: Some(3),
            created_at: Utc::now(),
        };
        player.eliminate();
        assert_eq!(player.status, PlayerStatus::Eliminated);
        assert_eq!(player.table_id, None);
        assert!(!player.status.is_active());
    }

    #[test]
    fn test_status_wire_names() {
        assert_eq!(
            serde_json::to_string(&PlayerStatus::Eliminated).unwrap(),
            "\"ELIMINATED\""
        );
        assert_eq!(PlayerStatus::parse("SEATED"), Some(PlayerStatus::Seated));
    }
}
