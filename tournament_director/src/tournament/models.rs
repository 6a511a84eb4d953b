//! Tournament data models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Tournament ID type
pub type TournamentId = i64;

/// Level duration used when none is given (20 minutes)
pub const DEFAULT_LEVEL_DURATION_MS: i64 = 1_200_000;

/// Small blind at level 1
pub const BASE_SMALL_BLIND: i64 = 25;

/// Tournament lifecycle. Moves forward only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TournamentStatus {
    /// Accepting registrations
    OpenRegistration,
    /// Tournament in progress
    Running,
    /// Winner declared
    Finished,
}

impl TournamentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TournamentStatus::OpenRegistration => "OPEN_REGISTRATION",
            TournamentStatus::Running => "RUNNING",
            TournamentStatus::Finished => "FINISHED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "OPEN_REGISTRATION" => Some(TournamentStatus::OpenRegistration),
            "RUNNING" => Some(TournamentStatus::Running),
            "FINISHED" => Some(TournamentStatus::Finished),
            _ => None,
        }
    }
}

/// Tournament aggregate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tournament {
    pub id: TournamentId,
    pub name: String,
    pub status: TournamentStatus,
    /// Starts at 1, never decreases
    pub current_level: u32,
    pub level_duration_ms: i64,
    pub created_at: DateTime<Utc>,
}

/// Blind pair for one level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlindLevel {
    /// Level number (1-indexed)
    pub level: u32,
    pub small_blind: i64,
    pub big_blind: i64,
    /// Duration of this level in milliseconds
    pub duration_ms: i64,
}

impl BlindLevel {
    /// Blinds double every level: small = 25 * 2^(level - 1), big = 2 * small.
    ///
    /// Level 0 is treated as level 1. Amounts saturate instead of overflowing.
    pub fn for_level(level: u32, duration_ms: i64) -> Self {
        let level = level.max(1);
        let small_blind = 2i64
            .checked_pow(level - 1)
            .and_then(|factor| factor.checked_mul(BASE_SMALL_BLIND))
            .unwrap_or(i64::MAX / 2);

        Self {
            level,
            small_blind,
            big_blind: small_blind.saturating_mul(2),
            duration_ms,
        }
    }
}
