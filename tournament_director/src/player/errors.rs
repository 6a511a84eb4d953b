use crate::cache::CacheError;
use crate::db::StoreError;
use crate::error::ErrorKind;
use crate::events::BusError;
use thiserror::Error;

/// Player registry errors
#[derive(Debug, Error)]
pub enum PlayerError {
    #[error("Player not found: {0}")]
    NotFound(i64),

    #[error("Player {player_id} does not belong to tournament {tournament_id}")]
    InvalidTournament { player_id: i64, tournament_id: i64 },

    #[error("Invalid username")]
    InvalidUsername,

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Event bus error: {0}")]
    Bus(#[from] BusError),
}

impl PlayerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PlayerError::NotFound(_) => ErrorKind::NotFound,
            PlayerError::InvalidTournament { .. } | PlayerError::InvalidUsername => {
                ErrorKind::InvalidState
            }
            PlayerError::Cache(_) | PlayerError::Store(_) | PlayerError::Bus(_) => {
                ErrorKind::Transient
            }
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            PlayerError::NotFound(_) => "NOT_FOUND",
            PlayerError::InvalidTournament { .. } => "INVALID_TOURNAMENT",
            PlayerError::InvalidUsername => "INVALID_USERNAME",
            PlayerError::Cache(e) => e.code(),
            PlayerError::Store(_) | PlayerError::Bus(_) => "UNAVAILABLE",
        }
    }

    /// Message safe to show to callers
    pub fn client_message(&self) -> String {
        match self.kind() {
            ErrorKind::Transient => "Player service temporarily unavailable".to_string(),
            _ => self.to_string(),
        }
    }
}

pub type PlayerResult<T> = Result<T, PlayerError>;
