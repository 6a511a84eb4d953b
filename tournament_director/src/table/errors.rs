use crate::cache::CacheError;
use crate::db::StoreError;
use crate::error::ErrorKind;
use thiserror::Error;

/// Table allocation errors
#[derive(Debug, Error)]
pub enum TableError {
    #[error("Player not found: {0}")]
    PlayerNotFound(i64),

    #[error("Player {player_id} does not belong to tournament {tournament_id}")]
    InvalidTournament { player_id: i64, tournament_id: i64 },

    #[error("Player {0} is eliminated and cannot be seated")]
    PlayerEliminated(i64),

    #[error("Invalid table count: {0}")]
    InvalidCount(usize),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl TableError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TableError::PlayerNotFound(_) => ErrorKind::NotFound,
            TableError::InvalidTournament { .. }
            | TableError::PlayerEliminated(_)
            | TableError::InvalidCount(_) => ErrorKind::InvalidState,
            TableError::Cache(_) | TableError::Store(_) => ErrorKind::Transient,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            TableError::PlayerNotFound(_) => "NOT_FOUND",
            TableError::InvalidTournament { .. } => "INVALID_TOURNAMENT",
            TableError::PlayerEliminated(_) => "PLAYER_ELIMINATED",
            TableError::InvalidCount(_) => "INVALID_COUNT",
            TableError::Cache(e) => e.code(),
            TableError::Store(_) => "UNAVAILABLE",
        }
    }

    /// Message safe to show to callers
    pub fn client_message(&self) -> String {
        match self.kind() {
            ErrorKind::Transient => "Table service temporarily unavailable".to_string(),
            _ => self.to_string(),
        }
    }
}

pub type TableResult<T> = Result<T, TableError>;
