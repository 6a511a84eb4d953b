use crate::cache::CacheError;
use crate::db::StoreError;
use crate::error::ErrorKind;
use thiserror::Error;

/// Timer engine errors
#[derive(Debug, Error)]
pub enum TimerError {
    #[error("Timer not found for tournament {0}")]
    NotFound(i64),

    #[error("Invalid timer duration: {0}ms")]
    InvalidDuration(i64),

    #[error("Timer for tournament {0} is closed")]
    Closed(i64),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Corrupt timer state: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl TimerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TimerError::NotFound(_) => ErrorKind::NotFound,
            TimerError::InvalidDuration(_) | TimerError::Closed(_) => ErrorKind::InvalidState,
            TimerError::Cache(_) | TimerError::Store(_) | TimerError::Serialization(_) => {
                ErrorKind::Transient
            }
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            TimerError::NotFound(_) => "TIMER_NOT_FOUND",
            TimerError::InvalidDuration(_) => "INVALID_DURATION",
            TimerError::Closed(_) => "TIMER_CLOSED",
            TimerError::Cache(e) => e.code(),
            TimerError::Store(_) | TimerError::Serialization(_) => "UNAVAILABLE",
        }
    }

    /// Message safe to show to callers; infrastructure details stay in logs
    pub fn client_message(&self) -> String {
        match self {
            TimerError::NotFound(_) | TimerError::InvalidDuration(_) | TimerError::Closed(_) => {
                self.to_string()
            }
            TimerError::Cache(CacheError::LockUnavailable { .. }) => {
                "Timer is busy, please retry".to_string()
            }
            _ => "Timer service temporarily unavailable".to_string(),
        }
    }
}

pub type TimerResult<T> = Result<T, TimerError>;
