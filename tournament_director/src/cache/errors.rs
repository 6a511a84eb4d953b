//! Shared cache error types.

use crate::error::ErrorKind;
use thiserror::Error;

/// Shared cache errors
#[derive(Debug, Error)]
pub enum CacheError {
    /// Cache backend could not be reached
    #[error("Cache unavailable: {0}")]
    Unavailable(String),

    /// Another holder owns the lease on this key
    #[error("Lock unavailable for {key}")]
    LockUnavailable { key: String },

    /// Cached value could not be encoded or decoded
    #[error("Cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CacheError {
    /// All cache failures are transient from the caller's point of view
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Transient
    }

    /// Stable wire code
    pub fn code(&self) -> &'static str {
        match self {
            CacheError::LockUnavailable { .. } => "LOCK_UNAVAILABLE",
            CacheError::Unavailable(_) | CacheError::Serialization(_) => "UNAVAILABLE",
        }
    }
}

/// Result type for cache operations
pub type CacheResult<T> = Result<T, CacheError>;
