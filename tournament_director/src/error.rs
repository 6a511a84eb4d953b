//! Error classification shared by every service.

use serde::Serialize;

/// Coarse category of a failure, used to pick the caller-facing response
/// and the retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The referenced timer, tournament, table or player does not exist.
    /// Surfaced to the caller, never retried.
    NotFound,
    /// The request conflicts with the current lifecycle state.
    /// Rejected with state unchanged.
    InvalidState,
    /// Cache, store, bus or lock was unavailable. Sweeps retry next cycle,
    /// user operations fail without a partial write.
    Transient,
}

impl ErrorKind {
    /// Whether a later retry may succeed without any change from the caller
    pub fn is_retryable(self) -> bool {
        matches!(self, ErrorKind::Transient)
    }
}
