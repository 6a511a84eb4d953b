use crate::error::ErrorKind;
use thiserror::Error;

/// Errors decoding or encoding an event envelope
#[derive(Debug, Error)]
pub enum EventError {
    #[error("Malformed {event_type} payload: {source}")]
    MalformedPayload {
        event_type: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Unsupported schema version: {0}")]
    UnsupportedVersion(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Event bus errors
#[derive(Debug, Error)]
pub enum BusError {
    #[error("Event bus unavailable: {0}")]
    Unavailable(String),

    #[error("Event error: {0}")]
    Event(#[from] EventError),
}

impl BusError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Transient
    }

    pub fn code(&self) -> &'static str {
        "UNAVAILABLE"
    }
}

pub type BusResult<T> = Result<T, BusError>;
