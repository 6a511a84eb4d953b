//! Mapping of domain errors onto HTTP responses.
//!
//! Not-found is 404, invalid state is 409, malformed input is 400 and any
//! transient infrastructure failure is 503. The body always carries the
//! wire code and a sanitized message.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use tournament_director::{ErrorKind, PlayerError, TableError, TimerError, TournamentError};

/// Codes that describe a bad request rather than a conflicting state
const INVALID_INPUT_CODES: &[&str] = &[
    "INVALID_DURATION",
    "INVALID_NAME",
    "INVALID_USERNAME",
    "INVALID_COUNT",
];

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Tournament(#[from] TournamentError),

    #[error(transparent)]
    Timer(#[from] TimerError),

    #[error(transparent)]
    Table(#[from] TableError),

    #[error(transparent)]
    Player(#[from] PlayerError),
}

impl ApiError {
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Tournament(e) => e.code(),
            ApiError::Timer(e) => e.code(),
            ApiError::Table(e) => e.code(),
            ApiError::Player(e) => e.code(),
        }
    }

    fn kind(&self) -> ErrorKind {
        match self {
            ApiError::Tournament(e) => e.kind(),
            ApiError::Timer(e) => e.kind(),
            ApiError::Table(e) => e.kind(),
            ApiError::Player(e) => e.kind(),
        }
    }

    pub fn status(&self) -> StatusCode {
        if INVALID_INPUT_CODES.contains(&self.code()) {
            return StatusCode::BAD_REQUEST;
        }
        match self.kind() {
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::InvalidState => StatusCode::CONFLICT,
            ErrorKind::Transient => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn client_message(&self) -> String {
        match self {
            ApiError::Tournament(e) => e.client_message(),
            ApiError::Timer(e) => e.client_message(),
            ApiError::Table(e) => e.client_message(),
            ApiError::Player(e) => e.client_message(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            log::warn!("Request failed with {}: {}", status, self);
        }

        let body = ErrorResponse {
            error: self.code().to_string(),
            message: self.client_message(),
        };
        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
