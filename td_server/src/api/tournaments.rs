//! Tournament lifecycle API handlers.
//!
//! # Examples
//!
//! Create a tournament with 10-minute levels:
//! ```bash
//! curl -X POST http://localhost:3000/tournaments \
//!   -H "Content-Type: application/json" \
//!   -d '{"name": "Sunday Major", "levelDurationMs": 600000}'
//! ```

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use tournament_director::tournament::{BlindLevel, Tournament, TournamentId};

use super::{AppState, error::ApiResult};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTournamentRequest {
    pub name: String,
    /// Defaults to 20 minutes
    #[serde(default)]
    pub level_duration_ms: Option<i64>,
}

/// Aggregate plus the blinds of its current level
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TournamentResponse {
    #[serde(flatten)]
    pub tournament: Tournament,
    pub blinds: BlindLevel,
}

impl From<Tournament> for TournamentResponse {
    fn from(tournament: Tournament) -> Self {
        let blinds = BlindLevel::for_level(tournament.current_level, tournament.level_duration_ms);
        Self { tournament, blinds }
    }
}

/// List tournaments, newest first.
pub async fn list_tournaments(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<TournamentResponse>>> {
    let tournaments = state.tournaments.list_tournaments().await?;
    Ok(Json(tournaments.into_iter().map(Into::into).collect()))
}

/// Create a tournament in OPEN_REGISTRATION.
///
/// # Errors
///
/// - `400 Bad Request`: blank name or non-positive level duration
pub async fn create_tournament(
    State(state): State<AppState>,
    Json(request): Json<CreateTournamentRequest>,
) -> ApiResult<(StatusCode, Json<TournamentResponse>)> {
    let tournament = state
        .tournaments
        .create_tournament(&request.name, request.level_duration_ms)
        .await?;
    Ok((StatusCode::CREATED, Json(tournament.into())))
}

/// Get one tournament with its current blinds.
///
/// # Errors
///
/// - `404 Not Found`: no such tournament
pub async fn get_tournament(
    State(state): State<AppState>,
    Path(id): Path<TournamentId>,
) -> ApiResult<Json<TournamentResponse>> {
    let tournament = state.tournaments.get_tournament(id).await?;
    Ok(Json(tournament.into()))
}

/// Close registration and start the level-1 countdown.
///
/// # Errors
///
/// - `409 Conflict`: `ALREADY_STARTED`
pub async fn start_tournament(
    State(state): State<AppState>,
    Path(id): Path<TournamentId>,
) -> ApiResult<Json<TournamentResponse>> {
    let tournament = state.tournaments.start_tournament(id).await?;
    Ok(Json(tournament.into()))
}

/// Move to the next blind level and restart the countdown.
///
/// # Errors
///
/// - `409 Conflict`: `NOT_RUNNING`
pub async fn advance_blind_level(
    State(state): State<AppState>,
    Path(id): Path<TournamentId>,
) -> ApiResult<Json<TournamentResponse>> {
    let tournament = state.tournaments.advance_blind_level(id).await?;
    Ok(Json(tournament.into()))
}

/// Blinds of the current level.
pub async fn get_blind_level(
    State(state): State<AppState>,
    Path(id): Path<TournamentId>,
) -> ApiResult<Json<BlindLevel>> {
    Ok(Json(state.tournaments.blind_level(id).await?))
}
