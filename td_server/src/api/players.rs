//! Player API handlers.
//!
//! Registration and elimination are forwarded to the player registry over
//! the bus, so both answer `202 Accepted` with the id of the forwarded event.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use tournament_director::player::Player;
use uuid::Uuid;

use super::{AppState, error::ApiResult};

#[derive(Debug, Deserialize)]
pub struct RegisterPlayerRequest {
    pub username: String,
}

/// Confirmation that a request entered the saga
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptedResponse {
    pub event_id: Uuid,
}

/// List the registry's players of a tournament.
pub async fn list_players(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Vec<Player>>> {
    Ok(Json(state.players.list_players(id).await?))
}

/// Request registration of `username`.
///
/// # Errors
///
/// - `404 Not Found`: no such tournament
/// - `409 Conflict`: `REGISTRATION_CLOSED`
/// - `503 Service Unavailable`: the request could not be forwarded
pub async fn register_player(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<RegisterPlayerRequest>,
) -> ApiResult<(StatusCode, Json<AcceptedResponse>)> {
    let event_id = state
        .tournaments
        .register_player(id, &request.username)
        .await?;
    Ok((StatusCode::ACCEPTED, Json(AcceptedResponse { event_id })))
}

/// Request elimination of a player.
///
/// # Errors
///
/// - `409 Conflict`: `TOURNAMENT_NOT_STARTED`
/// - `503 Service Unavailable`: the request could not be forwarded
pub async fn eliminate_player(
    State(state): State<AppState>,
    Path((id, player_id)): Path<(i64, i64)>,
) -> ApiResult<(StatusCode, Json<AcceptedResponse>)> {
    let event_id = state.tournaments.eliminate_player(id, player_id).await?;
    Ok((StatusCode::ACCEPTED, Json(AcceptedResponse { event_id })))
}
