//! Table API handlers.
//!
//! List tables:
//! ```bash
//! curl http://localhost:3000/tournaments/1/tables
//! ```

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Deserialize;
use tournament_director::table::Table;

use super::{AppState, error::ApiResult};

#[derive(Debug, Deserialize)]
pub struct CreateTablesRequest {
    pub count: usize,
}

/// Current tables of a tournament with their occupants.
///
/// Returns `200 OK` with array of tables:
/// ```json
/// [
///   {
///     "id": 3,
///     "tournamentId": 1,
///     "seatedPlayers": [{"playerId": 12, "username": "alice"}]
///   }
/// ]
/// ```
pub async fn list_tables(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Vec<Table>>> {
    Ok(Json(state.tables.list_tables(id).await?))
}

/// Pre-create empty tables.
///
/// # Errors
///
/// - `400 Bad Request`: `INVALID_COUNT`, count outside 1..=100
pub async fn create_tables(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<CreateTablesRequest>,
) -> ApiResult<(StatusCode, Json<Vec<Table>>)> {
    let tables = state.tables.create_tables(id, request.count).await?;
    Ok((StatusCode::CREATED, Json(tables)))
}
