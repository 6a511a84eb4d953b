//! Timer API handlers.

use axum::{
    Json,
    extract::{Path, State},
};
use tournament_director::timer::{TimerError, TimerState};

use super::{AppState, error::ApiResult};

/// Current countdown with `remainingMs` projected to now.
///
/// # Errors
///
/// - `404 Not Found`: `TIMER_NOT_FOUND`
pub async fn get_timer(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<TimerState>> {
    let timer = state
        .timers
        .get_timer(id)
        .await?
        .ok_or(TimerError::NotFound(id))?;
    Ok(Json(timer))
}

/// Freeze the countdown. No-op unless RUNNING.
pub async fn pause_timer(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<TimerState>> {
    Ok(Json(state.timers.pause(id).await?))
}

/// Continue a paused countdown. No-op unless PAUSED.
pub async fn resume_timer(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<TimerState>> {
    Ok(Json(state.timers.resume(id).await?))
}
