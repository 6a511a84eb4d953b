//! WebSocket push of live countdown updates.
//!
//! # Connection Flow
//!
//! 1. Client connects via `GET /ws/timers/{tournament_id}`
//! 2. Server sends the current countdown, if any
//! 3. Every update for that tournament is pushed as JSON until the client
//!    disconnects
//!
//! # Server Messages
//!
//! ```json
//! {"type": "timer_update", "tournamentId": 1, "remainingMs": 41000, "status": "RUNNING"}
//! {"type": "timer_finished", "tournamentId": 1}
//! ```
//!
//! The stream is lossy: a client that falls behind skips the oldest updates.

use axum::{
    extract::{
        Path, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use log::{debug, info, warn};
use tokio::sync::broadcast::error::RecvError;
use tournament_director::timer::TimerUpdate;

use super::AppState;
use crate::metrics;

pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    Path(tournament_id): Path<i64>,
    State(state): State<AppState>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, tournament_id, state))
}

async fn handle_socket(socket: WebSocket, tournament_id: i64, state: AppState) {
    let (mut sender, mut receiver) = socket.split();
    metrics::timer_streams_opened();
    info!("Timer stream opened for tournament {}", tournament_id);

    // Subscribe before reading the snapshot so no update falls in between
    let mut updates = state.timers.subscribe();

    match state.timers.get_timer(tournament_id).await {
        Ok(Some(timer)) => {
            let current = TimerUpdate::TimerUpdate {
                tournament_id,
                remaining_ms: timer.remaining_ms,
                status: timer.status,
            };
            if send_update(&mut sender, &current).await.is_err() {
                return;
            }
        }
        Ok(None) => {}
        Err(e) => warn!("Failed to read timer {} for stream: {}", tournament_id, e),
    }

    let send_task = tokio::spawn(async move {
        loop {
            match updates.recv().await {
                Ok(update) if update.tournament_id() == tournament_id => {
                    if send_update(&mut sender, &update).await.is_err() {
                        break;
                    }
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    debug!(
                        "Timer stream for tournament {} skipped {} update(s)",
                        tournament_id, skipped
                    );
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    // Client messages are ignored; the stream is push-only
    while let Some(msg) = receiver.next().await {
        if matches!(msg, Ok(Message::Close(_)) | Err(_)) {
            break;
        }
    }

    send_task.abort();
    info!("Timer stream closed for tournament {}", tournament_id);
}

async fn send_update<S>(sender: &mut S, update: &TimerUpdate) -> Result<(), ()>
where
    S: SinkExt<Message> + Unpin,
{
    let json = match serde_json::to_string(update) {
        Ok(json) => json,
        Err(e) => {
            warn!("Failed to serialize timer update: {}", e);
            return Ok(());
        }
    };
    sender.send(Message::Text(json.into())).await.map_err(|_| ())
}
