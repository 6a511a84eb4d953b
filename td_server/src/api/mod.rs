//! HTTP/WebSocket API for the tournament director.
//!
//! Exposes the queried state collaborators need (timers, tables, players)
//! and the user operations of the tournament aggregate. Requests that start
//! a saga answer `202 Accepted`: the request was validated and forwarded,
//! the downstream steps complete asynchronously.
//!
//! # Modules
//!
//! - [`tournaments`]: lifecycle, blind levels
//! - [`players`]: registration, elimination requests, player listing
//! - [`tables`]: table listing and pre-creation
//! - [`timers`]: timer snapshot, pause/resume
//! - [`websocket`]: live countdown updates
//! - [`middleware`]: request id, access log, HTTP metrics
//!
//! # Endpoints Overview
//!
//! ```text
//! GET  /health
//! GET  /tournaments                              POST /tournaments
//! GET  /tournaments/{id}
//! POST /tournaments/{id}/start                   POST /tournaments/{id}/next
//! GET  /tournaments/{id}/blind
//! GET  /tournaments/{id}/players                 POST /tournaments/{id}/players
//! POST /tournaments/{id}/players/{player_id}/eliminate
//! GET  /tournaments/{id}/tables                  POST /tournaments/{id}/tables
//! GET  /tournaments/{id}/timer
//! POST /timers/{id}/pause                        POST /timers/{id}/resume
//! GET  /ws/timers/{id}
//! ```
//!
//! # CORS
//!
//! CORS is configured permissively for development. In production, configure
//! appropriate origins, methods, and headers.

pub mod error;
pub mod middleware;
pub mod players;
pub mod tables;
pub mod timers;
pub mod tournaments;
pub mod websocket;

pub use error::{ApiError, ErrorResponse};

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
};
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tournament_director::{
    PlayerRegistry, TableAllocator, TimerEngine, TournamentManager, cache::SharedCache,
    db::Database,
};

/// Application state shared across all HTTP handlers and WebSocket connections.
///
/// Every field is a cheap handle over shared infrastructure.
#[derive(Clone)]
pub struct AppState {
    pub tournaments: TournamentManager,
    pub players: PlayerRegistry,
    pub tables: TableAllocator,
    pub timers: TimerEngine,
    pub cache: Arc<dyn SharedCache>,
    /// `None` when snapshots are kept in memory
    pub database: Option<Database>,
}

/// Create the complete API router with all endpoints and middleware.
///
/// # Arguments
///
/// - `state`: Application state with the service handles
///
/// # Returns
///
/// Configured Axum router ready to serve requests
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route(
            "/tournaments",
            get(tournaments::list_tournaments).post(tournaments::create_tournament),
        )
        .route("/tournaments/{id}", get(tournaments::get_tournament))
        .route("/tournaments/{id}/start", post(tournaments::start_tournament))
        .route("/tournaments/{id}/next", post(tournaments::advance_blind_level))
        .route("/tournaments/{id}/blind", get(tournaments::get_blind_level))
        .route(
            "/tournaments/{id}/players",
            get(players::list_players).post(players::register_player),
        )
        .route(
            "/tournaments/{id}/players/{player_id}/eliminate",
            post(players::eliminate_player),
        )
        .route(
            "/tournaments/{id}/tables",
            get(tables::list_tables).post(tables::create_tables),
        )
        .route("/tournaments/{id}/timer", get(timers::get_timer))
        .route("/timers/{id}/pause", post(timers::pause_timer))
        .route("/timers/{id}/resume", post(timers::resume_timer))
        .route("/ws/timers/{id}", get(websocket::websocket_handler))
        .layer(axum::middleware::from_fn(middleware::observe_requests))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Health check endpoint for monitoring and load balancers.
///
/// Checks the shared cache and, when configured, the database.
///
/// # Response
///
/// Returns `200 OK` if all components are healthy, or `503 Service Unavailable` if any component fails.
///
/// # Example
///
/// ```bash
/// curl http://localhost:3000/health
/// # {"status":"healthy","cache":true,"database":"memory","timestamp":"2026-01-01T10:30:00Z"}
/// ```
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let cache_healthy = state.cache.get("health").await.is_ok();

    let (database, db_healthy) = match &state.database {
        Some(db) => match db.health_check().await {
            Ok(()) => ("postgres", true),
            Err(e) => {
                log::warn!("Database health check failed: {}", e);
                ("postgres", false)
            }
        },
        None => ("memory", true),
    };

    let overall_healthy = cache_healthy && db_healthy;
    let status_code = if overall_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let response = json!({
        "status": if overall_healthy { "healthy" } else { "unhealthy" },
        "version": env!("CARGO_PKG_VERSION"),
        "cache": cache_healthy,
        "database": {
            "backend": database,
            "healthy": db_healthy,
        },
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });

    (status_code, Json(response))
}
