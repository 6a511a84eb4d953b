//! Tournament aggregate.
//!
//! Owns the lifecycle (OPEN_REGISTRATION, RUNNING, FINISHED) and the blind
//! level. Drives the timer through events and forwards registration and
//! elimination requests to the player registry.

pub mod consumer;
pub mod manager;
pub mod models;

pub use consumer::TournamentEventHandler;
pub use manager::{TournamentError, TournamentManager, TournamentResult};
pub use models::{
    BASE_SMALL_BLIND, BlindLevel, DEFAULT_LEVEL_DURATION_MS, Tournament, TournamentId,
    TournamentStatus,
};
