//! Player registry service.
//!
//! Tracks each player's status, turns elimination requests into unseat
//! requests and declares the winner once a single player remains.

pub mod consumer;
pub mod errors;
pub mod models;
pub mod registry;

pub use consumer::PlayerEventHandler;
pub use errors::{PlayerError, PlayerResult};
pub use models::{EliminationOutcome, Player, PlayerId, PlayerStatus};
pub use registry::PlayerRegistry;
