//! Cross-service event contract.
//!
//! Services never call each other; they publish [`TournamentEvent`]s wrapped
//! in an [`EventEnvelope`] and react to the ones they consume. Delivery is
//! at-least-once and ordered per tournament, so every handler is idempotent.

pub mod bus;
pub mod consumer;
pub mod envelope;
pub mod errors;
pub mod payloads;

pub use bus::{DEFAULT_RETENTION, EventBus, MemoryBus, Subscription};
pub use consumer::{EventHandler, HandlerError, dispatch, spawn_consumer};
pub use envelope::{EventEnvelope, SCHEMA_VERSION, Topic, TournamentEvent};
pub use errors::{BusError, BusResult, EventError};
pub use payloads::*;
