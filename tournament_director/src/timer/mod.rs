//! Distributed countdown timer.
//!
//! One authoritative countdown per running tournament, broadcast once per
//! second, recoverable after restarts and safe under concurrent sweeps.

pub mod broadcast;
pub mod consumer;
pub mod engine;
pub mod errors;
pub mod models;
pub mod ticker;

pub use broadcast::{TimerBroadcaster, TimerUpdate};
pub use consumer::TimerEventHandler;
pub use engine::{TickOutcome, TimerEngine};
pub use errors::{TimerError, TimerResult};
pub use models::{TimerState, TimerStatus};
pub use ticker::Ticker;
