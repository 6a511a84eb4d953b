//! # Tournament Director
//!
//! Back end for multi-table poker tournaments. Three concerns are split
//! into cooperating services that share only a cache and an event bus:
//!
//! - **Timer**: a per-tournament countdown that survives restarts and is
//!   advanced by a periodic sweep. Several instances may run; a short
//!   per-timer lock makes each tick single-writer.
//! - **Tables**: seats players into tables of nine, breaks surplus tables
//!   and moves players until no two tables differ by more than one.
//! - **Players**: the registry of participants. Eliminations run under a
//!   per-tournament lock so exactly one winner is ever declared.
//!
//! The [`tournament`] aggregate owns the lifecycle and the blind level and
//! drives everything else by emitting events.
//!
//! ## Elimination saga
//!
//! ```text
//! tournament ──event_player_eliminate──▶ players
//! players    ──event_tables_eliminate──▶ tables   (unseat + rebalance)
//! players    ──tournament_winner───────▶ timer    (stop)
//!                                      └▶ tournament (finish)
//! ```
//!
//! ## Core Modules
//!
//! - [`timer`]: countdown engine, ticker and live update broadcast
//! - [`table`]: allocation, rebalancing and its read-through cache
//! - [`player`]: registration, elimination and winner detection
//! - [`events`]: versioned envelope, topics, bus and consumer loop
//! - [`cache`]: shared key-value cache with leased locks
//! - [`db`]: durable store (Postgres and in-memory)
//!
//! ## Example
//!
//! ```
//! use tournament_director::tournament::BlindLevel;
//!
//! let level = BlindLevel::for_level(3, 1_200_000);
//! assert_eq!((level.small_blind, level.big_blind), (100, 200));
//! ```

/// Shared cache and leased locks.
pub mod cache;
pub use cache::{CacheError, LockOptions, MemoryCache, SharedCache};

/// Wall-clock abstraction for timer arithmetic.
pub mod clock;
pub use clock::{Clock, ManualClock, SystemClock};

/// Durable store: repositories, pool configuration, migrations.
pub mod db;
pub use db::{Database, DatabaseConfig, StoreError};

pub mod error;
pub use error::ErrorKind;

/// Event envelope, topics and the bus.
pub mod events;
pub use events::{EventBus, EventEnvelope, EventHandler, MemoryBus, Topic, TournamentEvent};

pub mod player;
pub use player::{PlayerError, PlayerEventHandler, PlayerRegistry};

pub mod table;
pub use table::{TableAllocator, TableError, TableEventHandler};

pub mod timer;
pub use timer::{Ticker, TimerEngine, TimerError, TimerEventHandler, TimerState, TimerStatus};

pub mod tournament;
pub use tournament::{TournamentError, TournamentEventHandler, TournamentManager};
