//! Table allocation service.
//!
//! Assigns seats as players register, unseats them on elimination and keeps
//! table populations within one of each other, breaking tables as the field
//! shrinks.

pub mod allocator;
pub mod consumer;
pub mod errors;
pub mod models;

pub use allocator::TableAllocator;
pub use consumer::TableEventHandler;
pub use errors::{TableError, TableResult};
pub use models::{
    MAX_REBALANCE_PASSES, Move, PassOutcome, RebalanceReport, SeatedPlayer, Seating,
    TABLE_CAPACITY, Table, TableId, TablePlayer,
};
