//! Shared low-latency cache with advisory leased locks.
//!
//! This module provides:
//! - The [`SharedCache`] seam used by every service for hot state
//! - [`Lease`] / [`with_lease`] for bounded critical sections under a per-key lock
//! - [`MemoryCache`], an in-process backend with TTLs and auto-expiring leases
//!
//! ## Key layout
//!
//! | Key | Owner | Content |
//! |---|---|---|
//! | `timer:{id}` | timer engine | JSON [`TimerState`](crate::timer::TimerState) |
//! | `active_timers` | timer engine | set of tournament ids swept every tick |
//! | `timer:lock:{id}` | timer engine | lease |
//! | `timer:closed:{id}` | timer engine | present once a winner ended the tournament |
//! | `tables:lock:{id}` | table allocator | lease |
//! | `tournament:{id}:tables` | table allocator | read-through table list |
//! | `players:lock:{id}` | player registry | lease |

pub mod errors;
pub mod lease;
pub mod memory;

pub use errors::{CacheError, CacheResult};
pub use lease::{Lease, LockOptions, with_lease};
pub use memory::MemoryCache;

use async_trait::async_trait;
use std::time::Duration;
use uuid::Uuid;

/// Opaque proof of lock ownership, required to release it
pub type LockToken = Uuid;

/// Key of the global registry of running timers
pub const ACTIVE_TIMERS_KEY: &str = "active_timers";

/// Hot state store shared by all service instances
#[async_trait]
pub trait SharedCache: Send + Sync {
    /// Read a value, `None` when absent or expired
    async fn get(&self, key: &str) -> CacheResult<Option<String>>;

    /// Write a value, optionally expiring after `ttl`
    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> CacheResult<()>;

    /// Delete a value
    async fn del(&self, key: &str) -> CacheResult<()>;

    /// Add a member to a set
    async fn sadd(&self, key: &str, member: &str) -> CacheResult<()>;

    /// Remove a member from a set
    async fn srem(&self, key: &str, member: &str) -> CacheResult<()>;

    /// List the members of a set
    async fn smembers(&self, key: &str) -> CacheResult<Vec<String>>;

    /// Try to take an exclusive lease on `key`.
    ///
    /// Returns `None` when another unexpired lease exists. The lease expires on
    /// its own after `lease` even if never released.
    async fn try_lock(&self, key: &str, lease: Duration) -> CacheResult<Option<LockToken>>;

    /// Release a lease. Returns `false` if the lease already expired or was
    /// taken over by someone else.
    async fn unlock(&self, key: &str, token: LockToken) -> CacheResult<bool>;
}

pub(crate) fn timer_key(tournament_id: i64) -> String {
    format!("timer:{tournament_id}")
}

pub(crate) fn timer_lock_key(tournament_id: i64) -> String {
    format!("timer:lock:{tournament_id}")
}

pub(crate) fn timer_closed_key(tournament_id: i64) -> String {
    format!("timer:closed:{tournament_id}")
}

pub(crate) fn tables_lock_key(tournament_id: i64) -> String {
    format!("tables:lock:{tournament_id}")
}

pub(crate) fn tables_list_key(tournament_id: i64) -> String {
    format!("tournament:{tournament_id}:tables")
}

pub(crate) fn players_lock_key(tournament_id: i64) -> String {
    format!("players:lock:{tournament_id}")
}
