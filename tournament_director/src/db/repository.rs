//! Repository trait definitions for testability and dependency injection.
//!
//! Each service owns its rows: the timer engine its snapshots, table
//! allocation its tables and its own player view, the registry the players,
//! and the aggregate the tournaments. Postgres implementations live in
//! [`super::postgres`], in-memory ones in [`super::memory`].

use super::timeouts::StoreResult;
use crate::player::Player;
use crate::table::{Table, TablePlayer};
use crate::timer::TimerState;
use crate::tournament::Tournament;
use async_trait::async_trait;

/// Durable timer snapshots
#[async_trait]
pub trait TimerRepository: Send + Sync {
    /// Upsert the snapshot for `state.tournament_id`, stamped `snapshot_at` (ms)
    async fn save_snapshot(&self, state: &TimerState, snapshot_at: i64) -> StoreResult<()>;

    /// Latest snapshot, if any
    async fn find_snapshot(&self, tournament_id: i64) -> StoreResult<Option<TimerState>>;

    /// Every RUNNING or PAUSED snapshot
    async fn list_unfinished(&self) -> StoreResult<Vec<TimerState>>;
}

/// Tables and the allocation service's player rows
#[async_trait]
pub trait TableRepository: Send + Sync {
    /// Tables of a tournament ordered by id, each with its SEATED occupants
    /// ordered by player id
    async fn find_all_by_tournament(&self, tournament_id: i64) -> StoreResult<Vec<Table>>;

    /// Create an empty table
    async fn create(&self, tournament_id: i64) -> StoreResult<Table>;

    /// Insert a REGISTERED row for the player, or return the existing one
    /// unchanged
    async fn upsert_player(
        &self,
        player_id: i64,
        tournament_id: i64,
        username: &str,
    ) -> StoreResult<TablePlayer>;

    async fn find_player(&self, player_id: i64) -> StoreResult<Option<TablePlayer>>;

    /// Mark SEATED at `table_id`
    async fn assign_player(&self, player_id: i64, table_id: i64) -> StoreResult<()>;

    /// Mark ELIMINATED and clear the table reference
    async fn remove_player(&self, player_id: i64) -> StoreResult<()>;

    /// Remove an empty table
    async fn delete_table(&self, table_id: i64) -> StoreResult<()>;
}

/// Player registry rows
#[async_trait]
pub trait PlayerRepository: Send + Sync {
    /// Insert a REGISTERED player
    async fn create(&self, tournament_id: i64, username: &str) -> StoreResult<Player>;

    async fn find_by_id(&self, player_id: i64) -> StoreResult<Option<Player>>;

    async fn find_by_username(
        &self,
        tournament_id: i64,
        username: &str,
    ) -> StoreResult<Option<Player>>;

    /// Persist status and table reference.
    ///
    /// An ELIMINATED row is never changed again. Returns `false` when the
    /// stored row was already ELIMINATED and nothing was written.
    async fn save(&self, player: &Player) -> StoreResult<bool>;

    /// Players of the tournament not ELIMINATED
    async fn count_active(&self, tournament_id: i64) -> StoreResult<i64>;

    /// Some player of the tournament not ELIMINATED (lowest id)
    async fn find_last_active(&self, tournament_id: i64) -> StoreResult<Option<Player>>;

    /// All players of the tournament ordered by id
    async fn list_by_tournament(&self, tournament_id: i64) -> StoreResult<Vec<Player>>;

    /// Winner already declared for the tournament, if any
    async fn find_winner(&self, tournament_id: i64) -> StoreResult<Option<i64>>;

    /// Record the declared winner. Returns `false` if one was already recorded.
    async fn record_winner(&self, tournament_id: i64, winner_id: i64) -> StoreResult<bool>;
}

/// Tournament aggregate rows
#[async_trait]
pub trait TournamentRepository: Send + Sync {
    /// Insert an OPEN_REGISTRATION tournament at level 1
    async fn create(&self, name: &str, level_duration_ms: i64) -> StoreResult<Tournament>;

    async fn find_by_id(&self, tournament_id: i64) -> StoreResult<Option<Tournament>>;

    /// All tournaments, newest first
    async fn list(&self) -> StoreResult<Vec<Tournament>>;

    /// Persist status and level of `next` only if the stored row still has
    /// the status and level of `expected`. Returns whether it was written.
    async fn compare_and_save(
        &self,
        expected: &Tournament,
        next: &Tournament,
    ) -> StoreResult<bool>;
}
