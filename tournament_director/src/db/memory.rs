//! In-memory repository implementations.
//!
//! Used by the server when no `DATABASE_URL` is configured, and by tests.
//! Each type keeps its rows behind an `Arc<RwLock<..>>`; clones share state.

use super::repository::{PlayerRepository, TableRepository, TimerRepository, TournamentRepository};
use super::timeouts::{StoreError, StoreResult};
use crate::player::{Player, PlayerStatus};
use crate::table::{SeatedPlayer, Table, TablePlayer};
use crate::timer::TimerState;
use crate::tournament::{Tournament, TournamentStatus};
use async_trait::async_trait;
use chrono::Utc;
use std::{
    collections::{BTreeMap, BTreeSet},
    sync::Arc,
};
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
struct Snapshot {
    state: TimerState,
    snapshot_at: i64,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryTimerRepository {
    snapshots: Arc<RwLock<BTreeMap<i64, Snapshot>>>,
}

impl MemoryTimerRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// When the snapshot for `tournament_id` was last written
    pub async fn snapshot_at(&self, tournament_id: i64) -> Option<i64> {
        self.snapshots
            .read()
            .await
            .get(&tournament_id)
            .map(|s| s.snapshot_at)
    }
}

#[async_trait]
impl TimerRepository for MemoryTimerRepository {
    async fn save_snapshot(&self, state: &TimerState, snapshot_at: i64) -> StoreResult<()> {
        self.snapshots.write().await.insert(
            state.tournament_id,
            Snapshot {
                state: state.clone(),
                snapshot_at,
            },
        );
        Ok(())
    }

    async fn find_snapshot(&self, tournament_id: i64) -> StoreResult<Option<TimerState>> {
        Ok(self
            .snapshots
            .read()
            .await
            .get(&tournament_id)
            .map(|s| s.state.clone()))
    }

    async fn list_unfinished(&self) -> StoreResult<Vec<TimerState>> {
        Ok(self
            .snapshots
            .read()
            .await
            .values()
            .filter(|s| s.state.is_active())
            .map(|s| s.state.clone())
            .collect())
    }
}

#[derive(Debug, Default)]
struct TableRows {
    next_table_id: i64,
    tables: BTreeMap<i64, i64>,
    players: BTreeMap<i64, TablePlayer>,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryTableRepository {
    rows: Arc<RwLock<TableRows>>,
}

impl MemoryTableRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TableRepository for MemoryTableRepository {
    async fn find_all_by_tournament(&self, tournament_id: i64) -> StoreResult<Vec<Table>> {
        let rows = self.rows.read().await;
        let mut tables: BTreeMap<i64, Table> = rows
            .tables
            .iter()
            .filter(|(_, owner)| **owner == tournament_id)
            .map(|(&id, _)| {
                (
                    id,
                    Table {
                        id,
                        tournament_id,
                        seated_players: Vec::new(),
                    },
                )
            })
            .collect();

        for player in rows.players.values() {
            if player.status != PlayerStatus::Seated {
                continue;
            }
            if let Some(table) = player.table_id.and_then(|id| tables.get_mut(&id)) {
                table.seated_players.push(SeatedPlayer {
                    player_id: player.id,
                    username: player.username.clone(),
                });
            }
        }

        Ok(tables.into_values().collect())
    }

    async fn create(&self, tournament_id: i64) -> StoreResult<Table> {
        let mut rows = self.rows.write().await;
        rows.next_table_id += 1;
        let id = rows.next_table_id;
        rows.tables.insert(id, tournament_id);
        Ok(Table {
            id,
            tournament_id,
            seated_players: Vec::new(),
        })
    }

    async fn upsert_player(
        &self,
        player_id: i64,
        tournament_id: i64,
        username: &str,
    ) -> StoreResult<TablePlayer> {
        let mut rows = self.rows.write().await;
        let player = rows.players.entry(player_id).or_insert_with(|| TablePlayer {
            id: player_id,
            tournament_id,
            username: username.to_string(),
            status: PlayerStatus::Registered,
            table_id: None,
        });
        Ok(player.clone())
    }

    async fn find_player(&self, player_id: i64) -> StoreResult<Option<TablePlayer>> {
        Ok(self.rows.read().await.players.get(&player_id).cloned())
    }

    async fn assign_player(&self, player_id: i64, table_id: i64) -> StoreResult<()> {
        let mut rows = self.rows.write().await;
        if !rows.tables.contains_key(&table_id) {
            return Err(StoreError::Corrupt(format!("table {table_id} does not exist")));
        }
        if let Some(player) = rows.players.get_mut(&player_id) {
            player.status = PlayerStatus::Seated;
            player.table_id = Some(table_id);
        }
        Ok(())
    }

    async fn remove_player(&self, player_id: i64) -> StoreResult<()> {
        if let Some(player) = self.rows.write().await.players.get_mut(&player_id) {
            player.status = PlayerStatus::Eliminated;
            player.table_id = None;
        }
        Ok(())
    }

    async fn delete_table(&self, table_id: i64) -> StoreResult<()> {
        let mut rows = self.rows.write().await;
        rows.tables.remove(&table_id);
        for player in rows.players.values_mut() {
            if player.table_id == Some(table_id) {
                player.table_id = None;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct PlayerRows {
    next_id: i64,
    players: BTreeMap<i64, Player>,
    usernames: BTreeSet<(i64, String)>,
    winners: BTreeMap<i64, i64>,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryPlayerRepository {
    rows: Arc<RwLock<PlayerRows>>,
}

impl MemoryPlayerRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PlayerRepository for MemoryPlayerRepository {
    async fn create(&self, tournament_id: i64, username: &str) -> StoreResult<Player> {
        let mut rows = self.rows.write().await;
        let key = (tournament_id, username.to_string());
        if rows.usernames.contains(&key) {
            return Err(StoreError::Corrupt(format!(
                "username {username} already registered in tournament {tournament_id}"
            )));
        }

        rows.next_id += 1;
        let player = Player {
            id: rows.next_id,
            tournament_id,
            username: username.to_string(),
            status: PlayerStatus::Registered,
            table_id: None,
            created_at: Utc::now(),
        };
        rows.usernames.insert(key);
        rows.players.insert(player.id, player.clone());
        Ok(player)
    }

    async fn find_by_id(&self, player_id: i64) -> StoreResult<Option<Player>> {
        Ok(self.rows.read().await.players.get(&player_id).cloned())
    }

    async fn find_by_username(
        &self,
        tournament_id: i64,
        username: &str,
    ) -> StoreResult<Option<Player>> {
        Ok(self
            .rows
            .read()
            .await
            .players
            .values()
            .find(|p| p.tournament_id == tournament_id && p.username == username)
            .cloned())
    }

    async fn save(&self, player: &Player) -> StoreResult<bool> {
        let mut rows = self.rows.write().await;
        match rows.players.get_mut(&player.id) {
            Some(stored) if stored.status == PlayerStatus::Eliminated => Ok(false),
            Some(stored) => {
                stored.status = player.status;
                stored.table_id = player.table_id;
                Ok(true)
            }
            None => Err(StoreError::Corrupt(format!("player {} does not exist", player.id))),
        }
    }

    async fn count_active(&self, tournament_id: i64) -> StoreResult<i64> {
        Ok(self
            .rows
            .read()
            .await
            .players
            .values()
            .filter(|p| p.tournament_id == tournament_id && p.status.is_active())
            .count() as i64)
    }

    async fn find_last_active(&self, tournament_id: i64) -> StoreResult<Option<Player>> {
        Ok(self
            .rows
            .read()
            .await
            .players
            .values()
            .find(|p| p.tournament_id == tournament_id && p.status.is_active())
            .cloned())
    }

    async fn list_by_tournament(&self, tournament_id: i64) -> StoreResult<Vec<Player>> {
        Ok(self
            .rows
            .read()
            .await
            .players
            .values()
            .filter(|p| p.tournament_id == tournament_id)
            .cloned()
            .collect())
    }

    async fn find_winner(&self, tournament_id: i64) -> StoreResult<Option<i64>> {
        Ok(self.rows.read().await.winners.get(&tournament_id).copied())
    }

    async fn record_winner(&self, tournament_id: i64, winner_id: i64) -> StoreResult<bool> {
        let mut rows = self.rows.write().await;
        if rows.winners.contains_key(&tournament_id) {
            return Ok(false);
        }
        rows.winners.insert(tournament_id, winner_id);
        Ok(true)
    }
}

#[derive(Debug, Default)]
struct TournamentRows {
    next_id: i64,
    tournaments: BTreeMap<i64, Tournament>,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryTournamentRepository {
    rows: Arc<RwLock<TournamentRows>>,
}

impl MemoryTournamentRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TournamentRepository for MemoryTournamentRepository {
    async fn create(&self, name: &str, level_duration_ms: i64) -> StoreResult<Tournament> {
        let mut rows = self.rows.write().await;
        rows.next_id += 1;
        let tournament = Tournament {
            id: rows.next_id,
            name: name.to_string(),
            status: TournamentStatus::OpenRegistration,
            current_level: 1,
            level_duration_ms,
            created_at: Utc::now(),
        };
        rows.tournaments.insert(tournament.id, tournament.clone());
        Ok(tournament)
    }

    async fn find_by_id(&self, tournament_id: i64) -> StoreResult<Option<Tournament>> {
        Ok(self.rows.read().await.tournaments.get(&tournament_id).cloned())
    }

    async fn list(&self) -> StoreResult<Vec<Tournament>> {
        Ok(self
            .rows
            .read()
            .await
            .tournaments
            .values()
            .rev()
            .cloned()
            .collect())
    }

    async fn compare_and_save(
        &self,
        expected: &Tournament,
        next: &Tournament,
    ) -> StoreResult<bool> {
        let mut rows = self.rows.write().await;
        match rows.tournaments.get_mut(&next.id) {
            Some(stored)
                if stored.status == expected.status
                    && stored.current_level == expected.current_level =>
            {
                stored.status = next.status;
                stored.current_level = next.current_level;
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Err(StoreError::Corrupt(format!(
                "tournament {} does not exist",
                next.id
            ))),
        }
    }
}
