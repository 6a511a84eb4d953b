//! PostgreSQL implementations of the repository traits.

use super::repository::{PlayerRepository, TableRepository, TimerRepository, TournamentRepository};
use super::timeouts::{StoreError, StoreResult, with_default_timeout};
use crate::player::{Player, PlayerStatus};
use crate::table::{SeatedPlayer, Table, TablePlayer};
use crate::timer::{TimerState, TimerStatus};
use crate::tournament::{Tournament, TournamentStatus};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row, postgres::PgRow};
use std::collections::BTreeMap;
use uuid::Uuid;

fn player_status(value: &str) -> StoreResult<PlayerStatus> {
    PlayerStatus::parse(value).ok_or_else(|| StoreError::Corrupt(format!("player status {value}")))
}

/// PostgreSQL implementation of `TimerRepository`
#[derive(Clone)]
pub struct PgTimerRepository {
    pool: PgPool,
}

impl PgTimerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn map_row(row: &PgRow) -> StoreResult<TimerState> {
        let status: String = row.try_get("status")?;
        let version: i64 = row.try_get("version")?;
        Ok(TimerState {
            tournament_id: row.try_get("tournament_id")?,
            status: TimerStatus::parse(&status)
                .ok_or_else(|| StoreError::Corrupt(format!("timer status {status}")))?,
            remaining_ms: row.try_get("remaining_ms")?,
            last_tick_at: row.try_get("last_tick_at")?,
            version: version.max(0) as u64,
            origin_event: row.try_get::<Option<Uuid>, _>("origin_event")?,
        })
    }
}

#[async_trait]
impl TimerRepository for PgTimerRepository {
    async fn save_snapshot(&self, state: &TimerState, snapshot_at: i64) -> StoreResult<()> {
        with_default_timeout(
            sqlx::query(
                r#"
                INSERT INTO timers (tournament_id, status, remaining_ms, last_tick_at, version, origin_event, snapshot_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                ON CONFLICT (tournament_id) DO UPDATE SET
                    status = EXCLUDED.status,
                    remaining_ms = EXCLUDED.remaining_ms,
                    last_tick_at = EXCLUDED.last_tick_at,
                    version = EXCLUDED.version,
                    origin_event = EXCLUDED.origin_event,
                    snapshot_at = EXCLUDED.snapshot_at
                "#,
            )
            .bind(state.tournament_id)
            .bind(state.status.as_str())
            .bind(state.remaining_ms)
            .bind(state.last_tick_at)
            .bind(state.version as i64)
            .bind(state.origin_event)
            .bind(snapshot_at)
            .execute(&self.pool),
        )
        .await?;
        Ok(())
    }

    async fn find_snapshot(&self, tournament_id: i64) -> StoreResult<Option<TimerState>> {
        let row = with_default_timeout(
            sqlx::query(
                "SELECT tournament_id, status, remaining_ms, last_tick_at, version, origin_event
                 FROM timers WHERE tournament_id = $1",
            )
            .bind(tournament_id)
            .fetch_optional(&self.pool),
        )
        .await?;

        row.as_ref().map(Self::map_row).transpose()
    }

    async fn list_unfinished(&self) -> StoreResult<Vec<TimerState>> {
        let rows = with_default_timeout(
            sqlx::query(
                "SELECT tournament_id, status, remaining_ms, last_tick_at, version, origin_event
                 FROM timers WHERE status <> 'FINISHED' ORDER BY tournament_id",
            )
            .fetch_all(&self.pool),
        )
        .await?;

        rows.iter().map(Self::map_row).collect()
    }
}

/// PostgreSQL implementation of `TableRepository`
#[derive(Clone)]
pub struct PgTableRepository {
    pool: PgPool,
}

impl PgTableRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn map_player(row: &PgRow) -> StoreResult<TablePlayer> {
        let status: String = row.try_get("status")?;
        Ok(TablePlayer {
            id: row.try_get("id")?,
            tournament_id: row.try_get("tournament_id")?,
            username: row.try_get("username")?,
            status: player_status(&status)?,
            table_id: row.try_get("table_id")?,
        })
    }
}

#[async_trait]
impl TableRepository for PgTableRepository {
    async fn find_all_by_tournament(&self, tournament_id: i64) -> StoreResult<Vec<Table>> {
        let table_rows = with_default_timeout(
            sqlx::query("SELECT id FROM tournament_tables WHERE tournament_id = $1 ORDER BY id")
                .bind(tournament_id)
                .fetch_all(&self.pool),
        )
        .await?;

        let mut tables = BTreeMap::new();
        for row in &table_rows {
            let id: i64 = row.try_get("id")?;
            tables.insert(
                id,
                Table {
                    id,
                    tournament_id,
                    seated_players: Vec::new(),
                },
            );
        }

        let seated = with_default_timeout(
            sqlx::query(
                "SELECT id, username, table_id FROM table_players
                 WHERE tournament_id = $1 AND status = 'SEATED' AND table_id IS NOT NULL
                 ORDER BY id",
            )
            .bind(tournament_id)
            .fetch_all(&self.pool),
        )
        .await?;

        for row in &seated {
            let table_id: i64 = row.try_get("table_id")?;
            if let Some(table) = tables.get_mut(&table_id) {
                table.seated_players.push(SeatedPlayer {
                    player_id: row.try_get("id")?,
                    username: row.try_get("username")?,
                });
            }
        }

        Ok(tables.into_values().collect())
    }

    async fn create(&self, tournament_id: i64) -> StoreResult<Table> {
        let row = with_default_timeout(
            sqlx::query("INSERT INTO tournament_tables (tournament_id) VALUES ($1) RETURNING id")
                .bind(tournament_id)
                .fetch_one(&self.pool),
        )
        .await?;

        Ok(Table {
            id: row.try_get("id")?,
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
        with_default_timeout(
            sqlx::query(
                "INSERT INTO table_players (id, tournament_id, username, status)
                 VALUES ($1, $2, $3, 'REGISTERED')
                 ON CONFLICT (id) DO NOTHING",
            )
            .bind(player_id)
            .bind(tournament_id)
            .bind(username)
            .execute(&self.pool),
        )
        .await?;

        self.find_player(player_id)
            .await?
            .ok_or_else(|| StoreError::Corrupt(format!("table player {player_id} vanished")))
    }

    async fn find_player(&self, player_id: i64) -> StoreResult<Option<TablePlayer>> {
        let row = with_default_timeout(
            sqlx::query(
                "SELECT id, tournament_id, username, status, table_id FROM table_players WHERE id = $1",
            )
            .bind(player_id)
            .fetch_optional(&self.pool),
        )
        .await?;

        row.as_ref().map(Self::map_player).transpose()
    }

    async fn assign_player(&self, player_id: i64, table_id: i64) -> StoreResult<()> {
        with_default_timeout(
            sqlx::query("UPDATE table_players SET status = 'SEATED', table_id = $2 WHERE id = $1")
                .bind(player_id)
                .bind(table_id)
                .execute(&self.pool),
        )
        .await?;
        Ok(())
    }

    async fn remove_player(&self, player_id: i64) -> StoreResult<()> {
        with_default_timeout(
            sqlx::query(
                "UPDATE table_players SET status = 'ELIMINATED', table_id = NULL WHERE id = $1",
            )
            .bind(player_id)
            .execute(&self.pool),
        )
        .await?;
        Ok(())
    }

    async fn delete_table(&self, table_id: i64) -> StoreResult<()> {
        with_default_timeout(
            sqlx::query("DELETE FROM tournament_tables WHERE id = $1")
                .bind(table_id)
                .execute(&self.pool),
        )
        .await?;
        Ok(())
    }
}

/// PostgreSQL implementation of `PlayerRepository`
#[derive(Clone)]
pub struct PgPlayerRepository {
    pool: PgPool,
}

impl PgPlayerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn map_row(row: &PgRow) -> StoreResult<Player> {
        let status: String = row.try_get("status")?;
        Ok(Player {
            id: row.try_get("id")?,
            tournament_id: row.try_get("tournament_id")?,
            username: row.try_get("username")?,
            status: player_status(&status)?,
            table_id: row.try_get("table_id")?,
            created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        })
    }
}

const PLAYER_COLUMNS: &str = "id, tournament_id, username, status, table_id, created_at";

#[async_trait]
impl PlayerRepository for PgPlayerRepository {
    async fn create(&self, tournament_id: i64, username: &str) -> StoreResult<Player> {
        let row = with_default_timeout(
            sqlx::query(&format!(
                "INSERT INTO players (tournament_id, username) VALUES ($1, $2) RETURNING {PLAYER_COLUMNS}"
            ))
            .bind(tournament_id)
            .bind(username)
            .fetch_one(&self.pool),
        )
        .await?;

        Self::map_row(&row)
    }

    async fn find_by_id(&self, player_id: i64) -> StoreResult<Option<Player>> {
        let row = with_default_timeout(
            sqlx::query(&format!("SELECT {PLAYER_COLUMNS} FROM players WHERE id = $1"))
                .bind(player_id)
                .fetch_optional(&self.pool),
        )
        .await?;

        row.as_ref().map(Self::map_row).transpose()
    }

    async fn find_by_username(
        &self,
        tournament_id: i64,
        username: &str,
    ) -> StoreResult<Option<Player>> {
        let row = with_default_timeout(
            sqlx::query(&format!(
                "SELECT {PLAYER_COLUMNS} FROM players WHERE tournament_id = $1 AND username = $2"
            ))
            .bind(tournament_id)
            .bind(username)
            .fetch_optional(&self.pool),
        )
        .await?;

        row.as_ref().map(Self::map_row).transpose()
    }

    async fn save(&self, player: &Player) -> StoreResult<bool> {
        let result = with_default_timeout(
            sqlx::query(
                "UPDATE players SET status = $2, table_id = $3
                 WHERE id = $1 AND status <> 'ELIMINATED'",
            )
            .bind(player.id)
            .bind(player.status.as_str())
            .bind(player.table_id)
            .execute(&self.pool),
        )
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn count_active(&self, tournament_id: i64) -> StoreResult<i64> {
        let row = with_default_timeout(
            sqlx::query(
                "SELECT COUNT(*) AS active FROM players
                 WHERE tournament_id = $1 AND status <> 'ELIMINATED'",
            )
            .bind(tournament_id)
            .fetch_one(&self.pool),
        )
        .await?;

        Ok(row.try_get("active")?)
    }

    async fn find_last_active(&self, tournament_id: i64) -> StoreResult<Option<Player>> {
        let row = with_default_timeout(
            sqlx::query(&format!(
                "SELECT {PLAYER_COLUMNS} FROM players
                 WHERE tournament_id = $1 AND status <> 'ELIMINATED'
                 ORDER BY id LIMIT 1"
            ))
            .bind(tournament_id)
            .fetch_optional(&self.pool),
        )
        .await?;

        row.as_ref().map(Self::map_row).transpose()
    }

    async fn list_by_tournament(&self, tournament_id: i64) -> StoreResult<Vec<Player>> {
        let rows = with_default_timeout(
            sqlx::query(&format!(
                "SELECT {PLAYER_COLUMNS} FROM players WHERE tournament_id = $1 ORDER BY id"
            ))
            .bind(tournament_id)
            .fetch_all(&self.pool),
        )
        .await?;

        rows.iter().map(Self::map_row).collect()
    }

    async fn find_winner(&self, tournament_id: i64) -> StoreResult<Option<i64>> {
        let row = with_default_timeout(
            sqlx::query("SELECT winner_id FROM tournament_winners WHERE tournament_id = $1")
                .bind(tournament_id)
                .fetch_optional(&self.pool),
        )
        .await?;

        Ok(row.map(|r| r.try_get::<i64, _>("winner_id")).transpose()?)
    }

    async fn record_winner(&self, tournament_id: i64, winner_id: i64) -> StoreResult<bool> {
        let result = with_default_timeout(
            sqlx::query(
                "INSERT INTO tournament_winners (tournament_id, winner_id) VALUES ($1, $2)
                 ON CONFLICT (tournament_id) DO NOTHING",
            )
            .bind(tournament_id)
            .bind(winner_id)
            .execute(&self.pool),
        )
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

/// PostgreSQL implementation of `TournamentRepository`
#[derive(Clone)]
pub struct PgTournamentRepository {
    pool: PgPool,
}

impl PgTournamentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn map_row(row: &PgRow) -> StoreResult<Tournament> {
        let status: String = row.try_get("status")?;
        let level: i32 = row.try_get("current_level")?;
        Ok(Tournament {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            status: TournamentStatus::parse(&status)
                .ok_or_else(|| StoreError::Corrupt(format!("tournament status {status}")))?,
            current_level: level.max(1) as u32,
            level_duration_ms: row.try_get("level_duration_ms")?,
            created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        })
    }
}

const TOURNAMENT_COLUMNS: &str = "id, name, status, current_level, level_duration_ms, created_at";

#[async_trait]
impl TournamentRepository for PgTournamentRepository {
    async fn create(&self, name: &str, level_duration_ms: i64) -> StoreResult<Tournament> {
        let row = with_default_timeout(
            sqlx::query(&format!(
                "INSERT INTO tournaments (name, level_duration_ms) VALUES ($1, $2) RETURNING {TOURNAMENT_COLUMNS}"
            ))
            .bind(name)
            .bind(level_duration_ms)
            .fetch_one(&self.pool),
        )
        .await?;

        Self::map_row(&row)
    }

    async fn find_by_id(&self, tournament_id: i64) -> StoreResult<Option<Tournament>> {
        let row = with_default_timeout(
            sqlx::query(&format!("SELECT {TOURNAMENT_COLUMNS} FROM tournaments WHERE id = $1"))
                .bind(tournament_id)
                .fetch_optional(&self.pool),
        )
        .await?;

        row.as_ref().map(Self::map_row).transpose()
    }

    async fn list(&self) -> StoreResult<Vec<Tournament>> {
        let rows = with_default_timeout(
            sqlx::query(&format!(
                "SELECT {TOURNAMENT_COLUMNS} FROM tournaments ORDER BY created_at DESC, id DESC"
            ))
            .fetch_all(&self.pool),
        )
        .await?;

        rows.iter().map(Self::map_row).collect()
    }

    async fn compare_and_save(
        &self,
        expected: &Tournament,
        next: &Tournament,
    ) -> StoreResult<bool> {
        let result = with_default_timeout(
            sqlx::query(
                "UPDATE tournaments SET status = $2, current_level = $3
                 WHERE id = $1 AND status = $4 AND current_level = $5",
            )
            .bind(next.id)
            .bind(next.status.as_str())
            .bind(next.current_level as i32)
            .bind(expected.status.as_str())
            .bind(expected.current_level as i32)
            .execute(&self.pool),
        )
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
