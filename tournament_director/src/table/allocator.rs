//! Seat assignment and rebalancing.
//!
//! No table ever holds more than [`TABLE_CAPACITY`] players, and at rest any
//! two tables of a tournament differ by at most one player. Every structural
//! change runs under `tables:lock:{tournamentId}` and reads load straight
//! from the store.

use super::errors::{TableError, TableResult};
use super::models::{
    MAX_REBALANCE_PASSES, Move, PassOutcome, RebalanceReport, Seating, Table, ideal_table_count,
    least_loaded,
};
use crate::cache::{LockOptions, SharedCache, tables_list_key, tables_lock_key, with_lease};
use crate::db::TableRepository;
use crate::events::{
    EventBus, PlayerMovedPayload, PlayerSeatedPayload, TableBrokenPayload, TournamentEvent,
};
use crate::player::PlayerStatus;
use std::{cmp::Reverse, collections::HashSet, sync::Arc, time::Duration};
use tokio::sync::Mutex;

/// Delay between an unseat and the rebalance it triggers
pub const DEFAULT_REBALANCE_DEBOUNCE: Duration = Duration::from_millis(100);

/// Lifetime of the cached table list
pub const DEFAULT_TABLE_CACHE_TTL: Duration = Duration::from_secs(600);

/// Most tables one request may pre-create
pub const MAX_TABLES_PER_REQUEST: usize = 100;

/// Table allocator
#[derive(Clone)]
pub struct TableAllocator {
    repo: Arc<dyn TableRepository>,
    cache: Arc<dyn SharedCache>,
    bus: Arc<dyn EventBus>,
    lock: LockOptions,
    debounce: Duration,
    cache_ttl: Duration,
    /// Tournaments with a debounced rebalance already scheduled
    pending: Arc<Mutex<HashSet<i64>>>,
}

impl TableAllocator {
    /// Create a new table allocator
    pub fn new(
        repo: Arc<dyn TableRepository>,
        cache: Arc<dyn SharedCache>,
        bus: Arc<dyn EventBus>,
    ) -> Self {
        Self {
            repo,
            cache,
            bus,
            lock: LockOptions::operation(),
            debounce: DEFAULT_REBALANCE_DEBOUNCE,
            cache_ttl: DEFAULT_TABLE_CACHE_TTL,
            pending: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn with_lock_options(mut self, lock: LockOptions) -> Self {
        self.lock = lock;
        self
    }

    pub fn with_rebalance_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Seat a player at the least-loaded table with a free seat, creating a
    /// table when all are full. A player already seated keeps their seat.
    ///
    /// A rebalance is started in the background; its failure does not fail
    /// the seat.
    ///
    /// # Errors
    ///
    /// * `TableError::PlayerEliminated` - the player is already out
    /// * `TableError::Cache` / `TableError::Store` - nothing was changed
    pub async fn seat(
        &self,
        player_id: i64,
        tournament_id: i64,
        username: &str,
    ) -> TableResult<Seating> {
        let lock = tables_lock_key(tournament_id);
        let seating = with_lease(&self.cache, &lock, self.lock, || {
            self.seat_locked(player_id, tournament_id, username)
        })
        .await?;

        if seating.newly_seated {
            log::info!(
                "Seated player {} at table {} (tournament {})",
                player_id,
                seating.table_id,
                tournament_id
            );
            metrics::counter!("players_seated_total").increment(1);
            self.notify(TournamentEvent::PlayerSeated(PlayerSeatedPayload {
                tournament_id,
                player_id,
                table_id: seating.table_id,
            }))
            .await;

            let allocator = self.clone();
            tokio::spawn(async move { allocator.rebalance_logged(tournament_id).await });
        }

        Ok(seating)
    }

    async fn seat_locked(
        &self,
        player_id: i64,
        tournament_id: i64,
        username: &str,
    ) -> TableResult<Seating> {
        let existing = self.repo.find_player(player_id).await?;
        if let Some(player) = &existing
            && player.status == PlayerStatus::Eliminated
        {
            return Err(TableError::PlayerEliminated(player_id));
        }

        let tables = self.repo.find_all_by_tournament(tournament_id).await?;

        let current_table = existing
            .as_ref()
            .filter(|p| p.status == PlayerStatus::Seated)
            .and_then(|p| p.table_id)
            .filter(|id| tables.iter().any(|t| t.id == *id));
        if let Some(table_id) = current_table {
            return Ok(Seating {
                player_id,
                table_id,
                newly_seated: false,
            });
        }

        self.repo
            .upsert_player(player_id, tournament_id, username)
            .await?;

        let table_id = match least_loaded(&tables) {
            Some(table) => table.id,
            None => {
                let table = self.repo.create(tournament_id).await?;
                log::info!(
                    "All tables full, opened table {} for tournament {}",
                    table.id,
                    tournament_id
                );
                table.id
            }
        };

        self.repo.assign_player(player_id, table_id).await?;
        self.invalidate(tournament_id).await;

        Ok(Seating {
            player_id,
            table_id,
            newly_seated: true,
        })
    }

    /// Eliminate a player from their table and schedule a debounced rebalance.
    ///
    /// Returns `false` if the player was already eliminated.
    ///
    /// # Errors
    ///
    /// * `TableError::PlayerNotFound` - the player was never seated here
    /// * `TableError::InvalidTournament` - the player belongs elsewhere
    pub async fn unseat(&self, player_id: i64, tournament_id: i64) -> TableResult<bool> {
        let lock = tables_lock_key(tournament_id);
        let removed = with_lease(&self.cache, &lock, self.lock, || async {
            let player = self
                .repo
                .find_player(player_id)
                .await?
                .ok_or(TableError::PlayerNotFound(player_id))?;
            if player.tournament_id != tournament_id {
                return Err(TableError::InvalidTournament {
                    player_id,
                    tournament_id,
                });
            }
            if player.status == PlayerStatus::Eliminated {
                return Ok(false);
            }

            self.repo.remove_player(player_id).await?;
            self.invalidate(tournament_id).await;
            Ok(true)
        })
        .await?;

        if removed {
            log::info!(
                "Unseated player {} from tournament {}",
                player_id,
                tournament_id
            );
            self.schedule_rebalance(tournament_id).await;
        }
        Ok(removed)
    }

    /// Rebalance after the debounce delay. Calls made while one is already
    /// pending for the tournament are folded into it.
    pub async fn schedule_rebalance(&self, tournament_id: i64) {
        if !self.pending.lock().await.insert(tournament_id) {
            log::debug!(
                "Rebalance already pending for tournament {}",
                tournament_id
            );
            return;
        }

        let allocator = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(allocator.debounce).await;
            allocator.pending.lock().await.remove(&tournament_id);
            allocator.rebalance_logged(tournament_id).await;
        });
    }

    async fn rebalance_logged(&self, tournament_id: i64) {
        match self.rebalance(tournament_id).await {
            Ok(report) if report.passes > 0 => log::info!(
                "Rebalanced tournament {} in {} pass(es), balanced: {}",
                tournament_id,
                report.passes,
                report.balanced
            ),
            Ok(_) => {}
            Err(e) => log::warn!("Rebalance of tournament {} failed: {}", tournament_id, e),
        }
    }

    /// Run passes until one reports no change, at most
    /// [`MAX_REBALANCE_PASSES`] times.
    pub async fn rebalance(&self, tournament_id: i64) -> TableResult<RebalanceReport> {
        let mut passes = 0;
        while passes < MAX_REBALANCE_PASSES {
            if self.run_single_pass(tournament_id).await?.is_balanced() {
                metrics::histogram!("rebalance_passes").record(passes as f64);
                return Ok(RebalanceReport {
                    passes,
                    balanced: true,
                });
            }
            passes += 1;
        }

        log::warn!(
            "Rebalance of tournament {} stopped after {} passes",
            tournament_id,
            passes
        );
        metrics::histogram!("rebalance_passes").record(passes as f64);
        Ok(RebalanceReport {
            passes,
            balanced: false,
        })
    }

    /// One rebalance pass: at most one structural change.
    ///
    /// 1. One table or no players: balanced.
    /// 2. More tables than `ceil(players / 9)`: break the least-populated
    ///    table, moving each occupant to the then least-loaded table.
    /// 3. Largest and smallest table differ by more than one: move one player.
    /// 4. Otherwise balanced.
    pub async fn run_single_pass(&self, tournament_id: i64) -> TableResult<PassOutcome> {
        let lock = tables_lock_key(tournament_id);
        let outcome = with_lease(&self.cache, &lock, self.lock, || {
            self.pass_locked(tournament_id)
        })
        .await?;

        match &outcome {
            PassOutcome::Balanced => {}
            PassOutcome::Moved(m) => self.notify_move(tournament_id, m).await,
            PassOutcome::TableBroken { table_id, moves } => {
                for m in moves {
                    self.notify_move(tournament_id, m).await;
                }
                metrics::counter!("tables_broken_total").increment(1);
                self.notify(TournamentEvent::TableBroken(TableBrokenPayload {
                    tournament_id,
                    table_id: *table_id,
                }))
                .await;
            }
        }

        Ok(outcome)
    }

    async fn pass_locked(&self, tournament_id: i64) -> TableResult<PassOutcome> {
        let tables = self.repo.find_all_by_tournament(tournament_id).await?;
        let total: usize = tables.iter().map(Table::player_count).sum();
        if tables.len() <= 1 || total == 0 {
            return Ok(PassOutcome::Balanced);
        }

        if tables.len() > ideal_table_count(total) {
            // Newest table goes first among equally small ones
            let Some(victim) = tables
                .iter()
                .min_by_key(|t| (t.player_count(), Reverse(t.id)))
                .cloned()
            else {
                return Ok(PassOutcome::Balanced);
            };
            return self.break_table(tournament_id, victim).await;
        }

        let largest = tables
            .iter()
            .max_by_key(|t| (t.player_count(), Reverse(t.id)));
        let smallest = tables.iter().min_by_key(|t| (t.player_count(), t.id));
        let (Some(largest), Some(smallest)) = (largest, smallest) else {
            return Ok(PassOutcome::Balanced);
        };

        if largest.player_count() - smallest.player_count() <= 1 {
            return Ok(PassOutcome::Balanced);
        }
        let Some(player) = largest.seated_players.first() else {
            return Ok(PassOutcome::Balanced);
        };

        self.repo
            .assign_player(player.player_id, smallest.id)
            .await?;
        self.invalidate(tournament_id).await;

        log::info!(
            "Moved player {} from table {} ({}) to table {} ({})",
            player.player_id,
            largest.id,
            largest.player_count(),
            smallest.id,
            smallest.player_count()
        );
        Ok(PassOutcome::Moved(Move {
            player_id: player.player_id,
            from_table_id: largest.id,
            to_table_id: smallest.id,
        }))
    }

    /// Move every occupant off `victim`, then delete it.
    ///
    /// Occupants stay seated at the victim until their own move commits, so
    /// a failure part way leaves everyone on some table and the next pass
    /// carries on breaking it.
    async fn break_table(&self, tournament_id: i64, victim: Table) -> TableResult<PassOutcome> {
        let mut moves = Vec::with_capacity(victim.player_count());
        if let Err(e) = self.move_occupants(tournament_id, &victim, &mut moves).await {
            self.invalidate(tournament_id).await;
            log::warn!(
                "Breaking table {} of tournament {} stopped after {} move(s): {}",
                victim.id,
                tournament_id,
                moves.len(),
                e
            );
            return Err(e);
        }

        self.repo.delete_table(victim.id).await?;
        self.invalidate(tournament_id).await;

        log::info!(
            "Broke table {} of tournament {}, moved {} player(s)",
            victim.id,
            tournament_id,
            moves.len()
        );
        Ok(PassOutcome::TableBroken {
            table_id: victim.id,
            moves,
        })
    }

    async fn move_occupants(
        &self,
        tournament_id: i64,
        victim: &Table,
        moves: &mut Vec<Move>,
    ) -> TableResult<()> {
        for occupant in &victim.seated_players {
            // Re-read load before every move
            let remaining: Vec<Table> = self
                .repo
                .find_all_by_tournament(tournament_id)
                .await?
                .into_iter()
                .filter(|t| t.id != victim.id)
                .collect();

            let to_table_id = match least_loaded(&remaining) {
                Some(table) => table.id,
                None => self.repo.create(tournament_id).await?.id,
            };
            self.repo
                .assign_player(occupant.player_id, to_table_id)
                .await?;
            moves.push(Move {
                player_id: occupant.player_id,
                from_table_id: victim.id,
                to_table_id,
            });
        }
        Ok(())
    }

    /// Tables with occupants, read through the cache
    pub async fn list_tables(&self, tournament_id: i64) -> TableResult<Vec<Table>> {
        let key = tables_list_key(tournament_id);
        match self.cache.get(&key).await {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(tables) => return Ok(tables),
                Err(e) => log::warn!("Discarding corrupt table list for {}: {}", tournament_id, e),
            },
            Ok(None) => {}
            Err(e) => log::debug!("Table cache unavailable, reading store: {}", e),
        }

        let tables = self.repo.find_all_by_tournament(tournament_id).await?;
        match serde_json::to_string(&tables) {
            Ok(raw) => {
                if let Err(e) = self.cache.set(&key, raw, Some(self.cache_ttl)).await {
                    log::debug!("Could not cache table list for {}: {}", tournament_id, e);
                }
            }
            Err(e) => log::warn!("Could not encode table list for {}: {}", tournament_id, e),
        }
        Ok(tables)
    }

    /// Pre-create `count` empty tables
    pub async fn create_tables(&self, tournament_id: i64, count: usize) -> TableResult<Vec<Table>> {
        if count == 0 || count > MAX_TABLES_PER_REQUEST {
            return Err(TableError::InvalidCount(count));
        }

        let lock = tables_lock_key(tournament_id);
        let created = with_lease(&self.cache, &lock, self.lock, || async {
            let mut created = Vec::with_capacity(count);
            for _ in 0..count {
                created.push(self.repo.create(tournament_id).await?);
            }
            self.invalidate(tournament_id).await;
            Ok::<_, TableError>(created)
        })
        .await?;

        log::info!(
            "Created {} table(s) for tournament {}",
            created.len(),
            tournament_id
        );
        Ok(created)
    }

    async fn invalidate(&self, tournament_id: i64) {
        if let Err(e) = self.cache.del(&tables_list_key(tournament_id)).await {
            log::warn!(
                "Could not invalidate table list for {}: {}",
                tournament_id,
                e
            );
        }
    }

    async fn notify_move(&self, tournament_id: i64, m: &Move) {
        metrics::counter!("players_moved_total").increment(1);
        self.notify(TournamentEvent::PlayerMoved(PlayerMovedPayload {
            tournament_id,
            player_id: m.player_id,
            old_table_id: m.from_table_id,
            new_table_id: m.to_table_id,
        }))
        .await;
    }

    /// Publish after commit. Failure is logged and not rolled back.
    async fn notify(&self, event: TournamentEvent) {
        let event_type = event.event_type();
        if let Err(e) = self.bus.emit(event).await {
            log::error!("Failed to publish {} after commit: {}", event_type, e);
        }
    }
}
