//! Player registry: status tracking and winner detection.

use super::errors::{PlayerError, PlayerResult};
use super::models::{EliminationOutcome, Player, PlayerStatus};
use crate::cache::{LockOptions, SharedCache, players_lock_key, with_lease};
use crate::db::PlayerRepository;
use crate::events::{
    EventBus, TablesAddPayload, TablesEliminatePayload, TournamentEvent, TournamentWinnerPayload,
};
use std::sync::Arc;

/// Player registry
#[derive(Clone)]
pub struct PlayerRegistry {
    repo: Arc<dyn PlayerRepository>,
    cache: Arc<dyn SharedCache>,
    bus: Arc<dyn EventBus>,
    lock: LockOptions,
}

impl PlayerRegistry {
    /// Create a new player registry
    pub fn new(
        repo: Arc<dyn PlayerRepository>,
        cache: Arc<dyn SharedCache>,
        bus: Arc<dyn EventBus>,
    ) -> Self {
        Self {
            repo,
            cache,
            bus,
            lock: LockOptions::operation(),
        }
    }

    pub fn with_lock_options(mut self, lock: LockOptions) -> Self {
        self.lock = lock;
        self
    }

    /// Register `username` and request a seat.
    ///
    /// A repeated registration returns the existing player and repeats the
    /// seat request, which table allocation treats as a no-op.
    pub async fn register(&self, tournament_id: i64, username: &str) -> PlayerResult<Player> {
        let username = username.trim();
        if username.is_empty() {
            return Err(PlayerError::InvalidUsername);
        }

        let player = match self.repo.find_by_username(tournament_id, username).await? {
            Some(existing) => {
                log::debug!(
                    "Player {} already registered in tournament {}",
                    username,
                    tournament_id
                );
                existing
            }
            None => {
                let player = self.repo.create(tournament_id, username).await?;
                log::info!(
                    "Registered player {} ({}) in tournament {}",
                    player.id,
                    username,
                    tournament_id
                );
                player
            }
        };

        if player.status.is_active() {
            self.notify(TournamentEvent::TablesAdd(TablesAddPayload {
                tournament_id,
                player_id: player.id,
                username: player.username.clone(),
            }))
            .await;
        }
        Ok(player)
    }

    /// Eliminate a player and declare the winner if exactly one remains.
    ///
    /// Eliminations of one tournament are serialized under
    /// `players:lock:{tournamentId}`, so two concurrent eliminations can
    /// never both see a single survivor. Eliminating an already eliminated
    /// player emits nothing new, except a winner declaration that an earlier
    /// attempt failed to finish.
    ///
    /// # Errors
    ///
    /// * `PlayerError::NotFound` - no such player
    /// * `PlayerError::InvalidTournament` - player belongs to another tournament
    pub async fn eliminate(
        &self,
        tournament_id: i64,
        player_id: i64,
    ) -> PlayerResult<EliminationOutcome> {
        let lock = players_lock_key(tournament_id);
        with_lease(&self.cache, &lock, self.lock, || async {
            let mut player = self
                .repo
                .find_by_id(player_id)
                .await?
                .ok_or(PlayerError::NotFound(player_id))?;
            if player.tournament_id != tournament_id {
                return Err(PlayerError::InvalidTournament {
                    player_id,
                    tournament_id,
                });
            }

            let newly_eliminated = if player.status == PlayerStatus::Eliminated {
                false
            } else {
                player.eliminate();
                self.repo.save(&player).await?
            };
            if newly_eliminated {
                metrics::counter!("players_eliminated_total").increment(1);
                log::info!(
                    "Eliminated player {} ({}) from tournament {}",
                    player_id,
                    player.username,
                    tournament_id
                );
                self.notify(TournamentEvent::TablesEliminate(TablesEliminatePayload {
                    tournament_id,
                    player_id,
                }))
                .await;
            } else {
                log::debug!("Player {} already eliminated", player_id);
            }

            let remaining = self.repo.count_active(tournament_id).await?;
            let winner = if remaining == 1 {
                self.declare_winner(tournament_id).await?
            } else {
                None
            };

            if newly_eliminated {
                Ok(EliminationOutcome::Eliminated { remaining, winner })
            } else {
                Ok(EliminationOutcome::AlreadyEliminated { winner })
            }
        })
        .await
    }

    /// Emit the winner once. The durable marker is written only after the
    /// event is on the bus, so a failed emit is retried by the next
    /// elimination delivery.
    async fn declare_winner(&self, tournament_id: i64) -> PlayerResult<Option<Player>> {
        if let Some(winner_id) = self.repo.find_winner(tournament_id).await? {
            log::debug!(
                "Tournament {} already has winner {}",
                tournament_id,
                winner_id
            );
            return Ok(None);
        }
        let Some(winner) = self.repo.find_last_active(tournament_id).await? else {
            log::warn!(
                "One active player counted in tournament {} but none found",
                tournament_id
            );
            return Ok(None);
        };

        self.bus
            .emit(TournamentEvent::TournamentWinner(TournamentWinnerPayload {
                tournament_id,
                winner_id: winner.id,
                username: winner.username.clone(),
            }))
            .await?;
        if !self.repo.record_winner(tournament_id, winner.id).await? {
            log::warn!("Winner of tournament {} was recorded concurrently", tournament_id);
        }

        log::info!(
            "Player {} ({}) wins tournament {}",
            winner.id,
            winner.username,
            tournament_id
        );
        metrics::counter!("tournament_winners_total").increment(1);
        Ok(Some(winner))
    }

    /// Track the table a player was seated or moved to.
    ///
    /// Runs under the same lease as eliminations, and ELIMINATED players are
    /// never brought back.
    pub async fn record_seating(
        &self,
        tournament_id: i64,
        player_id: i64,
        table_id: i64,
    ) -> PlayerResult<()> {
        let lock = players_lock_key(tournament_id);
        with_lease(&self.cache, &lock, self.lock, || async {
            let Some(mut player) = self.repo.find_by_id(player_id).await? else {
                log::debug!("Seating for unknown player {}", player_id);
                return Ok(());
            };
            if player.tournament_id != tournament_id {
                log::warn!(
                    "Seating of player {} reported for foreign tournament {}",
                    player_id,
                    tournament_id
                );
                return Ok(());
            }
            if player.status == PlayerStatus::Eliminated || player.table_id == Some(table_id) {
                return Ok(());
            }

            player.status = PlayerStatus::Seated;
            player.table_id = Some(table_id);
            if !self.repo.save(&player).await? {
                log::debug!("Ignored seating of eliminated player {}", player_id);
            }
            Ok(())
        })
        .await
    }

    pub async fn get_player(&self, player_id: i64) -> PlayerResult<Player> {
        self.repo
            .find_by_id(player_id)
            .await?
            .ok_or(PlayerError::NotFound(player_id))
    }

    pub async fn list_players(&self, tournament_id: i64) -> PlayerResult<Vec<Player>> {
        Ok(self.repo.list_by_tournament(tournament_id).await?)
    }

    /// Publish after commit. Failure is logged and not rolled back.
    async fn notify(&self, event: TournamentEvent) {
        let event_type = event.event_type();
        if let Err(e) = self.bus.emit(event).await {
            log::error!("Failed to publish {} after commit: {}", event_type, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::db::{MemoryPlayerRepository, StoreError, StoreResult};
    use crate::events::MemoryBus;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;
    use tokio::sync::Notify;

    fn registry() -> (PlayerRegistry, MemoryBus) {
        registry_over(Arc::new(MemoryPlayerRepository::new()))
    }

    fn registry_over(repo: Arc<dyn PlayerRepository>) -> (PlayerRegistry, MemoryBus) {
        let bus = MemoryBus::new();
        let registry = PlayerRegistry::new(repo, Arc::new(MemoryCache::new()), Arc::new(bus.clone()));
        (registry, bus)
    }

    /// Player store that can hold SEATED writes back and fail one count
    #[derive(Default)]
    struct ScriptedRepository {
        inner: MemoryPlayerRepository,
        seated_save_started: Option<Arc<Notify>>,
        fail_next_count: AtomicBool,
    }

    #[async_trait]
    impl PlayerRepository for ScriptedRepository {
        async fn create(&self, tournament_id: i64, username: &str) -> StoreResult<Player> {
            self.inner.create(tournament_id, username).await
        }

        async fn find_by_id(&self, player_id: i64) -> StoreResult<Option<Player>> {
            self.inner.find_by_id(player_id).await
        }

        async fn find_by_username(
            &self,
            tournament_id: i64,
            username: &str,
        ) -> StoreResult<Option<Player>> {
            self.inner.find_by_username(tournament_id, username).await
        }

        async fn save(&self, player: &Player) -> StoreResult<bool> {
            if let (Some(started), PlayerStatus::Seated) = (&self.seated_save_started, player.status) {
                started.notify_one();
                tokio::time::sleep(Duration::from_millis(150)).await;
            }
            self.inner.save(player).await
        }

        async fn count_active(&self, tournament_id: i64) -> StoreResult<i64> {
            if self.fail_next_count.swap(false, Ordering::SeqCst) {
                return Err(StoreError::Corrupt("connection reset".to_string()));
            }
            self.inner.count_active(tournament_id).await
        }

        async fn find_last_active(&self, tournament_id: i64) -> StoreResult<Option<Player>> {
            self.inner.find_last_active(tournament_id).await
        }

        async fn list_by_tournament(&self, tournament_id: i64) -> StoreResult<Vec<Player>> {
            self.inner.list_by_tournament(tournament_id).await
        }

        async fn find_winner(&self, tournament_id: i64) -> StoreResult<Option<i64>> {
            self.inner.find_winner(tournament_id).await
        }

        async fn record_winner(&self, tournament_id: i64, winner_id: i64) -> StoreResult<bool> {
            self.inner.record_winner(tournament_id, winner_id).await
        }
    }

    #[tokio::test]
    async fn test_register_is_idempotent() {
        let (registry, bus) = registry();
        let first = registry.register(1, "alice").await.unwrap();
        let again = registry.register(1, " alice ").await.unwrap();
        assert_eq!(first.id, again.id);
        assert_eq!(registry.list_players(1).await.unwrap().len(), 1);
        assert_eq!(bus.published_of_type("event_tables_add").await.len(), 2);
    }

    #[tokio::test]
    async fn test_register_rejects_blank_username() {
        let (registry, _) = registry();
        assert!(matches!(
            registry.register(1, "  ").await,
            Err(PlayerError::InvalidUsername)
        ));
    }

    #[tokio::test]
    async fn test_eliminate_wrong_tournament() {
        let (registry, bus) = registry();
        let player = registry.register(1, "alice").await.unwrap();

        let err = registry.eliminate(2, player.id).await.unwrap_err();
        assert_eq!(err.code(), "INVALID_TOURNAMENT");
        assert!(bus.published_of_type("event_tables_eliminate").await.is_empty());
        assert_eq!(
            registry.get_player(player.id).await.unwrap().status,
            PlayerStatus::Registered
        );
    }

    #[tokio::test]
    async fn test_eliminate_unknown_player() {
        let (registry, _) = registry();
        assert!(matches!(
            registry.eliminate(1, 42).await,
            Err(PlayerError::NotFound(42))
        ));
    }

    #[tokio::test]
    async fn test_last_player_standing_wins() {
        let (registry, bus) = registry();
        let a = registry.register(1, "a").await.unwrap();
        let b = registry.register(1, "b").await.unwrap();
        let c = registry.register(1, "c").await.unwrap();

        assert_eq!(
            registry.eliminate(1, a.id).await.unwrap(),
            EliminationOutcome::Eliminated {
                remaining: 2,
                winner: None
            }
        );

        let EliminationOutcome::Eliminated { remaining, winner } =
            registry.eliminate(1, c.id).await.unwrap()
        else {
            panic!("expected elimination");
        };
        assert_eq!(remaining, 1);
        assert_eq!(winner.map(|w| w.id), Some(b.id));

        let winners = bus.published_of_type("tournament_winner").await;
        assert_eq!(winners.len(), 1);
        assert_eq!(winners[0].payload["winnerId"], b.id);
        assert_eq!(winners[0].payload["username"], "b");
    }

    #[tokio::test]
    async fn test_concurrent_eliminations_declare_one_winner() {
        let (registry, bus) = registry();
        let a = registry.register(1, "a").await.unwrap();
        let b = registry.register(1, "b").await.unwrap();
        registry.register(1, "c").await.unwrap();

        let (left, right) = tokio::join!(registry.eliminate(1, a.id), registry.eliminate(1, b.id));
        left.unwrap();
        right.unwrap();

        assert_eq!(bus.published_of_type("tournament_winner").await.len(), 1);
    }

    #[tokio::test]
    async fn test_record_seating_never_revives() {
        let (registry, _) = registry();
        let a = registry.register(1, "a").await.unwrap();
        registry.register(1, "b").await.unwrap();

        registry.record_seating(1, a.id, 7).await.unwrap();
        let seated = registry.get_player(a.id).await.unwrap();
        assert_eq!(seated.status, PlayerStatus::Seated);
        assert_eq!(seated.table_id, Some(7));

        registry.eliminate(1, a.id).await.unwrap();
        registry.record_seating(1, a.id, 8).await.unwrap();
        let out = registry.get_player(a.id).await.unwrap();
        assert_eq!(out.status, PlayerStatus::Eliminated);
        assert_eq!(out.table_id, None);
    }

    #[tokio::test]
    async fn test_slow_seating_does_not_undo_elimination() {
        let started = Arc::new(Notify::new());
        let (registry, _) = registry_over(Arc::new(ScriptedRepository {
            seated_save_started: Some(started.clone()),
            ..Default::default()
        }));
        let a = registry.register(1, "a").await.unwrap();
        registry.register(1, "b").await.unwrap();
        registry.register(1, "c").await.unwrap();

        let seating = tokio::spawn({
            let registry = registry.clone();
            async move { registry.record_seating(1, a.id, 7).await }
        });
        started.notified().await;

        registry.eliminate(1, a.id).await.unwrap();
        seating.await.unwrap().unwrap();

        let out = registry.get_player(a.id).await.unwrap();
        assert_eq!(out.status, PlayerStatus::Eliminated);
        assert_eq!(out.table_id, None);
    }

    #[tokio::test]
    async fn test_redelivered_elimination_finishes_winner_declaration() {
        let repo = Arc::new(ScriptedRepository::default());
        let (registry, bus) = registry_over(repo.clone());
        let a = registry.register(1, "a").await.unwrap();
        let b = registry.register(1, "b").await.unwrap();

        repo.fail_next_count.store(true, Ordering::SeqCst);
        assert!(registry.eliminate(1, a.id).await.is_err());
        assert_eq!(
            registry.get_player(a.id).await.unwrap().status,
            PlayerStatus::Eliminated
        );
        assert!(bus.published_of_type("tournament_winner").await.is_empty());

        let EliminationOutcome::AlreadyEliminated { winner } =
            registry.eliminate(1, a.id).await.unwrap()
        else {
            panic!("expected the player to be out already");
        };
        assert_eq!(winner.map(|w| w.id), Some(b.id));
        assert_eq!(bus.published_of_type("tournament_winner").await.len(), 1);

        // Later deliveries find the marker and stay quiet
        assert_eq!(
            registry.eliminate(1, a.id).await.unwrap(),
            EliminationOutcome::AlreadyEliminated { winner: None }
        );
        assert_eq!(bus.published_of_type("tournament_winner").await.len(), 1);
        assert_eq!(bus.published_of_type("event_tables_eliminate").await.len(), 1);
    }
}
