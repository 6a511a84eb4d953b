//! End-to-end tests for the registration and elimination saga
//!
//! All four services share one in-memory bus and cache. Events are pumped
//! through the handlers by hand so every step is deterministic; one test
//! runs the real background consumers instead.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tournament_director::cache::MemoryCache;
use tournament_director::clock::ManualClock;
use tournament_director::db::{
    MemoryPlayerRepository, MemoryTableRepository, MemoryTimerRepository,
    MemoryTournamentRepository,
};
use tournament_director::events::{
    EventBus, EventHandler, MemoryBus, Topic, dispatch, spawn_consumer,
};
use tournament_director::player::{PlayerEventHandler, PlayerRegistry, PlayerStatus};
use tournament_director::table::{TableAllocator, TableEventHandler};
use tournament_director::timer::{TimerEngine, TimerEventHandler, TimerStatus};
use tournament_director::tournament::{
    TournamentEventHandler, TournamentManager, TournamentStatus,
};

struct Director {
    bus: MemoryBus,
    tournaments: TournamentManager,
    players: PlayerRegistry,
    tables: TableAllocator,
    timers: TimerEngine,
    handlers: Vec<Arc<dyn EventHandler>>,
    cursors: HashMap<(&'static str, Topic), usize>,
}

impl Director {
    fn new() -> Self {
        let bus = MemoryBus::new();
        let cache = Arc::new(MemoryCache::new());
        let shared_bus: Arc<dyn EventBus> = Arc::new(bus.clone());

        let tournaments = TournamentManager::new(
            Arc::new(MemoryTournamentRepository::new()),
            shared_bus.clone(),
        );
        let players = PlayerRegistry::new(
            Arc::new(MemoryPlayerRepository::new()),
            cache.clone(),
            shared_bus.clone(),
        );
        let tables = TableAllocator::new(
            Arc::new(MemoryTableRepository::new()),
            cache.clone(),
            shared_bus,
        )
        .with_rebalance_debounce(Duration::from_millis(1));
        let timers = TimerEngine::new(
            cache,
            Arc::new(MemoryTimerRepository::new()),
            Arc::new(ManualClock::new(1_700_000_000_000)),
        );

        let handlers: Vec<Arc<dyn EventHandler>> = vec![
            Arc::new(TournamentEventHandler::new(tournaments.clone())),
            Arc::new(PlayerEventHandler::new(players.clone())),
            Arc::new(TableEventHandler::new(tables.clone())),
            Arc::new(TimerEventHandler::new(timers.clone())),
        ];

        Self {
            bus,
            tournaments,
            players,
            tables,
            timers,
            handlers,
            cursors: HashMap::new(),
        }
    }

    /// Deliver every unseen envelope to every interested group until the
    /// log stops growing.
    async fn pump(&mut self) {
        loop {
            let mut delivered = false;
            for handler in &self.handlers {
                for &topic in handler.topics() {
                    let log = self.bus.published(topic).await;
                    let cursor = self.cursors.entry((handler.group(), topic)).or_insert(0);
                    while *cursor < log.len() {
                        dispatch(handler.as_ref(), &log[*cursor]).await;
                        *cursor += 1;
                        delivered = true;
                    }
                }
            }
            if !delivered {
                break;
            }
        }
    }

    async fn player_id(&self, tournament_id: i64, username: &str) -> i64 {
        self.players
            .list_players(tournament_id)
            .await
            .unwrap()
            .into_iter()
            .find(|p| p.username == username)
            .map(|p| p.id)
            .unwrap()
    }
}

#[tokio::test]
async fn test_registration_seats_players() {
    let mut d = Director::new();
    let t = d.tournaments.create_tournament("Main", None).await.unwrap();
    for name in ["alice", "bob", "carol"] {
        d.tournaments.register_player(t.id, name).await.unwrap();
    }
    d.pump().await;

    let players = d.players.list_players(t.id).await.unwrap();
    assert_eq!(players.len(), 3);
    assert!(players.iter().all(|p| p.status == PlayerStatus::Seated));

    let tables = d.tables.list_tables(t.id).await.unwrap();
    assert_eq!(tables.len(), 1);
    assert_eq!(tables[0].player_count(), 3);
    assert!(players.iter().all(|p| p.table_id == Some(tables[0].id)));
}

#[tokio::test]
async fn test_duplicate_registration_is_idempotent() {
    let mut d = Director::new();
    let t = d.tournaments.create_tournament("Main", None).await.unwrap();
    d.tournaments.register_player(t.id, "alice").await.unwrap();
    d.tournaments.register_player(t.id, "alice").await.unwrap();
    d.pump().await;

    assert_eq!(d.players.list_players(t.id).await.unwrap().len(), 1);
    assert_eq!(d.bus.published_of_type("player_seated").await.len(), 1);
}

#[tokio::test]
async fn test_start_drives_timer() {
    let mut d = Director::new();
    let t = d
        .tournaments
        .create_tournament("Main", Some(60_000))
        .await
        .unwrap();
    d.tournaments.start_tournament(t.id).await.unwrap();
    d.pump().await;

    let timer = d.timers.get_timer(t.id).await.unwrap().unwrap();
    assert_eq!(timer.status, TimerStatus::Running);
    assert_eq!(timer.remaining_ms, 60_000);

    d.tournaments.advance_blind_level(t.id).await.unwrap();
    d.pump().await;
    let restarted = d.timers.get_timer(t.id).await.unwrap().unwrap();
    assert_eq!(restarted.version, timer.version + 1);
}

#[tokio::test]
async fn test_elimination_declares_single_winner() {
    let mut d = Director::new();
    let t = d.tournaments.create_tournament("Main", None).await.unwrap();
    for name in ["alice", "bob", "carol"] {
        d.tournaments.register_player(t.id, name).await.unwrap();
    }
    d.tournaments.start_tournament(t.id).await.unwrap();
    d.pump().await;

    let alice = d.player_id(t.id, "alice").await;
    let bob = d.player_id(t.id, "bob").await;
    let carol = d.player_id(t.id, "carol").await;

    d.tournaments.eliminate_player(t.id, alice).await.unwrap();
    d.pump().await;
    assert!(d.bus.published_of_type("tournament_winner").await.is_empty());

    d.tournaments.eliminate_player(t.id, bob).await.unwrap();
    d.pump().await;

    let winners = d.bus.published_of_type("tournament_winner").await;
    assert_eq!(winners.len(), 1);
    assert_eq!(winners[0].payload["winnerId"], carol);
    assert_eq!(winners[0].payload["username"], "carol");

    let tournament = d.tournaments.get_tournament(t.id).await.unwrap();
    assert_eq!(tournament.status, TournamentStatus::Finished);
    let timer = d.timers.get_timer(t.id).await.unwrap().unwrap();
    assert_eq!(timer.status, TimerStatus::Finished);

    let tables = d.tables.list_tables(t.id).await.unwrap();
    let seated: usize = tables.iter().map(|t| t.player_count()).sum();
    assert_eq!(seated, 1);
}

#[tokio::test]
async fn test_replayed_elimination_does_not_repeat_winner() {
    let mut d = Director::new();
    let t = d.tournaments.create_tournament("Main", None).await.unwrap();
    for name in ["alice", "bob"] {
        d.tournaments.register_player(t.id, name).await.unwrap();
    }
    d.tournaments.start_tournament(t.id).await.unwrap();
    d.pump().await;

    let alice = d.player_id(t.id, "alice").await;
    d.tournaments.eliminate_player(t.id, alice).await.unwrap();
    d.pump().await;

    // Redeliver every elimination request to the player registry
    let players = d.handlers[1].clone();
    for envelope in d.bus.published_of_type("event_player_eliminate").await {
        assert!(dispatch(players.as_ref(), &envelope).await);
    }
    d.pump().await;

    assert_eq!(d.bus.published_of_type("tournament_winner").await.len(), 1);
    assert_eq!(
        d.bus.published_of_type("event_tables_eliminate").await.len(),
        1
    );
}

#[tokio::test]
async fn test_concurrent_eliminations_pick_one_winner() {
    let mut d = Director::new();
    let t = d.tournaments.create_tournament("Main", None).await.unwrap();
    for name in ["alice", "bob", "carol"] {
        d.tournaments.register_player(t.id, name).await.unwrap();
    }
    d.tournaments.start_tournament(t.id).await.unwrap();
    d.pump().await;

    let alice = d.player_id(t.id, "alice").await;
    let bob = d.player_id(t.id, "bob").await;
    let (a, b) = tokio::join!(
        d.players.eliminate(t.id, alice),
        d.players.eliminate(t.id, bob)
    );
    a.unwrap();
    b.unwrap();
    d.pump().await;

    assert_eq!(d.bus.published_of_type("tournament_winner").await.len(), 1);
}

#[tokio::test]
async fn test_background_consumers_finish_tournament() {
    let d = Director::new();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let bus: Arc<dyn EventBus> = Arc::new(d.bus.clone());

    let mut handles = Vec::new();
    for handler in &d.handlers {
        handles.extend(
            spawn_consumer(bus.clone(), handler.clone(), shutdown_rx.clone())
                .await
                .unwrap(),
        );
    }

    let t = d.tournaments.create_tournament("Main", None).await.unwrap();
    for name in ["alice", "bob"] {
        d.tournaments.register_player(t.id, name).await.unwrap();
    }
    d.tournaments.start_tournament(t.id).await.unwrap();

    let registered = async {
        loop {
            if d.players.list_players(t.id).await.unwrap().len() == 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    };
    tokio::time::timeout(Duration::from_secs(5), registered)
        .await
        .unwrap();

    let alice = d.player_id(t.id, "alice").await;
    d.tournaments.eliminate_player(t.id, alice).await.unwrap();

    let finished = async {
        loop {
            let tournament = d.tournaments.get_tournament(t.id).await.unwrap();
            if tournament.status == TournamentStatus::Finished {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    };
    tokio::time::timeout(Duration::from_secs(5), finished)
        .await
        .unwrap();

    shutdown_tx.send(true).unwrap();
    for handle in handles {
        handle.await.unwrap();
    }
}
