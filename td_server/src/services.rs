//! Wiring of the four services onto shared infrastructure.
//!
//! Every service gets its own repository but they share one cache and one
//! bus, exactly as separate processes would. Nothing calls across services
//! directly.

use crate::api::AppState;
use crate::config::ServerConfig;
use crate::logging::log_performance;
use crate::metrics as server_metrics;
use anyhow::Context;
use std::sync::Arc;
use std::time::Instant;
use tokio::{sync::watch, task::JoinHandle};
use tournament_director::{
    cache::{MemoryCache, SharedCache},
    clock::{Clock, SystemClock},
    db::{
        Database, MemoryPlayerRepository, MemoryTableRepository, MemoryTimerRepository,
        MemoryTournamentRepository, PgPlayerRepository, PgTableRepository, PgTimerRepository,
        PgTournamentRepository, PlayerRepository, TableRepository, TimerRepository,
        TournamentRepository,
    },
    events::{EventBus, EventHandler, MemoryBus, spawn_consumer},
    player::{PlayerEventHandler, PlayerRegistry},
    table::{TableAllocator, TableEventHandler},
    timer::{Ticker, TimerEngine, TimerEventHandler},
    tournament::{TournamentEventHandler, TournamentManager},
};

/// Durable store of each service
struct Repositories {
    timers: Arc<dyn TimerRepository>,
    tables: Arc<dyn TableRepository>,
    players: Arc<dyn PlayerRepository>,
    tournaments: Arc<dyn TournamentRepository>,
}

impl Repositories {
    fn memory() -> Self {
        Self {
            timers: Arc::new(MemoryTimerRepository::new()),
            tables: Arc::new(MemoryTableRepository::new()),
            players: Arc::new(MemoryPlayerRepository::new()),
            tournaments: Arc::new(MemoryTournamentRepository::new()),
        }
    }

    fn postgres(database: &Database) -> Self {
        let pool = database.pool().clone();
        Self {
            timers: Arc::new(PgTimerRepository::new(pool.clone())),
            tables: Arc::new(PgTableRepository::new(pool.clone())),
            players: Arc::new(PgPlayerRepository::new(pool.clone())),
            tournaments: Arc::new(PgTournamentRepository::new(pool)),
        }
    }
}

/// All services of one process
#[derive(Clone)]
pub struct Services {
    pub cache: Arc<dyn SharedCache>,
    pub bus: Arc<dyn EventBus>,
    pub database: Option<Database>,
    pub tournaments: TournamentManager,
    pub players: PlayerRegistry,
    pub tables: TableAllocator,
    pub timers: TimerEngine,
    config: ServerConfig,
}

impl Services {
    /// Services backed entirely by in-memory infrastructure
    pub fn in_memory(config: &ServerConfig) -> Self {
        Self::assemble(
            config,
            Arc::new(MemoryCache::new()),
            Arc::new(MemoryBus::with_retention(config.bus_retention)),
            Arc::new(SystemClock),
            Repositories::memory(),
            None,
        )
    }

    /// In-memory repositories over the given cache, bus and clock
    pub fn with_infrastructure(
        config: &ServerConfig,
        cache: Arc<dyn SharedCache>,
        bus: Arc<dyn EventBus>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self::assemble(config, cache, bus, clock, Repositories::memory(), None)
    }

    /// Connect the configured store (if any), run migrations and build the
    /// services
    ///
    /// # Errors
    ///
    /// Returns error if the database cannot be reached or migrated
    pub async fn connect(config: &ServerConfig) -> anyhow::Result<Self> {
        let Some(db_config) = &config.database else {
            log::info!("No DATABASE_URL configured, keeping snapshots in memory");
            return Ok(Self::in_memory(config));
        };

        let database = Database::new(db_config)
            .await
            .context("Failed to connect to database")?;
        database
            .migrate()
            .await
            .context("Failed to run database migrations")?;
        log::info!("Database connected and migrated");

        let repositories = Repositories::postgres(&database);
        Ok(Self::assemble(
            config,
            Arc::new(MemoryCache::new()),
            Arc::new(MemoryBus::with_retention(config.bus_retention)),
            Arc::new(SystemClock),
            repositories,
            Some(database),
        ))
    }

    fn assemble(
        config: &ServerConfig,
        cache: Arc<dyn SharedCache>,
        bus: Arc<dyn EventBus>,
        clock: Arc<dyn Clock>,
        repositories: Repositories,
        database: Option<Database>,
    ) -> Self {
        let operation_lock = config.operation_lock();

        let tournaments = TournamentManager::new(repositories.tournaments, bus.clone());
        let players = PlayerRegistry::new(repositories.players, cache.clone(), bus.clone())
            .with_lock_options(operation_lock);
        let tables = TableAllocator::new(repositories.tables, cache.clone(), bus.clone())
            .with_lock_options(operation_lock)
            .with_rebalance_debounce(config.tables.rebalance_debounce)
            .with_cache_ttl(config.tables.cache_ttl);
        let timers = TimerEngine::new(cache.clone(), repositories.timers, clock)
            .with_lock_options(config.tick_lock(), operation_lock);

        Self {
            cache,
            bus,
            database,
            tournaments,
            players,
            tables,
            timers,
            config: config.clone(),
        }
    }

    /// State handed to the HTTP handlers
    pub fn app_state(&self) -> AppState {
        AppState {
            tournaments: self.tournaments.clone(),
            players: self.players.clone(),
            tables: self.tables.clone(),
            timers: self.timers.clone(),
            cache: self.cache.clone(),
            database: self.database.clone(),
        }
    }

    fn handlers(&self) -> Vec<Arc<dyn EventHandler>> {
        vec![
            Arc::new(TournamentEventHandler::new(self.tournaments.clone())),
            Arc::new(PlayerEventHandler::new(self.players.clone())),
            Arc::new(TableEventHandler::new(self.tables.clone())),
            Arc::new(TimerEventHandler::new(self.timers.clone())),
        ]
    }

    /// Start the event consumers and the tick sweep.
    ///
    /// Unfinished timers are recovered from the store first, so the sweep
    /// never sees a timer the store knows about but the cache does not.
    ///
    /// # Errors
    ///
    /// Returns error if a consumer cannot subscribe
    pub async fn spawn_background(
        &self,
        shutdown: watch::Receiver<bool>,
    ) -> anyhow::Result<Vec<JoinHandle<()>>> {
        let started = Instant::now();
        match self.timers.recover_unfinished().await {
            Ok(count) => {
                server_metrics::timers_recovered(count);
                log_performance(
                    "timer_recovery",
                    started.elapsed().as_millis() as u64,
                    Some(&format!("{count} timer(s)")),
                );
            }
            // The sweep rehydrates lazily from snapshots, so carry on
            Err(e) => log::error!("Timer recovery sweep failed: {}", e),
        }

        let mut handles = Vec::new();
        for handler in self.handlers() {
            let group = handler.group();
            let spawned = spawn_consumer(self.bus.clone(), handler, shutdown.clone())
                .await
                .with_context(|| format!("Failed to start consumer {group}"))?;
            handles.extend(spawned);
        }

        let ticker = Ticker::new(self.timers.clone(), self.config.timer.tick_interval);
        handles.push(tokio::spawn(ticker.run(shutdown)));

        server_metrics::background_tasks(handles.len());
        log::info!("Started {} background task(s)", handles.len());
        Ok(handles)
    }
}
