//! Authoritative per-tournament countdown.
//!
//! The cache entry `timer:{id}` is the hot source of truth and is only
//! written by the holder of `timer:lock:{id}`. The durable snapshot trails it
//! and is read back only during recovery.

use super::broadcast::{TimerBroadcaster, TimerUpdate};
use super::errors::{TimerError, TimerResult};
use super::models::{TimerState, TimerStatus};
use crate::cache::{
    ACTIVE_TIMERS_KEY, CacheError, LockOptions, SharedCache, timer_closed_key, timer_key,
    timer_lock_key, with_lease,
};
use crate::clock::Clock;
use crate::db::TimerRepository;
use futures_util::future::join_all;
use std::sync::Arc;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Result of one tick for one timer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Still counting; an update was published, nothing was written
    Running { remaining_ms: i64 },
    /// Reached zero on this tick
    Finished,
    /// Paused, already finished, missing, or locked by another ticker
    Skipped,
}

/// Timer engine
#[derive(Clone)]
pub struct TimerEngine {
    cache: Arc<dyn SharedCache>,
    store: Arc<dyn TimerRepository>,
    clock: Arc<dyn Clock>,
    updates: TimerBroadcaster,
    tick_lock: LockOptions,
    operation_lock: LockOptions,
}

impl TimerEngine {
    /// Create a new timer engine
    pub fn new(
        cache: Arc<dyn SharedCache>,
        store: Arc<dyn TimerRepository>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            cache,
            store,
            clock,
            updates: TimerBroadcaster::default(),
            tick_lock: LockOptions::tick(),
            operation_lock: LockOptions::operation(),
        }
    }

    /// Override the lease settings for ticks and for user operations
    pub fn with_lock_options(mut self, tick: LockOptions, operation: LockOptions) -> Self {
        self.tick_lock = tick;
        self.operation_lock = operation;
        self
    }

    pub fn updates(&self) -> &TimerBroadcaster {
        &self.updates
    }

    /// Subscribe to the realtime update stream
    pub fn subscribe(&self) -> broadcast::Receiver<TimerUpdate> {
        self.updates.subscribe()
    }

    /// (Re)start a countdown from `duration_ms`. Always a full reset.
    ///
    /// # Errors
    ///
    /// * `TimerError::InvalidDuration` - `duration_ms` is not positive
    /// * `TimerError::Closed` - the tournament already has a winner
    /// * `TimerError::Cache` - lock or cache unavailable; nothing was written
    pub async fn start(&self, tournament_id: i64, duration_ms: i64) -> TimerResult<TimerState> {
        self.start_with_origin(tournament_id, duration_ms, None)
            .await
    }

    /// Start driven by a bus event. A redelivery of the event that produced
    /// the current countdown is recognised and left alone.
    pub async fn start_from_event(
        &self,
        event_id: Uuid,
        tournament_id: i64,
        duration_ms: i64,
    ) -> TimerResult<TimerState> {
        self.start_with_origin(tournament_id, duration_ms, Some(event_id))
            .await
    }

    async fn start_with_origin(
        &self,
        tournament_id: i64,
        duration_ms: i64,
        origin: Option<Uuid>,
    ) -> TimerResult<TimerState> {
        if duration_ms <= 0 {
            return Err(TimerError::InvalidDuration(duration_ms));
        }

        let lock = timer_lock_key(tournament_id);
        with_lease(&self.cache, &lock, self.operation_lock, || async {
            if self.cache.get(&timer_closed_key(tournament_id)).await?.is_some() {
                return Err(TimerError::Closed(tournament_id));
            }
            let previous = self.read_previous(tournament_id).await?;
            if let (Some(event_id), Some(current)) = (origin, &previous)
                && current.origin_event == Some(event_id)
            {
                log::debug!(
                    "Timer {} already started by event {}, ignoring redelivery",
                    tournament_id,
                    event_id
                );
                return Ok(current.clone());
            }

            let now = self.clock.now_ms();
            let mut state = TimerState::started(tournament_id, duration_ms, now);
            state.version = previous.map(|p| p.version + 1).unwrap_or(0);
            state.origin_event = origin;

            self.register_active(tournament_id).await?;
            self.write_cache(&state).await?;
            self.snapshot(&state, now).await;
            self.publish_update(&state, now);

            log::info!(
                "Timer {} started with {}ms (version {})",
                tournament_id,
                duration_ms,
                state.version
            );
            Ok(state)
        })
        .await
    }

    /// Freeze the countdown. No-op unless RUNNING.
    ///
    /// # Errors
    ///
    /// * `TimerError::NotFound` - no state in cache or store
    pub async fn pause(&self, tournament_id: i64) -> TimerResult<TimerState> {
        let lock = timer_lock_key(tournament_id);
        with_lease(&self.cache, &lock, self.operation_lock, || async {
            let state = self
                .load_state(tournament_id)
                .await?
                .ok_or(TimerError::NotFound(tournament_id))?;
            if state.status != TimerStatus::Running {
                return Ok(state);
            }

            let now = self.clock.now_ms();
            let paused = state.paused_at(now);
            self.write_cache(&paused).await?;
            self.snapshot(&paused, now).await;
            self.publish_update(&paused, now);

            log::info!(
                "Timer {} paused with {}ms remaining",
                tournament_id,
                paused.remaining_ms
            );
            Ok(paused)
        })
        .await
    }

    /// Continue a paused countdown. No-op unless PAUSED.
    ///
    /// # Errors
    ///
    /// * `TimerError::NotFound` - no state in cache or store
    pub async fn resume(&self, tournament_id: i64) -> TimerResult<TimerState> {
        let lock = timer_lock_key(tournament_id);
        with_lease(&self.cache, &lock, self.operation_lock, || async {
            let state = self
                .load_state(tournament_id)
                .await?
                .ok_or(TimerError::NotFound(tournament_id))?;
            if state.status != TimerStatus::Paused {
                return Ok(state);
            }

            let now = self.clock.now_ms();
            let resumed = state.resumed_at(now);
            self.register_active(tournament_id).await?;
            self.write_cache(&resumed).await?;
            self.snapshot(&resumed, now).await;
            self.publish_update(&resumed, now);

            log::info!(
                "Timer {} resumed with {}ms remaining",
                tournament_id,
                resumed.remaining_ms
            );
            Ok(resumed)
        })
        .await
    }

    /// Force FINISHED regardless of remaining time. Idempotent.
    ///
    /// # Errors
    ///
    /// * `TimerError::NotFound` - no state in cache or store
    pub async fn stop(&self, tournament_id: i64) -> TimerResult<TimerState> {
        let lock = timer_lock_key(tournament_id);
        with_lease(&self.cache, &lock, self.operation_lock, || async {
            let state = self
                .load_state(tournament_id)
                .await?
                .ok_or(TimerError::NotFound(tournament_id))?;
            if state.status == TimerStatus::Finished {
                self.unregister_active(tournament_id).await?;
                return Ok(state);
            }

            let now = self.clock.now_ms();
            let finished = state.finished_at(now);
            self.write_cache(&finished).await?;
            self.unregister_active(tournament_id).await?;
            self.snapshot(&finished, now).await;
            self.updates.publish(TimerUpdate::TimerFinished { tournament_id });
            metrics::counter!("timers_finished_total", "cause" => "stop").increment(1);

            log::info!(
                "Timer {} stopped with {}ms remaining",
                tournament_id,
                finished.remaining_ms
            );
            Ok(finished)
        })
        .await
    }

    /// Stop the countdown for good once the tournament has a winner. Later
    /// starts and restarts fail with `TimerError::Closed`.
    ///
    /// Returns `None` when the tournament never had a timer.
    pub async fn close(&self, tournament_id: i64) -> TimerResult<Option<TimerState>> {
        // Marker first: a start that already holds the lock is undone by stop
        self.cache
            .set(&timer_closed_key(tournament_id), "1".to_string(), None)
            .await?;
        match self.stop(tournament_id).await {
            Ok(state) => Ok(Some(state)),
            Err(TimerError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Current state with `remaining_ms` projected to now. Read-only.
    pub async fn get_timer(&self, tournament_id: i64) -> TimerResult<Option<TimerState>> {
        let state = match self.read_cached(tournament_id).await? {
            Some(state) => Some(state),
            None => self.store.find_snapshot(tournament_id).await?,
        };
        let now = self.clock.now_ms();
        Ok(state.map(|s| s.projected(now)))
    }

    /// Bring one timer back into the cache from its durable snapshot.
    ///
    /// A cached timer is returned as is. A recovered RUNNING timer restarts
    /// its countdown from the recovery instant, so the outage is not charged.
    pub async fn recover(&self, tournament_id: i64) -> TimerResult<Option<TimerState>> {
        let lock = timer_lock_key(tournament_id);
        with_lease(&self.cache, &lock, self.operation_lock, || {
            self.load_state(tournament_id)
        })
        .await
    }

    /// Startup sweep: rehydrate every unfinished snapshot missing from the
    /// cache and register it for ticking. Returns how many were recovered.
    pub async fn recover_unfinished(&self) -> TimerResult<usize> {
        let snapshots = self.store.list_unfinished().await?;
        let mut recovered = 0;

        for snapshot in snapshots {
            let id = snapshot.tournament_id;
            if self.read_cached(id).await?.is_some() {
                self.register_active(id).await?;
                continue;
            }
            match self.recover(id).await {
                Ok(Some(_)) => recovered += 1,
                Ok(None) => {}
                Err(e) => log::warn!("Failed to recover timer {}: {}", id, e),
            }
        }

        if recovered > 0 {
            log::info!("Recovered {} timer(s) from durable snapshots", recovered);
        }
        Ok(recovered)
    }

    /// One sweep over the active set. Timers are ticked concurrently, each
    /// under its own lock; a failure on one never stops the others.
    pub async fn tick_all(&self) -> Vec<(i64, TickOutcome)> {
        let members = match self.cache.smembers(ACTIVE_TIMERS_KEY).await {
            Ok(members) => members,
            Err(e) => {
                log::warn!("Skipping tick sweep, active set unavailable: {}", e);
                metrics::counter!("timer_tick_skipped_total", "reason" => "cache").increment(1);
                return Vec::new();
            }
        };

        let ids: Vec<i64> = members
            .iter()
            .filter_map(|member| match member.parse() {
                Ok(id) => Some(id),
                Err(_) => {
                    log::warn!("Ignoring malformed active timer id {:?}", member);
                    None
                }
            })
            .collect();

        join_all(
            ids.into_iter()
                .map(|id| async move { (id, self.tick_logged(id).await) }),
        )
        .await
    }

    async fn tick_logged(&self, tournament_id: i64) -> TickOutcome {
        match self.process_tick(tournament_id).await {
            Ok(outcome) => outcome,
            Err(TimerError::Cache(CacheError::LockUnavailable { .. })) => {
                log::debug!("Timer {} locked elsewhere, skipping tick", tournament_id);
                metrics::counter!("timer_tick_skipped_total", "reason" => "locked").increment(1);
                TickOutcome::Skipped
            }
            Err(e) => {
                log::warn!("Tick failed for timer {}: {}", tournament_id, e);
                metrics::counter!("timer_tick_skipped_total", "reason" => "error").increment(1);
                TickOutcome::Skipped
            }
        }
    }

    /// Tick one timer under its tick lease.
    ///
    /// While time remains this only publishes; the state is written once,
    /// when the countdown reaches zero.
    pub async fn process_tick(&self, tournament_id: i64) -> TimerResult<TickOutcome> {
        let lock = timer_lock_key(tournament_id);
        with_lease(&self.cache, &lock, self.tick_lock, || async {
            let Some(state) = self.load_state(tournament_id).await? else {
                log::debug!("Timer {} has no state, pruning from active set", tournament_id);
                self.unregister_active(tournament_id).await?;
                return Ok(TickOutcome::Skipped);
            };

            match state.status {
                TimerStatus::Paused => Ok(TickOutcome::Skipped),
                TimerStatus::Finished => {
                    self.unregister_active(tournament_id).await?;
                    Ok(TickOutcome::Skipped)
                }
                TimerStatus::Running => {
                    let now = self.clock.now_ms();
                    let remaining_ms = state.remaining_at(now);
                    metrics::counter!("timer_ticks_total").increment(1);

                    if remaining_ms > 0 {
                        self.updates.publish(TimerUpdate::TimerUpdate {
                            tournament_id,
                            remaining_ms,
                            status: TimerStatus::Running,
                        });
                        return Ok(TickOutcome::Running { remaining_ms });
                    }

                    let finished = TimerState {
                        status: TimerStatus::Finished,
                        remaining_ms: 0,
                        last_tick_at: None,
                        version: state.version + 1,
                        ..state
                    };
                    self.write_cache(&finished).await?;
                    self.unregister_active(tournament_id).await?;
                    self.snapshot(&finished, now).await;
                    self.updates.publish(TimerUpdate::TimerFinished { tournament_id });
                    metrics::counter!("timers_finished_total", "cause" => "elapsed").increment(1);

                    log::info!("Timer {} finished", tournament_id);
                    Ok(TickOutcome::Finished)
                }
            }
        })
        .await
    }

    /// Cache first, durable recovery second. Caller must hold the timer lock.
    async fn load_state(&self, tournament_id: i64) -> TimerResult<Option<TimerState>> {
        if let Some(state) = self.read_cached(tournament_id).await? {
            return Ok(Some(state));
        }

        let Some(mut state) = self.store.find_snapshot(tournament_id).await? else {
            return Ok(None);
        };

        let now = self.clock.now_ms();
        if state.status == TimerStatus::Running {
            state.last_tick_at = Some(now);
        }
        if state.is_active() {
            self.register_active(tournament_id).await?;
        }
        self.write_cache(&state).await?;

        log::info!(
            "Recovered timer {} from snapshot: {} with {}ms remaining",
            tournament_id,
            state.status.as_str(),
            state.remaining_ms
        );
        Ok(Some(state))
    }

    /// Cached state, falling back to the snapshot without rehydrating. A store
    /// failure is logged and treated as "no previous state".
    async fn read_previous(&self, tournament_id: i64) -> TimerResult<Option<TimerState>> {
        if let Some(state) = self.read_cached(tournament_id).await? {
            return Ok(Some(state));
        }
        match self.store.find_snapshot(tournament_id).await {
            Ok(snapshot) => Ok(snapshot),
            Err(e) => {
                log::warn!("Snapshot lookup for timer {} failed: {}", tournament_id, e);
                Ok(None)
            }
        }
    }

    async fn read_cached(&self, tournament_id: i64) -> TimerResult<Option<TimerState>> {
        match self.cache.get(&timer_key(tournament_id)).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    async fn write_cache(&self, state: &TimerState) -> TimerResult<()> {
        let raw = serde_json::to_string(state)?;
        self.cache
            .set(&timer_key(state.tournament_id), raw, None)
            .await?;
        Ok(())
    }

    async fn register_active(&self, tournament_id: i64) -> TimerResult<()> {
        self.cache
            .sadd(ACTIVE_TIMERS_KEY, &tournament_id.to_string())
            .await?;
        Ok(())
    }

    async fn unregister_active(&self, tournament_id: i64) -> TimerResult<()> {
        self.cache
            .srem(ACTIVE_TIMERS_KEY, &tournament_id.to_string())
            .await?;
        Ok(())
    }

    /// Trailing durable write. Failure is logged; the cache stays authoritative.
    async fn snapshot(&self, state: &TimerState, now: i64) {
        if let Err(e) = self.store.save_snapshot(state, now).await {
            log::warn!(
                "Failed to snapshot timer {}: {}",
                state.tournament_id,
                e
            );
        }
    }

    fn publish_update(&self, state: &TimerState, now: i64) {
        self.updates.publish(TimerUpdate::TimerUpdate {
            tournament_id: state.tournament_id,
            remaining_ms: state.remaining_at(now),
            status: state.status,
        });
    }
}
