//! Integration tests for the countdown engine
//!
//! These tests drive the engine with a manual clock against the in-memory
//! cache and store, covering ticking, finishing, recovery and outages.

use std::sync::Arc;

use tournament_director::cache::{ACTIVE_TIMERS_KEY, MemoryCache, SharedCache};
use tournament_director::clock::ManualClock;
use tournament_director::db::{MemoryTimerRepository, TimerRepository};
use tournament_director::timer::{
    TickOutcome, TimerEngine, TimerError, TimerState, TimerStatus, TimerUpdate,
};

const T0: i64 = 1_700_000_000_000;

struct Harness {
    engine: TimerEngine,
    cache: MemoryCache,
    store: MemoryTimerRepository,
    clock: ManualClock,
}

fn harness() -> Harness {
    let cache = MemoryCache::new();
    let store = MemoryTimerRepository::new();
    let clock = ManualClock::new(T0);
    let engine = TimerEngine::new(
        Arc::new(cache.clone()),
        Arc::new(store.clone()),
        Arc::new(clock.clone()),
    );
    Harness {
        engine,
        cache,
        store,
        clock,
    }
}

async fn cached(cache: &MemoryCache, tournament_id: i64) -> Option<TimerState> {
    cache
        .get(&format!("timer:{tournament_id}"))
        .await
        .unwrap()
        .map(|raw| serde_json::from_str(&raw).unwrap())
}

#[tokio::test]
async fn test_tick_while_running_is_read_only() {
    let h = harness();
    h.engine.start(1, 5_000).await.unwrap();

    h.clock.advance(1_000);
    let outcome = h.engine.process_tick(1).await.unwrap();
    assert_eq!(outcome, TickOutcome::Running { remaining_ms: 4_000 });

    // Stored remainder is still anchored at the start instant
    let state = cached(&h.cache, 1).await.unwrap();
    assert_eq!(state.remaining_ms, 5_000);
    assert_eq!(state.last_tick_at, Some(T0));
    assert_eq!(state.version, 0);
    assert_eq!(h.store.snapshot_at(1).await, Some(T0));

    let projected = h.engine.get_timer(1).await.unwrap().unwrap();
    assert_eq!(projected.remaining_ms, 4_000);
}

#[tokio::test]
async fn test_countdown_finishes_once() {
    let h = harness();
    let mut updates = h.engine.subscribe();
    h.engine.start(1, 500).await.unwrap();

    h.clock.advance(600);
    assert_eq!(
        h.engine.tick_all().await,
        vec![(1, TickOutcome::Finished)]
    );

    let state = cached(&h.cache, 1).await.unwrap();
    assert_eq!(state.status, TimerStatus::Finished);
    assert_eq!(state.remaining_ms, 0);
    assert_eq!(state.last_tick_at, None);
    assert!(h.cache.smembers(ACTIVE_TIMERS_KEY).await.unwrap().is_empty());

    // Later sweeps have nothing left to visit
    h.clock.advance(1_000);
    assert!(h.engine.tick_all().await.is_empty());
    assert_eq!(
        h.engine.process_tick(1).await.unwrap(),
        TickOutcome::Skipped
    );

    let mut finished = 0;
    while let Ok(update) = updates.try_recv() {
        if matches!(update, TimerUpdate::TimerFinished { tournament_id: 1 }) {
            finished += 1;
        }
    }
    assert_eq!(finished, 1);

    let snapshot = h.store.find_snapshot(1).await.unwrap().unwrap();
    assert_eq!(snapshot.status, TimerStatus::Finished);
}

#[tokio::test]
async fn test_two_engines_finish_a_timer_once() {
    let h = harness();
    let other = TimerEngine::new(
        Arc::new(h.cache.clone()),
        Arc::new(h.store.clone()),
        Arc::new(h.clock.clone()),
    );
    h.engine.start(1, 100).await.unwrap();
    h.clock.advance(200);

    let (a, b) = tokio::join!(h.engine.tick_all(), other.tick_all());
    let finished = a
        .iter()
        .chain(b.iter())
        .filter(|(_, outcome)| *outcome == TickOutcome::Finished)
        .count();
    assert_eq!(finished, 1);
}

#[tokio::test]
async fn test_recovery_restarts_from_recovery_instant() {
    let h = harness();
    let snapshot = TimerState {
        tournament_id: 7,
        status: TimerStatus::Running,
        remaining_ms: 8_000,
        last_tick_at: Some(T0),
        version: 3,
        origin_event: None,
    };
    h.store.save_snapshot(&snapshot, T0).await.unwrap();

    // Outage of a minute is not charged to the countdown
    let t1 = T0 + 60_000;
    h.clock.set(t1);
    let recovered = h.engine.recover(7).await.unwrap().unwrap();
    assert_eq!(recovered.status, TimerStatus::Running);
    assert_eq!(recovered.remaining_ms, 8_000);
    assert_eq!(recovered.last_tick_at, Some(t1));

    assert_eq!(cached(&h.cache, 7).await, Some(recovered));
    assert_eq!(
        h.cache.smembers(ACTIVE_TIMERS_KEY).await.unwrap(),
        vec!["7".to_string()]
    );
}

#[tokio::test]
async fn test_startup_sweep_recovers_unfinished_only() {
    let h = harness();
    h.engine.start(1, 10_000).await.unwrap();
    h.engine.start(2, 10_000).await.unwrap();
    h.engine.pause(2).await.unwrap();
    h.engine.start(3, 10_000).await.unwrap();
    h.engine.stop(3).await.unwrap();

    // Cache lost entirely, store survives
    h.cache.clear().await;
    h.clock.advance(5_000);

    assert_eq!(h.engine.recover_unfinished().await.unwrap(), 2);
    let mut active = h.cache.smembers(ACTIVE_TIMERS_KEY).await.unwrap();
    active.sort();
    assert_eq!(active, vec!["1".to_string(), "2".to_string()]);

    let paused = h.engine.get_timer(2).await.unwrap().unwrap();
    assert_eq!(paused.status, TimerStatus::Paused);
    assert_eq!(paused.remaining_ms, 10_000);
}

#[tokio::test]
async fn test_pause_resume_stop_unknown_timer() {
    let h = harness();
    assert!(matches!(
        h.engine.pause(42).await,
        Err(TimerError::NotFound(42))
    ));
    assert!(matches!(
        h.engine.resume(42).await,
        Err(TimerError::NotFound(42))
    ));
    assert!(matches!(
        h.engine.stop(42).await,
        Err(TimerError::NotFound(42))
    ));
    assert_eq!(h.engine.get_timer(42).await.unwrap(), None);
}

#[tokio::test]
async fn test_pause_freezes_and_resume_continues() {
    let h = harness();
    h.engine.start(1, 10_000).await.unwrap();

    h.clock.advance(3_000);
    let paused = h.engine.pause(1).await.unwrap();
    assert_eq!(paused.remaining_ms, 7_000);

    h.clock.advance(60_000);
    assert_eq!(h.engine.process_tick(1).await.unwrap(), TickOutcome::Skipped);
    assert_eq!(
        h.engine.get_timer(1).await.unwrap().unwrap().remaining_ms,
        7_000
    );

    h.engine.resume(1).await.unwrap();
    h.clock.advance(2_000);
    assert_eq!(
        h.engine.process_tick(1).await.unwrap(),
        TickOutcome::Running { remaining_ms: 5_000 }
    );
}

#[tokio::test]
async fn test_cache_outage_skips_sweep() {
    let h = harness();
    h.engine.start(1, 10_000).await.unwrap();

    h.cache.set_available(false);
    assert!(h.engine.tick_all().await.is_empty());
    assert!(h.engine.start(2, 1_000).await.is_err());

    // Nothing was lost while the cache was down
    h.cache.set_available(true);
    h.clock.advance(1_000);
    assert_eq!(
        h.engine.tick_all().await,
        vec![(1, TickOutcome::Running { remaining_ms: 9_000 })]
    );
}
