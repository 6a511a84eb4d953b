//! Periodic sweep driving [`TimerEngine::tick_all`].

use super::engine::{TickOutcome, TimerEngine};
use std::time::{Duration, Instant};
use tokio::{
    sync::watch,
    time::{MissedTickBehavior, interval},
};

/// Sweep loop. Any number of instances may run; per-timer leases keep them
/// from double-ticking the same tournament.
pub struct Ticker {
    engine: TimerEngine,
    period: Duration,
}

impl Ticker {
    pub fn new(engine: TimerEngine, period: Duration) -> Self {
        Self { engine, period }
    }

    /// Run until `shutdown` flips to `true`
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        log::info!("Timer sweep starting every {:?}", self.period);

        let mut tick_interval = interval(self.period);
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = tick_interval.tick() => {
                    self.sweep().await;
                }

                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        log::info!("Timer sweep stopped");
    }

    async fn sweep(&self) {
        let started = Instant::now();
        let outcomes = self.engine.tick_all().await;
        let elapsed = started.elapsed();

        let finished = outcomes
            .iter()
            .filter(|(_, outcome)| *outcome == TickOutcome::Finished)
            .count();
        metrics::histogram!("timer_sweep_duration_ms").record(elapsed.as_secs_f64() * 1000.0);

        if elapsed > self.period {
            log::warn!(
                "Timer sweep over {} timer(s) took {:?}, longer than the {:?} period",
                outcomes.len(),
                elapsed,
                self.period
            );
        } else if finished > 0 {
            log::debug!("Sweep finished {} timer(s)", finished);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::clock::ManualClock;
    use crate::db::MemoryTimerRepository;
    use crate::timer::TimerUpdate;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_ticker_publishes_and_stops() {
        let clock = ManualClock::new(0);
        let engine = TimerEngine::new(
            Arc::new(MemoryCache::new()),
            Arc::new(MemoryTimerRepository::new()),
            Arc::new(clock.clone()),
        );
        engine.start(1, 5_000).await.unwrap();
        let mut updates = engine.subscribe();

        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(Ticker::new(engine, Duration::from_millis(10)).run(rx));

        clock.advance(1_000);
        let update = tokio::time::timeout(Duration::from_secs(2), updates.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(update, TimerUpdate::TimerUpdate { tournament_id: 1, .. }));

        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
