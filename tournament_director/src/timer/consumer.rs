//! Timer engine's reaction to bus events.

use super::engine::TimerEngine;
use super::errors::TimerError;
use crate::events::{EventEnvelope, EventHandler, HandlerError, Topic, TournamentEvent};
use async_trait::async_trait;

pub struct TimerEventHandler {
    engine: TimerEngine,
}

impl TimerEventHandler {
    pub fn new(engine: TimerEngine) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl EventHandler for TimerEventHandler {
    fn group(&self) -> &'static str {
        "timer-service"
    }

    fn topics(&self) -> &'static [Topic] {
        &[Topic::Tournament]
    }

    async fn handle(
        &self,
        envelope: &EventEnvelope,
        event: TournamentEvent,
    ) -> Result<(), HandlerError> {
        match event {
            TournamentEvent::TimerStart(p) | TournamentEvent::TimerRestart(p) => {
                match self
                    .engine
                    .start_from_event(envelope.event_id, p.tournament_id, p.duration_ms)
                    .await
                {
                    Ok(_) => {}
                    Err(TimerError::Closed(id)) => {
                        log::info!("Ignoring {} for closed timer {}", envelope.event_type, id)
                    }
                    Err(e) => return Err(e.into()),
                }
            }
            TournamentEvent::TournamentWinner(p) => match self.engine.close(p.tournament_id).await {
                Ok(Some(_)) => log::info!(
                    "Timer {} stopped, winner {} declared",
                    p.tournament_id,
                    p.winner_id
                ),
                Ok(None) => log::info!(
                    "Winner declared for {} with no timer to stop",
                    p.tournament_id
                ),
                Err(e) => return Err(e.into()),
            },
            _ => {}
        }
        Ok(())
    }
}
