//! Tournament aggregate's reaction to bus events.

use super::manager::TournamentManager;
use crate::events::{EventEnvelope, EventHandler, HandlerError, Topic, TournamentEvent};
use async_trait::async_trait;

pub struct TournamentEventHandler {
    manager: TournamentManager,
}

impl TournamentEventHandler {
    pub fn new(manager: TournamentManager) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl EventHandler for TournamentEventHandler {
    fn group(&self) -> &'static str {
        "tournament-service"
    }

    fn topics(&self) -> &'static [Topic] {
        &[Topic::Tournament]
    }

    async fn handle(
        &self,
        _envelope: &EventEnvelope,
        event: TournamentEvent,
    ) -> Result<(), HandlerError> {
        if let TournamentEvent::TournamentWinner(p) = event {
            self.manager.finish_tournament(p.tournament_id).await?;
        }
        Ok(())
    }
}
