//! Player registry's reaction to bus events.

use super::errors::PlayerError;
use super::registry::PlayerRegistry;
use crate::events::{EventEnvelope, EventHandler, HandlerError, Topic, TournamentEvent};
use async_trait::async_trait;

pub struct PlayerEventHandler {
    registry: PlayerRegistry,
}

impl PlayerEventHandler {
    pub fn new(registry: PlayerRegistry) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl EventHandler for PlayerEventHandler {
    fn group(&self) -> &'static str {
        "player-service"
    }

    fn topics(&self) -> &'static [Topic] {
        &[Topic::Tournament, Topic::Tables]
    }

    async fn handle(
        &self,
        _envelope: &EventEnvelope,
        event: TournamentEvent,
    ) -> Result<(), HandlerError> {
        match event {
            TournamentEvent::PlayerAdd(p) => {
                self.registry.register(p.tournament_id, &p.username).await?;
            }
            TournamentEvent::PlayerEliminate(p) => {
                match self.registry.eliminate(p.tournament_id, p.player_id).await {
                    Ok(_) => {}
                    // Rejected requests are final; redelivery would not change them
                    Err(e @ (PlayerError::NotFound(_) | PlayerError::InvalidTournament { .. })) => {
                        log::warn!("Elimination rejected ({}): {}", e.code(), e)
                    }
                    Err(e) => return Err(e.into()),
                }
            }
            TournamentEvent::PlayerSeated(p) => {
                self.registry
                    .record_seating(p.tournament_id, p.player_id, p.table_id)
                    .await?;
            }
            TournamentEvent::PlayerMoved(p) => {
                self.registry
                    .record_seating(p.tournament_id, p.player_id, p.new_table_id)
                    .await?;
            }
            _ => {}
        }
        Ok(())
    }
}
