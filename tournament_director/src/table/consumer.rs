//! Table allocation's reaction to seat and unseat requests.

use super::allocator::TableAllocator;
use super::errors::TableError;
use crate::events::{EventEnvelope, EventHandler, HandlerError, Topic, TournamentEvent};
use async_trait::async_trait;

pub struct TableEventHandler {
    allocator: TableAllocator,
}

impl TableEventHandler {
    pub fn new(allocator: TableAllocator) -> Self {
        Self { allocator }
    }
}

#[async_trait]
impl EventHandler for TableEventHandler {
    fn group(&self) -> &'static str {
        "table-service"
    }

    fn topics(&self) -> &'static [Topic] {
        &[Topic::Players]
    }

    async fn handle(
        &self,
        _envelope: &EventEnvelope,
        event: TournamentEvent,
    ) -> Result<(), HandlerError> {
        match event {
            TournamentEvent::TablesAdd(p) => {
                match self
                    .allocator
                    .seat(p.player_id, p.tournament_id, &p.username)
                    .await
                {
                    Ok(_) => {}
                    Err(TableError::PlayerEliminated(id)) => {
                        log::info!("Not seating eliminated player {}", id)
                    }
                    Err(e) => return Err(e.into()),
                }
            }
            TournamentEvent::TablesEliminate(p) => {
                match self.allocator.unseat(p.player_id, p.tournament_id).await {
                    Ok(_) => {}
                    Err(TableError::PlayerNotFound(id)) => {
                        log::warn!("Unseat for unknown player {}, ignoring", id)
                    }
                    Err(e) => return Err(e.into()),
                }
            }
            _ => {}
        }
        Ok(())
    }
}
