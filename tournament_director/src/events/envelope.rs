//! Wire envelope and the typed event catalogue.

use super::errors::EventError;
use super::payloads::*;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::fmt;
use uuid::Uuid;

/// Schema version stamped on every envelope
pub const SCHEMA_VERSION: &str = "1.0.0";

/// Bus topic. Partition key is always the tournament id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Topic {
    /// Lifecycle, timer commands, registration and elimination requests, winner
    Tournament,
    /// Seat and unseat requests for table allocation
    Players,
    /// Seating audit trail
    Tables,
}

impl Topic {
    pub fn name(self) -> &'static str {
        match self {
            Topic::Tournament => "tournament-events",
            Topic::Players => "players-events",
            Topic::Tables => "table-events",
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Unit of cross-service communication
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventEnvelope {
    pub event_id: Uuid,
    pub event_type: String,
    pub occurred_at: DateTime<Utc>,
    pub payload: serde_json::Value,
    pub version: String,
}

impl EventEnvelope {
    /// Wrap an event in a fresh envelope
    pub fn new(event: &TournamentEvent) -> Result<Self, EventError> {
        Ok(Self {
            event_id: Uuid::new_v4(),
            event_type: event.event_type().to_string(),
            occurred_at: Utc::now(),
            payload: event.payload_json()?,
            version: SCHEMA_VERSION.to_string(),
        })
    }

    /// Decode the payload into a typed event.
    ///
    /// Returns `Ok(None)` for event types this system does not consume.
    ///
    /// # Errors
    ///
    /// * `EventError::UnsupportedVersion` - major version differs from ours
    /// * `EventError::MalformedPayload` - known type, payload does not match
    pub fn decode(&self) -> Result<Option<TournamentEvent>, EventError> {
        let major = self.version.split('.').next().unwrap_or_default();
        if major != "1" {
            return Err(EventError::UnsupportedVersion(self.version.clone()));
        }

        let event = match self.event_type.as_str() {
            "timer_start" => TournamentEvent::TimerStart(self.payload_as()?),
            "event_timer_restart" => TournamentEvent::TimerRestart(self.payload_as()?),
            "tournament.created" => TournamentEvent::TournamentCreated(self.payload_as()?),
            "tournament_winner" => TournamentEvent::TournamentWinner(self.payload_as()?),
            "event_player_add" | "player.registered" => {
                TournamentEvent::PlayerAdd(self.payload_as()?)
            }
            "event_player_eliminate" => TournamentEvent::PlayerEliminate(self.payload_as()?),
            "event_tables_add" => TournamentEvent::TablesAdd(self.payload_as()?),
            "event_tables_eliminate" => TournamentEvent::TablesEliminate(self.payload_as()?),
            "player_seated" => TournamentEvent::PlayerSeated(self.payload_as()?),
            "player_moved" => TournamentEvent::PlayerMoved(self.payload_as()?),
            "table_broken" => TournamentEvent::TableBroken(self.payload_as()?),
            _ => return Ok(None),
        };
        Ok(Some(event))
    }

    fn payload_as<T: DeserializeOwned>(&self) -> Result<T, EventError> {
        serde_json::from_value(self.payload.clone()).map_err(|source| {
            EventError::MalformedPayload {
                event_type: self.event_type.clone(),
                source,
            }
        })
    }
}

/// Every event produced or consumed by the services
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TournamentEvent {
    TimerStart(TimerStartPayload),
    TimerRestart(TimerStartPayload),
    TournamentCreated(TournamentCreatedPayload),
    TournamentWinner(TournamentWinnerPayload),
    PlayerAdd(PlayerAddPayload),
    PlayerEliminate(PlayerEliminatePayload),
    TablesAdd(TablesAddPayload),
    TablesEliminate(TablesEliminatePayload),
    PlayerSeated(PlayerSeatedPayload),
    PlayerMoved(PlayerMovedPayload),
    TableBroken(TableBrokenPayload),
}

impl TournamentEvent {
    /// Wire name of the event
    pub fn event_type(&self) -> &'static str {
        match self {
            TournamentEvent::TimerStart(_) => "timer_start",
            TournamentEvent::TimerRestart(_) => "event_timer_restart",
            TournamentEvent::TournamentCreated(_) => "tournament.created",
            TournamentEvent::TournamentWinner(_) => "tournament_winner",
            TournamentEvent::PlayerAdd(_) => "event_player_add",
            TournamentEvent::PlayerEliminate(_) => "event_player_eliminate",
            TournamentEvent::TablesAdd(_) => "event_tables_add",
            TournamentEvent::TablesEliminate(_) => "event_tables_eliminate",
            TournamentEvent::PlayerSeated(_) => "player_seated",
            TournamentEvent::PlayerMoved(_) => "player_moved",
            TournamentEvent::TableBroken(_) => "table_broken",
        }
    }

    /// Partition key
    pub fn tournament_id(&self) -> i64 {
        match self {
            TournamentEvent::TimerStart(p) | TournamentEvent::TimerRestart(p) => p.tournament_id,
            TournamentEvent::TournamentCreated(p) => p.tournament_id,
            TournamentEvent::TournamentWinner(p) => p.tournament_id,
            TournamentEvent::PlayerAdd(p) => p.tournament_id,
            TournamentEvent::PlayerEliminate(p) => p.tournament_id,
            TournamentEvent::TablesAdd(p) => p.tournament_id,
            TournamentEvent::TablesEliminate(p) => p.tournament_id,
            TournamentEvent::PlayerSeated(p) => p.tournament_id,
            TournamentEvent::PlayerMoved(p) => p.tournament_id,
            TournamentEvent::TableBroken(p) => p.tournament_id,
        }
    }

    pub fn topic(&self) -> Topic {
        match self {
            TournamentEvent::TimerStart(_)
            | TournamentEvent::TimerRestart(_)
            | TournamentEvent::TournamentCreated(_)
            | TournamentEvent::TournamentWinner(_)
            | TournamentEvent::PlayerAdd(_)
            | TournamentEvent::PlayerEliminate(_) => Topic::Tournament,
            TournamentEvent::TablesAdd(_) | TournamentEvent::TablesEliminate(_) => Topic::Players,
            TournamentEvent::PlayerSeated(_)
            | TournamentEvent::PlayerMoved(_)
            | TournamentEvent::TableBroken(_) => Topic::Tables,
        }
    }

    fn payload_json(&self) -> Result<serde_json::Value, serde_json::Error> {
        match self {
            TournamentEvent::TimerStart(p) | TournamentEvent::TimerRestart(p) => {
                serde_json::to_value(p)
            }
            TournamentEvent::TournamentCreated(p) => serde_json::to_value(p),
            TournamentEvent::TournamentWinner(p) => serde_json::to_value(p),
            TournamentEvent::PlayerAdd(p) => serde_json::to_value(p),
            TournamentEvent::PlayerEliminate(p) => serde_json::to_value(p),
            TournamentEvent::TablesAdd(p) => serde_json::to_value(p),
            TournamentEvent::TablesEliminate(p) => serde_json::to_value(p),
            TournamentEvent::PlayerSeated(p) => serde_json::to_value(p),
            TournamentEvent::PlayerMoved(p) => serde_json::to_value(p),
            TournamentEvent::TableBroken(p) => serde_json::to_value(p),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn envelope(event_type: &str, payload: serde_json::Value) -> EventEnvelope {
        EventEnvelope {
            event_id: Uuid::new_v4(),
            event_type: event_type.to_string(),
            occurred_at: Utc::now(),
            payload,
            version: SCHEMA_VERSION.to_string(),
        }
    }

    #[test]
    fn test_envelope_wire_shape() {
        let event = TournamentEvent::TournamentWinner(TournamentWinnerPayload {
            tournament_id: 7,
            winner_id: 42,
            username: "alice".to_string(),
        });
        let env = EventEnvelope::new(&event).unwrap();
        let wire = serde_json::to_value(&env).unwrap();

        assert_eq!(wire["eventType"], "tournament_winner");
        assert_eq!(wire["version"], "1.0.0");
        assert_eq!(wire["payload"]["winnerId"], 42);
        assert!(wire["eventId"].is_string());
        assert!(wire["occurredAt"].is_string());
    }

    #[test]
    fn test_decode_typed() {
        let event = TournamentEvent::PlayerMoved(PlayerMovedPayload {
            tournament_id: 1,
            player_id: 2,
            old_table_id: 3,
            new_table_id: 4,
        });
        let env = EventEnvelope::new(&event).unwrap();
        assert_eq!(env.decode().unwrap(), Some(event));
    }

    #[test]
    fn test_decode_aliases() {
        let restart = envelope(
            "event_timer_restart",
            json!({ "tournamentId": 3, "newDurationMs": 60000 }),
        );
        assert_eq!(
            restart.decode().unwrap(),
            Some(TournamentEvent::TimerRestart(TimerStartPayload {
                tournament_id: 3,
                duration_ms: 60000,
            }))
        );

        let registered = envelope(
            "player.registered",
            json!({ "tournamentId": 3, "username": "bob" }),
        );
        assert!(matches!(
            registered.decode().unwrap(),
            Some(TournamentEvent::PlayerAdd(_))
        ));
    }

    #[test]
    fn test_unknown_type_is_ignored() {
        let env = envelope("hand_dealt", json!({}));
        assert_eq!(env.decode().unwrap(), None);
    }

    #[test]
    fn test_malformed_payload() {
        let env = envelope("timer_start", json!({ "tournamentId": "x" }));
        assert!(matches!(
            env.decode(),
            Err(EventError::MalformedPayload { .. })
        ));
    }

    #[test]
    fn test_version_check() {
        let mut env = envelope("timer_start", json!({ "tournamentId": 1, "durationMs": 5 }));
        env.version = "1.4.0".to_string();
        assert!(env.decode().is_ok());

        env.version = "2.0.0".to_string();
        assert!(matches!(env.decode(), Err(EventError::UnsupportedVersion(_))));
    }

    #[test]
    fn test_topics() {
        let add = TournamentEvent::TablesAdd(TablesAddPayload {
            tournament_id: 1,
            player_id: 1,
            username: "a".to_string(),
        });
        assert_eq!(add.topic(), Topic::Players);
        assert_eq!(Topic::Players.name(), "players-events");
        assert_eq!(Topic::Tournament.to_string(), "tournament-events");
    }
}
