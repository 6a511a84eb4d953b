//! Low-latency update stream for the realtime gateway.
//!
//! Separate from the durable bus: lossy, in-memory, no replay.

use super::models::TimerStatus;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Buffered updates per subscriber before the oldest are dropped
pub const UPDATE_BUFFER: usize = 1024;

/// Message pushed to gateway subscribers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TimerUpdate {
    /// Once per second while RUNNING, and on every state change
    #[serde(rename_all = "camelCase")]
    TimerUpdate {
        tournament_id: i64,
        remaining_ms: i64,
        status: TimerStatus,
    },
    /// Exactly once when the countdown reaches zero
    #[serde(rename_all = "camelCase")]
    TimerFinished { tournament_id: i64 },
}

impl TimerUpdate {
    pub fn tournament_id(&self) -> i64 {
        match self {
            TimerUpdate::TimerUpdate { tournament_id, .. }
            | TimerUpdate::TimerFinished { tournament_id } => *tournament_id,
        }
    }
}

/// Fan-out of [`TimerUpdate`]s; clones publish into the same channel
#[derive(Debug, Clone)]
pub struct TimerBroadcaster {
    sender: broadcast::Sender<TimerUpdate>,
}

impl TimerBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TimerUpdate> {
        self.sender.subscribe()
    }

    /// Publish to whoever is listening. No listeners is not an error.
    pub fn publish(&self, update: TimerUpdate) {
        let _ = self.sender.send(update);
    }
}

impl Default for TimerBroadcaster {
    fn default() -> Self {
        Self::new(UPDATE_BUFFER)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_shape() {
        let update = TimerUpdate::TimerUpdate {
            tournament_id: 3,
            remaining_ms: 4000,
            status: TimerStatus::Running,
        };
        let wire = serde_json::to_value(&update).unwrap();
        assert_eq!(wire["type"], "timer_update");
        assert_eq!(wire["tournamentId"], 3);
        assert_eq!(wire["remainingMs"], 4000);
        assert_eq!(wire["status"], "RUNNING");

        let finished = serde_json::to_value(TimerUpdate::TimerFinished { tournament_id: 3 }).unwrap();
        assert_eq!(finished, serde_json::json!({ "type": "timer_finished", "tournamentId": 3 }));
    }

    #[tokio::test]
    async fn test_publish_without_listeners() {
        let broadcaster = TimerBroadcaster::default();
        broadcaster.publish(TimerUpdate::TimerFinished { tournament_id: 1 });

        let mut rx = broadcaster.subscribe();
        broadcaster.publish(TimerUpdate::TimerFinished { tournament_id: 2 });
        assert_eq!(rx.recv().await.unwrap().tournament_id(), 2);
    }
}
