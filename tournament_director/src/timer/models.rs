//! Countdown state and its pure time arithmetic.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Countdown lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimerStatus {
    Running,
    Paused,
    Finished,
}

impl TimerStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TimerStatus::Running => "RUNNING",
            TimerStatus::Paused => "PAUSED",
            TimerStatus::Finished => "FINISHED",
        }
    }

    /// Parse the stored representation
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "RUNNING" => Some(TimerStatus::Running),
            "PAUSED" => Some(TimerStatus::Paused),
            "FINISHED" => Some(TimerStatus::Finished),
            _ => None,
        }
    }
}

/// Authoritative countdown of one tournament.
///
/// `last_tick_at` is present exactly while RUNNING. `remaining_ms` is the
/// amount left as of `last_tick_at`; the live value is derived with
/// [`TimerState::remaining_at`] and only written back on pause or finish.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerState {
    pub tournament_id: i64,
    pub status: TimerStatus,
    pub remaining_ms: i64,
    pub last_tick_at: Option<i64>,
    #[serde(default)]
    pub version: u64,
    /// Event that produced the last start, used to drop redeliveries
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin_event: Option<Uuid>,
}

impl TimerState {
    /// Fresh RUNNING countdown
    pub fn started(tournament_id: i64, duration_ms: i64, now: i64) -> Self {
        Self {
            tournament_id,
            status: TimerStatus::Running,
            remaining_ms: duration_ms.max(0),
            last_tick_at: Some(now),
            version: 0,
            origin_event: None,
        }
    }

    /// Remaining time as observed at `now`.
    ///
    /// Elapsed time is clamped at zero so a wall clock stepping backwards
    /// never adds time back.
    pub fn remaining_at(&self, now: i64) -> i64 {
        match (self.status, self.last_tick_at) {
            (TimerStatus::Running, Some(last)) => {
                let elapsed = (now - last).max(0);
                (self.remaining_ms - elapsed).max(0)
            }
            _ => self.remaining_ms.max(0),
        }
    }

    /// Freeze at `now`. PAUSED and FINISHED are returned unchanged.
    pub fn paused_at(&self, now: i64) -> Self {
        if self.status != TimerStatus::Running {
            return self.clone();
        }
        Self {
            status: TimerStatus::Paused,
            remaining_ms: self.remaining_at(now),
            last_tick_at: None,
            version: self.version + 1,
            ..self.clone()
        }
    }

    /// Continue from `now` with the frozen remainder. Only PAUSED changes.
    pub fn resumed_at(&self, now: i64) -> Self {
        if self.status != TimerStatus::Paused {
            return self.clone();
        }
        Self {
            status: TimerStatus::Running,
            last_tick_at: Some(now),
            version: self.version + 1,
            ..self.clone()
        }
    }

    /// Terminal state, keeping the remainder observed at `now`
    pub fn finished_at(&self, now: i64) -> Self {
        Self {
            status: TimerStatus::Finished,
            remaining_ms: self.remaining_at(now),
            last_tick_at: None,
            version: self.version + 1,
            ..self.clone()
        }
    }

    /// Read-only view with `remaining_ms` brought forward to `now`
    pub fn projected(&self, now: i64) -> Self {
        Self {
            remaining_ms: self.remaining_at(now),
            ..self.clone()
        }
    }

    /// Whether the sweep should keep visiting this timer
    pub fn is_active(&self) -> bool {
        self.status != TimerStatus::Finished
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const T: i64 = 1_700_000_000_000;

    #[test]
    fn test_remaining_while_running() {
        let state = TimerState::started(1, 5000, T);
        assert_eq!(state.remaining_at(T), 5000);
        assert_eq!(state.remaining_at(T + 1000), 4000);
        assert_eq!(state.remaining_at(T + 9000), 0);
    }

    #[test]
    fn test_clock_going_backwards_adds_nothing() {
        let state = TimerState::started(1, 5000, T);
        assert_eq!(state.remaining_at(T - 3000), 5000);
    }

    #[test]
    fn test_pause_freezes() {
        let paused = TimerState::started(1, 5000, T).paused_at(T + 1500);
        assert_eq!(paused.status, TimerStatus::Paused);
        assert_eq!(paused.remaining_ms, 3500);
        assert_eq!(paused.last_tick_at, None);
        assert_eq!(paused.remaining_at(T + 60_000), 3500);
        assert_eq!(paused.version, 1);
    }

    #[test]
    fn test_pause_resume_idempotent() {
        let running = TimerState::started(1, 5000, T);
        assert_eq!(running.resumed_at(T + 10), running);

        let paused = running.paused_at(T + 10);
        assert_eq!(paused.paused_at(T + 20), paused);
    }

    #[test]
    fn test_resume_keeps_remaining() {
        let resumed = TimerState::started(1, 5000, T)
            .paused_at(T + 1000)
            .resumed_at(T + 50_000);
        assert_eq!(resumed.status, TimerStatus::Running);
        assert_eq!(resumed.remaining_ms, 4000);
        assert_eq!(resumed.last_tick_at, Some(T + 50_000));
    }

    #[test]
    fn test_wire_shape() {
        let wire = serde_json::to_value(TimerState::started(9, 100, T)).unwrap();
        assert_eq!(wire["tournamentId"], 9);
        assert_eq!(wire["status"], "RUNNING");
        assert_eq!(wire["remainingMs"], 100);
        assert_eq!(wire["lastTickAt"], T);
        assert!(wire.get("originEvent").is_none());
    }

    #[test]
    fn test_status_parse() {
        for status in [TimerStatus::Running, TimerStatus::Paused, TimerStatus::Finished] {
            assert_eq!(TimerStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(TimerStatus::parse("STOPPED"), None);
    }
}
